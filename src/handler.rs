use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Log scrolling
        KeyCode::Char('j') | KeyCode::Down => app.session.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.session.scroll_up(),
        KeyCode::Char('G') => app.session.scroll_to_bottom(),

        // Back to the input
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        // Anchor the insight; the session ignores blank drafts.
        KeyCode::Enter => {
            app.session.submit(app.sync.account());
        }
        KeyCode::Backspace => app.session.backspace(),
        KeyCode::Left => app.session.cursor_left(),
        KeyCode::Right => app.session.cursor_right(),
        KeyCode::Char(c) => app.session.insert_char(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.session.scroll_up(),
        MouseEventKind::ScrollDown => app.session.scroll_down(),
        _ => {}
    }
}
