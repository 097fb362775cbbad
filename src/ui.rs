use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::{App, InputMode};
use crate::session::Sender;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_copilot(app, frame, body_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let account = app.sync.account();

    let title = Line::from(vec![
        Span::styled(" FDCN ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", account.id),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("{} $FEX", account.fex_display()),
            Style::default().fg(Color::Green).bold(),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} SU", account.su_display()),
            Style::default().fg(Color::Yellow).bold(),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_copilot(app: &mut App, frame: &mut Frame, area: Rect) {
    let [log_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Record the log viewport (inner size minus borders) so appends can keep
    // the newest message visible.
    app.session.viewport_height = log_area.height.saturating_sub(2);
    app.session.viewport_width = log_area.width.saturating_sub(2);

    let log_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Co-Pilot ");

    let mut lines: Vec<Line> = Vec::new();
    for message in app.session.log() {
        match message.sender {
            Sender::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(message.text.as_str()));
                lines.push(Line::default());
            }
            Sender::Pilot => {
                lines.push(Line::from(Span::styled(
                    "Co-Pilot:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                for line in message.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
                lines.push(Line::default());
            }
        }
    }

    if app.session.is_waiting() {
        lines.push(Line::from(Span::styled(
            "Co-Pilot:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));
    }

    let log = Paragraph::new(Text::from(lines))
        .block(log_block)
        .wrap(Wrap { trim: true })
        .scroll((app.session.scroll, 0));

    frame.render_widget(log, log_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(" Anchor (Enter to send) ");

    // Horizontal scrolling keeps the cursor inside the visible slice.
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.session.cursor();

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.session.draft().is_empty() && app.input_mode == InputMode::Normal {
        Paragraph::new("Anchor your insight...")
            .style(Style::default().fg(Color::Gray))
            .block(input_block)
    } else {
        let visible_text: String = app
            .session
            .draft()
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block)
    };

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " LOG ",
        InputMode::Editing => " INSIGHT ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" G ", key_style),
            Span::styled(" newest ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" write ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" anchor ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" log ", label_style),
            Span::styled(" Ctrl-c ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    let footer = Paragraph::new(Line::from(spans));
    frame.render_widget(footer, area);
}
