use crate::session::CoPilotSession;
use crate::sync::AccountSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Top-level dashboard state: the synced account snapshot plus the nested
/// co-pilot session that reads it.
pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub sync: AccountSync,
    pub session: CoPilotSession,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(sync: AccountSync, session: CoPilotSession) -> Self {
        Self {
            should_quit: false,
            // The portal is chat-first; start with the input armed.
            input_mode: InputMode::Editing,
            sync,
            session,
            animation_frame: 0,
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
