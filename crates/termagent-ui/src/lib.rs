//! Terminal chat client: transcript model, the controller that owns all
//! screen state, and the ratatui/crossterm event loop around it.

mod controller;
mod keymap;
mod render;
mod shell;
mod transcript;

pub use controller::{
    ControllerOptions, StatusIndicator, TerminalController, UiEvent, WELCOME_MESSAGE,
};
pub use keymap::{KeyBindings, UiAction, load_keybindings, parse_key_event};
pub use render::{TuiTheme, draw, entry_lines, format_ai_text, parse_theme_color};
pub use shell::{ChatSession, run_tui, spawn_clear, spawn_status_check, spawn_stream};
pub use transcript::{EntryKind, Transcript, TranscriptEntry};
