use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;

/// Input action that can be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    ScrollDown,
    ScrollUp,
    ScrollHalfPageDown,
    ScrollHalfPageUp,
    ScrollPageDown,
    ScrollPageUp,
    JumpToTop,
    JumpToBottom,
    PendingG, // First 'g' press, waiting for second 'g'
    ToggleInspector,
    TogglePause,
    StepFrame,
    Replay,
    None,
}

/// Handle a key event and return the corresponding action
pub fn handle_key_event(key: KeyEvent, app: &App) -> Action {
    match (key.code, key.modifiers) {
        // Quit
        (KeyCode::Char('q'), KeyModifiers::NONE) => Action::Quit,
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Action::Quit,
        (KeyCode::Esc, KeyModifiers::NONE) => Action::Quit,

        // Line scrolling
        (KeyCode::Char('j'), KeyModifiers::NONE) => Action::ScrollDown,
        (KeyCode::Char('k'), KeyModifiers::NONE) => Action::ScrollUp,
        (KeyCode::Down, KeyModifiers::NONE) => Action::ScrollDown,
        (KeyCode::Up, KeyModifiers::NONE) => Action::ScrollUp,

        // Page scrolling
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => Action::ScrollHalfPageDown,
        (KeyCode::Char('u'), KeyModifiers::CONTROL) => Action::ScrollHalfPageUp,
        (KeyCode::Char('f'), KeyModifiers::CONTROL) => Action::ScrollPageDown,
        (KeyCode::Char('b'), KeyModifiers::CONTROL) => Action::ScrollPageUp,
        (KeyCode::PageDown, _) => Action::ScrollPageDown,
        (KeyCode::PageUp, _) => Action::ScrollPageUp,
        (KeyCode::Char(' '), KeyModifiers::NONE) => Action::ScrollPageDown,

        // Jump to top/bottom
        (KeyCode::Char('g'), KeyModifiers::NONE) => {
            // gg requires double press
            if app.pending_key == Some('g') {
                Action::JumpToTop
            } else {
                Action::PendingG
            }
        }
        (KeyCode::Char('G'), KeyModifiers::SHIFT) => Action::JumpToBottom,
        (KeyCode::Home, _) => Action::JumpToTop,
        (KeyCode::End, _) => Action::JumpToBottom,

        // Engine controls
        (KeyCode::Char('i'), KeyModifiers::NONE) => Action::ToggleInspector,
        (KeyCode::Char('p'), KeyModifiers::NONE) => Action::TogglePause,
        (KeyCode::Char('.'), KeyModifiers::NONE) => Action::StepFrame,
        (KeyCode::Char('r'), KeyModifiers::NONE) => Action::Replay,

        _ => Action::None,
    }
}

/// Apply `action` to the app
pub fn apply_action(app: &mut App, action: Action) -> parallax_core::Result<()> {
    // Clear pending key on any action except PendingG
    if action != Action::PendingG {
        app.clear_pending_key();
    }

    match action {
        Action::Quit => app.should_quit = true,
        Action::ScrollDown => app.scroll_down(),
        Action::ScrollUp => app.scroll_up(),
        Action::ScrollHalfPageDown => app.scroll_half_page_down(),
        Action::ScrollHalfPageUp => app.scroll_half_page_up(),
        Action::ScrollPageDown => app.scroll_page_down(),
        Action::ScrollPageUp => app.scroll_page_up(),
        Action::JumpToTop => app.jump_to_top(),
        Action::JumpToBottom => app.jump_to_bottom(),
        Action::PendingG => app.pending_key = Some('g'),
        Action::ToggleInspector => app.toggle_inspector(),
        Action::TogglePause => app.toggle_pause(),
        Action::StepFrame => app.step_frame(),
        Action::Replay => app.replay()?,
        Action::None => {}
    }
    Ok(())
}
