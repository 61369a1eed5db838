use winit::keyboard::{Key, NamedKey};

use crate::events::{Action, Jump};

/// Fixed keyboard table; anything unlisted is ignored.
pub fn action_for(key: &Key) -> Option<Action> {
    match key {
        Key::Named(named) => match named {
            NamedKey::Space | NamedKey::ArrowRight => Some(Action::Next),
            NamedKey::ArrowLeft => Some(Action::Previous),
            NamedKey::Delete | NamedKey::Backspace => Some(Action::DeleteCurrent),
            NamedKey::Home => Some(Action::JumpTo(Jump::First)),
            NamedKey::End => Some(Action::JumpTo(Jump::Last)),
            NamedKey::Escape => Some(Action::Quit),
            _ => None,
        },
        Key::Character(text) => {
            let mut chars = text.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            match c.to_ascii_lowercase() {
                ' ' => Some(Action::Next),
                'i' => Some(Action::ToggleInfo),
                's' => Some(Action::ToggleScaling),
                'r' => Some(Action::ToggleShuffle),
                'f' => Some(Action::ToggleFullscreen),
                'q' => Some(Action::Quit),
                d @ '0'..='9' => Some(Action::SetAutoAdvance(d as u8 - b'0')),
                _ => None,
            }
        }
        _ => None,
    }
}
