//! Translation of inbound control signals into the canonical event
//! vocabulary. Every source funnels into [`TransportCommand`]; duplicate
//! delivery of one physical press is acceptable here, the player
//! deduplicates on its side.

use crate::model::ControlEvent;

/// Intent action strings broadcast by the notification buttons.
pub const ACTION_PLAY: &str = "ACTION_PLAY";
pub const ACTION_PAUSE: &str = "ACTION_PAUSE";
pub const ACTION_NEXT: &str = "ACTION_NEXT";
pub const ACTION_PREVIOUS: &str = "ACTION_PREVIOUS";

/// Hardware media keys the bridge understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    Next,
    Previous,
}

/// Key transition of a hardware media key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

/// Transport command entering the session, whatever the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Seek { position_ms: u64 },
}

/// Translates a hardware key event. Only the key-down transition is acted
/// on, the matching key-up is ignored.
pub fn translate_media_key(key: MediaKey, action: KeyAction) -> Option<TransportCommand> {
    if action != KeyAction::Down {
        return None;
    }
    let command = match key {
        MediaKey::PlayPause => TransportCommand::TogglePlayPause,
        MediaKey::Next => TransportCommand::Next,
        MediaKey::Previous => TransportCommand::Previous,
    };
    Some(command)
}

/// Translates a notification or intent action string. Unknown actions are
/// `None`, never an error.
pub fn translate_action(action: &str) -> Option<TransportCommand> {
    match action {
        ACTION_PLAY => Some(TransportCommand::Play),
        ACTION_PAUSE => Some(TransportCommand::Pause),
        ACTION_NEXT => Some(TransportCommand::Next),
        ACTION_PREVIOUS => Some(TransportCommand::Previous),
        _ => None,
    }
}

/// Resolves a command against the current playing flag. The play-pause
/// toggle becomes the opposite of the current state, everything else maps
/// one to one.
pub fn resolve_command(command: TransportCommand, is_playing: bool) -> ControlEvent {
    match command {
        TransportCommand::Play => ControlEvent::Play,
        TransportCommand::Pause => ControlEvent::Pause,
        TransportCommand::TogglePlayPause => {
            if is_playing {
                ControlEvent::Pause
            } else {
                ControlEvent::Play
            }
        }
        TransportCommand::Next => ControlEvent::Next,
        TransportCommand::Previous => ControlEvent::Previous,
        TransportCommand::Seek { position_ms } => ControlEvent::Seek { position_ms },
    }
}
