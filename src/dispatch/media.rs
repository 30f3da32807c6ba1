use std::str::FromStr;

use super::{ActionHandler, DispatchContext, DispatchError};
use crate::bindings::{Action, ActionBinding, EntryError};
use crate::hid::{KeyCode, SharedSink};

/// Control multimedia, emitido como tecla multimedia del sistema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    PlayPause,
    Stop,
    NextTrack,
    PrevTrack,
    VolumeUp,
    VolumeDown,
    Mute,
}

impl MediaCommand {
    pub fn key(&self) -> KeyCode {
        match self {
            MediaCommand::PlayPause => KeyCode::PlayPause,
            MediaCommand::Stop => KeyCode::StopMedia,
            MediaCommand::NextTrack => KeyCode::NextTrack,
            MediaCommand::PrevTrack => KeyCode::PrevTrack,
            MediaCommand::VolumeUp => KeyCode::VolumeUp,
            MediaCommand::VolumeDown => KeyCode::VolumeDown,
            MediaCommand::Mute => KeyCode::Mute,
        }
    }
}

impl FromStr for MediaCommand {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s.trim().to_lowercase().as_str() {
            "" => return Err(EntryError::MissingAction),
            "play_pause" | "play" | "pause" => MediaCommand::PlayPause,
            "stop" => MediaCommand::Stop,
            "next_track" | "next" => MediaCommand::NextTrack,
            "prev_track" | "previous_track" | "previous" => MediaCommand::PrevTrack,
            "volume_up" => MediaCommand::VolumeUp,
            "volume_down" => MediaCommand::VolumeDown,
            "volume_mute" | "mute" => MediaCommand::Mute,
            other => return Err(EntryError::UnknownMedia(other.to_string())),
        };
        Ok(command)
    }
}

/// Manejador del tipo `media`
pub struct MediaHandler {
    sink: SharedSink,
}

impl MediaHandler {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

impl ActionHandler for MediaHandler {
    fn handle(&self, binding: &ActionBinding, _ctx: &DispatchContext) -> Result<String, DispatchError> {
        let Action::Media(command) = &binding.action else {
            return Err(DispatchError::KindMismatch {
                expected: "media",
                group: binding.group.to_string(),
            });
        };
        self.sink.lock().tap(command.key())?;
        Ok(format!("multimedia {:?}", command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::ActionKind;
    use crate::hid::{shared, InputEvent, RecordingSink};
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("play_pause".parse::<MediaCommand>().unwrap(), MediaCommand::PlayPause);
        assert_eq!("previous_track".parse::<MediaCommand>().unwrap(), MediaCommand::PrevTrack);
        assert_eq!("Volume_Mute".parse::<MediaCommand>().unwrap(), MediaCommand::Mute);
        assert_eq!(
            "rewind".parse::<MediaCommand>(),
            Err(EntryError::UnknownMedia("rewind".to_string()))
        );
    }

    #[test]
    fn test_handler_taps_media_key() {
        let recorder = RecordingSink::new();
        let handler = MediaHandler::new(shared(recorder.clone()));
        let binding =
            ActionBinding::new("palm_group", ActionKind::Media, "volume_up", BTreeMap::new())
                .unwrap();

        handler.handle(&binding, &DispatchContext::default()).unwrap();
        assert_eq!(
            recorder.events(),
            vec![
                InputEvent::Press(KeyCode::VolumeUp),
                InputEvent::Release(KeyCode::VolumeUp),
            ]
        );
    }

    #[test]
    fn test_handler_rejects_other_kinds() {
        let handler = MediaHandler::new(shared(RecordingSink::new()));
        let binding =
            ActionBinding::new("palm_group", ActionKind::Keyboard, "enter", BTreeMap::new())
                .unwrap();
        assert!(matches!(
            handler.handle(&binding, &DispatchContext::default()),
            Err(DispatchError::KindMismatch { expected: "media", .. })
        ));
    }
}
