use std::collections::BTreeMap;

use super::{ActionHandler, DispatchContext, DispatchError};
use crate::bindings::{Action, ActionBinding, EntryError};
use crate::hid::{InputSink, KeyCode, SharedSink};

/// Acción de teclado: tecla suelta, combinación o texto literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardAction {
    Tap(KeyCode),
    /// Se pulsan en orden y se sueltan en orden inverso
    Chord(Vec<KeyCode>),
    Text(String),
}

impl KeyboardAction {
    /// `enter`, `ctrl+c`, `a`, `hola mundo`; el parámetro `text` fuerza texto
    pub fn parse(command: &str, params: &BTreeMap<String, String>) -> Result<Self, EntryError> {
        if let Some(text) = params.get("text") {
            return Self::text(text);
        }

        let command = command.trim();
        if command.is_empty() {
            return Err(EntryError::MissingAction);
        }

        if command.len() > 1 && command.contains('+') {
            let mut keys = Vec::new();
            for part in command.split('+') {
                let part = part.trim();
                if let Some(key) = named_key(part) {
                    keys.push(key);
                    continue;
                }
                let mut chars = part.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        let (key, shift) = char_chord(c)
                            .ok_or_else(|| EntryError::InvalidKeyboard(command.to_string()))?;
                        if shift && !keys.contains(&KeyCode::Shift) {
                            keys.push(KeyCode::Shift);
                        }
                        keys.push(key);
                    }
                    _ => return Err(EntryError::InvalidKeyboard(command.to_string())),
                }
            }
            return Ok(KeyboardAction::Chord(keys));
        }

        if let Some(key) = named_key(command) {
            return Ok(KeyboardAction::Tap(key));
        }

        let mut chars = command.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match char_chord(c) {
                Some((key, false)) => Ok(KeyboardAction::Tap(key)),
                Some((key, true)) => Ok(KeyboardAction::Chord(vec![KeyCode::Shift, key])),
                None => Err(EntryError::InvalidKeyboard(command.to_string())),
            };
        }

        Self::text(command)
    }

    fn text(text: &str) -> Result<Self, EntryError> {
        if text.is_empty() || text.chars().any(|c| char_chord(c).is_none()) {
            return Err(EntryError::InvalidKeyboard(text.to_string()));
        }
        Ok(KeyboardAction::Text(text.to_string()))
    }

    pub fn perform(&self, sink: &mut dyn InputSink) -> Result<String, DispatchError> {
        match self {
            KeyboardAction::Tap(key) => {
                sink.tap(*key)?;
                Ok(format!("tecla {:?}", key))
            }
            KeyboardAction::Chord(keys) => {
                press_chord(sink, keys)?;
                Ok(format!("combinación {:?}", keys))
            }
            KeyboardAction::Text(text) => {
                for c in text.chars() {
                    // Validado en parse
                    let Some((key, shift)) = char_chord(c) else {
                        continue;
                    };
                    if shift {
                        press_chord(sink, &[KeyCode::Shift, key])?;
                    } else {
                        sink.tap(key)?;
                    }
                }
                Ok(format!("texto {:?}", text))
            }
        }
    }
}

/// Pulsa todas las teclas y las suelta en orden inverso. Si una pulsación
/// falla se sueltan las ya pulsadas para no dejar modificadores enganchados.
fn press_chord(sink: &mut dyn InputSink, keys: &[KeyCode]) -> Result<(), DispatchError> {
    for (idx, key) in keys.iter().enumerate() {
        if let Err(e) = sink.press(*key) {
            for pressed in keys[..idx].iter().rev() {
                let _ = sink.release(*pressed);
            }
            return Err(e.into());
        }
    }
    for key in keys.iter().rev() {
        sink.release(*key)?;
    }
    Ok(())
}

fn named_key(name: &str) -> Option<KeyCode> {
    let key = match name.to_lowercase().as_str() {
        "ctrl" | "control" => KeyCode::Ctrl,
        "alt" => KeyCode::Alt,
        "shift" => KeyCode::Shift,
        "space" => KeyCode::Space,
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "esc" | "escape" => KeyCode::Esc,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "page_up" | "pageup" => KeyCode::PageUp,
        "page_down" | "pagedown" => KeyCode::PageDown,
        other => {
            let n: u8 = other.strip_prefix('f')?.parse().ok()?;
            if (1..=12).contains(&n) {
                KeyCode::F(n)
            } else {
                return None;
            }
        }
    };
    Some(key)
}

/// Tecla base y si necesita shift, según distribución US
fn char_chord(c: char) -> Option<(KeyCode, bool)> {
    let unshifted = match c {
        ' ' => return Some((KeyCode::Space, false)),
        '\n' => return Some((KeyCode::Enter, false)),
        '\t' => return Some((KeyCode::Tab, false)),
        'a'..='z' | '0'..='9' => return Some((KeyCode::Char(c), false)),
        'A'..='Z' => return Some((KeyCode::Char(c.to_ascii_lowercase()), true)),
        '-' | '=' | '[' | ']' | ';' | '\'' | '`' | '\\' | ',' | '.' | '/' => {
            return Some((KeyCode::Char(c), false))
        }
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        ':' => ';',
        '"' => '\'',
        '~' => '`',
        '|' => '\\',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        _ => return None,
    };
    Some((KeyCode::Char(unshifted), true))
}

/// Manejador del tipo `keyboard`
pub struct KeyboardHandler {
    sink: SharedSink,
}

impl KeyboardHandler {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

impl ActionHandler for KeyboardHandler {
    fn handle(&self, binding: &ActionBinding, _ctx: &DispatchContext) -> Result<String, DispatchError> {
        let Action::Keyboard(action) = &binding.action else {
            return Err(DispatchError::KindMismatch {
                expected: "keyboard",
                group: binding.group.to_string(),
            });
        };
        let mut sink = self.sink.lock();
        action.perform(&mut **sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::{InputEvent, RecordingSink};

    fn parse(command: &str) -> Result<KeyboardAction, EntryError> {
        KeyboardAction::parse(command, &BTreeMap::new())
    }

    #[test]
    fn test_parse_named_key_and_chord() {
        assert_eq!(parse("enter").unwrap(), KeyboardAction::Tap(KeyCode::Enter));
        assert_eq!(
            parse("ctrl+c").unwrap(),
            KeyboardAction::Chord(vec![KeyCode::Ctrl, KeyCode::Char('c')])
        );
        assert_eq!(
            parse("ctrl + shift + F5").unwrap(),
            KeyboardAction::Chord(vec![KeyCode::Ctrl, KeyCode::Shift, KeyCode::F(5)])
        );
    }

    #[test]
    fn test_parse_single_chars() {
        assert_eq!(parse("a").unwrap(), KeyboardAction::Tap(KeyCode::Char('a')));
        assert_eq!(
            parse("A").unwrap(),
            KeyboardAction::Chord(vec![KeyCode::Shift, KeyCode::Char('a')])
        );
        assert_eq!(
            parse("+").unwrap(),
            KeyboardAction::Chord(vec![KeyCode::Shift, KeyCode::Char('=')])
        );
    }

    #[test]
    fn test_parse_text_and_rejects() {
        assert_eq!(
            parse("Hola mundo").unwrap(),
            KeyboardAction::Text("Hola mundo".to_string())
        );
        assert!(matches!(parse("ctrl+banana"), Err(EntryError::InvalidKeyboard(_))));
        assert!(matches!(parse("ñandú"), Err(EntryError::InvalidKeyboard(_))));
        assert_eq!(parse("   "), Err(EntryError::MissingAction));
    }

    #[test]
    fn test_text_param_forces_literal() {
        let mut params = BTreeMap::new();
        params.insert("text".to_string(), "enter".to_string());
        assert_eq!(
            KeyboardAction::parse("ignored", &params).unwrap(),
            KeyboardAction::Text("enter".to_string())
        );
    }

    #[test]
    fn test_chord_releases_in_reverse() {
        let recorder = RecordingSink::new();
        let mut sink = recorder.clone();
        parse("ctrl+c").unwrap().perform(&mut sink).unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                InputEvent::Press(KeyCode::Ctrl),
                InputEvent::Press(KeyCode::Char('c')),
                InputEvent::Release(KeyCode::Char('c')),
                InputEvent::Release(KeyCode::Ctrl),
            ]
        );
    }

    #[test]
    fn test_text_uses_shift_for_uppercase() {
        let recorder = RecordingSink::new();
        let mut sink = recorder.clone();
        parse("Hi!").unwrap().perform(&mut sink).unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                InputEvent::Press(KeyCode::Shift),
                InputEvent::Press(KeyCode::Char('h')),
                InputEvent::Release(KeyCode::Char('h')),
                InputEvent::Release(KeyCode::Shift),
                InputEvent::Press(KeyCode::Char('i')),
                InputEvent::Release(KeyCode::Char('i')),
                InputEvent::Press(KeyCode::Shift),
                InputEvent::Press(KeyCode::Char('1')),
                InputEvent::Release(KeyCode::Char('1')),
                InputEvent::Release(KeyCode::Shift),
            ]
        );
    }
}
