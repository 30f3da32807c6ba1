use std::collections::BTreeMap;

use super::{ActionHandler, DispatchContext, DispatchError};
use crate::bindings::{Action, ActionBinding, EntryError};
use crate::hid::{InputSink, MouseButton, SharedSink};

/// Desplazamiento suficiente para llevar el cursor a la esquina superior izquierda
const HOME_TRAVEL: i32 = 16_384;
const DEFAULT_SCROLL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MouseAction {
    Click(MouseButton),
    DoubleClick,
    /// Posición absoluta en píxeles
    MoveTo(i32, i32),
    MoveBy(i32, i32),
    /// Positivo hacia arriba
    Scroll(i32),
}

impl MouseAction {
    /// `left_click`, `double_click`, `move_100_200`, `move_by_-10_5`,
    /// `scroll_up`, `scroll_down_5` (o parámetro `amount`)
    pub fn parse(command: &str, params: &BTreeMap<String, String>) -> Result<Self, EntryError> {
        let command = command.trim().to_lowercase();
        let invalid = || EntryError::InvalidMouse(command.clone());

        let action = match command.as_str() {
            "" => return Err(EntryError::MissingAction),
            "left_click" | "click" => MouseAction::Click(MouseButton::Left),
            "right_click" => MouseAction::Click(MouseButton::Right),
            "middle_click" => MouseAction::Click(MouseButton::Middle),
            "double_click" => MouseAction::DoubleClick,
            _ => {
                if let Some(rest) = command.strip_prefix("move_by_") {
                    let (dx, dy) = parse_pair(rest).ok_or_else(invalid)?;
                    MouseAction::MoveBy(dx, dy)
                } else if let Some(rest) = command.strip_prefix("move_") {
                    let (x, y) = parse_pair(rest).ok_or_else(invalid)?;
                    if x < 0 || y < 0 {
                        return Err(invalid());
                    }
                    MouseAction::MoveTo(x, y)
                } else if let Some(rest) = command.strip_prefix("scroll_") {
                    let (direction, inline) = match rest.split_once('_') {
                        Some((direction, amount)) => {
                            (direction, Some(amount.parse::<i32>().map_err(|_| invalid())?))
                        }
                        None => (rest, None),
                    };
                    let amount = match (inline, params.get("amount")) {
                        (Some(amount), _) => amount,
                        (None, Some(raw)) => {
                            raw.trim().parse().map_err(|_| EntryError::InvalidParam {
                                name: "amount".to_string(),
                                reason: format!("`{}` is not an integer", raw),
                            })?
                        }
                        (None, None) => DEFAULT_SCROLL,
                    };
                    match direction {
                        "up" => MouseAction::Scroll(amount.abs()),
                        "down" => MouseAction::Scroll(-amount.abs()),
                        _ => return Err(invalid()),
                    }
                } else {
                    return Err(invalid());
                }
            }
        };
        Ok(action)
    }

    pub fn perform(&self, sink: &mut dyn InputSink) -> Result<String, DispatchError> {
        match self {
            MouseAction::Click(button) => {
                sink.click(*button)?;
                Ok(format!("click {:?}", button))
            }
            MouseAction::DoubleClick => {
                sink.click(MouseButton::Left)?;
                sink.click(MouseButton::Left)?;
                Ok("doble click".to_string())
            }
            MouseAction::MoveTo(x, y) => {
                sink.move_cursor(-HOME_TRAVEL, -HOME_TRAVEL)?;
                sink.move_cursor(*x, *y)?;
                Ok(format!("cursor a ({}, {})", x, y))
            }
            MouseAction::MoveBy(dx, dy) => {
                sink.move_cursor(*dx, *dy)?;
                Ok(format!("cursor desplazado ({}, {})", dx, dy))
            }
            MouseAction::Scroll(amount) => {
                sink.scroll(*amount)?;
                Ok(format!("scroll {}", amount))
            }
        }
    }
}

fn parse_pair(rest: &str) -> Option<(i32, i32)> {
    let (a, b) = rest.split_once('_')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

/// Manejador del tipo `mouse`
pub struct MouseHandler {
    sink: SharedSink,
}

impl MouseHandler {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

impl ActionHandler for MouseHandler {
    fn handle(&self, binding: &ActionBinding, _ctx: &DispatchContext) -> Result<String, DispatchError> {
        let Action::Mouse(action) = &binding.action else {
            return Err(DispatchError::KindMismatch {
                expected: "mouse",
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

    fn parse(command: &str) -> Result<MouseAction, EntryError> {
        MouseAction::parse(command, &BTreeMap::new())
    }

    #[test]
    fn test_parse_clicks() {
        assert_eq!(parse("left_click").unwrap(), MouseAction::Click(MouseButton::Left));
        assert_eq!(parse("Right_Click").unwrap(), MouseAction::Click(MouseButton::Right));
        assert_eq!(parse("double_click").unwrap(), MouseAction::DoubleClick);
    }

    #[test]
    fn test_parse_moves() {
        assert_eq!(parse("move_100_200").unwrap(), MouseAction::MoveTo(100, 200));
        assert_eq!(parse("move_by_-10_5").unwrap(), MouseAction::MoveBy(-10, 5));
        assert!(parse("move_-1_5").is_err());
        assert!(parse("move_10").is_err());
    }

    #[test]
    fn test_parse_scroll() {
        assert_eq!(parse("scroll_up").unwrap(), MouseAction::Scroll(3));
        assert_eq!(parse("scroll_down_5").unwrap(), MouseAction::Scroll(-5));

        let mut params = BTreeMap::new();
        params.insert("amount".to_string(), "2".to_string());
        assert_eq!(
            MouseAction::parse("scroll_down", &params).unwrap(),
            MouseAction::Scroll(-2)
        );
        assert!(parse("scroll_sideways").is_err());
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert_eq!(
            parse("wiggle"),
            Err(EntryError::InvalidMouse("wiggle".to_string()))
        );
    }

    #[test]
    fn test_move_to_homes_cursor_first() {
        let recorder = RecordingSink::new();
        let mut sink = recorder.clone();
        parse("move_40_30").unwrap().perform(&mut sink).unwrap();
        assert_eq!(
            recorder.events(),
            vec![
                InputEvent::Move(-HOME_TRAVEL, -HOME_TRAVEL),
                InputEvent::Move(40, 30),
            ]
        );
    }
}
