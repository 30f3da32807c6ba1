use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uinput::device::Device;
use uinput::event::controller;
use uinput::event::keyboard;
use uinput::event::relative;

/// Tiempo que se mantiene pulsada una tecla o botón
const HOLD: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum HidError {
    #[error("uinput error: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("key {0:?} has no HID equivalent")]
    Unmappable(KeyCode),
}

/// Teclas que el despachador sabe emitir (distribución US)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Carácter base sin shift: a-z, 0-9 y puntuación `-=[];'\`\\,./`
    Char(char),
    Ctrl,
    Alt,
    Shift,
    Space,
    Enter,
    Tab,
    Esc,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// F1..F12
    F(u8),
    PlayPause,
    StopMedia,
    NextTrack,
    PrevTrack,
    VolumeUp,
    VolumeDown,
    Mute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Evento de entrada emitido hacia el sistema operativo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Press(KeyCode),
    Release(KeyCode),
    Button(MouseButton, bool),
    Move(i32, i32),
    Scroll(i32),
}

/// Destino de los eventos de teclado y ratón
pub trait InputSink: Send {
    fn press(&mut self, key: KeyCode) -> Result<(), HidError>;
    fn release(&mut self, key: KeyCode) -> Result<(), HidError>;
    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<(), HidError>;
    /// Mueve el cursor en relación a su posición actual (dx, dy en píxeles)
    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<(), HidError>;
    /// Positivo hacia arriba
    fn scroll(&mut self, amount: i32) -> Result<(), HidError>;

    fn tap(&mut self, key: KeyCode) -> Result<(), HidError> {
        self.press(key)?;
        self.release(key)
    }

    fn click(&mut self, button: MouseButton) -> Result<(), HidError> {
        self.button(button, true)?;
        self.button(button, false)
    }
}

/// Sink compartido entre los manejadores de teclado, ratón y multimedia
pub type SharedSink = Arc<Mutex<Box<dyn InputSink>>>;

pub fn shared(sink: impl InputSink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

/// Dispositivo HID virtual sobre /dev/uinput
pub struct HidOutput {
    dev: Device,
}

impl HidOutput {
    pub fn new() -> Result<Self, HidError> {
        let dev = uinput::open("/dev/uinput")?
            .name("gesture-intent-hid")?
            .event(uinput::event::Keyboard::All)?
            .event(uinput::event::Controller::Mouse(controller::Mouse::Left))?
            .event(uinput::event::Controller::Mouse(controller::Mouse::Right))?
            .event(uinput::event::Controller::Mouse(controller::Mouse::Middle))?
            .event(uinput::event::Relative::Position(relative::Position::X))?
            .event(uinput::event::Relative::Position(relative::Position::Y))?
            .event(uinput::event::Relative::Wheel(relative::Wheel::Vertical))?
            .create()?;

        Ok(HidOutput { dev })
    }

    fn sync(&mut self) -> Result<(), HidError> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn mouse(button: MouseButton) -> controller::Controller {
        let mouse = match button {
            MouseButton::Left => controller::Mouse::Left,
            MouseButton::Right => controller::Mouse::Right,
            MouseButton::Middle => controller::Mouse::Middle,
        };
        controller::Controller::Mouse(mouse)
    }
}

impl InputSink for HidOutput {
    fn press(&mut self, key: KeyCode) -> Result<(), HidError> {
        let event = uinput_key(key)?;
        self.dev.press(&event)?;
        self.sync()
    }

    fn release(&mut self, key: KeyCode) -> Result<(), HidError> {
        let event = uinput_key(key)?;
        self.dev.release(&event)?;
        self.sync()
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<(), HidError> {
        let event = Self::mouse(button);
        if pressed {
            self.dev.press(&event)?;
        } else {
            self.dev.release(&event)?;
        }
        self.sync()
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<(), HidError> {
        self.dev.send(relative::Position::X, dx)?;
        self.dev.send(relative::Position::Y, dy)?;
        self.sync()
    }

    fn scroll(&mut self, amount: i32) -> Result<(), HidError> {
        self.dev.send(relative::Wheel::Vertical, amount)?;
        self.sync()
    }

    fn tap(&mut self, key: KeyCode) -> Result<(), HidError> {
        self.press(key)?;
        std::thread::sleep(HOLD);
        self.release(key)
    }

    fn click(&mut self, button: MouseButton) -> Result<(), HidError> {
        self.button(button, true)?;
        std::thread::sleep(HOLD);
        self.button(button, false)
    }
}

fn uinput_key(key: KeyCode) -> Result<keyboard::Keyboard, HidError> {
    use keyboard::Key as K;
    use keyboard::Keyboard::{Key, Misc};
    use keyboard::Misc as M;

    let event = match key {
        KeyCode::Char(c) => Key(char_key(c).ok_or(HidError::Unmappable(key))?),
        KeyCode::Ctrl => Key(K::LeftControl),
        KeyCode::Alt => Key(K::LeftAlt),
        KeyCode::Shift => Key(K::LeftShift),
        KeyCode::Space => Key(K::Space),
        KeyCode::Enter => Key(K::Enter),
        KeyCode::Tab => Key(K::Tab),
        KeyCode::Esc => Key(K::Esc),
        KeyCode::Backspace => Key(K::BackSpace),
        KeyCode::Delete => Key(K::Delete),
        KeyCode::Up => Key(K::Up),
        KeyCode::Down => Key(K::Down),
        KeyCode::Left => Key(K::Left),
        KeyCode::Right => Key(K::Right),
        KeyCode::Home => Key(K::Home),
        KeyCode::End => Key(K::End),
        KeyCode::PageUp => Key(K::PageUp),
        KeyCode::PageDown => Key(K::PageDown),
        KeyCode::F(n) => Key(match n {
            1 => K::F1,
            2 => K::F2,
            3 => K::F3,
            4 => K::F4,
            5 => K::F5,
            6 => K::F6,
            7 => K::F7,
            8 => K::F8,
            9 => K::F9,
            10 => K::F10,
            11 => K::F11,
            12 => K::F12,
            _ => return Err(HidError::Unmappable(key)),
        }),
        KeyCode::PlayPause => Misc(M::PlayPause),
        KeyCode::StopMedia => Misc(M::StopCD),
        KeyCode::NextTrack => Misc(M::NextSong),
        KeyCode::PrevTrack => Misc(M::PreviousSong),
        KeyCode::VolumeUp => Misc(M::VolumeUp),
        KeyCode::VolumeDown => Misc(M::VolumeDown),
        KeyCode::Mute => Misc(M::Mute),
    };
    Ok(event)
}

fn char_key(c: char) -> Option<keyboard::Key> {
    use keyboard::Key as K;

    let key = match c {
        'a' => K::A,
        'b' => K::B,
        'c' => K::C,
        'd' => K::D,
        'e' => K::E,
        'f' => K::F,
        'g' => K::G,
        'h' => K::H,
        'i' => K::I,
        'j' => K::J,
        'k' => K::K,
        'l' => K::L,
        'm' => K::M,
        'n' => K::N,
        'o' => K::O,
        'p' => K::P,
        'q' => K::Q,
        'r' => K::R,
        's' => K::S,
        't' => K::T,
        'u' => K::U,
        'v' => K::V,
        'w' => K::W,
        'x' => K::X,
        'y' => K::Y,
        'z' => K::Z,
        '1' => K::_1,
        '2' => K::_2,
        '3' => K::_3,
        '4' => K::_4,
        '5' => K::_5,
        '6' => K::_6,
        '7' => K::_7,
        '8' => K::_8,
        '9' => K::_9,
        '0' => K::_0,
        '-' => K::Minus,
        '=' => K::Equal,
        '[' => K::LeftBrace,
        ']' => K::RightBrace,
        ';' => K::SemiColon,
        '\'' => K::Apostrophe,
        '`' => K::Grave,
        '\\' => K::BackSlash,
        ',' => K::Comma,
        '.' => K::Dot,
        '/' => K::Slash,
        _ => return None,
    };
    Some(key)
}

/// Sink que sólo registra los eventos; para `--dry-run` y para tests
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    /// Vacía y devuelve los eventos registrados
    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: InputEvent) -> Result<(), HidError> {
        self.events.lock().push(event);
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn press(&mut self, key: KeyCode) -> Result<(), HidError> {
        self.push(InputEvent::Press(key))
    }

    fn release(&mut self, key: KeyCode) -> Result<(), HidError> {
        self.push(InputEvent::Release(key))
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<(), HidError> {
        self.push(InputEvent::Button(button, pressed))
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<(), HidError> {
        self.push(InputEvent::Move(dx, dy))
    }

    fn scroll(&mut self, amount: i32) -> Result<(), HidError> {
        self.push(InputEvent::Scroll(amount))
    }
}

/// Sink de `--dry-run`: escribe cada evento en el log y no toca /dev/uinput
#[derive(Debug, Default)]
pub struct LogSink;

impl InputSink for LogSink {
    fn press(&mut self, key: KeyCode) -> Result<(), HidError> {
        info!("⌨️  press {:?}", key);
        Ok(())
    }

    fn release(&mut self, key: KeyCode) -> Result<(), HidError> {
        debug!("release {:?}", key);
        Ok(())
    }

    fn button(&mut self, button: MouseButton, pressed: bool) -> Result<(), HidError> {
        if pressed {
            info!("🖱️  botón {:?}", button);
        }
        Ok(())
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) -> Result<(), HidError> {
        info!("🖱️  mover ({}, {})", dx, dy);
        Ok(())
    }

    fn scroll(&mut self, amount: i32) -> Result<(), HidError> {
        info!("🖱️  scroll {}", amount);
        Ok(())
    }
}
