use crossbeam_channel::Sender;
use evdev::{Device, InputEventKind, Key};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Órdenes del usuario al daemon, independientes de los gestos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    Disable,
    Enable,
    ReloadConfig,
    ShowMetrics,
}

impl ControlEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlEvent::Disable => "disable",
            ControlEvent::Enable => "enable",
            ControlEvent::ReloadConfig => "reload_config",
            ControlEvent::ShowMetrics => "show_metrics",
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown control event `{0}`")]
pub struct UnknownControl(pub String);

impl FromStr for ControlEvent {
    type Err = UnknownControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disable" | "disable_actions" => Ok(ControlEvent::Disable),
            "enable" | "enable_actions" => Ok(ControlEvent::Enable),
            "reload" | "reload_config" => Ok(ControlEvent::ReloadConfig),
            "metrics" | "show_metrics" => Ok(ControlEvent::ShowMetrics),
            other => Err(UnknownControl(other.to_string())),
        }
    }
}

/// F9 deshabilita, F10 habilita, F5 recarga, F12 muestra métricas
pub fn hotkey_event(key: Key) -> Option<ControlEvent> {
    match key {
        Key::KEY_F9 => Some(ControlEvent::Disable),
        Key::KEY_F10 => Some(ControlEvent::Enable),
        Key::KEY_F5 => Some(ControlEvent::ReloadConfig),
        Key::KEY_F12 => Some(ControlEvent::ShowMetrics),
        _ => None,
    }
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("cannot scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no keyboard device found in {0}")]
    NoKeyboard(PathBuf),
}

/// Busca el primer teclado en `/dev/input/event*`
pub fn find_keyboard(dir: &Path) -> Result<(Device, PathBuf), ControlError> {
    let entries = fs::read_dir(dir).map_err(|source| ControlError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    for path in paths {
        let Ok(device) = Device::open(&path) else {
            continue;
        };
        let name = device.name().unwrap_or_default().to_lowercase();
        if name.contains("keyboard") || name.contains("at translated") {
            info!("⌨️  Teclado encontrado: {} ({})", name, path.display());
            return Ok((device, path));
        }
    }

    Err(ControlError::NoKeyboard(dir.to_path_buf()))
}

/// Escucha las teclas de control en un hilo propio hasta que el receptor
/// desaparezca o el dispositivo falle.
pub fn spawn_hotkey_listener(tx: Sender<ControlEvent>) -> Result<JoinHandle<()>, ControlError> {
    let (mut device, path) = find_keyboard(Path::new("/dev/input"))?;
    info!("🎧 Teclas de control: F9 deshabilitar, F10 habilitar, F5 recargar, F12 métricas");

    let handle = thread::spawn(move || loop {
        let events = match device.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                warn!(device = %path.display(), error = %e, "lectura de teclado fallida");
                return;
            }
        };
        for ev in events {
            let InputEventKind::Key(key) = ev.kind() else {
                continue;
            };
            if ev.value() != 1 {
                continue;
            }
            if let Some(event) = hotkey_event(key) {
                debug!(?key, %event, "tecla de control");
                if tx.send(event).is_err() {
                    return;
                }
            }
        }
    });
    Ok(handle)
}
