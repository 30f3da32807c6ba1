//! Ejecución de acciones: un manejador por tipo de acción más un registro
//! abierto de plugins. Ningún error de acción sale de aquí como fallo fatal,
//! todo se pliega en un `DispatchResult`.

pub mod api;
pub mod keyboard;
pub mod media;
pub mod mouse;
pub mod plugin;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::bindings::{ActionBinding, ActionKind};
use crate::hid::{HidError, SharedSink};
use crate::types::ConfirmedIntent;

use self::api::ApiHandler;
use self::keyboard::KeyboardHandler;
use self::media::MediaHandler;
use self::mouse::MouseHandler;
use self::plugin::PluginRegistry;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("HID error: {0}")]
    Hid(#[from] HidError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("no plugin registered as `{0}`")]
    UnknownPlugin(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("plugin `{0}` panicked")]
    PluginPanicked(String),

    #[error("binding for `{group}` is not a {expected} action")]
    KindMismatch { expected: &'static str, group: String },
}

/// Resultado de ejecutar una acción
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub ok: bool,
    pub detail: String,
}

impl DispatchResult {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Datos del gesto que provocó la acción
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchContext {
    pub gesture: String,
    pub confidence: f32,
}

impl From<&ConfirmedIntent> for DispatchContext {
    fn from(intent: &ConfirmedIntent) -> Self {
        Self {
            gesture: intent.group.to_string(),
            confidence: intent.confidence,
        }
    }
}

/// Ejecutor de un tipo de acción
pub trait ActionHandler: Send + Sync {
    /// Devuelve una descripción breve de lo hecho
    fn handle(&self, binding: &ActionBinding, ctx: &DispatchContext) -> Result<String, DispatchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    Live,
    /// No se envían peticiones ni se invocan plugins, sólo se registran
    DryRun,
}

pub struct Dispatcher {
    keyboard: KeyboardHandler,
    mouse: MouseHandler,
    media: MediaHandler,
    api: ApiHandler,
    plugins: Arc<PluginRegistry>,
    mode: DispatchMode,
}

impl Dispatcher {
    pub fn new(sink: SharedSink, mode: DispatchMode) -> Result<Self, DispatchError> {
        Ok(Self {
            keyboard: KeyboardHandler::new(Arc::clone(&sink)),
            mouse: MouseHandler::new(Arc::clone(&sink)),
            media: MediaHandler::new(sink),
            api: ApiHandler::new()?,
            plugins: Arc::new(PluginRegistry::new()),
            mode,
        })
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    pub fn dispatch(&self, binding: &ActionBinding) -> DispatchResult {
        let ctx = DispatchContext {
            gesture: binding.group.to_string(),
            confidence: 0.0,
        };
        self.dispatch_with(binding, &ctx)
    }

    /// Ejecuta la acción una sola vez, sin reintentos
    pub fn dispatch_with(&self, binding: &ActionBinding, ctx: &DispatchContext) -> DispatchResult {
        let outcome = match (self.mode, binding.kind) {
            (DispatchMode::DryRun, ActionKind::Api | ActionKind::Plugin) => {
                Ok(format!("dry-run: {} `{}`", binding.kind, binding.command))
            }
            (_, ActionKind::Keyboard) => self.keyboard.handle(binding, ctx),
            (_, ActionKind::Mouse) => self.mouse.handle(binding, ctx),
            (_, ActionKind::Media) => self.media.handle(binding, ctx),
            (_, ActionKind::Api) => self.api.handle(binding, ctx),
            (_, ActionKind::Plugin) => self.plugins.handle(binding, ctx),
        };

        match outcome {
            Ok(detail) => {
                info!(group = %binding.group, kind = %binding.kind, "✅ {}", detail);
                DispatchResult::success(detail)
            }
            Err(e) => {
                warn!(group = %binding.group, kind = %binding.kind, error = %e, "acción fallida");
                DispatchResult::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::{shared, InputEvent, KeyCode, RecordingSink};
    use std::collections::BTreeMap;

    fn binding(kind: ActionKind, command: &str) -> ActionBinding {
        ActionBinding::new("ok_group", kind, command, BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_keyboard_dispatch_reaches_sink() {
        let recorder = RecordingSink::new();
        let dispatcher = Dispatcher::new(shared(recorder.clone()), DispatchMode::Live).unwrap();

        let result = dispatcher.dispatch(&binding(ActionKind::Keyboard, "enter"));
        assert!(result.ok, "{}", result.detail);
        assert_eq!(
            recorder.events(),
            vec![
                InputEvent::Press(KeyCode::Enter),
                InputEvent::Release(KeyCode::Enter)
            ]
        );
    }

    #[test]
    fn test_plugin_failure_folds_into_result() {
        let dispatcher =
            Dispatcher::new(shared(RecordingSink::new()), DispatchMode::Live).unwrap();
        let result = dispatcher.dispatch(&binding(ActionKind::Plugin, "missing"));
        assert!(!result.ok);
        assert!(result.detail.contains("missing"));
    }

    #[test]
    fn test_dry_run_skips_network_and_plugins() {
        let dispatcher =
            Dispatcher::new(shared(RecordingSink::new()), DispatchMode::DryRun).unwrap();
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&called);
        dispatcher.plugins().register_fn("lamp", move |_, _| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok("on".into())
        });

        assert!(dispatcher.dispatch(&binding(ActionKind::Plugin, "lamp")).ok);
        assert!(dispatcher.dispatch(&binding(ActionKind::Api, "http://127.0.0.1:9/x")).ok);
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }
}
