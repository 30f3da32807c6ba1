use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::dispatch::api::{ApiRequest, ApiSettings};
use crate::dispatch::keyboard::KeyboardAction;
use crate::dispatch::media::MediaCommand;
use crate::dispatch::mouse::MouseAction;
use crate::types::{GestureGroup, DEFAULT_COOLDOWN};

/// Motivo por el que se rechaza una entrada de `gesture_actions`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryError {
    #[error("entry must be a JSON object")]
    NotAnObject,

    #[error("unknown action type `{0}`")]
    UnknownType(String),

    #[error("missing `action` command")]
    MissingAction,

    #[error("invalid keyboard command `{0}`")]
    InvalidKeyboard(String),

    #[error("invalid mouse command `{0}`")]
    InvalidMouse(String),

    #[error("unknown media command `{0}`")]
    UnknownMedia(String),

    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported HTTP method `{0}`")]
    InvalidMethod(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParam { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Keyboard,
    Mouse,
    Media,
    Api,
    Plugin,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Keyboard => "keyboard",
            ActionKind::Mouse => "mouse",
            ActionKind::Media => "media",
            ActionKind::Api => "api",
            ActionKind::Plugin => "plugin",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyboard" => Ok(ActionKind::Keyboard),
            "mouse" => Ok(ActionKind::Mouse),
            "media" => Ok(ActionKind::Media),
            "api" => Ok(ActionKind::Api),
            "plugin" | "custom" => Ok(ActionKind::Plugin),
            other => Err(EntryError::UnknownType(other.to_string())),
        }
    }
}

/// Acción ya interpretada, lista para ejecutarse
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Keyboard(KeyboardAction),
    Mouse(MouseAction),
    Media(MediaCommand),
    Api(ApiRequest),
    Plugin(String),
}

/// Enlace grupo de gesto → acción con efecto
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub group: GestureGroup,
    pub kind: ActionKind,
    pub command: String,
    pub description: String,
    pub params: BTreeMap<String, String>,
    pub action: Action,
    /// Sustituye el cooldown global para este grupo (`cooldown` en segundos)
    pub cooldown: Option<Duration>,
}

impl ActionBinding {
    pub fn new(
        group: impl Into<GestureGroup>,
        kind: ActionKind,
        command: impl Into<String>,
        params: BTreeMap<String, String>,
    ) -> Result<Self, EntryError> {
        Self::with_settings(group, kind, command, params, &ApiSettings::default())
    }

    /// Interpreta el comando según su tipo; falla si está mal formado
    pub fn with_settings(
        group: impl Into<GestureGroup>,
        kind: ActionKind,
        command: impl Into<String>,
        params: BTreeMap<String, String>,
        api: &ApiSettings,
    ) -> Result<Self, EntryError> {
        let command = command.into();
        let action = match kind {
            ActionKind::Keyboard => Action::Keyboard(KeyboardAction::parse(&command, &params)?),
            ActionKind::Mouse => Action::Mouse(MouseAction::parse(&command, &params)?),
            ActionKind::Media => Action::Media(command.parse()?),
            ActionKind::Api => Action::Api(ApiRequest::parse(&command, &params, api)?),
            ActionKind::Plugin => {
                let name = command.trim();
                if name.is_empty() {
                    return Err(EntryError::MissingAction);
                }
                Action::Plugin(name.to_string())
            }
        };
        let cooldown = parse_cooldown(&params)?;

        Ok(Self {
            group: group.into(),
            kind,
            command,
            description: String::new(),
            params,
            action,
            cooldown,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

fn parse_cooldown(params: &BTreeMap<String, String>) -> Result<Option<Duration>, EntryError> {
    let Some(raw) = params.get("cooldown") else {
        return Ok(None);
    };
    let secs: f32 = raw.trim().parse().map_err(|_| EntryError::InvalidParam {
        name: "cooldown".to_string(),
        reason: format!("`{}` is not a number of seconds", raw),
    })?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(EntryError::InvalidParam {
            name: "cooldown".to_string(),
            reason: format!("must be non-negative, got {}", secs),
        });
    }
    Ok(Some(Duration::from_secs_f32(secs)))
}

/// Resumen de un enlace para listados (`describe`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub action: String,
    pub description: String,
}

/// Conjunto inmutable de enlaces; se reemplaza entero en cada recarga
#[derive(Debug, Clone)]
pub struct BindingTable {
    bindings: HashMap<GestureGroup, Arc<ActionBinding>>,
    default_cooldown: Duration,
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl BindingTable {
    pub fn new(default_cooldown: Duration) -> Self {
        Self {
            bindings: HashMap::new(),
            default_cooldown,
        }
    }

    /// Añade o sustituye el enlace de su grupo
    pub fn insert(&mut self, binding: ActionBinding) {
        self.bindings
            .insert(binding.group.clone(), Arc::new(binding));
    }

    pub fn get(&self, group: &str) -> Option<Arc<ActionBinding>> {
        self.bindings.get(group).cloned()
    }

    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Cooldown efectivo para un enlace
    pub fn cooldown_for(&self, binding: &ActionBinding) -> Duration {
        binding.cooldown.unwrap_or(self.default_cooldown)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ActionBinding>> {
        self.bindings.values()
    }
}

/// Almacén de enlaces con recarga atómica.
///
/// `resolve` toma una instantánea (`Arc`) de la tabla vigente, así que una
/// recarga concurrente sólo puede verse completa o no verse.
pub struct BindingStore {
    current: RwLock<Arc<BindingTable>>,
}

impl BindingStore {
    pub fn new(table: BindingTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn resolve(&self, group: &GestureGroup) -> Option<Arc<ActionBinding>> {
        let binding = self.snapshot().get(group.as_str());
        if binding.is_none() {
            debug!(group = %group, "grupo sin acción configurada");
        }
        binding
    }

    /// Tabla vigente
    pub fn snapshot(&self) -> Arc<BindingTable> {
        Arc::clone(&self.current.read())
    }

    /// Sustituye la tabla completa y devuelve la anterior
    pub fn reload(&self, table: BindingTable) -> Arc<BindingTable> {
        let next = Arc::new(table);
        std::mem::replace(&mut *self.current.write(), next)
    }

    pub fn describe(&self) -> BTreeMap<String, ActionSummary> {
        self.snapshot()
            .iter()
            .map(|binding| {
                (
                    binding.group.to_string(),
                    ActionSummary {
                        kind: binding.kind,
                        action: binding.command.clone(),
                        description: binding.description.clone(),
                    },
                )
            })
            .collect()
    }
}

impl Default for BindingStore {
    fn default() -> Self {
        Self::new(BindingTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn keyboard(group: &str, command: &str) -> ActionBinding {
        ActionBinding::new(group, ActionKind::Keyboard, command, BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Keyboard".parse::<ActionKind>().unwrap(), ActionKind::Keyboard);
        assert_eq!("custom".parse::<ActionKind>().unwrap(), ActionKind::Plugin);
        assert_eq!(
            "teleport".parse::<ActionKind>(),
            Err(EntryError::UnknownType("teleport".to_string()))
        );
    }

    #[test]
    fn test_unbound_group_resolves_to_none() {
        let store = BindingStore::default();
        assert!(store.resolve(&GestureGroup::new("ok_group")).is_none());
    }

    #[test]
    fn test_cooldown_param() {
        let mut params = BTreeMap::new();
        params.insert("cooldown".to_string(), "2.5".to_string());
        let binding =
            ActionBinding::new("ok_group", ActionKind::Keyboard, "enter", params).unwrap();
        assert_eq!(binding.cooldown, Some(Duration::from_millis(2500)));

        let mut params = BTreeMap::new();
        params.insert("cooldown".to_string(), "-1".to_string());
        assert!(matches!(
            ActionBinding::new("ok_group", ActionKind::Keyboard, "enter", params),
            Err(EntryError::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_plugin_requires_name() {
        assert_eq!(
            ActionBinding::new("ok_group", ActionKind::Plugin, "  ", BTreeMap::new()),
            Err(EntryError::MissingAction)
        );
    }

    #[test]
    fn test_reload_swaps_whole_table() {
        let mut old = BindingTable::default();
        old.insert(keyboard("ok_group", "enter"));
        old.insert(keyboard("fist_group", "ctrl+c"));
        let store = BindingStore::new(old);

        let mut new = BindingTable::default();
        new.insert(keyboard("palm_group", "space"));
        let previous = store.reload(new);

        assert_eq!(previous.len(), 2);
        assert!(store.resolve(&GestureGroup::new("ok_group")).is_none());
        assert_eq!(
            store.resolve(&GestureGroup::new("palm_group")).unwrap().command,
            "space"
        );
    }

    #[test]
    fn test_concurrent_resolve_never_sees_mixed_table() {
        fn table(tag: &str) -> BindingTable {
            let mut table = BindingTable::default();
            table.insert(keyboard("ok_group", tag));
            table.insert(keyboard("fist_group", tag));
            table
        }

        let store = Arc::new(BindingStore::new(table("a")));
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..2_000 {
                    store.reload(table(if i % 2 == 0 { "b" } else { "a" }));
                }
            })
        };

        for _ in 0..2_000 {
            let snapshot = store.snapshot();
            let ok = snapshot.get("ok_group").unwrap();
            let fist = snapshot.get("fist_group").unwrap();
            assert_eq!(ok.command, fist.command);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_describe_lists_bindings() {
        let mut table = BindingTable::default();
        table.insert(keyboard("ok_group", "enter").with_description("Confirmar"));
        let store = BindingStore::new(table);

        let listing = store.describe();
        let summary = &listing["ok_group"];
        assert_eq!(summary.kind, ActionKind::Keyboard);
        assert_eq!(summary.action, "enter");
        assert_eq!(summary.description, "Confirmar");
    }
}
