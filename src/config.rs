use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::bindings::{ActionBinding, ActionKind, BindingTable, EntryError};
use crate::confirmation::SmoothingParams;
use crate::dispatch::api::{ApiSettings, DEFAULT_BASE_URL};
use crate::grouping::GroupTable;
use crate::types::{DEFAULT_API_TIMEOUT, DEFAULT_COOLDOWN};

/// Claves de una entrada de `gesture_actions` que no van a `params`
const ENTRY_KEYS: [&str; 4] = ["type", "action", "description", "params"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid smoothing parameters: {0}")]
    InvalidSmoothing(String),

    #[error("invalid `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Documento de configuración tal como se escribe en disco
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Segundos de cooldown por grupo (default: 1.0)
    pub action_cooldown: f32,
    /// Segundos máximos por petición `api` (default: 5.0)
    pub api_timeout: f32,
    pub api_base_url: String,
    pub smoothing: SmoothingParams,
    /// Sustituye la tabla de grupos por defecto si está presente
    pub gesture_groups: Option<BTreeMap<String, Vec<String>>>,
    pub gesture_actions: BTreeMap<String, Value>,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            action_cooldown: DEFAULT_COOLDOWN.as_secs_f32(),
            api_timeout: DEFAULT_API_TIMEOUT.as_secs_f32(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            smoothing: SmoothingParams::default(),
            gesture_groups: None,
            gesture_actions: BTreeMap::new(),
        }
    }
}

/// Configuración validada y lista para aplicar al motor
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub smoothing: SmoothingParams,
    pub groups: GroupTable,
    pub bindings: BindingTable,
    pub api: ApiSettings,
    /// Entradas de `gesture_actions` descartadas, con el motivo
    pub rejected: Vec<(String, EntryError)>,
}

impl Default for LoadedConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingParams::default(),
            groups: GroupTable::with_defaults(),
            bindings: BindingTable::default(),
            api: ApiSettings::default(),
            rejected: Vec::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_document(&text)?;
    info!(
        "📄 Configuración cargada de {:?}: {} acciones, {} descartadas",
        path,
        config.bindings.len(),
        config.rejected.len()
    );
    Ok(config)
}

/// Valida el documento completo. Un error a nivel de documento invalida todo;
/// una entrada de acción mal formada sólo se descarta a sí misma.
pub fn parse_document(text: &str) -> Result<LoadedConfig, ConfigError> {
    let document: ConfigDocument = serde_json::from_str(text)?;
    document.into_loaded()
}

impl ConfigDocument {
    pub fn into_loaded(self) -> Result<LoadedConfig, ConfigError> {
        self.smoothing.validate()?;
        let cooldown = seconds("action_cooldown", self.action_cooldown, true)?;
        let timeout = seconds("api_timeout", self.api_timeout, false)?;
        Url::parse(&self.api_base_url).map_err(|e| ConfigError::InvalidValue {
            field: "api_base_url",
            reason: e.to_string(),
        })?;

        let api = ApiSettings {
            base_url: self.api_base_url,
            timeout,
        };
        let groups = match &self.gesture_groups {
            Some(groups) => GroupTable::from_groups(groups),
            None => GroupTable::with_defaults(),
        };

        let mut bindings = BindingTable::new(cooldown);
        let mut rejected = Vec::new();
        for (group, entry) in &self.gesture_actions {
            let group = group.trim().to_lowercase();
            match parse_entry(&group, entry, &api) {
                Ok(binding) => bindings.insert(binding),
                Err(e) => {
                    warn!(group = %group, error = %e, "⚠️  acción descartada");
                    rejected.push((group, e));
                }
            }
        }

        Ok(LoadedConfig {
            smoothing: self.smoothing,
            groups,
            bindings,
            api,
            rejected,
        })
    }
}

fn seconds(field: &'static str, value: f32, allow_zero: bool) -> Result<Duration, ConfigError> {
    let valid = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if !valid {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} is not a valid number of seconds", value),
        });
    }
    Ok(Duration::from_secs_f32(value))
}

/// Interpreta una entrada de `gesture_actions`. Las claves sueltas (`method`,
/// `payload`, `cooldown`...) se añaden a `params`.
pub fn parse_entry(group: &str, entry: &Value, api: &ApiSettings) -> Result<ActionBinding, EntryError> {
    let Value::Object(fields) = entry else {
        return Err(EntryError::NotAnObject);
    };

    let kind: ActionKind = match fields.get("type") {
        Some(Value::String(kind)) => kind.parse()?,
        Some(other) => return Err(EntryError::UnknownType(other.to_string())),
        None => return Err(EntryError::UnknownType(String::new())),
    };

    let command = match fields.get("action") {
        Some(Value::String(command)) => command.clone(),
        Some(Value::Null) | None => return Err(EntryError::MissingAction),
        Some(other) => other.to_string(),
    };

    let mut params = BTreeMap::new();
    match fields.get("params") {
        Some(Value::Object(extra)) => collect_params(extra, &mut params),
        Some(Value::Null) | None => {}
        Some(_) => {
            return Err(EntryError::InvalidParam {
                name: "params".to_string(),
                reason: "expected a JSON object".to_string(),
            })
        }
    }
    for (key, value) in fields {
        if !ENTRY_KEYS.contains(&key.as_str()) {
            params.insert(key.clone(), param_text(value));
        }
    }

    let description = fields
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(ActionBinding::with_settings(group, kind, command, params, api)?.with_description(description))
}

fn collect_params(fields: &Map<String, Value>, params: &mut BTreeMap<String, String>) {
    for (key, value) in fields {
        params.insert(key.clone(), param_text(value));
    }
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
