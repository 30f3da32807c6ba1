use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::{ActionHandler, DispatchContext, DispatchError};
use crate::bindings::{Action, ActionBinding, EntryError};
use crate::types::DEFAULT_API_TIMEOUT;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const USER_AGENT: &str = concat!("gesture-intent/", env!("CARGO_PKG_VERSION"));

/// Endpoints con nombre, relativos a `api_base_url`
const ENDPOINT_ALIASES: &[(&str, &str)] = &[
    ("gesture_webhook", "/api/gesture"),
    ("action_webhook", "/api/action"),
    ("system_control", "/api/system"),
    ("custom_endpoint", "/api/custom"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(EntryError::InvalidMethod(s.to_string())),
        }
    }
}

/// Ajustes compartidos por todas las acciones `api`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_API_TIMEOUT,
        }
    }
}

/// Petición HTTP ya validada
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Se mezcla sobre `{gesture, confidence, timestamp}`
    pub payload: Map<String, Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ApiRequest {
    /// `command` es una URL absoluta, un alias o una ruta relativa a `base_url`.
    /// Parámetros: `method`, `payload` y `headers` (objetos JSON como texto), `timeout` (s)
    pub fn parse(
        command: &str,
        params: &BTreeMap<String, String>,
        settings: &ApiSettings,
    ) -> Result<Self, EntryError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(EntryError::MissingAction);
        }

        let url = resolve_url(command, &settings.base_url)?;
        let method = match params.get("method") {
            Some(raw) => raw.parse()?,
            None => HttpMethod::Post,
        };

        let payload = match params.get("payload") {
            Some(raw) => json_object("payload", raw)?,
            None => Map::new(),
        };

        let mut headers = Vec::new();
        if let Some(raw) = params.get("headers") {
            for (name, value) in json_object("headers", raw)? {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                headers.push((name, value));
            }
        }

        let timeout = match params.get("timeout") {
            Some(raw) => match raw.trim().parse::<f32>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f32(secs),
                _ => {
                    return Err(EntryError::InvalidParam {
                        name: "timeout".to_string(),
                        reason: format!("`{}` is not a positive number of seconds", raw),
                    })
                }
            },
            None => settings.timeout,
        };

        Ok(Self {
            method,
            url,
            payload,
            headers,
            timeout,
        })
    }

    /// Cuerpo de la petición para un gesto concreto
    pub fn body(&self, ctx: &DispatchContext) -> Map<String, Value> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        let mut body = Map::new();
        body.insert("gesture".to_string(), Value::from(ctx.gesture.clone()));
        body.insert("confidence".to_string(), Value::from(ctx.confidence as f64));
        body.insert("timestamp".to_string(), Value::from(timestamp));
        for (key, value) in &self.payload {
            body.insert(key.clone(), value.clone());
        }
        body
    }
}

fn resolve_url(command: &str, base_url: &str) -> Result<Url, EntryError> {
    let invalid = |reason: String| EntryError::InvalidUrl {
        url: command.to_string(),
        reason,
    };

    let url = if command.starts_with("http://") || command.starts_with("https://") {
        Url::parse(command).map_err(|e| invalid(e.to_string()))?
    } else {
        let endpoint = ENDPOINT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == command)
            .map(|(_, path)| *path)
            .unwrap_or(command);
        Url::parse(base_url)
            .and_then(|base| base.join(endpoint))
            .map_err(|e| invalid(e.to_string()))?
    };

    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn json_object(name: &str, raw: &str) -> Result<Map<String, Value>, EntryError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EntryError::InvalidParam {
            name: name.to_string(),
            reason: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(EntryError::InvalidParam {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Manejador del tipo `api`. Sin reintentos: un fallo se informa y ya.
pub struct ApiHandler {
    client: Client,
}

impl ApiHandler {
    pub fn new() -> Result<Self, DispatchError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl ActionHandler for ApiHandler {
    fn handle(&self, binding: &ActionBinding, ctx: &DispatchContext) -> Result<String, DispatchError> {
        let Action::Api(request) = &binding.action else {
            return Err(DispatchError::KindMismatch {
                expected: "api",
                group: binding.group.to_string(),
            });
        };

        let body = request.body(ctx);
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.method {
            HttpMethod::Get => {
                let query: Vec<(String, String)> = body
                    .into_iter()
                    .map(|(key, value)| match value {
                        Value::String(s) => (key, s),
                        other => (key, other.to_string()),
                    })
                    .collect();
                builder.query(&query)
            }
            HttpMethod::Delete => builder,
            _ => builder.json(&body),
        };

        debug!(method = %request.method, url = %request.url, "enviando petición");
        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                url: request.url.to_string(),
            });
        }
        Ok(format!("{} {} -> {}", request.method, request.url, status.as_u16()))
    }
}
