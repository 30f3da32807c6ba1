use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::{Duration, Instant};

/// Constantes por defecto del sistema
pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_REQUIRED_AGREEMENT: usize = 7;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.70;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(5);

/// Etiquetas que el clasificador emite cuando no hay mano o no está seguro
pub const NONE_LABELS: [&str; 3] = ["none", "uncertain", "desconocido"];

/// Identificador canónico de un grupo de gestos (p. ej. `ok_group`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GestureGroup(String);

impl GestureGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GestureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for GestureGroup {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GestureGroup {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Una predicción por frame del clasificador externo
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    /// Se espera en [0, 1]; fuera de rango se normaliza a `none`
    pub confidence: f32,
    pub timestamp: Instant,
}

impl RawPrediction {
    pub fn new(label: impl Into<String>, confidence: f32, timestamp: Instant) -> Self {
        Self {
            label: label.into(),
            confidence,
            timestamp,
        }
    }

    /// Confianza finita y dentro de [0, 1]
    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Intención confirmada: un grupo estable durante suficientes frames
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedIntent {
    pub group: GestureGroup,
    /// Confianza media de las predicciones que formaron la confirmación
    pub confidence: f32,
    pub confirmed_at: Instant,
}
