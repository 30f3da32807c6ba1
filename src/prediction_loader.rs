use crossbeam_channel::Sender;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::control::ControlEvent;
use crate::types::RawPrediction;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid row {row} in {path}: {source}")]
    Row {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("{0} contains no predictions")]
    Empty(PathBuf),

    #[error("invalid line: {0}")]
    Line(String),
}

/// Predicción tal como llega por la entrada, antes de asignarle un `Instant`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionRecord {
    pub label: String,
    pub confidence: f32,
    /// Milisegundos en el reloj del productor; si falta se usa la hora de llegada
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputLine {
    Prediction(PredictionRecord),
    Control(ControlEvent),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireLine {
    Control { control: String },
    Prediction(PredictionRecord),
}

/// Interpreta una línea JSON de la entrada. Líneas vacías y comentarios (`#`)
/// devuelven `None`.
pub fn parse_line(line: &str) -> Result<Option<InputLine>, LoadError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let wire: WireLine =
        serde_json::from_str(line).map_err(|e| LoadError::Line(format!("{}: {}", e, line)))?;
    let parsed = match wire {
        WireLine::Control { control } => InputLine::Control(
            control
                .parse()
                .map_err(|e| LoadError::Line(format!("{}", e)))?,
        ),
        WireLine::Prediction(record) => InputLine::Prediction(record),
    };
    Ok(Some(parsed))
}

/// Convierte los milisegundos del productor en `Instant` locales, tomando
/// el primer timestamp visto como origen.
#[derive(Debug)]
pub struct Timeline {
    base: Instant,
    origin_ms: Option<u64>,
}

impl Timeline {
    pub fn new(base: Instant) -> Self {
        Self {
            base,
            origin_ms: None,
        }
    }

    pub fn instant(&mut self, timestamp_ms: u64) -> Instant {
        let origin = *self.origin_ms.get_or_insert(timestamp_ms);
        self.base + Duration::from_millis(timestamp_ms.saturating_sub(origin))
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp_ms: u64,
    label: String,
    confidence: f32,
}

/// Carga predicciones desde un CSV `timestamp_ms,label,confidence`
pub fn load_predictions_csv(
    path: impl AsRef<Path>,
    base: Instant,
) -> Result<Vec<RawPrediction>, LoadError> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut timeline = Timeline::new(base);
    let mut predictions = Vec::new();
    for (row_idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|source| LoadError::Row {
            path: path.to_path_buf(),
            row: row_idx + 1,
            source,
        })?;
        predictions.push(RawPrediction::new(
            row.label,
            row.confidence,
            timeline.instant(row.timestamp_ms),
        ));
    }

    if predictions.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    Ok(predictions)
}

/// Lee líneas JSON en un hilo y las reparte entre los dos canales. Las líneas
/// inválidas se registran y se saltan. Al terminar la entrada se cierran ambos
/// canales.
pub fn spawn_line_reader<R>(
    reader: R,
    clock: Arc<dyn Clock>,
    predictions: Sender<RawPrediction>,
    controls: Sender<ControlEvent>,
) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut timeline = Timeline::new(clock.now());
        for (idx, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "error leyendo la entrada");
                    break;
                }
            };
            let sent = match parse_line(&line) {
                Ok(Some(InputLine::Prediction(record))) => {
                    let timestamp = match record.timestamp_ms {
                        Some(ms) => timeline.instant(ms),
                        None => clock.now(),
                    };
                    predictions
                        .send(RawPrediction::new(record.label, record.confidence, timestamp))
                        .is_ok()
                }
                Ok(Some(InputLine::Control(event))) => controls.send(event).is_ok(),
                Ok(None) => true,
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "línea descartada");
                    true
                }
            };
            if !sent {
                break;
            }
        }
        debug!("fin de la entrada de predicciones");
    })
}
