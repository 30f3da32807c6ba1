use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Sube el nivel a `debug` para este crate
    pub verbose: bool,
}

#[derive(Error, Debug)]
#[error("logging already initialised: {0}")]
pub struct LoggingError(String);

/// Inicializa el subscriber global (salida a stderr). `RUST_LOG` tiene prioridad.
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gesture_intent={},replay_predictions={}", level, level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.verbose)
                .with_line_number(config.verbose),
        )
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))
}
