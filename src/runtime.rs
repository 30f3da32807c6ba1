use crossbeam_channel::{never, select, Receiver};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::control::ControlEvent;
use crate::engine::{Engine, Outcome};
use crate::types::RawPrediction;

/// Bucle principal del daemon: consume predicciones y eventos de control
/// hasta que se cierre el canal de predicciones.
pub struct Runtime<'a> {
    engine: &'a Engine,
    config_path: Option<PathBuf>,
}

impl<'a> Runtime<'a> {
    pub fn new(engine: &'a Engine, config_path: Option<PathBuf>) -> Self {
        Self {
            engine,
            config_path,
        }
    }

    /// Devuelve el número de predicciones procesadas
    pub fn run(&self, predictions: Receiver<RawPrediction>, controls: Receiver<ControlEvent>) -> u64 {
        let closed = never();
        let mut controls_open = true;
        let mut processed = 0u64;

        loop {
            // Sin fuente de control se sigue sólo con predicciones
            let control_rx = if controls_open { &controls } else { &closed };
            select! {
                recv(predictions) -> msg => match msg {
                    Ok(prediction) => {
                        processed += 1;
                        if let Some(outcome) = self.engine.process(&prediction) {
                            report(&outcome);
                        }
                    }
                    Err(_) => break,
                },
                recv(control_rx) -> msg => match msg {
                    Ok(event) => self.apply_control(event),
                    Err(_) => controls_open = false,
                },
            }
        }

        info!("👋 Entrada cerrada tras {} predicciones", processed);
        processed
    }

    pub fn apply_control(&self, event: ControlEvent) {
        info!("🎛️  Control: {}", event);
        match event {
            ControlEvent::Disable => {
                self.engine.gate().disable();
            }
            ControlEvent::Enable => {
                self.engine.gate().enable();
            }
            ControlEvent::ReloadConfig => match &self.config_path {
                Some(path) => {
                    if let Err(e) = self.engine.reload_from_path(path) {
                        warn!(error = %e, "recarga fallida, se mantiene la configuración actual");
                    }
                }
                None => warn!("recarga pedida sin archivo de configuración"),
            },
            ControlEvent::ShowMetrics => {
                let snapshot = self.engine.metrics_snapshot();
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(json) => info!("📊 Métricas:\n{}", json),
                    Err(e) => warn!(error = %e, "no se pudieron serializar las métricas"),
                }
            }
        }
    }
}

/// Traza de una intención confirmada
pub fn report(outcome: &Outcome) {
    let intent = outcome.intent();
    match outcome {
        Outcome::Dispatched { binding, result, .. } => {
            if result.ok {
                info!(
                    "🎯 {} ({:.0}%) → {} `{}`",
                    intent.group,
                    intent.confidence * 100.0,
                    binding.kind,
                    binding.command
                );
            } else {
                warn!(
                    "❌ {} → {} `{}`: {}",
                    intent.group, binding.kind, binding.command, result.detail
                );
            }
        }
        Outcome::Disabled { .. } => info!("⏸️  {} confirmado con acciones deshabilitadas", intent.group),
        Outcome::CoolingDown { remaining, .. } => info!(
            "⏳ {} en cooldown ({} ms)",
            intent.group,
            remaining.as_millis()
        ),
        Outcome::Unbound { .. } => info!("⚠️  {} sin acción configurada", intent.group),
    }
}
