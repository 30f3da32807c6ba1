//! Pipeline completo: predicción → confirmación → gate → enlace → cooldown
//! → ejecución.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::bindings::{ActionBinding, BindingStore};
use crate::clock::Clock;
use crate::config::{load_config, ConfigError, LoadedConfig};
use crate::confirmation::{ConfirmationStats, TemporalConfirmation};
use crate::cooldown::{Consumption, CooldownLedger};
use crate::dispatch::{DispatchContext, DispatchResult, Dispatcher};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::safety::SafetyGate;
use crate::types::{ConfirmedIntent, RawPrediction};

/// Qué pasó con una intención confirmada
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Dispatched {
        intent: ConfirmedIntent,
        binding: Arc<ActionBinding>,
        result: DispatchResult,
    },
    /// Gate cerrado: nada se ejecuta ni se registra en el cooldown
    Disabled { intent: ConfirmedIntent },
    CoolingDown {
        intent: ConfirmedIntent,
        remaining: Duration,
    },
    /// El grupo no tiene acción configurada
    Unbound { intent: ConfirmedIntent },
}

impl Outcome {
    pub fn intent(&self) -> &ConfirmedIntent {
        match self {
            Outcome::Dispatched { intent, .. }
            | Outcome::Disabled { intent }
            | Outcome::CoolingDown { intent, .. }
            | Outcome::Unbound { intent } => intent,
        }
    }

    /// `Some` sólo si la acción llegó a ejecutarse
    pub fn dispatch_result(&self) -> Option<&DispatchResult> {
        match self {
            Outcome::Dispatched { result, .. } => Some(result),
            _ => None,
        }
    }
}

pub struct Engine {
    confirmation: Mutex<TemporalConfirmation>,
    ledger: CooldownLedger,
    gate: Arc<SafetyGate>,
    bindings: BindingStore,
    dispatcher: Dispatcher,
    metrics: Metrics,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(config: LoadedConfig, dispatcher: Dispatcher, clock: Arc<dyn Clock>) -> Self {
        let LoadedConfig {
            smoothing,
            groups,
            bindings,
            ..
        } = config;
        let ledger = CooldownLedger::new(Arc::clone(&clock), bindings.default_cooldown());

        Self {
            confirmation: Mutex::new(TemporalConfirmation::new(smoothing, groups)),
            ledger,
            gate: Arc::new(SafetyGate::default()),
            bindings: BindingStore::new(bindings),
            dispatcher,
            metrics: Metrics::new(),
            clock,
        }
    }

    /// Procesa una predicción; devuelve un resultado sólo si se confirmó una intención
    pub fn process(&self, prediction: &RawPrediction) -> Option<Outcome> {
        self.metrics.record_prediction(prediction.timestamp);
        // El lock se suelta antes de ejecutar la acción
        let intent = self.confirmation.lock().observe(prediction)?;
        Some(self.handle_intent(intent))
    }

    pub fn handle_intent(&self, intent: ConfirmedIntent) -> Outcome {
        self.metrics.record_confirmation(&intent);

        if !self.gate.is_enabled() {
            debug!(group = %intent.group, "acciones deshabilitadas, se ignora");
            self.metrics.record_disabled();
            return Outcome::Disabled { intent };
        }

        let table = self.bindings.snapshot();
        let Some(binding) = table.get(intent.group.as_str()) else {
            debug!(group = %intent.group, "grupo sin acción configurada");
            self.metrics.record_unbound();
            return Outcome::Unbound { intent };
        };

        let cooldown = table.cooldown_for(&binding);
        match self
            .ledger
            .try_consume_gated(&intent.group, cooldown, &self.gate)
        {
            Consumption::Disabled => {
                self.metrics.record_disabled();
                Outcome::Disabled { intent }
            }
            Consumption::CoolingDown { remaining } => {
                self.metrics.record_cooldown();
                Outcome::CoolingDown { intent, remaining }
            }
            Consumption::Permitted => {
                let ctx = DispatchContext::from(&intent);
                let result = self.dispatcher.dispatch_with(&binding, &ctx);
                self.metrics.record_dispatch(result.ok);
                Outcome::Dispatched {
                    intent,
                    binding,
                    result,
                }
            }
        }
    }

    /// Aplica una configuración ya validada. La evidencia acumulada se descarta
    /// y los cooldowns en curso se mantienen.
    pub fn reload(&self, config: LoadedConfig) {
        let LoadedConfig {
            smoothing,
            groups,
            bindings,
            rejected,
            ..
        } = config;

        self.confirmation.lock().reconfigure(smoothing, groups);
        self.ledger.set_default_cooldown(bindings.default_cooldown());
        let previous = self.bindings.reload(bindings);
        self.metrics.record_reload();

        info!(
            "🔄 Configuración recargada: {} → {} acciones ({} descartadas)",
            previous.len(),
            self.bindings.snapshot().len(),
            rejected.len()
        );
        self.log_available_actions();
    }

    /// Si el archivo no es válido se conserva la configuración anterior
    pub fn reload_from_path(&self, path: &Path) -> Result<(), ConfigError> {
        let config = load_config(path)?;
        self.reload(config);
        Ok(())
    }

    pub fn log_available_actions(&self) {
        for (group, summary) in self.bindings.describe() {
            info!(
                "   {} → {} `{}` {}",
                group, summary.kind, summary.action, summary.description
            );
        }
    }

    /// Reinicia la confirmación y los cooldowns
    pub fn reset(&self) {
        self.confirmation.lock().reset();
        self.ledger.clear();
    }

    pub fn confirmation_stats(&self) -> ConfirmationStats {
        self.confirmation.lock().stats(self.clock.now())
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let last_intent = self.metrics.last_intent();
        MetricsSnapshot {
            counters: self.metrics.counters(),
            fps: self.metrics.fps(),
            last_intent: last_intent.as_ref().map(|(group, _)| group.clone()),
            last_confidence: last_intent.map(|(_, confidence)| confidence),
            actions_enabled: self.gate.is_enabled(),
            bindings: self.bindings.snapshot().len(),
            cooldowns_ms: self.ledger.snapshot(),
            confirmation: self.confirmation_stats(),
        }
    }

    pub fn gate(&self) -> &Arc<SafetyGate> {
        &self.gate
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
