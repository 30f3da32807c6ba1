use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Interruptor global: con el gate cerrado ninguna acción se ejecuta,
/// aunque la confirmación de gestos sigue funcionando.
#[derive(Debug)]
pub struct SafetyGate {
    enabled: AtomicBool,
}

impl SafetyGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Cambia el estado y devuelve el anterior
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            if enabled {
                info!("🟢 acciones habilitadas");
            } else {
                warn!("🔴 acciones deshabilitadas");
            }
        }
        previous
    }

    pub fn enable(&self) -> bool {
        self.set_enabled(true)
    }

    pub fn disable(&self) -> bool {
        self.set_enabled(false)
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_returns_previous_state() {
        let gate = SafetyGate::default();
        assert!(gate.is_enabled());
        assert!(gate.disable());
        assert!(!gate.is_enabled());
        // Idempotente
        assert!(!gate.disable());
        assert!(!gate.enable());
        assert!(gate.is_enabled());
    }
}
