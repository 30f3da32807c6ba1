use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::clock::Clock;
use crate::safety::SafetyGate;
use crate::types::GestureGroup;

/// Resultado de intentar reservar una ejecución
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Permitted,
    CoolingDown { remaining: Duration },
    /// El gate estaba cerrado en el momento de reservar; no se registra nada
    Disabled,
}

impl Consumption {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Consumption::Permitted)
    }
}

/// Registro por grupo del último instante en que se ejecutó su acción.
///
/// Comprobar y registrar ocurre bajo el mismo lock, así que dos hilos que
/// intenten el mismo grupo a la vez nunca obtienen ambos permiso.
pub struct CooldownLedger {
    clock: Arc<dyn Clock>,
    default_cooldown: Mutex<Duration>,
    entries: Mutex<HashMap<GestureGroup, Instant>>,
}

impl CooldownLedger {
    pub fn new(clock: Arc<dyn Clock>, default_cooldown: Duration) -> Self {
        Self {
            clock,
            default_cooldown: Mutex::new(default_cooldown),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_cooldown(&self) -> Duration {
        *self.default_cooldown.lock()
    }

    pub fn set_default_cooldown(&self, cooldown: Duration) {
        *self.default_cooldown.lock() = cooldown;
    }

    /// Reserva con el cooldown por defecto
    pub fn try_consume(&self, group: &GestureGroup) -> bool {
        let cooldown = self.default_cooldown();
        self.try_consume_for(group, cooldown)
    }

    pub fn try_consume_for(&self, group: &GestureGroup, cooldown: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match Self::check(&entries, group, cooldown, now) {
            Consumption::Permitted => {
                entries.insert(group.clone(), now);
                true
            }
            _ => false,
        }
    }

    /// Como `try_consume_for`, pero el gate se consulta dentro del lock: si se
    /// cierra antes de reservar, no queda ningún registro.
    pub fn try_consume_gated(
        &self,
        group: &GestureGroup,
        cooldown: Duration,
        gate: &SafetyGate,
    ) -> Consumption {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if !gate.is_enabled() {
            return Consumption::Disabled;
        }
        let verdict = Self::check(&entries, group, cooldown, now);
        match verdict {
            Consumption::Permitted => {
                entries.insert(group.clone(), now);
            }
            Consumption::CoolingDown { remaining } => {
                debug!(
                    group = %group,
                    remaining_ms = remaining.as_millis() as u64,
                    "en cooldown"
                );
            }
            Consumption::Disabled => {}
        }
        verdict
    }

    fn check(
        entries: &HashMap<GestureGroup, Instant>,
        group: &GestureGroup,
        cooldown: Duration,
        now: Instant,
    ) -> Consumption {
        match entries.get(group) {
            Some(last) => {
                let elapsed = now.saturating_duration_since(*last);
                if elapsed >= cooldown {
                    Consumption::Permitted
                } else {
                    Consumption::CoolingDown {
                        remaining: cooldown - elapsed,
                    }
                }
            }
            None => Consumption::Permitted,
        }
    }

    /// Tiempo restante de cooldown con el valor por defecto
    pub fn remaining(&self, group: &GestureGroup) -> Duration {
        let cooldown = self.default_cooldown();
        self.remaining_for(group, cooldown)
    }

    pub fn remaining_for(&self, group: &GestureGroup, cooldown: Duration) -> Duration {
        let now = self.clock.now();
        match Self::check(&self.entries.lock(), group, cooldown, now) {
            Consumption::CoolingDown { remaining } => remaining,
            _ => Duration::ZERO,
        }
    }

    pub fn last_dispatch(&self, group: &GestureGroup) -> Option<Instant> {
        self.entries.lock().get(group).copied()
    }

    /// Milisegundos desde la última ejecución de cada grupo
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let now = self.clock.now();
        self.entries
            .lock()
            .iter()
            .map(|(group, last)| {
                (
                    group.to_string(),
                    now.saturating_duration_since(*last).as_millis() as u64,
                )
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn ledger(clock: &Arc<ManualClock>) -> CooldownLedger {
        CooldownLedger::new(clock.clone(), Duration::from_secs(1))
    }

    #[test]
    fn test_consume_blocks_until_elapsed() {
        let clock = Arc::new(ManualClock::new());
        let ledger = ledger(&clock);
        let group = GestureGroup::new("ok_group");

        assert!(ledger.try_consume(&group));
        clock.advance(Duration::from_millis(400));
        assert!(!ledger.try_consume(&group));
        assert_eq!(ledger.remaining(&group), Duration::from_millis(600));

        clock.advance(Duration::from_millis(600));
        assert!(ledger.try_consume(&group));
    }

    #[test]
    fn test_groups_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let ledger = ledger(&clock);
        assert!(ledger.try_consume(&GestureGroup::new("ok_group")));
        assert!(ledger.try_consume(&GestureGroup::new("fist_group")));
        assert_eq!(ledger.snapshot().len(), 2);
    }

    #[test]
    fn test_rejected_attempt_does_not_extend_cooldown() {
        let clock = Arc::new(ManualClock::new());
        let ledger = ledger(&clock);
        let group = GestureGroup::new("ok_group");
        let start = clock.now();

        assert!(ledger.try_consume(&group));
        clock.advance(Duration::from_millis(900));
        assert!(!ledger.try_consume(&group));
        assert_eq!(ledger.last_dispatch(&group), Some(start));
    }

    #[test]
    fn test_gate_closed_records_nothing() {
        let clock = Arc::new(ManualClock::new());
        let ledger = ledger(&clock);
        let gate = SafetyGate::new(false);
        let group = GestureGroup::new("ok_group");

        assert_eq!(
            ledger.try_consume_gated(&group, Duration::from_secs(1), &gate),
            Consumption::Disabled
        );
        assert!(ledger.last_dispatch(&group).is_none());

        gate.enable();
        assert!(ledger
            .try_consume_gated(&group, Duration::from_secs(1), &gate)
            .is_permitted());
    }

    #[test]
    fn test_concurrent_consume_grants_once() {
        let clock = Arc::new(ManualClock::new());
        let ledger = Arc::new(ledger(&clock));
        let granted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let granted = Arc::clone(&granted);
                thread::spawn(move || {
                    for _ in 0..100 {
                        if ledger.try_consume(&GestureGroup::new("ok_group")) {
                            granted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 1);
    }
}
