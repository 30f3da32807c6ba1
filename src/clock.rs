use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Fuente de tiempo monotónico inyectable
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Reloj real del sistema
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Reloj manual para tests y para reproducir grabaciones
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Nunca retrocede: un instante anterior al actual se ignora
    pub fn set(&self, instant: Instant) {
        let mut now = self.now.lock();
        if instant > *now {
            *now = instant;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Instant::now();
        let clock = ManualClock::starting_at(start);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), start + Duration::from_millis(250));
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let start = Instant::now();
        let clock = ManualClock::starting_at(start + Duration::from_secs(1));
        clock.set(start);
        assert_eq!(clock.now(), start + Duration::from_secs(1));
    }
}
