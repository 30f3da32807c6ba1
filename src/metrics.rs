//! Contadores del pipeline y estimación de frames por segundo.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::confirmation::ConfirmationStats;
use crate::types::ConfirmedIntent;

#[derive(Debug, Default)]
struct FrameRate {
    last: Option<Instant>,
    /// Intervalo medio entre predicciones (EWMA 7/8)
    smoothed: Option<Duration>,
}

impl FrameRate {
    fn update(&mut self, at: Instant) {
        if let Some(last) = self.last {
            // Predicciones desordenadas no cuentan
            if at > last {
                let sample = at - last;
                self.smoothed = Some(match self.smoothed {
                    Some(avg) => {
                        let nanos = (avg.as_nanos() as u64 * 7 + sample.as_nanos() as u64) / 8;
                        Duration::from_nanos(nanos)
                    }
                    None => sample,
                });
            }
        }
        if self.last.map_or(true, |last| at > last) {
            self.last = Some(at);
        }
    }

    fn fps(&self) -> f32 {
        match self.smoothed {
            Some(interval) if !interval.is_zero() => 1.0 / interval.as_secs_f32(),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    predictions: AtomicU64,
    confirmations: AtomicU64,
    dispatched_ok: AtomicU64,
    dispatched_failed: AtomicU64,
    suppressed_cooldown: AtomicU64,
    suppressed_disabled: AtomicU64,
    unbound: AtomicU64,
    reloads: AtomicU64,
    frame_rate: Mutex<FrameRate>,
    last_intent: Mutex<Option<(String, f32)>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prediction(&self, at: Instant) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.frame_rate.lock().update(at);
    }

    pub fn record_confirmation(&self, intent: &ConfirmedIntent) {
        self.confirmations.fetch_add(1, Ordering::Relaxed);
        *self.last_intent.lock() = Some((intent.group.to_string(), intent.confidence));
    }

    pub fn record_dispatch(&self, ok: bool) {
        let counter = if ok {
            &self.dispatched_ok
        } else {
            &self.dispatched_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown(&self) {
        self.suppressed_cooldown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disabled(&self) {
        self.suppressed_disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unbound(&self) {
        self.unbound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f32 {
        self.frame_rate.lock().fps()
    }

    pub fn counters(&self) -> Counters {
        Counters {
            predictions: self.predictions.load(Ordering::Relaxed),
            confirmations: self.confirmations.load(Ordering::Relaxed),
            dispatched_ok: self.dispatched_ok.load(Ordering::Relaxed),
            dispatched_failed: self.dispatched_failed.load(Ordering::Relaxed),
            suppressed_cooldown: self.suppressed_cooldown.load(Ordering::Relaxed),
            suppressed_disabled: self.suppressed_disabled.load(Ordering::Relaxed),
            unbound: self.unbound.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }

    pub fn last_intent(&self) -> Option<(String, f32)> {
        self.last_intent.lock().clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub predictions: u64,
    pub confirmations: u64,
    pub dispatched_ok: u64,
    pub dispatched_failed: u64,
    pub suppressed_cooldown: u64,
    pub suppressed_disabled: u64,
    pub unbound: u64,
    pub reloads: u64,
}

/// Vista completa del estado, para `show_metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: Counters,
    pub fps: f32,
    pub last_intent: Option<String>,
    pub last_confidence: Option<f32>,
    pub actions_enabled: bool,
    pub bindings: usize,
    /// Milisegundos desde la última ejecución de cada grupo
    pub cooldowns_ms: BTreeMap<String, u64>,
    pub confirmation: ConfirmationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_converges_to_frame_interval() {
        let metrics = Metrics::new();
        let start = Instant::now();
        assert_eq!(metrics.fps(), 0.0);

        for i in 0..50 {
            metrics.record_prediction(start + Duration::from_millis(40) * i);
        }
        let fps = metrics.fps();
        assert!((fps - 25.0).abs() < 0.5, "fps = {}", fps);
        assert_eq!(metrics.counters().predictions, 50);
    }

    #[test]
    fn test_out_of_order_timestamps_ignored_for_rate() {
        let metrics = Metrics::new();
        let start = Instant::now() + Duration::from_secs(1);
        metrics.record_prediction(start);
        metrics.record_prediction(start + Duration::from_millis(100));
        metrics.record_prediction(start);
        assert!((metrics.fps() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_dispatch_counters() {
        let metrics = Metrics::new();
        metrics.record_dispatch(true);
        metrics.record_dispatch(false);
        metrics.record_dispatch(false);
        metrics.record_cooldown();

        let counters = metrics.counters();
        assert_eq!(counters.dispatched_ok, 1);
        assert_eq!(counters.dispatched_failed, 2);
        assert_eq!(counters.suppressed_cooldown, 1);
    }
}
