use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::grouping::GroupTable;
use crate::types::{
    ConfirmedIntent, GestureGroup, RawPrediction, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DEBOUNCE,
    DEFAULT_REQUIRED_AGREEMENT, DEFAULT_WINDOW_SIZE,
};

/// Regla de acuerdo dentro de la ventana
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementPolicy {
    /// Las K predicciones más recientes, seguidas, deben coincidir
    #[default]
    Contiguous,
    /// Basta con K coincidencias en cualquier posición de la ventana
    Majority,
}

/// Parámetros de la confirmación temporal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingParams {
    /// Tamaño de la ventana deslizante N (default: 10)
    pub window_size: usize,
    /// Predicciones que deben coincidir K (default: 7)
    pub required_agreement: usize,
    /// Confianza mínima por predicción (default: 0.7)
    pub confidence_threshold: f32,
    /// Segundos mínimos entre dos confirmaciones de cualquier grupo (default: 0.5)
    pub debounce: f32,
    pub policy: AgreementPolicy,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            required_agreement: DEFAULT_REQUIRED_AGREEMENT,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            debounce: DEFAULT_DEBOUNCE.as_secs_f32(),
            policy: AgreementPolicy::Contiguous,
        }
    }
}

impl SmoothingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::InvalidSmoothing(
                "window_size must be at least 1".to_string(),
            ));
        }
        if self.required_agreement == 0 || self.required_agreement > self.window_size {
            return Err(ConfigError::InvalidSmoothing(format!(
                "required_agreement must be in [1, {}], got {}",
                self.window_size, self.required_agreement
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidSmoothing(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !self.debounce.is_finite() || self.debounce < 0.0 {
            return Err(ConfigError::InvalidSmoothing(format!(
                "debounce must be a non-negative number of seconds, got {}",
                self.debounce
            )));
        }
        Ok(())
    }

    pub fn debounce_duration(&self) -> Duration {
        Duration::from_secs_f32(self.debounce.max(0.0))
    }
}

/// Predicción ya normalizada: `group == None` es el grupo `none`
#[derive(Debug, Clone)]
struct Observation {
    group: Option<GestureGroup>,
    confidence: f32,
}

/// Estado interno expuesto para métricas y depuración
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationStats {
    pub window_len: usize,
    pub streak_group: Option<GestureGroup>,
    pub streak_len: usize,
    pub latched: Option<GestureGroup>,
    pub last_confirmed: Option<GestureGroup>,
    pub debounce_remaining_ms: u64,
}

/// Motor de confirmación temporal.
///
/// Recibe predicciones crudas, las normaliza a grupos y emite como mucho una
/// [`ConfirmedIntent`] por cada racha de predicciones coincidentes. Tras una
/// confirmación el grupo queda "enganchado": mantener la mano quieta no vuelve
/// a confirmar hasta que se observe un estado distinto. Ninguna entrada
/// provoca error; las predicciones inválidas cuentan como `none`.
pub struct TemporalConfirmation {
    params: SmoothingParams,
    groups: GroupTable,
    window: VecDeque<Observation>,
    streak_group: Option<GestureGroup>,
    streak_len: usize,
    streak_confidence: f32,
    latched: Option<GestureGroup>,
    last_confirmation: Option<Instant>,
    last_confirmed: Option<GestureGroup>,
}

impl TemporalConfirmation {
    pub fn new(params: SmoothingParams, groups: GroupTable) -> Self {
        let capacity = params.window_size;
        Self {
            params,
            groups,
            window: VecDeque::with_capacity(capacity),
            streak_group: None,
            streak_len: 0,
            streak_confidence: 0.0,
            latched: None,
            last_confirmation: None,
            last_confirmed: None,
        }
    }

    pub fn params(&self) -> &SmoothingParams {
        &self.params
    }

    /// Sustituye parámetros y tabla de grupos; descarta la evidencia acumulada
    /// pero conserva el instante de la última confirmación (anti-rebote).
    pub fn reconfigure(&mut self, params: SmoothingParams, groups: GroupTable) {
        self.params = params;
        self.groups = groups;
        self.clear_evidence();
        self.latched = None;
    }

    /// Procesa una predicción y devuelve la intención si queda confirmada
    pub fn observe(&mut self, prediction: &RawPrediction) -> Option<ConfirmedIntent> {
        let observation = self.normalize(prediction);
        let group = observation.group.clone();

        self.window.push_back(observation.clone());
        while self.window.len() > self.params.window_size {
            self.window.pop_front();
        }

        if group.is_some() && group == self.streak_group {
            self.streak_len += 1;
            self.streak_confidence += observation.confidence;
        } else {
            self.streak_group = group.clone();
            self.streak_len = usize::from(group.is_some());
            self.streak_confidence = if group.is_some() {
                observation.confidence
            } else {
                0.0
            };
        }

        // Cualquier estado distinto libera el enganche
        if self.latched.is_some() && self.latched != group {
            self.latched = None;
        }

        let candidate = group?;
        if self.latched.as_ref() == Some(&candidate) {
            return None;
        }

        let (agreement, mean_confidence) = match self.params.policy {
            AgreementPolicy::Contiguous => (
                self.streak_len,
                self.streak_confidence / self.streak_len.max(1) as f32,
            ),
            AgreementPolicy::Majority => {
                let (count, sum) = self
                    .window
                    .iter()
                    .filter(|obs| obs.group.as_ref() == Some(&candidate))
                    .fold((0usize, 0.0f32), |(n, s), obs| (n + 1, s + obs.confidence));
                (count, sum / count.max(1) as f32)
            }
        };

        if agreement < self.params.required_agreement {
            return None;
        }

        if let Some(last) = self.last_confirmation {
            let elapsed = prediction.timestamp.saturating_duration_since(last);
            if elapsed < self.params.debounce_duration() {
                debug!(
                    group = %candidate,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "confirmación descartada por anti-rebote"
                );
                return None;
            }
        }

        info!(
            group = %candidate,
            agreement,
            confidence = mean_confidence,
            "intención confirmada"
        );

        self.last_confirmation = Some(prediction.timestamp);
        self.last_confirmed = Some(candidate.clone());
        self.latched = Some(candidate.clone());
        self.clear_evidence();
        // La racha sigue siendo del mismo grupo, pero vuelve a contar desde cero
        self.streak_group = Some(candidate.clone());

        Some(ConfirmedIntent {
            group: candidate,
            confidence: mean_confidence,
            confirmed_at: prediction.timestamp,
        })
    }

    /// Reinicia todo el estado, incluido el anti-rebote
    pub fn reset(&mut self) {
        self.clear_evidence();
        self.latched = None;
        self.last_confirmation = None;
        self.last_confirmed = None;
        debug!("motor de confirmación reiniciado");
    }

    pub fn stats(&self, now: Instant) -> ConfirmationStats {
        let debounce_remaining = self
            .last_confirmation
            .map(|last| {
                self.params
                    .debounce_duration()
                    .saturating_sub(now.saturating_duration_since(last))
            })
            .unwrap_or_default();

        ConfirmationStats {
            window_len: self.window.len(),
            streak_group: self.streak_group.clone(),
            streak_len: self.streak_len,
            latched: self.latched.clone(),
            last_confirmed: self.last_confirmed.clone(),
            debounce_remaining_ms: debounce_remaining.as_millis() as u64,
        }
    }

    fn normalize(&self, prediction: &RawPrediction) -> Observation {
        let confident = prediction.has_valid_confidence()
            && prediction.confidence >= self.params.confidence_threshold;
        let group = if confident {
            self.groups.lookup(&prediction.label)
        } else {
            None
        };

        Observation {
            group,
            confidence: if prediction.has_valid_confidence() {
                prediction.confidence
            } else {
                0.0
            },
        }
    }

    fn clear_evidence(&mut self) {
        self.window.clear();
        self.streak_group = None;
        self.streak_len = 0;
        self.streak_confidence = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(33);

    struct Feeder {
        engine: TemporalConfirmation,
        now: Instant,
    }

    impl Feeder {
        fn new(params: SmoothingParams) -> Self {
            Self {
                engine: TemporalConfirmation::new(params, GroupTable::with_defaults()),
                now: Instant::now(),
            }
        }

        fn feed(&mut self, label: &str, confidence: f32, frames: usize) -> Vec<ConfirmedIntent> {
            let mut out = Vec::new();
            for _ in 0..frames {
                self.now += FRAME;
                let prediction = RawPrediction::new(label, confidence, self.now);
                if let Some(intent) = self.engine.observe(&prediction) {
                    out.push(intent);
                }
            }
            out
        }

        fn wait(&mut self, delta: Duration) {
            self.now += delta;
        }
    }

    fn majority() -> SmoothingParams {
        SmoothingParams {
            policy: AgreementPolicy::Majority,
            ..SmoothingParams::default()
        }
    }

    #[test]
    fn test_palm_then_fist_confirms_only_palm() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        let palm = feeder.feed("palm", 0.9, 7);
        let fist = feeder.feed("fist", 0.9, 3);

        assert_eq!(palm.len(), 1);
        assert_eq!(palm[0].group, GestureGroup::new("palm_group"));
        assert!((palm[0].confidence - 0.9).abs() < 1e-6);
        assert!(fist.is_empty());
    }

    #[test]
    fn test_never_confirms_before_k_observations() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert!(feeder.feed("palm", 0.95, 6).is_empty());
    }

    #[test]
    fn test_contiguous_run_broken_by_conflict() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert!(feeder.feed("palm", 0.9, 6).is_empty());
        assert!(feeder.feed("fist", 0.9, 1).is_empty());
        // 6 + 1 + 3 = ventana llena con 9 palm, pero la racha contigua es de 3
        assert!(feeder.feed("palm", 0.9, 3).is_empty());
        assert_eq!(feeder.feed("palm", 0.9, 4).len(), 1);
    }

    #[test]
    fn test_majority_counts_non_contiguous_votes() {
        let mut feeder = Feeder::new(majority());
        assert!(feeder.feed("palm", 0.9, 4).is_empty());
        assert!(feeder.feed("fist", 0.9, 1).is_empty());
        let confirmed = feeder.feed("palm", 0.9, 3);
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].group, GestureGroup::new("palm_group"));
    }

    #[test]
    fn test_majority_still_requires_k_votes() {
        let mut feeder = Feeder::new(majority());
        for _ in 0..5 {
            assert!(feeder.feed("palm", 0.9, 1).is_empty());
            assert!(feeder.feed("fist", 0.9, 1).is_empty());
        }
    }

    #[test]
    fn test_low_confidence_counts_as_none() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert!(feeder.feed("palm", 0.69, 20).is_empty());
        assert!(feeder.feed("palm", 0.9, 6).is_empty());
        assert!(feeder.feed("palm", 0.5, 1).is_empty());
        assert!(feeder.feed("palm", 0.9, 6).is_empty());
    }

    #[test]
    fn test_malformed_predictions_never_confirm() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert!(feeder.feed("wave", 0.99, 10).is_empty());
        assert!(feeder.feed("palm", 1.5, 10).is_empty());
        assert!(feeder.feed("palm", f32::NAN, 10).is_empty());
        assert!(feeder.feed("none", 0.99, 10).is_empty());
    }

    #[test]
    fn test_held_gesture_confirms_once() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert_eq!(feeder.feed("palm", 0.9, 60).len(), 1);
    }

    #[test]
    fn test_new_run_after_different_state_confirms_again() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert_eq!(feeder.feed("ok", 0.9, 7).len(), 1);
        feeder.feed("none", 0.9, 1);
        feeder.wait(Duration::from_millis(600));
        let again = feeder.feed("c_shape", 0.9, 7);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].group, GestureGroup::new("ok_group"));
    }

    #[test]
    fn test_debounce_blocks_adjacent_group() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert_eq!(feeder.feed("palm", 0.9, 7).len(), 1);
        // 7 frames de 33ms = 231ms < 500ms
        assert!(feeder.feed("fist", 0.9, 7).is_empty());
    }

    #[test]
    fn test_debounce_elapsed_allows_next_group() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert_eq!(feeder.feed("palm", 0.9, 7).len(), 1);
        feeder.wait(Duration::from_millis(500));
        let fist = feeder.feed("fist", 0.9, 7);
        assert_eq!(fist.len(), 1);
        assert_eq!(fist[0].group, GestureGroup::new("fist_group"));
    }

    #[test]
    fn test_window_never_exceeds_n() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        for i in 0..40 {
            let label = if i % 3 == 0 { "fist" } else { "palm" };
            feeder.feed(label, 0.9, 1);
            assert!(feeder.engine.stats(feeder.now).window_len <= 10);
        }
    }

    #[test]
    fn test_stats_report_debounce_remaining() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        feeder.feed("palm", 0.9, 7);
        let stats = feeder.engine.stats(feeder.now + Duration::from_millis(100));
        assert_eq!(stats.last_confirmed, Some(GestureGroup::new("palm_group")));
        assert_eq!(stats.debounce_remaining_ms, 400);
        assert_eq!(stats.latched, Some(GestureGroup::new("palm_group")));
    }

    #[test]
    fn test_reset_clears_debounce() {
        let mut feeder = Feeder::new(SmoothingParams::default());
        assert_eq!(feeder.feed("palm", 0.9, 7).len(), 1);
        feeder.engine.reset();
        assert_eq!(feeder.feed("fist", 0.9, 7).len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        let bad = SmoothingParams {
            required_agreement: 11,
            ..SmoothingParams::default()
        };
        assert!(bad.validate().is_err());

        let bad = SmoothingParams {
            confidence_threshold: 1.5,
            ..SmoothingParams::default()
        };
        assert!(bad.validate().is_err());

        assert!(SmoothingParams::default().validate().is_ok());
    }
}
