use std::{collections::VecDeque, sync::Mutex};

use serde::Serialize;
use time::OffsetDateTime;

use crate::evaluation::consistency::population_variance;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSignal {
    pub score: f64,
    pub confidence: f64,
    pub drift_detected: bool,
    pub directional_drift: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMetrics {
    pub samples: usize,
    pub score_std_dev: f64,
    pub mean_confidence: f64,
    pub directional_drift_detections: u32,
    pub drift_free_hours: f64,
}

#[derive(Debug)]
struct WindowState {
    samples: VecDeque<EvaluationSignal>,
    directional_since_cycle: u32,
    last_drift_at: Option<OffsetDateTime>,
    started_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct SignalWindow {
    capacity: usize,
    state: Mutex<WindowState>,
}

impl SignalWindow {
    pub fn new(capacity: usize, started_at: OffsetDateTime) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(WindowState {
                samples: VecDeque::new(),
                directional_since_cycle: 0,
                last_drift_at: None,
                started_at,
            }),
        }
    }

    pub fn record(&self, signal: EvaluationSignal) {
        let mut state = self.lock();
        if signal.directional_drift {
            state.directional_since_cycle += 1;
        }
        if signal.drift_detected || signal.directional_drift {
            state.last_drift_at = Some(
                state
                    .last_drift_at
                    .map_or(signal.observed_at, |last| last.max(signal.observed_at)),
            );
        }
        state.samples.push_back(signal);
        while state.samples.len() > self.capacity {
            state.samples.pop_front();
        }
    }

    pub fn metrics(&self, now: OffsetDateTime) -> SignalMetrics {
        Self::compute(&self.lock(), now)
    }

    pub fn take_cycle_metrics(&self, now: OffsetDateTime) -> SignalMetrics {
        let mut state = self.lock();
        let metrics = Self::compute(&state, now);
        state.directional_since_cycle = 0;
        metrics
    }

    fn compute(state: &WindowState, now: OffsetDateTime) -> SignalMetrics {
        let scores: Vec<f64> = state.samples.iter().map(|signal| signal.score).collect();
        let mean_confidence = if state.samples.is_empty() {
            1.0
        } else {
            state
                .samples
                .iter()
                .map(|signal| signal.confidence)
                .sum::<f64>()
                / state.samples.len() as f64
        };
        let drift_free_since = state.last_drift_at.unwrap_or(state.started_at);
        let drift_free_hours = ((now - drift_free_since).as_seconds_f64() / 3600.0).max(0.0);

        SignalMetrics {
            samples: state.samples.len(),
            score_std_dev: population_variance(&scores).sqrt(),
            mean_confidence,
            directional_drift_detections: state.directional_since_cycle,
            drift_free_hours,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
