mod calibration;
mod control_loop;

use roadmap_engine::control::{EvaluationSignal, SignalMetrics};
use time::OffsetDateTime;

pub fn healthy_metrics() -> SignalMetrics {
    SignalMetrics {
        samples: 20,
        score_std_dev: 0.1,
        mean_confidence: 0.9,
        directional_drift_detections: 0,
        drift_free_hours: 48.0,
    }
}

pub fn signal(score: f64, directional_drift: bool, observed_at: OffsetDateTime) -> EvaluationSignal {
    EvaluationSignal {
        score,
        confidence: 0.9,
        drift_detected: false,
        directional_drift,
        observed_at,
    }
}
