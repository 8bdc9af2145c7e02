pub const MIN_DRIFT_SAMPLES: usize = 3;
pub const MAX_SCORE_VARIANCE: f64 = 0.15;
pub const DIRECTIONAL_DROP: f64 = 0.15;
pub const STABLE_VARIANCE: f64 = 0.05;

pub const DRIFT_PENALTY: f64 = 0.6;
pub const LOW_CONFIDENCE_PENALTY: f64 = 0.7;

const BAND_EPSILON: f64 = 1e-9;

pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n
}

pub fn has_score_drift(scores: &[f64]) -> bool {
    scores.len() >= MIN_DRIFT_SAMPLES && population_variance(scores) > MAX_SCORE_VARIANCE
}

pub fn has_directional_drift(scores: &[f64]) -> bool {
    match (scores.first(), scores.last()) {
        (Some(first), Some(last)) if scores.len() >= MIN_DRIFT_SAMPLES => {
            *last < *first - DIRECTIONAL_DROP
        }
        _ => false,
    }
}

pub fn stability_factor(scores: &[f64]) -> f64 {
    if scores.len() < MIN_DRIFT_SAMPLES {
        return 1.0;
    }
    let variance = population_variance(scores);
    if variance < STABLE_VARIANCE {
        1.0
    } else if variance < MAX_SCORE_VARIANCE {
        0.8
    } else {
        0.5
    }
}

pub fn is_edge_case(score: f64, pass_score: f64, band: f64) -> bool {
    (score - pass_score).abs() <= band + BAND_EPSILON
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
