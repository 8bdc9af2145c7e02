use serde::Serialize;

use crate::{
    config::ControlConfig,
    control::{signals::SignalMetrics, status::SystemMode},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlInputs {
    pub metrics: SignalMetrics,
    pub golden_failure: bool,
    pub golden_stable: bool,
    pub consecutive_passes: u32,
    pub consecutive_drift_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ModeDecision {
    Stay,
    Transition {
        to: SystemMode,
        reason: String,
        dampening_factor: f64,
    },
}

/// Automatic transitions. FROZEN is never entered or left here.
pub fn next_mode(
    current: SystemMode,
    inputs: &ControlInputs,
    config: &ControlConfig,
) -> ModeDecision {
    match current {
        SystemMode::Normal => match unhealthy_signals(inputs, config) {
            Some(reason) => ModeDecision::Transition {
                to: SystemMode::Dampened,
                reason,
                dampening_factor: config.dampened_factor,
            },
            None => ModeDecision::Stay,
        },
        SystemMode::Dampened => {
            if inputs.golden_failure {
                ModeDecision::Transition {
                    to: SystemMode::SafeMode,
                    reason: "golden task failure while dampened".to_string(),
                    dampening_factor: config.safe_mode_factor,
                }
            } else if inputs.consecutive_drift_cycles >= config.drift_persistence_cycles {
                ModeDecision::Transition {
                    to: SystemMode::SafeMode,
                    reason: format!(
                        "directional drift persisted for {} calibration cycles",
                        inputs.consecutive_drift_cycles
                    ),
                    dampening_factor: config.safe_mode_factor,
                }
            } else if healthy_signals(inputs, config)
                && inputs.golden_stable
                && inputs.consecutive_passes >= config.recovery_passes
            {
                ModeDecision::Transition {
                    to: SystemMode::Normal,
                    reason: "evaluation signals back within thresholds".to_string(),
                    dampening_factor: 1.0,
                }
            } else {
                ModeDecision::Stay
            }
        }
        SystemMode::SafeMode => {
            if inputs.consecutive_passes >= config.recovery_passes
                && inputs.golden_stable
                && inputs.metrics.drift_free_hours >= config.drift_free_hours as f64
            {
                ModeDecision::Transition {
                    to: SystemMode::Normal,
                    reason: format!(
                        "{} consecutive calibration passes and {:.1}h drift-free",
                        inputs.consecutive_passes, inputs.metrics.drift_free_hours
                    ),
                    dampening_factor: 1.0,
                }
            } else {
                ModeDecision::Stay
            }
        }
        SystemMode::Frozen => ModeDecision::Stay,
    }
}

fn unhealthy_signals(inputs: &ControlInputs, config: &ControlConfig) -> Option<String> {
    let metrics = &inputs.metrics;
    if metrics.samples < config.min_samples {
        return None;
    }
    if metrics.score_std_dev > config.score_std_dev_threshold {
        return Some(format!(
            "global score std dev {:.3} above {:.3}",
            metrics.score_std_dev, config.score_std_dev_threshold
        ));
    }
    if metrics.mean_confidence < config.confidence_floor {
        return Some(format!(
            "mean evaluator confidence {:.3} below {:.3}",
            metrics.mean_confidence, config.confidence_floor
        ));
    }
    None
}

fn healthy_signals(inputs: &ControlInputs, config: &ControlConfig) -> bool {
    inputs.metrics.samples >= config.min_samples && unhealthy_signals(inputs, config).is_none()
}
