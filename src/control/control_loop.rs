use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    config::ControlConfig,
    control::{
        rules::{ControlInputs, ModeDecision, next_mode},
        signals::{EvaluationSignal, SignalMetrics, SignalWindow},
        status::{FreezeOrigin, SystemMode, SystemStatus, SystemStatusHandle},
    },
    error::{EngineError, invalid_request},
};

#[derive(Debug, Default)]
struct ControlState {
    consecutive_passes: u32,
    consecutive_drift_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDecision {
    pub mode_before: SystemMode,
    pub mode_after: SystemMode,
    pub consecutive_passes: u32,
    pub consecutive_drift_cycles: u32,
    pub metrics: SignalMetrics,
}

pub struct ControlLoop {
    config: ControlConfig,
    status: SystemStatusHandle,
    signals: SignalWindow,
    state: Mutex<ControlState>,
}

impl ControlLoop {
    pub fn new(config: ControlConfig, status: SystemStatusHandle, now: OffsetDateTime) -> Self {
        let signals = SignalWindow::new(config.signal_window_capacity, now);
        Self {
            config,
            status,
            signals,
            state: Mutex::new(ControlState::default()),
        }
    }

    pub fn status_handle(&self) -> SystemStatusHandle {
        self.status.clone()
    }

    pub fn status(&self) -> Arc<SystemStatus> {
        self.status.snapshot()
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn signals(&self) -> &SignalWindow {
        &self.signals
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.lock_state().consecutive_passes
    }

    pub fn record_evaluation(&self, signal: EvaluationSignal) {
        self.signals.record(signal);
    }

    pub fn record_calibration(&self, failures: usize, now: OffsetDateTime) -> ControlDecision {
        let mut state = self.lock_state();
        let metrics = self.signals.take_cycle_metrics(now);
        let before = self.status.snapshot();

        if metrics.directional_drift_detections > 0 {
            state.consecutive_drift_cycles += 1;
        } else {
            state.consecutive_drift_cycles = 0;
        }

        let golden_failure = failures > 0;
        if golden_failure {
            state.consecutive_passes = 0;
        } else {
            state.consecutive_passes += 1;
        }

        match before.mode {
            SystemMode::Frozen => {
                let calibration_freeze = before.freeze_origin == Some(FreezeOrigin::Calibration);
                if !golden_failure
                    && calibration_freeze
                    && state.consecutive_passes >= self.config.recovery_passes
                {
                    self.status.transition(
                        SystemMode::Normal,
                        format!(
                            "system stabilized after {} consecutive calibration passes",
                            state.consecutive_passes
                        ),
                        None,
                        None,
                        now,
                    );
                    info!(target: "control", passes = state.consecutive_passes, "freeze_lifted");
                } else {
                    self.status.mark_checked(now);
                    info!(
                        target: "control",
                        passes = state.consecutive_passes,
                        required = self.config.recovery_passes,
                        origin = ?before.freeze_origin,
                        "system_remains_frozen"
                    );
                }
            }
            _ if golden_failure && self.config.freeze_on_golden_failure => {
                self.status.transition(
                    SystemMode::Frozen,
                    format!("{failures} golden task(s) failed calibration"),
                    None,
                    Some(FreezeOrigin::Calibration),
                    now,
                );
                error!(target: "control", failures = failures, "evaluator_drift_detected_freezing");
            }
            current => {
                let inputs = ControlInputs {
                    metrics: metrics.clone(),
                    golden_failure,
                    golden_stable: !golden_failure,
                    consecutive_passes: state.consecutive_passes,
                    consecutive_drift_cycles: state.consecutive_drift_cycles,
                };
                match next_mode(current, &inputs, &self.config) {
                    ModeDecision::Stay => {
                        self.status.mark_checked(now);
                    }
                    ModeDecision::Transition {
                        to,
                        reason,
                        dampening_factor,
                    } => {
                        warn!(
                            target: "control",
                            from = current.as_str(),
                            to = to.as_str(),
                            reason = %reason,
                            "mode_transition"
                        );
                        self.status
                            .transition(to, reason, Some(dampening_factor), None, now);
                    }
                }
            }
        }

        ControlDecision {
            mode_before: before.mode,
            mode_after: self.status.snapshot().mode,
            consecutive_passes: state.consecutive_passes,
            consecutive_drift_cycles: state.consecutive_drift_cycles,
            metrics,
        }
    }

    pub fn freeze(&self, reason: impl Into<String>, now: OffsetDateTime) -> Arc<SystemStatus> {
        let _state = self.lock_state();
        let reason = reason.into();
        warn!(target: "control", reason = %reason, "administrative_freeze");
        self.status.transition(
            SystemMode::Frozen,
            reason,
            None,
            Some(FreezeOrigin::Administrative),
            now,
        )
    }

    pub fn unfreeze(&self, reason: impl Into<String>, now: OffsetDateTime) -> Arc<SystemStatus> {
        let mut state = self.lock_state();
        state.consecutive_drift_cycles = 0;
        let reason = reason.into();
        info!(target: "control", reason = %reason, "administrative_unfreeze");
        self.status
            .transition(SystemMode::Normal, reason, None, None, now)
    }

    pub fn set_dampening(
        &self,
        factor: f64,
        reason: impl Into<String>,
        now: OffsetDateTime,
    ) -> Result<Arc<SystemStatus>, EngineError> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(invalid_request(format!(
                "dampening factor {factor} outside [0, 1]"
            )));
        }
        let _state = self.lock_state();
        let reason = reason.into();
        info!(target: "control", factor = factor, reason = %reason, "administrative_dampening");
        Ok(self
            .status
            .transition(SystemMode::Dampened, reason, Some(factor), None, now))
    }

    fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
