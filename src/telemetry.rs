use serde::Serialize;
use tracing::info;

use crate::{
    control::SystemMode,
    roadmap::{RoadmapStatus, SlotFlag, SlotStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Pass,
    Fail,
    Remediation,
    Locked,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Pass => "PASS",
            DecisionOutcome::Fail => "FAIL",
            DecisionOutcome::Remediation => "REMEDIATION",
            DecisionOutcome::Locked => "LOCKED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionTrace {
    pub user_id: String,
    pub slot_id: String,
    pub task_instance_id: String,
    pub raw_score: f64,
    pub final_score: f64,
    pub confidence: f64,
    pub pass_score: f64,
    pub rules_triggered: Vec<String>,
    pub flags: Vec<SlotFlag>,
    pub outcome: DecisionOutcome,
    pub slot_status: SlotStatus,
    pub roadmap_status: RoadmapStatus,
    pub user_message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EngineTelemetryEvent {
    EvaluationFinalized {
        user_id: String,
        slot_id: String,
        score: f64,
        confidence: f64,
        passed: bool,
        double_pass_used: bool,
    },
    SkillUpdateApplied {
        user_id: String,
        skills: usize,
    },
    SkillUpdateSuppressed {
        user_id: String,
        mode: SystemMode,
    },
    ModeTransition {
        from: SystemMode,
        to: SystemMode,
    },
    CalibrationRun {
        failures: usize,
        mode_before: SystemMode,
        mode_after: SystemMode,
    },
    Decision(Box<DecisionTrace>),
}

pub trait TelemetrySink: Send + Sync {
    fn on_event(&self, event: EngineTelemetryEvent);
}

#[derive(Default)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn on_event(&self, _event: EngineTelemetryEvent) {}
}

#[derive(Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn on_event(&self, event: EngineTelemetryEvent) {
        match event {
            EngineTelemetryEvent::EvaluationFinalized {
                user_id,
                slot_id,
                score,
                confidence,
                passed,
                double_pass_used,
            } => info!(
                target: "telemetry",
                user_id = %user_id,
                slot_id = %slot_id,
                score = score,
                confidence = confidence,
                passed = passed,
                double_pass_used = double_pass_used,
                "evaluation_finalized"
            ),
            EngineTelemetryEvent::SkillUpdateApplied { user_id, skills } => info!(
                target: "telemetry",
                user_id = %user_id,
                skills = skills,
                "skill_update_applied"
            ),
            EngineTelemetryEvent::SkillUpdateSuppressed { user_id, mode } => info!(
                target: "telemetry",
                user_id = %user_id,
                mode = mode.as_str(),
                "skill_update_suppressed"
            ),
            EngineTelemetryEvent::ModeTransition { from, to } => info!(
                target: "telemetry",
                from = from.as_str(),
                to = to.as_str(),
                "mode_transition"
            ),
            EngineTelemetryEvent::CalibrationRun {
                failures,
                mode_before,
                mode_after,
            } => info!(
                target: "telemetry",
                failures = failures,
                mode_before = mode_before.as_str(),
                mode_after = mode_after.as_str(),
                "calibration_run"
            ),
            EngineTelemetryEvent::Decision(trace) => match serde_json::to_string(&trace) {
                Ok(payload) => info!(
                    target: "telemetry",
                    outcome = trace.outcome.as_str(),
                    trace = %payload,
                    "decision_trace"
                ),
                Err(err) => info!(
                    target: "telemetry",
                    outcome = trace.outcome.as_str(),
                    error = %err,
                    "decision_trace_unserializable"
                ),
            },
        }
    }
}
