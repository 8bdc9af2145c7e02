use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::{
    config::GoldenTask,
    control::control_loop::{ControlDecision, ControlLoop},
    evaluation::{EvaluationContext, EvaluationPipeline, EvaluationRequest},
    telemetry::{EngineTelemetryEvent, TelemetrySink},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldenTaskOutcome {
    pub task_id: String,
    pub expected_score: f64,
    pub actual_score: Option<f64>,
    pub drift: Option<f64>,
    pub passed_check: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    #[serde(with = "time::serde::rfc3339")]
    pub ran_at: OffsetDateTime,
    pub failures: usize,
    pub outcomes: Vec<GoldenTaskOutcome>,
    pub decision: ControlDecision,
}

pub struct CalibrationRunner {
    pipeline: Arc<EvaluationPipeline>,
    control: Arc<ControlLoop>,
    golden_tasks: Vec<GoldenTask>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl CalibrationRunner {
    pub fn new(
        pipeline: Arc<EvaluationPipeline>,
        control: Arc<ControlLoop>,
        golden_tasks: Vec<GoldenTask>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            pipeline,
            control,
            golden_tasks,
            telemetry,
        }
    }

    #[tracing::instrument(name = "calibration_cycle", target = "calibration", skip(self))]
    pub async fn run_cycle(&self, now: OffsetDateTime) -> CalibrationReport {
        let outcomes: Vec<GoldenTaskOutcome> =
            join_all(self.golden_tasks.iter().map(|task| self.check_task(task))).await;

        let failures = outcomes.iter().filter(|outcome| !outcome.passed_check).count();
        let decision = self.control.record_calibration(failures, now);
        info!(
            target: "calibration",
            tasks = outcomes.len(),
            failures = failures,
            mode_before = decision.mode_before.as_str(),
            mode_after = decision.mode_after.as_str(),
            consecutive_passes = decision.consecutive_passes,
            "calibration_cycle_completed"
        );

        let report = CalibrationReport {
            ran_at: now,
            failures,
            outcomes,
            decision,
        };
        self.telemetry.on_event(EngineTelemetryEvent::CalibrationRun {
            failures: report.failures,
            mode_before: report.decision.mode_before,
            mode_after: report.decision.mode_after,
        });
        if report.decision.mode_before != report.decision.mode_after {
            self.telemetry.on_event(EngineTelemetryEvent::ModeTransition {
                from: report.decision.mode_before,
                to: report.decision.mode_after,
            });
        }
        report
    }

    async fn check_task(&self, task: &GoldenTask) -> GoldenTaskOutcome {
        let request = EvaluationRequest {
            question_type: task.question_type,
            context: EvaluationContext {
                task_instance_id: task.task_id.clone(),
                skill: task.skill.clone(),
                difficulty: task.difficulty,
            },
            prompt: None,
            submission: task.submission.clone(),
        };
        let pass_score = self.pipeline.config().default_pass_score;

        let result = match self.pipeline.evaluate(&request, pass_score).await {
            Ok((result, _)) => result,
            Err(err) => {
                error!(target: "calibration", task_id = %task.task_id, error = %err, "golden_task_errored");
                return GoldenTaskOutcome {
                    task_id: task.task_id.clone(),
                    expected_score: task.expected_score,
                    actual_score: None,
                    drift: None,
                    passed_check: false,
                    error: Some(err.to_string()),
                };
            }
        };

        if let Some(expected) = task.evaluator_fingerprint.as_deref() {
            let actual = result.fingerprint();
            if actual != expected {
                error!(
                    target: "calibration",
                    task_id = %task.task_id,
                    expected = expected,
                    actual = %actual,
                    "golden_task_fingerprint_mismatch"
                );
                return GoldenTaskOutcome {
                    task_id: task.task_id.clone(),
                    expected_score: task.expected_score,
                    actual_score: Some(result.score),
                    drift: None,
                    passed_check: false,
                    error: Some(format!(
                        "fingerprint mismatch: expected {expected}, got {actual}"
                    )),
                };
            }
        }

        let drift = (result.score - task.expected_score).abs();
        let passed_check = drift <= task.tolerance;
        if !passed_check {
            error!(
                target: "calibration",
                task_id = %task.task_id,
                expected = task.expected_score,
                actual = result.score,
                drift = drift,
                "golden_task_out_of_tolerance"
            );
        }
        GoldenTaskOutcome {
            task_id: task.task_id.clone(),
            expected_score: task.expected_score,
            actual_score: Some(result.score),
            drift: Some(drift),
            passed_check,
            error: None,
        }
    }
}
