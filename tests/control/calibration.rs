use std::sync::Arc;

use serde_json::json;

use roadmap_engine::{
    config::{ControlConfig, EvaluationConfig, GoldenTask},
    control::{CalibrationRunner, ControlLoop, FreezeOrigin, SystemMode, SystemStatusHandle},
    curriculum::{Difficulty, QuestionType},
    evaluation::EvaluationPipeline,
    telemetry::NoopTelemetrySink,
    testing::{ScriptedEvaluator, evaluation_result, fixed_now},
};

fn golden(task_id: &str, expected_score: f64, fingerprint: Option<&str>) -> GoldenTask {
    GoldenTask {
        task_id: task_id.to_string(),
        description: String::new(),
        skill: "python".to_string(),
        difficulty: Difficulty::Easy,
        question_type: QuestionType::Coding,
        submission: json!({ "code": "print('hi')" }),
        expected_score,
        tolerance: 0.1,
        is_failure_case: false,
        evaluator_fingerprint: fingerprint.map(str::to_string),
    }
}

fn runner(tasks: Vec<GoldenTask>) -> (CalibrationRunner, Arc<ScriptedEvaluator>, Arc<ControlLoop>) {
    let evaluator = Arc::new(ScriptedEvaluator::new());
    let pipeline = Arc::new(EvaluationPipeline::new(
        evaluator.clone(),
        EvaluationConfig::default(),
    ));
    let control = Arc::new(ControlLoop::new(
        ControlConfig::default(),
        SystemStatusHandle::new(fixed_now()),
        fixed_now(),
    ));
    let runner = CalibrationRunner::new(
        pipeline,
        control.clone(),
        tasks,
        Arc::new(NoopTelemetrySink),
    );
    (runner, evaluator, control)
}

#[tokio::test]
async fn given_evaluator_within_tolerance_when_cycle_runs_then_every_task_passes() {
    let (runner, evaluator, control) = runner(vec![
        golden("golden-a", 0.9, None),
        golden("golden-b", 0.95, Some("grader:v1")),
    ]);
    evaluator.set_fallback(evaluation_result(0.95, 0.9));

    let report = runner.run_cycle(fixed_now()).await;

    assert_eq!(evaluator.calls(), 2);
    assert_eq!(report.failures, 0);
    assert!(report.outcomes.iter().all(|outcome| outcome.passed_check));
    assert_eq!(report.decision.mode_after, SystemMode::Normal);
    assert_eq!(control.consecutive_passes(), 1);
}

#[tokio::test]
async fn given_score_outside_tolerance_when_cycle_runs_then_system_freezes() {
    let (runner, evaluator, control) = runner(vec![golden("golden-a", 0.2, None)]);
    evaluator.set_fallback(evaluation_result(0.95, 0.9));

    let report = runner.run_cycle(fixed_now()).await;

    assert_eq!(report.failures, 1);
    let outcome = &report.outcomes[0];
    assert!(!outcome.passed_check);
    assert_eq!(outcome.actual_score, Some(0.95));
    assert!(outcome.drift.is_some_and(|drift| drift > 0.7));
    assert_eq!(report.decision.mode_after, SystemMode::Frozen);
    assert_eq!(
        control.status().freeze_origin,
        Some(FreezeOrigin::Calibration)
    );
}

#[tokio::test]
async fn given_unexpected_evaluator_fingerprint_when_cycle_runs_then_task_fails() {
    let (runner, evaluator, _control) = runner(vec![golden("golden-a", 0.95, Some("grader:v2"))]);
    evaluator.set_fallback(evaluation_result(0.95, 0.9));

    let report = runner.run_cycle(fixed_now()).await;

    let outcome = &report.outcomes[0];
    assert!(!outcome.passed_check);
    assert!(outcome.drift.is_none());
    assert!(
        outcome
            .error
            .as_deref()
            .is_some_and(|error| error.contains("grader:v1"))
    );
}

#[tokio::test]
async fn given_unreachable_evaluator_when_cycle_runs_then_error_counts_as_failure() {
    let (runner, _evaluator, _control) = runner(vec![golden("golden-a", 0.9, None)]);

    let report = runner.run_cycle(fixed_now()).await;

    assert_eq!(report.failures, 1);
    assert!(report.outcomes[0].actual_score.is_none());
    assert!(report.outcomes[0].error.is_some());
    assert_eq!(report.decision.mode_after, SystemMode::Frozen);
}
