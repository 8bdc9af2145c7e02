use roadmap_engine::{
    error::{EngineErrorKind, evaluator_error},
    evaluation::{http::parse_evaluation, merge_evaluations},
    roadmap::{EvaluationSnapshot, MAX_EVALUATION_HISTORY, SlotFlag},
    testing::{evaluation_result, fixed_now, submission},
};

use crate::{approx, pipeline, started};

#[tokio::test]
async fn given_clear_pass_when_run_then_single_call_decides_and_history_grows() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.9, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert_eq!(evaluator.calls(), 1);
    assert!(outcome.evaluation.passed);
    assert!(!outcome.double_pass_used);
    assert!(!outcome.near_miss);
    assert!(outcome.penalties.is_empty());
    assert!(outcome.flags.is_empty());
    assert!(outcome.notice.is_none());
    assert_eq!(outcome.stability_factor, 1.0);
    assert_eq!(slot.evaluation_history.len(), 1);
    assert_eq!(slot.evaluation_history[0].submission_id, "s-1");

    let request = &evaluator.requests()[0];
    assert_eq!(request.context.task_instance_id, instance.task_instance_id);
    assert_eq!(request.prompt.as_deref(), Some("Solve py-loops"));
}

#[tokio::test]
async fn given_evaluator_verdict_disagreeing_with_pass_score_when_run_then_pass_score_wins() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    let mut verdict = evaluation_result(0.9, 0.9);
    verdict.passed = false;
    evaluator.push_result(verdict);
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(outcome.evaluation.passed);
}

#[tokio::test]
async fn given_score_near_pass_line_when_run_then_second_opinion_is_merged() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.62, 0.9));
    evaluator.push_result(evaluation_result(0.56, 0.7));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert_eq!(evaluator.calls(), 2);
    assert!(outcome.double_pass_used);
    assert!(outcome.flags.contains(&SlotFlag::DoublePassUsed));
    assert!(approx(outcome.raw_score, 0.59));
    assert!(approx(outcome.evaluation.confidence, 0.7));
    assert!(!outcome.evaluation.passed);
    assert!(outcome.near_miss);
}

#[tokio::test]
async fn given_score_just_under_pass_line_when_run_then_partial_credit_is_granted() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.5, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert_eq!(evaluator.calls(), 1);
    assert!(!outcome.evaluation.passed);
    assert!(outcome.near_miss);
    assert!((outcome.evaluation.partial_credit - 1.0 / 3.0).abs() < 1e-6);
}

#[tokio::test]
async fn given_falling_scores_when_run_then_drift_is_flagged_and_learner_is_told() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.7, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");
    for (index, score) in [0.9, 0.8].into_iter().enumerate() {
        slot.push_snapshot(EvaluationSnapshot {
            submission_id: format!("old-{index}"),
            score,
            confidence: 0.9,
            is_partial_credit: false,
            evaluated_at: fixed_now(),
        });
    }

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &submission("s-3"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(outcome.flags.contains(&SlotFlag::ScoreDriftDetected));
    assert_eq!(
        outcome.notice.as_deref(),
        Some("We rechecked your solution to ensure fairness.")
    );
    assert_eq!(slot.user_message, outcome.notice);
}

#[tokio::test]
async fn given_unsure_evaluator_when_run_then_low_confidence_is_flagged() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.9, 0.3));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(outcome.flags.contains(&SlotFlag::LowConfidenceEvaluation));
    assert_eq!(
        outcome.notice.as_deref(),
        Some("Your answer was reviewed carefully due to ambiguity.")
    );
}

#[tokio::test]
async fn given_out_of_range_verdict_when_run_then_evaluator_error_leaves_history_untouched() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(1.4, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let err = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect_err("score above 1.0 is rejected");

    assert_eq!(err.kind, EngineErrorKind::Evaluator);
    assert!(slot.evaluation_history.is_empty());
}

#[tokio::test]
async fn given_failing_evaluator_when_run_then_error_propagates() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_error(evaluator_error("upstream timed out"));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let err = pipeline
        .run(slot, &instance, Some(&template), &submission("s-1"), 0.6, fixed_now())
        .await
        .expect_err("evaluator failure must surface");

    assert_eq!(err.kind, EngineErrorKind::Evaluator);
    assert!(err.message.contains("upstream timed out"));
}

#[tokio::test]
async fn given_many_submissions_when_run_then_history_keeps_only_the_latest() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.set_fallback(evaluation_result(0.9, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    for index in 0..MAX_EVALUATION_HISTORY + 2 {
        pipeline
            .run(
                slot,
                &instance,
                Some(&template),
                &submission(&format!("s-{index}")),
                0.6,
                fixed_now(),
            )
            .await
            .expect("evaluation should succeed");
    }

    assert_eq!(slot.evaluation_history.len(), MAX_EVALUATION_HISTORY);
    assert_eq!(
        slot.evaluation_history
            .front()
            .map(|snapshot| snapshot.submission_id.as_str()),
        Some("s-2")
    );
}

#[test]
fn given_two_verdicts_when_merged_then_result_is_conservative() {
    let mut first = evaluation_result(0.7, 0.9);
    first.mistakes = vec!["off by one".to_string()];
    let mut second = evaluation_result(0.5, 0.6);
    second.detected_concepts = vec!["range".to_string(), "loops".to_string()];
    second.partial_credit = 0.3;

    let merged = merge_evaluations(first, second);

    assert!(!merged.passed);
    assert!(approx(merged.score, 0.6));
    assert!(approx(merged.confidence, 0.6));
    assert!(approx(merged.partial_credit, 0.3));
    assert_eq!(merged.detected_concepts, vec!["loops", "range"]);
    assert_eq!(merged.mistakes, vec!["off by one"]);
    assert!(merged.feedback.starts_with("Double check: "));
}

#[test]
fn given_non_json_body_when_parsed_then_evaluator_error_is_returned() {
    let err = parse_evaluation("<html>bad gateway</html>").expect_err("not json");

    assert_eq!(err.kind, EngineErrorKind::Evaluator);
}
