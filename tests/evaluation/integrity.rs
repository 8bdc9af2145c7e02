use roadmap_engine::{
    curriculum::QuestionType,
    evaluation::{IntegrityPenalty, Submission},
    testing::{evaluation_result, fixed_now, submission},
};

use crate::{approx, pipeline, started};

fn rushed(submission_id: &str) -> Submission {
    Submission {
        time_spent_seconds: Some(4.0),
        ..submission(submission_id)
    }
}

#[tokio::test]
async fn given_hint_used_when_run_then_score_is_scaled_down() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.9, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");
    let hinted = Submission {
        hint_used: true,
        ..submission("s-1")
    };

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &hinted, 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(approx(outcome.raw_score, 0.9));
    assert!(approx(outcome.evaluation.score, 0.72));
    assert!(outcome.evaluation.passed);
    assert_eq!(
        outcome.penalties,
        vec![IntegrityPenalty::HintUsed { factor: 0.8 }]
    );
}

#[tokio::test]
async fn given_rushed_medium_coding_answer_when_run_then_score_and_confidence_are_halved() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.8, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &rushed("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(approx(outcome.evaluation.score, 0.4));
    assert!(approx(outcome.evaluation.confidence, 0.45));
    assert!(!outcome.evaluation.passed);
    assert!(!outcome.near_miss);
    assert!(matches!(
        outcome.penalties.as_slice(),
        [IntegrityPenalty::FastSubmission { .. }]
    ));
}

#[tokio::test]
async fn given_rushed_easy_answer_when_run_then_no_penalty_applies() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-vars");
    evaluator.push_result(evaluation_result(0.8, 0.9));
    let slot = roadmap.slot_mut("py-vars").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &rushed("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(outcome.penalties.is_empty());
    assert!(approx(outcome.evaluation.score, 0.8));
}

#[tokio::test]
async fn given_rushed_multiple_choice_answer_when_run_then_no_penalty_applies() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, mut instance, template) = started("py-loops");
    instance.question_type = QuestionType::Mcq;
    evaluator.push_result(evaluation_result(0.8, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &rushed("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(outcome.penalties.is_empty());
    assert_eq!(evaluator.requests()[0].question_type, QuestionType::Mcq);
}

#[tokio::test]
async fn given_rushed_reattempt_when_run_then_no_penalty_applies() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(0.8, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");
    slot.remediation.remediation_attempts = 1;

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &rushed("s-1"), 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert!(outcome.penalties.is_empty());
}

#[tokio::test]
async fn given_hint_and_rushed_answer_when_run_then_both_penalties_stack() {
    let (pipeline, evaluator) = pipeline();
    let (mut roadmap, instance, template) = started("py-loops");
    evaluator.push_result(evaluation_result(1.0, 0.9));
    let slot = roadmap.slot_mut("py-loops").expect("slot exists");
    let both = Submission {
        hint_used: true,
        ..rushed("s-1")
    };

    let outcome = pipeline
        .run(slot, &instance, Some(&template), &both, 0.6, fixed_now())
        .await
        .expect("evaluation should succeed");

    assert_eq!(outcome.penalties.len(), 2);
    assert!(approx(outcome.evaluation.score, 0.4));
    assert!(!outcome.evaluation.passed);
}
