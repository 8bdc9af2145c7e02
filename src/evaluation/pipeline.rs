use std::{collections::BTreeSet, sync::Arc};

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    config::EvaluationConfig,
    curriculum::{Difficulty, QuestionType, TaskTemplate},
    error::{EngineError, evaluator_error},
    evaluation::{
        consistency::{
            has_directional_drift, has_score_drift, is_edge_case, round_to, stability_factor,
        },
        ports::EvaluatorPort,
        types::{
            AIEvaluationResult, EvaluationContext, EvaluationOutcome, EvaluationRequest,
            IntegrityPenalty, Submission,
        },
    },
    roadmap::{EvaluationSnapshot, SlotFlag, TaskInstance, TaskSlot},
};

pub const DRIFT_NOTICE: &str = "We rechecked your solution to ensure fairness.";
pub const LOW_CONFIDENCE_NOTICE: &str = "Your answer was reviewed carefully due to ambiguity.";

pub struct EvaluationPipeline {
    evaluator: Arc<dyn EvaluatorPort>,
    config: EvaluationConfig,
}

impl EvaluationPipeline {
    pub fn new(evaluator: Arc<dyn EvaluatorPort>, config: EvaluationConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        pass_score: f64,
    ) -> Result<(AIEvaluationResult, bool), EngineError> {
        let first = self.call_evaluator(request).await?;
        if !is_edge_case(first.score, pass_score, self.config.edge_case_band) {
            return Ok((first, false));
        }

        debug!(
            target: "evaluation",
            task_instance_id = %request.context.task_instance_id,
            score = first.score,
            pass_score = pass_score,
            "edge_case_second_pass"
        );
        let second = self.call_evaluator(request).await?;
        Ok((merge_evaluations(first, second), true))
    }

    pub async fn run(
        &self,
        slot: &mut TaskSlot,
        instance: &TaskInstance,
        template: Option<&TaskTemplate>,
        submission: &Submission,
        pass_score: f64,
        now: OffsetDateTime,
    ) -> Result<EvaluationOutcome, EngineError> {
        let request = EvaluationRequest {
            question_type: instance.question_type,
            context: EvaluationContext {
                task_instance_id: instance.task_instance_id.clone(),
                skill: instance.skill.clone(),
                difficulty: instance.difficulty,
            },
            prompt: template.map(|template| template.prompt.clone()),
            submission: submission.payload.clone(),
        };
        let (mut evaluation, double_pass_used) = self.evaluate(&request, pass_score).await?;
        let raw_score = evaluation.score;

        // 1. history
        slot.push_snapshot(EvaluationSnapshot {
            submission_id: submission.submission_id.clone(),
            score: evaluation.score,
            confidence: evaluation.confidence,
            is_partial_credit: evaluation.partial_credit > 0.0,
            evaluated_at: now,
        });

        // 2. drift flags
        slot.flags.clear();
        if double_pass_used {
            slot.flags.insert(SlotFlag::DoublePassUsed);
        }
        let scores = slot.history_scores();
        if has_score_drift(&scores) || has_directional_drift(&scores) {
            slot.flags.insert(SlotFlag::ScoreDriftDetected);
        }

        // 3. confidence decay
        let stability = stability_factor(&scores);
        evaluation.confidence = round_to(evaluation.confidence * stability, 2);
        if evaluation.confidence < self.config.low_confidence_threshold {
            slot.flags.insert(SlotFlag::LowConfidenceEvaluation);
        }

        // 4. user-facing notice
        let notice = if slot.has_flag(SlotFlag::ScoreDriftDetected) {
            Some(DRIFT_NOTICE.to_string())
        } else if slot.has_flag(SlotFlag::LowConfidenceEvaluation) {
            Some(LOW_CONFIDENCE_NOTICE.to_string())
        } else {
            None
        };
        slot.user_message = notice.clone();

        // 5. integrity penalties
        let mut penalties = Vec::new();
        if submission.hint_used {
            evaluation.score *= self.config.hint_penalty;
            penalties.push(IntegrityPenalty::HintUsed {
                factor: self.config.hint_penalty,
            });
        }
        let suspiciously_fast = submission
            .time_spent_seconds
            .is_some_and(|seconds| seconds < self.config.fast_submission_seconds);
        if suspiciously_fast
            && !self.fast_submission_exempt(
                instance.question_type,
                instance.difficulty,
                slot.remediation.is_reattempt(),
            )
        {
            evaluation.score *= self.config.fast_submission_score_factor;
            evaluation.confidence *= self.config.fast_submission_confidence_factor;
            penalties.push(IntegrityPenalty::FastSubmission {
                score_factor: self.config.fast_submission_score_factor,
                confidence_factor: self.config.fast_submission_confidence_factor,
            });
        }

        // 6. mastery threshold
        let passed = evaluation.score >= pass_score;
        let lower_bound = pass_score - self.config.near_miss_band;
        let near_miss = !passed && evaluation.score >= lower_bound && pass_score > lower_bound;
        if near_miss {
            evaluation.partial_credit =
                ((evaluation.score - lower_bound) / (pass_score - lower_bound)).clamp(0.0, 1.0);
        }
        if passed != evaluation.passed {
            debug!(
                target: "evaluation",
                task_instance_id = %instance.task_instance_id,
                evaluator_passed = evaluation.passed,
                passed = passed,
                "pass_verdict_overridden_by_mastery_policy"
            );
            evaluation.passed = passed;
        }

        let flags: BTreeSet<SlotFlag> = slot.flags.clone();
        info!(
            target: "evaluation",
            task_instance_id = %instance.task_instance_id,
            slot_id = %slot.slot_id,
            raw_score = raw_score,
            score = evaluation.score,
            confidence = evaluation.confidence,
            passed = evaluation.passed,
            double_pass_used = double_pass_used,
            penalties = penalties.len(),
            flags = ?flags.iter().map(SlotFlag::as_str).collect::<Vec<_>>(),
            "evaluation_finalized"
        );

        Ok(EvaluationOutcome {
            evaluation,
            double_pass_used,
            pass_score,
            raw_score,
            stability_factor: stability,
            penalties,
            near_miss,
            flags,
            notice,
        })
    }

    fn fast_submission_exempt(
        &self,
        question_type: QuestionType,
        difficulty: Difficulty,
        reattempt: bool,
    ) -> bool {
        self.config
            .fast_submission_exempt_question_types
            .contains(&question_type)
            || self
                .config
                .fast_submission_exempt_difficulties
                .contains(&difficulty)
            || (self.config.fast_submission_exempt_reattempts && reattempt)
    }

    async fn call_evaluator(
        &self,
        request: &EvaluationRequest,
    ) -> Result<AIEvaluationResult, EngineError> {
        let result = self.evaluator.evaluate(request.clone()).await.map_err(|err| {
            warn!(
                target: "evaluation",
                task_instance_id = %request.context.task_instance_id,
                error = %err,
                "evaluator_call_failed"
            );
            err
        })?;
        result.validate().map_err(|err| {
            evaluator_error(format!("evaluator returned out-of-range values: {err}"))
        })?;
        Ok(result)
    }
}

pub fn merge_evaluations(a: AIEvaluationResult, b: AIEvaluationResult) -> AIEvaluationResult {
    let detected_concepts: BTreeSet<String> = a
        .detected_concepts
        .iter()
        .chain(b.detected_concepts.iter())
        .cloned()
        .collect();
    let mistakes: BTreeSet<String> = a.mistakes.iter().chain(b.mistakes.iter()).cloned().collect();

    AIEvaluationResult {
        passed: a.passed && b.passed,
        score: round_to((a.score + b.score) / 2.0, 2),
        confidence: a.confidence.min(b.confidence),
        partial_credit: a.partial_credit.max(b.partial_credit),
        feedback: format!("Double check: {} | {}", a.feedback, b.feedback),
        detected_concepts: detected_concepts.into_iter().collect(),
        mistakes: mistakes.into_iter().collect(),
        model_name: a.model_name,
        model_version: a.model_version,
        prompt_version: a.prompt_version,
        temperature: a.temperature,
    }
}
