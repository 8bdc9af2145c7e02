use crate::{
    curriculum::{Difficulty, QuestionType},
    evaluation::{AIEvaluationResult, consistency::round_to},
    skills::types::SkillDeltas,
};

pub const FAIL_PENALTY: f64 = -0.05;
pub const MIN_PASS_SCORE: f64 = 0.6;
pub const HIGH_SCORE_THRESHOLD: f64 = 0.9;
pub const HIGH_SCORE_BONUS: f64 = 0.05;

pub fn base_delta(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.10,
        Difficulty::Medium => 0.15,
        Difficulty::Hard => 0.20,
    }
}

pub fn trust_multiplier(question_type: QuestionType) -> f64 {
    match question_type {
        QuestionType::Mcq => 0.5,
        QuestionType::Coding => 1.0,
        QuestionType::Explanation => 0.7,
    }
}

pub fn compute_skill_deltas(
    evaluation: &AIEvaluationResult,
    difficulty: Difficulty,
    skill: &str,
    question_type: QuestionType,
) -> SkillDeltas {
    let delta = if !evaluation.passed {
        if evaluation.partial_credit > 0.0 {
            FAIL_PENALTY * (1.0 - evaluation.partial_credit)
        } else {
            FAIL_PENALTY
        }
    } else if evaluation.score < MIN_PASS_SCORE {
        0.0
    } else {
        let mut delta = base_delta(difficulty) * evaluation.confidence;
        if evaluation.score >= HIGH_SCORE_THRESHOLD {
            delta += HIGH_SCORE_BONUS;
        }
        round_to(delta * trust_multiplier(question_type), 3)
    };

    SkillDeltas::from([(skill.to_string(), delta)])
}
