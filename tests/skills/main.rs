
use roadmap_engine::{
    control::{FreezeOrigin, SystemMode, SystemStatus},
    curriculum::{Difficulty, QuestionType},
    skills::SkillEvidence,
    testing::fixed_now,
};

pub fn evidence(difficulty: Difficulty, question_type: QuestionType) -> SkillEvidence {
    SkillEvidence {
        task_instance_id: "task-1".to_string(),
        skill: "python".to_string(),
        difficulty,
        question_type,
    }
}

pub fn status(mode: SystemMode, dampening_factor: f64) -> SystemStatus {
    SystemStatus {
        mode,
        dampening_factor,
        reason: format!("{} for test", mode.as_str()),
        entered_at: fixed_now(),
        last_checked_at: fixed_now(),
        freeze_origin: (mode == SystemMode::Frozen).then_some(FreezeOrigin::Administrative),
    }
}

pub fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}
