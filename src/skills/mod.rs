pub mod delta;
pub mod engine;
pub mod types;

pub use delta::compute_skill_deltas;
pub use engine::{DeltaAdjustment, SkillEvidence, SkillUpdate, SkillUpdateEngine, SkillUpdatePlan};
pub use types::{DecayPolicy, EvidenceSummary, LearningState, SkillDeltas, SkillEntry, SourceMix};
