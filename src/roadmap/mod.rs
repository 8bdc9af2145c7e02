pub mod remediation;
pub mod resolver;
pub mod transitions;
pub mod types;
pub mod validator;

pub use remediation::{RemediationPlan, RemediationPlanner, RemediationPosture};
pub use resolver::resolve_template;
pub use transitions::{PhaseTransition, RoadmapTransitions};
pub use types::{
    EvaluationSnapshot, MAX_EVALUATION_HISTORY, PhaseLockReason, PhaseState, PhaseStatus,
    RemediationProgress, RoadmapState, RoadmapStatus, SlotFlag, SlotLockReason, SlotStatus,
    TaskInstance, TaskInstanceId, TaskInstanceStatus, TaskSlot,
};
pub use validator::{ValidationError, Violation, ViolationCode, validate};
