pub mod ports;
pub mod service;
pub mod types;

pub use ports::{HintGeneratorPort, HintRequest, NoopHintGenerator};
pub use service::SlotOrchestrator;
pub use types::{
    CompleteSlotResult, ReinstateResult, RemediateSlotResult, StartSlotResult, SubmitSlotResult,
};
