pub mod consistency;
pub mod http;
pub mod pipeline;
pub mod ports;
pub mod types;

pub use http::HttpEvaluator;
pub use pipeline::{EvaluationPipeline, merge_evaluations};
pub use ports::{EvaluatorPort, UnavailableEvaluator};
pub use types::{
    AIEvaluationResult, EvaluationContext, EvaluationOutcome, EvaluationRequest, IntegrityPenalty,
    Submission,
};
