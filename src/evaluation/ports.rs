use async_trait::async_trait;

use crate::{
    error::{EngineError, evaluator_error},
    evaluation::types::{AIEvaluationResult, EvaluationRequest},
};

/// External grader. Implementations bound their own latency; a malformed or
/// failed response is an `Evaluator` error, never a partial result.
#[async_trait]
pub trait EvaluatorPort: Send + Sync {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<AIEvaluationResult, EngineError>;
}

#[derive(Default)]
pub struct UnavailableEvaluator;

#[async_trait]
impl EvaluatorPort for UnavailableEvaluator {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<AIEvaluationResult, EngineError> {
        Err(evaluator_error(format!(
            "no evaluator configured for task instance '{}'",
            request.context.task_instance_id
        )))
    }
}
