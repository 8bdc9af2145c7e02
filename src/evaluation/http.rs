use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::debug;

use crate::{
    error::{EngineError, configuration_error, evaluator_error},
    evaluation::{
        ports::EvaluatorPort,
        types::{AIEvaluationResult, EvaluationRequest},
    },
};

#[derive(Clone)]
pub struct HttpEvaluator {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpEvaluator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(configuration_error("evaluator endpoint must not be empty"));
        }
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| configuration_error(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl EvaluatorPort for HttpEvaluator {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<AIEvaluationResult, EngineError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-task-instance-id", &request.context.task_instance_id)
            .json(&request)
            .send()
            .await
            .map_err(|err| evaluator_error(format!("evaluator request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| evaluator_error(format!("failed to read evaluator response: {err}")))?;
        if !status.is_success() {
            return Err(evaluator_error(format!(
                "evaluator responded with status {}: {}",
                status.as_u16(),
                body
            )));
        }

        debug!(
            target: "evaluation",
            task_instance_id = %request.context.task_instance_id,
            bytes = body.len(),
            "evaluator_response_received"
        );
        parse_evaluation(&body)
    }
}

pub fn parse_evaluation(body: &str) -> Result<AIEvaluationResult, EngineError> {
    serde_json::from_str(body)
        .map_err(|err| evaluator_error(format!("malformed evaluator response: {err}")))
}
