use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roadmap::validator::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    Validation,
    Conflict,
    Configuration,
    Evaluator,
    InvalidRequest,
    NotFound,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is_version_conflict(&self) -> bool {
        self.kind == EngineErrorKind::Conflict && self.retryable
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::new(EngineErrorKind::Validation, err.to_string())
    }
}

pub fn validation_error(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::Validation, message)
}

pub fn version_conflict(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::Conflict, message).with_retryable(true)
}

pub fn business_conflict(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::Conflict, message)
}

pub fn configuration_error(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::Configuration, message)
}

pub fn evaluator_error(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::Evaluator, message)
}

pub fn invalid_request(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::InvalidRequest, message)
}

pub fn not_found(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::NotFound, message)
}

pub fn internal_error(message: impl Into<String>) -> EngineError {
    EngineError::new(EngineErrorKind::Internal, message)
}
