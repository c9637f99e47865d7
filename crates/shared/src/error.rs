use serde::{Deserialize, Serialize};

use crate::domain::InvalidNamespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidNamespace,
    Validation,
}

/// Error body returned by the relay's HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<InvalidNamespace> for ApiError {
    fn from(value: InvalidNamespace) -> Self {
        Self::new(ErrorCode::InvalidNamespace, value.to_string())
    }
}
