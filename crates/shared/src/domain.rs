use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "/rti";

/// Logical topic multiplexed over the shared physical connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid namespace {0:?}: must be empty or start with '/'")]
pub struct InvalidNamespace(pub String);

impl Namespace {
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidNamespace> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self(String::new()));
        }
        if !trimmed.starts_with('/') || trimmed.chars().any(char::is_whitespace) {
            return Err(InvalidNamespace(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = InvalidNamespace;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        value.0
    }
}

/// Ensemble sequence number as reported by the instrument. Some firmware
/// reports it as text, so both encodings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnsembleNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for EnsembleNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Abscissa of a plot sample: a plain number or a timestamp string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlotValue {
    Number(f64),
    Text(String),
}

impl From<f64> for PlotValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PlotValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for PlotValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for PlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub x: PlotValue,
    pub y: f64,
}

impl PlotPoint {
    pub fn new(x: impl Into<PlotValue>, y: f64) -> Self {
        Self { x: x.into(), y }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }
}
