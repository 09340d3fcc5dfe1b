use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::steps::StepKind;

/// What a timeout was measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    Step(StepKind),
    Run,
}

impl fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "step {step}"),
            Self::Run => f.write_str("run"),
        }
    }
}

/// Faults raised while decoding, transforming, or invoking a step.
///
/// None of these are retried. Any of them aborts the remaining sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` must be a number, found {found}")]
    TypeMismatch { field: String, found: String },

    #[error("{scope} exceeded its time limit of {}ms", .limit.as_millis())]
    Timeout { scope: TimeoutScope, limit: Duration },

    #[error("{step} produced a non-finite `{field}`")]
    NonFiniteResult { step: StepKind, field: String },

    #[error("field `{field}` is not a finite number")]
    NonFiniteValue { field: String },

    #[error("{step} failed: {message}")]
    StepFailed { step: StepKind, message: String },

    #[error("{step} broke the payload contract: {message}")]
    ContractViolation { step: StepKind, message: String },

    #[error("payload is not valid JSON: {0}")]
    Encoding(String),

    #[error("unknown step `{0}`")]
    UnknownStep(String),
}

impl PipelineError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            found: found.into(),
        }
    }

    /// Stable machine-readable code used in structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::Timeout { .. } => "timeout",
            Self::NonFiniteResult { .. } => "non_finite_result",
            Self::NonFiniteValue { .. } => "non_finite_value",
            Self::StepFailed { .. } => "step_failed",
            Self::ContractViolation { .. } => "contract_violation",
            Self::Encoding(_) => "encoding_error",
            Self::UnknownStep(_) => "unknown_step",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be configured")]
    Missing { key: String },

    #[error("{key} must be a positive whole number of seconds, got `{value}`")]
    InvalidTimeout { key: String, value: String },

    #[error("{key} names an unknown step `{value}`")]
    UnknownStep { key: String, value: String },
}
