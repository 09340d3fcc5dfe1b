//! Shared step pipeline domain primitives.
//!
//! This crate owns the payload contract threaded through the three-step
//! workflow, the step handlers themselves, the error taxonomy, and the
//! environment-driven configuration. It intentionally excludes AWS SDK and
//! Lambda runtime concerns; those live in `step_pipeline_lambda`.

pub mod config;
pub mod contract;
pub mod error;
pub mod steps;

pub use config::PipelineConfig;
pub use contract::{RunContext, StepPayload, StepRecord, WorkflowReport};
pub use error::{ConfigError, PipelineError, TimeoutScope};
pub use steps::{check_step_output, handler_for, StepHandler, StepKind};
