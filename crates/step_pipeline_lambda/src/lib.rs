//! AWS-oriented adapters and handlers for the three-step workflow.
//!
//! This crate owns runtime integration details (Lambda handlers, the step
//! invoker seam, and structured logging setup). Payload validation and the
//! arithmetic itself live in `step_pipeline_core`.

pub mod adapters;
pub mod handlers;
pub mod logging;
