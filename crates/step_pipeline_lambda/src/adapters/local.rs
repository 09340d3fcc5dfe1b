use std::time::Duration;

use step_pipeline_core::{PipelineError, StepKind};

use crate::adapters::invoke::StepInvoker;
use crate::handlers::step::handle_step_bytes;

/// Runs the step handlers in process. Steps are pure arithmetic, so the
/// budget is only checked by the orchestrator after the call returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStepInvoker;

impl StepInvoker for LocalStepInvoker {
    fn invoke_step(
        &self,
        step: StepKind,
        payload: &[u8],
        _budget: Duration,
    ) -> Result<Vec<u8>, PipelineError> {
        handle_step_bytes(step, payload)
    }
}
