use std::time::Duration;

use step_pipeline_core::{PipelineError, StepKind};

/// Runs one step with a JSON payload and returns the step's JSON response.
///
/// `budget` is the longest the call may take. Implementations that can cancel
/// the call should return `PipelineError::Timeout` once it elapses.
pub trait StepInvoker {
    fn invoke_step(
        &self,
        step: StepKind,
        payload: &[u8],
        budget: Duration,
    ) -> Result<Vec<u8>, PipelineError>;
}

impl<F> StepInvoker for F
where
    F: Fn(StepKind, &[u8], Duration) -> Result<Vec<u8>, PipelineError>,
{
    fn invoke_step(
        &self,
        step: StepKind,
        payload: &[u8],
        budget: Duration,
    ) -> Result<Vec<u8>, PipelineError> {
        self(step, payload, budget)
    }
}
