use std::time::Instant;

use serde_json::Value;
use step_pipeline_core::{handler_for, PipelineError, StepKind, StepPayload};
use tracing::{error, info};

use crate::logging::duration_ms;

/// Decodes, transforms, and re-encodes one step invocation.
pub fn handle_step_event(step: StepKind, event: Value) -> Result<Value, PipelineError> {
    run_step(step, || StepPayload::from_value(event))?.to_value()
}

pub fn handle_step_bytes(step: StepKind, payload: &[u8]) -> Result<Vec<u8>, PipelineError> {
    run_step(step, || StepPayload::from_slice(payload))?.to_vec()
}

fn run_step(
    step: StepKind,
    decode: impl FnOnce() -> Result<StepPayload, PipelineError>,
) -> Result<StepPayload, PipelineError> {
    let started_at = Instant::now();
    info!(component = "step_handler", event = "step_started", step = %step);

    match decode().and_then(|payload| handler_for(step).apply(payload)) {
        Ok(output) => {
            info!(
                component = "step_handler",
                event = "step_completed",
                step = %step,
                derived_field = step.derived_field().unwrap_or("none"),
                duration_ms = duration_ms(started_at.elapsed()),
            );
            Ok(output)
        }
        Err(failure) => {
            error!(
                component = "step_handler",
                event = "step_failed",
                step = %step,
                error_code = failure.error_code(),
                error = %failure,
                duration_ms = duration_ms(started_at.elapsed()),
            );
            Err(failure)
        }
    }
}
