use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use step_pipeline_core::config::{resolve_step_kind, LAMBDA_FUNCTION_NAME_ENV, STEP_NAME_ENV};
use step_pipeline_core::StepKind;
use step_pipeline_lambda::handlers::step::handle_step_event;
use step_pipeline_lambda::logging::init_logging;

async fn handle_request(step: StepKind, event: LambdaEvent<Value>) -> Result<Value, Error> {
    handle_step_event(step, event.payload).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let step_name = std::env::var(STEP_NAME_ENV).ok();
    let function_name = std::env::var(LAMBDA_FUNCTION_NAME_ENV).ok();
    let step = resolve_step_kind(step_name.as_deref(), function_name.as_deref())?;
    tracing::info!(component = "step_runtime", event = "runtime_ready", step = %step);

    lambda_runtime::run(service_fn(move |event| handle_request(step, event))).await
}
