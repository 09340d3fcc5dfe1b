use std::time::Duration;

use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use step_pipeline_core::{PipelineConfig, PipelineError, StepKind, TimeoutScope};
use step_pipeline_lambda::adapters::invoke::StepInvoker;
use step_pipeline_lambda::handlers::orchestrator::handle_orchestrator_event;
use step_pipeline_lambda::logging::init_logging;

struct AwsLambdaStepInvoker {
    lambda_client: aws_sdk_lambda::Client,
    config: PipelineConfig,
}

impl StepInvoker for AwsLambdaStepInvoker {
    fn invoke_step(
        &self,
        step: StepKind,
        payload: &[u8],
        budget: Duration,
    ) -> Result<Vec<u8>, PipelineError> {
        let request_payload = payload.to_vec();
        let client = self.lambda_client.clone();
        let function_name = self.config.function_name(step).to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let call = client
                    .invoke()
                    .function_name(function_name)
                    .invocation_type(InvocationType::RequestResponse)
                    .payload(Blob::new(request_payload))
                    .send();

                let output = tokio::time::timeout(budget, call)
                    .await
                    .map_err(|_| PipelineError::Timeout {
                        scope: TimeoutScope::Step(step),
                        limit: budget,
                    })?
                    .map_err(|error| PipelineError::StepFailed {
                        step,
                        message: format!("failed to invoke step lambda: {error}"),
                    })?;

                let body = output
                    .payload()
                    .map(|blob| blob.as_ref().to_vec())
                    .unwrap_or_default();

                if let Some(function_error) = output.function_error() {
                    return Err(PipelineError::StepFailed {
                        step,
                        message: format!(
                            "{function_error}: {}",
                            String::from_utf8_lossy(&body)
                        ),
                    });
                }

                Ok(body)
            })
        })
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = PipelineConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let invoker = AwsLambdaStepInvoker {
        lambda_client: aws_sdk_lambda::Client::new(&aws_config),
        config: config.clone(),
    };

    handle_orchestrator_event(
        event.payload,
        &event.context.request_id,
        &config,
        &invoker,
    )
    .map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();
    lambda_runtime::run(service_fn(handle_request)).await
}
