use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use step_pipeline_core::contract::{input_fingerprint, FIRST_NUMBER_FIELD, SECOND_NUMBER_FIELD};
use step_pipeline_core::{
    check_step_output, PipelineConfig, PipelineError, RunContext, StepKind, StepPayload,
    StepRecord, TimeoutScope, WorkflowReport,
};
use thiserror::Error;
use tracing::{error, info};

use crate::adapters::invoke::StepInvoker;
use crate::logging::duration_ms;

const LOCAL_RUN_ID_PREFIX_LEN: usize = 12;

/// What the caller of a hosted run sees when any step faults. Details stay in
/// the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("workflow run {run_id} failed")]
pub struct WorkflowFailed {
    pub run_id: String,
}

/// Hosted entry point: unwraps the event, runs all steps, and returns only the
/// final payload.
///
/// Each failure is logged once: `run_rejected` for input that never started a
/// run, `run_failed` (from [`run_workflow`]) for a run that faulted.
pub fn handle_orchestrator_event(
    event: Value,
    run_id: &str,
    config: &PipelineConfig,
    invoker: &dyn StepInvoker,
) -> Result<Value, WorkflowFailed> {
    let failed = || WorkflowFailed {
        run_id: run_id.to_string(),
    };

    let input = normalize_event(event)
        .and_then(StepPayload::from_value)
        .map_err(|failure| {
            error!(
                component = "orchestrator",
                event = "run_rejected",
                run_id,
                error_code = failure.error_code(),
                error = %failure,
            );
            failed()
        })?;

    let report = run_workflow(input, run_id, config, invoker).map_err(|_| failed())?;

    report.output.to_value().map_err(|failure| {
        error!(
            component = "orchestrator",
            event = "output_encoding_failed",
            run_id,
            error_code = failure.error_code(),
            error = %failure,
        );
        failed()
    })
}

/// Runs step one, two, and three in order, each consuming the previous
/// step's full output. The first fault aborts the run.
pub fn run_workflow(
    input: StepPayload,
    run_id: &str,
    config: &PipelineConfig,
    invoker: &dyn StepInvoker,
) -> Result<WorkflowReport, PipelineError> {
    let run_context = RunContext::new(run_id, &input, Utc::now())?;
    let started_at = Instant::now();
    info!(
        component = "orchestrator",
        event = "run_started",
        run_id,
        input_fingerprint = %run_context.input_fingerprint,
    );

    match execute_steps(input, config, invoker, started_at) {
        Ok((steps, output)) => {
            info!(
                component = "orchestrator",
                event = "run_completed",
                run_id,
                steps = steps.len(),
                duration_ms = duration_ms(started_at.elapsed()),
            );
            Ok(WorkflowReport {
                run_context,
                steps,
                output,
            })
        }
        Err(failure) => {
            error!(
                component = "orchestrator",
                event = "run_failed",
                run_id,
                error_code = failure.error_code(),
                error = %failure,
                duration_ms = duration_ms(started_at.elapsed()),
            );
            Err(failure)
        }
    }
}

fn execute_steps(
    input: StepPayload,
    config: &PipelineConfig,
    invoker: &dyn StepInvoker,
    run_started_at: Instant,
) -> Result<(Vec<StepRecord>, StepPayload), PipelineError> {
    let mut payload = input;
    let mut records = Vec::with_capacity(StepKind::SEQUENCE.len());

    for step in StepKind::SEQUENCE {
        let remaining = config
            .run_timeout
            .checked_sub(run_started_at.elapsed())
            .filter(|remaining| !remaining.is_zero())
            .ok_or(PipelineError::Timeout {
                scope: TimeoutScope::Run,
                limit: config.run_timeout,
            })?;
        let budget = config.step_timeout.min(remaining);

        let request = payload.to_vec()?;
        let step_started_at = Instant::now();
        let response = match invoker.invoke_step(step, &request, budget) {
            Err(PipelineError::Timeout { .. }) => {
                return Err(budget_exceeded(step, budget, config));
            }
            other => other?,
        };
        let step_elapsed = step_started_at.elapsed();
        if step_elapsed > budget {
            return Err(budget_exceeded(step, budget, config));
        }

        let output = StepPayload::from_slice(&response)?;
        check_step_output(step, &payload, &output)?;
        payload = output;
        records.push(StepRecord {
            step,
            function_name: config.function_name(step).to_string(),
            duration_ms: duration_ms(step_elapsed),
        });
    }

    Ok((records, payload))
}

/// A budget cut short by the run limit is reported against the run.
fn budget_exceeded(step: StepKind, budget: Duration, config: &PipelineConfig) -> PipelineError {
    if budget < config.step_timeout {
        PipelineError::Timeout {
            scope: TimeoutScope::Run,
            limit: config.run_timeout,
        }
    } else {
        PipelineError::Timeout {
            scope: TimeoutScope::Step(step),
            limit: config.step_timeout,
        }
    }
}

/// Unwraps an API Gateway proxy event (`{"body": ...}`) to its body.
///
/// An object that already carries an operand at the top level is a direct
/// invocation, so a `body` field there is ordinary payload data.
pub fn normalize_event(event: Value) -> Result<Value, PipelineError> {
    let Some(object) = event.as_object() else {
        return Ok(event);
    };

    if object.contains_key(FIRST_NUMBER_FIELD) || object.contains_key(SECOND_NUMBER_FIELD) {
        return Ok(event);
    }

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| PipelineError::Encoding(error.to_string()))
        }
        other => Ok(other.clone()),
    }
}

pub fn local_run_id(input: &StepPayload) -> Result<String, PipelineError> {
    let fingerprint = input_fingerprint(input)?;
    Ok(format!(
        "local-{}",
        &fingerprint[..LOCAL_RUN_ID_PREFIX_LEN]
    ))
}
