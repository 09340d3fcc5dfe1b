use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use step_pipeline_core::{PipelineConfig, StepPayload};
use step_pipeline_lambda::adapters::local::LocalStepInvoker;
use step_pipeline_lambda::handlers::orchestrator::{local_run_id, normalize_event, run_workflow};
use step_pipeline_lambda::logging::init_logging;

#[derive(Parser)]
#[command(
    name = "run_local",
    about = "Run the three-step workflow in process and print the result as JSON"
)]
struct Cli {
    /// First operand
    #[arg(long, allow_hyphen_values = true, required_unless_present = "input")]
    first_number: Option<f64>,
    /// Second operand
    #[arg(long, allow_hyphen_values = true, required_unless_present = "input")]
    second_number: Option<f64>,
    /// Raw JSON event, as the orchestrator would receive it
    #[arg(long, conflicts_with_all = ["first_number", "second_number"])]
    input: Option<String>,
    /// Print the full run report instead of only the final payload
    #[arg(long)]
    report: bool,
}

fn run(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    let input = match (cli.input, cli.first_number, cli.second_number) {
        (Some(raw), _, _) => {
            let event: Value = serde_json::from_str(&raw)?;
            StepPayload::from_value(normalize_event(event)?)?
        }
        (None, Some(first), Some(second)) => StepPayload::new(first, second),
        _ => return Err("either --input or both numbers are required".into()),
    };

    let config = PipelineConfig::from_env()?;
    let run_id = local_run_id(&input)?;
    let report = run_workflow(input, &run_id, &config, &LocalStepInvoker)?;

    let rendered = if cli.report {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&report.output)?
    };
    Ok(rendered)
}

fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()) {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
