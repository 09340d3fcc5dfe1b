use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command};

use clap::{Parser, Subcommand, ValueEnum};
use step_pipeline_core::StepKind;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the step pipeline workspace",
    long_about = "A unified CLI for running the workflow locally, benchmarks,\n\
                  CI checks, and packaging the Lambda artifacts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the three-step workflow in process
    Run {
        /// First operand
        #[arg(long, allow_hyphen_values = true, default_value_t = 5.0)]
        first_number: f64,
        /// Second operand
        #[arg(long, allow_hyphen_values = true, default_value_t = 3.0)]
        second_number: f64,
        /// Print the full run report
        #[arg(long)]
        report: bool,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Run CI checks (fmt, clippy, tests, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package Rust Lambda artifacts for deployment
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory the zip artifacts are written to
        #[arg(long, env = "STEP_PIPELINE_DIST_DIR", default_value = "deploy/dist")]
        dist_dir: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Run benchmarks
    Bench,
    /// Run check + bench
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

const LAMBDA_PACKAGE: &str = "step_pipeline_lambda";
const STEP_RUNTIME_BIN: &str = "step_runtime";
const ORCHESTRATOR_BIN: &str = "orchestrator_lambda";

type TaskResult<T = ()> = Result<T, Box<dyn Error>>;

/// One deployable function: the binary it runs and the zip it ships in.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LambdaArtifact {
    bin_name: &'static str,
    zip_name: String,
}

/// Every step function gets its own zip named after the function, so each
/// deploys as `step-one`, `step-two`, or `step-three` and the runtime picks
/// its handler from the function name.
fn artifact_plan() -> Vec<LambdaArtifact> {
    StepKind::SEQUENCE
        .into_iter()
        .map(|step| LambdaArtifact {
            bin_name: STEP_RUNTIME_BIN,
            zip_name: format!("{step}.zip"),
        })
        .chain(std::iter::once(LambdaArtifact {
            bin_name: ORCHESTRATOR_BIN,
            zip_name: "orchestrator.zip".to_string(),
        }))
        .collect()
}

fn build_args<'a>(
    plan: &'a [LambdaArtifact],
    target: &'a str,
    profile: BuildProfile,
) -> Vec<&'a str> {
    let mut args = vec!["build", "-p", LAMBDA_PACKAGE, "--target", target];
    let mut bins: Vec<&str> = plan.iter().map(|artifact| artifact.bin_name).collect();
    bins.dedup();
    for bin in bins {
        args.extend(["--bin", bin]);
    }
    args.extend(profile.as_cargo_flag());
    args
}

// ── helpers ────────────────────────────────────────────────────────

fn banner(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) -> TaskResult {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("`cargo {}` failed with {status}", args.join(" ")).into())
    }
}

fn package_serverless_lambdas(target: &str, profile: BuildProfile, dist_dir: &Path) -> TaskResult {
    check_target_installed(target)?;

    let plan = artifact_plan();
    banner("Build step pipeline lambda binaries");
    run_cargo(&build_args(&plan, target, profile))?;

    banner("Package lambda zip artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    fs::create_dir_all(dist_dir)?;

    for artifact in &plan {
        let binary_path = target_dir.join(executable_name(artifact.bin_name, target));
        let zip_path = dist_dir.join(&artifact.zip_name);
        write_bootstrap_zip(&binary_path, &zip_path)?;
        eprintln!("- {} ({})", zip_path.display(), artifact.bin_name);
    }
    Ok(())
}

/// Skips the check with a warning when `rustup` is unavailable.
fn check_target_installed(target: &str) -> TaskResult {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            return Err(format!(
                "`rustup target list --installed` failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }
        Err(error) => {
            eprintln!("warning: rustup unavailable ({error}); skipping target check");
            return Ok(());
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if installed.lines().any(|line| line.trim() == target) {
        Ok(())
    } else {
        Err(format!(
            "rust target `{target}` is not installed; run `rustup target add {target}`"
        )
        .into())
    }
}

fn executable_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// Lambda's `provided` runtimes start the executable named `bootstrap`.
fn write_bootstrap_zip(binary_path: &Path, zip_path: &Path) -> TaskResult {
    let binary = fs::read(binary_path).map_err(|error| {
        format!(
            "cannot read lambda binary '{}': {error}",
            binary_path.display()
        )
    })?;

    let mut zip = ZipWriter::new(fs::File::create(zip_path)?);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)?;
    zip.write_all(&binary)?;
    zip.finish()?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() -> TaskResult {
    banner("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    banner("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])?;

    for package in ["step_pipeline_core", LAMBDA_PACKAGE, "xtask"] {
        banner(&format!("Test {package}"));
        run_cargo(&["test", "-p", package])?;
    }
    Ok(())
}

fn ci_bench() -> TaskResult {
    banner("Run benchmarks");
    run_cargo(&["bench", "--package", LAMBDA_PACKAGE, "--bench", "workflow"])
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    if let Err(error) = run(Cli::parse().command) {
        eprintln!("error: {error}");
        exit(1);
    }
}

fn run(command: Commands) -> TaskResult {
    match command {
        Commands::Run {
            first_number,
            second_number,
            report,
        } => {
            let first = first_number.to_string();
            let second = second_number.to_string();
            let mut args = vec![
                "run",
                "-p",
                LAMBDA_PACKAGE,
                "--bin",
                "run_local",
                "--",
                "--first-number",
                &first,
                "--second-number",
                &second,
            ];
            if report {
                args.push("--report");
            }
            run_cargo(&args)
        }
        Commands::Bench => ci_bench(),
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check()?,
                CiJob::Bench => ci_bench()?,
                CiJob::All => {
                    ci_check()?;
                    ci_bench()?;
                }
            }
            eprintln!("\nCI job passed.");
            Ok(())
        }
        Commands::ServerlessPackage {
            target,
            profile,
            dist_dir,
        } => package_serverless_lambdas(&target, profile, Path::new(&dist_dir)),
    }
}
