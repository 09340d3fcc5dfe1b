use std::time::Duration;

use crate::error::ConfigError;
use crate::steps::StepKind;

pub const STEP_ONE_FUNCTION_ENV: &str = "STEP_ONE_FUNCTION";
pub const STEP_TWO_FUNCTION_ENV: &str = "STEP_TWO_FUNCTION";
pub const STEP_THREE_FUNCTION_ENV: &str = "STEP_THREE_FUNCTION";
pub const STEP_TIMEOUT_ENV: &str = "STEP_TIMEOUT_SECONDS";
pub const RUN_TIMEOUT_ENV: &str = "RUN_TIMEOUT_SECONDS";
pub const STEP_NAME_ENV: &str = "STEP_NAME";
pub const LAMBDA_FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub step_one_function: String,
    pub step_two_function: String,
    pub step_three_function: String,
    pub step_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_one_function: StepKind::StepOne.as_str().to_string(),
            step_two_function: StepKind::StepTwo.as_str().to_string(),
            step_three_function: StepKind::StepThree.as_str().to_string(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            step_one_function: read(STEP_ONE_FUNCTION_ENV).unwrap_or(defaults.step_one_function),
            step_two_function: read(STEP_TWO_FUNCTION_ENV).unwrap_or(defaults.step_two_function),
            step_three_function: read(STEP_THREE_FUNCTION_ENV)
                .unwrap_or(defaults.step_three_function),
            step_timeout: match read(STEP_TIMEOUT_ENV) {
                Some(value) => parse_timeout(STEP_TIMEOUT_ENV, &value)?,
                None => defaults.step_timeout,
            },
            run_timeout: match read(RUN_TIMEOUT_ENV) {
                Some(value) => parse_timeout(RUN_TIMEOUT_ENV, &value)?,
                None => defaults.run_timeout,
            },
        })
    }

    pub fn function_name(&self, step: StepKind) -> &str {
        match step {
            StepKind::StepOne => &self.step_one_function,
            StepKind::StepTwo => &self.step_two_function,
            StepKind::StepThree => &self.step_three_function,
        }
    }
}

fn parse_timeout(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::InvalidTimeout {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Picks the handler a step function hosts: `STEP_NAME` wins, otherwise the
/// deployed function name is used when it matches a step.
pub fn resolve_step_kind(
    step_name: Option<&str>,
    function_name: Option<&str>,
) -> Result<StepKind, ConfigError> {
    if let Some(value) = step_name.filter(|value| !value.trim().is_empty()) {
        return value.parse().map_err(|_| ConfigError::UnknownStep {
            key: STEP_NAME_ENV.to_string(),
            value: value.to_string(),
        });
    }

    function_name
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| ConfigError::Missing {
            key: STEP_NAME_ENV.to_string(),
        })
}
