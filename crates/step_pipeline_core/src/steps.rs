use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contract::{
    StepPayload, FIRST_NUMBER_FIELD, MULTIPLY_FIELD, SECOND_NUMBER_FIELD, SUBTRACT_FIELD,
};
use crate::error::PipelineError;

/// The three workflow steps, in the order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    StepOne,
    StepTwo,
    StepThree,
}

impl StepKind {
    pub const SEQUENCE: [StepKind; 3] = [Self::StepOne, Self::StepTwo, Self::StepThree];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StepOne => "step-one",
            Self::StepTwo => "step-two",
            Self::StepThree => "step-three",
        }
    }

    /// Field this step adds to the payload, if any.
    pub fn derived_field(self) -> Option<&'static str> {
        match self {
            Self::StepOne => None,
            Self::StepTwo => Some(MULTIPLY_FIELD),
            Self::StepThree => Some(SUBTRACT_FIELD),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .into_iter()
            .find(|step| step.as_str() == value.trim())
            .ok_or_else(|| PipelineError::UnknownStep(value.to_string()))
    }
}

/// A pure transform over the shared payload shape.
pub trait StepHandler {
    fn kind(&self) -> StepKind;

    fn apply(&self, payload: StepPayload) -> Result<StepPayload, PipelineError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughStep;

impl StepHandler for PassThroughStep {
    fn kind(&self) -> StepKind {
        StepKind::StepOne
    }

    fn apply(&self, payload: StepPayload) -> Result<StepPayload, PipelineError> {
        Ok(payload)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MultiplyStep;

impl StepHandler for MultiplyStep {
    fn kind(&self) -> StepKind {
        StepKind::StepTwo
    }

    fn apply(&self, payload: StepPayload) -> Result<StepPayload, PipelineError> {
        let product = payload.first_number * payload.second_number;
        let product = ensure_finite(self.kind(), MULTIPLY_FIELD, product)?;
        Ok(payload.with_multiply(product))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SubtractStep;

impl StepHandler for SubtractStep {
    fn kind(&self) -> StepKind {
        StepKind::StepThree
    }

    fn apply(&self, payload: StepPayload) -> Result<StepPayload, PipelineError> {
        let difference = payload.first_number - payload.second_number;
        let difference = ensure_finite(self.kind(), SUBTRACT_FIELD, difference)?;
        Ok(payload.with_subtract(difference))
    }
}

pub fn handler_for(kind: StepKind) -> &'static dyn StepHandler {
    match kind {
        StepKind::StepOne => &PassThroughStep,
        StepKind::StepTwo => &MultiplyStep,
        StepKind::StepThree => &SubtractStep,
    }
}

/// Checks a step's response against the payload it was sent.
///
/// The operands, pass-through fields, and every derived field the step does
/// not own must come back untouched, and the step's own derived field must be
/// set. A response from the wrong function, or one that dropped part of its
/// input, fails here instead of being forwarded.
pub fn check_step_output(
    step: StepKind,
    input: &StepPayload,
    output: &StepPayload,
) -> Result<(), PipelineError> {
    let violation = |message: String| PipelineError::ContractViolation { step, message };

    let operands = [
        (FIRST_NUMBER_FIELD, input.first_number, output.first_number),
        (SECOND_NUMBER_FIELD, input.second_number, output.second_number),
    ];
    for (field, before, after) in operands {
        if before != after {
            return Err(violation(format!("changed `{field}` from {before} to {after}")));
        }
    }

    let derived = [
        (MULTIPLY_FIELD, input.multiply, output.multiply),
        (SUBTRACT_FIELD, input.subtract, output.subtract),
    ];
    for (field, before, after) in derived {
        if step.derived_field() == Some(field) {
            if after.is_none() {
                return Err(violation(format!("did not set `{field}`")));
            }
            continue;
        }
        match (before, after) {
            (Some(_), None) => return Err(violation(format!("dropped `{field}`"))),
            (None, Some(_)) => return Err(violation(format!("set `{field}`"))),
            (before, after) if before != after => {
                return Err(violation(format!("changed `{field}`")));
            }
            _ => {}
        }
    }

    if let Some(key) = input
        .extra
        .keys()
        .chain(output.extra.keys())
        .find(|key| input.extra.get(*key) != output.extra.get(*key))
    {
        return Err(violation(format!("did not carry `{key}` forward unchanged")));
    }

    Ok(())
}

fn ensure_finite(step: StepKind, field: &str, value: f64) -> Result<f64, PipelineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::NonFiniteResult {
            step,
            field: field.to_string(),
        })
    }
}
