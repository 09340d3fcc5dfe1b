use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::steps::StepKind;

pub const WORKFLOW_SCHEMA_VERSION: &str = "v1";

pub const FIRST_NUMBER_FIELD: &str = "firstNumber";
pub const SECOND_NUMBER_FIELD: &str = "secondNumber";
pub const MULTIPLY_FIELD: &str = "multiply";
pub const SUBTRACT_FIELD: &str = "subtract";

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// The record threaded through the workflow.
///
/// `first_number` and `second_number` are carried forward unchanged. Each step
/// may fill in one derived field. Fields the pipeline does not know about are
/// kept in `extra` so no step ever drops part of its input.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPayload {
    pub first_number: f64,
    pub second_number: f64,
    pub multiply: Option<f64>,
    pub subtract: Option<f64>,
    pub extra: BTreeMap<String, Value>,
}

impl StepPayload {
    pub fn new(first_number: f64, second_number: f64) -> Self {
        Self {
            first_number,
            second_number,
            multiply: None,
            subtract: None,
            extra: BTreeMap::new(),
        }
    }

    /// Validates a JSON value eagerly. A `null` field counts as absent.
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(PipelineError::type_mismatch("$", json_type_name(&other))),
        };

        let first_number = required_number(&mut object, FIRST_NUMBER_FIELD)?;
        let second_number = required_number(&mut object, SECOND_NUMBER_FIELD)?;
        let multiply = optional_number(&mut object, MULTIPLY_FIELD)?;
        let subtract = optional_number(&mut object, SUBTRACT_FIELD)?;

        Ok(Self {
            first_number,
            second_number,
            multiply,
            subtract,
            extra: object.into_iter().collect(),
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PipelineError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|error| PipelineError::Encoding(error.to_string()))?;
        Self::from_value(value)
    }

    /// Fails with `NonFiniteValue` rather than writing a field JSON cannot
    /// carry.
    pub fn to_value(&self) -> Result<Value, PipelineError> {
        let mut object = Map::new();
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        let known = [
            (FIRST_NUMBER_FIELD, Some(self.first_number)),
            (SECOND_NUMBER_FIELD, Some(self.second_number)),
            (MULTIPLY_FIELD, self.multiply),
            (SUBTRACT_FIELD, self.subtract),
        ];
        for (field, value) in known {
            if let Some(value) = value {
                object.insert(field.to_string(), encode_number(field, value)?);
            }
        }
        Ok(Value::Object(object))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(&self.to_value()?)
            .map_err(|error| PipelineError::Encoding(error.to_string()))
    }

    pub fn with_multiply(mut self, multiply: f64) -> Self {
        self.multiply = Some(multiply);
        self
    }

    pub fn with_subtract(mut self, subtract: f64) -> Self {
        self.subtract = Some(subtract);
        self
    }
}

impl Serialize for StepPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StepPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn required_number(object: &mut Map<String, Value>, field: &str) -> Result<f64, PipelineError> {
    optional_number(object, field)?.ok_or_else(|| PipelineError::missing_field(field))
}

fn optional_number(
    object: &mut Map<String, Value>,
    field: &str,
) -> Result<Option<f64>, PipelineError> {
    match object.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| PipelineError::type_mismatch(field, "unrepresentable number")),
        Some(other) => Err(PipelineError::type_mismatch(field, json_type_name(&other))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integral values inside the safe-integer range go out as JSON integers,
/// everything else as a float.
pub fn encode_number(field: &str, value: f64) -> Result<Value, PipelineError> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Ok(Value::from(value as i64));
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| PipelineError::NonFiniteValue {
            field: field.to_string(),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    pub schema_version: String,
    pub input_fingerprint: String,
    pub started_at: String,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        input: &StepPayload,
        started_at: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            run_id: run_id.into(),
            schema_version: WORKFLOW_SCHEMA_VERSION.to_string(),
            input_fingerprint: input_fingerprint(input)?,
            started_at: started_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    pub step: StepKind,
    pub function_name: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowReport {
    pub run_context: RunContext,
    pub steps: Vec<StepRecord>,
    pub output: StepPayload,
}

pub fn input_fingerprint(input: &StepPayload) -> Result<String, PipelineError> {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(input)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Key order is fixed regardless of how `serde_json` is configured.
pub fn stable_contract_json(input: &StepPayload) -> Result<String, PipelineError> {
    let ordered: BTreeMap<String, Value> = match input.to_value()? {
        Value::Object(object) => object.into_iter().collect(),
        _ => BTreeMap::new(),
    };
    serde_json::to_string(&ordered).map_err(|error| PipelineError::Encoding(error.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_value_reads_required_numbers() {
        let payload = StepPayload::from_value(json!({"firstNumber": 5, "secondNumber": 3}))
            .expect("payload should decode");
        assert_eq!(payload, StepPayload::new(5.0, 3.0));
    }

    #[test]
    fn from_value_reports_missing_second_number() {
        let error = StepPayload::from_value(json!({"firstNumber": 5}))
            .expect_err("payload should fail");
        assert_eq!(error, PipelineError::missing_field("secondNumber"));
    }

    #[test]
    fn from_value_treats_null_as_missing() {
        let error = StepPayload::from_value(json!({"firstNumber": null, "secondNumber": 1}))
            .expect_err("payload should fail");
        assert_eq!(error, PipelineError::missing_field("firstNumber"));
    }

    #[test]
    fn from_value_rejects_numeric_strings() {
        let error = StepPayload::from_value(json!({"firstNumber": "5", "secondNumber": 3}))
            .expect_err("payload should fail");
        assert_eq!(error, PipelineError::type_mismatch("firstNumber", "string"));
    }

    #[test]
    fn from_value_rejects_non_numeric_derived_field() {
        let error = StepPayload::from_value(json!({
            "firstNumber": 5,
            "secondNumber": 3,
            "multiply": [15]
        }))
        .expect_err("payload should fail");
        assert_eq!(error, PipelineError::type_mismatch("multiply", "array"));
    }

    #[test]
    fn from_value_rejects_non_object_payload() {
        let error = StepPayload::from_value(json!([5, 3])).expect_err("payload should fail");
        assert_eq!(error, PipelineError::type_mismatch("$", "array"));
    }

    #[test]
    fn from_slice_reports_invalid_json() {
        let error = StepPayload::from_slice(b"{\"firstNumber\": ").expect_err("should fail");
        assert_eq!(error.error_code(), "encoding_error");
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let payload = StepPayload::from_value(json!({
            "firstNumber": 1,
            "secondNumber": 2,
            "traceId": "abc"
        }))
        .expect("payload should decode");

        assert_eq!(payload.extra.get("traceId"), Some(&json!("abc")));
        assert_eq!(payload.to_value().expect("encode")["traceId"], json!("abc"));
    }

    #[test]
    fn integral_values_encode_as_integers() {
        let payload = StepPayload::new(5.0, 3.0)
            .with_multiply(15.0)
            .with_subtract(2.0);
        let text = serde_json::to_string(&payload).expect("payload should serialize");
        assert!(!text.contains(".0"), "unexpected float encoding: {text}");
        assert!(text.contains(r#""multiply":15"#));

        let decoded: Value = serde_json::from_str(&text).expect("payload should parse");
        assert_eq!(
            decoded,
            json!({"firstNumber": 5, "secondNumber": 3, "multiply": 15, "subtract": 2})
        );
    }

    #[test]
    fn fractional_and_negative_zero_values_encode_faithfully() {
        let encode = |value| encode_number("multiply", value).expect("finite value");
        assert_eq!(encode(2.5), json!(2.5));
        assert_eq!(encode(-0.0), json!(0));
        assert_eq!(encode(-7.0), json!(-7));
        assert_eq!(encode(1e300), json!(1e300));
    }

    #[test]
    fn non_finite_values_refuse_to_encode() {
        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert_eq!(
                encode_number("subtract", value),
                Err(PipelineError::NonFiniteValue {
                    field: "subtract".to_string(),
                })
            );
        }

        let error = StepPayload::new(f64::INFINITY, 1.0)
            .to_vec()
            .expect_err("infinite operand should not encode");
        assert_eq!(
            error,
            PipelineError::NonFiniteValue {
                field: "firstNumber".to_string(),
            }
        );

        let payload = StepPayload::new(1.0, 2.0).with_multiply(f64::NAN);
        assert!(serde_json::to_string(&payload).is_err());
        assert!(input_fingerprint(&payload).is_err());
    }

    #[test]
    fn fingerprint_is_stable_for_identical_input() {
        let a = StepPayload::new(5.0, 3.0);
        let b = StepPayload::from_value(json!({"secondNumber": 3, "firstNumber": 5}))
            .expect("payload should decode");

        let fingerprint = input_fingerprint(&a).expect("fingerprint");
        assert_eq!(fingerprint, input_fingerprint(&b).expect("fingerprint"));
        assert_eq!(fingerprint.len(), 64);
        assert_ne!(
            fingerprint,
            input_fingerprint(&StepPayload::new(3.0, 5.0)).expect("fingerprint")
        );
    }

    #[test]
    fn run_context_carries_schema_version() {
        let started_at = DateTime::parse_from_rfc3339("2026-02-14T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let context = RunContext::new("run-1", &StepPayload::new(1.0, 2.0), started_at)
            .expect("context");

        assert_eq!(context.schema_version, WORKFLOW_SCHEMA_VERSION);
        assert_eq!(context.started_at, "2026-02-14T00:00:00+00:00");
    }
}
