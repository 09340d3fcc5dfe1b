use proptest::prelude::*;
use serde_json::json;
use step_pipeline_core::{PipelineConfig, StepKind, StepPayload};
use step_pipeline_lambda::adapters::invoke::StepInvoker;
use step_pipeline_lambda::adapters::local::LocalStepInvoker;
use step_pipeline_lambda::handlers::orchestrator::run_workflow;
use step_pipeline_lambda::handlers::step::handle_step_event;

fn operand() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        (-1_000_000i64..1_000_000).prop_map(|value| value as f64),
        -1.0e9f64..1.0e9,
    ]
}

proptest! {
    #[test]
    fn full_sequence_yields_product_and_difference(a in operand(), b in operand()) {
        let report = run_workflow(
            StepPayload::new(a, b),
            "prop-run",
            &PipelineConfig::default(),
            &LocalStepInvoker,
        )
        .expect("run should succeed");

        let expected = StepPayload::new(a, b)
            .with_multiply(a * b)
            .with_subtract(a - b);
        prop_assert_eq!(report.output, expected);
    }

    #[test]
    fn step_one_is_idempotent_over_the_wire(a in operand(), b in operand()) {
        let event = json!({"firstNumber": a, "secondNumber": b});
        let once = handle_step_event(StepKind::StepOne, event).expect("first pass");
        let twice = handle_step_event(StepKind::StepOne, once.clone()).expect("second pass");
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn each_step_preserves_operands(a in operand(), b in operand()) {
        let request = StepPayload::new(a, b).to_vec().expect("encode");
        for step in StepKind::SEQUENCE {
            let response = LocalStepInvoker
                .invoke_step(step, &request, std::time::Duration::from_secs(1))
                .expect("step should succeed");
            let payload = StepPayload::from_slice(&response).expect("decode");
            prop_assert_eq!(payload.first_number, a);
            prop_assert_eq!(payload.second_number, b);
        }
    }
}
