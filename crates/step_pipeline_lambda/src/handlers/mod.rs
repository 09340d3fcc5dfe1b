pub mod orchestrator;
pub mod step;
