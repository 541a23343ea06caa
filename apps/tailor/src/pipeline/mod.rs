//! Tailoring pipeline core: step contract, run state, orchestrator and the
//! final structural validator.

pub mod orchestrator;
pub mod run_state;
pub mod step;
pub mod validator;

#[cfg(test)]
pub mod testing;

pub use orchestrator::{Pipeline, PipelineError};
pub use run_state::{RunReport, RunState};
