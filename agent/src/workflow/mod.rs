//! Manual checks workflow and detection settings

pub mod fsm;
pub mod manual_checks;
pub mod settings;
pub mod step;

pub use manual_checks::{ManualChecks, QueueSummary};
pub use step::WorkflowStep;
