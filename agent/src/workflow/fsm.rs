//! Finite State Machine for the manual checks workflow

use openapi_client::models::ScreenshotType;

use crate::errors::AgentError;
use crate::workflow::step::WorkflowStep;

/// Manual checks event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Admin started manual checks
    Start,

    /// Screenshots of the given type were queued remotely
    ScreenshotsQueued(ScreenshotType),

    /// Remote queue for the current batch has no open or processing items
    QueueDrained,

    /// Admin finished making updates
    Advance,

    /// Start over from the settings step
    StartNew,

    /// Take the post-update screenshots again
    Redo,

    /// Abandon the workflow
    Cancel,
}

/// Manual checks FSM
#[derive(Debug, Clone)]
pub struct ManualChecksFsm {
    step: WorkflowStep,
}

impl ManualChecksFsm {
    pub fn new(step: WorkflowStep) -> Self {
        Self { step }
    }

    /// Get current step
    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: WorkflowEvent) -> Result<WorkflowStep, AgentError> {
        use WorkflowEvent as E;
        use WorkflowStep as S;

        let new_step = match (self.step, event) {
            (_, E::Cancel) => S::Settings,

            (S::Settings, E::Start) => S::PreUpdate,

            (S::PreUpdate, E::ScreenshotsQueued(ScreenshotType::Pre)) => S::PreUpdateStarted,
            (S::PreUpdateStarted, E::QueueDrained) => S::MakeUpdate,

            (S::MakeUpdate, E::Advance) => S::PostUpdate,

            (S::PostUpdate, E::ScreenshotsQueued(ScreenshotType::Post)) => S::PostUpdateStarted,
            (S::PostUpdateStarted, E::QueueDrained) => S::ChangeDetection,

            (S::ChangeDetection, E::StartNew) => S::Settings,
            (S::ChangeDetection, E::Redo) => S::PostUpdate,

            // Invalid transitions
            (step, event) => {
                return Err(AgentError::WorkflowError(format!(
                    "Invalid transition: {} -> {:?}",
                    step, event
                )));
            }
        };

        self.step = new_step;
        Ok(new_step)
    }
}

impl Default for ManualChecksFsm {
    fn default() -> Self {
        Self::new(WorkflowStep::Settings)
    }
}
