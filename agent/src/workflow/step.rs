//! Manual checks workflow steps

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Position in the manual checks workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStep {
    #[default]
    Settings,
    PreUpdate,
    PreUpdateStarted,
    MakeUpdate,
    PostUpdate,
    PostUpdateStarted,
    ChangeDetection,
}

impl WorkflowStep {
    /// In workflow order
    pub const ALL: [WorkflowStep; 7] = [
        WorkflowStep::Settings,
        WorkflowStep::PreUpdate,
        WorkflowStep::PreUpdateStarted,
        WorkflowStep::MakeUpdate,
        WorkflowStep::PostUpdate,
        WorkflowStep::PostUpdateStarted,
        WorkflowStep::ChangeDetection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Settings => "settings",
            WorkflowStep::PreUpdate => "pre-update",
            WorkflowStep::PreUpdateStarted => "pre-update-started",
            WorkflowStep::MakeUpdate => "make-update",
            WorkflowStep::PostUpdate => "post-update",
            WorkflowStep::PostUpdateStarted => "post-update-started",
            WorkflowStep::ChangeDetection => "change-detection",
        }
    }

    /// The following step in the linear sequence
    pub fn next(&self) -> Option<WorkflowStep> {
        let index = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// Screenshots were queued and the remote queue is being processed
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            WorkflowStep::PreUpdateStarted | WorkflowStep::PostUpdateStarted
        )
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("Invalid workflow step: {}", s))
    }
}
