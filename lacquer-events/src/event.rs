//! ABOUTME: WorkflowEvent, the typed lifecycle event emitted during compilation and execution
//! ABOUTME: Field-for-field match of the engine's event table; serializable to JSON at the stream boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A typed lifecycle event. Every variant carries `run_id` so a consumer can
/// demultiplex events from concurrently executing workflows on the same bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
        duration: Duration,
    },
    WorkflowFailed {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
        duration: Duration,
        error: String,
    },
    WorkflowCancelled {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
        duration: Duration,
    },
    StepStarted {
        run_id: Uuid,
        step_id: String,
        step_index: usize,
    },
    StepProgress {
        run_id: Uuid,
        step_id: String,
        text: String,
    },
    StepCompleted {
        run_id: Uuid,
        step_id: String,
        duration: Duration,
    },
    StepFailed {
        run_id: Uuid,
        step_id: String,
        duration: Duration,
        error: String,
    },
    StepSkipped {
        run_id: Uuid,
        step_id: String,
    },
    StepRetrying {
        run_id: Uuid,
        step_id: String,
        attempt: u32,
    },
    StepActionStarted {
        run_id: Uuid,
        step_id: String,
        action_id: String,
        tool_name: Option<String>,
        text: Option<String>,
    },
    StepActionCompleted {
        run_id: Uuid,
        step_id: String,
        action_id: String,
        tool_name: Option<String>,
        text: Option<String>,
    },
    StepActionFailed {
        run_id: Uuid,
        step_id: String,
        action_id: String,
        tool_name: Option<String>,
        text: Option<String>,
    },
}

impl WorkflowEvent {
    /// The run this event belongs to, used by consumers to demultiplex a
    /// shared bus across concurrently executing workflows.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::WorkflowStarted { run_id, .. }
            | Self::WorkflowCompleted { run_id, .. }
            | Self::WorkflowFailed { run_id, .. }
            | Self::WorkflowCancelled { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepProgress { run_id, .. }
            | Self::StepCompleted { run_id, .. }
            | Self::StepFailed { run_id, .. }
            | Self::StepSkipped { run_id, .. }
            | Self::StepRetrying { run_id, .. }
            | Self::StepActionStarted { run_id, .. }
            | Self::StepActionCompleted { run_id, .. }
            | Self::StepActionFailed { run_id, .. } => *run_id,
        }
    }

    /// Dotted event-type string used for pattern-based subscriptions, e.g.
    /// `workflow.started`, `step.action.failed`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow.started",
            Self::WorkflowCompleted { .. } => "workflow.completed",
            Self::WorkflowFailed { .. } => "workflow.failed",
            Self::WorkflowCancelled { .. } => "workflow.cancelled",
            Self::StepStarted { .. } => "step.started",
            Self::StepProgress { .. } => "step.progress",
            Self::StepCompleted { .. } => "step.completed",
            Self::StepFailed { .. } => "step.failed",
            Self::StepSkipped { .. } => "step.skipped",
            Self::StepRetrying { .. } => "step.retrying",
            Self::StepActionStarted { .. } => "step.action.started",
            Self::StepActionCompleted { .. } => "step.action.completed",
            Self::StepActionFailed { .. } => "step.action.failed",
        }
    }

    /// The step this event concerns, if any (workflow-level events have none).
    #[must_use]
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::WorkflowStarted { .. }
            | Self::WorkflowCompleted { .. }
            | Self::WorkflowFailed { .. }
            | Self::WorkflowCancelled { .. } => None,
            Self::StepStarted { step_id, .. }
            | Self::StepProgress { step_id, .. }
            | Self::StepCompleted { step_id, .. }
            | Self::StepFailed { step_id, .. }
            | Self::StepSkipped { step_id, .. }
            | Self::StepRetrying { step_id, .. }
            | Self::StepActionStarted { step_id, .. }
            | Self::StepActionCompleted { step_id, .. }
            | Self::StepActionFailed { step_id, .. } => Some(step_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_is_dotted_and_stable() {
        let e = WorkflowEvent::StepActionFailed {
            run_id: Uuid::nil(),
            step_id: "s1".into(),
            action_id: "a1".into(),
            tool_name: Some("calc".into()),
            text: None,
        };
        assert_eq!(e.event_type(), "step.action.failed");
        assert_eq!(e.step_id(), Some("s1"));
    }

    #[test]
    fn workflow_events_have_no_step_id() {
        let e = WorkflowEvent::WorkflowStarted {
            run_id: Uuid::nil(),
            timestamp: Utc::now(),
        };
        assert_eq!(e.step_id(), None);
    }
}
