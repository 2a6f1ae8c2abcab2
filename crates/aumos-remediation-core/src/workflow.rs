// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Workflow state model.
//!
//! A [`Workflow`] is an ordered list of [`Step`]s plus a cursor
//! (`current_step_index`).  Workflows and steps share one lifecycle,
//! [`WorkflowStatus`], and every status change goes through
//! [`WorkflowStatus::can_transition_to`] so illegal moves are rejected in one
//! place:
//!
//! ```text
//! pending ──► in_progress ──► completed | failed | cancelled
//!    │            │  ▲
//!    │            ▼  │
//!    │       requires_human ──► cancelled
//!    └──────────────────────────► cancelled
//! ```
//!
//! Each accepted change yields a [`Transition`] that the engine appends to
//! the audit trail.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemediationError;
use crate::types::{RemediationType, RiskLevel};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status shared by workflows and their steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RequiresHuman,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Pending       => "pending",
            WorkflowStatus::InProgress    => "in_progress",
            WorkflowStatus::Completed     => "completed",
            WorkflowStatus::Failed        => "failed",
            WorkflowStatus::RequiresHuman => "requires_human",
            WorkflowStatus::Cancelled     => "cancelled",
        }
    }

    /// `completed`, `failed` and `cancelled` are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    /// The transition table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use aumos_remediation_core::workflow::WorkflowStatus::*;
    ///
    /// assert!(Pending.can_transition_to(InProgress));
    /// assert!(RequiresHuman.can_transition_to(InProgress));
    /// assert!(!Completed.can_transition_to(InProgress));
    /// assert!(!Pending.can_transition_to(Completed));
    /// ```
    pub fn can_transition_to(self, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, RequiresHuman)
                | (InProgress, Cancelled)
                | (RequiresHuman, InProgress)
                | (RequiresHuman, Cancelled)
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Action kinds
// ---------------------------------------------------------------------------

/// Closed classification of a remediation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DataDeletion,
    DataModification,
    DataProtection,
    Notification,
    ConsentManagement,
    DataTransfer,
    LegalReview,
    ManualReview,
    /// Confirms the effect of an earlier step.
    Verification,
    Generic,
}

/// Keyword table for [`ActionKind::classify`].  Rows are tried in order and
/// the first row with a matching keyword wins.
const ACTION_KEYWORDS: &[(ActionKind, &[&str])] = &[
    (ActionKind::LegalReview,       &["legal", "counsel", "lawyer"]),
    (ActionKind::ManualReview,      &["review", "assess", "investigate", "inspect"]),
    (ActionKind::Verification,      &["verify", "verification", "confirm", "validate"]),
    (ActionKind::DataDeletion,      &["delete", "remove", "purge", "erase"]),
    (ActionKind::DataModification,  &["update", "modify", "correct", "rectify"]),
    (ActionKind::DataProtection,    &["encrypt", "secure", "protect", "mask", "pseudonymi"]),
    (ActionKind::Notification,      &["notify", "inform", "contact", "alert"]),
    (ActionKind::ConsentManagement, &["consent", "withdraw", "opt-out", "opt out"]),
    (ActionKind::DataTransfer,      &["transfer", "export", "migrate"]),
];

impl ActionKind {
    /// Classify free-form action text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use aumos_remediation_core::workflow::ActionKind;
    ///
    /// assert_eq!(ActionKind::classify("Purge stale CRM exports"), ActionKind::DataDeletion);
    /// assert_eq!(ActionKind::classify("Obtain legal review"), ActionKind::LegalReview);
    /// assert_eq!(ActionKind::classify("Rotate the key"), ActionKind::Generic);
    /// ```
    pub fn classify(action: &str) -> Self {
        let lowered = action.to_lowercase();
        ACTION_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
            .map(|(kind, _)| *kind)
            .unwrap_or(ActionKind::Generic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DataDeletion      => "data_deletion",
            ActionKind::DataModification  => "data_modification",
            ActionKind::DataProtection    => "data_protection",
            ActionKind::Notification      => "notification",
            ActionKind::ConsentManagement => "consent_management",
            ActionKind::DataTransfer      => "data_transfer",
            ActionKind::LegalReview       => "legal_review",
            ActionKind::ManualReview      => "manual_review",
            ActionKind::Verification      => "verification",
            ActionKind::Generic           => "generic",
        }
    }

    /// Review steps are always performed by a person.
    pub fn is_review(self) -> bool {
        matches!(self, ActionKind::LegalReview | ActionKind::ManualReview)
    }

    /// Deletions and notifications touch data subjects directly.
    pub fn is_sensitive(self) -> bool {
        matches!(self, ActionKind::DataDeletion | ActionKind::Notification)
    }

    /// Changes data in a way a later step should confirm.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            ActionKind::DataDeletion | ActionKind::DataModification | ActionKind::DataTransfer
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Step / Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub name: String,
    pub description: String,
    pub action_type: ActionKind,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub status: WorkflowStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub estimated_duration_minutes: u32,
    /// Zero-based position within the workflow.
    pub order: u32,
    /// Whether the step waits on a [`HumanTask`](crate::task::HumanTask).
    pub requires_human_approval: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub human_task_id: Option<String>,
    #[serde(default)]
    pub output: Option<Value>,
}

/// A remediation plan and its execution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub violation_id: String,
    pub activity_id: String,
    pub remediation_type: RemediationType,
    pub workflow_type: RemediationType,
    pub status: WorkflowStatus,
    pub steps: Vec<Step>,
    /// Index of the next step to run; equals `steps.len()` once every step
    /// has completed.
    pub current_step_index: usize,
    pub priority: RiskLevel,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    pub total_estimated_duration_minutes: u32,
}

/// One accepted status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub workflow_id: String,
    /// `None` for workflow-level transitions.
    pub step_id: Option<String>,
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub note: String,
    pub timestamp_ms: u64,
}

impl Workflow {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == WorkflowStatus::Completed)
            .count()
    }

    /// Move the workflow to `to`, stamping `started_at_ms` on the first
    /// entry into `in_progress` and `completed_at_ms` on any terminal state.
    pub fn transition_to(
        &mut self,
        to: WorkflowStatus,
        note: impl Into<String>,
    ) -> Result<Transition, RemediationError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(RemediationError::InvalidTransition {
                entity: format!("workflow {}", self.id),
                from,
                to,
            });
        }

        let now = crate::current_time_ms();
        self.status = to;
        self.updated_at_ms = now;
        if to == WorkflowStatus::InProgress && self.started_at_ms.is_none() {
            self.started_at_ms = Some(now);
        }
        if to.is_terminal() {
            self.completed_at_ms = Some(now);
        }

        Ok(Transition {
            workflow_id: self.id.clone(),
            step_id: None,
            from,
            to,
            note: note.into(),
            timestamp_ms: now,
        })
    }

    /// Move the step at `index` to `to`.
    pub fn transition_step(
        &mut self,
        index: usize,
        to: WorkflowStatus,
        note: impl Into<String>,
    ) -> Result<Transition, RemediationError> {
        let workflow_id = self.id.clone();
        let step = self
            .steps
            .get_mut(index)
            .ok_or_else(|| RemediationError::InvalidTransition {
                entity: format!("workflow {workflow_id} step #{index}"),
                from: WorkflowStatus::Pending,
                to,
            })?;

        let from = step.status;
        if !from.can_transition_to(to) {
            return Err(RemediationError::InvalidTransition {
                entity: format!("step {}", step.id),
                from,
                to,
            });
        }
        step.status = to;

        let now = crate::current_time_ms();
        self.updated_at_ms = now;
        Ok(Transition {
            workflow_id,
            step_id: Some(self.steps[index].id.clone()),
            from,
            to,
            note: note.into(),
            timestamp_ms: now,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_workflow(step_count: usize) -> Workflow {
        let steps = (0..step_count)
            .map(|index| Step {
                id: format!("step-{index}"),
                name: format!("Execute: action {index}"),
                description: String::new(),
                action_type: ActionKind::Generic,
                parameters: BTreeMap::new(),
                status: WorkflowStatus::Pending,
                retry_count: 0,
                max_retries: 3,
                estimated_duration_minutes: 5,
                order: index as u32,
                requires_human_approval: false,
                error_message: None,
                human_task_id: None,
                output: None,
            })
            .collect();
        Workflow {
            id: "wf-test".into(),
            violation_id: "v-test".into(),
            activity_id: "a-test".into(),
            remediation_type: RemediationType::Automatic,
            workflow_type: RemediationType::Automatic,
            status: WorkflowStatus::Pending,
            steps,
            current_step_index: 0,
            priority: RiskLevel::Low,
            metadata: BTreeMap::new(),
            created_at_ms: 0,
            updated_at_ms: 0,
            started_at_ms: None,
            completed_at_ms: None,
            total_estimated_duration_minutes: 5 * step_count as u32,
        }
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        use WorkflowStatus::*;
        let all = [Pending, InProgress, Completed, Failed, RequiresHuman, Cancelled];
        for from in [Completed, Failed, Cancelled] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn transition_stamps_timestamps() {
        let mut workflow = sample_workflow(1);
        let transition = workflow
            .transition_to(WorkflowStatus::InProgress, "start")
            .expect("pending -> in_progress");
        assert_eq!(transition.from, WorkflowStatus::Pending);
        assert!(transition.step_id.is_none());
        assert!(workflow.started_at_ms.is_some());
        assert!(workflow.completed_at_ms.is_none());

        workflow
            .transition_to(WorkflowStatus::Cancelled, "stop")
            .expect("in_progress -> cancelled");
        assert!(workflow.completed_at_ms.is_some());
        assert!(workflow
            .transition_to(WorkflowStatus::InProgress, "again")
            .is_err());
    }

    #[test]
    fn step_transition_reports_step_id() {
        let mut workflow = sample_workflow(2);
        let transition = workflow
            .transition_step(1, WorkflowStatus::InProgress, "run")
            .expect("step start");
        assert_eq!(transition.step_id.as_deref(), Some("step-1"));
        assert!(workflow.transition_step(5, WorkflowStatus::InProgress, "x").is_err());
    }

    #[test]
    fn classification_follows_table_order() {
        assert_eq!(ActionKind::classify("Review and delete"), ActionKind::ManualReview);
        assert_eq!(ActionKind::classify("Notify affected users"), ActionKind::Notification);
        assert_eq!(ActionKind::classify("Record opt-out"), ActionKind::ConsentManagement);
        assert_eq!(ActionKind::classify("Migrate to EU region"), ActionKind::DataTransfer);
        assert_eq!(ActionKind::classify("Verify deletion completed"), ActionKind::Verification);
        assert!(ActionKind::DataDeletion.is_sensitive());
        assert!(!ActionKind::DataTransfer.is_sensitive());
    }
}
