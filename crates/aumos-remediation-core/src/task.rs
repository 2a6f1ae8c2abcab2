// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Human tasks.
//!
//! A [`HumanTask`] is opened by the executor whenever a gated step is reached.
//! [`TaskTracker`] owns the task lifecycle:
//!
//! ```text
//! pending ──► in_progress ──► completed
//!    │             │
//!    └─────────────┴────────► cancelled
//! ```
//!
//! Completing a task is authorised against `required_approvals`; resuming the
//! owning workflow is the engine's job.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::TaskPolicy;
use crate::error::RemediationError;
use crate::storage::Storage;
use crate::types::{Framework, RemediationType, RiskLevel};
use crate::workflow::{Step, Workflow};

const MS_PER_HOUR: u64 = 3_600_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending    => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed  => "completed",
            TaskStatus::Cancelled  => "cancelled",
        }
    }

    /// `pending` or `in_progress`.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work a person must perform before a gated step can proceed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanTask {
    pub id: String,
    pub workflow_id: String,
    pub step_id: String,
    pub title: String,
    pub description: String,
    pub assignee: String,
    pub priority: RiskLevel,
    pub status: TaskStatus,
    pub instructions: Vec<String>,
    /// Roles allowed to complete the task.  Empty means anyone.
    pub required_approvals: Vec<String>,
    pub created_at_ms: u64,
    #[serde(default)]
    pub due_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub completed_by: Option<String>,
}

impl HumanTask {
    /// Build the task for `step` of `workflow`.
    ///
    /// Review-style tasks (a person approves an automated step) and manual
    /// tasks (a person performs the step) get different titles and
    /// instructions.  Assignee, due date and required approvals follow the
    /// workflow's risk level through `policy`.
    pub fn for_step(workflow: &Workflow, step: &Step, policy: &TaskPolicy) -> Self {
        let manual = workflow.remediation_type == RemediationType::ManualOnly
            || step.action_type.is_review();
        let created_at_ms = crate::current_time_ms();
        let due_at_ms = created_at_ms + policy.due_hours(workflow.priority) * MS_PER_HOUR;

        let (title, instructions) = if manual {
            (
                format!("Manual remediation: {}", step.name),
                manual_instructions(workflow, step),
            )
        } else {
            (
                format!("Approve: {}", step.name),
                review_instructions(workflow, step),
            )
        };

        Self {
            id: format!("task-{}", Uuid::new_v4()),
            workflow_id: workflow.id.clone(),
            step_id: step.id.clone(),
            title,
            description: step.description.clone(),
            assignee: policy.assignee(workflow.priority),
            priority: workflow.priority,
            status: TaskStatus::Pending,
            instructions,
            required_approvals: policy.required_approvals(workflow.priority),
            created_at_ms,
            due_at_ms: Some(due_at_ms),
            completed_at_ms: None,
            completed_by: None,
        }
    }

    /// Open and past its due date at `now_ms`.
    pub fn is_overdue(&self, now_ms: u64) -> bool {
        self.status.is_open() && self.due_at_ms.is_some_and(|due| due < now_ms)
    }

    /// Whether `approver` may complete this task.
    pub fn accepts_approver(&self, approver: &str) -> bool {
        self.required_approvals.is_empty()
            || self.required_approvals.iter().any(|role| role == approver)
    }
}

/// Display name of the workflow's framework; unknown labels pass through.
fn framework_label(workflow: &Workflow) -> Option<String> {
    let label = workflow.metadata.get("framework")?.as_str()?;
    Some(Framework::parse(label).map_or_else(|| label.to_string(), |framework| {
        framework.display_name().to_string()
    }))
}

fn crosses_borders(workflow: &Workflow) -> bool {
    workflow
        .metadata
        .get("cross_border_transfers")
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

fn prerequisites_of(step: &Step) -> Vec<String> {
    step.parameters
        .get("prerequisites")
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn manual_instructions(workflow: &Workflow, step: &Step) -> Vec<String> {
    let mut instructions = vec![format!("Perform the remediation action: {}", step.description)];
    if let Some(framework) = framework_label(workflow) {
        instructions.push(format!("Ensure compliance with {framework} requirements"));
    }
    instructions.push("Document all actions taken with timestamps".into());
    instructions.push("Verify data integrity before and after remediation".into());
    if crosses_borders(workflow) {
        instructions.push("Consider cross-border transfer restrictions and requirements".into());
    }
    let prerequisites = prerequisites_of(step);
    if !prerequisites.is_empty() {
        instructions.push(format!("Complete prerequisites: {}", prerequisites.join(", ")));
    }
    instructions
}

fn review_instructions(workflow: &Workflow, step: &Step) -> Vec<String> {
    let mut instructions = vec![
        format!("Review the proposed action: {}", step.description),
        "Verify compliance with applicable regulations".into(),
        "Assess potential business impact".into(),
    ];
    if workflow.priority >= RiskLevel::High {
        instructions.push("Assess regulatory notification requirements".into());
        instructions.push("Consider stakeholder communication needs".into());
    }
    if crosses_borders(workflow) {
        instructions.push("Confirm the transfer mechanism for cross-border data".into());
    }
    instructions.push("Approve to let the automated step run, or cancel the task".into());
    instructions
}

// ---------------------------------------------------------------------------
// TaskTracker
// ---------------------------------------------------------------------------

/// Persists human tasks and enforces their lifecycle.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     storage::InMemoryStorage,
///     task::{HumanTask, TaskStatus, TaskTracker},
///     types::RiskLevel,
/// };
///
/// let mut tracker = TaskTracker::new(InMemoryStorage::new());
/// let task = HumanTask {
///     id: "task-1".into(),
///     workflow_id: "wf-1".into(),
///     step_id: "step-1".into(),
///     title: "Approve deletion".into(),
///     description: String::new(),
///     assignee: "compliance_manager".into(),
///     priority: RiskLevel::High,
///     status: TaskStatus::Pending,
///     instructions: vec![],
///     required_approvals: vec!["compliance_manager".into()],
///     created_at_ms: 0,
///     due_at_ms: None,
///     completed_at_ms: None,
///     completed_by: None,
/// };
/// tracker.open(task).unwrap();
///
/// assert!(tracker.complete("task-1", "intern").is_err());
/// let done = tracker.complete("task-1", "compliance_manager").unwrap();
/// assert_eq!(done.status, TaskStatus::Completed);
/// ```
pub struct TaskTracker<S: Storage> {
    storage: S,
}

impl<S: Storage> TaskTracker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Persist a freshly created task.
    pub fn open(&mut self, task: HumanTask) -> Result<(), RemediationError> {
        info!(
            task_id = %task.id,
            workflow_id = %task.workflow_id,
            assignee = %task.assignee,
            priority = %task.priority,
            "human task opened"
        );
        self.storage.put_task(task)?;
        Ok(())
    }

    pub fn get(&self, task_id: &str) -> Result<HumanTask, RemediationError> {
        self.storage
            .get_task(task_id)
            .ok_or_else(|| RemediationError::TaskNotFound(task_id.to_string()))
    }

    /// Claim a pending task.
    pub fn start(&mut self, task_id: &str) -> Result<HumanTask, RemediationError> {
        let mut task = self.get(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(not_actionable(&task));
        }
        task.status = TaskStatus::InProgress;
        self.storage.put_task(task.clone())?;
        Ok(task)
    }

    /// Complete an open task on behalf of `approver`.
    ///
    /// # Errors
    ///
    /// * [`RemediationError::TaskNotFound`] for an unknown id.
    /// * [`RemediationError::TaskNotActionable`] unless the task is open.
    /// * [`RemediationError::UnauthorizedApprover`] when `approver` is not in
    ///   a non-empty `required_approvals`.
    ///
    /// State is unchanged on error.
    pub fn complete(&mut self, task_id: &str, approver: &str) -> Result<HumanTask, RemediationError> {
        let mut task = self.completable(task_id, approver)?;
        task.status = TaskStatus::Completed;
        task.completed_at_ms = Some(crate::current_time_ms());
        task.completed_by = Some(approver.to_string());
        self.storage.put_task(task.clone())?;
        info!(task_id = %task.id, approver, "human task completed");
        Ok(task)
    }

    /// The task, if `approver` may complete it now.  Same errors as
    /// [`complete`](Self::complete), without side effects.
    pub fn completable(&self, task_id: &str, approver: &str) -> Result<HumanTask, RemediationError> {
        let task = self.open_task(task_id)?;
        if !task.accepts_approver(approver) {
            return Err(RemediationError::UnauthorizedApprover {
                task_id: task.id,
                approver: approver.to_string(),
            });
        }
        Ok(task)
    }

    /// The task, if it is still open.
    pub fn open_task(&self, task_id: &str) -> Result<HumanTask, RemediationError> {
        let task = self.get(task_id)?;
        if !task.status.is_open() {
            return Err(not_actionable(&task));
        }
        Ok(task)
    }

    /// Cancel an open task.
    pub fn cancel(&mut self, task_id: &str) -> Result<HumanTask, RemediationError> {
        let mut task = self.open_task(task_id)?;
        task.status = TaskStatus::Cancelled;
        self.storage.put_task(task.clone())?;
        info!(task_id = %task.id, "human task cancelled");
        Ok(task)
    }

    pub fn for_workflow(&self, workflow_id: &str) -> Vec<HumanTask> {
        self.storage.tasks_for_workflow(workflow_id)
    }

    /// Open tasks of `workflow_id`.
    pub fn pending_for_workflow(&self, workflow_id: &str) -> Vec<HumanTask> {
        self.for_workflow(workflow_id)
            .into_iter()
            .filter(|task| task.status.is_open())
            .collect()
    }

    /// Open tasks whose due date is before `now_ms`, most overdue first.
    pub fn overdue(&self, now_ms: u64) -> Vec<HumanTask> {
        let mut tasks: Vec<HumanTask> = self
            .storage
            .list_tasks()
            .into_iter()
            .filter(|task| task.is_overdue(now_ms))
            .collect();
        tasks.sort_by_key(|task| (task.due_at_ms, task.created_at_ms));
        tasks
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

fn not_actionable(task: &HumanTask) -> RemediationError {
    RemediationError::TaskNotActionable {
        task_id: task.id.clone(),
        status: task.status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::workflow::tests::sample_workflow;
    use crate::workflow::ActionKind;

    fn task_for(priority: RiskLevel) -> HumanTask {
        let mut workflow = sample_workflow(1);
        workflow.priority = priority;
        HumanTask::for_step(&workflow, &workflow.steps[0], &TaskPolicy::default())
    }

    #[test]
    fn policy_drives_assignee_and_approvals() {
        let critical = task_for(RiskLevel::Critical);
        assert_eq!(critical.assignee, "senior_compliance_officer");
        assert_eq!(critical.required_approvals, vec!["dpo".to_string(), "senior_management".into()]);
        let due = critical.due_at_ms.expect("due date") - critical.created_at_ms;
        assert_eq!(due, 8 * MS_PER_HOUR);

        let low = task_for(RiskLevel::Low);
        assert!(low.required_approvals.is_empty());
        assert!(low.accepts_approver("anyone"));
        assert!(low.title.starts_with("Approve: "));
    }

    #[test]
    fn review_steps_get_manual_instructions() {
        let mut workflow = sample_workflow(1);
        workflow.steps[0].action_type = ActionKind::LegalReview;
        let task = HumanTask::for_step(&workflow, &workflow.steps[0], &TaskPolicy::default());
        assert!(task.title.starts_with("Manual remediation: "));
        assert!(task.instructions[0].starts_with("Perform"));
    }

    #[test]
    fn manual_instructions_name_the_framework() {
        let mut workflow = sample_workflow(1);
        workflow.steps[0].action_type = ActionKind::LegalReview;
        workflow.metadata.insert("framework".into(), serde_json::json!("gdpr_eu"));
        let task = HumanTask::for_step(&workflow, &workflow.steps[0], &TaskPolicy::default());
        assert!(task
            .instructions
            .contains(&"Ensure compliance with GDPR (EU) requirements".to_string()));
    }

    #[test]
    fn lifecycle_and_guards() {
        let mut tracker = TaskTracker::new(InMemoryStorage::new());
        let task = task_for(RiskLevel::High);
        let id = task.id.clone();
        tracker.open(task).expect("open");

        assert!(matches!(
            tracker.complete(&id, "intern"),
            Err(RemediationError::UnauthorizedApprover { .. })
        ));
        assert_eq!(tracker.get(&id).expect("get").status, TaskStatus::Pending);

        tracker.start(&id).expect("start");
        assert!(tracker.start(&id).is_err());

        let done = tracker.complete(&id, "compliance_manager").expect("complete");
        assert_eq!(done.completed_by.as_deref(), Some("compliance_manager"));
        assert!(done.completed_at_ms.is_some());

        assert!(matches!(
            tracker.complete(&id, "compliance_manager"),
            Err(RemediationError::TaskNotActionable { .. })
        ));
        assert!(tracker.cancel(&id).is_err());
        assert!(matches!(tracker.get("nope"), Err(RemediationError::TaskNotFound(_))));
    }

    #[test]
    fn overdue_lists_only_open_tasks() {
        let mut tracker = TaskTracker::new(InMemoryStorage::new());
        let open = task_for(RiskLevel::Critical);
        let cancelled = task_for(RiskLevel::Critical);
        let cancelled_id = cancelled.id.clone();
        let far_future = open.due_at_ms.unwrap_or_default() + 1;
        tracker.open(open).expect("open");
        tracker.open(cancelled).expect("open");
        tracker.cancel(&cancelled_id).expect("cancel");

        assert_eq!(tracker.overdue(far_future).len(), 1);
        assert!(tracker.overdue(0).is_empty());
        assert_eq!(tracker.pending_for_workflow("wf-test").len(), 1);
        assert_eq!(tracker.for_workflow("wf-test").len(), 2);
    }
}
