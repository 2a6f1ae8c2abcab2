// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Workflow executor.
//!
//! [`WorkflowExecutor::advance`] runs a workflow from its current step until
//! it completes, fails, is cancelled, or reaches a step that needs a person.
//! Human suspension is cooperative: the executor returns
//! [`Advance::AwaitingHuman`] with the task it opened, and the caller
//! re-invokes `advance` after [`WorkflowExecutor::resume_after_approval`].
//!
//! Automated steps run through the injected [`ActionHandler`].  A
//! [transient](ActionError::transient) failure is retried with the configured
//! backoff until the step's `retry_count` reaches `max_retries`; a
//! [permanent](ActionError::permanent) failure fails the step at once.
//! Either way the workflow ends `failed`, which is an outcome, not an error.
//!
//! Cancellation is observed between attempts through a [`CancelFlag`]; an
//! attempt already running is allowed to finish first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, RetryPolicy, TaskPolicy};
use crate::error::RemediationError;
use crate::task::HumanTask;
use crate::workflow::{Step, Transition, Workflow, WorkflowStatus};

// ---------------------------------------------------------------------------
// Action seam
// ---------------------------------------------------------------------------

/// Failure reported by an [`ActionHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
    /// Whether another attempt may succeed.
    pub retryable: bool,
}

impl ActionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

/// Performs the side effect behind an automated step.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, step: &Step, workflow: &Workflow) -> Result<Value, ActionError>;
}

#[async_trait]
impl<H: ActionHandler + ?Sized> ActionHandler for Arc<H> {
    async fn execute(&self, step: &Step, workflow: &Workflow) -> Result<Value, ActionError> {
        (**self).execute(step, workflow).await
    }
}

/// Succeeds immediately and echoes the step's action type.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActionHandler;

#[async_trait]
impl ActionHandler for NoopActionHandler {
    async fn execute(&self, step: &Step, _workflow: &Workflow) -> Result<Value, ActionError> {
        Ok(json!({ "action_type": step.action_type, "status": "ok" }))
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared cancellation request for one in-flight `advance`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Where an `advance` call stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Completed,
    Failed { step_id: String, error: String },
    /// A gated step was reached; the task must be persisted by the caller.
    AwaitingHuman(HumanTask),
    Cancelled,
    /// Nothing to do: the workflow is terminal or already waiting on a person.
    Unchanged(WorkflowStatus),
}

/// Outcome plus every transition taken, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceReport {
    pub outcome: Advance,
    pub transitions: Vec<Transition>,
}

enum StepOutcome {
    Succeeded(Value),
    Failed(ActionError),
    Cancelled,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct WorkflowExecutor<H: ActionHandler> {
    handler: H,
    retry: RetryPolicy,
    tasks: TaskPolicy,
}

impl<H: ActionHandler> WorkflowExecutor<H> {
    pub fn new(handler: H, config: &Config) -> Self {
        Self {
            handler,
            retry: config.retry.clone(),
            tasks: config.tasks.clone(),
        }
    }

    /// Drive `workflow` forward.  See the module docs for the state machine.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use aumos_remediation_core::{
    ///     builder::WorkflowBuilder,
    ///     config::Config,
    ///     executor::{Advance, CancelFlag, NoopActionHandler, WorkflowExecutor},
    ///     types::{Decision, DecisionSource, RemediationType, RiskLevel, Signal},
    ///     workflow::WorkflowStatus,
    /// };
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let config = Config::default();
    /// let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Update flag"]);
    /// let decision = Decision::new(
    ///     "v", RemediationType::Automatic, 0.95, "simple", 15,
    ///     vec![], RiskLevel::Low, DecisionSource::RuleBased,
    /// ).unwrap();
    /// let mut workflow = WorkflowBuilder::new(&config).build(&decision, &signal);
    ///
    /// let executor = WorkflowExecutor::new(NoopActionHandler, &config);
    /// let report = executor.advance(&mut workflow, &CancelFlag::new()).await.unwrap();
    /// assert_eq!(report.outcome, Advance::Completed);
    /// assert_eq!(workflow.status, WorkflowStatus::Completed);
    /// assert_eq!(workflow.current_step_index, 1);
    /// # });
    /// ```
    pub async fn advance(
        &self,
        workflow: &mut Workflow,
        cancel: &CancelFlag,
    ) -> Result<AdvanceReport, RemediationError> {
        let mut transitions = Vec::new();

        if workflow.is_terminal() {
            return Ok(report(Advance::Unchanged(workflow.status), transitions));
        }
        if cancel.is_cancelled() {
            transitions.extend(self.cancel(workflow, "cancellation requested")?);
            return Ok(report(Advance::Cancelled, transitions));
        }
        if workflow.status == WorkflowStatus::RequiresHuman {
            return Ok(report(Advance::Unchanged(workflow.status), transitions));
        }
        if workflow.status == WorkflowStatus::Pending {
            push(&mut transitions, workflow.transition_to(WorkflowStatus::InProgress, "execution started")?);
        }

        loop {
            if cancel.is_cancelled() {
                transitions.extend(self.cancel(workflow, "cancellation requested")?);
                return Ok(report(Advance::Cancelled, transitions));
            }

            let index = workflow.current_step_index;
            if index >= workflow.steps.len() {
                push(&mut transitions, workflow.transition_to(WorkflowStatus::Completed, "all steps completed")?);
                info!(workflow_id = %workflow.id, steps = workflow.steps.len(), "workflow completed");
                return Ok(report(Advance::Completed, transitions));
            }

            if workflow.steps[index].status == WorkflowStatus::Pending {
                push(&mut transitions, workflow.transition_step(index, WorkflowStatus::InProgress, "step started")?);
            }

            if workflow.steps[index].requires_human_approval {
                let task = HumanTask::for_step(workflow, &workflow.steps[index], &self.tasks);
                workflow.steps[index].human_task_id = Some(task.id.clone());
                push(&mut transitions, workflow.transition_step(index, WorkflowStatus::RequiresHuman, "awaiting human task")?);
                push(
                    &mut transitions,
                    workflow.transition_to(WorkflowStatus::RequiresHuman, format!("awaiting task {}", task.id))?,
                );
                info!(
                    workflow_id = %workflow.id,
                    step_id = %workflow.steps[index].id,
                    task_id = %task.id,
                    "workflow paused for human task"
                );
                return Ok(report(Advance::AwaitingHuman(task), transitions));
            }

            match self.run_step(workflow, index, cancel).await {
                StepOutcome::Succeeded(output) => {
                    workflow.steps[index].output = Some(output);
                    push(&mut transitions, workflow.transition_step(index, WorkflowStatus::Completed, "step completed")?);
                    workflow.current_step_index += 1;
                }
                StepOutcome::Failed(error) => {
                    let step_id = workflow.steps[index].id.clone();
                    workflow.steps[index].error_message = Some(error.message.clone());
                    push(&mut transitions, workflow.transition_step(index, WorkflowStatus::Failed, error.message.clone())?);
                    push(
                        &mut transitions,
                        workflow.transition_to(WorkflowStatus::Failed, format!("step {step_id} failed"))?,
                    );
                    info!(
                        workflow_id = %workflow.id,
                        %step_id,
                        retry_count = workflow.steps[index].retry_count,
                        error = %error,
                        "workflow failed"
                    );
                    return Ok(report(Advance::Failed { step_id, error: error.message }, transitions));
                }
                StepOutcome::Cancelled => {
                    transitions.extend(self.cancel(workflow, "cancellation requested")?);
                    return Ok(report(Advance::Cancelled, transitions));
                }
            }
        }
    }

    /// Run the step at `index` until it succeeds, fails for good, or
    /// cancellation is observed between attempts (before or after a backoff).
    async fn run_step(&self, workflow: &mut Workflow, index: usize, cancel: &CancelFlag) -> StepOutcome {
        loop {
            let attempt = self.handler.execute(&workflow.steps[index], workflow).await;
            let error = match attempt {
                Ok(output) => return StepOutcome::Succeeded(output),
                Err(error) => error,
            };
            if !error.retryable {
                return StepOutcome::Failed(error);
            }

            let step = &mut workflow.steps[index];
            step.retry_count += 1;
            if step.retry_count >= step.max_retries {
                return StepOutcome::Failed(ActionError {
                    message: format!("retries exhausted after {} attempts: {}", step.retry_count, error.message),
                    retryable: false,
                });
            }

            let delay = self.retry.delay_for(step.retry_count);
            warn!(
                workflow_id = %workflow.id,
                step_id = %step.id,
                retry_count = step.retry_count,
                max_retries = step.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "step attempt failed; retrying"
            );

            if cancel.is_cancelled() {
                return StepOutcome::Cancelled;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                // A request raised during the backoff wins over the next attempt.
                if cancel.is_cancelled() {
                    return StepOutcome::Cancelled;
                }
            }
        }
    }

    /// Resume a `requires_human` workflow after `task` was completed.
    ///
    /// The gated step is marked completed and the cursor moves past it; the
    /// next `advance` call continues with the following step.
    pub fn resume_after_approval(
        &self,
        workflow: &mut Workflow,
        task: &HumanTask,
    ) -> Result<Vec<Transition>, RemediationError> {
        let index = self.gated_step(workflow, task)?;
        let mut transitions = Vec::new();

        push(&mut transitions, workflow.transition_step(index, WorkflowStatus::InProgress, format!("task {} completed", task.id))?);
        workflow.steps[index].output = Some(json!({
            "human_task_id": task.id,
            "completed_by": task.completed_by,
        }));
        push(&mut transitions, workflow.transition_step(index, WorkflowStatus::Completed, "approved by human")?);
        workflow.current_step_index = index + 1;
        push(&mut transitions, workflow.transition_to(WorkflowStatus::InProgress, "resumed after human task")?);
        Ok(transitions)
    }

    /// Cancel a `requires_human` workflow whose gating task was cancelled.
    pub fn cancel_after_task_cancel(
        &self,
        workflow: &mut Workflow,
        task: &HumanTask,
    ) -> Result<Vec<Transition>, RemediationError> {
        self.gated_step(workflow, task)?;
        self.cancel(workflow, format!("task {} cancelled", task.id))
    }

    /// Cancel `workflow` from any non-terminal state.  The current step is
    /// cancelled with it if it had started.
    pub fn cancel(
        &self,
        workflow: &mut Workflow,
        note: impl Into<String>,
    ) -> Result<Vec<Transition>, RemediationError> {
        let note = note.into();
        let mut transitions = Vec::new();
        let index = workflow.current_step_index;
        let step_started = workflow.current_step().is_some_and(|step| {
            matches!(step.status, WorkflowStatus::InProgress | WorkflowStatus::RequiresHuman)
        });
        if !workflow.is_terminal() && step_started {
            push(&mut transitions, workflow.transition_step(index, WorkflowStatus::Cancelled, note.clone())?);
        }
        push(&mut transitions, workflow.transition_to(WorkflowStatus::Cancelled, note)?);
        info!(workflow_id = %workflow.id, "workflow cancelled");
        Ok(transitions)
    }

    fn gated_step(&self, workflow: &Workflow, task: &HumanTask) -> Result<usize, RemediationError> {
        if workflow.status != WorkflowStatus::RequiresHuman {
            return Err(RemediationError::InvalidTransition {
                entity: format!("workflow {}", workflow.id),
                from: workflow.status,
                to: WorkflowStatus::InProgress,
            });
        }
        match workflow.current_step() {
            Some(step) if step.human_task_id.as_deref() == Some(task.id.as_str()) => {
                Ok(workflow.current_step_index)
            }
            _ => Err(RemediationError::TaskNotActionable {
                task_id: task.id.clone(),
                status: format!("not gating workflow {}", workflow.id),
            }),
        }
    }
}

fn report(outcome: Advance, transitions: Vec<Transition>) -> AdvanceReport {
    AdvanceReport { outcome, transitions }
}

fn push(transitions: &mut Vec<Transition>, transition: Transition) {
    debug!(
        workflow_id = %transition.workflow_id,
        step_id = ?transition.step_id,
        from = %transition.from,
        to = %transition.to,
        "transition"
    );
    transitions.push(transition);
}
