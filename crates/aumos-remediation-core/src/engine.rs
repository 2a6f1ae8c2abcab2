// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Remediation engine, the top-level composition of every component.
//!
//! [`RemediationEngine`] wires the [`DecisionAgent`], [`WorkflowBuilder`] and
//! [`WorkflowExecutor`] to storage-backed managers.  Each storage-backed
//! manager sits behind its own [`tokio::sync::RwLock`] so the engine can be
//! shared across Tokio tasks (wrap it in an `Arc`).
//!
//! ## Flow
//!
//! 1. [`decide`](RemediationEngine::decide): signal → decision.
//! 2. [`open_workflow`](RemediationEngine::open_workflow): decision → validated,
//!    stored `pending` workflow.
//! 3. [`advance`](RemediationEngine::advance): run until terminal or a human
//!    task is opened.
//! 4. [`complete_task`](RemediationEngine::complete_task) /
//!    [`cancel_task`](RemediationEngine::cancel_task): resolve the task, then
//!    `advance` again.
//!
//! Every transition is appended to the audit chain, and a workflow is folded
//! into the metrics exactly once, when it first reaches a terminal state.
//!
//! ## Concurrency
//!
//! A lease table admits one `advance` (or task resolution) per workflow at a
//! time; a second caller gets [`RemediationError::WorkflowBusy`].
//! [`cancel`](RemediationEngine::cancel) on a leased workflow raises the
//! lease's [`CancelFlag`].  An in-flight `advance` honours it at its next
//! transition, and every lease holder checks it once more before letting go,
//! so a request that lands after the last transition is still applied.

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::agent::DecisionAgent;
use crate::audit::{AuditFilter, AuditLogger, TransitionRecord};
use crate::builder::WorkflowBuilder;
use crate::config::Config;
use crate::error::RemediationError;
use crate::executor::{ActionHandler, Advance, CancelFlag, WorkflowExecutor};
use crate::metrics::{Metrics, MetricsAggregator, WorkflowOutcome};
use crate::reasoner::Reasoner;
use crate::storage::Storage;
use crate::task::{HumanTask, TaskTracker};
use crate::types::{Decision, Signal};
use crate::validation::{assess_feasibility, validate_plan, Feasibility, PlanIssue};
use crate::workflow::{Transition, Workflow};

/// Composes the remediation components into a single API.
///
/// Generic over storage `S`, reasoner `R` and action handler `H`; nothing is
/// global.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     config::Config,
///     engine::RemediationEngine,
///     executor::NoopActionHandler,
///     reasoner::UnavailableReasoner,
///     storage::InMemoryStorage,
///     types::{RiskLevel, Signal},
///     workflow::WorkflowStatus,
/// };
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let engine = RemediationEngine::new(
///     Config::default(),
///     InMemoryStorage::new(),
///     UnavailableReasoner,
///     NoopActionHandler,
/// );
///
/// let signal = Signal::new("sig-2", "v-2", "ledger", RiskLevel::High)
///     .with_actions(["Encrypt ledger export"]);
/// let (_, workflow) = engine.process_signal(&signal).await.unwrap();
///
/// // High risk is human-in-the-loop: the first step waits for approval.
/// let workflow = engine.advance(&workflow.id).await.unwrap();
/// assert_eq!(workflow.status, WorkflowStatus::RequiresHuman);
///
/// let task = engine.tasks_for_workflow(&workflow.id).await.remove(0);
/// engine.complete_task(&task.id, "compliance_manager").await.unwrap();
///
/// let workflow = engine.advance(&workflow.id).await.unwrap();
/// assert_eq!(workflow.status, WorkflowStatus::Completed);
/// assert_eq!(engine.metrics().success_rate, 1.0);
/// # });
/// ```
pub struct RemediationEngine<S: Storage, R: Reasoner, H: ActionHandler> {
    agent: DecisionAgent<R>,
    builder: WorkflowBuilder,
    executor: WorkflowExecutor<H>,
    /// Workflows and decisions.
    store: RwLock<S>,
    tasks: RwLock<TaskTracker<S>>,
    audit: RwLock<AuditLogger<S>>,
    metrics: MetricsAggregator,
    leases: Mutex<HashMap<String, CancelFlag>>,
}

impl<S: Storage + Clone, R: Reasoner, H: ActionHandler> RemediationEngine<S, R, H> {
    /// Construct an engine.  `storage` is cloned once per storage-backed
    /// manager.  Clones of `InMemoryStorage` are independent, so each manager
    /// keeps its own records; shared backends such as `FileStorage` see one
    /// document.
    pub fn new(config: Config, storage: S, reasoner: R, handler: H) -> Self {
        Self::from_parts(
            DecisionAgent::new(reasoner, config.clone()),
            WorkflowBuilder::new(&config),
            WorkflowExecutor::new(handler, &config),
            storage.clone(),
            TaskTracker::new(storage.clone()),
            AuditLogger::new(storage),
        )
    }
}

impl<S: Storage, R: Reasoner, H: ActionHandler> RemediationEngine<S, R, H> {
    /// Construct an engine from pre-built components, for storage types that
    /// do not implement [`Clone`] or for sharded storage.
    pub fn from_parts(
        agent: DecisionAgent<R>,
        builder: WorkflowBuilder,
        executor: WorkflowExecutor<H>,
        store: S,
        tasks: TaskTracker<S>,
        audit: AuditLogger<S>,
    ) -> Self {
        Self {
            agent,
            builder,
            executor,
            store: RwLock::new(store),
            tasks: RwLock::new(tasks),
            audit: RwLock::new(audit),
            metrics: MetricsAggregator::new(),
            leases: Mutex::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Decisions and workflow creation
    // ------------------------------------------------------------------

    /// Classify `signal`.  See [`DecisionAgent::make_decision`].
    pub async fn decide(&self, signal: &Signal) -> Result<Decision, RemediationError> {
        self.agent.make_decision(signal).await
    }

    /// Build, validate and persist a `pending` workflow for `decision`.
    ///
    /// Plan warnings and the feasibility score are recorded in the
    /// workflow's metadata; a plan with errors is refused with
    /// [`RemediationError::InvalidPlan`] and nothing is stored.
    pub async fn open_workflow(
        &self,
        decision: &Decision,
        signal: &Signal,
    ) -> Result<Workflow, RemediationError> {
        signal.validate()?;
        if decision.violation_id() != signal.violation_id {
            return Err(RemediationError::InvalidDecision(format!(
                "decision is for violation {}, signal is for {}",
                decision.violation_id(),
                signal.violation_id
            )));
        }

        let mut workflow = self.builder.build(decision, signal);
        let plan = validate_plan(&workflow, decision);
        if !plan.is_valid() {
            let reasons: Vec<&str> = plan.errors().map(|issue| issue.message.as_str()).collect();
            warn!(
                violation_id = %signal.violation_id,
                errors = reasons.len(),
                "remediation plan refused"
            );
            return Err(RemediationError::InvalidPlan(reasons.join("; ")));
        }
        let warnings: Vec<&PlanIssue> = plan.warnings().collect();
        if !warnings.is_empty() {
            workflow.metadata.insert("plan_warnings".into(), json!(warnings));
        }
        let feasibility = assess_feasibility(signal, decision);
        workflow
            .metadata
            .insert("feasibility_score".into(), json!(feasibility.score));

        {
            let mut store = self.store.write().await;
            store.put_decision(&workflow.id, decision.clone())?;
            store.put_workflow(workflow.clone())?;
        }
        info!(
            workflow_id = %workflow.id,
            violation_id = %workflow.violation_id,
            remediation_type = %workflow.remediation_type,
            steps = workflow.steps.len(),
            warnings = plan.warnings().count(),
            "workflow opened"
        );
        Ok(workflow)
    }

    /// Feasibility report for automating `signal` under `decision`.
    pub fn assess_feasibility(
        &self,
        signal: &Signal,
        decision: &Decision,
    ) -> Result<Feasibility, RemediationError> {
        signal.validate()?;
        Ok(assess_feasibility(signal, decision))
    }

    /// [`decide`](Self::decide) then [`open_workflow`](Self::open_workflow).
    pub async fn process_signal(
        &self,
        signal: &Signal,
    ) -> Result<(Decision, Workflow), RemediationError> {
        let decision = self.decide(signal).await?;
        let workflow = self.open_workflow(&decision, signal).await?;
        Ok((decision, workflow))
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run the workflow until it is terminal or waiting on a human task, and
    /// return its new state.
    ///
    /// # Errors
    ///
    /// [`RemediationError::WorkflowBusy`] while another call holds the
    /// workflow, [`RemediationError::WorkflowNotFound`] for an unknown id,
    /// and storage failures.  A failed step is not an error.
    pub async fn advance(&self, workflow_id: &str) -> Result<Workflow, RemediationError> {
        let lease = self.lease(workflow_id)?;
        let mut workflow = self.load(workflow_id).await?;
        let was_terminal = workflow.is_terminal();

        let report = self.executor.advance(&mut workflow, &lease.flag).await?;
        match &report.outcome {
            Advance::AwaitingHuman(task) => {
                self.tasks.write().await.open(task.clone())?;
                if let Err(error) = self.store.write().await.put_workflow(workflow.clone()) {
                    self.withdraw_task(&task.id).await;
                    return Err(error.into());
                }
            }
            Advance::Cancelled => {
                self.cancel_open_tasks(workflow_id).await?;
                self.save(&workflow).await?;
            }
            _ => self.save(&workflow).await?,
        }

        self.log(report.transitions).await?;
        self.record_if_finished(was_terminal, &workflow).await;
        self.release(lease, workflow).await
    }

    /// Cancel a workflow.
    ///
    /// When another call holds the workflow the request is recorded on its
    /// lease and applied before that call returns; the stored state is
    /// returned unchanged.  Otherwise the workflow and its open tasks are
    /// cancelled immediately.
    pub async fn cancel(&self, workflow_id: &str) -> Result<Workflow, RemediationError> {
        let Some(_lease) = self.lease_or_flag(workflow_id) else {
            info!(workflow_id, "cancellation requested for in-flight workflow");
            return self.load(workflow_id).await;
        };

        let mut workflow = self.load(workflow_id).await?;
        let was_terminal = workflow.is_terminal();
        let transitions = self.executor.cancel(&mut workflow, "cancelled by request")?;
        self.cancel_open_tasks(workflow_id).await?;
        self.persist(&workflow, transitions).await?;
        self.record_if_finished(was_terminal, &workflow).await;
        Ok(workflow)
    }

    // ------------------------------------------------------------------
    // Human tasks
    // ------------------------------------------------------------------

    /// Complete a human task as `approver` and resume its workflow.
    ///
    /// The gated step is marked completed and the workflow returns to
    /// `in_progress`; call [`advance`](Self::advance) to continue.  On any
    /// error neither the task nor the workflow changes.
    pub async fn complete_task(
        &self,
        task_id: &str,
        approver: &str,
    ) -> Result<Workflow, RemediationError> {
        let task = self.tasks.read().await.completable(task_id, approver)?;
        let lease = self.lease(&task.workflow_id)?;
        let mut workflow = self.load(&task.workflow_id).await?;

        let mut preview = task.clone();
        preview.completed_by = Some(approver.to_string());
        let transitions = self.executor.resume_after_approval(&mut workflow, &preview)?;

        self.tasks.write().await.complete(task_id, approver)?;
        self.persist(&workflow, transitions).await?;
        self.release(lease, workflow).await
    }

    /// Claim a pending task.
    pub async fn start_task(&self, task_id: &str) -> Result<HumanTask, RemediationError> {
        self.tasks.write().await.start(task_id)
    }

    /// Cancel a human task; its workflow is cancelled with it.
    pub async fn cancel_task(&self, task_id: &str) -> Result<Workflow, RemediationError> {
        let task = self.tasks.read().await.open_task(task_id)?;
        let lease = self.lease(&task.workflow_id)?;
        let mut workflow = self.load(&task.workflow_id).await?;
        let was_terminal = workflow.is_terminal();

        let transitions = self.executor.cancel_after_task_cancel(&mut workflow, &task)?;
        self.tasks.write().await.cancel(task_id)?;
        self.persist(&workflow, transitions).await?;
        self.record_if_finished(was_terminal, &workflow).await;
        self.release(lease, workflow).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn workflow(&self, workflow_id: &str) -> Result<Workflow, RemediationError> {
        self.load(workflow_id).await
    }

    pub async fn decision_for(&self, workflow_id: &str) -> Option<Decision> {
        self.store.read().await.get_decision(workflow_id)
    }

    pub async fn tasks_for_workflow(&self, workflow_id: &str) -> Vec<HumanTask> {
        self.tasks.read().await.for_workflow(workflow_id)
    }

    /// Open tasks past their due date at `now_ms`.
    pub async fn overdue_tasks(&self, now_ms: u64) -> Vec<HumanTask> {
        self.tasks.read().await.overdue(now_ms)
    }

    pub async fn query_audit(&self, filter: &AuditFilter) -> Vec<TransitionRecord> {
        self.audit.read().await.query(filter)
    }

    /// Recompute the audit hash chain.
    pub async fn verify_audit(&self) -> bool {
        self.audit.read().await.verify()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Return the metrics and reset the window.
    pub fn rollup_metrics(&self) -> Metrics {
        self.metrics.rollup()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lease(&self, workflow_id: &str) -> Result<Lease<'_>, RemediationError> {
        let mut leases = self.leases.lock();
        if leases.contains_key(workflow_id) {
            return Err(RemediationError::WorkflowBusy(workflow_id.to_string()));
        }
        let flag = CancelFlag::new();
        leases.insert(workflow_id.to_string(), flag.clone());
        Ok(Lease {
            table: &self.leases,
            workflow_id: workflow_id.to_string(),
            flag,
            released: false,
        })
    }

    /// Claim the workflow, or raise the current holder's flag if it is busy.
    /// Both happen under one lock so the request cannot fall between a
    /// holder's release and a new claim.
    fn lease_or_flag(&self, workflow_id: &str) -> Option<Lease<'_>> {
        let mut leases = self.leases.lock();
        if let Some(flag) = leases.get(workflow_id) {
            flag.cancel();
            return None;
        }
        let flag = CancelFlag::new();
        leases.insert(workflow_id.to_string(), flag.clone());
        Some(Lease {
            table: &self.leases,
            workflow_id: workflow_id.to_string(),
            flag,
            released: false,
        })
    }

    /// Give up `lease`, first cancelling `workflow` if a request was raised
    /// on it while it was held.
    async fn release(
        &self,
        mut lease: Lease<'_>,
        mut workflow: Workflow,
    ) -> Result<Workflow, RemediationError> {
        if lease.try_release() || workflow.is_terminal() {
            return Ok(workflow);
        }

        let transitions = self.executor.cancel(&mut workflow, "cancellation requested")?;
        self.cancel_open_tasks(&workflow.id).await?;
        self.persist(&workflow, transitions).await?;
        self.record_if_finished(false, &workflow).await;
        Ok(workflow)
    }

    async fn load(&self, workflow_id: &str) -> Result<Workflow, RemediationError> {
        self.store
            .read()
            .await
            .get_workflow(workflow_id)
            .ok_or_else(|| RemediationError::WorkflowNotFound(workflow_id.to_string()))
    }

    async fn persist(
        &self,
        workflow: &Workflow,
        transitions: Vec<Transition>,
    ) -> Result<(), RemediationError> {
        self.save(workflow).await?;
        self.log(transitions).await
    }

    async fn save(&self, workflow: &Workflow) -> Result<(), RemediationError> {
        self.store.write().await.put_workflow(workflow.clone())?;
        Ok(())
    }

    async fn log(&self, transitions: Vec<Transition>) -> Result<(), RemediationError> {
        let mut audit = self.audit.write().await;
        for transition in transitions {
            audit.log(transition)?;
        }
        Ok(())
    }

    /// Cancel a task whose workflow could not be saved, so the next
    /// `advance` does not leave two open tasks on the same step.
    async fn withdraw_task(&self, task_id: &str) {
        if let Err(error) = self.tasks.write().await.cancel(task_id) {
            warn!(task_id, %error, "could not withdraw task after failed workflow write");
        }
    }

    async fn cancel_open_tasks(&self, workflow_id: &str) -> Result<(), RemediationError> {
        let mut tasks = self.tasks.write().await;
        for task in tasks.pending_for_workflow(workflow_id) {
            tasks.cancel(&task.id)?;
        }
        Ok(())
    }

    async fn record_if_finished(&self, was_terminal: bool, workflow: &Workflow) {
        if was_terminal || !workflow.is_terminal() {
            return;
        }
        match self.store.read().await.get_decision(&workflow.id) {
            Some(decision) => {
                self.metrics.record(&decision, &WorkflowOutcome::from_workflow(workflow));
                info!(
                    workflow_id = %workflow.id,
                    status = %workflow.status,
                    "workflow outcome recorded"
                );
            }
            None => warn!(workflow_id = %workflow.id, "no decision stored; outcome not recorded"),
        }
    }
}

/// Exclusive claim on one workflow; released on drop.
struct Lease<'a> {
    table: &'a Mutex<HashMap<String, CancelFlag>>,
    workflow_id: String,
    flag: CancelFlag,
    released: bool,
}

impl Lease<'_> {
    /// Remove the entry unless its flag is raised.  The check and the removal
    /// share the table lock, so a raised flag is never lost.
    fn try_release(&mut self) -> bool {
        let mut table = self.table.lock();
        if self.flag.is_cancelled() {
            return false;
        }
        table.remove(&self.workflow_id);
        self.released = true;
        true
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.table.lock().remove(&self.workflow_id);
        }
    }
}
