// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Storage abstraction for the remediation engine.
//!
//! The [`Storage`] trait is the single interface between the engine and any
//! persistence layer.  This crate ships [`InMemoryStorage`] for development
//! and testing; the file-backed implementation lives in
//! `aumos-remediation-std`.
//!
//! Reads are infallible and return owned values.  Writes return
//! [`StorageError`] so that a failed flush reaches the caller instead of being
//! dropped.
//!
//! # Implementing `Storage`
//!
//! ```rust,no_run
//! use aumos_remediation_core::audit::{AuditFilter, TransitionRecord};
//! use aumos_remediation_core::storage::Storage;
//! use aumos_remediation_core::task::HumanTask;
//! use aumos_remediation_core::types::Decision;
//! use aumos_remediation_core::workflow::Workflow;
//! use aumos_remediation_core::StorageError;
//!
//! struct MyStorage;
//!
//! impl Storage for MyStorage {
//!     fn get_workflow(&self, _id: &str) -> Option<Workflow> { None }
//!     fn put_workflow(&mut self, _workflow: Workflow) -> Result<(), StorageError> { Ok(()) }
//!     fn list_workflows(&self) -> Vec<Workflow> { Vec::new() }
//!     fn get_task(&self, _id: &str) -> Option<HumanTask> { None }
//!     fn put_task(&mut self, _task: HumanTask) -> Result<(), StorageError> { Ok(()) }
//!     fn list_tasks(&self) -> Vec<HumanTask> { Vec::new() }
//!     fn get_decision(&self, _workflow_id: &str) -> Option<Decision> { None }
//!     fn put_decision(&mut self, _workflow_id: &str, _decision: Decision) -> Result<(), StorageError> {
//!         Ok(())
//!     }
//!     fn append_audit(&mut self, _record: TransitionRecord) -> Result<(), StorageError> { Ok(()) }
//!     fn query_audit(&self, _filter: &AuditFilter) -> Vec<TransitionRecord> { Vec::new() }
//! }
//! ```

use hashbrown::HashMap;

use crate::audit::{AuditFilter, TransitionRecord};
use crate::error::StorageError;
use crate::task::HumanTask;
use crate::types::Decision;
use crate::workflow::Workflow;

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Pluggable persistence interface for the remediation engine.
///
/// Implementations MUST be `Send + Sync`; the engine shares them across
/// Tokio tasks behind `RwLock`s.
pub trait Storage: Send + Sync {
    // ------------------------------------------------------------------
    // Workflows
    // ------------------------------------------------------------------

    fn get_workflow(&self, id: &str) -> Option<Workflow>;

    /// Insert or overwrite the workflow with `workflow.id`.
    fn put_workflow(&mut self, workflow: Workflow) -> Result<(), StorageError>;

    fn list_workflows(&self) -> Vec<Workflow>;

    // ------------------------------------------------------------------
    // Human tasks
    // ------------------------------------------------------------------

    fn get_task(&self, id: &str) -> Option<HumanTask>;

    /// Insert or overwrite the task with `task.id`.
    fn put_task(&mut self, task: HumanTask) -> Result<(), StorageError>;

    fn list_tasks(&self) -> Vec<HumanTask>;

    /// Tasks belonging to `workflow_id`, oldest first.
    fn tasks_for_workflow(&self, workflow_id: &str) -> Vec<HumanTask> {
        let mut tasks: Vec<HumanTask> = self
            .list_tasks()
            .into_iter()
            .filter(|task| task.workflow_id == workflow_id)
            .collect();
        tasks.sort_by(|left, right| {
            left.created_at_ms
                .cmp(&right.created_at_ms)
                .then_with(|| left.id.cmp(&right.id))
        });
        tasks
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// The decision a workflow was built from.
    fn get_decision(&self, workflow_id: &str) -> Option<Decision>;

    fn put_decision(&mut self, workflow_id: &str, decision: Decision) -> Result<(), StorageError>;

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Append an immutable transition record to the log.
    fn append_audit(&mut self, record: TransitionRecord) -> Result<(), StorageError>;

    /// Records matching `filter`, in append order.
    fn query_audit(&self, filter: &AuditFilter) -> Vec<TransitionRecord>;
}

// ---------------------------------------------------------------------------
// InMemoryStorage
// ---------------------------------------------------------------------------

/// A volatile [`Storage`] implementation backed by [`hashbrown::HashMap`].
///
/// Cloning produces an independent copy.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::storage::{InMemoryStorage, Storage};
///
/// let store = InMemoryStorage::new();
/// assert!(store.get_workflow("wf-missing").is_none());
/// assert!(store.list_tasks().is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    workflows: HashMap<String, Workflow>,
    tasks: HashMap<String, HumanTask>,
    /// Key: workflow id.
    decisions: HashMap<String, Decision>,
    audit: Vec<TransitionRecord>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.get(id).cloned()
    }

    fn put_workflow(&mut self, workflow: Workflow) -> Result<(), StorageError> {
        self.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    fn list_workflows(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self.workflows.values().cloned().collect();
        workflows.sort_by(|left, right| {
            left.created_at_ms
                .cmp(&right.created_at_ms)
                .then_with(|| left.id.cmp(&right.id))
        });
        workflows
    }

    fn get_task(&self, id: &str) -> Option<HumanTask> {
        self.tasks.get(id).cloned()
    }

    fn put_task(&mut self, task: HumanTask) -> Result<(), StorageError> {
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn list_tasks(&self) -> Vec<HumanTask> {
        self.tasks.values().cloned().collect()
    }

    fn get_decision(&self, workflow_id: &str) -> Option<Decision> {
        self.decisions.get(workflow_id).cloned()
    }

    fn put_decision(&mut self, workflow_id: &str, decision: Decision) -> Result<(), StorageError> {
        self.decisions.insert(workflow_id.to_string(), decision);
        Ok(())
    }

    fn append_audit(&mut self, record: TransitionRecord) -> Result<(), StorageError> {
        self.audit.push(record);
        Ok(())
    }

    fn query_audit(&self, filter: &AuditFilter) -> Vec<TransitionRecord> {
        filter.apply(self.audit.iter())
    }
}
