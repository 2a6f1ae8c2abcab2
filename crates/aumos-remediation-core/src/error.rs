// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Error types surfaced by the remediation core.
//!
//! Reasoner failures ([`crate::reasoner::ReasonerError`]) and step failures
//! ([`crate::executor::ActionError`]) are recovered internally and never reach
//! the caller as a [`RemediationError`].  What remains here is input
//! validation, illegal state transitions, task authorisation and persistence.

use thiserror::Error;

use crate::workflow::WorkflowStatus;

/// Top-level error for every fallible public operation.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("invalid decision: {0}")]
    InvalidDecision(String),

    #[error("illegal transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("remediation plan rejected: {0}")]
    InvalidPlan(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("human task not found: {0}")]
    TaskNotFound(String),

    #[error("approver {approver:?} is not among the required approvals for task {task_id}")]
    UnauthorizedApprover { task_id: String, approver: String },

    #[error("task {task_id} cannot be acted on in status {status}")]
    TaskNotActionable { task_id: String, status: String },

    #[error("workflow {0} is already being advanced")]
    WorkflowBusy(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure reported by a [`Storage`](crate::storage::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A [`Config`](crate::config::Config) value the engine cannot honour.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {field} {reason}")]
pub struct InvalidConfig {
    pub field: &'static str,
    pub reason: &'static str,
}

impl InvalidConfig {
    pub(crate) fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}
