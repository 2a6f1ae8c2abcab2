// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Audit trail for workflow and step transitions.
//!
//! [`AuditLogger`] exposes three operations:
//!
//! * [`log`](AuditLogger::log)      : append a [`Transition`]
//! * [`query`](AuditLogger::query)  : filter the chain
//! * [`verify`](AuditLogger::verify): recompute every link
//!
//! Records are chained via SHA-256: each record's hash covers its own fields
//! and the previous record's hash, so editing or removing any record breaks
//! every hash after it.  The log is recording only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::storage::Storage;
use crate::workflow::{Transition, WorkflowStatus};

/// Hash of the (absent) record before the first one.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A persisted, hash-linked [`Transition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: String,
    pub workflow_id: String,
    pub step_id: Option<String>,
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub note: String,
    pub timestamp_ms: u64,
    pub hash: String,
    pub prev_hash: String,
}

/// Criteria for [`AuditLogger::query`].  Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub workflow_id: Option<String>,
    pub since_ms: Option<u64>,
    pub until_ms: Option<u64>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn for_workflow(workflow_id: impl Into<String>) -> Self {
        Self { workflow_id: Some(workflow_id.into()), ..Self::default() }
    }

    pub fn matches(&self, record: &TransitionRecord) -> bool {
        if let Some(ref workflow_id) = self.workflow_id {
            if &record.workflow_id != workflow_id {
                return false;
            }
        }
        if let Some(since_ms) = self.since_ms {
            if record.timestamp_ms < since_ms {
                return false;
            }
        }
        if let Some(until_ms) = self.until_ms {
            if record.timestamp_ms > until_ms {
                return false;
            }
        }
        true
    }

    /// Filter `records` (in append order) and apply the limit.
    pub fn apply<'a, I>(&self, records: I) -> Vec<TransitionRecord>
    where
        I: IntoIterator<Item = &'a TransitionRecord>,
    {
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Records transitions in a chained, tamper-evident log.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     audit::{AuditFilter, AuditLogger},
///     storage::InMemoryStorage,
///     workflow::{Transition, WorkflowStatus},
/// };
///
/// let mut logger = AuditLogger::new(InMemoryStorage::new());
/// logger.log(Transition {
///     workflow_id: "wf-1".into(),
///     step_id: None,
///     from: WorkflowStatus::Pending,
///     to: WorkflowStatus::InProgress,
///     note: "execution started".into(),
///     timestamp_ms: 0,
/// }).unwrap();
///
/// assert_eq!(logger.query(&AuditFilter::for_workflow("wf-1")).len(), 1);
/// assert!(logger.verify());
/// ```
pub struct AuditLogger<S: Storage> {
    storage: S,
    /// Hash of the most recently appended record.
    last_hash: String,
}

impl<S: Storage> AuditLogger<S> {
    /// Create a logger that continues the chain already held by `storage`.
    pub fn new(storage: S) -> Self {
        let last_hash = storage
            .query_audit(&AuditFilter::default())
            .last()
            .map(|record| record.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        Self { storage, last_hash }
    }

    /// Append `transition` to the chain and return the stored record.
    pub fn log(&mut self, transition: Transition) -> Result<TransitionRecord, StorageError> {
        let prev_hash = self.last_hash.clone();
        let hash = compute_hash(&transition, &prev_hash);
        let record = TransitionRecord {
            id: format!("{}-{}", transition.workflow_id, &hash[..12]),
            workflow_id: transition.workflow_id,
            step_id: transition.step_id,
            from: transition.from,
            to: transition.to,
            note: transition.note,
            timestamp_ms: transition.timestamp_ms,
            hash: hash.clone(),
            prev_hash,
        };

        self.storage.append_audit(record.clone())?;
        self.last_hash = hash;
        Ok(record)
    }

    pub fn query(&self, filter: &AuditFilter) -> Vec<TransitionRecord> {
        self.storage.query_audit(filter)
    }

    /// The hash of the most recently appended record.
    pub fn chain_tip(&self) -> &str {
        &self.last_hash
    }

    /// Recompute every hash from genesis.  `false` if any link is broken.
    pub fn verify(&self) -> bool {
        verify_chain(&self.storage.query_audit(&AuditFilter::default()))
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

/// Check that `records` (the full log, in append order) form an unbroken
/// chain starting at [`GENESIS_HASH`].
pub fn verify_chain(records: &[TransitionRecord]) -> bool {
    let mut expected_prev = GENESIS_HASH.to_string();
    for record in records {
        if record.prev_hash != expected_prev {
            return false;
        }
        let transition = Transition {
            workflow_id: record.workflow_id.clone(),
            step_id: record.step_id.clone(),
            from: record.from,
            to: record.to,
            note: record.note.clone(),
            timestamp_ms: record.timestamp_ms,
        };
        if compute_hash(&transition, &record.prev_hash) != record.hash {
            return false;
        }
        expected_prev = record.hash.clone();
    }
    true
}

// ---------------------------------------------------------------------------
// Hash chain implementation
// ---------------------------------------------------------------------------

/// SHA-256 over the previous hash and every transition field, hex encoded.
fn compute_hash(transition: &Transition, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    for field in [
        transition.workflow_id.as_str(),
        transition.step_id.as_deref().unwrap_or("-"),
        transition.from.as_str(),
        transition.to.as_str(),
        transition.note.as_str(),
    ] {
        hasher.update([0x1f_u8]);
        hasher.update(field.as_bytes());
    }
    hasher.update([0x1f_u8]);
    hasher.update(transition.timestamp_ms.to_be_bytes());
    hex::encode(hasher.finalize())
}
