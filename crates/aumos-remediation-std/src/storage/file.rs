// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! File-based JSON storage backend.
//!
//! [`FileStorage`] persists all remediation state to a single JSON file on
//! disk.  Every mutation flushes the file atomically (write-rename) so that a
//! crash mid-write does not corrupt existing data.  A mutation whose flush
//! fails is rolled back in memory and the error is returned.
//!
//! ## Layout
//!
//! ```json
//! {
//!   "workflows": { "<workflow_id>": Workflow,  ... },
//!   "tasks":     { "<task_id>":     HumanTask, ... },
//!   "decisions": { "<workflow_id>": Decision,  ... },
//!   "audit":     [ TransitionRecord, ... ]
//! }
//! ```
//!
//! ## Sharing
//!
//! Clones share one in-memory document and one file, so the engine's
//! per-manager clones all see the same state.
//!
//! ## Caveats
//!
//! * The full state is rewritten on every mutation.  It is not intended for
//!   high-frequency write workloads.
//! * Concurrent access from multiple processes is not supported.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aumos_remediation_core::audit::{AuditFilter, TransitionRecord};
use aumos_remediation_core::storage::Storage;
use aumos_remediation_core::task::HumanTask;
use aumos_remediation_core::types::Decision;
use aumos_remediation_core::workflow::Workflow;
use aumos_remediation_core::StorageError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Snapshot of all remediation state, serialised to / deserialised from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StorageSnapshot {
    workflows: HashMap<String, Workflow>,
    tasks:     HashMap<String, HumanTask>,
    decisions: HashMap<String, Decision>,
    audit:     Vec<TransitionRecord>,
}

/// A file-backed [`Storage`] implementation that persists state as JSON.
///
/// # Examples
///
/// ```rust,no_run
/// use aumos_remediation_std::storage::file::FileStorage;
/// use aumos_remediation_core::Storage;
///
/// let storage = FileStorage::open("/tmp/remediation.json")
///     .expect("could not open storage");
/// assert!(storage.get_workflow("wf-unknown").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    data: Arc<Mutex<StorageSnapshot>>,
}

impl FileStorage {
    /// Open an existing JSON storage file, or start empty if the path does
    /// not exist.  Nothing is written until the first mutation.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the file exists but cannot be read, and
    /// [`StorageError::Serialization`] if its JSON is malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            StorageSnapshot::default()
        };
        debug!(path = %path.display(), "remediation storage opened");

        Ok(Self {
            path,
            data: Arc::new(Mutex::new(data)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the current in-memory state to disk.
    ///
    /// The file is written to `<path>.tmp` first, then renamed over the
    /// target, so a crash during the write never leaves a partial file.
    pub fn flush(&self) -> Result<(), StorageError> {
        let data = self.data.lock();
        write_snapshot(&self.path, &*data)
    }

    /// Apply `mutate`, flush, and undo the mutation if the flush fails.
    fn commit<U>(
        &self,
        mutate: impl FnOnce(&mut StorageSnapshot) -> U,
        undo: impl FnOnce(&mut StorageSnapshot, U),
    ) -> Result<(), StorageError> {
        let mut data = self.data.lock();
        let previous = mutate(&mut *data);
        if let Err(error) = write_snapshot(&self.path, &*data) {
            warn!(path = %self.path.display(), %error, "flush failed; mutation rolled back");
            undo(&mut *data, previous);
            return Err(error);
        }
        Ok(())
    }
}

fn write_snapshot(path: &Path, data: &StorageSnapshot) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(data)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn restore<V>(map: &mut HashMap<String, V>, key: String, previous: Option<V>) {
    match previous {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl Storage for FileStorage {
    fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.data.lock().workflows.get(id).cloned()
    }

    fn put_workflow(&mut self, workflow: Workflow) -> Result<(), StorageError> {
        let key = workflow.id.clone();
        self.commit(
            |data| data.workflows.insert(key.clone(), workflow),
            |data, previous| restore(&mut data.workflows, key.clone(), previous),
        )
    }

    fn list_workflows(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self.data.lock().workflows.values().cloned().collect();
        workflows.sort_by(|left, right| {
            left.created_at_ms
                .cmp(&right.created_at_ms)
                .then_with(|| left.id.cmp(&right.id))
        });
        workflows
    }

    fn get_task(&self, id: &str) -> Option<HumanTask> {
        self.data.lock().tasks.get(id).cloned()
    }

    fn put_task(&mut self, task: HumanTask) -> Result<(), StorageError> {
        let key = task.id.clone();
        self.commit(
            |data| data.tasks.insert(key.clone(), task),
            |data, previous| restore(&mut data.tasks, key.clone(), previous),
        )
    }

    fn list_tasks(&self) -> Vec<HumanTask> {
        self.data.lock().tasks.values().cloned().collect()
    }

    fn get_decision(&self, workflow_id: &str) -> Option<Decision> {
        self.data.lock().decisions.get(workflow_id).cloned()
    }

    fn put_decision(&mut self, workflow_id: &str, decision: Decision) -> Result<(), StorageError> {
        let key = workflow_id.to_string();
        self.commit(
            |data| data.decisions.insert(key.clone(), decision),
            |data, previous| restore(&mut data.decisions, key.clone(), previous),
        )
    }

    fn append_audit(&mut self, record: TransitionRecord) -> Result<(), StorageError> {
        self.commit(
            |data| data.audit.push(record),
            |data, ()| {
                data.audit.pop();
            },
        )
    }

    fn query_audit(&self, filter: &AuditFilter) -> Vec<TransitionRecord> {
        filter.apply(self.data.lock().audit.iter())
    }
}
