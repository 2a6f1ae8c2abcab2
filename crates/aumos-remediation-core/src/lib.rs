// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # aumos-remediation-core
//!
//! Decision agent and workflow state machine for AumOS compliance remediation.
//!
//! A detected violation arrives as a [`Signal`].  The [`DecisionAgent`]
//! classifies it as `automatic`, `human_in_loop` or `manual_only`, the
//! [`WorkflowBuilder`] turns the [`Decision`] into a [`Workflow`] of ordered
//! steps, and the [`WorkflowExecutor`] drives that workflow to a terminal
//! state, pausing on [`HumanTask`]s where a person must approve.  Terminal
//! outcomes roll up into [`MetricsAggregator`].
//!
//! ## Architecture
//!
//! ```text
//! RemediationEngine<S: Storage, R: Reasoner, H: ActionHandler>
//!   ├── DecisionAgent<R>    : reasoner call with rule-based fallback
//!   ├── WorkflowBuilder     : decision + signal → workflow of steps
//!   ├── validate_plan       : plan checks and feasibility scoring
//!   ├── WorkflowExecutor<H> : step loop, retries, human gating
//!   ├── TaskTracker<S>      : open / start / complete / cancel human tasks
//!   ├── AuditLogger<S>      : hash-chained transition log
//!   └── MetricsAggregator   : running totals, snapshot, rollup
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use aumos_remediation_core::{
//!     config::Config,
//!     engine::RemediationEngine,
//!     executor::NoopActionHandler,
//!     reasoner::UnavailableReasoner,
//!     storage::InMemoryStorage,
//!     types::{RemediationType, RiskLevel, Signal},
//!     workflow::WorkflowStatus,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = RemediationEngine::new(
//!     Config::default(),
//!     InMemoryStorage::new(),
//!     UnavailableReasoner,
//!     NoopActionHandler,
//! );
//!
//! let signal = Signal::new("sig-1", "v-1", "crm-sync", RiskLevel::Low)
//!     .with_actions(["Update marketing preference flag"]);
//!
//! let (decision, workflow) = engine.process_signal(&signal).await.unwrap();
//! assert_eq!(decision.remediation_type(), RemediationType::Automatic);
//!
//! let workflow = engine.advance(&workflow.id).await.unwrap();
//! assert_eq!(workflow.status, WorkflowStatus::Completed);
//! # });
//! ```

pub mod agent;
pub mod audit;
pub mod builder;
pub mod config;
#[cfg(feature = "config-loader")]
pub mod config_loader;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod reasoner;
pub mod scoring;
pub mod storage;
pub mod task;
pub mod types;
pub mod validation;
pub mod workflow;

// Re-export the most commonly used items at the crate root so consumers can
// write `use aumos_remediation_core::RemediationEngine;`.
pub use agent::DecisionAgent;
pub use builder::WorkflowBuilder;
pub use engine::RemediationEngine;
pub use error::{InvalidConfig, RemediationError, StorageError};
pub use executor::{ActionHandler, WorkflowExecutor};
pub use metrics::{Metrics, MetricsAggregator};
pub use reasoner::Reasoner;
pub use storage::{InMemoryStorage, Storage};
pub use task::{HumanTask, TaskStatus, TaskTracker};
pub use types::{Decision, Framework, RemediationType, RiskLevel, Signal};
pub use validation::{Feasibility, PlanIssue, PlanValidation};
pub use workflow::{Step, Workflow, WorkflowStatus};

/// Current Unix epoch milliseconds.
pub(crate) fn current_time_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
