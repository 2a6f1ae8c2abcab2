// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Running remediation metrics.
//!
//! [`MetricsAggregator::record`] folds one decision and its workflow outcome
//! into the totals under a single lock, so concurrent recorders never observe
//! or produce a half-applied update.  [`snapshot`](MetricsAggregator::snapshot)
//! returns an immutable copy; [`rollup`](MetricsAggregator::rollup) returns
//! the copy and starts a new window.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Decision, RemediationType, RiskLevel};
use crate::workflow::{Workflow, WorkflowStatus};

/// Key used in `by_framework` when a workflow carries no framework.
pub const UNSPECIFIED_FRAMEWORK: &str = "unspecified";

/// Point-in-time view of the totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_violations_processed: u64,
    pub automatic_remediations: u64,
    pub human_loop_remediations: u64,
    pub manual_remediations: u64,
    pub completed_workflows: u64,
    pub failed_workflows: u64,
    pub cancelled_workflows: u64,
    /// Completed over terminal workflows; `0.0` when none are terminal.
    pub success_rate: f64,
    /// Mean minutes from creation to completion over completed workflows.
    pub average_resolution_time_minutes: f64,
    pub by_risk_level: BTreeMap<String, u64>,
    pub by_framework: BTreeMap<String, u64>,
}

/// What the aggregator needs to know about a finished workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub status: WorkflowStatus,
    pub priority: RiskLevel,
    pub framework: Option<String>,
    pub resolution_minutes: Option<f64>,
}

impl WorkflowOutcome {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        let resolution_minutes = match (workflow.status, workflow.completed_at_ms) {
            (WorkflowStatus::Completed, Some(completed_at_ms)) => {
                Some(completed_at_ms.saturating_sub(workflow.created_at_ms) as f64 / 60_000.0)
            }
            _ => None,
        };
        Self {
            status: workflow.status,
            priority: workflow.priority,
            framework: workflow
                .metadata
                .get("framework")
                .and_then(|value| value.as_str())
                .map(str::to_string),
            resolution_minutes,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    metrics: Metrics,
    resolution_minutes_total: f64,
    resolved: u64,
}

/// Thread-safe metrics accumulator.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     metrics::{MetricsAggregator, WorkflowOutcome},
///     types::{Decision, DecisionSource, RemediationType, RiskLevel},
///     workflow::WorkflowStatus,
/// };
///
/// let metrics = MetricsAggregator::new();
/// assert_eq!(metrics.snapshot().success_rate, 0.0);
///
/// let decision = Decision::new(
///     "v-1", RemediationType::Automatic, 0.9, "simple", 15,
///     vec![], RiskLevel::Low, DecisionSource::RuleBased,
/// ).unwrap();
/// metrics.record(&decision, &WorkflowOutcome {
///     status: WorkflowStatus::Completed,
///     priority: RiskLevel::Low,
///     framework: Some("gdpr_eu".into()),
///     resolution_minutes: Some(12.0),
/// });
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.automatic_remediations, 1);
/// assert_eq!(snapshot.success_rate, 1.0);
/// ```
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    tally: Mutex<Tally>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, decision: &Decision, outcome: &WorkflowOutcome) {
        let mut tally = self.tally.lock();
        let Tally { metrics, resolution_minutes_total, resolved } = &mut *tally;

        metrics.total_violations_processed += 1;
        match decision.remediation_type() {
            RemediationType::Automatic   => metrics.automatic_remediations += 1,
            RemediationType::HumanInLoop => metrics.human_loop_remediations += 1,
            RemediationType::ManualOnly  => metrics.manual_remediations += 1,
        }
        *metrics
            .by_risk_level
            .entry(outcome.priority.as_str().to_string())
            .or_insert(0) += 1;
        *metrics
            .by_framework
            .entry(
                outcome
                    .framework
                    .clone()
                    .unwrap_or_else(|| UNSPECIFIED_FRAMEWORK.to_string()),
            )
            .or_insert(0) += 1;

        match outcome.status {
            WorkflowStatus::Completed => metrics.completed_workflows += 1,
            WorkflowStatus::Failed    => metrics.failed_workflows += 1,
            WorkflowStatus::Cancelled => metrics.cancelled_workflows += 1,
            _ => {}
        }
        if let Some(minutes) = outcome.resolution_minutes.filter(|minutes| minutes.is_finite()) {
            *resolution_minutes_total += minutes.max(0.0);
            *resolved += 1;
        }

        let terminal =
            metrics.completed_workflows + metrics.failed_workflows + metrics.cancelled_workflows;
        metrics.success_rate = if terminal == 0 {
            0.0
        } else {
            metrics.completed_workflows as f64 / terminal as f64
        };
        metrics.average_resolution_time_minutes = if *resolved == 0 {
            0.0
        } else {
            *resolution_minutes_total / *resolved as f64
        };
    }

    pub fn snapshot(&self) -> Metrics {
        self.tally.lock().metrics.clone()
    }

    /// Return the current totals and reset them.
    pub fn rollup(&self) -> Metrics {
        std::mem::take(&mut *self.tally.lock()).metrics
    }
}
