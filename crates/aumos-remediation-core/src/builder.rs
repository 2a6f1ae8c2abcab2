// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Workflow builder: turns a [`Decision`] and its [`Signal`] into a
//! [`Workflow`] of ordered [`Step`]s.
//!
//! One step is created per remediation action, in the order the scanner
//! listed them.  An empty or absent list yields a single manual-review step.
//! Whether a step waits for a human is decided here, once, from the
//! remediation type and the step's [`ActionKind`]:
//!
//! | Remediation type | Gated steps                                       |
//! |------------------|---------------------------------------------------|
//! | `automatic`      | review steps only                                 |
//! | `human_in_loop`  | the first step, deletions, transfers, reviews     |
//! | `manual_only`    | every step                                        |

use std::collections::BTreeMap;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::types::{Decision, RemediationType, Signal};
use crate::workflow::{ActionKind, Step, Workflow, WorkflowStatus};

/// Longest action excerpt used in a step name.
const STEP_NAME_EXCERPT: usize = 60;

/// Builds workflows from decisions.  Stateless apart from configuration.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     builder::WorkflowBuilder,
///     config::Config,
///     types::{Decision, DecisionSource, RemediationType, RiskLevel, Signal},
///     workflow::WorkflowStatus,
/// };
///
/// let signal = Signal::new("s-1", "v-1", "crm", RiskLevel::Medium)
///     .with_actions(["Encrypt backup", "Notify data owner"]);
/// let decision = Decision::new(
///     "v-1", RemediationType::HumanInLoop, 0.7, "medium risk", 30,
///     vec![], RiskLevel::Medium, DecisionSource::RuleBased,
/// ).unwrap();
///
/// let workflow = WorkflowBuilder::new(&Config::default()).build(&decision, &signal);
/// assert_eq!(workflow.steps.len(), 2);
/// assert_eq!(workflow.status, WorkflowStatus::Pending);
/// assert!(workflow.steps[0].requires_human_approval);
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    max_retries: u32,
}

impl WorkflowBuilder {
    pub fn new(config: &Config) -> Self {
        Self { max_retries: config.default_max_retries.max(1) }
    }

    pub fn build(&self, decision: &Decision, signal: &Signal) -> Workflow {
        let workflow_id = format!("wf-{}", Uuid::new_v4());
        let remediation_type = decision.remediation_type();

        let actions: Vec<&str> = signal
            .actions()
            .unwrap_or_default()
            .iter()
            .map(|action| action.trim())
            .filter(|action| !action.is_empty())
            .collect();

        let durations = split_effort(decision.estimated_effort_minutes(), actions.len().max(1));

        let mut steps: Vec<Step> = if actions.is_empty() {
            vec![self.manual_review_step(signal, durations[0])]
        } else {
            actions
                .iter()
                .enumerate()
                .map(|(index, action)| {
                    let kind = ActionKind::classify(action);
                    self.action_step(
                        index,
                        action,
                        kind,
                        requires_approval(remediation_type, kind, index),
                        durations[index],
                        signal,
                    )
                })
                .collect()
        };

        if !decision.prerequisites().is_empty() {
            steps[0].parameters.insert(
                "prerequisites".into(),
                json!(decision.prerequisites()),
            );
        }

        let total_estimated_duration_minutes = steps
            .iter()
            .map(|step| step.estimated_duration_minutes)
            .sum();

        let mut metadata = BTreeMap::new();
        metadata.insert("signal_id".into(), json!(signal.signal_id));
        metadata.insert("signal_type".into(), json!(signal.signal_type.as_str()));
        metadata.insert("decision_source".into(), json!(decision.source()));
        metadata.insert("decision_confidence".into(), json!(decision.confidence_score()));
        metadata.insert("decision_reasoning".into(), json!(decision.reasoning()));
        metadata.insert(
            "cross_border_transfers".into(),
            json!(signal.has_cross_border_transfers()),
        );
        if let Some(framework) = signal.framework {
            metadata.insert("framework".into(), json!(framework.as_str()));
        }

        let now = crate::current_time_ms();
        Workflow {
            id: workflow_id,
            violation_id: decision.violation_id().to_string(),
            activity_id: signal.activity_id.clone(),
            remediation_type,
            workflow_type: remediation_type,
            status: WorkflowStatus::Pending,
            steps,
            current_step_index: 0,
            priority: signal.priority,
            metadata,
            created_at_ms: now,
            updated_at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
            total_estimated_duration_minutes,
        }
    }

    fn action_step(
        &self,
        index: usize,
        action: &str,
        kind: ActionKind,
        requires_human_approval: bool,
        estimated_duration_minutes: u32,
        signal: &Signal,
    ) -> Step {
        let mut parameters = base_parameters(signal);
        parameters.insert("action".into(), json!(action));

        Step {
            id: format!("step-{}", Uuid::new_v4()),
            name: format!("Execute: {}", excerpt(action)),
            description: action.to_string(),
            action_type: kind,
            parameters,
            status: WorkflowStatus::Pending,
            retry_count: 0,
            max_retries: self.max_retries,
            estimated_duration_minutes,
            order: index as u32,
            requires_human_approval,
            error_message: None,
            human_task_id: None,
            output: None,
        }
    }

    fn manual_review_step(&self, signal: &Signal, estimated_duration_minutes: u32) -> Step {
        Step {
            id: format!("step-{}", Uuid::new_v4()),
            name: format!("Manual review: {}", signal.violation_id),
            description: "No remediation actions were supplied. Investigate the violation \
                          and remediate it manually."
                .into(),
            action_type: ActionKind::ManualReview,
            parameters: base_parameters(signal),
            status: WorkflowStatus::Pending,
            retry_count: 0,
            max_retries: self.max_retries,
            estimated_duration_minutes,
            order: 0,
            requires_human_approval: true,
            error_message: None,
            human_task_id: None,
            output: None,
        }
    }
}

/// Gating table, see the module docs.
pub fn requires_approval(remediation_type: RemediationType, kind: ActionKind, index: usize) -> bool {
    match remediation_type {
        RemediationType::Automatic => kind.is_review(),
        RemediationType::HumanInLoop => {
            index == 0
                || kind.is_review()
                || matches!(kind, ActionKind::DataDeletion | ActionKind::DataTransfer)
        }
        RemediationType::ManualOnly => true,
    }
}

fn base_parameters(signal: &Signal) -> BTreeMap<String, Value> {
    let mut parameters = BTreeMap::new();
    parameters.insert("violation_id".into(), json!(signal.violation_id));
    parameters.insert("activity_id".into(), json!(signal.activity_id));
    if let Some(framework) = signal.framework {
        parameters.insert("framework".into(), json!(framework.as_str()));
    }
    parameters
}

fn excerpt(action: &str) -> String {
    if action.chars().count() <= STEP_NAME_EXCERPT {
        return action.to_string();
    }
    let mut short: String = action.chars().take(STEP_NAME_EXCERPT).collect();
    short.push_str("...");
    short
}

/// Split `total` minutes over `parts` steps; every share is at least one
/// and earlier steps absorb the remainder.
fn split_effort(total: u32, parts: usize) -> Vec<u32> {
    let parts_u32 = parts.max(1) as u32;
    let share = total / parts_u32;
    let remainder = total % parts_u32;
    (0..parts_u32)
        .map(|index| (share + u32::from(index < remainder)).max(1))
        .collect()
}
