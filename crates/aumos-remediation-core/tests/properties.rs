// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Property tests for the decision agent, the rule table and the executor
//! state machine.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{json, Value};

use aumos_remediation_core::{
    agent::{rule_based_decision, DecisionAgent},
    builder::WorkflowBuilder,
    config::{Config, RetryPolicy},
    engine::RemediationEngine,
    executor::{ActionError, ActionHandler, CancelFlag, NoopActionHandler, WorkflowExecutor},
    reasoner::{StaticReasoner, UnavailableReasoner},
    storage::InMemoryStorage,
    types::{DecisionSource, RemediationType, RiskLevel, Signal},
    workflow::{Step, Workflow, WorkflowStatus},
};

fn risk_level() -> impl Strategy<Value = RiskLevel> {
    prop::sample::select(RiskLevel::ALL.to_vec())
}

fn remediation_type() -> impl Strategy<Value = RemediationType> {
    prop::sample::select(vec![
        RemediationType::Automatic,
        RemediationType::HumanInLoop,
        RemediationType::ManualOnly,
    ])
}

fn plain_actions(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("Rotate credential {index}")).collect()
}

/// Replies the verdict parser must refuse.
fn unusable_reply() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        "[^{}]{0,60}".prop_map(Some),
        Just(Some(r#"{"decision_type": "automatic", "confidence_score": 1.5}"#.to_string())),
        Just(Some(r#"{"decision_type": "sometimes", "confidence_score": 0.5}"#.to_string())),
        Just(None),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Fails on the calls whose index is set in `script`, succeeds otherwise.
struct Scripted {
    script: Vec<bool>,
    calls: AtomicUsize,
}

#[async_trait]
impl ActionHandler for Scripted {
    async fn execute(&self, _step: &Step, _workflow: &Workflow) -> Result<Value, ActionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.get(call).copied().unwrap_or(false) {
            Err(ActionError::transient(format!("scripted failure {call}")))
        } else {
            Ok(json!({ "call": call }))
        }
    }
}

proptest! {
    #[test]
    fn rule_decisions_are_always_valid(
        priority in risk_level(),
        actions in prop::option::of(prop::collection::vec("[a-zA-Z ]{0,40}", 0..8)),
        minutes_per_action in 1u32..120,
    ) {
        let mut signal = Signal::new("sig", "v", "a", priority);
        if let Some(actions) = actions.clone() {
            signal = signal.with_actions(actions);
        }

        let decision = rule_based_decision(&signal, minutes_per_action).expect("valid signal");
        prop_assert!((0.0..=1.0).contains(&decision.confidence_score()));
        prop_assert!(decision.estimated_effort_minutes() >= 1);
        prop_assert_eq!(decision.risk_if_delayed(), priority);

        let no_actions = actions.map_or(true, |list| list.is_empty());
        if no_actions {
            prop_assert_eq!(decision.remediation_type(), RemediationType::ManualOnly);
            prop_assert!(decision.confidence_score() <= 0.5);
        } else if priority == RiskLevel::Critical {
            prop_assert_eq!(decision.remediation_type(), RemediationType::ManualOnly);
            prop_assert!(decision.confidence_score() <= 0.7);
        }

        // Same input, same answer.
        prop_assert_eq!(rule_based_decision(&signal, minutes_per_action).expect("valid"), decision);
    }

    #[test]
    fn more_actions_never_raise_confidence_or_lower_effort(
        priority in risk_level(),
        count in 1usize..12,
    ) {
        let fewer = Signal::new("s", "v", "a", priority).with_actions(plain_actions(count));
        let more = Signal::new("s", "v", "a", priority).with_actions(plain_actions(count + 1));
        let fewer = rule_based_decision(&fewer, 15).expect("valid");
        let more = rule_based_decision(&more, 15).expect("valid");

        prop_assert!(more.confidence_score() <= fewer.confidence_score());
        prop_assert!(more.estimated_effort_minutes() >= fewer.estimated_effort_minutes());
    }

    #[test]
    fn executor_keeps_cursor_and_statuses_consistent(
        count in 1usize..6,
        script in prop::collection::vec(any::<bool>(), 0..24),
    ) {
        let config = Config { retry: RetryPolicy::immediate(), ..Config::default() };
        let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(plain_actions(count));
        let decision = rule_based_decision(&signal, 15).expect("valid");
        let mut workflow = WorkflowBuilder::new(&config).build(&decision, &signal);
        // Run every step automatically.
        for step in &mut workflow.steps {
            step.requires_human_approval = false;
        }

        let executor = WorkflowExecutor::new(Scripted { script, calls: AtomicUsize::new(0) }, &config);
        let report = runtime()
            .block_on(executor.advance(&mut workflow, &CancelFlag::new()))
            .expect("advance");

        prop_assert!(workflow.is_terminal());
        prop_assert!(workflow.current_step_index <= workflow.steps.len());
        for (index, step) in workflow.steps.iter().enumerate() {
            prop_assert!(step.retry_count <= step.max_retries);
            if index < workflow.current_step_index {
                prop_assert_eq!(step.status, WorkflowStatus::Completed);
            } else if index > workflow.current_step_index {
                prop_assert_eq!(step.status, WorkflowStatus::Pending);
            }
        }
        match workflow.status {
            WorkflowStatus::Completed => {
                prop_assert_eq!(workflow.current_step_index, workflow.steps.len());
            }
            WorkflowStatus::Failed => {
                let failed = &workflow.steps[workflow.current_step_index];
                prop_assert_eq!(failed.status, WorkflowStatus::Failed);
                prop_assert_eq!(failed.retry_count, failed.max_retries);
            }
            other => prop_assert!(false, "unexpected status {other}"),
        }

        prop_assert!(report.transitions.iter().all(|t| t.from.can_transition_to(t.to)));
    }

    #[test]
    fn reasoner_verdicts_are_deterministic(
        priority in risk_level(),
        remediation in remediation_type(),
        confidence_pct in 0u32..=100,
        effort in 1u32..2_000,
        delayed in risk_level(),
        reasoning in "[a-z][a-z ]{0,30}",
    ) {
        let reply = json!({
            "decision_type": remediation.as_str(),
            "confidence_score": f64::from(confidence_pct) / 100.0,
            "reasoning": reasoning,
            "estimated_effort": effort,
            "risk_if_delayed": delayed.as_str(),
        })
        .to_string();
        let agent = DecisionAgent::new(StaticReasoner::new(reply), Config::default());
        let signal = Signal::new("s", "v", "a", priority).with_actions(plain_actions(2));

        let runtime = runtime();
        let first = runtime.block_on(agent.make_decision(&signal)).expect("decision");
        let second = runtime.block_on(agent.make_decision(&signal)).expect("decision");

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.source(), DecisionSource::Reasoner);
        prop_assert_eq!(first.remediation_type(), remediation);
        prop_assert_eq!(first.estimated_effort_minutes(), effort);
        prop_assert_eq!(first.risk_if_delayed(), delayed);
        prop_assert_eq!(first.reasoning(), reasoning.trim());
    }

    #[test]
    fn unusable_reasoner_falls_back_to_rules(
        priority in risk_level(),
        count in 0usize..6,
        reply in unusable_reply(),
    ) {
        let config = Config::default();
        let signal = Signal::new("s", "v", "a", priority).with_actions(plain_actions(count));

        let runtime = runtime();
        let decision = match reply {
            Some(reply) => runtime.block_on(
                DecisionAgent::new(StaticReasoner::new(reply), config.clone()).make_decision(&signal),
            ),
            None => runtime.block_on(
                DecisionAgent::new(UnavailableReasoner, config.clone()).make_decision(&signal),
            ),
        }
        .expect("fallback decision");

        let expected = rule_based_decision(&signal, config.minutes_per_action).expect("valid");
        prop_assert_eq!(decision.source(), DecisionSource::RuleBased);
        prop_assert_eq!(decision, expected);
    }

    #[test]
    fn step_cursor_never_moves_back_across_gates(
        kinds in prop::collection::vec(0u8..3, 1..6),
        ops in prop::collection::vec(any::<bool>(), 0..30),
    ) {
        let actions: Vec<String> = kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| match kind {
                0 => format!("Rotate credential {index}"),
                1 => format!("Delete record {index}"),
                _ => format!("Review access {index}"),
            })
            .collect();
        let signal = Signal::new("s", "v", "a", RiskLevel::Medium).with_actions(actions);
        let config = Config { retry: RetryPolicy::immediate(), ..Config::default() };
        let engine = RemediationEngine::new(
            config,
            InMemoryStorage::new(),
            UnavailableReasoner,
            NoopActionHandler,
        );

        runtime().block_on(async {
            let (_, workflow) = engine.process_signal(&signal).await.expect("process");
            let step_count = workflow.steps.len();
            let mut cursor = workflow.current_step_index;

            // `true` advances, `false` approves the open task if there is one.
            // The tail alternates the two until every gate is cleared.
            let drain = std::iter::repeat([true, false]).flatten().take(4 * step_count + 2);
            for advance in ops.into_iter().chain(drain) {
                let after = if advance {
                    engine.advance(&workflow.id).await.expect("advance")
                } else {
                    let open = engine
                        .tasks_for_workflow(&workflow.id)
                        .await
                        .into_iter()
                        .find(|task| task.status.is_open());
                    match open {
                        Some(task) => engine
                            .complete_task(&task.id, "compliance_analyst")
                            .await
                            .expect("complete"),
                        None => engine.workflow(&workflow.id).await.expect("workflow"),
                    }
                };
                prop_assert!(after.current_step_index >= cursor);
                prop_assert!(after.current_step_index <= step_count);
                cursor = after.current_step_index;
            }

            let last = engine.workflow(&workflow.id).await.expect("workflow");
            prop_assert_eq!(last.status, WorkflowStatus::Completed);
            prop_assert_eq!(last.current_step_index, step_count);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
