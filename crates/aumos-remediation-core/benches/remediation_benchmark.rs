// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Criterion benchmark suite for the AumOS remediation engine.
//!
//! - Rule-based classification (feature extraction + rule table)
//! - Reasoner response parsing
//! - Workflow construction
//! - Audit log append + hash chain computation
//! - Metrics recording
//! - Full signal-to-completion pipeline
//!
//! Run with: `cargo bench --bench remediation_benchmark`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use aumos_remediation_core::{
    agent::rule_based_decision,
    audit::AuditLogger,
    builder::WorkflowBuilder,
    config::Config,
    engine::RemediationEngine,
    executor::NoopActionHandler,
    metrics::{MetricsAggregator, WorkflowOutcome},
    reasoner::{parse_verdict, UnavailableReasoner},
    scoring::Features,
    storage::InMemoryStorage,
    types::{Framework, RiskLevel, Signal},
    workflow::{Transition, WorkflowStatus},
};

fn signal_with(action_count: usize, priority: RiskLevel) -> Signal {
    let actions: Vec<String> = (0..action_count)
        .map(|index| format!("Encrypt dataset {index} and notify the data owner"))
        .collect();
    Signal::new("sig-bench", "v-bench", "crm-export", priority)
        .with_actions(actions)
        .with_framework(Framework::GdprEu)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn classification_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("classification");

    for action_count in [0usize, 1, 5, 20] {
        let signal = signal_with(action_count, RiskLevel::High);
        group.bench_with_input(
            BenchmarkId::new("rule_based_decision", action_count),
            &signal,
            |bencher, signal| {
                bencher.iter(|| black_box(rule_based_decision(black_box(signal), 15)));
            },
        );
    }

    let signal = signal_with(5, RiskLevel::Medium);
    group.bench_function("feature_extraction", |bencher| {
        bencher.iter(|| black_box(Features::extract(black_box(&signal))));
    });

    let reply = r#"Here is my assessment:
{"decision_type": "human_in_loop", "confidence_score": 0.72,
 "reasoning": "Deletion affects two systems", "estimated_effort_minutes": 90,
 "risk_if_delayed": "high", "prerequisites": ["Backup"]}"#;
    group.bench_function("parse_verdict", |bencher| {
        bencher.iter(|| black_box(parse_verdict(black_box(reply))));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Workflow construction
// ---------------------------------------------------------------------------

fn builder_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("workflow_builder");
    let builder = WorkflowBuilder::new(&Config::default());

    for action_count in [1usize, 10, 50] {
        let signal = signal_with(action_count, RiskLevel::Medium);
        let Ok(decision) = rule_based_decision(&signal, 15) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::new("build", action_count),
            &(decision, signal),
            |bencher, (decision, signal)| {
                bencher.iter(|| black_box(builder.build(black_box(decision), black_box(signal))));
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Audit + metrics
// ---------------------------------------------------------------------------

fn audit_log_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("audit_log");
    let mut logger = AuditLogger::new(InMemoryStorage::new());

    group.bench_function("append_with_hash_chain", |bencher| {
        bencher.iter(|| {
            let record = logger.log(Transition {
                workflow_id: "wf-bench".into(),
                step_id: Some("step-bench".into()),
                from: WorkflowStatus::Pending,
                to: WorkflowStatus::InProgress,
                note: "step started".into(),
                timestamp_ms: 1_700_000_000_000,
            });
            black_box(record)
        });
    });

    group.finish();
}

fn metrics_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("metrics");
    let metrics = MetricsAggregator::new();
    let signal = signal_with(2, RiskLevel::Low);
    let Ok(decision) = rule_based_decision(&signal, 15) else {
        return;
    };
    let outcome = WorkflowOutcome {
        status: WorkflowStatus::Completed,
        priority: RiskLevel::Low,
        framework: Some("gdpr_eu".into()),
        resolution_minutes: Some(42.0),
    };

    group.bench_function("record", |bencher| {
        bencher.iter(|| metrics.record(black_box(&decision), black_box(&outcome)));
    });
    group.bench_function("snapshot", |bencher| {
        bencher.iter(|| black_box(metrics.snapshot()));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn pipeline_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("pipeline");
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let engine = RemediationEngine::new(
        Config::default(),
        InMemoryStorage::new(),
        UnavailableReasoner,
        NoopActionHandler,
    );
    let signal = Signal::new("sig-bench", "v-bench", "crm", RiskLevel::Low)
        .with_actions(["Update retention flag"]);

    group.bench_function("signal_to_completion", |bencher| {
        bencher.iter(|| {
            runtime.block_on(async {
                let (_, workflow) = engine.process_signal(&signal).await.expect("process");
                black_box(engine.advance(&workflow.id).await.expect("advance"))
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    classification_benchmark,
    builder_benchmark,
    audit_log_benchmark,
    metrics_benchmark,
    pipeline_benchmark,
);
criterion_main!(benches);
