// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Decision agent.
//!
//! [`DecisionAgent::make_decision`] asks the injected [`Reasoner`] first and
//! falls back to [`rule_based_decision`] on any transport error, timeout,
//! malformed reply or out-of-range field.  Reasoner failures are logged and
//! never surfaced: for a well-formed [`Signal`] a [`Decision`] is always
//! produced.
//!
//! The agent holds no mutable state and is safe to share across tasks.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RemediationError;
use crate::reasoner::{build_prompt, parse_verdict, Reasoner, ReasonerError, Verdict};
use crate::scoring::{self, Features, Rule};
use crate::types::{Decision, DecisionSource, Signal};

/// Classifies signals into remediation decisions.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     agent::DecisionAgent,
///     config::Config,
///     reasoner::UnavailableReasoner,
///     types::{DecisionSource, RemediationType, RiskLevel, Signal},
/// };
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let agent = DecisionAgent::new(UnavailableReasoner, Config::default());
/// let signal = Signal::new("sig-7", "v-7", "hr-db", RiskLevel::Critical)
///     .with_actions(["Purge exported records", "Notify regulator"]);
///
/// let decision = agent.make_decision(&signal).await.unwrap();
/// assert_eq!(decision.remediation_type(), RemediationType::ManualOnly);
/// assert_eq!(decision.source(), DecisionSource::RuleBased);
/// # });
/// ```
pub struct DecisionAgent<R: Reasoner> {
    reasoner: R,
    config: Config,
}

impl<R: Reasoner> DecisionAgent<R> {
    pub fn new(reasoner: R, config: Config) -> Self {
        Self { reasoner, config }
    }

    /// Produce a [`Decision`] for `signal`.
    ///
    /// # Errors
    ///
    /// [`RemediationError::InvalidSignal`] when the signal fails validation.
    /// Reasoner problems are never returned.
    pub async fn make_decision(&self, signal: &Signal) -> Result<Decision, RemediationError> {
        signal.validate()?;

        let features = Features::extract(signal);
        let prompt = build_prompt(signal, &features);

        let outcome = self
            .consult(&prompt)
            .await
            .and_then(|verdict| decision_from_verdict(signal, verdict));

        match outcome {
            Ok(decision) => {
                info!(
                    violation_id = %signal.violation_id,
                    remediation_type = %decision.remediation_type(),
                    confidence = decision.confidence_score(),
                    source = "reasoner",
                    "remediation decision made"
                );
                Ok(decision)
            }
            Err(error) => {
                warn!(
                    violation_id = %signal.violation_id,
                    %error,
                    "reasoner verdict rejected; using rule-based decision"
                );
                rule_based_decision(signal, self.config.minutes_per_action)
            }
        }
    }

    /// Call the reasoner under the configured timeout and validate its reply.
    async fn consult(&self, prompt: &str) -> Result<Verdict, ReasonerError> {
        let timeout = self.config.reasoner_timeout();
        let reply = tokio::time::timeout(timeout, self.reasoner.reason(prompt))
            .await
            .map_err(|_| ReasonerError::Timeout(self.config.reasoner_timeout_ms))??;
        debug!(reply_len = reply.len(), "reasoner replied");
        parse_verdict(&reply)
    }
}

fn decision_from_verdict(signal: &Signal, verdict: Verdict) -> Result<Decision, ReasonerError> {
    Decision::new(
        signal.violation_id.clone(),
        verdict.remediation_type,
        verdict.confidence_score,
        verdict.reasoning,
        verdict.estimated_effort_minutes,
        verdict.prerequisites,
        verdict.risk_if_delayed,
        DecisionSource::Reasoner,
    )
    .map_err(|error| ReasonerError::Invalid {
        field: "decision",
        reason: error.to_string(),
    })
}

/// The deterministic fallback classifier.
///
/// | Condition (first match wins)                 | Type            | Confidence |
/// |----------------------------------------------|-----------------|------------|
/// | no actions                                   | `manual_only`   | ≤ 0.5      |
/// | critical risk, or complexity > 0.7           | `manual_only`   | ≤ 0.7      |
/// | medium risk, or deletion / notification      | `human_in_loop` | 0.5 – 0.8  |
/// | low risk, one simple action                  | `automatic`     | ≥ 0.7      |
/// | anything else (cross-border included)        | `human_in_loop` | 0.5 – 0.8  |
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::agent::rule_based_decision;
/// use aumos_remediation_core::types::{RemediationType, RiskLevel, Signal};
///
/// let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Update flag"]);
/// let decision = rule_based_decision(&signal, 15).unwrap();
/// assert_eq!(decision.remediation_type(), RemediationType::Automatic);
/// assert!(decision.confidence_score() >= 0.7);
/// assert!(decision.estimated_effort_minutes() <= 15);
/// ```
pub fn rule_based_decision(
    signal: &Signal,
    minutes_per_action: u32,
) -> Result<Decision, RemediationError> {
    let features = Features::extract(signal);
    let rule = Rule::evaluate(signal, &features);
    let remediation_type = rule.remediation_type();

    let decision = Decision::new(
        signal.violation_id.clone(),
        remediation_type,
        scoring::banded_confidence(rule, &features, signal.priority),
        scoring::reasoning(rule, &features, signal.priority),
        scoring::effort_minutes(&features, minutes_per_action),
        scoring::prerequisites(signal, remediation_type),
        signal.priority,
        DecisionSource::RuleBased,
    )?;

    info!(
        violation_id = %signal.violation_id,
        remediation_type = %remediation_type,
        confidence = decision.confidence_score(),
        rule = ?rule,
        source = "rule_based",
        "remediation decision made"
    );
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::reasoner::{StaticReasoner, UnavailableReasoner};
    use crate::types::{RemediationType, RiskLevel};

    struct SlowReasoner;

    #[async_trait]
    impl Reasoner for SlowReasoner {
        async fn reason(&self, _prompt: &str) -> Result<String, ReasonerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    fn low_signal() -> Signal {
        Signal::new("sig", "v-1", "act", RiskLevel::Low).with_actions(["Update consent flag"])
    }

    #[tokio::test]
    async fn valid_reasoner_verdict_is_used() {
        let reply = r#"{"decision_type": "human_in_loop", "confidence_score": 0.66,
            "reasoning": "needs a look", "estimated_effort": 30, "risk_if_delayed": "medium"}"#;
        let agent = DecisionAgent::new(StaticReasoner::new(reply), Config::default());
        let decision = agent.make_decision(&low_signal()).await.expect("decision");
        assert_eq!(decision.source(), DecisionSource::Reasoner);
        assert_eq!(decision.remediation_type(), RemediationType::HumanInLoop);
        assert_eq!(decision.estimated_effort_minutes(), 30);
        assert_eq!(decision.violation_id(), "v-1");
    }

    #[tokio::test]
    async fn invalid_verdict_falls_back() {
        let reply = r#"{"decision_type": "automatic", "confidence_score": 4.0,
            "reasoning": "x", "estimated_effort": 30, "risk_if_delayed": "low"}"#;
        let agent = DecisionAgent::new(StaticReasoner::new(reply), Config::default());
        let decision = agent.make_decision(&low_signal()).await.expect("decision");
        assert_eq!(decision.source(), DecisionSource::RuleBased);
    }

    #[tokio::test]
    async fn slow_reasoner_times_out_into_rules() {
        let config = Config { reasoner_timeout_ms: 20, ..Config::default() };
        let agent = DecisionAgent::new(SlowReasoner, config);
        let decision = agent.make_decision(&low_signal()).await.expect("decision");
        assert_eq!(decision.source(), DecisionSource::RuleBased);
        assert_eq!(decision.remediation_type(), RemediationType::Automatic);
    }

    #[tokio::test]
    async fn invalid_signal_is_rejected() {
        let agent = DecisionAgent::new(UnavailableReasoner, Config::default());
        let signal = low_signal().with_confidence(-0.1);
        assert!(matches!(
            agent.make_decision(&signal).await,
            Err(RemediationError::InvalidSignal(_))
        ));
    }

    #[test]
    fn critical_multi_action_is_manual_and_expensive() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Critical).with_actions([
            "Migrate records to the EU region",
            "Obtain legal review",
            "Renegotiate third-party agreement",
        ]);
        let decision = rule_based_decision(&signal, 15).expect("decision");
        assert_eq!(decision.remediation_type(), RemediationType::ManualOnly);
        assert!(decision.confidence_score() <= 0.6);
        assert!(decision.estimated_effort_minutes() >= 120);
        assert!(decision.reasoning().contains("manual_only"));
        assert_eq!(decision.risk_if_delayed(), RiskLevel::Critical);
    }

    #[test]
    fn absent_actions_are_manual() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Low);
        let decision = rule_based_decision(&signal, 15).expect("decision");
        assert_eq!(decision.remediation_type(), RemediationType::ManualOnly);
        assert!(decision.confidence_score() <= 0.5);
    }
}
