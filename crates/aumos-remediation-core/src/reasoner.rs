// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! The reasoner seam: an untrusted text-in, text-out classifier.
//!
//! [`Reasoner`] is implemented by whatever language-model client the host
//! application wires in.  Its output is never trusted: [`parse_verdict`]
//! extracts the first JSON object from the reply and validates every field
//! before the agent turns it into a [`Decision`](crate::types::Decision).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::scoring::Features;
use crate::types::{RemediationType, RiskLevel, Signal};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a reasoner attempt was discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReasonerError {
    #[error("reasoner transport failure: {0}")]
    Transport(String),

    #[error("reasoner did not answer within {0} ms")]
    Timeout(u64),

    #[error("reasoner reply is not a JSON object: {0}")]
    Malformed(String),

    #[error("reasoner field {field:?} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Text generation backend used by the [`DecisionAgent`](crate::agent::DecisionAgent).
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn reason(&self, prompt: &str) -> Result<String, ReasonerError>;
}

#[async_trait]
impl<R: Reasoner + ?Sized> Reasoner for Arc<R> {
    async fn reason(&self, prompt: &str) -> Result<String, ReasonerError> {
        (**self).reason(prompt).await
    }
}

/// A reasoner that always fails.  Every decision takes the rule-based path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableReasoner;

#[async_trait]
impl Reasoner for UnavailableReasoner {
    async fn reason(&self, _prompt: &str) -> Result<String, ReasonerError> {
        Err(ReasonerError::Transport("no reasoner configured".into()))
    }
}

/// A reasoner that returns a fixed reply.
#[derive(Debug, Clone, Default)]
pub struct StaticReasoner {
    reply: String,
}

impl StaticReasoner {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[async_trait]
impl Reasoner for StaticReasoner {
    async fn reason(&self, _prompt: &str) -> Result<String, ReasonerError> {
        Ok(self.reply.clone())
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Render the classification prompt.  Output depends only on its inputs.
pub fn build_prompt(signal: &Signal, features: &Features) -> String {
    let actions = match signal.actions() {
        Some(actions) if !actions.is_empty() => actions
            .iter()
            .map(|action| format!("  - {action}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(_) => "  (empty list)".to_string(),
        None => "  (none supplied)".to_string(),
    };
    let context = serde_json::to_string(&signal.context).unwrap_or_default();
    let framework = signal.framework.map_or("unspecified", |framework| framework.as_str());

    format!(
        "You are a compliance remediation specialist. Classify how the violation \
below should be remediated.

VIOLATION
Violation ID: {violation_id}
Signal type: {signal_type}
Framework: {framework}
Risk level: {risk}
Urgency: {urgency}
Description: {description}
Remediation actions:
{actions}
Context: {context}

FEATURES
Complexity: {complexity:.2}
Cross-system impact: {cross:.2}
Action count: {count}

CRITERIA
automatic: low risk, a single standard fix, one system, no judgement needed.
human_in_loop: automation possible but validation or approval is required.
manual_only: critical risk, legal review or significant business impact.

Reply with one JSON object and nothing else:
{{\"decision_type\": \"automatic|human_in_loop|manual_only\", \
\"confidence_score\": 0.0-1.0, \"reasoning\": \"...\", \
\"estimated_effort\": <minutes>, \"risk_if_delayed\": \"low|medium|high|critical\", \
\"prerequisites\": [\"...\"]}}",
        violation_id = signal.violation_id,
        signal_type = signal.signal_type.as_str(),
        risk = signal.priority,
        urgency = signal.urgency_level,
        description = signal.description,
        complexity = features.complexity,
        cross = features.cross_system_impact,
        count = features.action_count,
    )
}

// ---------------------------------------------------------------------------
// Verdict parsing
// ---------------------------------------------------------------------------

/// A validated reasoner reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub remediation_type: RemediationType,
    pub confidence_score: f64,
    pub reasoning: String,
    pub estimated_effort_minutes: u32,
    pub risk_if_delayed: RiskLevel,
    pub prerequisites: Vec<String>,
}

/// Extract and validate a [`Verdict`] from free-form reasoner output.
///
/// The JSON object is taken from the first `{` to the last `}` so that
/// surrounding prose or code fences are ignored.  `remediation_type` is
/// accepted as an alias of `decision_type`.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::reasoner::parse_verdict;
/// use aumos_remediation_core::types::RemediationType;
///
/// let reply = r#"Sure! {"decision_type": "AUTOMATIC", "confidence_score": 0.9,
///     "reasoning": "single flag update", "estimated_effort": 10,
///     "risk_if_delayed": "low"}"#;
/// let verdict = parse_verdict(reply).unwrap();
/// assert_eq!(verdict.remediation_type, RemediationType::Automatic);
///
/// assert!(parse_verdict("I cannot help with that").is_err());
/// ```
pub fn parse_verdict(text: &str) -> Result<Verdict, ReasonerError> {
    let start = text
        .find('{')
        .ok_or_else(|| ReasonerError::Malformed("no opening brace".into()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ReasonerError::Malformed("no closing brace".into()))?;

    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|error| ReasonerError::Malformed(error.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ReasonerError::Malformed("top-level value is not an object".into()))?;

    let type_field = if object.contains_key("decision_type") {
        "decision_type"
    } else {
        "remediation_type"
    };
    let remediation_type = RemediationType::parse(required_str(object, type_field)?)
        .ok_or_else(|| invalid(type_field, "unknown remediation type"))?;

    let confidence_score = object
        .get("confidence_score")
        .ok_or_else(|| invalid("confidence_score", "missing"))?
        .as_f64()
        .ok_or_else(|| invalid("confidence_score", "not a number"))?;
    if !confidence_score.is_finite() || !(0.0..=1.0).contains(&confidence_score) {
        return Err(invalid("confidence_score", format!("{confidence_score} outside 0.0..=1.0")));
    }

    let reasoning = required_str(object, "reasoning")?.trim().to_string();
    if reasoning.is_empty() {
        return Err(invalid("reasoning", "empty"));
    }

    let estimated_effort_minutes = parse_effort(
        object
            .get("estimated_effort")
            .ok_or_else(|| invalid("estimated_effort", "missing"))?,
    )?;

    let risk_if_delayed = RiskLevel::parse(required_str(object, "risk_if_delayed")?)
        .ok_or_else(|| invalid("risk_if_delayed", "unknown risk level"))?;

    let prerequisites = match object.get("prerequisites") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("prerequisites", "entries must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid("prerequisites", "not an array")),
    };

    Ok(Verdict {
        remediation_type,
        confidence_score,
        reasoning,
        estimated_effort_minutes,
        risk_if_delayed,
        prerequisites,
    })
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ReasonerError> {
    object
        .get(field)
        .ok_or_else(|| invalid(field, "missing"))?
        .as_str()
        .ok_or_else(|| invalid(field, "not a string"))
}

fn parse_effort(value: &Value) -> Result<u32, ReasonerError> {
    let minutes = match value.as_u64() {
        Some(minutes) => minutes,
        None => match value.as_f64() {
            Some(float) if float.is_finite() && float.fract() == 0.0 && float >= 0.0 => {
                float as u64
            }
            _ => return Err(invalid("estimated_effort", "not a positive integer")),
        },
    };
    if minutes == 0 {
        return Err(invalid("estimated_effort", "must be greater than zero"));
    }
    u32::try_from(minutes).map_err(|_| invalid("estimated_effort", "out of range"))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ReasonerError {
    ReasonerError::Invalid { field, reason: reason.into() }
}
