// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Shared value types: risk levels, remediation types, frameworks, the
//! intake [`Signal`] and the classifier's [`Decision`].
//!
//! All types implement [`Clone`], [`Debug`], [`serde::Serialize`], and
//! [`serde::Deserialize`] so they can be persisted by any [`Storage`]
//! backend without additional conversion steps.
//!
//! [`Storage`]: crate::storage::Storage

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemediationError;

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Ordinal severity of a violation: `Low < Medium < High < Critical`.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::types::RiskLevel;
///
/// assert!(RiskLevel::Critical > RiskLevel::High);
/// assert_eq!(RiskLevel::parse("MEDIUM"), Some(RiskLevel::Medium));
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl RiskLevel {
    /// All variants in ascending order.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Wire name used in prompts, metrics keys and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low      => "low",
            RiskLevel::Medium   => "medium",
            RiskLevel::High     => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Case-insensitive parse of a wire name.  Returns `None` for anything
    /// outside the four levels.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low"      => Some(RiskLevel::Low),
            "medium"   => Some(RiskLevel::Medium),
            "high"     => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Remediation type
// ---------------------------------------------------------------------------

/// How a violation is remediated.  Ordered from least to most conservative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationType {
    /// Fully automated; no human gate.
    Automatic,
    /// Automated steps gated by human approval.
    HumanInLoop,
    /// Every step is performed by a human.
    ManualOnly,
}

impl RemediationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RemediationType::Automatic   => "automatic",
            RemediationType::HumanInLoop => "human_in_loop",
            RemediationType::ManualOnly  => "manual_only",
        }
    }

    /// Case-insensitive parse.  Accepts `human-in-loop` and `human_in_the_loop`
    /// spellings that language models tend to produce.
    pub fn parse(value: &str) -> Option<Self> {
        let normalised = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalised.as_str() {
            "automatic" => Some(RemediationType::Automatic),
            "human_in_loop" | "human_in_the_loop" => Some(RemediationType::HumanInLoop),
            "manual_only" | "manual" => Some(RemediationType::ManualOnly),
            _ => None,
        }
    }
}

impl fmt::Display for RemediationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Signal metadata
// ---------------------------------------------------------------------------

/// Origin of a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    #[default]
    ComplianceViolation,
    PolicyBreach,
    DataRisk,
    RegulatoryChange,
    ManualReport,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::ComplianceViolation => "compliance_violation",
            SignalType::PolicyBreach        => "policy_breach",
            SignalType::DataRisk            => "data_risk",
            SignalType::RegulatoryChange    => "regulatory_change",
            SignalType::ManualReport        => "manual_report",
        }
    }
}

/// Regulatory framework a violation was detected under.
///
/// Closed set so every framework is handled exhaustively by the metrics
/// breakdown and the prompt builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    PdpaSingapore,
    GdprEu,
    CcpaCalifornia,
    PipedaCanada,
    LgpdBrazil,
    Iso27001,
    Soc2,
}

impl Framework {
    pub fn as_str(self) -> &'static str {
        match self {
            Framework::PdpaSingapore  => "pdpa_singapore",
            Framework::GdprEu         => "gdpr_eu",
            Framework::CcpaCalifornia => "ccpa_california",
            Framework::PipedaCanada   => "pipeda_canada",
            Framework::LgpdBrazil     => "lgpd_brazil",
            Framework::Iso27001       => "iso_27001",
            Framework::Soc2           => "soc2",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdpa_singapore"  => Some(Framework::PdpaSingapore),
            "gdpr_eu"         => Some(Framework::GdprEu),
            "ccpa_california" => Some(Framework::CcpaCalifornia),
            "pipeda_canada"   => Some(Framework::PipedaCanada),
            "lgpd_brazil"     => Some(Framework::LgpdBrazil),
            "iso_27001"       => Some(Framework::Iso27001),
            "soc2"            => Some(Framework::Soc2),
            _ => None,
        }
    }

    /// Human-readable name for task instructions.
    pub fn display_name(self) -> &'static str {
        match self {
            Framework::PdpaSingapore  => "PDPA (Singapore)",
            Framework::GdprEu         => "GDPR (EU)",
            Framework::CcpaCalifornia => "CCPA (California)",
            Framework::PipedaCanada   => "PIPEDA (Canada)",
            Framework::LgpdBrazil     => "LGPD (Brazil)",
            Framework::Iso27001       => "ISO 27001",
            Framework::Soc2           => "SOC 2",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Context key listing the systems a remediation touches.
pub const CONTEXT_AFFECTED_SYSTEMS: &str = "affected_systems";
/// Context key flagging cross-border data transfers.
pub const CONTEXT_CROSS_BORDER: &str = "cross_border_transfers";
/// Context key flagging that automated decision systems are affected.
pub const CONTEXT_AUTOMATED_DECISIONS: &str = "automated_decision_making";

/// Intake record describing one detected compliance violation.
///
/// Produced by an external scanner and read-only to this crate.  Call
/// [`Signal::validate`] (the agent does so on every call) to reject malformed
/// input before any work is done.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::types::{RiskLevel, Signal};
///
/// let signal = Signal::new("sig-1", "retention-001", "crm-export", RiskLevel::Low)
///     .with_actions(["Update user preference"])
///     .with_context("affected_systems", serde_json::json!(["crm"]));
///
/// assert!(signal.validate().is_ok());
/// assert_eq!(signal.action_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub violation_id: String,
    pub activity_id: String,
    #[serde(default)]
    pub signal_type: SignalType,
    /// Risk level of the underlying violation.
    pub priority: RiskLevel,
    /// Scanner-supplied confidence in the detection, `0.0..=1.0`.
    pub confidence_score: f64,
    pub urgency_level: RiskLevel,
    /// Remediation actions proposed by the scanner.  `None` means the scanner
    /// supplied no list at all, which is treated as maximally complex.
    #[serde(default)]
    pub remediation_actions: Option<Vec<String>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub framework: Option<Framework>,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    pub created_at_ms: u64,
}

impl Signal {
    /// Create a signal with default confidence `0.5`, urgency equal to
    /// `priority`, no actions and an empty context.
    pub fn new(
        signal_id: impl Into<String>,
        violation_id: impl Into<String>,
        activity_id: impl Into<String>,
        priority: RiskLevel,
    ) -> Self {
        Self {
            signal_id: signal_id.into(),
            violation_id: violation_id.into(),
            activity_id: activity_id.into(),
            signal_type: SignalType::default(),
            priority,
            confidence_score: 0.5,
            urgency_level: priority,
            remediation_actions: None,
            description: String::new(),
            framework: None,
            context: BTreeMap::new(),
            created_at_ms: crate::current_time_ms(),
        }
    }

    pub fn with_actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.remediation_actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_framework(mut self, framework: Framework) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_signal_type(mut self, signal_type: SignalType) -> Self {
        self.signal_type = signal_type;
        self
    }

    pub fn with_confidence(mut self, confidence_score: f64) -> Self {
        self.confidence_score = confidence_score;
        self
    }

    /// Borrow the action list as a slice, `None` when absent.
    pub fn actions(&self) -> Option<&[String]> {
        self.remediation_actions.as_deref()
    }

    /// Number of actions (`0` when absent).
    pub fn action_count(&self) -> usize {
        self.actions().map_or(0, <[String]>::len)
    }

    /// Whether `context.cross_border_transfers` is set to `true`.
    pub fn has_cross_border_transfers(&self) -> bool {
        matches!(self.context.get(CONTEXT_CROSS_BORDER), Some(Value::Bool(true)))
    }

    /// Whether `context.automated_decision_making` is set to `true`.
    pub fn affects_automated_decisions(&self) -> bool {
        matches!(self.context.get(CONTEXT_AUTOMATED_DECISIONS), Some(Value::Bool(true)))
    }

    /// Reject signals that violate the intake contract.
    pub fn validate(&self) -> Result<(), RemediationError> {
        if self.signal_id.trim().is_empty() {
            return Err(RemediationError::InvalidSignal("signal_id must not be empty".into()));
        }
        if self.violation_id.trim().is_empty() {
            return Err(RemediationError::InvalidSignal("violation_id must not be empty".into()));
        }
        if !self.confidence_score.is_finite() || !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(RemediationError::InvalidSignal(format!(
                "confidence_score {} is outside 0.0..=1.0",
                self.confidence_score
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Which path produced a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// A validated reasoner response.
    Reasoner,
    /// The deterministic rule table.
    RuleBased,
}

/// Classifier output naming a remediation strategy.
///
/// Immutable once produced: fields are private and [`Decision::new`] is the
/// only constructor, including on deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DecisionRecord")]
pub struct Decision {
    violation_id: String,
    remediation_type: RemediationType,
    confidence_score: f64,
    reasoning: String,
    estimated_effort_minutes: u32,
    prerequisites: Vec<String>,
    risk_if_delayed: RiskLevel,
    source: DecisionSource,
}

/// Unvalidated wire form of [`Decision`].
#[derive(Deserialize)]
struct DecisionRecord {
    violation_id: String,
    remediation_type: RemediationType,
    confidence_score: f64,
    reasoning: String,
    estimated_effort_minutes: u32,
    #[serde(default)]
    prerequisites: Vec<String>,
    risk_if_delayed: RiskLevel,
    source: DecisionSource,
}

impl TryFrom<DecisionRecord> for Decision {
    type Error = RemediationError;

    fn try_from(record: DecisionRecord) -> Result<Self, Self::Error> {
        Decision::new(
            record.violation_id,
            record.remediation_type,
            record.confidence_score,
            record.reasoning,
            record.estimated_effort_minutes,
            record.prerequisites,
            record.risk_if_delayed,
            record.source,
        )
    }
}

impl Decision {
    /// Construct a decision, rejecting confidence outside `0.0..=1.0` and a
    /// zero effort estimate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use aumos_remediation_core::types::{Decision, DecisionSource, RemediationType, RiskLevel};
    ///
    /// let ok = Decision::new(
    ///     "v-1", RemediationType::Automatic, 0.9, "simple fix", 10,
    ///     vec![], RiskLevel::Low, DecisionSource::RuleBased,
    /// );
    /// assert!(ok.is_ok());
    ///
    /// let bad = Decision::new(
    ///     "v-1", RemediationType::Automatic, 1.5, "simple fix", 10,
    ///     vec![], RiskLevel::Low, DecisionSource::RuleBased,
    /// );
    /// assert!(bad.is_err());
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        violation_id: impl Into<String>,
        remediation_type: RemediationType,
        confidence_score: f64,
        reasoning: impl Into<String>,
        estimated_effort_minutes: u32,
        prerequisites: Vec<String>,
        risk_if_delayed: RiskLevel,
        source: DecisionSource,
    ) -> Result<Self, RemediationError> {
        if !confidence_score.is_finite() || !(0.0..=1.0).contains(&confidence_score) {
            return Err(RemediationError::InvalidDecision(format!(
                "confidence_score {confidence_score} is outside 0.0..=1.0"
            )));
        }
        if estimated_effort_minutes == 0 {
            return Err(RemediationError::InvalidDecision(
                "estimated_effort must be greater than zero".into(),
            ));
        }
        Ok(Self {
            violation_id: violation_id.into(),
            remediation_type,
            confidence_score,
            reasoning: reasoning.into(),
            estimated_effort_minutes,
            prerequisites,
            risk_if_delayed,
            source,
        })
    }

    pub fn violation_id(&self) -> &str {
        &self.violation_id
    }

    pub fn remediation_type(&self) -> RemediationType {
        self.remediation_type
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn estimated_effort_minutes(&self) -> u32 {
        self.estimated_effort_minutes
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub fn risk_if_delayed(&self) -> RiskLevel {
        self.risk_if_delayed
    }

    pub fn source(&self) -> DecisionSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::parse("nope"), None);
    }

    #[test]
    fn remediation_type_accepts_model_spellings() {
        assert_eq!(RemediationType::parse("HUMAN_IN_LOOP"), Some(RemediationType::HumanInLoop));
        assert_eq!(RemediationType::parse("human-in-the-loop"), Some(RemediationType::HumanInLoop));
        assert_eq!(RemediationType::parse("Manual_Only"), Some(RemediationType::ManualOnly));
        assert_eq!(RemediationType::parse("semi"), None);
    }

    #[test]
    fn signal_validation_rejects_out_of_range_confidence() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_confidence(1.2);
        assert!(matches!(signal.validate(), Err(RemediationError::InvalidSignal(_))));

        let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_confidence(f64::NAN);
        assert!(signal.validate().is_err());
    }

    #[test]
    fn signal_validation_rejects_blank_ids() {
        let signal = Signal::new("  ", "v", "a", RiskLevel::Low);
        assert!(signal.validate().is_err());
        let signal = Signal::new("s", "", "a", RiskLevel::Low);
        assert!(signal.validate().is_err());
    }

    #[test]
    fn cross_border_flag_reads_boolean_only() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Low)
            .with_context(CONTEXT_CROSS_BORDER, Value::Bool(true));
        assert!(signal.has_cross_border_transfers());

        let signal = Signal::new("s", "v", "a", RiskLevel::Low)
            .with_context(CONTEXT_CROSS_BORDER, Value::String("yes".into()));
        assert!(!signal.has_cross_border_transfers());
    }

    #[test]
    fn decision_rejects_zero_effort() {
        let result = Decision::new(
            "v",
            RemediationType::ManualOnly,
            0.4,
            "r",
            0,
            Vec::new(),
            RiskLevel::High,
            DecisionSource::RuleBased,
        );
        assert!(matches!(result, Err(RemediationError::InvalidDecision(_))));
    }

    #[test]
    fn decision_deserialisation_is_validated() {
        let json = r#"{
            "violation_id": "v",
            "remediation_type": "automatic",
            "confidence_score": 3.0,
            "reasoning": "r",
            "estimated_effort_minutes": 5,
            "risk_if_delayed": "low",
            "source": "reasoner"
        }"#;
        assert!(serde_json::from_str::<Decision>(json).is_err());

        let json = json.replace("3.0", "0.75");
        let decision: Decision = serde_json::from_str(&json).expect("valid decision");
        assert_eq!(decision.remediation_type(), RemediationType::Automatic);
        assert!(decision.prerequisites().is_empty());
    }
}
