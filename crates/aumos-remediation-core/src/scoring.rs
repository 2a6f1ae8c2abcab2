// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Feature extraction and the deterministic rule table.
//!
//! Every function here is pure: the same [`Signal`] always produces the same
//! features, rule, confidence and effort.  Coefficients are tuned so that
//! confidence falls monotonically as complexity, cross-system impact, risk
//! and action count rise, and effort rises with complexity and action count.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{RemediationType, RiskLevel, Signal, CONTEXT_AFFECTED_SYSTEMS};
use crate::workflow::ActionKind;

/// Phrases that mark an action as non-trivial.
pub const COMPLEXITY_KEYWORDS: &[&str] = &[
    "legal review",
    "migrate",
    "migration",
    "third-party",
    "third party",
    "agreement",
    "contract",
    "regulator",
    "cross-border",
    "audit",
    "redesign",
    "architecture",
];

/// Effort charged when the action list is empty or absent, in multiples of
/// the per-action base.
const UNSPECIFIED_EFFORT_ACTIONS: u32 = 4;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Numeric features derived from a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// `0.0..=1.0`; `1.0` when the action list is absent.
    pub complexity: f64,
    /// `0.0..=1.0`; `0.0` when no affected systems are listed.
    pub cross_system_impact: f64,
    pub action_count: usize,
}

impl Features {
    pub fn extract(signal: &Signal) -> Self {
        Self {
            complexity: complexity(signal.actions()),
            cross_system_impact: cross_system_impact(&signal.context),
            action_count: signal.action_count(),
        }
    }
}

/// Complexity of an action list.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::scoring::complexity;
///
/// assert_eq!(complexity(None), 1.0);
/// assert_eq!(complexity(Some(&["Update flag".to_string()])), 0.0);
///
/// let heavy = [
///     "Migrate records to the EU region".to_string(),
///     "Obtain legal review".to_string(),
///     "Renegotiate third-party agreement".to_string(),
/// ];
/// assert!(complexity(Some(&heavy)) > 0.7);
/// ```
pub fn complexity(actions: Option<&[String]>) -> f64 {
    let Some(actions) = actions else {
        return 1.0;
    };
    if actions.is_empty() {
        return 0.0;
    }

    let count_part = ((actions.len() - 1) as f64 * 0.2).min(0.6);
    let keyword_hits: usize = actions
        .iter()
        .map(|action| {
            let lowered = action.to_lowercase();
            COMPLEXITY_KEYWORDS
                .iter()
                .filter(|keyword| lowered.contains(*keyword))
                .count()
        })
        .sum();
    let keyword_part = (keyword_hits as f64 * 0.25).min(0.6);

    (count_part + keyword_part).clamp(0.0, 1.0)
}

/// Impact across systems, from the distinct entries of
/// `context.affected_systems` (a JSON array or a comma-separated string).
pub fn cross_system_impact(context: &BTreeMap<String, Value>) -> f64 {
    let names: BTreeSet<String> = match context.get(CONTEXT_AFFECTED_SYSTEMS) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(normalise_system)
            .filter(|name| !name.is_empty())
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(normalise_system)
            .filter(|name| !name.is_empty())
            .collect(),
        _ => BTreeSet::new(),
    };

    (names.len().saturating_sub(1) as f64 * 0.25).min(1.0)
}

fn normalise_system(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Inverse risk mapping: lower risk, higher factor.
pub fn risk_factor(risk: RiskLevel) -> f64 {
    match risk {
        RiskLevel::Low      => 1.0,
        RiskLevel::Medium   => 0.85,
        RiskLevel::High     => 0.7,
        RiskLevel::Critical => 0.5,
    }
}

/// Unbanded confidence before the rule's range is applied.
pub fn raw_confidence(features: &Features, risk: RiskLevel) -> f64 {
    let weighted = 0.35 * (1.0 - features.complexity)
        + 0.15 * (1.0 - features.cross_system_impact)
        + 0.5 * risk_factor(risk);
    let count_penalty = 1.0 + 0.1 * features.action_count.saturating_sub(1) as f64;
    ((0.2 + 0.75 * weighted) / count_penalty).clamp(0.0, 1.0)
}

/// Estimated effort in minutes; always at least one.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::scoring::{effort_minutes, Features};
///
/// let trivial = Features { complexity: 0.0, cross_system_impact: 0.0, action_count: 1 };
/// assert_eq!(effort_minutes(&trivial, 15), 15);
///
/// let heavy = Features { complexity: 1.0, cross_system_impact: 0.0, action_count: 3 };
/// assert!(effort_minutes(&heavy, 15) >= 120);
/// ```
pub fn effort_minutes(features: &Features, minutes_per_action: u32) -> u32 {
    let base = f64::from(minutes_per_action.max(1));
    if features.action_count == 0 {
        return minutes_per_action.max(1) * UNSPECIFIED_EFFORT_ACTIONS;
    }
    let estimate = base
        * features.action_count as f64
        * (1.0 + 3.0 * features.complexity)
        * (1.0 + features.cross_system_impact);
    (estimate.ceil() as u32).max(1)
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Which row of the rule table fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    NoActions,
    CriticalRisk,
    HighComplexity,
    MediumRisk,
    SensitiveAction,
    LowRiskSimple,
    CrossBorder,
    Elevated,
}

impl Rule {
    /// Evaluate the rule table.  Rows are checked top to bottom.
    pub fn evaluate(signal: &Signal, features: &Features) -> Self {
        let actions = signal.actions().unwrap_or_default();
        if actions.is_empty() {
            return Rule::NoActions;
        }
        if signal.priority == RiskLevel::Critical {
            return Rule::CriticalRisk;
        }
        if features.complexity > 0.7 {
            return Rule::HighComplexity;
        }
        if signal.priority == RiskLevel::Medium {
            return Rule::MediumRisk;
        }
        if actions.iter().any(|action| ActionKind::classify(action).is_sensitive()) {
            return Rule::SensitiveAction;
        }
        if signal.priority == RiskLevel::Low && actions.len() == 1 && features.complexity == 0.0 {
            if signal.has_cross_border_transfers() {
                return Rule::CrossBorder;
            }
            return Rule::LowRiskSimple;
        }
        Rule::Elevated
    }

    pub fn remediation_type(self) -> RemediationType {
        match self {
            Rule::NoActions | Rule::CriticalRisk | Rule::HighComplexity => {
                RemediationType::ManualOnly
            }
            Rule::LowRiskSimple => RemediationType::Automatic,
            Rule::MediumRisk | Rule::SensitiveAction | Rule::CrossBorder | Rule::Elevated => {
                RemediationType::HumanInLoop
            }
        }
    }

    /// Inclusive confidence range for decisions produced by this rule.
    pub fn confidence_band(self) -> (f64, f64) {
        match self {
            Rule::NoActions => (0.0, 0.5),
            Rule::CriticalRisk | Rule::HighComplexity => (0.0, 0.7),
            Rule::LowRiskSimple => (0.7, 1.0),
            Rule::MediumRisk | Rule::SensitiveAction | Rule::CrossBorder | Rule::Elevated => {
                (0.5, 0.8)
            }
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Rule::NoActions      => "no remediation actions were supplied",
            Rule::CriticalRisk   => "critical risk requires manual handling",
            Rule::HighComplexity => "remediation complexity exceeds the automation threshold",
            Rule::MediumRisk     => "medium risk requires human approval",
            Rule::SensitiveAction => "deletion or notification actions require human approval",
            Rule::LowRiskSimple  => "single simple action at low risk",
            Rule::CrossBorder    => "cross-border transfers require human approval",
            Rule::Elevated       => "elevated risk or multiple actions require human approval",
        }
    }
}

/// Confidence for `rule`, banded into its range.
pub fn banded_confidence(rule: Rule, features: &Features, risk: RiskLevel) -> f64 {
    let (low, high) = rule.confidence_band();
    raw_confidence(features, risk).clamp(low, high)
}

/// Name the factor that pushed hardest against automation.
pub fn dominant_factor(features: &Features, risk: RiskLevel) -> &'static str {
    let pressures = [
        ("remediation complexity", features.complexity),
        ("cross-system impact", features.cross_system_impact),
        ("risk level", (1.0 - risk_factor(risk)) * 2.0),
        (
            "number of actions",
            (features.action_count.saturating_sub(1) as f64 * 0.1).min(1.0),
        ),
    ];

    let mut best = ("no aggravating factor", 0.0_f64);
    for (name, pressure) in pressures {
        if pressure > best.1 {
            best = (name, pressure);
        }
    }
    best.0
}

/// Human-readable reasoning naming the decision type and dominant factor.
pub fn reasoning(rule: Rule, features: &Features, risk: RiskLevel) -> String {
    format!(
        "{}: {}. Dominant factor: {} (complexity {:.2}, cross-system impact {:.2}, risk {}, {} action(s)).",
        rule.remediation_type(),
        rule.describe(),
        dominant_factor(features, risk),
        features.complexity,
        features.cross_system_impact,
        risk,
        features.action_count,
    )
}

/// Prerequisites implied by the remediation type and signal traits.
pub fn prerequisites(signal: &Signal, remediation_type: RemediationType) -> Vec<String> {
    let mut items: Vec<String> = match remediation_type {
        RemediationType::ManualOnly => vec![
            "Legal review required".into(),
            "Compliance officer approval".into(),
            "Impact assessment".into(),
        ],
        RemediationType::HumanInLoop => vec![
            "Human review and approval".into(),
            "Backup and recovery plan".into(),
        ],
        RemediationType::Automatic => Vec::new(),
    };

    if signal.has_cross_border_transfers() {
        items.push("Cross-border transfer compliance check".into());
    }
    if signal.priority == RiskLevel::High {
        items.push("Risk assessment documentation".into());
    }
    let deletes = signal.violation_id.to_lowercase().contains("delete")
        || signal
            .actions()
            .unwrap_or_default()
            .iter()
            .any(|action| ActionKind::classify(action) == ActionKind::DataDeletion);
    if deletes {
        items.push("Data retention policy compliance".into());
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features(complexity: f64, cross_system_impact: f64, action_count: usize) -> Features {
        Features { complexity, cross_system_impact, action_count }
    }

    #[test]
    fn empty_list_is_not_complex_but_absent_list_is() {
        assert_eq!(complexity(Some(&[])), 0.0);
        assert_eq!(complexity(None), 1.0);
    }

    #[test]
    fn complexity_grows_with_count_and_keywords() {
        let one = ["Update flag".to_string()];
        let three = ["Update flag".to_string(), "Encrypt column".into(), "Notify owner".into()];
        let keyword = ["Migrate table".to_string()];
        assert!(complexity(Some(&three)) > complexity(Some(&one)));
        assert!(complexity(Some(&keyword)) > complexity(Some(&one)));
    }

    #[test]
    fn cross_system_impact_counts_distinct_systems() {
        let mut context = BTreeMap::new();
        assert_eq!(cross_system_impact(&context), 0.0);

        context.insert(CONTEXT_AFFECTED_SYSTEMS.into(), json!(["crm", "CRM", "billing"]));
        assert_eq!(cross_system_impact(&context), 0.25);

        context.insert(CONTEXT_AFFECTED_SYSTEMS.into(), json!("a, b, c, d, e, f"));
        assert_eq!(cross_system_impact(&context), 1.0);
    }

    #[test]
    fn confidence_is_monotonic_in_each_factor() {
        let base = raw_confidence(&features(0.2, 0.2, 2), RiskLevel::Medium);
        assert!(raw_confidence(&features(0.5, 0.2, 2), RiskLevel::Medium) < base);
        assert!(raw_confidence(&features(0.2, 0.6, 2), RiskLevel::Medium) < base);
        assert!(raw_confidence(&features(0.2, 0.2, 4), RiskLevel::Medium) < base);
        assert!(raw_confidence(&features(0.2, 0.2, 2), RiskLevel::High) < base);
    }

    #[test]
    fn trivial_action_scores_high() {
        let trivial = features(0.0, 0.0, 1);
        assert!((raw_confidence(&trivial, RiskLevel::Low) - 0.95).abs() < 1e-9);
        assert_eq!(effort_minutes(&trivial, 15), 15);
        assert_eq!(effort_minutes(&features(1.0, 0.0, 0), 15), 60);
    }

    #[test]
    fn bands_hold_for_each_rule() {
        let trivial = features(0.0, 0.0, 1);
        assert!(banded_confidence(Rule::NoActions, &trivial, RiskLevel::Low) <= 0.5);
        assert!(banded_confidence(Rule::MediumRisk, &trivial, RiskLevel::Medium) <= 0.8);
        let heavy = features(1.0, 1.0, 6);
        assert!(banded_confidence(Rule::Elevated, &heavy, RiskLevel::High) >= 0.5);
        assert!(banded_confidence(Rule::LowRiskSimple, &heavy, RiskLevel::Low) >= 0.7);
    }

    #[test]
    fn rule_table_order() {
        let low = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Update flag"]);
        assert_eq!(Rule::evaluate(&low, &Features::extract(&low)), Rule::LowRiskSimple);

        let deletes = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Delete old rows"]);
        assert_eq!(Rule::evaluate(&deletes, &Features::extract(&deletes)), Rule::SensitiveAction);

        let cross = low.clone().with_context("cross_border_transfers", json!(true));
        assert_eq!(Rule::evaluate(&cross, &Features::extract(&cross)), Rule::CrossBorder);

        let high = Signal::new("s", "v", "a", RiskLevel::High).with_actions(["Update flag"]);
        assert_eq!(Rule::evaluate(&high, &Features::extract(&high)), Rule::Elevated);

        let absent = Signal::new("s", "v", "a", RiskLevel::Low);
        assert_eq!(Rule::evaluate(&absent, &Features::extract(&absent)), Rule::NoActions);
    }

    #[test]
    fn dominant_factor_picks_largest_pressure() {
        assert_eq!(dominant_factor(&features(0.0, 0.0, 1), RiskLevel::Critical), "risk level");
        assert_eq!(
            dominant_factor(&features(0.9, 0.0, 1), RiskLevel::Low),
            "remediation complexity"
        );
        assert_eq!(
            dominant_factor(&features(0.0, 0.0, 1), RiskLevel::Low),
            "no aggravating factor"
        );
    }

    #[test]
    fn prerequisites_follow_type_and_traits() {
        let signal = Signal::new("s", "delete-001", "a", RiskLevel::High)
            .with_actions(["Encrypt column"])
            .with_context("cross_border_transfers", json!(true));
        let items = prerequisites(&signal, RemediationType::HumanInLoop);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], "Human review and approval");
        assert!(items.contains(&"Data retention policy compliance".to_string()));

        let plain = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Update flag"]);
        assert!(prerequisites(&plain, RemediationType::Automatic).is_empty());
    }
}
