// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Plan validation and feasibility scoring.
//!
//! [`validate_plan`] checks a built [`Workflow`] against the [`Decision`] it
//! came from before anything runs.  Issues are either warnings, which are
//! recorded on the workflow, or errors, which make the engine refuse the
//! plan.
//!
//! [`assess_feasibility`] scores how far a signal's actions lend themselves
//! to automation, and lists the blockers, prerequisites and risk factors a
//! reviewer should look at.

use serde::{Deserialize, Serialize};

use crate::scoring::cross_system_impact;
use crate::types::{Decision, RemediationType, RiskLevel, Signal};
use crate::workflow::{ActionKind, Workflow};

/// Confidence below which a plan draws a warning.
pub const LOW_CONFIDENCE: f64 = 0.6;
/// Confidence below which an automatic plan is refused.
pub const MIN_AUTOMATIC_CONFIDENCE: f64 = 0.3;
/// Effort above which a plan draws a warning (eight hours).
pub const HIGH_EFFORT_MINUTES: u32 = 480;

const MAX_AUTOMATIC_PREREQUISITES: usize = 5;
const MAX_DESTRUCTIVE_STEPS: usize = 2;

// ---------------------------------------------------------------------------
// Plan issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    NoSteps,
    LowConfidence,
    ConfidenceTooLow,
    AutomaticCriticalRisk,
    HighEffort,
    ManyPrerequisites,
    /// A destructive step with no verification or review step after it.
    UnverifiedDestructiveStep,
    ManyDestructiveSteps,
    DestructiveWithoutOversight,
    CrossBorderTransfer,
    RegulatoryNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanIssue {
    pub code: IssueCode,
    pub severity: Severity,
    /// The step the issue is about, when there is one.
    #[serde(default)]
    pub step_id: Option<String>,
    pub message: String,
}

impl PlanIssue {
    fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self { code, severity: Severity::Warning, step_id: None, message: message.into() }
    }

    fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self { code, severity: Severity::Error, step_id: None, message: message.into() }
    }

    fn on_step(mut self, step_id: &str) -> Self {
        self.step_id = Some(step_id.to_string());
        self
    }
}

/// Every issue found in one plan, in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanValidation {
    pub issues: Vec<PlanIssue>,
}

impl PlanValidation {
    /// No error-severity issues.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &PlanIssue> {
        self.issues.iter().filter(|issue| issue.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &PlanIssue> {
        self.issues.iter().filter(|issue| issue.severity == Severity::Warning)
    }

    pub fn has(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}

/// Check `workflow` against `decision`.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     agent::rule_based_decision,
///     builder::WorkflowBuilder,
///     config::Config,
///     types::{RiskLevel, Signal},
///     validation::{validate_plan, IssueCode},
/// };
///
/// let signal = Signal::new("s", "v", "a", RiskLevel::Medium)
///     .with_actions(["Delete stale exports", "Verify deletion completed"]);
/// let decision = rule_based_decision(&signal, 15).unwrap();
/// let workflow = WorkflowBuilder::new(&Config::default()).build(&decision, &signal);
///
/// let plan = validate_plan(&workflow, &decision);
/// assert!(plan.is_valid());
/// assert!(!plan.has(IssueCode::UnverifiedDestructiveStep));
/// ```
pub fn validate_plan(workflow: &Workflow, decision: &Decision) -> PlanValidation {
    let mut issues = Vec::new();
    let remediation_type = decision.remediation_type();
    let automatic = remediation_type == RemediationType::Automatic;
    let confidence = decision.confidence_score();

    if workflow.steps.is_empty() {
        issues.push(PlanIssue::error(IssueCode::NoSteps, "no workflow steps defined"));
    }

    if confidence < LOW_CONFIDENCE {
        issues.push(PlanIssue::warning(
            IssueCode::LowConfidence,
            format!("low decision confidence: {confidence:.2}"),
        ));
    }
    if automatic && confidence < MIN_AUTOMATIC_CONFIDENCE {
        issues.push(PlanIssue::error(
            IssueCode::ConfidenceTooLow,
            "decision confidence too low for automatic execution",
        ));
    }
    if automatic && workflow.priority == RiskLevel::Critical {
        issues.push(PlanIssue::error(
            IssueCode::AutomaticCriticalRisk,
            "critical risk violations must not be fully automatic",
        ));
    }
    if automatic && workflow.priority >= RiskLevel::High {
        issues.push(PlanIssue::warning(
            IssueCode::RegulatoryNotification,
            "high-risk violations may require regulatory notification",
        ));
    }

    let effort = decision.estimated_effort_minutes();
    if effort > HIGH_EFFORT_MINUTES {
        issues.push(PlanIssue::warning(
            IssueCode::HighEffort,
            format!("high estimated effort: {effort} minutes"),
        ));
    }
    if automatic && decision.prerequisites().len() > MAX_AUTOMATIC_PREREQUISITES {
        issues.push(PlanIssue::warning(
            IssueCode::ManyPrerequisites,
            "many prerequisites for automatic remediation",
        ));
    }

    issues.extend(sequence_issues(workflow));

    let cross_border = workflow
        .metadata
        .get("cross_border_transfers")
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    if cross_border {
        issues.push(PlanIssue::warning(
            IssueCode::CrossBorderTransfer,
            "cross-border transfers require additional validation",
        ));
    }

    PlanValidation { issues }
}

/// Ordering and combination checks over the step list.
fn sequence_issues(workflow: &Workflow) -> Vec<PlanIssue> {
    let mut issues = Vec::new();
    let steps = &workflow.steps;

    for (index, step) in steps.iter().enumerate() {
        if !step.action_type.is_destructive() {
            continue;
        }
        let verified = steps[index + 1..].iter().any(|later| {
            later.action_type == ActionKind::Verification || later.action_type.is_review()
        });
        if !verified {
            issues.push(
                PlanIssue::warning(
                    IssueCode::UnverifiedDestructiveStep,
                    format!("no verification step after destructive action: {}", step.name),
                )
                .on_step(&step.id),
            );
        }
    }

    let erasing = |kind: ActionKind| {
        matches!(kind, ActionKind::DataDeletion | ActionKind::DataModification)
    };
    let erasing_count = steps.iter().filter(|step| erasing(step.action_type)).count();
    if erasing_count > MAX_DESTRUCTIVE_STEPS {
        issues.push(PlanIssue::warning(
            IssueCode::ManyDestructiveSteps,
            format!("multiple destructive actions in workflow: {erasing_count}"),
        ));
    }
    let overseen = steps.iter().any(|step| step.requires_human_approval);
    if erasing_count > 0 && !overseen {
        issues.push(PlanIssue::warning(
            IssueCode::DestructiveWithoutOversight,
            "destructive actions without human oversight",
        ));
    }

    issues
}

// ---------------------------------------------------------------------------
// Feasibility
// ---------------------------------------------------------------------------

/// Weight of the per-action automation score.
const ACTION_WEIGHT: f64 = 0.4;
/// Weight of the system capability score.
const SYSTEM_WEIGHT: f64 = 0.3;
/// Weight of `1 - integration_complexity`.
const INTEGRATION_WEIGHT: f64 = 0.3;
/// Assumed capability of the target systems.
const SYSTEM_CAPABILITY: f64 = 0.85;
/// Integration complexity when no complicating factor is present.
const BASELINE_INTEGRATION_COMPLEXITY: f64 = 0.2;
/// Automation potential of an action no pattern recognises.
const UNKNOWN_ACTION_FEASIBILITY: f64 = 0.3;
/// Actions scoring below this are blockers.
const BLOCKER_FEASIBILITY: f64 = 0.4;
/// Multiplier applied when the decision itself is unsure.
const LOW_CONFIDENCE_PENALTY: f64 = 0.8;
const PENALTY_BELOW_CONFIDENCE: f64 = 0.7;

struct AutomationPattern {
    name: &'static str,
    keywords: &'static [&'static str],
    feasibility: f64,
    prerequisites: &'static [&'static str],
    risk_factors: &'static [&'static str],
}

const AUTOMATION_PATTERNS: &[AutomationPattern] = &[
    AutomationPattern {
        name: "data_retention",
        keywords: &["retention", "delete", "purge", "archive"],
        feasibility: 0.9,
        prerequisites: &["data_location_known", "backup_verified"],
        risk_factors: &["active_processing", "legal_hold"],
    },
    AutomationPattern {
        name: "consent_management",
        keywords: &["consent", "withdraw", "opt-out", "unsubscribe"],
        feasibility: 0.8,
        prerequisites: &["consent_system_available", "user_identified"],
        risk_factors: &["legal_basis_change", "legitimate_interest"],
    },
    AutomationPattern {
        name: "data_portability",
        keywords: &["export", "download", "portability", "transfer"],
        feasibility: 0.7,
        prerequisites: &["data_format_defined", "export_mechanism"],
        risk_factors: &["third_party_data", "security_clearance"],
    },
    AutomationPattern {
        name: "access_control",
        keywords: &["access", "permission", "role", "authorization"],
        feasibility: 0.8,
        prerequisites: &["identity_verified", "role_defined"],
        risk_factors: &["system_dependencies", "business_impact"],
    },
    AutomationPattern {
        name: "data_minimization",
        keywords: &["minimize", "reduce", "limit", "necessary"],
        feasibility: 0.6,
        prerequisites: &["data_usage_analysis", "business_approval"],
        risk_factors: &["operational_impact", "data_dependencies"],
    },
    AutomationPattern {
        name: "encryption",
        keywords: &["encrypt", "protection", "secure", "hash"],
        feasibility: 0.9,
        prerequisites: &["encryption_key_available", "system_downtime"],
        risk_factors: &["performance_impact", "key_management"],
    },
    AutomationPattern {
        name: "anonymization",
        keywords: &["anonymize", "pseudonymize", "de-identify"],
        feasibility: 0.5,
        prerequisites: &["anonymization_method", "re-identification_risk"],
        risk_factors: &["data_utility", "linkage_attacks"],
    },
];

/// How automatable one action is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAssessment {
    pub action: String,
    pub kind: ActionKind,
    pub feasibility: f64,
    /// Names of the automation patterns the action matched.
    pub patterns: Vec<String>,
    pub prerequisites: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// Feasibility report for one signal and decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feasibility {
    /// `0.0..=1.0`; higher means easier to automate.
    pub score: f64,
    pub actions: Vec<ActionAssessment>,
    /// `0.0..=1.0`; mean of the complicating factors present.
    pub integration_complexity: f64,
    pub blockers: Vec<String>,
    /// Deduplicated, in first-seen order.
    pub prerequisites: Vec<String>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Score `signal`'s actions for automation under `decision`.
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::{
///     agent::rule_based_decision,
///     types::{RiskLevel, Signal},
///     validation::assess_feasibility,
/// };
///
/// let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Encrypt backups"]);
/// let decision = rule_based_decision(&signal, 15).unwrap();
///
/// let feasibility = assess_feasibility(&signal, &decision);
/// assert!(feasibility.score > 0.8);
/// assert!(feasibility.prerequisites.contains(&"encryption_key_available".to_string()));
/// ```
pub fn assess_feasibility(signal: &Signal, decision: &Decision) -> Feasibility {
    let actions: Vec<ActionAssessment> = signal
        .actions()
        .unwrap_or_default()
        .iter()
        .map(|action| assess_action(action))
        .collect();

    let average = if actions.is_empty() {
        0.0
    } else {
        actions.iter().map(|action| action.feasibility).sum::<f64>() / actions.len() as f64
    };

    let factors = integration_factors(signal);
    let integration_complexity = if factors.is_empty() {
        BASELINE_INTEGRATION_COMPLEXITY
    } else {
        factors.iter().sum::<f64>() / factors.len() as f64
    };

    let mut score = ACTION_WEIGHT * average
        + SYSTEM_WEIGHT * SYSTEM_CAPABILITY
        + INTEGRATION_WEIGHT * (1.0 - integration_complexity);
    if decision.confidence_score() < PENALTY_BELOW_CONFIDENCE {
        score *= LOW_CONFIDENCE_PENALTY;
    }
    let score = score.clamp(0.0, 1.0);

    let mut blockers = Vec::new();
    for action in &actions {
        if action.feasibility < BLOCKER_FEASIBILITY {
            blockers.push(format!("Low automation potential for: {}", action.action));
        }
    }
    for action in &actions {
        for factor in &action.risk_factors {
            blockers.push(format!("Risk factor for {}: {factor}", action.action));
        }
    }

    let mut prerequisites: Vec<String> = Vec::new();
    for prerequisite in actions.iter().flat_map(|action| &action.prerequisites) {
        if !prerequisites.contains(prerequisite) {
            prerequisites.push(prerequisite.clone());
        }
    }

    Feasibility {
        score,
        integration_complexity,
        blockers,
        prerequisites,
        risk_factors: signal_risk_factors(signal),
        recommendations: recommendations(score, decision.remediation_type()),
        actions,
    }
}

fn assess_action(action: &str) -> ActionAssessment {
    let lowered = action.to_lowercase();
    let matched: Vec<&AutomationPattern> = AUTOMATION_PATTERNS
        .iter()
        .filter(|pattern| pattern.keywords.iter().any(|keyword| lowered.contains(keyword)))
        .collect();

    let feasibility = matched
        .iter()
        .map(|pattern| pattern.feasibility)
        .fold(None, |best: Option<f64>, value| Some(best.map_or(value, |best| best.max(value))))
        .unwrap_or(UNKNOWN_ACTION_FEASIBILITY);

    let collect = |field: fn(&AutomationPattern) -> &'static [&'static str]| -> Vec<String> {
        matched
            .iter()
            .flat_map(|pattern| field(pattern).iter())
            .map(|item| item.to_string())
            .collect()
    };

    ActionAssessment {
        action: action.to_string(),
        kind: ActionKind::classify(action),
        feasibility,
        patterns: matched.iter().map(|pattern| pattern.name.to_string()).collect(),
        prerequisites: collect(|pattern| pattern.prerequisites),
        risk_factors: collect(|pattern| pattern.risk_factors),
    }
}

/// Complexity of each complicating factor the signal carries.
fn integration_factors(signal: &Signal) -> Vec<f64> {
    let mut factors = Vec::new();
    if signal.has_cross_border_transfers() {
        factors.push(0.6);
    }
    if signal.affects_automated_decisions() {
        factors.push(0.7);
    }
    // Three or more distinct affected systems.
    if cross_system_impact(&signal.context) >= 0.5 {
        factors.push(0.5);
    }
    factors
}

fn signal_risk_factors(signal: &Signal) -> Vec<String> {
    let mut factors = Vec::new();
    if signal.has_cross_border_transfers() {
        factors.push("Cross-border data transfers present".to_string());
    }
    if signal.affects_automated_decisions() {
        factors.push("Automated decision systems affected".to_string());
    }
    if signal.action_count() > 3 {
        factors.push("Multiple complex remediation actions required".to_string());
    }
    factors
}

fn recommendations(score: f64, remediation_type: RemediationType) -> Vec<String> {
    let mut advice = Vec::new();
    if score < 0.4 && remediation_type == RemediationType::Automatic {
        advice.push("Consider human_in_loop due to low feasibility".to_string());
    }
    if score > 0.8 && remediation_type == RemediationType::ManualOnly {
        advice.push("Consider automatic remediation due to high feasibility".to_string());
    }
    if (0.4..=0.7).contains(&score) {
        advice.push("human_in_loop approach recommended for oversight".to_string());
    }
    if score < 0.6 {
        advice.push("Implement additional validation steps".to_string());
        advice.push("Consider a phased approach with manual verification".to_string());
    }
    advice
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::agent::rule_based_decision;
    use crate::builder::WorkflowBuilder;
    use crate::config::Config;
    use crate::types::{DecisionSource, CONTEXT_CROSS_BORDER};

    fn plan_for(signal: &Signal) -> (Workflow, Decision) {
        let decision = rule_based_decision(signal, 15).expect("decision");
        let workflow = WorkflowBuilder::new(&Config::default()).build(&decision, signal);
        (workflow, decision)
    }

    fn automatic(violation_id: &str, confidence: f64, risk: RiskLevel) -> Decision {
        Decision::new(
            violation_id,
            RemediationType::Automatic,
            confidence,
            "reasoner verdict",
            30,
            vec![],
            risk,
            DecisionSource::Reasoner,
        )
        .expect("valid decision")
    }

    #[test]
    fn rule_plans_are_never_refused() {
        for risk in RiskLevel::ALL {
            for actions in [vec![], vec!["Update flag"], vec!["Purge records", "Notify users"]] {
                let signal = Signal::new("s", "v", "a", risk).with_actions(actions);
                let (workflow, decision) = plan_for(&signal);
                assert!(validate_plan(&workflow, &decision).is_valid(), "{risk} plan refused");
            }
        }
    }

    #[test]
    fn destructive_step_needs_a_later_check() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Medium).with_actions(["Delete stale exports"]);
        let (workflow, decision) = plan_for(&signal);
        let plan = validate_plan(&workflow, &decision);

        let issue = plan
            .issues
            .iter()
            .find(|issue| issue.code == IssueCode::UnverifiedDestructiveStep)
            .expect("unverified deletion");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.step_id.as_deref(), Some(workflow.steps[0].id.as_str()));

        let reviewed = Signal::new("s", "v", "a", RiskLevel::Medium)
            .with_actions(["Delete stale exports", "Review remaining records"]);
        let (workflow, decision) = plan_for(&reviewed);
        assert!(!validate_plan(&workflow, &decision).has(IssueCode::UnverifiedDestructiveStep));
    }

    #[test]
    fn risky_combinations_are_flagged() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Low)
            .with_actions(["Delete cache", "Update index", "Purge logs"]);
        let (mut workflow, decision) = plan_for(&signal);
        for step in &mut workflow.steps {
            step.requires_human_approval = false;
        }
        let plan = validate_plan(&workflow, &decision);
        assert!(plan.has(IssueCode::ManyDestructiveSteps));
        assert!(plan.has(IssueCode::DestructiveWithoutOversight));

        workflow.steps[0].requires_human_approval = true;
        assert!(!validate_plan(&workflow, &decision).has(IssueCode::DestructiveWithoutOversight));
    }

    #[test]
    fn automatic_critical_plan_is_an_error() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Critical).with_actions(["Rotate key"]);
        let decision = automatic("v", 0.9, RiskLevel::Critical);
        let workflow = WorkflowBuilder::new(&Config::default()).build(&decision, &signal);

        let plan = validate_plan(&workflow, &decision);
        assert!(!plan.is_valid());
        assert!(plan.errors().any(|issue| issue.code == IssueCode::AutomaticCriticalRisk));
        assert!(plan.has(IssueCode::RegulatoryNotification));
    }

    #[test]
    fn confidence_thresholds() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Rotate key"]);

        let shaky = automatic("v", 0.2, RiskLevel::Low);
        let workflow = WorkflowBuilder::new(&Config::default()).build(&shaky, &signal);
        let plan = validate_plan(&workflow, &shaky);
        assert!(plan.has(IssueCode::LowConfidence));
        assert!(plan.errors().any(|issue| issue.code == IssueCode::ConfidenceTooLow));

        let unsure = automatic("v", 0.5, RiskLevel::Low);
        let plan = validate_plan(&workflow, &unsure);
        assert!(plan.is_valid());
        assert_eq!(plan.warnings().filter(|issue| issue.code == IssueCode::LowConfidence).count(), 1);
    }

    #[test]
    fn cross_border_metadata_draws_a_warning() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Low)
            .with_actions(["Rotate key"])
            .with_context(CONTEXT_CROSS_BORDER, json!(true));
        let (workflow, decision) = plan_for(&signal);
        assert!(validate_plan(&workflow, &decision).has(IssueCode::CrossBorderTransfer));
    }

    #[test]
    fn feasibility_follows_patterns_and_factors() {
        let signal = Signal::new("s", "v", "a", RiskLevel::Medium)
            .with_actions(["Purge expired records", "Rotate badge printer"]);
        let decision = rule_based_decision(&signal, 15).expect("decision");
        let feasibility = assess_feasibility(&signal, &decision);

        assert_eq!(feasibility.actions[0].patterns, vec!["data_retention".to_string()]);
        assert_eq!(feasibility.actions[0].feasibility, 0.9);
        assert_eq!(feasibility.actions[1].feasibility, UNKNOWN_ACTION_FEASIBILITY);
        assert!(feasibility
            .blockers
            .contains(&"Low automation potential for: Rotate badge printer".to_string()));
        assert!(feasibility
            .blockers
            .contains(&"Risk factor for Purge expired records: legal_hold".to_string()));
        assert_eq!(feasibility.prerequisites, vec!["data_location_known", "backup_verified"]);
        assert!((0.0..=1.0).contains(&feasibility.score));
    }

    #[test]
    fn complicating_factors_lower_the_score() {
        let plain = Signal::new("s", "v", "a", RiskLevel::Low).with_actions(["Encrypt backups"]);
        let tangled = plain
            .clone()
            .with_context(CONTEXT_CROSS_BORDER, json!(true))
            .with_context("automated_decision_making", json!(true));
        let decision = rule_based_decision(&plain, 15).expect("decision");

        let easy = assess_feasibility(&plain, &decision);
        let hard = assess_feasibility(&tangled, &decision);
        assert_eq!(easy.integration_complexity, BASELINE_INTEGRATION_COMPLEXITY);
        assert!(hard.score < easy.score);
        assert_eq!(hard.risk_factors.len(), 2);
    }

    #[test]
    fn recommendations_track_the_score() {
        assert!(recommendations(0.3, RemediationType::Automatic)
            .iter()
            .any(|advice| advice.contains("human_in_loop due to low feasibility")));
        assert!(recommendations(0.9, RemediationType::ManualOnly)
            .iter()
            .any(|advice| advice.contains("automatic remediation")));
        assert!(recommendations(0.75, RemediationType::HumanInLoop).is_empty());
    }
}
