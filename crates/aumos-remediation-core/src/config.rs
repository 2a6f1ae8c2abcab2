// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Engine-level configuration.
//!
//! [`Config`] is the single entry point for tuning the remediation engine at
//! construction time.  `Config::default()` is always valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InvalidConfig;
use crate::types::RiskLevel;

/// Top-level configuration for [`RemediationEngine`](crate::engine::RemediationEngine).
///
/// # Examples
///
/// ```rust
/// use aumos_remediation_core::config::Config;
///
/// let config = Config {
///     reasoner_timeout_ms: 5_000,
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound on a single reasoner call before the rule path is taken.
    pub reasoner_timeout_ms: u64,

    /// `max_retries` given to every step the builder creates.
    pub default_max_retries: u32,

    /// Backoff between attempts of a failing step.
    pub retry: RetryPolicy,

    /// How human tasks are assigned and scheduled.
    pub tasks: TaskPolicy,

    /// Effort charged per simple action by the rule-based estimator.
    pub minutes_per_action: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reasoner_timeout_ms: 30_000,
            default_max_retries: 3,
            retry: RetryPolicy::default(),
            tasks: TaskPolicy::default(),
            minutes_per_action: 15,
        }
    }
}

impl Config {
    /// Reject values the executor cannot honour.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.default_max_retries == 0 {
            return Err(InvalidConfig::new("default_max_retries", "must be at least 1"));
        }
        if self.minutes_per_action == 0 {
            return Err(InvalidConfig::new("minutes_per_action", "must be greater than zero"));
        }
        if self.reasoner_timeout_ms == 0 {
            return Err(InvalidConfig::new("reasoner_timeout_ms", "must be greater than zero"));
        }
        if self.tasks.default_assignee.trim().is_empty() {
            return Err(InvalidConfig::new("tasks.default_assignee", "must not be empty"));
        }
        self.retry.validate()
    }

    pub fn reasoner_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoner_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Exponential backoff: `min(base * multiplier^(attempt - 1), max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts.  Handy in tests.
    pub fn immediate() -> Self {
        Self { base_delay_ms: 0, max_delay_ms: 0, multiplier: 1.0 }
    }

    /// Delay before retry number `attempt` (1-based).  Non-decreasing in
    /// `attempt` and never above `max_delay_ms`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use aumos_remediation_core::config::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(1).as_millis(), 500);
    /// assert_eq!(policy.delay_for(2).as_millis(), 1_000);
    /// assert_eq!(policy.delay_for(20).as_millis(), 30_000);
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = if scaled.is_finite() {
            scaled.min(self.max_delay_ms as f64)
        } else {
            self.max_delay_ms as f64
        };
        Duration::from_millis(capped.max(0.0) as u64)
    }

    fn validate(&self) -> Result<(), InvalidConfig> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(InvalidConfig::new("retry.multiplier", "must be a finite value >= 1.0"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(InvalidConfig::new("retry.base_delay_ms", "must not exceed retry.max_delay_ms"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TaskPolicy
// ---------------------------------------------------------------------------

/// Assignment and scheduling rules for human tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPolicy {
    pub critical_due_hours: u64,
    pub high_due_hours: u64,
    pub medium_due_hours: u64,
    pub low_due_hours: u64,
    /// Used when the risk level has no dedicated assignee.
    pub default_assignee: String,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            critical_due_hours: 8,
            high_due_hours: 24,
            medium_due_hours: 48,
            low_due_hours: 72,
            default_assignee: "compliance_analyst".into(),
        }
    }
}

impl TaskPolicy {
    pub fn due_hours(&self, risk: RiskLevel) -> u64 {
        match risk {
            RiskLevel::Critical => self.critical_due_hours,
            RiskLevel::High     => self.high_due_hours,
            RiskLevel::Medium   => self.medium_due_hours,
            RiskLevel::Low      => self.low_due_hours,
        }
    }

    pub fn assignee(&self, risk: RiskLevel) -> String {
        match risk {
            RiskLevel::Critical => "senior_compliance_officer".into(),
            RiskLevel::High     => "compliance_manager".into(),
            RiskLevel::Medium | RiskLevel::Low => self.default_assignee.clone(),
        }
    }

    /// Roles allowed to approve a task at `risk`.  Empty means anyone.
    pub fn required_approvals(&self, risk: RiskLevel) -> Vec<String> {
        match risk {
            RiskLevel::Critical => vec!["dpo".into(), "senior_management".into()],
            RiskLevel::High     => vec!["compliance_manager".into()],
            RiskLevel::Medium | RiskLevel::Low => Vec::new(),
        }
    }
}
