//! The capture policy.

use std::collections::BTreeSet;
use std::time::Duration;

use outpost_core::Severity;
use serde::{Deserialize, Serialize};

/// Decides what is captured and how long synced history is kept.
///
/// Loaded once at startup from the persisted store, mutated only through an
/// explicit update, and applied to subsequent captures only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Master switch; nothing is captured when `false`.
    pub enabled: bool,
    /// Days to keep delivered history in the local cache. Must be positive.
    pub retention_days: i32,
    /// Audit records below this level are dropped.
    pub minimum_severity: Severity,
    /// Categories never captured.
    pub excluded_modules: BTreeSet<String>,
    /// Actions never captured.
    pub excluded_actions: BTreeSet<String>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 90,
            minimum_severity: Severity::Info,
            excluded_modules: BTreeSet::new(),
            excluded_actions: BTreeSet::new(),
        }
    }
}

impl RetentionPolicy {
    /// Set the minimum severity.
    #[must_use]
    pub fn with_minimum_severity(mut self, severity: Severity) -> Self {
        self.minimum_severity = severity;
        self
    }

    /// Exclude a category.
    #[must_use]
    pub fn excluding_module(mut self, module: impl Into<String>) -> Self {
        self.excluded_modules.insert(module.into());
        self
    }

    /// Exclude an action.
    #[must_use]
    pub fn excluding_action(mut self, action: impl Into<String>) -> Self {
        self.excluded_actions.insert(action.into());
        self
    }

    /// Disable capture entirely.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Retention window, `None` when `retention_days` is not positive.
    #[must_use]
    pub fn retention_window(&self) -> Option<Duration> {
        u64::try_from(self.retention_days)
            .ok()
            .filter(|days| *days > 0)
            .map(|days| Duration::from_secs(days.saturating_mul(86_400)))
    }
}
