//! Audit trail records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Severity;

/// Who did what, to what, with optional before/after snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Identity of the acting user.
    pub actor_id: String,
    /// Display name of the acting user.
    pub actor_name: String,
    /// Role the actor held at the time of the action.
    #[serde(default)]
    pub actor_role: String,
    /// Category tag, e.g. `invoices` or `payroll`.
    pub module: String,
    /// Action tag, e.g. `create` or `void`.
    pub action: String,
    /// Severity level.
    #[serde(default)]
    pub severity: Severity,
    /// Type of the affected entity.
    #[serde(default)]
    pub target_type: String,
    /// Identifier of the affected entity.
    #[serde(default)]
    pub target_id: String,
    /// Display name of the affected entity.
    #[serde(default)]
    pub target_name: String,
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Snapshot before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Value>,
    /// Snapshot after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// Whether the audited action succeeded.
    #[serde(default = "default_success")]
    pub success: bool,
    /// Error message when the action failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl AuditRecord {
    /// Create a successful `Info` record.
    #[must_use]
    pub fn new(
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
        module: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            actor_role: String::new(),
            module: module.into(),
            action: action.into(),
            severity: Severity::Info,
            target_type: String::new(),
            target_id: String::new(),
            target_name: String::new(),
            description: String::new(),
            previous_value: None,
            new_value: None,
            success: true,
            error_message: None,
        }
    }

    /// Set the actor's role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.actor_role = role.into();
        self
    }

    /// Set the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the affected entity.
    #[must_use]
    pub fn with_target(
        mut self,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        target_name: impl Into<String>,
    ) -> Self {
        self.target_type = target_type.into();
        self.target_id = target_id.into();
        self.target_name = target_name.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach before/after snapshots.
    #[must_use]
    pub fn with_change(mut self, previous: Option<Value>, new: Option<Value>) -> Self {
        self.previous_value = previous;
        self.new_value = new;
        self
    }

    /// Mark the audited action as failed.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error.into());
        self
    }
}
