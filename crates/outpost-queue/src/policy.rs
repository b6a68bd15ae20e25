//! The capture decision.
//!
//! Pure functions of the candidate and the current policy. Callers fetch the
//! policy afresh on every capture so runtime updates apply immediately.

use std::fmt;

use outpost_config::RetentionPolicy;
use outpost_core::{EventKind, Severity};
use serde::{Deserialize, Serialize};

/// Why a candidate was not captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RejectReason {
    /// Capture is switched off.
    Disabled,
    /// The audit record's severity is under the threshold.
    BelowMinimumSeverity {
        /// The record's level.
        severity: Severity,
        /// The configured threshold.
        minimum: Severity,
    },
    /// The category is excluded.
    ExcludedModule {
        /// The excluded category.
        module: String,
    },
    /// The action is excluded.
    ExcludedAction {
        /// The excluded action.
        action: String,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("capture disabled"),
            Self::BelowMinimumSeverity { severity, minimum } => {
                write!(f, "severity {severity} below minimum {minimum}")
            },
            Self::ExcludedModule { module } => write!(f, "module '{module}' excluded"),
            Self::ExcludedAction { action } => write!(f, "action '{action}' excluded"),
        }
    }
}

/// Decide whether `candidate` is captured under `policy`.
///
/// # Errors
///
/// Returns the first rule that declines the candidate, checked in order:
/// enabled flag, severity (audit records only), module, action.
pub fn evaluate(candidate: &EventKind, policy: &RetentionPolicy) -> Result<(), RejectReason> {
    if !policy.enabled {
        return Err(RejectReason::Disabled);
    }

    if let Some(severity) = candidate.severity()
        && !severity.at_least(policy.minimum_severity)
    {
        return Err(RejectReason::BelowMinimumSeverity {
            severity,
            minimum: policy.minimum_severity,
        });
    }

    let module = candidate.category();
    if policy.excluded_modules.contains(module) {
        return Err(RejectReason::ExcludedModule {
            module: module.to_owned(),
        });
    }

    let action = candidate.action();
    if policy.excluded_actions.contains(action) {
        return Err(RejectReason::ExcludedAction {
            action: action.to_owned(),
        });
    }

    Ok(())
}

/// `true` when [`evaluate`] accepts the candidate.
#[must_use]
pub fn should_capture(candidate: &EventKind, policy: &RetentionPolicy) -> bool {
    evaluate(candidate, policy).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::{AuditRecord, DeferredOperation, ResourceKind};
    use serde_json::json;

    fn audit(module: &str, action: &str, severity: Severity) -> EventKind {
        EventKind::Audit(AuditRecord::new("u-1", "Ana", module, action).with_severity(severity))
    }

    #[test]
    fn test_disabled_rejects_everything() {
        let policy = RetentionPolicy::default().disabled();
        for severity in Severity::ALL {
            assert_eq!(
                evaluate(&audit("sales", "create", severity), &policy),
                Err(RejectReason::Disabled)
            );
        }
        let op = EventKind::Operation(DeferredOperation::create(
            ResourceKind::Products,
            json!({}),
        ));
        assert!(!should_capture(&op, &policy));
    }

    #[test]
    fn test_severity_threshold_is_exact() {
        for minimum in Severity::ALL {
            let policy = RetentionPolicy::default().with_minimum_severity(minimum);
            for severity in Severity::ALL {
                assert_eq!(
                    should_capture(&audit("sales", "create", severity), &policy),
                    severity >= minimum,
                    "severity {severity} vs minimum {minimum}"
                );
            }
        }
    }

    #[test]
    fn test_warning_minimum_rejects_info_and_accepts_error() {
        let policy = RetentionPolicy::default().with_minimum_severity(Severity::Warning);
        assert!(matches!(
            evaluate(&audit("sales", "view", Severity::Info), &policy),
            Err(RejectReason::BelowMinimumSeverity { .. })
        ));
        assert!(should_capture(&audit("sales", "view", Severity::Error), &policy));
    }

    #[test]
    fn test_each_filter_is_independently_necessary() {
        let policy = RetentionPolicy::default()
            .with_minimum_severity(Severity::Warning)
            .excluding_module("payroll")
            .excluding_action("export");

        // Passes severity, blocked by module.
        assert_eq!(
            evaluate(&audit("payroll", "approve", Severity::Critical), &policy),
            Err(RejectReason::ExcludedModule {
                module: "payroll".into()
            })
        );
        // Passes severity and module, blocked by action.
        assert_eq!(
            evaluate(&audit("sales", "export", Severity::Error), &policy),
            Err(RejectReason::ExcludedAction {
                action: "export".into()
            })
        );
        // Passes everything.
        assert!(should_capture(&audit("sales", "void", Severity::Warning), &policy));
    }

    #[test]
    fn test_operations_skip_severity_but_honor_exclusions() {
        let policy = RetentionPolicy::default()
            .with_minimum_severity(Severity::Critical)
            .excluding_module("inventory")
            .excluding_action("delete");

        let create = EventKind::Operation(DeferredOperation::create(
            ResourceKind::Products,
            json!({"sku": "X"}),
        ));
        assert!(should_capture(&create, &policy));

        let stock = EventKind::Operation(DeferredOperation::create(
            ResourceKind::Inventory,
            json!({}),
        ));
        assert!(!should_capture(&stock, &policy));

        let delete = EventKind::Operation(DeferredOperation::delete(ResourceKind::Products, "1"));
        assert!(!should_capture(&delete, &policy));
    }

    #[test]
    fn test_reason_display() {
        let reason = RejectReason::BelowMinimumSeverity {
            severity: Severity::Info,
            minimum: Severity::Warning,
        };
        assert_eq!(reason.to_string(), "severity info below minimum warning");
    }
}
