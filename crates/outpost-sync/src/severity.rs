//! Severity for remote records that carry none.

use outpost_core::Severity;

const CRITICAL: &[&str] = &["breach", "violation", "unauthorized"];
const ERROR: &[&str] = &["fail", "error", "reject"];
const WARNING: &[&str] = &["delete", "remove", "void", "refund"];

/// Infer a severity from an action name.
///
/// Matching is case-insensitive on substrings; the most severe match wins.
#[must_use]
pub fn infer_severity(action: &str) -> Severity {
    let action = action.to_ascii_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| action.contains(w));

    if hit(CRITICAL) {
        Severity::Critical
    } else if hit(ERROR) {
        Severity::Error
    } else if hit(WARNING) {
        Severity::Warning
    } else {
        Severity::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(infer_severity("invoice.void"), Severity::Warning);
        assert_eq!(infer_severity("DELETE_PRODUCT"), Severity::Warning);
        assert_eq!(infer_severity("login_failed"), Severity::Error);
        assert_eq!(infer_severity("unauthorized_access"), Severity::Critical);
        assert_eq!(infer_severity("view"), Severity::Info);
    }

    #[test]
    fn test_most_severe_wins() {
        assert_eq!(infer_severity("refund_rejected"), Severity::Error);
        assert_eq!(infer_severity("delete_after_breach"), Severity::Critical);
    }
}
