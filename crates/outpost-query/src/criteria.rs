//! Conjunctive event filter.

use outpost_core::{QueuedEvent, Severity, Timestamp};
use serde::{Deserialize, Serialize};

/// How a severity criterion compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "severity", rename_all = "snake_case")]
pub enum SeverityMatch {
    /// Exactly this level.
    Exactly(Severity),
    /// This level or higher.
    AtLeast(Severity),
}

impl SeverityMatch {
    fn accepts(self, severity: Severity) -> bool {
        match self {
            Self::Exactly(level) => severity == level,
            Self::AtLeast(level) => severity.at_least(level),
        }
    }
}

/// Filter criteria. Unset fields match everything; set fields must all
/// match.
///
/// Actor, severity, target, success and text criteria only match audit
/// records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCriteria {
    /// Inclusive lower bound on `created_at`.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<Timestamp>,
    /// Acting user ID.
    pub actor_id: Option<String>,
    /// Category tag.
    pub category: Option<String>,
    /// Action tag.
    pub action: Option<String>,
    /// Severity comparison.
    pub severity: Option<SeverityMatch>,
    /// Target entity type.
    pub target_type: Option<String>,
    /// Target entity ID.
    pub target_id: Option<String>,
    /// Success flag.
    pub success: Option<bool>,
    /// Case-insensitive substring of description, actor name or target name.
    pub text: Option<String>,
}

impl EventCriteria {
    /// Match everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `created_at >= from`.
    #[must_use]
    pub fn since(mut self, from: Timestamp) -> Self {
        self.from = Some(from);
        self
    }

    /// Restrict to `created_at <= to`.
    #[must_use]
    pub fn until(mut self, to: Timestamp) -> Self {
        self.to = Some(to);
        self
    }

    /// Restrict to one actor.
    #[must_use]
    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Restrict to one category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restrict to one action.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Restrict to exactly `severity`.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(SeverityMatch::Exactly(severity));
        self
    }

    /// Restrict to `severity` and above.
    #[must_use]
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(SeverityMatch::AtLeast(severity));
        self
    }

    /// Restrict to one target entity. An empty `target_id` matches any ID
    /// of that type.
    #[must_use]
    pub fn target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        let id = target_id.into();
        self.target_id = (!id.is_empty()).then_some(id);
        self
    }

    /// Restrict by success flag.
    #[must_use]
    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Free-text search.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn needs_audit(&self) -> bool {
        self.actor_id.is_some()
            || self.severity.is_some()
            || self.target_type.is_some()
            || self.target_id.is_some()
            || self.success.is_some()
            || self.text.is_some()
    }

    /// Whether `event` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, event: &QueuedEvent) -> bool {
        if self.from.is_some_and(|from| event.created_at < from)
            || self.to.is_some_and(|to| event.created_at > to)
        {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|c| event.kind.category() != c)
            || self
                .action
                .as_deref()
                .is_some_and(|a| event.kind.action() != a)
        {
            return false;
        }

        let Some(record) = event.kind.as_audit() else {
            return !self.needs_audit();
        };

        let eq = |want: &Option<String>, have: &str| want.as_deref().is_none_or(|w| w == have);
        if !eq(&self.actor_id, &record.actor_id)
            || !eq(&self.target_type, &record.target_type)
            || !eq(&self.target_id, &record.target_id)
        {
            return false;
        }
        if self.severity.is_some_and(|m| !m.accepts(record.severity)) {
            return false;
        }
        if self.success.is_some_and(|s| s != record.success) {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let found = [
                &record.description,
                &record.actor_name,
                &record.target_name,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

/// Events matching `criteria`, in input order.
#[must_use]
pub fn filter(events: &[QueuedEvent], criteria: &EventCriteria) -> Vec<QueuedEvent> {
    events
        .iter()
        .filter(|e| criteria.matches(e))
        .cloned()
        .collect()
}
