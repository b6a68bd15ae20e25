//! Aggregate statistics.

use std::collections::{BTreeMap, HashMap};

use outpost_core::{QueuedEvent, Severity};
use serde::Serialize;

/// Number of events attributed to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorCount {
    /// Actor ID.
    pub actor_id: String,
    /// Display name from the first event seen for the actor.
    pub actor_name: String,
    /// Events attributed.
    pub count: usize,
}

/// Counts over a list of events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    /// Events counted.
    pub total: usize,
    /// Events per category.
    pub by_category: BTreeMap<String, usize>,
    /// Events per action.
    pub by_action: BTreeMap<String, usize>,
    /// Audit records per severity. Every level is present.
    pub by_severity: BTreeMap<Severity, usize>,
    /// Audit records with `success == false`.
    pub failures: usize,
    /// Actors by event count, descending; ties keep first-seen order.
    pub top_actors: Vec<ActorCount>,
}

fn bump<K: Ord>(map: &mut BTreeMap<K, usize>, key: K) {
    let slot = map.entry(key).or_insert(0);
    *slot = slot.saturating_add(1);
}

/// Compute statistics over `events`.
#[must_use]
pub fn stats(events: &[QueuedEvent]) -> EventStats {
    let mut out = EventStats {
        total: events.len(),
        by_severity: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
        ..EventStats::default()
    };

    let mut actor_slot: HashMap<&str, usize> = HashMap::new();
    for event in events {
        bump(&mut out.by_category, event.kind.category().to_owned());
        bump(&mut out.by_action, event.kind.action().to_owned());

        let Some(record) = event.kind.as_audit() else {
            continue;
        };
        bump(&mut out.by_severity, record.severity);
        if !record.success {
            out.failures = out.failures.saturating_add(1);
        }

        match actor_slot.get(record.actor_id.as_str()) {
            Some(&slot) => {
                if let Some(actor) = out.top_actors.get_mut(slot) {
                    actor.count = actor.count.saturating_add(1);
                }
            },
            None => {
                actor_slot.insert(&record.actor_id, out.top_actors.len());
                out.top_actors.push(ActorCount {
                    actor_id: record.actor_id.clone(),
                    actor_name: record.actor_name.clone(),
                    count: 1,
                });
            },
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    out.top_actors.sort_by(|a, b| b.count.cmp(&a.count));
    out
}
