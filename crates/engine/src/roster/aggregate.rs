//! Chatter aggregation.

use indexmap::IndexMap;
use protocol::RosterGroups;
use std::collections::BTreeSet;

/// A participant and the tag groups it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chatter {
    pub user: String,
    pub tags: BTreeSet<String>,
}

impl Chatter {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            tags: BTreeSet::new(),
        }
    }
}

/// Participant -> chatter, in first-seen order.
pub type Chatters = IndexMap<String, Chatter>;

/// Fold roster groups into per-participant tag sets.
///
/// Only the first `limit` groups, in source order, are considered. Excluded
/// participants are skipped entirely. The result is built from scratch; it is
/// meant to replace the previous aggregation, not merge into it.
pub fn aggregate(groups: &RosterGroups, limit: usize, exclude: &[String]) -> Chatters {
    let mut result = Chatters::new();

    for (tag, members) in groups.iter().take(limit) {
        for user in members {
            if exclude.iter().any(|e| e == user) {
                continue;
            }
            result
                .entry(user.clone())
                .or_insert_with(|| Chatter::new(user.clone()))
                .tags
                .insert(tag.clone());
        }
    }

    result
}
