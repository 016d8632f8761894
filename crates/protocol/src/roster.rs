//! Chat roster snapshots.

use indexmap::IndexMap;
use serde_json::Value;

use crate::ProtocolError;

/// Participants grouped by membership tag, in the order the source listed
/// the groups.
pub type RosterGroups = IndexMap<String, Vec<String>>;

/// A decoded roster snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    /// Tag group name -> participant identifiers.
    pub groups: RosterGroups,
    /// Set when the payload was valid JSON but did not carry a usable
    /// `chatters` object. The snapshot is empty in that case.
    pub malformed: bool,
}

impl RosterSnapshot {
    pub fn new(groups: RosterGroups) -> Self {
        Self {
            groups,
            malformed: false,
        }
    }

    /// Decode a roster endpoint response.
    ///
    /// Only invalid JSON is an error. A payload without a `chatters` object
    /// decodes to an empty, `malformed` snapshot; groups that are not arrays
    /// are dropped and non-string entries inside a group are ignored.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;

        let Some(Value::Object(chatters)) = value.get("chatters") else {
            return Ok(Self {
                groups: RosterGroups::new(),
                malformed: true,
            });
        };

        let mut groups = RosterGroups::with_capacity(chatters.len());
        let mut malformed = false;
        for (tag, members) in chatters {
            match members {
                Value::Array(items) => {
                    let ids = items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect::<Vec<_>>();
                    if ids.len() != items.len() {
                        malformed = true;
                    }
                    groups.insert(tag.clone(), ids);
                }
                _ => malformed = true,
            }
        }

        Ok(Self { groups, malformed })
    }

    /// Total number of entries across all groups, duplicates included.
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}
