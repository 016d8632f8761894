//! Pre-assigned variant choices (bot mode).

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::kind_of;
use crate::ProtocolError;

/// Participant -> variant selector, e.g. `"alice" -> "bird"` selects the
/// `avatar-bird` variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choices(pub IndexMap<String, String>);

impl Choices {
    /// Decode a choices endpoint response. Selectors may be strings or
    /// numbers; any other value is skipped.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(entries) = value else {
            return Err(ProtocolError::NotAnObject(kind_of(&value)));
        };

        let choices = entries
            .into_iter()
            .filter_map(|(user, selector)| match selector {
                Value::String(s) => Some((user, s)),
                Value::Number(n) => Some((user, n.to_string())),
                _ => None,
            })
            .collect();

        Ok(Self(choices))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
