//! Render frames pushed to the overlay page.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Horizontal facing of a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Left,
    Right,
}

impl Facing {
    pub fn class(self) -> &'static str {
        match self {
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }
}

/// What a sprite is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    #[default]
    Idle,
    Walking,
}

impl Activity {
    pub fn class(self) -> &'static str {
        match self {
            Activity::Idle => "idle",
            Activity::Walking => "walking",
        }
    }
}

/// One avatar as the overlay should draw it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AvatarView {
    /// Participant identifier, shown as the label.
    pub user: String,
    /// Variant key, e.g. `avatar-bird`.
    pub variant: String,
    /// Left offset in pixels.
    pub x: i32,
    pub facing: Facing,
    pub activity: Activity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    /// Full CSS class list for the avatar element.
    pub class: String,
}

impl AvatarView {
    /// Build the CSS class list: `avatar <variant> <activity> <facing> [animation]`.
    pub fn class_list(
        variant: &str,
        activity: Activity,
        facing: Facing,
        animation: Option<&str>,
    ) -> String {
        let mut class = format!(
            "avatar {} {} {}",
            variant,
            activity.class(),
            facing.class()
        );
        if let Some(anim) = animation {
            class.push(' ');
            class.push_str(anim);
        }
        class
    }
}

/// Snapshot of every displayed avatar.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Frame {
    pub avatars: Vec<AvatarView>,
    /// Stylesheets of every registered variant.
    pub stylesheets: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restricted: IndexMap<String, serde_json::Value>,
}
