//! Shared payload crate for stream-avatars.
//!
//! This crate contains:
//! - Roster snapshot decoding (lenient about malformed payloads)
//! - Pre-assigned variant choices
//! - The avatar asset manifest
//! - Render frames sent to the overlay page

mod choices;
mod error;
mod frame;
mod manifest;
mod roster;

pub use choices::Choices;
pub use error::ProtocolError;
pub use frame::{Activity, AvatarView, Facing, Frame};
pub use manifest::{BundleEntry, BundleSpec, IdleAnimationSpec, Manifest};
pub use roster::{RosterGroups, RosterSnapshot};

/// Prefix shared by every variant key.
pub const VARIANT_PREFIX: &str = "avatar-";

/// Variant key for a bundle identifier, e.g. `bird` -> `avatar-bird`.
pub fn variant_key(bundle: &str) -> String {
    format!("{VARIANT_PREFIX}{bundle}")
}

/// Sub-identifier of a variant key, e.g. `avatar-bird` -> `bird`.
pub fn variant_sub_id(key: &str) -> &str {
    key.strip_prefix(VARIANT_PREFIX).unwrap_or(key)
}
