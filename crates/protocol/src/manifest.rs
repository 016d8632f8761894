//! Avatar asset manifest, loaded once at startup.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Top-level manifest document.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Asset bundles to register, in registration order.
    #[serde(default)]
    pub avatars: Vec<BundleEntry>,
    /// Variant sub-identifiers never chosen at random.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_random: Option<Vec<String>>,
    /// Restricted-set configuration, passed through to renderers untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted: Option<IndexMap<String, serde_json::Value>>,
}

/// A bundle is either a bare identifier or an identifier with behavior
/// overrides.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BundleEntry {
    Id(String),
    Detailed(BundleSpec),
}

impl BundleEntry {
    pub fn id(&self) -> &str {
        match self {
            BundleEntry::Id(id) => id,
            BundleEntry::Detailed(spec) => &spec.id,
        }
    }

    /// Behavior overrides, if any were given.
    pub fn spec(&self) -> Option<&BundleSpec> {
        match self {
            BundleEntry::Id(_) => None,
            BundleEntry::Detailed(spec) => Some(spec),
        }
    }
}

/// Per-bundle behavior overrides. Unset fields fall back to the engine's
/// defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    pub id: String,
    /// Chance of walking on each decision, between 0 and 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_probability: Option<f64>,
    /// Minimum seconds between decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_minimum: Option<u64>,
    /// Maximum seconds between decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_maximum: Option<u64>,
    /// Milliseconds per one-unit walk step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_interval_ms: Option<u64>,
    #[serde(default)]
    pub idle_animations: Vec<IdleAnimationSpec>,
}

/// Weighted idle animation as written in the manifest.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdleAnimationSpec {
    pub weight: f64,
    pub class_name: String,
}

impl Manifest {
    /// Decode and validate a manifest document.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let manifest: Manifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        for entry in &self.avatars {
            let id = entry.id();
            // Bundle ids become asset path segments.
            if id.is_empty()
                || id.contains(['/', '\\'])
                || id == "."
                || id == ".."
            {
                return Err(ProtocolError::InvalidManifest(format!(
                    "invalid bundle id {id:?}"
                )));
            }

            let Some(spec) = entry.spec() else {
                continue;
            };
            if let Some(p) = spec.walk_probability {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ProtocolError::InvalidManifest(format!(
                        "bundle {id}: walkProbability {p} outside [0, 1]"
                    )));
                }
            }
            if let (Some(min), Some(max)) = (spec.wait_minimum, spec.wait_maximum) {
                if min > max {
                    return Err(ProtocolError::InvalidManifest(format!(
                        "bundle {id}: waitMinimum {min} exceeds waitMaximum {max}"
                    )));
                }
            }
            for anim in &spec.idle_animations {
                if !anim.weight.is_finite() || anim.weight < 0.0 {
                    return Err(ProtocolError::InvalidManifest(format!(
                        "bundle {id}: animation {} has invalid weight {}",
                        anim.class_name, anim.weight
                    )));
                }
            }
        }
        Ok(())
    }
}
