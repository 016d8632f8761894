//! Registry of avatar variants.
//!
//! Variants are registered once at startup and the finished registry is
//! shared read-only afterwards.

use crate::avatar::AvatarBehavior;
use protocol::{variant_key, variant_sub_id, Manifest};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// One registered avatar kind.
#[derive(Debug, Clone)]
pub struct Variant {
    /// Key such as `avatar-bird`.
    pub key: String,
    /// Stylesheets the overlay must load for this variant.
    pub stylesheets: Vec<String>,
    pub behavior: Arc<AvatarBehavior>,
}

impl Variant {
    pub fn new(key: impl Into<String>, behavior: AvatarBehavior) -> Self {
        Self {
            key: key.into(),
            stylesheets: Vec::new(),
            behavior: Arc::new(behavior),
        }
    }

    /// Key without the `avatar-` prefix.
    pub fn sub_id(&self) -> &str {
        variant_sub_id(&self.key)
    }
}

/// Collects variants during the registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    variants: Vec<Variant>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variant. Returns false, leaving the first registration in
    /// place, if the key is already known.
    pub fn register(&mut self, variant: Variant) -> bool {
        if self.variants.iter().any(|v| v.key == variant.key) {
            debug!("Variant {} already registered", variant.key);
            return false;
        }
        self.variants.push(variant);
        true
    }

    /// Register every bundle listed in a manifest. Bundle `<id>` becomes
    /// variant `avatar-<id>` with stylesheet `avatars/<id>/avatar.css`.
    pub fn register_manifest(&mut self, manifest: &Manifest) -> usize {
        let mut added = 0;
        for entry in &manifest.avatars {
            let id = entry.id();
            let mut variant = Variant::new(variant_key(id), AvatarBehavior::from_spec(entry.spec()));
            variant.stylesheets.push(format!("avatars/{id}/avatar.css"));
            if self.register(variant) {
                added += 1;
            }
        }
        added
    }

    pub fn finish(self) -> Arc<VariantRegistry> {
        info!("Registered {} avatar variants", self.variants.len());
        Arc::new(VariantRegistry {
            variants: self.variants,
        })
    }
}

/// Immutable set of registered variants.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    variants: Vec<Variant>,
}

impl VariantRegistry {
    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    /// Every stylesheet of every variant, in registration order.
    pub fn stylesheets(&self) -> Vec<String> {
        self.variants
            .iter()
            .flat_map(|v| v.stylesheets.iter().cloned())
            .collect()
    }

    /// Uniformly random variant whose sub-identifier is not excluded.
    pub fn choose<R: Rng>(&self, exclude: &[String], rng: &mut R) -> Option<&Variant> {
        let eligible: Vec<&Variant> = self
            .variants
            .iter()
            .filter(|v| !exclude.iter().any(|e| e == v.sub_id()))
            .collect();
        eligible.choose(rng).copied()
    }
}
