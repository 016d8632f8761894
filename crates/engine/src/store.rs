//! Central state container.
//!
//! The store is owned explicitly and shared as [`SharedStore`]. Every
//! mutation swaps in a whole new map, so readers holding an `Arc` from before
//! the swap keep a consistent view.

use crate::avatar::Avatar;
use crate::config::Config;
use crate::registry::VariantRegistry;
use crate::roster::{aggregate, reconcile, AvatarMap, Chatters, Generations, ReconcileReport};
use indexmap::IndexMap;
use protocol::{variant_key, Choices, Frame, Manifest, RosterSnapshot};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub type SharedStore = Arc<RwLock<Store>>;

#[derive(Debug)]
pub struct Store {
    /// Maximum number of tag groups aggregated per snapshot.
    avatar_limit: usize,
    exclude_chatters: Vec<String>,
    exclude_random: Vec<String>,
    restricted: IndexMap<String, serde_json::Value>,
    chatters: Arc<Chatters>,
    avatars: Arc<AvatarMap>,
    generations: Generations,
}

impl Store {
    pub fn new(config: &Config) -> Self {
        Self {
            avatar_limit: config.roster.avatar_limit,
            exclude_chatters: config.roster.exclude_chatters.clone(),
            exclude_random: config.assets.exclude_random.clone(),
            restricted: IndexMap::new(),
            chatters: Arc::new(Chatters::new()),
            avatars: Arc::new(AvatarMap::new()),
            generations: Generations::default(),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn chatters(&self) -> Arc<Chatters> {
        Arc::clone(&self.chatters)
    }

    pub fn avatars(&self) -> Arc<AvatarMap> {
        Arc::clone(&self.avatars)
    }

    pub fn avatar(&self, user: &str) -> Option<&Avatar> {
        self.avatars.get(user)
    }

    pub fn exclude_random(&self) -> &[String] {
        &self.exclude_random
    }

    pub fn restricted(&self) -> &IndexMap<String, serde_json::Value> {
        &self.restricted
    }

    pub fn set_exclude_random(&mut self, exclude: Vec<String>) {
        self.exclude_random = exclude;
    }

    pub fn set_restricted(&mut self, restricted: IndexMap<String, serde_json::Value>) {
        self.restricted = restricted;
    }

    /// Take over the manifest's exclusion list and restricted set, where
    /// present.
    pub fn apply_manifest(&mut self, manifest: &Manifest) {
        if let Some(exclude) = &manifest.exclude_random {
            self.set_exclude_random(exclude.clone());
        }
        if let Some(restricted) = &manifest.restricted {
            self.set_restricted(restricted.clone());
        }
    }

    /// Replace the chatter set with the aggregation of `snapshot`.
    pub fn set_chatters(&mut self, snapshot: &RosterSnapshot) {
        let chatters = aggregate(&snapshot.groups, self.avatar_limit, &self.exclude_chatters);
        debug!(
            "Aggregated {} chatters from {} groups",
            chatters.len(),
            snapshot.groups.len()
        );
        self.chatters = Arc::new(chatters);
    }

    /// Bring the avatar set in line with the current chatters.
    pub fn update_avatars<R: Rng>(
        &mut self,
        registry: &VariantRegistry,
        rng: &mut R,
    ) -> ReconcileReport {
        let (avatars, report) = reconcile(
            &self.avatars,
            &self.chatters,
            registry,
            &self.exclude_random,
            &mut self.generations,
            rng,
        );
        if !report.is_noop() {
            info!(
                "Avatars: {} added, {} removed, {} on stage",
                report.added.len(),
                report.removed.len(),
                avatars.len()
            );
            self.avatars = Arc::new(avatars);
        }
        if !report.skipped.is_empty() {
            debug!("{} chatters are waiting for a variant", report.skipped.len());
        }
        report
    }

    /// Apply externally chosen variants.
    ///
    /// A participant whose choice differs from its current variant gets a
    /// replacement avatar that restores the old one's position. Returns the
    /// replacements, which still need animators.
    pub fn apply_choices(&mut self, choices: &Choices, registry: &VariantRegistry) -> Vec<Avatar> {
        let mut replacements = Vec::new();
        let mut avatars = (*self.avatars).clone();

        for (user, selector) in choices.iter() {
            let Some(current) = avatars.get(user) else {
                warn!("Choice for {} ignored, no avatar on stage", user);
                continue;
            };
            let key = variant_key(selector);
            if !registry.contains(&key) {
                warn!("Choice for {} ignored, unknown variant {}", user, key);
                continue;
            }
            if current.variant == key {
                continue;
            }

            let replacement = current.succeed(key, self.generations.next());
            current.token.revoke();
            debug!(
                "{} switches from {} to {}",
                user, current.variant, replacement.variant
            );
            avatars.insert(user.to_string(), replacement.clone());
            replacements.push(replacement);
        }

        if !replacements.is_empty() {
            self.avatars = Arc::new(avatars);
        }
        replacements
    }

    /// Render view of every avatar that has been mounted.
    pub fn frame(&self, registry: &VariantRegistry) -> Frame {
        Frame {
            avatars: self
                .avatars
                .values()
                .filter(|a| a.live.frame().mounted)
                .map(Avatar::view)
                .collect(),
            stylesheets: registry.stylesheets(),
            restricted: self.restricted.clone(),
        }
    }
}
