//! Avatar set reconciliation.

use super::Chatters;
use crate::avatar::Avatar;
use crate::registry::VariantRegistry;
use indexmap::IndexMap;
use rand::Rng;
use tracing::debug;

/// Participant -> displayed avatar.
pub type AvatarMap = IndexMap<String, Avatar>;

/// What one reconciliation changed.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Avatars taken off the stage; their tokens are already revoked.
    pub removed: Vec<Avatar>,
    /// Avatars created this cycle, still waiting for an animator.
    pub added: Vec<Avatar>,
    /// Participants left without an avatar because no variant was eligible.
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Monotonic source of avatar generations.
#[derive(Debug, Default)]
pub struct Generations(u64);

impl Generations {
    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

/// Build the avatar map that matches `chatters`.
///
/// Avatars of departed participants are dropped (and revoked) before any new
/// avatar is created. Participants that already own an avatar keep it
/// untouched. New avatars get a uniformly random variant whose sub-identifier
/// is not in `exclude_random`; when none is eligible the participant is
/// skipped for this cycle.
pub fn reconcile<R: Rng>(
    current: &AvatarMap,
    chatters: &Chatters,
    registry: &VariantRegistry,
    exclude_random: &[String],
    generations: &mut Generations,
    rng: &mut R,
) -> (AvatarMap, ReconcileReport) {
    let mut report = ReconcileReport::default();
    let mut next = AvatarMap::with_capacity(chatters.len());

    // Removal pass.
    for (user, avatar) in current {
        if chatters.contains_key(user) {
            next.insert(user.clone(), avatar.clone());
        } else {
            avatar.token.revoke();
            report.removed.push(avatar.clone());
        }
    }

    // Addition pass.
    for user in chatters.keys() {
        if next.contains_key(user) {
            continue;
        }
        let Some(variant) = registry.choose(exclude_random, rng) else {
            debug!("No eligible variant for {}, skipping this cycle", user);
            report.skipped.push(user.clone());
            continue;
        };
        let avatar = Avatar::new(user.clone(), variant.key.clone(), generations.next());
        next.insert(user.clone(), avatar.clone());
        report.added.push(avatar);
    }

    (next, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::AvatarBehavior;
    use crate::registry::{RegistryBuilder, Variant};
    use crate::roster::Chatter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn registry(keys: &[&str]) -> Arc<VariantRegistry> {
        let mut builder = RegistryBuilder::new();
        for key in keys {
            builder.register(Variant::new(*key, AvatarBehavior::default()));
        }
        builder.finish()
    }

    fn chatters(users: &[&str]) -> Chatters {
        users
            .iter()
            .map(|u| (u.to_string(), Chatter::new(*u)))
            .collect()
    }

    fn keys(map: &AvatarMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_adds_avatars_for_new_chatters() {
        let registry = registry(&["avatar-bird"]);
        let mut generations = Generations::default();
        let mut rng = StdRng::seed_from_u64(1);

        let (map, report) = reconcile(
            &AvatarMap::new(),
            &chatters(&["alice", "bob"]),
            &registry,
            &[],
            &mut generations,
            &mut rng,
        );

        assert_eq!(keys(&map), vec!["alice", "bob"]);
        assert_eq!(report.added.len(), 2);
        for avatar in map.values() {
            assert_eq!(avatar.variant, "avatar-bird");
            assert!(!avatar.existing);
            assert_eq!(avatar.live.frame().x, 0);
            assert!(avatar.is_alive());
        }
        assert_ne!(map["alice"].generation(), map["bob"].generation());
    }

    #[test]
    fn test_departed_chatter_is_removed_and_others_untouched() {
        let registry = registry(&["avatar-bird", "avatar-robot"]);
        let mut generations = Generations::default();
        let mut rng = StdRng::seed_from_u64(2);

        let (first, _) = reconcile(
            &AvatarMap::new(),
            &chatters(&["alice", "bob"]),
            &registry,
            &[],
            &mut generations,
            &mut rng,
        );
        first["alice"].live.memory.write(140);
        let bob = first["bob"].clone();

        let (second, report) = reconcile(
            &first,
            &chatters(&["alice"]),
            &registry,
            &[],
            &mut generations,
            &mut rng,
        );

        assert_eq!(keys(&second), vec!["alice"]);
        assert_eq!(report.removed.len(), 1);
        assert!(report.added.is_empty());
        assert!(!bob.is_alive());

        let alice = &second["alice"];
        assert_eq!(alice.generation(), first["alice"].generation());
        assert_eq!(alice.variant, first["alice"].variant);
        assert_eq!(alice.live.memory.read(), Some(140));
        assert!(alice.is_alive());
    }

    #[test]
    fn test_second_pass_is_a_noop() {
        let registry = registry(&["avatar-bird", "avatar-robot", "avatar-cat"]);
        let mut generations = Generations::default();
        let mut rng = StdRng::seed_from_u64(3);
        let roster = chatters(&["alice", "bob", "carol"]);

        let (first, _) = reconcile(&AvatarMap::new(), &roster, &registry, &[], &mut generations, &mut rng);
        let (second, report) = reconcile(&first, &roster, &registry, &[], &mut generations, &mut rng);

        assert!(report.is_noop());
        assert_eq!(keys(&first), keys(&second));
        for (user, avatar) in &second {
            assert_eq!(avatar.generation(), first[user].generation());
            assert_eq!(avatar.variant, first[user].variant);
        }
    }

    #[test]
    fn test_empty_registry_skips_quietly() {
        let registry = registry(&[]);
        let mut generations = Generations::default();
        let mut rng = StdRng::seed_from_u64(4);

        let (map, report) = reconcile(
            &AvatarMap::new(),
            &chatters(&["alice"]),
            &registry,
            &[],
            &mut generations,
            &mut rng,
        );

        assert!(map.is_empty());
        assert_eq!(report.skipped, vec!["alice"]);
    }

    #[test]
    fn test_excluded_variants_never_assigned() {
        let registry = registry(&["avatar-hide", "avatar-bird"]);
        let mut generations = Generations::default();
        let mut rng = StdRng::seed_from_u64(5);
        let users: Vec<String> = (0..200).map(|i| format!("user{i}")).collect();
        let roster: Chatters = users
            .iter()
            .map(|u| (u.clone(), Chatter::new(u.clone())))
            .collect();

        let (map, _) = reconcile(
            &AvatarMap::new(),
            &roster,
            &registry,
            &["hide".to_string()],
            &mut generations,
            &mut rng,
        );

        assert_eq!(map.len(), 200);
        assert!(map.values().all(|a| a.variant == "avatar-bird"));
    }
}
