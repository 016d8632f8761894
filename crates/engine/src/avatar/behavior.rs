//! Per-variant behavior tuning.

use protocol::BundleSpec;
use rand::Rng;
use std::time::Duration;

/// Weighted idle sub-animation.
#[derive(Debug, Clone, PartialEq)]
pub struct IdleAnimation {
    pub weight: f64,
    pub class_name: String,
}

impl IdleAnimation {
    pub fn new(weight: f64, class_name: impl Into<String>) -> Self {
        Self {
            weight,
            class_name: class_name.into(),
        }
    }
}

/// How an avatar of a given variant behaves.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarBehavior {
    /// Chance of walking on each decision, between 0 and 1.
    pub walk_probability: f64,
    /// Minimum whole seconds between decisions.
    pub wait_minimum: u64,
    /// Maximum whole seconds between decisions (exclusive).
    pub wait_maximum: u64,
    /// Base milliseconds per one-unit walk step.
    pub walk_interval_ms: u64,
    /// Per-avatar jitter applied to `walk_interval_ms`, in milliseconds.
    pub walk_jitter_ms: u64,
    pub idle_animations: Vec<IdleAnimation>,
}

impl Default for AvatarBehavior {
    fn default() -> Self {
        Self {
            walk_probability: 0.25,
            wait_minimum: 5,
            wait_maximum: 17,
            walk_interval_ms: 100,
            walk_jitter_ms: 10,
            idle_animations: Vec::new(),
        }
    }
}

impl AvatarBehavior {
    /// Defaults overridden by whatever a manifest bundle specifies.
    pub fn from_spec(spec: Option<&BundleSpec>) -> Self {
        let mut behavior = Self::default();
        let Some(spec) = spec else {
            return behavior;
        };

        if let Some(p) = spec.walk_probability {
            behavior.walk_probability = p;
        }
        if let Some(min) = spec.wait_minimum {
            behavior.wait_minimum = min;
        }
        if let Some(max) = spec.wait_maximum {
            behavior.wait_maximum = max;
        }
        if let Some(ms) = spec.walk_interval_ms {
            behavior.walk_interval_ms = ms;
        }
        behavior.idle_animations = spec
            .idle_animations
            .iter()
            .map(|a| IdleAnimation::new(a.weight, a.class_name.clone()))
            .collect();
        behavior
    }

    /// Pick an idle animation by weight. `None` means plain idle, which is
    /// what an empty list or an all-zero list produces.
    pub fn pick_idle<R: Rng>(&self, rng: &mut R) -> Option<&IdleAnimation> {
        let total: f64 = self
            .idle_animations
            .iter()
            .map(|a| a.weight.max(0.0))
            .sum();
        if total <= 0.0 {
            return None;
        }

        let roll = rng.random::<f64>() * total;
        let mut current = 0.0;
        for anim in &self.idle_animations {
            let weight = anim.weight.max(0.0);
            if weight > 0.0 && roll < current + weight {
                return Some(anim);
            }
            current += weight;
        }

        // Float rounding can leave roll just past the last boundary.
        self.idle_animations.iter().rev().find(|a| a.weight > 0.0)
    }

    /// Delay before the next decision, in whole seconds from
    /// `[wait_minimum, wait_maximum)`.
    pub fn next_wait<R: Rng>(&self, rng: &mut R) -> Duration {
        let secs = if self.wait_maximum > self.wait_minimum {
            rng.random_range(self.wait_minimum..self.wait_maximum)
        } else {
            self.wait_minimum
        };
        Duration::from_secs(secs)
    }

    /// Walk step interval for a newly mounted avatar; the jitter is drawn
    /// once and kept for the avatar's lifetime.
    pub fn walk_interval<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter = self.walk_jitter_ms.min(self.walk_interval_ms.saturating_sub(1));
        let low = self.walk_interval_ms - jitter;
        let high = self.walk_interval_ms + jitter;
        Duration::from_millis(rng.random_range(low..=high).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weighted_idle_distribution() {
        let behavior = AvatarBehavior {
            idle_animations: vec![IdleAnimation::new(1.0, "a"), IdleAnimation::new(3.0, "b")],
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);

        let (mut a, mut b) = (0u32, 0u32);
        for _ in 0..40_000 {
            match behavior.pick_idle(&mut rng).map(|x| x.class_name.as_str()) {
                Some("a") => a += 1,
                Some("b") => b += 1,
                other => panic!("unexpected pick {other:?}"),
            }
        }

        let ratio = b as f64 / a as f64;
        assert!((2.8..3.2).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn test_empty_and_zero_weights_are_plain_idle() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty = AvatarBehavior::default();
        assert!(empty.pick_idle(&mut rng).is_none());

        let zeros = AvatarBehavior {
            idle_animations: vec![IdleAnimation::new(0.0, "a"), IdleAnimation::new(0.0, "b")],
            ..Default::default()
        };
        assert!(zeros.pick_idle(&mut rng).is_none());
    }

    #[test]
    fn test_zero_weight_entry_never_picked() {
        let behavior = AvatarBehavior {
            idle_animations: vec![IdleAnimation::new(0.0, "never"), IdleAnimation::new(2.0, "always")],
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            assert_eq!(behavior.pick_idle(&mut rng).unwrap().class_name, "always");
        }
    }

    #[test]
    fn test_wait_bounds() {
        let behavior = AvatarBehavior::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let wait = behavior.next_wait(&mut rng).as_secs();
            assert!((5..17).contains(&wait));
        }

        let fixed = AvatarBehavior {
            wait_minimum: 4,
            wait_maximum: 4,
            ..Default::default()
        };
        assert_eq!(fixed.next_wait(&mut rng), Duration::from_secs(4));
    }

    #[test]
    fn test_walk_interval_jitter() {
        let behavior = AvatarBehavior::default();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1_000 {
            let ms = behavior.walk_interval(&mut rng).as_millis();
            assert!((90..=110).contains(&ms));
        }
    }

    #[test]
    fn test_from_spec_overrides() {
        let spec = BundleSpec {
            id: "robot".to_string(),
            walk_probability: Some(0.9),
            wait_maximum: Some(30),
            idle_animations: vec![protocol::IdleAnimationSpec {
                weight: 2.0,
                class_name: "beep".to_string(),
            }],
            ..Default::default()
        };
        let behavior = AvatarBehavior::from_spec(Some(&spec));
        assert_eq!(behavior.walk_probability, 0.9);
        assert_eq!(behavior.wait_minimum, 5);
        assert_eq!(behavior.wait_maximum, 30);
        assert_eq!(behavior.idle_animations, vec![IdleAnimation::new(2.0, "beep")]);
    }
}
