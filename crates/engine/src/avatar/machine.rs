//! Idle/walk state machine for a single avatar.
//!
//! The machine only decides; sleeping between decisions and publishing the
//! resulting frames is the driver's job.

use super::{Avatar, AvatarBehavior, SpriteFrame};
use crate::config::StageConfig;
use protocol::{Activity, Facing};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a decision tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Start walking toward `destination`, one unit per walk step.
    Walk { destination: i32 },
    /// Stay put, optionally playing `animation`, and decide again after
    /// `next_tick`.
    Idle {
        animation: Option<String>,
        next_tick: Duration,
    },
}

/// Outcome of a walk step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    /// Moved one unit, now at the given coordinate.
    Moved(i32),
    /// Destination reached (or nothing to walk to); the machine is idle again.
    Arrived,
}

#[derive(Debug, Clone)]
pub struct AvatarMachine {
    behavior: Arc<AvatarBehavior>,
    stage: StageConfig,
    frame: SpriteFrame,
    destination: Option<i32>,
    restored: bool,
}

impl AvatarMachine {
    /// Place an avatar for the first time.
    ///
    /// A pre-existing avatar with a remembered coordinate goes back there;
    /// anything else gets a random coordinate. Facing is a coin flip.
    pub fn mount<R: Rng>(
        avatar: &Avatar,
        behavior: Arc<AvatarBehavior>,
        stage: StageConfig,
        rng: &mut R,
    ) -> Self {
        let remembered = if avatar.existing {
            avatar.live.memory.read()
        } else {
            None
        };

        let x = match remembered {
            Some(x) => x,
            None => random_x(stage, rng),
        };
        let facing = if rng.random_bool(0.5) {
            Facing::Right
        } else {
            Facing::Left
        };

        Self {
            behavior,
            stage,
            frame: SpriteFrame {
                x,
                facing,
                activity: Activity::Idle,
                animation: None,
                mounted: true,
            },
            destination: None,
            restored: remembered.is_some(),
        }
    }

    /// Whether mount restored a remembered coordinate. The mount frame of a
    /// restored avatar must not be written back to position memory.
    pub fn restored(&self) -> bool {
        self.restored
    }

    pub fn frame(&self) -> &SpriteFrame {
        &self.frame
    }

    pub fn x(&self) -> i32 {
        self.frame.x
    }

    pub fn is_walking(&self) -> bool {
        self.destination.is_some()
    }

    pub fn walk_interval<R: Rng>(&self, rng: &mut R) -> Duration {
        self.behavior.walk_interval(rng)
    }

    /// Decide what to do next.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> Transition {
        self.frame.animation = None;

        if rng.random::<f64>() < self.behavior.walk_probability {
            let destination = random_x(self.stage, rng);
            self.frame.facing = if destination < self.frame.x {
                Facing::Left
            } else {
                Facing::Right
            };
            self.frame.activity = Activity::Walking;
            self.destination = Some(destination);
            return Transition::Walk { destination };
        }

        let animation = self
            .behavior
            .pick_idle(rng)
            .map(|anim| anim.class_name.clone());
        self.frame.activity = Activity::Idle;
        self.frame.animation = animation.clone();
        self.destination = None;

        Transition::Idle {
            animation,
            next_tick: self.behavior.next_wait(rng),
        }
    }

    /// Advance one unit toward the destination.
    pub fn step(&mut self) -> WalkStep {
        let Some(destination) = self.destination else {
            return WalkStep::Arrived;
        };

        if self.frame.x != destination {
            self.frame.x += (destination - self.frame.x).signum();
        }

        if self.frame.x == destination {
            self.destination = None;
            self.frame.activity = Activity::Idle;
            WalkStep::Arrived
        } else {
            WalkStep::Moved(self.frame.x)
        }
    }
}

/// Random coordinate that keeps the sprite inside the stage.
fn random_x<R: Rng>(stage: StageConfig, rng: &mut R) -> i32 {
    let span = stage.width - stage.sprite_width;
    if span <= 0 {
        0
    } else {
        rng.random_range(0..span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::IdleAnimation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stage() -> StageConfig {
        StageConfig {
            width: 800,
            sprite_width: 50,
        }
    }

    fn behavior(walk_probability: f64) -> Arc<AvatarBehavior> {
        Arc::new(AvatarBehavior {
            walk_probability,
            idle_animations: vec![IdleAnimation::new(1.0, "blink")],
            ..Default::default()
        })
    }

    #[test]
    fn test_mount_restores_existing_position() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut avatar = Avatar::new("alice", "avatar-bird", 1);
        avatar.existing = true;
        avatar.live.memory.write(321);

        let machine = AvatarMachine::mount(&avatar, behavior(0.25), stage(), &mut rng);
        assert_eq!(machine.x(), 321);
        assert!(machine.restored());
        assert!(machine.frame().mounted);
    }

    #[test]
    fn test_mount_randomizes_new_avatar() {
        let mut rng = StdRng::seed_from_u64(2);
        let avatar = Avatar::new("bob", "avatar-bird", 1);
        avatar.live.memory.write(321);

        let machine = AvatarMachine::mount(&avatar, behavior(0.25), stage(), &mut rng);
        assert!(!machine.restored());
        assert!((0..750).contains(&machine.x()));
    }

    #[test]
    fn test_existing_without_memory_is_randomized() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut avatar = Avatar::new("carol", "avatar-bird", 1);
        avatar.existing = true;

        let machine = AvatarMachine::mount(&avatar, behavior(0.25), stage(), &mut rng);
        assert!(!machine.restored());
    }

    #[test]
    fn test_walk_reaches_destination_one_unit_at_a_time() {
        let mut rng = StdRng::seed_from_u64(4);
        let avatar = Avatar::new("dave", "avatar-bird", 1);
        let mut machine = AvatarMachine::mount(&avatar, behavior(1.0), stage(), &mut rng);
        let start = machine.x();

        let Transition::Walk { destination } = machine.tick(&mut rng) else {
            panic!("walk probability 1.0 must walk");
        };
        assert_eq!(machine.frame().activity, Activity::Walking);
        let expected_facing = if destination < start {
            Facing::Left
        } else {
            Facing::Right
        };
        assert_eq!(machine.frame().facing, expected_facing);

        let mut previous = start;
        let mut steps = 0;
        loop {
            match machine.step() {
                WalkStep::Moved(x) => {
                    assert_eq!((x - previous).abs(), 1);
                    previous = x;
                    steps += 1;
                }
                WalkStep::Arrived => break,
            }
        }
        assert_eq!(machine.x(), destination);
        assert_eq!(steps + 1, (destination - start).abs().max(1));
        assert_eq!(machine.frame().activity, Activity::Idle);
        assert!(!machine.is_walking());
    }

    #[test]
    fn test_idle_tick_applies_animation_and_wait() {
        let mut rng = StdRng::seed_from_u64(5);
        let avatar = Avatar::new("erin", "avatar-bird", 1);
        let mut machine = AvatarMachine::mount(&avatar, behavior(0.0), stage(), &mut rng);

        match machine.tick(&mut rng) {
            Transition::Idle {
                animation,
                next_tick,
            } => {
                assert_eq!(animation.as_deref(), Some("blink"));
                assert!((5..17).contains(&next_tick.as_secs()));
            }
            other => panic!("expected idle, got {other:?}"),
        }
        assert_eq!(machine.frame().animation.as_deref(), Some("blink"));
    }

    #[test]
    fn test_tick_clears_previous_animation() {
        let mut rng = StdRng::seed_from_u64(6);
        let avatar = Avatar::new("frank", "avatar-bird", 1);
        let mut machine = AvatarMachine::mount(&avatar, behavior(0.0), stage(), &mut rng);
        machine.tick(&mut rng);
        assert!(machine.frame().animation.is_some());

        machine.behavior = behavior(1.0);
        machine.tick(&mut rng);
        assert_eq!(machine.frame().animation, None);
    }

    #[test]
    fn test_tiny_stage_pins_to_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let avatar = Avatar::new("gina", "avatar-bird", 1);
        let tiny = StageConfig {
            width: 40,
            sprite_width: 50,
        };
        let mut machine = AvatarMachine::mount(&avatar, behavior(1.0), tiny, &mut rng);
        assert_eq!(machine.x(), 0);
        assert_eq!(machine.tick(&mut rng), Transition::Walk { destination: 0 });
        assert_eq!(machine.step(), WalkStep::Arrived);
    }
}
