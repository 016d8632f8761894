//! Tokio task that runs one avatar's state machine.

use super::{Avatar, AvatarBehavior, AvatarMachine, Transition, WalkStep};
use crate::config::StageConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Mount `avatar` and keep it animating until its token is revoked.
pub fn spawn_animator(
    avatar: Avatar,
    behavior: Arc<AvatarBehavior>,
    stage: StageConfig,
) -> JoinHandle<()> {
    let rng = StdRng::from_os_rng();
    tokio::spawn(run_animator(avatar, behavior, stage, rng))
}

/// Animation loop for one avatar.
///
/// The first decision runs right after mount. Every resumption after a sleep
/// checks the avatar's liveness token first and returns quietly once it is
/// revoked.
pub async fn run_animator<R: Rng + Send>(
    avatar: Avatar,
    behavior: Arc<AvatarBehavior>,
    stage: StageConfig,
    mut rng: R,
) {
    if !avatar.is_alive() {
        return;
    }

    let mut machine = AvatarMachine::mount(&avatar, behavior, stage, &mut rng);
    let walk_interval = machine.walk_interval(&mut rng);
    publish(&avatar, &machine, !machine.restored());
    debug!(
        "Mounted {} ({}) at x={}{}",
        avatar.participant,
        avatar.variant,
        machine.x(),
        if machine.restored() { " (restored)" } else { "" }
    );

    'animate: loop {
        match machine.tick(&mut rng) {
            Transition::Idle {
                animation,
                next_tick,
            } => {
                trace!(
                    "{} idles ({}) for {:?}",
                    avatar.participant,
                    animation.as_deref().unwrap_or("plain"),
                    next_tick
                );
                publish(&avatar, &machine, false);
                sleep(next_tick).await;
                if !avatar.is_alive() {
                    break;
                }
            }
            Transition::Walk { destination } => {
                trace!(
                    "{} walks from {} to {}",
                    avatar.participant,
                    machine.x(),
                    destination
                );
                let start = machine.x();
                loop {
                    let before = machine.x();
                    let step = machine.step();
                    publish(&avatar, &machine, machine.x() != before);
                    if step == WalkStep::Arrived {
                        break;
                    }
                    sleep(walk_interval).await;
                    if !avatar.is_alive() {
                        break 'animate;
                    }
                }

                // A walk to where we already stand must not spin the loop.
                if machine.x() == start {
                    sleep(walk_interval).await;
                    if !avatar.is_alive() {
                        break;
                    }
                }
            }
        }
    }

    debug!(
        "Animator for {} (generation {}) stopped",
        avatar.participant,
        avatar.generation()
    );
}

fn publish(avatar: &Avatar, machine: &AvatarMachine, remember: bool) {
    avatar.live.set_frame(machine.frame().clone());
    if remember {
        avatar.live.memory.write(machine.x());
    }
}
