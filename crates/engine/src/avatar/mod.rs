//! Displayed avatars and their autonomous behavior.

pub mod behavior;
pub mod driver;
pub mod machine;

pub use behavior::{AvatarBehavior, IdleAnimation};
pub use driver::spawn_animator;
pub use machine::{AvatarMachine, Transition, WalkStep};

use protocol::{Activity, AvatarView, Facing};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Liveness handle shared between an avatar and its scheduled work.
///
/// Removing an avatar revokes its token; timers that fire afterwards see a
/// dead token and do nothing.
#[derive(Debug, Clone)]
pub struct LivenessToken {
    generation: u64,
    alive: Arc<AtomicBool>,
}

impl LivenessToken {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Last known horizontal coordinate of an avatar.
#[derive(Debug, Default)]
pub struct PositionMemory {
    x: AtomicI32,
    written: AtomicBool,
}

impl PositionMemory {
    /// Last written coordinate, or `None` if nothing was ever written.
    pub fn read(&self) -> Option<i32> {
        if self.written.load(Ordering::Acquire) {
            Some(self.x.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub fn write(&self, x: i32) {
        self.x.store(x, Ordering::Relaxed);
        self.written.store(true, Ordering::Release);
    }
}

/// What the overlay currently shows for one avatar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteFrame {
    pub x: i32,
    pub facing: Facing,
    pub activity: Activity,
    pub animation: Option<String>,
    /// Set once the state machine has placed the sprite.
    pub mounted: bool,
}

/// Mutable state an avatar's state machine publishes.
#[derive(Debug, Default)]
pub struct AvatarLive {
    pub memory: Arc<PositionMemory>,
    frame: Mutex<SpriteFrame>,
}

impl AvatarLive {
    fn with_memory(memory: Arc<PositionMemory>) -> Self {
        let x = memory.read().unwrap_or(0);
        Self {
            memory,
            frame: Mutex::new(SpriteFrame {
                x,
                ..Default::default()
            }),
        }
    }

    pub fn frame(&self) -> SpriteFrame {
        self.lock().clone()
    }

    pub fn set_frame(&self, frame: SpriteFrame) {
        *self.lock() = frame;
    }

    fn lock(&self) -> MutexGuard<'_, SpriteFrame> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One displayed avatar.
///
/// Clones share the same liveness token and live state.
#[derive(Debug, Clone)]
pub struct Avatar {
    /// Participant this avatar belongs to.
    pub participant: String,
    /// Variant key, fixed for the avatar's lifetime.
    pub variant: String,
    /// Restore the remembered position on mount instead of randomizing.
    pub existing: bool,
    pub token: LivenessToken,
    pub live: Arc<AvatarLive>,
}

impl Avatar {
    /// A freshly created avatar at coordinate 0 with nothing remembered.
    pub fn new(participant: impl Into<String>, variant: impl Into<String>, generation: u64) -> Self {
        Self {
            participant: participant.into(),
            variant: variant.into(),
            existing: false,
            token: LivenessToken::new(generation),
            live: Arc::new(AvatarLive::default()),
        }
    }

    /// A replacement for this avatar with another variant. The replacement
    /// is marked existing and shares this avatar's position memory, so it
    /// appears where this one was.
    pub fn succeed(&self, variant: impl Into<String>, generation: u64) -> Self {
        Self {
            participant: self.participant.clone(),
            variant: variant.into(),
            existing: true,
            token: LivenessToken::new(generation),
            live: Arc::new(AvatarLive::with_memory(Arc::clone(&self.live.memory))),
        }
    }

    pub fn generation(&self) -> u64 {
        self.token.generation()
    }

    pub fn is_alive(&self) -> bool {
        self.token.is_alive()
    }

    pub fn view(&self) -> AvatarView {
        let frame = self.live.frame();
        AvatarView {
            class: AvatarView::class_list(
                &self.variant,
                frame.activity,
                frame.facing,
                frame.animation.as_deref(),
            ),
            user: self.participant.clone(),
            variant: self.variant.clone(),
            x: frame.x,
            facing: frame.facing,
            activity: frame.activity,
            animation: frame.animation,
        }
    }
}
