//! Presence and render loops.

use crate::avatar::{spawn_animator, Avatar};
use crate::config::StageConfig;
use crate::registry::{RegistryBuilder, VariantRegistry};
use crate::source::{load_manifest, PresenceSource, SourceError};
use crate::store::{SharedStore, Store};
use protocol::Frame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Everything a presence cycle needs.
#[derive(Debug, Clone)]
pub struct Presence {
    pub store: SharedStore,
    pub registry: Arc<VariantRegistry>,
    pub stage: StageConfig,
    /// Poll pre-assigned choices after each roster poll.
    pub bot: bool,
}

/// What one presence cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub added: usize,
    pub removed: usize,
    pub skipped: usize,
    pub replaced: usize,
    pub malformed: bool,
}

impl Presence {
    /// One cycle: fetch the roster, aggregate, reconcile, mount the new
    /// avatars, then apply choices in bot mode.
    ///
    /// A failed roster fetch leaves the store untouched. A failed choices
    /// fetch is only logged.
    pub async fn poll_once<S, R>(&self, source: &S, rng: &mut R) -> Result<PollSummary, SourceError>
    where
        S: PresenceSource,
        R: Rng + Send,
    {
        let snapshot = source.roster().await?;
        if snapshot.malformed {
            warn!("Roster payload was malformed, using what could be read");
        }

        let mut summary = PollSummary {
            malformed: snapshot.malformed,
            ..Default::default()
        };

        let added = {
            let mut store = self.store.write().await;
            store.set_chatters(&snapshot);
            let report = store.update_avatars(&self.registry, rng);
            summary.removed = report.removed.len();
            summary.skipped = report.skipped.len();
            report.added
        };
        summary.added = added.len();
        self.mount(added);

        if self.bot {
            match source.choices().await {
                Ok(choices) if !choices.is_empty() => {
                    let replaced = {
                        let mut store = self.store.write().await;
                        store.apply_choices(&choices, &self.registry)
                    };
                    summary.replaced = replaced.len();
                    self.mount(replaced);
                }
                Ok(_) => {}
                Err(e) => warn!("Choices poll failed: {}", e),
            }
        }

        Ok(summary)
    }

    /// Start an animator for each avatar.
    pub fn mount(&self, avatars: Vec<Avatar>) {
        for avatar in avatars {
            let Some(variant) = self.registry.get(&avatar.variant) else {
                warn!("Variant {} vanished from the registry", avatar.variant);
                continue;
            };
            spawn_animator(avatar, Arc::clone(&variant.behavior), self.stage);
        }
    }

    /// Current render frame.
    pub async fn frame(&self) -> Frame {
        self.store.read().await.frame(&self.registry)
    }
}

/// Load the asset manifest, register its bundles and hand the manifest's
/// exclusions to the store.
///
/// A manifest that cannot be loaded leaves the registry empty; chatters then
/// wait without avatars until the next start.
pub async fn register_assets(
    client: &reqwest::Client,
    location: &str,
    store: &mut Store,
) -> Arc<VariantRegistry> {
    let mut builder = RegistryBuilder::new();
    if location.is_empty() {
        info!("No avatar manifest configured");
        return builder.finish();
    }
    match load_manifest(client, location).await {
        Ok(manifest) => {
            let added = builder.register_manifest(&manifest);
            debug!("Manifest {} listed {} bundles", location, added);
            store.apply_manifest(&manifest);
        }
        Err(e) => warn!("Failed to load avatar manifest {}: {}", location, e),
    }
    builder.finish()
}

/// Poll the roster on a fixed interval, forever. The first poll runs
/// immediately.
pub async fn run_presence_loop<S: PresenceSource>(presence: Presence, source: S, poll_interval: Duration) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rng = StdRng::from_os_rng();

    info!("Polling roster every {:?}", poll_interval);

    loop {
        ticker.tick().await;
        match presence.poll_once(&source, &mut rng).await {
            Ok(summary) => debug!("Poll complete: {:?}", summary),
            Err(e) => warn!("Roster poll failed, keeping current avatars: {}", e),
        }
    }
}

/// Broadcast a render frame every `frame_interval_ms` while anyone listens.
pub async fn run_render_loop(presence: Presence, frame_tx: broadcast::Sender<Arc<Frame>>, frame_interval_ms: u64) {
    let mut ticker = interval(Duration::from_millis(frame_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Hibernate while no overlay is connected
        if frame_tx.receiver_count() == 0 {
            sleep(Duration::from_millis(frame_interval_ms.saturating_mul(4).max(100))).await;
            continue;
        }

        let frame = Arc::new(presence.frame().await);
        if frame_tx.send(frame).is_err() {
            debug!("Frame dropped, overlay disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::AvatarBehavior;
    use crate::config::Config;
    use crate::registry::Variant;
    use protocol::{Choices, RosterSnapshot};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned roster responses.
    struct Scripted {
        rosters: Mutex<VecDeque<Result<RosterSnapshot, SourceError>>>,
        choices: Mutex<Option<Choices>>,
    }

    impl Scripted {
        fn new(rosters: Vec<Result<RosterSnapshot, SourceError>>) -> Self {
            Self {
                rosters: Mutex::new(rosters.into()),
                choices: Mutex::new(None),
            }
        }
    }

    impl PresenceSource for Scripted {
        async fn roster(&self) -> Result<RosterSnapshot, SourceError> {
            self.rosters
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(RosterSnapshot::default()))
        }

        async fn choices(&self) -> Result<Choices, SourceError> {
            Ok(self.choices.lock().unwrap().clone().unwrap_or_default())
        }
    }

    fn roster(json: &str) -> Result<RosterSnapshot, SourceError> {
        Ok(RosterSnapshot::from_json(json).unwrap())
    }

    fn presence(bot: bool) -> Presence {
        let mut builder = RegistryBuilder::new();
        builder.register(Variant::new("avatar-bird", AvatarBehavior::default()));
        builder.register(Variant::new("avatar-robot", AvatarBehavior::default()));
        let mut config = Config::default();
        config.assets.exclude_random = vec!["robot".to_string()];
        Presence {
            store: Store::new(&config).shared(),
            registry: builder.finish(),
            stage: config.stage,
            bot,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_mounts_new_avatars() {
        let presence = presence(false);
        let source = Scripted::new(vec![roster(r#"{"chatters": {"viewers": ["alice", "bob"]}}"#)]);
        let mut rng = StdRng::seed_from_u64(1);

        let summary = presence.poll_once(&source, &mut rng).await.unwrap();
        assert_eq!(summary.added, 2);

        sleep(Duration::from_millis(1)).await;
        let frame = presence.frame().await;
        let users: Vec<&str> = frame.avatars.iter().map(|a| a.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_state() {
        let presence = presence(false);
        let source = Scripted::new(vec![
            roster(r#"{"chatters": {"viewers": ["alice"]}}"#),
            Err(SourceError::Status {
                url: "http://example.invalid".to_string(),
                status: 503,
            }),
        ]);
        let mut rng = StdRng::seed_from_u64(2);

        presence.poll_once(&source, &mut rng).await.unwrap();
        let before = presence.store.read().await.avatars();

        assert!(presence.poll_once(&source, &mut rng).await.is_err());
        let after = presence.store.read().await.avatars();
        assert_eq!(after.len(), 1);
        assert_eq!(after["alice"].generation(), before["alice"].generation());
        assert!(after["alice"].is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_departure_stops_animator() {
        let presence = presence(false);
        let source = Scripted::new(vec![
            roster(r#"{"chatters": {"viewers": ["alice", "bob"]}}"#),
            roster(r#"{"chatters": {"viewers": ["alice"]}}"#),
        ]);
        let mut rng = StdRng::seed_from_u64(3);

        presence.poll_once(&source, &mut rng).await.unwrap();
        sleep(Duration::from_millis(1)).await;
        let bob = presence.store.read().await.avatar("bob").unwrap().clone();

        let summary = presence.poll_once(&source, &mut rng).await.unwrap();
        assert_eq!(summary.removed, 1);
        assert!(!bob.is_alive());

        let frozen = bob.live.frame();
        sleep(Duration::from_secs(120)).await;
        assert_eq!(bob.live.frame(), frozen);

        let frame = presence.frame().await;
        assert_eq!(frame.avatars.len(), 1);
        assert_eq!(frame.avatars[0].user, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_mode_applies_choices() {
        let presence = presence(true);
        let source = Scripted::new(vec![roster(r#"{"chatters": {"viewers": ["alice"]}}"#)]);
        *source.choices.lock().unwrap() =
            Some(Choices::from_json(r#"{"alice": "robot"}"#).unwrap());
        let mut rng = StdRng::seed_from_u64(4);

        let summary = presence.poll_once(&source, &mut rng).await.unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.replaced, 1);

        sleep(Duration::from_millis(1)).await;
        let store = presence.store.read().await;
        let alice = store.avatar("alice").unwrap();
        assert_eq!(alice.variant, "avatar-robot");
        assert!(alice.existing);
        assert_eq!(alice.live.frame().x, alice.live.memory.read().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_loop_broadcasts_to_subscribers() {
        let presence = presence(false);
        let source = Scripted::new(vec![roster(r#"{"chatters": {"viewers": ["alice"]}}"#)]);
        let mut rng = StdRng::seed_from_u64(5);
        presence.poll_once(&source, &mut rng).await.unwrap();
        sleep(Duration::from_millis(1)).await;

        let (tx, mut rx) = broadcast::channel(4);
        tokio::spawn(run_render_loop(presence.clone(), tx, 100));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.avatars.len(), 1);
        assert_eq!(frame.avatars[0].variant, "avatar-bird");
    }

    #[tokio::test]
    async fn test_register_assets_from_local_manifest() {
        let path = std::env::temp_dir().join(format!("stream-avatars-assets-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"avatars": ["bird", "ghost"], "excludeRandom": ["ghost"], "restricted": {"ghost": ["alice"]}}"#,
        )
        .unwrap();

        let client = reqwest::Client::new();
        let mut store = Store::new(&Config::default());
        let registry = register_assets(&client, path.to_str().unwrap(), &mut store).await;
        std::fs::remove_file(&path).ok();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("avatar-ghost"));
        assert_eq!(store.exclude_random(), &["ghost".to_string()]);
        assert!(store.restricted().contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_missing_manifest_gives_empty_registry() {
        let client = reqwest::Client::new();
        let mut store = Store::new(&Config::default());
        let registry = register_assets(&client, "no/such/avatars.json", &mut store).await;
        assert!(registry.is_empty());
        assert_eq!(store.exclude_random(), &["hide".to_string()]);
    }
}
