//! Roster probe - fetch one roster snapshot and print who would get an avatar.

use engine::roster::aggregate;
use engine::{Config, HttpSource, PresenceSource};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = Config::load()?;
    config.apply_mount_file(Path::new("mount.json"))?;

    let source = HttpSource::new(&config)?;
    info!("Fetching {}", source.roster_url());

    let snapshot = source.roster().await?;
    if snapshot.malformed {
        warn!("Roster payload was malformed");
    }

    let chatters = aggregate(
        &snapshot.groups,
        config.roster.avatar_limit,
        &config.roster.exclude_chatters,
    );
    info!(
        "{} entries in {} groups, {} chatters after exclusions",
        snapshot.entry_count(),
        snapshot.groups.len(),
        chatters.len()
    );

    for chatter in chatters.values() {
        let tags: Vec<&str> = chatter.tags.iter().map(String::as_str).collect();
        println!("{}\t{}", chatter.user, tags.join(","));
    }

    Ok(())
}
