//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub choices: ChoicesConfig,
    #[serde(default)]
    pub stage: StageConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there if the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    /// Apply host mount options from `mount.json` beside the config file, if
    /// present.
    pub fn apply_mount_file(&mut self, path: &Path) -> anyhow::Result<()> {
        if !path.exists() {
            debug!("No mount options at {}", path.display());
            return Ok(());
        }
        let contents = std::fs::read_to_string(path)?;
        let options: MountOptions = serde_json::from_str(&contents)?;
        info!("Applying mount options from {}", path.display());
        self.apply(options);
        Ok(())
    }

    /// Overlay mount options. Only options that were supplied replace the
    /// configured value.
    pub fn apply(&mut self, options: MountOptions) {
        let MountOptions {
            avatar_limit,
            avatars_url,
            bot,
            chatters_url,
            choices_url,
            cors_proxy,
            exclude_chatters,
            twitch_user,
        } = options;

        if let Some(v) = avatar_limit {
            self.roster.avatar_limit = v;
        }
        if let Some(v) = avatars_url {
            self.assets.avatars_url = v;
        }
        if let Some(v) = bot {
            self.choices.bot = v;
        }
        if let Some(v) = chatters_url {
            self.roster.chatters_url = v;
        }
        if let Some(v) = choices_url {
            self.choices.choices_url = v;
        }
        if let Some(v) = cors_proxy {
            self.roster.cors_proxy = v;
        }
        if let Some(v) = exclude_chatters {
            self.roster.exclude_chatters = v;
        }
        if let Some(v) = twitch_user {
            self.roster.twitch_user = v;
        }
    }
}

/// Options a host page may override at mount time.
///
/// Unrecognized names are ignored and `null` counts as not supplied.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MountOptions {
    #[serde(default)]
    pub avatar_limit: Option<usize>,
    #[serde(default)]
    pub avatars_url: Option<String>,
    #[serde(default)]
    pub bot: Option<bool>,
    #[serde(default)]
    pub chatters_url: Option<String>,
    #[serde(default)]
    pub choices_url: Option<String>,
    #[serde(default)]
    pub cors_proxy: Option<String>,
    #[serde(default)]
    pub exclude_chatters: Option<Vec<String>>,
    #[serde(default)]
    pub twitch_user: Option<String>,
}

/// Overlay server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between render frames in milliseconds.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    /// Directory holding avatar bundles (`<asset_dir>/<bundle>/avatar.css`).
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            frame_interval_ms: default_frame_interval(),
            asset_dir: default_asset_dir(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_frame_interval() -> u64 {
    100
}
fn default_asset_dir() -> String {
    "avatars".to_string()
}

/// Chat roster polling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RosterConfig {
    /// Channel whose chatters are shown.
    #[serde(default = "default_twitch_user")]
    pub twitch_user: String,
    /// Roster endpoint; `{channel}` is replaced with `twitch_user`.
    #[serde(default = "default_chatters_url")]
    pub chatters_url: String,
    /// Prefix prepended to the roster URL (e.g. a cors-anywhere instance).
    #[serde(default)]
    pub cors_proxy: String,
    /// Seconds between roster polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum number of tag groups aggregated per poll.
    #[serde(default = "default_avatar_limit")]
    pub avatar_limit: usize,
    /// Participants that never get an avatar.
    #[serde(default = "default_exclude_chatters")]
    pub exclude_chatters: Vec<String>,
    /// HTTP request timeout in seconds (0 disables it).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            twitch_user: default_twitch_user(),
            chatters_url: default_chatters_url(),
            cors_proxy: String::new(),
            poll_interval_secs: default_poll_interval(),
            avatar_limit: default_avatar_limit(),
            exclude_chatters: default_exclude_chatters(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RosterConfig {
    /// Fully resolved roster URL.
    pub fn snapshot_url(&self) -> String {
        format!(
            "{}{}",
            self.cors_proxy,
            self.chatters_url.replace("{channel}", &self.twitch_user)
        )
    }
}

fn default_twitch_user() -> String {
    "haliphax".to_string()
}
fn default_chatters_url() -> String {
    "https://tmi.twitch.tv/group/user/{channel}/chatters".to_string()
}
fn default_poll_interval() -> u64 {
    10
}
fn default_avatar_limit() -> usize {
    20
}
fn default_exclude_chatters() -> Vec<String> {
    vec!["hxavatarsbot".to_string(), "streamelements".to_string()]
}
fn default_request_timeout() -> u64 {
    30
}

/// Avatar asset registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetsConfig {
    /// Manifest location, a file path or http(s) URL. Empty disables it.
    #[serde(default = "default_avatars_url")]
    pub avatars_url: String,
    /// Variant sub-identifiers never chosen at random (the manifest may
    /// replace this list).
    #[serde(default = "default_exclude_random")]
    pub exclude_random: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            avatars_url: default_avatars_url(),
            exclude_random: default_exclude_random(),
        }
    }
}

fn default_avatars_url() -> String {
    "avatars.json".to_string()
}
fn default_exclude_random() -> Vec<String> {
    vec!["hide".to_string()]
}

/// Externally controlled variant assignment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChoicesConfig {
    /// Poll the choices endpoint after every roster poll.
    #[serde(default)]
    pub bot: bool,
    /// Choices location, a file path or http(s) URL.
    #[serde(default = "default_choices_url")]
    pub choices_url: String,
}

impl Default for ChoicesConfig {
    fn default() -> Self {
        Self {
            bot: false,
            choices_url: default_choices_url(),
        }
    }
}

fn default_choices_url() -> String {
    "choices.json".to_string()
}

/// Visible area the avatars walk in.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct StageConfig {
    /// Viewport width in pixels.
    #[serde(default = "default_stage_width")]
    pub width: i32,
    /// Rendered sprite width in pixels.
    #[serde(default = "default_sprite_width")]
    pub sprite_width: i32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            width: default_stage_width(),
            sprite_width: default_sprite_width(),
        }
    }
}

fn default_stage_width() -> i32 {
    1920
}
fn default_sprite_width() -> i32 {
    64
}
