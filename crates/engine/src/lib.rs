//! Stream avatar engine: roster polling, avatar reconciliation and the
//! per-avatar behavior loops.

pub mod avatar;
pub mod config;
pub mod registry;
pub mod roster;
pub mod runtime;
pub mod source;
pub mod store;

pub use config::Config;
pub use registry::{RegistryBuilder, Variant, VariantRegistry};
pub use runtime::{register_assets, run_presence_loop, run_render_loop, PollSummary, Presence};
pub use source::{HttpSource, PresenceSource, SourceError};
pub use store::{SharedStore, Store};
