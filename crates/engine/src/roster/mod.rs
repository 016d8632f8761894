//! Roster aggregation and avatar reconciliation.

mod aggregate;
mod reconcile;

pub use aggregate::{aggregate, Chatter, Chatters};
pub use reconcile::{reconcile, AvatarMap, Generations, ReconcileReport};
