//! The `cache` module holds the client-side query cache and the bridge that
//! keeps it in sync with realtime pushes.

pub mod bridge;
pub mod query_cache;

pub use bridge::{InvalidationBridge, Plan, plan};
pub use query_cache::{DataCache, QueryCache, QueryKey};
