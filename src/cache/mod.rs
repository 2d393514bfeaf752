//! Response caching for API reads.
//!
//! Entries are keyed by endpoint plus canonicalized parameters, live under the
//! `cache:` namespace of the shared store, and are never expired eagerly:
//! staleness is computed at read time so callers can serve stale data while
//! they revalidate.

mod key;
mod response;
mod types;

pub use response::{ResponseCache, DEFAULT_TTL_SECS};
pub use types::CacheSource;
