//! Query result caching

pub mod opponents;
pub mod ttl;

pub use opponents::{OpponentMatchCache, OpponentPage};
pub use ttl::{CacheStats, Scope, TtlCache};
