//! Region cache crate.
//!
//! Per-region, TTL-aware memoization with at-most-one concurrent
//! recomputation per key.

pub mod cache;

pub use cache::{CacheEntry, RegionCache};
