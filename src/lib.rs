//! A concurrent, in-process key→value cache, four ways.
//!
//! One contract, [`CacheMap`], and four implementations that honor it, each
//! serializing access to the shared table differently:
//!
//! - [`QueueMap`]: every operation is a closure run by a single owner
//!   thread. Races are impossible by construction; every call pays a
//!   channel hand-off.
//! - [`CowMap`]: readers share an immutable snapshot and never block;
//!   writers rebuild and republish the whole table.
//! - [`RwLockMap`]: one reader/writer lock over the table. The baseline.
//! - [`TwoLevelMap`]: an outer lock for key membership plus a lock per
//!   entry, so a slow lookup stalls only its own key.
//!
//! Entries may carry an expiry ([`TimedValue`], or a blanket `default_ttl`
//! on the builder); a background sweeper evicts expired entries
//! periodically. Misses in [`CacheMap::load_or_compute`] are filled by a
//! caller-supplied lookup, with concurrent misses for the same key sharing
//! one lookup invocation. Every value that leaves the cache (replaced,
//! deleted, expired, or drained by [`CacheMap::close`]) is handed exactly
//! once to the configured reaper.
//!
//! # Example: a memoized Fibonacci series
//!
//! The lookup may call back into the cache for *other* keys. On
//! [`TwoLevelMap`] only the slot being computed is locked, so cross-key
//! recursion works:
//!
//! ```
//! use std::sync::OnceLock;
//! use quadmap::{CacheBuilder, CacheMap, TimedValue, TwoLevelMap};
//!
//! static SERIES: OnceLock<TwoLevelMap<u64>> = OnceLock::new();
//!
//! let cache = CacheBuilder::new()
//!   .lookup(|key: &str| {
//!     let n: u64 = key.parse()?;
//!     if n < 2 {
//!       return Ok(TimedValue::new(1));
//!     }
//!     let series = SERIES.get().expect("series initialized");
//!     let first = series.load_or_compute(&(n - 1).to_string())?;
//!     let second = series.load_or_compute(&(n - 2).to_string())?;
//!     Ok(TimedValue::new(*first + *second))
//!   })
//!   .build_two_level()
//!   .unwrap();
//! let cache = SERIES.get_or_init(|| cache);
//!
//! assert_eq!(*cache.load_or_compute("10").unwrap(), 89);
//! cache.close();
//! ```

mod builder;
mod entry;
mod error;
mod map;
mod pairs;
mod task;

pub use builder::{CacheBuilder, Strategy};
pub use entry::TimedValue;
pub use error::{BuildError, LoadError, LookupError};
pub use map::{CacheMap, CowMap, QueueMap, RwLockMap, TwoLevelMap};
pub use pairs::Pairs;
