//! The map contract and its four implementations.
//!
//! Every implementation honors the same external semantics; they differ only
//! in how access to the shared table is serialized. [`QueueMap`] funnels all
//! work through one owner thread, [`CowMap`] publishes immutable snapshots,
//! [`RwLockMap`] guards the table with a single reader/writer lock, and
//! [`TwoLevelMap`] splits membership and per-entry state across two lock
//! levels.

mod cow;
mod queue;
mod rwlock;
mod two_level;

pub use cow::CowMap;
pub use queue::QueueMap;
pub use rwlock::RwLockMap;
pub use two_level::TwoLevelMap;

use crate::entry::TimedValue;
use crate::error::LoadError;
use crate::pairs::Pairs;

use std::sync::Arc;

/// The contract shared by all four cache implementations.
///
/// Implementations are safe to share across threads; every method takes
/// `&self`. Values travel as `Arc<V>`: `load` and `load_or_compute` hand back
/// a clone of the stored `Arc`, and the reaper receives the `Arc` when a
/// value leaves the cache.
pub trait CacheMap<V>: Send + Sync {
  /// Inserts or replaces the entry for `key`. A displaced prior value is
  /// handed to the reaper before `store` returns.
  fn store(&self, key: &str, value: TimedValue<V>);

  /// Returns the current value for `key` if an entry exists and is not
  /// expired. Never invokes the lookup.
  fn load(&self, key: &str) -> Option<Arc<V>>;

  /// Returns the current value for `key`, invoking the configured lookup to
  /// fill the slot on a miss or expired entry.
  ///
  /// Concurrent calls for the same key coalesce: at most one lookup per key
  /// is in flight at a time, and callers that arrive while one is in flight
  /// block until it completes. On lookup failure the error is returned, the
  /// slot is left empty, and the next caller retries.
  fn load_or_compute(&self, key: &str) -> Result<Arc<V>, LoadError>;

  /// Removes any entry for `key`, handing a removed value to the reaper.
  fn delete(&self, key: &str);

  /// Removes every expired entry, handing each value to the reaper. Runs
  /// periodically in the background; callers may also invoke it directly.
  fn gc(&self);

  /// Returns a snapshot of the currently present keys. Advisory: expired
  /// entries that have not yet been swept are included.
  fn keys(&self) -> Vec<String>;

  /// Returns an iterator over a snapshot of the non-expired entries. See
  /// [`Pairs`] for the consistency guarantees.
  fn pairs(&self) -> Pairs<V>;

  /// Stops the background sweeper, then hands every surviving entry's value
  /// to the reaper. When `close` returns, the sweeper has terminated and all
  /// reaper calls owed for stored values have been made. A second call is a
  /// no-op.
  fn close(&self);
}

pub(crate) type Table<V> =
  std::collections::HashMap<String, crate::entry::StoredValue<V>, ahash::RandomState>;
