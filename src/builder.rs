use crate::entry::TimedValue;
use crate::error::{BuildError, LoadError, LookupError};
use crate::map::{CacheMap, CowMap, QueueMap, RwLockMap, TwoLevelMap};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type Lookup<V> =
  Arc<dyn Fn(&str) -> Result<TimedValue<V>, LookupError> + Send + Sync>;
pub(crate) type Reaper<V> = Arc<dyn Fn(Arc<V>) + Send + Sync>;

/// Selects which of the four implementations a [`CacheBuilder`] constructs.
///
/// All four honor the same contract; they differ in how they serialize access
/// and therefore in throughput under different read/write/lookup mixes. See
/// the module docs on each concrete type for the trade-off it makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// All access funneled through a single owner thread ([`QueueMap`]).
  SerializedQueue,
  /// Immutable snapshots swapped atomically ([`CowMap`]).
  CopyOnWrite,
  /// One reader/writer lock over the whole table ([`RwLockMap`]).
  CoarseMutex,
  /// Outer lock for membership, per-entry locks for values ([`TwoLevelMap`]).
  TwoLevel,
}

/// The immutable configuration every map carries, plus the helpers the four
/// implementations share for invoking the user's callbacks.
pub(crate) struct CacheConfig<V> {
  pub(crate) lookup: Option<Lookup<V>>,
  pub(crate) reaper: Option<Reaper<V>>,
  pub(crate) default_ttl: Option<Duration>,
  sweep_interval: Option<Duration>,
}

impl<V> CacheConfig<V> {
  /// Invokes the configured lookup, or reports that none was configured.
  pub(crate) fn lookup(&self, key: &str) -> Result<TimedValue<V>, LoadError> {
    match &self.lookup {
      Some(lookup) => lookup(key).map_err(LoadError::Lookup),
      None => Err(LoadError::NoLookupDefined),
    }
  }

  /// Hands a displaced value to the reaper, if one is configured. A panic in
  /// the reaper is caught so user code cannot take down the sweeper thread or
  /// abandon the rest of a drain.
  pub(crate) fn reap(&self, value: Arc<V>) {
    if let Some(reaper) = &self.reaper {
      if panic::catch_unwind(AssertUnwindSafe(|| reaper(value))).is_err() {
        log::warn!("reaper panicked; value dropped");
      }
    }
  }

  pub(crate) fn reap_all<I>(&self, values: I)
  where
    I: IntoIterator<Item = Arc<V>>,
  {
    for value in values {
      self.reap(value);
    }
  }

  pub(crate) fn has_reaper(&self) -> bool {
    self.reaper.is_some()
  }

  /// How often the background sweeper runs. Short default TTLs get a short
  /// period so expired values are not left unswept for most of their
  /// afterlife; everything else sweeps rarely.
  pub(crate) fn sweep_interval(&self) -> Duration {
    if let Some(interval) = self.sweep_interval {
      return interval;
    }
    match self.default_ttl {
      Some(ttl) if ttl <= Duration::from_secs(1) => Duration::from_secs(60),
      _ => Duration::from_secs(15 * 60),
    }
  }
}

/// A builder for the four cache implementations.
///
/// ```
/// use quadmap::{CacheBuilder, CacheMap, Strategy, TimedValue};
///
/// let cache = CacheBuilder::<i32>::new()
///   .lookup(|key: &str| Ok(TimedValue::new(key.len() as i32)))
///   .build(Strategy::TwoLevel)
///   .unwrap();
///
/// assert_eq!(*cache.load_or_compute("four").unwrap(), 4);
/// cache.close();
/// ```
pub struct CacheBuilder<V> {
  lookup: Option<Lookup<V>>,
  reaper: Option<Reaper<V>>,
  default_ttl: Option<Duration>,
  sweep_interval: Option<Duration>,
}

impl<V> CacheBuilder<V> {
  pub fn new() -> Self {
    Self {
      lookup: None,
      reaper: None,
      default_ttl: None,
      sweep_interval: None,
    }
  }

  /// Sets the lookup function invoked by `load_or_compute` on a miss.
  ///
  /// The lookup may block, and may be called concurrently for different keys.
  /// It must not call back into the same cache for the same key; cross-key
  /// recursion is fine on [`TwoLevelMap`] (see the crate docs).
  pub fn lookup<F>(mut self, lookup: F) -> Self
  where
    F: Fn(&str) -> Result<TimedValue<V>, LookupError> + Send + Sync + 'static,
  {
    self.lookup = Some(Arc::new(lookup));
    self
  }

  /// Sets the reaper invoked with every value that leaves the cache, whether
  /// by replacement, `delete`, `gc`, or `close`.
  pub fn reaper<F>(mut self, reaper: F) -> Self
  where
    F: Fn(Arc<V>) + Send + Sync + 'static,
  {
    self.reaper = Some(Arc::new(reaper));
    self
  }

  /// Sets the expiry applied to values stored without one of their own.
  /// Must be greater than zero; `build` rejects a zero duration.
  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = Some(ttl);
    self
  }

  /// Overrides the background sweep interval. (Primarily for testing.)
  #[doc(hidden)]
  pub fn sweep_interval(mut self, interval: Duration) -> Self {
    self.sweep_interval = Some(interval);
    self
  }

  fn into_config(self) -> Result<CacheConfig<V>, BuildError> {
    if let Some(ttl) = self.default_ttl {
      if ttl.is_zero() {
        return Err(BuildError::InvalidDuration(ttl));
      }
    }
    Ok(CacheConfig {
      lookup: self.lookup,
      reaper: self.reaper,
      default_ttl: self.default_ttl,
      sweep_interval: self.sweep_interval,
    })
  }
}

impl<V> Default for CacheBuilder<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V: Send + Sync + 'static> CacheBuilder<V> {
  /// Builds the implementation selected by `strategy` behind the shared
  /// [`CacheMap`] trait.
  pub fn build(self, strategy: Strategy) -> Result<Box<dyn CacheMap<V>>, BuildError> {
    Ok(match strategy {
      Strategy::SerializedQueue => Box::new(self.build_queue()?),
      Strategy::CopyOnWrite => Box::new(self.build_cow()?),
      Strategy::CoarseMutex => Box::new(self.build_rwlock()?),
      Strategy::TwoLevel => Box::new(self.build_two_level()?),
    })
  }

  /// Builds a [`QueueMap`] with static dispatch.
  pub fn build_queue(self) -> Result<QueueMap<V>, BuildError> {
    Ok(QueueMap::new(self.into_config()?))
  }

  /// Builds a [`CowMap`] with static dispatch.
  pub fn build_cow(self) -> Result<CowMap<V>, BuildError> {
    Ok(CowMap::new(self.into_config()?))
  }

  /// Builds an [`RwLockMap`] with static dispatch.
  pub fn build_rwlock(self) -> Result<RwLockMap<V>, BuildError> {
    Ok(RwLockMap::new(self.into_config()?))
  }

  /// Builds a [`TwoLevelMap`] with static dispatch.
  pub fn build_two_level(self) -> Result<TwoLevelMap<V>, BuildError> {
    Ok(TwoLevelMap::new(self.into_config()?))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sweep_interval_tracks_default_ttl() {
    let slow = CacheBuilder::<i32>::new().into_config().unwrap();
    assert_eq!(slow.sweep_interval(), Duration::from_secs(15 * 60));

    let short_ttl = CacheBuilder::<i32>::new()
      .default_ttl(Duration::from_millis(500))
      .into_config()
      .unwrap();
    assert_eq!(short_ttl.sweep_interval(), Duration::from_secs(60));

    let long_ttl = CacheBuilder::<i32>::new()
      .default_ttl(Duration::from_secs(2))
      .into_config()
      .unwrap();
    assert_eq!(long_ttl.sweep_interval(), Duration::from_secs(15 * 60));

    let pinned = CacheBuilder::<i32>::new()
      .sweep_interval(Duration::from_millis(10))
      .into_config()
      .unwrap();
    assert_eq!(pinned.sweep_interval(), Duration::from_millis(10));
  }

  #[test]
  fn zero_ttl_fails_validation() {
    let err = CacheBuilder::<i32>::new()
      .default_ttl(Duration::ZERO)
      .into_config()
      .err();
    assert_eq!(err, Some(BuildError::InvalidDuration(Duration::ZERO)));
  }
}
