//! The copy-on-write strategy: readers share an immutable snapshot.
//!
//! A read-mostly workload sees no contention at all: `load` grabs the
//! published snapshot pointer and works on it without further
//! synchronization. Every write serializes on a mutex, rebuilds the table
//! from the current snapshot, and publishes the successor. Writes are O(n)
//! in the entry count, so a large keyset under heavy mutation belongs in one
//! of the other strategies.

use crate::builder::CacheConfig;
use crate::entry::{StoredValue, TimedValue};
use crate::error::LoadError;
use crate::map::{CacheMap, Table};
use crate::pairs::Pairs;
use crate::task::sweeper::Sweeper;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// A cache whose state is an atomically swappable immutable snapshot.
pub struct CowMap<V> {
  inner: Arc<Inner<V>>,
  sweeper: Mutex<Option<Sweeper>>,
}

struct Inner<V> {
  /// Serializes writers. Readers never touch it.
  write_lock: Mutex<()>,
  /// The published snapshot. Readers hold this lock only long enough to
  /// clone the `Arc`; writers only long enough to store the successor.
  snapshot: RwLock<Arc<Table<V>>>,
  config: CacheConfig<V>,
}

impl<V: Send + Sync + 'static> CowMap<V> {
  pub(crate) fn new(config: CacheConfig<V>) -> Self {
    let interval = config.sweep_interval();
    let inner = Arc::new(Inner {
      write_lock: Mutex::new(()),
      snapshot: RwLock::new(Arc::new(Table::default())),
      config,
    });
    let sweeper = {
      let inner = Arc::clone(&inner);
      Sweeper::spawn(interval, move || inner.sweep())
    };
    Self {
      inner,
      sweeper: Mutex::new(Some(sweeper)),
    }
  }
}

impl<V: Send + Sync> Inner<V> {
  fn current(&self) -> Arc<Table<V>> {
    Arc::clone(&self.snapshot.read())
  }

  fn publish(&self, next: Table<V>) {
    *self.snapshot.write() = Arc::new(next);
  }

  /// Builds the successor table: every non-expired entry of `current` is
  /// copied; expired entries are dropped and their values recorded for the
  /// reaper (they are displaced by the rebuild).
  fn rebuild(&self, current: &Table<V>, displaced: &mut Vec<Arc<V>>) -> Table<V> {
    let now = Instant::now();
    let mut next = Table::with_capacity_and_hasher(current.len(), Default::default());
    for (key, entry) in current.iter() {
      if entry.is_expired(now) {
        displaced.push(entry.value());
      } else {
        next.insert(key.clone(), entry.clone());
      }
    }
    next
  }

  fn sweep(&self) {
    let mut displaced = Vec::new();
    {
      let _writer = self.write_lock.lock();
      let current = self.current();
      let next = self.rebuild(&current, &mut displaced);
      self.publish(next);
    }
    self.config.reap_all(displaced);
  }
}

impl<V: Send + Sync + 'static> CacheMap<V> for CowMap<V> {
  fn store(&self, key: &str, value: TimedValue<V>) {
    let entry = StoredValue::new(value, self.inner.config.default_ttl);
    let mut displaced = Vec::new();
    {
      let _writer = self.inner.write_lock.lock();
      let current = self.inner.current();
      let mut next = self.inner.rebuild(&current, &mut displaced);
      if let Some(prior) = next.insert(key.to_owned(), entry) {
        displaced.push(prior.value);
      }
      self.inner.publish(next);
    }
    self.inner.config.reap_all(displaced);
  }

  fn load(&self, key: &str) -> Option<Arc<V>> {
    let snapshot = self.inner.current();
    let entry = snapshot.get(key)?;
    if entry.is_expired(Instant::now()) {
      None
    } else {
      Some(entry.value())
    }
  }

  fn load_or_compute(&self, key: &str) -> Result<Arc<V>, LoadError> {
    let mut displaced = Vec::new();
    let result;
    {
      let _writer = self.inner.write_lock.lock();
      let current = self.inner.current();
      if let Some(entry) = current.get(key) {
        if !entry.is_expired(Instant::now()) {
          return Ok(entry.value());
        }
      }

      // The writer mutex stays held across the lookup, so at most one
      // lookup runs anywhere in this map at a time. The rebuild drops the
      // expired prior entry either way; on error nothing new is installed.
      result = match self.inner.config.lookup(key) {
        Ok(timed) => {
          let entry = StoredValue::new(timed, self.inner.config.default_ttl);
          let value = entry.value();
          let mut next = self.inner.rebuild(&current, &mut displaced);
          next.insert(key.to_owned(), entry);
          self.inner.publish(next);
          Ok(value)
        }
        Err(err) => {
          let next = self.inner.rebuild(&current, &mut displaced);
          self.inner.publish(next);
          Err(err)
        }
      };
    }
    self.inner.config.reap_all(displaced);
    result
  }

  fn delete(&self, key: &str) {
    let mut displaced = Vec::new();
    {
      let _writer = self.inner.write_lock.lock();
      let current = self.inner.current();
      let mut next = self.inner.rebuild(&current, &mut displaced);
      if let Some(prior) = next.remove(key) {
        displaced.push(prior.value);
      }
      self.inner.publish(next);
    }
    self.inner.config.reap_all(displaced);
  }

  fn gc(&self) {
    self.inner.sweep();
  }

  fn keys(&self) -> Vec<String> {
    self.inner.current().keys().cloned().collect()
  }

  fn pairs(&self) -> Pairs<V> {
    // The snapshot is already immutable; filter it once and hand the whole
    // batch to the iterator.
    let snapshot = self.inner.current();
    let now = Instant::now();
    let pairs = snapshot
      .iter()
      .filter(|(_, entry)| !entry.is_expired(now))
      .map(|(key, entry)| (key.clone(), entry.value()))
      .collect();
    Pairs::ready(pairs)
  }

  fn close(&self) {
    if let Some(sweeper) = self.sweeper.lock().take() {
      sweeper.stop();
    }
    let survivors: Vec<Arc<V>> = {
      let _writer = self.inner.write_lock.lock();
      let current = self.inner.current();
      self.inner.publish(Table::default());
      current.values().map(|entry| entry.value()).collect()
    };
    self.inner.config.reap_all(survivors);
  }
}

impl<V> Drop for CowMap<V> {
  fn drop(&mut self) {
    if let Some(sweeper) = self.sweeper.lock().take() {
      sweeper.stop();
    }
  }
}
