//! The coarse-mutex strategy: one reader/writer lock over the whole table.
//!
//! Simplest mental model and the baseline the other strategies are measured
//! against. Reads share the lock; every mutation takes it exclusively, and a
//! miss in `load_or_compute` holds it across the lookup, so one lookup
//! anywhere in the map blocks every other operation.

use crate::builder::CacheConfig;
use crate::entry::{StoredValue, TimedValue};
use crate::error::LoadError;
use crate::map::{CacheMap, Table};
use crate::pairs::Pairs;
use crate::task::sweeper::Sweeper;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// A cache guarded by a single `RwLock`.
pub struct RwLockMap<V> {
  inner: Arc<Inner<V>>,
  sweeper: Mutex<Option<Sweeper>>,
}

struct Inner<V> {
  table: RwLock<Table<V>>,
  config: CacheConfig<V>,
}

impl<V: Send + Sync + 'static> RwLockMap<V> {
  pub(crate) fn new(config: CacheConfig<V>) -> Self {
    let interval = config.sweep_interval();
    let inner = Arc::new(Inner {
      table: RwLock::new(Table::default()),
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
  /// Removes expired entries under the write lock, then reaps the displaced
  /// values with the lock released.
  fn sweep(&self) {
    let mut expired = Vec::new();
    {
      let mut table = self.table.write();
      let now = Instant::now();
      table.retain(|_, entry| {
        if entry.is_expired(now) {
          expired.push(entry.value());
          false
        } else {
          true
        }
      });
    }
    self.config.reap_all(expired);
  }
}

impl<V: Send + Sync + 'static> CacheMap<V> for RwLockMap<V> {
  fn store(&self, key: &str, value: TimedValue<V>) {
    let entry = StoredValue::new(value, self.inner.config.default_ttl);
    let prior = self.inner.table.write().insert(key.to_owned(), entry);
    if let Some(prior) = prior {
      self.inner.config.reap(prior.value);
    }
  }

  fn load(&self, key: &str) -> Option<Arc<V>> {
    let entry = self.inner.table.read().get(key).cloned()?;
    if entry.is_expired(Instant::now()) {
      None
    } else {
      Some(entry.value)
    }
  }

  fn load_or_compute(&self, key: &str) -> Result<Arc<V>, LoadError> {
    let mut table = self.inner.table.write();
    if let Some(entry) = table.get(key) {
      if !entry.is_expired(Instant::now()) {
        return Ok(entry.value());
      }
    }

    // Miss, or expired in place. The write lock stays held across the
    // lookup: the strongest possible coalescing, at the cost of stalling
    // every other operation behind a slow lookup.
    let prior = table.remove(key);
    let result = match self.inner.config.lookup(key) {
      Ok(timed) => {
        let entry = StoredValue::new(timed, self.inner.config.default_ttl);
        let value = entry.value();
        table.insert(key.to_owned(), entry);
        Ok(value)
      }
      Err(err) => Err(err),
    };
    drop(table);

    if let Some(prior) = prior {
      self.inner.config.reap(prior.value);
    }
    result
  }

  fn delete(&self, key: &str) {
    let prior = self.inner.table.write().remove(key);
    if let Some(prior) = prior {
      self.inner.config.reap(prior.value);
    }
  }

  fn gc(&self) {
    self.inner.sweep();
  }

  fn keys(&self) -> Vec<String> {
    self.inner.table.read().keys().cloned().collect()
  }

  fn pairs(&self) -> Pairs<V> {
    // Snapshot under the read lock, then emit from a detached thread so the
    // consumer never holds the table hostage.
    let snapshot: Vec<(String, StoredValue<V>)> = self
      .inner
      .table
      .read()
      .iter()
      .map(|(key, entry)| (key.clone(), entry.clone()))
      .collect();

    let (tx, rx) = crossbeam_channel::bounded(0);
    thread::spawn(move || {
      let now = Instant::now();
      for (key, entry) in snapshot {
        if entry.is_expired(now) {
          continue;
        }
        if tx.send((key, entry.value)).is_err() {
          break; // consumer abandoned the iterator
        }
      }
    });
    Pairs::handoff(rx)
  }

  fn close(&self) {
    if let Some(sweeper) = self.sweeper.lock().take() {
      sweeper.stop();
    }
    let survivors: Vec<StoredValue<V>> = {
      let mut table = self.inner.table.write();
      table.drain().map(|(_, entry)| entry).collect()
    };
    for entry in survivors {
      self.inner.config.reap(entry.value);
    }
  }
}

impl<V> Drop for RwLockMap<V> {
  fn drop(&mut self) {
    if let Some(sweeper) = self.sweeper.lock().take() {
      sweeper.stop();
    }
  }
}
