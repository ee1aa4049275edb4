//! The two-level strategy: an outer lock for membership, a per-entry lock
//! for each value.
//!
//! The outer lock is held only long enough to find, insert, or remove a
//! slot; everything slow happens under the slot's own lock. Reads of
//! different keys never contend, writes to different keys proceed in
//! parallel, and a slow lookup stalls only the callers of its own key. This
//! is the strategy that wins high-concurrency mixed workloads.

use crate::builder::CacheConfig;
use crate::entry::{StoredValue, TimedValue};
use crate::error::LoadError;
use crate::map::CacheMap;
use crate::pairs::Pairs;
use crate::task::sweeper::Sweeper;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// The per-key container: a lock and the value it protects. The slot
/// outlives its entry so a lookup in flight for one key never holds the
/// outer map hostage.
type EntrySlot<V> = Arc<RwLock<Option<StoredValue<V>>>>;

type SlotTable<V> = HashMap<String, EntrySlot<V>, ahash::RandomState>;

/// A cache with per-key locking under a membership lock.
pub struct TwoLevelMap<V> {
  inner: Arc<Inner<V>>,
  sweeper: Mutex<Option<Sweeper>>,
}

struct Inner<V> {
  slots: RwLock<SlotTable<V>>,
  config: CacheConfig<V>,
}

impl<V: Send + Sync + 'static> TwoLevelMap<V> {
  pub(crate) fn new(config: CacheConfig<V>) -> Self {
    let interval = config.sweep_interval();
    let inner = Arc::new(Inner {
      slots: RwLock::new(SlotTable::default()),
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
  /// Returns the slot for `key`, creating it if missing. The outer lock is
  /// held read-side on the fast path and promoted to a write lock only to
  /// insert a brand-new slot.
  fn slot(&self, key: &str) -> EntrySlot<V> {
    if let Some(slot) = self.slots.read().get(key) {
      return Arc::clone(slot);
    }
    let mut slots = self.slots.write();
    // Re-check: another writer may have created the slot while we waited
    // for the promotion.
    Arc::clone(slots.entry(key.to_owned()).or_default())
  }

  /// Lock order is always outer then slot, matching every other operation.
  /// Slots whose value is gone (expired here, or cleared by a failed
  /// lookup) are pruned along with their entries.
  fn sweep(&self) {
    let mut displaced = Vec::new();
    {
      let mut slots = self.slots.write();
      let now = Instant::now();
      slots.retain(|_, slot| {
        let entry = slot.write();
        match entry.as_ref() {
          Some(stored) if stored.is_expired(now) => {
            displaced.push(stored.value());
            false
          }
          Some(_) => true,
          None => false,
        }
      });
    }
    self.config.reap_all(displaced);
  }
}

impl<V: Send + Sync + 'static> CacheMap<V> for TwoLevelMap<V> {
  fn store(&self, key: &str, value: TimedValue<V>) {
    let entry = StoredValue::new(value, self.inner.config.default_ttl);
    let slot = self.inner.slot(key);
    let prior = slot.write().replace(entry);
    if let Some(prior) = prior {
      self.inner.config.reap(prior.value);
    }
  }

  fn load(&self, key: &str) -> Option<Arc<V>> {
    let slot = {
      let slots = self.inner.slots.read();
      Arc::clone(slots.get(key)?)
    };
    let entry = slot.read();
    match entry.as_ref() {
      Some(stored) if !stored.is_expired(Instant::now()) => Some(stored.value()),
      _ => None,
    }
  }

  fn load_or_compute(&self, key: &str) -> Result<Arc<V>, LoadError> {
    let slot = self.inner.slot(key);
    let mut entry = slot.write();

    // Another caller may have filled the slot while we waited for its lock.
    if let Some(stored) = entry.as_ref() {
      if !stored.is_expired(Instant::now()) {
        return Ok(stored.value());
      }
    }

    // The slot lock stays held across the lookup: one lookup per key at a
    // time, while other keys proceed untouched.
    let prior = entry.take().map(|stored| stored.value);
    let result = match self.inner.config.lookup(key) {
      Ok(timed) => {
        let stored = StoredValue::new(timed, self.inner.config.default_ttl);
        let value = stored.value();
        *entry = Some(stored);
        Ok(value)
      }
      // The slot stays value-empty; the next sweep prunes it.
      Err(err) => Err(err),
    };
    drop(entry);

    if let Some(prior) = prior {
      self.inner.config.reap(prior);
    }
    result
  }

  fn delete(&self, key: &str) {
    let slot = self.inner.slots.write().remove(key);
    if let Some(slot) = slot {
      let prior = slot.write().take();
      if let Some(prior) = prior {
        self.inner.config.reap(prior.value);
      }
    }
  }

  fn gc(&self) {
    self.inner.sweep();
  }

  fn keys(&self) -> Vec<String> {
    self.inner.slots.read().keys().cloned().collect()
  }

  fn pairs(&self) -> Pairs<V> {
    // Snapshot the slot list under the outer read lock; the emitter thread
    // then takes each slot lock only briefly, checking expiry as it goes.
    let snapshot: Vec<(String, EntrySlot<V>)> = self
      .inner
      .slots
      .read()
      .iter()
      .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
      .collect();

    let (tx, rx) = crossbeam_channel::bounded(0);
    thread::spawn(move || {
      let now = Instant::now();
      for (key, slot) in snapshot {
        let value = {
          let entry = slot.read();
          match entry.as_ref() {
            Some(stored) if !stored.is_expired(now) => Some(stored.value()),
            _ => None,
          }
        };
        if let Some(value) = value {
          if tx.send((key, value)).is_err() {
            break; // consumer abandoned the iterator
          }
        }
      }
    });
    Pairs::handoff(rx)
  }

  fn close(&self) {
    if let Some(sweeper) = self.sweeper.lock().take() {
      sweeper.stop();
    }
    let slots: Vec<EntrySlot<V>> = {
      let mut table = self.inner.slots.write();
      table.drain().map(|(_, slot)| slot).collect()
    };
    for slot in slots {
      let prior = slot.write().take();
      if let Some(prior) = prior {
        self.inner.config.reap(prior.value);
      }
    }
  }
}

impl<V> Drop for TwoLevelMap<V> {
  fn drop(&mut self) {
    if let Some(sweeper) = self.sweeper.lock().take() {
      sweeper.stop();
    }
  }
}
