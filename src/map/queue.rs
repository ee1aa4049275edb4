//! The serialized-queue strategy: one owner thread runs every operation.
//!
//! Callers box each operation as a closure and hand it to the owner over a
//! rendezvous channel, then block on a reply channel. Data races are
//! impossible by construction, and heavy write contention costs nothing
//! extra because the work was already linearized. Every operation pays a
//! channel hand-off, though, and a lookup runs inline on the owner, so a
//! slow lookup stalls the whole map for its duration.

use crate::builder::CacheConfig;
use crate::entry::{StoredValue, TimedValue};
use crate::error::LoadError;
use crate::map::{CacheMap, Table};
use crate::pairs::Pairs;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

type Task<V> = Box<dyn FnOnce(&mut Table<V>) + Send>;

/// A cache whose table is owned by a single worker thread.
pub struct QueueMap<V> {
  queue: Sender<Task<V>>,
  /// `close` sends a reply channel; the owner drains the table into it and
  /// exits.
  halt: Sender<Sender<Vec<Arc<V>>>>,
  handle: Mutex<Option<JoinHandle<()>>>,
  config: Arc<CacheConfig<V>>,
}

impl<V: Send + Sync + 'static> QueueMap<V> {
  pub(crate) fn new(config: CacheConfig<V>) -> Self {
    let config = Arc::new(config);
    let (queue_tx, queue_rx) = bounded::<Task<V>>(0);
    let (halt_tx, halt_rx) = bounded::<Sender<Vec<Arc<V>>>>(1);
    let handle = {
      let config = Arc::clone(&config);
      thread::spawn(move || run(queue_rx, halt_rx, config))
    };
    Self {
      queue: queue_tx,
      halt: halt_tx,
      handle: Mutex::new(Some(handle)),
      config,
    }
  }

  /// Ships a closure to the owner and blocks for its reply. Returns `None`
  /// if the owner has already exited (the map was closed).
  fn call<R, F>(&self, op: F) -> Option<R>
  where
    R: Send + 'static,
    F: FnOnce(&mut Table<V>) -> R + Send + 'static,
  {
    let (reply_tx, reply_rx) = bounded(1);
    let task: Task<V> = Box::new(move |table| {
      let _ = reply_tx.send(op(table));
    });
    if self.queue.send(task).is_err() {
      return None;
    }
    reply_rx.recv().ok()
  }
}

/// The owner loop. Also acts as the sweeper: the timeout branch sweeps the
/// table directly rather than re-enqueuing onto its own queue.
fn run<V: Send + Sync + 'static>(
  queue: Receiver<Task<V>>,
  halt: Receiver<Sender<Vec<Arc<V>>>>,
  config: Arc<CacheConfig<V>>,
) {
  let interval = config.sweep_interval();
  let mut table = Table::default();
  loop {
    select! {
      recv(queue) -> task => match task {
        Ok(task) => task(&mut table),
        Err(_) => break, // all handles dropped without close
      },
      recv(halt) -> reply => {
        let survivors: Vec<Arc<V>> =
          table.drain().map(|(_, entry)| entry.value).collect();
        if let Ok(reply) = reply {
          let _ = reply.send(survivors);
        }
        break;
      },
      default(interval) => {
        let mut expired = Vec::new();
        let now = Instant::now();
        table.retain(|_, entry| {
          if entry.is_expired(now) {
            expired.push(entry.value());
            false
          } else {
            true
          }
        });
        // Reaps run on a detached thread: user code must not be able to
        // starve the queue.
        if !expired.is_empty() && config.has_reaper() {
          let config = Arc::clone(&config);
          thread::spawn(move || config.reap_all(expired));
        }
      },
    }
  }
}

impl<V: Send + Sync + 'static> CacheMap<V> for QueueMap<V> {
  fn store(&self, key: &str, value: TimedValue<V>) {
    let entry = StoredValue::new(value, self.config.default_ttl);
    let key = key.to_owned();
    let prior = self.call(move |table| table.insert(key, entry)).flatten();
    if let Some(prior) = prior {
      self.config.reap(prior.value);
    }
  }

  fn load(&self, key: &str) -> Option<Arc<V>> {
    let key = key.to_owned();
    self
      .call(move |table| {
        let now = Instant::now();
        table
          .get(&key)
          .filter(|entry| !entry.is_expired(now))
          .map(|entry| entry.value())
      })
      .flatten()
  }

  fn load_or_compute(&self, key: &str) -> Result<Arc<V>, LoadError> {
    let key = key.to_owned();
    let config = Arc::clone(&self.config);
    let outcome = self.call(move |table| {
      if let Some(entry) = table.get(&key) {
        if !entry.is_expired(Instant::now()) {
          return (Ok(entry.value()), None);
        }
      }

      // Miss, or expired in place. The lookup runs inline on the owner:
      // single-flight degenerates to one lookup at a time for the whole
      // map, traded for not having to juggle continuations.
      let prior = table.remove(&key).map(|entry| entry.value);
      match config.lookup(&key) {
        Ok(timed) => {
          let entry = StoredValue::new(timed, config.default_ttl);
          let value = entry.value();
          table.insert(key, entry);
          (Ok(value), prior)
        }
        Err(err) => (Err(err), prior),
      }
    });

    match outcome {
      Some((result, prior)) => {
        if let Some(prior) = prior {
          self.config.reap(prior);
        }
        result
      }
      // The owner is gone; behave like an empty map with no lookup.
      None => Err(LoadError::NoLookupDefined),
    }
  }

  fn delete(&self, key: &str) {
    let key = key.to_owned();
    let prior = self.call(move |table| table.remove(&key)).flatten();
    if let Some(prior) = prior {
      self.config.reap(prior.value);
    }
  }

  fn gc(&self) {
    let expired = self
      .call(|table| {
        let mut expired = Vec::new();
        let now = Instant::now();
        table.retain(|_, entry| {
          if entry.is_expired(now) {
            expired.push(entry.value());
            false
          } else {
            true
          }
        });
        expired
      })
      .unwrap_or_default();
    self.config.reap_all(expired);
  }

  fn keys(&self) -> Vec<String> {
    self
      .call(|table| table.keys().cloned().collect())
      .unwrap_or_default()
  }

  fn pairs(&self) -> Pairs<V> {
    let pairs = self
      .call(|table| {
        let now = Instant::now();
        table
          .iter()
          .filter(|(_, entry)| !entry.is_expired(now))
          .map(|(key, entry)| (key.clone(), entry.value()))
          .collect()
      })
      .unwrap_or_default();
    Pairs::ready(pairs)
  }

  fn close(&self) {
    let (reply_tx, reply_rx) = bounded(1);
    if self.halt.send(reply_tx).is_err() {
      return; // already closed
    }
    let survivors = reply_rx.recv().unwrap_or_default();
    if let Some(handle) = self.handle.lock().take() {
      let _ = handle.join();
    }
    self.config.reap_all(survivors);
  }
}
