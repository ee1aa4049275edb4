mod common;

use common::STRATEGIES;
use quadmap::{CacheBuilder, CacheMap, TimedValue};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn recording_cache(
  strategy: quadmap::Strategy,
) -> (Box<dyn CacheMap<i32>>, Arc<Mutex<Vec<i32>>>) {
  let reaped: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
  let cache = CacheBuilder::<i32>::new()
    .reaper({
      let reaped = Arc::clone(&reaped);
      move |value| reaped.lock().unwrap().push(*value)
    })
    .build(strategy)
    .unwrap();
  (cache, reaped)
}

#[test]
fn reaper_runs_on_replace_and_delete() {
  for strategy in STRATEGIES {
    let (cache, reaped) = recording_cache(strategy);

    cache.store("k", TimedValue::new(1));
    assert!(reaped.lock().unwrap().is_empty(), "{strategy:?}");

    cache.store("k", TimedValue::new(2));
    assert_eq!(*reaped.lock().unwrap(), vec![1], "{strategy:?}");

    cache.delete("k");
    assert_eq!(*reaped.lock().unwrap(), vec![1, 2], "{strategy:?}");
    cache.close();
  }
}

#[test]
fn reaper_runs_when_replacing_an_expired_entry() {
  for strategy in STRATEGIES {
    let (cache, reaped) = recording_cache(strategy);

    cache.store("k", TimedValue::expires_in(1, Duration::from_nanos(1)));
    thread::sleep(Duration::from_millis(1));
    cache.store("k", TimedValue::new(2));

    // The expired value was displaced by the replacement, so it is owed
    // exactly one reap even though no sweep ever saw it.
    assert_eq!(*reaped.lock().unwrap(), vec![1], "{strategy:?}");
    cache.close();
    assert_eq!(*reaped.lock().unwrap(), vec![1, 2], "{strategy:?}");
  }
}

#[test]
fn reaper_runs_on_gc() {
  for strategy in STRATEGIES {
    let (cache, reaped) = recording_cache(strategy);

    cache.store("k", TimedValue::expires_in(42, Duration::from_nanos(1)));
    thread::sleep(Duration::from_millis(1));
    cache.gc();

    assert_eq!(*reaped.lock().unwrap(), vec![42], "{strategy:?}");
    cache.close();
  }
}

#[test]
fn gc_leaves_live_entries_alone() {
  for strategy in STRATEGIES {
    let (cache, reaped) = recording_cache(strategy);

    cache.store("live", TimedValue::new(1));
    cache.store("dead", TimedValue::expires_in(2, Duration::from_nanos(1)));
    thread::sleep(Duration::from_millis(1));
    cache.gc();

    assert_eq!(*reaped.lock().unwrap(), vec![2], "{strategy:?}");
    assert_eq!(*cache.load("live").unwrap(), 1, "{strategy:?}");
    cache.close();
  }
}

#[test]
fn close_reaps_every_survivor_exactly_once() {
  for strategy in STRATEGIES {
    let (cache, reaped) = recording_cache(strategy);

    cache.store("a", TimedValue::new(1));
    cache.store("b", TimedValue::new(2));
    cache.close();

    let mut values = reaped.lock().unwrap().clone();
    values.sort();
    assert_eq!(values, vec![1, 2], "{strategy:?}");

    // A second close has nothing left to drain.
    cache.close();
    assert_eq!(reaped.lock().unwrap().len(), 2, "{strategy:?}");
  }
}

#[test]
fn failed_lookup_reaps_only_the_displaced_prior() {
  for strategy in STRATEGIES {
    let reaped: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let cache = CacheBuilder::<i32>::new()
      .reaper({
        let reaped = Arc::clone(&reaped);
        move |value| reaped.lock().unwrap().push(*value)
      })
      .lookup(|_key: &str| Err("backend down".into()))
      .build(strategy)
      .unwrap();

    // A miss with no prior value: nothing to reap.
    assert!(cache.load_or_compute("fresh").is_err(), "{strategy:?}");
    assert!(reaped.lock().unwrap().is_empty(), "{strategy:?}");

    // An expired prior is displaced by the failed attempt and reaped once;
    // the slot itself stays empty.
    cache.store("k", TimedValue::expires_in(1, Duration::from_nanos(1)));
    thread::sleep(Duration::from_millis(1));
    assert!(cache.load_or_compute("k").is_err(), "{strategy:?}");
    assert_eq!(*reaped.lock().unwrap(), vec![1], "{strategy:?}");
    assert!(cache.load("k").is_none(), "{strategy:?}");

    cache.close();
    assert_eq!(*reaped.lock().unwrap(), vec![1], "{strategy:?}");
  }
}

#[test]
fn panicking_reaper_does_not_corrupt_the_map() {
  for strategy in STRATEGIES {
    let survived = Arc::new(AtomicUsize::new(0));
    let cache = CacheBuilder::<i32>::new()
      .reaper({
        let survived = Arc::clone(&survived);
        move |value| {
          if *value == 1 {
            panic!("user reaper exploded");
          }
          survived.fetch_add(1, Ordering::SeqCst);
        }
      })
      .build(strategy)
      .unwrap();

    cache.store("k", TimedValue::new(1));
    cache.store("k", TimedValue::new(2)); // reap of 1 panics, is caught

    assert_eq!(*cache.load("k").unwrap(), 2, "{strategy:?}");
    cache.close(); // reap of 2 still happens
    assert_eq!(survived.load(Ordering::SeqCst), 1, "{strategy:?}");
  }
}
