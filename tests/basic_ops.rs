mod common;

use common::STRATEGIES;
use quadmap::{CacheBuilder, CacheMap, TimedValue};

#[test]
fn store_then_load_round_trip() {
  for strategy in STRATEGIES {
    let cache = CacheBuilder::<i32>::new().build(strategy).unwrap();
    cache.store("hit", TimedValue::new(42));
    assert!(cache.load("miss").is_none(), "{strategy:?}");
    assert_eq!(*cache.load("hit").unwrap(), 42, "{strategy:?}");
    cache.close();
  }
}

#[test]
fn store_replaces_prior_value() {
  for strategy in STRATEGIES {
    let cache = CacheBuilder::<i32>::new().build(strategy).unwrap();
    cache.store("k", TimedValue::new(1));
    cache.store("k", TimedValue::new(2));
    assert_eq!(*cache.load("k").unwrap(), 2, "{strategy:?}");
    cache.close();
  }
}

#[test]
fn delete_removes_entry() {
  for strategy in STRATEGIES {
    let cache = CacheBuilder::<i32>::new().build(strategy).unwrap();
    cache.store("k", TimedValue::new(42));
    cache.delete("k");
    assert!(cache.load("k").is_none(), "{strategy:?}");

    // Deleting an absent key is a quiet no-op.
    cache.delete("never-stored");
    cache.close();
  }
}

#[test]
fn store_after_delete_revives_key() {
  for strategy in STRATEGIES {
    let cache = CacheBuilder::<i32>::new().build(strategy).unwrap();
    cache.store("k", TimedValue::new(1));
    cache.delete("k");
    cache.store("k", TimedValue::new(2));
    assert_eq!(*cache.load("k").unwrap(), 2, "{strategy:?}");
    cache.close();
  }
}

#[test]
fn keys_returns_current_keyset() {
  for strategy in STRATEGIES {
    let cache = CacheBuilder::<i32>::new().build(strategy).unwrap();
    cache.store("abc", TimedValue::new(123));
    cache.store("def", TimedValue::new(456));

    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec!["abc".to_string(), "def".to_string()], "{strategy:?}");
    cache.close();
  }
}
