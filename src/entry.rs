use std::sync::Arc;
use std::time::{Duration, Instant};

/// A value paired with an optional absolute expiry instant.
///
/// This is the single ingress type for `store` and for lookup results. A
/// `TimedValue` built with [`TimedValue::new`] carries no expiry of its own;
/// the cache applies its `default_ttl` (if one was configured) when the value
/// is installed. An explicit expiry set with [`TimedValue::expires_at`] or
/// [`TimedValue::expires_in`] always wins over the default TTL.
#[derive(Debug, Clone)]
pub struct TimedValue<V> {
  pub(crate) value: V,
  pub(crate) expiry: Option<Instant>,
}

impl<V> TimedValue<V> {
  /// Wraps a value with no expiry of its own.
  pub fn new(value: V) -> Self {
    Self {
      value,
      expiry: None,
    }
  }

  /// Wraps a value that becomes invalid at `expiry`.
  pub fn expires_at(value: V, expiry: Instant) -> Self {
    Self {
      value,
      expiry: Some(expiry),
    }
  }

  /// Wraps a value that becomes invalid `ttl` from now.
  pub fn expires_in(value: V, ttl: Duration) -> Self {
    Self {
      value,
      expiry: Some(Instant::now() + ttl),
    }
  }
}

impl<V> From<V> for TimedValue<V> {
  fn from(value: V) -> Self {
    Self::new(value)
  }
}

/// The form an entry takes inside a map: the value behind an `Arc` so reads
/// and the reaper can share it, plus its resolved expiry.
#[derive(Debug)]
pub(crate) struct StoredValue<V> {
  pub(crate) value: Arc<V>,
  expiry: Option<Instant>,
}

// Manual impl: `Arc<V>` clones without requiring `V: Clone`.
impl<V> Clone for StoredValue<V> {
  fn clone(&self) -> Self {
    Self {
      value: Arc::clone(&self.value),
      expiry: self.expiry,
    }
  }
}

impl<V> StoredValue<V> {
  /// Resolves the entry's expiry: an explicit expiry on the `TimedValue`
  /// takes precedence, then `now + default_ttl`, then none.
  pub(crate) fn new(timed: TimedValue<V>, default_ttl: Option<Duration>) -> Self {
    let TimedValue { value, expiry } = timed;
    let expiry = expiry.or_else(|| default_ttl.map(|ttl| Instant::now() + ttl));
    Self {
      value: Arc::new(value),
      expiry,
    }
  }

  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    Arc::clone(&self.value)
  }

  #[inline]
  pub(crate) fn is_expired(&self, now: Instant) -> bool {
    self.expiry.map_or(false, |at| now >= at)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_ttl_applies_only_without_explicit_expiry() {
    let ttl = Some(Duration::from_secs(60));

    let from_default = StoredValue::new(TimedValue::new(1), ttl);
    assert!(from_default.expiry.is_some());

    let explicit = Instant::now() + Duration::from_secs(5);
    let from_explicit = StoredValue::new(TimedValue::expires_at(1, explicit), ttl);
    assert_eq!(from_explicit.expiry, Some(explicit));

    let unbounded = StoredValue::new(TimedValue::new(1), None);
    assert_eq!(unbounded.expiry, None);
  }

  #[test]
  fn expiry_boundary_is_inclusive() {
    let at = Instant::now();
    let stored = StoredValue::new(TimedValue::expires_at(1, at), None);
    assert!(stored.is_expired(at));
    assert!(!StoredValue::new(TimedValue::new(1), None).is_expired(at));
  }
}
