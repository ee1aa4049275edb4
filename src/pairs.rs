use crossbeam_channel::Receiver;
use std::sync::Arc;

/// An iterator over a snapshot of a map's non-expired entries, returned by
/// [`CacheMap::pairs`](crate::CacheMap::pairs).
///
/// The keyset is fixed when `pairs` is called; each pair is yielded at most
/// once, and an entry's expiry is checked at the moment its slot is
/// inspected. Dropping the iterator early is fine: implementations that
/// stream pairs from a background emitter detect the abandoned hand-off and
/// stop.
pub struct Pairs<V> {
  inner: PairsInner<V>,
}

enum PairsInner<V> {
  /// The snapshot was materialized up front.
  Ready(std::vec::IntoIter<(String, Arc<V>)>),
  /// Pairs stream in from an emitter thread as slots are inspected.
  Handoff(Receiver<(String, Arc<V>)>),
}

impl<V> Pairs<V> {
  pub(crate) fn ready(pairs: Vec<(String, Arc<V>)>) -> Self {
    Self {
      inner: PairsInner::Ready(pairs.into_iter()),
    }
  }

  pub(crate) fn handoff(receiver: Receiver<(String, Arc<V>)>) -> Self {
    Self {
      inner: PairsInner::Handoff(receiver),
    }
  }
}

impl<V> Iterator for Pairs<V> {
  type Item = (String, Arc<V>);

  fn next(&mut self) -> Option<Self::Item> {
    match &mut self.inner {
      PairsInner::Ready(iter) => iter.next(),
      PairsInner::Handoff(receiver) => receiver.recv().ok(),
    }
  }
}
