use crossbeam_channel::{bounded, select, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The background task that periodically sweeps a map's expired entries.
///
/// One sweeper runs per cache from construction until `close` (the
/// serialized-queue map is the exception: its owner thread doubles as the
/// sweeper). `stop` signals the thread over the halt channel and joins it, so
/// a caller that has stopped the sweeper knows no further sweep is in flight.
pub(crate) struct Sweeper {
  halt: Sender<()>,
  handle: Option<JoinHandle<()>>,
}

impl Sweeper {
  pub(crate) fn spawn<F>(interval: Duration, tick: F) -> Self
  where
    F: Fn() + Send + 'static,
  {
    let (halt_tx, halt_rx) = bounded::<()>(1);
    let handle = thread::spawn(move || {
      log::trace!("sweeper running every {:?}", interval);
      loop {
        select! {
          recv(halt_rx) -> _ => break,
          default(interval) => tick(),
        }
      }
      log::trace!("sweeper halted");
    });

    Self {
      halt: halt_tx,
      handle: Some(handle),
    }
  }

  /// Signals the sweeper thread and waits for it to exit.
  pub(crate) fn stop(mut self) {
    let _ = self.halt.send(());
    if let Some(handle) = self.handle.take() {
      let _ = handle.join();
    }
  }
}
