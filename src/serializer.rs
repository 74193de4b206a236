//! Output serializer
//!
//! The single point of contention between concurrent input sources. Every
//! key event is turned into a press frame, a timed hold, and a release
//! frame, all inside one critical section, so the sink only ever observes
//! complete (press, release) pairs in lock-arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::trace;

use crate::keymap::KeyEvent;
use crate::sink::{KeySink, SinkError};

/// How long a press is held before the release frame. Hosts need the
/// pressed state to persist long enough to register a distinct report.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(50);

/// Gap after the release frame before the next event may start.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(10);

/// Serializes key events from any number of concurrent sessions onto one
/// sink.
///
/// The tokio mutex queues waiters in FIFO order, which is the only fairness
/// the pipeline needs at human typing rates. The lock is held for the whole
/// press/dwell/release/settle window and released on every path, including
/// sink failures, via guard drop.
pub struct Serializer {
    sink: Mutex<Box<dyn KeySink>>,
    dwell: Duration,
    settle: Duration,
}

impl Serializer {
    pub fn new(sink: Box<dyn KeySink>, dwell: Duration, settle: Duration) -> Self {
        Self {
            sink: Mutex::new(sink),
            dwell,
            settle,
        }
    }

    /// Send one key event to the sink as a press/release pair.
    ///
    /// Returns `SinkError::NotReady` immediately (without consuming the
    /// timing window) when the sink reports unready, so a permanently
    /// detached sink skips events instead of blocking every session.
    pub async fn emit(&self, event: KeyEvent) -> Result<(), SinkError> {
        let mut sink = self.sink.lock().await;

        if !sink.is_ready() {
            return Err(SinkError::NotReady);
        }

        trace!(keycode = event.keycode, modifiers = event.modifiers.bits(), "emit");
        sink.send_press(event.modifiers, event.keycode)?;
        sleep(self.dwell).await;
        sink.send_release_all()?;
        sleep(self.settle).await;

        Ok(())
    }
}
