//! Source sessions
//!
//! One session per input source: it owns the source's byte feed and its
//! private escape decoder, and forwards decoded key events to the shared
//! serializer. Sessions never share decoder state, so a partial escape
//! sequence on one source cannot corrupt another.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::decoder::EscapeDecoder;
use crate::serializer::Serializer;
use crate::sink::SinkError;

const READ_BUF_SIZE: usize = 1024;

/// Identity of one independent byte-stream producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceId {
    /// The local raw-mode console.
    Console,
    /// A remote shell session, numbered in accept order.
    Session(u64),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Console => write!(f, "console"),
            SourceId::Session(n) => write!(f, "session #{n}"),
        }
    }
}

/// A runnable input source: one byte feed, one decoder.
pub struct SourceSession<R> {
    source: SourceId,
    feed: R,
    decoder: EscapeDecoder,
}

impl<R: AsyncRead + Unpin> SourceSession<R> {
    pub fn new(source: SourceId, feed: R) -> Self {
        Self {
            source,
            feed,
            decoder: EscapeDecoder::new(),
        }
    }

    /// Pump the feed until it closes.
    ///
    /// Per-event sink failures are logged and the event dropped; only the
    /// feed ending (EOF or a read error, e.g. a connection reset) ends the
    /// session. The decoder state dies with the session.
    pub async fn run(mut self, serializer: Arc<Serializer>) {
        let mut buf = [0u8; READ_BUF_SIZE];
        debug!(source = %self.source, "session started");

        loop {
            let n = match self.feed.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    debug!(source = %self.source, %err, "feed closed with error");
                    break;
                }
            };

            for &byte in &buf[..n] {
                // NUL padding shows up in some transports; never a keystroke.
                if byte == 0 {
                    continue;
                }

                let Some(event) = self.decoder.feed(byte) else {
                    continue;
                };

                match serializer.emit(event).await {
                    Ok(()) => {}
                    Err(SinkError::NotReady) => {
                        debug!(source = %self.source, "sink not ready, keystroke dropped");
                    }
                    Err(err) => {
                        warn!(source = %self.source, %err, "keystroke not delivered");
                    }
                }
            }
        }

        debug!(source = %self.source, "session ended");
    }
}
