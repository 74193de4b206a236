//! Local console source
//!
//! Runs a source session over raw-mode stdin so arrow keys and friends
//! arrive as their escape byte sequences. Raw mode swallows Ctrl-C, so the
//! operator detaches with Ctrl-] (the telnet escape); the adapter below
//! turns that byte into end-of-stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::info;

use crate::serializer::Serializer;
use crate::session::{SourceId, SourceSession};

/// Telnet-style detach byte (Ctrl-]).
pub const DETACH_BYTE: u8 = 0x1d;

/// Byte feed adapter that ends the stream at the first detach byte.
///
/// Bytes before the detach byte in the same chunk are still delivered;
/// everything from the detach byte on is discarded.
pub struct DetachOnByte<R> {
    inner: R,
    detached: bool,
}

impl<R> DetachOnByte<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            detached: false,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for DetachOnByte<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.detached {
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let filled = buf.filled();
                if let Some(pos) = filled[before..].iter().position(|&b| b == DETACH_BYTE) {
                    buf.set_filled(before + pos);
                    self.detached = true;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Guard that restores cooked mode when the console session ends, however
/// it ends.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("enable raw mode for console input")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Install a panic hook that leaves the terminal usable.
pub fn setup_panic_handler() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        original_hook(panic_info);
    }));
}

/// Run the local console session until the operator detaches or stdin
/// closes.
pub async fn run(serializer: Arc<Serializer>) -> Result<()> {
    info!("console attached, Ctrl-] detaches");
    let _guard = RawModeGuard::enable()?;

    let feed = DetachOnByte::new(tokio::io::stdin());
    SourceSession::new(SourceId::Console, feed)
        .run(serializer)
        .await;

    info!("console detached");
    Ok(())
}
