//! Remote session listener
//!
//! Accepts TCP connections and gives each its own source session. The
//! transport is deliberately dumb: whatever the peer sends is treated as
//! typed bytes. Session security lives outside this process (run it behind
//! an SSH tunnel or on a trusted network).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::serializer::Serializer;
use crate::session::{SourceId, SourceSession};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

const BANNER: &[u8] = b"keybridge: bytes you send are typed on the attached host\r\n";

/// Bind the listener. Split from [`serve`] so callers (and tests) can learn
/// the bound address before accepting.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind session listener on {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening for remote sessions");
    Ok(listener)
}

/// Accept connections forever, one spawned session per peer.
pub async fn serve(listener: TcpListener, serializer: Arc<Serializer>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };

        let id = SourceId::Session(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        info!(source = %id, %peer, "remote session connected");

        let serializer = serializer.clone();
        tokio::spawn(async move {
            handle_session(id, stream, serializer).await;
            info!(source = %id, "remote session disconnected");
        });
    }
}

async fn handle_session(id: SourceId, mut stream: TcpStream, serializer: Arc<Serializer>) {
    if let Err(err) = stream.write_all(BANNER).await {
        warn!(source = %id, %err, "banner write failed");
        return;
    }
    SourceSession::new(id, stream).run(serializer).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::keymap::hid;
    use crate::sink::testing::{Frame, RecordingSink};

    #[tokio::test]
    async fn connection_bytes_reach_the_sink() {
        let (sink, frames) = RecordingSink::new();
        let serializer = Arc::new(Serializer::new(
            Box::new(sink),
            Duration::from_millis(1),
            Duration::from_millis(1),
        ));

        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, serializer));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut banner = vec![0u8; BANNER.len()];
        client.read_exact(&mut banner).await.unwrap();
        assert_eq!(banner, BANNER);

        client.write_all(b"ok").await.unwrap();
        drop(client);

        // Give the spawned session time to drain and emit.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if frames.lock().unwrap().len() == 4 {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "sink never saw frames");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let frames = frames.lock().unwrap();
        assert!(matches!(
            frames[0],
            Frame::Press { keycode, .. } if keycode == hid::KEY_A + (b'o' - b'a')
        ));
        assert_eq!(frames[1], Frame::ReleaseAll);

        server.abort();
    }
}
