//! Bidirectional byte relay
//!
//! Pumps bytes between two duplex streams until both directions finish.
//! When one direction reaches EOF (or fails) it write-closes its
//! destination and stops; the opposite direction keeps draining. Both
//! streams are dropped, and therefore fully closed, only after both
//! directions are done.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use kf_core::config::RelayConfig;

/// Bytes moved by one relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the first stream to the second
    pub a_to_b: u64,
    /// Bytes copied from the second stream to the first
    pub b_to_a: u64,
}

/// Relay bytes between `a` and `b` until both directions are drained
///
/// Copy errors end the affected direction but are never returned; the
/// relay always proceeds to full teardown.
pub async fn relay<A, B>(a: A, b: B, config: &RelayConfig) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Unpin + Send,
    B: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let (a_to_b, b_to_a) = tokio::join!(
        copy_half(&mut a_read, &mut b_write, config, "a->b"),
        copy_half(&mut b_read, &mut a_write, config, "b->a"),
    );

    // Both endpoints close when their halves drop here.
    drop((a_read, a_write, b_read, b_write));

    RelayStats { a_to_b, b_to_a }
}

/// Copy `reader` into `writer` until EOF or error, then write-close `writer`
async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    config: &RelayConfig,
    direction: &'static str,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; config.buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match read_some(reader, &mut buf, config).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(direction, "Relay read ended: {}", e);
                break;
            }
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            tracing::debug!(direction, "Relay write ended: {}", e);
            break;
        }
        total += n as u64;
    }

    if let Err(e) = writer.shutdown().await {
        tracing::trace!(direction, "Write-close failed: {}", e);
    }

    total
}

async fn read_some<R>(reader: &mut R, buf: &mut [u8], config: &RelayConfig) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match config.idle_timeout {
        Some(limit) => tokio::time::timeout(limit, reader.read(buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "idle timeout"))?,
        None => reader.read(buf).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_relays_both_directions() {
        let (a, mut a_peer) = duplex(64);
        let (b, mut b_peer) = duplex(64);

        let handle = tokio::spawn(async move { relay(a, b, &RelayConfig::default()).await });

        a_peer.write_all(b"from a").await.unwrap();
        b_peer.write_all(b"from b").await.unwrap();
        a_peer.shutdown().await.unwrap();
        b_peer.shutdown().await.unwrap();

        let mut at_b = Vec::new();
        b_peer.read_to_end(&mut at_b).await.unwrap();
        let mut at_a = Vec::new();
        a_peer.read_to_end(&mut at_a).await.unwrap();

        assert_eq!(at_b, b"from a");
        assert_eq!(at_a, b"from b");

        let stats = handle.await.unwrap();
        assert_eq!(stats, RelayStats { a_to_b: 6, b_to_a: 6 });
    }

    #[tokio::test]
    async fn test_half_close_keeps_other_direction() {
        let (a, mut a_peer) = duplex(16);
        let (b, mut b_peer) = duplex(16);

        let handle = tokio::spawn(async move { relay(a, b, &RelayConfig::default()).await });

        // A finishes immediately.
        a_peer.write_all(b"req").await.unwrap();
        a_peer.shutdown().await.unwrap();

        let mut req = [0u8; 3];
        b_peer.read_exact(&mut req).await.unwrap();
        assert_eq!(&req, b"req");

        // B keeps producing, slowly and more than the pipe holds.
        let producer = tokio::spawn(async move {
            for chunk in 0..20u8 {
                b_peer.write_all(&[chunk; 10]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            b_peer.shutdown().await.unwrap();
            b_peer
        });

        let mut received = Vec::new();
        a_peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), 200);
        assert!(received.chunks(10).enumerate().all(|(i, c)| c.iter().all(|&x| x == i as u8)));

        producer.await.unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats.a_to_b, 3);
        assert_eq!(stats.b_to_a, 200);
    }

    #[tokio::test]
    async fn test_peer_drop_tears_down() {
        let (a, a_peer) = duplex(16);
        let (b, mut b_peer) = duplex(16);

        let handle = tokio::spawn(async move { relay(a, b, &RelayConfig::default()).await });

        drop(a_peer);

        let mut rest = Vec::new();
        b_peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        drop(b_peer);

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("relay did not finish")
            .unwrap();
        assert_eq!(stats, RelayStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_relay() {
        let (a, _a_peer) = duplex(16);
        let (b, _b_peer) = duplex(16);
        let config = RelayConfig {
            idle_timeout: Some(Duration::from_secs(30)),
            ..RelayConfig::default()
        };

        let stats = relay(a, b, &config).await;
        assert_eq!(stats, RelayStats::default());
    }
}
