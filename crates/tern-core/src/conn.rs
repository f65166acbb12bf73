//! Connection handle shared between the read loop and handlers

use crate::{Error, Result};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Write side of a client connection
///
/// Cheap to clone. The read side stays with the connection loop; handlers
/// write their response through this handle and close it when done.
/// Closing is idempotent: the writer is shut down exactly once.
#[derive(Clone)]
pub struct Conn {
    inner: Arc<Inner>,
}

struct Inner {
    writer: Mutex<Option<Writer>>,
    closed: AtomicBool,
    peer: Option<SocketAddr>,
}

impl Conn {
    /// Wrap the write half of a stream
    pub fn new<W>(writer: W, peer: Option<SocketAddr>) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(Some(Box::new(writer))),
                closed: AtomicBool::new(false),
                peer,
            }),
        }
    }

    /// Remote address, when the stream has one
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    /// Write all of `buf` and flush
    pub async fn write_all(&self, buf: &[u8]) -> Result<()> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            ))
        })?;
        writer.write_all(buf).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shut down the write side. Later calls do nothing.
    pub async fn close(&self) -> Result<()> {
        let writer = self.inner.writer.lock().await.take();
        let Some(mut writer) = writer else {
            return Ok(());
        };
        self.inner.closed.store(true, Ordering::SeqCst);
        tracing::trace!(peer = ?self.inner.peer, "closing connection");
        writer.shutdown().await?;
        Ok(())
    }

    /// Whether `close` has been called
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// In-memory connection for tests: the returned stream reads what
    /// handlers write.
    #[cfg(test)]
    pub(crate) fn pair() -> (Self, tokio::io::DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        (Self::new(ours, None), theirs)
    }
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
