//! Shared handle over a single byte source.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Clonable reader handle; every clone reads from the same source.
///
/// The lock is held only for the duration of one `poll_read`, never across
/// an await point.
#[derive(Debug)]
pub struct SharedStream<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> SharedStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Lock the underlying source for direct access.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live handles, including this one.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for SharedStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for SharedStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut guard = self.lock();
        Pin::new(&mut *guard).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::LimitingStream;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn clones_share_the_remaining_counter() {
        let shared = SharedStream::new(LimitingStream::new(Cursor::new(b"0123456789".to_vec()), 6));
        let mut a = shared.clone();
        let mut b = shared.clone();

        let mut buf = [0u8; 4];
        assert_eq!(a.read(&mut buf).await.unwrap(), 4);
        let mut rest = Vec::new();
        b.read_to_end(&mut rest).await.unwrap();

        assert_eq!(rest, b"45");
        assert_eq!(shared.lock().remaining(), 0);
        assert_eq!(shared.handle_count(), 3);
    }
}
