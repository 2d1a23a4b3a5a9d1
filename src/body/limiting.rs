//! Length-bounded byte source.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

/// Wraps a source and reports end-of-stream once `max_size` bytes were
/// delivered, even if the source holds more.
///
/// `poll_read` takes `&mut self`, so reads on one instance are serialized by
/// the borrow checker; share it across tasks through
/// [`SharedStream`](super::SharedStream), which locks around each read.
#[derive(Debug)]
pub struct LimitingStream<S> {
    inner: Take<S>,
    max_size: u64,
}

impl<S: AsyncRead + Unpin> LimitingStream<S> {
    pub fn new(inner: S, max_size: u64) -> Self {
        Self {
            inner: inner.take(max_size),
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Bytes still allowed through.
    pub fn remaining(&self) -> u64 {
        self.inner.limit()
    }

    /// Bytes delivered so far.
    pub fn delivered(&self) -> u64 {
        self.max_size - self.inner.limit()
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for LimitingStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn stops_at_max_size() {
        let source = Cursor::new(b"ABCDEFGHIJKLMNO".to_vec());
        let mut stream = LimitingStream::new(source, 5);

        let mut total = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            total.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(total, b"ABCDE");
        assert_eq!(stream.remaining(), 0);
        assert_eq!(stream.read(&mut chunk).await.unwrap(), 0);

        let mut rest = Vec::new();
        stream.into_inner().read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"FGHIJKLMNO");
    }

    #[tokio::test]
    async fn short_source_ends_early() {
        let mut stream = LimitingStream::new(Cursor::new(b"AB".to_vec()), 10);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"AB");
        assert_eq!(stream.delivered(), 2);
        assert_eq!(stream.remaining(), 8);
    }
}
