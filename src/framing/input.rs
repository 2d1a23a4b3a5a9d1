//! Session input with pushback.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, ReadBuf};

use crate::body::SharedStream;

/// The shared handle the loop, the decoder and every body window read from.
pub type SharedInput<R> = SharedStream<SessionInput<R>>;

/// Byte source that replays pushed-back bytes before reading the
/// underlying stream again.
///
/// Bytes read past a header terminator are pushed back so the body window
/// (and the next request) sees "leftover bytes, then remaining stream".
#[derive(Debug)]
pub struct SessionInput<R> {
    pending: BytesMut,
    inner: R,
}

impl<R> SessionInput<R> {
    pub fn new(inner: R) -> Self {
        Self {
            pending: BytesMut::new(),
            inner,
        }
    }

    pub fn shared(inner: R) -> SharedInput<R> {
        SharedStream::new(Self::new(inner))
    }

    /// Put bytes back in front of anything still pending.
    pub fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut merged = BytesMut::with_capacity(bytes.len() + self.pending.len());
        merged.extend_from_slice(bytes);
        merged.extend_from_slice(&self.pending);
        self.pending = merged;
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SessionInput<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.remaining());
            buf.put_slice(&self.pending[..n]);
            self.pending.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
