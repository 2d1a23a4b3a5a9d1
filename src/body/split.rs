//! Two-way fan-out of one byte source.
//!
//! # Backpressure
//! The faster handle drives the upstream source. Every chunk it pulls is
//! retained until the slower handle has read past it, so the source is read
//! exactly once and neither handle observes a gap. A dropped handle stops
//! holding chunks back.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, ReadBuf};

const CHUNK_SIZE: usize = 8 * 1024;

type Source = Box<dyn AsyncRead + Send + Unpin>;

struct SplitState {
    source: Source,
    chunks: VecDeque<Bytes>,
    /// Absolute index of `chunks[0]`.
    base: usize,
    /// Next absolute chunk index per side; `None` once that side is dropped.
    cursors: [Option<usize>; 2],
    wakers: [Option<Waker>; 2],
    finished: bool,
    failure: Option<(io::ErrorKind, String)>,
}

impl SplitState {
    fn wake_other(&mut self, side: usize) {
        if let Some(waker) = self.wakers[1 - side].take() {
            waker.wake();
        }
    }

    fn trim(&mut self) {
        let floor = self.cursors.iter().flatten().min().copied();
        let floor = floor.unwrap_or(self.base + self.chunks.len());
        while self.base < floor && !self.chunks.is_empty() {
            self.chunks.pop_front();
            self.base += 1;
        }
    }
}

/// One side of a split body.
pub struct SplitReader {
    state: Arc<Mutex<SplitState>>,
    side: usize,
    current: Bytes,
}

/// Split `source` into two readers that each observe every byte.
pub fn split_source(source: Source) -> (SplitReader, SplitReader) {
    let state = Arc::new(Mutex::new(SplitState {
        source,
        chunks: VecDeque::new(),
        base: 0,
        cursors: [Some(0), Some(0)],
        wakers: [None, None],
        finished: false,
        failure: None,
    }));
    (
        SplitReader {
            state: Arc::clone(&state),
            side: 0,
            current: Bytes::new(),
        },
        SplitReader {
            state,
            side: 1,
            current: Bytes::new(),
        },
    )
}

impl SplitReader {
    fn copy_current(&mut self, buf: &mut ReadBuf<'_>) {
        let n = self.current.len().min(buf.remaining());
        buf.put_slice(&self.current[..n]);
        self.current.advance(n);
    }
}

impl AsyncRead for SplitReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.current.is_empty() {
            self.copy_current(buf);
            return Poll::Ready(Ok(()));
        }

        let side = self.side;
        let next = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let cursor = state.cursors[side].unwrap_or(usize::MAX);

            if cursor < state.base + state.chunks.len() {
                let chunk = state.chunks[cursor - state.base].clone();
                state.cursors[side] = Some(cursor + 1);
                state.trim();
                chunk
            } else if let Some((kind, message)) = &state.failure {
                return Poll::Ready(Err(io::Error::new(*kind, message.clone())));
            } else if state.finished {
                return Poll::Ready(Ok(()));
            } else {
                let mut scratch = vec![0u8; CHUNK_SIZE];
                let mut read_buf = ReadBuf::new(&mut scratch);
                match Pin::new(&mut state.source).poll_read(cx, &mut read_buf) {
                    Poll::Pending => {
                        state.wakers[side] = Some(cx.waker().clone());
                        return Poll::Pending;
                    }
                    Poll::Ready(Err(e)) => {
                        state.failure = Some((e.kind(), e.to_string()));
                        state.wake_other(side);
                        return Poll::Ready(Err(e));
                    }
                    Poll::Ready(Ok(())) => {
                        let filled = read_buf.filled().len();
                        if filled == 0 {
                            state.finished = true;
                            state.wake_other(side);
                            return Poll::Ready(Ok(()));
                        }
                        scratch.truncate(filled);
                        let chunk = Bytes::from(scratch);
                        state.chunks.push_back(chunk.clone());
                        state.cursors[side] = Some(cursor + 1);
                        state.trim();
                        state.wake_other(side);
                        chunk
                    }
                }
            }
        };

        self.current = next;
        self.copy_current(buf);
        Poll::Ready(Ok(()))
    }
}

impl Drop for SplitReader {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.cursors[self.side] = None;
        state.trim();
        state.wake_other(self.side);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn both_sides_see_every_byte() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let (mut left, mut right) = split_source(Box::new(Cursor::new(data.clone())));

        let mut a = Vec::new();
        left.read_to_end(&mut a).await.unwrap();
        let mut b = Vec::new();
        right.read_to_end(&mut b).await.unwrap();

        assert_eq!(a, data);
        assert_eq!(b, data);
    }

    #[tokio::test]
    async fn dropping_one_side_releases_retained_chunks() {
        let (mut left, right) = split_source(Box::new(Cursor::new(vec![7u8; 3 * CHUNK_SIZE])));
        drop(right);

        let mut out = Vec::new();
        left.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 3 * CHUNK_SIZE);
        assert!(left.state.lock().unwrap().chunks.is_empty());
    }
}
