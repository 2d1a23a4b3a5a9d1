//! Claim-once body wrapper.

use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::body::split::split_source;
use crate::body::BodyError;

/// A claimed body stream.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

enum State {
    Unclaimed(BodyReader),
    Buffered(Bytes),
    Claimed,
}

/// Wraps the byte source of a request or response body.
///
/// At most one consumer may claim the source: [`to_stream`](Self::to_stream),
/// [`split`](Self::split) and [`release`](Self::release) each claim it, and any
/// later claim fails with [`BodyError::AlreadyClaimed`]. [`buffer`](Self::buffer)
/// also claims the source, but repeated calls return the same buffered bytes.
pub struct ByteBody {
    state: State,
    expected_length: Option<u64>,
}

impl ByteBody {
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let expected_length = Some(bytes.len() as u64);
        Self {
            state: State::Unclaimed(Box::new(std::io::Cursor::new(bytes))),
            expected_length,
        }
    }

    /// Wrap a streaming source. `expected_length` of `None` means the
    /// consumer has to bound its own reads.
    pub fn from_reader<R>(reader: R, expected_length: Option<u64>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            state: State::Unclaimed(Box::new(reader)),
            expected_length,
        }
    }

    pub fn expected_length(&self) -> Option<u64> {
        self.expected_length
    }

    pub fn is_claimed(&self) -> bool {
        !matches!(self.state, State::Unclaimed(_))
    }

    /// Claim the source as a stream.
    pub fn to_stream(&mut self) -> Result<BodyReader, BodyError> {
        match std::mem::replace(&mut self.state, State::Claimed) {
            State::Unclaimed(reader) => Ok(reader),
            State::Buffered(bytes) => {
                self.state = State::Buffered(bytes);
                Err(BodyError::AlreadyClaimed)
            }
            State::Claimed => Err(BodyError::AlreadyClaimed),
        }
    }

    /// Read the whole source into memory, failing past `limit` bytes.
    pub async fn buffer(&mut self, limit: usize) -> Result<Bytes, BodyError> {
        if let State::Buffered(bytes) = &self.state {
            return Ok(bytes.clone());
        }
        if let Some(expected) = self.expected_length {
            if expected > limit as u64 {
                return Err(BodyError::TooLarge { limit });
            }
        }
        let reader = self.to_stream()?;
        let mut collected = Vec::with_capacity(
            self.expected_length.map_or(0, |len| len as usize).min(limit),
        );
        reader
            .take(limit as u64 + 1)
            .read_to_end(&mut collected)
            .await?;
        if collected.len() > limit {
            return Err(BodyError::TooLarge { limit });
        }
        let bytes = Bytes::from(collected);
        self.state = State::Buffered(bytes.clone());
        Ok(bytes)
    }

    /// Claim the source and hand back two independent bodies over the same
    /// bytes. See [`split`](crate::body::split) for the backpressure policy.
    pub fn split(&mut self) -> Result<(ByteBody, ByteBody), BodyError> {
        let reader = self.to_stream()?;
        let (left, right) = split_source(reader);
        Ok((
            ByteBody::from_reader(left, self.expected_length),
            ByteBody::from_reader(right, self.expected_length),
        ))
    }

    /// Move the unclaimed source into a new body, leaving this one claimed.
    pub fn take(&mut self) -> Result<ByteBody, BodyError> {
        let reader = self.to_stream()?;
        Ok(ByteBody::from_reader(reader, self.expected_length))
    }

    /// Discard any unread bytes if nobody claimed the body. Returns the
    /// number of bytes drained.
    pub async fn release(&mut self) -> Result<u64, BodyError> {
        match std::mem::replace(&mut self.state, State::Claimed) {
            State::Unclaimed(mut reader) => {
                let drained = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
                Ok(drained)
            }
            other => {
                self.state = other;
                Ok(0)
            }
        }
    }
}

impl Default for ByteBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ByteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Unclaimed(_) => "unclaimed",
            State::Buffered(_) => "buffered",
            State::Claimed => "claimed",
        };
        f.debug_struct("ByteBody")
            .field("state", &state)
            .field("expected_length", &self.expected_length)
            .finish()
    }
}
