//! Request parsing from raw bytes.
//!
//! # Responsibilities
//! - Read the request line and header block into a bounded buffer
//! - Push bytes read past the header terminator back into the session input
//! - Build a `Request` whose body is a `Content-Length` window over the
//!   shared input
//!
//! # Design Decisions
//! - CRLF and bare LF line endings are both accepted
//! - A header block that overflows the buffer is skipped up to its
//!   terminator before the error is reported, so the next parse starts at
//!   a request line
//! - Obsolete line folding is rejected

use http::{Method, Uri};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{trace, warn};

use crate::body::{ByteBody, LimitingStream, SharedStream};
use crate::framing::input::SharedInput;
use crate::framing::FramingError;
use crate::http::headers::{Headers, CONTENT_LENGTH, TRANSFER_ENCODING};
use crate::http::request::{Request, RequestHead};

const READ_CHUNK: usize = 1024;

/// The `Content-Length` window of one request over the session input.
pub type BodyWindow<R> = SharedStream<LimitingStream<SharedInput<R>>>;

/// One parsed request plus a handle on its body window, so the loop can
/// drain whatever the exchange left unread.
#[derive(Debug)]
pub struct DecodedRequest<R> {
    pub request: Request,
    pub window: Option<BodyWindow<R>>,
}

/// Parses one request at a time from a shared session input.
#[derive(Debug, Clone)]
pub struct RequestDecoder {
    buffer_size: usize,
}

impl RequestDecoder {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Parse the next request.
    ///
    /// Returns `Ok(None)` when the input ends before any byte of a new
    /// request arrived.
    pub async fn decode<R>(
        &self,
        input: &SharedInput<R>,
    ) -> Result<Option<DecodedRequest<R>>, FramingError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let Some(head) = self.read_head(input).await? else {
            return Ok(None);
        };
        let (method, uri, headers) = parse_head(&head)?;
        let length = body_length(&headers)?;

        let (body, window) = match length {
            Some(0) => (ByteBody::empty(), None),
            Some(length) => {
                let window = SharedStream::new(LimitingStream::new(input.clone(), length));
                (ByteBody::from_reader(window.clone(), Some(length)), Some(window))
            }
            None => {
                if headers.contains(TRANSFER_ENCODING) {
                    warn!(
                        transfer_encoding = headers.get(TRANSFER_ENCODING).unwrap_or_default(),
                        "chunked request bodies are not decoded, treating body as empty"
                    );
                }
                (ByteBody::empty(), None)
            }
        };

        trace!(method = %method, uri = %uri, content_length = ?length, "request head parsed");
        let request = Request::from_head(RequestHead::new(method, uri, headers), body);
        Ok(Some(DecodedRequest { request, window }))
    }

    /// Read up to and excluding the blank line that ends the header block.
    async fn read_head<R>(&self, input: &SharedInput<R>) -> Result<Option<Vec<u8>>, FramingError>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = input.clone();
        let mut buf: Vec<u8> = Vec::with_capacity(self.buffer_size.min(READ_CHUNK * 4));
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            skip_blank_lines(&mut buf);
            if let Some((head_end, body_start)) = find_head_end(&buf) {
                input.lock().unread(&buf[body_start..]);
                buf.truncate(head_end);
                return Ok(Some(buf));
            }
            if buf.len() >= self.buffer_size {
                let partial_line = trailing_line_len(&buf);
                skip_to_head_end(&mut reader, input, partial_line).await?;
                return Err(FramingError::HeaderTooLarge {
                    limit: self.buffer_size,
                });
            }

            let want = (self.buffer_size - buf.len()).min(READ_CHUNK);
            let n = reader.read(&mut chunk[..want]).await?;
            if n == 0 {
                return if buf.is_empty() {
                    Ok(None)
                } else {
                    Err(FramingError::Incomplete)
                };
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Drop CRLF / LF sequences preceding a request line.
fn skip_blank_lines(buf: &mut Vec<u8>) {
    let skip = buf
        .iter()
        .position(|b| *b != b'\r' && *b != b'\n')
        .unwrap_or(buf.len());
    if skip > 0 {
        buf.drain(..skip);
    }
}

/// Locate the empty line ending the header block. Returns the end of the
/// head and the offset of the first body byte.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (i, byte) in buf.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some((line_start, i + 1));
        }
        line_start = i + 1;
    }
    None
}

/// Non-CR bytes after the last line feed.
fn trailing_line_len(buf: &[u8]) -> usize {
    let start = buf.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    buf[start..].iter().filter(|b| **b != b'\r').count()
}

/// Discard input through the end of an oversized header block.
async fn skip_to_head_end<R>(
    reader: &mut SharedInput<R>,
    input: &SharedInput<R>,
    mut line_len: usize,
) -> Result<(), FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut discarded = 0usize;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        for (i, byte) in chunk[..n].iter().enumerate() {
            match byte {
                b'\n' if line_len == 0 => {
                    input.lock().unread(&chunk[i + 1..n]);
                    trace!(discarded = discarded + i + 1, "skipped oversized header block");
                    return Ok(());
                }
                b'\n' => line_len = 0,
                b'\r' => {}
                _ => line_len += 1,
            }
        }
        discarded += n;
    }
}

fn parse_head(head: &[u8]) -> Result<(Method, Uri, Headers), FramingError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| FramingError::InvalidHeader("header block is not valid UTF-8".into()))?;
    let mut lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(FramingError::InvalidRequestLine(request_line.to_string()));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(FramingError::UnsupportedVersion(version.to_string()));
    }
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| FramingError::InvalidMethod(method.to_string()))?;
    let uri: Uri = target
        .parse()
        .map_err(|_| FramingError::InvalidTarget(target.to_string()))?;

    let mut headers = Headers::new();
    for line in lines.filter(|line| !line.is_empty()) {
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(FramingError::InvalidHeader(
                "obsolete line folding is not supported".into(),
            ));
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(FramingError::InvalidHeader(format!("missing colon in {line:?}")));
        };
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err(FramingError::InvalidHeader(format!("invalid name {name:?}")));
        }
        headers.add(name, value.trim());
    }
    Ok((method, uri, headers))
}

/// `Content-Length`, checking that repeated values agree. A negative
/// length means no body.
fn body_length(headers: &Headers) -> Result<Option<u64>, FramingError> {
    let mut length = None;
    for raw in headers.get_all(CONTENT_LENGTH).iter().flat_map(|v| v.split(',')) {
        let raw = raw.trim();
        if is_negative(raw) {
            trace!(content_length = raw, "negative Content-Length, body is empty");
            continue;
        }
        let parsed: u64 = raw
            .parse()
            .map_err(|_| FramingError::InvalidContentLength(raw.to_string()))?;
        match length {
            Some(previous) if previous != parsed => {
                return Err(FramingError::ConflictingContentLength)
            }
            _ => length = Some(parsed),
        }
    }
    Ok(length)
}

fn is_negative(raw: &str) -> bool {
    raw.strip_prefix('-')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::input::SessionInput;
    use std::io::Cursor;

    fn input(bytes: &[u8]) -> SharedInput<Cursor<Vec<u8>>> {
        SessionInput::shared(Cursor::new(bytes.to_vec()))
    }

    async fn remaining(input: &SharedInput<Cursor<Vec<u8>>>) -> Vec<u8> {
        let mut rest = Vec::new();
        input.clone().read_to_end(&mut rest).await.unwrap();
        rest
    }

    #[tokio::test]
    async fn body_is_bounded_by_content_length() {
        let input = input(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nABCDE0123456789");
        let decoder = RequestDecoder::new(8192);

        let mut decoded = decoder.decode(&input).await.unwrap().unwrap();
        let body = decoded.request.body_mut().buffer(1024).await.unwrap();
        assert_eq!(body, "ABCDE");
        assert_eq!(remaining(&input).await, b"0123456789");
    }

    #[tokio::test]
    async fn negative_content_length_means_empty_body() {
        let input = input(b"POST /echo HTTP/1.1\r\nContent-Length: -1\r\n\r\nGET /next HTTP/1.1\r\n\r\n");
        let decoder = RequestDecoder::new(8192);

        let mut decoded = decoder.decode(&input).await.unwrap().unwrap();
        assert!(decoded.window.is_none());
        assert_eq!(decoded.request.body().expected_length(), Some(0));
        assert!(decoded.request.body_mut().buffer(1024).await.unwrap().is_empty());

        let next = decoder.decode(&input).await.unwrap().unwrap();
        assert_eq!(next.request.path(), "/next");
    }

    #[tokio::test]
    async fn names_are_canonical_and_lf_is_tolerated() {
        let input = input(b"GET /a?x=1%202&x=3 HTTP/1.0\nx-FOO: bar\ncookie: a=1; b=2\n\n");
        let decoded = RequestDecoder::new(8192).decode(&input).await.unwrap().unwrap();
        let request = decoded.request;

        assert_eq!(*request.method(), Method::GET);
        assert_eq!(request.headers().names().collect::<Vec<_>>(), ["X-Foo", "Cookie"]);
        assert_eq!(request.query().get_all("x"), ["1 2", "3"]);
        assert_eq!(request.cookies().get("b").map(|c| c.value()), Some("2"));
        assert!(decoded.window.is_none());
    }

    #[tokio::test]
    async fn end_of_input_before_request_is_clean() {
        let decoder = RequestDecoder::new(8192);
        assert!(decoder.decode(&input(b"")).await.unwrap().is_none());
        assert!(decoder.decode(&input(b"\r\n\r\n")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_head_is_incomplete() {
        let result = RequestDecoder::new(8192)
            .decode(&input(b"GET / HTTP/1.1\r\nHost: x\r\n"))
            .await;
        assert!(matches!(result, Err(FramingError::Incomplete)));
    }

    #[tokio::test]
    async fn oversized_head_is_skipped() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(300));
        raw.extend_from_slice(b"\r\nX-Other: 1\r\n\r\nGET /next HTTP/1.1\r\n\r\n");
        let input = input(&raw);
        let decoder = RequestDecoder::new(128);

        assert!(matches!(
            decoder.decode(&input).await,
            Err(FramingError::HeaderTooLarge { limit: 128 })
        ));
        let next = decoder.decode(&input).await.unwrap().unwrap();
        assert_eq!(next.request.path(), "/next");
    }

    #[tokio::test]
    async fn malformed_heads_are_rejected() {
        let decoder = RequestDecoder::new(8192);
        for raw in [
            &b"GARBAGE\r\n\r\n"[..],
            b"GET / SPDY/3\r\n\r\n",
            b"GET / HTTP/1.1\r\nNoColon\r\n\r\n",
            b"GET / HTTP/1.1\r\nA: 1\r\n folded\r\n\r\n",
            b"POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\n",
            b"POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n",
        ] {
            assert!(decoder.decode(&input(raw)).await.is_err(), "{raw:?}");
        }
    }

    #[test]
    fn head_end_accepts_mixed_endings() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some((16, 18)));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\n\nbody"), Some((15, 16)));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\nA: b\r\n"), None);
    }
}
