//! Response serialization to raw bytes.

use http::header::{HeaderName, HeaderValue};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::framing::FramingError;
use crate::http::headers::{CONTENT_LENGTH, TRANSFER_ENCODING};
use crate::http::response::Response;

/// Writes encoded responses with an exact `Content-Length`.
#[derive(Debug, Clone)]
pub struct ResponseEncoder {
    buffer_size: usize,
}

impl ResponseEncoder {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Serialize and flush one response. With `omit_body` (a `HEAD`
    /// request) the length header still describes the body that a `GET`
    /// would have produced.
    ///
    /// Returns the number of bytes written.
    pub async fn write<W>(
        &self,
        output: &mut W,
        response: &Response,
        omit_body: bool,
    ) -> Result<u64, FramingError>
    where
        W: AsyncWrite + Unpin,
    {
        let body = response
            .encoded_body()
            .ok_or(FramingError::UnencodedBody(response.body().type_name()))?;
        check_head(response)?;

        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            response.status().as_u16(),
            response.reason()
        );
        for (name, value) in response.headers().iter() {
            if name == CONTENT_LENGTH {
                continue;
            }
            if name == TRANSFER_ENCODING && value.to_ascii_lowercase().contains("chunked") {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(CONTENT_LENGTH);
        head.push_str(": ");
        head.push_str(&body.len().to_string());
        head.push_str("\r\n\r\n");

        let mut writer = BufWriter::with_capacity(self.buffer_size, &mut *output);
        writer.write_all(head.as_bytes()).await?;
        let mut written = head.len() as u64;
        if !omit_body {
            writer.write_all(&body).await?;
            written += body.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }
}

/// Refuse anything that would not survive as a single header line: names
/// must be tokens, values and the reason phrase must hold no control bytes
/// other than HTAB.
fn check_head(response: &Response) -> Result<(), FramingError> {
    if HeaderValue::from_bytes(response.reason().as_bytes()).is_err() {
        return Err(FramingError::InvalidResponseHead(format!(
            "reason phrase {:?}",
            response.reason()
        )));
    }
    for (name, value) in response.headers().iter() {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(FramingError::InvalidResponseHead(format!("header name {name:?}")));
        }
        if HeaderValue::from_bytes(value.as_bytes()).is_err() {
            return Err(FramingError::InvalidResponseHead(format!(
                "value of {name}: {value:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    async fn render(response: &Response, omit_body: bool) -> String {
        let mut out = Vec::new();
        ResponseEncoder::new(8192)
            .write(&mut out, response, omit_body)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn length_is_recomputed_and_chunked_stripped() {
        let response = Response::new(StatusCode::CREATED)
            .with_header("content-length", "999")
            .with_header("transfer-encoding", "chunked")
            .with_header("x-trace", "abc")
            .with_body(Bytes::from_static(b"hello"));

        assert_eq!(
            render(&response, false).await,
            "HTTP/1.1 201 Created\r\nX-Trace: abc\r\nContent-Length: 5\r\n\r\nhello"
        );
    }

    #[tokio::test]
    async fn head_keeps_length_without_body() {
        let response = Response::ok().with_body(Bytes::from_static(b"abc"));
        assert_eq!(
            render(&response, true).await,
            "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn line_breaks_in_header_values_are_refused() {
        let response = Response::ok()
            .with_header("x-note", "a\r\nSet-Cookie: evil=1")
            .with_body(Bytes::from_static(b"ok"));
        let mut out = Vec::new();

        let result = ResponseEncoder::new(64).write(&mut out, &response, false).await;
        assert!(matches!(result, Err(FramingError::InvalidResponseHead(_))));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn line_breaks_in_reason_and_names_are_refused() {
        let mut response = Response::ok().with_body(Bytes::new());
        response.set_reason("OK\r\nX-Injected: 1");
        let result = ResponseEncoder::new(64).write(&mut Vec::new(), &response, false).await;
        assert!(matches!(result, Err(FramingError::InvalidResponseHead(_))));

        let response = Response::ok()
            .with_header("x-a\r\nx-b", "1")
            .with_body(Bytes::new());
        let result = ResponseEncoder::new(64).write(&mut Vec::new(), &response, false).await;
        assert!(matches!(result, Err(FramingError::InvalidResponseHead(_))));
    }

    #[tokio::test]
    async fn tabs_and_custom_reasons_are_kept() {
        let mut response = Response::new(StatusCode::IM_A_TEAPOT)
            .with_header("x-list", "a\tb")
            .with_body(Bytes::new());
        response.set_reason("Short And Stout");
        assert_eq!(
            render(&response, false).await,
            "HTTP/1.1 418 Short And Stout\r\nX-List: a\tb\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn unencoded_body_is_refused() {
        let response = Response::ok().with_body("not yet");
        let result = ResponseEncoder::new(64).write(&mut Vec::new(), &response, false).await;
        assert!(matches!(result, Err(FramingError::UnencodedBody("text"))));
    }
}
