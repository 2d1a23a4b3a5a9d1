//! Conversions to and from the `http` crate types, for containers that
//! already parsed the request.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::body::ByteBody;
use crate::http::headers::{Headers, CONTENT_LENGTH, TRANSFER_ENCODING};
use crate::http::request::Request;
use crate::http::response::Response;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("response body of type {0} was not encoded")]
    NotEncoded(&'static str),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        // Non-ASCII header values are dropped rather than guessed at.
        let headers: Headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect();
        Request::new(parts.method, parts.uri, headers, ByteBody::from_bytes(body))
    }
}

impl TryFrom<Response> for http::Response<Bytes> {
    type Error = ConvertError;

    fn try_from(response: Response) -> Result<Self, Self::Error> {
        let body = response
            .encoded_body()
            .ok_or_else(|| ConvertError::NotEncoded(response.body().type_name()))?;

        let mut builder = http::Response::builder().status(response.status());
        let headers = builder.headers_mut().ok_or_else(|| ConvertError::InvalidHeader {
            name: String::new(),
            reason: "builder already failed".into(),
        })?;
        for (name, value) in response.headers().iter() {
            if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
                continue;
            }
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConvertError::InvalidHeader {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ConvertError::InvalidHeader {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            headers.append(header_name, header_value);
        }
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        builder
            .body(body)
            .map_err(|e| ConvertError::InvalidHeader {
                name: String::new(),
                reason: e.to_string(),
            })
    }
}
