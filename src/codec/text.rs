//! Plain text codec.

use bytes::Bytes;
use serde_json::Value;

use crate::codec::{CodecError, MediaTypeCodec};
use crate::http::{MediaType, Payload};

#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl MediaTypeCodec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supports(&self, media_type: &MediaType) -> bool {
        media_type.is_text()
    }

    fn can_encode(&self, payload: &Payload) -> bool {
        matches!(payload, Payload::Empty | Payload::Text(_) | Payload::Json(_))
    }

    fn encode(&self, payload: &Payload, _charset: &str) -> Result<Bytes, CodecError> {
        match payload {
            Payload::Empty => Ok(Bytes::new()),
            Payload::Text(text) => Ok(Bytes::from(text.clone())),
            Payload::Json(Value::String(text)) => Ok(Bytes::from(text.clone())),
            Payload::Json(value) => Ok(Bytes::from(value.to_string())),
            other => Err(CodecError::Encode(format!(
                "{} cannot be written as text",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_strings_are_written_bare() {
        let bytes = TextCodec
            .encode(&Payload::Json(Value::String("hi".into())), "utf-8")
            .unwrap();
        assert_eq!(&bytes[..], b"hi");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(TextCodec.decode(&[0xff, 0xfe]).is_err());
        assert_eq!(TextCodec.decode(b"ok").unwrap(), Value::String("ok".into()));
    }
}
