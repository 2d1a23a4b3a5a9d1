//! JSON codec, the default for structured values.

use bytes::Bytes;

use crate::codec::{payload_to_json, CodecError, MediaTypeCodec};
use crate::http::{MediaType, Payload};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl MediaTypeCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn supports(&self, media_type: &MediaType) -> bool {
        media_type.is_json()
    }

    fn can_encode(&self, payload: &Payload) -> bool {
        payload_to_json(payload).is_some()
    }

    fn encode(&self, payload: &Payload, _charset: &str) -> Result<Bytes, CodecError> {
        let value = payload_to_json(payload).ok_or_else(|| {
            CodecError::Encode(format!("{} is not a structured value", payload.type_name()))
        })?;
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_lists_of_mixed_values() {
        let payload = Payload::List(vec![Payload::text("a"), Payload::Json(json!({"n": 1}))]);
        let bytes = JsonCodec.encode(&payload, "utf-8").unwrap();
        assert_eq!(&bytes[..], br#"["a",{"n":1}]"#);
    }

    #[test]
    fn refuses_raw_bytes() {
        assert!(!JsonCodec.can_encode(&Payload::bytes("x")));
        assert!(JsonCodec.encode(&Payload::bytes("x"), "utf-8").is_err());
    }

    #[test]
    fn decode_reports_syntax_errors() {
        assert!(matches!(JsonCodec.decode(b"{oops"), Err(CodecError::Decode(_))));
        assert_eq!(JsonCodec.decode(b"[1,2]").unwrap(), json!([1, 2]));
    }
}
