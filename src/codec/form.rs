//! `application/x-www-form-urlencoded` decoding.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::codec::{CodecError, MediaTypeCodec};
use crate::http::{MediaType, Payload};

/// Decode-only codec: form bodies become a JSON object whose repeated keys
/// hold arrays of strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormCodec;

impl MediaTypeCodec for FormCodec {
    fn name(&self) -> &'static str {
        "form"
    }

    fn supports(&self, media_type: &MediaType) -> bool {
        media_type.is_form()
    }

    fn can_encode(&self, _payload: &Payload) -> bool {
        false
    }

    fn encode(&self, payload: &Payload, _charset: &str) -> Result<Bytes, CodecError> {
        Err(CodecError::Encode(format!(
            "form encoding of {} is not supported",
            payload.type_name()
        )))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let mut object = Map::new();
        for (key, value) in url::form_urlencoded::parse(bytes) {
            let value = Value::String(value.into_owned());
            match object.get_mut(key.as_ref()) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    object.insert(key.into_owned(), value);
                }
            }
        }
        Ok(Value::Object(object))
    }
}
