//! Codec lookup by media type and payload kind.

use std::sync::Arc;

use crate::codec::{CodecError, FormCodec, JsonCodec, MediaTypeCodec, TextCodec};
use crate::http::{MediaType, Payload};

/// Ordered codec registry. Later registrations take precedence.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn MediaTypeCodec>>,
}

impl CodecRegistry {
    /// A registry with no codecs at all.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// JSON, text and form codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(FormCodec);
        registry.register(TextCodec);
        registry.register(JsonCodec);
        registry
    }

    pub fn register(&mut self, codec: impl MediaTypeCodec + 'static) -> &mut Self {
        self.codecs.push(Arc::new(codec));
        self
    }

    fn candidates(&self) -> impl Iterator<Item = &Arc<dyn MediaTypeCodec>> {
        self.codecs.iter().rev()
    }

    pub fn find_encoder(
        &self,
        media_type: &MediaType,
        payload: &Payload,
    ) -> Option<&dyn MediaTypeCodec> {
        self.candidates()
            .find(|c| c.supports(media_type) && c.can_encode(payload))
            .map(|c| c.as_ref())
    }

    pub fn find_decoder(&self, media_type: &MediaType) -> Option<&dyn MediaTypeCodec> {
        self.candidates()
            .find(|c| c.supports(media_type))
            .map(|c| c.as_ref())
    }

    /// Decode `bytes` with the codec for `media_type`.
    pub fn decode(
        &self,
        media_type: &MediaType,
        bytes: &[u8],
    ) -> Result<serde_json::Value, CodecError> {
        self.find_decoder(media_type)
            .ok_or_else(|| CodecError::NoDecoder {
                media_type: media_type.to_string(),
            })?
            .decode(bytes)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.codecs.iter().map(|c| c.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Point(i32, i32);

    struct PointCodec;

    impl MediaTypeCodec for PointCodec {
        fn name(&self) -> &'static str {
            "point"
        }
        fn supports(&self, media_type: &MediaType) -> bool {
            media_type.is_json()
        }
        fn can_encode(&self, payload: &Payload) -> bool {
            payload.downcast_ref::<Point>().is_some()
        }
        fn encode(&self, payload: &Payload, _charset: &str) -> Result<Bytes, CodecError> {
            let Point(x, y) = payload
                .downcast_ref::<Point>()
                .ok_or_else(|| CodecError::Encode("not a point".into()))?;
            Ok(Bytes::from(format!("[{x},{y}]")))
        }
        fn decode(&self, _bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
            Err(CodecError::Decode("encode only".into()))
        }
    }

    #[test]
    fn defaults_cover_json_text_and_form() {
        let registry = CodecRegistry::with_defaults();
        let json = Payload::Json(json!({"a": 1}));
        assert_eq!(
            registry.find_encoder(&MediaType::json(), &json).map(|c| c.name()),
            Some("json")
        );
        assert_eq!(
            registry.find_decoder(&MediaType::form()).map(|c| c.name()),
            Some("form")
        );
        assert!(registry
            .find_encoder(&MediaType::form(), &json)
            .is_none());
    }

    #[test]
    fn opaque_values_need_a_custom_codec() {
        let mut registry = CodecRegistry::with_defaults();
        let payload = Payload::object(Point(1, 2));
        assert!(registry.find_encoder(&MediaType::json(), &payload).is_none());

        registry.register(PointCodec);
        let codec = registry.find_encoder(&MediaType::json(), &payload).unwrap();
        assert_eq!(&codec.encode(&payload, "utf-8").unwrap()[..], b"[1,2]");
    }

    #[test]
    fn missing_decoder_is_an_error() {
        let registry = CodecRegistry::empty();
        assert!(matches!(
            registry.decode(&MediaType::json(), b"{}"),
            Err(CodecError::NoDecoder { .. })
        ));
    }
}
