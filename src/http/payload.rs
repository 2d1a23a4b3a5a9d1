//! Response body values awaiting encoding.

use std::any::Any;
use std::fmt;
use std::io;

use bytes::Bytes;
use serde::Serialize;

/// A body value that writes itself to the output sink.
pub trait Writable: Send + Sync {
    fn write_to(&self, out: &mut dyn io::Write, charset: &str) -> io::Result<()>;
}

/// A response body before (or after) encoding.
///
/// `Bytes` is the encoded form; everything else goes through the
/// codec registry when the exchange is answered.
pub enum Payload {
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
    /// Ordered elements of a collected sequence.
    List(Vec<Payload>),
    Writable(Box<dyn Writable>),
    /// A value only a registered custom codec can encode.
    Object {
        value: Box<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Payload::Bytes(bytes.into())
    }

    /// Serialize any value into a structured payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Payload::Json)
    }

    pub fn writable(writable: impl Writable + 'static) -> Self {
        Payload::Writable(Box::new(writable))
    }

    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Payload::Object {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Character sequences default to `text/plain`.
    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    /// Name of the runtime type, for codec error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Text(_) => "text",
            Payload::Bytes(_) => "bytes",
            Payload::Json(_) => "json",
            Payload::List(_) => "list",
            Payload::Writable(_) => "writable",
            Payload::Object { type_name, .. } => type_name,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Payload::Object { value, .. } => value.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Payload::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Payload::List(items) => f.debug_tuple("List").field(items).finish(),
            Payload::Writable(_) => f.write_str("Writable"),
            Payload::Object { type_name, .. } => f.debug_tuple("Object").field(type_name).finish(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Empty
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}
