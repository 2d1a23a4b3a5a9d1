//! Bound handler arguments.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::bind::BindingError;
use crate::body::ByteBody;

/// One bound argument value.
pub enum ArgValue {
    Text(String),
    Json(Value),
    Bytes(Bytes),
    Stream(ByteBody),
}

impl ArgValue {
    /// Structured view used for conversion; streams have none.
    fn to_json(&self) -> Option<Value> {
        match self {
            ArgValue::Text(text) => Some(Value::String(text.clone())),
            ArgValue::Json(value) => Some(value.clone()),
            ArgValue::Bytes(bytes) => serde_json::from_slice(bytes).ok(),
            ArgValue::Stream(_) => None,
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ArgValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
            ArgValue::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            ArgValue::Stream(body) => f.debug_tuple("Stream").field(body).finish(),
        }
    }
}

/// Named argument values in binding order.
#[derive(Debug, Default)]
pub struct Arguments {
    values: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing an earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn value(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Text argument as given on the wire.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            ArgValue::Text(text) => Some(text),
            ArgValue::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<Bytes> {
        match self.value(name)? {
            ArgValue::Bytes(bytes) => Some(bytes.clone()),
            ArgValue::Text(text) => Some(Bytes::from(text.clone())),
            _ => None,
        }
    }

    /// Convert an argument into `T`.
    ///
    /// Text is first read as a JSON string, then as a JSON literal, so
    /// `"42"` converts to both `String` and `u32`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, BindingError> {
        let value = self.value(name).ok_or_else(|| BindingError::Missing {
            name: name.to_string(),
        })?;
        let conversion = |reason: String| BindingError::Conversion {
            name: name.to_string(),
            reason,
        };
        match value {
            ArgValue::Text(text) => serde_json::from_value(Value::String(text.clone()))
                .or_else(|_| serde_json::from_str(text))
                .map_err(|e| conversion(e.to_string())),
            other => {
                let json = other
                    .to_json()
                    .ok_or_else(|| conversion("value is not structured".into()))?;
                serde_json::from_value(json).map_err(|e| conversion(e.to_string()))
            }
        }
    }

    /// Like [`get`](Self::get) but `None` when unbound.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, BindingError> {
        if self.contains(name) {
            self.get(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Take a streaming body argument out of the set.
    pub fn take_stream(&mut self, name: &str) -> Option<ByteBody> {
        let index = self
            .values
            .iter()
            .position(|(n, v)| n == name && matches!(v, ArgValue::Stream(_)))?;
        match self.values.remove(index).1 {
            ArgValue::Stream(body) => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn text_converts_to_strings_and_literals() {
        let mut args = Arguments::new();
        args.insert("id", ArgValue::Text("42".into()));
        args.insert("name", ArgValue::Text("fido".into()));

        assert_eq!(args.get::<u32>("id").unwrap(), 42);
        assert_eq!(args.get::<String>("id").unwrap(), "42");
        assert_eq!(args.text("name"), Some("fido"));
        assert!(matches!(
            args.get::<u32>("name"),
            Err(BindingError::Conversion { .. })
        ));
        assert!(matches!(args.get::<u32>("nope"), Err(BindingError::Missing { .. })));
        assert_eq!(args.get_opt::<u32>("nope").unwrap(), None);
    }

    #[test]
    fn json_converts_to_structs() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Pet {
            name: String,
            age: u8,
        }

        let mut args = Arguments::new();
        args.insert("pet", ArgValue::Json(serde_json::json!({"name": "Rex", "age": 3})));
        assert_eq!(
            args.get::<Pet>("pet").unwrap(),
            Pet {
                name: "Rex".into(),
                age: 3
            }
        );
    }

    #[test]
    fn insert_replaces_and_stream_is_taken_once() {
        let mut args = Arguments::new();
        args.insert("a", ArgValue::Text("1".into()));
        args.insert("a", ArgValue::Text("2".into()));
        args.insert("body", ArgValue::Stream(ByteBody::from_bytes("x")));

        assert_eq!(args.len(), 2);
        assert_eq!(args.text("a"), Some("2"));
        assert!(args.take_stream("body").is_some());
        assert!(args.take_stream("body").is_none());
    }
}
