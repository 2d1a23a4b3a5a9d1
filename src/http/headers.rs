//! Case-insensitive header multimap.
//!
//! # Responsibilities
//! - Store header values in arrival order, grouped per name
//! - Canonicalize names so lookups ignore client casing
//! - Expose the typed headers the engine needs (content type, length)
//!
//! # Design Decisions
//! - Names are stored in canonical form (`Content-Type`, `X-Request-Id`):
//!   first letter and every letter after `-` upper-cased, the rest lower-cased
//! - Name order is first-insertion order; values keep insertion order per name
//! - Linear scan: header counts are small and a Vec keeps ordering for free

use std::fmt;

use crate::http::media::MediaType;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const COOKIE: &str = "Cookie";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const ALLOW: &str = "Allow";
pub const X_REQUEST_ID: &str = "X-Request-Id";

/// Header multimap with canonicalized names.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the same name.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let name = canonical_name(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Replace every value for `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = canonical_name(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => {
                values.clear();
                values.push(value);
            }
            None => self.entries.push((name, vec![value])),
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `name` in arrival order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values(name).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values(name).is_some()
    }

    /// Remove every value for `name`, returning them.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let name = canonical_name(name);
        let index = self.entries.iter().position(|(n, _)| *n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Canonical header names in first-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Flattened `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(n, values)| values.iter().map(move |v| (n.as_str(), v.as_str())))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn content_type(&self) -> Option<MediaType> {
        self.get(CONTENT_TYPE).and_then(|v| v.parse().ok())
    }

    pub fn set_content_type(&mut self, media_type: &MediaType) {
        self.set(CONTENT_TYPE, media_type.to_string());
    }

    /// Parsed `Content-Length`; `None` when absent or not a number.
    pub fn content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok())
    }

    fn values(&self, name: &str) -> Option<&[String]> {
        let name = canonical_name(name);
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| values.as_slice())
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

/// Canonical form of a header name: `x-foo-BAR` becomes `X-Foo-Bar`.
pub fn canonical_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        let c = if upper {
            c.to_ascii_uppercase()
        } else {
            c.to_ascii_lowercase()
        };
        result.push(c);
        upper = c == '-';
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.add("x-foo", "1");
        assert_eq!(headers.get("X-FOO"), Some("1"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["X-Foo"]);
    }

    #[test]
    fn canonicalizes_mixed_case() {
        assert_eq!(canonical_name("content-TYPE"), "Content-Type");
        assert_eq!(canonical_name("X-REQUEST-ID"), "X-Request-Id");
        assert_eq!(canonical_name("host"), "Host");
    }

    #[test]
    fn preserves_value_order_per_name() {
        let mut headers = Headers::new();
        headers.add("Accept", "text/plain");
        headers.add("Host", "h");
        headers.add("accept", "application/json");
        assert_eq!(headers.get_all("ACCEPT"), ["text/plain", "application/json"]);
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["Accept", "Host"]);
    }

    #[test]
    fn set_replaces_and_remove_drops() {
        let mut headers = Headers::new();
        headers.add("Content-Length", "1");
        headers.add("content-length", "2");
        headers.set("CONTENT-LENGTH", "3");
        assert_eq!(headers.get_all("content-length"), ["3"]);
        assert_eq!(headers.content_length(), Some(3));

        assert_eq!(headers.remove("Content-length"), Some(vec!["3".to_string()]));
        assert!(!headers.contains("content-length"));
        assert!(headers.is_empty());
    }
}
