//! Media type parsing for content negotiation and codec lookup.

use std::fmt;
use std::str::FromStr;

/// A parsed `type/subtype` with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    pub const APPLICATION_JSON: &'static str = "application/json";
    pub const TEXT_PLAIN: &'static str = "text/plain";
    pub const FORM_URLENCODED: &'static str = "application/x-www-form-urlencoded";
    pub const OCTET_STREAM: &'static str = "application/octet-stream";

    pub fn json() -> Self {
        Self::new(Self::APPLICATION_JSON)
    }

    pub fn text_plain() -> Self {
        Self::new(Self::TEXT_PLAIN)
    }

    pub fn form() -> Self {
        Self::new(Self::FORM_URLENCODED)
    }

    pub fn octet_stream() -> Self {
        Self::new(Self::OCTET_STREAM)
    }

    fn new(essence: &str) -> Self {
        Self {
            essence: essence.to_string(),
            params: Vec::new(),
        }
    }

    /// `type/subtype`, lower-cased, without parameters.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.params.retain(|(n, _)| !n.eq_ignore_ascii_case("charset"));
        self.params.push(("charset".to_string(), charset.to_string()));
        self
    }

    pub fn is_json(&self) -> bool {
        self.essence == Self::APPLICATION_JSON || self.essence.ends_with("+json")
    }

    pub fn is_text(&self) -> bool {
        self.essence.starts_with("text/")
    }

    pub fn is_form(&self) -> bool {
        self.essence == Self::FORM_URLENCODED
    }

    /// Whether two media types name the same essence, honouring `*` wildcards.
    pub fn matches(&self, other: &MediaType) -> bool {
        let (a_type, a_sub) = self.split();
        let (b_type, b_sub) = other.split();
        (a_type == "*" || b_type == "*" || a_type == b_type)
            && (a_sub == "*" || b_sub == "*" || a_sub == b_sub)
    }

    fn split(&self) -> (&str, &str) {
        self.essence.split_once('/').unwrap_or((&self.essence, "*"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid media type: {0:?}")]
pub struct InvalidMediaType(pub String);

impl FromStr for MediaType {
    type Err = InvalidMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.split_once('/') {
            Some((t, sub)) if !t.is_empty() && !sub.is_empty() => {}
            _ => return Err(InvalidMediaType(s.to_string())),
        }
        let params = parts
            .filter_map(|p| p.split_once('='))
            .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().trim_matches('"').to_string()))
            .collect();
        Ok(Self { essence, params })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (name, value) in &self.params {
            write!(f, ";{}={}", name, value)?;
        }
        Ok(())
    }
}
