//! Route and filter matching logic.
//!
//! # Responsibilities
//! - Match request paths against URI templates (`/pets/{id}`, `/files/{*rest}`)
//! - Rank templates by specificity
//! - Match filter patterns (exact, prefix, `/**`) and methods
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A trailing slash is ignored (`/pets/` matches `/pets`)
//! - Variables span whole segments; a catch-all must be the last segment
//! - No regex to guarantee O(n) matching

use std::cmp::Reverse;
use std::fmt;

use http::Method;
use percent_encoding::percent_decode_str;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {0:?} must start with '/'")]
    NotAbsolute(String),

    #[error("catch-all variable must be the last segment of {0:?}")]
    CatchAllNotLast(String),

    #[error("empty variable name in {0:?}")]
    EmptyVariable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    CatchAll(String),
}

/// A compiled URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Ordering key: smaller sorts first and is more specific.
pub type Specificity = (bool, usize, Reverse<usize>);

impl UriTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::NotAbsolute(raw.to_string()));
        }
        let parts: Vec<&str> = split_path(raw).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => {
                    if let Some(rest) = name.strip_prefix('*') {
                        if index + 1 != parts.len() {
                            return Err(TemplateError::CatchAllNotLast(raw.to_string()));
                        }
                        Segment::CatchAll(non_empty(rest, raw)?)
                    } else {
                        Segment::Variable(non_empty(name, raw)?)
                    }
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names in template order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) | Segment::CatchAll(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match `path`, returning percent-decoded variable values.
    pub fn match_path(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = split_path(path).collect();
        let mut variables = Vec::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    let rest = parts.get(index..).unwrap_or_default().join("/");
                    variables.push((name.clone(), percent_decode(&rest)));
                    return Some(variables);
                }
                Segment::Literal(literal) => {
                    if parts.get(index) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Variable(name) => {
                    let value = parts.get(index)?;
                    variables.push((name.clone(), percent_decode(value)));
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(variables)
    }

    /// Catch-alls last, then fewer variables, then longer literal text.
    pub fn specificity(&self) -> Specificity {
        let mut catch_all = false;
        let mut variables = 0;
        let mut literal_len = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => literal_len += text.len() + 1,
                Segment::Variable(_) => variables += 1,
                Segment::CatchAll(_) => catch_all = true,
            }
        }
        (catch_all, variables, Reverse(literal_len))
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn non_empty(name: &str, raw: &str) -> Result<String, TemplateError> {
    if name.is_empty() {
        Err(TemplateError::EmptyVariable(raw.to_string()))
    } else {
        Ok(name.to_string())
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Trait for matching requests against filter conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Matches a path pattern: `/**` (everything), `/api/**` (a subtree) or
/// an exact path.
#[derive(Debug, Clone)]
pub struct PathPatternMatcher {
    prefix: String,
    subtree: bool,
}

impl PathPatternMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        match pattern.strip_suffix("/**") {
            Some(prefix) => Self {
                prefix: prefix.to_string(),
                subtree: true,
            },
            None => Self {
                prefix: pattern,
                subtree: false,
            },
        }
    }
}

impl Matcher for PathPatternMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        if !self.subtree {
            return path == self.prefix;
        }
        // Segment-aware: `/api/**` covers `/api` and `/api/x`, not `/apix`.
        self.prefix.is_empty()
            || path == self.prefix
            || path
                .strip_prefix(&self.prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Matches a set of request methods.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        self.methods.contains(method)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.matchers.iter().all(|m| m.matches(method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(template: &str, path: &str) -> Option<Vec<(String, String)>> {
        UriTemplate::parse(template).unwrap().match_path(path)
    }

    #[test]
    fn test_template_matching() {
        assert_eq!(vars("/", "/"), Some(vec![]));
        assert_eq!(vars("/pets", "/pets/"), Some(vec![]));
        assert_eq!(
            vars("/pets/{id}", "/pets/a%20b"),
            Some(vec![("id".into(), "a b".into())])
        );
        assert_eq!(vars("/pets/{id}", "/pets"), None);
        assert_eq!(vars("/pets/{id}", "/pets/1/toys"), None);
        assert_eq!(vars("/Pets", "/pets"), None);
        assert_eq!(
            vars("/files/{*rest}", "/files/a/b.txt"),
            Some(vec![("rest".into(), "a/b.txt".into())])
        );
        assert_eq!(
            vars("/files/{*rest}", "/files"),
            Some(vec![("rest".into(), String::new())])
        );
    }

    #[test]
    fn test_variables_are_percent_decoded() {
        assert_eq!(
            vars("/tags/{tag}", "/tags/c%2B%2B"),
            Some(vec![("tag".into(), "c++".into())])
        );
        assert_eq!(
            vars("/tags/{tag}", "/tags/100%25"),
            Some(vec![("tag".into(), "100%".into())])
        );
        assert_eq!(
            vars("/tags/{tag}", "/tags/a+b%zz"),
            Some(vec![("tag".into(), "a+b%zz".into())])
        );
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(UriTemplate::parse("pets"), Err(TemplateError::NotAbsolute(_))));
        assert!(matches!(
            UriTemplate::parse("/{*a}/b"),
            Err(TemplateError::CatchAllNotLast(_))
        ));
        assert!(matches!(UriTemplate::parse("/{}"), Err(TemplateError::EmptyVariable(_))));
    }

    #[test]
    fn test_specificity_order() {
        let literal = UriTemplate::parse("/pets/mine").unwrap().specificity();
        let variable = UriTemplate::parse("/pets/{id}").unwrap().specificity();
        let nested = UriTemplate::parse("/pets/{id}/{toy}").unwrap().specificity();
        let catch_all = UriTemplate::parse("/pets/{*rest}").unwrap().specificity();
        assert!(literal < variable);
        assert!(variable < nested);
        assert!(nested < catch_all);
        assert_eq!(
            variable,
            UriTemplate::parse("/pets/{name}").unwrap().specificity()
        );
    }

    #[test]
    fn test_path_pattern_matcher() {
        let all = PathPatternMatcher::new("/**");
        assert!(all.matches(&Method::GET, "/anything/at/all"));

        let api = PathPatternMatcher::new("/api/**");
        assert!(api.matches(&Method::GET, "/api"));
        assert!(api.matches(&Method::POST, "/api/v1"));
        assert!(!api.matches(&Method::GET, "/apix"));

        let exact = PathPatternMatcher::new("/health");
        assert!(exact.matches(&Method::GET, "/health"));
        assert!(!exact.matches(&Method::GET, "/health/deep"));
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(PathPatternMatcher::new("/api/**")),
            Box::new(MethodMatcher::new([Method::POST])),
        ]);
        assert!(matcher.matches(&Method::POST, "/api/items"));
        assert!(!matcher.matches(&Method::GET, "/api/items"));
    }
}
