//! Route patterns: path templates with named `{placeholder}` segments,
//! matched segment-wise against concrete request paths.

use std::collections::HashMap;

use crate::convert;

/// A parsed route pattern, e.g. `/api/v1/client/{client_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Matches exactly this segment text.
    Literal(String),
    /// Matches any single segment, capturing it under the given name.
    Param(String),
}

impl RoutePattern {
    /// Parse a pattern string. Empty segments are ignored, so a trailing
    /// slash is insignificant and `//` collapses.
    pub(crate) fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern string as registered, used as the case key.
    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    /// Match a concrete request path, extracting named parameters.
    /// Request segments are percent-decoded first, so an encoded path
    /// matches the literal values the expectation was written with.
    /// Returns `None` unless every segment lines up.
    pub(crate) fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(convert::decode_path_segment)
            .collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if *literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), part);
                }
            }
        }
        Some(params)
    }
}

/// Registration-ordered routing table; the first matching pattern wins.
#[derive(Debug)]
pub(crate) struct Router {
    patterns: Vec<RoutePattern>,
}

impl Router {
    pub(crate) fn new<'a>(patterns: impl Iterator<Item = &'a str>) -> Self {
        Self {
            patterns: patterns.map(RoutePattern::parse).collect(),
        }
    }

    /// Resolve a request path to the first matching registered pattern
    /// and its extracted parameters.
    pub(crate) fn route(&self, path: &str) -> Option<(&str, HashMap<String, String>)> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.matches(path).map(|params| (pattern.raw(), params)))
    }
}
