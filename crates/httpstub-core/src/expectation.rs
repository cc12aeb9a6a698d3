//! Expectation builder: one declared HTTP call, its matching criteria,
//! and the canned response to emit.

use std::collections::BTreeMap;

use serde::Serialize;

/// Request or response payload, resolved to concrete bytes the moment it
/// is attached to an [`Expectation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Bytes stored verbatim.
    Raw(Vec<u8>),
    /// Structured value serialized through the JSON codec on attachment.
    Json(serde_json::Value),
}

impl Body {
    /// Resolve to bytes. Serialization failure is broken test setup and
    /// aborts immediately rather than surfacing as a soft discrepancy.
    fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes,
            Self::Json(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => bytes,
                Err(e) => panic!("failed to serialize JSON body: {e}"),
            },
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::Raw(s.as_bytes().to_vec())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::Raw(s.into_bytes())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Self::Raw(bytes.to_vec())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Request-matching criteria for one expectation. Only the fields that
/// were set participate in matching; maps are ordered so discrepancy
/// output is deterministic.
#[derive(Debug, Clone, Default)]
pub(crate) struct Criteria {
    pub(crate) method: String,
    pub(crate) exact_body: Option<Vec<u8>>,
    pub(crate) body_fragment: Option<Vec<u8>>,
    pub(crate) path_params: BTreeMap<String, String>,
    pub(crate) query_params: BTreeMap<String, String>,
    pub(crate) headers: BTreeMap<String, Vec<String>>,
}

/// Response to emit for one expected call.
///
/// Headers are an ordered list: repeated names are emitted as repeated
/// header lines, and declared headers are appended to (never overwrite)
/// whatever the transport computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            // Undeclared status means a plain success, not the zero value.
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// One declared expected HTTP call: method, route pattern, matching
/// criteria, response, repeat count.
///
/// Built fluently as an owned value and consumed on registration; after
/// that it is immutable and shared read-only by its expanded call slots.
///
/// ```
/// use httpstub_core::Expectation;
///
/// let expectation = Expectation::new()
///     .method("GET")
///     .path("/api/v1/client/{client_id}")
///     .expect_path_param("client_id", "1337")
///     .return_status(200)
///     .times(2);
/// ```
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) pattern: String,
    pub(crate) criteria: Criteria,
    pub(crate) response: StubResponse,
    pub(crate) repeat: usize,
}

impl Expectation {
    /// Empty expectation: no criteria, empty 200 response, one call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pattern: String::new(),
            criteria: Criteria::default(),
            response: StubResponse::default(),
            repeat: 1,
        }
    }

    /// Expected HTTP method, compared case-sensitively.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.criteria.method = method.into();
        self
    }

    /// Route pattern this expectation is registered under. Path templates
    /// may carry named placeholders, e.g. `/api/v1/client/{client_id}`.
    #[must_use]
    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Require the request body to equal these bytes exactly.
    #[must_use]
    pub fn expect_body(mut self, body: impl Into<Body>) -> Self {
        self.criteria.exact_body = Some(body.into().into_bytes());
        self
    }

    /// Require the request body to equal the JSON serialization of `value`.
    ///
    /// # Panics
    /// Panics if `value` cannot be serialized.
    #[must_use]
    pub fn expect_json<T: Serialize>(self, value: &T) -> Self {
        self.expect_body(to_json_bytes(value))
    }

    /// Require the request body to contain this fragment. Independent of
    /// [`expect_body`](Self::expect_body); both may be set.
    #[must_use]
    pub fn expect_body_contains(mut self, fragment: impl Into<Body>) -> Self {
        self.criteria.body_fragment = Some(fragment.into().into_bytes());
        self
    }

    /// Require the router-extracted path parameter `name` to equal `value`.
    /// Repeated calls accumulate names; the same name overwrites.
    #[must_use]
    pub fn expect_path_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.criteria.path_params.insert(name.into(), value.into());
        self
    }

    /// Require the merged query-or-form parameter `name` to equal `value`.
    /// Form values override same-named query values for POST/PUT.
    #[must_use]
    pub fn expect_query_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.criteria.query_params.insert(name.into(), value.into());
        self
    }

    /// Require the request to carry `value` under header `name`. Repeated
    /// calls for one name accumulate values; the request may carry more.
    #[must_use]
    pub fn expect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria
            .headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Status code of the emitted response (defaults to 200).
    #[must_use]
    pub fn return_status(mut self, status: u16) -> Self {
        self.response.status = status;
        self
    }

    /// Append a header line to the emitted response. Repeated names are
    /// emitted as repeated lines.
    #[must_use]
    pub fn return_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.push((name.into(), value.into()));
        self
    }

    /// Body of the emitted response, written verbatim.
    #[must_use]
    pub fn return_body(mut self, body: impl Into<Body>) -> Self {
        self.response.body = body.into().into_bytes();
        self
    }

    /// JSON-serialized body of the emitted response. Declares no
    /// `Content-Type`; pair with [`return_header`](Self::return_header).
    ///
    /// # Panics
    /// Panics if `value` cannot be serialized.
    #[must_use]
    pub fn return_json<T: Serialize>(self, value: &T) -> Self {
        self.return_body(to_json_bytes(value))
    }

    /// Expect this call `count` times in a row (default 1).
    ///
    /// # Panics
    /// Panics if `count` is zero; the repeat count is defined to be ≥ 1.
    #[must_use]
    pub fn times(mut self, count: usize) -> Self {
        assert!(count >= 1, "expectation repeat count must be at least 1");
        self.repeat = count;
        self
    }

    /// Route pattern this expectation is registered under.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The declared response, as it will be emitted for each call.
    #[must_use]
    pub fn response(&self) -> &StubResponse {
        &self.response
    }

    /// Number of calls this expectation admits.
    #[must_use]
    pub fn repeat(&self) -> usize {
        self.repeat
    }
}

impl Default for Expectation {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize straight to bytes so struct field order matches what serde
/// clients put on the wire.
fn to_json_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(e) => panic!("failed to serialize JSON body: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Client {
        name: String,
        age: u32,
    }

    fn sample_client() -> Client {
        Client {
            name: "John Doe".to_string(),
            age: 24,
        }
    }

    #[test]
    fn new_expectation_defaults() {
        let e = Expectation::new();
        assert_eq!(e.repeat, 1);
        assert_eq!(e.response.status, 200);
        assert!(e.response.headers.is_empty());
        assert!(e.response.body.is_empty());
        assert!(e.criteria.exact_body.is_none());
    }

    #[test]
    fn accessors_reflect_built_state() {
        let e = Expectation::new()
            .method("GET")
            .path("/api/v1/client/{client_id}")
            .return_status(418)
            .times(3);
        assert_eq!(e.pattern(), "/api/v1/client/{client_id}");
        assert_eq!(e.repeat(), 3);
        assert_eq!(e.response().status, 418);
    }

    #[test]
    fn body_from_str_and_bytes() {
        assert_eq!(Body::from("abc"), Body::Raw(b"abc".to_vec()));
        assert_eq!(Body::from(b"abc".to_vec()), Body::Raw(b"abc".to_vec()));
        assert_eq!(
            Body::from(json!({"a": 1})),
            Body::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn expect_json_preserves_field_order() {
        let e = Expectation::new().expect_json(&sample_client());
        assert_eq!(
            e.criteria.exact_body.as_deref(),
            Some(br#"{"name":"John Doe","age":24}"#.as_slice())
        );
    }

    #[test]
    fn return_json_sets_body_bytes() {
        let e = Expectation::new().return_json(&sample_client());
        assert_eq!(e.response.body, br#"{"name":"John Doe","age":24}"#);
    }

    #[test]
    fn exact_and_fragment_criteria_are_independent() {
        let e = Expectation::new()
            .expect_body("whole body")
            .expect_body_contains("part");
        assert_eq!(e.criteria.exact_body.as_deref(), Some(b"whole body".as_slice()));
        assert_eq!(e.criteria.body_fragment.as_deref(), Some(b"part".as_slice()));
    }

    #[test]
    fn repeated_headers_accumulate_values() {
        let e = Expectation::new()
            .expect_header("X-Test", "one")
            .expect_header("X-Test", "two");
        assert_eq!(
            e.criteria.headers.get("X-Test"),
            Some(&vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn repeated_query_param_overwrites_same_name() {
        let e = Expectation::new()
            .expect_query_param("page", "1")
            .expect_query_param("page", "2")
            .expect_query_param("limit", "10");
        assert_eq!(e.criteria.query_params.get("page"), Some(&"2".to_string()));
        assert_eq!(e.criteria.query_params.len(), 2);
    }

    #[test]
    fn return_header_keeps_declaration_order_and_duplicates() {
        let e = Expectation::new()
            .return_header("X-Test", "one")
            .return_header("X-Test", "two")
            .return_header("Content-Type", "application/json");
        assert_eq!(
            e.response.headers,
            vec![
                ("X-Test".to_string(), "one".to_string()),
                ("X-Test".to_string(), "two".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "repeat count")]
    fn times_zero_panics() {
        let _ = Expectation::new().times(0);
    }
}
