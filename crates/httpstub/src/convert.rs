//! Conversions between hyper's wire types and the engine's request and
//! response representations.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use http_body_util::Full;
use httpstub_core::{ReceivedRequest, StubResponse};
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};

/// Build the engine's request snapshot from decoded request parts, the
/// fully-read body, and the router's extracted path parameters.
pub(crate) fn received_request(
    parts: &Parts,
    body: Vec<u8>,
    path_params: HashMap<String, String>,
) -> ReceivedRequest {
    let method = parts.method.as_str().to_string();

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &parts.headers {
        headers
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let params = merged_params(&method, parts.uri.query(), content_type, &body);

    ReceivedRequest {
        method,
        path: parts.uri.path().to_string(),
        headers,
        body,
        path_params,
        params,
    }
}

/// Single merged query/form lookup: urlencoded form-body values for
/// POST/PUT take precedence over same-named URL query values, and the
/// first occurrence wins within each source.
fn merged_params(
    method: &str,
    query: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> HashMap<String, String> {
    let mut params = HashMap::new();

    // Form pairs are inserted first so query pairs cannot displace them.
    if matches!(method, "POST" | "PUT") && is_urlencoded_form(content_type) {
        if let Ok(text) = std::str::from_utf8(body) {
            for (key, value) in parse_urlencoded(text) {
                params.entry(key).or_insert(value);
            }
        }
    }

    if let Some(query) = query {
        for (key, value) in parse_urlencoded(query) {
            params.entry(key).or_insert(value);
        }
    }

    params
}

fn is_urlencoded_form(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';').next().unwrap_or("").trim() == "application/x-www-form-urlencoded"
    })
}

/// Parse `a=1&b=2` pairs, percent-decoding keys and values.
fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = percent_decode(parts.next().unwrap_or(""));
            let value = percent_decode(parts.next().unwrap_or(""));
            (key, value)
        })
        .collect()
}

/// Decode percent escapes, treating `+` as space. Malformed escapes pass
/// through literally.
fn percent_decode(input: &str) -> String {
    decode_escapes(input, true)
}

/// Decode percent escapes in one path segment. Unlike in query strings,
/// a `+` in a path is a literal plus.
pub(crate) fn decode_path_segment(input: &str) -> String {
    decode_escapes(input, false)
}

fn decode_escapes(input: &str, plus_is_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                if let (Some(high), Some(low)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    out.push(high * 16 + low);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'+' if plus_is_space => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Canonicalize a header name to HTTP title case (`x-rq-header-1` →
/// `X-Rq-Header-1`). Hyper hands names over lowercased; expectations are
/// written in conventional casing.
fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' {
            out.push('-');
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Build the wire response for a declared stub response. Declared headers
/// are appended, never overwriting transport-computed ones; hyper fills
/// in `Content-Length` from the body.
pub(crate) fn emit_response(stub: StubResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(stub.body)));
    *response.status_mut() = status_code(stub.status);
    for (name, value) in &stub.headers {
        response
            .headers_mut()
            .append(header_name(name), header_value(name, value));
    }
    response
}

/// Plain-text response for transport-level answers (route misses,
/// exhausted budgets, unreadable bodies).
pub(crate) fn text_response(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message)));
    *response.status_mut() = status;
    response
}

/// Reject undeclarable responses at registration, in the test that wrote
/// them, instead of when the first request arrives.
pub(crate) fn validate_response(stub: &StubResponse) {
    let _ = status_code(stub.status);
    for (name, value) in &stub.headers {
        let _ = header_name(name);
        let _ = header_value(name, value);
    }
}

fn status_code(code: u16) -> StatusCode {
    match StatusCode::from_u16(code) {
        Ok(status) => status,
        Err(e) => panic!("invalid declared response status {code}: {e}"),
    }
}

fn header_name(name: &str) -> HeaderName {
    match HeaderName::from_bytes(name.as_bytes()) {
        Ok(name) => name,
        Err(e) => panic!("invalid declared response header name {name:?}: {e}"),
    }
}

fn header_value(name: &str, value: &str) -> HeaderValue {
    match HeaderValue::from_str(value) {
        Ok(value) => value,
        Err(e) => panic!("invalid declared response header value for {name:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- urlencoded parsing ---

    #[test]
    fn parse_urlencoded_splits_pairs() {
        assert_eq!(
            parse_urlencoded("a=1&b=2"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn parse_urlencoded_handles_missing_value_and_empty_pairs() {
        assert_eq!(
            parse_urlencoded("flag&&k="),
            vec![
                ("flag".to_string(), String::new()),
                ("k".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn percent_decode_unescapes_and_maps_plus_to_space() {
        assert_eq!(percent_decode("John+Doe"), "John Doe");
        assert_eq!(percent_decode("a%2Fb"), "a/b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn path_segment_decode_keeps_plus_literal() {
        assert_eq!(decode_path_segment("John%20Doe"), "John Doe");
        assert_eq!(decode_path_segment("a+b"), "a+b");
        assert_eq!(decode_path_segment("100%"), "100%");
    }

    // --- merged query/form lookup ---

    #[test]
    fn form_values_override_query_values_for_post() {
        let params = merged_params(
            "POST",
            Some("source=query&only=url"),
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"source=form&name=Carl+Cox",
        );

        assert_eq!(params.get("source"), Some(&"form".to_string()));
        assert_eq!(params.get("only"), Some(&"url".to_string()));
        assert_eq!(params.get("name"), Some(&"Carl Cox".to_string()));
    }

    #[test]
    fn form_body_ignored_for_get() {
        let params = merged_params(
            "GET",
            Some("source=query"),
            Some("application/x-www-form-urlencoded"),
            b"source=form",
        );

        assert_eq!(params.get("source"), Some(&"query".to_string()));
    }

    #[test]
    fn first_query_occurrence_wins() {
        let params = merged_params("GET", Some("a=1&a=2"), None, b"");
        assert_eq!(params.get("a"), Some(&"1".to_string()));
    }

    // --- header canonicalization ---

    #[test]
    fn header_names_canonicalize_to_title_case() {
        assert_eq!(canonical_header_name("x-rq-header-1"), "X-Rq-Header-1");
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("accept"), "Accept");
    }

    // --- response assembly ---

    #[test]
    fn emit_response_appends_declared_headers() {
        let stub = StubResponse {
            status: 201,
            headers: vec![
                ("X-Test".to_string(), "one".to_string()),
                ("X-Test".to_string(), "two".to_string()),
            ],
            body: b"created".to_vec(),
        };

        let response = emit_response(stub);
        assert_eq!(response.status(), StatusCode::CREATED);
        let values: Vec<_> = response.headers().get_all("x-test").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    #[should_panic(expected = "invalid declared response header name")]
    fn invalid_header_name_panics() {
        validate_response(&StubResponse {
            status: 200,
            headers: vec![("bad name".to_string(), "v".to_string())],
            body: Vec::new(),
        });
    }

    #[test]
    #[should_panic(expected = "invalid declared response status")]
    fn invalid_status_panics() {
        validate_response(&StubResponse {
            status: 42,
            headers: Vec::new(),
            body: Vec::new(),
        });
    }
}
