//! Snapshot of one fully-read inbound request, as the transport layer
//! hands it to the engine.

use std::collections::{BTreeMap, HashMap};

/// One inbound request, decoded and ready for matching. The transport is
/// responsible for canonicalizing header names, collecting the body,
/// extracting path parameters from the matched route pattern, and merging
/// query-string and form values into `params`.
#[derive(Debug, Clone, Default)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    /// Every value seen for each header name, names canonicalized.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Vec<u8>,
    /// Parameters the router extracted from the matched pattern.
    pub path_params: HashMap<String, String>,
    /// Merged query/form values; form wins over query for POST/PUT.
    pub params: HashMap<String, String>,
}

impl ReceivedRequest {
    /// Merged query-or-form value for `name`; an absent parameter resolves
    /// to the empty string, matching standard form-value lookup.
    #[must_use]
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_param_resolves_to_empty_string() {
        let mut request = ReceivedRequest::default();
        request.params.insert("present".to_string(), "yes".to_string());

        assert_eq!(request.param("present"), "yes");
        assert_eq!(request.param("absent"), "");
    }
}
