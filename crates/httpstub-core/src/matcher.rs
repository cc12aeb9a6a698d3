//! Request validation checks (6-check pipeline)
//!
//! Pure evaluation of one received request against one expectation's
//! criteria. Every check runs; a failing check appends one message and
//! never stops the rest.

use crate::expectation::Criteria;
use crate::request::ReceivedRequest;

/// Run all 6 request validation checks.
///
/// Returns one formatted message per failing check, in check order. Each
/// message carries the request's method and path so it stays readable
/// when replayed in an aggregated teardown report.
pub(crate) fn run_checks(criteria: &Criteria, request: &ReceivedRequest) -> Vec<String> {
    let mut discrepancies = Vec::new();
    let at = format!("{} {}", request.method, request.path);

    // ── Check 1: method equality (case-sensitive) ──
    if request.method != criteria.method {
        discrepancies.push(format!(
            "{at}: method does not match: got {:?}, want {:?}",
            request.method, criteria.method
        ));
    }

    // ── Check 2: exact body, only if the criterion was set ──
    if let Some(want) = &criteria.exact_body {
        if &request.body != want {
            discrepancies.push(format!(
                "{at}: body does not match: got {:?}, want {:?}",
                String::from_utf8_lossy(&request.body),
                String::from_utf8_lossy(want),
            ));
        }
    }

    // ── Check 3: body fragment, independent of check 2 ──
    if let Some(fragment) = &criteria.body_fragment {
        if !contains(&request.body, fragment) {
            discrepancies.push(format!(
                "{at}: body does not contain {:?}: got {:?}",
                String::from_utf8_lossy(fragment),
                String::from_utf8_lossy(&request.body),
            ));
        }
    }

    // ── Check 4: path parameters (expected names only; extras ignored) ──
    for (name, want) in &criteria.path_params {
        match request.path_params.get(name) {
            None => {
                discrepancies.push(format!("{at}: missing path parameter {name:?}"));
            }
            Some(got) if got != want => {
                discrepancies.push(format!(
                    "{at}: path parameter {name:?} does not match: got {got:?}, want {want:?}"
                ));
            }
            Some(_) => {}
        }
    }

    // ── Check 5: merged query/form parameters ──
    for (name, want) in &criteria.query_params {
        let got = request.param(name);
        if got != want.as_str() {
            discrepancies.push(format!(
                "{at}: query parameter {name:?} does not match: got {got:?}, want {want:?}"
            ));
        }
    }

    // ── Check 6: headers (value containment, not exact-set equality) ──
    for (name, want_values) in &criteria.headers {
        match request.headers.get(name) {
            None => {
                discrepancies.push(format!("{at}: missing header {name:?}"));
            }
            Some(got_values) => {
                for want in want_values {
                    if !got_values.contains(want) {
                        discrepancies.push(format!(
                            "{at}: header {name:?} is missing value {want:?}: got {got_values:?}"
                        ));
                    }
                }
            }
        }
    }

    discrepancies
}

/// Byte-slice containment; empty needle always matches.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
