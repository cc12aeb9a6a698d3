//! Expectation registry: groups registered expectations into per-route
//! cases, dispatches routed requests, and runs teardown verification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::case::Case;
use crate::expectation::{Expectation, StubResponse};
use crate::report::FailureSink;
use crate::request::ReceivedRequest;

/// All registered cases, keyed by route pattern string.
///
/// Registration happens single-threaded before serving starts; dispatch
/// and verification take `&self` and serialize per-case access behind one
/// mutex per case, so concurrent workers can dispatch to the same route
/// without double-consuming a slot or racing the discrepancy list.
pub struct CaseSet {
    cases: HashMap<String, Mutex<Case>>,
    /// Patterns in first-registration order, for routing tables and
    /// deterministic verification output.
    order: Vec<String>,
    sink: Arc<dyn FailureSink>,
}

impl CaseSet {
    #[must_use]
    pub fn new(sink: Arc<dyn FailureSink>) -> Self {
        Self {
            cases: HashMap::new(),
            order: Vec::new(),
            sink,
        }
    }

    /// Register one expectation, expanding its repeat count into ordered
    /// call slots on the case for its route pattern.
    ///
    /// # Panics
    /// Panics if the expectation has no route pattern; the registry could
    /// never route a request to it.
    pub fn add(&mut self, expectation: Expectation) {
        assert!(
            !expectation.pattern.is_empty(),
            "expectation registered without a route pattern"
        );
        let pattern = expectation.pattern.clone();
        if !self.cases.contains_key(&pattern) {
            self.order.push(pattern.clone());
        }
        self.cases
            .entry(pattern)
            .or_insert_with(|| Mutex::new(Case::default()))
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .add(Arc::new(expectation));
    }

    /// Dispatch a routed request to its case and return the response to
    /// emit. `None` means no response was declared: either the case's
    /// call budget is exhausted, or `pattern` was never registered (which
    /// is reported to the sink immediately, like any route miss).
    pub fn dispatch(&self, pattern: &str, request: &ReceivedRequest) -> Option<StubResponse> {
        let Some(case) = self.cases.get(pattern) else {
            self.report_unmatched(&request.method, &request.path);
            return None;
        };
        lock_case(case).dispatch(request)
    }

    /// Report a request that matched no registered pattern. Sent to the
    /// sink at once: by teardown it could no longer be attributed.
    pub fn report_unmatched(&self, method: &str, path: &str) {
        self.sink.failure(&format!(
            "unexpected call {method} {path}: no expectations registered for this route"
        ));
    }

    /// Teardown verification: every call-count mismatch first, then every
    /// accumulated discrepancy, in registration order.
    pub fn verify(&self) {
        for pattern in &self.order {
            if let Some(case) = self.cases.get(pattern) {
                if let Some(message) = lock_case(case).count_mismatch(pattern) {
                    self.sink.failure(&message);
                }
            }
        }
        for pattern in &self.order {
            if let Some(case) = self.cases.get(pattern) {
                let case = lock_case(case);
                for discrepancy in case.discrepancies() {
                    self.sink.failure(discrepancy);
                }
            }
        }
    }

    /// Registered route patterns in first-registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of registered route patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A sink that panicked mid-report must not wedge later dispatches.
fn lock_case<'a>(case: &'a Mutex<Case>) -> MutexGuard<'a, Case> {
    case.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FailureLog;
    use proptest::prelude::*;

    // ── Test helpers ──

    fn new_set() -> (Arc<FailureLog>, CaseSet) {
        let log = Arc::new(FailureLog::new());
        let set = CaseSet::new(log.clone());
        (log, set)
    }

    fn sample_expectation() -> Expectation {
        Expectation::new().method("GET").path("/sample")
    }

    fn sample_request() -> ReceivedRequest {
        ReceivedRequest {
            method: "GET".to_string(),
            path: "/sample".to_string(),
            ..ReceivedRequest::default()
        }
    }

    #[test]
    fn registration_groups_by_pattern_in_order() {
        let (_, mut set) = new_set();
        set.add(sample_expectation());
        set.add(Expectation::new().method("GET").path("/other"));
        set.add(sample_expectation().times(2));

        assert_eq!(set.len(), 2);
        assert_eq!(set.patterns().collect::<Vec<_>>(), vec!["/sample", "/other"]);
    }

    #[test]
    fn dispatch_consumes_registrations_sequentially() {
        let (log, mut set) = new_set();
        set.add(sample_expectation().return_status(201));
        set.add(sample_expectation().return_status(202));

        let first = set.dispatch("/sample", &sample_request());
        let second = set.dispatch("/sample", &sample_request());

        assert_eq!(first.map(|r| r.status), Some(201));
        assert_eq!(second.map(|r| r.status), Some(202));
        set.verify();
        assert!(log.take().is_empty());
    }

    #[test]
    fn unknown_pattern_is_reported_before_teardown() {
        let (log, set) = new_set();

        let mut request = sample_request();
        request.path = "/nope".to_string();
        let response = set.dispatch("/nope", &request);

        assert!(response.is_none());
        assert_eq!(
            log.take(),
            vec![
                "unexpected call GET /nope: no expectations registered for this route"
                    .to_string()
            ]
        );
    }

    #[test]
    fn verify_reports_counts_before_discrepancies() {
        let (log, mut set) = new_set();
        set.add(sample_expectation().times(2));
        set.add(Expectation::new().method("POST").path("/submit"));

        // One matching call out of two, and one call with the wrong method.
        let _ = set.dispatch("/sample", &sample_request());
        let mut wrong = sample_request();
        wrong.path = "/submit".to_string();
        let _ = set.dispatch("/submit", &wrong);

        set.verify();
        let messages = log.take();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "route /sample: got 1 calls, want 2");
        assert!(messages[1].contains("method does not match"));
    }

    #[test]
    fn verify_replays_discrepancies_in_registration_order() {
        let (log, mut set) = new_set();
        set.add(sample_expectation());
        set.add(Expectation::new().method("POST").path("/submit"));

        let mut wrong_submit = sample_request();
        wrong_submit.path = "/submit".to_string();
        let _ = set.dispatch("/submit", &wrong_submit);
        let mut wrong_sample = sample_request();
        wrong_sample.method = "PUT".to_string();
        let _ = set.dispatch("/sample", &wrong_sample);

        set.verify();
        let messages = log.take();
        assert_eq!(messages.len(), 2);
        // "/sample" was registered first, so its discrepancy replays first.
        assert!(messages[0].starts_with("PUT /sample"));
        assert!(messages[1].starts_with("GET /submit"));
    }

    #[test]
    #[should_panic(expected = "without a route pattern")]
    fn empty_pattern_panics_at_registration() {
        let (_, mut set) = new_set();
        set.add(Expectation::new().method("GET"));
    }

    proptest! {
        /// `times(n)` admits exactly n calls; each extra call records one
        /// unexpected-call discrepancy and leaves the counter alone.
        #[test]
        fn call_budget_is_enforced_exactly(budget in 1usize..16, extra in 0usize..6) {
            let (log, mut set) = new_set();
            set.add(sample_expectation().times(budget));

            let mut served = 0;
            for _ in 0..budget + extra {
                if set.dispatch("/sample", &sample_request()).is_some() {
                    served += 1;
                }
            }
            prop_assert_eq!(served, budget);

            set.verify();
            let messages = log.take();
            prop_assert_eq!(messages.len(), extra);
            for message in &messages {
                prop_assert!(message.starts_with("unexpected call GET /sample"));
            }
        }
    }
}
