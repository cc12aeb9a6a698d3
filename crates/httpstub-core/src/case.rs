//! Per-route ordered-call state: expanded call slots, counters, and the
//! discrepancy list accumulated across every call to one route pattern.

use std::sync::Arc;

use crate::expectation::{Expectation, StubResponse};
use crate::matcher;
use crate::request::ReceivedRequest;

/// Ordered-call state for all expectations sharing one route pattern.
///
/// Slots are dense and 0-based; slot `i` serves call `i`. A registration
/// with a repeat count of `n` contributes `n` consecutive slots sharing one
/// expectation, so inter-registration order on a pattern is strictly the
/// registration order.
#[derive(Debug, Default)]
pub(crate) struct Case {
    slots: Vec<Arc<Expectation>>,
    actual_calls: usize,
    discrepancies: Vec<String>,
}

impl Case {
    /// Append the expanded slots for one registered expectation.
    pub(crate) fn add(&mut self, expectation: Arc<Expectation>) {
        for _ in 0..expectation.repeat {
            self.slots.push(Arc::clone(&expectation));
        }
    }

    pub(crate) fn expected_calls(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn actual_calls(&self) -> usize {
        self.actual_calls
    }

    /// Consume the slot at the current call index: match the request,
    /// record any discrepancies, advance the counter, and hand back the
    /// declared response.
    ///
    /// When every slot is already consumed the counter stays put, an
    /// "unexpected call" discrepancy is recorded instead, and no response
    /// is declared.
    pub(crate) fn dispatch(&mut self, request: &ReceivedRequest) -> Option<StubResponse> {
        match self.slots.get(self.actual_calls) {
            Some(slot) => {
                self.discrepancies
                    .extend(matcher::run_checks(&slot.criteria, request));
                self.actual_calls += 1;
                Some(slot.response.clone())
            }
            None => {
                self.discrepancies.push(format!(
                    "unexpected call {} {}: want {} calls, got {}",
                    request.method,
                    request.path,
                    self.slots.len(),
                    self.actual_calls + 1,
                ));
                None
            }
        }
    }

    /// Count-mismatch message for teardown, if the call budget was not met
    /// exactly. Mismatch in either direction is one discrepancy.
    pub(crate) fn count_mismatch(&self, pattern: &str) -> Option<String> {
        if self.actual_calls == self.slots.len() {
            None
        } else {
            Some(format!(
                "route {pattern}: got {} calls, want {}",
                self.actual_calls,
                self.slots.len(),
            ))
        }
    }

    /// Every discrepancy recorded against this route, in arrival order.
    pub(crate) fn discrepancies(&self) -> &[String] {
        &self.discrepancies
    }
}
