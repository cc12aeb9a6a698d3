//! httpstub-core: expectation matching and ordered-call verification
//!
//! The transport-free engine behind the `httpstub` test server: build
//! [`Expectation`]s fluently, register them in a [`CaseSet`] (one case per
//! route pattern, repeat counts expanded into ordered call slots), dispatch
//! routed requests through the six-check request matcher, and verify call
//! counts at teardown, replaying every recorded discrepancy to a
//! [`FailureSink`].
//!
//! Nothing here performs I/O. A transport layer feeds the engine
//! fully-decoded [`ReceivedRequest`] values and emits the
//! [`StubResponse`]s it hands back.

mod case;
pub mod dispatch;
pub mod expectation;
mod matcher;
pub mod report;
pub mod request;

pub use dispatch::CaseSet;
pub use expectation::{Body, Expectation, StubResponse};
pub use report::{FailureLog, FailureSink};
pub use request::ReceivedRequest;
