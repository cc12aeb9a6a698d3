//! httpstub: programmable HTTP stub server for tests
//!
//! Declare the calls a client under test is expected to make, in order,
//! with the canned response each call returns; start the server on an
//! ephemeral localhost port; point the client at [`StubServer::url`];
//! stop the server at the end of the test to reconcile call counts and
//! surface every recorded discrepancy at once.
//!
//! ```no_run
//! use httpstub::{Expectation, StubServer};
//!
//! # async fn demo() -> Result<(), httpstub::ServerError> {
//! let server = StubServer::builder()
//!     .expect(
//!         Expectation::new()
//!             .method("GET")
//!             .path("/api/v1/client/{client_id}")
//!             .expect_path_param("client_id", "1337")
//!             .return_status(200),
//!     )
//!     .start()
//!     .await?;
//!
//! // drive the client under test against server.url("/...")
//!
//! // verifies; with the default sink this panics listing every failure
//! server.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! Mismatches on an expected call (wrong method, body, params, headers)
//! never fail the client's HTTP exchange; the declared response is still
//! served and the mismatch is reported at teardown. Only calls that
//! cannot be attributed to any expectation (unknown route, exhausted
//! call budget) are answered with `404 Not Found`.
//!
//! The matching and verification engine lives in `httpstub-core`; this
//! crate adds the hyper listener, `{placeholder}` route patterns, and
//! request decoding, and re-exports the engine's public types.

mod convert;
mod pattern;
pub mod server;

pub use httpstub_core::{Body, Expectation, FailureLog, FailureSink, StubResponse};
pub use server::{ServerError, StubServer, StubServerBuilder};
