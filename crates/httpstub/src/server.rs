//! Stub server lifecycle: registration, the hyper accept loop, dispatch
//! wiring, and teardown verification.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use httpstub_core::{CaseSet, Expectation, FailureLog, FailureSink};

use crate::convert;
use crate::pattern::Router;

/// Errors from starting the stub server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound or inspected.
    #[error("listener error: {0}")]
    Listener(#[from] std::io::Error),
}

/// Collects expectations before the server starts. Registration freezes
/// when [`start`](Self::start) consumes the builder; the running server
/// accepts no further expectations.
#[derive(Default)]
pub struct StubServerBuilder {
    expectations: Vec<Expectation>,
    sink: Option<Arc<dyn FailureSink>>,
    addr: Option<SocketAddr>,
}

impl StubServerBuilder {
    /// Register one expectation.
    ///
    /// # Panics
    /// Panics if the declared response cannot be put on the wire (bad
    /// status code, undecodable header), so broken declarations fail in
    /// the test that wrote them rather than under traffic.
    #[must_use]
    pub fn expect(mut self, expectation: Expectation) -> Self {
        convert::validate_response(expectation.response());
        debug!(
            pattern = expectation.pattern(),
            calls = expectation.repeat(),
            "expectation registered"
        );
        self.expectations.push(expectation);
        self
    }

    /// Deliver verification failures to `sink` instead of panicking at
    /// [`StubServer::stop`]. Route misses reach the sink the moment they
    /// happen; everything else arrives at teardown.
    #[must_use]
    pub fn failure_sink(mut self, sink: impl FailureSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Bind to a specific address instead of an ephemeral localhost port.
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Freeze registration, bind the listener, and start serving.
    ///
    /// # Panics
    /// Panics if any expectation was registered without a route pattern.
    pub async fn start(self) -> Result<StubServer, ServerError> {
        let (sink, log): (Arc<dyn FailureSink>, Option<Arc<FailureLog>>) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let log = Arc::new(FailureLog::new());
                (Arc::clone(&log) as Arc<dyn FailureSink>, Some(log))
            }
        };

        let mut cases = CaseSet::new(sink);
        for expectation in self.expectations {
            cases.add(expectation);
        }
        let router = Router::new(cases.patterns());
        let state = Arc::new(ServerState { router, cases });

        let bind = self
            .addr
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)));
        let listener = TcpListener::bind(bind).await?;
        let addr = listener.local_addr()?;
        info!(%addr, routes = state.cases.len(), "stub server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        Ok(StubServer {
            addr,
            state,
            log,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// A running stub server bound to a local port.
///
/// Call [`stop`](Self::stop) at the end of the test to verify; a server
/// that is only dropped shuts the listener down but skips verification.
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    log: Option<Arc<FailureLog>>,
    shutdown: Option<watch::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Start declaring a stub server.
    #[must_use]
    pub fn builder() -> StubServerBuilder {
        StubServerBuilder::default()
    }

    /// The address the server is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for a path on this server, for the client under test.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop serving and verify: finish in-flight exchanges, reconcile
    /// call counts per route, then replay every recorded discrepancy to
    /// the failure sink.
    ///
    /// # Panics
    /// With the default sink, panics if verification produced any failure
    /// messages, failing the surrounding test with the full report.
    pub async fn stop(mut self) {
        self.shutdown_listener().await;
        info!(addr = %self.addr, "stub server stopped, verifying");
        self.state.cases.verify();

        if let Some(log) = self.log.take() {
            let failures = log.take();
            if !failures.is_empty() {
                panic!(
                    "stub server verification failed ({} failures):\n  {}",
                    failures.len(),
                    failures.join("\n  "),
                );
            }
        }
    }

    /// Dropping the sender wakes every shutdown receiver too, closing the
    /// race where a connection task is spawned right as the signal fires.
    async fn shutdown_listener(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("listener task did not shut down cleanly");
            }
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Routing table and case registry shared by every serving task.
struct ServerState {
    router: Router,
    cases: CaseSet,
}

/// Accept connections until shutdown, then drain them: in-flight
/// exchanges finish before the loop returns, so teardown verification
/// never races a request handler.
async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown: watch::Receiver<()>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "connection accepted");
                let state = Arc::clone(&state);
                let mut shutdown = shutdown.clone();
                connections.spawn(async move {
                    let service =
                        service_fn(move |request| handle(request, Arc::clone(&state)));
                    let connection = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service);
                    tokio::pin!(connection);
                    tokio::select! {
                        served = connection.as_mut() => {
                            if let Err(e) = served {
                                debug!(error = %e, "connection closed with error");
                            }
                        }
                        _ = shutdown.changed() => {
                            // Finishes the exchange in flight; an idle
                            // keep-alive connection closes at once.
                            connection.as_mut().graceful_shutdown();
                            let _ = connection.as_mut().await;
                        }
                    }
                });
            }
        }
    }
    while connections.join_next().await.is_some() {}
}

/// Serve one request: route it, hand it to the engine under the case
/// lock, and emit whatever response the matched slot declared.
async fn handle(
    request: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!(error = %e, %method, %path, "failed to read request body");
            return Ok(convert::text_response(
                StatusCode::BAD_REQUEST,
                "failed to read request body".to_string(),
            ));
        }
    };

    let Some((pattern, path_params)) = state.router.route(&path) else {
        warn!(%method, %path, "unexpected call: no route registered");
        state.cases.report_unmatched(&method, &path);
        return Ok(convert::text_response(
            StatusCode::NOT_FOUND,
            format!("no expectations registered for {method} {path}"),
        ));
    };

    let received = convert::received_request(&parts, body, path_params);
    debug!(%method, %path, pattern, "dispatching");
    match state.cases.dispatch(pattern, &received) {
        Some(stub) => Ok(convert::emit_response(stub)),
        None => {
            warn!(%method, %path, pattern, "unexpected call: call budget exhausted");
            Ok(convert::text_response(
                StatusCode::NOT_FOUND,
                format!("no remaining expectations for {method} {path}"),
            ))
        }
    }
}
