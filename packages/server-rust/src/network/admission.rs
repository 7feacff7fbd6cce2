//! Request admission filter: rejects protocol-upgrade probes before any
//! other stage runs.
//!
//! Some scanners probe HTTP/1.1 servers with the HTTP/2 prior-knowledge
//! preface re-encoded as an ordinary request (`PRI * HTTP/2.0`). Those
//! requests are not legitimate cross-origin traffic and must never reach the
//! CORS stage or a route handler, so this filter sits ahead of both and
//! answers with a bare 400. Everything else passes through untouched.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use tower::{Layer, Service};

/// Method used by HTTP/2 prior-knowledge connection prefaces.
const UPGRADE_PROBE_METHOD: &str = "PRI";

// ---------------------------------------------------------------------------
// AdmissionLayer
// ---------------------------------------------------------------------------

/// Tower layer installing the admission filter.
#[derive(Debug, Clone, Default)]
pub struct AdmissionLayer;

impl AdmissionLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService { inner }
    }
}

// ---------------------------------------------------------------------------
// AdmissionService
// ---------------------------------------------------------------------------

/// Service wrapper that short-circuits upgrade probes with a fixed 400.
#[derive(Debug, Clone)]
pub struct AdmissionService<S> {
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AdmissionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if is_upgrade_probe(&req) {
            // Expected hostile traffic: rejected without logging an error and
            // without invoking any downstream stage.
            return Box::pin(std::future::ready(Ok(probe_rejection())));
        }
        Box::pin(self.inner.call(req))
    }
}

/// True only for the exact probe shape: method `PRI` with the wildcard
/// target. `PRI` on a normal path, or other methods on `*`, pass through.
fn is_upgrade_probe<B>(req: &Request<B>) -> bool {
    req.method().as_str() == UPGRADE_PROBE_METHOD && req.uri().path() == "*"
}

fn probe_rejection() -> Response<Body> {
    let mut response = Response::new(Body::from("Bad Request"));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
