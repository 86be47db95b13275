//! Cross-origin isolation headers.
//!
//! The Stockfish worker uses `SharedArrayBuffer` for its threads, and
//! browsers only expose that to cross-origin isolated documents. If any
//! response lacks these headers the page still loads but the engine
//! refuses to start, so they go on every response: pages, static files,
//! 404s and 500s alike.
//!
//! There is one transformation, [`add_isolation_headers`], and two ways
//! to wire it in:
//!
//! - [`isolation_hook`] -- production request hook, registered with
//!   [`axum::middleware::map_response`] on the whole router
//! - [`IsolationLayer`] -- development middleware wrapping the entire
//!   application service from the outside
//!
//! Exactly one of them must be active. The transformation appends, so
//! wiring both would duplicate every header.

use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request, Response};
use futures::future::{MapOk, TryFutureExt};
use tower::{Layer, Service};

/// The four headers, in the order they are appended.
pub const ISOLATION_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-embedder-policy", "require-corp"),
];

/// Append the isolation headers to `response`.
///
/// Existing headers are left in place, including existing values for the
/// same names.
pub fn add_isolation_headers<B>(mut response: Response<B>) -> Response<B> {
    let headers = response.headers_mut();
    for (name, value) in ISOLATION_HEADERS {
        headers.append(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

/// Production request hook. Runs once per response after routing.
#[allow(clippy::unused_async)]
pub async fn isolation_hook(response: axum::response::Response) -> axum::response::Response {
    add_isolation_headers(response)
}

/// Development middleware that decorates every response of the wrapped service.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolationLayer;

impl<S> Layer<S> for IsolationLayer {
    type Service = IsolationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IsolationService { inner }
    }
}

/// Service produced by [`IsolationLayer`].
///
/// Always forwards the request to the inner service exactly once and
/// never answers on its own. Readiness and errors pass through untouched.
#[derive(Debug, Clone)]
pub struct IsolationService<S> {
    inner: S,
}

impl<S> IsolationService<S> {
    /// The wrapped service.
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for IsolationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = MapOk<S::Future, fn(Response<ResBody>) -> Response<ResBody>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        self.inner
            .call(request)
            .map_ok(add_isolation_headers::<ResBody> as fn(_) -> _)
    }
}
