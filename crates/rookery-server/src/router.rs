//! Axum router construction for the page server.
//!
//! Static files are tried first and the page routes catch what is left,
//! so a file in the asset root always wins over a FEN that happens to
//! look like its name.
//!
//! The isolation headers are wired in by [`production_app`] or
//! [`development_app`], never by [`build_router`] itself.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use rookery_config::Mode;
use tower::Layer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::isolation::{isolation_hook, IsolationLayer, IsolationService};
use crate::page;
use crate::state::AppState;

/// URL prefix of content-hashed build output that never changes in place.
pub const IMMUTABLE_PREFIX: &str = "/_app/immutable";

const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Page and data routes, with a JSON 404 for everything else.
///
/// - `GET /` and `GET /{fen}` -- HTML shell
/// - `GET /__data.json` and `GET /{fen}/__data.json` -- page data
pub fn page_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/__data.json", get(page::index_data))
        .route("/{fen}", get(page::show))
        .route("/{fen}/__data.json", get(page::show_data))
        .fallback(page::not_found)
        .with_state(state)
}

/// Build the router for the state's mode, without isolation headers.
///
/// Production serves the built `output_dir` and marks files under
/// [`IMMUTABLE_PREFIX`] as cacheable forever. Development serves each
/// asset rule's URL straight from its source file, then `static_dir`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = match state.mode {
        Mode::Production => production_files(&state),
        Mode::Development => development_files(&state),
    };
    router.layer(TraceLayer::new_for_http())
}

fn production_files(state: &Arc<AppState>) -> Router {
    let root = &state.output_dir;
    let immutable = Router::new()
        .fallback_service(ServeDir::new(root.join("_app").join("immutable")))
        .layer(middleware::map_response(immutable_cache_control));

    Router::new()
        .nest_service(IMMUTABLE_PREFIX, immutable)
        .fallback_service(
            ServeDir::new(root)
                .append_index_html_on_directories(false)
                .fallback(page_routes(Arc::clone(state))),
        )
}

fn development_files(state: &Arc<AppState>) -> Router {
    let mut router = Router::new();
    let mut seen = HashSet::new();
    // Later rules overwrite earlier ones in a real build; match that.
    // Rule URLs contain no route syntax, so `route_service` cannot panic.
    for asset in state.assets.iter().rev() {
        if seen.insert(asset.url.as_str()) {
            router = router.route_service(&asset.url, ServeFile::new(&asset.source));
        } else {
            warn!(url = asset.url, "Duplicate asset URL, earlier rule shadowed");
        }
    }
    router.fallback_service(
        ServeDir::new(&state.static_dir)
            .append_index_html_on_directories(false)
            .fallback(page_routes(Arc::clone(state))),
    )
}

#[allow(clippy::unused_async)]
async fn immutable_cache_control(mut response: Response) -> Response {
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL));
    }
    response
}

/// Register the isolation headers as a production request hook.
///
/// Applied with [`Router::layer`] after every route and fallback is in
/// place, so it covers static files, pages and 404s.
pub fn with_request_hook(router: Router) -> Router {
    router.layer(middleware::map_response(isolation_hook))
}

/// Wrap the whole application in the development isolation middleware.
///
/// The middleware sits outside the router, so it runs before any
/// framework handler and sees every response the router produces.
pub fn with_dev_middleware(router: Router) -> IsolationService<Router> {
    IsolationLayer.layer(router)
}

/// The production application: file server, pages, request hook.
pub fn production_app(state: Arc<AppState>) -> Router {
    with_request_hook(build_router(state))
}

/// The development application: source files, pages, dev middleware.
pub fn development_app(state: Arc<AppState>) -> IsolationService<Router> {
    with_dev_middleware(build_router(state))
}
