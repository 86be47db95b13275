//! Page and asset server for Rookery.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Analysis page** (`GET /`, `GET /{fen}`) -- HTML shell seeded with
//!   the optional FEN from the URL
//! - **Page data** (`GET /__data.json`, `GET /{fen}/__data.json`) -- the
//!   same initial state as JSON
//! - **Static assets** -- the built asset tree in production, source
//!   files in development, including the Stockfish WebAssembly binary
//!
//! # Cross-origin isolation
//!
//! Every response carries the four headers in
//! [`isolation::ISOLATION_HEADERS`]. Production attaches them with a
//! request hook on the router; development wraps the whole application
//! in [`isolation::IsolationLayer`]. Both call the same
//! [`isolation::add_isolation_headers`], so the two runtimes cannot drift.

pub mod error;
pub mod isolation;
pub mod page;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use isolation::{add_isolation_headers, IsolationLayer, IsolationService, ISOLATION_HEADERS};
pub use page::{load, PageData};
pub use router::{build_router, development_app, production_app};
pub use server::{start_server, ServerError};
pub use state::{AppState, ServedAsset};
