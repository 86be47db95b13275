//! Build-time asset provisioning for Rookery.
//!
//! The chess engine runs as a WebAssembly worker whose binary ships inside
//! an npm package. The worker loader fetches it from a fixed URL, so the
//! build must place it at a stable path under the served asset root. This
//! crate does that, alongside copying the hand-written `static/` tree.
//!
//! - [`provision`] -- full build: check sources, copy static tree, copy rules
//! - [`verify_sources`] -- source check only (used by the dev server)
//! - [`verify_outputs`] -- check a finished build (used by the production server)

pub mod error;
pub mod provision;

pub use error::AssetError;
pub use provision::{provision, verify_outputs, verify_sources, ProvisionReport, ProvisionedAsset};
