//! Error types for the Rookery binary.
//!
//! [`CliError`] is the top-level error type that wraps all possible
//! failure modes of the `build`, `serve` and `dev` commands.

/// Top-level error for the Rookery binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: rookery_config::ConfigError,
    },

    /// An asset rule could not be resolved to a URL.
    #[error("asset rule error: {source}")]
    Rule {
        /// The underlying rule error.
        #[from]
        source: rookery_config::RuleError,
    },

    /// Provisioning or verifying assets failed.
    #[error("asset error: {source}")]
    Assets {
        /// The underlying asset error.
        #[from]
        source: rookery_assets::AssetError,
    },

    /// The server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: rookery_server::ServerError,
    },
}
