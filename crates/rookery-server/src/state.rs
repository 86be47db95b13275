//! Shared application state for the page server.
//!
//! Built once at startup from the [`SiteConfig`] and shared read-only
//! with every handler through `Arc`.

use std::path::PathBuf;

use rookery_config::{Mode, PageConfig, RuleError, SiteConfig};

/// An asset rule resolved to the URL it is served at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedAsset {
    /// URL path, e.g. `/_app/immutable/workers/stockfish-nnue-16.wasm`.
    pub url: String,
    /// The rule's source file (served directly in development).
    pub source: PathBuf,
    /// Whether the asset is a WebAssembly binary.
    pub wasm: bool,
}

/// State for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Which runtime is serving.
    pub mode: Mode,
    /// Hand-written static files (served directly in development).
    pub static_dir: PathBuf,
    /// Built asset root (served in production).
    pub output_dir: PathBuf,
    /// Page shell settings.
    pub page: PageConfig,
    /// Provisioned assets in rule order.
    pub assets: Vec<ServedAsset>,
}

impl AppState {
    /// Resolve the configuration into serving state.
    ///
    /// # Errors
    ///
    /// Returns the [`RuleError`] of the first unusable asset rule.
    pub fn from_config(config: &SiteConfig) -> Result<Self, RuleError> {
        let assets = config
            .build
            .assets
            .iter()
            .map(|rule| {
                Ok(ServedAsset {
                    url: rule.url_path()?,
                    source: rule.source.clone(),
                    wasm: rule.is_wasm(),
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        Ok(Self {
            mode: config.server.mode,
            static_dir: config.build.static_dir.clone(),
            output_dir: config.build.output_dir.clone(),
            page: config.page.clone(),
            assets,
        })
    }

    /// URLs of the engine binaries the page shell should preload.
    pub fn preload_urls(&self) -> impl Iterator<Item = &str> {
        self.assets
            .iter()
            .filter(|asset| asset.wasm)
            .map(|asset| asset.url.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rookery_config::AssetRule;

    use super::*;

    #[test]
    fn default_config_preloads_engine() {
        let state = AppState::from_config(&SiteConfig::default()).unwrap();

        assert_eq!(state.mode, Mode::Production);
        assert_eq!(
            state.preload_urls().collect::<Vec<_>>(),
            vec!["/_app/immutable/workers/stockfish-nnue-16.wasm"]
        );
    }

    #[test]
    fn non_wasm_assets_not_preloaded() {
        let mut config = SiteConfig::default();
        config.build.assets.push(AssetRule::new("vendor/book.bin", "books"));

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.assets.len(), 2);
        assert_eq!(state.preload_urls().count(), 1);
    }

    #[test]
    fn invalid_rule_rejected() {
        let mut config = SiteConfig::default();
        config.build.assets = vec![AssetRule::new("a.wasm", "/abs")];
        assert!(AppState::from_config(&config).is_err());
    }

    #[test]
    fn route_syntax_in_asset_name_rejected() {
        let mut config = SiteConfig::default();
        config.build.assets = vec![AssetRule::new("pkg/engine{v16}.wasm", "workers")];
        assert_eq!(
            AppState::from_config(&config).err(),
            Some(RuleError::UnsafeUrlChar(String::from("engine{v16}.wasm")))
        );
    }
}
