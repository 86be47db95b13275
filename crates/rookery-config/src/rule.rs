//! Build-time asset provisioning rules.
//!
//! An [`AssetRule`] pairs a file shipped inside a third-party package
//! (typically the Stockfish WebAssembly binary under `node_modules`) with
//! a directory under the served asset root. The provisioned file keeps
//! its original file name, so the URL it is served at is stable for as
//! long as the rule is unchanged.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

/// Source path of the NNUE Stockfish build inside the installed package.
pub const ENGINE_WASM_SOURCE: &str = "node_modules/stockfish/src/stockfish-nnue-16.wasm";

/// Directory (relative to the asset root) that engine workers are served from.
pub const ENGINE_WORKER_DIR: &str = "_app/immutable/workers";

/// Reasons an [`AssetRule`] cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The destination is absolute, so it would escape the asset root.
    #[error("destination must be relative to the asset root: {}", .0.display())]
    AbsoluteDestination(PathBuf),

    /// The destination walks out of the asset root via `..`.
    #[error("destination must not contain `..`: {}", .0.display())]
    ParentTraversal(PathBuf),

    /// The source path does not name a file.
    #[error("source has no file name: {}", .0.display())]
    NoFileName(PathBuf),

    /// A path cannot be turned into a URL because it is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8(PathBuf),

    /// A file or directory name would need escaping in a URL or route.
    #[error("name {0:?} may only use ASCII letters, digits and `-._~+@,`")]
    UnsafeUrlChar(String),
}

/// Whether `name` can appear verbatim in a URL path and a route pattern.
fn url_safe(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '@' | ','))
}

/// A single static-copy declaration: `source` file into `destination` directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetRule {
    /// File to copy, relative to the working directory or absolute.
    pub source: PathBuf,

    /// Directory relative to the asset root that receives the file.
    pub destination: PathBuf,
}

impl AssetRule {
    /// Build a rule from anything path-like.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// The rule that provisions the Stockfish NNUE binary for the worker loader.
    pub fn engine_wasm() -> Self {
        Self::new(ENGINE_WASM_SOURCE, ENGINE_WORKER_DIR)
    }

    /// Check that the rule can be applied without leaving the asset root.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] describing the first problem found.
    pub fn check(&self) -> Result<(), RuleError> {
        self.file_name()?;
        for component in self.destination.components() {
            match component {
                Component::Normal(part) => {
                    let Some(part) = part.to_str() else {
                        return Err(RuleError::NonUtf8(self.destination.clone()));
                    };
                    if !url_safe(part) {
                        return Err(RuleError::UnsafeUrlChar(part.to_owned()));
                    }
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(RuleError::ParentTraversal(self.destination.clone()));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(RuleError::AbsoluteDestination(self.destination.clone()));
                }
            }
        }
        Ok(())
    }

    /// File name the provisioned copy keeps.
    ///
    /// # Errors
    ///
    /// [`RuleError::NoFileName`] if `source` ends in `..` or is empty,
    /// [`RuleError::NonUtf8`] or [`RuleError::UnsafeUrlChar`] if the name
    /// cannot appear verbatim in a URL.
    pub fn file_name(&self) -> Result<&str, RuleError> {
        let name = self
            .source
            .file_name()
            .ok_or_else(|| RuleError::NoFileName(self.source.clone()))?
            .to_str()
            .ok_or_else(|| RuleError::NonUtf8(self.source.clone()))?;
        if url_safe(name) {
            Ok(name)
        } else {
            Err(RuleError::UnsafeUrlChar(name.to_owned()))
        }
    }

    /// Where the copy lands under `root`.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] if the rule fails [`AssetRule::check`].
    pub fn target_path(&self, root: &Path) -> Result<PathBuf, RuleError> {
        self.check()?;
        Ok(root.join(&self.destination).join(self.file_name()?))
    }

    /// Absolute URL path the provisioned file is served at, e.g.
    /// `/_app/immutable/workers/stockfish-nnue-16.wasm`.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] if the rule fails [`AssetRule::check`].
    pub fn url_path(&self) -> Result<String, RuleError> {
        self.check()?;
        let mut url = String::new();
        for part in self.destination.components().filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        }) {
            url.push('/');
            url.push_str(part);
        }
        url.push('/');
        url.push_str(self.file_name()?);
        Ok(url)
    }

    /// Whether the provisioned file is a WebAssembly binary.
    pub fn is_wasm(&self) -> bool {
        self.source.extension() == Some(OsStr::new("wasm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_rule_serves_under_immutable_workers() {
        let rule = AssetRule::engine_wasm();
        assert!(rule.check().is_ok());
        assert!(rule.is_wasm());
        assert_eq!(
            rule.url_path(),
            Ok(String::from("/_app/immutable/workers/stockfish-nnue-16.wasm"))
        );
        assert_eq!(
            rule.target_path(Path::new("build")),
            Ok(PathBuf::from("build/_app/immutable/workers/stockfish-nnue-16.wasm"))
        );
    }

    #[test]
    fn empty_destination_is_asset_root() {
        let rule = AssetRule::new("vendor/robots.txt", "");
        assert_eq!(rule.url_path(), Ok(String::from("/robots.txt")));
        assert!(!rule.is_wasm());
    }

    #[test]
    fn current_dir_components_are_ignored() {
        let rule = AssetRule::new("a/engine.wasm", "./workers/./v1");
        assert_eq!(rule.url_path(), Ok(String::from("/workers/v1/engine.wasm")));
    }

    #[test]
    fn parent_traversal_rejected() {
        let rule = AssetRule::new("a/engine.wasm", "workers/../../etc");
        assert_eq!(
            rule.check(),
            Err(RuleError::ParentTraversal(PathBuf::from("workers/../../etc")))
        );
    }

    #[test]
    fn absolute_destination_rejected() {
        let rule = AssetRule::new("a/engine.wasm", "/var/www");
        assert!(matches!(
            rule.check(),
            Err(RuleError::AbsoluteDestination(_))
        ));
        assert!(rule.url_path().is_err());
    }

    #[test]
    fn route_syntax_in_file_name_rejected() {
        for name in ["engine{v16}.wasm", "engine*.wasm", "a b.wasm", "x#1.wasm", "q?.wasm", "p%20.wasm"] {
            let rule = AssetRule::new(Path::new("pkg").join(name), "workers");
            assert_eq!(
                rule.check(),
                Err(RuleError::UnsafeUrlChar(name.to_owned())),
                "{name}"
            );
            assert!(rule.url_path().is_err());
        }
    }

    #[test]
    fn route_syntax_in_destination_rejected() {
        let rule = AssetRule::new("pkg/engine.wasm", "workers/{version}");
        assert_eq!(
            rule.check(),
            Err(RuleError::UnsafeUrlChar(String::from("{version}")))
        );
    }

    #[test]
    fn source_directories_may_use_any_name() {
        let rule = AssetRule::new("my packages/{v1}/engine-1.0_b.wasm", "workers");
        assert!(rule.check().is_ok());
    }

    #[test]
    fn source_without_file_name_rejected() {
        let rule = AssetRule::new("node_modules/..", "workers");
        assert!(matches!(rule.check(), Err(RuleError::NoFileName(_))));
    }
}
