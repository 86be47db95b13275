//! Error types for the `rookery-assets` crate.
//!
//! Every variant carries the path involved so a failed build points
//! straight at the file to install or the rule to fix.

use std::path::PathBuf;

use rookery_config::RuleError;

/// Errors that can occur while provisioning build assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// An asset rule cannot be applied.
    #[error("build.assets[{index}]: {source}")]
    InvalidRule {
        /// Position of the rule in `build.assets`.
        index: usize,
        /// Why the rule was rejected.
        source: RuleError,
    },

    /// The file a rule copies from does not exist.
    #[error(
        "asset source not found: {}; install the package that provides it or fix the rule",
        .path.display()
    )]
    SourceMissing {
        /// The missing source path.
        path: PathBuf,
    },

    /// The path a rule copies from exists but is not a regular file.
    #[error("asset source is not a file: {}", .path.display())]
    SourceNotFile {
        /// The offending source path.
        path: PathBuf,
    },

    /// The output tree is the static tree or lies inside it.
    #[error(
        "output directory {} overlaps static directory {}; copying would overwrite or recurse into the sources",
        .output_dir.display(),
        .static_dir.display()
    )]
    OverlappingDirs {
        /// Resolved static directory.
        static_dir: PathBuf,
        /// Resolved output directory.
        output_dir: PathBuf,
    },

    /// A provisioned file is absent from the output tree.
    #[error("provisioned asset missing: {}; run `rookery build` first", .path.display())]
    OutputMissing {
        /// The expected output path.
        path: PathBuf,
    },

    /// The copied file differs from its source.
    #[error("copy of {} differs from {}", .copy.display(), .original.display())]
    Mismatch {
        /// The source file.
        original: PathBuf,
        /// The copy in the output tree.
        copy: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl AssetError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
