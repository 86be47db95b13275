//! Static-copy provisioning.
//!
//! [`provision`] runs once per build. It refuses to write anything until
//! every rule source has been found, so a missing engine binary fails the
//! build instead of surfacing later as a 404 from the worker loader.

use std::fs;
use std::path::{Path, PathBuf};

use rookery_config::{AssetRule, BuildConfig};
use tracing::{debug, info};

use crate::error::AssetError;

/// One file placed by an [`AssetRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAsset {
    /// Where it was copied from.
    pub source: PathBuf,
    /// Where it was copied to.
    pub target: PathBuf,
    /// URL path it is served at.
    pub url: String,
    /// Size in bytes.
    pub bytes: u64,
}

/// Outcome of a successful [`provision`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Number of files copied from the static directory.
    pub static_files: usize,
    /// Files placed by asset rules, in rule order.
    pub assets: Vec<ProvisionedAsset>,
}

/// Check that every rule is well-formed and its source is a readable file.
///
/// # Errors
///
/// [`AssetError::InvalidRule`], [`AssetError::SourceMissing`],
/// [`AssetError::SourceNotFile`] or [`AssetError::Io`] for the first
/// offending rule.
pub fn verify_sources(config: &BuildConfig) -> Result<(), AssetError> {
    for (index, rule) in config.assets.iter().enumerate() {
        rule.check()
            .map_err(|source| AssetError::InvalidRule { index, source })?;

        let meta = match fs::metadata(&rule.source) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssetError::SourceMissing {
                    path: rule.source.clone(),
                });
            }
            Err(e) => return Err(AssetError::io(&rule.source)(e)),
        };
        if !meta.is_file() {
            return Err(AssetError::SourceNotFile {
                path: rule.source.clone(),
            });
        }
    }
    Ok(())
}

/// Check that every rule's copy is present in the output tree.
///
/// The production server calls this before binding so a stale or
/// missing build is reported at startup.
///
/// # Errors
///
/// [`AssetError::InvalidRule`] or [`AssetError::OutputMissing`].
pub fn verify_outputs(config: &BuildConfig) -> Result<(), AssetError> {
    for (index, rule) in config.assets.iter().enumerate() {
        let target = rule
            .target_path(&config.output_dir)
            .map_err(|source| AssetError::InvalidRule { index, source })?;
        if !target.is_file() {
            return Err(AssetError::OutputMissing { path: target });
        }
    }
    Ok(())
}

/// Populate `output_dir` from `static_dir` and the asset rules.
///
/// Rule copies are written after the static tree, so a rule wins over a
/// static file at the same path.
///
/// # Errors
///
/// Any [`AssetError`]. Source checks and the directory overlap check
/// happen before the first write.
pub fn provision(config: &BuildConfig) -> Result<ProvisionReport, AssetError> {
    verify_sources(config)?;
    if config.static_dir.is_dir() {
        check_disjoint(&config.static_dir, &config.output_dir)?;
    }

    fs::create_dir_all(&config.output_dir).map_err(AssetError::io(&config.output_dir))?;

    let static_files = if config.static_dir.is_dir() {
        copy_tree(&config.static_dir, &config.output_dir)?
    } else {
        debug!(static_dir = %config.static_dir.display(), "No static directory, skipping");
        0
    };

    let mut assets = Vec::with_capacity(config.assets.len());
    for (index, rule) in config.assets.iter().enumerate() {
        let asset = copy_rule(index, rule, &config.output_dir)?;
        info!(
            source = %asset.source.display(),
            target = %asset.target.display(),
            url = asset.url,
            bytes = asset.bytes,
            "Asset provisioned"
        );
        assets.push(asset);
    }

    Ok(ProvisionReport {
        static_files,
        assets,
    })
}

/// Refuse an output tree that is, or is nested in, the static tree.
///
/// Copying a directory onto itself truncates every file, and copying it
/// into a subdirectory of itself never terminates.
fn check_disjoint(static_dir: &Path, output_dir: &Path) -> Result<(), AssetError> {
    let static_dir = resolve(static_dir)?;
    let output_dir = resolve(output_dir)?;
    if output_dir.starts_with(&static_dir) {
        return Err(AssetError::OverlappingDirs {
            static_dir,
            output_dir,
        });
    }
    Ok(())
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest,
/// so paths that do not exist yet still resolve through symlinks.
fn resolve(path: &Path) -> Result<PathBuf, AssetError> {
    let absolute = std::path::absolute(path).map_err(AssetError::io(path))?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(real) => {
                return Ok(missing.iter().rev().fold(real, |acc: PathBuf, part| acc.join(part)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(absolute);
                };
                missing.push(name.to_owned());
                existing = parent;
            }
            Err(e) => return Err(AssetError::io(existing)(e)),
        }
    }
}

fn copy_rule(index: usize, rule: &AssetRule, root: &Path) -> Result<ProvisionedAsset, AssetError> {
    let invalid = |source| AssetError::InvalidRule { index, source };
    let target = rule.target_path(root).map_err(invalid)?;
    let url = rule.url_path().map_err(invalid)?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(AssetError::io(parent))?;
    }
    let bytes = fs::copy(&rule.source, &target).map_err(AssetError::io(&target))?;

    let original = fs::read(&rule.source).map_err(AssetError::io(&rule.source))?;
    let copy = fs::read(&target).map_err(AssetError::io(&target))?;
    if original != copy {
        return Err(AssetError::Mismatch {
            original: rule.source.clone(),
            copy: target,
        });
    }

    Ok(ProvisionedAsset {
        source: rule.source.clone(),
        target,
        url,
        bytes,
    })
}

/// Recursively copy regular files from `from` into `to`. Returns the file count.
fn copy_tree(from: &Path, to: &Path) -> Result<usize, AssetError> {
    fs::create_dir_all(to).map_err(AssetError::io(to))?;

    let mut copied: usize = 0;
    for entry in fs::read_dir(from).map_err(AssetError::io(from))? {
        let entry = entry.map_err(AssetError::io(from))?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(AssetError::io(&path))?;

        if file_type.is_dir() {
            copied = copied.saturating_add(copy_tree(&path, &dest)?);
        } else if file_type.is_file() {
            fs::copy(&path, &dest).map_err(AssetError::io(&dest))?;
            copied = copied.saturating_add(1);
        } else {
            debug!(path = %path.display(), "Skipping non-regular file");
        }
    }
    Ok(copied)
}
