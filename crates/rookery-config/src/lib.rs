//! Configuration loading and typed config structures for Rookery.
//!
//! A single `rookery.yaml` drives both runtimes. The production server
//! and the development server read the same [`SiteConfig`]; the only
//! difference between them is [`ServerConfig::mode`], which selects how
//! the cross-origin isolation headers are wired in. Build-time asset
//! provisioning is expressed as a list of [`AssetRule`]s (possibly
//! empty) rather than as a separate build configuration.
//!
//! Every field has a default, so an empty file is a valid configuration.

pub mod rule;

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

pub use rule::{AssetRule, RuleError, ENGINE_WASM_SOURCE, ENGINE_WORKER_DIR};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Name of the environment variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// An asset rule cannot be applied.
    #[error("build.assets[{index}]: {source}")]
    InvalidRule {
        /// Position of the rule in `build.assets`.
        index: usize,
        /// Why the rule was rejected.
        source: RuleError,
    },

    /// The listener port is zero.
    #[error("server.port must be between 1 and 65535")]
    InvalidPort,

    /// The output tree would be written into the static tree it copies from.
    #[error(
        "build.output_dir {} must not be, or be inside, build.static_dir {}",
        output_dir.display(),
        static_dir.display()
    )]
    OverlappingDirs {
        /// Configured `build.static_dir`.
        static_dir: PathBuf,
        /// Configured `build.output_dir`.
        output_dir: PathBuf,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Rookery configuration.
///
/// Mirrors the structure of `rookery.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SiteConfig {
    /// Listener and runtime mode.
    #[serde(default)]
    pub server: ServerConfig,

    /// Static tree and asset provisioning.
    #[serde(default)]
    pub build: BuildConfig,

    /// Page shell settings.
    #[serde(default)]
    pub page: PageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SiteConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener, the
    /// same way the Node adapter does it:
    /// - `HOST` overrides `server.host`
    /// - `PORT` overrides `server.port`
    /// - `ROOKERY_MODE` overrides `server.mode`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML,
    /// [`ConfigError::InvalidEnv`] for an unparseable override, or any
    /// error from [`SiteConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml rejects an empty document instead of defaulting it.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `HOST`, `PORT` and `ROOKERY_MODE` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a variable is set but unparseable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a variable is set but unparseable.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "PORT", value: port.clone() })?;
        }
        if let Some(mode) = lookup("ROOKERY_MODE") {
            self.server.mode = mode
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "ROOKERY_MODE", value: mode.clone() })?;
        }
        Ok(())
    }

    /// Check the listener port, the build directories and every asset rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] for port 0,
    /// [`ConfigError::OverlappingDirs`] if the output tree lies in the
    /// static tree, or [`ConfigError::InvalidRule`] for the first unusable
    /// rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.build.output_overlaps_static() {
            return Err(ConfigError::OverlappingDirs {
                static_dir: self.build.static_dir.clone(),
                output_dir: self.build.output_dir.clone(),
            });
        }
        for (index, rule) in self.build.assets.iter().enumerate() {
            rule.check()
                .map_err(|source| ConfigError::InvalidRule { index, source })?;
        }
        Ok(())
    }
}

/// Which runtime is serving, and therefore how isolation headers are attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve the built asset tree; headers attached by the request hook.
    #[default]
    Production,
    /// Serve sources directly; headers attached by the dev middleware.
    Development,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Production or development serving.
    #[serde(default)]
    pub mode: Mode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: Mode::default(),
        }
    }
}

/// Build output and asset provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildConfig {
    /// Hand-written static files, copied verbatim into the output.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Served asset root in production.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Files copied from installed packages into the output tree.
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetRule>,
}

impl BuildConfig {
    /// Whether `output_dir` is `static_dir` or a directory below it, as
    /// written. `.` components are ignored; symlinks are not resolved.
    pub fn output_overlaps_static(&self) -> bool {
        let lexical = |path: &Path| -> PathBuf {
            path.components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect()
        };
        lexical(&self.output_dir).starts_with(lexical(&self.static_dir))
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            output_dir: default_output_dir(),
            assets: default_assets(),
        }
    }
}

/// Settings for the HTML page shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageConfig {
    /// Document title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Client entry module loaded by the shell, if any.
    #[serde(default)]
    pub entry_script: Option<String>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            entry_script: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_assets() -> Vec<AssetRule> {
    vec![AssetRule::engine_wasm()]
}

fn default_title() -> String {
    String::from("Rookery")
}

fn default_log_level() -> String {
    String::from("info")
}
