//! Rookery binary.
//!
//! Hosts the in-browser chess analysis page. Three commands share one
//! configuration file:
//!
//! - `rookery build` -- copy `static/` and the engine binary into the
//!   output tree; fails if the engine package is not installed
//! - `rookery serve` -- serve the built tree (or sources, if
//!   `server.mode` is `development`)
//! - `rookery dev` -- serve sources with the development middleware
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration from `rookery.yaml` (or `--config`)
//! 3. Initialize structured logging (tracing)
//! 4. Run the command

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rookery_config::{LogFormat, LoggingConfig, Mode, SiteConfig};
use rookery_server::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "rookery", version)]
#[command(about = "Serve the chess analysis page with cross-origin isolation")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "rookery.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provision the static tree and engine binaries into the output directory.
    Build,
    /// Serve in the configured mode (production unless overridden).
    Serve(ListenArgs),
    /// Serve sources directly with the development middleware.
    Dev(ListenArgs),
}

#[derive(Debug, Args)]
struct ListenArgs {
    /// Address to bind, overriding `server.host` and `HOST`.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding `server.port` and `PORT`.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the build, or the server fails.
/// The process then exits non-zero.
#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let (config, from_file) = load_config(&cli.config)?;
    init_logging(&config.logging);

    if from_file {
        info!(path = %cli.config.display(), "Configuration loaded");
    } else {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Command::Build => build(&config),
        Command::Serve(args) => serve(config, args).await,
        Command::Dev(args) => {
            let mut config = config;
            config.server.mode = Mode::Development;
            serve(config, args).await
        }
    }
}

/// Load the configuration, falling back to defaults if the file is absent.
///
/// Environment overrides apply either way.
fn load_config(path: &Path) -> Result<(SiteConfig, bool), CliError> {
    if path.exists() {
        return Ok((SiteConfig::from_file(path)?, true));
    }
    let mut config = SiteConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok((config, false))
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn build(config: &SiteConfig) -> Result<(), CliError> {
    info!(
        static_dir = %config.build.static_dir.display(),
        output_dir = %config.build.output_dir.display(),
        rules = config.build.assets.len(),
        "Provisioning assets"
    );

    let report = rookery_assets::provision(&config.build)?;

    info!(
        static_files = report.static_files,
        assets = report.assets.len(),
        "Build complete"
    );
    Ok(())
}

async fn serve(mut config: SiteConfig, args: ListenArgs) -> Result<(), CliError> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let state = preflight(&config)?;
    rookery_server::start_server(&config.server, state).await?;
    Ok(())
}

/// Everything `serve` checks before binding a socket.
///
/// A missing engine binary must stop startup, not become a 404 later:
/// production needs the provisioned copies, development the sources.
fn preflight(config: &SiteConfig) -> Result<Arc<AppState>, CliError> {
    config.validate()?;
    match config.server.mode {
        Mode::Production => rookery_assets::verify_outputs(&config.build)?,
        Mode::Development => rookery_assets::verify_sources(&config.build)?,
    }

    let state = Arc::new(AppState::from_config(config)?);
    for asset in &state.assets {
        info!(url = asset.url, source = %asset.source.display(), "Serving asset");
    }
    Ok(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use clap::CommandFactory;
    use rookery_assets::AssetError;
    use rookery_config::AssetRule;
    use tempfile::TempDir;

    use super::*;

    /// A project whose engine package may or may not be installed.
    fn project(installed: bool) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let pkg = root.join("node_modules/stockfish/src");
        if installed {
            fs::create_dir_all(&pkg).unwrap();
            fs::write(pkg.join("stockfish-nnue-16.wasm"), b"\0asm\x01\0\0\0").unwrap();
        }

        let mut config = SiteConfig::default();
        config.build.static_dir = root.join("static");
        config.build.output_dir = root.join("build");
        config.build.assets = vec![AssetRule::new(
            pkg.join("stockfish-nnue-16.wasm"),
            "_app/immutable/workers",
        )];
        (dir, config)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn dev_accepts_listener_overrides() {
        let cli = Cli::try_parse_from(["rookery", "--config", "site.yaml", "dev", "--port", "5173"]);
        assert!(cli.is_ok());
        let Ok(cli) = cli else { return };

        assert_eq!(cli.config, PathBuf::from("site.yaml"));
        assert!(matches!(
            cli.command,
            Command::Dev(ListenArgs { host: None, port: Some(5173) })
        ));
    }

    #[test]
    fn build_takes_no_listener() {
        assert!(Cli::try_parse_from(["rookery", "build", "--port", "1"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["rookery", "build"]).map(|cli| cli.command),
            Ok(Command::Build)
        ));
    }

    #[test]
    fn zero_port_rejected_on_command_line() {
        assert!(Cli::try_parse_from(["rookery", "serve", "--port", "0"]).is_err());
        assert!(Cli::try_parse_from(["rookery", "serve", "--port", "1"]).is_ok());
    }

    #[test]
    fn build_without_engine_package_fails() {
        let (_dir, config) = project(false);

        let result = build(&config);
        assert!(matches!(
            result,
            Err(CliError::Assets { source: AssetError::SourceMissing { .. } })
        ));
        assert!(!config.build.output_dir.exists());
    }

    #[test]
    fn build_into_static_dir_fails() {
        let (_dir, mut config) = project(true);
        fs::create_dir_all(&config.build.static_dir).unwrap();
        config.build.output_dir = config.build.static_dir.clone();

        assert!(matches!(
            build(&config),
            Err(CliError::Assets { source: AssetError::OverlappingDirs { .. } })
        ));
    }

    #[test]
    fn production_refuses_to_start_before_build() {
        let (_dir, config) = project(true);

        assert!(matches!(
            preflight(&config),
            Err(CliError::Assets { source: AssetError::OutputMissing { .. } })
        ));
    }

    #[test]
    fn development_refuses_to_start_without_sources() {
        let (_dir, mut config) = project(false);
        config.server.mode = Mode::Development;

        assert!(matches!(
            preflight(&config),
            Err(CliError::Assets { source: AssetError::SourceMissing { .. } })
        ));
    }

    #[test]
    fn preflight_rejects_zero_port() {
        let (_dir, mut config) = project(true);
        config.server.port = 0;

        assert!(matches!(preflight(&config), Err(CliError::Config { .. })));
    }

    #[test]
    fn production_starts_after_build() {
        let (_dir, config) = project(true);
        build(&config).unwrap();

        let state = preflight(&config).unwrap();
        assert_eq!(
            state.preload_urls().collect::<Vec<_>>(),
            vec!["/_app/immutable/workers/stockfish-nnue-16.wasm"]
        );
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let loaded = load_config(Path::new("definitely/not/here/rookery.yaml"));
        assert!(matches!(loaded, Ok((_, false))));
    }
}
