//! Page server lifecycle management.
//!
//! Provides [`start_server`] which binds to a TCP port and serves the
//! application for the configured [`Mode`] until `Ctrl-C` is received.
//! The server is built from the explicit [`ServerConfig`] passed in;
//! there is no process-wide registration.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::Request;
use axum::ServiceExt;
use rookery_config::{Mode, ServerConfig};
use tokio::net::TcpListener;
use tracing::info;

use crate::router::{development_app, production_app};
use crate::state::AppState;

/// Start the page server.
///
/// Binds to the configured address, builds the application for
/// `config.mode`, and serves requests until `Ctrl-C`. Returns `Ok(())`
/// on clean shutdown.
///
/// # Errors
///
/// Returns an error if `config.host` is not an IP address, the TCP
/// listener cannot bind, or the server encounters a fatal I/O error.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|source| ServerError::Serve { source })?;

    info!(%addr, mode = %config.mode, "Rookery server listening");

    let served = match config.mode {
        Mode::Production => {
            axum::serve(listener, production_app(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
        Mode::Development => {
            let app = development_app(state);
            axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
    };
    served.map_err(|source| ServerError::Serve { source })?;

    info!("Rookery server stopped");
    Ok(())
}

/// Resolve `host:port` and bind a listener to it.
///
/// # Errors
///
/// [`ServerError::InvalidAddress`] if the host is not an IP literal,
/// [`ServerError::Bind`] if the socket cannot be bound.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let ip: IpAddr = config.host.parse().map_err(|source| ServerError::InvalidAddress {
        host: config.host.clone(),
        source,
    })?;
    let addr = SocketAddr::new(ip, config.port);
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

/// Errors that can occur when starting or running the page server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `server.host` is not an IP address.
    #[error("invalid listen address {host:?}: {source}")]
    InvalidAddress {
        /// The configured host.
        host: String,
        /// Why it did not parse.
        source: AddrParseError,
    },

    /// Failed to bind to the network address.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// The address the listener tried to take.
        addr: SocketAddr,
        /// The underlying I/O error, e.g. `AddrInUse`.
        source: std::io::Error,
    },

    /// The server encountered a fatal error while serving.
    #[error("serve error: {source}")]
    Serve {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::ErrorKind;

    use rookery_config::SiteConfig;

    use super::*;

    fn listen_on(host: &str, port: u16) -> ServerConfig {
        ServerConfig {
            host: host.to_owned(),
            port,
            mode: Mode::Production,
        }
    }

    #[tokio::test]
    async fn hostname_rejected_as_invalid_address() {
        let result = bind(&listen_on("not-an-ip", 3000)).await;
        assert!(matches!(
            result,
            Err(ServerError::InvalidAddress { ref host, .. }) if host == "not-an-ip"
        ));
    }

    #[tokio::test]
    async fn ipv6_host_binds() {
        // Skipped where there is no IPv6 loopback.
        if let Ok(listener) = bind(&listen_on("::1", 0)).await {
            assert!(listener.local_addr().unwrap().is_ipv6());
        }
    }

    #[tokio::test]
    async fn occupied_port_keeps_io_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = bind(&listen_on("127.0.0.1", port)).await;
        assert!(matches!(
            result,
            Err(ServerError::Bind { addr, ref source })
                if addr.port() == port && source.kind() == ErrorKind::AddrInUse
        ));
    }

    #[tokio::test]
    async fn start_server_fails_fast_on_occupied_port() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let state = Arc::new(AppState::from_config(&SiteConfig::default()).unwrap());

        let result = start_server(&listen_on("127.0.0.1", port), state).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
