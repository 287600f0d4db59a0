//! Telop transcription service.
//!
//! Users upload audio, get a Japanese transcript from the OpenAI
//! transcription API, and have it rewritten into short caption lines.
//! Usage is billed in credits (one per started minute of audio) against a
//! monthly allowance.

pub mod api;
pub mod clock;
pub mod config;
pub mod dictionary;
pub mod email;
pub mod error;
pub mod feedback;
pub mod rewrite;
pub mod settings;
pub mod store;
pub mod subtitles;
pub mod transcription;
pub mod upload;
pub mod users;

use std::net::SocketAddr;

pub use api::{router, AppState};
pub use config::{AppConfig, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build state from `config`, bind and serve until Ctrl+C or SIGTERM.
pub async fn run(config: AppConfig) -> Result<(), ServerError> {
    let addr = config.bind_addr;
    let state = AppState::from_config(config).await;

    if let Err(e) = state.users.initialize().await {
        tracing::warn!(error = %e, "could not seed default users at start-up");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr().unwrap_or(addr);

    tracing::info!(
        address = %local_addr,
        store = state.store.backend_name(),
        demo = state.config.demo_mode(),
        "listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
