//! HTTP surface of the proxy.
//!
//! Handlers translate query strings into [`NewsProxy`] calls and the
//! resulting [`crate::Error`] into a status code with a fixed `{error}` body.

pub mod response;
pub mod routes;

use axum::http::Method;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::proxy::NewsProxy;

pub use response::{ApiError, Endpoint};
pub use routes::create_router;

/// Router with access logging and CORS applied.
pub fn build_app(proxy: Arc<NewsProxy>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    create_router(proxy)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves until Ctrl-C.
pub async fn start_server(config: &ServerConfig, proxy: NewsProxy) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))?;

    if !proxy.has_api_key() {
        warn!("NEWS_API_KEY is not set; news endpoints will answer with a server misconfiguration error");
    }

    let app = build_app(Arc::new(proxy));

    let listener = TcpListener::bind(&addr).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::AddrInUse => {
            Error::Config(format!("Failed to bind to {}: Address already in use", addr))
        }
        _ => Error::Io(e),
    })?;

    info!("newsproxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("newsproxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal, stopping server");
}
