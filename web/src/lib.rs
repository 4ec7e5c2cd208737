use axum::Router;
use log::*;
use std::future::Future;
use tokio::net::TcpListener;

pub use service::AppState;

mod controller;
pub mod error;
mod extractors;
mod middleware;
mod router;
mod ws;

pub use error::{Error, Result};

/// The complete HTTP surface: `/health` and the `/ws` upgrade endpoint.
pub fn app(app_state: AppState) -> Router {
    router::define_routes(app_state)
}

/// Binds the configured interface and port and serves until `shutdown` resolves.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let listen_addr = format!("{interface}:{}", app_state.config.port);

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Server starting... listening for connections on http://{listen_addr}");

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown)
        .await
}
