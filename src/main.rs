use log::*;
use service::{config::Config, logging::Logger, AppState};
use tokio::signal;

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
    }

    info!(
        "Starting up ride_share_rs in {} mode...",
        config.runtime_env()
    );
    debug!(
        "WebSocket idle timeout {:?}, write timeout {:?}",
        config.ws_idle_timeout(),
        config.ws_write_timeout()
    );
    if config.jwt_secret().is_none() {
        warn!("No jwt_secret configured; bearer tokens will be ignored");
    }

    let app_state = AppState::new(config);

    let registry = app_state.registry.clone();
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutdown signal received, closing live connections");
        registry.close_all().await;
    };

    if let Err(e) = web::init_server(app_state, shutdown).await {
        error!("Server terminated with error: {e}");
        std::process::exit(1);
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
