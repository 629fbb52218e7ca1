// Lovelace - Telegram to Ollama relay

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lovelace_common::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|e| {
        eprintln!("Invalid RUST_LOG filter {:?} ({}), using info", config.rust_log, e);
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).pretty().init();

    info!(
        transport = %config.transport_provider,
        llm = %config.llm_provider,
        model = %config.ollama_model,
        history_file = %config.history_file.display(),
        "Starting Lovelace relay"
    );

    let relay = lovelace_app::create_relay(&config).map_err(|e| {
        error!("Failed to create relay: {}", e);
        e
    })?;

    relay.run(shutdown_signal()).await.map_err(|e| {
        error!("Failed to save chat histories on shutdown: {}", e);
        e
    })?;

    info!("Relay shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
