use std::time::Duration;

use wingduel::prelude::*;

const DEFAULT_PORT: u16 = 3000;

/// Reads `name` from the environment, falling back to `default` when it is
/// unset or does not parse.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "ignoring unparsable environment variable");
            default
        }),
        Err(_) => default,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), WingduelError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = env_or("PORT", DEFAULT_PORT);
    let grace_ms: u64 = env_or("WINGDUEL_GRACE_MS", 5_000);

    let server = WingduelServer::builder()
        .bind(&format!("0.0.0.0:{port}"))
        .lobby_config(LobbyConfig::with_grace_delay(Duration::from_millis(grace_ms)))
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, grace_ms, "listening");
    server.run_until(shutdown_signal()).await
}
