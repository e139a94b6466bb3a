//! cTrader Stream Client Binary
//!
//! Starts the persistent market data gateway client.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ctrader-stream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `CTRADER_CREDENTIALS_PATH`: Path of the JSON credential document
//!
//! ## Optional
//! - `CTRADER_ENV`: DEMO | LIVE (default: DEMO)
//! - `CTRADER_ACCOUNT_ID`: Trading account id (default: discovered)
//! - `CTRADER_SYMBOLS`: Comma-separated symbol names (default: first listed)
//! - `CTRADER_PORT`: Gateway port (default: 5035)
//! - `CTRADER_TOKEN_URL`: OAuth token endpoint
//! - `CTRADER_HEARTBEAT_INTERVAL_SECS`: Heartbeat interval (default: 10)
//! - `CTRADER_READ_IDLE_TIMEOUT_SECS`: Idle window (default: 30)
//! - `CTRADER_MAX_RECONNECT_ATTEMPTS`: Reconnect budget (default: unlimited)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use ctrader_stream_client::application::ports::CredentialStore;
use ctrader_stream_client::{
    ClientConfig, FileCredentialStore, GatewayClient, GatewayClientConfig, GatewayEvent,
    HttpTokenExchange, InstrumentSelection, ReconnectConfig, RefreshConfig, RefreshPolicy,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting cTrader Stream Client");

    let config = ClientConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store = FileCredentialStore::new(config.credentials_path.clone());
    let mut credentials = store.load().await?;
    if credentials.account_id.is_none() {
        credentials.account_id = config.account_id;
    }

    let exchange = HttpTokenExchange::new(
        config.refresh.token_url.clone(),
        config.refresh.request_timeout,
    )?;
    let refresh = RefreshPolicy::new(
        exchange,
        store,
        RefreshConfig {
            max_attempts: config.refresh.max_attempts,
            ..RefreshConfig::default()
        },
    );

    let mut client_config =
        GatewayClientConfig::new(config.gateway_host().to_string(), config.connection.port);
    client_config.heartbeat_interval = config.connection.heartbeat_interval;
    client_config.read_idle_timeout = config.connection.read_idle_timeout;
    client_config.reconnect = ReconnectConfig {
        initial_delay: config.connection.reconnect_delay_initial,
        max_delay: config.connection.reconnect_delay_max,
        multiplier: config.connection.reconnect_delay_multiplier,
        max_attempts: config.connection.max_reconnect_attempts,
        ..ReconnectConfig::default()
    };
    client_config.instruments = InstrumentSelection {
        symbol_ids: Vec::new(),
        symbol_names: config.symbols.clone(),
    };

    let (event_tx, event_rx) =
        mpsc::channel::<GatewayEvent>(config.connection.event_channel_capacity);

    let client = Arc::new(GatewayClient::new(
        client_config,
        credentials,
        refresh,
        event_tx,
        shutdown_token.clone(),
    ));

    tokio::spawn(handle_gateway_events(event_rx));

    let client_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = client.run().await {
            tracing::error!(error = %e, "Gateway client error");
            client_shutdown.cancel();
        }
    });

    tracing::info!("Stream client ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Stream client stopped");
    Ok(())
}

/// Handle events from the gateway client.
async fn handle_gateway_events(mut rx: mpsc::Receiver<GatewayEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            GatewayEvent::Connected => {
                tracing::info!("Gateway connected");
            }
            GatewayEvent::Disconnected => {
                tracing::warn!("Gateway disconnected");
            }
            GatewayEvent::Reconnecting { attempt } => {
                tracing::info!(attempt, "Gateway reconnecting");
            }
            GatewayEvent::StageChanged(stage) => {
                tracing::info!(stage = %stage, "Handshake stage changed");
            }
            GatewayEvent::Spot {
                symbol_id,
                bid,
                ask,
            } => {
                tracing::info!(symbol_id, bid = ?bid, ask = ?ask, "Spot");
            }
            GatewayEvent::SymbolList(symbols) => {
                tracing::info!(count = symbols.len(), "Symbol list received");
            }
            GatewayEvent::Subscribed { symbol_ids } => {
                tracing::info!(symbols = ?symbol_ids, "Spot subscription confirmed");
            }
            GatewayEvent::ProtocolError { code, description } => {
                tracing::error!(code = %code, description = ?description, "Gateway error");
            }
            GatewayEvent::CredentialsRefreshed => {
                tracing::info!("Credential pair refreshed");
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        host = config.gateway_host(),
        port = config.connection.port,
        account_id = ?config.account_id,
        symbols = ?config.symbols,
        "Configuration loaded"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Shutdown requested internally");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
