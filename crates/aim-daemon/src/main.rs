//! AIM daemon entry point: loads config, wires the service façade to local
//! disk, and serves the RPC gateway (spec §5, §6, §9).

mod collaborators;

use aim_core::config::AimConfig;
use aim_core::time::SystemClock;
use aim_limits::RateLimitRule;
use aim_rpc::AppState;
use aim_service::{AimService, IdentityResolver};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use collaborators::{FileAttachmentStore, LocalSessionCrypto, NoopGroupPublisher, NoopNetwork, PersistedContacts, PersistedIdentity, PersistedMessageStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aim-daemon")]
#[command(about = "Peer-to-peer encrypted chat daemon core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the RPC gateway (default if no subcommand is given).
    Serve,
    /// Hit GET /healthz on a running daemon and report its status.
    Healthcheck {
        /// Base URL of the daemon's HTTP gateway.
        #[arg(long, default_value = "http://127.0.0.1:8787")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(log_level)).init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config).await,
        Commands::Healthcheck { url } => healthcheck(&url).await,
    }
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => AimConfig::from_file(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => AimConfig::default(),
    };
    config.apply_env_overrides();

    aim_crypto::store::ensure_private_dir(&config.data_dir).context("preparing data directory")?;
    let passphrase = aim_crypto::keyfile::load_or_init(&config.data_dir, config.legacy_storage_passphrase.as_deref())
        .context("loading storage key (set AIM_LEGACY_STORAGE_PASSPHRASE if this install predates storage.key)")?;

    let identity = Arc::new(PersistedIdentity::load_or_init(&config.data_dir)?);
    tracing::info!(member_id = %identity.local_identity().await?, "local identity ready");

    let session_crypto = Arc::new(LocalSessionCrypto::new(passphrase.clone()));
    let network = Arc::new(NoopNetwork);
    let attachments = Arc::new(FileAttachmentStore::new(&config.data_dir, passphrase.clone())?);
    let contacts = Arc::new(PersistedContacts::load_or_init(&config.data_dir, passphrase.clone())?);
    let group_publisher = Arc::new(NoopGroupPublisher);
    let message_store = Arc::new(PersistedMessageStore::load_or_init(&config.data_dir, passphrase)?);

    let send_rate_limit = RateLimitRule { rps: config.group_abuse.send.rps, burst: config.group_abuse.send.burst };
    let invite_rate_limit = RateLimitRule { rps: config.group_abuse.invite.rps, burst: config.group_abuse.invite.burst };

    let service: Arc<dyn aim_service::Service> = Arc::new(AimService::new(
        Arc::new(SystemClock),
        identity,
        session_crypto,
        network,
        attachments,
        contacts,
        group_publisher,
        message_store,
        send_rate_limit,
        invite_rate_limit,
    ));

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, Arc::new(SystemClock), Some(service));
    let router = aim_rpc::build_router(state);

    let addr: SocketAddr = listen_addr.parse().with_context(|| format!("invalid listen_addr {listen_addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "aim-daemon listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("aim-daemon shut down gracefully");
    Ok(())
}

async fn healthcheck(base_url: &str) -> Result<()> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await.with_context(|| format!("requesting {url}"))?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
    println!("{body}");
    if !status.is_success() {
        anyhow::bail!("healthcheck failed with status {status}");
    }
    Ok(())
}

/// Waits for SIGTERM or Ctrl-C (SIGINT); the daemon shuts down within the
/// default axum graceful-shutdown window once either fires (spec §5).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("received Ctrl+C, shutting down"); },
        _ = terminate => { tracing::info!("received SIGTERM, shutting down"); },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["aim-daemon"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_healthcheck_with_custom_url() {
        let cli = Cli::try_parse_from(["aim-daemon", "healthcheck", "--url", "http://localhost:9000"]).unwrap();
        match cli.command {
            Some(Commands::Healthcheck { url }) => assert_eq!(url, "http://localhost:9000"),
            _ => panic!("expected healthcheck command"),
        }
    }
}
