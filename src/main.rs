//! Duel Relay Server
//!
//! Matchmaking and authoritative session relay for two-player duels.
//! Configured through `DUEL_*` environment variables, logging through `RUST_LOG`.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use duel_relay::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = ServerConfig::from_env();

    info!("Duel Relay Server v{}", VERSION);
    info!("Bind address: {}", config.bind_addr);
    info!(
        "Max health: {}, win reward: {}, forfeit reward: {}, trust: {:?}",
        config.rules.max_health, config.rules.win_reward, config.rules.forfeit_reward, config.rules.trust
    );

    let server = GameServer::from_config(config).context("failed to initialize server")?;

    tokio::select! {
        result = server.run() => result.context("server stopped with an error")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
