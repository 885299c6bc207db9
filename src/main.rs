use clap::Parser;
use tracing::{info, warn};

mod client;
mod config;
mod framing;
mod lobby;
mod lobby_coordinator;
mod messages;
mod server;
#[cfg(test)]
mod test_utils;

use crate::config::Config;

/// Entry point: starts the TCP relay and runs until Ctrl-C
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let addr = server::resolve(&config.host, config.port).await?;
    let listener = server::bind_listener(addr, config.backlog)?;
    info!("Server listening on {} (backlog {})", addr, config.backlog);

    server::run(listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
