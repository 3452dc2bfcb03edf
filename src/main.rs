use clap::Parser;
use tracing_subscriber::EnvFilter;

use lantern::config::{Cli, Config};
use lantern::lookup::Upstream;
use lantern::server::{self, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::from_cli(&cli)?;
    let upstream = Upstream::connect(&cfg.lookup_addr, cfg.upstream_timeout()).await?;
    let state = ServerState::new(cfg, upstream);

    tokio::select! {
        res = server::listener::run(state) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
