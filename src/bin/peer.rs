use anyhow::Result;
use clap::Parser;
use lockring::common::PeerServerConfig;
use lockring::PeerServer;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lockring-peer")]
#[command(about = "Lockring lock peer - one member of a quorum bucket")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:7600")]
    bind: SocketAddr,

    /// Seconds between sweeps of expired locks
    #[arg(long, default_value = "1")]
    sweep_interval: u64,

    /// Upper bound on the lock TTL a client may request (seconds)
    #[arg(long, default_value = "3600")]
    max_ttl: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PeerServerConfig {
        bind_addr: args.bind,
        sweep_interval_secs: args.sweep_interval,
        max_ttl_secs: args.max_ttl,
    };

    let server = PeerServer::new(config);
    server.serve().await?;

    Ok(())
}
