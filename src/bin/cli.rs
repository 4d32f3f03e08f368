//! CLI for lock operations against a lockring cluster

use clap::{Parser, Subcommand};
use lockring::common::parse_duration;
use lockring::{HttpPeer, LockManager, LockType, ManagerConfig};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "lockring")]
#[command(about = "lockring distributed lock manager CLI")]
#[command(version)]
struct Cli {
    /// Cluster config file (TOML)
    #[arg(long, default_value = "lockring.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire locks and hold them until Ctrl-C
    Lock {
        /// Resource paths to lock
        paths: Vec<String>,

        /// Lock kind: shared or exclusive
        #[arg(long, default_value = "exclusive")]
        kind: String,

        /// Per-peer contact timeout (e.g. "5s")
        #[arg(long)]
        timeout: Option<String>,

        /// Release immediately instead of holding (acquirability probe)
        #[arg(long)]
        no_wait: bool,
    },

    /// Show peer health and held locks
    Status,

    /// Force-release everything a session holds, on every peer
    ReleaseSession {
        /// Session ID as shown by `status`
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ManagerConfig::load(&cli.config)?;

    match cli.command {
        Commands::Lock {
            paths,
            kind,
            timeout,
            no_wait,
        } => {
            let lock_type = LockType::from_str(&kind)?;
            let timeout = timeout.as_deref().map(parse_duration).transpose()?;

            let manager = LockManager::new(config)?;
            let status = manager.lock(&paths, lock_type, timeout).await;
            println!("{}", status);

            if status.is_ok() && !no_wait {
                println!(
                    "holding {} {} lock(s) as session {}; Ctrl-C to release",
                    paths.len(),
                    lock_type,
                    manager.session()
                );
                tokio::signal::ctrl_c().await?;
            }

            let teardown = manager.shutdown().await;
            for warning in teardown.warnings() {
                eprintln!("warning: {}", warning);
            }
        }

        Commands::Status => {
            let timeout = config.lock_expiry();
            for (name, endpoint) in &config.peers {
                match HttpPeer::connect(name, endpoint, timeout).await {
                    Ok(peer) => {
                        let health = peer.health().await?;
                        println!(
                            "{}: {} ({} locks held, up {}s)",
                            name, health.status, health.locks_held, health.uptime_secs
                        );
                        for lock in peer.locks().await? {
                            println!(
                                "  {} [{}] session={} expires_in={}s since={}",
                                lock.path,
                                lock.lock_type,
                                lock.session,
                                lock.expires_in_secs,
                                lock.since.to_rfc3339()
                            );
                        }
                    }
                    Err(e) => println!("{}: unreachable ({})", name, e),
                }
            }
        }

        Commands::ReleaseSession { session } => {
            let timeout = config.lock_expiry();
            for (name, endpoint) in &config.peers {
                match HttpPeer::connect(name, endpoint, timeout).await {
                    Ok(peer) => match lockring::LockPeer::release_session(&peer, &session).await {
                        Ok(()) => println!("{}: session cleared", name),
                        Err(e) => println!("{}: release failed ({})", name, e),
                    },
                    Err(e) => println!("{}: unreachable ({})", name, e),
                }
            }
        }
    }

    Ok(())
}
