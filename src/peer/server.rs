//! Lock peer server

use crate::common::{PeerServerConfig, Result};
use crate::peer::http::{create_router, PeerState};
use crate::peer::table::{start_sweeper, LockTable};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct PeerServer {
    config: PeerServerConfig,
}

impl PeerServer {
    pub fn new(config: PeerServerConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting lock peer");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Sweep interval: {}s", self.config.sweep_interval_secs);
        tracing::info!("  Max lock TTL: {}s", self.config.max_ttl_secs);

        let table = Arc::new(LockTable::new());

        // Background reclamation of expired locks
        let _sweeper = start_sweeper(
            table.clone(),
            Duration::from_secs(self.config.sweep_interval_secs),
        );

        let state = PeerState {
            table,
            started: Instant::now(),
            max_ttl: Duration::from_secs(self.config.max_ttl_secs),
        };
        let router = create_router(state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Lock peer ready");

        axum::serve(listener, router).await?;

        Ok(())
    }
}
