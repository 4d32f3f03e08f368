//! HTTP client for a remote lock peer daemon

use crate::common::{Error, PeerEndpoint, Result};
use crate::peer::wire::*;
use crate::peer::{LockPeer, LockType};
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpPeer {
    name: String,
    base: String,
    http: reqwest::Client,
}

impl HttpPeer {
    /// Build a client for `endpoint` and probe it once. A peer that cannot
    /// answer its health check now is treated as down for this operation.
    pub async fn connect(name: &str, endpoint: &PeerEndpoint, timeout: Duration) -> Result<Self> {
        let connect_timeout = endpoint
            .connect_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(timeout);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let peer = Self {
            name: name.to_string(),
            base: endpoint.url.trim_end_matches('/').to_string(),
            http,
        };
        peer.health().await?;

        Ok(peer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(format!("{}/health", self.base))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !resp.status().is_success() {
            return Err(self.peer_error(resp.status(), None));
        }
        resp.json().await.map_err(|e| self.transport_error(e))
    }

    pub async fn locks(&self) -> Result<Vec<LockInfo>> {
        let resp = self
            .http
            .get(format!("{}/v1/locks", self.base))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !resp.status().is_success() {
            return Err(self.peer_error(resp.status(), None));
        }
        let body: LocksResponse = resp.json().await.map_err(|e| self.transport_error(e))?;
        Ok(body.locks)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.name.clone())
        } else {
            Error::PeerUnavailable {
                peer: self.name.clone(),
                reason: e.to_string(),
            }
        }
    }

    fn peer_error(&self, status: reqwest::StatusCode, body: Option<ErrorBody>) -> Error {
        let reason = match body {
            Some(body) => body.error,
            None => format!("HTTP {}", status),
        };
        Error::PeerUnavailable {
            peer: self.name.clone(),
            reason,
        }
    }
}

#[async_trait]
impl LockPeer for HttpPeer {
    async fn acquire(
        &self,
        session: &str,
        lock_type: LockType,
        paths: &[String],
        ttl: Duration,
    ) -> Result<()> {
        let req = AcquireRequest {
            session: session.to_string(),
            lock_type,
            paths: paths.to_vec(),
            ttl_secs: ttl.as_secs(),
        };

        let resp = self
            .http
            .post(format!("{}/v1/acquire", self.base))
            .json(&req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => {
                let body: ErrorBody = resp.json().await.map_err(|e| self.transport_error(e))?;
                Err(Error::LockConflict {
                    path: body.path.unwrap_or_default(),
                })
            }
            s => {
                let body = resp.json::<ErrorBody>().await.ok();
                Err(self.peer_error(s, body))
            }
        }
    }

    async fn release(&self, session: &str, lock_type: LockType, paths: &[String]) -> Result<()> {
        let req = ReleaseRequest {
            session: session.to_string(),
            lock_type,
            paths: paths.to_vec(),
        };

        let resp = self
            .http
            .post(format!("{}/v1/release", self.base))
            .json(&req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.json::<ErrorBody>().await.ok();
            Err(self.peer_error(status, body))
        }
    }

    async fn release_session(&self, session: &str) -> Result<()> {
        let req = ReleaseSessionRequest {
            session: session.to_string(),
        };

        let resp = self
            .http
            .post(format!("{}/v1/release-session", self.base))
            .json(&req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.json::<ErrorBody>().await.ok();
            Err(self.peer_error(status, body))
        }
    }
}
