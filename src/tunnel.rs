//! Contract for the reverse-tunnel provisioning utility that exposes the
//! local webhook endpoint. Provisioning itself is out of scope.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Start a tunnel to the given local port. Returns the public base URL,
    /// or None when no tunnel could be provisioned (the caller falls back
    /// to the content-event stream).
    async fn start(&self, port: u16) -> Result<Option<String>>;

    async fn stop(&self);
}

/// Used when a webhook URL is configured directly or tunnelling is not
/// wanted at all.
pub struct DisabledTunnel;

#[async_trait]
impl Tunnel for DisabledTunnel {
    async fn start(&self, _port: u16) -> Result<Option<String>> {
        Ok(None)
    }

    async fn stop(&self) {}
}
