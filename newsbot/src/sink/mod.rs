use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::report::Payload;

pub mod discord;

/// A live destination the sink resolved (a Discord channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
}

/// Whoever issued a command on the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoker {
    pub user_id: String,
    /// Host-platform permission bitfield of the invoker
    #[serde(default)]
    pub permissions: u64,
}

/// External messaging platform the bot delivers to.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Resolves once the platform session is usable. Errors are fatal at startup.
    async fn wait_until_ready(&self) -> Result<()>;

    /// Looks up the configured destination; `None` if it is not configured or not reachable.
    async fn resolve(&self) -> Option<Destination>;

    async fn send_text(&self, destination: &Destination, text: &str) -> Result<()>;

    async fn send_payload(&self, destination: &Destination, payload: &Payload) -> Result<()>;

    /// Administrator-equivalent capability check for command gating.
    fn has_admin(&self, invoker: &Invoker) -> bool;

    /// Human-readable reference to the configured destination.
    fn destination_ref(&self) -> String;
}
