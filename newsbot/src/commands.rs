use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::pipeline::{NewsPipeline, Outcome};
use crate::report::Payload;
use crate::scheduler::Scheduler;
use crate::sink::{Invoker, NotificationSink};

pub const PERMISSION_DENIED_NOTICE: &str = "❌ You need administrator permissions to use this command.";
pub const TRIGGER_ACK: &str = "🔄 Fetching test gaming news...";

pub const STATUS_TITLE: &str = "🤖 Gaming News Bot Status";
pub const STATUS_COLOR: u32 = 0x0099ff;
pub const NOT_SCHEDULED: &str = "Not scheduled";

/// A reply to the command's invoker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum CommandReply {
    Text(String),
    Payload(Payload),
}

/// Where command replies go (the channel or request the command came from).
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, reply: CommandReply) -> Result<()>;
}

/// Keeps replies in order, for request/response transports.
#[derive(Default)]
pub struct ReplyCollector {
    replies: Mutex<Vec<CommandReply>>,
}

impl ReplyCollector {
    pub async fn into_replies(self) -> Vec<CommandReply> {
        self.replies.into_inner()
    }
}

#[async_trait::async_trait]
impl Responder for ReplyCollector {
    async fn reply(&self, reply: CommandReply) -> Result<()> {
        self.replies.lock().await.push(reply);
        Ok(())
    }
}

/// The `test` and `status` commands.
pub struct CommandDispatcher {
    pipeline: Arc<NewsPipeline>,
    scheduler: Arc<Scheduler>,
    sink: Arc<dyn NotificationSink>,
}

impl CommandDispatcher {
    pub fn new(
        pipeline: Arc<NewsPipeline>,
        scheduler: Arc<Scheduler>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pipeline,
            scheduler,
            sink,
        }
    }

    /// Admin-only: acknowledge, then run the pipeline exactly like the daily schedule does.
    ///
    /// Returns `None` when the invoker was denied and nothing ran.
    pub async fn manual_trigger(&self, invoker: &Invoker, responder: &dyn Responder) -> Option<Outcome> {
        if !self.sink.has_admin(invoker) {
            info!(user = %invoker.user_id, "test command denied: not an administrator");
            send(responder, CommandReply::Text(PERMISSION_DENIED_NOTICE.to_string())).await;
            return None;
        }

        info!(user = %invoker.user_id, "manual news run requested");
        send(responder, CommandReply::Text(TRIGGER_ACK.to_string())).await;
        Some(self.pipeline.run().await)
    }

    /// Open to everyone.
    pub async fn status(&self, invoker: &Invoker) -> Payload {
        info!(user = %invoker.user_id, "status requested");
        let state = self.scheduler.snapshot().await;

        let active = if state.running { "✅ Active" } else { "❌ Inactive" };
        let next_post = state
            .next_fire
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| NOT_SCHEDULED.to_string());

        Payload::new(STATUS_TITLE, STATUS_COLOR)
            .field("Status", "✅ Online", true)
            .field("Daily News", active, true)
            .field("News Channel", self.sink.destination_ref(), true)
            .field("Next Post", next_post, false)
    }
}

async fn send(responder: &dyn Responder, reply: CommandReply) {
    if let Err(e) = responder.reply(reply).await {
        warn!(error = %format!("{:#}", e), "failed to deliver command reply");
    }
}
