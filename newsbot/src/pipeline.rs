// News pipeline: fetch -> fact-check -> format -> deliver
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::llm::{queries, CompletionClient};
use crate::report::{format_report, NewsReport};
use crate::sink::{Destination, NotificationSink};

pub const FETCH_FAILED_NOTICE: &str = "❌ Unable to fetch gaming news today. Please try again later.";
pub const GENERIC_ERROR_NOTICE: &str = "❌ An error occurred while fetching today's gaming news.";

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    NoChannel,
    FetchFailed,
    DeliveryError,
}

pub struct NewsPipeline {
    client: Arc<dyn CompletionClient>,
    sink: Arc<dyn NotificationSink>,
    model: String,
    // Serializes overlapping scheduled/manual runs.
    run_guard: Mutex<()>,
}

impl NewsPipeline {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        sink: Arc<dyn NotificationSink>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            sink,
            model: model.into(),
            run_guard: Mutex::new(()),
        }
    }

    /// Run once. Sends exactly one message to the destination (report or one notice),
    /// or none when the destination cannot be resolved. Never returns an error.
    pub async fn run(&self) -> Outcome {
        let _guard = self.run_guard.lock().await;
        let run_id = Uuid::new_v4();
        self.run_inner()
            .instrument(info_span!("pipeline_run", %run_id))
            .await
    }

    async fn run_inner(&self) -> Outcome {
        let Some(destination) = self.sink.resolve().await else {
            error!("News channel not found");
            return Outcome::NoChannel;
        };

        info!("Fetching gaming news...");
        let news = self
            .client
            .complete(queries::news_request(&self.model))
            .await
            .filter(|text| !text.trim().is_empty());
        let Some(news) = news else {
            if let Err(e) = self.sink.send_text(&destination, FETCH_FAILED_NOTICE).await {
                error!(error = %format!("{:#}", e), "failed to send fetch failure notice");
            }
            return Outcome::FetchFailed;
        };

        info!("Fact-checking news content...");
        let fact_check = self
            .client
            .complete(queries::fact_check_request(&self.model, &news))
            .await;
        if fact_check.is_none() {
            warn!("fact-check unavailable, delivering with fallback assessment");
        }

        let report = NewsReport::new(news, fact_check, Utc::now());
        match self.deliver(&destination, &report).await {
            Ok(()) => {
                info!("Daily gaming news posted successfully");
                Outcome::Delivered
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Error posting daily news");
                if let Err(e) = self.sink.send_text(&destination, GENERIC_ERROR_NOTICE).await {
                    error!(error = %format!("{:#}", e), "failed to send error notice");
                }
                Outcome::DeliveryError
            }
        }
    }

    async fn deliver(&self, destination: &Destination, report: &NewsReport) -> Result<()> {
        let payload = format_report(report);
        self.sink
            .send_payload(destination, &payload)
            .await
            .context("failed to deliver news report")
    }
}
