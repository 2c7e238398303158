use anyhow::{Context, Result};
use common::{DiscordSettings, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use super::{Destination, Invoker, NotificationSink};
use crate::report::Payload;

/// ADMINISTRATOR bit of a Discord permission bitfield.
pub const ADMINISTRATOR: u64 = 1 << 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Notification sink backed by the Discord REST API (bot token auth).
pub struct DiscordSink {
    api_base: String,
    token: Secret,
    channel_id: Option<String>,
    client: reqwest::Client,
}

impl DiscordSink {
    pub fn new(
        api_base: impl Into<String>,
        token: Secret,
        channel_id: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(
                "DiscordBot (newsbot, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()
            .context("failed to build reqwest client")?;

        let api_base: String = api_base.into();
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            channel_id,
            client,
        })
    }

    pub fn from_settings(settings: &DiscordSettings) -> Result<Self> {
        Self::new(
            settings.api_base.clone(),
            settings.token.clone(),
            settings.channel_id.clone(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token.expose())
    }

    async fn post_message(&self, destination: &Destination, body: &CreateMessage) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/channels/{}/messages", destination.id)))
            .header("Authorization", self.auth())
            .json(body)
            .send()
            .await
            .context("Discord HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Discord API error {}: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationSink for DiscordSink {
    async fn wait_until_ready(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/users/@me"))
            .header("Authorization", self.auth())
            .send()
            .await
            .context("Discord HTTP request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Discord rejected the bot token: {}", response.status());
        }

        let me: CurrentUser = response
            .json()
            .await
            .context("Failed to parse Discord user")?;
        info!(bot = %me.username, id = %me.id, "connected to Discord");
        Ok(())
    }

    async fn resolve(&self) -> Option<Destination> {
        let Some(channel_id) = self.channel_id.as_deref() else {
            warn!("no news channel configured");
            return None;
        };

        let result = self
            .client
            .get(self.url(&format!("/channels/{}", channel_id)))
            .header("Authorization", self.auth())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => Some(Destination {
                id: channel_id.to_string(),
            }),
            Ok(response) => {
                warn!(channel = %channel_id, status = %response.status(), "news channel not found");
                None
            }
            Err(e) => {
                error!(channel = %channel_id, error = %e, "failed to look up news channel");
                None
            }
        }
    }

    async fn send_text(&self, destination: &Destination, text: &str) -> Result<()> {
        self.post_message(
            destination,
            &CreateMessage {
                content: Some(text.to_string()),
                embeds: Vec::new(),
            },
        )
        .await
    }

    async fn send_payload(&self, destination: &Destination, payload: &Payload) -> Result<()> {
        self.post_message(
            destination,
            &CreateMessage {
                content: None,
                embeds: vec![Embed::from(payload)],
            },
        )
        .await
    }

    fn has_admin(&self, invoker: &Invoker) -> bool {
        invoker.permissions & ADMINISTRATOR == ADMINISTRATOR
    }

    fn destination_ref(&self) -> String {
        format!("<#{}>", self.channel_id.as_deref().unwrap_or("0"))
    }
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
}

#[derive(Debug, Serialize)]
struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<EmbedFooter>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

impl From<&Payload> for Embed {
    fn from(payload: &Payload) -> Self {
        Self {
            title: payload.title.clone(),
            description: payload.description.clone(),
            color: payload.color,
            timestamp: payload.timestamp.map(|t| t.to_rfc3339()),
            fields: payload
                .fields
                .iter()
                .map(|f| EmbedField {
                    name: f.label.clone(),
                    value: f.value.clone(),
                    inline: f.inline,
                })
                .collect(),
            footer: payload.footer.as_ref().map(|f| EmbedFooter {
                text: f.text.clone(),
                icon_url: f.icon_url.clone(),
            }),
        }
    }
}
