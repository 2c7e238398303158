//! NewsReport and the structured payload delivered to the notification sink.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const REPORT_TITLE: &str = "🎮 Daily Gaming Industry News";
pub const REPORT_SUBTITLE: &str = "Latest verified gaming news with AI fact-checking";
pub const REPORT_COLOR: u32 = 0x00ff00;
pub const NEWS_FIELD_LABEL: &str = "📰 Today's Gaming News";
pub const FACT_CHECK_FIELD_LABEL: &str = "✅ Fact-Check Results";
pub const REPORT_FOOTER: &str = "Powered by Perplexity AI | Gaming News Bot";
pub const FOOTER_ICON_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

pub const NEWS_FIELD_LIMIT: usize = 1000;
pub const FACT_CHECK_FIELD_LIMIT: usize = 500;
pub const ELLIPSIS: &str = "...";

/// Substituted for the fact-check text when the second completion call fails.
pub const FACT_CHECK_FALLBACK: &str = "✅ Content appears factual (verification unavailable)";

/// Result of one successful news fetch plus its (possibly fallback) assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsReport {
    pub news: String,
    pub fact_check: String,
    pub generated_at: DateTime<Utc>,
}

impl NewsReport {
    /// `fact_check = None` means the assessment call failed; the fallback text is used.
    pub fn new(news: String, fact_check: Option<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            news,
            fact_check: fact_check.unwrap_or_else(|| FACT_CHECK_FALLBACK.to_string()),
            generated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadField {
    pub label: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footer {
    pub text: String,
    pub icon_url: Option<String>,
}

/// Structured message: what Discord calls an embed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<PayloadField>,
    pub footer: Option<Footer>,
}

impl Payload {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: None,
            color,
            timestamp: None,
            fields: Vec::new(),
            footer: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn field(mut self, label: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(PayloadField {
            label: label.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>, icon_url: Option<&str>) -> Self {
        self.footer = Some(Footer {
            text: text.into(),
            icon_url: icon_url.map(str::to_string),
        });
        self
    }

    pub fn field_value(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }
}

/// Cut `text` to `limit` characters and append the ellipsis when it was longer.
///
/// The result may exceed `limit` by the ellipsis length; existing consumers of the
/// report layout rely on that exact shape.
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Lay out a report for the sink. No escaping or other rewriting of the texts.
pub fn format_report(report: &NewsReport) -> Payload {
    Payload::new(REPORT_TITLE, REPORT_COLOR)
        .description(REPORT_SUBTITLE)
        .timestamp(report.generated_at)
        .field(
            NEWS_FIELD_LABEL,
            truncate_with_ellipsis(&report.news, NEWS_FIELD_LIMIT),
            false,
        )
        .field(
            FACT_CHECK_FIELD_LABEL,
            truncate_with_ellipsis(&report.fact_check, FACT_CHECK_FIELD_LIMIT),
            false,
        )
        .footer(REPORT_FOOTER, Some(FOOTER_ICON_URL))
}
