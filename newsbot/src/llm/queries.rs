// Prompts for the two completion calls of a pipeline run.
use super::CompletionRequest;

pub const NEWS_MAX_TOKENS: u32 = 800;
pub const NEWS_TEMPERATURE: f32 = 0.3;
pub const FACT_CHECK_MAX_TOKENS: u32 = 400;
pub const FACT_CHECK_TEMPERATURE: f32 = 0.1;

/// Topic scope and answer shape for the daily news fetch.
pub const NEWS_QUERY: &str = r#"Find the most important gaming industry news from the last 24 hours.
Focus on:
- Major game releases or announcements
- Industry acquisitions or partnerships
- Developer news and studio updates
- Gaming platform updates (Steam, Epic, PlayStation, Xbox)
- Esports major events

Provide 3-5 key stories with sources and brief summaries.
Format as clear bullet points."#;

/// Credibility assessment prompt for already fetched news text.
pub fn fact_check_query(news: &str) -> String {
    format!(
        r#"Please fact-check the following gaming industry news content.
Identify any potential inaccuracies, verify key claims, and assess credibility.

Content to check: {}

Provide:
1. Overall credibility assessment (High/Medium/Low)
2. Any questionable claims that need verification
3. Confidence level in the information (1-10)
4. Keep response concise and under 400 characters"#,
        news
    )
}

pub fn news_request(model: &str) -> CompletionRequest {
    CompletionRequest::user_prompt(model, NEWS_QUERY, NEWS_MAX_TOKENS, NEWS_TEMPERATURE)
}

pub fn fact_check_request(model: &str, news: &str) -> CompletionRequest {
    CompletionRequest::user_prompt(
        model,
        fact_check_query(news),
        FACT_CHECK_MAX_TOKENS,
        FACT_CHECK_TEMPERATURE,
    )
}
