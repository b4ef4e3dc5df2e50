// src/services/summary.rs
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::fmt;

use crate::models::Article;

pub const NO_NEWS_MESSAGE: &str = "No recent news found for this ticker.";

const AI_MODEL_URL: &str = "https://api-inference.huggingface.co/models/facebook/bart-large-cnn";
const AI_TIMEOUT_SECS: u64 = 5;

/// Prompts shorter than this aren't worth a model call; the fast path does
/// fine on a couple of headlines.
const AI_MIN_INPUT_CHARS: usize = 80;
const AI_MAX_INPUT_CHARS: usize = 1024;

const FAST_PATH_TITLES: usize = 3;
const AI_PROMPT_TITLES: usize = 5;

const AI_SUMMARY_MAX_LENGTH: u32 = 80;
const AI_SUMMARY_MIN_LENGTH: u32 = 20;

#[derive(Debug)]
enum AiCallError {
    /// 401/403/429: bad credential or throttled; worth telling the operator.
    AccessDenied(StatusCode),
    Failed(String),
}

impl fmt::Display for AiCallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AiCallError::AccessDenied(status) => write!(f, "access denied ({})", status),
            AiCallError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AiSummaryItem {
    summary_text: String,
}

/// Two interchangeable strategies behind one call: a deterministic local
/// summary, and an opt-in hosted abstractive model that always degrades back
/// to the local one on any failure.
pub struct Summarizer {
    client: Client,
    use_ai: bool,
    api_token: Option<String>,
}

impl Summarizer {
    pub fn new(use_ai: bool, api_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(AI_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Summarizer {
            client,
            use_ai,
            api_token,
        }
    }

    /// Reads `USE_AI_SUMMARY` and `HF_API_TOKEN`. Both optional; absent
    /// means the fast path only.
    pub fn from_env() -> Self {
        let use_ai = env::var("USE_AI_SUMMARY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let api_token = env::var("HF_API_TOKEN").ok().filter(|t| !t.is_empty());
        if use_ai && api_token.is_none() {
            warn!("USE_AI_SUMMARY set without HF_API_TOKEN; using unauthenticated access");
        }
        Summarizer::new(use_ai, api_token)
    }

    /// Deterministic summary: the top headlines joined into one sentence.
    /// Zero articles yields the fixed no-news message, never an empty string.
    pub fn fast_summary(articles: &[Article]) -> String {
        if articles.is_empty() {
            return NO_NEWS_MESSAGE.to_string();
        }
        let titles: Vec<&str> = articles
            .iter()
            .take(FAST_PATH_TITLES)
            .map(|a| a.title.trim())
            .collect();
        format!("{}.", titles.join("; "))
    }

    /// Resolve a summary for the articles. Never fails: every error path
    /// lands on the fast summary.
    pub async fn summarize(&self, articles: &[Article]) -> String {
        if !self.use_ai || articles.is_empty() {
            return Self::fast_summary(articles);
        }

        let prompt = build_prompt(articles);
        if prompt.len() < AI_MIN_INPUT_CHARS {
            info!("Prompt below AI threshold ({} chars), using fast summary", prompt.len());
            return Self::fast_summary(articles);
        }

        let prompt = truncate_chars(&prompt, AI_MAX_INPUT_CHARS);
        match self.request_ai_summary(&prompt).await {
            Ok(summary) => summary,
            Err(AiCallError::AccessDenied(status)) => {
                warn!("AI summary access denied ({}), falling back", status);
                format!(
                    "{} (AI summary unavailable: check API token or rate limits)",
                    Self::fast_summary(articles)
                )
            }
            Err(e) => {
                warn!("AI summary failed ({}), falling back", e);
                Self::fast_summary(articles)
            }
        }
    }

    async fn request_ai_summary(&self, prompt: &str) -> Result<String, AiCallError> {
        let mut request = self.client.post(AI_MODEL_URL).json(&json!({
            "inputs": prompt,
            "parameters": {
                "max_length": AI_SUMMARY_MAX_LENGTH,
                "min_length": AI_SUMMARY_MIN_LENGTH,
                "do_sample": false,
            },
        }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AiCallError::Failed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            return Err(AiCallError::AccessDenied(status));
        }
        if !status.is_success() {
            return Err(AiCallError::Failed(format!("unexpected status {}", status)));
        }

        let items: Vec<AiSummaryItem> = response
            .json()
            .await
            .map_err(|e| AiCallError::Failed(format!("malformed response: {}", e)))?;

        match items.into_iter().next() {
            Some(item) if !item.summary_text.trim().is_empty() => {
                Ok(item.summary_text.trim().to_string())
            }
            _ => Err(AiCallError::Failed("empty summary in response".to_string())),
        }
    }
}

/// Numbered headline list for the abstractive model.
fn build_prompt(articles: &[Article]) -> String {
    let lines: Vec<String> = articles
        .iter()
        .take(AI_PROMPT_TITLES)
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a.title.trim()))
        .collect();
    format!("Summarize the following recent news headlines:\n{}", lines.join("\n"))
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
