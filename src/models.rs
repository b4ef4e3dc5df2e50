// src/models.rs
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

/// A single normalized news item. Immutable once built by the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    #[serde(rename = "date")]
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Verdict returned by the external classifier process. Per-class
/// probabilities are present when the classifier supplied them; `note`
/// carries an explanation on degraded verdicts (no input, classifier error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentVerdict {
    pub sentiment: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_negative: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_neutral: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_positive: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SentimentVerdict {
    /// Zero-confidence neutral verdict used when the classifier was not
    /// consulted or could not answer.
    pub fn neutral(note: impl Into<String>) -> Self {
        SentimentVerdict {
            sentiment: "neutral".to_string(),
            confidence: 0.0,
            probability_negative: None,
            probability_neutral: None,
            probability_positive: None,
            note: Some(note.into()),
        }
    }
}

/// Evaluation metrics from the classifier's train/test split. The process
/// reports the last field as `f1_score`; the wire format here uses `f1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    #[serde(alias = "f1_score")]
    pub f1: f64,
}

/// The unit returned to callers and stored in the result cache. A new
/// instance is assembled per request, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ticker: String,
    pub summary: String,
    pub articles: Vec<Article>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ClassifierMetrics>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub ticker: String,
}
