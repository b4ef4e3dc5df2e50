// src/handlers/analyze.rs
use log::{error, info};
use serde_json::json;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::AnalyzeRequest;
use crate::services::analyzer::Analyzer;
use crate::services::news::NewsSource;

/// Articles returned by the diagnostic preview endpoint.
const PREVIEW_COUNT: usize = 5;

pub async fn post_analyze(
    request: AnalyzeRequest,
    analyzer: Arc<Analyzer>,
) -> Result<Json, Rejection> {
    info!("Handling analyze request for {:?}", request.ticker);

    match analyzer.analyze(&request.ticker).await {
        Ok(result) => {
            info!(
                "Analysis for {} complete: {} articles, sentiment {}",
                result.ticker,
                result.articles.len(),
                result
                    .sentiment
                    .as_ref()
                    .map(|s| s.sentiment.as_str())
                    .unwrap_or("unavailable")
            );
            Ok(warp::reply::json(&result))
        }
        Err(e) => {
            error!("Rejected analyze request for {:?}: {}", request.ticker, e);
            Err(warp::reject::custom(ApiError::bad_request(e.to_string())))
        }
    }
}

/// Read-only fetch preview for operability testing: no cache write, no
/// summary, no sentiment.
pub async fn get_news_preview(
    ticker: String,
    news: Arc<dyn NewsSource>,
) -> Result<Json, Rejection> {
    info!("Handling news preview request for {}", ticker);

    let mut articles = news.fetch(&ticker).await;
    articles.truncate(PREVIEW_COUNT);
    Ok(warp::reply::json(&json!({
        "ticker": ticker,
        "articles": articles,
    })))
}

/// Liveness probe; no side effects.
pub async fn get_health() -> Result<Json, Rejection> {
    Ok(warp::reply::json(&json!({ "status": "ok" })))
}
