// src/routes.rs
use std::sync::Arc;
use warp::reject::Rejection;

use crate::handlers::analyze::{get_health, get_news_preview, post_analyze};
use crate::services::analyzer::Analyzer;
use crate::services::news::NewsSource;
use log::info;

use crate::handlers::error::ApiError;
use std::convert::Infallible;
use warp::{Filter, Reply};

// Add recovery handling for our custom errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = "Invalid request body".to_string();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    analyzer: Arc<Analyzer>,
    news: Arc<dyn NewsSource>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let analyzer_filter = warp::any().map(move || analyzer.clone());
    let news_filter = warp::any().map(move || news.clone());

    let analyze_route = warp::path!("api" / "v1" / "analyze")
        .and(warp::post())
        .and(warp::body::json())
        .and(analyzer_filter)
        .and_then(post_analyze);

    let news_preview_route = warp::path!("api" / "v1" / "news" / String)
        .and(warp::get())
        .and(news_filter)
        .and_then(get_news_preview);

    let health_route = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and_then(get_health);

    info!("All routes configured successfully.");

    analyze_route
        .or(news_preview_route)
        .or(health_route)
        .recover(handle_rejection)
}
