use dotenv::dotenv;
use env_logger;
use log::{info, warn};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

mod handlers;
mod models;
mod routes;
mod services;

use services::analyzer::Analyzer;
use services::cache::{self, ResultCache};
use services::classifier::{PythonClassifier, SentimentClient};
use services::clipboard;
use services::news::{NewsSource, YahooNewsFetcher};
use services::summary::Summarizer;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let port_str = env::var("PORT").unwrap_or_else(|_| {
        warn!("$PORT not set, defaulting to 3030");
        "3030".to_string()
    });

    let port: u16 = port_str.parse().expect("PORT must be a number");
    info!("Using PORT: {}", port);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("Will bind to: {}", addr);

    // Process-wide stores and pipeline wiring
    let result_cache = Arc::new(ResultCache::new());
    cache::start_sweeper(result_cache.clone());

    let news: Arc<dyn NewsSource> = Arc::new(YahooNewsFetcher::new());
    let sentiment = SentimentClient::new(Arc::new(PythonClassifier::from_env()));
    let summarizer = Summarizer::from_env();
    let analyzer = Arc::new(Analyzer::new(
        result_cache,
        news.clone(),
        summarizer,
        sentiment,
    ));

    let watch_clipboard = env::var("ENABLE_CLIPBOARD_WATCH")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);
    if watch_clipboard {
        clipboard::spawn_watcher(analyzer.clone());
    } else {
        info!("Clipboard watcher disabled via ENABLE_CLIPBOARD_WATCH");
    }

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    // Set up routes
    let api = routes::routes(analyzer, news).with(cors);
    info!("Routes configured successfully with CORS.");

    // Start the server
    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
}
