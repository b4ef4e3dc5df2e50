use dotenv::dotenv;
use env_logger;
use ticker_pulse::services::news::{NewsSource, YahooNewsFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let ticker = std::env::args().nth(1).unwrap_or_else(|| "AAPL".to_string());
    println!("Fetching news for {}...", ticker);

    let fetcher = YahooNewsFetcher::new();
    let articles = fetcher.fetch(&ticker).await;

    println!("Got {} articles:", articles.len());
    for article in &articles {
        println!(
            "  [{}] {}",
            article.published_at.format("%Y-%m-%d %H:%M"),
            article.title
        );
        println!("      {}", article.link);
        if !article.description.is_empty() {
            println!("      {}", article.description);
        }
    }

    Ok(())
}
