use dotenv::dotenv;
use env_logger;
use std::time::{Duration, Instant};
use ticker_pulse::services::clipboard::{
    ClipboardSource, ClipboardWatcher, CommandClipboard, POLL_INTERVAL_MS,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let source = CommandClipboard::detect()
        .ok_or_else(|| anyhow::anyhow!("no clipboard utility for this platform"))?;
    let mut watcher = ClipboardWatcher::new();

    println!("Watching the clipboard; copy a ticker symbol (Ctrl-C to quit)");

    let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
    loop {
        interval.tick().await;
        if let Some(sample) = source.read_sample().await {
            if let Some(ticker) = watcher.observe(&sample, Instant::now()) {
                println!("Detected ticker: {}", ticker);
            }
        }
    }
}
