use dotenv::dotenv;
use env_logger;
use ticker_pulse::services::classifier::{ClassifierBackend, PythonClassifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let classifier = PythonClassifier::from_env();

    println!("Training classifier (this can take a while)...");
    let metrics = classifier.train().await.map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "Trained. accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
        metrics.accuracy, metrics.precision, metrics.recall, metrics.f1
    );

    let texts = vec![
        "Company shares surge on record quarterly earnings".to_string(),
        "Analysts warn of mounting losses and weak guidance".to_string(),
    ];
    println!("Predicting sentiment for {} sample texts...", texts.len());
    let verdict = classifier.predict(&texts).await.map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "Verdict: {} (confidence {:.4})",
        verdict.sentiment, verdict.confidence
    );

    Ok(())
}
