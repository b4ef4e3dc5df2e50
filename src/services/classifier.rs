// src/services/classifier.rs
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, info, warn};
use serde_json::Value;
use std::env;
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::models::{Article, ClassifierMetrics, SentimentVerdict};

pub type Result<T> = std::result::Result<T, Box<dyn StdError + Send + Sync>>;

/// Per-article classifier input keeps the title plus a bounded slice of the
/// description.
const DESCRIPTION_SNIPPET_CHARS: usize = 200;

/// Narrow boundary to the separately-trained classifier process. Production
/// talks JSON to the Python process; tests script an in-memory fake.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    async fn train(&self) -> Result<ClassifierMetrics>;
    async fn predict(&self, texts: &[String]) -> Result<SentimentVerdict>;
}

/// Spawns the logistic-regression classifier script per call. The process
/// protocol is argv in, one JSON object on stdout; prediction input rides as
/// base64-encoded JSON to stay clear of shell quoting.
pub struct PythonClassifier {
    python: String,
    script: String,
}

impl PythonClassifier {
    pub fn new(python: impl Into<String>, script: impl Into<String>) -> Self {
        PythonClassifier {
            python: python.into(),
            script: script.into(),
        }
    }

    /// Reads `PYTHON_BIN` and `CLASSIFIER_SCRIPT`, defaulting to `python3`
    /// and `sentiment_analyzer.py`.
    pub fn from_env() -> Self {
        let python = env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string());
        let script =
            env::var("CLASSIFIER_SCRIPT").unwrap_or_else(|_| "sentiment_analyzer.py".to_string());
        PythonClassifier::new(python, script)
    }

    async fn run(&self, args: &[&str]) -> Result<Value> {
        let output = Command::new(&self.python)
            .arg(&self.script)
            .args(args)
            .output()
            .await?;

        // The script narrates progress on stderr; stdout is the JSON answer.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("classifier stderr: {}", stderr.trim());
        }
        if !output.status.success() {
            return Err(format!("classifier process exited with {}", output.status).into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value: Value = serde_json::from_str(stdout.trim())?;
        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return Err(message.to_string().into());
        }
        Ok(value)
    }
}

#[async_trait]
impl ClassifierBackend for PythonClassifier {
    async fn train(&self) -> Result<ClassifierMetrics> {
        info!("Training sentiment classifier (this can take a moment)");
        let value = self.run(&["train"]).await?;

        let succeeded = value
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !succeeded {
            return Err("classifier training reported failure".into());
        }
        let metrics = value
            .get("metrics")
            .cloned()
            .ok_or("no metrics in training response")?;
        Ok(serde_json::from_value(metrics)?)
    }

    async fn predict(&self, texts: &[String]) -> Result<SentimentVerdict> {
        let payload = serde_json::to_vec(texts)?;
        let encoded = BASE64.encode(payload);
        let value = self.run(&["predict_base64", &encoded]).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Default)]
struct ClassifierState {
    trained: bool,
    metrics: Option<ClassifierMetrics>,
}

/// Client side of the sentiment boundary: lazy one-time training, metric
/// caching for the process lifetime, and a single train-and-retry on
/// prediction failure. Never panics the pipeline; worst case is a neutral
/// verdict carrying the error text.
pub struct SentimentClient {
    backend: Arc<dyn ClassifierBackend>,
    state: Mutex<ClassifierState>,
}

impl SentimentClient {
    pub fn new(backend: Arc<dyn ClassifierBackend>) -> Self {
        SentimentClient {
            backend,
            state: Mutex::new(ClassifierState::default()),
        }
    }

    /// Metrics from the last training pass, training first if needed.
    pub async fn metrics(&self) -> Result<ClassifierMetrics> {
        self.ensure_trained().await
    }

    /// Metrics if a training pass has already happened; never triggers one.
    pub async fn cached_metrics(&self) -> Option<ClassifierMetrics> {
        self.state.lock().await.metrics.clone()
    }

    async fn ensure_trained(&self) -> Result<ClassifierMetrics> {
        let mut state = self.state.lock().await;
        if state.trained {
            if let Some(metrics) = state.metrics.clone() {
                return Ok(metrics);
            }
        }
        info!("Classifier untrained, running training pass");
        let metrics = self.backend.train().await?;
        state.trained = true;
        state.metrics = Some(metrics.clone());
        Ok(metrics)
    }

    async fn retrain(&self) -> Result<ClassifierMetrics> {
        let mut state = self.state.lock().await;
        let metrics = self.backend.train().await?;
        state.trained = true;
        state.metrics = Some(metrics.clone());
        Ok(metrics)
    }

    /// Score the articles. `Err` only when the initial training pass itself
    /// fails; prediction trouble degrades to a neutral verdict instead.
    pub async fn analyze(&self, articles: &[Article]) -> Result<SentimentVerdict> {
        let texts = build_inputs(articles);
        if texts.is_empty() {
            return Ok(SentimentVerdict::neutral("no article text to classify"));
        }

        self.ensure_trained().await?;

        match self.backend.predict(&texts).await {
            Ok(verdict) => Ok(verdict),
            Err(first) => {
                if is_untrained_error(first.as_ref()) {
                    warn!("Prediction raced an untrained model, retraining once");
                } else {
                    warn!("Prediction failed ({}), retraining and retrying once", first);
                }
                if let Err(train_err) = self.retrain().await {
                    return Ok(SentimentVerdict::neutral(format!(
                        "classifier retrain failed: {}",
                        train_err
                    )));
                }
                match self.backend.predict(&texts).await {
                    Ok(verdict) => Ok(verdict),
                    Err(second) => Ok(SentimentVerdict::neutral(format!(
                        "classifier failed: {}",
                        second
                    ))),
                }
            }
        }
    }
}

/// Title plus the first stretch of description per article; articles with no
/// text at all are dropped.
pub fn build_inputs(articles: &[Article]) -> Vec<String> {
    articles
        .iter()
        .map(|a| {
            let snippet: String = a.description.chars().take(DESCRIPTION_SNIPPET_CHARS).collect();
            format!("{} {}", a.title, snippet).trim().to_string()
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn is_untrained_error(err: &(dyn StdError + Send + Sync)) -> bool {
    err.to_string().to_lowercase().contains("not trained")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn article(title: &str, description: &str) -> Article {
        Article {
            title: title.to_string(),
            link: "https://example.com".to_string(),
            published_at: Utc::now(),
            description: description.to_string(),
        }
    }

    fn fixed_metrics() -> ClassifierMetrics {
        ClassifierMetrics {
            accuracy: 0.82,
            precision: 0.79,
            recall: 0.75,
            f1: 0.77,
        }
    }

    /// Scripted backend: counts calls, fails the first N predictions with a
    /// configured message.
    struct FakeBackend {
        train_calls: AtomicUsize,
        predict_calls: AtomicUsize,
        predict_failures: Mutex<Vec<String>>,
        fail_training: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            FakeBackend {
                train_calls: AtomicUsize::new(0),
                predict_calls: AtomicUsize::new(0),
                predict_failures: Mutex::new(Vec::new()),
                fail_training: false,
            }
        }

        fn with_predict_failures(failures: Vec<&str>) -> Self {
            let backend = Self::new();
            *backend.predict_failures.try_lock().unwrap() =
                failures.into_iter().map(String::from).collect();
            backend
        }
    }

    #[async_trait]
    impl ClassifierBackend for FakeBackend {
        async fn train(&self) -> Result<ClassifierMetrics> {
            self.train_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_training {
                return Err("no training data".into());
            }
            Ok(fixed_metrics())
        }

        async fn predict(&self, _texts: &[String]) -> Result<SentimentVerdict> {
            self.predict_calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.predict_failures.lock().await;
            if !failures.is_empty() {
                return Err(failures.remove(0).into());
            }
            Ok(SentimentVerdict {
                sentiment: "positive".to_string(),
                confidence: 0.91,
                probability_negative: Some(0.03),
                probability_neutral: Some(0.06),
                probability_positive: Some(0.91),
                note: None,
            })
        }
    }

    #[tokio::test]
    async fn empty_input_returns_neutral_without_touching_backend() {
        let backend = Arc::new(FakeBackend::new());
        let client = SentimentClient::new(backend.clone());

        let verdict = client.analyze(&[]).await.unwrap();
        assert_eq!(verdict.sentiment, "neutral");
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.note.is_some());
        assert_eq!(backend.train_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.predict_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_call_trains_once_then_metrics_stay_cached() {
        let backend = Arc::new(FakeBackend::new());
        let client = SentimentClient::new(backend.clone());
        let articles = vec![article("Shares surge", "Strong quarter")];

        let verdict = client.analyze(&articles).await.unwrap();
        assert_eq!(verdict.sentiment, "positive");
        assert_eq!(backend.train_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.predict_calls.load(Ordering::SeqCst), 1);

        // Further calls reuse the trained model and cached metrics.
        let first_metrics = client.metrics().await.unwrap();
        client.analyze(&articles).await.unwrap();
        let second_metrics = client.metrics().await.unwrap();
        assert_eq!(backend.train_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first_metrics.accuracy, second_metrics.accuracy);
        assert_eq!(first_metrics.f1, second_metrics.f1);
    }

    #[tokio::test]
    async fn untrained_prediction_retrains_and_retries_once() {
        let backend = Arc::new(FakeBackend::with_predict_failures(vec![
            "Model not trained. Run train first.",
        ]));
        let client = SentimentClient::new(backend.clone());
        let articles = vec![article("Headline", "")];

        let verdict = client.analyze(&articles).await.unwrap();
        assert_eq!(verdict.sentiment, "positive");
        // Lazy training plus the one retry training.
        assert_eq!(backend.train_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.predict_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_prediction_failure_degrades_to_neutral_with_error_text() {
        let backend = Arc::new(FakeBackend::with_predict_failures(vec![
            "Model not trained. Run train first.",
            "still broken",
        ]));
        let client = SentimentClient::new(backend.clone());

        let verdict = client.analyze(&[article("Headline", "")]).await.unwrap();
        assert_eq!(verdict.sentiment, "neutral");
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.note.as_deref().unwrap().contains("still broken"));
        // Exactly one retry, no loop.
        assert_eq!(backend.predict_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn training_failure_is_surfaced_as_error() {
        let mut backend = FakeBackend::new();
        backend.fail_training = true;
        let client = SentimentClient::new(Arc::new(backend));

        assert!(client.analyze(&[article("Headline", "")]).await.is_err());
        assert!(client.metrics().await.is_err());
    }

    #[test]
    fn inputs_take_title_and_bounded_description() {
        let long_desc = "d".repeat(500);
        let inputs = build_inputs(&[article("Title here", &long_desc)]);
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].starts_with("Title here "));
        assert_eq!(inputs[0].len(), "Title here ".len() + DESCRIPTION_SNIPPET_CHARS);
    }

    #[test]
    fn textless_articles_are_dropped() {
        let inputs = build_inputs(&[article("", ""), article(" ", "")]);
        assert!(inputs.is_empty());
    }
}
