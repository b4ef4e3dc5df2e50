// src/services/analyzer.rs
use log::{info, warn};
use std::fmt;
use std::sync::Arc;

use crate::models::{AnalysisResult, Article, ClassifierMetrics, SentimentVerdict};
use crate::services::cache::ResultCache;
use crate::services::classifier::SentimentClient;
use crate::services::news::NewsSource;
use crate::services::summary::Summarizer;
use crate::services::ticker::{is_valid_ticker, normalize_ticker};

/// Rejected before any I/O: the cleaned input is not a ticker. The only
/// typed error the pipeline reports to callers; everything downstream
/// degrades into the result instead.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        ValidationError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Composes validation, cache, fetch, summary and sentiment into one
/// request/response cycle. Owns no request state between calls; the cache
/// and classifier state are the injected process-wide stores.
pub struct Analyzer {
    cache: Arc<ResultCache>,
    news: Arc<dyn NewsSource>,
    summarizer: Summarizer,
    sentiment: SentimentClient,
}

impl Analyzer {
    pub fn new(
        cache: Arc<ResultCache>,
        news: Arc<dyn NewsSource>,
        summarizer: Summarizer,
        sentiment: SentimentClient,
    ) -> Self {
        Analyzer {
            cache,
            news,
            summarizer,
            sentiment,
        }
    }

    /// Run the full pipeline for one raw ticker string. Fetch strictly
    /// precedes summary/sentiment, which strictly precede the cache write.
    pub async fn analyze(&self, raw_ticker: &str) -> Result<AnalysisResult, ValidationError> {
        let ticker = normalize_ticker(raw_ticker);
        if ticker.is_empty() {
            return Err(ValidationError::new("ticker is empty after cleaning"));
        }
        if !is_valid_ticker(&ticker) {
            return Err(ValidationError::new(format!("'{}' is not a valid ticker", ticker)));
        }

        if let Some(hit) = self.cache.get(&ticker).await {
            info!("Serving {} from cache", ticker);
            return Ok(hit);
        }

        let articles = self.news.fetch(&ticker).await;
        info!("Fetched {} articles for {}", articles.len(), ticker);

        let result = if articles.is_empty() {
            // Nothing to summarize or classify; still a complete, cacheable
            // answer.
            AnalysisResult {
                ticker: ticker.clone(),
                summary: Summarizer::fast_summary(&articles),
                articles,
                sentiment: None,
                metrics: None,
            }
        } else {
            let (summary, (sentiment, metrics)) = tokio::join!(
                self.summarizer.summarize(&articles),
                self.score_sentiment(&articles),
            );
            AnalysisResult {
                ticker: ticker.clone(),
                summary,
                articles,
                sentiment,
                metrics,
            }
        };

        self.cache.put(&ticker, result.clone()).await;
        Ok(result)
    }

    /// Sentiment never blocks the request: a failure just leaves both
    /// fields absent. Metrics ride along only if a training pass already
    /// produced them.
    async fn score_sentiment(
        &self,
        articles: &[Article],
    ) -> (Option<SentimentVerdict>, Option<ClassifierMetrics>) {
        match self.sentiment.analyze(articles).await {
            Ok(verdict) => {
                let metrics = self.sentiment.cached_metrics().await;
                (Some(verdict), metrics)
            }
            Err(e) => {
                warn!("Sentiment scoring failed, returning result without it: {}", e);
                (None, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Article;
    use crate::services::classifier::{ClassifierBackend, Result as ClassifierResult};
    use crate::services::summary::NO_NEWS_MESSAGE;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedNews {
        articles: Vec<Article>,
        fetch_calls: AtomicUsize,
    }

    impl CannedNews {
        fn new(articles: Vec<Article>) -> Self {
            CannedNews {
                articles,
                fetch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NewsSource for CannedNews {
        async fn fetch(&self, _ticker: &str) -> Vec<Article> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.articles.clone()
        }
    }

    struct HealthyClassifier;

    #[async_trait]
    impl ClassifierBackend for HealthyClassifier {
        async fn train(&self) -> ClassifierResult<crate::models::ClassifierMetrics> {
            Ok(crate::models::ClassifierMetrics {
                accuracy: 0.8,
                precision: 0.8,
                recall: 0.8,
                f1: 0.8,
            })
        }

        async fn predict(&self, _texts: &[String]) -> ClassifierResult<SentimentVerdict> {
            Ok(SentimentVerdict {
                sentiment: "positive".to_string(),
                confidence: 0.9,
                probability_negative: None,
                probability_neutral: None,
                probability_positive: None,
                note: None,
            })
        }
    }

    struct BrokenClassifier;

    #[async_trait]
    impl ClassifierBackend for BrokenClassifier {
        async fn train(&self) -> ClassifierResult<crate::models::ClassifierMetrics> {
            Err("classifier process unreachable".into())
        }

        async fn predict(&self, _texts: &[String]) -> ClassifierResult<SentimentVerdict> {
            Err("classifier process unreachable".into())
        }
    }

    fn articles(count: usize) -> Vec<Article> {
        (0..count)
            .map(|i| Article {
                title: format!("headline {}", i),
                link: format!("https://example.com/{}", i),
                published_at: Utc::now() - Duration::minutes(i as i64),
                description: String::new(),
            })
            .collect()
    }

    fn analyzer_with(
        news: Arc<dyn NewsSource>,
        backend: Arc<dyn ClassifierBackend>,
    ) -> (Analyzer, Arc<ResultCache>) {
        let cache = Arc::new(ResultCache::new());
        let analyzer = Analyzer::new(
            cache.clone(),
            news,
            Summarizer::new(false, None),
            SentimentClient::new(backend),
        );
        (analyzer, cache)
    }

    #[tokio::test]
    async fn rejects_invalid_ticker_before_any_io() {
        let news = Arc::new(CannedNews::new(articles(1)));
        let (analyzer, _) = analyzer_with(news.clone(), Arc::new(HealthyClassifier));

        assert!(analyzer.analyze("").await.is_err());
        assert!(analyzer.analyze("   !? ").await.is_err());
        assert!(analyzer.analyze("TOOLONGNAME").await.is_err());
        assert_eq!(news.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn normalization_maps_variants_to_one_cache_key() {
        let news = Arc::new(CannedNews::new(articles(2)));
        let (analyzer, _) = analyzer_with(news.clone(), Arc::new(HealthyClassifier));

        let first = analyzer.analyze("aapl ").await.unwrap();
        let second = analyzer.analyze("AAPL").await.unwrap();

        assert_eq!(first.ticker, "AAPL");
        assert_eq!(second.ticker, "AAPL");
        // Second call was a cache hit; only one fetch happened.
        assert_eq!(news.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_pipeline_assembles_summary_sentiment_and_metrics() {
        let news = Arc::new(CannedNews::new(articles(3)));
        let (analyzer, _) = analyzer_with(news, Arc::new(HealthyClassifier));

        let result = analyzer.analyze("TSLA").await.unwrap();
        assert_eq!(result.ticker, "TSLA");
        assert_eq!(result.articles.len(), 3);
        assert_eq!(result.summary, "headline 0; headline 1; headline 2.");
        assert_eq!(result.sentiment.unwrap().sentiment, "positive");
        assert!(result.metrics.is_some());
    }

    #[tokio::test]
    async fn sentiment_failure_degrades_to_absent_fields() {
        let news = Arc::new(CannedNews::new(articles(2)));
        let (analyzer, _) = analyzer_with(news, Arc::new(BrokenClassifier));

        let result = analyzer.analyze("TSLA").await.unwrap();
        // Articles and summary survive even though scoring died.
        assert_eq!(result.articles.len(), 2);
        assert!(!result.summary.is_empty());
        assert!(result.sentiment.is_none());
        assert!(result.metrics.is_none());
    }

    #[tokio::test]
    async fn no_news_result_is_assembled_and_cached() {
        let news = Arc::new(CannedNews::new(Vec::new()));
        let (analyzer, cache) = analyzer_with(news, Arc::new(HealthyClassifier));

        let result = analyzer.analyze("ZZZZZ").await.unwrap();
        assert_eq!(result.ticker, "ZZZZZ");
        assert_eq!(result.summary, NO_NEWS_MESSAGE);
        assert!(result.articles.is_empty());
        assert!(result.sentiment.is_none());

        let cached = cache.get("ZZZZZ").await.expect("empty result should be cached");
        assert_eq!(cached.summary, NO_NEWS_MESSAGE);
    }
}
