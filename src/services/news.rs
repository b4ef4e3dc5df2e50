// src/services/news.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::error::Error as StdError;

use crate::models::Article;

pub type Result<T> = std::result::Result<T, Box<dyn StdError + Send + Sync>>;

/// Results are capped to the most recent articles after de-duplication.
pub const MAX_ARTICLES: usize = 10;

const FETCH_TIMEOUT_SECS: u64 = 5;

const FEED_URL: &str = "https://feeds.finance.yahoo.com/rss/2.0/headline";
const NEWS_PAGE_URL: &str = "https://finance.yahoo.com/quote";

/// Where articles come from. The production implementation is the
/// two-strategy fetcher below; tests substitute canned lists.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Vec<Article>;
}

pub struct YahooNewsFetcher {
    client: Client,
    feed_base: String,
    page_base: String,
}

impl YahooNewsFetcher {
    pub fn new() -> Self {
        Self::with_endpoints(FEED_URL, NEWS_PAGE_URL)
    }

    /// Endpoints are injectable so the strategy chain can be exercised
    /// against a local fixture server.
    pub fn with_endpoints(feed_base: impl Into<String>, page_base: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        YahooNewsFetcher {
            client,
            feed_base: feed_base.into(),
            page_base: page_base.into(),
        }
    }

    /// Primary strategy: the per-ticker headline feed. Collects every entry;
    /// entry-level parse failures default the timestamp to now.
    async fn fetch_feed(&self, ticker: &str) -> Result<Vec<Article>> {
        let url = format!("{}?s={}&region=US&lang=en-US", self.feed_base, ticker);
        info!("Fetching headline feed: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(format!("feed returned status {}", response.status()).into());
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err("empty feed body".into());
        }
        Ok(parse_feed_entries(&body))
    }

    /// Fallback strategy: scrape the ticker's news page, trying selectors in
    /// order until one yields items.
    async fn scrape_news_page(&self, ticker: &str) -> Result<Vec<Article>> {
        let url = format!("{}/{}/news", self.page_base, ticker);
        info!("Falling back to news page scrape: {}", url);

        let body = self.client.get(&url).send().await?.text().await?;
        let document = Html::parse_document(&body);

        // Yahoo has shipped several generations of this layout; try each in
        // turn and take the first that produces anything.
        let item_selectors = [
            "li.stream-item",
            "section[data-testid='storyitem']",
            "div.news-stream li",
            "li.js-stream-content",
        ];

        for sel_text in item_selectors {
            let selector = Selector::parse(sel_text).unwrap();
            let articles = scrape_items(&document, &selector);
            if !articles.is_empty() {
                info!(
                    "Selector '{}' matched {} items for {}",
                    sel_text,
                    articles.len(),
                    ticker
                );
                return Ok(articles);
            }
        }

        Ok(Vec::new())
    }
}

impl Default for YahooNewsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsSource for YahooNewsFetcher {
    async fn fetch(&self, ticker: &str) -> Vec<Article> {
        match self.fetch_feed(ticker).await {
            Ok(articles) if !articles.is_empty() => return dedupe_and_rank(articles),
            Ok(_) => info!("Feed had no entries for {}, trying page scrape", ticker),
            Err(e) => warn!("Feed fetch failed for {}: {}", ticker, e),
        }

        match self.scrape_news_page(ticker).await {
            Ok(articles) => {
                if articles.is_empty() {
                    info!("No news found for {} from either source", ticker);
                }
                dedupe_and_rank(articles)
            }
            Err(e) => {
                error!("News page scrape failed for {}: {}", ticker, e);
                Vec::new()
            }
        }
    }
}

/// Pull `<item>` blocks out of the feed body. The feed is simple enough that
/// tag-pair extraction beats a full XML dependency here.
fn parse_feed_entries(body: &str) -> Vec<Article> {
    let item_re = Regex::new(r"(?s)<item>(.*?)</item>").unwrap();

    let mut articles = Vec::new();
    for caps in item_re.captures_iter(body) {
        let block = caps.get(1).map(|m| m.as_str()).unwrap_or("");

        let title = feed_field(block, "title");
        if title.is_empty() {
            continue;
        }
        let link = feed_field(block, "link");
        let description = feed_field(block, "description");
        let published_at = feed_field(block, "pubDate");
        let published_at = DateTime::parse_from_rfc2822(&published_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        articles.push(Article {
            title,
            link,
            published_at,
            description,
        });
    }
    articles
}

/// Extract one tag's text from a feed item block, unescaped, CDATA unwrapped.
fn feed_field(block: &str, tag: &str) -> String {
    let re = Regex::new(&format!(
        r"(?s)<{tag}[^>]*>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</{tag}>",
        tag = tag
    ))
    .unwrap();
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| unescape_entities(m.as_str().trim()))
        .unwrap_or_default()
}

fn scrape_items(document: &Html, selector: &Selector) -> Vec<Article> {
    let title_sel = Selector::parse("h3").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();
    let desc_sel = Selector::parse("p").unwrap();
    let time_sel = Selector::parse("time, div.publishing").unwrap();

    let mut articles = Vec::new();
    for item in document.select(selector) {
        let title = match item.select(&title_sel).next() {
            Some(el) => unescape_entities(el.text().collect::<String>().trim()),
            None => continue,
        };
        if title.is_empty() {
            continue;
        }

        let link = item
            .select(&link_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(absolute_link)
            .unwrap_or_default();

        let description = item
            .select(&desc_sel)
            .next()
            .map(|el| unescape_entities(el.text().collect::<String>().trim()))
            .unwrap_or_default();

        // Publishing blocks carry either relative age text ("2h ago") or an
        // absolute date; both resolve against now.
        let published_at = item
            .select(&time_sel)
            .next()
            .map(|el| {
                let text = el.text().collect::<String>();
                parse_article_date(&text, Utc::now())
            })
            .unwrap_or_else(Utc::now);

        articles.push(Article {
            title,
            link,
            published_at,
            description,
        });
    }
    articles
}

fn absolute_link(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("https://finance.yahoo.com{}", href)
    }
}

/// Resolve scraped date text. Relative offsets ("15m ago", "2h ago",
/// "3d ago") are subtracted from `now`; anything else is tried as an
/// absolute date, with `now` as the last resort.
pub fn parse_article_date(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = text.trim();

    let rel_re = Regex::new(r"(?i)(\d+)\s*(m|min|mins|minute|minutes|h|hr|hrs|hour|hours|d|day|days)\s+ago").unwrap();
    if let Some(caps) = rel_re.captures(text) {
        let amount: i64 = caps[1].parse().unwrap_or(0);
        let unit = caps[2].to_lowercase();
        let offset = if unit.starts_with('m') {
            Duration::minutes(amount)
        } else if unit.starts_with('h') {
            Duration::hours(amount)
        } else {
            Duration::days(amount)
        };
        return now - offset;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return parsed.with_timezone(&Utc);
    }

    now
}

/// Shared post-processing for both strategies: drop duplicate titles (first
/// seen wins), newest first, cap the count. The title comparison is exact;
/// syndicated copies sharing a headline collapse into one entry.
pub fn dedupe_and_rank(articles: Vec<Article>) -> Vec<Article> {
    let mut seen_titles = HashSet::new();
    let mut unique: Vec<Article> = articles
        .into_iter()
        .filter(|a| seen_titles.insert(a.title.clone()))
        .collect();

    unique.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    unique.truncate(MAX_ARTICLES);
    unique
}

/// Minimal entity unescaping for feed/page text; full HTML parsing is not
/// warranted for headline strings.
pub fn unescape_entities(text: &str) -> String {
    let stripped = Regex::new(r"<[^>]+>").unwrap().replace_all(text, "");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}
