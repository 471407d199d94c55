//! Board scraper: polls configured boards, normalizes payloads, writes
//! through the repository, and reports a per-cycle delta.
//!
//! `testmode` provides a synthetic, timer-driven stand-in for offline
//! development and tests.

pub mod normalize;
pub mod testmode;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::model::{Comment, Thread};
use crate::storage::RepositoryCache;

/// Accumulates what a scrape cycle observed. `add` merges two stats
/// (used when a cycle hits several listings for one board).
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    pub new_threads: u64,
    pub new_upvotes: i64,
    pub new_comments: u64,
    pub visited: HashSet<String>,
}

impl ScrapeStats {
    pub fn has_updates(&self) -> bool {
        self.new_threads > 0 || self.new_upvotes != 0 || self.new_comments > 0
    }

    pub fn add(&mut self, other: ScrapeStats) {
        self.new_threads += other.new_threads;
        self.new_upvotes += other.new_upvotes;
        self.new_comments += other.new_comments;
        self.visited.extend(other.visited);
    }
}

/// Title/selftext/top-comments context used to build the report dossier.
#[derive(Debug, Clone)]
pub struct ThreadAnalysisContext {
    pub title: String,
    pub selftext: Option<String>,
    pub image_url: Option<String>,
    /// Flattened `"author: body"` lines, most-upvoted first.
    pub top_comments: Vec<String>,
}

/// Capability set a scraper backend must provide. A live implementation
/// and a `testmode` synthetic implementation both satisfy this so the
/// monitor can be wired to either without branching.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn scan_subreddit(&self, board: &str) -> Result<ScrapeStats>;
    async fn scan_subreddit_hot(&self, board: &str) -> Result<ScrapeStats>;
    async fn update_threads_batch(&self, thread_ids: &[String]) -> Result<ScrapeStats>;
    async fn fetch_thread_context(&self, permalink: &str) -> Result<ThreadAnalysisContext>;
}

/// Per-host token bucket: one token refilled per `1/refill_per_sec`
/// seconds, burst capacity `capacity`.
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: std::time::Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: std::time::Instant::now(),
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = std::time::Instant::now();
    }

    async fn acquire(&mut self) {
        loop {
            self.refill();
            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return;
            }
            let deficit = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64((deficit / self.refill_per_sec).max(0.01));
            tokio::time::sleep(wait).await;
        }
    }
}

/// The live scraper: polls an external board source over HTTP.
pub struct LiveScraper {
    client: reqwest::Client,
    repository: Arc<RepositoryCache>,
    bucket: Mutex<TokenBucket>,
    base_url: String,
}

impl LiveScraper {
    pub fn new(repository: Arc<RepositoryCache>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("sentinel-monitor/0.1")
            .build()
            .expect("building reqwest client");

        Self {
            client,
            repository,
            bucket: Mutex::new(TokenBucket::new(5.0, 1.0)),
            base_url: base_url.into(),
        }
    }

    /// GETs `path`, retried up to 3 times with bounded exponential backoff
    /// and jitter on transient failures.
    async fn get_with_retry(&self, path: &str) -> Result<reqwest::Response> {
        self.bucket.lock().await.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().as_u16() == 429 || resp.status().is_server_error() => {
                    if attempt >= 3 {
                        return Err(anyhow::anyhow!(
                            "transient error after {attempt} attempts: {}",
                            resp.status()
                        ));
                    }
                }
                Ok(resp) => {
                    return Err(anyhow::anyhow!("permanent error: {}", resp.status()));
                }
                Err(e) => {
                    if attempt >= 3 {
                        return Err(e).context("scrape request failed after retries");
                    }
                }
            }

            let base_ms = 200u64 * 2u64.pow(attempt - 1);
            let jitter_ms = rand::rng().random_range(0..100);
            tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
        }
    }

    async fn listing(&self, board: &str, path: &str) -> Result<Vec<RawListingItem>> {
        let resp = self.get_with_retry(&format!("/r/{board}/{path}.json")).await?;
        let body: RawListing = resp.json().await.context("parsing listing JSON")?;
        Ok(body.data.children.into_iter().map(|c| c.data).collect())
    }

    fn ingest_listing(&self, board: &str, items: Vec<RawListingItem>) -> ScrapeStats {
        let mut stats = ScrapeStats::default();

        for item in items {
            let Some(thread) = raw_item_to_thread(board, &item) else {
                continue;
            };

            let is_new = self.repository.get_thread(&thread.id).ok().flatten().is_none();
            stats.visited.insert(thread.id.clone());
            if is_new {
                stats.new_threads += 1;
                stats.new_upvotes += thread.score.max(0);
            }
            self.repository.save_thread(thread);
        }

        stats
    }
}

#[async_trait::async_trait]
impl Scraper for LiveScraper {
    async fn scan_subreddit(&self, board: &str) -> Result<ScrapeStats> {
        if board.is_empty() {
            return Ok(ScrapeStats::default());
        }
        let items = self.listing(board, "new").await?;
        Ok(self.ingest_listing(board, items))
    }

    async fn scan_subreddit_hot(&self, board: &str) -> Result<ScrapeStats> {
        if board.is_empty() {
            return Ok(ScrapeStats::default());
        }
        let items = self.listing(board, "hot").await?;
        Ok(self.ingest_listing(board, items))
    }

    async fn update_threads_batch(&self, thread_ids: &[String]) -> Result<ScrapeStats> {
        let mut stats = ScrapeStats::default();
        for id in thread_ids {
            let Ok(resp) = self.get_with_retry(&format!("/by_id/t3_{id}.json")).await else {
                continue;
            };
            let Ok(body) = resp.json::<RawListing>().await else {
                continue;
            };
            for child in body.data.children {
                if let Some(thread) = raw_item_to_thread("", &child.data) {
                    stats.visited.insert(thread.id.clone());
                    self.repository.save_thread(thread);
                }
            }
        }
        Ok(stats)
    }

    async fn fetch_thread_context(&self, permalink: &str) -> Result<ThreadAnalysisContext> {
        if permalink.is_empty() {
            return Ok(ThreadAnalysisContext {
                title: String::new(),
                selftext: None,
                image_url: None,
                top_comments: Vec::new(),
            });
        }

        let path = normalize::normalize_permalink(permalink);
        let resp = self.get_with_retry(&format!("{path}.json")).await?;
        let body: Vec<RawListing> = resp.json().await.context("parsing thread context JSON")?;

        let thread_item = body
            .first()
            .and_then(|l| l.data.children.first())
            .map(|c| &c.data);

        let title = thread_item.map(|t| t.title.clone().unwrap_or_default()).unwrap_or_default();
        let selftext = thread_item.and_then(|t| t.selftext.clone()).filter(|s| !s.is_empty());
        let image_url = thread_item
            .and_then(|t| t.url.clone())
            .filter(|u| normalize::looks_like_image(u));
        let thread_id = thread_item.and_then(|t| t.id.clone());

        let comment_items: &[RawListingChild] = body
            .get(1)
            .map(|l| l.data.children.as_slice())
            .unwrap_or_default();

        if let Some(thread_id) = &thread_id {
            self.persist_comments(thread_id, comment_items);
        }

        let top_comments = comment_items
            .iter()
            .filter_map(|c| {
                let author = c.data.author.clone()?;
                if !normalize::is_valid_author(&author) {
                    return None;
                }
                let body = c.data.body.clone()?;
                Some(format!("{author}: {body}"))
            })
            .take(15)
            .collect();

        Ok(ThreadAnalysisContext {
            title,
            selftext,
            image_url,
            top_comments,
        })
    }
}

impl LiveScraper {
    /// Converts the raw comment listing into `Comment` rows and writes them
    /// through the repository, so `getCommentsForThread` has something to
    /// serve once a thread's context has been fetched at least once.
    fn persist_comments(&self, thread_id: &str, items: &[RawListingChild]) {
        for child in items {
            if let Some(comment) = raw_item_to_comment(thread_id, &child.data) {
                if let Err(e) = self.repository.save_comment(&comment) {
                    tracing::warn!("failed to persist comment {} on thread {thread_id}: {e:#}", comment.id);
                }
            }
        }
    }
}

fn raw_item_to_thread(board: &str, item: &RawListingItem) -> Option<Thread> {
    let id = item.id.clone()?;
    let author = item.author.clone()?;
    if !normalize::is_valid_author(&author) {
        return None;
    }

    let permalink = item
        .permalink
        .as_deref()
        .map(normalize::normalize_permalink)
        .unwrap_or_default();

    let raw_url = item.url.clone().map(|u| normalize::strip_trailing_punctuation(&u));
    let image_url = raw_url.filter(|u| normalize::looks_like_image(u));

    Some(Thread {
        id,
        board: if board.is_empty() {
            item.subreddit.clone().unwrap_or_default()
        } else {
            board.to_string()
        },
        title: normalize::html_unescape(&item.title.clone().unwrap_or_default()),
        author,
        text: item.selftext.clone().filter(|s| !s.is_empty()).map(|s| normalize::html_unescape(&s)),
        created_utc: item.created_utc.unwrap_or(0.0) as i64,
        permalink,
        score: item.score.unwrap_or(0),
        upvote_ratio: item.upvote_ratio.unwrap_or(1.0),
        comment_count: item.num_comments.unwrap_or(0),
        last_activity_utc: item.created_utc.unwrap_or(0.0) as i64,
        image_url,
    })
}

fn raw_item_to_comment(thread_id: &str, item: &RawListingItem) -> Option<Comment> {
    let id = item.id.clone()?;
    let author = item.author.clone()?;
    let body = item.body.clone()?;
    let parent = item
        .parent_id
        .as_deref()
        .map(|p| p.trim_start_matches("t1_").trim_start_matches("t3_").to_string())
        .unwrap_or_else(|| thread_id.to_string());

    Some(Comment::new(
        id,
        thread_id,
        parent,
        author,
        normalize::html_unescape(&body),
        item.score.unwrap_or(0),
        item.created_utc.unwrap_or(0.0) as i64,
        chrono::Utc::now().timestamp(),
        chrono::Utc::now().timestamp(),
        None,
    ))
}

#[derive(Debug, Deserialize)]
struct RawListing {
    data: RawListingData,
}

#[derive(Debug, Deserialize)]
struct RawListingData {
    children: Vec<RawListingChild>,
}

#[derive(Debug, Deserialize)]
struct RawListingChild {
    data: RawListingItem,
}

#[derive(Debug, Deserialize, Default)]
struct RawListingItem {
    id: Option<String>,
    author: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    url: Option<String>,
    subreddit: Option<String>,
    score: Option<i64>,
    upvote_ratio: Option<f64>,
    num_comments: Option<i64>,
    created_utc: Option<f64>,
    permalink: Option<String>,
    body: Option<String>,
    parent_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_stats_merge_accumulates() {
        let mut a = ScrapeStats {
            new_threads: 1,
            new_upvotes: 10,
            new_comments: 2,
            visited: ["a".to_string()].into_iter().collect(),
        };
        let b = ScrapeStats {
            new_threads: 2,
            new_upvotes: 5,
            new_comments: 0,
            visited: ["b".to_string()].into_iter().collect(),
        };
        a.add(b);
        assert_eq!(a.new_threads, 3);
        assert_eq!(a.new_upvotes, 15);
        assert_eq!(a.visited.len(), 2);
        assert!(a.has_updates());
    }

    #[test]
    fn empty_stats_has_no_updates() {
        assert!(!ScrapeStats::default().has_updates());
    }
}
