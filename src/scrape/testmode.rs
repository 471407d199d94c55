//! Synthetic scraper for offline development and demos: generates a small,
//! deterministic stream of threads and comments on a timer instead of
//! calling out to a real board, advancing through its own call counter
//! rather than the wall clock so test-mode runs are reproducible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::model::{Comment, Thread};
use crate::scrape::{ScrapeStats, Scraper, ThreadAnalysisContext};
use crate::storage::RepositoryCache;

pub struct TestModeScraper {
    repository: Arc<RepositoryCache>,
    call_count: AtomicU64,
}

impl TestModeScraper {
    pub fn new(repository: Arc<RepositoryCache>) -> Self {
        Self {
            repository,
            call_count: AtomicU64::new(0),
        }
    }

    fn synthetic_thread(board: &str, seq: u64) -> Thread {
        let now = chrono::Utc::now().timestamp();
        Thread {
            id: format!("test-{board}-{seq}"),
            board: board.to_string(),
            title: format!("Synthetic event #{seq} on r/{board}"),
            author: format!("test_user_{seq}"),
            text: Some("Generated for a test-mode run; not a real post.".to_string()),
            created_utc: now,
            permalink: format!("/r/{board}/comments/test{seq}/synthetic_event_{seq}"),
            score: 10 + (seq as i64 * 7) % 500,
            upvote_ratio: 0.9,
            comment_count: 2,
            last_activity_utc: now,
            image_url: None,
        }
    }
}

#[async_trait::async_trait]
impl Scraper for TestModeScraper {
    async fn scan_subreddit(&self, board: &str) -> Result<ScrapeStats> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        // The first two calls return nothing, matching the warm-up silence a
        // freshly-started monitor sees before a board has any activity.
        if call <= 2 || call % 3 != 0 {
            return Ok(ScrapeStats::default());
        }

        let mut stats = ScrapeStats::default();
        for seq in 0..2 {
            let thread = Self::synthetic_thread(board, call * 10 + seq);
            let is_new = self.repository.get_thread(&thread.id)?.is_none();
            stats.visited.insert(thread.id.clone());
            if is_new {
                stats.new_threads += 1;
                stats.new_upvotes += thread.score;
            }
            self.repository.save_thread(thread);
        }
        Ok(stats)
    }

    async fn scan_subreddit_hot(&self, board: &str) -> Result<ScrapeStats> {
        self.scan_subreddit(board).await
    }

    async fn update_threads_batch(&self, thread_ids: &[String]) -> Result<ScrapeStats> {
        let mut stats = ScrapeStats::default();
        stats.visited.extend(thread_ids.iter().cloned());
        Ok(stats)
    }

    async fn fetch_thread_context(&self, permalink: &str) -> Result<ThreadAnalysisContext> {
        let comments: Vec<Comment> = (0..10i64)
            .map(|i| {
                Comment::new(
                    format!("test-comment-{i}"),
                    "test-thread",
                    "test-thread",
                    format!("test_commenter_{i}"),
                    format!("Synthetic reply #{i} to {permalink}"),
                    i,
                    chrono::Utc::now().timestamp(),
                    chrono::Utc::now().timestamp(),
                    chrono::Utc::now().timestamp(),
                    None,
                )
            })
            .collect();

        Ok(ThreadAnalysisContext {
            title: format!("Synthetic thread at {permalink}"),
            selftext: Some("Synthetic body text for a test-mode run.".to_string()),
            image_url: None,
            top_comments: comments
                .iter()
                .map(|c| format!("{}: {}", c.author, c.body))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engine::StorageEngine;
    use tempfile::TempDir;

    fn scraper() -> (TempDir, TestModeScraper) {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(&dir.path().join("sentinel.db")).unwrap();
        let repository = Arc::new(RepositoryCache::new(Arc::new(engine)));
        (dir, TestModeScraper::new(repository))
    }

    #[tokio::test]
    async fn first_two_calls_are_silent() {
        let (_dir, scraper) = scraper();
        assert!(!scraper.scan_subreddit("test").await.unwrap().has_updates());
        assert!(!scraper.scan_subreddit("test").await.unwrap().has_updates());
    }

    #[tokio::test]
    async fn third_call_produces_two_threads() {
        let (_dir, scraper) = scraper();
        let _ = scraper.scan_subreddit("test").await.unwrap();
        let _ = scraper.scan_subreddit("test").await.unwrap();
        let stats = scraper.scan_subreddit("test").await.unwrap();
        assert_eq!(stats.new_threads, 2);
        assert_eq!(stats.visited.len(), 2);
    }

    #[tokio::test]
    async fn third_call_persists_threads_to_the_repository() {
        let (_dir, scraper) = scraper();
        let _ = scraper.scan_subreddit("test").await.unwrap();
        let _ = scraper.scan_subreddit("test").await.unwrap();
        let stats = scraper.scan_subreddit("test").await.unwrap();
        for thread_id in &stats.visited {
            assert!(scraper.repository.get_thread(thread_id).unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn fetch_thread_context_returns_ten_comments() {
        let (_dir, scraper) = scraper();
        let ctx = scraper.fetch_thread_context("/r/test/comments/abc").await.unwrap();
        assert_eq!(ctx.top_comments.len(), 10);
    }
}
