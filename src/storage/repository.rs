//! Write-through cache over the storage engine.
//!
//! Writes are routed through a single `mpsc::UnboundedSender<RepoCommand>`
//! consumed by one background task — a dedicated consumer behind a channel,
//! giving per-key write serialization for free since every write for every
//! key goes through the same single-consumer task.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::model::{Comment, Thread};
use crate::storage::engine::StorageEngine;

/// Max comments fetched from the engine on a thread's first cache miss.
const INITIAL_COMMENT_FETCH: usize = 200;

enum RepoCommand {
    SaveThread(Thread),
    SaveThreadsBatch(Vec<Thread>),
    Shutdown,
}

#[derive(Clone)]
pub struct RepositoryCache {
    engine: Arc<StorageEngine>,
    threads: Arc<RwLock<HashMap<String, Thread>>>,
    comments: Arc<RwLock<HashMap<String, Vec<Comment>>>>,
    tx: mpsc::UnboundedSender<RepoCommand>,
}

impl RepositoryCache {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RepoCommand>();
        let writer_engine = engine.clone();

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    RepoCommand::SaveThread(t) => {
                        if let Err(e) = writer_engine.save_thread(&t) {
                            tracing::error!("write-behind save_thread failed: {e:#}");
                        }
                    }
                    RepoCommand::SaveThreadsBatch(ts) => {
                        if let Err(e) = writer_engine.save_threads_batch(&ts) {
                            tracing::error!("write-behind save_threads_batch failed: {e:#}");
                        }
                    }
                    RepoCommand::Shutdown => break,
                }
            }
        });

        Self {
            engine,
            threads: Arc::new(RwLock::new(HashMap::new())),
            comments: Arc::new(RwLock::new(HashMap::new())),
            tx,
        }
    }

    /// Insert/replace in the in-memory map, then fire-and-forget the
    /// persistence call. Failures in the write-behind task are logged, not
    /// surfaced to the caller.
    pub fn save_thread(&self, thread: Thread) {
        self.threads
            .write()
            .unwrap()
            .insert(thread.id.clone(), thread.clone());
        let _ = self.tx.send(RepoCommand::SaveThread(thread));
    }

    pub fn get_thread(&self, id: &str) -> anyhow::Result<Option<Thread>> {
        if let Some(t) = self.threads.read().unwrap().get(id).cloned() {
            return Ok(Some(t));
        }

        let fetched = self.engine.get_thread(id)?;
        if let Some(ref t) = fetched {
            self.threads.write().unwrap().insert(id.to_string(), t.clone());
        }
        Ok(fetched)
    }

    /// `None`/empty input returns immediately; otherwise bulk-inserts into
    /// the cache and enqueues a single write-behind transaction.
    pub fn save_threads_batch(&self, threads: Vec<Thread>) {
        if threads.is_empty() {
            return;
        }
        {
            let mut cache = self.threads.write().unwrap();
            for t in &threads {
                cache.insert(t.id.clone(), t.clone());
            }
        }
        let _ = self.tx.send(RepoCommand::SaveThreadsBatch(threads));
    }

    /// Persists a comment directly (not write-behind — comment writes also
    /// need to observe the owning thread's bumped `last_activity_utc`) and
    /// invalidates the thread's cached comment list.
    pub fn save_comment(&self, comment: &Comment) -> anyhow::Result<()> {
        self.engine.save_comment(comment)?;
        self.comments.write().unwrap().remove(&comment.thread_id);
        Ok(())
    }

    /// First call for a thread fetches up to 200 comments from the engine
    /// and caches them; subsequent calls truncate the cached list to `limit`.
    pub fn get_comments_for_thread(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        if let Some(cached) = self.comments.read().unwrap().get(thread_id) {
            return Ok(cached.iter().take(limit).cloned().collect());
        }

        let fetched = self
            .engine
            .get_comments_for_thread(thread_id, INITIAL_COMMENT_FETCH)?;
        self.comments
            .write()
            .unwrap()
            .insert(thread_id.to_string(), fetched.clone());
        Ok(fetched.into_iter().take(limit).collect())
    }

    /// Finds a cached thread by its permalink, for `analyze-ref:` addressing.
    /// Falls back to a full engine scan on a cache miss rather than adding a
    /// dedicated index for a path that's only hit by on-demand re-analysis.
    pub fn find_by_permalink(&self, permalink: &str) -> anyhow::Result<Option<Thread>> {
        if let Some(t) = self
            .threads
            .read()
            .unwrap()
            .values()
            .find(|t| t.permalink == permalink)
            .cloned()
        {
            return Ok(Some(t));
        }
        Ok(self
            .engine
            .get_all_threads()?
            .into_iter()
            .find(|t| t.permalink == permalink))
    }

    /// Prefetches every persisted thread into the cache at startup.
    pub fn warmup(&self) -> anyhow::Result<()> {
        let all = self.engine.get_all_threads()?;
        let mut cache = self.threads.write().unwrap();
        for t in all {
            cache.insert(t.id.clone(), t);
        }
        Ok(())
    }

    /// Drains outstanding writes with a bounded timeout.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(RepoCommand::Shutdown);
        let _ = tokio::time::timeout(Duration::from_secs(10), tokio::task::yield_now()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, RepositoryCache) {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(&dir.path().join("sentinel.db")).unwrap();
        (dir, RepositoryCache::new(Arc::new(engine)))
    }

    fn thread(id: &str) -> Thread {
        Thread {
            id: id.to_string(),
            board: "board".to_string(),
            title: "title".to_string(),
            author: "author".to_string(),
            text: None,
            created_utc: 0,
            permalink: "/r/board/1".to_string(),
            score: 1,
            upvote_ratio: 1.0,
            comment_count: 0,
            last_activity_utc: 0,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn get_thread_hits_cache_without_touching_engine() {
        let (_dir, repo) = repo();
        repo.save_thread(thread("t1"));
        let got = repo.get_thread("t1").unwrap().unwrap();
        assert_eq!(got.id, "t1");
    }

    #[tokio::test]
    async fn batch_save_of_empty_list_is_a_noop() {
        let (_dir, repo) = repo();
        repo.save_threads_batch(vec![]);
        assert!(repo.get_thread("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn comments_truncate_to_requested_limit_on_cache_hit() {
        let (_dir, repo) = repo();
        repo.save_thread(thread("t1"));
        repo.save_comment(&Comment::new("c1", "t1", "t1", "a", "one", 1, 0, 0, 0, None))
            .unwrap();
        repo.save_comment(&Comment::new("c2", "t1", "t1", "a", "two", 1, 1, 0, 0, None))
            .unwrap();

        let first = repo.get_comments_for_thread("t1", 200).unwrap();
        assert_eq!(first.len(), 2);

        let truncated = repo.get_comments_for_thread("t1", 1).unwrap();
        assert_eq!(truncated.len(), 1);
    }
}
