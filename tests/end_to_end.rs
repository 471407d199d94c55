//! End-to-end scenarios driven entirely in-process: a test-mode scraper, a
//! temp-file storage engine, and a fake LLM gateway stand in for the real
//! board source and inference server so the full ingest → cluster →
//! significance → headline pipeline runs without any network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentinel::config::Config;
use sentinel::events::{Bus, Event};
use sentinel::llm::{ChatStream, LlmGateway, StreamEvent};
use sentinel::monitor::Monitor;
use sentinel::scrape::testmode::TestModeScraper;
use sentinel::storage::{RepositoryCache, StorageEngine};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Always accepts and echoes a fixed headline; every `embed` call returns the
/// same vector so synthetic threads from one run cluster together.
struct FakeGateway {
    embed_calls: AtomicUsize,
}

impl FakeGateway {
    fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl LlmGateway for FakeGateway {
    async fn chat(&self, _scope: &str, _message: &str) -> anyhow::Result<ChatStream> {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        tx.send(StreamEvent::Complete("VERDICT: ACCEPT\nREPORT: Synthetic market event".to_string()))
            .await
            .unwrap();
        Ok(ChatStream::new(rx, cancel))
    }

    async fn translate(&self, text: &str, _source_lang: &str, _target_lang: &str) -> anyhow::Result<ChatStream> {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        tx.send(StreamEvent::Complete(text.to_string())).await.unwrap();
        Ok(ChatStream::new(rx, cancel))
    }

    async fn vision(&self, _image_url: &str) -> String {
        "no image analysis available".to_string()
    }

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.1, 0.2, 0.3])
    }
}

fn test_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.data_dir = data_dir.to_path_buf();
    config.reddit.subreddits = vec!["testboard".to_string()];
    config.reddit.update_interval_seconds = 1;
    config.reddit.significance_threshold = 0.0;
    config.headlines.enabled = true;
    config
}

/// Drives three ingest cycles through the test-mode scraper (which is
/// silent for the first two calls and emits two synthetic threads on the
/// third, per its documented warm-up contract) and expects a headline to
/// have been streamed onto the bus once significance is met.
#[tokio::test]
async fn ingest_cycles_eventually_stream_a_headline() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let storage = Arc::new(StorageEngine::open(&config.db_path()).unwrap());
    let repository = Arc::new(RepositoryCache::new(storage.clone()));
    repository.warmup().unwrap();

    let scraper = Arc::new(TestModeScraper::new(repository.clone()));
    let llm: Arc<dyn LlmGateway> = Arc::new(FakeGateway::new());
    let bus = Bus::default();
    let mut bus_rx = bus.subscribe();

    let monitor = Arc::new(Monitor::new(config, repository, storage, scraper, llm, bus));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let monitor = monitor.clone();
        let shutdown = shutdown.clone();
        async move { monitor.run(shutdown).await }
    });

    let mut saw_headline = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_secs(1), bus_rx.recv()).await {
            Ok(Ok(Event::AgentStreamEnd { full_text })) => {
                assert!(full_text.contains("Synthetic market event"));
                saw_headline = true;
                break;
            }
            _ => continue,
        }
    }

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;

    assert!(saw_headline, "expected a headline to stream within the deadline");
}

/// A thread whose `lastActivityUtc` is older than the retention window is
/// removed along with its full comment subtree by the recurring cleanup
/// cycle (spec.md §8 scenario 2, driven here through the public storage API
/// rather than the private recursive worklist directly).
#[tokio::test]
async fn cascade_cleanup_removes_stale_thread_and_its_comments() {
    use sentinel::model::{Comment, Thread};

    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open(&dir.path().join("sentinel.db")).unwrap();

    // Comments are saved before the owning thread row exists: `save_comment`
    // only inserts the comment row and, separately, bumps the thread's
    // activity timestamp if a thread with that id is already present — with
    // none present yet that bump is a no-op, so it can't mask the thread's
    // eventual (stale) `last_activity_utc` once it's inserted below.
    engine
        .save_comment(&Comment::new("c1", "stale-thread", "stale-thread", "a", "root", 1, 0, 0, 0, None))
        .unwrap();
    engine
        .save_comment(&Comment::new("c2", "stale-thread", "c1", "b", "reply", 1, 0, 0, 0, None))
        .unwrap();

    let stale = Thread {
        id: "stale-thread".to_string(),
        board: "testboard".to_string(),
        title: "old news".to_string(),
        author: "someone".to_string(),
        text: None,
        created_utc: 0,
        permalink: "/r/testboard/old".to_string(),
        score: 1,
        upvote_ratio: 1.0,
        comment_count: 2,
        last_activity_utc: 0,
        image_url: None,
    };
    engine.save_thread(&stale).unwrap();

    let deleted = engine.cleanup_old_threads(1).unwrap();
    assert_eq!(deleted, 1);
    assert!(engine.get_thread("stale-thread").unwrap().is_none());
    assert!(engine.get_comments_for_thread("stale-thread", 100).unwrap().is_empty());
}
