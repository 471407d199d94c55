//! Passive Monitor Service: the orchestrator tying the scraper, clustering
//! engine, significance scorer, report builder, and event bus into two
//! recurring cycles.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::cluster::{significance, ClusterConfig, ClusteringEngine};
use crate::config::Config;
use crate::events::{Bus, Event};
use crate::llm::LlmGateway;
use crate::model::Thread;
use crate::report;
use crate::scrape::Scraper;
use crate::storage::{RepositoryCache, StorageEngine};

const CLEANUP_INTERVAL_SECS: u64 = 10 * 60;
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

/// Snapshot of a thread's score/comment count the last time it was
/// ingested, used to compute the delta `ClusteringEngine::ingest` wants
/// rather than re-deriving it from storage on every cycle.
#[derive(Clone, Copy, Default)]
struct LastSeen {
    score: i64,
    comments: i64,
}

pub struct Monitor {
    config: Config,
    engine: Mutex<ClusteringEngine>,
    repository: Arc<RepositoryCache>,
    storage: Arc<StorageEngine>,
    scraper: Arc<dyn Scraper>,
    llm: RwLock<Arc<dyn LlmGateway>>,
    bus: Bus,
    last_seen: Mutex<HashMap<String, LastSeen>>,
}

impl Monitor {
    pub fn new(
        config: Config,
        repository: Arc<RepositoryCache>,
        storage: Arc<StorageEngine>,
        scraper: Arc<dyn Scraper>,
        llm: Arc<dyn LlmGateway>,
        bus: Bus,
    ) -> Self {
        let cluster_config = ClusterConfig {
            alpha: 0.15,
            similarity_threshold: config.reddit.similarity_threshold,
            merge_threshold: 0.80,
            investigation_ttl: chrono::Duration::minutes(config.reddit.investigation_ttl_minutes as i64),
        };

        Self {
            config,
            engine: Mutex::new(ClusteringEngine::new(cluster_config)),
            repository,
            storage,
            scraper,
            llm: RwLock::new(llm),
            bus,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Runs both recurring cycles and the on-demand trigger listener until
    /// `shutdown` is cancelled, then drains in-flight work for a bounded
    /// grace period before returning.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let ingest_handle = {
            let monitor = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { monitor.run_ingest_loop(shutdown).await })
        };
        let cleanup_handle = {
            let monitor = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { monitor.run_cleanup_loop(shutdown).await })
        };
        let trigger_handle = {
            let monitor = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { monitor.run_trigger_loop(shutdown).await })
        };

        shutdown.cancelled().await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
            let _ = ingest_handle.await;
            let _ = cleanup_handle.await;
            let _ = trigger_handle.await;
        })
        .await;
    }

    /// Listens for `TriggerAgentAnalysis` events (e.g. from the TUI or an
    /// external caller publishing onto the bus) and re-runs the headline
    /// attempt for the referenced cluster on demand.
    async fn run_trigger_loop(&self, shutdown: CancellationToken) {
        let mut rx = self.bus.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                event = rx.recv() => {
                    match event {
                        Ok(Event::TriggerAgentAnalysis { prompt }) => {
                            self.handle_trigger_analysis(&prompt).await;
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }
    }

    async fn run_ingest_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            self.config.reddit.update_interval_seconds.max(1),
        ));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {
                    if let Err(e) = self.ingest_cycle().await {
                        tracing::error!("ingest cycle failed: {e:#}");
                        self.bus.publish(Event::error(format!("ingest cycle failed: {e}")));
                    }
                }
            }
        }
    }

    async fn run_cleanup_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {
                    match self.storage.cleanup_old_threads(self.config.reddit.data_retention().as_secs() as i64) {
                        Ok(count) => self.bus.publish(Event::log(format!("cleanup removed {count} stale threads"))),
                        Err(e) => {
                            tracing::error!("cleanup cycle failed: {e:#}");
                            self.bus.publish(Event::error(format!("cleanup cycle failed: {e}")));
                        }
                    }
                }
            }
        }
    }

    /// One pass: scrape every configured board, embed and cluster whatever
    /// changed, merge near-duplicates, expire stale clusters, then check
    /// every live cluster's significance and attempt a headline.
    async fn ingest_cycle(&self) -> anyhow::Result<()> {
        let mut visited = std::collections::HashSet::new();
        for board in &self.config.reddit.subreddits {
            match self.scraper.scan_subreddit(board).await {
                Ok(stats) => visited.extend(stats.visited),
                Err(e) => tracing::warn!("scan_subreddit({board}) failed: {e:#}"),
            }
        }

        let now = chrono::Utc::now();
        for thread_id in &visited {
            if let Some(thread) = self.repository.get_thread(thread_id)? {
                self.ingest_thread(&thread, now).await;
            }
        }

        {
            let mut engine = self.engine.lock().await;
            engine.merge_pass();
            let expired = engine.expire_stale(now);
            if !expired.is_empty() {
                tracing::debug!("expired {} stale clusters", expired.len());
            }
        }

        self.check_significance(now).await;
        Ok(())
    }

    async fn ingest_thread(&self, thread: &Thread, now: chrono::DateTime<chrono::Utc>) {
        // Pulls and persists the thread's current comments so the report
        // builder's `getCommentsForThread` lookup has something to serve;
        // a fetch failure just leaves last cycle's comments in place.
        if let Err(e) = self.scraper.fetch_thread_context(&thread.permalink).await {
            tracing::debug!("fetch_thread_context({}) failed: {e:#}", thread.permalink);
        }

        let text_for_embedding = format!("{} {}", thread.title, thread.text.clone().unwrap_or_default());
        let embedding = {
            let llm = self.llm.read().await;
            match llm.embed(&text_for_embedding).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("embed failed for thread {}: {e:#}", thread.id);
                    return;
                }
            }
        };

        let (delta_score, delta_comments) = {
            let mut last_seen = self.last_seen.lock().await;
            let prev = last_seen.entry(thread.id.clone()).or_default();
            let delta_score = thread.score - prev.score;
            let delta_comments = thread.comment_count - prev.comments;
            *prev = LastSeen {
                score: thread.score,
                comments: thread.comment_count,
            };
            (delta_score, delta_comments)
        };

        let mut engine = self.engine.lock().await;
        engine.ingest(thread, embedding, delta_score, delta_comments, now);
    }

    async fn check_significance(&self, now: chrono::DateTime<chrono::Utc>) {
        let candidates: Vec<String> = {
            let engine = self.engine.lock().await;
            engine
                .clusters()
                .filter(|c| !c.reported)
                .filter(|c| {
                    significance::compute(c, now).meets_threshold(self.config.reddit.significance_threshold)
                })
                .map(|c| c.id.clone())
                .collect()
        };

        for cluster_id in candidates {
            if !self.config.headlines.enabled {
                continue;
            }
            if let Err(e) = self.attempt_headline(&cluster_id).await {
                tracing::warn!("headline attempt failed for cluster {cluster_id}: {e:#}");
            }
        }
    }

    /// Builds the dossier, asks the LLM for a verdict, and on `ACCEPT`
    /// streams the accepted headline word-by-word over the bus. The full
    /// response is buffered via `ChatStream::collect` before any decision
    /// is made — a rejected headline must emit no stream events at all, so
    /// streaming can't begin until acceptance is already known.
    async fn attempt_headline(&self, cluster_id: &str) -> anyhow::Result<()> {
        let (report_data, combined_context, history, cached_context) = {
            let engine = self.engine.lock().await;
            let cluster = engine
                .get(cluster_id)
                .ok_or_else(|| anyhow::anyhow!("cluster {cluster_id} vanished before reporting"))?;
            let report_data = report::build_report_data(cluster, &self.repository);
            let combined = report::build_combined_context(cluster.cached_context.as_deref(), &report_data);
            (
                report_data,
                combined,
                cluster.report_history.iter().cloned().collect::<Vec<_>>(),
                cluster.cached_context.clone(),
            )
        };
        let _ = cached_context;

        let prompt = report::build_headline_prompt(
            &history,
            &combined_context,
            self.config.headlines.unrestricted(),
            &self.config.headlines.topics,
        );

        let response = {
            let llm = self.llm.read().await;
            let stream = llm.chat(cluster_id, &prompt).await?;
            stream.collect().await?
        };

        {
            let mut engine = self.engine.lock().await;
            if let Some(cluster) = engine.get_mut(cluster_id) {
                cluster.cached_context = Some(combined_context);
            }
        }

        if !report::is_accepted(&response) {
            tracing::debug!("cluster {cluster_id} headline rejected");
            return Ok(());
        }

        let headline = report::extract_headline(&response);
        if headline.is_empty() {
            tracing::debug!("cluster {cluster_id} accepted with no usable headline");
            return Ok(());
        }

        {
            let mut engine = self.engine.lock().await;
            if let Some(cluster) = engine.get_mut(cluster_id) {
                cluster.record_report(headline.clone(), chrono::Utc::now());
            }
        }

        self.stream_headline(cluster_id, &headline);
        let _ = report_data;
        Ok(())
    }

    /// Synthesizes the UI-facing token stream from an already-accepted,
    /// already-buffered headline by splitting on whitespace — the model
    /// call itself was not streamed to the UI since acceptance wasn't yet
    /// known, per the "no stream events on rejection" contract.
    fn stream_headline(&self, cluster_id: &str, headline: &str) {
        self.bus.publish(Event::AgentStatus { status: String::new() });
        self.bus.publish(Event::AgentStreamStart {
            source: Some(cluster_id.to_string()),
            css_class: None,
        });
        for word in headline.split_whitespace() {
            self.bus.publish(Event::AgentToken {
                token: format!("{word} "),
            });
        }
        self.bus.publish(Event::AgentStreamEnd {
            full_text: headline.to_string(),
        });
    }

    /// Returns the cached dossier context for an investigation, if its
    /// cluster is still live.
    pub async fn get_investigation_context(&self, cluster_id: &str) -> Option<String> {
        let engine = self.engine.lock().await;
        engine.get(cluster_id).and_then(|c| c.cached_context.clone())
    }

    /// Handles an on-demand re-analysis request addressed either by
    /// `ID:{8-char cluster id}` or by a thread's permalink, per the
    /// `analyze-ref:` contract.
    pub async fn handle_trigger_analysis(&self, prompt: &str) {
        let Some(rest) = prompt.strip_prefix("analyze-ref:") else {
            return;
        };

        let cluster_id = if let Some(id) = rest.strip_prefix("ID:") {
            Some(id.to_string())
        } else {
            match self.repository.find_by_permalink(rest) {
                Ok(Some(thread)) => {
                    let engine = self.engine.lock().await;
                    engine.find_by_thread_id(&thread.id).map(|c| c.id.clone())
                }
                Ok(None) => {
                    tracing::debug!("analyze-ref permalink {rest} matches no known thread");
                    None
                }
                Err(e) => {
                    tracing::warn!("analyze-ref permalink lookup failed: {e:#}");
                    None
                }
            }
        };

        let Some(cluster_id) = cluster_id else {
            tracing::debug!("analyze-ref {rest} resolved to no live cluster");
            return;
        };
        if let Err(e) = self.attempt_headline(&cluster_id).await {
            tracing::warn!("on-demand re-analysis failed for {cluster_id}: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_seen_defaults_to_zero() {
        let seen = LastSeen::default();
        assert_eq!(seen.score, 0);
        assert_eq!(seen.comments, 0);
    }
}
