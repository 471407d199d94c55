//! Shared data model: `Thread`, `Comment`, `InvestigationCluster`,
//! `SignificanceScore`.

use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

/// An immutable thread snapshot. New snapshots supersede old ones by id —
/// nothing here is ever mutated in place once read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: String,
    pub board: String,
    pub title: String,
    pub author: String,
    pub text: Option<String>,
    pub created_utc: i64,
    pub permalink: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub comment_count: i64,
    pub last_activity_utc: i64,
    pub image_url: Option<String>,
}

/// An immutable comment snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub thread_id: String,
    /// Equals `thread_id` for a root comment.
    pub parent_id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: i64,
    pub fetched_at: i64,
    pub last_updated_utc: i64,
    /// Guaranteed non-null: constructors substitute an empty `Vec` for an
    /// absent input instead of carrying an `Option`.
    pub image_urls: Vec<String>,
}

impl Comment {
    pub fn new(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        parent_id: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
        score: i64,
        created_utc: i64,
        fetched_at: i64,
        last_updated_utc: i64,
        image_urls: Option<Vec<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            parent_id: parent_id.into(),
            author: author.into(),
            body: body.into(),
            score,
            created_utc,
            fetched_at,
            last_updated_utc,
            image_urls: image_urls.unwrap_or_default(),
        }
    }
}

/// A single entry in a cluster's rolling headline history.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub headline: String,
    pub timestamp: DateTime<Utc>,
}

impl ReportEntry {
    /// `[HH:MM]`-prefixed display form used in the combined-context dossier.
    pub fn display(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M"), self.headline)
    }
}

/// Maximum number of headlines retained per cluster.
pub const REPORT_HISTORY_CAP: usize = 5;

/// A live investigation cluster. Lives only in memory; owned exclusively by
/// the clustering engine / passive monitor.
#[derive(Debug, Clone)]
pub struct InvestigationCluster {
    /// Stable 8-character opaque id.
    pub id: String,
    pub initial_title: String,
    pub active_thread_ids: HashSet<String>,
    pub best_thread_id: String,
    pub best_thread_score: i64,
    pub thread_count: u32,
    pub total_score: i64,
    pub total_comments: i64,
    /// Running EMA of member embeddings. Never renormalized: cosine
    /// similarity is computed on the raw, slowly-drifting vector.
    pub centroid: Vec<f32>,
    pub last_activity: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    /// Bounded ring of past headlines, most recent last.
    pub report_history: VecDeque<ReportEntry>,
    pub reported: bool,
    /// Cached combined-context dossier, reused and incrementally extended
    /// by the report builder across ingest cycles.
    pub cached_context: Option<String>,
}

impl InvestigationCluster {
    /// Seed a brand-new cluster from the thread that failed to match any
    /// existing centroid.
    pub fn seed(id: String, thread: &Thread, embedding: Vec<f32>, now: DateTime<Utc>) -> Self {
        let mut active_thread_ids = HashSet::new();
        active_thread_ids.insert(thread.id.clone());

        Self {
            id,
            initial_title: thread.title.clone(),
            active_thread_ids,
            best_thread_id: thread.id.clone(),
            best_thread_score: thread.score,
            thread_count: 1,
            total_score: thread.score.max(0),
            total_comments: thread.comment_count.max(0),
            centroid: embedding,
            last_activity: now,
            first_seen: now,
            report_history: VecDeque::new(),
            reported: false,
            cached_context: None,
        }
    }

    /// Record a new/updated thread against this cluster.
    pub fn add_update(
        &mut self,
        thread: &Thread,
        delta_score: i64,
        delta_comments: i64,
        embedding: &[f32],
        alpha: f32,
        now: DateTime<Utc>,
    ) {
        self.active_thread_ids.insert(thread.id.clone());
        self.thread_count += 1;

        self.total_score += delta_score.max(0);
        self.total_comments += delta_comments.max(0);

        if delta_comments > 0 || delta_score > 0 {
            self.last_activity = now;
        }

        if thread.score > self.best_thread_score {
            self.best_thread_id = thread.id.clone();
            self.best_thread_score = thread.score;
        }

        ema_update(&mut self.centroid, embedding, alpha);
    }

    /// Merge `other` into `self`; `other` is the one the caller then drops
    /// from the live set.
    pub fn absorb(&mut self, other: &InvestigationCluster) {
        let self_weight = self.thread_count as f32;
        let other_weight = other.thread_count as f32;
        let total_weight = (self_weight + other_weight).max(1.0);

        self.centroid = weighted_mean(&self.centroid, self_weight, &other.centroid, other_weight, total_weight);

        self.active_thread_ids
            .extend(other.active_thread_ids.iter().cloned());
        self.thread_count += other.thread_count;
        self.total_score += other.total_score;
        self.total_comments += other.total_comments;
        self.last_activity = self.last_activity.max(other.last_activity);

        if other.best_thread_score > self.best_thread_score {
            self.best_thread_id = other.best_thread_id.clone();
            self.best_thread_score = other.best_thread_score;
        }
    }

    /// Prepend a new headline to the rolling history, capped at
    /// `REPORT_HISTORY_CAP` entries, and mark the cluster reported.
    pub fn record_report(&mut self, headline: String, now: DateTime<Utc>) {
        self.reported = true;
        self.report_history.push_back(ReportEntry {
            headline,
            timestamp: now,
        });
        while self.report_history.len() > REPORT_HISTORY_CAP {
            self.report_history.pop_front();
        }
    }

    /// Whether this cluster is eligible for TTL expiry at `now`:
    /// un-reported clusters expire off `last_activity`; reported clusters
    /// expire off their most recent headline timestamp instead.
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        if !self.reported {
            return now - self.last_activity > ttl;
        }
        match self.report_history.back() {
            Some(entry) => now - entry.timestamp > ttl,
            None => now - self.last_activity > ttl,
        }
    }
}

fn ema_update(centroid: &mut [f32], embedding: &[f32], alpha: f32) {
    if centroid.len() != embedding.len() {
        return;
    }
    for (c, e) in centroid.iter_mut().zip(embedding.iter()) {
        *c = (1.0 - alpha) * *c + alpha * *e;
    }
}

fn weighted_mean(a: &[f32], wa: f32, b: &[f32], wb: f32, total: f32) -> Vec<f32> {
    if a.len() != b.len() || a.is_empty() {
        return if a.is_empty() { b.to_vec() } else { a.to_vec() };
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x * wa + y * wb) / total)
        .collect()
}

/// A pure value object: a score plus the human-readable reason behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceScore {
    pub score: f64,
    pub reasoning: String,
}

impl SignificanceScore {
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            reasoning: "No data".to_string(),
        }
    }

    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: &str, score: i64, comment_count: i64) -> Thread {
        Thread {
            id: id.to_string(),
            board: "test".to_string(),
            title: "t".to_string(),
            author: "a".to_string(),
            text: None,
            created_utc: 0,
            permalink: "/r/test/1".to_string(),
            score,
            upvote_ratio: 0.9,
            comment_count,
            last_activity_utc: 0,
            image_url: None,
        }
    }

    #[test]
    fn add_update_tracks_thread_count_invariant() {
        let now = Utc::now();
        let mut cluster = InvestigationCluster::seed("abcd1234".into(), &thread("a", 10, 2), vec![1.0, 0.0], now);
        cluster.add_update(&thread("b", 5, 1), 5, 1, &[0.0, 1.0], 0.15, now);
        assert_eq!(cluster.thread_count as usize, cluster.active_thread_ids.len());
    }

    #[test]
    fn absorb_sums_totals() {
        let now = Utc::now();
        let mut a = InvestigationCluster::seed("aaaaaaaa".into(), &thread("a", 10, 2), vec![1.0, 0.0], now);
        let b = InvestigationCluster::seed("bbbbbbbb".into(), &thread("b", 30, 4), vec![0.0, 1.0], now);

        let prev_score = a.total_score;
        let prev_comments = a.total_comments;
        a.absorb(&b);

        assert_eq!(a.total_score, prev_score + b.total_score);
        assert_eq!(a.total_comments, prev_comments + b.total_comments);
        assert_eq!(a.best_thread_id, "b");
    }

    #[test]
    fn report_history_caps_at_five() {
        let now = Utc::now();
        let mut cluster = InvestigationCluster::seed("abcd1234".into(), &thread("a", 10, 2), vec![1.0], now);
        for i in 0..10 {
            cluster.record_report(format!("headline {i}"), now);
        }
        assert_eq!(cluster.report_history.len(), REPORT_HISTORY_CAP);
        assert_eq!(cluster.report_history.back().unwrap().headline, "headline 9");
    }

    #[test]
    fn significance_zero_constant() {
        let z = SignificanceScore::zero();
        assert_eq!(z.score, 0.0);
        assert!(!z.meets_threshold(0.001));
    }
}
