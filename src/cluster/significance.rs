//! Pure significance scoring: how loudly is this cluster worth surfacing
//! right now, given what's accumulated in it so far.

use chrono::{DateTime, Utc};

use crate::model::{InvestigationCluster, SignificanceScore};

/// Recency decays linearly to 0 over this many minutes of inactivity,
/// matching the default investigation TTL.
const RECENCY_DECAY_MINUTES: f64 = 60.0;

/// Flat per-prior-report penalty: a cluster that already fired N headlines
/// needs proportionally more fresh signal to fire again.
const REPEAT_REPORT_PENALTY: f64 = 0.6;

/// `compute` is monotone increasing in `thread_count`, `total_score`, and
/// `total_comments`: increasing any one of them, holding the others and
/// `now` fixed, never decreases the returned score.
pub fn compute(cluster: &InvestigationCluster, now: DateTime<Utc>) -> SignificanceScore {
    let thread_term = (1.0 + cluster.thread_count as f64).ln();
    let score_term = (1.0 + cluster.total_score.max(0) as f64).ln();
    let comment_term = (1.0 + cluster.total_comments.max(0) as f64).ln();

    let minutes_idle = (now - cluster.last_activity).num_seconds().max(0) as f64 / 60.0;
    let recency = (1.0 - minutes_idle / RECENCY_DECAY_MINUTES).clamp(0.0, 1.0);

    let base = thread_term + score_term + comment_term;
    let recency_bonus = recency * 1.5;
    let repeat_penalty = REPEAT_REPORT_PENALTY * cluster.report_history.len() as f64;

    let score = (base + recency_bonus - repeat_penalty).max(0.0);

    let mut clauses = Vec::new();
    clauses.push(format!(
        "{} active thread{}",
        cluster.thread_count,
        if cluster.thread_count == 1 { "" } else { "s" }
    ));
    clauses.push(format!("{} combined score", cluster.total_score));
    clauses.push(format!("{} combined comments", cluster.total_comments));
    clauses.push(format!("updated {}m ago", minutes_idle.round() as i64));
    if !cluster.report_history.is_empty() {
        clauses.push(format!("{} prior report(s)", cluster.report_history.len()));
    }

    SignificanceScore {
        score,
        reasoning: clauses.join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Thread;

    fn thread(id: &str, score: i64, comments: i64) -> Thread {
        Thread {
            id: id.to_string(),
            board: "b".to_string(),
            title: "t".to_string(),
            author: "a".to_string(),
            text: None,
            created_utc: 0,
            permalink: "/r/b/1".to_string(),
            score,
            upvote_ratio: 1.0,
            comment_count: comments,
            last_activity_utc: 0,
            image_url: None,
        }
    }

    #[test]
    fn reasoning_is_never_empty() {
        let now = Utc::now();
        let cluster = InvestigationCluster::seed("c1".into(), &thread("t1", 10, 2), vec![1.0], now);
        let result = compute(&cluster, now);
        assert!(!result.reasoning.is_empty());
    }

    #[test]
    fn increasing_total_score_never_decreases_significance() {
        let now = Utc::now();
        let low = InvestigationCluster::seed("c1".into(), &thread("t1", 10, 2), vec![1.0], now);
        let mut high = low.clone();
        high.total_score += 500;

        assert!(compute(&high, now).score >= compute(&low, now).score);
    }

    #[test]
    fn increasing_thread_count_never_decreases_significance() {
        let now = Utc::now();
        let low = InvestigationCluster::seed("c1".into(), &thread("t1", 10, 2), vec![1.0], now);
        let mut high = low.clone();
        high.thread_count += 3;

        assert!(compute(&high, now).score >= compute(&low, now).score);
    }

    #[test]
    fn increasing_total_comments_never_decreases_significance() {
        let now = Utc::now();
        let low = InvestigationCluster::seed("c1".into(), &thread("t1", 10, 2), vec![1.0], now);
        let mut high = low.clone();
        high.total_comments += 50;

        assert!(compute(&high, now).score >= compute(&low, now).score);
    }

    #[test]
    fn stale_cluster_scores_lower_than_fresh_one() {
        let now = Utc::now();
        let fresh = InvestigationCluster::seed("c1".into(), &thread("t1", 10, 2), vec![1.0], now);
        let mut stale = fresh.clone();
        stale.last_activity = now - chrono::Duration::minutes(120);

        assert!(compute(&stale, now).score < compute(&fresh, now).score);
    }
}
