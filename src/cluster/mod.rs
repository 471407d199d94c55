//! In-memory clustering engine: groups incoming threads into investigation
//! clusters by embedding similarity, periodically merges near-duplicate
//! clusters, and expires ones that have gone quiet.

pub mod graph_view;
pub mod significance;
pub mod vector;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::{InvestigationCluster, Thread};

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub alpha: f32,
    pub similarity_threshold: f32,
    pub merge_threshold: f32,
    pub investigation_ttl: chrono::Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            alpha: 0.15,
            similarity_threshold: 0.55,
            merge_threshold: 0.80,
            investigation_ttl: chrono::Duration::minutes(60),
        }
    }
}

/// Owns every live cluster, keyed by its opaque id. `order` tracks
/// insertion order so iteration (and therefore test assertions and report
/// ordering) is deterministic rather than HashMap-random.
pub struct ClusteringEngine {
    config: ClusterConfig,
    clusters: HashMap<String, InvestigationCluster>,
    order: Vec<String>,
}

impl ClusteringEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            clusters: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn clusters(&self) -> impl Iterator<Item = &InvestigationCluster> {
        self.order.iter().filter_map(|id| self.clusters.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&InvestigationCluster> {
        self.clusters.get(id)
    }

    /// Finds the live cluster (if any) that has absorbed the thread with
    /// the given id, for `analyze-ref:` addressing by permalink.
    pub fn find_by_thread_id(&self, thread_id: &str) -> Option<&InvestigationCluster> {
        self.clusters().find(|c| c.active_thread_ids.contains(thread_id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut InvestigationCluster> {
        self.clusters.get_mut(id)
    }

    /// Match `thread`/`embedding` against every live cluster's centroid;
    /// join the best match above `similarity_threshold`, else seed a new
    /// cluster. Returns the id of the cluster the thread ended up in.
    pub fn ingest(
        &mut self,
        thread: &Thread,
        embedding: Vec<f32>,
        delta_score: i64,
        delta_comments: i64,
        now: DateTime<Utc>,
    ) -> String {
        let best = self
            .clusters
            .iter()
            .map(|(id, c)| (id.clone(), vector::cosine_similarity(&c.centroid, &embedding)))
            .filter(|(_, sim)| *sim >= self.config.similarity_threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((id, _)) = best {
            let cluster = self.clusters.get_mut(&id).expect("matched id exists");
            cluster.add_update(thread, delta_score, delta_comments, &embedding, self.config.alpha, now);
            id
        } else {
            let id = new_cluster_id();
            let cluster = InvestigationCluster::seed(id.clone(), thread, embedding, now);
            self.clusters.insert(id.clone(), cluster);
            self.order.push(id.clone());
            id
        }
    }

    /// Merge any pair of clusters whose centroids exceed `merge_threshold`.
    /// The smaller cluster (by thread_count) is absorbed into the larger;
    /// ties are broken by oldest `last_activity` surviving. Runs to a fixed
    /// point: repeated passes until a pass finds no merge.
    pub fn merge_pass(&mut self) {
        loop {
            let ids: Vec<String> = self.order.clone();
            let mut merge_target = None;

            'outer: for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    let (a, b) = (&ids[i], &ids[j]);
                    let (Some(ca), Some(cb)) = (self.clusters.get(a), self.clusters.get(b)) else {
                        continue;
                    };
                    let sim = vector::cosine_similarity(&ca.centroid, &cb.centroid);
                    if sim >= self.config.merge_threshold {
                        let (keep, drop) = if ca.thread_count != cb.thread_count {
                            if ca.thread_count > cb.thread_count { (a, b) } else { (b, a) }
                        } else if ca.last_activity <= cb.last_activity {
                            (a, b)
                        } else {
                            (b, a)
                        };
                        merge_target = Some((keep.clone(), drop.clone()));
                        break 'outer;
                    }
                }
            }

            let Some((keep_id, drop_id)) = merge_target else {
                break;
            };

            let dropped = self.clusters.remove(&drop_id).expect("drop id exists");
            if let Some(keeper) = self.clusters.get_mut(&keep_id) {
                keeper.absorb(&dropped);
            }
            self.order.retain(|id| id != &drop_id);
        }
    }

    /// Removes every expired cluster, returning the ids dropped.
    pub fn expire_stale(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                self.clusters
                    .get(*id)
                    .map(|c| c.is_expired(self.config.investigation_ttl, now))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        for id in &expired {
            self.clusters.remove(id);
        }
        self.order.retain(|id| !expired.contains(id));
        expired
    }
}

fn new_cluster_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..8)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: &str, score: i64) -> Thread {
        Thread {
            id: id.to_string(),
            board: "b".to_string(),
            title: "t".to_string(),
            author: "a".to_string(),
            text: None,
            created_utc: 0,
            permalink: format!("/r/b/{id}"),
            score,
            upvote_ratio: 1.0,
            comment_count: 0,
            last_activity_utc: 0,
            image_url: None,
        }
    }

    #[test]
    fn ingest_joins_similar_thread_into_existing_cluster() {
        let mut engine = ClusteringEngine::new(ClusterConfig::default());
        let now = Utc::now();

        let id1 = engine.ingest(&thread("t1", 10), vec![1.0, 0.0, 0.0], 10, 0, now);
        let id2 = engine.ingest(&thread("t2", 20), vec![0.99, 0.01, 0.0], 20, 0, now);

        assert_eq!(id1, id2);
        assert_eq!(engine.get(&id1).unwrap().thread_count, 2);
    }

    #[test]
    fn ingest_seeds_new_cluster_for_dissimilar_thread() {
        let mut engine = ClusteringEngine::new(ClusterConfig::default());
        let now = Utc::now();

        let id1 = engine.ingest(&thread("t1", 10), vec![1.0, 0.0, 0.0], 10, 0, now);
        let id2 = engine.ingest(&thread("t2", 20), vec![0.0, 1.0, 0.0], 20, 0, now);

        assert_ne!(id1, id2);
        assert_eq!(engine.clusters().count(), 2);
    }

    #[test]
    fn merge_pass_combines_near_duplicate_clusters() {
        let mut config = ClusterConfig::default();
        config.similarity_threshold = 0.999; // force separate seeding
        config.merge_threshold = 0.5;
        let mut engine = ClusteringEngine::new(config);
        let now = Utc::now();

        engine.ingest(&thread("t1", 10), vec![1.0, 0.0], 10, 0, now);
        engine.ingest(&thread("t2", 20), vec![0.9, 0.1], 20, 0, now);
        assert_eq!(engine.clusters().count(), 2);

        engine.merge_pass();
        assert_eq!(engine.clusters().count(), 1);
        assert_eq!(engine.clusters().next().unwrap().thread_count, 2);
    }

    #[test]
    fn expire_stale_removes_inactive_clusters() {
        let mut engine = ClusteringEngine::new(ClusterConfig::default());
        let now = Utc::now();
        engine.ingest(&thread("t1", 10), vec![1.0, 0.0], 10, 0, now - chrono::Duration::minutes(120));

        let expired = engine.expire_stale(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(engine.clusters().count(), 0);
    }
}
