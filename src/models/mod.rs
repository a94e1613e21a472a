use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized model blobs carry this tag; loading any other version is refused.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// One raw rating event from the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: String,
    pub item_id: String,
    pub value: f32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Rating {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>, value: f32) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            value,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Aggregate outcome of one ingestion batch. Bad records are counted, not fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestResult {
    pub accepted: usize,
    pub rejected: usize,
    /// Re-ratings of an already-seen (user, item) pair; last value wins.
    pub overwritten: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStats {
    pub count: u32,
    pub sum: f64,
    pub mean: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub count: u32,
    pub sum: f64,
    pub mean: f32,
    /// Item indices this user has rated, ascending. count == rated_items.len().
    pub rated_items: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub converged: bool,
    pub iterations: usize,
    pub rmse: f64,
    pub mae: f64,
    pub users: usize,
    pub items: usize,
    pub ratings_used: usize,
    pub ingest: IngestResult,
    pub sparsity: f64,
    pub duration_ms: u64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: String,
    pub predicted_rating: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarItem {
    pub item_id: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularItem {
    pub item_id: String,
    pub mean_rating: f32,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub user_id: String,
    pub item_id: String,
    pub predicted_rating: f32,
    pub confidence: f32,
}

/// One fully-trained, immutable model. Created by training, published by the
/// registry, and only ever replaced wholesale; queries never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub rank: usize,
    pub user_ids: Vec<String>,
    pub item_ids: Vec<String>,
    pub user_factors: Array2<f32>,
    pub item_factors: Array2<f32>,
    pub global_mean: f32,
    pub sparsity: f64,
    pub per_item_stats: Vec<ItemStats>,
    pub per_user_stats: Vec<UserStats>,
    pub converged: bool,
    pub trained_at: DateTime<Utc>,
    #[serde(skip)]
    user_lookup: HashMap<String, usize>,
    #[serde(skip)]
    item_lookup: HashMap<String, usize>,
}

impl ModelSnapshot {
    pub fn new(
        rank: usize,
        user_ids: Vec<String>,
        item_ids: Vec<String>,
        user_factors: Array2<f32>,
        item_factors: Array2<f32>,
        global_mean: f32,
        sparsity: f64,
        per_item_stats: Vec<ItemStats>,
        per_user_stats: Vec<UserStats>,
        converged: bool,
        trained_at: DateTime<Utc>,
    ) -> Self {
        let mut snapshot = Self {
            format_version: MODEL_FORMAT_VERSION,
            rank,
            user_ids,
            item_ids,
            user_factors,
            item_factors,
            global_mean,
            sparsity,
            per_item_stats,
            per_user_stats,
            converged,
            trained_at,
            user_lookup: HashMap::new(),
            item_lookup: HashMap::new(),
        };
        snapshot.rebuild_lookups();
        snapshot
    }

    /// Rebuild the id -> index maps from the ordered id lists. Must be called
    /// after deserialization, since the maps are not part of the blob.
    pub fn rebuild_lookups(&mut self) {
        self.user_lookup = self
            .user_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        self.item_lookup = self
            .item_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
    }

    pub fn user_index(&self, user_id: &str) -> Option<usize> {
        self.user_lookup.get(user_id).copied()
    }

    pub fn item_index(&self, item_id: &str) -> Option<usize> {
        self.item_lookup.get(item_id).copied()
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    /// Raw (unclamped) factor dot product for a known (user, item) index pair.
    pub fn score(&self, user_idx: usize, item_idx: usize) -> f32 {
        self.user_factors
            .row(user_idx)
            .dot(&self.item_factors.row(item_idx))
    }

    /// Structural invariants every snapshot must satisfy, re-checked when a
    /// blob comes back from disk.
    pub fn check_consistency(&self) -> Result<(), String> {
        let (u_rows, u_cols) = self.user_factors.dim();
        let (i_rows, i_cols) = self.item_factors.dim();

        if u_cols != self.rank || i_cols != self.rank {
            return Err(format!(
                "factor rank mismatch: rank {} vs factors {}x{} / {}x{}",
                self.rank, u_rows, u_cols, i_rows, i_cols
            ));
        }
        if u_rows != self.user_ids.len() {
            return Err(format!(
                "user factor rows {} do not match {} user ids",
                u_rows,
                self.user_ids.len()
            ));
        }
        if i_rows != self.item_ids.len() {
            return Err(format!(
                "item factor rows {} do not match {} item ids",
                i_rows,
                self.item_ids.len()
            ));
        }
        if self.per_user_stats.len() != self.user_ids.len() {
            return Err("per-user stats misaligned with user ids".to_string());
        }
        if self.per_item_stats.len() != self.item_ids.len() {
            return Err("per-item stats misaligned with item ids".to_string());
        }
        for (idx, stats) in self.per_user_stats.iter().enumerate() {
            if stats.count as usize != stats.rated_items.len() {
                return Err(format!(
                    "user {} rating count {} disagrees with {} rated items",
                    idx,
                    stats.count,
                    stats.rated_items.len()
                ));
            }
        }
        for value in self.user_factors.iter().chain(self.item_factors.iter()) {
            if !value.is_finite() || *value < 0.0 {
                return Err("factor matrices must be finite and non-negative".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn tiny_snapshot() -> ModelSnapshot {
        ModelSnapshot::new(
            2,
            vec!["u1".to_string(), "u2".to_string()],
            vec!["i1".to_string()],
            arr2(&[[0.5, 0.5], [1.0, 0.0]]),
            arr2(&[[2.0, 4.0]]),
            3.0,
            0.0,
            vec![ItemStats { count: 2, sum: 6.0, mean: 3.0 }],
            vec![
                UserStats { count: 1, sum: 3.0, mean: 3.0, rated_items: vec![0] },
                UserStats { count: 1, sum: 3.0, mean: 3.0, rated_items: vec![0] },
            ],
            true,
            Utc::now(),
        )
    }

    #[test]
    fn test_lookups_match_id_order() {
        let snapshot = tiny_snapshot();
        assert_eq!(snapshot.user_index("u1"), Some(0));
        assert_eq!(snapshot.user_index("u2"), Some(1));
        assert_eq!(snapshot.item_index("i1"), Some(0));
        assert_eq!(snapshot.user_index("ghost"), None);
    }

    #[test]
    fn test_score_is_dot_product() {
        let snapshot = tiny_snapshot();
        assert!((snapshot.score(0, 0) - 3.0).abs() < 1e-6);
        assert!((snapshot.score(1, 0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_consistency_rejects_negative_factors() {
        let mut snapshot = tiny_snapshot();
        assert!(snapshot.check_consistency().is_ok());
        snapshot.user_factors[[0, 0]] = -1.0;
        assert!(snapshot.check_consistency().is_err());
    }

    #[test]
    fn test_consistency_rejects_count_mismatch() {
        let mut snapshot = tiny_snapshot();
        snapshot.per_user_stats[0].rated_items.clear();
        assert!(snapshot.check_consistency().is_err());
    }
}
