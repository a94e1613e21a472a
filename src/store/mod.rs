use crate::models::{IngestResult, ItemStats, Rating, UserStats};
use crate::utils::validation;
use std::collections::HashMap;
use tracing::debug;

/// Accumulates raw rating events into a deduplicated sparse matrix.
///
/// Users and items are interned in first-seen order, so identical input
/// sequences always produce identical index assignments. A later rating for
/// an already-seen (user, item) pair overwrites the earlier value.
pub struct RatingStore {
    min_value: f32,
    max_value: f32,
    user_ids: Vec<String>,
    user_index: HashMap<String, usize>,
    item_ids: Vec<String>,
    item_index: HashMap<String, usize>,
    values: HashMap<(usize, usize), f32>,
}

impl RatingStore {
    pub fn new(min_value: f32, max_value: f32) -> Self {
        Self {
            min_value,
            max_value,
            user_ids: Vec::new(),
            user_index: HashMap::new(),
            item_ids: Vec::new(),
            item_index: HashMap::new(),
            values: HashMap::new(),
        }
    }

    pub fn ingest(&mut self, ratings: &[Rating]) -> IngestResult {
        let mut result = IngestResult::default();

        for rating in ratings {
            if let Err(reason) = validation::validate_rating(rating, self.min_value, self.max_value)
            {
                debug!(
                    user = %rating.user_id,
                    item = %rating.item_id,
                    value = rating.value,
                    %reason,
                    "dropping rating"
                );
                result.rejected += 1;
                continue;
            }

            let user_idx = intern(&mut self.user_ids, &mut self.user_index, &rating.user_id);
            let item_idx = intern(&mut self.item_ids, &mut self.item_index, &rating.item_id);

            if self.values.insert((user_idx, item_idx), rating.value).is_some() {
                result.overwritten += 1;
            }
            result.accepted += 1;
        }

        result
    }

    /// Number of distinct (user, item) pairs currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }

    pub fn item_count(&self) -> usize {
        self.item_ids.len()
    }

    /// Freeze the current state into an immutable matrix for training.
    pub fn snapshot(&self) -> RatingMatrix {
        let n_users = self.user_ids.len();
        let n_items = self.item_ids.len();

        let mut by_user: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n_users];
        let mut by_item: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n_items];

        for (&(user_idx, item_idx), &value) in &self.values {
            by_user[user_idx].push((item_idx, value));
            by_item[item_idx].push((user_idx, value));
        }
        // The backing map iterates in arbitrary order; sorted rows restore
        // a deterministic traversal for training and stats.
        for row in &mut by_user {
            row.sort_unstable_by_key(|&(idx, _)| idx);
        }
        for row in &mut by_item {
            row.sort_unstable_by_key(|&(idx, _)| idx);
        }

        RatingMatrix {
            user_ids: self.user_ids.clone(),
            item_ids: self.item_ids.clone(),
            by_user,
            by_item,
            nnz: self.values.len(),
        }
    }
}

fn intern(ids: &mut Vec<String>, index: &mut HashMap<String, usize>, id: &str) -> usize {
    if let Some(&idx) = index.get(id) {
        return idx;
    }
    let idx = ids.len();
    ids.push(id.to_string());
    index.insert(id.to_string(), idx);
    idx
}

/// Immutable sparse rating matrix with adjacency in both orientations.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    user_ids: Vec<String>,
    item_ids: Vec<String>,
    by_user: Vec<Vec<(usize, f32)>>,
    by_item: Vec<Vec<(usize, f32)>>,
    nnz: usize,
}

/// Aggregate statistics derived from one matrix.
#[derive(Debug, Clone)]
pub struct MatrixStats {
    pub global_mean: f32,
    pub sparsity: f64,
    pub per_user: Vec<UserStats>,
    pub per_item: Vec<ItemStats>,
}

impl RatingMatrix {
    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    pub fn item_ids(&self) -> &[String] {
        &self.item_ids
    }

    /// Observed (item index, value) pairs per user row, ascending by index.
    pub fn by_user(&self) -> &[Vec<(usize, f32)>] {
        &self.by_user
    }

    /// Observed (user index, value) pairs per item column, ascending by index.
    pub fn by_item(&self) -> &[Vec<(usize, f32)>] {
        &self.by_item
    }

    pub fn global_mean(&self) -> f32 {
        if self.nnz == 0 {
            return 0.0;
        }
        let total: f64 = self
            .by_user
            .iter()
            .flat_map(|row| row.iter())
            .map(|&(_, value)| value as f64)
            .sum();
        (total / self.nnz as f64) as f32
    }

    pub fn stats(&self) -> MatrixStats {
        let per_user = self
            .by_user
            .iter()
            .map(|row| {
                let sum: f64 = row.iter().map(|&(_, v)| v as f64).sum();
                let count = row.len() as u32;
                UserStats {
                    count,
                    sum,
                    mean: if count > 0 { (sum / count as f64) as f32 } else { 0.0 },
                    rated_items: row.iter().map(|&(idx, _)| idx as u32).collect(),
                }
            })
            .collect();

        let per_item = self
            .by_item
            .iter()
            .map(|col| {
                let sum: f64 = col.iter().map(|&(_, v)| v as f64).sum();
                let count = col.len() as u32;
                ItemStats {
                    count,
                    sum,
                    mean: if count > 0 { (sum / count as f64) as f32 } else { 0.0 },
                }
            })
            .collect();

        let cells = self.n_users() as f64 * self.n_items() as f64;
        let sparsity = if cells > 0.0 {
            1.0 - self.nnz as f64 / cells
        } else {
            0.0
        };

        MatrixStats {
            global_mean: self.global_mean(),
            sparsity,
            per_user,
            per_item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RatingStore {
        RatingStore::new(1.0, 5.0)
    }

    #[test]
    fn test_ingest_accepts_and_interns() {
        let mut store = store();
        let result = store.ingest(&[
            Rating::new("alice", "tea", 4.0),
            Rating::new("bob", "tea", 3.0),
            Rating::new("alice", "oil", 5.0),
        ]);

        assert_eq!(result.accepted, 3);
        assert_eq!(result.rejected, 0);
        assert_eq!(store.user_count(), 2);
        assert_eq!(store.item_count(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_out_of_range_ratings_are_counted_not_fatal() {
        let mut store = store();
        let result = store.ingest(&[
            Rating::new("alice", "tea", 0.5),
            Rating::new("alice", "tea", 6.0),
            Rating::new("alice", "tea", f32::NAN),
            Rating::new("alice", "tea", 4.0),
        ]);

        assert_eq!(result.rejected, 3);
        assert_eq!(result.accepted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_last_write_wins_on_duplicate_pair() {
        let mut store = store();
        let result = store.ingest(&[
            Rating::new("alice", "tea", 2.0),
            Rating::new("alice", "tea", 5.0),
        ]);

        assert_eq!(result.overwritten, 1);
        assert_eq!(store.len(), 1);

        let matrix = store.snapshot();
        assert_eq!(matrix.by_user()[0], vec![(0, 5.0)]);
    }

    #[test]
    fn test_stats_counts_match_adjacency() {
        let mut store = store();
        store.ingest(&[
            Rating::new("alice", "tea", 4.0),
            Rating::new("alice", "oil", 2.0),
            Rating::new("bob", "tea", 5.0),
        ]);

        let matrix = store.snapshot();
        let stats = matrix.stats();

        let tea = matrix.item_ids().iter().position(|id| id == "tea").unwrap();
        assert_eq!(stats.per_item[tea].count, 2);
        assert!((stats.per_item[tea].mean - 4.5).abs() < 1e-6);

        let alice = matrix.user_ids().iter().position(|id| id == "alice").unwrap();
        assert_eq!(stats.per_user[alice].count, 2);
        assert_eq!(stats.per_user[alice].rated_items.len(), 2);

        assert!((stats.global_mean - 11.0 / 3.0).abs() < 1e-6);
        // 3 observed cells out of 2 users x 2 items.
        assert!((stats.sparsity - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_rows_are_sorted() {
        let mut store = store();
        store.ingest(&[
            Rating::new("alice", "c", 3.0),
            Rating::new("alice", "a", 4.0),
            Rating::new("alice", "b", 5.0),
        ]);

        let matrix = store.snapshot();
        let indices: Vec<usize> = matrix.by_user()[0].iter().map(|&(idx, _)| idx).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }
}
