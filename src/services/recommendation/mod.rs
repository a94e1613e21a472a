use crate::config::{Config, EngineConfig};
use crate::error::{EngineError, EntityKind};
use crate::models::{ModelSnapshot, PopularItem, Prediction, RecommendationItem, SimilarItem};
use crate::registry::ModelRegistry;
use crate::utils::{self, validation};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Read-only query interface over exactly one model snapshot.
///
/// Every method is a pure function of the snapshot; instances can be used
/// from any number of threads alongside an in-progress retrain, which only
/// ever builds a new snapshot.
pub struct Recommender {
    snapshot: Arc<ModelSnapshot>,
    config: EngineConfig,
    has_ratings: bool,
}

impl Recommender {
    pub fn new(snapshot: Arc<ModelSnapshot>, config: EngineConfig) -> Self {
        let has_ratings = snapshot.per_item_stats.iter().any(|stats| stats.count > 0);
        Self {
            snapshot,
            config,
            has_ratings,
        }
    }

    pub fn snapshot(&self) -> &ModelSnapshot {
        &self.snapshot
    }

    fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.config.min_rating, self.config.max_rating)
    }

    fn fallback_rating(&self) -> f32 {
        if self.has_ratings {
            self.clamp(self.snapshot.global_mean)
        } else {
            self.config.default_rating
        }
    }

    /// Predicted rating for a (user, item) pair, always within the valid
    /// range. Unknown entities take the cold-start path: item mean when the
    /// item is known, otherwise the global mean. Never an error.
    pub fn predict(&self, user_id: &str, item_id: &str) -> f32 {
        match (
            self.snapshot.user_index(user_id),
            self.snapshot.item_index(item_id),
        ) {
            (Some(user_idx), Some(item_idx)) => self.clamp(self.snapshot.score(user_idx, item_idx)),
            (None, Some(item_idx)) => self.clamp(self.snapshot.per_item_stats[item_idx].mean),
            _ => self.fallback_rating(),
        }
    }

    /// How much observed data backs a prediction, in [0, 1]. Saturating in
    /// the smaller of the two rating counts; a fixed low constant on any
    /// cold-start side.
    pub fn confidence(&self, user_id: &str, item_id: &str) -> f32 {
        match (
            self.snapshot.user_index(user_id),
            self.snapshot.item_index(item_id),
        ) {
            (Some(user_idx), Some(item_idx)) => self.confidence_from_counts(
                self.snapshot.per_user_stats[user_idx].count,
                self.snapshot.per_item_stats[item_idx].count,
            ),
            _ => self.config.cold_start_confidence,
        }
    }

    fn confidence_from_counts(&self, user_count: u32, item_count: u32) -> f32 {
        let evidence = user_count.min(item_count) as f32;
        if evidence == 0.0 {
            return self.config.cold_start_confidence;
        }
        evidence / (evidence + self.config.confidence_saturation)
    }

    pub fn predict_one(&self, user_id: &str, item_id: &str) -> Prediction {
        Prediction {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            predicted_rating: self.predict(user_id, item_id),
            confidence: self.confidence(user_id, item_id),
        }
    }

    /// Top-n items for a user, highest predicted rating first. Equal scores
    /// are broken by item rating count (descending), then item id
    /// (ascending), so a given snapshot always returns the same list.
    /// Unknown users receive the popularity ranking instead.
    pub fn recommend_for_user(
        &self,
        user_id: &str,
        n: usize,
        exclude_rated: bool,
    ) -> Vec<RecommendationItem> {
        let Some(user_idx) = self.snapshot.user_index(user_id) else {
            return self.popularity_fallback(n);
        };

        let user_stats = &self.snapshot.per_user_stats[user_idx];
        let rated: HashSet<u32> = if exclude_rated {
            user_stats.rated_items.iter().copied().collect()
        } else {
            HashSet::new()
        };

        let mut scored: Vec<(usize, f32)> = (0..self.snapshot.n_items())
            .into_par_iter()
            .filter(|item_idx| !rated.contains(&(*item_idx as u32)))
            .map(|item_idx| (item_idx, self.clamp(self.snapshot.score(user_idx, item_idx))))
            .collect();

        scored.sort_unstable_by(|&(idx_a, score_a), &(idx_b, score_b)| {
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    let count_a = self.snapshot.per_item_stats[idx_a].count;
                    let count_b = self.snapshot.per_item_stats[idx_b].count;
                    count_b.cmp(&count_a)
                })
                .then_with(|| self.snapshot.item_ids[idx_a].cmp(&self.snapshot.item_ids[idx_b]))
        });
        scored.truncate(n);

        scored
            .into_iter()
            .map(|(item_idx, score)| RecommendationItem {
                item_id: self.snapshot.item_ids[item_idx].clone(),
                predicted_rating: score,
                confidence: self.confidence_from_counts(
                    user_stats.count,
                    self.snapshot.per_item_stats[item_idx].count,
                ),
            })
            .collect()
    }

    fn popularity_fallback(&self, n: usize) -> Vec<RecommendationItem> {
        self.popular_items(n, 1)
            .into_iter()
            .map(|popular| RecommendationItem {
                item_id: popular.item_id,
                predicted_rating: self.clamp(popular.mean_rating),
                confidence: self.config.cold_start_confidence,
            })
            .collect()
    }

    /// Items most similar to `item_id` by cosine over factor vectors, the
    /// query itself excluded. Unlike prediction there is no cold-start
    /// fallback: with no factor vector there is nothing to compare.
    pub fn similar_items(&self, item_id: &str, n: usize) -> Result<Vec<SimilarItem>, EngineError> {
        let query_idx = self
            .snapshot
            .item_index(item_id)
            .ok_or_else(|| EngineError::UnknownEntity {
                kind: EntityKind::Item,
                id: item_id.to_string(),
            })?;

        let factors = &self.snapshot.item_factors;
        let mut similarities: Vec<(usize, f32)> = (0..self.snapshot.n_items())
            .into_par_iter()
            .filter(|&item_idx| item_idx != query_idx)
            .map(|item_idx| {
                (
                    item_idx,
                    utils::cosine_similarity(factors.row(query_idx), factors.row(item_idx)),
                )
            })
            .collect();

        similarities.sort_unstable_by(|&(idx_a, sim_a), &(idx_b, sim_b)| {
            sim_b
                .partial_cmp(&sim_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.snapshot.item_ids[idx_a].cmp(&self.snapshot.item_ids[idx_b]))
        });
        similarities.truncate(n);

        Ok(similarities
            .into_iter()
            .map(|(item_idx, similarity)| SimilarItem {
                item_id: self.snapshot.item_ids[item_idx].clone(),
                similarity,
            })
            .collect())
    }

    /// Best-rated items with at least `min_ratings` observed ratings, by
    /// mean rating descending, then rating count, then item id.
    pub fn popular_items(&self, n: usize, min_ratings: u32) -> Vec<PopularItem> {
        let mut qualifying: Vec<usize> = (0..self.snapshot.n_items())
            .filter(|&item_idx| self.snapshot.per_item_stats[item_idx].count >= min_ratings)
            .collect();

        qualifying.sort_unstable_by(|&idx_a, &idx_b| {
            let stats_a = &self.snapshot.per_item_stats[idx_a];
            let stats_b = &self.snapshot.per_item_stats[idx_b];
            stats_b
                .mean
                .partial_cmp(&stats_a.mean)
                .unwrap_or(Ordering::Equal)
                .then_with(|| stats_b.count.cmp(&stats_a.count))
                .then_with(|| self.snapshot.item_ids[idx_a].cmp(&self.snapshot.item_ids[idx_b]))
        });
        qualifying.truncate(n);

        qualifying
            .into_iter()
            .map(|item_idx| {
                let stats = &self.snapshot.per_item_stats[item_idx];
                PopularItem {
                    item_id: self.snapshot.item_ids[item_idx].clone(),
                    mean_rating: stats.mean,
                    count: stats.count,
                }
            })
            .collect()
    }
}

/// Query front door: validates requests, resolves the currently-published
/// snapshot from the registry, and answers through a snapshot-bound
/// `Recommender`. Each call pins its own snapshot, so a retrain that
/// publishes mid-query cannot affect the answer.
pub struct RecommendationService {
    registry: Arc<ModelRegistry>,
    config: Arc<Config>,
}

impl RecommendationService {
    pub fn new(registry: Arc<ModelRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    fn recommender(&self) -> Result<Recommender, EngineError> {
        let snapshot = self.registry.current().ok_or(EngineError::ModelNotReady)?;
        Ok(Recommender::new(snapshot, self.config.engine.clone()))
    }

    pub fn recommend(
        &self,
        user_id: &str,
        n: usize,
        exclude_rated: bool,
    ) -> Result<Vec<RecommendationItem>, EngineError> {
        validation::validate_entity_id(user_id)?;
        validation::validate_result_limit(n, self.config.engine.max_recommendations)?;

        let recommendations = self.recommender()?.recommend_for_user(user_id, n, exclude_rated);
        info!(
            user = %user_id,
            returned = recommendations.len(),
            exclude_rated,
            "served recommendations"
        );
        Ok(recommendations)
    }

    pub fn similar(&self, item_id: &str, n: usize) -> Result<Vec<SimilarItem>, EngineError> {
        validation::validate_entity_id(item_id)?;
        validation::validate_result_limit(n, self.config.engine.max_recommendations)?;
        self.recommender()?.similar_items(item_id, n)
    }

    pub fn popular(&self, n: usize, min_ratings: u32) -> Result<Vec<PopularItem>, EngineError> {
        validation::validate_result_limit(n, self.config.engine.max_recommendations)?;
        Ok(self.recommender()?.popular_items(n, min_ratings))
    }

    pub fn predict_one(&self, user_id: &str, item_id: &str) -> Result<Prediction, EngineError> {
        validation::validate_entity_id(user_id)?;
        validation::validate_entity_id(item_id)?;
        Ok(self.recommender()?.predict_one(user_id, item_id))
    }
}
