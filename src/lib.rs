pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{EngineError, EntityKind, PersistenceError};
pub use models::*;

use registry::ModelRegistry;
use services::recommendation::RecommendationService;
use services::training::{TrainingOutcome, TrainingService};
use std::path::Path;
use std::sync::Arc;

/// The recommendation engine behind the storefront: one registry of the
/// serving snapshot plus the training and query services around it.
///
/// Queries read whatever snapshot is currently published; `train` builds a
/// wholly new snapshot and swaps it in atomically, so reads keep running
/// against the old model for the entire duration of a retrain.
pub struct Engine {
    pub config: Arc<Config>,
    pub registry: Arc<ModelRegistry>,
    pub training: TrainingService,
    pub queries: RecommendationService,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ModelRegistry::new());
        let training = TrainingService::new(config.clone());
        let queries = RecommendationService::new(registry.clone(), config.clone());

        Self {
            config,
            registry,
            training,
            queries,
        }
    }

    /// Train on a batch of ratings with the configured parameters and
    /// publish the resulting snapshot.
    pub fn train(&self, ratings: &[Rating]) -> Result<TrainReport, EngineError> {
        let TrainingOutcome { snapshot, report } = self.training.train(ratings)?;
        self.registry.publish(snapshot);
        Ok(report)
    }

    /// Same as `train`, with per-run parameter overrides.
    pub fn train_with(
        &self,
        ratings: &[Rating],
        training: &config::TrainingConfig,
    ) -> Result<TrainReport, EngineError> {
        let TrainingOutcome { snapshot, report } = self.training.train_with(ratings, training)?;
        self.registry.publish(snapshot);
        Ok(report)
    }

    pub fn recommend(
        &self,
        user_id: &str,
        n: usize,
        exclude_rated: bool,
    ) -> Result<Vec<RecommendationItem>, EngineError> {
        self.queries.recommend(user_id, n, exclude_rated)
    }

    pub fn similar(&self, item_id: &str, n: usize) -> Result<Vec<SimilarItem>, EngineError> {
        self.queries.similar(item_id, n)
    }

    pub fn popular(&self, n: usize, min_ratings: u32) -> Result<Vec<PopularItem>, EngineError> {
        self.queries.popular(n, min_ratings)
    }

    pub fn predict_one(&self, user_id: &str, item_id: &str) -> Result<Prediction, EngineError> {
        self.queries.predict_one(user_id, item_id)
    }

    /// Checkpoint the currently-published snapshot. Write failures leave the
    /// in-memory model untouched and serving.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let snapshot = self.registry.current().ok_or(EngineError::ModelNotReady)?;
        persistence::save(&snapshot, path.as_ref())?;
        Ok(())
    }

    /// Load a checkpointed snapshot and publish it. A failed load (missing
    /// file, version mismatch, corrupt blob) leaves the current model
    /// serving.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let snapshot = persistence::load(path.as_ref())?;
        self.registry.publish(Arc::new(snapshot));
        Ok(())
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
