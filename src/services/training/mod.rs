use crate::algorithms::{NmfParams, NmfTrainer};
use crate::config::{Config, TrainingConfig};
use crate::error::EngineError;
use crate::models::{ModelSnapshot, Rating, TrainReport};
use crate::store::RatingStore;
use crate::utils::validation;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A finished training run: the snapshot to publish plus its report.
pub struct TrainingOutcome {
    pub snapshot: Arc<ModelSnapshot>,
    pub report: TrainReport,
}

/// Runs the batch pipeline: ingest ratings, factorize, assemble a snapshot.
/// Each run builds a completely new snapshot; publishing is the caller's
/// decision, so an aborted or failed run can never leak a partial model.
pub struct TrainingService {
    config: Arc<Config>,
}

impl TrainingService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn train(&self, ratings: &[Rating]) -> Result<TrainingOutcome, EngineError> {
        self.train_with(ratings, &self.config.training)
    }

    pub fn train_with(
        &self,
        ratings: &[Rating],
        training: &TrainingConfig,
    ) -> Result<TrainingOutcome, EngineError> {
        validation::validate_training_config(training)?;
        let started = Instant::now();

        let mut store = RatingStore::new(self.config.engine.min_rating, self.config.engine.max_rating);
        let ingest = store.ingest(ratings);
        info!(
            accepted = ingest.accepted,
            rejected = ingest.rejected,
            overwritten = ingest.overwritten,
            users = store.user_count(),
            items = store.item_count(),
            "ingested rating batch"
        );

        if store.len() < training.min_ratings {
            return Err(EngineError::InsufficientData {
                required: training.min_ratings,
                actual: store.len(),
            });
        }

        let matrix = store.snapshot();
        let stats = matrix.stats();

        let trainer = NmfTrainer::new(NmfParams {
            rank: training.rank,
            max_iterations: training.max_iterations,
            tolerance: training.tolerance,
            seed: training.seed,
        });
        let factorization = trainer.factorize(&matrix);

        if !factorization.converged {
            warn!(
                iterations = factorization.iterations,
                rmse = factorization.rmse,
                "training hit the iteration cap before reaching tolerance"
            );
        }

        let trained_at = Utc::now();
        let snapshot = Arc::new(ModelSnapshot::new(
            training.rank,
            matrix.user_ids().to_vec(),
            matrix.item_ids().to_vec(),
            factorization.user_factors,
            factorization.item_factors,
            stats.global_mean,
            stats.sparsity,
            stats.per_item,
            stats.per_user,
            factorization.converged,
            trained_at,
        ));

        let report = TrainReport {
            converged: factorization.converged,
            iterations: factorization.iterations,
            rmse: factorization.rmse,
            mae: factorization.mae,
            users: matrix.n_users(),
            items: matrix.n_items(),
            ratings_used: matrix.nnz(),
            ingest,
            sparsity: stats.sparsity,
            duration_ms: started.elapsed().as_millis() as u64,
            trained_at,
        };

        info!(
            converged = report.converged,
            iterations = report.iterations,
            rmse = report.rmse,
            sparsity = report.sparsity,
            duration_ms = report.duration_ms,
            "training run complete"
        );

        Ok(TrainingOutcome { snapshot, report })
    }
}
