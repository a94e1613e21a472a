pub mod initializer;

use crate::store::RatingMatrix;
use crate::utils::metrics;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Keeps multiplicative-update denominators away from zero.
const UPDATE_EPS: f32 = 1e-9;

#[derive(Debug, Clone)]
pub struct NmfParams {
    pub rank: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

/// Output of one factorization run. Hitting the iteration cap is not a
/// failure; `converged` records whether the tolerance was reached.
#[derive(Debug, Clone)]
pub struct Factorization {
    pub user_factors: Array2<f32>,
    pub item_factors: Array2<f32>,
    pub iterations: usize,
    pub converged: bool,
    pub rmse: f64,
    pub mae: f64,
}

/// Non-negative matrix factorization via multiplicative updates, restricted
/// to observed entries: a missing rating never contributes to the loss, so
/// the model can tell "not rated" apart from "rated low".
///
/// The run is fully deterministic for a given (matrix, rank, seed): factors
/// start from a seeded generator, row updates touch disjoint state (the rayon
/// split never changes per-row arithmetic order), and error accumulation is
/// sequential in index order. Cost is O(iterations x nnz x rank).
pub struct NmfTrainer {
    params: NmfParams,
}

impl NmfTrainer {
    pub fn new(params: NmfParams) -> Self {
        Self { params }
    }

    pub fn factorize(&self, matrix: &RatingMatrix) -> Factorization {
        let n_users = matrix.n_users();
        let n_items = matrix.n_items();
        let rank = self.params.rank;

        if matrix.nnz() == 0 {
            return Factorization {
                user_factors: Array2::zeros((n_users, rank)),
                item_factors: Array2::zeros((n_items, rank)),
                iterations: 0,
                converged: true,
                rmse: 0.0,
                mae: 0.0,
            };
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        // Scale the start so initial reconstructions land near the global
        // mean: k entries of ~sqrt(mean/k) each dot to ~mean.
        let scale = (matrix.global_mean() / rank as f32).sqrt();
        let mut user_factors = initializer::nonneg_factor_matrix(&mut rng, n_users, rank, scale);
        let mut item_factors = initializer::nonneg_factor_matrix(&mut rng, n_items, rank, scale);

        let mut previous_rmse = f64::INFINITY;
        let mut last = metrics::ReconstructionMetrics { rmse: 0.0, mae: 0.0 };
        let mut iterations = 0;
        let mut converged = false;

        for pass in 1..=self.params.max_iterations {
            update_rows(&mut user_factors, &item_factors, matrix.by_user());
            update_rows(&mut item_factors, &user_factors, matrix.by_item());

            last = metrics::evaluate_reconstruction(&user_factors, &item_factors, matrix);
            iterations = pass;
            debug!(pass, rmse = last.rmse, "factorization pass complete");

            if previous_rmse.is_finite() {
                let relative = (previous_rmse - last.rmse).abs() / previous_rmse.max(f64::EPSILON);
                if relative < self.params.tolerance {
                    converged = true;
                    break;
                }
            }
            previous_rmse = last.rmse;
        }

        Factorization {
            user_factors,
            item_factors,
            iterations,
            converged,
            rmse: last.rmse,
            mae: last.mae,
        }
    }
}

/// One half of an alternating pass: refresh every row of `target` against the
/// fixed `other` factors. For a row t with observed entries (j, r):
///
///   t_f <- t_f * (sum_j r * o_jf) / (sum_j (t . o_j) * o_jf + eps)
///
/// Numerator and denominator are non-negative, so non-negativity is
/// preserved. Rows are independent and each row's arithmetic is sequential,
/// which keeps the parallel update bit-deterministic.
fn update_rows(target: &mut Array2<f32>, other: &Array2<f32>, observed: &[Vec<(usize, f32)>]) {
    let rank = target.ncols();

    target
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row_idx, mut row)| {
            let entries = &observed[row_idx];
            if entries.is_empty() {
                return;
            }

            let mut numerator = vec![0.0f32; rank];
            let mut denominator = vec![0.0f32; rank];

            for &(other_idx, value) in entries {
                let other_row = other.row(other_idx);
                let predicted: f32 = row
                    .iter()
                    .zip(other_row.iter())
                    .map(|(a, b)| a * b)
                    .sum();
                for f in 0..rank {
                    numerator[f] += value * other_row[f];
                    denominator[f] += predicted * other_row[f];
                }
            }

            for f in 0..rank {
                row[f] *= numerator[f] / (denominator[f] + UPDATE_EPS);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use crate::store::RatingStore;

    fn sample_matrix() -> RatingMatrix {
        let mut store = RatingStore::new(1.0, 5.0);
        let mut ratings = Vec::new();
        for user in 0..12 {
            for item in 0..6 {
                if (user + item) % 3 != 0 {
                    let value = 1.0 + ((user * 2 + item * 3) % 5) as f32;
                    ratings.push(Rating::new(
                        format!("user_{}", user),
                        format!("item_{}", item),
                        value,
                    ));
                }
            }
        }
        store.ingest(&ratings);
        store.snapshot()
    }

    fn params(seed: u64) -> NmfParams {
        NmfParams {
            rank: 4,
            max_iterations: 150,
            tolerance: 1e-6,
            seed,
        }
    }

    #[test]
    fn test_factors_stay_nonnegative() {
        let matrix = sample_matrix();
        let result = NmfTrainer::new(params(42)).factorize(&matrix);
        for &value in result.user_factors.iter().chain(result.item_factors.iter()) {
            assert!(value >= 0.0);
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let matrix = sample_matrix();
        let a = NmfTrainer::new(params(42)).factorize(&matrix);
        let b = NmfTrainer::new(params(42)).factorize(&matrix);
        assert_eq!(a.user_factors, b.user_factors);
        assert_eq!(a.item_factors, b.item_factors);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn test_different_seeds_differ() {
        let matrix = sample_matrix();
        let a = NmfTrainer::new(params(1)).factorize(&matrix);
        let b = NmfTrainer::new(params(2)).factorize(&matrix);
        assert_ne!(a.user_factors, b.user_factors);
    }

    #[test]
    fn test_updates_reduce_reconstruction_error() {
        let matrix = sample_matrix();
        let short = NmfTrainer::new(NmfParams { max_iterations: 1, tolerance: 0.0, ..params(42) })
            .factorize(&matrix);
        let long = NmfTrainer::new(NmfParams { max_iterations: 100, tolerance: 0.0, ..params(42) })
            .factorize(&matrix);
        assert!(long.rmse <= short.rmse);
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let matrix = sample_matrix();
        let result = NmfTrainer::new(NmfParams {
            max_iterations: 2,
            tolerance: 0.0,
            ..params(42)
        })
        .factorize(&matrix);
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
    }
}
