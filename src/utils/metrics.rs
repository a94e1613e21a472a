use crate::store::RatingMatrix;
use ndarray::Array2;

/// Reconstruction quality over the observed entries of a rating matrix.
#[derive(Debug, Clone, Copy)]
pub struct ReconstructionMetrics {
    pub rmse: f64,
    pub mae: f64,
}

/// Evaluates how well `user_factors x item_factors^T` reproduces the observed
/// ratings. Unobserved cells never contribute. Accumulation runs in fixed
/// user-then-item index order so repeated evaluations are bit-identical.
pub fn evaluate_reconstruction(
    user_factors: &Array2<f32>,
    item_factors: &Array2<f32>,
    matrix: &RatingMatrix,
) -> ReconstructionMetrics {
    let mut squared_error = 0.0f64;
    let mut absolute_error = 0.0f64;

    for (user_idx, observed) in matrix.by_user().iter().enumerate() {
        let user_row = user_factors.row(user_idx);
        for &(item_idx, value) in observed {
            let predicted = user_row.dot(&item_factors.row(item_idx));
            let error = (value - predicted) as f64;
            squared_error += error * error;
            absolute_error += error.abs();
        }
    }

    let nnz = matrix.nnz();
    if nnz == 0 {
        return ReconstructionMetrics { rmse: 0.0, mae: 0.0 };
    }

    ReconstructionMetrics {
        rmse: (squared_error / nnz as f64).sqrt(),
        mae: absolute_error / nnz as f64,
    }
}
