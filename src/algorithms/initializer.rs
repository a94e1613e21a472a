use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;

/// Lower bound on initial factor entries. A strictly positive start keeps
/// multiplicative updates from pinning an entry at zero before the first pass.
const MIN_INIT: f32 = 1e-3;

pub fn seeded_uniform(rng: &mut StdRng, len: usize, low: f32, high: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(low..high)).collect()
}

/// Dense non-negative factor matrix drawn from a seeded generator.
///
/// Entries are uniform in [MIN_INIT, MIN_INIT + scale); generation is strictly
/// row-major, so a given rng state always yields the same matrix.
pub fn nonneg_factor_matrix(rng: &mut StdRng, rows: usize, cols: usize, scale: f32) -> Array2<f32> {
    let values = seeded_uniform(rng, rows * cols, MIN_INIT, MIN_INIT + scale);
    Array2::from_shape_vec((rows, cols), values)
        .unwrap_or_else(|_| Array2::zeros((rows, cols)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_entries_are_positive_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let matrix = nonneg_factor_matrix(&mut rng, 20, 8, 0.5);
        assert_eq!(matrix.dim(), (20, 8));
        for &value in matrix.iter() {
            assert!(value >= MIN_INIT);
            assert!(value < MIN_INIT + 0.5);
        }
    }

    #[test]
    fn test_same_seed_same_matrix() {
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = nonneg_factor_matrix(&mut rng_a, 10, 4, 1.0);
        let b = nonneg_factor_matrix(&mut rng_b, 10, 4, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_matrix() {
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(2);
        let a = nonneg_factor_matrix(&mut rng_a, 10, 4, 1.0);
        let b = nonneg_factor_matrix(&mut rng_b, 10, 4, 1.0);
        assert_ne!(a, b);
    }
}
