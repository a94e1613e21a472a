use crate::config::TrainingConfig;
use crate::error::EngineError;
use crate::models::Rating;

const MAX_ID_LENGTH: usize = 256;

/// Checks applied to every incoming rating. Failures are reported back to the
/// ingestion loop, which counts them and moves on.
pub fn validate_rating(rating: &Rating, min_value: f32, max_value: f32) -> Result<(), String> {
    if rating.user_id.is_empty() {
        return Err("user id is empty".to_string());
    }
    if rating.item_id.is_empty() {
        return Err("item id is empty".to_string());
    }
    if rating.user_id.len() > MAX_ID_LENGTH || rating.item_id.len() > MAX_ID_LENGTH {
        return Err(format!("id longer than {} bytes", MAX_ID_LENGTH));
    }
    if !rating.value.is_finite() {
        return Err("rating value is not finite".to_string());
    }
    if rating.value < min_value || rating.value > max_value {
        return Err(format!(
            "rating {} outside [{}, {}]",
            rating.value, min_value, max_value
        ));
    }
    Ok(())
}

pub fn validate_entity_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() {
        return Err(EngineError::InvalidRequest("id cannot be empty".to_string()));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(EngineError::InvalidRequest(format!(
            "id longer than {} bytes",
            MAX_ID_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_result_limit(n: usize, max: usize) -> Result<(), EngineError> {
    if n == 0 {
        return Err(EngineError::InvalidRequest(
            "result count must be greater than 0".to_string(),
        ));
    }
    if n > max {
        return Err(EngineError::InvalidRequest(format!(
            "result count too large: {} (max {})",
            n, max
        )));
    }
    Ok(())
}

pub fn validate_training_config(config: &TrainingConfig) -> Result<(), EngineError> {
    if config.rank == 0 {
        return Err(EngineError::InvalidRequest(
            "factorization rank must be at least 1".to_string(),
        ));
    }
    if config.max_iterations == 0 {
        return Err(EngineError::InvalidRequest(
            "max_iterations must be at least 1".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance < 0.0 {
        return Err(EngineError::InvalidRequest(
            "tolerance must be a non-negative finite number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(&Rating::new("u", "i", 3.0), 1.0, 5.0).is_ok());
        assert!(validate_rating(&Rating::new("", "i", 3.0), 1.0, 5.0).is_err());
        assert!(validate_rating(&Rating::new("u", "i", 0.0), 1.0, 5.0).is_err());
        assert!(validate_rating(&Rating::new("u", "i", f32::INFINITY), 1.0, 5.0).is_err());
    }

    #[test]
    fn test_validate_result_limit() {
        assert!(validate_result_limit(10, 1000).is_ok());
        assert!(validate_result_limit(0, 1000).is_err());
        assert!(validate_result_limit(1001, 1000).is_err());
    }

    #[test]
    fn test_validate_training_config() {
        let mut config = TrainingConfig {
            rank: 10,
            max_iterations: 100,
            tolerance: 1e-4,
            seed: 42,
            min_ratings: 20,
        };
        assert!(validate_training_config(&config).is_ok());

        config.rank = 0;
        assert!(validate_training_config(&config).is_err());

        config.rank = 10;
        config.tolerance = f64::NAN;
        assert!(validate_training_config(&config).is_err());
    }
}
