use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub training: TrainingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inclusive bounds of a valid rating value.
    pub min_rating: f32,
    pub max_rating: f32,
    /// Returned when a snapshot carries no usable global mean.
    pub default_rating: f32,
    /// Confidence reported for any cold-start prediction.
    pub cold_start_confidence: f32,
    /// Rating count at which confidence reaches 0.5.
    pub confidence_saturation: f32,
    pub max_recommendations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub rank: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
    /// Training refuses to produce a model from fewer ratings than this.
    pub min_ratings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub model_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                min_rating: 1.0,
                max_rating: 5.0,
                default_rating: 3.0,
                cold_start_confidence: 0.1,
                confidence_saturation: 10.0,
                max_recommendations: 1000,
            },
            training: TrainingConfig {
                rank: 10,
                max_iterations: 200,
                tolerance: 1e-4,
                seed: 42,
                min_ratings: 20,
            },
            storage: StorageConfig {
                model_path: "models/recommender.json".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SHOPREC"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
