use crate::models::ModelSnapshot;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Holds the currently-serving model snapshot.
///
/// `publish` replaces the reference in a single pointer swap under a
/// momentary write lock; readers that already cloned the previous `Arc` keep
/// serving from it until they drop it. No reader can ever observe a
/// half-updated model.
#[derive(Default)]
pub struct ModelRegistry {
    current: RwLock<Option<Arc<ModelSnapshot>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Atomically installs `snapshot` as the serving model, returning the
    /// retired one (if any) so callers may inspect it before it is dropped.
    pub fn publish(&self, snapshot: Arc<ModelSnapshot>) -> Option<Arc<ModelSnapshot>> {
        let retired = {
            let mut current = self.current.write();
            current.replace(snapshot)
        };
        info!(
            retired = retired.is_some(),
            "published new model snapshot"
        );
        retired
    }

    pub fn current(&self) -> Option<Arc<ModelSnapshot>> {
        self.current.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemStats, UserStats};
    use chrono::Utc;
    use ndarray::Array2;

    fn snapshot(tag: &str) -> Arc<ModelSnapshot> {
        Arc::new(ModelSnapshot::new(
            1,
            vec![tag.to_string()],
            vec!["item".to_string()],
            Array2::zeros((1, 1)),
            Array2::zeros((1, 1)),
            3.0,
            0.0,
            vec![ItemStats { count: 0, sum: 0.0, mean: 0.0 }],
            vec![UserStats { count: 0, sum: 0.0, mean: 0.0, rated_items: vec![] }],
            true,
            Utc::now(),
        ))
    }

    #[test]
    fn test_empty_registry_is_not_ready() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_ready());
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_publish_swaps_and_returns_retired() {
        let registry = ModelRegistry::new();
        assert!(registry.publish(snapshot("first")).is_none());

        let retired = registry.publish(snapshot("second")).unwrap();
        assert_eq!(retired.user_ids[0], "first");
        assert_eq!(registry.current().unwrap().user_ids[0], "second");
    }

    #[test]
    fn test_in_flight_reader_keeps_old_snapshot() {
        let registry = ModelRegistry::new();
        registry.publish(snapshot("first"));

        let held = registry.current().unwrap();
        registry.publish(snapshot("second"));

        // The reader still sees the snapshot it resolved before the swap.
        assert_eq!(held.user_ids[0], "first");
        assert_eq!(registry.current().unwrap().user_ids[0], "second");
    }

    #[test]
    fn test_concurrent_readers_and_publisher() {
        let registry = Arc::new(ModelRegistry::new());
        registry.publish(snapshot("base"));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    let current = registry.current().unwrap();
                    assert_eq!(current.user_ids.len(), 1);
                }
            }));
        }
        for round in 0..50 {
            registry.publish(snapshot(&format!("v{}", round)));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
