use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shoprec::algorithms::{NmfParams, NmfTrainer};
use shoprec::services::recommendation::Recommender;
use shoprec::services::training::TrainingService;
use shoprec::store::RatingStore;
use shoprec::{Config, Rating};
use std::sync::Arc;

fn sample_ratings(users: usize, items: usize, per_user: usize) -> Vec<Rating> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut ratings = Vec::new();
    for user in 0..users {
        for _ in 0..per_user {
            let item = rng.gen_range(0..items);
            let value = rng.gen_range(1..=5) as f32;
            ratings.push(Rating::new(
                format!("user_{}", user),
                format!("item_{}", item),
                value,
            ));
        }
    }
    ratings
}

fn benchmark_ingestion(c: &mut Criterion) {
    let ratings = sample_ratings(200, 50, 15);

    c.bench_function("rating_store_ingest", |b| {
        b.iter(|| {
            let mut store = RatingStore::new(1.0, 5.0);
            black_box(store.ingest(&ratings));
        });
    });
}

fn benchmark_factorization(c: &mut Criterion) {
    let mut store = RatingStore::new(1.0, 5.0);
    store.ingest(&sample_ratings(100, 30, 15));
    let matrix = store.snapshot();

    c.bench_function("nmf_factorize_100x30", |b| {
        b.iter(|| {
            let trainer = NmfTrainer::new(NmfParams {
                rank: 10,
                max_iterations: 25,
                tolerance: 1e-4,
                seed: 42,
            });
            black_box(trainer.factorize(&matrix));
        });
    });
}

fn benchmark_queries(c: &mut Criterion) {
    let config = Config::default();
    let service = TrainingService::new(Arc::new(config.clone()));
    let outcome = service.train(&sample_ratings(200, 50, 15)).unwrap();
    let recommender = Recommender::new(outcome.snapshot, config.engine);

    c.bench_function("predict_one", |b| {
        b.iter(|| {
            black_box(recommender.predict("user_17", "item_23"));
        });
    });

    c.bench_function("recommend_top_10", |b| {
        b.iter(|| {
            black_box(recommender.recommend_for_user("user_17", 10, true));
        });
    });

    c.bench_function("similar_items_top_10", |b| {
        b.iter(|| {
            black_box(recommender.similar_items("item_23", 10).unwrap());
        });
    });

    c.bench_function("popular_items_top_10", |b| {
        b.iter(|| {
            black_box(recommender.popular_items(10, 5));
        });
    });
}

criterion_group!(
    benches,
    benchmark_ingestion,
    benchmark_factorization,
    benchmark_queries
);
criterion_main!(benches);
