use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shoprec::{init_tracing, Config, Engine, Rating};

fn main() -> anyhow::Result<()> {
    init_tracing();

    println!("shoprec basic usage walkthrough");

    // 1. Configuration
    let config = Config::default();
    println!(
        "1. config loaded: rating range [{}, {}], rank {}",
        config.engine.min_rating, config.engine.max_rating, config.training.rank
    );

    // 2. Synthesize a storefront's worth of ratings
    let ratings = sample_ratings(42);
    println!("2. generated {} sample ratings", ratings.len());

    // 3. Train and publish a model
    let engine = Engine::new(config);
    let report = engine.train(&ratings)?;
    println!(
        "3. trained: {} users x {} items, rmse {:.4}, converged: {} ({} iterations)",
        report.users, report.items, report.rmse, report.converged, report.iterations
    );

    // 4. Personalized recommendations
    let recommendations = engine.recommend("user_5", 5, true)?;
    println!("4. top picks for user_5:");
    for item in &recommendations {
        println!(
            "   {} predicted {:.2} (confidence {:.2})",
            item.item_id, item.predicted_rating, item.confidence
        );
    }

    // 5. Item-to-item similarity
    let similar = engine.similar("Lavender Oil", 3)?;
    println!("5. items similar to Lavender Oil:");
    for item in &similar {
        println!("   {} similarity {:.3}", item.item_id, item.similarity);
    }

    // 6. Popularity and a single prediction
    let popular = engine.popular(3, 5)?;
    println!("6. best-rated items with at least 5 ratings:");
    for item in &popular {
        println!(
            "   {} mean {:.2} over {} ratings",
            item.item_id, item.mean_rating, item.count
        );
    }
    let prediction = engine.predict_one("brand_new_visitor", "Lavender Oil")?;
    println!(
        "   cold-start prediction for a new visitor: {:.2}",
        prediction.predicted_rating
    );

    // 7. Persist and reload
    let dir = std::env::temp_dir().join("shoprec-demo");
    let path = dir.join("model.json");
    engine.save_model(&path)?;
    engine.load_model(&path)?;
    println!("7. model checkpointed to {} and reloaded", path.display());

    Ok(())
}

/// Seeded sample data shaped like a small natural-products storefront.
fn sample_ratings(seed: u64) -> Vec<Rating> {
    let products = [
        "Turmeric Extract",
        "Clove Oil",
        "Lavender Oil",
        "Tea Tree Oil",
        "Eucalyptus Oil",
        "Peppermint Oil",
        "Ginger Extract",
        "Aloe Vera Gel",
        "Coconut Oil",
        "Argan Oil",
        "Jojoba Oil",
        "Chamomile Extract",
        "Green Tea Extract",
        "Moringa Powder",
        "Spirulina Powder",
    ];

    let mut rng = StdRng::seed_from_u64(seed);
    let mut ratings = Vec::new();
    for user in 0..60 {
        let user_id = format!("user_{}", user);
        let picks = rng.gen_range(5..10);
        for _ in 0..picks {
            let product = products[rng.gen_range(0..products.len())];
            let value = rng.gen_range(1..=5) as f32;
            ratings.push(Rating::new(user_id.clone(), product, value));
        }
    }
    ratings
}
