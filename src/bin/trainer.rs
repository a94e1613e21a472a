use anyhow::{Context, Result};
use clap::Parser;
use shoprec::{init_tracing, Config, Engine, Rating};
use std::io::BufRead;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Ratings file: one JSON rating object per line.
    #[arg(short, long)]
    ratings: String,

    /// Destination for the trained model blob; defaults to the configured
    /// storage path.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting shoprec batch trainer");

    let config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    let ratings = read_ratings(&args.ratings)?;
    info!(count = ratings.len(), file = %args.ratings, "loaded ratings");

    let engine = Engine::new(config.clone());
    let report = engine.train(&ratings)?;

    info!(
        converged = report.converged,
        iterations = report.iterations,
        rmse = report.rmse,
        mae = report.mae,
        users = report.users,
        items = report.items,
        sparsity = report.sparsity,
        rejected = report.ingest.rejected,
        duration_ms = report.duration_ms,
        "training finished"
    );

    let output = args.output.unwrap_or(config.storage.model_path);
    engine.save_model(&output)?;
    info!(path = %output, "model written");

    Ok(())
}

fn read_ratings(path: &str) -> Result<Vec<Rating>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open ratings file {}", path))?;
    let reader = std::io::BufReader::new(file);

    let mut ratings = Vec::new();
    let mut malformed = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Rating>(&line) {
            Ok(rating) => ratings.push(rating),
            Err(error) => {
                malformed += 1;
                warn!(line = line_no + 1, %error, "skipping malformed rating line");
            }
        }
    }
    if malformed > 0 {
        warn!(malformed, "some rating lines were skipped");
    }

    Ok(ratings)
}
