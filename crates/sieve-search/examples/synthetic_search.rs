use anyhow::Result;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use sieve_data::{split_by_fraction, write_history_csv};
use sieve_forest::LinearRegression;
use sieve_search::{Evaluator, SearchConfig, SurrogateConfig, SurrogateSearch};
use sieve_types::{Dataset, R2Score};

/// 12 features; the target depends on f1, f4 and f7 plus a little noise.
fn synthetic_dataset(rows: usize, seed: u64) -> Result<Dataset> {
    let n_features = 12;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((rows, n_features), |_| rng.random_range(-1.0..1.0));
    let y: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|r| 3.0 * r[1] - 2.0 * r[4] + r[7] + 0.05 * rng.random_range(-1.0..1.0))
        .collect();
    let names = (0..n_features).map(|i| format!("f{i}")).collect();
    Ok(Dataset::new(names, x, y)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Sieve synthetic search example");

    let data = split_by_fraction(&synthetic_dataset(300, 7)?, 0.3)?;
    println!(
        "Train rows: {}, validation rows: {}, features: {}",
        data.train.n_rows(),
        data.valid.n_rows(),
        data.n_features()
    );

    let evaluator = Evaluator::new(LinearRegression::new(), R2Score, data);
    let config = SearchConfig::new()
        .with_iterations(8)
        .with_trials_per_iteration(5)
        .with_estimates_per_iteration(500)
        .with_penalty(0.01)
        .with_seed(42)
        .with_surrogate(SurrogateConfig {
            n_estimators: 50,
            ..SurrogateConfig::default()
        })
        .with_plots(true, true);

    let mut search = SurrogateSearch::new(config, evaluator)?;
    println!("Baseline R2 on all features: {:.4}", search.baseline()?);

    let table = search.run(None)?;
    println!("Evaluated {} feature subsets", table.len());

    if let Some(best) = search.best() {
        println!(
            "Best subset {:?}: R2 {:.4}, penalized {:.4}",
            best.features, best.raw_score, best.penalized_score
        );
    }
    if let Some(series) = search.stats_series() {
        for point in series {
            println!(
                "  iteration {:>2}: {} evaluated, best so far {:?}",
                point.stats.iteration, point.stats.cumulative_evaluated, point.best_penalized_score
            );
        }
    }
    if let Some(pairs) = search.prediction_pairs() {
        println!("Collected {} surrogate prediction pairs", pairs.len());
    }

    let out = std::env::temp_dir().join("sieve_history.csv");
    write_history_csv(&table, &out)?;
    println!("History written to {}", out.display());

    Ok(())
}
