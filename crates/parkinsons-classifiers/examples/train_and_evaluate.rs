use anyhow::{Context, Result};
use log::LevelFilter;

use parkinsons_classifiers::config::PipelineConfig;
use parkinsons_classifiers::data_handling::Dataset;
use parkinsons_classifiers::io::{read_voice_csv, write_predictions_csv};
use parkinsons_classifiers::pipeline::analyze;
use parkinsons_classifiers::registry::ModelRegistry;

// Usage: cargo run --example train_and_evaluate -- <parkinsons.csv> [output_dir] [config.json]
fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(
            env_logger::Env::default().filter_or("PARKINSONS_LOG", "error,parkinsons_classifiers=info"),
        )
        .init();

    let csv_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/parkinsons.csv".to_string());
    let output_dir = std::env::args().nth(2).unwrap_or_else(|| "results".to_string());

    let mut config = match std::env::args().nth(3) {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => PipelineConfig::default(),
    };
    config.output_dir = Some(output_dir.clone().into());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir))?;

    let dataset = read_voice_csv(&csv_path)
        .with_context(|| format!("Failed to read voice measurements from {}", csv_path))?;
    println!("Loaded {} rows with {} features", dataset.n_rows(), dataset.n_features());

    let analysis = analyze(&dataset, &config).context("Failed to analyze dataset")?;
    for (method, summary) in &analysis.outliers.summary {
        println!(
            "{}: {} outliers in {} columns",
            method, summary.total_outliers, summary.columns_with_outliers
        );
    }
    if let Some(error) = &analysis.error {
        println!("Feature analysis unavailable: {}", error);
    }

    let registry = ModelRegistry::from_config(&config);
    let installed = registry
        .train(&dataset, &config)
        .context("Failed to train pipeline")?;

    println!("\n{:<22}{:>10}{:>10}{:>10}{:>10}{:>10}", "model", "accuracy", "precision", "recall", "f1", "roc_auc");
    for result in &installed.pipeline.evaluations {
        println!(
            "{:<22}{:>10.4}{:>10.4}{:>10.4}{:>10.4}{:>10}",
            result.model,
            result.accuracy,
            result.precision,
            result.recall,
            result.f1,
            result.roc_auc.map_or("n/a".to_string(), |auc| format!("{:.4}", auc))
        );
    }
    for failure in &installed.pipeline.failures {
        println!("{} failed: {}", failure.model, failure.error);
    }
    if let Some(best) = installed.pipeline.best_model() {
        println!("Best model by F1: {}", best.model);
    }

    // Predict the same recordings without their labels.
    let unlabeled = Dataset { y: None, ..dataset };
    let predictions = registry.predict(&unlabeled).context("Failed to predict")?;
    let predictions_path = std::path::Path::new(&output_dir).join("predictions.csv");
    write_predictions_csv(&predictions_path, &predictions)?;
    println!("Predictions saved to {}", predictions_path.display());

    let artifact_path = std::path::Path::new(&output_dir).join("pipeline.json");
    registry.save_current(&artifact_path)?;
    println!("Pipeline saved to {}", artifact_path.display());

    println!("{}", serde_json::to_string_pretty(&registry.health())?);
    Ok(())
}
