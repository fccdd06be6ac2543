#![allow(dead_code)]
//! Seeded synthetic recordings in the 24-column voice-measurement layout.
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

use parkinsons_classifiers::config::{ModelConfig, ModelType, PipelineConfig};
use parkinsons_classifiers::data_handling::Dataset;
use parkinsons_classifiers::io::read_voice_csv_from_reader;
use parkinsons_classifiers::io::voice_csv::{EXPECTED_COLUMNS, STATUS_COLUMN};

/// Per-feature (healthy mean, Parkinson's mean, standard deviation), in
/// canonical feature order. Magnitudes follow the UCI recordings.
const PROFILES: [(f64, f64, f64); 22] = [
    (181.9, 145.2, 40.0),
    (223.6, 188.4, 80.0),
    (145.2, 106.9, 40.0),
    (0.0039, 0.0070, 0.0030),
    (0.000023, 0.000051, 0.000030),
    (0.0019, 0.0038, 0.0020),
    (0.0020, 0.0039, 0.0020),
    (0.0058, 0.0114, 0.0060),
    (0.0176, 0.0337, 0.0120),
    (0.163, 0.321, 0.120),
    (0.0095, 0.0177, 0.0070),
    (0.0106, 0.0205, 0.0080),
    (0.0133, 0.0276, 0.0100),
    (0.0285, 0.0531, 0.0200),
    (0.0115, 0.0292, 0.0200),
    (24.7, 20.97, 4.0),
    (0.443, 0.517, 0.090),
    (0.696, 0.725, 0.050),
    (-6.76, -5.33, 0.80),
    (0.160, 0.248, 0.070),
    (2.15, 2.46, 0.35),
    (0.123, 0.234, 0.070),
];

/// Every fourth row is healthy, which gives the 1:3 class ratio of the
/// UCI data.
pub fn status_of(row: usize) -> usize {
    usize::from(row % 4 != 0)
}

pub fn feature_row(rng: &mut StdRng, status: usize) -> Vec<f64> {
    PROFILES
        .iter()
        .map(|&(healthy, parkinsons, sd)| {
            let mean = if status == 1 { parkinsons } else { healthy };
            let dist = Normal::new(mean, sd).unwrap();
            let value: f64 = rng.sample(dist);
            // spread1 is the only feature that is negative in real recordings
            if mean < 0.0 {
                value
            } else {
                value.abs()
            }
        })
        .collect()
}

/// CSV text with `n_rows` recordings. Without `with_status` the `status`
/// column is left out, as in inference uploads.
pub fn synthetic_csv(n_rows: usize, seed: u64, with_status: bool) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|c| with_status || *c != STATUS_COLUMN)
        .collect();

    let mut out = columns.join(",");
    out.push('\n');
    for row in 0..n_rows {
        let status = status_of(row);
        let features = feature_row(&mut rng, status);
        let mut features = features.into_iter();
        let cells: Vec<String> = columns
            .iter()
            .map(|&c| match c {
                "name" => format!("phon_R01_S{:02}_{}", row / 6 + 1, row % 6 + 1),
                "status" => status.to_string(),
                _ => format!("{:.6}", features.next().unwrap()),
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

pub fn synthetic_dataset(n_rows: usize, seed: u64) -> Dataset {
    read_voice_csv_from_reader(synthetic_csv(n_rows, seed, true).as_bytes())
        .expect("synthetic CSV should parse")
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write test file");
    path
}

/// Default pipeline with smaller forests, to keep test runs short.
pub fn fast_config() -> PipelineConfig {
    let seed = 42;
    PipelineConfig {
        selection_trees: 50,
        models: vec![
            ModelConfig::new(seed, ModelType::default_logistic()),
            ModelConfig::new(
                seed,
                ModelType::RandomForest {
                    n_estimators: 50,
                    max_depth: None,
                    min_samples_split: 2,
                },
            ),
            ModelConfig::new(seed, ModelType::default_svm()),
        ],
        ..PipelineConfig::default()
    }
}
