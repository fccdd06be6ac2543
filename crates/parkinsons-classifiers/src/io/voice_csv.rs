//! Reader and writer for the voice-measurement CSV schema.
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use ndarray::{Array1, Array2};

use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};
use crate::pipeline::PredictionSet;

pub const NAME_COLUMN: &str = "name";
pub const STATUS_COLUMN: &str = "status";

/// The 22 acoustic features, in canonical order.
pub const FEATURE_COLUMNS: [&str; 22] = [
    "MDVP:Fo(Hz)",
    "MDVP:Fhi(Hz)",
    "MDVP:Flo(Hz)",
    "MDVP:Jitter(%)",
    "MDVP:Jitter(Abs)",
    "MDVP:RAP",
    "MDVP:PPQ",
    "Jitter:DDP",
    "MDVP:Shimmer",
    "MDVP:Shimmer(dB)",
    "Shimmer:APQ3",
    "Shimmer:APQ5",
    "MDVP:APQ",
    "Shimmer:DDA",
    "NHR",
    "HNR",
    "RPDE",
    "DFA",
    "spread1",
    "spread2",
    "D2",
    "PPE",
];

/// Full header of a labeled file, in canonical order.
pub const EXPECTED_COLUMNS: [&str; 24] = [
    "name",
    "MDVP:Fo(Hz)",
    "MDVP:Fhi(Hz)",
    "MDVP:Flo(Hz)",
    "MDVP:Jitter(%)",
    "MDVP:Jitter(Abs)",
    "MDVP:RAP",
    "MDVP:PPQ",
    "Jitter:DDP",
    "MDVP:Shimmer",
    "MDVP:Shimmer(dB)",
    "Shimmer:APQ3",
    "Shimmer:APQ5",
    "MDVP:APQ",
    "Shimmer:DDA",
    "NHR",
    "HNR",
    "status",
    "RPDE",
    "DFA",
    "spread1",
    "spread2",
    "D2",
    "PPE",
];

/// Text treated as a missing cell rather than a malformed one.
const MISSING_TOKENS: [&str; 4] = ["", "NA", "NaN", "nan"];

/// Read a voice-measurement CSV file into a `Dataset`.
pub fn read_voice_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| {
        PipelineError::DataFormat(format!(
            "Failed to open CSV file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    let dataset = read_voice_csv_from_reader(file)?;
    log::info!(
        "Loaded {} rows and {} feature columns from {}",
        dataset.n_rows(),
        dataset.n_features(),
        path.as_ref().display()
    );
    Ok(dataset)
}

/// Read voice-measurement CSV data from any reader (file, upload body, ...).
///
/// Columns are located by their exact, case-sensitive name. Extra columns are
/// ignored. A missing `status` column yields an unlabeled dataset suitable
/// for inference; a missing `name` column yields generated `row_<n>` names.
pub fn read_voice_csv_from_reader<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();

    let missing: Vec<&str> = FEATURE_COLUMNS
        .iter()
        .copied()
        .filter(|c| find_column(&headers, c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::DataFormat(format!(
            "Missing required feature columns: {}",
            missing.join(", ")
        )));
    }

    let feature_indices: Vec<usize> = FEATURE_COLUMNS
        .iter()
        .filter_map(|c| find_column(&headers, c))
        .collect();
    let name_idx = find_column(&headers, NAME_COLUMN);
    let status_idx = find_column(&headers, STATUS_COLUMN);

    warn_on_layout(&headers, status_idx.is_some());
    if status_idx.is_none() {
        log::info!("No '{}' column found, reading in inference mode", STATUS_COLUMN);
    }

    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut labels = Vec::new();
    let mut n_missing = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let row_no = row_idx + 1;
        let record = result.map_err(|e| match e.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => PipelineError::DataFormat(format!(
                "Row {} has {} fields but the header has {}",
                row_no, len, expected_len
            )),
            _ => PipelineError::Csv(e),
        })?;

        let name = name_idx
            .and_then(|idx| record.get(idx))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("row_{}", row_no));
        names.push(name);

        for (&idx, column) in feature_indices.iter().zip(FEATURE_COLUMNS.iter()) {
            let value = parse_feature(record.get(idx).unwrap_or_default(), column, row_no)?;
            if value.is_nan() {
                n_missing += 1;
            }
            values.push(value);
        }

        if let Some(idx) = status_idx {
            labels.push(parse_status(record.get(idx).unwrap_or_default(), row_no)?);
        }
    }

    if n_missing > 0 {
        log::warn!("Input contains {} missing feature values", n_missing);
    }

    let n_rows = names.len();
    let x = Array2::from_shape_vec((n_rows, FEATURE_COLUMNS.len()), values)
        .map_err(|e| PipelineError::DataFormat(e.to_string()))?;
    let y = status_idx.map(|_| Array1::from_vec(labels));

    Dataset::new(
        names,
        FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        x,
        y,
    )
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn warn_on_layout(headers: &StringRecord, has_status: bool) {
    let expected: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|c| has_status || *c != STATUS_COLUMN)
        .collect();
    let known: Vec<&str> = headers
        .iter()
        .filter(|h| EXPECTED_COLUMNS.contains(h))
        .collect();
    if known.len() == expected.len() && known != expected {
        log::warn!("Columns are not in the canonical order; reading them by name");
    }
    let extra: Vec<&str> = headers
        .iter()
        .filter(|h| !EXPECTED_COLUMNS.contains(h))
        .collect();
    if !extra.is_empty() {
        log::debug!("Ignoring extra columns: {}", extra.join(", "));
    }
}

fn parse_feature(raw: &str, column: &str, row_no: usize) -> Result<f64> {
    if MISSING_TOKENS.contains(&raw) {
        return Ok(f64::NAN);
    }
    match raw.parse::<f64>() {
        // "inf" and "-Infinity" parse, but are not measurements
        Ok(value) if !value.is_infinite() => Ok(value),
        _ => Err(PipelineError::DataFormat(format!(
            "Invalid value '{}' in column '{}' at row {}",
            raw, column, row_no
        ))),
    }
}

fn parse_status(raw: &str, row_no: usize) -> Result<usize> {
    match raw.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(PipelineError::DataFormat(format!(
            "Invalid status '{}' at row {}; expected 0 or 1",
            raw, row_no
        ))),
    }
}

/// Write batch predictions as CSV: `name`, then a prediction and a
/// probability column per model.
pub fn write_predictions_csv<P: AsRef<Path>>(path: P, predictions: &PredictionSet) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    let mut header = vec![NAME_COLUMN.to_string()];
    for model in &predictions.models {
        header.push(format!("{}_prediction", model.model));
        header.push(format!("{}_probability", model.model));
    }
    writer.write_record(&header)?;

    for (row, name) in predictions.names.iter().enumerate() {
        let mut record = vec![name.clone()];
        for model in &predictions.models {
            record.push(model.predictions[row].to_string());
            record.push(format!("{:.6}", model.probabilities[row]));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    log::info!(
        "Wrote {} predictions to {}",
        predictions.names.len(),
        path.as_ref().display()
    );
    Ok(())
}
