//! Reporting: plotly figures assembled into standalone HTML pages, plus a
//! CSV of per-model metrics. Writing reports never changes any result.
pub mod html;
pub mod plots;

use std::path::{Path, PathBuf};

use maud::html as markup;
use ndarray::Array1;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::data_handling::Dataset;
use crate::error::Result;
use crate::evaluation::{best_model_by_f1, EvaluationResult};
use crate::feature_selection::FeatureSelection;
use crate::outliers::OutlierReport;
use crate::pipeline::ModelFailure;
use html::{Report, ReportSection};

const SOFTWARE_NAME: &str = "parkinsons-classifiers";

/// Create a fresh `<base>/output_<timestamp>` and return its path. Runs
/// within the same second get `_1`, `_2`, ... appended.
pub fn create_output_dir<P: AsRef<Path>>(base: P) -> Result<PathBuf> {
    std::fs::create_dir_all(base.as_ref())?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut suffix = 0usize;
    loop {
        let name = match suffix {
            0 => format!("output_{}", stamp),
            n => format!("output_{}_{}", stamp, n),
        };
        let dir = base.as_ref().join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[derive(Serialize)]
struct MetricsRow<'a> {
    model: &'a str,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
    roc_auc: Option<f64>,
    cv_mean: f64,
    cv_std: f64,
}

fn write_metrics_csv(path: &Path, results: &[EvaluationResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in results {
        writer.serialize(MetricsRow {
            model: &r.model,
            accuracy: r.accuracy,
            precision: r.precision,
            recall: r.recall,
            f1: r.f1,
            roc_auc: r.roc_auc,
            cv_mean: r.cv_mean,
            cv_std: r.cv_std,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or("n/a".to_string(), |v| format!("{:.4}", v))
}

/// Write `evaluation_report.html` and `model_metrics.csv` into a fresh
/// timestamped directory below `base_dir`, returning that directory.
pub fn write_evaluation_report<P: AsRef<Path>>(
    base_dir: P,
    results: &[EvaluationResult],
    y_test: &Array1<usize>,
    selection: &FeatureSelection,
    failures: &[ModelFailure],
    config: &PipelineConfig,
) -> Result<PathBuf> {
    let dir = create_output_dir(base_dir)?;
    write_metrics_csv(&dir.join("model_metrics.csv"), results)?;

    let mut report = Report::new(
        SOFTWARE_NAME,
        env!("CARGO_PKG_VERSION"),
        "Parkinson's Classifier Evaluation Report",
    );

    /* Section 1: Summary */
    {
        let mut summary = ReportSection::new("Summary");
        let best = best_model_by_f1(results);
        summary.add_content(markup! {
            @if let Some(best) = best {
                p { "Best model by F1 score: " b { (best.model) } " (F1 = " (format!("{:.4}", best.f1)) ")" }
            }
            table {
                tr {
                    th { "Model" } th { "Accuracy" } th { "Precision" } th { "Recall" }
                    th { "F1" } th { "ROC-AUC" } th { "CV mean" } th { "CV std" }
                }
                @for r in results {
                    tr {
                        td { (r.model) }
                        td { (format!("{:.4}", r.accuracy)) }
                        td { (format!("{:.4}", r.precision)) }
                        td { (format!("{:.4}", r.recall)) }
                        td { (format!("{:.4}", r.f1)) }
                        td { (fmt_opt(r.roc_auc)) }
                        td { (format!("{:.4}", r.cv_mean)) }
                        td { (format!("{:.4}", r.cv_std)) }
                    }
                }
            }
            @if !failures.is_empty() {
                h3 { "Models that failed to train" }
                ul {
                    @for failure in failures {
                        li { b { (failure.model) } ": " (failure.error) }
                    }
                }
            }
        });
        report.add_section(summary);
    }

    /* Section 2: Comparison plots */
    if !results.is_empty() {
        let mut comparison = ReportSection::new("Model Comparison");
        comparison.add_plot(plots::plot_metric_bars(results, "Accuracy", |r| r.accuracy));
        comparison.add_plot(plots::plot_metric_bars(results, "F1 Score", |r| r.f1));
        comparison.add_plot(plots::plot_roc_curves(results, y_test));
        if let Some(best) = best_model_by_f1(results) {
            comparison.add_plot(plots::plot_confusion_matrix(
                &best.confusion_matrix,
                &format!("Confusion Matrix: {}", best.model),
            ));
        }
        report.add_section(comparison);
    }

    /* Section 3: Features */
    {
        let mut features = ReportSection::new("Selected Features");
        features.add_plot(plots::plot_feature_importance(selection));
        report.add_section(features);
    }

    /* Section 4: Configuration */
    {
        let mut config_section = ReportSection::new("Configuration");
        let config_json = serde_json::to_string_pretty(config)?;
        config_section.add_content(markup! {
            pre {
                code { (config_json) }
            }
        });
        report.add_section(config_section);
    }

    let path = dir.join("evaluation_report.html");
    report.save_to_file(&path)?;
    log::info!("Evaluation report saved to {}", path.display());
    Ok(dir)
}

/// Write `outlier_report.html` (box plots and per-column counts) into a
/// fresh timestamped directory below `base_dir`.
pub fn write_outlier_report<P: AsRef<Path>>(
    base_dir: P,
    dataset: &Dataset,
    outliers: &OutlierReport,
) -> Result<PathBuf> {
    let dir = create_output_dir(base_dir)?;
    let mut report = Report::new(SOFTWARE_NAME, env!("CARGO_PKG_VERSION"), "Outlier Detection Report");

    let mut plots_section = ReportSection::new("Feature Distributions");
    plots_section.add_plot(plots::plot_feature_boxplots(dataset, "Box Plots for Numerical Features"));
    report.add_section(plots_section);

    for (method, columns) in &outliers.detailed_results {
        let mut section = ReportSection::new(&format!("{} method", method.to_string().to_uppercase()));
        section.add_content(markup! {
            @if let Some(summary) = outliers.summary.get(method) {
                p {
                    (summary.total_outliers) " outliers across "
                    (summary.columns_with_outliers) " columns"
                }
            }
            table {
                tr { th { "Column" } th { "Outliers" } th { "Percentage" } }
                @for c in columns.iter().filter(|c| c.outlier_count > 0) {
                    tr {
                        td { (c.column) }
                        td { (c.outlier_count) }
                        td { (format!("{:.2}%", c.outlier_percentage)) }
                    }
                }
            }
        });
        report.add_section(section);
    }

    let mut recommendations = ReportSection::new("Recommendations");
    recommendations.add_content(markup! {
        ol {
            @for rec in &outliers.recommendations {
                li { (rec) }
            }
        }
    });
    report.add_section(recommendations);

    let path = dir.join("outlier_report.html");
    report.save_to_file(&path)?;
    log::info!("Outlier report saved to {}", path.display());
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dirs_in_the_same_second_do_not_collide() {
        let base = tempfile::tempdir().unwrap();
        let first = create_output_dir(base.path()).unwrap();
        let second = create_output_dir(base.path()).unwrap();
        let third = create_output_dir(base.path()).unwrap();
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(first.is_dir() && second.is_dir() && third.is_dir());
    }

    #[test]
    fn creates_missing_base_directory() {
        let base = tempfile::tempdir().unwrap();
        let nested = base.path().join("runs").join("today");
        let dir = create_output_dir(&nested).unwrap();
        assert!(dir.starts_with(&nested));
    }
}
