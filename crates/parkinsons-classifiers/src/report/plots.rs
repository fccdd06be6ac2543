use ndarray::Array1;
use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, BoxPlot, HeatMap, Plot, Scatter};

use crate::data_handling::Dataset;
use crate::evaluation::{roc_curve, ConfusionMatrix, EvaluationResult};
use crate::feature_selection::FeatureSelection;

/// Bar chart of one metric across models.
pub fn plot_metric_bars(
    results: &[EvaluationResult],
    metric: &str,
    value: impl Fn(&EvaluationResult) -> f64,
) -> Plot {
    let names: Vec<String> = results.iter().map(|r| r.model.clone()).collect();
    let values: Vec<f64> = results.iter().map(value).collect();

    let mut plot = Plot::new();
    plot.add_trace(Bar::new(names, values).name(metric));
    plot.set_layout(
        Layout::new()
            .title(format!("Model {} Comparison", metric).as_str())
            .x_axis(Axis::new().title("Model"))
            .y_axis(Axis::new().title(metric)),
    );
    plot
}

/// One ROC curve per model on the test split, plus the chance diagonal.
pub fn plot_roc_curves(results: &[EvaluationResult], y_test: &Array1<usize>) -> Plot {
    let mut plot = Plot::new();
    for r in results {
        let scores = Array1::from_vec(r.probabilities.clone());
        let (fpr, tpr, _) = roc_curve(y_test, &scores);
        let label = match r.roc_auc {
            Some(auc) => format!("{} (AUC = {:.3})", r.model, auc),
            None => r.model.clone(),
        };
        plot.add_trace(Scatter::new(fpr, tpr).mode(Mode::Lines).name(&label));
    }

    let reference_line = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("red").dash(DashType::Dash));
    plot.add_trace(reference_line);

    plot.set_layout(
        Layout::new()
            .title("ROC Curves")
            .x_axis(Axis::new().title("False Positive Rate"))
            .y_axis(Axis::new().title("True Positive Rate")),
    );
    plot
}

pub fn plot_confusion_matrix(cm: &ConfusionMatrix, title: &str) -> Plot {
    let labels = vec!["Healthy".to_string(), "Parkinson's".to_string()];
    let mut plot = Plot::new();
    plot.add_trace(HeatMap::new(labels.clone(), labels, cm.as_rows()));
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Predicted"))
            .y_axis(Axis::new().title("Actual")),
    );
    plot
}

pub fn plot_feature_importance(selection: &FeatureSelection) -> Plot {
    let mut plot = Plot::new();
    plot.add_trace(
        Bar::new(selection.names(), selection.features.iter().map(|f| f.score).collect())
            .name("Score"),
    );
    plot.set_layout(
        Layout::new()
            .title(format!("Selected Features ({:?})", selection.method).as_str())
            .x_axis(Axis::new().title("Feature"))
            .y_axis(Axis::new().title("Score")),
    );
    plot
}

/// Box plot per feature column, for visual outlier inspection.
pub fn plot_feature_boxplots(dataset: &Dataset, title: &str) -> Plot {
    let mut plot = Plot::new();
    for (c, name) in dataset.feature_names.iter().enumerate() {
        let values: Vec<f64> = dataset.x.column(c).iter().copied().filter(|v| !v.is_nan()).collect();
        plot.add_trace(BoxPlot::new(values).name(name));
    }
    plot.set_layout(Layout::new().title(title).y_axis(Axis::new().title("Value")));
    plot
}
