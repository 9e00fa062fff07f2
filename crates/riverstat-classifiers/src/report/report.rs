use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::{accuracy, confusion_matrix, ClassificationReport};
use crate::tuning::TrialConfig;

const TITLE: &str = "Ensemble_Model_Evaluation";

/// Held-out evaluation of the final ensemble, plus the search summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub generated_on: String,
    pub class_names: Vec<String>,
    /// True classes on rows, predictions on columns.
    pub confusion_matrix: Array2<usize>,
    pub classification: ClassificationReport,
    pub accuracy: f64,
    pub best_cv_accuracy: Option<f64>,
    pub best_config: Option<TrialConfig>,
}

impl EvaluationReport {
    pub fn new<S: AsRef<str>>(
        y_true: &Array1<usize>,
        y_pred: &Array1<usize>,
        class_names: &[S],
    ) -> Self {
        let class_names: Vec<String> = class_names.iter().map(|c| c.as_ref().to_string()).collect();
        EvaluationReport {
            generated_on: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            confusion_matrix: confusion_matrix(y_true, y_pred, class_names.len()),
            classification: ClassificationReport::new(y_true, y_pred, &class_names),
            accuracy: accuracy(y_true, y_pred),
            class_names,
            best_cv_accuracy: None,
            best_config: None,
        }
    }

    pub fn with_search(mut self, best_cv_accuracy: f64, best_config: TrialConfig) -> Self {
        self.best_cv_accuracy = Some(best_cv_accuracy);
        self.best_config = Some(best_config);
        self
    }

    fn render_confusion_matrix(&self) -> String {
        let width = self
            .class_names
            .iter()
            .map(String::len)
            .chain(self.confusion_matrix.iter().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1);

        let mut out = format!("{:width$}", "", width = width);
        for name in &self.class_names {
            let _ = write!(out, "  {:>width$}", name, width = width);
        }
        out.push('\n');
        for (name, row) in self.class_names.iter().zip(self.confusion_matrix.rows()) {
            let _ = write!(out, "{:<width$}", name, width = width);
            for count in row {
                let _ = write!(out, "  {:>width$}", count, width = width);
            }
            out.push('\n');
        }
        out
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== {} ===", TITLE);
        let _ = writeln!(out, "Generated on: {}\n", self.generated_on);
        let _ = writeln!(out, "--- Confusion Matrix ---");
        out.push_str(&self.render_confusion_matrix());
        let _ = writeln!(out, "\n--- Classification Report ---");
        out.push_str(&self.classification.to_string());
        let _ = writeln!(out, "\nAccuracy: {:.4}", self.accuracy);

        if let Some(best) = self.best_cv_accuracy {
            let _ = writeln!(out, "\n--- Hyperparameter Search ---");
            let _ = writeln!(out, "Best CV Accuracy: {:.4}", best);
        }
        if let Some(config) = &self.best_config {
            let params = serde_json::to_string_pretty(config).unwrap_or_default();
            let _ = writeln!(out, "Best Parameters:\n{}", params);
        }
        out
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.render())?;
        log::info!("Wrote evaluation report to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn report() -> EvaluationReport {
        EvaluationReport::new(
            &array![0, 0, 1, 1, 2],
            &array![0, 1, 1, 1, 2],
            &["Clean", "Polluted", "Slightly Polluted"],
        )
    }

    #[test]
    fn render_has_all_sections() {
        let text = report()
            .with_search(0.8125, TrialConfig::default())
            .render();
        assert!(text.starts_with("=== Ensemble_Model_Evaluation ===\nGenerated on: "));
        assert!(text.contains("--- Confusion Matrix ---"));
        assert!(text.contains("--- Classification Report ---"));
        assert!(text.contains("Accuracy: 0.8000"));
        assert!(text.contains("Best CV Accuracy: 0.8125"));
        assert!(text.contains("\"weights\""));
    }

    #[test]
    fn confusion_matrix_rows_are_labelled() {
        let table = report().render_confusion_matrix();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Clean"));
        assert!(lines[1].trim_end().ends_with('0'));
        assert!(lines[3].starts_with("Slightly Polluted"));
    }

    #[test]
    fn write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evaluation.txt");
        report().write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Accuracy: 0.8000"));
    }
}
