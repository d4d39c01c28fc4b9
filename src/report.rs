//! Text rendering of per-variant results.

use crate::evaluate::{AverageMetrics, EvaluationReport};
use crate::pipeline::VariantOutcome;
use std::fmt::Write;

/// Receives each variant's outcome as soon as it is available.
pub trait Sink {
    fn emit(&mut self, outcome: &VariantOutcome);
}

/// Prints rendered blocks to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&mut self, outcome: &VariantOutcome) {
        println!("{}", render(outcome));
    }
}

/// Collects rendered blocks in memory.
impl Sink for Vec<String> {
    fn emit(&mut self, outcome: &VariantOutcome) {
        self.push(render(outcome));
    }
}

const LABEL_WIDTH: usize = 12;

pub fn render(outcome: &VariantOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Training and evaluating: {} ---", outcome.name);
    match &outcome.result {
        Ok(report) => {
            let _ = writeln!(out, "Accuracy: {:.2}", report.evaluation.accuracy);
            let _ = writeln!(out, "Classification report (training fold balanced):");
            out.push_str(&classification_table(&report.evaluation));
        }
        Err(e) => {
            let _ = writeln!(out, "Failed during {}: {}", e.stage(), e);
        }
    }
    out
}

/// Per-class table followed by accuracy, macro and weighted rows.
pub fn classification_table(report: &EvaluationReport) -> String {
    let width = report
        .classes
        .iter()
        .map(|c| c.label.to_string().len())
        .max()
        .unwrap_or(0)
        .max(LABEL_WIDTH);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
        "", "precision", "recall", "f1-score", "support"
    );
    out.push('\n');
    for c in &report.classes {
        let _ = writeln!(
            out,
            "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
            c.label, c.precision, c.recall, c.f1, c.support
        );
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
        "accuracy",
        "",
        "",
        report.accuracy,
        report.total()
    );
    average_row(&mut out, "macro avg", &report.macro_avg, width);
    average_row(&mut out, "weighted avg", &report.weighted_avg, width);
    out
}

fn average_row(out: &mut String, name: &str, avg: &AverageMetrics, width: usize) {
    let _ = writeln!(
        out,
        "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
        name, avg.precision, avg.recall, avg.f1, avg.support
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::evaluate::evaluate;
    use crate::pipeline::VariantReport;
    use crate::resample::BalanceSummary;

    fn outcome() -> VariantOutcome {
        let truth = [1, 1, 1, 0, 0, 0, 0, 0];
        let predicted = [1, 1, 0, 1, 0, 0, 0, 0];
        VariantOutcome {
            name: "Random Forest".into(),
            result: Ok(VariantReport {
                evaluation: evaluate(&truth, &predicted).unwrap(),
                balance: BalanceSummary {
                    before: vec![5, 3],
                    after: vec![5, 5],
                },
                n_features: 4,
            }),
        }
    }

    #[test]
    fn test_render_block() {
        let text = render(&outcome());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "--- Training and evaluating: Random Forest ---");
        assert_eq!(lines[1], "Accuracy: 0.75");
        assert_eq!(
            lines[3],
            "              precision    recall  f1-score   support"
        );
        assert_eq!(
            lines[5],
            "           0       0.80      0.80      0.80         5"
        );
        assert_eq!(
            lines[6],
            "           1       0.67      0.67      0.67         3"
        );
        assert_eq!(
            lines[8],
            "    accuracy                           0.75         8"
        );
        assert!(lines[9].starts_with("   macro avg"));
        assert!(lines[10].starts_with("weighted avg"));
    }

    #[test]
    fn test_render_failure() {
        let failed = VariantOutcome {
            name: "Gradient Boosting".into(),
            result: Err(PipelineError::ModelFit {
                model: "Gradient Boosting".into(),
                reason: "Training data is empty".into(),
            }),
        };
        let text = render(&failed);
        assert!(text.contains("Failed during fit: fitting `Gradient Boosting` failed"));
        assert!(!text.contains("Accuracy"));
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<String> = Vec::new();
        sink.emit(&outcome());
        assert_eq!(sink.len(), 1);
        assert!(sink[0].contains("weighted avg"));
    }
}
