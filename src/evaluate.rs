//! Accuracy, per-class precision/recall/F1 and their averages.

use crate::error::{PipelineError, Result};
use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true instances of the class.
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub accuracy: f64,
    /// One entry per label seen in the truth or the predictions, sorted.
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    /// Rows are true classes, columns predicted classes, both in `classes` order.
    pub confusion: Array2<usize>,
}

impl EvaluationReport {
    pub fn class(&self, label: usize) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }

    pub fn total(&self) -> usize {
        self.macro_avg.support
    }
}

/// `num / den`, or 0 when the denominator is 0.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

pub fn evaluate(truth: &[usize], predicted: &[usize]) -> Result<EvaluationReport> {
    if truth.len() != predicted.len() {
        return Err(PipelineError::Evaluation(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(PipelineError::EmptyFold { stage: "evaluate" });
    }

    let mut labels: Vec<usize> = truth.iter().chain(predicted).copied().collect();
    labels.sort_unstable();
    labels.dedup();
    let position = |label: usize| labels.binary_search(&label).unwrap_or(0);

    let k = labels.len();
    let mut confusion = Array2::<usize>::zeros((k, k));
    for (&t, &p) in truth.iter().zip(predicted) {
        confusion[[position(t), position(p)]] += 1;
    }

    let total = truth.len();
    let correct: usize = (0..k).map(|i| confusion[[i, i]]).sum();

    let classes: Vec<ClassMetrics> = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| {
            let tp = confusion[[i, i]] as f64;
            let predicted_count = confusion.column(i).sum() as f64;
            let support = confusion.row(i).sum();
            let precision = ratio(tp, predicted_count);
            let recall = ratio(tp, support as f64);
            let f1 = ratio(2.0 * precision * recall, precision + recall);
            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    let n_classes = k as f64;
    let macro_avg = AverageMetrics {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / n_classes,
        support: total,
    };
    let weight = |c: &ClassMetrics| c.support as f64 / total as f64;
    let weighted_avg = AverageMetrics {
        precision: classes.iter().map(|c| c.precision * weight(c)).sum(),
        recall: classes.iter().map(|c| c.recall * weight(c)).sum(),
        f1: classes.iter().map(|c| c.f1 * weight(c)).sum(),
        support: total,
    };

    Ok(EvaluationReport {
        accuracy: correct as f64 / total as f64,
        classes,
        macro_avg,
        weighted_avg,
        confusion,
    })
}
