//! Held-out evaluation: per-class precision / recall / F1 and ROC AUC.
//!
//! Metrics are reported to the caller; nothing here rejects a model.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub on_time: ClassMetrics,
    pub late: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    /// `None` when the held-out partition contains a single class.
    pub roc_auc: Option<f64>,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn class_metrics(truth: &[bool], predicted: &[bool], class: bool) -> ClassMetrics {
    let tp = truth.iter().zip(predicted).filter(|(t, p)| **t == class && **p == class).count();
    let predicted_pos = predicted.iter().filter(|p| **p == class).count();
    let support = truth.iter().filter(|t| **t == class).count();

    let precision = ratio(tp, predicted_pos);
    let recall = ratio(tp, support);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassMetrics { precision, recall, f1, support }
}

/// Area under the ROC curve via the rank-sum statistic, with tied scores
/// sharing their average rank.
pub fn roc_auc(truth: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = truth.iter().filter(|t| **t).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        pos_rank_sum += order[i..=j].iter().filter(|&&k| truth[k]).count() as f64 * avg_rank;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

impl EvaluationReport {
    /// `scores` are late probabilities; predictions use `threshold` inclusively.
    pub fn compute(truth: &[bool], scores: &[f64], threshold: f64) -> Self {
        let predicted: Vec<bool> = scores.iter().map(|s| *s >= threshold).collect();
        let on_time = class_metrics(truth, &predicted, false);
        let late = class_metrics(truth, &predicted, true);

        let correct = truth.iter().zip(&predicted).filter(|(t, p)| t == p).count();
        let total = truth.len();

        let macro_avg = ClassMetrics {
            precision: (on_time.precision + late.precision) / 2.0,
            recall: (on_time.recall + late.recall) / 2.0,
            f1: (on_time.f1 + late.f1) / 2.0,
            support: total,
        };
        let w = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                (f(&on_time) * on_time.support as f64 + f(&late) * late.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: w(|m| m.precision),
            recall: w(|m| m.recall),
            f1: w(|m| m.f1),
            support: total,
        };

        Self {
            on_time,
            late,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
            roc_auc: roc_auc(truth, scores),
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {:14} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (name, m) in [("on-time", &self.on_time), ("late", &self.late)] {
            writeln!(f, "  {:14} {:>10.2} {:>10.2} {:>10.2} {:>10}", name, m.precision, m.recall, m.f1, m.support)?;
        }
        writeln!(f)?;
        writeln!(f, "  {:14} {:>10} {:>10} {:>10.2} {:>10}", "accuracy", "", "", self.accuracy, self.macro_avg.support)?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(f, "  {:14} {:>10.2} {:>10.2} {:>10.2} {:>10}", name, m.precision, m.recall, m.f1, m.support)?;
        }
        writeln!(f)?;
        match self.roc_auc {
            Some(auc) => write!(f, "  ROC AUC: {:.4}", auc),
            None => write!(f, "  ROC AUC: undefined (single class in held-out rows)"),
        }
    }
}
