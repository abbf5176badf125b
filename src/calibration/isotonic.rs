use crate::errors::FitCvError;
use serde::{Deserialize, Serialize};

/// Monotone non-decreasing map from scores to probabilities.
///
/// Fitted with the pool adjacent violators algorithm. Each pooled block contributes
/// one knot at its mean score; scores between knots are interpolated linearly and
/// scores outside the knots take the value of the nearest end.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IsotonicCalibrator {
    /// Knot positions (mean score of each pooled block), increasing.
    pub thresholds: Vec<f64>,
    /// Calibrated value at each knot, non-decreasing and within [0, 1].
    pub values: Vec<f64>,
}

// A pooled block: (sum of targets, count, sum of scores).
type Block = (f64, f64, f64);

impl IsotonicCalibrator {
    /// Fit on scores and binary (0/1) targets.
    ///
    /// * `scores` - Uncalibrated scores, typically probabilities of one class.
    /// * `targets` - 1.0 when the observation belongs to the class, else 0.0.
    pub fn fit(scores: &[f64], targets: &[f64]) -> Result<Self, FitCvError> {
        if scores.len() != targets.len() {
            return Err(FitCvError::ShapeMismatch(format!(
                "{} scores but {} targets passed to the isotonic calibrator",
                scores.len(),
                targets.len()
            )));
        }
        if scores.is_empty() {
            return Err(FitCvError::EmptyData("isotonic calibration needs at least one score".to_string()));
        }

        let mut data: Vec<(f64, f64)> = scores.iter().copied().zip(targets.iter().copied()).collect();
        data.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut blocks: Vec<Block> = Vec::with_capacity(data.len());
        for (score, target) in data {
            let (mut sum_y, mut count, mut sum_x) = (target, 1.0, score);
            while let Some(&(prev_y, prev_count, prev_x)) = blocks.last() {
                if prev_y / prev_count > sum_y / count {
                    sum_y += prev_y;
                    count += prev_count;
                    sum_x += prev_x;
                    blocks.pop();
                } else {
                    break;
                }
            }
            blocks.push((sum_y, count, sum_x));
        }

        let (thresholds, values) = blocks
            .into_iter()
            .map(|(sum_y, count, sum_x)| (sum_x / count, (sum_y / count).clamp(0.0, 1.0)))
            .unzip();
        Ok(IsotonicCalibrator { thresholds, values })
    }

    /// Map scores through the fitted function.
    pub fn transform(&self, scores: &[f64]) -> Vec<f64> {
        scores.iter().map(|s| self.transform_one(*s)).collect()
    }

    fn transform_one(&self, score: f64) -> f64 {
        let (first, last) = match (self.thresholds.first(), self.thresholds.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return score.clamp(0.0, 1.0),
        };
        let n = self.values.len();
        if score <= first {
            return self.values[0];
        }
        if score >= last {
            return self.values[n - 1];
        }
        // first < score < last, so idx is in 1..n
        let idx = self.thresholds.partition_point(|t| *t < score);
        if self.thresholds[idx] == score {
            return self.values[idx];
        }
        let (x0, x1) = (self.thresholds[idx - 1], self.thresholds[idx]);
        let (y0, y1) = (self.values[idx - 1], self.values[idx]);
        y0 + (y1 - y0) * (score - x0) / (x1 - x0)
    }
}
