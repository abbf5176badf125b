use crate::errors::FitCvError;
use crate::utils::sigmoid;
use log::debug;
use serde::{Deserialize, Serialize};

const MAX_ITER: usize = 100;
const MIN_STEP: f64 = 1e-10;
const HESSIAN_RIDGE: f64 = 1e-12;
const GRADIENT_TOL: f64 = 1e-5;

/// Platt scaling: `p = 1 / (1 + exp(a * score + b))`.
///
/// Fitted by Newton's method with backtracking line search on Platt's smoothed
/// targets, which keeps `a` and `b` finite on separable data.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SigmoidCalibrator {
    pub a: f64,
    pub b: f64,
}

impl Default for SigmoidCalibrator {
    fn default() -> Self {
        SigmoidCalibrator { a: -1.0, b: 0.0 }
    }
}

// Negative log likelihood of the smoothed targets, written to avoid overflow.
fn objective(scores: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    scores
        .iter()
        .zip(targets)
        .map(|(f, t)| {
            let z = f * a + b;
            if z >= 0.0 {
                t * z + (-z).exp().ln_1p()
            } else {
                (t - 1.0) * z + z.exp().ln_1p()
            }
        })
        .sum()
}

impl SigmoidCalibrator {
    /// Fit on scores and binary (0/1) targets.
    ///
    /// * `scores` - Uncalibrated scores, typically probabilities of one class.
    /// * `targets` - 1.0 when the observation belongs to the class, else 0.0.
    pub fn fit(scores: &[f64], targets: &[f64]) -> Result<Self, FitCvError> {
        if scores.len() != targets.len() {
            return Err(FitCvError::ShapeMismatch(format!(
                "{} scores but {} targets passed to the sigmoid calibrator",
                scores.len(),
                targets.len()
            )));
        }
        if scores.is_empty() {
            return Err(FitCvError::EmptyData("sigmoid calibration needs at least one score".to_string()));
        }

        let n_pos = targets.iter().filter(|t| **t > 0.5).count() as f64;
        let n_neg = targets.len() as f64 - n_pos;
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let smoothed: Vec<f64> = targets.iter().map(|t| if *t > 0.5 { hi } else { lo }).collect();

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = objective(scores, &smoothed, a, b);

        for iteration in 0..MAX_ITER {
            let (mut h11, mut h22, mut h21) = (HESSIAN_RIDGE, HESSIAN_RIDGE, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (f, t) in scores.iter().zip(&smoothed) {
                // p = P(positive), q = 1 - p
                let p = sigmoid(-(f * a + b));
                let q = 1.0 - p;
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }
            if g1.abs() < GRADIENT_TOL && g2.abs() < GRADIENT_TOL {
                debug!("Sigmoid calibration converged after {} iterations.", iteration);
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let (new_a, new_b) = (a + step * da, b + step * db);
                let new_f = objective(scores, &smoothed, new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }
            if step < MIN_STEP {
                debug!("Sigmoid calibration line search stopped at iteration {}.", iteration);
                break;
            }
        }
        Ok(SigmoidCalibrator { a, b })
    }

    /// Map scores to calibrated probabilities.
    pub fn transform(&self, scores: &[f64]) -> Vec<f64> {
        scores.iter().map(|f| sigmoid(-(self.a * f + self.b))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_when_scores_informative() {
        let scores: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        // mostly separable at 0.5, with one flipped label on each side
        let targets: Vec<f64> = (0..40)
            .map(|i| match i {
                5 => 1.0,
                30 => 0.0,
                i if i >= 20 => 1.0,
                _ => 0.0,
            })
            .collect();
        let cal = SigmoidCalibrator::fit(&scores, &targets).unwrap();
        assert!(cal.a < 0.0);
        let out = cal.transform(&[0.0, 0.5, 1.0]);
        assert!(out[0] < out[1] && out[1] < out[2]);
        assert!(out.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_separable_stays_finite() {
        let scores = vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
        let targets = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let cal = SigmoidCalibrator::fit(&scores, &targets).unwrap();
        assert!(cal.a.is_finite() && cal.b.is_finite());
        let out = cal.transform(&scores);
        assert!(out[0] < 0.5 && out[5] > 0.5);
    }

    #[test]
    fn test_invalid_input() {
        assert!(SigmoidCalibrator::fit(&[], &[]).is_err());
        assert!(SigmoidCalibrator::fit(&[0.5, 0.2], &[1.0]).is_err());
    }
}
