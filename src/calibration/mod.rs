//! Calibration
//!
//! Probability calibration for fitted classifiers. A [`CalibratedClassifier`] wraps an
//! already-fitted classifier and learns, on held-out rows, a monotone map from the
//! classifier's scores to calibrated probabilities.
//!
//! # Submodules
//!
//! * `sigmoid`: Platt scaling.
//! * `isotonic`: Isotonic regression via pool adjacent violators.
//! * `classifier`: The prefit calibration adapter.

mod classifier;
mod isotonic;
mod sigmoid;

pub use classifier::CalibratedClassifier;
pub use isotonic::IsotonicCalibrator;
pub use sigmoid::SigmoidCalibrator;

use crate::errors::FitCvError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Method used to map classifier scores to calibrated probabilities.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMethod {
    /// Platt scaling, a logistic fit of the scores.
    Sigmoid,
    /// Non-parametric monotone fit of the scores.
    Isotonic,
}

impl FromStr for CalibrationMethod {
    type Err = FitCvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sigmoid" => Ok(CalibrationMethod::Sigmoid),
            "isotonic" => Ok(CalibrationMethod::Isotonic),
            _ => Err(FitCvError::ParseString(
                s.to_string(),
                "CalibrationMethod".to_string(),
                items_to_strings(vec!["sigmoid", "isotonic"]),
            )),
        }
    }
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationMethod::Sigmoid => write!(f, "sigmoid"),
            CalibrationMethod::Isotonic => write!(f, "isotonic"),
        }
    }
}

/// A fitted one-dimensional calibrator of either kind.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Calibrator {
    Sigmoid(SigmoidCalibrator),
    Isotonic(IsotonicCalibrator),
}

impl Calibrator {
    /// Fit a calibrator of the given kind on scores and binary targets.
    pub fn fit(method: CalibrationMethod, scores: &[f64], targets: &[f64]) -> Result<Self, FitCvError> {
        match method {
            CalibrationMethod::Sigmoid => Ok(Calibrator::Sigmoid(SigmoidCalibrator::fit(scores, targets)?)),
            CalibrationMethod::Isotonic => Ok(Calibrator::Isotonic(IsotonicCalibrator::fit(scores, targets)?)),
        }
    }

    pub fn transform(&self, scores: &[f64]) -> Vec<f64> {
        match self {
            Calibrator::Sigmoid(c) => c.transform(scores),
            Calibrator::Isotonic(c) => c.transform(scores),
        }
    }
}
