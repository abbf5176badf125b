use crate::errors::FitCvError;
use std::cmp::Ordering;

/// Create a string of all available items.
pub fn items_to_strings(items: Vec<&str>) -> String {
    items.join(", ")
}

/// Render a label (class or category value) for use in a column name.
///
/// Integral values print without a fractional part, so class `1.0` becomes `"1"`.
pub fn format_label(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// -0.0 and 0.0 are the same label.
#[inline]
fn canonical_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Sorted distinct values, using a total order so NaN is a value like any other.
/// Negative zero is folded into zero.
pub fn sorted_unique(values: &[f64]) -> Vec<f64> {
    let mut unique: Vec<f64> = values.iter().map(|v| canonical_zero(*v)).collect();
    unique.sort_by(|a, b| a.total_cmp(b));
    unique.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    unique
}

/// Position of `value` in a list produced by [`sorted_unique`].
pub fn position_in_sorted(sorted: &[f64], value: f64) -> Option<usize> {
    let value = canonical_zero(value);
    sorted.binary_search_by(|v| v.total_cmp(&value)).ok()
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), FitCvError> {
    if value.is_nan() || value <= 0.0 || value.is_infinite() {
        Err(FitCvError::InvalidParameter(
            parameter.to_string(),
            "a positive, finite real value".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), FitCvError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(FitCvError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Check that a fitted object sees the number of columns it was fitted on.
pub fn validate_n_features(expected: usize, found: usize, what: &str) -> Result<(), FitCvError> {
    if expected == found {
        Ok(())
    } else {
        Err(FitCvError::ShapeMismatch(format!(
            "{} was fitted on {} features but received {}",
            what, expected, found
        )))
    }
}

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
