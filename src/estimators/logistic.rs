//! Multinomial logistic regression fitted by full-batch gradient descent.
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::FitCvError;
use crate::pipeline::{classes_from_proba, Classifier, Estimator, Predictor};
use crate::utils::{
    position_in_sorted, sorted_unique, validate_float_parameter, validate_n_features, validate_positive_float_parameter,
};
use log::debug;

/// Softmax (multinomial) logistic regression with L2 regularization.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    learning_rate: f64,
    max_iter: usize,
    l2: f64,
    tol: f64,
    classes: Vec<f64>,
    // n_classes x n_features, row major
    coef: Vec<f64>,
    intercept: Vec<f64>,
    n_features: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        LogisticRegression {
            learning_rate: 0.5,
            max_iter: 500,
            l2: 1e-4,
            tol: 1e-6,
            classes: Vec::new(),
            coef: Vec::new(),
            intercept: Vec::new(),
            n_features: 0,
        }
    }
}

impl LogisticRegression {
    /// Set the gradient descent step size.
    pub fn set_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the maximum number of gradient descent iterations.
    pub fn set_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the L2 penalty on the coefficients (not the intercepts).
    pub fn set_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    /// Stop once the largest absolute gradient falls below `tol`.
    pub fn set_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Coefficients of class `k`, one per feature.
    pub fn coef(&self, k: usize) -> &[f64] {
        &self.coef[k * self.n_features..(k + 1) * self.n_features]
    }

    pub fn intercept(&self) -> &[f64] {
        &self.intercept
    }

    fn validate_parameters(&self) -> Result<(), FitCvError> {
        validate_positive_float_parameter(self.learning_rate, "learning_rate")?;
        validate_positive_float_parameter(self.tol, "tol")?;
        validate_float_parameter(self.l2, 0.0, f64::INFINITY, "l2")
    }

    // Softmax probabilities for every row, written into `proba` (row major).
    fn softmax_into(&self, x: &Matrix<f64>, proba: &mut [f64]) {
        let k = self.classes.len();
        for i in 0..x.rows {
            let row = &mut proba[i * k..(i + 1) * k];
            for (c, z) in row.iter_mut().enumerate() {
                *z = self.intercept[c]
                    + self
                        .coef(c)
                        .iter()
                        .enumerate()
                        .map(|(j, w)| w * x.get(i, j))
                        .sum::<f64>();
            }
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mut total = 0.0;
            for z in row.iter_mut() {
                *z = (*z - max).exp();
                total += *z;
            }
            for p in row.iter_mut() {
                *p /= total;
            }
        }
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64]) -> Result<(), FitCvError> {
        self.validate_parameters()?;
        if y.is_empty() {
            return Err(FitCvError::EmptyData("LogisticRegression needs at least one row".to_string()));
        }
        if x.rows != y.len() {
            return Err(FitCvError::ShapeMismatch(format!(
                "target has {} values but the features have {} rows",
                y.len(),
                x.rows
            )));
        }

        let classes = sorted_unique(y);
        let (n, p, k) = (x.rows, x.cols, classes.len());
        let labels: Vec<usize> = y
            .iter()
            .map(|v| position_in_sorted(&classes, *v).unwrap_or(0))
            .collect();

        self.classes = classes;
        self.n_features = p;
        self.coef = vec![0.0; k * p];
        self.intercept = vec![0.0; k];
        if k == 1 {
            return Ok(());
        }

        let mut proba = vec![0.0; n * k];
        let mut grad_coef = vec![0.0; k * p];
        let mut grad_intercept = vec![0.0; k];
        let n_f = n as f64;
        for iteration in 0..self.max_iter {
            self.softmax_into(x, &mut proba);
            grad_coef.iter_mut().for_each(|g| *g = 0.0);
            grad_intercept.iter_mut().for_each(|g| *g = 0.0);
            for (i, label) in labels.iter().enumerate() {
                for c in 0..k {
                    let residual = proba[i * k + c] - if c == *label { 1.0 } else { 0.0 };
                    grad_intercept[c] += residual / n_f;
                    for j in 0..p {
                        grad_coef[c * p + j] += residual * x.get(i, j) / n_f;
                    }
                }
            }
            for (g, w) in grad_coef.iter_mut().zip(&self.coef) {
                *g += self.l2 * w;
            }

            let max_grad = grad_coef
                .iter()
                .chain(&grad_intercept)
                .fold(0.0f64, |m, g| m.max(g.abs()));
            if max_grad < self.tol {
                debug!("LogisticRegression converged after {} iterations.", iteration);
                break;
            }
            for (w, g) in self.coef.iter_mut().zip(&grad_coef) {
                *w -= self.learning_rate * g;
            }
            for (b, g) in self.intercept.iter_mut().zip(&grad_intercept) {
                *b -= self.learning_rate * g;
            }
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}

impl Predictor for LogisticRegression {
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, FitCvError> {
        let proba = self.predict_proba(x)?;
        Ok(classes_from_proba(&self.classes, &proba))
    }
}

impl Classifier for LogisticRegression {
    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn predict_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError> {
        if !self.is_fitted() {
            return Err(FitCvError::NotFitted("LogisticRegression".to_string()));
        }
        validate_n_features(self.n_features, x.cols, "LogisticRegression")?;
        let k = self.classes.len();
        let mut proba = vec![0.0; x.rows * k];
        self.softmax_into(x, &mut proba);
        Ok(RowMajorMatrix::new(proba, x.rows, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..20).map(|i| (i as f64 - 9.5) / 2.0).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 1.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_binary_fit() {
        let (x, y) = separable();
        let m = Matrix::new(&x, 20, 1);
        let mut model = LogisticRegression::default().set_learning_rate(0.05).set_max_iter(2000);
        model.fit(&m, &y).unwrap();
        assert!(model.coef(1)[0] > model.coef(0)[0]);
        assert_eq!(model.predict(&m).unwrap(), y);
        let proba = model.predict_proba(&m).unwrap();
        for i in 0..proba.rows {
            assert!((proba.row(i).iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_three_classes() {
        let x: Vec<f64> = (0..30).map(|i| (i as f64 - 14.5) / 5.0).collect();
        let y: Vec<f64> = (0..30).map(|i| (i / 10) as f64 * 5.0).collect();
        let m = Matrix::new(&x, 30, 1);
        let mut model = LogisticRegression::default().set_max_iter(2000);
        model.fit(&m, &y).unwrap();
        assert_eq!(model.classes(), &[0.0, 5.0, 10.0]);
        let proba = model.predict_proba(&m).unwrap();
        assert_eq!(proba.cols, 3);
        assert!(proba.row(0)[0] > proba.row(0)[2]);
        assert!(proba.row(29)[2] > proba.row(29)[0]);
    }

    #[test]
    fn test_single_class() {
        let x = vec![1.0, 2.0];
        let m = Matrix::new(&x, 2, 1);
        let mut model = LogisticRegression::default();
        model.fit(&m, &[1.0, 1.0]).unwrap();
        assert_eq!(model.predict_proba(&m).unwrap().data, vec![1.0, 1.0]);
        assert_eq!(model.predict(&m).unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_invalid_parameters() {
        let (x, y) = separable();
        let m = Matrix::new(&x, 20, 1);
        let mut model = LogisticRegression::default().set_learning_rate(-1.0);
        assert!(matches!(model.fit(&m, &y), Err(FitCvError::InvalidParameter(..))));
        assert!(LogisticRegression::default().predict(&m).is_err());
    }
}
