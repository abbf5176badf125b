use super::{CalibrationMethod, Calibrator};
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::FitCvError;
use crate::pipeline::{classes_from_proba, Classifier, Estimator, Predictor};
use crate::utils::sorted_unique;
use log::warn;

/// A fitted classifier with calibrated probabilities.
///
/// Built in prefit mode: the base classifier is already fitted and is never refit.
/// [`fit`](Estimator::fit) only learns one calibrator per class (one-vs-rest on the
/// base probabilities). With two classes only the positive class is calibrated and the
/// negative class is its complement. With more classes the calibrated scores are
/// normalized to sum to one.
#[derive(Debug, Clone)]
pub struct CalibratedClassifier<C> {
    base: C,
    method: CalibrationMethod,
    calibrators: Vec<Calibrator>,
    fitted: bool,
}

impl<C: Classifier> CalibratedClassifier<C> {
    /// Wrap an already-fitted classifier.
    ///
    /// * `base` - The fitted classifier. It is cloned, so the caller's copy is untouched.
    /// * `method` - How scores are mapped to probabilities.
    pub fn prefit(base: &C, method: CalibrationMethod) -> Self {
        CalibratedClassifier {
            base: base.clone(),
            method,
            calibrators: Vec::new(),
            fitted: false,
        }
    }

    pub fn base(&self) -> &C {
        &self.base
    }

    pub fn method(&self) -> CalibrationMethod {
        self.method
    }

    pub fn calibrators(&self) -> &[Calibrator] {
        &self.calibrators
    }

    // Columns of the base probabilities that get their own calibrator.
    fn calibrated_columns(&self) -> Vec<usize> {
        match self.base.classes().len() {
            0 | 1 => Vec::new(),
            2 => vec![1],
            n => (0..n).collect(),
        }
    }
}

impl<C: Classifier> Estimator for CalibratedClassifier<C> {
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64]) -> Result<(), FitCvError> {
        if !self.base.is_fitted() {
            return Err(FitCvError::NotFitted("CalibratedClassifier base classifier".to_string()));
        }
        if y.len() != x.rows {
            return Err(FitCvError::ShapeMismatch(format!(
                "target has {} values but the features have {} rows",
                y.len(),
                x.rows
            )));
        }
        if sorted_unique(y).len() < 2 {
            warn!("Calibration data contains a single class, calibrated probabilities will be degenerate.");
        }

        let proba = self.base.predict_proba(x)?;
        let classes = self.base.classes();
        let mut calibrators = Vec::new();
        for k in self.calibrated_columns() {
            let scores: Vec<f64> = (0..proba.rows).map(|i| *proba.get(i, k)).collect();
            let targets: Vec<f64> = y.iter().map(|v| if *v == classes[k] { 1.0 } else { 0.0 }).collect();
            calibrators.push(Calibrator::fit(self.method, &scores, &targets)?);
        }
        self.calibrators = calibrators;
        self.fitted = true;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}

impl<C: Classifier> Predictor for CalibratedClassifier<C> {
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, FitCvError> {
        let proba = self.predict_proba(x)?;
        Ok(classes_from_proba(self.base.classes(), &proba))
    }
}

impl<C: Classifier> Classifier for CalibratedClassifier<C> {
    fn classes(&self) -> &[f64] {
        self.base.classes()
    }

    fn predict_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError> {
        if !self.fitted {
            return Err(FitCvError::NotFitted("CalibratedClassifier".to_string()));
        }
        let proba = self.base.predict_proba(x)?;
        let (rows, cols) = (proba.rows, proba.cols);
        let columns = self.calibrated_columns();
        if columns.is_empty() {
            return Ok(proba);
        }

        let mut calibrated = vec![0.0; rows * cols];
        for (k, calibrator) in columns.iter().zip(&self.calibrators) {
            let scores: Vec<f64> = (0..rows).map(|i| *proba.get(i, *k)).collect();
            for (i, p) in calibrator.transform(&scores).into_iter().enumerate() {
                calibrated[i * cols + k] = p;
            }
        }

        if cols == 2 {
            for row in calibrated.chunks_mut(2) {
                row[0] = 1.0 - row[1];
            }
        } else {
            let uniform = 1.0 / cols as f64;
            for row in calibrated.chunks_mut(cols) {
                let total: f64 = row.iter().sum();
                if total > 0.0 {
                    row.iter_mut().for_each(|p| *p /= total);
                } else {
                    row.iter_mut().for_each(|p| *p = uniform);
                }
            }
        }
        Ok(RowMajorMatrix::new(calibrated, rows, cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{LogisticRegression, PriorClassifier};
    use approx::assert_abs_diff_eq;

    fn binary_data() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..30).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = (0..30).map(|i| if i < 15 { 0.0 } else { 1.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_binary_sigmoid() {
        let (x, y) = binary_data();
        let m = Matrix::new(&x, 30, 1);
        let mut base = LogisticRegression::default();
        base.fit(&m, &y).unwrap();
        let before = base.clone();

        let mut calibrated = CalibratedClassifier::prefit(&base, CalibrationMethod::Sigmoid);
        assert!(calibrated.predict_proba(&m).is_err());
        calibrated.fit(&m, &y).unwrap();
        assert_eq!(calibrated.calibrators().len(), 1);
        let proba = calibrated.predict_proba(&m).unwrap();
        for i in 0..proba.rows {
            assert_abs_diff_eq!(proba.row(i).iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        assert!(proba.get(29, 1) > proba.get(0, 1));
        // base is left as it was
        assert_eq!(base.intercept(), before.intercept());
    }

    #[test]
    fn test_multiclass_isotonic_normalized() {
        let x: Vec<f64> = (0..30).map(|i| (i as f64 - 14.5) / 5.0).collect();
        let y: Vec<f64> = (0..30).map(|i| (i / 10) as f64).collect();
        let m = Matrix::new(&x, 30, 1);
        let mut base = LogisticRegression::default();
        base.fit(&m, &y).unwrap();

        let mut calibrated = CalibratedClassifier::prefit(&base, CalibrationMethod::Isotonic);
        calibrated.fit(&m, &y).unwrap();
        assert_eq!(calibrated.calibrators().len(), 3);
        assert_eq!(calibrated.classes(), &[0.0, 1.0, 2.0]);
        let proba = calibrated.predict_proba(&m).unwrap();
        for i in 0..proba.rows {
            let row = proba.row(i);
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
        assert_eq!(calibrated.predict(&m).unwrap().len(), 30);
    }

    #[test]
    fn test_zero_rows_become_uniform() {
        // Priors are constant, so isotonic maps every row to the class frequency in the
        // calibration data. Calibrating on labels from a class the base never saw
        // gives zero for every known class.
        let x = vec![0.0; 6];
        let m = Matrix::new(&x, 6, 1);
        let mut base = PriorClassifier::default();
        base.fit(&m, &[0.0, 1.0, 2.0, 0.0, 1.0, 2.0]).unwrap();
        let mut calibrated = CalibratedClassifier::prefit(&base, CalibrationMethod::Isotonic);
        calibrated.fit(&m, &[5.0; 6]).unwrap();
        let proba = calibrated.predict_proba(&m).unwrap();
        for p in proba.data {
            assert_abs_diff_eq!(p, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unfitted_base_rejected() {
        let x = vec![0.0; 2];
        let m = Matrix::new(&x, 2, 1);
        let mut calibrated = CalibratedClassifier::prefit(&PriorClassifier::default(), CalibrationMethod::Sigmoid);
        assert!(matches!(calibrated.fit(&m, &[0.0, 1.0]), Err(FitCvError::NotFitted(_))));
    }
}
