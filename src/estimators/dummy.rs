use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::FitCvError;
use crate::pipeline::{Classifier, Estimator, Predictor};
use crate::utils::{position_in_sorted, sorted_unique};

/// Predicts the mean of the training targets for every row.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    mean: Option<f64>,
}

impl MeanRegressor {
    /// The fitted mean, if fitted.
    pub fn mean(&self) -> Option<f64> {
        self.mean
    }
}

impl Estimator for MeanRegressor {
    fn fit(&mut self, _x: &Matrix<f64>, y: &[f64]) -> Result<(), FitCvError> {
        if y.is_empty() {
            return Err(FitCvError::EmptyData("MeanRegressor needs at least one target".to_string()));
        }
        self.mean = Some(y.iter().sum::<f64>() / y.len() as f64);
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }
}

impl Predictor for MeanRegressor {
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, FitCvError> {
        let mean = self
            .mean
            .ok_or_else(|| FitCvError::NotFitted("MeanRegressor".to_string()))?;
        Ok(vec![mean; x.rows])
    }
}

/// Predicts the class frequencies of the training targets for every row.
#[derive(Debug, Clone, Default)]
pub struct PriorClassifier {
    classes: Vec<f64>,
    priors: Vec<f64>,
}

impl PriorClassifier {
    pub fn priors(&self) -> &[f64] {
        &self.priors
    }
}

impl Estimator for PriorClassifier {
    fn fit(&mut self, _x: &Matrix<f64>, y: &[f64]) -> Result<(), FitCvError> {
        if y.is_empty() {
            return Err(FitCvError::EmptyData("PriorClassifier needs at least one target".to_string()));
        }
        let classes = sorted_unique(y);
        let mut counts = vec![0usize; classes.len()];
        for v in y {
            if let Some(k) = position_in_sorted(&classes, *v) {
                counts[k] += 1;
            }
        }
        let n = y.len() as f64;
        self.priors = counts.iter().map(|c| *c as f64 / n).collect();
        self.classes = classes;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}

impl Predictor for PriorClassifier {
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, FitCvError> {
        let proba = self.predict_proba(x)?;
        Ok(crate::pipeline::classes_from_proba(&self.classes, &proba))
    }
}

impl Classifier for PriorClassifier {
    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn predict_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError> {
        if !self.is_fitted() {
            return Err(FitCvError::NotFitted("PriorClassifier".to_string()));
        }
        let data = (0..x.rows).flat_map(|_| self.priors.iter().copied()).collect();
        Ok(RowMajorMatrix::new(data, x.rows, self.classes.len()))
    }
}
