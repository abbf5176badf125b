//! Pipeline
//!
//! Capability traits for estimators and transformers, and [`Pipeline`], which chains
//! a preprocessing transformer in front of an estimator.
use crate::data::{DenseMatrix, Matrix, RowMajorMatrix};
use crate::errors::FitCvError;
use crate::preprocessing::Passthrough;

/// Anything that can be fitted to features and a target.
///
/// Cloning an estimator yields an independent copy; the cross-validated fits clone the
/// template once per split, so no fitted state is shared between parallel jobs.
pub trait Estimator: Clone + Send + Sync {
    /// Fit on features `x` and target `y`.
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64]) -> Result<(), FitCvError>;

    /// Whether [`fit`](Self::fit) has completed successfully.
    fn is_fitted(&self) -> bool;
}

/// An estimator producing one point prediction per row.
pub trait Predictor: Estimator {
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, FitCvError>;
}

/// A predictor over a discrete set of classes that can score each class.
pub trait Classifier: Predictor {
    /// Classes seen during fit, sorted ascending. Columns of the probability
    /// matrices follow this order.
    fn classes(&self) -> &[f64];

    /// Class probabilities, one row per observation and one column per class.
    fn predict_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError>;

    /// Natural log of [`predict_proba`](Self::predict_proba).
    fn predict_log_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError> {
        Ok(self.predict_proba(x)?.map(|p| p.ln()))
    }
}

/// A preprocessing stage.
pub trait Transformer: Clone + Send + Sync {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<(), FitCvError>;

    fn transform(&self, x: &Matrix<f64>) -> Result<DenseMatrix<f64>, FitCvError>;

    fn fit_transform(&mut self, x: &Matrix<f64>) -> Result<DenseMatrix<f64>, FitCvError> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Pick the most probable class of every row.
pub fn classes_from_proba(classes: &[f64], proba: &RowMajorMatrix<f64>) -> Vec<f64> {
    (0..proba.rows)
        .map(|i| {
            let row = proba.row(i);
            let best = row
                .iter()
                .enumerate()
                .fold(0, |best, (j, p)| if *p > row[best] { j } else { best });
            classes[best]
        })
        .collect()
}

/// A preprocessing stage followed by an estimator.
#[derive(Debug, Clone)]
pub struct Pipeline<E, T = Passthrough> {
    preprocessing: T,
    estimator: E,
}

impl<E> Pipeline<E, Passthrough> {
    /// A pipeline without preprocessing.
    pub fn new(estimator: E) -> Self {
        Pipeline {
            preprocessing: Passthrough,
            estimator,
        }
    }
}

impl<E, T> Pipeline<E, T> {
    pub fn with_preprocessing(preprocessing: T, estimator: E) -> Self {
        Pipeline {
            preprocessing,
            estimator,
        }
    }

    pub fn preprocessing(&self) -> &T {
        &self.preprocessing
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }
}

impl<E: Estimator, T: Transformer> Estimator for Pipeline<E, T> {
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64]) -> Result<(), FitCvError> {
        let xt = self.preprocessing.fit_transform(x)?;
        self.estimator.fit(&xt.as_matrix(), y)
    }

    fn is_fitted(&self) -> bool {
        self.estimator.is_fitted()
    }
}

impl<E: Predictor, T: Transformer> Predictor for Pipeline<E, T> {
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, FitCvError> {
        let xt = self.preprocessing.transform(x)?;
        self.estimator.predict(&xt.as_matrix())
    }
}

impl<E: Classifier, T: Transformer> Classifier for Pipeline<E, T> {
    fn classes(&self) -> &[f64] {
        self.estimator.classes()
    }

    fn predict_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError> {
        let xt = self.preprocessing.transform(x)?;
        self.estimator.predict_proba(&xt.as_matrix())
    }

    fn predict_log_proba(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, FitCvError> {
        let xt = self.preprocessing.transform(x)?;
        self.estimator.predict_log_proba(&xt.as_matrix())
    }
}

/// A classifier that can be taken apart into its preprocessing and classifier stages,
/// so the classifier can be wrapped (e.g. calibrated) and put back together.
pub trait ClassificationPipeline: Classifier {
    type Preprocessing: Transformer;
    type Classifier: Classifier;

    fn preprocessing_stage(&self) -> &Self::Preprocessing;

    fn classifier_stage(&self) -> &Self::Classifier;
}

impl<C: Classifier, T: Transformer> ClassificationPipeline for Pipeline<C, T> {
    type Preprocessing = T;
    type Classifier = C;

    fn preprocessing_stage(&self) -> &T {
        &self.preprocessing
    }

    fn classifier_stage(&self) -> &C {
        &self.estimator
    }
}
