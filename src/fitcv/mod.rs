//! Cross-validated Fits
//!
//! Fit one copy of a pipeline per split of a cross validator, and collect the
//! out-of-sample outputs of those fits.
//!
//! * [`EstimatorFitCV`] fits the models.
//! * [`PredictorFitCV`] (alias [`RegressorFitCV`]) adds point predictions.
//! * [`ClassifierFitCV`] adds class probabilities and optional calibration.
//!
//! Each layer contains the one before it, and the capability traits [`FitCV`],
//! [`PredictFitCV`] and [`ProbaFitCV`] let code be written against whichever layer it
//! needs. Every result is computed on first use and then kept.

mod classifier;
mod estimator;
mod predictor;

pub use classifier::{CalibratedPipeline, ClassifierFitCV};
pub use estimator::EstimatorFitCV;
pub use predictor::{PredictorFitCV, RegressorFitCV};

use crate::data::{Sample, Series};
use crate::errors::FitCvError;
use crate::pipeline::{ClassificationPipeline, Estimator, Predictor};
use crate::splitter::CrossValidator;
use crate::table::SplitTable;
use std::sync::Arc;

/// Models fitted per split.
pub trait FitCV {
    type Pipeline: Estimator;

    /// Number of splits the cross validator reports for the sample.
    fn n_splits(&self) -> usize;

    /// The sample the training and test sets are drawn from.
    fn sample(&self) -> &Arc<Sample>;

    /// Fit all models, unless that has already happened.
    fn fit_all(&self) -> Result<&[Self::Pipeline], FitCvError>;

    /// The model fitted for a split.
    fn model(&self, split_id: usize) -> Result<&Self::Pipeline, FitCvError>;

    /// A copy drawing from another sample, with every cached result discarded.
    fn copy_with_sample(&self, sample: Arc<Sample>) -> Self
    where
        Self: Sized;
}

/// Models fitted per split that predict their held-out rows.
pub trait PredictFitCV: FitCV {
    fn predictions_for_all_splits(&self) -> Result<&SplitTable, FitCvError>;

    fn predictions_for_split(&self, split_id: usize) -> Result<Series, FitCvError>;

    fn targets_for_split(&self, split_id: usize) -> Result<Series, FitCvError>;
}

/// Models fitted per split that score each class on their held-out rows.
pub trait ProbaFitCV: PredictFitCV {
    fn probabilities_for_all_splits(&self) -> Result<&SplitTable, FitCvError>;

    fn log_probabilities_for_all_splits(&self) -> Result<&SplitTable, FitCvError>;
}

impl<P: Estimator, CV: CrossValidator + ?Sized> FitCV for EstimatorFitCV<P, CV> {
    type Pipeline = P;

    fn n_splits(&self) -> usize {
        EstimatorFitCV::n_splits(self)
    }

    fn sample(&self) -> &Arc<Sample> {
        EstimatorFitCV::sample(self)
    }

    fn fit_all(&self) -> Result<&[P], FitCvError> {
        EstimatorFitCV::fit_all(self)
    }

    fn model(&self, split_id: usize) -> Result<&P, FitCvError> {
        EstimatorFitCV::model(self, split_id)
    }

    fn copy_with_sample(&self, sample: Arc<Sample>) -> Self {
        EstimatorFitCV::copy_with_sample(self, sample)
    }
}

impl<P: Predictor, CV: CrossValidator + ?Sized> FitCV for PredictorFitCV<P, CV> {
    type Pipeline = P;

    fn n_splits(&self) -> usize {
        PredictorFitCV::n_splits(self)
    }

    fn sample(&self) -> &Arc<Sample> {
        PredictorFitCV::sample(self)
    }

    fn fit_all(&self) -> Result<&[P], FitCvError> {
        PredictorFitCV::fit_all(self)
    }

    fn model(&self, split_id: usize) -> Result<&P, FitCvError> {
        PredictorFitCV::model(self, split_id)
    }

    fn copy_with_sample(&self, sample: Arc<Sample>) -> Self {
        PredictorFitCV::copy_with_sample(self, sample)
    }
}

impl<P: Predictor, CV: CrossValidator + ?Sized> PredictFitCV for PredictorFitCV<P, CV> {
    fn predictions_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        PredictorFitCV::predictions_for_all_splits(self)
    }

    fn predictions_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        PredictorFitCV::predictions_for_split(self, split_id)
    }

    fn targets_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        PredictorFitCV::targets_for_split(self, split_id)
    }
}

impl<P: ClassificationPipeline, CV: CrossValidator + ?Sized> FitCV for ClassifierFitCV<P, CV> {
    type Pipeline = P;

    fn n_splits(&self) -> usize {
        ClassifierFitCV::n_splits(self)
    }

    fn sample(&self) -> &Arc<Sample> {
        ClassifierFitCV::sample(self)
    }

    fn fit_all(&self) -> Result<&[P], FitCvError> {
        ClassifierFitCV::fit_all(self)
    }

    fn model(&self, split_id: usize) -> Result<&P, FitCvError> {
        ClassifierFitCV::model(self, split_id)
    }

    fn copy_with_sample(&self, sample: Arc<Sample>) -> Self {
        ClassifierFitCV::copy_with_sample(self, sample)
    }
}

impl<P: ClassificationPipeline, CV: CrossValidator + ?Sized> PredictFitCV for ClassifierFitCV<P, CV> {
    fn predictions_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        ClassifierFitCV::predictions_for_all_splits(self)
    }

    fn predictions_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        ClassifierFitCV::predictions_for_split(self, split_id)
    }

    fn targets_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        ClassifierFitCV::targets_for_split(self, split_id)
    }
}

impl<P: ClassificationPipeline, CV: CrossValidator + ?Sized> ProbaFitCV for ClassifierFitCV<P, CV> {
    fn probabilities_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        ClassifierFitCV::probabilities_for_all_splits(self)
    }

    fn log_probabilities_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        ClassifierFitCV::log_probabilities_for_all_splits(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{MeanRegressor, PriorClassifier};
    use crate::pipeline::Pipeline;
    use crate::splitter::KFold;

    fn sample() -> Arc<Sample> {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        Arc::new(Sample::from_rows(&rows, vec![0.0, 1.0, 0.0, 1.0, 1.0, 1.0]).unwrap())
    }

    fn total_predictions<F: PredictFitCV>(fit: &F) -> usize {
        fit.predictions_for_all_splits().map(|t| t.len()).unwrap_or(0)
    }

    #[test]
    fn test_generic_over_layers() {
        let regressor = RegressorFitCV::new(Pipeline::new(MeanRegressor::default()), Arc::new(KFold::new(3)), sample());
        let classifier =
            ClassifierFitCV::new(Pipeline::new(PriorClassifier::default()), Arc::new(KFold::new(3)), sample());
        assert_eq!(total_predictions(&regressor), 6);
        assert_eq!(total_predictions(&classifier), 6);
        assert_eq!(FitCV::n_splits(&classifier), 3);
        assert_eq!(ProbaFitCV::probabilities_for_all_splits(&classifier).unwrap().columns().len(), 2);
    }

    #[test]
    fn test_dyn_cross_validator() {
        let cv: Arc<dyn CrossValidator> = Arc::new(KFold::new(2));
        let fit = EstimatorFitCV::new(Pipeline::new(MeanRegressor::default()), cv, sample());
        assert_eq!(FitCV::fit_all(&fit).unwrap().len(), 2);
    }
}
