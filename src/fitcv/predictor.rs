use super::estimator::EstimatorFitCV;
use crate::config::ParallelConfig;
use crate::data::{RowMajorMatrix, Sample, Series};
use crate::errors::FitCvError;
use crate::memo::Memo;
use crate::pipeline::Predictor;
use crate::splitter::{CrossValidator, Split};
use crate::table::{SplitTable, SplitTableBuilder, PREDICTION};
use std::sync::Arc;

/// Predictive models fitted per split, with their out-of-sample predictions.
///
/// Every split's model predicts the rows held out by that split. The predictions of all
/// splits are stacked into one [`SplitTable`] keyed by `(observation, split_id)` with a
/// `"prediction"` value column and the true target joined on.
pub struct PredictorFitCV<P, CV: ?Sized> {
    fit: EstimatorFitCV<P, CV>,
    predictions: Memo<SplitTable>,
}

/// Cross-validated regressors.
pub type RegressorFitCV<P, CV> = PredictorFitCV<P, CV>;

impl<P, CV> PredictorFitCV<P, CV>
where
    P: Predictor,
    CV: CrossValidator + ?Sized,
{
    /// * `pipeline` - Unfitted template, cloned once per split.
    /// * `cv` - Cross validator producing the splits.
    /// * `sample` - Sample the training and test sets are drawn from.
    pub fn new(pipeline: P, cv: Arc<CV>, sample: Arc<Sample>) -> Self {
        PredictorFitCV {
            fit: EstimatorFitCV::new(pipeline, cv, sample),
            predictions: Memo::new(),
        }
    }

    /// Set how the per-split jobs are executed.
    pub fn set_parallel_config(mut self, cfg: ParallelConfig) -> Self {
        self.fit = self.fit.set_parallel_config(cfg);
        self
    }

    /// The underlying per-split fits.
    pub fn fits(&self) -> &EstimatorFitCV<P, CV> {
        &self.fit
    }

    pub fn pipeline(&self) -> &P {
        self.fit.pipeline()
    }

    pub fn cv(&self) -> &Arc<CV> {
        self.fit.cv()
    }

    pub fn sample(&self) -> &Arc<Sample> {
        self.fit.sample()
    }

    pub fn n_splits(&self) -> usize {
        self.fit.n_splits()
    }

    pub fn splits(&self) -> Result<&[Split], FitCvError> {
        self.fit.splits()
    }

    pub fn fit_all(&self) -> Result<&[P], FitCvError> {
        self.fit.fit_all()
    }

    pub fn is_fitted(&self) -> bool {
        self.fit.is_fitted()
    }

    pub fn model(&self, split_id: usize) -> Result<&P, FitCvError> {
        self.fit.model(split_id)
    }

    pub fn models(&self) -> Result<std::slice::Iter<'_, P>, FitCvError> {
        self.fit.models()
    }

    /// Predictions of every split's model on that split's test rows.
    ///
    /// An observation held out by several splits has one row per split.
    pub fn predictions_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        self.predictions.get_or_try_init(|| {
            let models = self.fit_all()?;
            let sample = self.sample();
            let mut builder = SplitTableBuilder::new(vec![PREDICTION.to_string()], f64::NAN)?;
            for (split_id, (split, model)) in self.splits()?.iter().zip(models).enumerate() {
                let test = sample.select_observations_by_position(&split.test)?;
                let predictions = model.predict(&test.features())?;
                let n = predictions.len();
                builder.push_split(
                    split_id,
                    test.index().to_vec(),
                    vec![PREDICTION.to_string()],
                    RowMajorMatrix::new(predictions, n, 1),
                )?;
            }
            builder.finish(sample)
        })
    }

    /// Predictions of one split's model, labelled by observation.
    pub fn predictions_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        self.check_split(split_id)?;
        self.predictions_for_all_splits()?.series_for_split(split_id, PREDICTION)
    }

    /// True target of one split's test rows, labelled by observation.
    pub fn targets_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        self.check_split(split_id)?;
        Ok(self.predictions_for_all_splits()?.target_for_split(split_id))
    }

    /// A copy drawing from another sample, with nothing fitted or predicted.
    pub fn copy_with_sample(&self, sample: Arc<Sample>) -> Self {
        PredictorFitCV {
            fit: self.fit.copy_with_sample(sample),
            predictions: Memo::new(),
        }
    }

    pub(crate) fn check_split(&self, split_id: usize) -> Result<(), FitCvError> {
        let n_splits = self.splits()?.len();
        if split_id >= n_splits {
            return Err(FitCvError::UnknownSplit { split_id, n_splits });
        }
        Ok(())
    }
}
