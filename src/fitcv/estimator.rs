use crate::config::ParallelConfig;
use crate::data::Sample;
use crate::errors::FitCvError;
use crate::executor::Executor;
use crate::memo::Memo;
use crate::pipeline::Estimator;
use crate::splitter::{CrossValidator, Split};
use log::debug;
use std::sync::Arc;

/// One fitted copy of a pipeline per split of a cross validator.
///
/// Nothing is fitted on construction. The first call to any accessor that needs the
/// models fits all of them in one parallel batch, and the result is kept for the
/// lifetime of the value.
pub struct EstimatorFitCV<P, CV: ?Sized> {
    pipeline: P,
    cv: Arc<CV>,
    sample: Arc<Sample>,
    executor: Executor,
    splits: Memo<Vec<Split>>,
    model_by_split: Memo<Vec<P>>,
}

impl<P, CV> EstimatorFitCV<P, CV>
where
    P: Estimator,
    CV: CrossValidator + ?Sized,
{
    /// Create an unfitted collection.
    ///
    /// * `pipeline` - Unfitted template, cloned once per split.
    /// * `cv` - Cross validator producing the splits.
    /// * `sample` - Sample the training and test sets are drawn from.
    pub fn new(pipeline: P, cv: Arc<CV>, sample: Arc<Sample>) -> Self {
        EstimatorFitCV {
            pipeline,
            cv,
            sample,
            executor: Executor::default(),
            splits: Memo::new(),
            model_by_split: Memo::new(),
        }
    }

    /// Set how the per-split jobs are executed.
    pub fn set_parallel_config(mut self, cfg: ParallelConfig) -> Self {
        self.executor = Executor::new(cfg);
        self
    }

    /// The unfitted template.
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn cv(&self) -> &Arc<CV> {
        &self.cv
    }

    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Number of splits the cross validator reports for the sample.
    pub fn n_splits(&self) -> usize {
        self.cv.n_splits(&self.sample.features(), self.sample.target())
    }

    /// The train and test positions of every split, generated once.
    pub fn splits(&self) -> Result<&[Split], FitCvError> {
        let splits = self.splits.get_or_try_init(|| {
            let expected = self.n_splits();
            let splits = self.cv.split(&self.sample.features(), self.sample.target())?;
            if splits.len() != expected {
                return Err(FitCvError::SplitCountMismatch {
                    expected,
                    found: splits.len(),
                });
            }
            Ok(splits)
        })?;
        Ok(splits)
    }

    /// Fit one model per split, unless that has already happened.
    ///
    /// If fitting any split fails the whole call fails, nothing is kept, and the next
    /// call starts over.
    pub fn fit_all(&self) -> Result<&[P], FitCvError> {
        let models = self.model_by_split.get_or_try_init(|| {
            let splits = self.splits()?;
            let sample = self.sample.as_ref();
            let template = &self.pipeline;
            let jobs: Vec<_> = splits
                .iter()
                .enumerate()
                .map(|(split_id, split)| move || fit_model_for_split(template, sample, split_id, split))
                .collect();
            self.executor.run(jobs)
        })?;
        Ok(models)
    }

    /// Whether the models have been fitted.
    pub fn is_fitted(&self) -> bool {
        self.model_by_split.is_computed()
    }

    /// The model fitted for a split.
    pub fn model(&self, split_id: usize) -> Result<&P, FitCvError> {
        let models = self.fit_all()?;
        models.get(split_id).ok_or(FitCvError::UnknownSplit {
            split_id,
            n_splits: models.len(),
        })
    }

    /// All fitted models, in split order.
    pub fn models(&self) -> Result<std::slice::Iter<'_, P>, FitCvError> {
        Ok(self.fit_all()?.iter())
    }

    /// A copy drawing from another sample, with nothing fitted.
    pub fn copy_with_sample(&self, sample: Arc<Sample>) -> Self {
        EstimatorFitCV {
            pipeline: self.pipeline.clone(),
            cv: Arc::clone(&self.cv),
            sample,
            executor: self.executor.clone(),
            splits: Memo::new(),
            model_by_split: Memo::new(),
        }
    }
}

fn fit_model_for_split<P: Estimator>(
    template: &P,
    sample: &Sample,
    split_id: usize,
    split: &Split,
) -> Result<P, FitCvError> {
    let train = sample.select_observations_by_position(&split.train)?;
    let mut model = template.clone();
    model
        .fit(&train.features(), train.target())
        .map_err(|e| FitCvError::FitFailed {
            split_id,
            source: Box::new(e),
        })?;
    debug!("Fitted model for split {} on {} observations.", split_id, train.len());
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::MeanRegressor;
    use crate::pipeline::{Pipeline, Predictor};
    use crate::splitter::{KFold, PredefinedSplits};

    fn sample() -> Arc<Sample> {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        Arc::new(Sample::from_rows(&rows, vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0]).unwrap())
    }

    #[test]
    fn test_lazy_fit() {
        let fit = EstimatorFitCV::new(Pipeline::new(MeanRegressor::default()), Arc::new(KFold::new(2)), sample());
        assert!(!fit.is_fitted());
        assert_eq!(fit.n_splits(), 2);
        let model = fit.model(1).unwrap();
        assert!(fit.is_fitted());
        // trained on the first fold
        assert_eq!(model.estimator().mean(), Some(2.0));
        assert_eq!(fit.models().unwrap().count(), 2);
        assert!(!fit.pipeline().is_fitted());
    }

    #[test]
    fn test_unknown_split() {
        let fit = EstimatorFitCV::new(Pipeline::new(MeanRegressor::default()), Arc::new(KFold::new(3)), sample());
        assert!(matches!(
            fit.model(3),
            Err(FitCvError::UnknownSplit { split_id: 3, n_splits: 3 })
        ));
    }

    #[test]
    fn test_fit_failure_reports_split() {
        let cv = PredefinedSplits::new(vec![Split::new(vec![0, 1], vec![2]), Split::new(vec![], vec![3])]);
        let fit = EstimatorFitCV::new(Pipeline::new(MeanRegressor::default()), Arc::new(cv), sample());
        match fit.fit_all() {
            Err(FitCvError::FitFailed { split_id, source }) => {
                assert_eq!(split_id, 1);
                assert!(matches!(*source, FitCvError::EmptyData(_)));
            }
            other => panic!("unexpected result: {:?}", other.map(|m| m.len())),
        }
        assert!(!fit.is_fitted());
    }

    #[test]
    fn test_position_out_of_range() {
        let cv = PredefinedSplits::new(vec![Split::new(vec![0, 17], vec![2])]);
        let fit = EstimatorFitCV::new(Pipeline::new(MeanRegressor::default()), Arc::new(cv), sample());
        assert!(matches!(
            fit.fit_all(),
            Err(FitCvError::PositionOutOfRange { position: 17, .. })
        ));
    }

    #[test]
    fn test_isolated_backend() {
        let cfg = ParallelConfig::default().set_n_jobs(Some(2)).set_shared_memory(false);
        let fit = EstimatorFitCV::new(Pipeline::new(MeanRegressor::default()), Arc::new(KFold::new(3)), sample())
            .set_parallel_config(cfg);
        let features = fit.sample().features();
        let predictions: Vec<f64> = fit
            .models()
            .unwrap()
            .map(|m| m.predict(&features).unwrap()[0])
            .collect();
        assert_eq!(predictions, vec![15.75, 13.25, 4.0]);
    }
}
