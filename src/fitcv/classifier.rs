use super::predictor::PredictorFitCV;
use crate::calibration::{CalibratedClassifier, CalibrationMethod};
use crate::config::ParallelConfig;
use crate::data::{Matrix, RowMajorMatrix, Sample, Series};
use crate::errors::FitCvError;
use crate::memo::Memo;
use crate::pipeline::{ClassificationPipeline, Classifier, Estimator, Pipeline, Transformer};
use crate::splitter::{CrossValidator, Split};
use crate::table::{SplitTable, SplitTableBuilder};
use crate::utils::{format_label, sorted_unique};
use log::{debug, info};
use std::sync::Arc;

/// A classification pipeline whose classifier stage has been calibrated.
pub type CalibratedPipeline<P> = Pipeline<
    CalibratedClassifier<<P as ClassificationPipeline>::Classifier>,
    <P as ClassificationPipeline>::Preprocessing,
>;

/// Classification models fitted per split, with out-of-sample class probabilities.
///
/// With a calibration method set, every split's fitted model is also calibrated on the
/// rows that split held out, and the probability tables come from the calibrated models.
pub struct ClassifierFitCV<P: ClassificationPipeline, CV: ?Sized> {
    predictor: PredictorFitCV<P, CV>,
    calibration: Option<CalibrationMethod>,
    calibrated_model_by_split: Memo<Vec<CalibratedPipeline<P>>>,
    probabilities: Memo<SplitTable>,
    log_probabilities: Memo<SplitTable>,
}

impl<P, CV> ClassifierFitCV<P, CV>
where
    P: ClassificationPipeline,
    CV: CrossValidator + ?Sized,
{
    /// * `pipeline` - Unfitted template, cloned once per split.
    /// * `cv` - Cross validator producing the splits.
    /// * `sample` - Sample the training and test sets are drawn from.
    pub fn new(pipeline: P, cv: Arc<CV>, sample: Arc<Sample>) -> Self {
        ClassifierFitCV {
            predictor: PredictorFitCV::new(pipeline, cv, sample),
            calibration: None,
            calibrated_model_by_split: Memo::new(),
            probabilities: Memo::new(),
            log_probabilities: Memo::new(),
        }
    }

    /// Calibrate each split's model on its held-out rows with the given method.
    pub fn set_calibration(mut self, calibration: Option<CalibrationMethod>) -> Self {
        self.calibration = calibration;
        self
    }

    /// Set how the per-split jobs are executed.
    pub fn set_parallel_config(mut self, cfg: ParallelConfig) -> Self {
        self.predictor = self.predictor.set_parallel_config(cfg);
        self
    }

    pub fn calibration(&self) -> Option<CalibrationMethod> {
        self.calibration
    }

    /// Point predictions and everything else shared with regressors.
    pub fn predictor(&self) -> &PredictorFitCV<P, CV> {
        &self.predictor
    }

    pub fn pipeline(&self) -> &P {
        self.predictor.pipeline()
    }

    pub fn cv(&self) -> &Arc<CV> {
        self.predictor.cv()
    }

    pub fn sample(&self) -> &Arc<Sample> {
        self.predictor.sample()
    }

    pub fn n_splits(&self) -> usize {
        self.predictor.n_splits()
    }

    pub fn splits(&self) -> Result<&[Split], FitCvError> {
        self.predictor.splits()
    }

    pub fn fit_all(&self) -> Result<&[P], FitCvError> {
        self.predictor.fit_all()
    }

    pub fn is_fitted(&self) -> bool {
        self.predictor.is_fitted()
    }

    pub fn model(&self, split_id: usize) -> Result<&P, FitCvError> {
        self.predictor.model(split_id)
    }

    pub fn models(&self) -> Result<std::slice::Iter<'_, P>, FitCvError> {
        self.predictor.models()
    }

    pub fn predictions_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        self.predictor.predictions_for_all_splits()
    }

    pub fn predictions_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        self.predictor.predictions_for_split(split_id)
    }

    pub fn targets_for_split(&self, split_id: usize) -> Result<Series, FitCvError> {
        self.predictor.targets_for_split(split_id)
    }

    /// Classes seen by any split's model, sorted ascending. The probability tables have
    /// one column per class, in this order.
    pub fn classes(&self) -> Result<Vec<f64>, FitCvError> {
        let seen: Vec<f64> = self
            .fit_all()?
            .iter()
            .flat_map(|m| m.classes().iter().copied())
            .collect();
        Ok(sorted_unique(&seen))
    }

    /// Calibrate every split's model, unless that has already happened.
    pub fn calibrate_all(&self) -> Result<&[CalibratedPipeline<P>], FitCvError> {
        let method = self.calibration.ok_or_else(|| {
            FitCvError::NotSupported(
                "calibrated models are only available when a calibration method is set".to_string(),
            )
        })?;
        let models = self.calibrated_model_by_split.get_or_try_init(|| {
            let models = self.fit_all()?;
            let splits = self.splits()?;
            let sample = self.sample().as_ref();
            info!("Calibrating classifier probabilities using method \"{}\"", method);
            let jobs: Vec<_> = splits
                .iter()
                .zip(models)
                .enumerate()
                .map(|(split_id, (split, model))| {
                    move || calibrate_model_for_split(model, sample, split_id, split, method)
                })
                .collect();
            self.predictor.fits().executor().run(jobs)
        })?;
        Ok(models)
    }

    /// The calibrated model of a split.
    pub fn calibrated_model(&self, split_id: usize) -> Result<&CalibratedPipeline<P>, FitCvError> {
        let models = self.calibrate_all()?;
        models.get(split_id).ok_or(FitCvError::UnknownSplit {
            split_id,
            n_splits: models.len(),
        })
    }

    /// All calibrated models, in split order.
    pub fn calibrated_models(&self) -> Result<std::slice::Iter<'_, CalibratedPipeline<P>>, FitCvError> {
        Ok(self.calibrate_all()?.iter())
    }

    /// Class probabilities of every split's model on that split's test rows.
    pub fn probabilities_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        self.probabilities
            .get_or_try_init(|| self.build_probabilities_for_all_splits(false))
    }

    /// Natural log of [`probabilities_for_all_splits`](Self::probabilities_for_all_splits).
    pub fn log_probabilities_for_all_splits(&self) -> Result<&SplitTable, FitCvError> {
        self.log_probabilities
            .get_or_try_init(|| self.build_probabilities_for_all_splits(true))
    }

    /// A copy drawing from another sample, with the same calibration method and nothing
    /// fitted, calibrated, or predicted.
    pub fn copy_with_sample(&self, sample: Arc<Sample>) -> Self {
        ClassifierFitCV {
            predictor: self.predictor.copy_with_sample(sample),
            calibration: self.calibration,
            calibrated_model_by_split: Memo::new(),
            probabilities: Memo::new(),
            log_probabilities: Memo::new(),
        }
    }

    fn build_probabilities_for_all_splits(&self, log_proba: bool) -> Result<SplitTable, FitCvError> {
        let models = self.fit_all()?;
        let calibrated = match self.calibration {
            Some(_) => Some(self.calibrate_all()?),
            None => None,
        };
        let classes = self.classes()?;
        let columns: Vec<String> = classes.iter().map(|c| format_label(*c)).collect();
        let fill = if log_proba { f64::NEG_INFINITY } else { 0.0 };
        let mut builder = SplitTableBuilder::new(columns, fill)?;

        let sample = self.sample();
        for (split_id, split) in self.splits()?.iter().enumerate() {
            let test = sample.select_observations_by_position(&split.test)?;
            let features = test.features();
            let (model_classes, values) = match calibrated {
                Some(calibrated) => {
                    let model = &calibrated[split_id];
                    (model.classes(), proba(model, &features, log_proba)?)
                }
                None => {
                    let model = &models[split_id];
                    (model.classes(), proba(model, &features, log_proba)?)
                }
            };
            let columns = model_classes.iter().map(|c| format_label(*c)).collect();
            debug!("Computed probabilities of split {} for {} observations.", split_id, test.len());
            builder.push_split(split_id, test.index().to_vec(), columns, values)?;
        }
        builder.finish(sample)
    }
}

fn proba<M: Classifier>(model: &M, features: &Matrix<f64>, log_proba: bool) -> Result<RowMajorMatrix<f64>, FitCvError> {
    if log_proba {
        model.predict_log_proba(features)
    } else {
        model.predict_proba(features)
    }
}

fn calibrate_model_for_split<P: ClassificationPipeline>(
    model: &P,
    sample: &Sample,
    split_id: usize,
    split: &Split,
    method: CalibrationMethod,
) -> Result<CalibratedPipeline<P>, FitCvError> {
    let test = sample.select_observations_by_position(&split.test)?;
    let preprocessing = model.preprocessing_stage();
    let calibrate = || {
        let features = preprocessing.transform(&test.features())?;
        let mut calibrated = CalibratedClassifier::prefit(model.classifier_stage(), method);
        calibrated.fit(&features.as_matrix(), test.target())?;
        Ok(calibrated)
    };
    let calibrated = calibrate().map_err(|e| FitCvError::FitFailed {
        split_id,
        source: Box::new(e),
    })?;
    debug!("Calibrated model for split {} on {} observations.", split_id, test.len());
    Ok(Pipeline::with_preprocessing(preprocessing.clone(), calibrated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{LogisticRegression, PriorClassifier};
    use crate::preprocessing::StandardScaler;
    use crate::splitter::{KFold, PredefinedSplits};
    use approx::assert_abs_diff_eq;

    fn sample() -> Arc<Sample> {
        let rows: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64]).collect();
        let target = (0..12).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        Arc::new(Sample::from_rows(&rows, target).unwrap())
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let fit = ClassifierFitCV::new(
            Pipeline::with_preprocessing(StandardScaler::default(), LogisticRegression::default()),
            Arc::new(KFold::new(3)),
            sample(),
        );
        let table = fit.probabilities_for_all_splits().unwrap();
        assert_eq!(table.columns(), &["0".to_string(), "1".to_string()]);
        assert_eq!(table.len(), 12);
        for i in 0..table.len() {
            assert_abs_diff_eq!(table.values().row(i).iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        }
        let log_table = fit.log_probabilities_for_all_splits().unwrap();
        for (p, lp) in table.values().data.iter().zip(&log_table.values().data) {
            assert_abs_diff_eq!(p.ln(), *lp, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_calibration_disabled() {
        let fit = ClassifierFitCV::new(Pipeline::new(PriorClassifier::default()), Arc::new(KFold::new(3)), sample());
        assert!(matches!(fit.calibrated_model(0), Err(FitCvError::NotSupported(_))));
        assert!(matches!(fit.calibrated_models(), Err(FitCvError::NotSupported(_))));
        assert!(fit.probabilities_for_all_splits().is_ok());
    }

    #[test]
    fn test_missing_class_filled() {
        // split 0 trains only on class 0
        let cv = PredefinedSplits::new(vec![
            Split::new(vec![1, 2, 4], vec![0, 3]),
            Split::new(vec![0, 1, 2, 3], vec![4, 5]),
        ]);
        let fit = ClassifierFitCV::new(Pipeline::new(PriorClassifier::default()), Arc::new(cv), sample());
        let table = fit.probabilities_for_all_splits().unwrap();
        assert_eq!(fit.classes().unwrap(), vec![0.0, 1.0]);
        assert_eq!(table.values().row(0), &[1.0, 0.0]);
        assert_eq!(table.values().row(2), &[0.5, 0.5]);
        let log_table = fit.log_probabilities_for_all_splits().unwrap();
        assert_eq!(log_table.values().row(0), &[0.0, f64::NEG_INFINITY]);
    }

    #[test]
    fn test_negative_zero_is_one_class() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let sample = Arc::new(Sample::from_rows(&rows, vec![0.0, -0.0, 1.0, 0.0, -0.0, 1.0]).unwrap());
        let fit = ClassifierFitCV::new(Pipeline::new(PriorClassifier::default()), Arc::new(KFold::new(2)), sample);
        assert_eq!(fit.classes().unwrap(), vec![0.0, 1.0]);
        let table = fit.probabilities_for_all_splits().unwrap();
        assert_eq!(table.columns(), &["0".to_string(), "1".to_string()]);
        for i in 0..table.len() {
            assert_abs_diff_eq!(table.values().row(i).iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(*table.values().get(0, 0), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_calibrated_models() {
        let fit = ClassifierFitCV::new(
            Pipeline::with_preprocessing(StandardScaler::default(), LogisticRegression::default()),
            Arc::new(KFold::new(2)),
            sample(),
        )
        .set_calibration(Some(CalibrationMethod::Isotonic));
        assert_eq!(fit.calibrated_models().unwrap().count(), 2);
        let calibrated = fit.calibrated_model(1).unwrap();
        assert!(calibrated.is_fitted());
        assert!(calibrated.preprocessing().is_fitted());
        assert_eq!(calibrated.estimator().method(), CalibrationMethod::Isotonic);
        assert!(matches!(
            fit.calibrated_model(2),
            Err(FitCvError::UnknownSplit { split_id: 2, n_splits: 2 })
        ));
        let table = fit.probabilities_for_all_splits().unwrap();
        for i in 0..table.len() {
            assert_abs_diff_eq!(table.values().row(i).iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        }
    }
}
