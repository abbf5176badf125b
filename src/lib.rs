mod memo;

// Modules
pub mod calibration;
pub mod config;
pub mod data;
pub mod errors;
pub mod estimators;
pub mod executor;
pub mod fitcv;
pub mod pipeline;
pub mod preprocessing;
pub mod splitter;
pub mod table;
pub mod utils;

// Individual classes, and functions
pub use calibration::{CalibratedClassifier, CalibrationMethod};
pub use config::ParallelConfig;
pub use data::{Matrix, ObservationId, Sample, Series};
pub use errors::FitCvError;
pub use fitcv::{ClassifierFitCV, EstimatorFitCV, FitCV, PredictFitCV, PredictorFitCV, ProbaFitCV, RegressorFitCV};
pub use memo::Memo;
pub use pipeline::{Classifier, Estimator, Pipeline, Predictor, Transformer};
pub use splitter::{CrossValidator, Split};
pub use table::{RowKey, SplitTable};
