//! Errors
//!
//! Custom error types used throughout the `fitcv` crate.
use thiserror::Error;

/// Errors that can occur while fitting and querying cross-validated models.
#[derive(Debug, Error)]
pub enum FitCvError {
    /// Fitting the model for a split failed; nothing from the batch was kept.
    #[error("Fitting the model for split {split_id} failed: {source}")]
    FitFailed {
        split_id: usize,
        #[source]
        source: Box<FitCvError>,
    },
    /// The operation is not available for this configuration.
    #[error("Operation not supported: {0}")]
    NotSupported(String),
    /// A position passed to a selection is larger than the number of observations.
    #[error("Position {position} is out of range for a sample with {n_observations} observations.")]
    PositionOutOfRange { position: usize, n_observations: usize },
    /// A split id was requested that the cross validator never produced.
    #[error("Split {split_id} does not exist, there are {n_splits} splits.")]
    UnknownSplit { split_id: usize, n_splits: usize },
    /// The cross validator produced a different number of splits than it reported.
    #[error("Cross validator reported {expected} splits but produced {found}.")]
    SplitCountMismatch { expected: usize, found: usize },
    /// An observation id was not found in the sample index.
    #[error("Observation id {0} is not in the sample index.")]
    UnknownObservation(u64),
    /// A column was requested that the table does not have.
    #[error("Column {0} does not exist.")]
    UnknownColumn(String),
    /// A table was given the same column name twice.
    #[error("Column {0} appears more than once.")]
    DuplicateColumn(String),
    /// Dimensions of the passed data do not line up.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The observation index contains the same id twice.
    #[error("Observation id {0} appears more than once in the index.")]
    DuplicateObservation(u64),
    /// Not enough data to carry out the operation.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// A model or transformer was used before it was fitted.
    #[error("{0} has not been fitted.")]
    NotFitted(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// The worker pool could not be built.
    #[error("Unable to build thread pool: {0}")]
    ThreadPool(String),
    /// A job running in isolation panicked.
    #[error("Parallel job panicked: {0}")]
    JobPanicked(String),
    /// Unable to serialize a configuration.
    #[error("Unable to write configuration: {0}")]
    UnableToWrite(String),
    /// Unable to deserialize a configuration.
    #[error("Unable to read configuration: {0}")]
    UnableToRead(String),
}
