//! Estimators
//!
//! Reference estimators implementing the [`Estimator`](crate::pipeline::Estimator)
//! family of traits: baselines that ignore the features, and a multinomial logistic
//! regression.
mod dummy;
mod logistic;

pub use dummy::{MeanRegressor, PriorClassifier};
pub use logistic::LogisticRegression;
