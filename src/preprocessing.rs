//! Preprocessing
//!
//! Transformers usable as the preprocessing stage of a [`Pipeline`](crate::pipeline::Pipeline).
use crate::data::{DenseMatrix, Matrix};
use crate::errors::FitCvError;
use crate::pipeline::Transformer;
use crate::utils::{format_label, position_in_sorted, sorted_unique, validate_n_features};
use serde::{Deserialize, Serialize};

/// The identity transformer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Passthrough;

impl Transformer for Passthrough {
    fn fit(&mut self, _x: &Matrix<f64>) -> Result<(), FitCvError> {
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<DenseMatrix<f64>, FitCvError> {
        DenseMatrix::new(x.data[..x.rows * x.cols].to_vec(), x.rows, x.cols)
    }
}

/// Standardize features by removing the mean and scaling to unit variance.
///
/// Columns with zero variance are only centered.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    fitted: bool,
}

impl StandardScaler {
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<(), FitCvError> {
        if x.rows == 0 {
            return Err(FitCvError::EmptyData("StandardScaler needs at least one row".to_string()));
        }
        let n = x.rows as f64;
        self.mean.clear();
        self.scale.clear();
        for j in 0..x.cols {
            let col = x.get_col(j);
            let mean = col.iter().sum::<f64>() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            self.mean.push(mean);
            self.scale.push(if var > 0.0 { var.sqrt() } else { 1.0 });
        }
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<DenseMatrix<f64>, FitCvError> {
        if !self.fitted {
            return Err(FitCvError::NotFitted("StandardScaler".to_string()));
        }
        validate_n_features(self.mean.len(), x.cols, "StandardScaler")?;
        let mut data = Vec::with_capacity(x.rows * x.cols);
        for j in 0..x.cols {
            let (mean, scale) = (self.mean[j], self.scale[j]);
            data.extend(x.get_col(j).iter().map(|v| (v - mean) / scale));
        }
        DenseMatrix::new(data, x.rows, x.cols)
    }
}

/// What to do with a category that was not seen during fit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleUnknown {
    /// Fail the transform.
    #[default]
    Error,
    /// Encode as all zeros (one-hot) or NaN (ordinal).
    Ignore,
}

/// Categories of one encoded column, learned during fit.
#[derive(Debug, Clone)]
struct ColumnCategories {
    column: usize,
    categories: Vec<f64>,
}

fn fit_categories(x: &Matrix<f64>, columns: &Option<Vec<usize>>) -> Result<Vec<ColumnCategories>, FitCvError> {
    let selected: Vec<usize> = match columns {
        Some(cols) => cols.clone(),
        None => (0..x.cols).collect(),
    };
    selected
        .into_iter()
        .map(|column| {
            if column >= x.cols {
                return Err(FitCvError::InvalidParameter(
                    "columns".to_string(),
                    format!("column indices below {}", x.cols),
                    column.to_string(),
                ));
            }
            Ok(ColumnCategories {
                column,
                categories: sorted_unique(x.get_col(column)),
            })
        })
        .collect()
}

fn unknown_category(column: usize, value: f64) -> FitCvError {
    FitCvError::InvalidParameter(
        format!("column {}", column),
        "a category seen during fit".to_string(),
        format_label(value),
    )
}

/// One-hot encode categorical columns.
///
/// Each selected column is replaced, in place, by one indicator column per category
/// seen during fit (minus the first category when `drop_first` is set). Columns not
/// selected pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct OneHotEncoder {
    columns: Option<Vec<usize>>,
    drop_first: bool,
    handle_unknown: HandleUnknown,
    categories: Vec<ColumnCategories>,
    n_features_in: usize,
    fitted: bool,
}

impl OneHotEncoder {
    /// Set which columns to encode; `None` encodes every column.
    pub fn set_columns(mut self, columns: Option<Vec<usize>>) -> Self {
        self.columns = columns;
        self
    }

    /// Drop the indicator of the first category of every encoded column.
    pub fn set_drop_first(mut self, drop_first: bool) -> Self {
        self.drop_first = drop_first;
        self
    }

    pub fn set_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    /// Categories learned for input column `column`, if it is encoded.
    pub fn categories(&self, column: usize) -> Option<&[f64]> {
        self.categories
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.categories.as_slice())
    }

    fn kept_categories<'a>(&self, c: &'a ColumnCategories) -> &'a [f64] {
        if self.drop_first && !c.categories.is_empty() {
            &c.categories[1..]
        } else {
            &c.categories
        }
    }

    /// Names of the output columns, e.g. `colour_2` for category `2` of input `colour`.
    pub fn get_feature_names(&self, input_names: &[String]) -> Result<Vec<String>, FitCvError> {
        Ok(self
            .columns_original(input_names)?
            .into_iter()
            .zip(self.output_labels())
            .map(|(name, label)| match label {
                Some(label) => format!("{}_{}", name, label),
                None => name,
            })
            .collect())
    }

    /// For every output column, the name of the input column it was derived from.
    pub fn columns_original(&self, input_names: &[String]) -> Result<Vec<String>, FitCvError> {
        if !self.fitted {
            return Err(FitCvError::NotFitted("OneHotEncoder".to_string()));
        }
        validate_n_features(self.n_features_in, input_names.len(), "OneHotEncoder")?;
        let mut names = Vec::new();
        for (j, name) in input_names.iter().enumerate() {
            match self.categories.iter().find(|c| c.column == j) {
                Some(c) => names.extend(std::iter::repeat(name.clone()).take(self.kept_categories(c).len())),
                None => names.push(name.clone()),
            }
        }
        Ok(names)
    }

    fn output_labels(&self) -> Vec<Option<String>> {
        let mut labels = Vec::new();
        for j in 0..self.n_features_in {
            match self.categories.iter().find(|c| c.column == j) {
                Some(c) => labels.extend(self.kept_categories(c).iter().map(|v| Some(format_label(*v)))),
                None => labels.push(None),
            }
        }
        labels
    }
}

impl Transformer for OneHotEncoder {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<(), FitCvError> {
        self.categories = fit_categories(x, &self.columns)?;
        self.n_features_in = x.cols;
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<DenseMatrix<f64>, FitCvError> {
        if !self.fitted {
            return Err(FitCvError::NotFitted("OneHotEncoder".to_string()));
        }
        validate_n_features(self.n_features_in, x.cols, "OneHotEncoder")?;
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for j in 0..x.cols {
            let col = x.get_col(j);
            let Some(c) = self.categories.iter().find(|c| c.column == j) else {
                columns.push(col.to_vec());
                continue;
            };
            let offset = usize::from(self.drop_first);
            let kept = self.kept_categories(c).len();
            let mut indicators = vec![vec![0.0; x.rows]; kept];
            for (i, value) in col.iter().enumerate() {
                match position_in_sorted(&c.categories, *value) {
                    Some(k) if k >= offset => indicators[k - offset][i] = 1.0,
                    Some(_) => {}
                    None if self.handle_unknown == HandleUnknown::Ignore => {}
                    None => return Err(unknown_category(j, *value)),
                }
            }
            columns.extend(indicators);
        }
        DenseMatrix::from_columns(columns, x.rows)
    }
}

/// Encode categorical columns as the index of their category.
#[derive(Debug, Clone, Default)]
pub struct OrdinalEncoder {
    columns: Option<Vec<usize>>,
    handle_unknown: HandleUnknown,
    categories: Vec<ColumnCategories>,
    n_features_in: usize,
    fitted: bool,
}

impl OrdinalEncoder {
    /// Set which columns to encode; `None` encodes every column.
    pub fn set_columns(mut self, columns: Option<Vec<usize>>) -> Self {
        self.columns = columns;
        self
    }

    pub fn set_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    pub fn categories(&self, column: usize) -> Option<&[f64]> {
        self.categories
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.categories.as_slice())
    }
}

impl Transformer for OrdinalEncoder {
    fn fit(&mut self, x: &Matrix<f64>) -> Result<(), FitCvError> {
        self.categories = fit_categories(x, &self.columns)?;
        self.n_features_in = x.cols;
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Matrix<f64>) -> Result<DenseMatrix<f64>, FitCvError> {
        if !self.fitted {
            return Err(FitCvError::NotFitted("OrdinalEncoder".to_string()));
        }
        validate_n_features(self.n_features_in, x.cols, "OrdinalEncoder")?;
        let mut data = Vec::with_capacity(x.rows * x.cols);
        for j in 0..x.cols {
            let col = x.get_col(j);
            match self.categories.iter().find(|c| c.column == j) {
                Some(c) => {
                    for value in col {
                        let code = match position_in_sorted(&c.categories, *value) {
                            Some(k) => k as f64,
                            None if self.handle_unknown == HandleUnknown::Ignore => f64::NAN,
                            None => return Err(unknown_category(j, *value)),
                        };
                        data.push(code);
                    }
                }
                None => data.extend_from_slice(col),
            }
        }
        DenseMatrix::new(data, x.rows, x.cols)
    }
}
