//! Data
//!
//! Matrix containers and the [`Sample`] abstraction the cross-validated fits draw
//! their training and test sets from.
use crate::errors::FitCvError;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// Identity of an observation, preserved across position-based selections.
pub type ObservationId = u64;

/// Contiguous Column Major Matrix view.
///
/// Borrows a dense block of values laid out in column-major order (Fortran-style),
/// which allows cheap column slicing.
#[derive(Debug, Clone, Copy)]
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        i + j * self.rows
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows.max(1))
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &'a [T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).take(self.cols).copied().collect()
    }
}

/// Owned column-major matrix, as produced by transformers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix<T> {
    /// The raw data in column-major order.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> DenseMatrix<T> {
    /// Create a new owned matrix, checking that the buffer matches the shape.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> Result<Self, FitCvError> {
        if data.len() != rows * cols {
            return Err(FitCvError::ShapeMismatch(format!(
                "buffer of length {} cannot hold a {} x {} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(DenseMatrix { data, rows, cols })
    }

    /// Borrow the matrix as a [`Matrix`] view.
    pub fn as_matrix(&self) -> Matrix<'_, T> {
        Matrix::new(&self.data, self.rows, self.cols)
    }
}

impl<T: Copy> DenseMatrix<T> {
    /// Build a matrix from a list of equally long columns.
    pub fn from_columns(columns: Vec<Vec<T>>, rows: usize) -> Result<Self, FitCvError> {
        let cols = columns.len();
        let mut data = Vec::with_capacity(rows * cols);
        for (j, column) in columns.into_iter().enumerate() {
            if column.len() != rows {
                return Err(FitCvError::ShapeMismatch(format!(
                    "column {} has {} values, expected {}",
                    j,
                    column.len(),
                    rows
                )));
            }
            data.extend(column);
        }
        Self::new(data, rows, cols)
    }
}

/// A lightweight row major matrix, used for model outputs
/// that are naturally built up one row at a time, such as
/// class probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMajorMatrix<T> {
    /// The raw data in row-major order.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> RowMajorMatrix<T> {
    /// Create a new RowMajorMatrix.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        RowMajorMatrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        i * self.cols + j
    }

    /// Borrow a row as a slice.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Apply `f` to every element, keeping the shape.
    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> RowMajorMatrix<U> {
        RowMajorMatrix {
            data: self.data.iter().map(f).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

/// A named column of values labelled by observation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub index: Vec<ObservationId>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(observation, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ObservationId, f64)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }
}

/// A labelled tabular sample: a feature matrix, a target, and an observation index.
///
/// Samples built with [`Sample::new`] or [`Sample::with_index`] carry unique
/// observation ids. Position-based selections keep the ids of the selected rows, so a
/// selection with repeated positions (e.g. a bootstrap draw) repeats ids.
#[derive(Debug, Clone)]
pub struct Sample {
    features: DenseMatrix<f64>,
    feature_names: Vec<String>,
    target: Vec<f64>,
    target_name: String,
    index: Vec<ObservationId>,
}

impl Sample {
    /// Create a sample from column-major feature data.
    ///
    /// * `features` - Column-major feature values, `n_rows * feature_names.len()` long.
    /// * `n_rows` - Number of observations.
    /// * `feature_names` - Name of each feature column.
    /// * `target` - Target value of each observation.
    pub fn new(
        features: Vec<f64>,
        n_rows: usize,
        feature_names: Vec<String>,
        target: Vec<f64>,
    ) -> Result<Self, FitCvError> {
        let features = DenseMatrix::new(features, n_rows, feature_names.len())?;
        if target.len() != n_rows {
            return Err(FitCvError::ShapeMismatch(format!(
                "target has {} values but the features have {} rows",
                target.len(),
                n_rows
            )));
        }
        Ok(Sample {
            features,
            feature_names,
            target,
            target_name: String::from("target"),
            index: (0..n_rows as ObservationId).collect(),
        })
    }

    /// Create a sample from row-major rows; feature names default to `x0`, `x1`, ...
    pub fn from_rows(rows: &[Vec<f64>], target: Vec<f64>) -> Result<Self, FitCvError> {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut columns = vec![Vec::with_capacity(rows.len()); n_features];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(FitCvError::ShapeMismatch(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    n_features
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(*value);
            }
        }
        let names = (0..n_features).map(|j| format!("x{}", j)).collect();
        Self::new(columns.concat(), rows.len(), names, target)
    }

    /// Replace the observation index. Ids must be unique.
    pub fn with_index(mut self, index: Vec<ObservationId>) -> Result<Self, FitCvError> {
        if index.len() != self.len() {
            return Err(FitCvError::ShapeMismatch(format!(
                "index has {} ids but the sample has {} observations",
                index.len(),
                self.len()
            )));
        }
        let mut seen = HashSet::with_capacity(index.len());
        for id in &index {
            if !seen.insert(*id) {
                return Err(FitCvError::DuplicateObservation(*id));
            }
        }
        self.index = index;
        Ok(self)
    }

    /// Set the name of the target column.
    pub fn with_target_name(mut self, name: &str) -> Self {
        self.target_name = name.to_string();
        self
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.cols
    }

    /// The feature table.
    pub fn features(&self) -> Matrix<'_, f64> {
        self.features.as_matrix()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// The target values, aligned with [`index`](Self::index).
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Observation ids, one per row.
    pub fn index(&self) -> &[ObservationId] {
        &self.index
    }

    /// The target as a series labelled by observation id.
    pub fn target_series(&self) -> Series {
        Series {
            name: self.target_name.clone(),
            index: self.index.clone(),
            values: self.target.clone(),
        }
    }

    /// Lookup from observation id to target value.
    pub fn target_by_observation(&self) -> HashMap<ObservationId, f64> {
        self.index.iter().copied().zip(self.target.iter().copied()).collect()
    }

    /// Select a sub-sample by integer position, keeping observation ids.
    ///
    /// * `positions` - Row positions to select, in output order. Repeats are allowed.
    pub fn select_observations_by_position(&self, positions: &[usize]) -> Result<Sample, FitCvError> {
        let n_observations = self.len();
        if let Some(&position) = positions.iter().find(|&&p| p >= n_observations) {
            return Err(FitCvError::PositionOutOfRange {
                position,
                n_observations,
            });
        }
        let x = self.features();
        let mut data = Vec::with_capacity(positions.len() * x.cols);
        for j in 0..x.cols {
            let column = x.get_col(j);
            data.extend(positions.iter().map(|&p| column[p]));
        }
        Ok(Sample {
            features: DenseMatrix::new(data, positions.len(), x.cols)?,
            feature_names: self.feature_names.clone(),
            target: positions.iter().map(|&p| self.target[p]).collect(),
            target_name: self.target_name.clone(),
            index: positions.iter().map(|&p| self.index[p]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        // 4 rows, 2 columns, column major
        let features = vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0];
        Sample::new(
            features,
            4,
            vec!["a".to_string(), "b".to_string()],
            vec![0.5, 1.5, 2.5, 3.5],
        )
        .unwrap()
        .with_index(vec![100, 101, 102, 103])
        .unwrap()
    }

    #[test]
    fn test_matrix_access() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let m = Matrix::new(&data, 3, 2);
        assert_eq!(*m.get(1, 1), 5.0);
        assert_eq!(m.get_col(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.get_row(2), vec![3.0, 6.0]);
    }

    #[test]
    fn test_row_major_access() {
        let m = RowMajorMatrix::new(vec![0.1, 0.9, 0.3, 0.7, 0.5, 0.5], 3, 2);
        assert_eq!(m.row(1), &[0.3, 0.7]);
        assert_eq!(*m.get(2, 0), 0.5);
        assert_eq!(m.map(|p| p * 2.0).row(0), &[0.2, 1.8]);
    }

    #[test]
    fn test_select_preserves_ids() {
        let s = sample();
        let sub = s.select_observations_by_position(&[3, 1, 1]).unwrap();
        assert_eq!(sub.index(), &[103, 101, 101]);
        assert_eq!(sub.target(), &[3.5, 1.5, 1.5]);
        assert_eq!(sub.features().get_col(1), &[40.0, 20.0, 20.0]);
        assert_eq!(sub.feature_names(), s.feature_names());
    }

    #[test]
    fn test_select_out_of_range() {
        let s = sample();
        match s.select_observations_by_position(&[0, 4]) {
            Err(FitCvError::PositionOutOfRange {
                position,
                n_observations,
            }) => {
                assert_eq!(position, 4);
                assert_eq!(n_observations, 4);
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let s = Sample::from_rows(&[vec![1.0], vec![2.0]], vec![0.0, 1.0]).unwrap();
        assert!(matches!(
            s.with_index(vec![7, 7]),
            Err(FitCvError::DuplicateObservation(7))
        ));
    }

    #[test]
    fn test_from_rows_shape() {
        let s = Sample::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]], vec![0.0, 1.0, 0.0]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.n_features(), 2);
        assert_eq!(s.features().get_col(0), &[1.0, 3.0, 5.0]);
        assert_eq!(s.feature_names(), &["x0".to_string(), "x1".to_string()]);
        assert!(Sample::from_rows(&[vec![1.0], vec![2.0, 3.0]], vec![0.0, 1.0]).is_err());
    }
}
