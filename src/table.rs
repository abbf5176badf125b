//! Split Table
//!
//! Out-of-sample outputs of the per-split models, stacked into one table whose rows
//! are keyed by `(observation, split_id)`. An observation that is held out by several
//! splits appears once per split.
use crate::data::{ObservationId, RowMajorMatrix, Sample, Series};
use crate::errors::FitCvError;
use serde::{Deserialize, Serialize};

/// Name of the split level of the row index.
pub const SPLIT_ID: &str = "split_id";
/// Name of the value column holding point predictions.
pub const PREDICTION: &str = "prediction";
/// Default name of the joined target column.
pub const TARGET: &str = "target";

/// Row key of a [`SplitTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub observation: ObservationId,
    pub split_id: usize,
}

/// Model outputs for the held-out rows of every split, with the true target joined on.
///
/// Rows are ordered by split, then by the order of the split's test positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitTable {
    columns: Vec<String>,
    index: Vec<RowKey>,
    values: RowMajorMatrix<f64>,
    target_name: String,
    target: Vec<f64>,
}

impl SplitTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Names of the value columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The `(observation, split_id)` key of every row.
    pub fn index(&self) -> &[RowKey] {
        &self.index
    }

    /// Value columns, one row per index entry.
    pub fn values(&self) -> &RowMajorMatrix<f64> {
        &self.values
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// True target of every row.
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Position of a value column.
    pub fn column_position(&self, name: &str) -> Result<usize, FitCvError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FitCvError::UnknownColumn(name.to_string()))
    }

    /// All values of a value column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, FitCvError> {
        let j = self.column_position(name)?;
        Ok((0..self.values.rows).map(|i| *self.values.get(i, j)).collect())
    }

    /// Distinct split ids present in the table, in row order.
    pub fn split_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = Vec::new();
        for key in &self.index {
            if ids.last() != Some(&key.split_id) {
                ids.push(key.split_id);
            }
        }
        ids
    }

    fn rows_for_split(&self, split_id: usize) -> impl Iterator<Item = usize> + '_ {
        self.index
            .iter()
            .enumerate()
            .filter(move |(_, key)| key.split_id == split_id)
            .map(|(i, _)| i)
    }

    /// One value column restricted to a split, with the split level dropped.
    ///
    /// * `split_id` - Split to select.
    /// * `column` - Value column to return.
    pub fn series_for_split(&self, split_id: usize, column: &str) -> Result<Series, FitCvError> {
        let j = self.column_position(column)?;
        let (index, values) = self
            .rows_for_split(split_id)
            .map(|i| (self.index[i].observation, *self.values.get(i, j)))
            .unzip();
        Ok(Series {
            name: column.to_string(),
            index,
            values,
        })
    }

    /// The target restricted to a split, with the split level dropped.
    pub fn target_for_split(&self, split_id: usize) -> Series {
        let (index, values) = self
            .rows_for_split(split_id)
            .map(|i| (self.index[i].observation, self.target[i]))
            .unzip();
        Series {
            name: self.target_name.clone(),
            index,
            values,
        }
    }
}

struct SplitPart {
    split_id: usize,
    observations: Vec<ObservationId>,
    columns: Vec<String>,
    values: RowMajorMatrix<f64>,
}

/// Collects the outputs of each split and assembles them into a [`SplitTable`].
///
/// The builder is given the full set of value columns up front. A split whose output
/// lacks some of them (e.g. a class its training rows never contained) has those
/// cells set to the fill value.
pub struct SplitTableBuilder {
    columns: Vec<String>,
    fill: f64,
    parts: Vec<SplitPart>,
}

impl SplitTableBuilder {
    /// * `columns` - Value columns of the finished table, in order. Names must be distinct.
    /// * `fill` - Value for columns a split does not produce.
    pub fn new(columns: Vec<String>, fill: f64) -> Result<Self, FitCvError> {
        check_distinct(&columns)?;
        Ok(SplitTableBuilder {
            columns,
            fill,
            parts: Vec::new(),
        })
    }

    /// Add the output of one split.
    ///
    /// * `split_id` - Split the rows belong to.
    /// * `observations` - Observation id of every output row.
    /// * `columns` - Names of the output columns, a subset of the builder's columns.
    /// * `values` - One row per observation, one column per name in `columns`.
    pub fn push_split(
        &mut self,
        split_id: usize,
        observations: Vec<ObservationId>,
        columns: Vec<String>,
        values: RowMajorMatrix<f64>,
    ) -> Result<(), FitCvError> {
        if values.rows != observations.len() || values.cols != columns.len() {
            return Err(FitCvError::ShapeMismatch(format!(
                "split {} produced a {} x {} output for {} observations and {} columns",
                split_id,
                values.rows,
                values.cols,
                observations.len(),
                columns.len()
            )));
        }
        if let Some(unknown) = columns.iter().find(|c| !self.columns.contains(c)) {
            return Err(FitCvError::UnknownColumn(unknown.clone()));
        }
        check_distinct(&columns)?;
        self.parts.push(SplitPart {
            split_id,
            observations,
            columns,
            values,
        });
        Ok(())
    }

    /// Concatenate the parts in the order they were pushed and join the true target
    /// from `sample` by observation id.
    pub fn finish(self, sample: &Sample) -> Result<SplitTable, FitCvError> {
        let targets = sample.target_by_observation();
        let n_rows: usize = self.parts.iter().map(|p| p.observations.len()).sum();
        let n_cols = self.columns.len();

        let mut index = Vec::with_capacity(n_rows);
        let mut target = Vec::with_capacity(n_rows);
        let mut data = vec![self.fill; n_rows * n_cols];
        let mut row = 0;
        for part in self.parts {
            let positions: Vec<usize> = part
                .columns
                .iter()
                .filter_map(|c| self.columns.iter().position(|name| name == c))
                .collect();
            for (i, observation) in part.observations.into_iter().enumerate() {
                let value = targets
                    .get(&observation)
                    .ok_or(FitCvError::UnknownObservation(observation))?;
                index.push(RowKey {
                    observation,
                    split_id: part.split_id,
                });
                target.push(*value);
                for (k, j) in positions.iter().enumerate() {
                    data[row * n_cols + j] = *part.values.get(i, k);
                }
                row += 1;
            }
        }

        Ok(SplitTable {
            columns: self.columns,
            index,
            values: RowMajorMatrix::new(data, n_rows, n_cols),
            target_name: sample.target_name().to_string(),
            target,
        })
    }
}

fn check_distinct(columns: &[String]) -> Result<(), FitCvError> {
    for (i, name) in columns.iter().enumerate() {
        if columns[..i].contains(name) {
            return Err(FitCvError::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        Sample::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]], vec![10.0, 11.0, 12.0, 13.0])
            .unwrap()
            .with_index(vec![40, 41, 42, 43])
            .unwrap()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concat_and_join() {
        let mut builder = SplitTableBuilder::new(names(&[PREDICTION]), f64::NAN).unwrap();
        builder
            .push_split(0, vec![42, 40], names(&[PREDICTION]), RowMajorMatrix::new(vec![1.0, 2.0], 2, 1))
            .unwrap();
        builder
            .push_split(1, vec![40, 43], names(&[PREDICTION]), RowMajorMatrix::new(vec![3.0, 4.0], 2, 1))
            .unwrap();
        let table = builder.finish(&sample()).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.split_ids(), vec![0, 1]);
        assert_eq!(table.index()[2], RowKey { observation: 40, split_id: 1 });
        assert_eq!(table.target(), &[12.0, 10.0, 10.0, 13.0]);
        assert_eq!(table.column(PREDICTION).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(table.target_name(), TARGET);

        let s1 = table.series_for_split(1, PREDICTION).unwrap();
        assert_eq!(s1.index, vec![40, 43]);
        assert_eq!(s1.values, vec![3.0, 4.0]);
        let t0 = table.target_for_split(0);
        assert_eq!(t0.index, vec![42, 40]);
        assert_eq!(t0.values, vec![12.0, 10.0]);
        assert!(table.series_for_split(5, PREDICTION).unwrap().is_empty());
        assert!(matches!(table.column("missing"), Err(FitCvError::UnknownColumn(_))));
    }

    #[test]
    fn test_missing_columns_filled() {
        let mut builder = SplitTableBuilder::new(names(&["0", "1", "2"]), 0.0).unwrap();
        builder
            .push_split(0, vec![41], names(&["0", "2"]), RowMajorMatrix::new(vec![0.4, 0.6], 1, 2))
            .unwrap();
        let table = builder.finish(&sample()).unwrap();
        assert_eq!(table.values().row(0), &[0.4, 0.0, 0.6]);
        assert_eq!(table.series_for_split(0, "1").unwrap().values, vec![0.0]);
    }

    #[test]
    fn test_builder_errors() {
        let mut builder = SplitTableBuilder::new(names(&[PREDICTION]), 0.0).unwrap();
        assert!(builder
            .push_split(0, vec![40, 41], names(&[PREDICTION]), RowMajorMatrix::new(vec![1.0], 1, 1))
            .is_err());
        assert!(matches!(
            builder.push_split(0, vec![40], names(&["other"]), RowMajorMatrix::new(vec![1.0], 1, 1)),
            Err(FitCvError::UnknownColumn(_))
        ));
        builder
            .push_split(0, vec![99], names(&[PREDICTION]), RowMajorMatrix::new(vec![1.0], 1, 1))
            .unwrap();
        assert!(matches!(
            builder.finish(&sample()),
            Err(FitCvError::UnknownObservation(99))
        ));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        assert!(matches!(
            SplitTableBuilder::new(names(&["0", "0", "1"]), 0.0),
            Err(FitCvError::DuplicateColumn(c)) if c == "0"
        ));
        let mut builder = SplitTableBuilder::new(names(&["0", "1"]), 0.0).unwrap();
        assert!(matches!(
            builder.push_split(0, vec![40], names(&["1", "1"]), RowMajorMatrix::new(vec![0.5, 0.5], 1, 2)),
            Err(FitCvError::DuplicateColumn(_))
        ));
    }
}
