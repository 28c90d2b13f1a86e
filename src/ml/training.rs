//! ML Model Training Pipeline
//!
//! Turns a selected feature table into fully observed rows, splits them in time
//! and runs one fit/predict/score cycle.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::importance::{permutation_importance, FeatureImportance};
use super::Regressor;
use crate::domain::{Observations, TimeSeries};
use crate::error::{Result, WorkbenchError};
use crate::forecast::{DaytimeWindow, ForecastQuality, MetricReport};

/// Training Dataset
///
/// Row-major feature values with their timestamps and targets. Every row is
/// fully observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    index: Vec<NaiveDateTime>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl Dataset {
    pub fn new(
        index: Vec<NaiveDateTime>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> Result<Self> {
        if features.len() != targets.len() || index.len() != targets.len() {
            return Err(WorkbenchError::InvalidIndex(format!(
                "{} timestamps, {} feature rows, {} targets",
                index.len(),
                features.len(),
                targets.len()
            )));
        }
        if let Some(row) = features.iter().find(|r| r.len() != feature_names.len()) {
            return Err(WorkbenchError::InvalidParameter(format!(
                "feature row has {} values for {} names",
                row.len(),
                feature_names.len()
            )));
        }
        Ok(Self {
            index,
            feature_names,
            features,
            targets,
        })
    }

    /// Materialize `selected` (target plus feature columns) into model rows.
    ///
    /// Rows with a missing target or any missing feature are dropped; lag and
    /// window warm-up rows always are.
    pub fn from_table(selected: &TimeSeries, target: &str) -> Result<Self> {
        let target_values = selected.column(target)?;
        let feature_names: Vec<String> = selected
            .column_names()
            .into_iter()
            .filter(|name| *name != target)
            .map(String::from)
            .collect();
        let columns = feature_names
            .iter()
            .map(|name| selected.column(name))
            .collect::<Result<Vec<_>>>()?;

        let mut index = Vec::new();
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for (row, timestamp) in selected.index().iter().enumerate() {
            let Some(y) = target_values[row] else { continue };
            let Some(x) = columns.iter().map(|c| c[row]).collect::<Option<Vec<f64>>>() else {
                continue;
            };
            index.push(*timestamp);
            features.push(x);
            targets.push(y);
        }

        let dropped = selected.len() - targets.len();
        if dropped > 0 {
            warn!(
                dropped,
                kept = targets.len(),
                "dropped rows with missing target or feature values"
            );
        }

        Self::new(index, feature_names, features, targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.feature_names.iter().any(|n| n == name)
    }

    /// Values of one feature across all rows
    pub fn feature_column(&self, name: &str) -> Result<Vec<f64>> {
        let position = self
            .feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| WorkbenchError::missing_column(name))?;
        Ok(self.features.iter().map(|row| row[position]).collect())
    }

    /// Copy with feature `position` rotated forward by `shift` rows
    pub fn with_feature_rotated(&self, position: usize, shift: usize) -> Result<Self> {
        if position >= self.feature_names.len() {
            return Err(WorkbenchError::InvalidParameter(format!(
                "feature position {} out of range for {} features",
                position,
                self.feature_names.len()
            )));
        }
        let mut column: Vec<f64> = self.features.iter().map(|row| row[position]).collect();
        if !column.is_empty() {
            let len = column.len();
            column.rotate_right(shift % len);
        }

        let mut rotated = self.clone();
        for (row, value) in rotated.features.iter_mut().zip(column) {
            row[position] = value;
        }
        Ok(rotated)
    }

    pub fn target_observations(&self) -> Result<Observations> {
        Observations::new(self.index.clone(), self.targets.clone())
    }

    fn filter(&self, keep: impl Fn(&NaiveDateTime) -> bool) -> Self {
        let rows: Vec<usize> = (0..self.len()).filter(|&i| keep(&self.index[i])).collect();
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            feature_names: self.feature_names.clone(),
            features: rows.iter().map(|&i| self.features[i].clone()).collect(),
            targets: rows.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Rows with timestamps in `[start, end]`; open bounds are unbounded
    pub fn between(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        self.filter(|t| start.map_or(true, |s| *t >= s) && end.map_or(true, |e| *t <= e))
    }

    /// Rows at or before `cutoff` for training, rows after it for testing
    pub fn split_at(&self, cutoff: NaiveDateTime) -> Result<(Dataset, Dataset)> {
        let train = self.filter(|t| *t <= cutoff);
        let test = self.filter(|t| *t > cutoff);
        if train.is_empty() || test.is_empty() {
            return Err(WorkbenchError::EmptyData);
        }
        Ok((train, test))
    }

    /// Split dataset into training and validation sets
    pub fn split(&self, train_ratio: f64) -> Result<(Dataset, Dataset)> {
        if train_ratio <= 0.0 || train_ratio >= 1.0 {
            return Err(WorkbenchError::InvalidParameter(format!(
                "train ratio must be between 0 and 1, got {}",
                train_ratio
            )));
        }

        let split_idx = (self.len() as f64 * train_ratio).floor() as usize;
        if split_idx == 0 || split_idx == self.len() {
            return Err(WorkbenchError::EmptyData);
        }
        let cutoff = self.index[split_idx - 1];
        self.split_at(cutoff)
    }
}

/// How the dataset is divided into train and test rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SplitConfig {
    /// First timestamp used at all
    pub train_start: Option<NaiveDateTime>,
    /// Last training timestamp; later rows are test rows
    pub test_start: Option<NaiveDateTime>,
    /// Last timestamp used at all
    pub test_end: Option<NaiveDateTime>,
    /// Chronological share of rows used for training when no cutoff is set
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub train_ratio: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_start: None,
            test_start: None,
            test_end: None,
            train_ratio: 0.8,
        }
    }
}

impl SplitConfig {
    pub fn apply(&self, dataset: &Dataset) -> Result<(Dataset, Dataset)> {
        if let (Some(start), Some(end)) = (self.train_start, self.test_end) {
            if start >= end {
                return Err(WorkbenchError::InvalidParameter(format!(
                    "train start {} must be before test end {}",
                    start, end
                )));
            }
        }
        let window = dataset.between(self.train_start, self.test_end);
        match self.test_start {
            Some(cutoff) => window.split_at(cutoff),
            None => window.split(self.train_ratio),
        }
    }
}

/// Outcome of one fit/predict/score cycle
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub model: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: Vec<String>,
    pub metrics: MetricReport,
    pub quality: Option<ForecastQuality>,
    /// Permutation importance on the test rows, most important first
    pub importance: Vec<FeatureImportance>,
    #[serde(skip)]
    pub predictions: Vec<f64>,
}

/// Fit `model` on `train`, predict `test` and score it.
///
/// The training targets serve as the MASE reference series.
pub fn train_and_evaluate(
    model: &mut dyn Regressor,
    train: &Dataset,
    test: &Dataset,
    window: DaytimeWindow,
) -> Result<Evaluation> {
    if train.is_empty() || test.is_empty() {
        return Err(WorkbenchError::EmptyData);
    }

    model.fit(train)?;
    let predictions = model.predict(test)?;
    let metrics = MetricReport::calculate(
        &test.target_observations()?,
        &predictions,
        &train.target_observations()?,
        window,
    )?;
    let importance = permutation_importance(&*model, test)?;

    info!(
        model = %model.name(),
        train_rows = train.len(),
        test_rows = test.len(),
        mae = metrics.full.mae,
        r2 = metrics.full.r2,
        "evaluated model"
    );

    Ok(Evaluation {
        model: model.name(),
        train_rows: train.len(),
        test_rows: test.len(),
        features: train.feature_names().to_vec(),
        quality: metrics.quality(),
        importance,
        metrics,
        predictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn hourly(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    fn table() -> TimeSeries {
        TimeSeries::from_columns(
            hourly(6),
            vec![
                ("energy", vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)]),
                ("lag1", vec![None, Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)]),
                ("ghi", vec![Some(0.0), Some(10.0), Some(20.0), Some(30.0), Some(40.0), Some(50.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_table_drops_incomplete_rows() {
        let dataset = Dataset::from_table(&table(), "energy").unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.feature_names(), &["lag1", "ghi"]);
        assert_eq!(dataset.targets(), &[2.0, 5.0, 6.0]);
        assert_eq!(dataset.feature_column("ghi").unwrap(), vec![10.0, 40.0, 50.0]);
        assert!(dataset.feature_column("air_temp").is_err());
    }

    #[test]
    fn test_split_at_never_overlaps() {
        let dataset = Dataset::from_table(&table(), "energy").unwrap();
        let cutoff = hourly(6)[4];

        let (train, test) = dataset.split_at(cutoff).unwrap();
        assert_eq!(train.targets(), &[2.0, 5.0]);
        assert_eq!(test.targets(), &[6.0]);
        assert!(train.index().last() < test.index().first());

        assert_eq!(dataset.split_at(hourly(6)[5]).unwrap_err(), WorkbenchError::EmptyData);
    }

    #[test]
    fn test_dataset_split() {
        let index = hourly(4);
        let features = vec![vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 4.0], vec![4.0, 5.0]];
        let names = vec!["f1".to_string(), "f2".to_string()];
        let dataset = Dataset::new(index, names, features, vec![3.0, 5.0, 7.0, 9.0]).unwrap();

        let (train, val) = dataset.split(0.75).unwrap();
        assert_eq!(train.len(), 3);
        assert_eq!(val.len(), 1);

        assert!(dataset.split(1.0).is_err());
    }

    #[test]
    fn test_rotated_feature_keeps_other_columns() {
        let dataset = Dataset::from_table(&table(), "energy").unwrap();
        let rotated = dataset.with_feature_rotated(1, 1).unwrap();

        assert_eq!(rotated.feature_column("ghi").unwrap(), vec![50.0, 10.0, 40.0]);
        assert_eq!(rotated.feature_column("lag1").unwrap(), dataset.feature_column("lag1").unwrap());
        assert_eq!(rotated.targets(), dataset.targets());
        assert!(dataset.with_feature_rotated(2, 1).is_err());
    }

    #[test]
    fn test_split_config() {
        let dataset = Dataset::from_table(&table(), "energy").unwrap();
        let index = hourly(6);

        let config = SplitConfig {
            train_start: Some(index[2]),
            test_start: Some(index[4]),
            test_end: None,
            ..SplitConfig::default()
        };
        let (train, test) = config.apply(&dataset).unwrap();
        assert_eq!(train.targets(), &[5.0]);
        assert_eq!(test.targets(), &[6.0]);

        assert!(SplitConfig::default().validate().is_ok());
        let bad = SplitConfig {
            train_ratio: 1.5,
            ..SplitConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
