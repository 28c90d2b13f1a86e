//! Random forest regression on smartcore
//!
//! Fitted over the selected feature columns; the tree-ensemble counterpart of
//! the physical models.

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::info;

use super::{Dataset, ForestConfig, Regressor};
use crate::error::{Result, WorkbenchError};

/// Random forest behind the [`Regressor`] seam
#[derive(Debug)]
pub struct SmartcoreRandomForest {
    config: ForestConfig,
    model: Option<RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
    feature_names: Vec<String>,
}

impl SmartcoreRandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            model: None,
            feature_names: Vec::new(),
        }
    }

    pub fn parameters(&self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            min_samples_split: self.config.min_samples_split,
            n_trees: self.config.n_trees,
            m: None, // sqrt(n_features)
            keep_samples: false,
            seed: self.config.seed,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

fn to_matrix(data: &Dataset) -> DenseMatrix<f64> {
    let flat: Vec<f64> = data.rows().iter().flatten().copied().collect();
    DenseMatrix::new(data.len(), data.feature_names().len(), flat, false)
}

impl Regressor for SmartcoreRandomForest {
    fn fit(&mut self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(WorkbenchError::EmptyData);
        }
        if data.feature_names().is_empty() {
            return Err(WorkbenchError::InvalidParameter(
                "random forest needs at least one feature column".to_string(),
            ));
        }

        let x = to_matrix(data);
        let y = data.targets().to_vec();
        let model = RandomForestRegressor::fit(&x, &y, self.parameters())
            .map_err(|e| WorkbenchError::Training(format!("RandomForest: {:?}", e)))?;

        info!(
            n_trees = self.config.n_trees,
            rows = data.len(),
            features = data.feature_names().len(),
            "fitted random forest"
        );
        self.model = Some(model);
        self.feature_names = data.feature_names().to_vec();
        Ok(())
    }

    fn predict(&self, data: &Dataset) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(WorkbenchError::FitRequired)?;
        if data.feature_names() != self.feature_names.as_slice() {
            return Err(WorkbenchError::InvalidParameter(format!(
                "model was fitted on [{}], got [{}]",
                self.feature_names.join(", "),
                data.feature_names().join(", ")
            )));
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        model
            .predict(&to_matrix(data))
            .map_err(|e| WorkbenchError::Training(format!("RandomForest prediction: {:?}", e)))
    }

    fn name(&self) -> String {
        "random_forest".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn dataset(rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = (0..targets.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        Dataset::new(index, vec!["f1".to_string(), "f2".to_string()], rows, targets).unwrap()
    }

    #[test]
    fn test_random_forest_parameters() {
        let params = SmartcoreRandomForest::new(ForestConfig::default()).parameters();
        assert_eq!(params.n_trees, 50);
        assert_eq!(params.max_depth, Some(10));
        assert_eq!(params.min_samples_split, 5);
        assert!(!params.keep_samples);
    }

    #[test]
    fn test_fit_and_predict() {
        let rows: Vec<Vec<f64>> = (1..=5).map(|i| vec![i as f64, i as f64 + 1.0]).collect();
        let data = dataset(rows, vec![3.0, 5.0, 7.0, 9.0, 11.0]);

        let mut model = SmartcoreRandomForest::new(ForestConfig {
            n_trees: 5,
            max_depth: Some(3),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        });
        assert_eq!(model.predict(&data).unwrap_err(), WorkbenchError::FitRequired);

        model.fit(&data).unwrap();
        let predicted = model.predict(&data).unwrap();
        assert_eq!(predicted.len(), 5);
        // bootstrapped trees stay within the target range
        assert!(predicted.iter().all(|p| (3.0..=11.0).contains(p)));
    }

    #[test]
    fn test_empty_fit() {
        let data = dataset(Vec::new(), Vec::new());
        let mut model = SmartcoreRandomForest::new(ForestConfig::default());
        assert_eq!(model.fit(&data).unwrap_err(), WorkbenchError::EmptyData);
    }
}
