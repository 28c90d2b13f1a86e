//! Machine Learning Module
//!
//! Models that turn a feature [`Dataset`] into production forecasts:
//! - Physical irradiance models fitted by nonlinear least squares
//! - Random forest regression (`ml` feature)
//!
//! Every model sits behind the [`Regressor`] trait so the evaluation code never
//! depends on which one is configured.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use validator::Validate;

use itertools::Itertools;

use crate::error::{Result, WorkbenchError};

pub mod importance;
pub mod physical;
pub mod solver;
pub mod training;

#[cfg(feature = "ml")]
pub mod smartcore;

pub use importance::{above_floor, permutation_importance, FeatureImportance, DEFAULT_IMPORTANCE_FLOOR};
pub use physical::{PhysicalKind, PhysicalModel};
pub use solver::{curve_fit, CurveFit, CurveFitOptions};
pub use training::{train_and_evaluate, Dataset, Evaluation, SplitConfig};

/// Fit/predict capability shared by all models
pub trait Regressor: Send + Sync {
    fn fit(&mut self, data: &Dataset) -> Result<()>;

    /// One prediction per row of `data`
    fn predict(&self, data: &Dataset) -> Result<Vec<f64>>;

    fn name(&self) -> String;
}

/// ML Model Type
///
/// Deserialized through [`ModelKind::parse`], so configuration accepts any
/// letter case and an unknown name lists the valid ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(try_from = "String", into = "String")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    Physical,
}

impl TryFrom<String> for ModelKind {
    type Error = WorkbenchError;

    fn try_from(name: String) -> Result<Self> {
        Self::parse(&name)
    }
}

impl From<ModelKind> for String {
    fn from(kind: ModelKind) -> Self {
        kind.to_string()
    }
}

impl ModelKind {
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .to_lowercase()
            .parse()
            .map_err(|_| WorkbenchError::UnsupportedModel {
                name: name.to_string(),
                valid: Self::iter().join(", "),
            })
    }
}

/// Random forest hyperparameters
///
/// Conservative defaults keep training fast on small machines:
/// - 50 trees
/// - Max depth 10
/// - Min samples split 5
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ForestConfig {
    #[validate(range(min = 1, max = 1000))]
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    #[validate(range(min = 2))]
    pub min_samples_split: usize,
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

/// Which model to train and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Physical model tag: LI, LW or NL
    pub physical: String,
    /// Function evaluation budget of the physical model fit
    #[validate(range(min = 10))]
    pub max_evaluations: usize,
    /// Importance share in percent a feature must exceed to be reported
    #[validate(range(min = 0.0, max = 100.0))]
    pub importance_floor: f64,
    #[validate(nested)]
    pub forest: ForestConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Physical,
            physical: "NL".to_string(),
            max_evaluations: 5000,
            importance_floor: DEFAULT_IMPORTANCE_FLOOR,
            forest: ForestConfig::default(),
        }
    }
}

/// Instantiate the configured, unfitted model
pub fn build_model(config: &ModelConfig) -> Result<Box<dyn Regressor>> {
    match config.kind {
        ModelKind::Physical => {
            let kind = PhysicalKind::parse(&config.physical)?;
            let options = CurveFitOptions {
                max_evaluations: config.max_evaluations,
                ..CurveFitOptions::default()
            };
            Ok(Box::new(PhysicalModel::new(kind, options)))
        }
        #[cfg(feature = "ml")]
        ModelKind::RandomForest => Ok(Box::new(smartcore::SmartcoreRandomForest::new(
            config.forest.clone(),
        ))),
        #[cfg(not(feature = "ml"))]
        ModelKind::RandomForest => Err(WorkbenchError::UnsupportedModel {
            name: ModelKind::RandomForest.to_string(),
            valid: format!("{} (random_forest requires the `ml` feature)", ModelKind::Physical),
        }),
    }
}
