//! Feature pipeline orchestration
//!
//! [`FeaturePipeline::build`] applies the stages in a fixed order:
//!
//! 1. calendar fields
//! 2. elapsed time
//! 3. sin/cos encoding of the calendar fields
//! 4. radial basis over the hour
//! 5. target lags
//! 6. shifted rolling windows
//!
//! The result is a [`FeatureMatrix`] that remembers which columns each
//! [`FeatureGroup`] produced, so callers can pick any combination of groups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::domain::TimeSeries;
use crate::error::{Result, WorkbenchError};
use crate::features::{
    add_cyclic_features, add_lag_features, add_radial_basis_features, add_time_features,
    add_time_since, add_window_features, CyclicPeriodRule, FeatureGroup, FeatureSelection,
    LagSpec, RepeatingBasis, WindowSpec, DEFAULT_CYCLIC_COLUMNS, DEFAULT_LAGS, DEFAULT_WINDOWS,
    ELAPSED_FEATURES, TIME_FEATURES,
};

/// Recognized feature options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FeatureConfig {
    /// Target lag offsets in samples
    #[validate(length(min = 1))]
    pub lags: Vec<usize>,
    /// Rolling window lengths in samples
    #[validate(length(min = 1))]
    pub windows: Vec<usize>,
    /// Statistics computed over each window
    #[validate(length(min = 1))]
    pub aggregations: Vec<String>,
    /// Calendar columns given sin/cos encodings
    pub cyclic_columns: Vec<String>,
    /// Remove the encoded calendar columns from the matrix
    pub drop_original: bool,
    pub cyclic_period_rule: CyclicPeriodRule,
    /// Number of radial basis functions over the day
    #[validate(range(min = 1, max = 48))]
    pub radial_periods: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: DEFAULT_LAGS.to_vec(),
            windows: DEFAULT_WINDOWS.to_vec(),
            aggregations: ["mean", "median", "std", "min", "max"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cyclic_columns: DEFAULT_CYCLIC_COLUMNS.iter().map(|s| s.to_string()).collect(),
            drop_original: false,
            cyclic_period_rule: CyclicPeriodRule::default(),
            radial_periods: 12,
        }
    }
}

/// Validated, reusable feature pipeline
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    lags: LagSpec,
    windows: WindowSpec,
    cyclic_columns: Vec<String>,
    drop_original: bool,
    period_rule: CyclicPeriodRule,
    radial: RepeatingBasis,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self {
            lags: LagSpec::default(),
            windows: WindowSpec::default(),
            cyclic_columns: DEFAULT_CYCLIC_COLUMNS.iter().map(|s| s.to_string()).collect(),
            drop_original: false,
            period_rule: CyclicPeriodRule::default(),
            radial: RepeatingBasis::default(),
        }
    }
}

impl FeaturePipeline {
    /// Validate `config` into a pipeline. All specs are checked before any data is touched.
    pub fn new(config: &FeatureConfig) -> Result<Self> {
        let lags = LagSpec::new(config.lags.clone())?;
        let windows = WindowSpec::from_names(config.windows.clone(), &config.aggregations)?;
        if let Some(unknown) = config
            .cyclic_columns
            .iter()
            .find(|c| !TIME_FEATURES.contains(&c.as_str()))
        {
            return Err(WorkbenchError::InvalidParameter(format!(
                "cyclic column '{}' is not a calendar field ({})",
                unknown,
                TIME_FEATURES.join(", ")
            )));
        }
        let radial = RepeatingBasis::new(config.radial_periods, (0.0, 23.0))?;

        Ok(Self {
            lags,
            windows,
            cyclic_columns: config.cyclic_columns.clone(),
            drop_original: config.drop_original,
            period_rule: config.cyclic_period_rule,
            radial,
        })
    }

    pub fn lags(&self) -> &LagSpec {
        &self.lags
    }

    pub fn windows(&self) -> &WindowSpec {
        &self.windows
    }

    /// Every column name the stages add, in stage order
    pub fn generated_names(&self) -> Vec<String> {
        let cyclic = self
            .cyclic_columns
            .iter()
            .flat_map(|c| [format!("{}_sin", c), format!("{}_cos", c)]);
        names(&TIME_FEATURES)
            .into_iter()
            .chain(names(&ELAPSED_FEATURES))
            .chain(cyclic)
            .chain(self.radial.column_names())
            .chain(self.lags.column_names())
            .chain(self.windows.column_names())
            .collect()
    }

    /// Derive every feature group from `series` for `target`.
    ///
    /// The input is never modified. The returned matrix keeps the index, row
    /// count and every column of `series`. An input column named like a
    /// generated feature is an `InvalidParameter` error.
    pub fn build(&self, series: &TimeSeries, target: &str) -> Result<FeatureMatrix> {
        // Fail before any stage runs
        series.column(target)?;
        let generated = self.generated_names();
        if let Some(clash) = series
            .column_names()
            .into_iter()
            .find(|name| generated.iter().any(|g| g == name))
        {
            return Err(WorkbenchError::InvalidParameter(format!(
                "input column '{}' collides with a generated feature name",
                clash
            )));
        }

        let mut groups: BTreeMap<FeatureGroup, Vec<String>> = BTreeMap::new();

        let mut out = add_time_features(series)?;
        groups.insert(FeatureGroup::Time, names(&TIME_FEATURES));

        out = add_time_since(&out)?;
        groups.insert(FeatureGroup::Elapsed, names(&ELAPSED_FEATURES));

        // Sources are dropped only after the radial stage has read `hour`
        out = add_cyclic_features(&out, &self.cyclic_columns, false, self.period_rule)?;
        groups.insert(
            FeatureGroup::Cyclic,
            self.cyclic_columns
                .iter()
                .flat_map(|c| [format!("{}_sin", c), format!("{}_cos", c)])
                .collect(),
        );

        out = add_radial_basis_features(&out, "hour", &self.radial)?;
        groups.insert(FeatureGroup::Radial, self.radial.column_names());

        if self.drop_original {
            let dropped: Vec<&str> = self.cyclic_columns.iter().map(String::as_str).collect();
            out = out.drop_columns(&dropped);
            if let Some(time) = groups.get_mut(&FeatureGroup::Time) {
                time.retain(|c| !self.cyclic_columns.contains(c));
            }
        }

        out = add_lag_features(&out, target, &self.lags)?;
        groups.insert(FeatureGroup::Lag, self.lags.column_names());

        out = add_window_features(&out, target, &self.windows)?;
        groups.insert(FeatureGroup::Window, self.windows.column_names());

        info!(
            target_column = target,
            rows = out.len(),
            columns = out.columns().len(),
            "built feature matrix"
        );

        Ok(FeatureMatrix {
            series: out,
            target: target.to_string(),
            groups,
        })
    }
}

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// A time series extended with derived columns, tagged by feature group
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    series: TimeSeries,
    target: String,
    groups: BTreeMap<FeatureGroup, Vec<String>>,
}

impl FeatureMatrix {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Join externally supplied columns (irradiance, weather) on the index.
    ///
    /// Rows of `exogenous` that do not match the matrix index are ignored; matrix
    /// rows without a match get missing values.
    pub fn with_exogenous(&self, exogenous: &TimeSeries) -> Result<Self> {
        let series = self.series.join(exogenous)?;
        let mut groups = self.groups.clone();
        groups
            .entry(FeatureGroup::Exogenous)
            .or_default()
            .extend(exogenous.column_names().into_iter().map(String::from));

        Ok(Self {
            series,
            target: self.target.clone(),
            groups,
        })
    }

    /// Columns produced by `group`, empty if the group was never built
    pub fn columns_for(&self, group: FeatureGroup) -> &[String] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of the selected feature columns, in group order.
    ///
    /// Exogenous columns come from the selection's own list; each must be
    /// present in the matrix.
    pub fn feature_names(&self, selection: &FeatureSelection) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for group in selection.groups() {
            if group == FeatureGroup::Exogenous {
                for column in selection.exogenous() {
                    if !self.series.has_column(column) {
                        return Err(WorkbenchError::missing_column(column.as_str()));
                    }
                    names.push(column.clone());
                }
            } else {
                names.extend(self.columns_for(group).iter().cloned());
            }
        }
        names.retain(|n| n != &self.target);
        let mut seen = std::collections::HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        Ok(names)
    }

    /// Target column followed by the selected feature columns
    pub fn select(&self, selection: &FeatureSelection) -> Result<TimeSeries> {
        let mut columns = vec![self.target.clone()];
        columns.extend(self.feature_names(selection)?);
        self.series.select(&columns)
    }
}
