//! Lagged copies of the target and their row-wise summaries

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TimeSeries;
use crate::error::{Result, WorkbenchError};
use crate::features::windows::Aggregation;

/// Hour-ago, day-ago and 2/3/4-days-ago for hourly data
pub const DEFAULT_LAGS: [usize; 5] = [1, 24, 48, 72, 96];

/// Summary columns computed across the lag columns of each row
pub const LAG_SUMMARIES: [(&str, Aggregation); 3] = [
    ("lag_mean", Aggregation::Mean),
    ("lag_median", Aggregation::Median),
    ("lag_std", Aggregation::Std),
];

/// Strictly positive sample offsets applied to the target column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct LagSpec {
    offsets: Vec<usize>,
}

impl Default for LagSpec {
    fn default() -> Self {
        Self {
            offsets: DEFAULT_LAGS.to_vec(),
        }
    }
}

impl TryFrom<Vec<usize>> for LagSpec {
    type Error = WorkbenchError;

    fn try_from(offsets: Vec<usize>) -> Result<Self> {
        Self::new(offsets)
    }
}

impl From<LagSpec> for Vec<usize> {
    fn from(spec: LagSpec) -> Self {
        spec.offsets
    }
}

impl LagSpec {
    pub fn new(offsets: Vec<usize>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(WorkbenchError::InvalidLag(
                "at least one lag offset is required".to_string(),
            ));
        }
        if offsets.contains(&0) {
            return Err(WorkbenchError::InvalidLag(
                "lag offsets must be positive integers, got 0".to_string(),
            ));
        }
        Ok(Self { offsets })
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// `lag{k}` for each offset followed by the three summaries
    pub fn column_names(&self) -> Vec<String> {
        self.offsets
            .iter()
            .map(|k| format!("lag{}", k))
            .chain(LAG_SUMMARIES.iter().map(|(name, _)| name.to_string()))
            .collect()
    }
}

/// Append `lag{k}` and `lag_mean`/`lag_median`/`lag_std` columns.
///
/// `lag{k}` at row `t` is the target at row `t - k`, missing for the first `k`
/// rows. Summaries are taken across the lag columns of the same row and skip
/// missing lags; `lag_std` needs at least two present lags.
pub fn add_lag_features(series: &TimeSeries, target: &str, spec: &LagSpec) -> Result<TimeSeries> {
    let values = series.column(target)?;

    let lagged: Vec<Vec<Option<f64>>> = spec
        .offsets()
        .iter()
        .map(|&k| {
            (0..values.len())
                .map(|t| t.checked_sub(k).and_then(|src| values[src]))
                .collect()
        })
        .collect();

    let mut out = series.clone();
    for (k, column) in spec.offsets().iter().zip(&lagged) {
        out.push_column(format!("lag{}", k), column.clone())?;
    }

    let rows: Vec<Vec<f64>> = (0..values.len())
        .map(|t| lagged.iter().filter_map(|c| c[t]).collect())
        .collect();
    for (name, agg) in LAG_SUMMARIES {
        out.push_column(name, rows.iter().map(|r| agg.apply(r)).collect())?;
    }

    debug!(
        target_column = target,
        lags = spec.offsets().len(),
        "added lag features"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ramp(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = (0..n).map(|i| start + Duration::hours(i as i64)).collect();
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        TimeSeries::from_values(index, "energy", &values).unwrap()
    }

    #[test]
    fn test_single_lag() {
        let spec = LagSpec::new(vec![1]).unwrap();
        let out = add_lag_features(&ramp(100), "energy", &spec).unwrap();

        let lag1 = out.column("lag1").unwrap();
        assert_eq!(lag1[0], None);
        assert_eq!(lag1[5], Some(4.0));
        assert_eq!(lag1.len(), 100);
    }

    #[test]
    fn test_summaries_are_row_wise() {
        let spec = LagSpec::new(vec![1, 2, 4]).unwrap();
        let out = add_lag_features(&ramp(10), "energy", &spec).unwrap();

        // row 6 sees 5, 4 and 2
        assert_eq!(out.column("lag_mean").unwrap()[6], Some(11.0 / 3.0));
        assert_eq!(out.column("lag_median").unwrap()[6], Some(4.0));
        let std = out.column("lag_std").unwrap()[6].unwrap();
        assert!((std - 1.527_525_231_651_947).abs() < 1e-9);

        // row 1 only has lag1: mean defined, std is not
        assert_eq!(out.column("lag_mean").unwrap()[1], Some(0.0));
        assert_eq!(out.column("lag_std").unwrap()[1], None);
        assert_eq!(out.column("lag_mean").unwrap()[0], None);
    }

    #[test]
    fn test_default_column_names() {
        assert_eq!(
            LagSpec::default().column_names(),
            vec!["lag1", "lag24", "lag48", "lag72", "lag96", "lag_mean", "lag_median", "lag_std"]
        );
    }

    #[test]
    fn test_validation() {
        assert!(matches!(LagSpec::new(vec![1, 0]), Err(WorkbenchError::InvalidLag(_))));
        assert!(matches!(LagSpec::new(vec![]), Err(WorkbenchError::InvalidLag(_))));

        let err = add_lag_features(&ramp(5), "power", &LagSpec::default()).unwrap_err();
        assert_eq!(err, WorkbenchError::missing_column("power"));
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<LagSpec>("[1, 24]").is_ok());
        assert!(serde_json::from_str::<LagSpec>("[0]").is_err());
    }
}
