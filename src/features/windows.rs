//! Trailing rolling-window statistics of the target
//!
//! The aggregate for row `t` covers rows `t-w ..= t-1`: the window is computed
//! and then shifted one sample forward, so a row never sees its own target.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use itertools::Itertools;

use crate::domain::TimeSeries;
use crate::error::{Result, WorkbenchError};

/// Default window lengths in samples
pub const DEFAULT_WINDOWS: [usize; 4] = [3, 6, 12, 24];

/// Summary statistic applied over a set of values
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Median,
    /// Sample standard deviation (n - 1 denominator)
    Std,
    Min,
    Max,
}

impl Aggregation {
    /// Parse an aggregation name, listing the valid names on failure
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .to_lowercase()
            .parse()
            .map_err(|_| WorkbenchError::UnsupportedAggregation {
                name: name.to_string(),
                valid: Self::iter().join(", "),
            })
    }

    /// The default set: mean, median, std, min, max
    pub fn defaults() -> Vec<Self> {
        Self::iter().collect()
    }

    /// Apply to `values`; `None` when undefined (no values, or fewer than two for std)
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        match self {
            Self::Mean => Some(values.iter().sum::<f64>() / n),
            Self::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                Some(if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                })
            }
            Self::Std => {
                if values.len() < 2 {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Some(variance.sqrt())
            }
            Self::Min => values.iter().copied().reduce(f64::min),
            Self::Max => values.iter().copied().reduce(f64::max),
        }
    }
}

/// Window lengths and the statistics computed over each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindowSpec", into = "RawWindowSpec")]
pub struct WindowSpec {
    lengths: Vec<usize>,
    aggregations: Vec<Aggregation>,
}

/// Unchecked serde shape of [`WindowSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawWindowSpec {
    lengths: Vec<usize>,
    aggregations: Vec<Aggregation>,
}

impl TryFrom<RawWindowSpec> for WindowSpec {
    type Error = WorkbenchError;

    fn try_from(raw: RawWindowSpec) -> Result<Self> {
        Self::new(raw.lengths, raw.aggregations)
    }
}

impl From<WindowSpec> for RawWindowSpec {
    fn from(spec: WindowSpec) -> Self {
        Self {
            lengths: spec.lengths,
            aggregations: spec.aggregations,
        }
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            lengths: DEFAULT_WINDOWS.to_vec(),
            aggregations: Aggregation::defaults(),
        }
    }
}

impl WindowSpec {
    pub fn new(lengths: Vec<usize>, aggregations: Vec<Aggregation>) -> Result<Self> {
        if lengths.is_empty() {
            return Err(WorkbenchError::InvalidWindow(
                "at least one window length is required".to_string(),
            ));
        }
        if let Some(bad) = lengths.iter().find(|w| **w == 0) {
            return Err(WorkbenchError::InvalidWindow(format!(
                "window lengths must be positive integers, got {}",
                bad
            )));
        }
        if aggregations.is_empty() {
            return Err(WorkbenchError::InvalidWindow(
                "at least one aggregation is required".to_string(),
            ));
        }
        Ok(Self {
            lengths,
            aggregations: aggregations.into_iter().unique().collect(),
        })
    }

    /// Build from aggregation names, e.g. from configuration
    pub fn from_names<S: AsRef<str>>(lengths: Vec<usize>, names: &[S]) -> Result<Self> {
        let aggregations = names
            .iter()
            .map(|n| Aggregation::parse(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(lengths, aggregations)
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    /// `window{w}_{agg}` for every length and aggregation
    pub fn column_names(&self) -> Vec<String> {
        self.lengths
            .iter()
            .cartesian_product(&self.aggregations)
            .map(|(w, agg)| format!("window{}_{}", w, agg))
            .collect()
    }
}

/// Append `window{w}_{agg}` columns over `target`.
///
/// Rows without a complete window of `w` observed samples before them are missing.
pub fn add_window_features(series: &TimeSeries, target: &str, spec: &WindowSpec) -> Result<TimeSeries> {
    let values = series.column(target)?;
    let mut out = series.clone();

    for &w in spec.lengths() {
        let windows: Vec<Option<Vec<f64>>> = (0..values.len())
            .map(|t| {
                if t < w {
                    return None;
                }
                values[t - w..t].iter().copied().collect::<Option<Vec<f64>>>()
            })
            .collect();

        for agg in spec.aggregations() {
            let column = windows
                .iter()
                .map(|window| window.as_deref().and_then(|v| agg.apply(v)))
                .collect();
            out.push_column(format!("window{}_{}", w, agg), column)?;
        }
    }

    debug!(
        target_column = target,
        columns = spec.lengths().len() * spec.aggregations().len(),
        "added rolling window features"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn target(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = (0..values.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        TimeSeries::from_values(index, "energy", values).unwrap()
    }

    #[test]
    fn test_aggregations() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(Aggregation::Mean.apply(&values), Some(2.5));
        assert_eq!(Aggregation::Median.apply(&values), Some(2.5));
        assert_eq!(Aggregation::Min.apply(&values), Some(1.0));
        assert_eq!(Aggregation::Max.apply(&values), Some(4.0));
        let std = Aggregation::Std.apply(&values).unwrap();
        assert!((std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert_eq!(Aggregation::Std.apply(&[1.0]), None);
        assert_eq!(Aggregation::Mean.apply(&[]), None);
    }

    #[test]
    fn test_parse_lists_valid_names() {
        assert_eq!(Aggregation::parse("Median").unwrap(), Aggregation::Median);
        match Aggregation::parse("p95").unwrap_err() {
            WorkbenchError::UnsupportedAggregation { valid, .. } => {
                assert_eq!(valid, "mean, median, std, min, max")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_window_is_shifted_by_one_sample() {
        let spec = WindowSpec::new(vec![3], vec![Aggregation::Mean]).unwrap();
        let out = add_window_features(&target(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), "energy", &spec).unwrap();

        let mean = out.column("window3_mean").unwrap();
        assert_eq!(&mean[..3], &[None, None, None]);
        assert_eq!(mean[3], Some(2.0));
        assert_eq!(mean[5], Some(4.0));
    }

    #[test]
    fn test_gap_inside_window_is_missing() {
        let series = TimeSeries::from_columns(
            target(&[0.0; 5]).index().to_vec(),
            vec![("energy", vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)])],
        )
        .unwrap();
        let spec = WindowSpec::new(vec![2], vec![Aggregation::Max]).unwrap();

        let out = add_window_features(&series, "energy", &spec).unwrap();
        assert_eq!(
            out.column("window2_max").unwrap(),
            &[None, None, None, None, Some(4.0)]
        );
    }

    #[test]
    fn test_default_column_names() {
        let names = WindowSpec::default().column_names();
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], "window3_mean");
        assert_eq!(names[19], "window24_max");
    }

    #[test]
    fn test_invalid_specs() {
        assert!(matches!(
            WindowSpec::new(vec![0, 3], Aggregation::defaults()),
            Err(WorkbenchError::InvalidWindow(_))
        ));
        assert!(WindowSpec::new(vec![], Aggregation::defaults()).is_err());
        assert!(WindowSpec::from_names(vec![3], &["mean", "mode"]).is_err());
    }

    #[test]
    fn test_deserialize_goes_through_validation() {
        let spec: WindowSpec =
            serde_json::from_str(r#"{"lengths":[3,6],"aggregations":["mean","max","mean"]}"#)
                .unwrap();
        assert_eq!(spec.aggregations(), &[Aggregation::Mean, Aggregation::Max]);

        assert!(serde_json::from_str::<WindowSpec>(r#"{"lengths":[0],"aggregations":["mean"]}"#).is_err());
        assert!(serde_json::from_str::<WindowSpec>(r#"{"lengths":[3],"aggregations":[]}"#).is_err());
        assert!(serde_json::from_str::<WindowSpec>(r#"{"lengths":[],"aggregations":["std"]}"#).is_err());
    }
}
