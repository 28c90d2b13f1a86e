//! Sine/cosine encoding of bounded periodic integer fields

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TimeSeries;
use crate::error::Result;

/// Calendar columns encoded by default
pub const DEFAULT_CYCLIC_COLUMNS: [&str; 3] = ["hour", "day", "day_of_week"];

/// How the encoding period is derived from the observed range of a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclicPeriodRule {
    /// Number of distinct representable values: `max + 1` for 0-based fields
    /// (hour -> 24), `max` for 1-based fields (day of month -> 31).
    #[default]
    Cardinality,
    /// `max` when the minimum is 0, `max + 1` otherwise. A column of zeros
    /// yields a zero period.
    Observed,
}

impl CyclicPeriodRule {
    pub fn period(self, min: f64, max: f64) -> f64 {
        let zero_based = min == 0.0;
        match (self, zero_based) {
            (Self::Cardinality, true) | (Self::Observed, false) => max + 1.0,
            (Self::Cardinality, false) | (Self::Observed, true) => max,
        }
    }
}

/// `(sin, cos)` of `value` on a circle of `period` steps.
///
/// A zero period has no defined position and maps to angle 0.
pub fn encode_cyclic(value: f64, period: f64) -> (f64, f64) {
    if period == 0.0 {
        return (0.0, 1.0);
    }
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Add `{col}_sin` / `{col}_cos` for every column in `columns`.
///
/// The period of each column is detected from its observed minimum and maximum
/// under `rule`. With `drop_original` the source columns are removed afterwards.
pub fn add_cyclic_features<S: AsRef<str>>(
    series: &TimeSeries,
    columns: &[S],
    drop_original: bool,
    rule: CyclicPeriodRule,
) -> Result<TimeSeries> {
    let mut out = series.clone();

    for name in columns {
        let name = name.as_ref();
        let values = series.column(name)?;

        let (min, max) = values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let period = rule.period(min, max);

        let encoded: Vec<Option<(f64, f64)>> = values
            .iter()
            .map(|v| v.map(|v| encode_cyclic(v, period)))
            .collect();

        out.push_column(format!("{}_sin", name), encoded.iter().map(|e| e.map(|(s, _)| s)).collect())?;
        out.push_column(format!("{}_cos", name), encoded.iter().map(|e| e.map(|(_, c)| c)).collect())?;
        debug!(column = name, period, "encoded cyclic column");
    }

    if drop_original {
        let names: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
        out = out.drop_columns(&names);
    }

    Ok(out)
}
