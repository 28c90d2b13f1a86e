//! Repeating radial basis functions over the hour of day
//!
//! A smoother alternative to the sin/cos pair: each basis is a Gaussian bump
//! centred on an evenly spaced phase of the daily cycle, repeated across the
//! cycle boundary so that late evening and early morning stay close.

use tracing::debug;

use crate::domain::TimeSeries;
use crate::error::{Result, WorkbenchError};

/// Bank of periodic Gaussian basis functions over a bounded input range
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingBasis {
    n_periods: usize,
    input_range: (f64, f64),
}

impl Default for RepeatingBasis {
    /// 12 bases over hours 0..=23
    fn default() -> Self {
        Self {
            n_periods: 12,
            input_range: (0.0, 23.0),
        }
    }
}

impl RepeatingBasis {
    pub fn new(n_periods: usize, input_range: (f64, f64)) -> Result<Self> {
        if n_periods == 0 {
            return Err(WorkbenchError::InvalidParameter(
                "radial basis needs at least one period".to_string(),
            ));
        }
        if !(input_range.1 > input_range.0) {
            return Err(WorkbenchError::InvalidParameter(format!(
                "radial basis input range {:?} is empty",
                input_range
            )));
        }
        Ok(Self {
            n_periods,
            input_range,
        })
    }

    pub fn n_periods(&self) -> usize {
        self.n_periods
    }

    /// `rbf_0..rbf_{n-1}`
    pub fn column_names(&self) -> Vec<String> {
        (0..self.n_periods).map(|i| format!("rbf_{}", i)).collect()
    }

    /// Activation of every basis for one input value
    pub fn transform(&self, value: f64) -> Vec<f64> {
        let (lo, hi) = self.input_range;
        let x = (value - lo) / (hi - lo);
        let width = 1.0 / self.n_periods as f64;

        (0..self.n_periods)
            .map(|i| {
                let distance = (x - i as f64 / self.n_periods as f64).abs();
                // one copy of the bump per neighbouring cycle
                [-1.0, 0.0, 1.0]
                    .iter()
                    .map(|shift| (-((distance + shift) / width).powi(2)).exp())
                    .sum::<f64>()
            })
            .collect()
    }
}

/// Append `rbf_*` columns computed from `column` (normally `hour`)
pub fn add_radial_basis_features(
    series: &TimeSeries,
    column: &str,
    basis: &RepeatingBasis,
) -> Result<TimeSeries> {
    let source = series.column(column)?;
    let activations: Vec<Option<Vec<f64>>> = source
        .iter()
        .map(|v| v.map(|v| basis.transform(v)))
        .collect();

    let mut out = series.clone();
    for (i, name) in basis.column_names().into_iter().enumerate() {
        out.push_column(name, activations.iter().map(|a| a.as_ref().map(|a| a[i])).collect())?;
    }

    debug!(columns = basis.n_periods(), source = column, "added radial basis features");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_at_basis_centres() {
        let basis = RepeatingBasis::default();
        let at_zero = basis.transform(0.0);

        let (argmax, _) = at_zero
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(argmax, 0);
        assert!(at_zero[0] > 0.99);
        assert!(at_zero[6] < 1e-6);
    }

    #[test]
    fn test_wraps_around_the_day() {
        let basis = RepeatingBasis::default();
        let late = basis.transform(23.0);
        let early = basis.transform(0.0);
        let noon = basis.transform(12.0);

        // hour 23 activates the first basis like hour 0 does, noon does not
        assert!((late[0] - early[0]).abs() < 1e-9);
        assert!(noon[0] < 1e-3);
    }

    #[test]
    fn test_adds_twelve_columns() {
        use chrono::{Duration, NaiveDate};
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = (0..3).map(|h| start + Duration::hours(h)).collect();
        let series = TimeSeries::from_columns(index, vec![("hour", vec![Some(0.0), None, Some(2.0)])]).unwrap();

        let out = add_radial_basis_features(&series, "hour", &RepeatingBasis::default()).unwrap();
        assert_eq!(out.columns().len(), 13);
        assert_eq!(out.column("rbf_11").unwrap()[1], None);
        assert!(out.column("rbf_0").unwrap()[0].is_some());
    }

    #[test]
    fn test_rejects_empty_range() {
        assert!(RepeatingBasis::new(12, (5.0, 5.0)).is_err());
        assert!(RepeatingBasis::new(0, (0.0, 23.0)).is_err());
    }
}
