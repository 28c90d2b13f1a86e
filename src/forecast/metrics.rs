//! Forecast Accuracy Metrics
//!
//! Accuracy of a forecast against observed production, computed over the full
//! horizon and again over the daytime window only (06:00-18:00 by default).
//!
//! Percentage errors are fractions (0.125, not 12.5%). Rows whose observed value
//! is zero are left out of MAPE.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveTime, Timelike};
use itertools::Itertools;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::domain::{time_in_window, Observations};
use crate::error::{Result, WorkbenchError};
use crate::features::Aggregation;

/// Time-of-day range, inclusive at both ends, used for the `_day` metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaytimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for DaytimeWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl DaytimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(WorkbenchError::InvalidParameter(format!(
                "daytime window start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time_in_window(time, self.start, self.end)
    }
}

/// Forecast accuracy metrics over one set of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Mean Square Error
    pub mse: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Mean Absolute Percentage Error (fraction), `None` if every observed value is zero
    pub mape: Option<f64>,
    /// Symmetric MAPE (fraction, 0..=2)
    pub smape: f64,
    /// Mean Absolute Scaled Error against the hourly-median baseline, `None` if
    /// the baseline could not be computed
    pub mase: Option<f64>,
    /// Number of samples evaluated
    pub sample_count: usize,
}

impl AccuracyMetrics {
    /// Calculate metrics from observed and predicted values.
    ///
    /// `y_train` only feeds the MASE baseline.
    pub fn calculate(y_true: &Observations, y_pred: &[f64], y_train: &Observations) -> Result<Self> {
        let actual = y_true.values();
        check_shapes(actual, y_pred)?;

        let mse = mse(actual, y_pred)?;
        let mase = match mase(y_true, y_pred, y_train) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, train_rows = y_train.len(), "MASE baseline unavailable");
                None
            }
        };

        Ok(Self {
            mae: mae(actual, y_pred)?,
            rmse: mse.sqrt(),
            mse,
            r2: r2(actual, y_pred)?,
            mape: mape(actual, y_pred)?,
            smape: smape(actual, y_pred)?,
            mase,
            sample_count: actual.len(),
        })
    }

    /// Assess forecast quality based on MAPE
    pub fn quality(&self) -> Option<ForecastQuality> {
        self.mape.map(ForecastQuality::from_mape)
    }
}

impl fmt::Display for AccuracyMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.3}, RMSE={:.3}, R²={:.3}, MAPE={}, n={}",
            self.mae,
            self.rmse,
            self.r2,
            self.mape
                .map(|m| format!("{:.2}%", m * 100.0))
                .unwrap_or_else(|| "n/a".to_string()),
            self.sample_count
        )
    }
}

/// Forecast quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastQuality {
    Excellent, // MAPE < 5%
    Good,      // MAPE 5-10%
    Fair,      // MAPE 10-20%
    Poor,      // MAPE 20-50%
    VeryPoor,  // MAPE > 50%
}

impl ForecastQuality {
    pub fn from_mape(mape: f64) -> Self {
        if mape < 0.05 {
            Self::Excellent
        } else if mape < 0.10 {
            Self::Good
        } else if mape < 0.20 {
            Self::Fair
        } else if mape < 0.50 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }
}

/// Full-horizon and daytime metrics for one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReport {
    pub full: AccuracyMetrics,
    /// `None` when no evaluated row falls in the daytime window
    pub day: Option<AccuracyMetrics>,
}

impl MetricReport {
    /// Report keys in output order
    pub const KEYS: [&'static str; 14] = [
        "mae", "rmse", "mse", "r2", "mape", "smape", "mase", "mae_day", "rmse_day", "mse_day",
        "r2_day", "mape_day", "smape_day", "mase_day",
    ];

    /// Score `y_pred` against `y_true`.
    ///
    /// The daytime variant keeps the rows of `y_true` inside `window` and scales
    /// MASE by a baseline built from the daytime rows of `y_train` only.
    pub fn calculate(
        y_true: &Observations,
        y_pred: &[f64],
        y_train: &Observations,
        window: DaytimeWindow,
    ) -> Result<Self> {
        let full = AccuracyMetrics::calculate(y_true, y_pred, y_train)?;

        let (index, pairs): (Vec<_>, Vec<_>) = y_true
            .index()
            .iter()
            .zip(y_true.values().iter().zip(y_pred))
            .filter(|(t, _)| window.contains(t.time()))
            .map(|(t, (a, p))| (*t, (*a, *p)))
            .unzip();
        let (actual, predicted): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();

        let day = if actual.is_empty() {
            None
        } else {
            let day_true = Observations::new(index, actual)?;
            let day_train = y_train.between_time(window.start, window.end);
            Some(AccuracyMetrics::calculate(&day_true, &predicted, &day_train)?)
        };

        Ok(Self { full, day })
    }

    /// Every key with its value, in [`MetricReport::KEYS`] order
    pub fn entries(&self) -> Vec<(&'static str, Option<f64>)> {
        let values = |m: Option<&AccuracyMetrics>| {
            [
                m.map(|m| m.mae),
                m.map(|m| m.rmse),
                m.map(|m| m.mse),
                m.map(|m| m.r2),
                m.and_then(|m| m.mape),
                m.map(|m| m.smape),
                m.and_then(|m| m.mase),
            ]
        };
        Self::KEYS
            .into_iter()
            .zip(values(Some(&self.full)).into_iter().chain(values(self.day.as_ref())))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v)
    }

    pub fn quality(&self) -> Option<ForecastQuality> {
        self.full.quality()
    }
}

impl Serialize for MetricReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "full: {}", self.full)?;
        match &self.day {
            Some(day) => write!(f, "; day: {}", day),
            None => write!(f, "; day: n/a"),
        }
    }
}

fn check_shapes(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(WorkbenchError::DimensionMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(WorkbenchError::EmptyData);
    }
    Ok(())
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_shapes(actual, predicted)?;
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs())).ok_or(WorkbenchError::EmptyData)
}

pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_shapes(actual, predicted)?;
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2))).ok_or(WorkbenchError::EmptyData)
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mse(actual, predicted)?.sqrt())
}

/// R². For a constant target this is 1.0 on an exact fit and 0.0 otherwise.
pub fn r2(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_shapes(actual, predicted)?;
    let mean_actual = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();

    Ok(if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    })
}

/// Mean of `|(actual - predicted) / actual|` over rows with a non-zero actual
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<Option<f64>> {
    check_shapes(actual, predicted)?;
    Ok(mean(
        actual
            .iter()
            .zip(predicted)
            .filter(|(a, _)| **a != 0.0)
            .map(|(a, p)| ((a - p) / a).abs()),
    ))
}

/// Mean of `2|p - a| / (|p| + |a|)`, counting rows where both are zero as 0
pub fn smape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_shapes(actual, predicted)?;
    mean(actual.iter().zip(predicted).map(|(a, p)| {
        let denominator = a.abs() + p.abs();
        if denominator == 0.0 {
            0.0
        } else {
            2.0 * (p - a).abs() / denominator
        }
    }))
    .ok_or(WorkbenchError::EmptyData)
}

/// Median training value per hour of day
pub fn hourly_median_baseline(y_train: &Observations) -> Result<BTreeMap<u32, f64>> {
    if y_train.is_empty() {
        return Err(WorkbenchError::EmptyData);
    }
    Ok(y_train
        .index()
        .iter()
        .zip(y_train.values())
        .into_group_map_by(|(t, _)| t.hour())
        .into_iter()
        .filter_map(|(hour, rows)| {
            let values: Vec<f64> = rows.into_iter().map(|(_, v)| *v).collect();
            Aggregation::Median.apply(&values).map(|m| (hour, m))
        })
        .collect())
}

/// MAE of the forecast divided by the MAE of the hourly-median naive forecast.
///
/// A naive forecast with zero error yields 0. Fails when `y_train` is empty or
/// has no rows for an hour that is being evaluated.
pub fn mase(y_true: &Observations, y_pred: &[f64], y_train: &Observations) -> Result<f64> {
    let actual = y_true.values();
    check_shapes(actual, y_pred)?;

    let baseline = hourly_median_baseline(y_train)?;
    let naive = y_true
        .index()
        .iter()
        .map(|t| {
            baseline.get(&t.hour()).copied().ok_or_else(|| {
                WorkbenchError::InvalidParameter(format!("no training data for hour {}", t.hour()))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let naive_mae = mae(actual, &naive)?;
    if naive_mae == 0.0 {
        return Ok(0.0);
    }
    Ok(mae(actual, y_pred)? / naive_mae)
}
