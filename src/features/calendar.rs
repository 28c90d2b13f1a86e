//! Calendar and elapsed-time features derived from the timestamp index

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TimeSeries;
use crate::error::Result;

/// Columns added by [`add_time_features`]
pub const TIME_FEATURES: [&str; 6] = [
    "hour",
    "day",
    "month",
    "day_of_week",
    "is_weekend",
    "is_night",
];

/// Columns added by [`add_time_since`]
pub const ELAPSED_FEATURES: [&str; 2] = ["time_since", "time_since_2"];

/// Calendar fields of a single timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of month (1-31)
    pub day: u32,
    /// Month (1-12)
    pub month: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Saturday or Sunday
    pub is_weekend: bool,
    /// 18:00 onwards or 06:00 and earlier
    pub is_night: bool,
}

impl CalendarFields {
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        let hour = timestamp.hour();
        let day_of_week = timestamp.weekday().num_days_from_monday();
        Self {
            hour,
            day: timestamp.day(),
            month: timestamp.month(),
            day_of_week,
            is_weekend: day_of_week >= 5,
            is_night: hour >= 18 || hour <= 6,
        }
    }

    /// Values in [`TIME_FEATURES`] order
    fn values(&self) -> [f64; 6] {
        [
            self.hour as f64,
            self.day as f64,
            self.month as f64,
            self.day_of_week as f64,
            if self.is_weekend { 1.0 } else { 0.0 },
            if self.is_night { 1.0 } else { 0.0 },
        ]
    }
}

/// Add hour/day/month/day_of_week/is_weekend/is_night columns
pub fn add_time_features(series: &TimeSeries) -> Result<TimeSeries> {
    let rows: Vec<[f64; 6]> = series
        .index()
        .iter()
        .map(|t| CalendarFields::from_timestamp(*t).values())
        .collect();

    let mut out = series.clone();
    for (i, name) in TIME_FEATURES.iter().enumerate() {
        out.push_column(*name, rows.iter().map(|r| Some(r[i])).collect())?;
    }

    debug!(columns = TIME_FEATURES.len(), "added calendar features");
    Ok(out)
}

/// Add hours elapsed since the first timestamp (`time_since`) and its square
pub fn add_time_since(series: &TimeSeries) -> Result<TimeSeries> {
    let start = series.index().first().copied();
    let hours: Vec<f64> = series
        .index()
        .iter()
        .map(|t| match start {
            Some(start) => (*t - start).num_seconds() as f64 / 3600.0,
            None => 0.0,
        })
        .collect();

    let mut out = series.clone();
    out.push_column("time_since", hours.iter().map(|h| Some(*h)).collect())?;
    out.push_column("time_since_2", hours.iter().map(|h| Some(h * h)).collect())?;

    debug!(columns = ELAPSED_FEATURES.len(), "added elapsed-time features");
    Ok(out)
}
