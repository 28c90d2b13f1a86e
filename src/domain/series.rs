//! Timestamp-indexed tables of measurements
//!
//! A [`TimeSeries`] is the unit every feature stage reads and returns. Gaps in the
//! sampling grid are rows whose values are `None`, never removed rows, so lag and
//! window offsets count samples and time alike.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use itertools::Itertools;
use serde::Serialize;

use crate::error::{Result, WorkbenchError};

/// A named column of optional values (`None` = missing sample)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Ordered table of columns sharing a strictly increasing timestamp index
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimeSeries {
    index: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl TimeSeries {
    /// Create an empty-column series over `index`
    pub fn new(index: Vec<NaiveDateTime>) -> Result<Self> {
        if let Some((prev, next)) = index.iter().tuple_windows().find(|(a, b)| b <= a) {
            return Err(WorkbenchError::InvalidIndex(format!(
                "timestamps must be strictly increasing ({} followed by {})",
                prev, next
            )));
        }
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    /// Create a series from named columns
    pub fn from_columns<S: Into<String>>(
        index: Vec<NaiveDateTime>,
        columns: Vec<(S, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let mut series = Self::new(index)?;
        for (name, values) in columns {
            series.push_column(name, values)?;
        }
        Ok(series)
    }

    /// Convenience constructor for a single fully-observed column
    pub fn from_values(
        index: Vec<NaiveDateTime>,
        name: impl Into<String>,
        values: &[f64],
    ) -> Result<Self> {
        Self::from_columns(index, vec![(name, values.iter().copied().map(Some).collect())])
    }

    /// Build a fixed-frequency series from unordered raw rows.
    ///
    /// Rows are sorted, duplicate timestamps keep the last row seen, rows off the
    /// grid are discarded and grid points without a row become missing values.
    pub fn regularize(
        names: Vec<String>,
        rows: Vec<(NaiveDateTime, Vec<Option<f64>>)>,
        frequency: Duration,
    ) -> Result<Self> {
        if frequency <= Duration::zero() {
            return Err(WorkbenchError::InvalidParameter(format!(
                "frequency must be positive, got {}",
                frequency
            )));
        }

        let mut by_time: BTreeMap<NaiveDateTime, Vec<Option<f64>>> = BTreeMap::new();
        for (timestamp, values) in rows {
            if values.len() != names.len() {
                return Err(WorkbenchError::InvalidIndex(format!(
                    "row at {} has {} values for {} columns",
                    timestamp,
                    values.len(),
                    names.len()
                )));
            }
            by_time.insert(timestamp, values);
        }

        let (Some(&first), Some(&last)) = (by_time.keys().next(), by_time.keys().next_back())
        else {
            return Self::from_columns(Vec::new(), names.into_iter().map(|n| (n, Vec::new())).collect());
        };

        let mut index = Vec::new();
        let mut t = first;
        while t <= last {
            index.push(t);
            t += frequency;
        }

        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(index.len()); names.len()];
        for ts in &index {
            match by_time.get(ts) {
                Some(values) => {
                    for (col, value) in columns.iter_mut().zip(values) {
                        col.push(*value);
                    }
                }
                None => columns.iter_mut().for_each(|col| col.push(None)),
            }
        }

        Self::from_columns(index, names.into_iter().zip(columns).collect())
    }

    /// Parse an array of JSON objects keyed by `date_key` into a regular series.
    ///
    /// Column names are normalized (trimmed, lowercased, spaces to underscores).
    /// Non-numeric values load as missing.
    pub fn from_json_records(json: &str, date_key: &str, frequency: Duration) -> Result<Self> {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(json)
            .map_err(|e| WorkbenchError::InvalidParameter(format!("invalid JSON records: {}", e)))?;

        let mut names: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys().filter(|k| k.as_str() != date_key) {
                let name = normalize_column_name(key);
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            let raw = record
                .get(date_key)
                .and_then(|v| v.as_str())
                .ok_or_else(|| WorkbenchError::missing_column(date_key))?;
            let timestamp = parse_timestamp(raw)?;
            let mut values = vec![None; names.len()];
            for (key, value) in record.iter().filter(|(k, _)| k.as_str() != date_key) {
                let name = normalize_column_name(key);
                if let Some(pos) = names.iter().position(|n| *n == name) {
                    values[pos] = value.as_f64();
                }
            }
            rows.push((timestamp, values));
        }

        Self::regularize(names, rows, frequency)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of a column, or `MissingColumn`
    pub fn column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| WorkbenchError::missing_column(name))
    }

    /// Return a copy of this series with `name` added.
    ///
    /// A column of that name already present is an `InvalidParameter` error.
    pub fn with_column(&self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        let mut out = self.clone();
        out.push_column(name, values)?;
        Ok(out)
    }

    /// Append a column in place, refusing to overwrite one of the same name
    pub(crate) fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<()> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(WorkbenchError::InvalidIndex(format!(
                "column '{}' has {} values for an index of {}",
                name,
                values.len(),
                self.index.len()
            )));
        }
        if self.has_column(&name) {
            return Err(WorkbenchError::InvalidParameter(format!(
                "column '{}' already exists",
                name
            )));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Copy without the given columns (absent names are ignored)
    pub fn drop_columns(&self, names: &[&str]) -> Self {
        Self {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Copy holding only `names`, in that order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            columns.push(Column {
                name: name.to_string(),
                values: self.column(name)?.to_vec(),
            });
        }
        Ok(Self {
            index: self.index.clone(),
            columns,
        })
    }

    /// Rows with `start <= t <= end`; open bounds are unbounded
    pub fn slice(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        let lo = start.map_or(0, |s| self.index.partition_point(|t| *t < s));
        let hi = end.map_or(self.index.len(), |e| self.index.partition_point(|t| *t <= e));
        let hi = hi.max(lo);
        Self {
            index: self.index[lo..hi].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[lo..hi].to_vec(),
                })
                .collect(),
        }
    }

    /// Left-join `other` on the timestamp index.
    ///
    /// Rows of `self` without a matching timestamp in `other` get missing values.
    pub fn join(&self, other: &TimeSeries) -> Result<Self> {
        if let Some(dup) = other.columns.iter().find(|c| self.has_column(&c.name)) {
            return Err(WorkbenchError::InvalidParameter(format!(
                "column '{}' exists on both sides of the join",
                dup.name
            )));
        }

        let positions: Vec<Option<usize>> = self
            .index
            .iter()
            .map(|t| other.index.binary_search(t).ok())
            .collect();

        let mut out = self.clone();
        for col in &other.columns {
            let values = positions
                .iter()
                .map(|pos| pos.and_then(|p| col.values[p]))
                .collect();
            out.push_column(col.name.clone(), values)?;
        }
        Ok(out)
    }

    /// Add `name` as the row-wise mean of `sources`, skipping missing values
    pub fn with_row_mean<S: AsRef<str>>(&self, name: &str, sources: &[S]) -> Result<Self> {
        self.with_row_aggregate(name, sources, |present| {
            present.iter().sum::<f64>() / present.len() as f64
        })
    }

    /// Add `name` as the row-wise sum of `sources`, skipping missing values
    pub fn with_row_sum<S: AsRef<str>>(&self, name: &str, sources: &[S]) -> Result<Self> {
        self.with_row_aggregate(name, sources, |present| present.iter().sum::<f64>())
    }

    fn with_row_aggregate<S: AsRef<str>>(
        &self,
        name: &str,
        sources: &[S],
        aggregate: impl Fn(&[f64]) -> f64,
    ) -> Result<Self> {
        let columns = sources
            .iter()
            .map(|s| self.column(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let values = (0..self.len())
            .map(|row| {
                let present: Vec<f64> = columns.iter().filter_map(|c| c[row]).collect();
                (!present.is_empty()).then(|| aggregate(&present))
            })
            .collect();

        self.with_column(name, values)
    }

    /// Fully observed rows of one column as timestamped values
    pub fn observations(&self, name: &str) -> Result<Observations> {
        let (index, values) = self
            .index
            .iter()
            .zip(self.column(name)?)
            .filter_map(|(t, v)| v.map(|v| (*t, v)))
            .unzip();
        Observations::new(index, values)
    }
}

/// Timestamped `f64` sequence, the input shape of the metric suite
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Observations {
    index: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl Observations {
    pub fn new(index: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(WorkbenchError::InvalidIndex(format!(
                "{} timestamps for {} values",
                index.len(),
                values.len()
            )));
        }
        Ok(Self { index, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Keep rows whose time of day lies in `[start, end]`.
    ///
    /// When `start > end` the window wraps midnight.
    pub fn between_time(&self, start: NaiveTime, end: NaiveTime) -> Self {
        let (index, values) = self
            .index
            .iter()
            .zip(&self.values)
            .filter(|(t, _)| time_in_window(t.time(), start, end))
            .map(|(t, v)| (*t, *v))
            .unzip();
        Self { index, values }
    }
}

/// Inclusive time-of-day window test, wrapping midnight when `start > end`
pub fn time_in_window(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= time && time <= end
    } else {
        time >= start || time <= end
    }
}

/// `" Air Temp "` -> `"air_temp"`
pub fn normalize_column_name(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| WorkbenchError::InvalidIndex(format!("unparseable timestamp '{}'", raw)))
}
