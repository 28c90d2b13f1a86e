//! Feature engineering for production forecasting
//!
//! Each stage takes a [`TimeSeries`](crate::domain::TimeSeries) by reference and
//! returns an extended copy. Stages are grouped into the closed set of
//! [`FeatureGroup`]s that callers pick from when assembling a training matrix.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::{Result, WorkbenchError};

pub mod calendar;
pub mod cyclic;
pub mod lags;
pub mod pipeline;
pub mod radial;
pub mod windows;

pub use calendar::*;
pub use cyclic::*;
pub use lags::*;
pub use pipeline::*;
pub use radial::*;
pub use windows::*;

/// Irradiance and weather columns joined from external sources by default
pub const DEFAULT_EXOGENOUS: [&str; 3] = ["air_temp", "ghi", "gti"];

/// Named, independently selectable families of feature columns
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureGroup {
    /// hour, day, month, day_of_week, is_weekend, is_night
    Time,
    /// sin/cos pairs of the calendar fields
    Cyclic,
    /// Lagged target values and their cross-lag summaries
    Lag,
    /// Repeating radial basis functions over the hour of day
    Radial,
    /// Hours since the start of the series, linear and squared
    Elapsed,
    /// Shifted trailing-window statistics of the target
    Window,
    /// Caller-supplied columns (irradiance, weather)
    Exogenous,
}

impl FeatureGroup {
    /// One-letter code used in preset names such as `TCLE`
    pub fn code(self) -> char {
        match self {
            Self::Time => 'T',
            Self::Cyclic => 'C',
            Self::Lag => 'L',
            Self::Radial => 'R',
            Self::Elapsed => 'S',
            Self::Window => 'W',
            Self::Exogenous => 'E',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::iter().find(|g| g.code() == code.to_ascii_uppercase())
    }
}

/// Groups requested for a training matrix plus the exogenous columns to carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSelection {
    groups: BTreeSet<FeatureGroup>,
    exogenous: Vec<String>,
}

impl FeatureSelection {
    pub fn new(groups: impl IntoIterator<Item = FeatureGroup>, exogenous: Vec<String>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
            exogenous,
        }
    }

    /// Every group, including exogenous columns
    pub fn all(exogenous: Vec<String>) -> Self {
        Self::new(FeatureGroup::iter(), exogenous)
    }

    /// Parse a preset code.
    ///
    /// `"ALL"` selects every group, `"EF"` only the exogenous columns, and any
    /// other code is read letter by letter (`"TCLE"` = time + cyclic + lag + exogenous).
    pub fn from_code(code: &str, exogenous: Vec<String>) -> Result<Self> {
        let code = code.trim();
        if code.eq_ignore_ascii_case("ALL") {
            return Ok(Self::all(exogenous));
        }
        if code.eq_ignore_ascii_case("EF") {
            return Ok(Self::new([FeatureGroup::Exogenous], exogenous));
        }
        if code.is_empty() {
            return Err(Self::unsupported(code));
        }

        let groups = code
            .chars()
            .map(|c| FeatureGroup::from_code(c).ok_or_else(|| Self::unsupported(code)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(groups, exogenous))
    }

    fn unsupported(code: &str) -> WorkbenchError {
        WorkbenchError::UnsupportedFeatureGroup {
            code: code.to_string(),
            valid: FeatureGroup::iter().map(|g| g.code()).collect(),
        }
    }

    /// Canonical code for this selection (letters in T, C, L, R, S, W, E order)
    pub fn code(&self) -> String {
        if self.groups.len() == FeatureGroup::iter().count() {
            return "ALL".to_string();
        }
        if self.groups.len() == 1 && self.contains(FeatureGroup::Exogenous) {
            return "EF".to_string();
        }
        self.groups.iter().map(|g| g.code()).collect()
    }

    /// The canonical preset catalogue: `EF`, every non-empty proper subset of the
    /// internal groups combined with the exogenous columns, and `ALL`.
    pub fn all_presets() -> Vec<String> {
        let internal: Vec<FeatureGroup> = FeatureGroup::iter()
            .filter(|g| *g != FeatureGroup::Exogenous)
            .collect();
        let full_mask = (1u32 << internal.len()) - 1;

        let mut subsets: Vec<Vec<FeatureGroup>> = (1..full_mask)
            .map(|mask| {
                internal
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, g)| *g)
                    .collect()
            })
            .collect();
        subsets.sort_by_key(|s| s.len());

        let mut presets = vec!["EF".to_string()];
        presets.extend(subsets.into_iter().map(|groups| {
            Self::new(groups.into_iter().chain([FeatureGroup::Exogenous]), Vec::new()).code()
        }));
        presets.push("ALL".to_string());
        presets
    }

    pub fn contains(&self, group: FeatureGroup) -> bool {
        self.groups.contains(&group)
    }

    pub fn groups(&self) -> impl Iterator<Item = FeatureGroup> + '_ {
        self.groups.iter().copied()
    }

    pub fn exogenous(&self) -> &[String] {
        &self.exogenous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exog() -> Vec<String> {
        DEFAULT_EXOGENOUS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_group_codes_round_trip() {
        for group in FeatureGroup::iter() {
            assert_eq!(FeatureGroup::from_code(group.code()), Some(group));
        }
        assert_eq!(FeatureGroup::from_code('x'), None);
    }

    #[test]
    fn test_selection_from_code() {
        let selection = FeatureSelection::from_code("TCLE", exog()).unwrap();
        assert!(selection.contains(FeatureGroup::Time));
        assert!(selection.contains(FeatureGroup::Cyclic));
        assert!(selection.contains(FeatureGroup::Lag));
        assert!(selection.contains(FeatureGroup::Exogenous));
        assert!(!selection.contains(FeatureGroup::Window));

        // Letter order does not matter, the canonical code does
        let reordered = FeatureSelection::from_code("WRE", exog()).unwrap();
        assert_eq!(reordered.code(), "RWE");
    }

    #[test]
    fn test_special_codes() {
        let all = FeatureSelection::from_code("ALL", exog()).unwrap();
        assert_eq!(all.groups().count(), 7);
        assert_eq!(all.code(), "ALL");

        let ef = FeatureSelection::from_code("EF", exog()).unwrap();
        assert_eq!(ef.groups().collect::<Vec<_>>(), vec![FeatureGroup::Exogenous]);
        assert_eq!(ef.code(), "EF");
    }

    #[test]
    fn test_unknown_code_lists_valid_letters() {
        let err = FeatureSelection::from_code("TXE", exog()).unwrap_err();
        match err {
            WorkbenchError::UnsupportedFeatureGroup { code, valid } => {
                assert_eq!(code, "TXE");
                assert_eq!(valid, "TCLRSWE");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_preset_catalogue() {
        let presets = FeatureSelection::all_presets();
        assert_eq!(presets.len(), 64);
        assert_eq!(presets.first().map(String::as_str), Some("EF"));
        assert_eq!(presets.last().map(String::as_str), Some("ALL"));
        assert!(presets.contains(&"TCLE".to_string()));
        assert!(presets.contains(&"CLRSWE".to_string()));

        for code in &presets {
            assert!(FeatureSelection::from_code(code, Vec::new()).is_ok(), "{code}");
        }
    }
}
