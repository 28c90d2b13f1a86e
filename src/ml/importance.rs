//! Feature importance by permutation
//!
//! A feature's importance is the rise in test MAE when its column is rotated
//! about half-way through the rows, breaking its alignment with the target while
//! keeping its distribution. The shift is odd so hourly daily cycles never line
//! back up. Shares are normalized to percentages.

use serde::Serialize;
use tracing::debug;

use super::training::Dataset;
use super::Regressor;
use crate::error::Result;
use crate::forecast::mae;

/// Default percentage share a feature must exceed to be reported
pub const DEFAULT_IMPORTANCE_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Increase in MAE with the feature decorrelated (never negative)
    pub importance: f64,
    /// Share of the summed importance, 0..=100
    pub percentage: f64,
}

/// Importance of every feature of `data` for a fitted `model`, most important first.
///
/// Percentages are all zero when no feature moves the error.
pub fn permutation_importance(model: &dyn Regressor, data: &Dataset) -> Result<Vec<FeatureImportance>> {
    let baseline = mae(data.targets(), &model.predict(data)?)?;
    let shift = (data.len() / 2) | 1;

    let mut report = Vec::with_capacity(data.feature_names().len());
    for (position, feature) in data.feature_names().iter().enumerate() {
        let rotated = data.with_feature_rotated(position, shift)?;
        let importance = (mae(data.targets(), &model.predict(&rotated)?)? - baseline).max(0.0);
        report.push(FeatureImportance {
            feature: feature.clone(),
            importance,
            percentage: 0.0,
        });
    }

    let total: f64 = report.iter().map(|f| f.importance).sum();
    if total > 0.0 {
        for entry in &mut report {
            entry.percentage = entry.importance / total * 100.0;
        }
    }
    report.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    debug!(features = report.len(), baseline_mae = baseline, "computed feature importance");
    Ok(report)
}

/// Entries whose share is strictly above `floor` percent
pub fn above_floor(report: Vec<FeatureImportance>, floor: f64) -> Vec<FeatureImportance> {
    report.into_iter().filter(|f| f.percentage > floor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{CurveFitOptions, PhysicalKind, PhysicalModel};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn hourly(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    fn irradiance_dataset(n: usize) -> Dataset {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64 * 40.0, 1.0 + (i % 3) as f64]).collect();
        let targets = rows.iter().map(|r| 2.0 + 0.25 * r[0]).collect();
        Dataset::new(hourly(n), vec!["ghi".into(), "gti".into()], rows, targets).unwrap()
    }

    #[test]
    fn test_unused_feature_gets_no_share() {
        let data = irradiance_dataset(24);
        let mut model = PhysicalModel::new(PhysicalKind::Li, CurveFitOptions::default());
        model.fit(&data).unwrap();

        let report = permutation_importance(&model, &data).unwrap();
        assert_eq!(report[0].feature, "ghi");
        assert!((report[0].percentage - 100.0).abs() < 1e-9);
        assert!(report[0].importance > 0.0);
        assert_eq!(report[1].feature, "gti");
        assert_eq!(report[1].percentage, 0.0);

        let kept = above_floor(report, DEFAULT_IMPORTANCE_FLOOR);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_single_row_has_zero_importance() {
        let data = irradiance_dataset(1);
        let mut model = PhysicalModel::new(PhysicalKind::Li, CurveFitOptions::default());
        model.fit(&irradiance_dataset(24)).unwrap();

        let report = permutation_importance(&model, &data).unwrap();
        assert!(report.iter().all(|f| f.importance == 0.0 && f.percentage == 0.0));
        assert!(above_floor(report, 0.0).is_empty());
    }
}
