//! End-to-end experiment runner
//!
//! Ties the stages together: inverter aggregation, feature construction,
//! preset selection, chronological split, model fit and scoring.

use tracing::{info, warn};

use crate::config::{Config, DataConfig};
use crate::domain::TimeSeries;
use crate::error::{Result, WorkbenchError};
use crate::features::{FeaturePipeline, FeatureSelection};
use crate::ml::{above_floor, build_model, train_and_evaluate, Dataset, Evaluation};

pub const PLANT_TOTAL: &str = "plant_total";
pub const PLANT_AVG: &str = "plant_avg";

/// Add [`PLANT_TOTAL`] and [`PLANT_AVG`] computed across every column whose
/// name starts with `prefix`.
///
/// Missing inverter values are skipped; a row with none present stays missing.
pub fn aggregate_inverters(series: &TimeSeries, prefix: &str) -> Result<TimeSeries> {
    let inverters: Vec<String> = series
        .column_names()
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .map(String::from)
        .collect();
    if inverters.is_empty() {
        return Err(WorkbenchError::missing_column(format!("{}*", prefix)));
    }

    info!(inverters = inverters.len(), "aggregating inverter columns");
    series
        .with_row_sum(PLANT_TOTAL, &inverters)?
        .with_row_mean(PLANT_AVG, &inverters)
}

/// Apply the data options to freshly loaded records
pub fn prepare(series: &TimeSeries, data: &DataConfig) -> Result<TimeSeries> {
    if series.is_empty() {
        return Err(WorkbenchError::EmptyData);
    }
    if data.aggregate_inverters && !series.has_column(PLANT_AVG) {
        aggregate_inverters(series, &data.inverter_prefix)
    } else {
        Ok(series.clone())
    }
}

/// Build features from `series`, fit the configured model and score it on the
/// held-out rows.
///
/// Features are derived from the target column alone. Configured exogenous
/// columns found in `series` are joined afterwards; absent ones are only an
/// error when the selected preset includes the exogenous group.
pub fn run(config: &Config, series: &TimeSeries) -> Result<Evaluation> {
    let series = prepare(series, &config.data)?;
    let target = config.data.target.as_str();

    let pipeline = FeaturePipeline::new(&config.features)?;
    let matrix = pipeline.build(&series.select(&[target])?, target)?;

    let available: Vec<&str> = config
        .selection
        .exogenous
        .iter()
        .map(String::as_str)
        .filter(|c| series.has_column(c) && *c != target)
        .collect();
    if available.len() < config.selection.exogenous.len() {
        warn!(
            requested = config.selection.exogenous.len(),
            available = available.len(),
            "some exogenous columns are not in the data"
        );
    }
    let matrix = matrix.with_exogenous(&series.select(&available)?)?;

    let selection = FeatureSelection::from_code(
        &config.selection.preset,
        config.selection.exogenous.clone(),
    )?;
    let dataset = Dataset::from_table(&matrix.select(&selection)?, target)?;
    let (train, test) = config.split.apply(&dataset)?;

    info!(
        preset = %selection.code(),
        features = dataset.feature_names().len(),
        rows = dataset.len(),
        "prepared dataset"
    );

    let mut model = build_model(&config.model)?;
    let mut evaluation = train_and_evaluate(model.as_mut(), &train, &test, config.metrics.window()?)?;
    evaluation.importance = above_floor(evaluation.importance, config.model.importance_floor);
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn hourly(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn test_aggregate_inverters() {
        let series = TimeSeries::from_columns(
            hourly(3),
            vec![
                ("inverter_1", vec![Some(1.0), Some(2.0), None]),
                ("inverter_2", vec![Some(3.0), None, None]),
                ("ghi", vec![Some(100.0), Some(200.0), Some(300.0)]),
            ],
        )
        .unwrap();

        let out = aggregate_inverters(&series, "inverter_").unwrap();
        assert_eq!(out.column(PLANT_TOTAL).unwrap(), &[Some(4.0), Some(2.0), None]);
        assert_eq!(out.column(PLANT_AVG).unwrap(), &[Some(2.0), Some(2.0), None]);
        assert!(out.has_column("ghi"));
    }

    #[test]
    fn test_aggregate_without_inverters() {
        let series = TimeSeries::from_values(hourly(2), "ghi", &[1.0, 2.0]).unwrap();
        assert!(matches!(
            aggregate_inverters(&series, "inverter_"),
            Err(WorkbenchError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_run_rejects_missing_target() {
        let series = TimeSeries::from_values(hourly(200), "inverter_1", &vec![1.0; 200]).unwrap();
        let mut config = Config::default();
        config.data.target = "energy".to_string();
        assert!(matches!(
            run(&config, &series),
            Err(WorkbenchError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_run_physical_linear_model() {
        let n = 24 * 20;
        let index = hourly(n);
        let ghi: Vec<Option<f64>> = index
            .iter()
            .map(|t| {
                use chrono::Timelike;
                let h = t.hour() as f64;
                Some(if (6.0..=18.0).contains(&h) {
                    900.0 * ((h - 6.0) / 12.0 * std::f64::consts::PI).sin()
                } else {
                    0.0
                })
            })
            .collect();
        let inverter: Vec<Option<f64>> = ghi.iter().map(|g| g.map(|g| 0.2 * g + 1.0)).collect();
        let series = TimeSeries::from_columns(
            index,
            vec![("inverter_1", inverter), ("ghi", ghi)],
        )
        .unwrap();

        let mut config = Config::default();
        config.model.physical = "LI".to_string();
        config.selection.preset = "E".to_string();
        config.selection.exogenous = vec!["ghi".to_string()];

        let evaluation = run(&config, &series).unwrap();
        assert_eq!(evaluation.model, "physical_LI");
        assert_eq!(evaluation.features, vec!["ghi".to_string()]);
        assert!(evaluation.metrics.full.mae < 1e-3);
        assert!(evaluation.train_rows > evaluation.test_rows);
        assert_eq!(evaluation.importance.len(), 1);
        assert_eq!(evaluation.importance[0].feature, "ghi");
    }
}
