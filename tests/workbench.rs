//! End-to-end runs on the synthetic plant
#![cfg(feature = "sim")]

use rstest::rstest;

use solar_forecast_workbench::config::Config;
use solar_forecast_workbench::simulation::{PlantSimulatorConfig, SolarPlantSimulator};
use solar_forecast_workbench::workbench::{self, PLANT_AVG, PLANT_TOTAL};
use solar_forecast_workbench::WorkbenchError;

fn plant(days: u32) -> solar_forecast_workbench::domain::TimeSeries {
    SolarPlantSimulator::new(PlantSimulatorConfig {
        days,
        dropout_probability: 0.0,
        ..Default::default()
    })
    .generate()
    .unwrap()
}

#[test]
fn test_simulated_plant_is_deterministic() {
    assert_eq!(plant(3), plant(3));
}

#[test]
fn test_prepare_adds_plant_aggregates() {
    let series = workbench::prepare(&plant(2), &Config::default().data).unwrap();
    let total = series.column(PLANT_TOTAL).unwrap();
    let avg = series.column(PLANT_AVG).unwrap();
    for (t, a) in total.iter().zip(avg) {
        assert!((t.unwrap() - 4.0 * a.unwrap()).abs() < 1e-9);
    }
}

#[rstest]
#[case("LI", "EF")]
#[case("LW", "EF")]
#[case("LI", "TCE")]
fn test_physical_models_on_simulated_plant(#[case] tag: &str, #[case] preset: &str) {
    let mut config = Config::default();
    config.model.physical = tag.to_string();
    config.selection.preset = preset.to_string();

    let evaluation = workbench::run(&config, &plant(30)).unwrap();

    assert_eq!(evaluation.model, format!("physical_{}", tag));
    assert_eq!(evaluation.predictions.len(), evaluation.test_rows);
    assert!(evaluation.train_rows > evaluation.test_rows);
    let r2 = evaluation.metrics.get("r2").unwrap();
    assert!(r2 > 0.5, "r2 was {}", r2);
    assert!(evaluation.metrics.get("mae_day").is_some());
}

#[test]
fn test_physical_model_without_inputs() {
    let mut config = Config::default();
    config.selection.preset = "TC".to_string();

    assert!(matches!(
        workbench::run(&config, &plant(10)),
        Err(WorkbenchError::InvalidParameter(_))
    ));
}

#[test]
fn test_report_serializes_as_flat_metrics() {
    let mut config = Config::default();
    config.model.physical = "LI".to_string();
    config.selection.preset = "EF".to_string();

    let evaluation = workbench::run(&config, &plant(20)).unwrap();
    let json = serde_json::to_value(&evaluation).unwrap();

    assert_eq!(json["model"], "physical_LI");
    assert!(json["metrics"]["mae"].is_number());
    assert!(json["metrics"].get("mase_day").is_some());
    assert!(json.get("predictions").is_none());

    // LI reads ghi only; the other exogenous columns carry no share
    let importance = json["importance"].as_array().unwrap();
    assert_eq!(importance.len(), 1);
    assert_eq!(importance[0]["feature"], "ghi");
    assert!((importance[0]["percentage"].as_f64().unwrap() - 100.0).abs() < 1e-9);
}
