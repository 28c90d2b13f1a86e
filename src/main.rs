use anyhow::{Context, Result};
use chrono::Duration;
use solar_forecast_workbench::{config, domain::TimeSeries, telemetry, workbench};
use config::Config;
use telemetry::init_tracing;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let series = load_series(&cfg)?;
    info!(rows = series.len(), columns = series.columns().len(), "loaded plant records");

    let evaluation = workbench::run(&cfg, &series).context("experiment failed")?;
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}

fn load_series(cfg: &Config) -> Result<TimeSeries> {
    let frequency = Duration::minutes(i64::from(cfg.data.frequency_minutes));
    match &cfg.data.path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            TimeSeries::from_json_records(&raw, &cfg.data.date_column, frequency)
                .with_context(|| format!("parsing {}", path.display()))
        }
        None => simulated(cfg),
    }
}

#[cfg(feature = "sim")]
fn simulated(cfg: &Config) -> Result<TimeSeries> {
    use solar_forecast_workbench::simulation::SolarPlantSimulator;

    info!(days = cfg.simulation.days, "no data path configured, simulating plant");
    Ok(SolarPlantSimulator::new(cfg.simulation.clone()).generate()?)
}

#[cfg(not(feature = "sim"))]
fn simulated(_cfg: &Config) -> Result<TimeSeries> {
    anyhow::bail!("no data path configured; set SFW__DATA__PATH or enable the `sim` feature")
}
