use anyhow::{Context, Result};
use chrono::NaiveTime;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::features::{FeatureConfig, DEFAULT_EXOGENOUS};
use crate::forecast::DaytimeWindow;
use crate::ml::{ModelConfig, SplitConfig};
#[cfg(feature = "sim")]
use crate::simulation::PlantSimulatorConfig;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub data: DataConfig,
    #[cfg(feature = "sim")]
    #[validate(nested)]
    pub simulation: PlantSimulatorConfig,
    #[validate(nested)]
    pub features: FeatureConfig,
    #[validate(nested)]
    pub selection: SelectionConfig,
    #[validate(nested)]
    pub split: SplitConfig,
    pub metrics: MetricsConfig,
    #[validate(nested)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DataConfig {
    /// JSON array of records; the synthetic plant is used when unset
    pub path: Option<PathBuf>,
    /// Timestamp field of each record
    #[validate(length(min = 1))]
    pub date_column: String,
    #[validate(length(min = 1))]
    pub target: String,
    #[validate(range(min = 1, max = 1440))]
    pub frequency_minutes: u32,
    /// Add `plant_avg` and `plant_total` across the inverter columns
    pub aggregate_inverters: bool,
    /// Name prefix identifying inverter energy columns
    pub inverter_prefix: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            date_column: "date_time".to_string(),
            target: "plant_avg".to_string(),
            frequency_minutes: 60,
            aggregate_inverters: true,
            inverter_prefix: "inverter_".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SelectionConfig {
    /// Feature preset code, e.g. `TCLE`, `EF` or `ALL`
    #[validate(length(min = 1))]
    pub preset: String,
    pub exogenous: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            preset: "ALL".to_string(),
            exogenous: DEFAULT_EXOGENOUS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub daytime_start: NaiveTime,
    pub daytime_end: NaiveTime,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let window = DaytimeWindow::default();
        Self {
            daytime_start: window.start,
            daytime_end: window.end,
        }
    }
}

impl MetricsConfig {
    pub fn window(&self) -> crate::error::Result<DaytimeWindow> {
        DaytimeWindow::new(self.daytime_start, self.daytime_end)
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `SFW__`-prefixed environment
    /// variables (`SFW__MODEL__KIND=random_forest`). A `.env` file is read first.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SFW__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.validate().context("configuration failed validation")?;
        cfg.metrics.window()?;
        Ok(cfg)
    }
}
