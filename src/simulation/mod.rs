//! # Plant Simulation Module
//!
//! Deterministic synthetic data for running the workbench without metered
//! records, and for end-to-end tests.
//!
//! ## Usage
//!
//! ```rust
//! use solar_forecast_workbench::simulation::{PlantSimulatorConfig, SolarPlantSimulator};
//!
//! let config = PlantSimulatorConfig {
//!     days: 7,
//!     inverters: 2,
//!     ..Default::default()
//! };
//!
//! let series = SolarPlantSimulator::new(config).generate().unwrap();
//! assert_eq!(series.len(), 7 * 24);
//! assert!(series.has_column("inverter_2"));
//! ```

pub mod solar;

pub use solar::{
    inverter_columns, ClearSkyModel, CloudCover, PlantSimulatorConfig, SolarPlantSimulator,
};
