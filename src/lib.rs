//! Solar production forecasting workbench
//!
//! Leakage-free feature engineering over hourly plant records, physical and
//! tree-ensemble regressors, and an accuracy metric suite that scores both the
//! full horizon and daytime hours.

pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod forecast;
pub mod ml;
#[cfg(feature = "sim")]
pub mod simulation;
pub mod telemetry;
pub mod workbench;

pub use error::{Result, WorkbenchError};
