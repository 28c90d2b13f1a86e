//! Forecast accuracy scoring

pub mod metrics;

pub use metrics::*;
