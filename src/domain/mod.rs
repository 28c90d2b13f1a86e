//! Core time-series types

pub mod series;

pub use series::*;
