//! Error types shared by the feature pipeline, the metric suite and the models.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorkbenchError>;

/// Everything that can go wrong while building features, fitting models or scoring forecasts.
///
/// Degenerate numeric cases (zero targets in MAPE, a flat naive baseline in MASE)
/// are not errors; they resolve to a defined value or `None` on the report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkbenchError {
    #[error("Column '{column}' not found")]
    MissingColumn { column: String },

    #[error("Invalid lag specification: {0}")]
    InvalidLag(String),

    #[error("Invalid window specification: {0}")]
    InvalidWindow(String),

    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,

    #[error("Invalid time index: {0}")]
    InvalidIndex(String),

    #[error("Unsupported aggregation '{name}', expected one of: {valid}")]
    UnsupportedAggregation { name: String, valid: String },

    #[error("Unsupported model '{name}', expected one of: {valid}")]
    UnsupportedModel { name: String, valid: String },

    #[error("Unsupported feature group code '{code}', expected letters from: {valid}")]
    UnsupportedFeatureGroup { code: String, valid: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model must be fitted before prediction")]
    FitRequired,

    #[error("Curve fit failed: {0}")]
    Solver(String),

    #[error("Model training failed: {0}")]
    Training(String),
}

impl WorkbenchError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }
}
