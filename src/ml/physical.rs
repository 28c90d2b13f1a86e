//! Parametric irradiance-to-energy models
//!
//! Three closed-form relations between plane irradiance `E` (W/m²), air
//! temperature `T` (°C) and energy, with coefficients fitted by least squares:
//!
//! - `LI`: `a + b·E`
//! - `LW`: `a + b·E + c·T`
//! - `NL`: `a·E·(1 - b·(T + E/800·(c - 20) - 25) - d·ln(E + 1e-10))`, a PV
//!   efficiency model where `c` plays the role of the nominal operating cell
//!   temperature and `d` the low-irradiance loss.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::info;

use itertools::Itertools;

use super::solver::{curve_fit, CurveFitOptions};
use super::training::Dataset;
use super::Regressor;
use crate::error::{Result, WorkbenchError};

/// Preferred irradiance column; `gti` is used only when `ghi` is absent
pub const IRRADIANCE_COLUMNS: [&str; 2] = ["ghi", "gti"];
pub const TEMPERATURE_COLUMN: &str = "air_temp";

/// Physical model family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PhysicalKind {
    /// Linear in irradiance
    Li,
    /// Linear in irradiance and temperature
    Lw,
    /// Nonlinear cell-temperature efficiency model
    Nl,
}

impl PhysicalKind {
    pub fn parse(tag: &str) -> Result<Self> {
        tag.trim()
            .to_uppercase()
            .parse()
            .map_err(|_| WorkbenchError::UnsupportedModel {
                name: tag.to_string(),
                valid: Self::iter().join(", "),
            })
    }

    pub fn needs_temperature(self) -> bool {
        !matches!(self, Self::Li)
    }

    /// Starting point of the fit
    pub fn initial_guess(self) -> Vec<f64> {
        match self {
            Self::Li => vec![1.0, 1.0],
            Self::Lw => vec![1.0, 1.0, 1.0],
            Self::Nl => vec![1.0, 0.0, -1e4, -0.1],
        }
    }

    /// Model output for one sample
    pub fn evaluate(self, params: &[f64], irradiance: f64, temperature: f64) -> f64 {
        let e = irradiance;
        let t = temperature;
        match self {
            Self::Li => params[0] + params[1] * e,
            Self::Lw => params[0] + params[1] * e + params[2] * t,
            Self::Nl => {
                let (a, b, c, d) = (params[0], params[1], params[2], params[3]);
                let cell_temperature = t + e / 800.0 * (c - 20.0);
                a * e * (1.0 - b * (cell_temperature - 25.0) - d * (e + 1e-10).ln())
            }
        }
    }
}

/// Input columns resolved from a dataset's feature names
#[derive(Debug, Clone, PartialEq, Eq)]
struct Inputs {
    irradiance: String,
    temperature: Option<String>,
}

/// Physical irradiance model behind the [`Regressor`] seam
#[derive(Debug, Clone)]
pub struct PhysicalModel {
    kind: PhysicalKind,
    options: CurveFitOptions,
    params: Option<Vec<f64>>,
}

impl PhysicalModel {
    pub fn new(kind: PhysicalKind, options: CurveFitOptions) -> Self {
        Self {
            kind,
            options,
            params: None,
        }
    }

    pub fn kind(&self) -> PhysicalKind {
        self.kind
    }

    /// Fitted coefficients, `None` before [`Regressor::fit`]
    pub fn params(&self) -> Option<&[f64]> {
        self.params.as_deref()
    }

    fn resolve_inputs(&self, data: &Dataset) -> Result<Inputs> {
        let irradiance = IRRADIANCE_COLUMNS
            .iter()
            .find(|c| data.has_feature(c))
            .map(|c| c.to_string());
        let temperature = data
            .has_feature(TEMPERATURE_COLUMN)
            .then(|| TEMPERATURE_COLUMN.to_string());

        let mut missing = Vec::new();
        if irradiance.is_none() {
            missing.push(format!("irradiance ({})", IRRADIANCE_COLUMNS.join(" or ")));
        }
        if self.kind.needs_temperature() && temperature.is_none() {
            missing.push(format!("temperature ({})", TEMPERATURE_COLUMN));
        }
        match irradiance {
            Some(irradiance) if missing.is_empty() => Ok(Inputs {
                irradiance,
                temperature: temperature.filter(|_| self.kind.needs_temperature()),
            }),
            _ => Err(WorkbenchError::InvalidParameter(format!(
                "physical model {} is missing inputs: {}",
                self.kind,
                missing.join(", ")
            ))),
        }
    }

    fn input_columns(&self, data: &Dataset) -> Result<(Vec<f64>, Vec<f64>)> {
        let inputs = self.resolve_inputs(data)?;
        let irradiance = data.feature_column(&inputs.irradiance)?;
        let temperature = match &inputs.temperature {
            Some(name) => data.feature_column(name)?,
            None => vec![0.0; data.len()],
        };
        Ok((irradiance, temperature))
    }
}

impl Regressor for PhysicalModel {
    fn fit(&mut self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(WorkbenchError::EmptyData);
        }
        let (irradiance, temperature) = self.input_columns(data)?;
        let kind = self.kind;

        let fit = curve_fit(
            |p| {
                irradiance
                    .iter()
                    .zip(&temperature)
                    .map(|(e, t)| kind.evaluate(p, *e, *t))
                    .collect()
            },
            data.targets(),
            &kind.initial_guess(),
            &self.options,
        )?;

        info!(
            model = %kind,
            params = ?fit.params,
            evaluations = fit.evaluations,
            rows = data.len(),
            "fitted physical model"
        );
        self.params = Some(fit.params);
        Ok(())
    }

    fn predict(&self, data: &Dataset) -> Result<Vec<f64>> {
        let params = self.params.as_ref().ok_or(WorkbenchError::FitRequired)?;
        let (irradiance, temperature) = self.input_columns(data)?;
        Ok(irradiance
            .iter()
            .zip(&temperature)
            .map(|(e, t)| self.kind.evaluate(params, *e, *t))
            .collect())
    }

    fn name(&self) -> String {
        format!("physical_{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn hourly(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    fn dataset(names: &[&str], rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Dataset {
        Dataset::new(
            hourly(targets.len()),
            names.iter().map(|s| s.to_string()).collect(),
            rows,
            targets,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(PhysicalKind::parse("NL").unwrap(), PhysicalKind::Nl);
        assert_eq!(PhysicalKind::parse("lw").unwrap(), PhysicalKind::Lw);
        match PhysicalKind::parse("XX").unwrap_err() {
            WorkbenchError::UnsupportedModel { name, valid } => {
                assert_eq!(name, "XX");
                assert_eq!(valid, "LI, LW, NL");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nl_at_initial_guess() {
        // b = 0 removes the temperature term: a·E·(1 + 0.1·ln E)
        let value = PhysicalKind::Nl.evaluate(&PhysicalKind::Nl.initial_guess(), 100.0, 25.0);
        assert!((value - 100.0 * (1.0 + 0.1 * 100f64.ln())).abs() < 1e-6);
    }

    #[test]
    fn test_fit_linear_in_irradiance() {
        let ghi: Vec<f64> = (0..24).map(|i| i as f64 * 40.0).collect();
        let targets: Vec<f64> = ghi.iter().map(|e| 0.5 + 0.2 * e).collect();
        let data = dataset(&["ghi"], ghi.iter().map(|e| vec![*e]).collect(), targets.clone());

        let mut model = PhysicalModel::new(PhysicalKind::Li, CurveFitOptions::default());
        assert_eq!(model.predict(&data).unwrap_err(), WorkbenchError::FitRequired);

        model.fit(&data).unwrap();
        let params = model.params().unwrap();
        assert!((params[0] - 0.5).abs() < 1e-4);
        assert!((params[1] - 0.2).abs() < 1e-6);

        let predicted = model.predict(&data).unwrap();
        assert!((predicted[10] - targets[10]).abs() < 1e-4);
        assert_eq!(model.name(), "physical_LI");
    }

    #[test]
    fn test_fit_with_temperature() {
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![20.0 + (i % 7) as f64, i as f64 * 30.0])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 1.0 + 0.1 * r[1] - 0.3 * r[0]).collect();
        let data = dataset(&["air_temp", "gti"], rows, targets);

        let mut model = PhysicalModel::new(PhysicalKind::Lw, CurveFitOptions::default());
        model.fit(&data).unwrap();
        let params = model.params().unwrap();
        assert!((params[1] - 0.1).abs() < 1e-5);
        assert!((params[2] + 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_ghi_preferred_over_gti() {
        let rows = vec![vec![100.0, 1.0], vec![200.0, 2.0], vec![300.0, 3.0]];
        let data = dataset(&["ghi", "gti"], rows, vec![1.0, 2.0, 3.0]);

        let model = PhysicalModel::new(PhysicalKind::Li, CurveFitOptions::default());
        let inputs = model.resolve_inputs(&data).unwrap();
        assert_eq!(inputs.irradiance, "ghi");
        assert_eq!(inputs.temperature, None);
    }

    #[test]
    fn test_missing_inputs_are_listed_together() {
        let data = dataset(&["hour"], vec![vec![1.0], vec![2.0], vec![3.0]], vec![1.0, 2.0, 3.0]);
        let mut model = PhysicalModel::new(PhysicalKind::Nl, CurveFitOptions::default());

        match model.fit(&data).unwrap_err() {
            WorkbenchError::InvalidParameter(message) => {
                assert!(message.contains("ghi or gti"));
                assert!(message.contains("air_temp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
