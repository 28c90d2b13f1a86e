//! Nonlinear least-squares curve fitting
//!
//! Levenberg-Marquardt with a forward-difference Jacobian. Used by the physical
//! model, whose parameters enter nonlinearly.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkbenchError};

/// Stopping criteria for [`curve_fit`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveFitOptions {
    /// Budget of model evaluations, Jacobian columns included
    pub max_evaluations: usize,
    /// Relative reduction of the cost below which the fit has converged
    pub ftol: f64,
    /// Relative step size below which the fit has converged
    pub xtol: f64,
}

impl Default for CurveFitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 5000,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
        }
    }
}

/// Result of a successful fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveFit {
    pub params: Vec<f64>,
    pub evaluations: usize,
    /// Half the residual sum of squares at `params`
    pub cost: f64,
}

struct Objective<'a, F> {
    model: F,
    observed: &'a [f64],
    evaluations: usize,
    budget: usize,
}

impl<F: Fn(&[f64]) -> Vec<f64>> Objective<'_, F> {
    fn residuals(&mut self, params: &DVector<f64>) -> Result<DVector<f64>> {
        if self.evaluations >= self.budget {
            return Err(WorkbenchError::Solver(format!(
                "no convergence within {} function evaluations",
                self.budget
            )));
        }
        self.evaluations += 1;

        let predicted = (self.model)(params.as_slice());
        if predicted.len() != self.observed.len() {
            return Err(WorkbenchError::Solver(format!(
                "model returned {} values for {} observations",
                predicted.len(),
                self.observed.len()
            )));
        }
        Ok(DVector::from_iterator(
            predicted.len(),
            predicted.iter().zip(self.observed).map(|(f, y)| f - y),
        ))
    }

    fn jacobian(&mut self, params: &DVector<f64>, residuals: &DVector<f64>) -> Result<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(residuals.len(), params.len());
        for j in 0..params.len() {
            let step = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
            let mut shifted = params.clone();
            shifted[j] += step;
            let column = (self.residuals(&shifted)? - residuals) / step;
            jacobian.set_column(j, &column);
        }
        Ok(jacobian)
    }
}

fn cost(residuals: &DVector<f64>) -> f64 {
    let value = 0.5 * residuals.norm_squared();
    if value.is_finite() {
        value
    } else {
        f64::INFINITY
    }
}

/// Fit `model(params)` to `observed` in the least-squares sense, starting from `initial`.
///
/// `model` maps a parameter vector to one prediction per observation.
pub fn curve_fit<F>(
    model: F,
    observed: &[f64],
    initial: &[f64],
    options: &CurveFitOptions,
) -> Result<CurveFit>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    if observed.is_empty() {
        return Err(WorkbenchError::EmptyData);
    }
    if initial.is_empty() || initial.len() > observed.len() {
        return Err(WorkbenchError::Solver(format!(
            "{} parameters cannot be fitted to {} observations",
            initial.len(),
            observed.len()
        )));
    }

    let mut objective = Objective {
        model,
        observed,
        evaluations: 0,
        budget: options.max_evaluations,
    };

    let mut params = DVector::from_column_slice(initial);
    let mut residuals = objective.residuals(&params)?;
    let mut current = cost(&residuals);
    if !current.is_finite() {
        return Err(WorkbenchError::Solver(
            "initial guess produces non-finite residuals".to_string(),
        ));
    }

    // Marquardt scaling: damping is relative to each diagonal entry
    let mut lambda = 1e-3;

    'outer: loop {
        let jacobian = objective.jacobian(&params, &residuals)?;
        let gradient = jacobian.transpose() * &residuals;
        if gradient.amax() <= f64::EPSILON * current.max(f64::MIN_POSITIVE) {
            break;
        }

        let normal = jacobian.transpose() * &jacobian;
        let mut damping = lambda;

        loop {
            let mut damped = normal.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += damping * normal[(i, i)].max(1e-12);
            }

            let Some(step) = damped.lu().solve(&(-&gradient)) else {
                damping *= 10.0;
                if damping > 1e16 {
                    break 'outer;
                }
                continue;
            };

            let candidate = &params + &step;
            let candidate_residuals = objective.residuals(&candidate)?;
            let candidate_cost = cost(&candidate_residuals);

            if candidate_cost < current {
                let reduction = current - candidate_cost;
                let converged = reduction <= options.ftol * current
                    || step.norm() <= options.xtol * (params.norm() + options.xtol);

                params = candidate;
                residuals = candidate_residuals;
                current = candidate_cost;
                lambda = (damping / 10.0).max(1e-20);

                if converged {
                    break 'outer;
                }
                break;
            }

            damping *= 10.0;
            if damping > 1e16 {
                break 'outer;
            }
        }
    }

    if params.iter().any(|p| !p.is_finite()) {
        return Err(WorkbenchError::Solver("fit produced non-finite parameters".to_string()));
    }

    debug!(
        evaluations = objective.evaluations,
        cost = current,
        "curve fit finished"
    );

    Ok(CurveFit {
        params: params.iter().copied().collect(),
        evaluations: objective.evaluations,
        cost: current,
    })
}
