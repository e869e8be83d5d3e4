//! Deterministic propagation of the rate equations.

use super::deriv::{OdeState, RateEquations};
use super::process::Kinetics;
use super::reporters::Reporter;
use super::state::State;
use super::{molecule_count, System, EPSILON};
use crate::errors::{RxnError, RxnResult};
use crate::model::FlatModel;
use crate::units::Quantity;
use ndarray::Array1;
use ode_solvers::{Dopri5, Rk4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OdeMethod {
    /// Adaptive Dormand-Prince 5(4)
    #[default]
    Dopri5,
    /// Classic fourth order Runge-Kutta with a fixed step
    Rk4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdeSettings {
    pub method: OdeMethod,
    pub rtol: f64,
    pub atol: f64,
    /// Step of the fixed-step method, in s
    pub step: f64,
}

impl Default for OdeSettings {
    fn default() -> Self {
        Self {
            method: OdeMethod::Dopri5,
            rtol: 1e-6,
            atol: 1e-8,
            step: 0.01,
        }
    }
}

/// Solver output: times and the state at each of them.
pub type Trajectory = (Vec<f64>, Vec<Array1<f64>>);

fn integration_error<E: std::fmt::Debug>(e: E) -> RxnError {
    RxnError::Integration(format!("{e:?}"))
}

/// The largest step not above `step` that divides `span` into whole steps.
/// Slightly stretched so rounding never adds a step past the end.
fn fixed_step(span: f64, step: f64) -> f64 {
    let n = (span / step - EPSILON).ceil().max(1.0);
    span / n * (1.0 + 1e-12)
}

pub struct OdeSystem {
    model: FlatModel,
    state: State,
    kinetics: Arc<Kinetics>,
    reporters: Vec<Reporter>,
    settings: OdeSettings,
}

impl OdeSystem {
    pub fn new(model: FlatModel, settings: OdeSettings) -> RxnResult<Self> {
        if settings.step <= 0.0 {
            return Err(RxnError::Error(format!(
                "ODE step must be positive, got {}",
                settings.step
            )));
        }
        let state = State::from_model(&model);
        let kinetics = Arc::new(Kinetics::new(&model, &state)?);
        Ok(Self {
            model,
            state,
            kinetics,
            reporters: Vec::new(),
            settings,
        })
    }

    pub fn model(&self) -> &FlatModel {
        &self.model
    }

    pub fn kinetics(&self) -> &Kinetics {
        &self.kinetics
    }

    pub fn settings(&self) -> &OdeSettings {
        &self.settings
    }

    /// Sets the entries `idxs` to `q`: a molecule count, an amount in `mol`
    /// or a concentration (which needs the compartment volume).
    pub fn set_q(&mut self, idxs: &[usize], q: &Quantity) -> RxnResult<()> {
        for &idx in idxs {
            let count = molecule_count(&self.model, &self.state, idx, q)?;
            self.state.q_val[idx] = count;
        }
        Ok(())
    }

    fn solve(&self, t0: f64, t1: f64) -> RxnResult<Trajectory> {
        let y0 = OdeState::from_iterator(self.state.len(), self.state.q_val.iter().copied());
        let equations = RateEquations::new(Arc::clone(&self.kinetics));

        let (times, states) = match self.settings.method {
            OdeMethod::Dopri5 => {
                // dx = 0 keeps every accepted step
                let mut solver = Dopri5::new(
                    equations,
                    t0,
                    t1,
                    0.0,
                    y0,
                    self.settings.rtol,
                    self.settings.atol,
                );
                solver.integrate().map_err(integration_error)?;
                let (times, states) = solver.results().get();
                (times.clone(), states.clone())
            }
            OdeMethod::Rk4 => {
                let step = fixed_step(t1 - t0, self.settings.step);
                let mut solver = Rk4::new(equations, t0, y0, t1, step);
                solver.integrate().map_err(integration_error)?;
                let (times, states) = solver.results().get();
                (times.clone(), states.clone())
            }
        };
        let states = states
            .into_iter()
            .map(|y| Array1::from_iter(y.iter().copied()))
            .collect();
        Ok((times, states))
    }

    /// Integrates from `t0` to `t1`, returning every solver step. The state
    /// is left at the final step.
    pub fn trajectory(&mut self, t0: f64, t1: f64) -> RxnResult<Trajectory> {
        let trajectory = self.solve(t0, t1)?;
        if let Some(last) = trajectory.1.last() {
            self.state.q_val = last.clone();
        }
        Ok(trajectory)
    }
}

impl System for OdeSystem {
    fn state(&self) -> &State {
        &self.state
    }

    fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    fn reporters(&self) -> &[Reporter] {
        &self.reporters
    }

    fn reporters_mut(&mut self) -> &mut Vec<Reporter> {
        &mut self.reporters
    }

    fn propagate(&mut self, t0: f64, t1: f64) -> RxnResult<f64> {
        if t1 <= t0 || self.state.is_empty() {
            return Ok(t1.max(t0));
        }
        let (_, states) = self.solve(t0, t1)?;
        let last = states
            .into_iter()
            .last()
            .ok_or_else(|| RxnError::Integration("solver returned no output".to_string()))?;
        self.state.q_val = last;
        Ok(t1)
    }
}
