//! Mass-action rate equations for the ODE solvers.

use super::process::Kinetics;
use nalgebra::DVector;
use ode_solvers::System;
use std::sync::Arc;

pub type OdeState = DVector<f64>;

/// `dq_i/dt = Σ_p delta_pi * k_p * Π q^n * C_p(t)` over every process.
#[derive(Debug, Clone)]
pub struct RateEquations {
    kinetics: Arc<Kinetics>,
}

impl RateEquations {
    pub fn new(kinetics: Arc<Kinetics>) -> Self {
        Self { kinetics }
    }

    pub fn derivative(&self, t: f64, y: &[f64], dy: &mut [f64]) {
        dy.fill(0.0);
        for process in &self.kinetics.processes {
            let rate = process.mass_action(y, t);
            if rate == 0.0 {
                continue;
            }
            for &(idx, delta) in &process.deltas {
                dy[idx] += delta as f64 * rate;
            }
        }
    }
}

impl System<f64, OdeState> for RateEquations {
    fn system(&self, t: f64, y: &OdeState, dy: &mut OdeState) {
        self.derivative(t, y.as_slice(), dy.as_mut_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::process::Process;
    use is_close::is_close;

    #[test]
    fn decay_and_transfer() {
        let kinetics = Kinetics {
            processes: vec![
                Process {
                    rate: 0.5,
                    inputs: vec![(0, 1)],
                    deltas: vec![(0, -1), (1, 1)],
                    source: None,
                },
                Process {
                    rate: 0.1,
                    inputs: vec![(1, 2)],
                    deltas: vec![(1, -2)],
                    source: None,
                },
            ],
            dependents: vec![vec![0], vec![1]],
        };
        let eqs = RateEquations::new(Arc::new(kinetics));
        let y = OdeState::from_vec(vec![4.0, 3.0]);
        let mut dy = OdeState::zeros(2);
        eqs.system(0.0, &y, &mut dy);
        assert!(is_close!(dy[0], -2.0));
        assert!(is_close!(dy[1], 2.0 - 2.0 * 0.1 * 9.0));
    }
}
