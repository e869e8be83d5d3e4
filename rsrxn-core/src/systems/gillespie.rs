//! Stochastic propagation of molecule counts.

use super::process::Kinetics;
use super::reporters::Reporter;
use super::state::State;
use super::{molecule_count, System};
use crate::errors::{RxnError, RxnResult};
use crate::model::FlatModel;
use crate::propagators::gillespie;
use crate::units::Quantity;
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GillespieSettings {
    /// Seed of the random number generator; drawn from the OS when absent
    pub seed: Option<u64>,
}

pub struct GillespieSystem {
    model: FlatModel,
    state: State,
    kinetics: Kinetics,
    reporters: Vec<Reporter>,
    rng: ChaCha8Rng,
}

impl GillespieSystem {
    pub fn new(model: FlatModel, settings: GillespieSettings) -> RxnResult<Self> {
        let state = State::from_model(&model);
        let kinetics = Kinetics::new(&model, &state)?;
        let rng = match settings.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            model,
            state,
            kinetics,
            reporters: Vec::new(),
            rng,
        })
    }

    pub fn model(&self) -> &FlatModel {
        &self.model
    }

    pub fn kinetics(&self) -> &Kinetics {
        &self.kinetics
    }

    /// Sets the entries `idxs` to a whole number of molecules.
    pub fn set_q(&mut self, idxs: &[usize], q: &Quantity) -> RxnResult<()> {
        if !q.is_dimensionless() {
            return Err(RxnError::InvalidQuantity(format!(
                "stochastic systems count molecules; got {q}"
            )));
        }
        if q.value.fract() != 0.0 {
            return Err(RxnError::InvalidQuantity(format!(
                "molecule counts must be whole numbers, got {}",
                q.value
            )));
        }
        for &idx in idxs {
            let count = molecule_count(&self.model, &self.state, idx, q)?;
            self.state.q_val[idx] = count;
        }
        Ok(())
    }
}

impl System for GillespieSystem {
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
        if t1 <= t0 {
            return Ok(t0);
        }
        let y0 = self.state.q_val.to_vec();
        let (y, t) = gillespie(
            &self.kinetics.processes,
            &self.kinetics.dependents,
            (t0, t1),
            &y0,
            &mut self.rng,
        );
        self.state.q_val = Array1::from(y);
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartments::Compartment;
    use crate::model::Model;
    use crate::reactions::{Reaction, Species};
    use crate::systems::reporters::ReporterKind;

    fn birth_death() -> FlatModel {
        let rxn = Reaction::new(
            "birth_death",
            vec![Species::new("A")],
            vec![],
            vec![1],
            vec![],
            Quantity::new(0.1, "1/s").unwrap(),
            Quantity::new(1.0, "1/s").unwrap(),
        )
        .unwrap();
        let mut c = Compartment::new("main");
        c.add_rxn_to_compartment(rxn);
        Model::from_parts(vec![], vec![c]).unwrap().flatten().unwrap()
    }

    fn seeded(seed: u64) -> GillespieSystem {
        GillespieSystem::new(birth_death(), GillespieSettings { seed: Some(seed) }).unwrap()
    }

    #[test]
    fn integer_quantities_only() {
        let mut system = seeded(1);
        assert!(system.set_q(&[0], &Quantity::dimensionless(2.5)).is_err());
        assert!(system.set_q(&[0], &Quantity::new(1.0, "mol").unwrap()).is_err());
        assert!(system.set_q(&[0], &Quantity::dimensionless(-3.0)).is_err());
        system.set_q(&[0], &Quantity::dimensionless(3.0)).unwrap();
        assert_eq!(system.state().q_val[0], 3.0);
    }

    #[test]
    fn seeded_runs_repeat() {
        let run = |seed| {
            let mut system = seeded(seed);
            system.add_reporter(Reporter::all(1.0).unwrap()).unwrap();
            system.run(20.0).unwrap();
            system.reporters()[0].reports().to_vec()
        };
        let first = run(42);
        assert_eq!(first.len(), 21);
        assert_eq!(first, run(42));
    }

    #[test]
    fn birth_death_mean() {
        let mut system = seeded(9);
        system
            .add_reporter(Reporter::new(ReporterKind::Selection(vec![0]), 1.0).unwrap())
            .unwrap();
        system.run(2000.0).unwrap();
        // stationary mean kr / kf
        let reports = &system.reporters()[0].reports()[100..];
        let mean = reports.iter().map(|r| r.values[0]).sum::<f64>() / reports.len() as f64;
        assert!((mean - 10.0).abs() < 1.5, "mean {mean}");
    }
}
