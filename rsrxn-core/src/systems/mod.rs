//! Systems propagate a [`State`] in time and feed their reporters.
//!
//! [`OdeSystem`] integrates the mass-action rate equations and
//! [`GillespieSystem`] samples the same processes stochastically. Both share
//! the checkpoint logic of [`System::run`].

pub mod deriv;
pub mod gillespie;
pub mod ode;
pub mod process;
pub mod reporters;
pub mod state;

pub use gillespie::{GillespieSettings, GillespieSystem};
pub use ode::{OdeMethod, OdeSettings, OdeSystem};
pub use process::{Kinetics, Process};
pub use reporters::{Report, Reporter, ReporterKind};
pub use state::{State, StateRow};

use crate::errors::{RxnError, RxnResult};
use crate::model::FlatModel;
use crate::units::{Quantity, AVOGADRO, MOL, MOLAR};
use serde::{Deserialize, Serialize};

/// Times closer than this are treated as equal.
pub const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub final_time: f64,
    pub checkpoints: Vec<f64>,
}

/// True when `t` is a whole multiple of `freq`.
fn is_multiple(t: f64, freq: f64) -> bool {
    let ratio = t / freq;
    ratio - ratio.floor() < EPSILON || ratio.ceil() - ratio < EPSILON
}

/// `{0, total}` together with every multiple of each frequency up to `total`.
///
/// A frequency below `total * EPSILON` cannot be told apart from its
/// neighbouring multiples and is rejected.
pub fn checkpoints(total_time: f64, freqs: &[f64]) -> RxnResult<Vec<f64>> {
    let mut times = vec![0.0, total_time];
    for &freq in freqs {
        if !(freq.is_finite() && freq > 0.0 && freq >= total_time * EPSILON) {
            return Err(RxnError::Error(format!(
                "reporter frequency {freq} s is too fine for a run of {total_time} s"
            )));
        }
        let n = (total_time / freq + EPSILON).floor() as usize;
        times.extend((1..=n).map(|k| k as f64 * freq));
    }
    times.retain(|&t| t <= total_time + EPSILON);
    times.sort_by(f64::total_cmp);
    times.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
    Ok(times)
}

pub trait System {
    fn state(&self) -> &State;

    fn state_mut(&mut self) -> &mut State;

    fn reporters(&self) -> &[Reporter];

    fn reporters_mut(&mut self) -> &mut Vec<Reporter>;

    /// Propagates the state from `t0` to `t1` and returns the time reached.
    fn propagate(&mut self, t0: f64, t1: f64) -> RxnResult<f64>;

    fn add_reporter(&mut self, reporter: Reporter) -> RxnResult<()> {
        reporter.validate(self.state().len())?;
        self.reporters_mut().push(reporter);
        Ok(())
    }

    fn add_reporters(&mut self, reporters: Vec<Reporter>) -> RxnResult<()> {
        for reporter in reporters {
            self.add_reporter(reporter)?;
        }
        Ok(())
    }

    /// Runs for `total_time` seconds, stopping at every reporting time.
    ///
    /// Every reporter records the state at `t = 0` and at each checkpoint
    /// that is a multiple of its frequency.
    fn run(&mut self, total_time: f64) -> RxnResult<RunSummary> {
        if total_time < 0.0 || !total_time.is_finite() {
            return Err(RxnError::Error(format!(
                "total time must be a non-negative number of seconds, got {total_time}"
            )));
        }
        let freqs: Vec<f64> = self.reporters().iter().map(|r| r.freq).collect();
        let times = checkpoints(total_time, &freqs)?;
        log::info!(
            "Running for {total_time} s with {} checkpoints",
            times.len()
        );

        let mut t = 0.0;
        self.report(t)?;
        for window in times.windows(2) {
            let (t0, t1) = (window[0], window[1]);
            t = self.propagate(t0, t1)?;
            log::info!("Reached checkpoint t = {t1} s");
            self.report(t1)?;
        }
        Ok(RunSummary {
            final_time: t,
            checkpoints: times,
        })
    }

    /// Lets every reporter due at `t` record the current state.
    fn report(&mut self, t: f64) -> RxnResult<()> {
        let q = self.state().q_val.to_vec();
        for reporter in self.reporters_mut() {
            if t == 0.0 || is_multiple(t, reporter.freq) {
                reporter.report(t, &q)?;
            }
        }
        Ok(())
    }
}

/// Number of molecules in state entry `idx` for a quantity given as a count,
/// in `mol` or as a concentration.
pub(crate) fn molecule_count(
    model: &FlatModel,
    state: &State,
    idx: usize,
    q: &Quantity,
) -> RxnResult<f64> {
    let compartment = state
        .compartment
        .get(idx)
        .ok_or(RxnError::UnknownIndex(idx))?;
    let count = if q.is_dimensionless() {
        q.value
    } else if q.is_compatible(&MOL) {
        q.value_in(&MOL)? * AVOGADRO
    } else if q.is_compatible(&MOLAR) {
        let litres = model
            .compartment(compartment)
            .and_then(|c| c.volume())
            .and_then(|v| v.litres())
            .ok_or_else(|| RxnError::MissingVolume(compartment.clone()))?;
        q.value_in(&MOLAR)? * litres * AVOGADRO
    } else {
        return Err(RxnError::InvalidQuantity(format!(
            "cannot set a quantity in {}; use a count, mol or mol/L",
            q.unit
        )));
    };
    if count < 0.0 {
        return Err(RxnError::InvalidQuantity(format!(
            "quantities cannot be negative, got {q}"
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_times() {
        assert_eq!(checkpoints(10.0, &[]).unwrap(), vec![0.0, 10.0]);
        assert_eq!(checkpoints(10.0, &[4.0]).unwrap(), vec![0.0, 4.0, 8.0, 10.0]);
        assert_eq!(
            checkpoints(1.0, &[0.5, 0.25]).unwrap(),
            vec![0.0, 0.25, 0.5, 0.75, 1.0]
        );
        assert_eq!(checkpoints(0.0, &[1.0]).unwrap(), vec![0.0]);
        // 0.3 / 0.1 is slightly below 3
        assert_eq!(checkpoints(0.3, &[0.1]).unwrap().len(), 4);
    }

    #[test]
    fn too_fine_frequencies_rejected() {
        assert!(checkpoints(10.0, &[1e-300]).is_err());
        assert!(checkpoints(1e6, &[1e-3]).is_err());
        assert!(checkpoints(10.0, &[0.0]).is_err());
        assert!(checkpoints(10.0, &[-1.0]).is_err());
        assert!(checkpoints(10.0, &[f64::NAN]).is_err());
        assert_eq!(checkpoints(1.0, &[1e-3]).unwrap().len(), 1001);
    }

    #[test]
    fn multiples() {
        assert!(is_multiple(8.0, 4.0));
        assert!(is_multiple(0.3, 0.1));
        assert!(!is_multiple(10.0, 4.0));
    }
}
