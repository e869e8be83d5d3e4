//! Stochastic propagation with the Gillespie direct method.

use crate::systems::process::Process;
use rand::Rng;

/// Fires events from `y0` until the next event would fall after `t_span.1`.
///
/// Returns the final quantities and `t_span.1`. Only the propensities of
/// processes that read a changed quantity are recomputed after each event.
///
/// Processes fed by a time-varying reservoir are sampled by thinning: they
/// are proposed at their largest propensity up to the next profile
/// breakpoint and accepted with probability `a(t) / bound`. Time is never
/// advanced past a breakpoint without refreshing those bounds, so a
/// reservoir that switches on mid-interval still fires.
pub fn gillespie<R: Rng + ?Sized>(
    processes: &[Process],
    dependents: &[Vec<usize>],
    t_span: (f64, f64),
    y0: &[f64],
    rng: &mut R,
) -> (Vec<f64>, f64) {
    let (mut t, t_end) = t_span;
    let mut y = y0.to_vec();
    let time_dependent: Vec<bool> = processes.iter().map(Process::is_time_dependent).collect();

    let mut breakpoints: Vec<f64> = processes
        .iter()
        .filter(|p| p.is_time_dependent())
        .filter_map(|p| p.source.as_ref())
        .flat_map(|profile| profile.breakpoints())
        .filter(|b| *b > t && *b < t_end)
        .collect();
    breakpoints.sort_by(f64::total_cmp);
    breakpoints.dedup();
    let horizon_after = |t: f64| {
        let next = breakpoints.partition_point(|b| *b <= t);
        breakpoints.get(next).copied().unwrap_or(t_end)
    };

    let mut horizon = horizon_after(t);
    let rate_of = |p: usize, y: &[f64], t: f64, horizon: f64| {
        if time_dependent[p] {
            processes[p].propensity_bound(y, t, horizon)
        } else {
            processes[p].propensity(y, t)
        }
    };
    let mut rates: Vec<f64> = (0..processes.len())
        .map(|p| rate_of(p, &y, t, horizon))
        .collect();
    let mut stale: Vec<usize> = Vec::new();
    let mut n_events: u64 = 0;
    let mut n_rejected: u64 = 0;

    loop {
        let total: f64 = rates.iter().sum();

        // 1 - U lies in (0, 1], keeping the logarithm finite
        let dt = if total > 0.0 {
            -(1.0 - rng.gen::<f64>()).ln() / total
        } else {
            f64::INFINITY
        };
        if t + dt > horizon {
            if horizon >= t_end {
                break;
            }
            t = horizon;
            horizon = horizon_after(t);
            for (p, rate) in rates.iter_mut().enumerate() {
                if time_dependent[p] {
                    *rate = rate_of(p, &y, t, horizon);
                }
            }
            continue;
        }
        t += dt;

        let target = rng.gen::<f64>() * total;
        let mut chosen = None;
        let mut cumulative = 0.0;
        for (i, &a) in rates.iter().enumerate() {
            if a <= 0.0 {
                continue;
            }
            cumulative += a;
            chosen = Some(i);
            if cumulative > target {
                break;
            }
        }
        let Some(fired) = chosen else {
            break;
        };
        if time_dependent[fired]
            && rng.gen::<f64>() * rates[fired] >= processes[fired].propensity(&y, t)
        {
            n_rejected += 1;
            continue;
        }

        stale.clear();
        for &(idx, delta) in &processes[fired].deltas {
            y[idx] += delta as f64;
            stale.extend_from_slice(&dependents[idx]);
        }
        stale.sort_unstable();
        stale.dedup();
        for &p in &stale {
            rates[p] = rate_of(p, &y, t, horizon);
        }
        n_events += 1;
    }

    log::debug!(
        "Fired {n_events} events ({n_rejected} rejected proposals) between {} and {t_end}",
        t_span.0
    );
    (y, t_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartments::ConcentrationProfile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn decay(rate: f64) -> Process {
        Process {
            rate,
            inputs: vec![(0, 1)],
            deltas: vec![(0, -1)],
            source: None,
        }
    }

    #[test]
    fn nothing_happens_without_propensity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (y, t) = gillespie(&[decay(1.0)], &[vec![0]], (0.0, 10.0), &[0.0], &mut rng);
        assert_eq!(y, vec![0.0]);
        assert_eq!(t, 10.0);
    }

    #[test]
    fn counts_stay_integer_and_non_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (y, t) = gillespie(&[decay(0.5)], &[vec![0]], (0.0, 2.0), &[100.0], &mut rng);
        assert_eq!(t, 2.0);
        assert!(y[0] >= 0.0 && y[0] < 100.0);
        assert_eq!(y[0].fract(), 0.0);

        let (y, _) = gillespie(&[decay(0.5)], &[vec![0]], (0.0, 1e4), &[100.0], &mut rng);
        assert_eq!(y[0], 0.0);
    }

    #[test]
    fn dimerisation_stops_at_one_molecule() {
        let dimer = Process {
            rate: 1.0,
            inputs: vec![(0, 2)],
            deltas: vec![(0, -2), (1, 1)],
            source: None,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (y, _) = gillespie(&[dimer], &[vec![0], vec![]], (0.0, 1e3), &[11.0, 0.0], &mut rng);
        assert_eq!(y, vec![1.0, 5.0]);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let processes = [decay(0.3)];
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            gillespie(&processes, &[vec![0]], (0.0, 3.0), &[50.0], &mut rng).0
        };
        assert_eq!(run(11), run(11));
    }

    fn inflow(points: Vec<(f64, f64)>) -> Process {
        Process {
            rate: 1.0,
            inputs: vec![],
            deltas: vec![(0, 1)],
            source: Some(ConcentrationProfile::Piecewise(points)),
        }
    }

    #[test]
    fn reservoir_switching_on_mid_interval_fires() {
        // empty until t = 4, ramps to 10 by t = 5: 5 + 50 expected arrivals
        let source = inflow(vec![(0.0, 0.0), (4.0, 0.0), (5.0, 10.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n_runs = 200;
        let mean: f64 = (0..n_runs)
            .map(|_| gillespie(&[source.clone()], &[vec![]], (0.0, 10.0), &[0.0], &mut rng).0[0])
            .sum::<f64>()
            / n_runs as f64;
        assert!((mean - 55.0).abs() < 3.0, "mean {mean}");

        let (y, t) = gillespie(&[source], &[vec![]], (0.0, 3.9), &[0.0], &mut rng);
        assert_eq!((y[0], t), (0.0, 3.9));
    }

    #[test]
    fn reservoir_switching_off_stops_arrivals() {
        let pulse = inflow(vec![(0.0, 20.0), (1.0, 20.0), (1.0, 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let (before, _) = gillespie(&[pulse.clone()], &[vec![]], (0.0, 1.0), &[0.0], &mut rng);
        assert!(before[0] > 0.0);
        let (after, _) = gillespie(&[pulse], &[vec![]], (1.0, 50.0), &[0.0], &mut rng);
        assert_eq!(after[0], 0.0);
    }

    #[test]
    fn mean_decay_matches_exponential() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let n_runs = 400;
        let mean: f64 = (0..n_runs)
            .map(|_| gillespie(&[decay(0.1)], &[vec![0]], (0.0, 10.0), &[100.0], &mut rng).0[0])
            .sum::<f64>()
            / n_runs as f64;
        let expected = 100.0 * (-1.0f64).exp();
        assert!((mean - expected).abs() < 2.0, "mean {mean} vs {expected}");
    }
}
