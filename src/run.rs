//! Carrying out a configured run and writing its output.

use crate::config::{RunConfig, SolverConfig};
use crate::errors::{CliError, CliResult};
use rsrxn_core::systems::{GillespieSystem, OdeSystem, Reporter, RunSummary, State, System};
use rsrxn_core::units::Quantity;
use rsrxn_networks::Network;
use std::fs;
use std::path::{Path, PathBuf};

/// What a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub state: State,
    pub reporters: Vec<Reporter>,
    /// Files written, reporters first and the final state last
    pub files: Vec<PathBuf>,
}

/// Writes the network's initial counts into `state` and returns the
/// configured quantities, which the system converts itself.
fn initial_quantities(
    network: &Network,
    config: &RunConfig,
    state: &mut State,
) -> CliResult<Vec<(usize, Quantity)>> {
    network.initialise(state)?;
    config
        .initial
        .iter()
        .map(|entry| {
            let idx = state
                .index_of(&entry.compartment, &entry.species)
                .ok_or_else(|| {
                    CliError::Invalid(format!(
                        "initial quantity for {} in {}, which is not part of the state",
                        entry.species, entry.compartment
                    ))
                })?;
            Ok((idx, entry.quantity.clone()))
        })
        .collect()
}

fn drive<S: System>(system: &mut S, config: &RunConfig, total_time: f64) -> CliResult<RunSummary> {
    for reporter in &config.reporters {
        let reporter = reporter.reporter(system.state())?;
        system.add_reporter(reporter)?;
    }
    Ok(system.run(total_time)?)
}

/// Builds the configured network, runs it and writes reporter and state CSVs
/// into the output directory.
pub fn run(config: &RunConfig) -> CliResult<RunOutcome> {
    let network = config.network.build()?;
    let total_time = config.total_time.unwrap_or(network.total_time);
    log::info!(
        "Network {} with {} compartments, running for {total_time} s",
        config.network.name(),
        network.model.n_compartments()
    );

    let (summary, state, reporters) = match &config.solver {
        SolverConfig::Ode(settings) => {
            let mut system = OdeSystem::new(network.model.clone(), settings.clone())?;
            for (idx, q) in initial_quantities(&network, config, system.state_mut())? {
                system.set_q(&[idx], &q)?;
            }
            let summary = drive(&mut system, config, total_time)?;
            (summary, system.state().clone(), system.reporters().to_vec())
        }
        SolverConfig::Gillespie(settings) => {
            let mut system = GillespieSystem::new(network.model.clone(), settings.clone())?;
            for (idx, q) in initial_quantities(&network, config, system.state_mut())? {
                system.set_q(&[idx], &q)?;
            }
            let summary = drive(&mut system, config, total_time)?;
            (summary, system.state().clone(), system.reporters().to_vec())
        }
    };
    log::info!("Finished at t = {} s", summary.final_time);

    let files = write_outputs(config, &state, &reporters)?;
    Ok(RunOutcome {
        summary,
        state,
        reporters,
        files,
    })
}

fn write_outputs(config: &RunConfig, state: &State, reporters: &[Reporter]) -> CliResult<Vec<PathBuf>> {
    let dir = &config.output.dir;
    fs::create_dir_all(dir)?;
    let mut files = Vec::new();
    for (i, (reporter, reporter_config)) in reporters.iter().zip(&config.reporters).enumerate() {
        let path = dir.join(reporter_config.file_name(i));
        reporter.to_csv(&path)?;
        files.push(path);
    }
    let path = dir.join(&config.output.state);
    state.to_csv(&path)?;
    files.push(path);
    for file in &files {
        log::info!("Wrote {}", file.display());
    }
    Ok(files)
}

/// DOT rendering of the configured network's connectivity.
pub fn graph(config: &RunConfig, scale: f64) -> CliResult<String> {
    let network = config.network.build()?;
    Ok(network.model.as_dot(scale))
}

/// Writes the state layout of the configured network, without values.
pub fn state_layout(config: &RunConfig, path: impl AsRef<Path>) -> CliResult<State> {
    let network = config.network.build()?;
    let state = State::from_model(&network.model);
    state.to_csv_no_q(path)?;
    Ok(state)
}
