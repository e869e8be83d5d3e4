//! Run configuration, read from TOML.
//!
//! ```toml
//! total_time = 100.0
//!
//! [network]
//! name = "birth_death"
//! kr = 2.0
//!
//! [solver]
//! kind = "gillespie"
//! seed = 42
//!
//! [[reporters]]
//! kind = "sum"
//! species = "A"
//! freq = 1.0
//! file = "total_a.csv"
//!
//! [[initial]]
//! compartment = "main"
//! species = "A"
//! quantity = "5"
//!
//! [output]
//! dir = "out"
//! ```
//!
//! Relative output directories are taken relative to the configuration file.

use crate::errors::{CliError, CliResult};
use rsrxn_core::systems::{GillespieSettings, OdeSettings, Reporter, ReporterKind, State};
use rsrxn_core::units::Quantity;
use rsrxn_networks::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SolverConfig {
    Ode(OdeSettings),
    Gillespie(GillespieSettings),
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::Ode(OdeSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    All,
    Selection,
    Sum,
    Avg,
    Max,
    Min,
}

/// A reporter described by what it selects rather than by state indices.
///
/// The selection is `idxs` when given, otherwise every entry of `species`,
/// otherwise the whole state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterConfig {
    pub kind: ReportKind,
    /// unit: s
    pub freq: f64,
    #[serde(default)]
    pub idxs: Option<Vec<usize>>,
    #[serde(default)]
    pub species: Option<String>,
    /// Output file name, `reporter_<n>.csv` when absent
    #[serde(default)]
    pub file: Option<String>,
}

impl ReporterConfig {
    fn selection(&self, state: &State) -> Vec<usize> {
        match (&self.idxs, &self.species) {
            (Some(idxs), _) => idxs.clone(),
            (None, Some(species)) => state.indices_for_species(species),
            (None, None) => (0..state.len()).collect(),
        }
    }

    /// Builds the reporter for a system with the given state layout.
    pub fn reporter(&self, state: &State) -> CliResult<Reporter> {
        let idxs = self.selection(state);
        let kind = match self.kind {
            ReportKind::All => ReporterKind::All,
            ReportKind::Selection => ReporterKind::Selection(idxs),
            ReportKind::Sum => ReporterKind::Sum(idxs),
            ReportKind::Avg => ReporterKind::Avg(idxs),
            ReportKind::Max => ReporterKind::Max(idxs),
            ReportKind::Min => ReporterKind::Min(idxs),
        };
        Ok(Reporter::new(kind, self.freq)?)
    }

    pub fn file_name(&self, position: usize) -> String {
        self.file
            .clone()
            .unwrap_or_else(|| format!("reporter_{position}.csv"))
    }
}

/// An initial quantity placed on top of the network's own initial counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialQuantity {
    pub compartment: String,
    pub species: String,
    /// A molecule count, an amount (`"1e-21 mol"`) or, for deterministic
    /// runs, a concentration (`"2 uM"`)
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Final state, with values
    pub state: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            state: "state.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub network: NetworkConfig,
    /// Length of the run in s, the network's suggestion when absent
    #[serde(default)]
    pub total_time: Option<f64>,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub reporters: Vec<ReporterConfig>,
    #[serde(default)]
    pub initial: Vec<InitialQuantity>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    pub fn from_toml(text: &str) -> CliResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Reads a configuration file, anchoring a relative output directory at
    /// the directory holding the file.
    pub fn from_file(path: impl AsRef<Path>) -> CliResult<Self> {
        let path = path.as_ref();
        let mut config = Self::from_toml(&fs::read_to_string(path)?)?;
        if config.output.dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.output.dir = parent.join(&config.output.dir);
            }
        }
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn check(&self) -> CliResult<()> {
        if let Some(t) = self.total_time {
            if t < 0.0 || !t.is_finite() {
                return Err(CliError::Invalid(format!(
                    "total_time must be a non-negative number of seconds, got {t}"
                )));
            }
        }
        let mut files: Vec<String> = self
            .reporters
            .iter()
            .enumerate()
            .map(|(i, r)| r.file_name(i))
            .collect();
        files.push(self.output.state.clone());
        files.sort();
        if let Some(pair) = files.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(CliError::Invalid(format!(
                "output file {} is written twice",
                pair[0]
            )));
        }
        Ok(())
    }
}
