//! Built-in networks.
//!
//! Each network is described by a parameter struct whose defaults reproduce
//! the textbook setup, and builds into a [`Network`]: a flat model plus the
//! molecule counts it starts from.
//!
//! [`NetworkConfig`] selects a network by name, so that a run can be
//! described in TOML:
//!
//! ```toml
//! [network]
//! name = "birth_death"
//! kf = 0.1
//! kr = 1.0
//! ```

mod membrane;
mod one_d;
mod well_mixed;

pub use membrane::{membrane_slab, MembraneSlabParameters, BATH, BULK, LOWER_SLAB, UPPER_SLAB};
pub use one_d::{
    diffusion_1d, reaction_diffusion_1d, reaction_diffusion_ab_1d, Diffusion1dParameters,
    ReactionDiffusion1dParameters, ReactionDiffusionAb1dParameters, LINE,
};
pub use well_mixed::{
    ab_system, birth_death, degradation, AbSystemParameters, BirthDeathParameters,
    DegradationParameters,
};

use rsrxn_core::errors::{RxnError, RxnResult};
use rsrxn_core::model::FlatModel;
use rsrxn_core::systems::State;
use serde::{Deserialize, Serialize};

/// Names accepted by [`NetworkConfig::default_for`].
pub const NETWORK_NAMES: [&str; 7] = [
    "degradation",
    "birth_death",
    "ab_system",
    "diffusion_1d",
    "reaction_diffusion_1d",
    "reaction_diffusion_ab_1d",
    "membrane_slab",
];

/// A number of molecules of one species placed in one compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialCount {
    pub compartment: String,
    pub species: String,
    pub count: f64,
}

impl InitialCount {
    pub fn new(compartment: impl Into<String>, species: impl Into<String>, count: f64) -> Self {
        Self {
            compartment: compartment.into(),
            species: species.into(),
            count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Network {
    pub model: FlatModel,
    /// Entries not listed start empty
    pub initial: Vec<InitialCount>,
    /// Suggested length of a run, in s
    pub total_time: f64,
}

impl Network {
    /// Writes the initial counts into `state`, which must be laid out from
    /// this network's model.
    pub fn initialise(&self, state: &mut State) -> RxnResult<()> {
        for entry in &self.initial {
            let idx = state
                .index_of(&entry.compartment, &entry.species)
                .ok_or_else(|| {
                    RxnError::Error(format!(
                        "no state entry for {} in {}",
                        entry.species, entry.compartment
                    ))
                })?;
            if entry.count < 0.0 {
                return Err(RxnError::InvalidQuantity(format!(
                    "initial count of {} in {} is negative",
                    entry.species, entry.compartment
                )));
            }
            state.q_val[idx] = entry.count;
        }
        Ok(())
    }
}

/// A built-in network and its parameters, tagged by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum NetworkConfig {
    #[serde(rename = "degradation")]
    Degradation(DegradationParameters),
    #[serde(rename = "birth_death")]
    BirthDeath(BirthDeathParameters),
    #[serde(rename = "ab_system")]
    AbSystem(AbSystemParameters),
    #[serde(rename = "diffusion_1d")]
    Diffusion1d(Diffusion1dParameters),
    #[serde(rename = "reaction_diffusion_1d")]
    ReactionDiffusion1d(ReactionDiffusion1dParameters),
    #[serde(rename = "reaction_diffusion_ab_1d")]
    ReactionDiffusionAb1d(ReactionDiffusionAb1dParameters),
    #[serde(rename = "membrane_slab")]
    MembraneSlab(MembraneSlabParameters),
}

impl NetworkConfig {
    /// The named network with default parameters.
    pub fn default_for(name: &str) -> Option<Self> {
        let config = match name {
            "degradation" => Self::Degradation(Default::default()),
            "birth_death" => Self::BirthDeath(Default::default()),
            "ab_system" => Self::AbSystem(Default::default()),
            "diffusion_1d" => Self::Diffusion1d(Default::default()),
            "reaction_diffusion_1d" => Self::ReactionDiffusion1d(Default::default()),
            "reaction_diffusion_ab_1d" => Self::ReactionDiffusionAb1d(Default::default()),
            "membrane_slab" => Self::MembraneSlab(Default::default()),
            _ => return None,
        };
        Some(config)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Degradation(_) => "degradation",
            Self::BirthDeath(_) => "birth_death",
            Self::AbSystem(_) => "ab_system",
            Self::Diffusion1d(_) => "diffusion_1d",
            Self::ReactionDiffusion1d(_) => "reaction_diffusion_1d",
            Self::ReactionDiffusionAb1d(_) => "reaction_diffusion_ab_1d",
            Self::MembraneSlab(_) => "membrane_slab",
        }
    }

    pub fn build(&self) -> RxnResult<Network> {
        log::debug!("Building network {}", self.name());
        match self {
            Self::Degradation(p) => degradation(p),
            Self::BirthDeath(p) => birth_death(p),
            Self::AbSystem(p) => ab_system(p),
            Self::Diffusion1d(p) => diffusion_1d(p),
            Self::ReactionDiffusion1d(p) => reaction_diffusion_1d(p),
            Self::ReactionDiffusionAb1d(p) => reaction_diffusion_ab_1d(p),
            Self::MembraneSlab(p) => membrane_slab(p),
        }
    }
}
