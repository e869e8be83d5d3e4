//! Single compartment networks.

use super::{InitialCount, Network};
use crate::templates::{one_compartment, MAIN};
use rsrxn_core::errors::RxnResult;
use rsrxn_core::model::FlatModel;
use rsrxn_core::reactions::{Reaction, Species};
use rsrxn_core::units::Quantity;
use serde::{Deserialize, Serialize};

/// First order decay, `A -> 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationParameters {
    /// Degradation rate
    /// unit: 1/s
    pub k: f64,
    /// Initial number of A molecules
    pub q0: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for DegradationParameters {
    fn default() -> Self {
        Self {
            k: 0.1,
            q0: 20.0,
            total_time: 30.0,
        }
    }
}

/// Degradation and production of A in one reversible step, `A <-> 0`.
///
/// The stationary mean is `kr / kf` molecules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthDeathParameters {
    /// Degradation rate
    /// unit: 1/s
    pub kf: f64,
    /// Production rate
    /// unit: 1/s
    pub kr: f64,
    pub q0: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for BirthDeathParameters {
    fn default() -> Self {
        Self {
            kf: 0.1,
            kr: 1.0,
            q0: 0.0,
            total_time: 100.0,
        }
    }
}

/// Two produced species consumed by dimerisation and by reacting with each
/// other:
///
/// ```text
/// A + A -> C    A + B -> D    0 -> A    0 -> B
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbSystemParameters {
    /// `A + A -> C`
    /// unit: 1/s
    pub k_aa: f64,
    /// `A + B -> D`
    /// unit: 1/s
    pub k_ab: f64,
    /// unit: 1/s
    pub birth_a: f64,
    /// unit: 1/s
    pub birth_b: f64,
    pub a0: f64,
    pub b0: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for AbSystemParameters {
    fn default() -> Self {
        Self {
            k_aa: 1e-3,
            k_ab: 1e-2,
            birth_a: 1.2,
            birth_b: 1.0,
            a0: 0.0,
            b0: 0.0,
            total_time: 100.0,
        }
    }
}

fn per_second(k: f64) -> RxnResult<Quantity> {
    Ok(Quantity::new(k, "1/s")?)
}

/// Puts `rxns` into the `main` compartment of a one compartment model.
fn well_mixed(rxns: Vec<Reaction>) -> RxnResult<FlatModel> {
    let mut model = one_compartment()?;
    if let Some(main) = model.compartment_mut(MAIN) {
        main.add_rxns(rxns);
    }
    model.flatten()
}

fn nonzero(counts: Vec<InitialCount>) -> Vec<InitialCount> {
    counts.into_iter().filter(|c| c.count != 0.0).collect()
}

pub fn degradation(params: &DegradationParameters) -> RxnResult<Network> {
    let rxn = Reaction::irreversible(
        "degradation",
        vec![Species::new("A")],
        vec![],
        vec![1],
        vec![],
        per_second(params.k)?,
    )?;
    Ok(Network {
        model: well_mixed(vec![rxn])?,
        initial: nonzero(vec![InitialCount::new(MAIN, "A", params.q0)]),
        total_time: params.total_time,
    })
}

pub fn birth_death(params: &BirthDeathParameters) -> RxnResult<Network> {
    let rxn = Reaction::new(
        "birth_and_death",
        vec![Species::new("A")],
        vec![],
        vec![1],
        vec![],
        per_second(params.kf)?,
        per_second(params.kr)?,
    )?;
    Ok(Network {
        model: well_mixed(vec![rxn])?,
        initial: nonzero(vec![InitialCount::new(MAIN, "A", params.q0)]),
        total_time: params.total_time,
    })
}

/// The reactions of [`ab_system`], without the births.
pub(crate) fn ab_consumption(k_aa: &Quantity, k_ab: &Quantity) -> RxnResult<Vec<Reaction>> {
    let (a, b) = (Species::new("A"), Species::new("B"));
    Ok(vec![
        Reaction::irreversible(
            "AAC",
            vec![a.clone()],
            vec![Species::new("C")],
            vec![2],
            vec![1],
            k_aa.clone(),
        )?,
        Reaction::irreversible(
            "ABD",
            vec![a, b],
            vec![Species::new("D")],
            vec![1, 1],
            vec![1],
            k_ab.clone(),
        )?,
    ])
}

/// Zero order production of `species`.
pub(crate) fn birth(species: &str, k: f64) -> RxnResult<Reaction> {
    Reaction::irreversible(
        format!("birth_{species}"),
        vec![],
        vec![Species::new(species)],
        vec![],
        vec![1],
        per_second(k)?,
    )
}

pub fn ab_system(params: &AbSystemParameters) -> RxnResult<Network> {
    let mut rxns = ab_consumption(&per_second(params.k_aa)?, &per_second(params.k_ab)?)?;
    rxns.push(birth("A", params.birth_a)?);
    rxns.push(birth("B", params.birth_b)?);
    Ok(Network {
        model: well_mixed(rxns)?,
        initial: nonzero(vec![
            InitialCount::new(MAIN, "A", params.a0),
            InitialCount::new(MAIN, "B", params.b0),
        ]),
        total_time: params.total_time,
    })
}
