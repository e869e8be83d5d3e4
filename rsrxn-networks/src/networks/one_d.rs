//! Networks on a line of equal compartments.
//!
//! All three share the geometry of a segment `[0, length]` split into
//! `compartments` cells, with molecules hopping between neighbouring cells
//! at `diffusion_rate`. The diffusion constant is `diffusion_rate * h^2` for
//! a cell width `h`.

use super::well_mixed::{ab_consumption, birth};
use super::{InitialCount, Network};
use rsrxn_core::compartments::{make_id, Compartment, CompartmentArray};
use rsrxn_core::connections::Connection;
use rsrxn_core::errors::{RxnError, RxnResult};
use rsrxn_core::model::{FlatModel, Model};
use rsrxn_core::reactions::{Reaction, Species};
use rsrxn_core::units::{Quantity, Unit, NM};
use serde::{Deserialize, Serialize};

/// Id of the array holding the cells.
pub const LINE: &str = "main";

/// Relative slack when comparing cell boundaries to a cut-off position.
const POSITION_TOLERANCE: f64 = 1e-9;

/// A pulse of molecules diffusing along the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diffusion1dParameters {
    /// Hopping rate between neighbouring cells
    /// unit: 1/s
    pub diffusion_rate: f64,
    pub compartments: usize,
    /// unit: mm
    pub length: f64,
    /// Cells that start with `pulse_count` molecules of A
    pub pulse_cells: Vec<usize>,
    pub pulse_count: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for Diffusion1dParameters {
    fn default() -> Self {
        Self {
            diffusion_rate: 0.16,
            compartments: 40,
            length: 1.0,
            pulse_cells: vec![16, 17],
            pulse_count: 500.0,
            total_time: 240.0,
        }
    }
}

/// A produced near the left end, degraded everywhere and diffusing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionDiffusion1dParameters {
    /// unit: 1/s
    pub diffusion_rate: f64,
    pub compartments: usize,
    /// unit: mm
    pub length: f64,
    /// unit: 1/s
    pub degradation_rate: f64,
    /// Production per unit length, scaled by the cell width
    /// unit: 1/(um s)
    pub production_rate: f64,
    /// Production happens in cells lying within this fraction of the length
    pub production_extent: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for ReactionDiffusion1dParameters {
    fn default() -> Self {
        Self {
            diffusion_rate: 0.16,
            compartments: 40,
            length: 1.0,
            degradation_rate: 1e-3,
            production_rate: 0.012,
            production_extent: 0.2,
            total_time: 1800.0,
        }
    }
}

/// The reactions of the well-mixed AB system on a line, with A produced on
/// the left and B produced on the right.
///
/// Second order rates are given in 1/s and scaled by the cell width, so they
/// become `L/s` rates that the kinetics divide by the cell length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionDiffusionAb1dParameters {
    /// unit: 1/s
    pub diffusion_rate: f64,
    pub compartments: usize,
    /// unit: mm
    pub length: f64,
    /// unit: 1/s
    pub k_aa: f64,
    /// unit: 1/s
    pub k_ab: f64,
    /// unit: 1/s
    pub birth_a: f64,
    /// unit: 1/s
    pub birth_b: f64,
    /// A is produced in cells ending at or below this fraction of the length
    pub birth_a_until: f64,
    /// B is produced in cells ending above this fraction of the length
    pub birth_b_from: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for ReactionDiffusionAb1dParameters {
    fn default() -> Self {
        Self {
            diffusion_rate: 0.16,
            compartments: 40,
            length: 1.0,
            k_aa: 1e-3,
            k_ab: 1e-2,
            birth_a: 1.2,
            birth_b: 1.0,
            birth_a_until: 0.9,
            birth_b_from: 0.4,
            total_time: 1800.0,
        }
    }
}

/// Cell geometry shared by the line networks.
struct Line {
    boundaries: Vec<Quantity>,
    /// Cell width
    h: Quantity,
    /// Total length in nm
    length_nm: f64,
}

impl Line {
    fn new(compartments: usize, length_mm: f64) -> RxnResult<Self> {
        if compartments == 0 {
            return Err(RxnError::Geometry(
                "a line needs at least one compartment".to_string(),
            ));
        }
        if length_mm <= 0.0 {
            return Err(RxnError::Geometry(format!(
                "line length must be positive, got {length_mm} mm"
            )));
        }
        let mm = Unit::parse("mm")?;
        let length = Quantity::with_unit(length_mm, mm.clone());
        Ok(Self {
            boundaries: Quantity::linspace(0.0, length_mm, compartments + 1, &mm),
            h: &length / compartments as f64,
            length_nm: length.value_in(&NM)?,
        })
    }

    fn array(&self, connection: Connection) -> RxnResult<CompartmentArray> {
        CompartmentArray::one_d(LINE, &self.boundaries, connection, false)
    }

    /// True when the upper boundary of `c` lies at or below `fraction` of the line.
    fn ends_within(&self, c: &Compartment, fraction: f64) -> bool {
        let cut = fraction * self.length_nm;
        c.extents
            .first()
            .is_some_and(|&(_, upper)| upper <= cut + POSITION_TOLERANCE * self.length_nm)
    }
}

fn flatten(array: CompartmentArray) -> RxnResult<FlatModel> {
    Model::from_parts(vec![array], vec![])?.flatten()
}

fn per_second(k: f64) -> RxnResult<Quantity> {
    Ok(Quantity::new(k, "1/s")?)
}

pub fn diffusion_1d(params: &Diffusion1dParameters) -> RxnResult<Network> {
    let line = Line::new(params.compartments, params.length)?;
    let conn = Connection::isotropic([("A", per_second(params.diffusion_rate)?)])?;
    let model = flatten(line.array(conn)?)?;

    let initial = params
        .pulse_cells
        .iter()
        .map(|&i| {
            if i >= params.compartments {
                return Err(RxnError::MissingCompartment(make_id(Some(LINE), &i.into())));
            }
            Ok(InitialCount::new(make_id(Some(LINE), &i.into()), "A", params.pulse_count))
        })
        .collect::<RxnResult<Vec<_>>>()?;

    Ok(Network {
        model,
        initial,
        total_time: params.total_time,
    })
}

pub fn reaction_diffusion_1d(params: &ReactionDiffusion1dParameters) -> RxnResult<Network> {
    let line = Line::new(params.compartments, params.length)?;
    let conn = Connection::isotropic([("A", per_second(params.diffusion_rate)?)])?;
    let mut array = line.array(conn)?;

    let degradation = Reaction::irreversible(
        "deg",
        vec![Species::new("A")],
        vec![],
        vec![1],
        vec![],
        per_second(params.degradation_rate)?,
    )?;
    let kp = Quantity::new(params.production_rate, "1/(um s)")?;
    let synthesis = Reaction::irreversible(
        "syn",
        vec![],
        vec![Species::new("A")],
        vec![],
        vec![1],
        kp.checked_mul(&line.h)?,
    )?;

    array.add_rxn_to_array(&degradation);
    for c in array.compartments_mut() {
        if line.ends_within(c, params.production_extent) {
            c.add_rxn_to_compartment(synthesis.clone());
        }
    }

    Ok(Network {
        model: flatten(array)?,
        initial: Vec::new(),
        total_time: params.total_time,
    })
}

pub fn reaction_diffusion_ab_1d(params: &ReactionDiffusionAb1dParameters) -> RxnResult<Network> {
    let line = Line::new(params.compartments, params.length)?;

    // hopping rates scaled by the cell length, divided back out per molecule
    let d = per_second(params.diffusion_rate)?.checked_mul(&line.h)?;
    let conn = Connection::div_by_v([("A", d.clone()), ("B", d)], 1)?;
    let mut array = line.array(conn)?;

    let k_aa = per_second(params.k_aa)?.checked_mul(&line.h)?;
    let k_ab = per_second(params.k_ab)?.checked_mul(&line.h)?;
    array.add_rxns_to_array(&ab_consumption(&k_aa, &k_ab)?);

    let birth_a = birth("A", params.birth_a)?;
    let birth_b = birth("B", params.birth_b)?;
    for c in array.compartments_mut() {
        if line.ends_within(c, params.birth_a_until) {
            c.add_rxn_to_compartment(birth_a.clone());
        }
        if !line.ends_within(c, params.birth_b_from) {
            c.add_rxn_to_compartment(birth_b.clone());
        }
    }

    Ok(Network {
        model: flatten(array)?,
        initial: Vec::new(),
        total_time: params.total_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rsrxn_core::systems::{Kinetics, State};

    fn reaction_ids(model: &FlatModel, id: &str) -> Vec<String> {
        model
            .compartment(id)
            .unwrap()
            .reactions
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    #[test]
    fn diffusion_pulse() {
        let network = diffusion_1d(&Diffusion1dParameters::default()).unwrap();
        assert_eq!(network.model.n_compartments(), 40);
        let ids: Vec<&str> = network.initial.iter().map(|c| c.compartment.as_str()).collect();
        assert_eq!(ids, vec!["main-16", "main-17"]);

        let state = State::from_model(&network.model);
        assert_eq!(state.index_of("main-16", "A"), Some(16));
        // cell centres in nm
        assert_relative_eq!(state.x_pos[0].unwrap(), 12_500.0, max_relative = 1e-12);
    }

    #[test]
    fn pulse_outside_the_line() {
        let params = Diffusion1dParameters {
            pulse_cells: vec![40],
            ..Diffusion1dParameters::default()
        };
        assert!(matches!(
            diffusion_1d(&params),
            Err(RxnError::MissingCompartment(id)) if id == "main-40"
        ));
    }

    #[test]
    fn production_in_the_first_fifth() {
        let network = reaction_diffusion_1d(&ReactionDiffusion1dParameters::default()).unwrap();
        let producing = network
            .model
            .ids()
            .filter(|id| reaction_ids(&network.model, id).contains(&"syn".to_string()))
            .count();
        assert_eq!(producing, 8);
        assert_eq!(reaction_ids(&network.model, "main-7"), vec!["deg", "syn"]);
        assert_eq!(reaction_ids(&network.model, "main-8"), vec!["deg"]);

        // kp h = 0.012 / um / s * 25 um
        let syn = &network.model.compartment("main-0").unwrap().reactions[1];
        assert_relative_eq!(syn.kf.value, 0.3, max_relative = 1e-12);
    }

    #[test]
    fn ab_line_regions_and_rates() {
        let network =
            reaction_diffusion_ab_1d(&ReactionDiffusionAb1dParameters::default()).unwrap();
        let model = &network.model;
        assert_eq!(reaction_ids(model, "main-0"), vec!["AAC", "ABD", "birth_A"]);
        assert_eq!(reaction_ids(model, "main-20"), vec!["AAC", "ABD", "birth_A", "birth_B"]);
        assert_eq!(reaction_ids(model, "main-39"), vec!["AAC", "ABD", "birth_B"]);
        assert_eq!(reaction_ids(model, "main-15"), vec!["AAC", "ABD", "birth_A"]);
        assert_eq!(reaction_ids(model, "main-16"), vec!["AAC", "ABD", "birth_A", "birth_B"]);

        // per molecule, the scaled rates come back to their 1/s values
        let state = State::from_model(model);
        let kinetics = Kinetics::new(model, &state).unwrap();
        let a0 = state.index_of("main-0", "A").unwrap();
        let a1 = state.index_of("main-1", "A").unwrap();
        let hop = kinetics
            .processes
            .iter()
            .find(|p| p.inputs == vec![(a0, 1)] && p.deltas.contains(&(a1, 1)))
            .unwrap();
        assert_relative_eq!(hop.rate, 0.16, max_relative = 1e-9);
        let dimerisation = kinetics
            .processes
            .iter()
            .find(|p| p.inputs == vec![(a0, 2)])
            .unwrap();
        assert_relative_eq!(dimerisation.rate, 1e-3, max_relative = 1e-9);
    }

    #[test]
    fn empty_line() {
        let params = ReactionDiffusion1dParameters {
            compartments: 0,
            ..ReactionDiffusion1dParameters::default()
        };
        assert!(matches!(
            reaction_diffusion_1d(&params),
            Err(RxnError::Geometry(_))
        ));
    }
}
