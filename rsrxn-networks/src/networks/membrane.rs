//! A receptor-bearing membrane under a column of solvent.
//!
//! Two slabs of cells form the membrane, with bulk solvent stacked on the
//! upper slab. The box is periodic in x and y. Drug diffuses within each
//! layer, hops between the slabs and between membrane and bulk, and binds
//! receptors inside the membrane. Optionally the top of the bulk exchanges
//! with a reservoir held at a fixed drug concentration.

use super::{InitialCount, Network};
use rsrxn_core::compartments::{
    make_id, Axis, Compartment, CompartmentArray, ConcentrationProfile,
};
use rsrxn_core::connections::{Connection, SpeciesRate};
use rsrxn_core::errors::{RxnError, RxnResult};
use rsrxn_core::model::Model;
use rsrxn_core::reactions::{Reaction, Species};
use rsrxn_core::units::{Quantity, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOWER_SLAB: &str = "lower_slab";
pub const UPPER_SLAB: &str = "upper_slab";
pub const BULK: &str = "bulk";
pub const BATH: &str = "bath";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembraneSlabParameters {
    /// The box spans `[-half_width, half_width]` in x and y
    /// unit: nm
    pub half_width: f64,
    /// Cells along x and along y
    pub cells_per_side: usize,
    /// Thickness of each slab
    /// unit: nm
    pub slab_thickness: f64,
    /// Height of the solvent column above the membrane
    /// unit: nm
    pub bulk_height: f64,
    pub bulk_layers: usize,
    /// Drug-receptor association rate
    /// unit: 1/(M s)
    pub kon: f64,
    /// unit: 1/s
    pub koff: f64,
    /// Drug diffusion constant inside a slab
    /// unit: cm^2/s
    pub d_slab: f64,
    /// unit: cm^2/s
    pub d_bulk: f64,
    /// Hopping rate between the two slabs
    /// unit: 1/s
    pub k_between_slabs: f64,
    /// `(membrane to bulk, bulk to membrane)` hopping rates
    /// unit: 1/s
    pub k_slab_bulk: (f64, f64),
    /// Receptors initially in each cell of the upper slab
    pub receptors_per_cell: f64,
    /// Drug concentration held above the bulk, no reservoir when zero
    /// unit: uM
    pub bath_concentration: f64,
    /// unit: s
    pub total_time: f64,
}

impl Default for MembraneSlabParameters {
    fn default() -> Self {
        Self {
            half_width: 50.0,
            cells_per_side: 10,
            slab_thickness: 1.0,
            bulk_height: 24.0,
            bulk_layers: 22,
            kon: 1e6,
            koff: 0.1,
            d_slab: 1e-8,
            d_bulk: 1e-5,
            k_between_slabs: 1e-5,
            k_slab_bulk: (1e-1, 1e-5),
            receptors_per_cell: 1.0,
            bath_concentration: 100.0,
            total_time: 1e-6,
        }
    }
}

fn drug_ficks(d: f64) -> RxnResult<Connection> {
    Connection::ficks([("drug", Quantity::new(d, "cm^2/s")?)], 3)
}

pub fn membrane_slab(params: &MembraneSlabParameters) -> RxnResult<Network> {
    if params.cells_per_side == 0 || params.bulk_layers == 0 {
        return Err(RxnError::Geometry(
            "the membrane box needs at least one cell per side and one bulk layer".to_string(),
        ));
    }
    let nm = Unit::parse("nm")?;
    let xy = Quantity::linspace(
        -params.half_width,
        params.half_width,
        params.cells_per_side + 1,
        &nm,
    );
    let periodic = [true, true, false];
    let top = params.slab_thickness + params.bulk_height;

    let lower_z = Quantity::linspace(-params.slab_thickness, 0.0, 2, &nm);
    let upper_z = Quantity::linspace(0.0, params.slab_thickness, 2, &nm);
    let bulk_z = Quantity::linspace(params.slab_thickness, top, params.bulk_layers + 1, &nm);

    let mut lower = CompartmentArray::three_d(
        LOWER_SLAB,
        &xy,
        &xy,
        &lower_z,
        drug_ficks(params.d_slab)?,
        periodic,
    )?;
    let mut upper = CompartmentArray::three_d(
        UPPER_SLAB,
        &xy,
        &xy,
        &upper_z,
        drug_ficks(params.d_slab)?,
        periodic,
    )?;
    let between = Connection::isotropic([("drug", Quantity::new(params.k_between_slabs, "1/s")?)])?;
    lower.join3d(&mut upper, between, "z+".parse()?)?;

    let mut bulk = CompartmentArray::three_d(
        BULK,
        &xy,
        &xy,
        &bulk_z,
        drug_ficks(params.d_bulk)?,
        periodic,
    )?;
    let (to_bulk, to_membrane) = params.k_slab_bulk;
    // joined from the bulk side, so the rates are (bulk -> membrane, membrane -> bulk)
    let slab_to_bulk = Connection::anisotropic([(
        "drug",
        SpeciesRate::from((
            Quantity::new(to_membrane, "1/s")?,
            Quantity::new(to_bulk, "1/s")?,
        )),
    )])?;
    bulk.join3d(&mut upper, slab_to_bulk, "z-".parse()?)?;

    let binding = Reaction::new(
        "binding",
        vec![Species::new("drug"), Species::new("receptor")],
        vec![Species::new("complex")],
        vec![1, 1],
        vec![1],
        Quantity::new(params.kon, "1/(M s)")?,
        Quantity::new(params.koff, "1/s")?,
    )?;
    lower.add_rxn_to_array(&binding);
    upper.add_rxn_to_array(&binding);

    let mut reservoirs = Vec::new();
    if params.bath_concentration > 0.0 {
        let c = Quantity::new(params.bath_concentration, "uM")?;
        let profiles = BTreeMap::from([(
            "drug".to_string(),
            ConcentrationProfile::constant(&c, 3)?,
        )]);
        reservoirs.push(Compartment::reservoir(BATH, profiles));

        let d = Quantity::new(params.d_bulk, "cm^2/s")?;
        let to_bath = Connection::reservoir([("drug", d)], 3, Some(Axis::Z))?;
        let top_layer = params.bulk_layers - 1;
        for i in 0..params.cells_per_side {
            for j in 0..params.cells_per_side {
                if let Some(c) = bulk.compartment_mut(&[i, j, top_layer]) {
                    c.connect(BATH, to_bath.clone(), true);
                }
            }
        }
    }

    let initial = (0..params.cells_per_side)
        .flat_map(|i| (0..params.cells_per_side).map(move |j| (i, j)))
        .filter(|_| params.receptors_per_cell > 0.0)
        .map(|(i, j)| {
            let id = make_id(Some(UPPER_SLAB), &(i, j, 0).into());
            InitialCount::new(id, "receptor", params.receptors_per_cell)
        })
        .collect();

    let model = Model::from_parts(vec![lower, upper, bulk], reservoirs)?;
    Ok(Network {
        model: model.flatten()?,
        initial,
        total_time: params.total_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use rsrxn_core::systems::{Kinetics, State};

    fn small() -> MembraneSlabParameters {
        MembraneSlabParameters {
            half_width: 10.0,
            cells_per_side: 4,
            bulk_height: 4.0,
            bulk_layers: 2,
            ..MembraneSlabParameters::default()
        }
    }

    #[test]
    fn layout() {
        let network = membrane_slab(&small()).unwrap();
        // 16 cells per layer, four layers and the bath
        assert_eq!(network.model.n_compartments(), 16 * 4 + 1);
        assert_eq!(network.initial.len(), 16);
        assert!(network.initial.iter().all(|c| c.species == "receptor"));

        let state = State::from_model(&network.model);
        assert_eq!(state.len(), 32 * 3 + 32);
        assert!(state.index_of(BATH, "drug").is_none());
    }

    #[test]
    fn membrane_to_bulk_rates() {
        let network = membrane_slab(&small()).unwrap();
        let upper = network.model.compartment("upper_slab-1_2_0").unwrap();
        assert_eq!(upper.connections["bulk-1_2_0"].rates("drug"), Some((1e-1, 1e-5)));
        let bulk = network.model.compartment("bulk-1_2_0").unwrap();
        assert_eq!(bulk.connections["upper_slab-1_2_0"].rates("drug"), Some((1e-5, 1e-1)));
    }

    #[test]
    fn bath_exchange() {
        let network = membrane_slab(&small()).unwrap();
        let top = network.model.compartment("bulk-0_0_1").unwrap();
        let (kv, _) = top.connections[BATH].rates("drug").unwrap();
        // D A / w with 1e-5 cm^2/s = 1e9 nm^2/s, 5 x 5 nm faces, 2 nm layers
        assert!(is_close!(kv, 1e9 * 25.0 / 2.0));

        let state = State::from_model(&network.model);
        let kinetics = Kinetics::new(&network.model, &state).unwrap();
        let sources = kinetics.processes.iter().filter(|p| p.source.is_some()).count();
        assert_eq!(sources, 16);
    }

    #[test]
    fn no_bath() {
        let params = MembraneSlabParameters {
            bath_concentration: 0.0,
            ..small()
        };
        let network = membrane_slab(&params).unwrap();
        assert_eq!(network.model.n_compartments(), 16 * 4);
    }

    #[test]
    fn binding_only_in_the_membrane() {
        let network = membrane_slab(&small()).unwrap();
        let lower = network.model.compartment("lower_slab-0_0_0").unwrap();
        assert_eq!(lower.reactions.len(), 1);
        assert!(network
            .model
            .compartment("bulk-0_0_0")
            .unwrap()
            .reactions
            .is_empty());
    }
}
