//! Elementary processes shared by the deterministic and stochastic systems.
//!
//! Every reaction direction and every transport link becomes a [`Process`]:
//! a rate in 1/s, the quantities its propensity depends on and the change it
//! makes to the state when it fires once.

use super::state::State;
use crate::compartments::{Compartment, ConcentrationProfile};
use crate::connections::Connection;
use crate::errors::{RxnError, RxnResult};
use crate::model::FlatModel;
use crate::reactions::{RateConstant, RateLaw, Reaction};
use crate::units::AVOGADRO;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    /// Rate in 1/s once the volume scaling has been applied
    pub rate: f64,
    /// `(state index, count)` consumed per event
    pub inputs: Vec<(usize, u32)>,
    /// `(state index, change)` per event
    pub deltas: Vec<(usize, i64)>,
    /// Reservoir concentration multiplying the rate of a source
    pub source: Option<ConcentrationProfile>,
}

/// `n (n-1) ... (n-k+1)`, the number of ordered ways to pick `k` molecules.
fn falling_factorial(n: f64, k: u32) -> f64 {
    (0..k).map(|j| (n - f64::from(j)).max(0.0)).product()
}

impl Process {
    fn source_factor(&self, t: f64) -> f64 {
        self.source.as_ref().map_or(1.0, |profile| profile.at(t))
    }

    /// Deterministic rate `k * Π q^n`.
    pub fn mass_action(&self, q: &[f64], t: f64) -> f64 {
        let product: f64 = self
            .inputs
            .iter()
            .map(|&(idx, n)| q[idx].powi(n as i32))
            .product();
        self.rate * product * self.source_factor(t)
    }

    fn combinations(&self, q: &[f64]) -> f64 {
        self.inputs
            .iter()
            .map(|&(idx, n)| falling_factorial(q[idx], n))
            .product()
    }

    /// Stochastic propensity, counting distinct molecule combinations.
    pub fn propensity(&self, q: &[f64], t: f64) -> f64 {
        self.rate * self.combinations(q) * self.source_factor(t)
    }

    /// Upper bound on the propensity over `[from, to]` while `q` is unchanged.
    pub fn propensity_bound(&self, q: &[f64], from: f64, to: f64) -> f64 {
        let source = self
            .source
            .as_ref()
            .map_or(1.0, |profile| profile.max_between(from, to));
        self.rate * self.combinations(q) * source
    }

    pub fn is_time_dependent(&self) -> bool {
        matches!(self.source, Some(ConcentrationProfile::Piecewise(_)))
    }
}

/// Sums repeated indices and drops zero net changes.
fn merge<T>(entries: impl IntoIterator<Item = (usize, T)>) -> Vec<(usize, T)>
where
    T: Copy + Default + PartialEq + std::ops::Add<Output = T>,
{
    let mut merged: BTreeMap<usize, T> = BTreeMap::new();
    for (idx, value) in entries {
        let entry = merged.entry(idx).or_default();
        *entry = *entry + value;
    }
    merged
        .into_iter()
        .filter(|(_, value)| *value != T::default())
        .collect()
}

/// The processes of a flat model laid out on a state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Kinetics {
    pub processes: Vec<Process>,
    /// For each state index, the processes whose propensity reads it
    pub dependents: Vec<Vec<usize>>,
}

impl Kinetics {
    pub fn new(model: &FlatModel, state: &State) -> RxnResult<Self> {
        let mut builder = Builder {
            model,
            state,
            processes: Vec::new(),
        };
        for (id, c) in model.compartments() {
            if c.is_reservoir() {
                if !c.reactions.is_empty() {
                    log::debug!("Skipping reactions in reservoir {id}");
                }
                continue;
            }
            for rxn in &c.reactions {
                builder.reaction(id, c, rxn)?;
            }
        }
        for (id, c) in model.compartments() {
            for (target, conn) in &c.connections {
                builder.link(id, c, target, conn)?;
            }
        }

        let processes = builder.processes;
        let mut dependents = vec![Vec::new(); state.len()];
        for (p, process) in processes.iter().enumerate() {
            for &(idx, _) in &process.inputs {
                dependents[idx].push(p);
            }
        }
        log::debug!(
            "Built {} processes over {} state entries",
            processes.len(),
            state.len()
        );
        Ok(Self {
            processes,
            dependents,
        })
    }

    pub fn n_processes(&self) -> usize {
        self.processes.len()
    }
}

struct Builder<'a> {
    model: &'a FlatModel,
    state: &'a State,
    processes: Vec<Process>,
}

impl Builder<'_> {
    fn index(&self, compartment: &str, species: &str) -> RxnResult<usize> {
        self.state.index_of(compartment, species).ok_or_else(|| {
            RxnError::Error(format!(
                "species {species} in compartment {compartment} is not part of the state"
            ))
        })
    }

    fn reaction(&mut self, id: &str, c: &Compartment, rxn: &Reaction) -> RxnResult<()> {
        let sides = [
            (&rxn.kf, &rxn.reactants, &rxn.stoich_r, &rxn.products, &rxn.stoich_p),
            (&rxn.kr, &rxn.products, &rxn.stoich_p, &rxn.reactants, &rxn.stoich_r),
        ];
        for (k, consumed, n_consumed, produced, n_produced) in sides {
            if !k.is_active() {
                continue;
            }
            let rate = effective_rate(k, c, &rxn.id)?;
            let inputs = consumed
                .iter()
                .zip(n_consumed)
                .map(|(s, &n)| Ok((self.index(id, &s.id)?, n)))
                .collect::<RxnResult<Vec<_>>>()?;
            let removed = inputs.iter().map(|&(idx, n)| (idx, -i64::from(n)));
            let added = produced
                .iter()
                .zip(n_produced)
                .map(|(s, &n)| Ok((self.index(id, &s.id)?, i64::from(n))))
                .collect::<RxnResult<Vec<_>>>()?;
            self.processes.push(Process {
                rate,
                inputs: merge(inputs.iter().copied()),
                deltas: merge(removed.chain(added)),
                source: None,
            });
        }
        Ok(())
    }

    fn link(&mut self, id: &str, c: &Compartment, target: &str, conn: &Connection) -> RxnResult<()> {
        let model = self.model;
        let other = model
            .compartment(target)
            .ok_or_else(|| RxnError::MissingCompartment(target.to_string()))?;
        let back = other.connections.get(id);

        for species in conn.species() {
            let (k_out, k_in) = conn.rates(species).ok_or_else(|| {
                RxnError::InvalidConnection(format!(
                    "{} connection from {id} to {target} has not been resolved",
                    conn.kind()
                ))
            })?;
            let has_back_link = back.is_some_and(|b| b.rates(species).is_some());

            match (c.is_reservoir(), other.is_reservoir()) {
                (true, true) => {}
                (false, false) => {
                    let from = self.index(id, species)?;
                    let to = self.index(target, species)?;
                    self.transfer(from, to, k_out, conn, c)?;
                    if !has_back_link {
                        self.transfer(to, from, k_in, conn, other)?;
                    }
                }
                (false, true) => {
                    let idx = self.index(id, species)?;
                    self.exchange(idx, c, other, species, k_out, k_in, conn)?;
                }
                (true, false) => {
                    // Handled from the regular side when it links back
                    if !has_back_link {
                        let idx = self.index(target, species)?;
                        self.exchange(idx, other, c, species, k_in, k_out, conn)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// First-order transport of one molecule from `from` to `to`.
    fn transfer(
        &mut self,
        from: usize,
        to: usize,
        k: f64,
        conn: &Connection,
        source: &Compartment,
    ) -> RxnResult<()> {
        if k <= 0.0 {
            return Ok(());
        }
        self.processes.push(Process {
            rate: per_molecule(k, conn, source)?,
            inputs: vec![(from, 1)],
            deltas: vec![(from, -1), (to, 1)],
            source: None,
        });
        Ok(())
    }

    /// Exchange between a regular compartment and a reservoir: a sink with
    /// `k_out / V` and a source with `kV_in * C(t)`.
    #[allow(clippy::too_many_arguments)]
    fn exchange(
        &mut self,
        idx: usize,
        regular: &Compartment,
        reservoir: &Compartment,
        species: &str,
        k_out: f64,
        k_in: f64,
        conn: &Connection,
    ) -> RxnResult<()> {
        if !conn.divides_by_volume() {
            return Err(RxnError::InvalidConnection(format!(
                "connection between {} and reservoir {} must be volume scaled, got {}",
                regular.id(),
                reservoir.id(),
                conn.kind()
            )));
        }
        if k_out > 0.0 {
            self.processes.push(Process {
                rate: per_molecule(k_out, conn, regular)?,
                inputs: vec![(idx, 1)],
                deltas: vec![(idx, -1)],
                source: None,
            });
        }
        match reservoir.profile(species) {
            Some(profile) if k_in > 0.0 => self.processes.push(Process {
                rate: k_in,
                inputs: Vec::new(),
                deltas: vec![(idx, 1)],
                source: Some(profile.clone()),
            }),
            Some(_) => {}
            None => log::warn!(
                "Reservoir {} has no concentration for {species}; treating it as a sink",
                reservoir.id()
            ),
        }
        Ok(())
    }
}

/// Turns a connection rate into 1/s, dividing by the source volume when needed.
fn per_molecule(k: f64, conn: &Connection, source: &Compartment) -> RxnResult<f64> {
    if !conn.divides_by_volume() {
        return Ok(k);
    }
    let volume = source
        .volume()
        .ok_or_else(|| RxnError::MissingVolume(source.id()))?;
    if conn.dim() != Some(volume.dim) {
        return Err(RxnError::Geometry(format!(
            "compartment {} has a {}D volume but its connection rates are {}",
            source.id(),
            volume.dim,
            conn.rate_unit()
        )));
    }
    Ok(k / volume.value)
}

/// The rate constant of one reaction direction, as a count rate in 1/s.
///
/// Concentration based constants are divided by `(NA V)^(order-1)` and
/// length based ones by `V^(order-1)`.
fn effective_rate(k: &RateConstant, c: &Compartment, rxn_id: &str) -> RxnResult<f64> {
    let excess = k.order as i32 - 1;
    match k.law {
        RateLaw::PerSecond => Ok(k.value),
        RateLaw::Molar => {
            let volume = c.volume().ok_or_else(|| RxnError::MissingVolume(c.id()))?;
            let litres = volume.litres().ok_or_else(|| {
                RxnError::Geometry(format!(
                    "reaction {rxn_id} has a molar rate but compartment {} is {}D",
                    c.id(),
                    volume.dim
                ))
            })?;
            Ok(k.value / (AVOGADRO * litres).powi(excess))
        }
        RateLaw::Length { dim } => {
            let volume = c.volume().ok_or_else(|| RxnError::MissingVolume(c.id()))?;
            if volume.dim != dim {
                return Err(RxnError::Geometry(format!(
                    "reaction {rxn_id} has a rate in {} but compartment {} is {}D",
                    k.unit(),
                    c.id(),
                    volume.dim
                )));
            }
            Ok(k.value / volume.value.powi(excess))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartments::CompartmentArray;
    use crate::model::Model;
    use crate::reactions::Species;
    use crate::units::{Quantity, Unit};
    use is_close::is_close;

    fn q(value: f64, unit: &str) -> Quantity {
        Quantity::new(value, unit).unwrap()
    }

    fn nm(values: &[f64]) -> Vec<Quantity> {
        let unit = Unit::parse("nm").unwrap();
        values.iter().map(|v| Quantity::with_unit(*v, unit.clone())).collect()
    }

    fn cube(id: &str, side_nm: f64) -> Compartment {
        let side = (q(0.0, "nm"), q(side_nm, "nm"));
        Compartment::new(id)
            .with_extents(&[side.clone(), side.clone(), side])
            .unwrap()
    }

    fn kinetics(compartments: Vec<Compartment>) -> (Kinetics, State) {
        let flat = Model::from_parts(vec![], compartments).unwrap().flatten().unwrap();
        let state = State::from_model(&flat);
        (Kinetics::new(&flat, &state).unwrap(), state)
    }

    #[test]
    fn falling_factorials() {
        assert_eq!(falling_factorial(5.0, 0), 1.0);
        assert_eq!(falling_factorial(5.0, 2), 20.0);
        assert_eq!(falling_factorial(1.0, 2), 0.0);
        assert_eq!(falling_factorial(0.0, 1), 0.0);
    }

    #[test]
    fn reversible_dimerisation() {
        let rxn = Reaction::new(
            "dimer",
            vec![Species::new("A")],
            vec![Species::new("A2")],
            vec![2],
            vec![1],
            q(1e6, "1/(M s)"),
            q(0.5, "1/s"),
        )
        .unwrap();
        // 10 nm cube = 1e-21 L
        let mut c = cube("box", 10.0);
        c.add_rxn_to_compartment(rxn);
        let (kinetics, state) = kinetics(vec![c]);
        assert_eq!(kinetics.n_processes(), 2);

        let a = state.index_of("box", "A").unwrap();
        let a2 = state.index_of("box", "A2").unwrap();
        let forward = &kinetics.processes[0];
        assert!(is_close!(forward.rate, 1e6 / (AVOGADRO * 1e-21)));
        assert_eq!(forward.inputs, vec![(a, 2)]);
        assert_eq!(forward.deltas, vec![(a, -2), (a2, 1)]);

        let reverse = &kinetics.processes[1];
        assert_eq!(reverse.rate, 0.5);
        assert_eq!(reverse.inputs, vec![(a2, 1)]);

        let y = [3.0, 1.0];
        assert!(is_close!(forward.mass_action(&y, 0.0), forward.rate * 9.0));
        assert!(is_close!(forward.propensity(&y, 0.0), forward.rate * 6.0));
        assert_eq!(kinetics.dependents[a], vec![0]);
        assert_eq!(kinetics.dependents[a2], vec![1]);
    }

    #[test]
    fn molar_rate_needs_volume() {
        let rxn = Reaction::irreversible(
            "bind",
            vec![Species::new("A"), Species::new("B")],
            vec![Species::new("C")],
            vec![1, 1],
            vec![1],
            q(1.0, "1/(M s)"),
        )
        .unwrap();
        let mut c = Compartment::new("main");
        c.add_rxn_to_compartment(rxn);
        let flat = Model::from_parts(vec![], vec![c]).unwrap().flatten().unwrap();
        let state = State::from_model(&flat);
        assert!(matches!(
            Kinetics::new(&flat, &state),
            Err(RxnError::MissingVolume(id)) if id == "main"
        ));
    }

    #[test]
    fn length_rate_in_line() {
        let rxn = Reaction::irreversible(
            "ab",
            vec![Species::new("A"), Species::new("B")],
            vec![Species::new("D")],
            vec![1, 1],
            vec![1],
            q(4.0, "nm/s"),
        )
        .unwrap();
        let mut c = Compartment::new("seg")
            .with_extents(&[(q(0.0, "nm"), q(2.0, "nm"))])
            .unwrap();
        c.add_rxn_to_compartment(rxn);
        let (kinetics, _) = kinetics(vec![c]);
        assert!(is_close!(kinetics.processes[0].rate, 2.0));
    }

    #[test]
    fn symmetric_array_links() {
        let conn = Connection::isotropic([("A", q(0.5, "1/s"))]).unwrap();
        let array = CompartmentArray::one_d("line", &nm(&[0.0, 1.0, 2.0, 3.0]), conn, false).unwrap();
        let flat = Model::from_parts(vec![array], vec![]).unwrap().flatten().unwrap();
        let state = State::from_model(&flat);
        let kinetics = Kinetics::new(&flat, &state).unwrap();
        // two links, one process per direction
        assert_eq!(kinetics.n_processes(), 4);
        assert!(kinetics.processes.iter().all(|p| p.rate == 0.5));
        let total: i64 = kinetics
            .processes
            .iter()
            .flat_map(|p| p.deltas.iter().map(|(_, d)| d))
            .sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn one_way_link_gets_return_process() {
        let conn = Connection::anisotropic([(
            "A",
            crate::connections::SpeciesRate::from((q(2.0, "1/s"), q(1.0, "1/s"))),
        )])
        .unwrap();
        let mut left = Compartment::new("left");
        left.connect("right", conn, true);
        let (kinetics, state) = kinetics(vec![left, Compartment::new("right")]);
        let (l, r) = (state.index_of("left", "A").unwrap(), state.index_of("right", "A").unwrap());
        assert_eq!(kinetics.n_processes(), 2);
        assert_eq!(kinetics.processes[0].rate, 2.0);
        assert_eq!(kinetics.processes[0].deltas, vec![(l, -1), (r, 1)]);
        assert_eq!(kinetics.processes[1].rate, 1.0);
        assert_eq!(kinetics.processes[1].deltas, vec![(r, -1), (l, 1)]);
    }

    #[test]
    fn reservoir_exchange() {
        let conn = Connection::div_by_v([("A", q(100.0, "nm^3/s"))], 3).unwrap();
        let mut c = cube("cell", 10.0);
        c.connect("bath", conn, true);
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "A".to_string(),
            ConcentrationProfile::constant(&q(2.0, "1/nm^3"), 3).unwrap(),
        );
        let bath = Compartment::reservoir("bath", profiles);
        let (kinetics, state) = kinetics(vec![c, bath]);
        assert_eq!(state.len(), 1);
        assert_eq!(kinetics.n_processes(), 2);

        let sink = &kinetics.processes[0];
        assert!(is_close!(sink.rate, 0.1));
        assert_eq!(sink.deltas, vec![(0, -1)]);

        let source = &kinetics.processes[1];
        assert!(source.inputs.is_empty());
        assert!(is_close!(source.propensity(&[0.0], 0.0), 200.0));
    }

    #[test]
    fn reservoir_links_must_scale_with_volume() {
        let conn = Connection::isotropic([("A", q(1.0, "1/s"))]).unwrap();
        let mut c = Compartment::new("cell");
        c.connect("bath", conn, true);
        let flat = Model::from_parts(vec![], vec![c, Compartment::reservoir("bath", BTreeMap::new())])
            .unwrap()
            .flatten()
            .unwrap();
        let state = State::from_model(&flat);
        assert!(matches!(
            Kinetics::new(&flat, &state),
            Err(RxnError::InvalidConnection(_))
        ));
    }

    #[test]
    fn zeroth_order_birth() {
        let birth = Reaction::irreversible("birth", vec![], vec![Species::new("A")], vec![], vec![1], q(1.2, "1/s"))
            .unwrap();
        let mut c = Compartment::new("main");
        c.add_rxn_to_compartment(birth);
        let (kinetics, _) = kinetics(vec![c]);
        let p = &kinetics.processes[0];
        assert!(p.inputs.is_empty());
        assert_eq!(p.propensity(&[7.0], 0.0), 1.2);
    }
}
