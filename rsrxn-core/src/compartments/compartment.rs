//! A single compartment: a region with reactions and outgoing connections.

use super::id::{make_id, CompartmentKey};
use super::Axis;
use crate::connections::Connection;
use crate::errors::{RxnError, RxnResult};
use crate::reactions::Reaction;
use crate::units::{nm_pow, Quantity, AVOGADRO, MOLAR, SECOND};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Litres per cubic nanometre.
const LITRES_PER_NM3: f64 = 1e-24;

/// A compartment volume in `nm^dim`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub value: f64,
    pub dim: u8,
}

impl Volume {
    /// The volume in litres, only defined for three-dimensional compartments.
    pub fn litres(&self) -> Option<f64> {
        (self.dim == 3).then_some(self.value * LITRES_PER_NM3)
    }

    pub fn quantity(&self) -> Quantity {
        Quantity::with_unit(self.value, nm_pow(self.dim as i8))
    }
}

/// Concentration of a reservoir species over time, in molecules per `nm^dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConcentrationProfile {
    Constant(f64),
    /// `(time in s, concentration)` points, linearly interpolated and held
    /// constant outside their range.
    Piecewise(Vec<(f64, f64)>),
}

fn number_density(c: &Quantity, dim: u8) -> RxnResult<f64> {
    if !(1..=3).contains(&dim) {
        return Err(RxnError::InvalidQuantity(format!(
            "concentrations are defined in 1, 2 or 3 dimensions, got {dim}"
        )));
    }
    if dim == 3 && c.is_compatible(&MOLAR) {
        return Ok(c.value_in(&MOLAR)? * AVOGADRO * LITRES_PER_NM3);
    }
    Ok(c.value_in(&nm_pow(-(dim as i8)))?)
}

impl ConcentrationProfile {
    /// A constant concentration, given as a molarity (3D only) or as a
    /// number density `1/L^dim`.
    pub fn constant(c: &Quantity, dim: u8) -> RxnResult<Self> {
        Ok(Self::Constant(number_density(c, dim)?))
    }

    pub fn piecewise(points: &[(Quantity, Quantity)], dim: u8) -> RxnResult<Self> {
        if points.is_empty() {
            return Err(RxnError::InvalidQuantity(
                "a concentration profile needs at least one point".to_string(),
            ));
        }
        let mut converted = points
            .iter()
            .map(|(t, c)| Ok((t.value_in(&SECOND)?, number_density(c, dim)?)))
            .collect::<RxnResult<Vec<_>>>()?;
        converted.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self::Piecewise(converted))
    }

    pub fn at(&self, t: f64) -> f64 {
        match self {
            Self::Constant(c) => *c,
            Self::Piecewise(points) => {
                let (first, last) = match (points.first(), points.last()) {
                    (Some(first), Some(last)) => (first, last),
                    _ => return 0.0,
                };
                if t <= first.0 {
                    return first.1;
                }
                if t >= last.0 {
                    return last.1;
                }
                let upper = points.partition_point(|(ti, _)| *ti <= t);
                let (t0, c0) = points[upper - 1];
                let (t1, c1) = points[upper];
                c0 + (c1 - c0) * (t - t0) / (t1 - t0)
            }
        }
    }

    /// Times at which the slope of the profile changes.
    pub fn breakpoints(&self) -> Vec<f64> {
        match self {
            Self::Constant(_) => Vec::new(),
            Self::Piecewise(points) => points.iter().map(|(t, _)| *t).collect(),
        }
    }

    /// Largest concentration reached in `[from, to]`.
    pub fn max_between(&self, from: f64, to: f64) -> f64 {
        let inner = self
            .breakpoints()
            .into_iter()
            .filter(|t| *t > from && *t < to)
            .map(|t| self.at(t));
        inner.fold(self.at(from).max(self.at(to)), f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompartmentKind {
    Regular,
    /// Concentrations are prescribed in time and are not part of the state.
    Reservoir {
        profiles: BTreeMap<String, ConcentrationProfile>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compartment {
    pub key: CompartmentKey,
    pub array_id: Option<String>,
    pub kind: CompartmentKind,
    /// `(lower, upper)` boundaries per axis in nm
    pub extents: Vec<(f64, f64)>,
    volume: Option<Volume>,
    face_areas: BTreeMap<Axis, f64>,
    pub reactions: Vec<Reaction>,
    /// Outgoing connections keyed by the flat id of the target
    pub connections: IndexMap<String, Connection>,
}

impl Compartment {
    pub fn new(key: impl Into<CompartmentKey>) -> Self {
        Self {
            key: key.into(),
            array_id: None,
            kind: CompartmentKind::Regular,
            extents: Vec::new(),
            volume: None,
            face_areas: BTreeMap::new(),
            reactions: Vec::new(),
            connections: IndexMap::new(),
        }
    }

    pub fn reservoir(
        key: impl Into<CompartmentKey>,
        profiles: BTreeMap<String, ConcentrationProfile>,
    ) -> Self {
        Self {
            kind: CompartmentKind::Reservoir { profiles },
            ..Self::new(key)
        }
    }

    pub fn with_array_id(mut self, array_id: impl Into<String>) -> Self {
        self.array_id = Some(array_id.into());
        self
    }

    /// Sets the boundaries along each axis (x, then y, then z).
    pub fn with_extents(mut self, extents: &[(Quantity, Quantity)]) -> RxnResult<Self> {
        let nm = nm_pow(1);
        let extents = extents
            .iter()
            .map(|(lo, hi)| Ok((lo.value_in(&nm)?, hi.value_in(&nm)?)))
            .collect::<RxnResult<Vec<_>>>()?;
        self.extents = check_extents(extents)?;
        Ok(self)
    }

    pub(crate) fn with_extents_nm(mut self, extents: Vec<(f64, f64)>) -> RxnResult<Self> {
        self.extents = check_extents(extents)?;
        Ok(self)
    }

    /// Overrides the volume; any `L^d` quantity with d in 1..=3 is accepted.
    pub fn with_volume(mut self, volume: &Quantity) -> RxnResult<Self> {
        let dim = volume.dimension();
        if dim.mass != 0 || dim.time != 0 || dim.amount != 0 || !(1..=3).contains(&dim.length) {
            return Err(RxnError::InvalidQuantity(format!(
                "compartment volume must be a length, area or volume, got {}",
                volume.unit
            )));
        }
        let d = dim.length as u8;
        self.volume = Some(Volume {
            value: volume.value_in(&nm_pow(dim.length))?,
            dim: d,
        });
        Ok(self)
    }

    /// Overrides the area of the faces normal to `axis`.
    pub fn with_face_area(mut self, axis: Axis, area: &Quantity) -> RxnResult<Self> {
        let dim = area.dimension();
        if dim.mass != 0 || dim.time != 0 || dim.amount != 0 || !(0..=2).contains(&dim.length) {
            return Err(RxnError::InvalidQuantity(format!(
                "face area must be an area, got {}",
                area.unit
            )));
        }
        self.face_areas
            .insert(axis, area.value_in(&nm_pow(dim.length))?);
        Ok(self)
    }

    pub fn id(&self) -> String {
        make_id(self.array_id.as_deref(), &self.key)
    }

    pub fn is_reservoir(&self) -> bool {
        matches!(self.kind, CompartmentKind::Reservoir { .. })
    }

    /// Concentration profile of a reservoir species.
    pub fn profile(&self, species: &str) -> Option<&ConcentrationProfile> {
        match &self.kind {
            CompartmentKind::Reservoir { profiles } => profiles.get(species),
            CompartmentKind::Regular => None,
        }
    }

    /// Number of spatial axes with known extents.
    pub fn dim(&self) -> usize {
        self.extents.len()
    }

    pub fn width(&self, axis: Axis) -> Option<f64> {
        self.extents.get(axis.index()).map(|(lo, hi)| hi - lo)
    }

    pub fn center(&self) -> [Option<f64>; 3] {
        let mut center = [None; 3];
        for (c, (lo, hi)) in center.iter_mut().zip(&self.extents) {
            *c = Some(0.5 * (lo + hi));
        }
        center
    }

    /// Explicit volume, or the product of the extents.
    pub fn volume(&self) -> Option<Volume> {
        if let Some(v) = self.volume {
            return Some(v);
        }
        if self.extents.is_empty() {
            return None;
        }
        Some(Volume {
            value: self.extents.iter().map(|(lo, hi)| hi - lo).product(),
            dim: self.extents.len() as u8,
        })
    }

    /// Area of the faces normal to `axis`, in `nm^(dim-1)`.
    pub fn face_area(&self, axis: Axis) -> Option<f64> {
        if let Some(area) = self.face_areas.get(&axis) {
            return Some(*area);
        }
        if axis.index() >= self.extents.len() {
            return None;
        }
        Some(
            self.extents
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != axis.index())
                .map(|(_, (lo, hi))| hi - lo)
                .product(),
        )
    }

    /// Adds a reaction unless one with the same id is already present.
    pub fn add_rxn_to_compartment(&mut self, rxn: Reaction) {
        if self.reactions.iter().any(|r| r.id == rxn.id) {
            log::warn!("Reaction {} already in compartment {}", rxn.id, self.id());
        } else {
            self.reactions.push(rxn);
        }
    }

    pub fn add_rxns<I: IntoIterator<Item = Reaction>>(&mut self, rxns: I) {
        for rxn in rxns {
            self.add_rxn_to_compartment(rxn);
        }
    }

    pub fn show_all_rxns(&self) -> Vec<String> {
        self.reactions.iter().map(Reaction::display).collect()
    }

    /// Connects this compartment to the compartment with flat id `other_id`.
    pub fn connect(
        &mut self,
        other_id: impl Into<String>,
        connection: Connection,
        warn_overwrite: bool,
    ) {
        let other_id = other_id.into();
        if warn_overwrite && self.connections.contains_key(&other_id) {
            log::warn!(
                "Overwriting connection between {} and {}",
                self.id(),
                other_id
            );
        }
        self.connections.insert(other_id, connection);
    }

    pub fn connect_to(&mut self, other: &Compartment, connection: Connection) {
        self.connect(other.id(), connection, true);
    }

    pub fn remove_connection(&mut self, other_id: &str) -> RxnResult<Connection> {
        self.connections.shift_remove(other_id).ok_or_else(|| {
            log::warn!(
                "Connection to remove between {} and {} does not exist",
                self.id(),
                other_id
            );
            RxnError::MissingConnection {
                from: self.id(),
                to: other_id.to_string(),
            }
        })
    }

    /// A copy under a new key, optionally detached from its array.
    pub fn copy_as(&self, key: impl Into<CompartmentKey>, drop_array_id: bool) -> Self {
        let mut copy = self.clone();
        copy.key = key.into();
        if drop_array_id {
            copy.array_id = None;
        }
        copy
    }

    /// Species that take part in a reaction or a connection here.
    pub fn species_ids(&self) -> BTreeSet<String> {
        let mut species: BTreeSet<String> = self
            .reactions
            .iter()
            .flat_map(|r| r.species_ids().map(str::to_string).collect::<Vec<_>>())
            .collect();
        for conn in self.connections.values() {
            species.extend(conn.species().into_iter().map(str::to_string));
        }
        species
    }
}

fn check_extents(extents: Vec<(f64, f64)>) -> RxnResult<Vec<(f64, f64)>> {
    if extents.len() > 3 {
        return Err(RxnError::Geometry(format!(
            "at most three axes are supported, got {}",
            extents.len()
        )));
    }
    if let Some((lo, hi)) = extents.iter().find(|(lo, hi)| hi <= lo) {
        return Err(RxnError::Geometry(format!(
            "compartment boundaries must be increasing, got ({lo}, {hi})"
        )));
    }
    Ok(extents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactions::Species;
    use is_close::is_close;

    fn q(value: f64, unit: &str) -> Quantity {
        Quantity::new(value, unit).unwrap()
    }

    fn degradation() -> Reaction {
        Reaction::irreversible(
            "deg",
            vec![Species::new("A")],
            vec![],
            vec![1],
            vec![],
            q(0.1, "1/s"),
        )
        .unwrap()
    }

    fn box_compartment() -> Compartment {
        Compartment::new("box")
            .with_extents(&[
                (q(0.0, "nm"), q(2.0, "nm")),
                (q(0.0, "nm"), q(3.0, "nm")),
                (q(0.0, "nm"), q(4.0, "nm")),
            ])
            .unwrap()
    }

    #[test]
    fn geometry_from_extents() {
        let c = box_compartment();
        let v = c.volume().unwrap();
        assert_eq!(v.dim, 3);
        assert!(is_close!(v.value, 24.0));
        assert!(is_close!(v.litres().unwrap(), 24e-24));
        assert!(is_close!(c.face_area(Axis::X).unwrap(), 12.0));
        assert!(is_close!(c.face_area(Axis::Z).unwrap(), 6.0));
        assert_eq!(c.center(), [Some(1.0), Some(1.5), Some(2.0)]);
    }

    #[test]
    fn extents_in_other_units() {
        let c = Compartment::new("line")
            .with_extents(&[(q(0.0, "um"), q(1.0, "um"))])
            .unwrap();
        assert!(is_close!(c.volume().unwrap().value, 1000.0));
        assert!(is_close!(c.face_area(Axis::X).unwrap(), 1.0));
        assert_eq!(c.face_area(Axis::Y), None);
        assert_eq!(c.center(), [Some(500.0), None, None]);
    }

    #[test]
    fn explicit_volume_and_face_area() {
        let c = box_compartment()
            .with_volume(&q(1.0, "L"))
            .unwrap()
            .with_face_area(Axis::X, &q(1.0, "um^2"))
            .unwrap();
        assert!(is_close!(c.volume().unwrap().value, 1e24));
        assert!(is_close!(c.face_area(Axis::X).unwrap(), 1e6));
        assert!(Compartment::new("bad").with_volume(&q(1.0, "s")).is_err());
    }

    #[test]
    fn no_geometry_no_volume() {
        let c = Compartment::new("main");
        assert_eq!(c.volume(), None);
        assert_eq!(c.dim(), 0);
    }

    #[test]
    fn decreasing_boundaries_rejected() {
        let res = Compartment::new("bad").with_extents(&[(q(1.0, "nm"), q(0.0, "nm"))]);
        assert!(matches!(res, Err(RxnError::Geometry(_))));
    }

    #[test]
    fn duplicate_reactions_skipped() {
        let mut c = Compartment::new("main");
        c.add_rxns([degradation(), degradation()]);
        assert_eq!(c.reactions.len(), 1);
        assert_eq!(c.show_all_rxns(), vec!["A ---> // kf = 0.1 / s".to_string()]);
        assert_eq!(c.species_ids().into_iter().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn connections() {
        let mut a = Compartment::new(0usize).with_array_id("main");
        let b = Compartment::new(1usize).with_array_id("main");
        let conn = Connection::isotropic([("B", q(1.0, "1/s"))]).unwrap();
        a.connect_to(&b, conn.clone());
        assert!(a.connections.contains_key("main-1"));
        assert!(a.species_ids().contains("B"));

        a.connect("main-1", conn, false);
        assert_eq!(a.connections.len(), 1);

        assert!(a.remove_connection("main-1").is_ok());
        assert!(matches!(
            a.remove_connection("main-1"),
            Err(RxnError::MissingConnection { .. })
        ));
    }

    #[test]
    fn copy_as_detaches_from_array() {
        let c = Compartment::new(3usize).with_array_id("main");
        assert_eq!(c.id(), "main-3");
        let copy = c.copy_as("main-3", true);
        assert_eq!(copy.id(), "main-3");
        assert_eq!(copy.array_id, None);
    }

    #[test]
    fn reservoir_profiles() {
        let molar = ConcentrationProfile::constant(&q(1.0, "M"), 3).unwrap();
        // 1 M = 6.022e23 / 1e24 nm^-3
        assert!(is_close!(molar.at(10.0), 0.6022));

        let linear = ConcentrationProfile::piecewise(
            &[(q(10.0, "s"), q(2.0, "1/nm")), (q(0.0, "s"), q(0.0, "1/nm"))],
            1,
        )
        .unwrap();
        assert!(is_close!(linear.at(-1.0), 0.0));
        assert!(is_close!(linear.at(2.5), 0.5));
        assert!(is_close!(linear.at(20.0), 2.0));
        assert_eq!(linear.breakpoints(), vec![0.0, 10.0]);
        assert!(is_close!(linear.max_between(1.0, 5.0), 1.0));
        assert!(is_close!(linear.max_between(-5.0, 50.0), 2.0));

        let pulse = ConcentrationProfile::Piecewise(vec![(0.0, 0.0), (1.0, 4.0), (2.0, 0.0)]);
        assert!(is_close!(pulse.max_between(0.5, 1.5), 4.0));
        assert!(is_close!(pulse.max_between(1.5, 3.0), 2.0));

        assert!(ConcentrationProfile::constant(&q(1.0, "M"), 1).is_err());
        assert!(ConcentrationProfile::constant(&q(1.0, "1/nm^3"), 0).is_err());
        assert!(ConcentrationProfile::constant(&q(1.0, "1/nm^3"), 200).is_err());

        let mut profiles = BTreeMap::new();
        profiles.insert("drug".to_string(), molar);
        let res = Compartment::reservoir("top", profiles);
        assert!(res.is_reservoir());
        assert!(res.profile("drug").is_some());
        assert_eq!(res.profile("drug").map(|p| p.at(0.0) > 0.0), Some(true));
    }
}
