//! Regular 1D, 2D and 3D grids of compartments.
//!
//! A grid is described by its cell boundaries along each axis: `n + 1`
//! boundaries give `n` cells. Face neighbours are connected with the given
//! connection in the `+` direction and its reverse in the `-` direction, so
//! inside an array an anisotropic `(k_out, k_in)` pair describes flow along
//! the positive axis. Between arrays (`stack`, `join3d`) the pair describes
//! flow from the calling array into the other one.

use super::compartment::Compartment;
use super::id::{make_id, CompartmentKey};
use super::Axis;
use crate::connections::Connection;
use crate::errors::{RxnError, RxnResult};
use crate::reactions::Reaction;
use crate::units::{nm_pow, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The face of a 3D array along which another array is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Side {
    pub axis: Axis,
    pub positive: bool,
}

impl FromStr for Side {
    type Err = RxnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(axis), Some(sign), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(RxnError::Geometry(format!(
                "side must be one of x-, x+, y-, y+, z-, z+; got '{s}'"
            )));
        };
        let axis: Axis = axis.to_string().parse()?;
        let positive = match sign {
            '+' => true,
            '-' => false,
            _ => {
                return Err(RxnError::Geometry(format!(
                    "side must be one of x-, x+, y-, y+, z-, z+; got '{s}'"
                )))
            }
        };
        Ok(Self { axis, positive })
    }
}

impl TryFrom<String> for Side {
    type Error = RxnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        side.to_string()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.axis, if self.positive { '+' } else { '-' })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompartmentArray {
    array_id: String,
    /// Cell boundaries per axis, in nm
    boundaries: Vec<Vec<f64>>,
    periodic: Vec<bool>,
    compartments: BTreeMap<Vec<usize>, Compartment>,
    /// Neighbour pairs `(a, b)` where `b` lies in the `+` direction of `a`
    links: Vec<(Vec<usize>, Vec<usize>)>,
}

/// Every index of a grid with the given shape, in row-major order.
fn grid_indices(shape: &[usize]) -> Vec<Vec<usize>> {
    shape.iter().fold(vec![Vec::new()], |acc, &n| {
        acc.into_iter()
            .flat_map(|prefix| {
                (0..n).map(move |i| {
                    let mut idx = prefix.clone();
                    idx.push(i);
                    idx
                })
            })
            .collect()
    })
}

impl CompartmentArray {
    /// Builds a grid with one boundary list and one periodicity flag per axis.
    pub fn new(
        array_id: impl Into<String>,
        boundaries: &[&[Quantity]],
        connection: Connection,
        periodic: &[bool],
    ) -> RxnResult<Self> {
        let array_id = array_id.into();
        if boundaries.is_empty() || boundaries.len() > 3 {
            return Err(RxnError::Geometry(format!(
                "array {array_id}: 1 to 3 axes are supported, got {}",
                boundaries.len()
            )));
        }
        if boundaries.len() != periodic.len() {
            return Err(RxnError::Periodicity(format!(
                "array {array_id}: {} axes but {} periodicity flags",
                boundaries.len(),
                periodic.len()
            )));
        }

        let nm = nm_pow(1);
        let boundaries = boundaries
            .iter()
            .map(|axis| {
                let values = axis
                    .iter()
                    .map(|b| b.value_in(&nm))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.len() < 2 || values.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(RxnError::Geometry(format!(
                        "array {array_id}: boundaries must be at least two increasing values"
                    )));
                }
                Ok(values)
            })
            .collect::<RxnResult<Vec<_>>>()?;

        let shape: Vec<usize> = boundaries.iter().map(|b| b.len() - 1).collect();
        let mut compartments = BTreeMap::new();
        for idx in grid_indices(&shape) {
            let extents = idx
                .iter()
                .zip(&boundaries)
                .map(|(&i, b)| (b[i], b[i + 1]))
                .collect();
            let compartment = Compartment::new(CompartmentKey::Grid(idx.clone()))
                .with_array_id(array_id.as_str())
                .with_extents_nm(extents)?;
            compartments.insert(idx, compartment);
        }

        let mut links = Vec::new();
        for idx in compartments.keys() {
            for (axis, &n) in shape.iter().enumerate() {
                if idx[axis] + 1 < n {
                    let mut next = idx.clone();
                    next[axis] += 1;
                    links.push((idx.clone(), next));
                } else if periodic[axis] && n > 2 {
                    // Wrap the last cell onto the first; with two cells they
                    // are already neighbours
                    let mut first = idx.clone();
                    first[axis] = 0;
                    links.push((idx.clone(), first));
                }
            }
        }

        let mut array = Self {
            array_id,
            boundaries,
            periodic: periodic.to_vec(),
            compartments,
            links,
        };
        array.connect_links(&connection, true);
        Ok(array)
    }

    pub fn one_d(
        array_id: impl Into<String>,
        x: &[Quantity],
        connection: Connection,
        periodic: bool,
    ) -> RxnResult<Self> {
        Self::new(array_id, &[x], connection, &[periodic])
    }

    pub fn two_d(
        array_id: impl Into<String>,
        x: &[Quantity],
        y: &[Quantity],
        connection: Connection,
        periodic: [bool; 2],
    ) -> RxnResult<Self> {
        Self::new(array_id, &[x, y], connection, &periodic)
    }

    pub fn three_d(
        array_id: impl Into<String>,
        x: &[Quantity],
        y: &[Quantity],
        z: &[Quantity],
        connection: Connection,
        periodic: [bool; 3],
    ) -> RxnResult<Self> {
        Self::new(array_id, &[x, y, z], connection, &periodic)
    }

    fn connect_links(&mut self, connection: &Connection, warn_overwrite: bool) {
        let reverse = connection.reverse();
        for (a, b) in self.links.clone() {
            let id_a = self.flat_id(&a);
            let id_b = self.flat_id(&b);
            if let Some(c) = self.compartments.get_mut(&a) {
                c.connect(id_b, connection.clone(), warn_overwrite);
            }
            if let Some(c) = self.compartments.get_mut(&b) {
                c.connect(id_a, reverse.clone(), warn_overwrite);
            }
        }
    }

    fn flat_id(&self, idx: &[usize]) -> String {
        make_id(Some(&self.array_id), &CompartmentKey::Grid(idx.to_vec()))
    }

    /// Grid index of a flat id belonging to this array.
    pub fn index_of(&self, flat_id: &str) -> Option<Vec<usize>> {
        let key = flat_id.strip_prefix(&self.array_id)?.strip_prefix('-')?;
        let idx = key
            .split('_')
            .map(|s| s.parse().ok())
            .collect::<Option<Vec<usize>>>()?;
        self.compartments.contains_key(&idx).then_some(idx)
    }

    pub fn array_id(&self) -> &str {
        &self.array_id
    }

    pub fn dim(&self) -> usize {
        self.boundaries.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.boundaries.iter().map(|b| b.len() - 1).collect()
    }

    pub fn n_compartments(&self) -> usize {
        self.compartments.len()
    }

    pub fn periodic(&self) -> &[bool] {
        &self.periodic
    }

    /// Length of the array along each axis, in nm.
    pub fn box_len(&self) -> Vec<f64> {
        self.boundaries
            .iter()
            .map(|b| b[b.len() - 1] - b[0])
            .collect()
    }

    pub fn boundaries(&self) -> &[Vec<f64>] {
        &self.boundaries
    }

    pub fn compartment(&self, idx: &[usize]) -> Option<&Compartment> {
        self.compartments.get(idx)
    }

    pub fn compartment_mut(&mut self, idx: &[usize]) -> Option<&mut Compartment> {
        self.compartments.get_mut(idx)
    }

    pub fn compartments(&self) -> impl Iterator<Item = &Compartment> {
        self.compartments.values()
    }

    pub fn compartments_mut(&mut self) -> impl Iterator<Item = &mut Compartment> {
        self.compartments.values_mut()
    }

    pub fn add_rxn_to_array(&mut self, rxn: &Reaction) {
        for c in self.compartments.values_mut() {
            c.add_rxn_to_compartment(rxn.clone());
        }
    }

    pub fn add_rxns_to_array(&mut self, rxns: &[Reaction]) {
        for rxn in rxns {
            self.add_rxn_to_array(rxn);
        }
    }

    /// Replaces every connection between cells of this array.
    pub fn change_all_intra_connection_type(&mut self, connection: Connection) {
        self.connect_links(&connection, false);
    }

    /// Replaces every connection between this array and `other`. Links from
    /// this array use `connection`, links back use its reverse.
    pub fn change_all_inter_connection_type(
        &mut self,
        other: &mut CompartmentArray,
        connection: Connection,
    ) {
        let reverse = connection.reverse();
        let mut pairs = Vec::new();
        for (idx, c) in &self.compartments {
            for target in c.connections.keys() {
                if let Some(other_idx) = other.index_of(target) {
                    pairs.push((idx.clone(), other_idx));
                }
            }
        }
        for (idx, other_idx) in pairs {
            let self_id = self.flat_id(&idx);
            let other_id = other.flat_id(&other_idx);
            if let Some(c) = self.compartments.get_mut(&idx) {
                c.connect(other_id, connection.clone(), false);
            }
            if let Some(c) = other.compartments.get_mut(&other_idx) {
                c.connect(self_id, reverse.clone(), false);
            }
        }
    }

    fn link_arrays(
        &mut self,
        other: &mut CompartmentArray,
        pairs: Vec<(Vec<usize>, Vec<usize>)>,
        connection: &Connection,
    ) {
        let reverse = connection.reverse();
        for (idx, other_idx) in pairs {
            let self_id = self.flat_id(&idx);
            let other_id = other.flat_id(&other_idx);
            if let Some(c) = self.compartments.get_mut(&idx) {
                c.connect(other_id, connection.clone(), true);
            }
            if let Some(c) = other.compartments.get_mut(&other_idx) {
                c.connect(self_id, reverse.clone(), true);
            }
        }
    }

    /// Stacks `other` on top of this 1D or 2D array, linking cells with the
    /// same index.
    pub fn stack(&mut self, other: &mut CompartmentArray, connection: Connection) -> RxnResult<()> {
        if self.dim() > 2 || self.dim() != other.dim() {
            return Err(RxnError::Geometry(format!(
                "only 1D or 2D arrays of the same dimension can be stacked ({} and {})",
                self.array_id, other.array_id
            )));
        }
        if self.shape() != other.shape() {
            return Err(RxnError::Geometry(format!(
                "array {} has shape {:?} but {} has shape {:?}",
                self.array_id,
                self.shape(),
                other.array_id,
                other.shape()
            )));
        }
        let pairs = self.compartments.keys().map(|k| (k.clone(), k.clone())).collect();
        self.link_arrays(other, pairs, &connection);
        Ok(())
    }

    /// Joins `other` to the `side` face of this 3D array. The opposite face
    /// of `other` is the one linked.
    pub fn join3d(
        &mut self,
        other: &mut CompartmentArray,
        connection: Connection,
        side: Side,
    ) -> RxnResult<()> {
        if self.dim() != 3 || other.dim() != 3 {
            return Err(RxnError::Geometry(format!(
                "join3d needs two 3D arrays ({} and {})",
                self.array_id, other.array_id
            )));
        }
        let axis = side.axis.index();
        let face = |shape: Vec<usize>| -> Vec<usize> {
            shape
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != axis)
                .map(|(_, n)| n)
                .collect()
        };
        let (self_shape, other_shape) = (self.shape(), other.shape());
        if face(self_shape.clone()) != face(other_shape.clone()) {
            return Err(RxnError::Geometry(format!(
                "dimensions of arrays don't match along {side}: {:?} {:?}",
                face(self_shape),
                face(other_shape)
            )));
        }

        let (self_layer, other_layer) = if side.positive {
            (self_shape[axis] - 1, 0)
        } else {
            (0, other_shape[axis] - 1)
        };
        let pairs = self
            .compartments
            .keys()
            .filter(|idx| idx[axis] == self_layer)
            .map(|idx| {
                let mut other_idx = idx.clone();
                other_idx[axis] = other_layer;
                (idx.clone(), other_idx)
            })
            .collect();
        self.link_arrays(other, pairs, &connection);
        Ok(())
    }
}
