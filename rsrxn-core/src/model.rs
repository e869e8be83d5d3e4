//! Models and flat models.
//!
//! A [`Model`] holds stand-alone compartments and compartment arrays. Before
//! it can be simulated or drawn it is flattened into a [`FlatModel`], which
//! only has compartments, keyed by their flat id (`{array}-{i_j_k}` for array
//! cells), and in which every diffusive connection has been turned into a
//! rate.

use crate::compartments::{Axis, Compartment, CompartmentArray};
use crate::connections::Connection;
use crate::errors::{RxnError, RxnResult};
use crate::reactions::Reaction;
use indexmap::IndexMap;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Positions closer than this (in nm) are treated as the same boundary.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Orthographic projection factors used when drawing 3D positions.
const PROJECTION_ALPHA: f64 = 0.7;
const PROJECTION_BETA: f64 = 1.2;

/// Which compartments an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    All,
    Ids(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    compartments: IndexMap<String, Compartment>,
    arrays: IndexMap<String, CompartmentArray>,
    periodic: Option<Vec<bool>>,
    box_len: Option<Vec<f64>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        arrays: Vec<CompartmentArray>,
        compartments: Vec<Compartment>,
    ) -> RxnResult<Self> {
        let mut model = Self::new();
        for array in arrays {
            model.add_array(array)?;
        }
        for compartment in compartments {
            model.add_compartment(compartment)?;
        }
        Ok(model)
    }

    /// Adds an array. Periodicity must match previously added arrays; along
    /// non-periodic axes differing box lengths are stacked.
    pub fn add_array(&mut self, array: CompartmentArray) -> RxnResult<()> {
        if self.arrays.contains_key(array.array_id()) {
            return Err(RxnError::DuplicateId(format!(
                "array {} is already in the model",
                array.array_id()
            )));
        }

        let periodic = match &self.periodic {
            None => array.periodic().to_vec(),
            Some(existing) if existing.as_slice() == array.periodic() => existing.clone(),
            Some(existing) => {
                return Err(RxnError::Periodicity(format!(
                    "adding array {} with periodicity {:?} to a model with {:?}",
                    array.array_id(),
                    array.periodic(),
                    existing
                )))
            }
        };

        let box_len = match &self.box_len {
            None => array.box_len(),
            Some(existing) => {
                let mut box_len = existing.clone();
                for (i, &len) in array.box_len().iter().enumerate() {
                    if (box_len[i] - len).abs() <= BOUNDARY_TOLERANCE {
                        continue;
                    }
                    if periodic[i] {
                        return Err(RxnError::Periodicity(format!(
                            "adding array {} with length {len} along periodic axis {i} to a model with length {}",
                            array.array_id(),
                            box_len[i]
                        )));
                    }
                    box_len[i] += len;
                }
                box_len
            }
        };

        self.periodic = Some(periodic);
        self.box_len = Some(box_len);
        self.arrays.insert(array.array_id().to_string(), array);
        Ok(())
    }

    pub fn add_compartment(&mut self, compartment: Compartment) -> RxnResult<()> {
        let id = compartment.id();
        if self.compartments.contains_key(&id) {
            return Err(RxnError::DuplicateId(format!(
                "compartment {id} is already in the model"
            )));
        }
        self.compartments.insert(id, compartment);
        Ok(())
    }

    pub fn compartment(&self, id: &str) -> Option<&Compartment> {
        self.compartments.get(id)
    }

    pub fn compartment_mut(&mut self, id: &str) -> Option<&mut Compartment> {
        self.compartments.get_mut(id)
    }

    pub fn array(&self, id: &str) -> Option<&CompartmentArray> {
        self.arrays.get(id)
    }

    pub fn array_mut(&mut self, id: &str) -> Option<&mut CompartmentArray> {
        self.arrays.get_mut(id)
    }

    pub fn periodic(&self) -> Option<&[bool]> {
        self.periodic.as_deref()
    }

    pub fn box_len(&self) -> Option<&[f64]> {
        self.box_len.as_deref()
    }

    fn is_periodic(&self, axis: usize) -> Option<f64> {
        let periodic = self.periodic.as_ref()?.get(axis).copied()?;
        let len = self.box_len.as_ref()?.get(axis).copied()?;
        periodic.then_some(len)
    }

    /// Collects every compartment under its flat id and resolves diffusive
    /// connections into rates.
    pub fn flatten(&self) -> RxnResult<FlatModel> {
        let mut flat = FlatModel::new();
        flat.add_compartments(self.compartments.values())?;
        for array in self.arrays.values() {
            flat.add_compartments(array.compartments())?;
        }

        let missing = flat.find_missing_compartments();
        if !missing.is_empty() {
            return Err(RxnError::MissingCompartment(missing.join(", ")));
        }

        let pending: Vec<(String, String)> = flat
            .compartments
            .iter()
            .flat_map(|(id, c)| {
                c.connections
                    .iter()
                    .filter(|(_, conn)| conn.needs_resolution())
                    .map(move |(target, _)| (id.clone(), target.clone()))
            })
            .collect();

        for (source, target) in pending {
            // A Ficks link may already have been resolved from the other side
            let Some(conn) = flat.connection(&source, &target).cloned() else {
                continue;
            };
            match conn {
                Connection::Reservoir { .. } => self.resolve_reservoir(&mut flat, &source, &target, conn)?,
                Connection::Ficks { .. } => self.resolve_ficks(&mut flat, &source, &target, conn)?,
                _ => {}
            }
        }
        Ok(flat)
    }

    fn resolve_ficks(
        &self,
        flat: &mut FlatModel,
        source: &str,
        target: &str,
        conn: Connection,
    ) -> RxnResult<()> {
        let (Some(c1), Some(c2)) = (flat.compartments.get(source), flat.compartments.get(target))
        else {
            return Err(RxnError::MissingCompartment(format!("{source} or {target}")));
        };
        let Connection::Ficks {
            surface_area,
            distance,
            ..
        } = &conn
        else {
            return Ok(());
        };

        let area = match surface_area {
            Some(area) => *area,
            None => {
                let axis = self.adjoining_axis(c1, c2).ok_or_else(|| {
                    RxnError::Geometry(format!(
                        "unable to determine the adjoining face of {source} and {target}"
                    ))
                })?;
                match (c1.face_area(axis), c2.face_area(axis)) {
                    (Some(a1), Some(a2)) => a1.min(a2),
                    _ => {
                        return Err(RxnError::Geometry(format!(
                            "no face area along {axis} for {source} and {target}"
                        )))
                    }
                }
            }
        };
        let distance = match distance {
            Some(d) => *d,
            None => self.centre_distance(c1, c2),
        };

        let resolved = with_resolved_geometry(conn, area, distance)?.resolve()?;
        if let Some(c) = flat.compartments.get_mut(source) {
            c.connect(target, resolved.clone(), false);
        }
        if let Some(c) = flat.compartments.get_mut(target) {
            c.connect(source, resolved, false);
        }
        Ok(())
    }

    fn resolve_reservoir(
        &self,
        flat: &mut FlatModel,
        source: &str,
        target: &str,
        conn: Connection,
    ) -> RxnResult<()> {
        let Connection::Reservoir {
            surface_area,
            distance,
            face,
            ..
        } = &conn
        else {
            return Ok(());
        };
        let c = flat
            .compartments
            .get(source)
            .ok_or_else(|| RxnError::MissingCompartment(source.to_string()))?;

        let needs_face = |what: &str| {
            RxnError::Geometry(format!(
                "to resolve the reservoir connection from {source} we need to know the {what}"
            ))
        };
        let area = match (surface_area, face) {
            (Some(area), _) => *area,
            (None, Some(axis)) => c.face_area(*axis).ok_or_else(|| needs_face("interface area"))?,
            (None, None) => return Err(needs_face("interface area")),
        };
        let distance = match (distance, face) {
            (Some(d), _) => *d,
            (None, Some(axis)) => c.width(*axis).ok_or_else(|| needs_face("distance"))?,
            (None, None) => return Err(needs_face("distance")),
        };

        let resolved = with_resolved_geometry(conn, area, distance)?.resolve()?;
        if let Some(c) = flat.compartments.get_mut(source) {
            c.connect(target, resolved, false);
        }
        Ok(())
    }

    /// The axis along which two boxes share a face, taking periodic wrapping
    /// into account.
    fn adjoining_axis(&self, c1: &Compartment, c2: &Compartment) -> Option<Axis> {
        let dims = c1.dim().min(c2.dim());
        (0..dims).find_map(|i| {
            let (lo1, hi1) = c1.extents[i];
            let (lo2, hi2) = c2.extents[i];
            let touches = |a: f64, b: f64| {
                let d = a - b;
                match self.is_periodic(i) {
                    Some(len) => {
                        d.abs() <= BOUNDARY_TOLERANCE
                            || (d.abs() - len).abs() <= BOUNDARY_TOLERANCE
                    }
                    None => d.abs() <= BOUNDARY_TOLERANCE,
                }
            };
            let distinct = (lo1 - lo2).abs() > BOUNDARY_TOLERANCE;
            if distinct && (touches(hi1, lo2) || touches(lo1, hi2)) {
                Axis::from_index(i)
            } else {
                None
            }
        })
    }

    /// Distance between compartment centres, using the minimum image along
    /// periodic axes.
    fn centre_distance(&self, c1: &Compartment, c2: &Compartment) -> f64 {
        let (p1, p2) = (c1.center(), c2.center());
        let mut sum = 0.0;
        for i in 0..3 {
            let (Some(a), Some(b)) = (p1[i], p2[i]) else {
                continue;
            };
            let mut d = a - b;
            if let Some(len) = self.is_periodic(i) {
                if 2.0 * d < -len {
                    d += len;
                } else if 2.0 * d > len {
                    d -= len;
                }
            }
            sum += d * d;
        }
        sum.sqrt()
    }
}

fn with_resolved_geometry(conn: Connection, area: f64, distance: f64) -> RxnResult<Connection> {
    match conn {
        Connection::Ficks {
            diffusion, dim, ..
        } => Ok(Connection::Ficks {
            diffusion,
            surface_area: Some(area),
            distance: Some(distance),
            dim,
        }),
        Connection::Reservoir {
            diffusion,
            dim,
            face,
            ..
        } => Ok(Connection::Reservoir {
            diffusion,
            surface_area: Some(area),
            distance: Some(distance),
            dim,
            face,
        }),
        other => Err(RxnError::InvalidConnection(format!(
            "{} connections have no geometry to resolve",
            other.kind()
        ))),
    }
}

/// A node of the connectivity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    /// Projected 2D drawing position
    pub position: (f64, f64),
}

/// An edge of the connectivity graph: `k_out` per species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub rates: BTreeMap<String, f64>,
}

pub type ConnectivityGraph = DiGraph<GraphNode, GraphEdge>;

/// Compartments with flat ids and resolved connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatModel {
    compartments: IndexMap<String, Compartment>,
}

impl FlatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_compartments(&self) -> usize {
        self.compartments.len()
    }

    /// Adds a copy of `compartment` under its flat id, detached from its array.
    pub fn add_compartment(&mut self, compartment: &Compartment) -> RxnResult<()> {
        let id = compartment.id();
        if self.compartments.contains_key(&id) {
            return Err(RxnError::DuplicateId(format!(
                "compartment {id} is already in the model"
            )));
        }
        self.compartments
            .insert(id.clone(), compartment.copy_as(id, true));
        Ok(())
    }

    pub fn add_compartments<'a, I>(&mut self, compartments: I) -> RxnResult<()>
    where
        I: IntoIterator<Item = &'a Compartment>,
    {
        for c in compartments {
            self.add_compartment(c)?;
        }
        Ok(())
    }

    pub fn compartment(&self, id: &str) -> Option<&Compartment> {
        self.compartments.get(id)
    }

    pub fn compartment_mut(&mut self, id: &str) -> Option<&mut Compartment> {
        self.compartments.get_mut(id)
    }

    pub fn compartments(&self) -> impl Iterator<Item = (&String, &Compartment)> {
        self.compartments.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.compartments.keys()
    }

    fn connection(&self, source: &str, target: &str) -> Option<&Connection> {
        self.compartments.get(source)?.connections.get(target)
    }

    /// Ids referred to by connections but absent from the model.
    pub fn find_missing_compartments(&self) -> Vec<String> {
        self.compartments
            .values()
            .flat_map(|c| c.connections.keys())
            .filter(|target| !self.compartments.contains_key(*target))
            .cloned()
            .collect()
    }

    pub fn add_rxn(&mut self, rxn: &Reaction, selection: &Selection) -> RxnResult<()> {
        match selection {
            Selection::All => {
                for c in self.compartments.values_mut() {
                    c.add_rxn_to_compartment(rxn.clone());
                }
            }
            Selection::Ids(ids) => {
                if let Some(missing) = ids.iter().find(|id| !self.compartments.contains_key(*id)) {
                    return Err(RxnError::MissingCompartment(missing.clone()));
                }
                for id in ids {
                    if let Some(c) = self.compartments.get_mut(id) {
                        c.add_rxn_to_compartment(rxn.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Compartments as nodes and connections as edges. Node positions are
    /// the scaled centres projected onto the drawing plane.
    pub fn to_graph(&self, scale: f64) -> ConnectivityGraph {
        let mut graph = ConnectivityGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for (id, c) in &self.compartments {
            let [x, y, z] = c.center().map(|p| scale * p.unwrap_or(0.0));
            let index = graph.add_node(GraphNode {
                id: id.clone(),
                position: (x - PROJECTION_ALPHA * y, z + PROJECTION_BETA * y),
            });
            nodes.insert(id.as_str(), index);
        }

        for (id, c) in &self.compartments {
            for (target, conn) in &c.connections {
                let (Some(&from), Some(&to)) = (nodes.get(id.as_str()), nodes.get(target.as_str()))
                else {
                    continue;
                };
                let rates = conn
                    .species()
                    .into_iter()
                    .filter_map(|s| conn.rates(s).map(|(k_out, _)| (s.to_string(), k_out)))
                    .collect();
                graph.add_edge(from, to, GraphEdge { rates });
            }
        }
        graph
    }

    /// The connectivity graph in Graphviz DOT format.
    pub fn as_dot(&self, scale: f64) -> String {
        let graph = self.to_graph(scale);
        let edge_attrs = |_: &ConnectivityGraph, edge: EdgeReference<'_, GraphEdge>| {
            let rates: Vec<String> = edge
                .weight()
                .rates
                .iter()
                .map(|(s, k)| format!("{s}: {k:.3e}"))
                .collect();
            format!("label = \"{}\"", rates.join(", "))
        };
        let node_attrs = |_: &ConnectivityGraph, (_, node): (NodeIndex, &GraphNode)| {
            format!(
                "label = \"{}\", pos = \"{:.3},{:.3}!\"",
                node.id, node.position.0, node.position.1
            )
        };
        let dot = Dot::with_attr_getters(
            &graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &edge_attrs,
            &node_attrs,
        );
        format!("{dot:?}")
    }
}
