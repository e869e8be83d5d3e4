//! The state vector: one molecule count per species per compartment.

use crate::errors::{RxnError, RxnResult};
use crate::model::FlatModel;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

/// One entry of the state vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRow {
    pub species: String,
    pub compartment: String,
    pub x_pos: Option<f64>,
    pub y_pos: Option<f64>,
    pub z_pos: Option<f64>,
    pub q_val: f64,
}

#[derive(Serialize)]
struct LayoutRow<'a> {
    species: &'a str,
    compartment: &'a str,
    x_pos: Option<f64>,
    y_pos: Option<f64>,
    z_pos: Option<f64>,
}

#[derive(Deserialize)]
struct InputRow {
    species: String,
    compartment: String,
    #[serde(default)]
    x_pos: Option<f64>,
    #[serde(default)]
    y_pos: Option<f64>,
    #[serde(default)]
    z_pos: Option<f64>,
    #[serde(default)]
    q_val: Option<f64>,
}

const REQUIRED_COLUMNS: [&str; 2] = ["species", "compartment"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub species: Vec<String>,
    pub compartment: Vec<String>,
    /// Compartment centres in nm, `None` along axes without extents
    pub x_pos: Vec<Option<f64>>,
    pub y_pos: Vec<Option<f64>>,
    pub z_pos: Vec<Option<f64>>,
    pub q_val: Array1<f64>,
    index: BTreeMap<String, BTreeMap<String, usize>>,
}

impl State {
    /// Lays out the state of a flat model.
    ///
    /// Compartments are taken in model order and reservoirs are skipped. Each
    /// compartment holds, in sorted order, every species that takes part in
    /// one of its reactions or in a connection to or from it.
    pub fn from_model(model: &FlatModel) -> Self {
        let mut species: BTreeMap<&str, BTreeSet<String>> = model
            .compartments()
            .map(|(id, c)| (id.as_str(), c.species_ids()))
            .collect();
        for (_, c) in model.compartments() {
            for (target, conn) in &c.connections {
                if let Some(set) = species.get_mut(target.as_str()) {
                    set.extend(conn.species().into_iter().map(str::to_string));
                }
            }
        }

        let mut state = Self::default();
        let mut q_val = Vec::new();
        for (id, c) in model.compartments() {
            if c.is_reservoir() {
                continue;
            }
            let [x, y, z] = c.center();
            for s in species.get(id.as_str()).into_iter().flatten() {
                state.push(s.clone(), id.clone(), [x, y, z]);
                q_val.push(0.0);
            }
        }
        state.q_val = Array1::from(q_val);
        state
    }

    /// Reads a state layout from CSV. `species` and `compartment` columns are
    /// required; `x_pos`, `y_pos`, `z_pos` and `q_val` are optional.
    pub fn from_csv(path: impl AsRef<Path>) -> RxnResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> RxnResult<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|col| !headers.iter().any(|h| h.trim() == **col))
        {
            return Err(RxnError::MissingColumn(missing.to_string()));
        }

        let mut state = Self::default();
        let mut q_val = Vec::new();
        for row in reader.deserialize() {
            let row: InputRow = row?;
            if state.index_of(&row.compartment, &row.species).is_some() {
                return Err(RxnError::DuplicateId(format!(
                    "species {} appears twice in compartment {}",
                    row.species, row.compartment
                )));
            }
            state.push(row.species, row.compartment, [row.x_pos, row.y_pos, row.z_pos]);
            q_val.push(row.q_val.unwrap_or(0.0));
        }
        state.q_val = Array1::from(q_val);
        Ok(state)
    }

    fn push(&mut self, species: String, compartment: String, pos: [Option<f64>; 3]) {
        let idx = self.species.len();
        self.index
            .entry(compartment.clone())
            .or_default()
            .insert(species.clone(), idx);
        self.species.push(species);
        self.compartment.push(compartment);
        self.x_pos.push(pos[0]);
        self.y_pos.push(pos[1]);
        self.z_pos.push(pos[2]);
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<StateRow> {
        (idx < self.len()).then(|| StateRow {
            species: self.species[idx].clone(),
            compartment: self.compartment[idx].clone(),
            x_pos: self.x_pos[idx],
            y_pos: self.y_pos[idx],
            z_pos: self.z_pos[idx],
            q_val: self.q_val[idx],
        })
    }

    pub fn rows(&self) -> Vec<StateRow> {
        (0..self.len()).filter_map(|i| self.row(i)).collect()
    }

    /// Index of `species` in `compartment`.
    pub fn index_of(&self, compartment: &str, species: &str) -> Option<usize> {
        self.index.get(compartment)?.get(species).copied()
    }

    /// Species held by a compartment and their indices.
    pub fn compartment_index(&self, compartment: &str) -> Option<&BTreeMap<String, usize>> {
        self.index.get(compartment)
    }

    pub fn indices_for_species(&self, species: &str) -> Vec<usize> {
        self.select(|row| row.species == species)
    }

    /// Indices of the rows matching `predicate`.
    pub fn select<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&StateRow) -> bool,
    {
        self.rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| predicate(row))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn to_csv(&self, path: impl AsRef<Path>) -> RxnResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the layout only, without quantities.
    pub fn to_csv_no_q(&self, path: impl AsRef<Path>) -> RxnResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for i in 0..self.len() {
            writer.serialize(LayoutRow {
                species: &self.species[i],
                compartment: &self.compartment[i],
                x_pos: self.x_pos[i],
                y_pos: self.y_pos[i],
                z_pos: self.z_pos[i],
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
