//! Compartment identifiers.
//!
//! Compartments are keyed either by a name or by their index in an array.
//! Flat identifiers join the array id and the key, e.g. `bulk-0_0_1`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompartmentKey {
    Name(String),
    Grid(Vec<usize>),
}

impl fmt::Display for CompartmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Grid(index) => {
                let parts: Vec<String> = index.iter().map(usize::to_string).collect();
                write!(f, "{}", parts.join("_"))
            }
        }
    }
}

impl From<&str> for CompartmentKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for CompartmentKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for CompartmentKey {
    fn from(i: usize) -> Self {
        Self::Grid(vec![i])
    }
}

impl From<(usize, usize)> for CompartmentKey {
    fn from((i, j): (usize, usize)) -> Self {
        Self::Grid(vec![i, j])
    }
}

impl From<(usize, usize, usize)> for CompartmentKey {
    fn from((i, j, k): (usize, usize, usize)) -> Self {
        Self::Grid(vec![i, j, k])
    }
}

impl From<Vec<usize>> for CompartmentKey {
    fn from(index: Vec<usize>) -> Self {
        Self::Grid(index)
    }
}

/// Flat identifier: `"{array_id}-{key}"`, or the bare key outside arrays.
pub fn make_id(array_id: Option<&str>, key: &CompartmentKey) -> String {
    match array_id {
        Some(array) => format!("{array}-{key}"),
        None => key.to_string(),
    }
}
