//! Compartments and regular grids of compartments.

pub mod arrays;
pub mod compartment;
pub mod id;

pub use arrays::{CompartmentArray, Side};
pub use compartment::{Compartment, CompartmentKind, ConcentrationProfile, Volume};
pub use id::{make_id, CompartmentKey};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::RxnError;

/// A spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Axis {
    type Err = RxnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            other => Err(RxnError::Geometry(format!(
                "unknown axis '{other}', expected one of x, y, z"
            ))),
        }
    }
}
