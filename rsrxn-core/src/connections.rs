//! Transport between compartments.
//!
//! A connection lives on the source compartment and describes, per species,
//! how fast molecules leave towards the target. Rates in a resolved
//! connection follow first-order kinetics:
//!
//! ```text
//! dn1/dt = -k12 n1 + k21 n2
//! ```
//!
//! `Anisotropic` and `Isotropic` connections store `k` in 1/s directly.
//! `DivByV` stores `kV = k * V` in `nm^dim/s` and is divided by the source
//! volume when the kinetics are built. `Ficks` and `Reservoir` connections
//! hold diffusion constants and are turned into `DivByV` once the interface
//! geometry is known, using `kV = D A / dx`.

use crate::compartments::Axis;
use crate::errors::{RxnError, RxnResult};
use crate::units::{nm_pow, nm_pow_per_second, Quantity, Unit, PER_SECOND};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A per-species rate given either as one value or as an `(out, in)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeciesRate {
    Scalar(Quantity),
    Pair(Quantity, Quantity),
}

impl From<Quantity> for SpeciesRate {
    fn from(q: Quantity) -> Self {
        Self::Scalar(q)
    }
}

impl From<(Quantity, Quantity)> for SpeciesRate {
    fn from((k_out, k_in): (Quantity, Quantity)) -> Self {
        Self::Pair(k_out, k_in)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Connection {
    /// `(k_out, k_in)` in 1/s per species.
    Anisotropic { rates: BTreeMap<String, (f64, f64)> },
    /// `k` in 1/s per species, the same in both directions.
    Isotropic { rates: BTreeMap<String, f64> },
    /// `(kV_out, kV_in)` in `nm^dim/s` per species.
    DivByV {
        rates: BTreeMap<String, (f64, f64)>,
        dim: u8,
    },
    /// Diffusion constants in `nm^2/s`, interface area in `nm^(dim-1)`
    /// and centre distance in `nm`.
    Ficks {
        diffusion: BTreeMap<String, f64>,
        surface_area: Option<f64>,
        distance: Option<f64>,
        dim: u8,
    },
    /// Like `Ficks`, towards a reservoir. `face` is the axis normal to the
    /// interface and lets the geometry be read off the source compartment.
    Reservoir {
        diffusion: BTreeMap<String, f64>,
        surface_area: Option<f64>,
        distance: Option<f64>,
        dim: u8,
        face: Option<Axis>,
    },
}

fn check_dim(dim: u8) -> RxnResult<u8> {
    if (1..=3).contains(&dim) {
        Ok(dim)
    } else {
        Err(RxnError::InvalidConnection(format!(
            "spatial dimension must be 1, 2 or 3, got {dim}"
        )))
    }
}

fn convert(q: &Quantity, unit: &Unit, species: &str) -> RxnResult<f64> {
    let value = q.value_in(unit)?;
    if value < 0.0 {
        return Err(RxnError::InvalidConnection(format!(
            "species {species}: transport rate cannot be negative"
        )));
    }
    Ok(value)
}

fn convert_pairs<I, S, R>(rates: I, unit: &Unit, warn_scalar: bool) -> RxnResult<BTreeMap<String, (f64, f64)>>
where
    I: IntoIterator<Item = (S, R)>,
    S: Into<String>,
    R: Into<SpeciesRate>,
{
    rates
        .into_iter()
        .map(|(species, rate)| {
            let species = species.into();
            let pair = match rate.into() {
                SpeciesRate::Scalar(k) => {
                    if warn_scalar {
                        log::warn!(
                            "Species {species}: one scalar rate provided. Assigning k_out == k_in"
                        );
                    }
                    let k = convert(&k, unit, &species)?;
                    (k, k)
                }
                SpeciesRate::Pair(k_out, k_in) => (
                    convert(&k_out, unit, &species)?,
                    convert(&k_in, unit, &species)?,
                ),
            };
            Ok((species, pair))
        })
        .collect()
}

fn convert_diffusion<I, S>(constants: I) -> RxnResult<BTreeMap<String, f64>>
where
    I: IntoIterator<Item = (S, Quantity)>,
    S: Into<String>,
{
    let unit = nm_pow_per_second(2);
    constants
        .into_iter()
        .map(|(species, d)| {
            let species = species.into();
            let value = convert(&d, &unit, &species)?;
            Ok((species, value))
        })
        .collect()
}

impl Connection {
    pub fn anisotropic<I, S, R>(rates: I) -> RxnResult<Self>
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: Into<SpeciesRate>,
    {
        Ok(Self::Anisotropic {
            rates: convert_pairs(rates, &PER_SECOND, true)?,
        })
    }

    pub fn isotropic<I, S>(rates: I) -> RxnResult<Self>
    where
        I: IntoIterator<Item = (S, Quantity)>,
        S: Into<String>,
    {
        let rates = rates
            .into_iter()
            .map(|(species, k)| {
                let species = species.into();
                let value = convert(&k, &PER_SECOND, &species)?;
                Ok((species, value))
            })
            .collect::<RxnResult<_>>()?;
        Ok(Self::Isotropic { rates })
    }

    pub fn div_by_v<I, S, R>(rates: I, dim: u8) -> RxnResult<Self>
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: Into<SpeciesRate>,
    {
        let dim = check_dim(dim)?;
        let unit = nm_pow_per_second(dim as i8);
        Ok(Self::DivByV {
            rates: convert_pairs(rates, &unit, false)?,
            dim,
        })
    }

    pub fn ficks<I, S>(diffusion: I, dim: u8) -> RxnResult<Self>
    where
        I: IntoIterator<Item = (S, Quantity)>,
        S: Into<String>,
    {
        Ok(Self::Ficks {
            diffusion: convert_diffusion(diffusion)?,
            surface_area: None,
            distance: None,
            dim: check_dim(dim)?,
        })
    }

    pub fn reservoir<I, S>(diffusion: I, dim: u8, face: Option<Axis>) -> RxnResult<Self>
    where
        I: IntoIterator<Item = (S, Quantity)>,
        S: Into<String>,
    {
        Ok(Self::Reservoir {
            diffusion: convert_diffusion(diffusion)?,
            surface_area: None,
            distance: None,
            dim: check_dim(dim)?,
            face,
        })
    }

    /// Fixes the interface area and/or centre distance of a diffusive
    /// connection. Other connection kinds are rejected.
    pub fn with_geometry(
        mut self,
        area: Option<&Quantity>,
        distance: Option<&Quantity>,
    ) -> RxnResult<Self> {
        match &mut self {
            Self::Ficks {
                surface_area,
                distance: dx,
                dim,
                ..
            }
            | Self::Reservoir {
                surface_area,
                distance: dx,
                dim,
                ..
            } => {
                if let Some(a) = area {
                    *surface_area = Some(convert(a, &nm_pow(*dim as i8 - 1), "interface")?);
                }
                if let Some(d) = distance {
                    *dx = Some(convert(d, &nm_pow(1), "interface")?);
                }
                Ok(self)
            }
            _ => Err(RxnError::InvalidConnection(
                "only Ficks and reservoir connections carry a geometry".to_string(),
            )),
        }
    }

    /// Species transported by this connection.
    pub fn species(&self) -> Vec<&str> {
        match self {
            Self::Anisotropic { rates } | Self::DivByV { rates, .. } => {
                rates.keys().map(String::as_str).collect()
            }
            Self::Isotropic { rates } => rates.keys().map(String::as_str).collect(),
            Self::Ficks { diffusion, .. } | Self::Reservoir { diffusion, .. } => {
                diffusion.keys().map(String::as_str).collect()
            }
        }
    }

    /// `(k_out, k_in)` for resolved connections. Diffusive connections that
    /// still need resolving return `None`.
    pub fn rates(&self, species: &str) -> Option<(f64, f64)> {
        match self {
            Self::Anisotropic { rates } | Self::DivByV { rates, .. } => rates.get(species).copied(),
            Self::Isotropic { rates } => rates.get(species).map(|&k| (k, k)),
            Self::Ficks { .. } | Self::Reservoir { .. } => None,
        }
    }

    /// Unit of the stored rates, `1/s` or `nm^dim/s`.
    pub fn rate_unit(&self) -> Unit {
        match self {
            Self::DivByV { dim, .. } | Self::Ficks { dim, .. } | Self::Reservoir { dim, .. } => {
                nm_pow_per_second(*dim as i8)
            }
            _ => PER_SECOND.clone(),
        }
    }

    /// True when rates must be divided by the source compartment volume.
    pub fn divides_by_volume(&self) -> bool {
        matches!(self, Self::DivByV { .. })
    }

    pub fn needs_resolution(&self) -> bool {
        matches!(self, Self::Ficks { .. } | Self::Reservoir { .. })
    }

    pub fn dim(&self) -> Option<u8> {
        match self {
            Self::DivByV { dim, .. } | Self::Ficks { dim, .. } | Self::Reservoir { dim, .. } => {
                Some(*dim)
            }
            _ => None,
        }
    }

    /// The connection as seen from the other end.
    pub fn reverse(&self) -> Self {
        let flip = |rates: &BTreeMap<String, (f64, f64)>| {
            rates
                .iter()
                .map(|(s, &(k_out, k_in))| (s.clone(), (k_in, k_out)))
                .collect()
        };
        match self {
            Self::Anisotropic { rates } => Self::Anisotropic { rates: flip(rates) },
            Self::DivByV { rates, dim } => Self::DivByV {
                rates: flip(rates),
                dim: *dim,
            },
            other => other.clone(),
        }
    }

    /// Turns a diffusive connection into a `DivByV` one with `kV = D A / dx`.
    ///
    /// Already resolved connections are returned unchanged.
    pub fn resolve(&self) -> RxnResult<Self> {
        match self {
            Self::Ficks {
                diffusion,
                surface_area,
                distance,
                dim,
            }
            | Self::Reservoir {
                diffusion,
                surface_area,
                distance,
                dim,
                ..
            } => {
                let (Some(area), Some(dx)) = (surface_area, distance) else {
                    return Err(RxnError::InvalidConnection(
                        "connection is not ready to be resolved: interface area or distance unknown"
                            .to_string(),
                    ));
                };
                if *dx <= 0.0 {
                    return Err(RxnError::InvalidConnection(format!(
                        "interface distance must be positive, got {dx} nm"
                    )));
                }
                let rates = diffusion
                    .iter()
                    .map(|(s, d)| {
                        let kv = d * area / dx;
                        (s.clone(), (kv, kv))
                    })
                    .collect();
                Ok(Self::DivByV { rates, dim: *dim })
            }
            resolved => Ok(resolved.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Anisotropic { .. } => "anisotropic",
            Self::Isotropic { .. } => "isotropic",
            Self::DivByV { .. } => "div_by_v",
            Self::Ficks { .. } => "ficks",
            Self::Reservoir { .. } => "reservoir",
        }
    }
}
