//! Species and the reactions that interconvert them.
//!
//! A reaction `2 A + B <--> C` is built from its reactant and product
//! species, their stoichiometric coefficients and a forward and reverse
//! rate constant:
//!
//! ```
//! use rsrxn_core::reactions::{Reaction, Species};
//! use rsrxn_core::units::Quantity;
//!
//! let a = Species::new("A");
//! let b = Species::new("B");
//! let c = Species::new("C");
//! let rxn = Reaction::new(
//!     "binding",
//!     vec![a, b],
//!     vec![c],
//!     vec![2, 1],
//!     vec![1],
//!     Quantity::new(1e6, "M^-2 s^-1").unwrap(),
//!     Quantity::new(0.1, "1/s").unwrap(),
//! )
//! .unwrap();
//! assert_eq!(rxn.order_forward(), 3);
//! ```

use crate::errors::{RxnError, RxnResult};
use crate::units::{Dimension, ParseError, Quantity, Unit, MOLAR, NM, PER_SECOND, SECOND};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A chemical entity, identified by a unique id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: String,
    /// Free-form numeric properties (e.g. charge, mass)
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

impl Species {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Species({})", self.id)
    }
}

/// How a rate constant is turned into a per-molecule rate in a compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLaw {
    /// Already a count rate in 1/s. Used as given.
    PerSecond,
    /// `M^(1-order) / s`. Scaled by the molar volume of the compartment.
    Molar,
    /// `L^(dim (order-1)) / s`. Scaled by the `dim`-dimensional compartment volume.
    Length { dim: u8 },
}

impl RateLaw {
    /// Works out which law a rate with dimension `dim` follows for a given order.
    pub fn classify(dim: Dimension, order: u32) -> Option<Self> {
        if dim.time != -1 || dim.mass != 0 {
            return None;
        }
        if dim.amount == 0 && dim.length == 0 {
            return Some(Self::PerSecond);
        }
        let excess = i32::try_from(order).ok()? - 1;
        if excess == 0 {
            return None;
        }
        if i32::from(dim.amount) == -excess
            && Some(i32::from(dim.length)) == excess.checked_mul(3)
        {
            return Some(Self::Molar);
        }
        let length = i32::from(dim.length);
        if dim.amount == 0 && length % excess == 0 {
            let d = length / excess;
            if (1..=3).contains(&d) {
                return Some(Self::Length { dim: d as u8 });
            }
        }
        None
    }
}

/// A validated rate constant, stored in the canonical unit of its law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConstant {
    pub value: f64,
    pub law: RateLaw,
    pub order: u32,
    unit: Unit,
}

impl RateConstant {
    /// Validates `rate` for a reaction step of the given order.
    ///
    /// Dimensionless rates are interpreted in `M^(1-order)/s`.
    pub fn new(rate: &Quantity, order: u32, context: &str) -> RxnResult<Self> {
        if rate.value < 0.0 {
            return Err(RxnError::InvalidRate {
                context: context.to_string(),
                unit: format!("negative value {}", rate.value),
            });
        }
        let rate = if rate.is_dimensionless() {
            let unit = Self::molar_unit(order).map_err(|_| RxnError::InvalidRate {
                context: context.to_string(),
                unit: format!("no molar unit for order {order}"),
            })?;
            if rate.value != 0.0 {
                log::warn!(
                    "Reaction rate for {context} provided without units. Assigning {unit}"
                );
            }
            Quantity::with_unit(rate.value, unit)
        } else {
            rate.clone()
        };

        let law = RateLaw::classify(rate.dimension(), order).ok_or_else(|| {
            RxnError::InvalidRate {
                context: context.to_string(),
                unit: rate.unit.to_string(),
            }
        })?;
        let unit = Self::canonical_unit(law, order)?;
        let value = rate.value_in(&unit)?;
        Ok(Self {
            value,
            law,
            order,
            unit,
        })
    }

    /// `M^(1-order) / s`
    fn molar_unit(order: u32) -> Result<Unit, ParseError> {
        MOLAR.powi(-excess_order(order)?)?.checked_div(&SECOND)
    }

    fn canonical_unit(law: RateLaw, order: u32) -> Result<Unit, ParseError> {
        match law {
            RateLaw::PerSecond => Ok(PER_SECOND.clone()),
            RateLaw::Molar => Self::molar_unit(order),
            RateLaw::Length { dim } => {
                let exp = i32::from(dim)
                    .checked_mul(excess_order(order)?)
                    .ok_or_else(|| ParseError::InvalidExponent(format!("nm^({dim} ({order}-1))")))?;
                NM.powi(exp)?.checked_div(&SECOND)
            }
        }
    }

    pub fn unit(&self) -> Unit {
        self.unit.clone()
    }

    pub fn quantity(&self) -> Quantity {
        Quantity::with_unit(self.value, self.unit())
    }

    pub fn is_active(&self) -> bool {
        self.value > 0.0
    }
}

/// `order - 1` as a signed exponent.
fn excess_order(order: u32) -> Result<i32, ParseError> {
    i32::try_from(order)
        .map(|o| o - 1)
        .map_err(|_| ParseError::InvalidExponent(format!("order {order}")))
}

impl fmt::Display for RateConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quantity())
    }
}

/// A reversible reaction between reactant and product species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub reactants: Vec<Species>,
    pub products: Vec<Species>,
    pub stoich_r: Vec<u32>,
    pub stoich_p: Vec<u32>,
    pub kf: RateConstant,
    pub kr: RateConstant,
}

impl Reaction {
    pub fn new(
        id: impl Into<String>,
        reactants: Vec<Species>,
        products: Vec<Species>,
        stoich_r: Vec<u32>,
        stoich_p: Vec<u32>,
        kf: Quantity,
        kr: Quantity,
    ) -> RxnResult<Self> {
        let id = id.into();
        let invalid = |reason: &str| RxnError::InvalidReaction {
            id: id.clone(),
            reason: reason.to_string(),
        };

        if reactants.len() != stoich_r.len() {
            return Err(invalid(
                "stoichiometry list for reactants must have the same length as the reactants",
            ));
        }
        if products.len() != stoich_p.len() {
            return Err(invalid(
                "stoichiometry list for products must have the same length as the products",
            ));
        }
        if stoich_r.iter().chain(&stoich_p).any(|&n| n == 0) {
            return Err(invalid("stoichiometric coefficients must be positive"));
        }
        if kf.value < 0.0 || kr.value < 0.0 {
            return Err(invalid("reaction rate cannot be negative"));
        }
        if kf.value == 0.0 && kr.value == 0.0 {
            log::warn!("Both forward and reverse rates of {id} are set to zero");
        }

        let order = |stoich: &[u32]| {
            stoich
                .iter()
                .try_fold(0u32, |acc, &n| acc.checked_add(n))
                .ok_or_else(|| invalid("stoichiometric coefficients are too large"))
        };
        let kf = RateConstant::new(&kf, order(&stoich_r)?, &format!("{id} (forward)"))?;
        let kr = RateConstant::new(&kr, order(&stoich_p)?, &format!("{id} (reverse)"))?;

        Ok(Self {
            id,
            reactants,
            products,
            stoich_r,
            stoich_p,
            kf,
            kr,
        })
    }

    /// An irreversible reaction (`kr = 0`).
    pub fn irreversible(
        id: impl Into<String>,
        reactants: Vec<Species>,
        products: Vec<Species>,
        stoich_r: Vec<u32>,
        stoich_p: Vec<u32>,
        kf: Quantity,
    ) -> RxnResult<Self> {
        Self::new(
            id,
            reactants,
            products,
            stoich_r,
            stoich_p,
            kf,
            Quantity::dimensionless(0.0),
        )
    }

    pub fn reactant_ids(&self) -> Vec<&str> {
        self.reactants.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn product_ids(&self) -> Vec<&str> {
        self.products.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn order_forward(&self) -> u32 {
        self.stoich_r.iter().sum()
    }

    pub fn order_reverse(&self) -> u32 {
        self.stoich_p.iter().sum()
    }

    /// Every species taking part, reactants first.
    pub fn species_ids(&self) -> impl Iterator<Item = &str> {
        self.reactants
            .iter()
            .chain(&self.products)
            .map(|s| s.id.as_str())
    }

    /// A one-line summary, e.g. `A + 2 B <---> C // kr = 0.1 / s // kf = 1 / s`.
    pub fn display(&self) -> String {
        let side = |species: &[Species], stoich: &[u32]| {
            species
                .iter()
                .zip(stoich)
                .map(|(s, &n)| match n {
                    1 => s.id.clone(),
                    _ => format!("{n} {}", s.id),
                })
                .collect::<Vec<_>>()
                .join(" + ")
        };

        let mut arrow = String::new();
        let mut rates = String::new();
        if self.kr.is_active() {
            arrow.push('<');
            rates.push_str(&format!(" // kr = {}", self.kr));
        }
        arrow.push_str("---");
        if self.kf.is_active() {
            arrow.push('>');
            rates.push_str(&format!(" // kf = {}", self.kf));
        }

        let parts: Vec<String> = [
            side(&self.reactants, &self.stoich_r),
            arrow,
            side(&self.products, &self.stoich_p),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
        format!("{}{rates}", parts.join(" "))
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reaction({})", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn q(value: f64, unit: &str) -> Quantity {
        Quantity::new(value, unit).unwrap()
    }

    #[test]
    fn stoichiometry_length_mismatch() {
        let err = Reaction::irreversible(
            "r",
            vec![Species::new("A")],
            vec![],
            vec![1, 2],
            vec![],
            q(1.0, "1/s"),
        )
        .unwrap_err();
        assert!(matches!(err, RxnError::InvalidReaction { .. }));
    }

    #[test]
    fn zero_stoichiometry_rejected() {
        let res = Reaction::irreversible(
            "r",
            vec![Species::new("A")],
            vec![Species::new("B")],
            vec![0],
            vec![1],
            q(1.0, "1/s"),
        );
        assert!(res.is_err());
    }

    #[test]
    fn negative_rate_rejected() {
        let res = Reaction::irreversible(
            "r",
            vec![Species::new("A")],
            vec![],
            vec![1],
            vec![],
            q(-1.0, "1/s"),
        );
        assert!(res.is_err());
    }

    #[test]
    fn rate_laws() {
        assert_eq!(
            RateLaw::classify(q(1.0, "1/s").dimension(), 2),
            Some(RateLaw::PerSecond)
        );
        assert_eq!(
            RateLaw::classify(q(1.0, "1/(M s)").dimension(), 2),
            Some(RateLaw::Molar)
        );
        assert_eq!(
            RateLaw::classify(q(1.0, "M/s").dimension(), 0),
            Some(RateLaw::Molar)
        );
        assert_eq!(
            RateLaw::classify(q(1.0, "mm/s").dimension(), 2),
            Some(RateLaw::Length { dim: 1 })
        );
        assert_eq!(
            RateLaw::classify(q(1.0, "nm^3/s").dimension(), 2),
            Some(RateLaw::Length { dim: 3 })
        );
        assert_eq!(
            RateLaw::classify(q(1.0, "1/(um s)").dimension(), 0),
            Some(RateLaw::Length { dim: 1 })
        );
        assert_eq!(RateLaw::classify(q(1.0, "nm/s").dimension(), 1), None);
        assert_eq!(RateLaw::classify(q(1.0, "s").dimension(), 1), None);
        assert_eq!(RateLaw::classify(q(1.0, "nm^4/s").dimension(), 2), None);
    }

    #[test]
    fn rates_converted_to_canonical_units() {
        let rxn = Reaction::irreversible(
            "AAC",
            vec![Species::new("A")],
            vec![Species::new("C")],
            vec![2],
            vec![1],
            q(1e-3, "mm/s"),
        )
        .unwrap();
        assert_eq!(rxn.kf.law, RateLaw::Length { dim: 1 });
        assert!(is_close!(rxn.kf.value, 1e3));

        let per_min = Reaction::irreversible(
            "deg",
            vec![Species::new("A")],
            vec![],
            vec![1],
            vec![],
            q(6.0, "1/min"),
        )
        .unwrap();
        assert!(is_close!(per_min.kf.value, 0.1));
    }

    #[test]
    fn unitless_rate_takes_molar_unit() {
        let rxn = Reaction::irreversible(
            "bind",
            vec![Species::new("A"), Species::new("B")],
            vec![Species::new("C")],
            vec![1, 1],
            vec![1],
            Quantity::dimensionless(1e6),
        )
        .unwrap();
        assert_eq!(rxn.kf.law, RateLaw::Molar);
        assert_eq!(rxn.kf.unit(), Unit::parse("1/(M s)").unwrap());
        assert!(!rxn.kr.is_active());
    }

    #[test]
    fn wrong_rate_units_rejected() {
        let err = Reaction::irreversible(
            "deg",
            vec![Species::new("A")],
            vec![],
            vec![1],
            vec![],
            q(1.0, "nm/s"),
        )
        .unwrap_err();
        assert!(matches!(err, RxnError::InvalidRate { .. }));
    }

    #[test]
    fn high_order_rates_rejected_without_panic() {
        let many = |n: usize| vec![Species::new("A"); n];
        let err = Reaction::irreversible(
            "pileup",
            many(1),
            vec![],
            vec![60],
            vec![],
            Quantity::dimensionless(1.0),
        )
        .unwrap_err();
        assert!(matches!(err, RxnError::InvalidRate { .. }));

        let err = Reaction::irreversible(
            "pileup",
            many(2),
            vec![],
            vec![u32::MAX, 1],
            vec![],
            q(1.0, "1/s"),
        )
        .unwrap_err();
        assert!(matches!(err, RxnError::InvalidReaction { .. }));

        assert_eq!(RateLaw::classify(Dimension::new(127, 0, -1, 0), u32::MAX), None);
    }

    #[test]
    fn display_format() {
        let rxn = Reaction::new(
            "r",
            vec![Species::new("A"), Species::new("B")],
            vec![Species::new("C")],
            vec![1, 2],
            vec![1],
            q(0.0, "1/s"),
            q(0.5, "1/s"),
        )
        .unwrap();
        assert_eq!(rxn.display(), "A + 2 B <--- C // kr = 0.5 / s");

        let birth = Reaction::irreversible(
            "birth",
            vec![],
            vec![Species::new("A")],
            vec![],
            vec![1],
            q(1.2, "1/s"),
        )
        .unwrap();
        assert_eq!(birth.display(), "---> A // kf = 1.2 / s");
        assert_eq!(birth.order_forward(), 0);
        assert_eq!(birth.product_ids(), vec!["A"]);
    }

    #[test]
    fn species_properties() {
        let s = Species::new("drug").with_property("charge", -1.0);
        assert_eq!(s.properties["charge"], -1.0);
        assert_eq!(s.to_string(), "Species(drug)");
    }
}
