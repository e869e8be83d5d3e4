//! Physical dimensions used by chemical kinetics.
//!
//! Only the base quantities that appear in reaction-diffusion models are
//! tracked: length, mass, time and amount of substance. Exponents are stored
//! as small integers so that dimensional analysis is exact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer exponents of the base dimensions L, M, T and N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub amount: i8,
}

impl Dimension {
    #[must_use]
    pub const fn new(length: i8, mass: i8, time: i8, amount: i8) -> Self {
        Self {
            length,
            mass,
            time,
            amount,
        }
    }

    pub const DIMENSIONLESS: Self = Self::new(0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(1, 0, 0, 0);
    pub const MASS: Self = Self::new(0, 1, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0);
    pub const AMOUNT: Self = Self::new(0, 0, 0, 1);

    /// L^3
    pub const VOLUME: Self = Self::new(3, 0, 0, 0);
    /// N L^-3, the dimension of a molar concentration.
    pub const CONCENTRATION: Self = Self::new(-3, 0, 0, 1);
    /// T^-1, the dimension of a first-order rate constant.
    pub const FREQUENCY: Self = Self::new(0, 0, -1, 0);

    #[must_use]
    pub const fn is_dimensionless(&self) -> bool {
        self.length == 0 && self.mass == 0 && self.time == 0 && self.amount == 0
    }

    /// `None` when an exponent leaves the `i8` range.
    #[must_use]
    pub fn checked_powi(&self, exp: i32) -> Option<Self> {
        let scale = |e: i8| i8::try_from(i32::from(e).checked_mul(exp)?).ok();
        Some(Self::new(
            scale(self.length)?,
            scale(self.mass)?,
            scale(self.time)?,
            scale(self.amount)?,
        ))
    }

    #[must_use]
    pub fn checked_mul(&self, rhs: Self) -> Option<Self> {
        Some(Self::new(
            self.length.checked_add(rhs.length)?,
            self.mass.checked_add(rhs.mass)?,
            self.time.checked_add(rhs.time)?,
            self.amount.checked_add(rhs.amount)?,
        ))
    }

    #[must_use]
    pub fn checked_div(&self, rhs: Self) -> Option<Self> {
        self.checked_mul(rhs.checked_powi(-1)?)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let parts: Vec<String> = [
            ("L", self.length),
            ("M", self.mass),
            ("T", self.time),
            ("N", self.amount),
        ]
        .into_iter()
        .filter(|(_, exp)| *exp != 0)
        .map(|(sym, exp)| match exp {
            1 => sym.to_string(),
            _ => format!("{sym}^{exp}"),
        })
        .collect();
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concentration_is_amount_per_volume() {
        assert_eq!(
            Dimension::AMOUNT.checked_div(Dimension::VOLUME),
            Some(Dimension::CONCENTRATION)
        );
    }

    #[test]
    fn second_order_rate() {
        // M^-1 s^-1
        let rate = Dimension::CONCENTRATION
            .checked_powi(-1)
            .and_then(|d| d.checked_div(Dimension::TIME))
            .unwrap();
        assert_eq!(rate, Dimension::new(3, 0, -1, -1));
        assert_eq!(format!("{rate}"), "L^3 T^-1 N^-1");
    }

    #[test]
    fn display_dimensionless() {
        assert_eq!(Dimension::DIMENSIONLESS.to_string(), "dimensionless");
        assert_eq!(Dimension::LENGTH.checked_powi(2).unwrap().to_string(), "L^2");
    }

    #[test]
    fn exponents_out_of_range() {
        // L^50 is length^150
        assert_eq!(Dimension::VOLUME.checked_powi(50), None);
        assert_eq!(Dimension::VOLUME.checked_powi(42), Some(Dimension::new(126, 0, 0, 0)));
        let big = Dimension::new(100, 0, 0, 0);
        assert_eq!(big.checked_mul(big), None);
        assert_eq!(Dimension::new(-128, 0, 0, 0).checked_powi(-1), None);
        assert_eq!(Dimension::TIME.checked_powi(i32::MAX), None);
    }
}
