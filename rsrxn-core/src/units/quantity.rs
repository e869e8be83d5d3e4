//! Values carrying a unit.

use super::dimension::Dimension;
use super::parser::ParseError;
use super::unit::{ConversionError, Unit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;

/// A value with a unit, e.g. `0.1 uM` or `1e-3 nm^2/s`.
///
/// Serialises as the string `"<value> <unit>"`, so configuration files can
/// write quantities the way they are written on paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: &str) -> Result<Self, ParseError> {
        Ok(Self {
            value,
            unit: Unit::parse(unit)?,
        })
    }

    pub fn with_unit(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn dimensionless(value: f64) -> Self {
        Self {
            value,
            unit: Unit::dimensionless(),
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.unit.dimension()
    }

    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_dimensionless()
    }

    pub fn is_compatible(&self, unit: &Unit) -> bool {
        self.unit.is_compatible(unit)
    }

    /// The same quantity expressed in `unit`.
    pub fn to(&self, unit: &Unit) -> Result<Self, ConversionError> {
        Ok(Self {
            value: self.value_in(unit)?,
            unit: unit.clone(),
        })
    }

    /// The magnitude of this quantity in `unit`.
    pub fn value_in(&self, unit: &Unit) -> Result<f64, ConversionError> {
        Ok(self.value * self.unit.conversion_factor(unit)?)
    }

    /// Like [`Quantity::value_in`], parsing the target unit first.
    pub fn value_in_str(&self, unit: &str) -> Result<f64, ConversionError> {
        self.value_in(&Unit::parse(unit)?)
    }

    pub fn powi(&self, exp: i32) -> Result<Self, ParseError> {
        Ok(Self {
            value: self.value.powi(exp),
            unit: self.unit.powi(exp)?,
        })
    }

    /// Product of two quantities. Fails when the combined unit has an
    /// exponent out of range.
    pub fn checked_mul(&self, rhs: &Quantity) -> Result<Self, ParseError> {
        Ok(Self::with_unit(self.value * rhs.value, self.unit.checked_mul(&rhs.unit)?))
    }

    pub fn checked_div(&self, rhs: &Quantity) -> Result<Self, ParseError> {
        Ok(Self::with_unit(self.value / rhs.value, self.unit.checked_div(&rhs.unit)?))
    }

    /// `n` evenly spaced values from `start` to `stop` inclusive, in `unit`.
    pub fn linspace(start: f64, stop: f64, n: usize, unit: &Unit) -> Vec<Quantity> {
        match n {
            0 => Vec::new(),
            1 => vec![Self::with_unit(start, unit.clone())],
            _ => {
                let step = (stop - start) / (n - 1) as f64;
                (0..n)
                    .map(|i| Self::with_unit(start + step * i as f64, unit.clone()))
                    .collect()
            }
        }
    }
}

impl Mul<f64> for &Quantity {
    type Output = Quantity;

    fn mul(self, rhs: f64) -> Quantity {
        Quantity::with_unit(self.value * rhs, self.unit.clone())
    }
}

impl Div<f64> for &Quantity {
    type Output = Quantity;

    fn div(self, rhs: f64) -> Quantity {
        Quantity::with_unit(self.value / rhs, self.unit.clone())
    }
}

impl FromStr for Quantity {
    type Err = ParseError;

    /// Parses `"<value>"` or `"<value> <unit>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, unit) = match s.split_once(char::is_whitespace) {
            Some((number, unit)) => (number, unit.trim()),
            None => (s, ""),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| ParseError::Incomplete(s.to_string()))?;
        if unit.is_empty() {
            Ok(Self::dimensionless(value))
        } else if unit.starts_with('/') {
            // "0.1 / s" as written by Display
            Self::new(value, &format!("1 {unit}"))
        } else {
            Self::new(value, unit)
        }
    }
}

impl TryFrom<String> for Quantity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.terms().is_empty() {
            return write!(f, "{}", self.value);
        }
        let unit = self.unit.to_string();
        match unit.strip_prefix("1 / ") {
            Some(denominator) => write!(f, "{} / {}", self.value, denominator),
            None => write!(f, "{} {}", self.value, unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    #[test]
    fn convert_concentration() {
        let c = Quantity::new(1.0, "uM").unwrap();
        assert_relative_eq!(c.value_in_str("nM").unwrap(), 1000.0);
        assert_relative_eq!(c.value_in_str("mol/L").unwrap(), 1e-6);
    }

    #[test]
    fn amount_from_concentration_and_volume() {
        let c = Quantity::new(2.0, "M").unwrap();
        let v = Quantity::new(1e3, "nm^3").unwrap();
        let n = c.checked_mul(&v).unwrap();
        assert_eq!(n.dimension(), Dimension::AMOUNT);
        // 1000 nm^3 is 1e-24 L
        assert_relative_eq!(n.value_in_str("mol").unwrap(), 2e-21, max_relative = 1e-12);
    }

    #[test]
    fn parse_from_string() {
        let q: Quantity = "1e-3 nm^2/s".parse().unwrap();
        assert_relative_eq!(q.value, 1e-3);
        assert_eq!(q.unit, Unit::parse("nm^2 s^-1").unwrap());

        let n: Quantity = "42".parse().unwrap();
        assert!(n.is_dimensionless());
        assert_eq!(n.to_string(), "42");

        assert!("fast 1/s".parse::<Quantity>().is_err());

        let k: Quantity = "0.1 / s".parse().unwrap();
        assert_eq!(k.to_string(), "0.1 / s");
        assert_eq!(k.unit, Unit::parse("1/s").unwrap());

        assert!(matches!(
            "1 L^50".parse::<Quantity>(),
            Err(ParseError::InvalidExponent(_))
        ));
    }

    #[test]
    fn second_order_rate_survives_serde() {
        let k = Quantity::new(2.0, "1/(M s)").unwrap();
        assert_eq!(k.to_string(), "2 / (M s)");
        let back: Quantity = k.to_string().parse().unwrap();
        assert_eq!(back, k);
        assert_eq!(back.dimension().time, -1);

        let json = serde_json::to_string(&k).unwrap();
        let from_json: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json, k);

        let per_length = Quantity::new(0.012, "1/(um s)").unwrap();
        let toml_text = toml::to_string(&BTreeMap::from([("k", per_length.clone())])).unwrap();
        let from_toml: BTreeMap<String, Quantity> = toml::from_str(&toml_text).unwrap();
        assert_eq!(from_toml["k"], per_length);
    }

    #[test]
    fn linspace_boundaries() {
        let nm = Unit::parse("nm").unwrap();
        let b = Quantity::linspace(0.0, 100.0, 11, &nm);
        assert_eq!(b.len(), 11);
        assert_relative_eq!(b[1].value, 10.0);
        assert_relative_eq!(b[10].value, 100.0);
        assert!(Quantity::linspace(0.0, 1.0, 0, &nm).is_empty());
    }

    #[test]
    fn powers_and_scalars() {
        let d = Quantity::new(10.0, "nm").unwrap();
        let vol = d.powi(3).unwrap();
        assert_relative_eq!(vol.value_in_str("L").unwrap(), 1e-24, max_relative = 1e-12);
        let half = &d / 2.0;
        assert_relative_eq!(half.value, 5.0);
    }
}
