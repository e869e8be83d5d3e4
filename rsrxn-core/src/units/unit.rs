//! The [`Unit`] type: parsed terms plus their resolved dimension and SI factor.

use super::dimension::Dimension;
use super::parser::{combine, parse_terms, ParseError, Terms};
use super::registry::REGISTRY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("cannot convert from '{from}' to '{to}': incompatible dimensions ({from_dim} vs {to_dim})")]
    Incompatible {
        from: String,
        to: String,
        from_dim: Dimension,
        to_dim: Dimension,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A unit of measure.
///
/// Equality is physical: `M` equals `mol/L` and `1/s` equals `s^-1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Unit {
    terms: Terms,
    dimension: Dimension,
    to_si: f64,
}

impl Unit {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Self::from_terms(parse_terms(input)?)
    }

    pub fn dimensionless() -> Self {
        Self {
            terms: Terms::new(),
            dimension: Dimension::DIMENSIONLESS,
            to_si: 1.0,
        }
    }

    fn from_terms(terms: Terms) -> Result<Self, ParseError> {
        let mut dimension = Dimension::DIMENSIONLESS;
        let mut to_si = 1.0;
        for (symbol, &exp) in &terms {
            let def = REGISTRY
                .lookup(symbol)
                .ok_or_else(|| ParseError::UnknownUnit(symbol.clone()))?;
            dimension = def
                .dimension
                .checked_powi(exp)
                .and_then(|d| dimension.checked_mul(d))
                .ok_or_else(|| ParseError::InvalidExponent(format!("{symbol}^{exp}")))?;
            to_si *= def.to_si.powi(exp);
        }
        Ok(Self {
            terms,
            dimension,
            to_si,
        })
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Factor converting a value in this unit to SI base units.
    pub fn to_si_factor(&self) -> f64 {
        self.to_si
    }

    pub fn terms(&self) -> &Terms {
        &self.terms
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_dimensionless()
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Factor `f` such that `x [self] == x * f [target]`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, ConversionError> {
        if !self.is_compatible(target) {
            return Err(ConversionError::Incompatible {
                from: self.to_string(),
                to: target.to_string(),
                from_dim: self.dimension,
                to_dim: target.dimension,
            });
        }
        Ok(self.to_si / target.to_si)
    }

    /// `nm^length s^time`, built without parsing. Only the internal length
    /// and rate units go through here, so exponents stay small.
    pub(crate) fn nm_s(length: i8, time: i8) -> Self {
        let terms: Terms = [("nm", length), ("s", time)]
            .into_iter()
            .filter(|(_, e)| *e != 0)
            .map(|(s, e)| (s.to_string(), i32::from(e)))
            .collect();
        Self {
            terms,
            dimension: Dimension::new(length, 0, time, 0),
            to_si: 1e-9f64.powi(i32::from(length)),
        }
    }

    pub fn powi(&self, exp: i32) -> Result<Self, ParseError> {
        let overflow = || ParseError::InvalidExponent(format!("({self})^{exp}"));
        let terms = self
            .terms
            .iter()
            .filter(|_| exp != 0)
            .map(|(s, e)| e.checked_mul(exp).map(|e| (s.clone(), e)))
            .collect::<Option<Terms>>()
            .ok_or_else(overflow)?;
        Ok(Self {
            terms,
            dimension: self.dimension.checked_powi(exp).ok_or_else(overflow)?,
            to_si: self.to_si.powi(exp),
        })
    }

    pub fn checked_mul(&self, other: &Unit) -> Result<Self, ParseError> {
        self.combined(other, 1)
    }

    pub fn checked_div(&self, other: &Unit) -> Result<Self, ParseError> {
        self.combined(other, -1)
    }

    fn combined(&self, other: &Unit, sign: i32) -> Result<Self, ParseError> {
        let op = if sign > 0 { "*" } else { "/" };
        let overflow = || ParseError::InvalidExponent(format!("({self}) {op} ({other})"));
        let mut terms = self.terms.clone();
        combine(&mut terms, &other.terms, sign).ok_or_else(overflow)?;
        let dimension = if sign > 0 {
            self.dimension.checked_mul(other.dimension)
        } else {
            self.dimension.checked_div(other.dimension)
        };
        Ok(Self {
            terms,
            dimension: dimension.ok_or_else(overflow)?,
            to_si: self.to_si * other.to_si.powi(sign),
        })
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && (self.to_si - other.to_si).abs() <= 1e-12 * self.to_si.abs().max(other.to_si.abs())
    }
}

impl FromStr for Unit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Unit {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.to_string()
    }
}

impl fmt::Display for Unit {
    /// Positive exponents first, then `/` and the negative ones. A
    /// denominator of several terms is bracketed, since `a / b c` parses as
    /// `(a / b) c`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |positive: bool| -> Vec<String> {
            self.terms
                .iter()
                .filter(|(_, e)| (**e > 0) == positive)
                .map(|(s, e)| match e.unsigned_abs() {
                    1 => s.clone(),
                    n => format!("{s}^{n}"),
                })
                .collect()
        };
        let num = match render(true) {
            parts if parts.is_empty() => "1".to_string(),
            parts => parts.join(" "),
        };
        let den = render(false);
        match den.len() {
            0 => write!(f, "{num}"),
            1 => write!(f, "{num} / {}", den[0]),
            _ => write!(f, "{num} / ({})", den.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn physical_equality() {
        assert_eq!(Unit::parse("M").unwrap(), Unit::parse("mol/L").unwrap());
        assert_eq!(Unit::parse("1/s").unwrap(), Unit::parse("s^-1").unwrap());
        assert_ne!(Unit::parse("nm").unwrap(), Unit::parse("um").unwrap());
    }

    #[test]
    fn conversion_factors() {
        let um = Unit::parse("um").unwrap();
        let nm = Unit::parse("nm").unwrap();
        assert!(is_close!(um.conversion_factor(&nm).unwrap(), 1000.0));

        let l = Unit::parse("L").unwrap();
        let nm3 = Unit::parse("nm^3").unwrap();
        assert!(is_close!(l.conversion_factor(&nm3).unwrap(), 1e24));

        let per_min = Unit::parse("1/min").unwrap();
        let per_s = Unit::parse("1/s").unwrap();
        assert!(is_close!(per_min.conversion_factor(&per_s).unwrap(), 1.0 / 60.0));
    }

    #[test]
    fn incompatible_conversion() {
        let err = Unit::parse("nm")
            .unwrap()
            .conversion_factor(&Unit::parse("s").unwrap())
            .unwrap_err();
        assert!(matches!(err, ConversionError::Incompatible { .. }));
        assert!(err.to_string().contains("incompatible dimensions"));
    }

    #[test]
    fn algebra() {
        let m = Unit::parse("M").unwrap();
        let s = Unit::parse("s").unwrap();
        let rate = m.powi(-1).unwrap().checked_div(&s).unwrap();
        assert_eq!(rate, Unit::parse("1/(M s)").unwrap());
        assert_eq!(rate.to_string(), "1 / (M s)");

        let nm = Unit::parse("nm").unwrap();
        let area = nm.checked_mul(&nm).unwrap();
        assert_eq!(area.to_string(), "nm^2");
        assert_eq!(area.dimension(), Dimension::LENGTH.checked_powi(2).unwrap());
        assert!(s.powi(0).unwrap().is_dimensionless());
        assert_eq!(Unit::nm_s(3, -1), Unit::parse("nm^3/s").unwrap());
        assert_eq!(Unit::nm_s(-2, 0).to_string(), "1 / nm^2");
    }

    #[test]
    fn display_parses_back() {
        for input in ["1/(M s)", "M^-2 s^-1", "mol nm^2/(L s^2)", "1/(um s)", "nm^3/s", "M", "1"] {
            let unit = Unit::parse(input).unwrap();
            let reparsed = Unit::parse(&unit.to_string()).unwrap();
            assert_eq!(reparsed.dimension(), unit.dimension(), "{input} -> {unit}");
            assert_eq!(reparsed, unit, "{input} -> {unit}");
        }
        let unit: Unit = serde_json::from_str("\"1/(M s)\"").unwrap();
        let json = serde_json::to_string(&unit).unwrap();
        assert_eq!(json, "\"1 / (M s)\"");
        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dimension(), Dimension::new(3, 0, -1, -1));
    }

    #[test]
    fn exponent_overflow_is_an_error() {
        assert!(matches!(Unit::parse("L^50"), Err(ParseError::InvalidExponent(_))));
        let l40 = Unit::parse("L^40").unwrap();
        assert!(matches!(l40.checked_mul(&l40), Err(ParseError::InvalidExponent(_))));
        assert!(matches!(l40.powi(2), Err(ParseError::InvalidExponent(_))));
        let s = Unit::parse("s").unwrap();
        assert!(matches!(s.powi(200), Err(ParseError::InvalidExponent(_))));
        assert_eq!(s.powi(-3).unwrap(), Unit::parse("s^-3").unwrap());
    }

    #[test]
    fn serde_as_string() {
        let unit: Unit = serde_json::from_str("\"nm^2/s\"").unwrap();
        assert_eq!(unit, Unit::parse("nm^2 s^-1").unwrap());
        assert_eq!(serde_json::to_string(&unit).unwrap(), "\"nm^2 / s\"");
    }
}
