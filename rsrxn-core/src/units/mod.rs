//! Unit-aware quantities.
//!
//! Rates, lengths, volumes and concentrations are handed to the model as
//! [`Quantity`] values and converted once, at construction, into the internal
//! units: nanometres for length, seconds for time and molecule counts for
//! amounts.
//!
//! ```
//! use rsrxn_core::units::{Quantity, Unit};
//!
//! let d = Quantity::new(1.0, "um^2/s").unwrap();
//! let nm2_per_s = Unit::parse("nm^2/s").unwrap();
//! assert!((d.value_in(&nm2_per_s).unwrap() - 1e6).abs() < 1e-6);
//! ```

pub mod dimension;
pub mod parser;
pub mod quantity;
pub mod registry;
pub mod unit;

pub use dimension::Dimension;
pub use parser::ParseError;
pub use quantity::Quantity;
pub use registry::{UnitRegistry, REGISTRY};
pub use unit::{ConversionError, Unit};

use std::sync::LazyLock;

/// Avogadro's number, as used throughout the kinetics.
pub const AVOGADRO: f64 = 6.022e23;

/// Internal length unit.
pub static NM: LazyLock<Unit> = LazyLock::new(|| unit_or_dimensionless("nm"));
/// Internal time unit.
pub static SECOND: LazyLock<Unit> = LazyLock::new(|| unit_or_dimensionless("s"));
/// First-order rate unit.
pub static PER_SECOND: LazyLock<Unit> = LazyLock::new(|| unit_or_dimensionless("1/s"));
pub static MOL: LazyLock<Unit> = LazyLock::new(|| unit_or_dimensionless("mol"));
pub static MOLAR: LazyLock<Unit> = LazyLock::new(|| unit_or_dimensionless("M"));

// The symbols above are all registered, so parsing cannot fail
fn unit_or_dimensionless(symbol: &str) -> Unit {
    Unit::parse(symbol).unwrap_or_else(|_| Unit::dimensionless())
}

/// `nm^power`, the internal unit for lengths, areas and volumes.
pub fn nm_pow(power: i8) -> Unit {
    Unit::nm_s(power, 0)
}

/// `nm^power / s`, the unit of diffusion constants and volume-scaled rates.
pub fn nm_pow_per_second(power: i8) -> Unit {
    Unit::nm_s(power, -1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_units() {
        assert_eq!(NM.dimension(), Dimension::LENGTH);
        assert_eq!(PER_SECOND.dimension(), Dimension::FREQUENCY);
        assert_eq!(nm_pow(3).dimension(), Dimension::VOLUME);
        assert_eq!(nm_pow(1), *NM);
        assert_eq!(nm_pow_per_second(2), Unit::parse("nm^2/s").unwrap());
        assert_eq!(nm_pow_per_second(2).dimension(), Dimension::new(2, 0, -1, 0));
        assert_eq!(MOLAR.dimension(), Dimension::CONCENTRATION);
        assert_eq!(SECOND.dimension(), Dimension::TIME);
        assert_eq!(MOL.dimension(), Dimension::AMOUNT);
    }
}
