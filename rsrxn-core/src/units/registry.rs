//! Registry of unit symbols used in chemical kinetics.
//!
//! Every entry carries its dimension and the factor that converts a value in
//! that unit into SI base units (m, kg, s, mol). Symbols may carry one of the
//! SI prefixes listed in [`PREFIXES`]; mega and larger are left out so that
//! `M` always means molar.

use super::dimension::Dimension;
use std::collections::HashMap;
use std::sync::LazyLock;

/// A known unit symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDef {
    pub symbol: String,
    pub dimension: Dimension,
    pub to_si: f64,
}

/// Accepted prefixes, longest first so that `da` wins over `d`.
pub static PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("k", 1e3),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("\u{00B5}", 1e-6),
    ("\u{03BC}", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
];

pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_DAY: f64 = 86400.0;
/// Cubic metres per litre.
pub const M3_PER_LITRE: f64 = 1e-3;

/// The global unit registry.
pub static REGISTRY: LazyLock<UnitRegistry> = LazyLock::new(UnitRegistry::new);

#[derive(Debug)]
pub struct UnitRegistry {
    units: HashMap<&'static str, (Dimension, f64)>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            units: HashMap::new(),
            aliases: HashMap::new(),
        };

        registry.define("1", Dimension::DIMENSIONLESS, 1.0);
        registry.define("m", Dimension::LENGTH, 1.0);
        registry.define("g", Dimension::MASS, 1e-3);
        registry.define("s", Dimension::TIME, 1.0);
        registry.define("min", Dimension::TIME, SECONDS_PER_MINUTE);
        registry.define("h", Dimension::TIME, SECONDS_PER_HOUR);
        registry.define("day", Dimension::TIME, SECONDS_PER_DAY);
        registry.define("mol", Dimension::AMOUNT, 1.0);
        registry.define("L", Dimension::VOLUME, M3_PER_LITRE);
        registry.define("M", Dimension::CONCENTRATION, 1.0 / M3_PER_LITRE);

        for (alias, symbol) in [
            ("dimensionless", "1"),
            ("count", "1"),
            ("counts", "1"),
            ("molecule", "1"),
            ("molecules", "1"),
            ("meter", "m"),
            ("metre", "m"),
            ("micrometer", "um"),
            ("micron", "um"),
            ("nanometer", "nm"),
            ("gram", "g"),
            ("sec", "s"),
            ("second", "s"),
            ("seconds", "s"),
            ("minute", "min"),
            ("minutes", "min"),
            ("hr", "h"),
            ("hour", "h"),
            ("hours", "h"),
            ("days", "day"),
            ("mole", "mol"),
            ("l", "L"),
            ("liter", "L"),
            ("litre", "L"),
            ("molar", "M"),
        ] {
            registry.aliases.insert(alias, symbol);
        }
        registry
    }

    fn define(&mut self, symbol: &'static str, dimension: Dimension, to_si: f64) {
        self.units.insert(symbol, (dimension, to_si));
    }

    /// Resolves a symbol, trying exact names, aliases and then prefixed forms.
    pub fn lookup(&self, symbol: &str) -> Option<UnitDef> {
        if let Some(def) = self.lookup_unprefixed(symbol) {
            return Some(def);
        }
        PREFIXES.iter().find_map(|(prefix, factor)| {
            let base = symbol.strip_prefix(prefix)?;
            let base = self.aliases.get(base).copied().unwrap_or(base);
            // Prefixes never stack and never apply to the dimensionless unit
            if base == "1" {
                return None;
            }
            let def = self.units.get(base)?;
            Some(UnitDef {
                symbol: symbol.to_string(),
                dimension: def.0,
                to_si: def.1 * factor,
            })
        })
    }

    fn lookup_unprefixed(&self, symbol: &str) -> Option<UnitDef> {
        let canonical = self.aliases.get(symbol).copied().unwrap_or(symbol);
        if let Some((dimension, to_si)) = self.units.get(canonical) {
            return Some(UnitDef {
                symbol: canonical.to_string(),
                dimension: *dimension,
                to_si: *to_si,
            });
        }
        // Aliases may point at prefixed symbols, e.g. nanometer -> nm
        if canonical != symbol {
            return self.lookup(canonical);
        }
        None
    }

    pub fn is_known(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_some()
    }
}
