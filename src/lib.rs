//! Command-line runner for rsrxn networks.
//!
//! A run is described by a TOML file (see [`config`]) naming one of the
//! built-in networks of `rsrxn-networks`, the solver and the reporters.

pub mod config;
pub mod run;

pub mod errors;

pub use config::RunConfig;
pub use errors::{CliError, CliResult};
