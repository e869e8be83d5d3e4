use crate::units::{ConversionError, ParseError};
use thiserror::Error;

/// Error type for invalid model construction or simulation.
#[derive(Error, Debug)]
pub enum RxnError {
    #[error("{0}")]
    Error(String),
    #[error(transparent)]
    UnitParse(#[from] ParseError),
    #[error(transparent)]
    UnitConversion(#[from] ConversionError),
    #[error("Invalid reaction {id}: {reason}")]
    InvalidReaction { id: String, reason: String },
    #[error("Invalid rate for {context}: {unit} is not an accepted rate unit")]
    InvalidRate { context: String, unit: String },
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),
    #[error("Duplicate identifier: {0}")]
    DuplicateId(String),
    #[error("Compartment {0} does not exist")]
    MissingCompartment(String),
    #[error("No connection from {from} to {to}")]
    MissingConnection { from: String, to: String },
    #[error("Compartment {0} has no volume")]
    MissingVolume(String),
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Periodicity mismatch: {0}")]
    Periodicity(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Missing column {0} in state table")]
    MissingColumn(String),
    #[error("Unknown state index {0}")]
    UnknownIndex(usize),
    #[error("Integration failed: {0}")]
    Integration(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type for `Result<T, RxnError>`.
pub type RxnResult<T> = Result<T, RxnError>;
