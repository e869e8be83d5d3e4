use rsrxn_core::errors::RxnError;
use thiserror::Error;

/// Errors raised while configuring or carrying out a run.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Model(#[from] RxnError),
    #[error("Could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type CliResult<T> = Result<T, CliError>;
