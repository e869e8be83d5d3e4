//! Ready-made reaction-diffusion networks for rsrxn.
//!
//! `templates` holds model skeletons and `networks` the worked examples of
//! well-mixed, one dimensional and membrane systems.

pub mod networks;
pub mod templates;

pub use networks::{Network, NetworkConfig, NETWORK_NAMES};
