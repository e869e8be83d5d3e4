//! Compartmental reaction-diffusion networks.
//!
//! Species react inside compartments and move between them through
//! connections. Compartments can be laid out on 1D, 2D or 3D grids
//! (`compartments::CompartmentArray`), collected into a `model::Model` and
//! flattened into a `model::FlatModel`. The flat model defines a
//! `systems::State` which is propagated either deterministically
//! (`systems::OdeSystem`) or stochastically (`systems::GillespieSystem`).

pub mod compartments;
pub mod connections;
pub mod model;
pub mod propagators;
pub mod reactions;
pub mod systems;
pub mod units;

pub mod errors;
