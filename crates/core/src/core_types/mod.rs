//! Core types and utilities

pub mod gas;
pub mod mixture;
pub mod vec3;

pub use gas::{GasVector, Species, GAS_CONSTANT, MIN_TEMPERATURE, SPECIES_COUNT};
pub use mixture::GasMixture;
pub use vec3::{Vec2, Vec3};
