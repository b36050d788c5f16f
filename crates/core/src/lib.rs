//! Atmosphere Simulation Core Library
//!
//! Per-tile gas simulation for grid-based worlds. Every enclosed tile holds a gas
//! mixture that exchanges mass and heat with its four orthogonal neighbours each
//! tick, converging towards pressure and thermal equilibrium while conserving
//! total moles.
//!
//! ## Structure
//!
//! - [`core_types`]: gas species, [`GasMixture`] and the ideal gas law
//! - [`grid`]: cells and their state machine, the tile boundary and the chunked
//!   [`Topology`] with its neighbour table
//! - [`solver`]: pure flux, mixing and thermal solvers
//! - [`simulation`]: [`AtmosSimulation`], the tick scheduler, devices and
//!   persistence records
//!
//! ## Example
//!
//! ```rust
//! use atmos_sim_core::{AtmosConfig, AtmosSimulation, TileCoord, TileKind, TileMap, Vec3};
//!
//! let mut map = TileMap::new(16, 16);
//! map.room(TileCoord::new(0, 0), TileCoord::new(6, 6));
//! let mut sim = AtmosSimulation::new(AtmosConfig::default(), &map).unwrap();
//!
//! // Open the east wall to space
//! map.set(TileCoord::new(6, 3), TileKind::Space);
//! sim.rebuild(&map).unwrap();
//! for _ in 0..10 {
//!     sim.step();
//! }
//! assert!(sim.pressure_at(Vec3::new(5.0, 0.0, 3.0)) < 101.0);
//! ```

pub mod config;
pub mod core_types;
pub mod error;
pub mod grid;
pub mod simulation;
pub mod solver;

pub use config::{AtmosConfig, InitialFill};
pub use core_types::{GasMixture, GasVector, Species, Vec2, Vec3};
pub use error::{AtmosError, AtmosResult};
pub use grid::{
    Cell, CellIndex, CellState, ChunkKey, Direction, TileCoord, TileKind, TileMap, TileSource,
    Topology,
};
pub use simulation::{
    AtmosDevice, AtmosSimulation, Canister, CellRecord, DeviceId, DeviceLink, Pipe,
    SimulationStats,
};
