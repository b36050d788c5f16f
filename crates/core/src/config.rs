//! Simulation configuration
//!
//! All thresholds that stabilise the cell state machine live here so hosts can
//! tune them without touching the solvers. Values are validated once when an
//! [`crate::AtmosSimulation`] is created.

use crate::core_types::gas::DEFAULT_VOLUME;
use crate::error::{AtmosError, AtmosResult};
use crate::solver::SolverParams;
use serde::{Deserialize, Serialize};

/// How newly created enclosed cells are filled at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InitialFill {
    /// Standard breathable air
    #[default]
    Air,
    /// No gas at all
    Empty,
    /// Random amounts around air composition, reproducible from the seed
    Random { seed: u64 },
}

/// Configuration for [`crate::AtmosSimulation`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosConfig {
    /// Elapsed time between ticks (seconds)
    pub update_rate: f32,

    /// Fraction of the ideal-gas transfer applied per tick
    pub timestep: f32,

    /// Minimum directional pressure difference that drives flux (kPa)
    pub pressure_epsilon: f32,

    /// Total directional flux below which an Active cell counts as settled (mol)
    pub flux_epsilon: f32,

    /// Transfers smaller than this are dropped (mol)
    pub min_mole_transfer: f32,

    /// Diffusion rate for Semiactive mixing
    pub mix_rate: f32,

    /// Thermal conduction factor
    pub thermal_base: f32,

    /// Minimum temperature transfer (K)
    pub thermal_epsilon: f32,

    /// Volume of every grid cell
    pub cell_volume: f32,

    /// Allowed drift in total moles per tick before the debug check reports it
    pub conservation_tolerance: f32,

    /// Cells per parallel work unit
    pub batch_size: usize,

    /// Size of a dedicated worker pool, `None` to use the global rayon pool
    pub worker_threads: Option<usize>,

    /// Enclosed cells on the edge of the map (missing a neighbour) open to space
    pub edge_is_space: bool,

    /// Contents of enclosed cells created by a build or rebuild
    pub initial_fill: InitialFill,
}

impl Default for AtmosConfig {
    fn default() -> Self {
        Self {
            update_rate: 0.1,
            timestep: 0.1,
            pressure_epsilon: 0.01,
            flux_epsilon: 0.025,
            min_mole_transfer: 0.001,
            mix_rate: 0.1,
            thermal_base: 0.024,
            thermal_epsilon: 0.01,
            cell_volume: DEFAULT_VOLUME,
            conservation_tolerance: 0.1,
            batch_size: 256,
            worker_threads: None,
            edge_is_space: false,
            initial_fill: InitialFill::Air,
        }
    }
}

impl AtmosConfig {
    /// Check every field for a usable range
    ///
    /// # Errors
    ///
    /// Returns [`AtmosError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> AtmosResult<()> {
        positive("update_rate", self.update_rate)?;
        positive("cell_volume", self.cell_volume)?;
        non_negative("pressure_epsilon", self.pressure_epsilon)?;
        non_negative("flux_epsilon", self.flux_epsilon)?;
        non_negative("min_mole_transfer", self.min_mole_transfer)?;
        non_negative("thermal_epsilon", self.thermal_epsilon)?;
        non_negative("conservation_tolerance", self.conservation_tolerance)?;

        // Rates above 1 move more than the difference and oscillate
        unit_interval("timestep", self.timestep)?;
        unit_interval("mix_rate", self.mix_rate)?;
        unit_interval("thermal_base", self.thermal_base)?;

        if self.batch_size == 0 {
            return Err(AtmosError::config("batch_size", "must be at least 1"));
        }
        if self.worker_threads == Some(0) {
            return Err(AtmosError::config(
                "worker_threads",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Solver thresholds derived from this config
    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            timestep: self.timestep,
            pressure_epsilon: self.pressure_epsilon,
            flux_epsilon: self.flux_epsilon,
            min_mole_transfer: self.min_mole_transfer,
            mix_rate: self.mix_rate,
            thermal_base: self.thermal_base,
            thermal_epsilon: self.thermal_epsilon,
        }
    }
}

fn positive(field: &'static str, value: f32) -> AtmosResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AtmosError::config(field, format!("must be > 0, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> AtmosResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AtmosError::config(field, format!("must be >= 0, got {value}")))
    }
}

fn unit_interval(field: &'static str, value: f32) -> AtmosResult<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(AtmosError::config(
            field,
            format!("must be in (0, 1], got {value}"),
        ))
    }
}
