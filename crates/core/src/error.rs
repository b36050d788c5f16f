//! Error types for the atmosphere core
//!
//! Only startup and API-boundary failures are errors. Numerical trouble inside a
//! tick is clamped and logged by the solvers instead of being propagated.

use thiserror::Error;

/// Result alias used by every fallible entry point
pub type AtmosResult<T> = Result<T, AtmosError>;

/// Errors returned by the atmosphere API
#[derive(Error, Debug)]
pub enum AtmosError {
    /// The tile source produced no chunks, so there is nothing to simulate
    #[error("topology has no chunks; the tile source must provide at least one")]
    EmptyTopology,

    /// A configuration value is out of range
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// No cell exists at the requested world position
    #[error("no atmos cell at world position ({x}, {z})")]
    NoCellAt { x: f32, z: f32 },

    /// The addressed cell is a wall and cannot hold gas
    #[error("atmos cell is blocked")]
    CellBlocked,

    /// A gas amount was negative or not finite
    #[error("invalid gas amount {0}")]
    InvalidAmount(f32),

    /// No device is registered under this handle
    #[error("unknown device handle {0}")]
    UnknownDevice(usize),

    /// The dedicated worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl AtmosError {
    /// Shorthand for [`AtmosError::InvalidConfig`]
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
