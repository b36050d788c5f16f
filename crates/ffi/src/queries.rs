use atmos_sim_core::{AtmosSimulation, Cell, SimulationStats, Species};

use crate::error::{AtmosSimErrorCode, DefaultAtmosSimError};
use crate::helpers::{handle_ffi_result_error, instance_from_ptr, track_error, with_sim, world_position};
use crate::instance::AtmosSimInstance;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// FFI-friendly copy of one cell's gas.
/// Keep this layout stable for C/C++/C# consumers.
pub struct GasSnapshot {
    /// Oxygen (mol).
    pub oxygen: f32,
    /// Nitrogen (mol).
    pub nitrogen: f32,
    /// Carbon dioxide (mol).
    pub carbon_dioxide: f32,
    /// Plasma (mol).
    pub plasma: f32,
    /// Temperature (K).
    pub temperature: f32,
    /// Pressure (kPa).
    pub pressure: f32,
    /// Net flow through the cell during the last tick, world x component.
    pub velocity_x: f32,
    /// Net flow through the cell during the last tick, world z component.
    pub velocity_z: f32,
    /// Cell state: 0 active, 1 semiactive, 2 inactive, 3 vacuum, 4 blocked.
    pub state: u8,
    pub breathable: bool,
}

impl From<&Cell> for GasSnapshot {
    fn from(cell: &Cell) -> Self {
        let mixture = cell.mixture();
        let velocity = cell.velocity();
        Self {
            oxygen: mixture.amount(Species::Oxygen),
            nitrogen: mixture.amount(Species::Nitrogen),
            carbon_dioxide: mixture.amount(Species::CarbonDioxide),
            plasma: mixture.amount(Species::Plasma),
            temperature: mixture.temperature(),
            pressure: mixture.pressure(),
            velocity_x: velocity.x,
            velocity_z: velocity.y,
            state: cell.state().as_u8(),
            breathable: mixture.is_breathable(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// FFI-friendly copy of the per-tick statistics.
pub struct AtmosSimStats {
    pub tick: u64,
    pub active_cells: usize,
    pub semiactive_cells: usize,
    pub inactive_cells: usize,
    pub vacuum_cells: usize,
    pub blocked_cells: usize,
    pub device_count: usize,
    /// Moles held by open cells and devices.
    pub total_moles: f32,
    /// Moles lost to vacuum during the last tick.
    pub drained_moles: f32,
    /// Simulated seconds.
    pub simulation_time: f32,
    /// Wall-clock duration of the last tick (ms).
    pub step_time_ms: f32,
    /// No cell is left to process.
    pub stabilized: bool,
}

impl From<&AtmosSimulation> for AtmosSimStats {
    fn from(sim: &AtmosSimulation) -> Self {
        let SimulationStats {
            tick,
            active_cells,
            semiactive_cells,
            inactive_cells,
            vacuum_cells,
            blocked_cells,
            device_count,
            total_moles,
            drained_moles,
            simulation_time,
            step_time_ms,
            ..
        } = *sim.stats();
        Self {
            tick,
            active_cells,
            semiactive_cells,
            inactive_cells,
            vacuum_cells,
            blocked_cells,
            device_count,
            total_moles,
            drained_moles,
            simulation_time,
            step_time_ms,
            stabilized: sim.is_stabilized(),
        }
    }
}

#[no_mangle]
/// Write the pressure (kPa) at a world position into `out_pressure`.
///
/// Positions outside the grid read as 0 kPa.
///
/// Returns
/// - `AtmosSimErrorCode::Ok` (0) on success
/// - `AtmosSimErrorCode::NullPointer` if `ptr` or `out_pressure` is null
/// - `AtmosSimErrorCode::NotBuilt` before the first `atmos_sim_rebuild`
///
/// # Safety
///
/// - `out_pressure` must be a valid, non-null pointer to an `f32`.
pub unsafe extern "C" fn atmos_sim_pressure_at(
    ptr: *const AtmosSimInstance,
    x: f32,
    z: f32,
    out_pressure: *mut f32,
) -> AtmosSimErrorCode {
    if out_pressure.is_null() {
        return track_error(&DefaultAtmosSimError::null_pointer("out_pressure"));
    }

    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let position = world_position(x, z)?;
        with_sim(instance, |sim| {
            let pressure = sim.pressure_at(position);
            unsafe {
                *out_pressure = pressure;
            }
            Ok(())
        })
    })
}

#[no_mangle]
/// Write whether a person could breathe at a world position into `out_breathable`.
///
/// # Safety
///
/// - `out_breathable` must be a valid, non-null pointer to a `bool`.
pub unsafe extern "C" fn atmos_sim_breathable_at(
    ptr: *const AtmosSimInstance,
    x: f32,
    z: f32,
    out_breathable: *mut bool,
) -> AtmosSimErrorCode {
    if out_breathable.is_null() {
        return track_error(&DefaultAtmosSimError::null_pointer("out_breathable"));
    }

    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let position = world_position(x, z)?;
        with_sim(instance, |sim| {
            let breathable = sim.breathable_at(position);
            unsafe {
                *out_breathable = breathable;
            }
            Ok(())
        })
    })
}

#[no_mangle]
/// Fill `out_snapshot` with the gas of the cell at a world position.
///
/// - `out_found` (optional) receives whether a cell exists there. If null, ignored.
///   A missing cell is not an error; `out_snapshot` is zeroed in that case.
///
/// # Safety
///
/// - `out_snapshot` must be a valid, non-null pointer to a `GasSnapshot`.
/// - `out_found` if non-null, must be a valid pointer to a `bool`.
pub unsafe extern "C" fn atmos_sim_gas_at(
    ptr: *const AtmosSimInstance,
    x: f32,
    z: f32,
    out_snapshot: *mut GasSnapshot,
    out_found: *mut bool,
) -> AtmosSimErrorCode {
    if out_snapshot.is_null() {
        return track_error(&DefaultAtmosSimError::null_pointer("out_snapshot"));
    }

    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let position = world_position(x, z)?;
        with_sim(instance, |sim| {
            let cell = sim.cell_at(position);
            unsafe {
                *out_snapshot = cell.map(GasSnapshot::from).unwrap_or_default();
                if !out_found.is_null() {
                    *out_found = cell.is_some();
                }
            }
            Ok(())
        })
    })
}

#[no_mangle]
/// Fill `out_stats` with the statistics of the last tick.
///
/// # Safety
///
/// - `out_stats` must be a valid, non-null pointer to an `AtmosSimStats`.
pub unsafe extern "C" fn atmos_sim_get_stats(
    ptr: *const AtmosSimInstance,
    out_stats: *mut AtmosSimStats,
) -> AtmosSimErrorCode {
    if out_stats.is_null() {
        return track_error(&DefaultAtmosSimError::null_pointer("out_stats"));
    }

    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim(instance, |sim| {
            unsafe {
                *out_stats = AtmosSimStats::from(sim);
            }
            Ok(())
        })
    })
}
