use atmos_sim_core::Species;

use crate::error::{AtmosSimErrorCode, DefaultAtmosSimError};
use crate::helpers::{
    handle_ffi_result_error, instance_from_ptr, with_sim_mut, world_position,
};
use crate::instance::AtmosSimInstance;

fn species(value: u8) -> Result<Species, DefaultAtmosSimError> {
    Species::from_u8(value).ok_or_else(|| {
        DefaultAtmosSimError::invalid_parameter(
            "species",
            &format!("expected 0 (O2), 1 (N2), 2 (CO2) or 3 (plasma), got {value}"),
        )
    })
}

/// Advance the clock by `dt` seconds, running a tick when the update interval elapsed.
///
/// Thread-safe: acquires the write lock.
///
/// If `ptr` is null, `dt` is non-finite or non-positive, or the simulation is
/// not built yet, this function is a no-op.
#[no_mangle]
pub extern "C" fn atmos_sim_update(ptr: *const AtmosSimInstance, dt: f32) {
    if !dt.is_finite() || dt <= 0.0 {
        return;
    }

    // Silently ignore errors for void-returning function
    let _ = handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim_mut(instance, |sim| {
            sim.update(dt);
            Ok(())
        })
    });
}

/// Run exactly one tick regardless of the clock.
///
/// Returns
/// - `AtmosSimErrorCode::Ok` (0) on success
/// - `AtmosSimErrorCode::NullPointer` if `ptr` is null
/// - `AtmosSimErrorCode::NotBuilt` before the first `atmos_sim_rebuild`
#[no_mangle]
pub extern "C" fn atmos_sim_step(ptr: *const AtmosSimInstance) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim_mut(instance, |sim| {
            sim.step();
            Ok(())
        })
    })
}

/// Add `amount` moles of one species at a world position and wake the cell.
///
/// `species`: 0 oxygen, 1 nitrogen, 2 carbon dioxide, 3 plasma.
///
/// Returns
/// - `AtmosSimErrorCode::Ok` (0) on success (gas put into vacuum is lost)
/// - `AtmosSimErrorCode::InvalidParameter` for an unknown species or a bad amount
/// - `AtmosSimErrorCode::NoCell` outside the grid
/// - `AtmosSimErrorCode::CellBlocked` for a wall
#[no_mangle]
pub extern "C" fn atmos_sim_inject_gas(
    ptr: *const AtmosSimInstance,
    x: f32,
    z: f32,
    species_id: u8,
    amount: f32,
) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let species = species(species_id)?;
        let position = world_position(x, z)?;
        with_sim_mut(instance, |sim| {
            sim.inject_gas(position, species, amount).map_err(Into::into)
        })
    })
}

/// Heat the cell at a world position towards `source_temperature` (kelvin).
#[no_mangle]
pub extern "C" fn atmos_sim_add_heat(
    ptr: *const AtmosSimInstance,
    x: f32,
    z: f32,
    source_temperature: f32,
) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let position = world_position(x, z)?;
        with_sim_mut(instance, |sim| {
            sim.add_heat_at(position, source_temperature)
                .map_err(Into::into)
        })
    })
}

/// Cool the cell at a world position towards `sink_temperature` (kelvin).
#[no_mangle]
pub extern "C" fn atmos_sim_remove_heat(
    ptr: *const AtmosSimInstance,
    x: f32,
    z: f32,
    sink_temperature: f32,
) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let position = world_position(x, z)?;
        with_sim_mut(instance, |sim| {
            sim.remove_heat_at(position, sink_temperature)
                .map_err(Into::into)
        })
    })
}

/// Force every open cell back to Active.
#[no_mangle]
pub extern "C" fn atmos_sim_wake_all(ptr: *const AtmosSimInstance) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_sim_mut(instance, |sim| {
            sim.wake_all();
            Ok(())
        })
    })
}
