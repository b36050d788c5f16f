//! Tile layout editing and topology rebuilds.
//!
//! Edits only touch the instance's tile map. The simulation picks them up on
//! the next `atmos_sim_rebuild`.

use atmos_sim_core::{AtmosSimulation, TileCoord, TileKind};
use tracing::debug;

use crate::error::{AtmosSimErrorCode, DefaultAtmosSimError};
use crate::helpers::{handle_ffi_result_error, instance_from_ptr, with_state_mut};
use crate::instance::AtmosSimInstance;

fn tile_kind(kind: u8) -> Result<TileKind, DefaultAtmosSimError> {
    TileKind::from_u8(kind).ok_or_else(|| {
        DefaultAtmosSimError::invalid_parameter(
            "kind",
            &format!("expected 0 (void), 1 (floor), 2 (wall) or 3 (space), got {kind}"),
        )
    })
}

fn ordered(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Result<(TileCoord, TileCoord), DefaultAtmosSimError> {
    if min_x > max_x || min_y > max_y {
        return Err(DefaultAtmosSimError::invalid_parameter(
            "rect",
            &format!("min ({min_x}, {min_y}) must not exceed max ({max_x}, {max_y})"),
        ));
    }
    Ok((TileCoord::new(min_x, min_y), TileCoord::new(max_x, max_y)))
}

/// Set one tile. `kind`: 0 void, 1 floor, 2 wall, 3 space.
///
/// Returns
/// - `AtmosSimErrorCode::Ok` (0) on success
/// - `AtmosSimErrorCode::NullPointer` if `ptr` is null
/// - `AtmosSimErrorCode::InvalidParameter` for an unknown kind
#[no_mangle]
pub extern "C" fn atmos_sim_set_tile(
    ptr: *const AtmosSimInstance,
    x: i32,
    y: i32,
    kind: u8,
) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let kind = tile_kind(kind)?;
        with_state_mut(instance, |state| {
            state.tiles.set(TileCoord::new(x, y), kind);
            Ok(())
        })
    })
}

/// Fill the inclusive rectangle with one tile kind.
#[no_mangle]
pub extern "C" fn atmos_sim_fill_rect(
    ptr: *const AtmosSimInstance,
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
    kind: u8,
) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let kind = tile_kind(kind)?;
        let (min, max) = ordered(min_x, min_y, max_x, max_y)?;
        with_state_mut(instance, |state| {
            state.tiles.fill_rect(min, max, kind);
            Ok(())
        })
    })
}

/// Lay out a walled room: walls on the border of the inclusive rectangle, floor inside.
#[no_mangle]
pub extern "C" fn atmos_sim_fill_room(
    ptr: *const AtmosSimInstance,
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        let (min, max) = ordered(min_x, min_y, max_x, max_y)?;
        with_state_mut(instance, |state| {
            state.tiles.room(min, max);
            Ok(())
        })
    })
}

/// Build the simulation from the current tile map, or rebuild it after edits.
///
/// Gas in enclosed cells whose tile did not change is kept across rebuilds.
///
/// Returns
/// - `AtmosSimErrorCode::Ok` (0) on success
/// - `AtmosSimErrorCode::EmptyTopology` if no tiles have been set
/// - `AtmosSimErrorCode::WorkerPool` if the first build could not start its worker pool
///
/// On failure the previous simulation, if any, is left untouched.
#[no_mangle]
pub extern "C" fn atmos_sim_rebuild(ptr: *const AtmosSimInstance) -> AtmosSimErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_state_mut(instance, |state| {
            match state.sim.as_mut() {
                Some(sim) => sim.rebuild(&state.tiles)?,
                None => {
                    state.sim = Some(AtmosSimulation::new(state.config, &state.tiles)?);
                }
            }
            debug!("Rebuilt atmos instance from {} tiles", state.tiles.len());
            Ok(())
        })
    })
}
