//! C ABI over the atmos simulation core.
//!
//! Every entry point takes the opaque `AtmosSimInstance` pointer returned by
//! `atmos_sim_new`, returns an `AtmosSimErrorCode`, and leaves a message for
//! `atmos_sim_get_last_error` when it fails. The header is generated by
//! `cbindgen` at build time.

mod error;
mod helpers;
mod instance;
mod queries;
mod simulation;
mod tiles;

pub use error::{atmos_sim_get_last_error, atmos_sim_get_last_error_code, AtmosSimErrorCode};
pub use instance::{
    atmos_sim_default_settings, atmos_sim_destroy, atmos_sim_new, AtmosSimInstance,
    AtmosSimSettings,
};
pub use queries::{
    atmos_sim_breathable_at, atmos_sim_gas_at, atmos_sim_get_stats, atmos_sim_pressure_at,
    AtmosSimStats, GasSnapshot,
};
pub use simulation::{
    atmos_sim_add_heat, atmos_sim_inject_gas, atmos_sim_remove_heat, atmos_sim_step,
    atmos_sim_update, atmos_sim_wake_all,
};
pub use tiles::{atmos_sim_fill_rect, atmos_sim_fill_room, atmos_sim_rebuild, atmos_sim_set_tile};

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::ptr;

    fn new_instance() -> *mut AtmosSimInstance {
        let mut instance = ptr::null_mut();
        let code = unsafe { atmos_sim_new(atmos_sim_default_settings(), &mut instance) };
        assert_eq!(code, AtmosSimErrorCode::Ok);
        assert!(!instance.is_null());
        instance
    }

    fn pressure(sim: *const AtmosSimInstance, x: f32, z: f32) -> f32 {
        let mut pressure = -1.0;
        let code = unsafe { atmos_sim_pressure_at(sim, x, z, &mut pressure) };
        assert_eq!(code, AtmosSimErrorCode::Ok);
        pressure
    }

    #[test]
    fn test_room_lifecycle() {
        let sim = new_instance();
        assert_eq!(atmos_sim_fill_room(sim, 0, 0, 9, 9), AtmosSimErrorCode::Ok);
        assert_eq!(atmos_sim_step(sim), AtmosSimErrorCode::NotBuilt);
        assert_eq!(atmos_sim_rebuild(sim), AtmosSimErrorCode::Ok);

        assert!((pressure(sim, 5.0, 5.0) - 101.35).abs() < 0.1);
        let mut breathable = false;
        let code = unsafe { atmos_sim_breathable_at(sim, 5.0, 5.0, &mut breathable) };
        assert_eq!(code, AtmosSimErrorCode::Ok);
        assert!(breathable);

        // Breach the east wall and let it vent
        assert_eq!(atmos_sim_set_tile(sim, 9, 5, 3), AtmosSimErrorCode::Ok);
        assert_eq!(atmos_sim_rebuild(sim), AtmosSimErrorCode::Ok);
        for _ in 0..20 {
            assert_eq!(atmos_sim_step(sim), AtmosSimErrorCode::Ok);
        }
        assert!(pressure(sim, 8.0, 5.0) < 100.0);

        let mut stats = AtmosSimStats::default();
        let code = unsafe { atmos_sim_get_stats(sim, &mut stats) };
        assert_eq!(code, AtmosSimErrorCode::Ok);
        assert_eq!(stats.tick, 20);
        assert!(stats.vacuum_cells >= 1);

        unsafe { atmos_sim_destroy(sim) };
    }

    #[test]
    fn test_gas_snapshot_and_injection() {
        let sim = new_instance();
        atmos_sim_fill_room(sim, 0, 0, 5, 5);
        atmos_sim_rebuild(sim);

        assert_eq!(atmos_sim_inject_gas(sim, 2.0, 2.0, 3, 10.0), AtmosSimErrorCode::Ok);

        let mut snapshot = GasSnapshot::default();
        let mut found = false;
        let code = unsafe { atmos_sim_gas_at(sim, 2.0, 2.0, &mut snapshot, &mut found) };
        assert_eq!(code, AtmosSimErrorCode::Ok);
        assert!(found);
        assert!((snapshot.plasma - 10.0).abs() < 1e-4);
        assert_eq!(snapshot.state, 0);

        let code =
            unsafe { atmos_sim_gas_at(sim, 100.0, 100.0, &mut snapshot, &mut found) };
        assert_eq!(code, AtmosSimErrorCode::Ok);
        assert!(!found);
        assert_eq!(snapshot, GasSnapshot::default());

        assert_eq!(atmos_sim_inject_gas(sim, 0.0, 0.0, 0, 1.0), AtmosSimErrorCode::CellBlocked);
        assert_eq!(atmos_sim_inject_gas(sim, 50.0, 50.0, 0, 1.0), AtmosSimErrorCode::NoCell);

        unsafe { atmos_sim_destroy(sim) };
    }

    #[test]
    fn test_errors_are_recorded() {
        let sim = new_instance();
        assert_eq!(atmos_sim_rebuild(sim), AtmosSimErrorCode::EmptyTopology);

        assert_eq!(atmos_sim_set_tile(sim, 0, 0, 9), AtmosSimErrorCode::InvalidParameter);
        assert_eq!(atmos_sim_get_last_error_code(), AtmosSimErrorCode::InvalidParameter);
        let message = unsafe { CStr::from_ptr(atmos_sim_get_last_error()) };
        assert!(message.to_string_lossy().contains("kind"));

        assert_eq!(atmos_sim_fill_rect(sim, 3, 0, 0, 0, 1), AtmosSimErrorCode::InvalidParameter);
        assert_eq!(atmos_sim_step(ptr::null()), AtmosSimErrorCode::NullPointer);

        // A success clears the last error
        assert_eq!(atmos_sim_set_tile(sim, 0, 0, 1), AtmosSimErrorCode::Ok);
        assert_eq!(atmos_sim_get_last_error_code(), AtmosSimErrorCode::Ok);
        assert!(atmos_sim_get_last_error().is_null());

        let code = unsafe { atmos_sim_pressure_at(sim, 0.0, 0.0, ptr::null_mut()) };
        assert_eq!(code, AtmosSimErrorCode::NullPointer);

        unsafe { atmos_sim_destroy(sim) };
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let mut instance = ptr::null_mut();
        let settings = AtmosSimSettings {
            chunk_width: 0,
            ..atmos_sim_default_settings()
        };
        let code = unsafe { atmos_sim_new(settings, &mut instance) };
        assert_eq!(code, AtmosSimErrorCode::InvalidParameter);
        assert!(instance.is_null());

        let settings = AtmosSimSettings {
            cell_volume: -1.0,
            ..atmos_sim_default_settings()
        };
        let code = unsafe { atmos_sim_new(settings, &mut instance) };
        assert_eq!(code, AtmosSimErrorCode::InvalidParameter);

        let code = unsafe { atmos_sim_new(atmos_sim_default_settings(), ptr::null_mut()) };
        assert_eq!(code, AtmosSimErrorCode::NullPointer);
    }

    #[test]
    fn test_update_before_build_is_a_no_op() {
        let sim = new_instance();
        atmos_sim_update(sim, 0.5);
        atmos_sim_update(ptr::null(), 0.5);
        atmos_sim_update(sim, f32::NAN);
        unsafe { atmos_sim_destroy(sim) };
        unsafe { atmos_sim_destroy(ptr::null_mut()) };
    }
}
