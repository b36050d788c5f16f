use crate::error::{with_last_error_mut, AtmosSimError, AtmosSimErrorCode, DefaultAtmosSimError};
use crate::instance::{AtmosSimInstance, InstanceState};
use atmos_sim_core::AtmosSimulation;
use std::ffi::CString;

/// Set the thread-local error message and code.
/// Accepts any type implementing the `AtmosSimError` trait.
pub(crate) fn set_last_error(error: &impl AtmosSimError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl AtmosSimError) -> AtmosSimErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of a failed result and hand back its code.
pub(crate) fn track_result<T>(
    result: Result<T, DefaultAtmosSimError>,
) -> Result<T, AtmosSimErrorCode> {
    result.map_err(|error| track_error(&error))
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = AtmosSimErrorCode::Ok;
    });
}

/// Run an FFI body, clearing the last error on success and recording it on failure.
pub(crate) fn handle_ffi_result_error<F>(body: F) -> AtmosSimErrorCode
where
    F: FnOnce() -> Result<(), DefaultAtmosSimError>,
{
    match body() {
        Ok(()) => {
            clear_last_error();
            AtmosSimErrorCode::Ok
        }
        Err(error) => track_error(&error),
    }
}

/// Borrow the instance behind a raw pointer handed out by `atmos_sim_new`.
pub(crate) fn instance_from_ptr<'a>(
    ptr: *const AtmosSimInstance,
) -> Result<&'a AtmosSimInstance, DefaultAtmosSimError> {
    // SAFETY: callers pass either null or a pointer obtained from `atmos_sim_new`
    // that has not been destroyed.
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultAtmosSimError::null_pointer("ptr"))
}

/// Run `func` with shared access to the built simulation.
pub(crate) fn with_sim<F, T>(instance: &AtmosSimInstance, func: F) -> Result<T, DefaultAtmosSimError>
where
    F: FnOnce(&AtmosSimulation) -> Result<T, DefaultAtmosSimError>,
{
    let state = instance
        .state
        .read()
        .map_err(|_| DefaultAtmosSimError::lock_poisoned("RwLock"))?;
    let sim = state.sim.as_ref().ok_or_else(DefaultAtmosSimError::not_built)?;
    func(sim)
}

/// Run `func` with exclusive access to the built simulation.
pub(crate) fn with_sim_mut<F, T>(
    instance: &AtmosSimInstance,
    func: F,
) -> Result<T, DefaultAtmosSimError>
where
    F: FnOnce(&mut AtmosSimulation) -> Result<T, DefaultAtmosSimError>,
{
    let mut state = instance
        .state
        .write()
        .map_err(|_| DefaultAtmosSimError::lock_poisoned("RwLock"))?;
    let sim = state.sim.as_mut().ok_or_else(DefaultAtmosSimError::not_built)?;
    func(sim)
}

/// Run `func` with exclusive access to the whole instance state, built or not.
pub(crate) fn with_state_mut<F, T>(
    instance: &AtmosSimInstance,
    func: F,
) -> Result<T, DefaultAtmosSimError>
where
    F: FnOnce(&mut InstanceState) -> Result<T, DefaultAtmosSimError>,
{
    let mut state = instance
        .state
        .write()
        .map_err(|_| DefaultAtmosSimError::lock_poisoned("RwLock"))?;
    func(&mut state)
}

/// Read an `x, z` pair from the C side as a world position.
pub(crate) fn world_position(x: f32, z: f32) -> Result<atmos_sim_core::Vec3, DefaultAtmosSimError> {
    if !x.is_finite() || !z.is_finite() {
        return Err(DefaultAtmosSimError::invalid_parameter(
            "position",
            &format!("must be finite, got ({x}, {z})"),
        ));
    }
    Ok(atmos_sim_core::Vec3::new(x, 0.0, z))
}
