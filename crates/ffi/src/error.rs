use atmos_sim_core::AtmosError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for FFI error types.
///
/// `code()` is what crosses the FFI boundary, `msg()` is kept for
/// `atmos_sim_get_last_error`.
pub(crate) trait AtmosSimError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> AtmosSimErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Default implementation of `AtmosSimError` for the FFI error scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultAtmosSimError {
    code: AtmosSimErrorCode,
    msg: String,
}

impl DefaultAtmosSimError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`, `"ptr"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: AtmosSimErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for poisoned lock.
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: AtmosSimErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    /// Create error for an invalid argument.
    ///
    /// # Arguments
    /// * `param_name` - The name of the invalid parameter
    /// * `message` - A description of the validation error
    pub fn invalid_parameter(param_name: &str, message: &str) -> Self {
        Self {
            code: AtmosSimErrorCode::InvalidParameter,
            msg: format!("Parameter {param_name}: {message}"),
        }
    }

    /// Create error for a call that needs a built simulation.
    pub fn not_built() -> Self {
        Self {
            code: AtmosSimErrorCode::NotBuilt,
            msg: "Simulation has not been built, call atmos_sim_rebuild first".to_string(),
        }
    }
}

impl AtmosSimError for DefaultAtmosSimError {
    fn code(&self) -> AtmosSimErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

impl From<AtmosError> for DefaultAtmosSimError {
    fn from(error: AtmosError) -> Self {
        let code = match &error {
            AtmosError::EmptyTopology => AtmosSimErrorCode::EmptyTopology,
            AtmosError::InvalidConfig { .. }
            | AtmosError::InvalidAmount(_)
            | AtmosError::UnknownDevice(_) => AtmosSimErrorCode::InvalidParameter,
            AtmosError::NoCellAt { .. } => AtmosSimErrorCode::NoCell,
            AtmosError::CellBlocked => AtmosSimErrorCode::CellBlocked,
            AtmosError::WorkerPool(_) => AtmosSimErrorCode::WorkerPool,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

/// FFI error codes returned by atmos simulation functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtmosSimErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Lock poisoned: internal synchronization primitive was poisoned by a panic.
    LockPoisoned = 2,

    /// Invalid parameter passed to function.
    InvalidParameter = 3,

    /// The tile map holds no tiles, so there is nothing to simulate.
    EmptyTopology = 4,

    /// The simulation has not been built from the tile map yet.
    NotBuilt = 5,

    /// The queried world position is outside the grid.
    NoCell = 6,

    /// The targeted cell is a wall.
    CellBlocked = 7,

    /// The dedicated worker pool could not be started.
    WorkerPool = 8,
}

impl From<DefaultAtmosSimError> for AtmosSimErrorCode {
    fn from(error: DefaultAtmosSimError) -> Self {
        error.code
    }
}

thread_local! {
    /// Thread-local storage for the most recent FFI error (C string, error code).
    /// The CString is stored here so the pointer handed out stays valid.
    static LAST_ERROR: RefCell<(Option<CString>, AtmosSimErrorCode)> = const { RefCell::new((None, AtmosSimErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, AtmosSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, AtmosSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if no error has occurred or the message cannot be converted to a C string.
///
/// # Thread Safety
/// Error messages are stored per-thread, so each thread has its own independent error state.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread that
/// sets or clears the error.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// AtmosSimErrorCode err = atmos_sim_rebuild(sim);
/// if (err != AtmosSimErrorCode::Ok) {
///     const char* error = atmos_sim_get_last_error();
///     if (error) {
///         printf("Atmos rebuild failed: %s\n", error);
///     }
/// }
/// ```
#[no_mangle]
pub extern "C" fn atmos_sim_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code.
///
/// Returns `AtmosSimErrorCode::Ok` (0) if no error has occurred on this thread.
#[no_mangle]
pub extern "C" fn atmos_sim_get_last_error_code() -> AtmosSimErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
