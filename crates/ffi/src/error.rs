use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use wave_sim_core::SimError;

/// Common interface for FFI error types.
///
/// This trait provides a unified way to handle errors across the FFI boundary,
/// allowing both simple error codes and custom error messages.
///
/// # Design
/// - `code()` - Returns the error code to be passed across FFI boundary
/// - `msg()` - Returns the error message for diagnostic purposes
pub(crate) trait WaveSimError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> WaveSimErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Default implementation of `WaveSimError` for common FFI error scenarios.
///
/// This struct wraps a `WaveSimErrorCode` and provides convenient constructors
/// for each error type (except Ok, which represents success).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultWaveSimError {
    code: WaveSimErrorCode,
    msg: String,
}

impl DefaultWaveSimError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`, `"ptr"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: WaveSimErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for poisoned lock.
    ///
    /// # Arguments
    /// * `lock_name` - The name of the lock that was poisoned (e.g., `"slot"`, `"status"`)
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: WaveSimErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    /// Create error for invalid parameter.
    ///
    /// # Arguments
    /// * `message` - Description of the error
    pub fn invalid_parameter(message: String) -> Self {
        Self {
            code: WaveSimErrorCode::InvalidParameter,
            msg: message,
        }
    }

    /// Create error for an operation that conflicts with a run in progress
    /// (or with no run in progress).
    pub fn busy(message: &str) -> Self {
        Self {
            code: WaveSimErrorCode::Busy,
            msg: message.to_string(),
        }
    }
}

impl From<SimError> for DefaultWaveSimError {
    fn from(error: SimError) -> Self {
        let code = match &error {
            SimError::Configuration(_) => WaveSimErrorCode::InvalidConfiguration,
            SimError::PipelineTimeout { .. } => WaveSimErrorCode::Timeout,
            SimError::Io(_) | SimError::Container(_) | SimError::Writer(_) => {
                WaveSimErrorCode::Output
            }
            SimError::Transport(_) | SimError::Worker(_) => WaveSimErrorCode::Internal,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

impl WaveSimError for DefaultWaveSimError {
    fn code(&self) -> WaveSimErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// FFI error codes returned by wave simulation functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveSimErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Lock poisoned: internal synchronization primitive was poisoned by a panic.
    LockPoisoned = 2,

    /// Invalid configuration: geometry, material keys, or parameters were
    /// rejected, or an operation was called in the wrong solver state.
    InvalidConfiguration = 3,

    /// Invalid parameter passed to function (malformed JSON, bad UTF-8).
    InvalidParameter = 4,

    /// A run is in progress (or none is, for wait/cancel).
    Busy = 5,

    /// The result writer did not drain before its shutdown deadline.
    Timeout = 6,

    /// Writing the output container failed.
    Output = 7,

    /// Worker or transport failure inside the solver.
    Internal = 8,
}

impl From<DefaultWaveSimError> for WaveSimErrorCode {
    fn from(error: DefaultWaveSimError) -> Self {
        error.code
    }
}

thread_local! {
    /// Thread-local storage for the most recent FFI error (C string, error code).
    /// Allows callers to retrieve diagnostic information after operations that fail.
    /// The CString is stored to prevent memory leaks when returning raw pointers via FFI.
    static LAST_ERROR: RefCell<(Option<CString>, WaveSimErrorCode)> = const { RefCell::new((None, WaveSimErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, WaveSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, WaveSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if no error has occurred or the error message cannot be converted to C string.
///
/// # Thread Safety
/// Error messages are stored per-thread (thread-local storage). Each thread
/// has its own independent error state.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread that
/// sets or clears the error, or until the thread terminates.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// WaveSimInstance* sim = nullptr;
/// WaveSimErrorCode err = wave_sim_new(config_json, &sim);
/// if (err != WaveSimErrorCode::Ok) {
///     const char* error = wave_sim_get_last_error();
///     if (error) {
///         printf("Wave sim creation failed: %s\n", error);
///     }
/// }
/// ```
#[no_mangle]
pub extern "C" fn wave_sim_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code.
///
/// Returns `WaveSimErrorCode::Ok` (0) if no error has occurred, otherwise the
/// code from the last failed operation on this thread.
#[no_mangle]
pub extern "C" fn wave_sim_get_last_error_code() -> WaveSimErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
