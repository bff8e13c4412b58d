use crate::error::{with_last_error_mut, DefaultWaveSimError, WaveSimError, WaveSimErrorCode};
use crate::instance::WaveSimInstance;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Set the thread-local error message and code.
/// Accepts any type implementing `WaveSimError` trait.
pub(crate) fn set_last_error(error: &impl WaveSimError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl WaveSimError) -> WaveSimErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of a failed result, or clear the last error on success.
pub(crate) fn track_result<T>(result: Result<T, DefaultWaveSimError>) -> Result<T, WaveSimErrorCode> {
    match result {
        Ok(value) => {
            clear_last_error();
            Ok(value)
        }
        Err(error) => Err(track_error(&error)),
    }
}

/// Collapse a unit result into the code returned across the boundary.
pub(crate) fn track_code(result: Result<(), DefaultWaveSimError>) -> WaveSimErrorCode {
    match track_result(result) {
        Ok(()) => WaveSimErrorCode::Ok,
        Err(code) => code,
    }
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = WaveSimErrorCode::Ok;
    });
}

/// Borrow the instance behind `ptr`.
///
/// The pointer must be null or a live pointer from `wave_sim_new`.
pub(crate) fn instance_from_ptr<'a>(
    ptr: *const WaveSimInstance,
) -> Result<&'a WaveSimInstance, DefaultWaveSimError> {
    // SAFETY: callers pass null or a pointer produced by `Box::into_raw` in
    // `wave_sim_new` that has not been destroyed.
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultWaveSimError::null_pointer("ptr"))
}

/// Read an optional UTF-8 C string argument. Null maps to `None`.
pub(crate) fn optional_str<'a>(
    ptr: *const c_char,
    name: &str,
) -> Result<Option<&'a str>, DefaultWaveSimError> {
    if ptr.is_null() {
        return Ok(None);
    }
    // SAFETY: non-null pointers must reference a NUL-terminated string that
    // outlives the call, per the documented contract of every entry point.
    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str()
        .map(Some)
        .map_err(|e| DefaultWaveSimError::invalid_parameter(format!("{name} is not UTF-8: {e}")))
}
