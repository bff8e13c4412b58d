use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;
use wave_sim_core::{RunHandle, RunSummary, Session, SimulationConfig};

use crate::error::{DefaultWaveSimError, WaveSimErrorCode};
use crate::helpers::{optional_str, track_error, track_result};

/// Where the session currently lives.
pub(crate) enum Slot {
    /// Idle session owned by the instance.
    Ready(Box<Session>),
    /// Session moved onto its background run thread.
    Running(RunHandle),
    /// Session lost to a panicked run thread.
    Empty,
}

/// The main wave simulation context.
///
/// Owns one [`Session`]. Runs execute on a background thread; the host polls
/// status and progress and finally calls `wave_sim_wait` to collect the
/// summary and take the session back.
///
/// # Thread Safety
/// Every entry point locks the instance internally, so the pointer may be
/// shared between threads. Status polling never blocks on the run itself.
///
/// # Usage
/// ```cpp
/// WaveSimInstance* sim = nullptr;
/// if (wave_sim_new(config_json, &sim) != WaveSimErrorCode::Ok) {
///     fprintf(stderr, "%s\n", wave_sim_get_last_error());
///     return;
/// }
/// wave_sim_start(sim);
/// while (wave_sim_is_running(sim)) {
///     printf("%s (%u%%)\n", wave_sim_get_status(sim), wave_sim_get_progress(sim));
///     sleep_ms(100);
/// }
/// WaveSimRunSummary summary;
/// wave_sim_wait(sim, &summary);
/// wave_sim_destroy(sim);
/// ```
pub struct WaveSimInstance {
    pub(crate) slot: Mutex<Slot>,
    /// Summary of the most recent finished run.
    pub(crate) last_summary: Mutex<Option<RunSummary>>,
    /// Backing storage for `wave_sim_get_status`.
    pub(crate) status: Mutex<CString>,
    /// Backing storage for `wave_sim_get_output_path`.
    pub(crate) output_path: Mutex<Option<CString>>,
}

impl WaveSimInstance {
    /// Creates a new instance from an optional JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for malformed JSON and
    /// `InvalidConfiguration` when the configuration fails validation.
    pub(crate) fn new(config_json: Option<&str>) -> Result<Box<Self>, DefaultWaveSimError> {
        let config = match config_json {
            Some(json) => serde_json::from_str::<SimulationConfig>(json).map_err(|e| {
                DefaultWaveSimError::invalid_parameter(format!("config_json: {e}"))
            })?,
            None => SimulationConfig::gaas_block(),
        };
        let session = Session::new(config)?;

        Ok(Box::new(Self {
            slot: Mutex::new(Slot::Ready(Box::new(session))),
            last_summary: Mutex::new(None),
            status: Mutex::new(CString::default()),
            output_path: Mutex::new(None),
        }))
    }

    pub(crate) fn slot(&self) -> Result<MutexGuard<'_, Slot>, DefaultWaveSimError> {
        self.slot
            .lock()
            .map_err(|_| DefaultWaveSimError::lock_poisoned("slot"))
    }
}

impl Drop for WaveSimInstance {
    fn drop(&mut self) {
        let slot = match self.slot.get_mut() {
            Ok(slot) => std::mem::replace(slot, Slot::Empty),
            Err(poisoned) => std::mem::replace(poisoned.into_inner(), Slot::Empty),
        };
        if let Slot::Running(handle) = slot {
            handle.cancel();
            if handle.join().is_err() {
                warn!("Run thread panicked while the instance was destroyed");
            }
        }
    }
}

/// Create a new `WaveSim` instance and return it via out-parameter.
///
/// This function follows standard C error handling conventions:
/// - Returns `WaveSimErrorCode::Ok` (0) on success with valid instance in `out_instance`
/// - Returns non-zero error code on failure with `out_instance` set to null
///
/// Parameters
/// - `config_json`: NUL-terminated JSON simulation configuration, or null for
///   the built-in homogeneous GaAs block. The string is only read during the call.
/// - `out_instance`: Pointer to receive the created instance. Must be non-null.
///
/// Returns
/// - `WaveSimErrorCode::Ok` (0): success, `out_instance` contains valid pointer
/// - `WaveSimErrorCode::NullPointer`: `out_instance` parameter is null
/// - `WaveSimErrorCode::InvalidParameter`: the JSON is malformed or not UTF-8
/// - `WaveSimErrorCode::InvalidConfiguration`: the configuration was rejected
///
/// Error Details
/// - Call `wave_sim_get_last_error()` to retrieve human-readable error description
///
/// # Safety
///
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - `config_json` must be null or point to a NUL-terminated string.
/// - The caller takes ownership of the returned instance and MUST call `wave_sim_destroy`
///   exactly once to avoid memory leaks.
#[no_mangle]
pub unsafe extern "C" fn wave_sim_new(
    config_json: *const c_char,
    out_instance: *mut *mut WaveSimInstance,
) -> WaveSimErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultWaveSimError::null_pointer("out_instance"));
    }

    let created = optional_str(config_json, "config_json").and_then(WaveSimInstance::new);
    match track_result(created) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            WaveSimErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                // Set to null on error (per documentation contract)
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Destroys a `WaveSim` instance previously created by `wave_sim_new`.
///
/// A run still in progress is cancelled and joined first, so its output
/// container is closed before this returns.
///
/// Behavior:
/// - If `ptr` is null, this function is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `wave_sim_new` and not destroyed already.
/// - After calling this function, the caller must not use the pointer again.
#[no_mangle]
pub unsafe extern "C" fn wave_sim_destroy(ptr: *mut WaveSimInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: The pointer was created by `Box::into_raw` in `wave_sim_new`
    // and, per the contract above, has not been freed. Dropping the Box runs
    // the instance destructor.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}
