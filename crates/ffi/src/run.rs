use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use tracing::error;
use wave_sim_core::{RunOutcome, RunSummary};

use crate::error::{DefaultWaveSimError, WaveSimErrorCode};
use crate::helpers::{instance_from_ptr, track_code, track_result};
use crate::instance::{Slot, WaveSimInstance};

/// C view of a finished run.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaveSimRunSummary {
    /// True when the run stopped early because it was cancelled.
    pub cancelled: bool,
    /// Steps advanced and handed to the writer.
    pub steps_run: u64,
    /// Steps stored in the output container.
    pub recorded_steps: u64,
    /// Time step in seconds.
    pub dt: f64,
    /// Wall time of the run in seconds.
    pub elapsed_seconds: f64,
    /// Mean wall time per step in milliseconds.
    pub mean_step_ms: f64,
}

impl From<&RunSummary> for WaveSimRunSummary {
    fn from(summary: &RunSummary) -> Self {
        Self {
            cancelled: summary.outcome == RunOutcome::Cancelled,
            steps_run: summary.steps_run as u64,
            recorded_steps: summary.recorded_steps,
            dt: summary.dt,
            elapsed_seconds: summary.elapsed.as_secs_f64(),
            mean_step_ms: summary.mean_step_ms,
        }
    }
}

fn start(instance: &WaveSimInstance) -> Result<(), DefaultWaveSimError> {
    let mut slot = instance.slot()?;
    let session = match std::mem::replace(&mut *slot, Slot::Empty) {
        Slot::Ready(session) => session,
        other => {
            *slot = other;
            return Err(DefaultWaveSimError::busy("a run is already in progress"));
        }
    };
    match session.spawn() {
        Ok(handle) => {
            *slot = Slot::Running(handle);
            Ok(())
        }
        Err(failed) => {
            error!("Could not start the run thread: {}", failed);
            *slot = Slot::Ready(failed.session);
            Err(failed.error.into())
        }
    }
}

fn wait(instance: &WaveSimInstance) -> Result<WaveSimRunSummary, DefaultWaveSimError> {
    let handle = {
        let mut slot = instance.slot()?;
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Running(handle) => handle,
            other => {
                *slot = other;
                return Err(DefaultWaveSimError::busy("no run is in progress"));
            }
        }
    };

    // join outside the lock so status polling keeps working
    let finished = match handle.join() {
        Ok(finished) => finished,
        Err(e) => {
            error!("Run thread panicked: {}", e);
            return Err(e.into());
        }
    };
    *instance.slot()? = Slot::Ready(Box::new(finished.session));

    let summary = finished.result?;
    let output = CString::new(summary.output.to_string_lossy().into_owned()).ok();
    *instance
        .output_path
        .lock()
        .map_err(|_| DefaultWaveSimError::lock_poisoned("output_path"))? = output;
    let c_summary = WaveSimRunSummary::from(&summary);
    *instance
        .last_summary
        .lock()
        .map_err(|_| DefaultWaveSimError::lock_poisoned("last_summary"))? = Some(summary);
    Ok(c_summary)
}

/// Start the configured run on a background thread.
///
/// Returns `WaveSimErrorCode::Busy` if a run is already in progress.
/// Configuration problems surface from `wave_sim_wait`, since the mesh and
/// material are built on the run thread.
///
/// Thread-safe: may be called from any thread.
#[no_mangle]
pub extern "C" fn wave_sim_start(ptr: *const WaveSimInstance) -> WaveSimErrorCode {
    track_code(instance_from_ptr(ptr).and_then(start))
}

/// Block until the current run finishes and write its summary.
///
/// On success the instance is ready for another `wave_sim_start`.
///
/// Returns
/// - `WaveSimErrorCode::Ok`: `out_summary` holds the summary
/// - `WaveSimErrorCode::Busy`: no run was started
/// - any run error code; `wave_sim_get_last_error()` has the details
///
/// # Safety
/// `out_summary` must be null or point to writable memory for one
/// `WaveSimRunSummary`. Null discards the summary.
#[no_mangle]
pub unsafe extern "C" fn wave_sim_wait(
    ptr: *const WaveSimInstance,
    out_summary: *mut WaveSimRunSummary,
) -> WaveSimErrorCode {
    match track_result(instance_from_ptr(ptr).and_then(wait)) {
        Ok(summary) => {
            if !out_summary.is_null() {
                unsafe {
                    *out_summary = summary;
                }
            }
            WaveSimErrorCode::Ok
        }
        Err(code) => code,
    }
}

/// Start a run and wait for it on the calling thread.
///
/// # Safety
/// Same contract as `wave_sim_wait`.
#[no_mangle]
pub unsafe extern "C" fn wave_sim_run(
    ptr: *const WaveSimInstance,
    out_summary: *mut WaveSimRunSummary,
) -> WaveSimErrorCode {
    let code = wave_sim_start(ptr);
    if code != WaveSimErrorCode::Ok {
        return code;
    }
    unsafe { wave_sim_wait(ptr, out_summary) }
}

/// Request cancellation of the current run before its next step.
///
/// Returns `WaveSimErrorCode::Busy` if no run is in progress.
#[no_mangle]
pub extern "C" fn wave_sim_cancel(ptr: *const WaveSimInstance) -> WaveSimErrorCode {
    track_code(instance_from_ptr(ptr).and_then(|instance| {
        match &*instance.slot()? {
            Slot::Running(handle) => {
                handle.cancel();
                Ok(())
            }
            _ => Err(DefaultWaveSimError::busy("no run is in progress")),
        }
    }))
}

/// True while a background run is executing. False for a null pointer.
#[no_mangle]
pub extern "C" fn wave_sim_is_running(ptr: *const WaveSimInstance) -> bool {
    instance_from_ptr(ptr)
        .and_then(|instance| {
            Ok(matches!(&*instance.slot()?, Slot::Running(handle) if handle.is_running()))
        })
        .unwrap_or(false)
}

/// Whole-percent progress of the current or last run, 0 for a null pointer.
#[no_mangle]
pub extern "C" fn wave_sim_get_progress(ptr: *const WaveSimInstance) -> u8 {
    instance_from_ptr(ptr)
        .and_then(|instance| {
            let running = match &*instance.slot()? {
                Slot::Running(handle) => Some(handle.progress()),
                _ => None,
            };
            if let Some(progress) = running {
                return Ok(progress);
            }
            let last = instance
                .last_summary
                .lock()
                .map_err(|_| DefaultWaveSimError::lock_poisoned("last_summary"))?;
            Ok(match last.as_ref() {
                Some(summary) if summary.outcome == RunOutcome::Completed => 100,
                _ => 0,
            })
        })
        .unwrap_or(0)
}

/// Latest status text of the current run.
///
/// Returns null for a null pointer. The string is owned by the instance and
/// stays valid until the next `wave_sim_get_status` call on it.
///
/// **DO NOT FREE THIS POINTER**
#[no_mangle]
pub extern "C" fn wave_sim_get_status(ptr: *const WaveSimInstance) -> *const c_char {
    let status = instance_from_ptr(ptr).and_then(|instance| {
        let text = match &*instance.slot()? {
            Slot::Running(handle) => handle.status(),
            Slot::Ready(_) => "Idle".to_string(),
            Slot::Empty => "Unavailable".to_string(),
        };
        let mut cached = instance
            .status
            .lock()
            .map_err(|_| DefaultWaveSimError::lock_poisoned("status"))?;
        *cached = CString::new(text).unwrap_or_default();
        Ok(cached.as_ptr())
    });
    match track_result(status) {
        Ok(ptr) => ptr,
        Err(_) => ptr::null(),
    }
}

/// Path of the container written by the last finished run.
///
/// Returns null before the first completed `wave_sim_wait`. The string stays
/// valid until the next successful `wave_sim_wait` on this instance.
///
/// **DO NOT FREE THIS POINTER**
#[no_mangle]
pub extern "C" fn wave_sim_get_output_path(ptr: *const WaveSimInstance) -> *const c_char {
    let path = instance_from_ptr(ptr).and_then(|instance| {
        let path = instance
            .output_path
            .lock()
            .map_err(|_| DefaultWaveSimError::lock_poisoned("output_path"))?;
        Ok(path.as_ref().map_or(ptr::null(), |p| p.as_ptr()))
    });
    track_result(path).unwrap_or(ptr::null())
}
