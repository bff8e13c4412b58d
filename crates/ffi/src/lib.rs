//! C interface for the elastic wave simulator.
//!
//! One opaque [`WaveSimInstance`] wraps a configured session. Runs execute on
//! a background thread; hosts poll progress and status, cancel, and collect a
//! [`WaveSimRunSummary`] with `wave_sim_wait`. Every fallible entry point
//! returns a [`WaveSimErrorCode`] and records a message retrievable with
//! `wave_sim_get_last_error` on the calling thread.
//!
//! The header `WaveSimFFI.h` is generated by the build script.

mod error;
mod helpers;
mod instance;
mod run;

pub use error::{wave_sim_get_last_error, wave_sim_get_last_error_code, WaveSimErrorCode};
pub use instance::{wave_sim_destroy, wave_sim_new, WaveSimInstance};
pub use run::{
    wave_sim_cancel, wave_sim_get_output_path, wave_sim_get_progress, wave_sim_get_status,
    wave_sim_is_running, wave_sim_run, wave_sim_start, wave_sim_wait, WaveSimRunSummary,
};
