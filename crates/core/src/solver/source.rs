//! Source waveforms and injection
//!
//! The source is a line along y on the x = 0, z = 0 edge. Each step the
//! waveform value is written straight into the current displacement of the
//! selected component before the stress stage runs.

use super::state::{DisplacementComponent, SharedField};
use crate::config::positive;
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Selectable source time function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Waveform {
    /// `(1 - 2a^2) * exp(-a^2)` with `a = pi * f * (t * dt - delay)`
    Ricker { frequency: f64, delay: f64 },
    /// `sin(2 pi f t dt + phase)`
    Sine { frequency: f64, phase: f64 },
    /// 1 at `step`, 0 elsewhere
    Impulse { step: usize },
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Ricker {
            frequency: 250.0,
            delay: 0.0,
        }
    }
}

impl Waveform {
    /// Waveform value at integer step `step` with time step `dt`.
    pub fn value(&self, step: usize, dt: f64) -> f64 {
        let t = step as f64 * dt;
        match *self {
            Waveform::Ricker { frequency, delay } => {
                let a = PI * frequency * (t - delay);
                let a2 = a * a;
                (1.0 - 2.0 * a2) * (-a2).exp()
            }
            Waveform::Sine { frequency, phase } => (2.0 * PI * frequency * t + phase).sin(),
            Waveform::Impulse { step: at } => {
                if step == at {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

fn default_amplitude() -> f64 {
    1.0
}

fn default_component() -> DisplacementComponent {
    DisplacementComponent::Z
}

/// Waveform, target component, and scale of the line source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub waveform: Waveform,
    #[serde(default = "default_component")]
    pub component: DisplacementComponent,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::default(),
            component: default_component(),
            amplitude: default_amplitude(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.amplitude.is_finite() {
            return Err(SimError::invalid("source.amplitude", "must be finite"));
        }
        match self.waveform {
            Waveform::Ricker { frequency, delay } => {
                positive("source.frequency", frequency)?;
                if !delay.is_finite() {
                    return Err(SimError::invalid("source.delay", "must be finite"));
                }
            }
            Waveform::Sine { frequency, phase } => {
                positive("source.frequency", frequency)?;
                if !phase.is_finite() {
                    return Err(SimError::invalid("source.phase", "must be finite"));
                }
            }
            Waveform::Impulse { .. } => {}
        }
        Ok(())
    }

    /// Scaled source value for `step`.
    pub fn value(&self, step: usize, dt: f64) -> f64 {
        self.amplitude * self.waveform.value(step, dt)
    }

    /// Write the source value into `current` along the x = 0, z = 0 line.
    pub fn inject(&self, current: &SharedField, step: usize, dt: f64) {
        let value = self.value(step, dt);
        let mut field = current.write();
        for j in 0..field.ny {
            field.set(0, j, 0, value);
        }
    }
}
