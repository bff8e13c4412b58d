use super::Axis;
use crate::config::DomainSize;
use crate::error::{ConfigError, Result, SimError};
use serde::{Deserialize, Serialize};

/// A vertical cylinder of secondary material embedded in the host block.
///
/// The disk `(x, y, r)` must lie strictly inside the x/y extents of the
/// domain. `z_extent` bounds the cylinder from the surface downwards; `None`
/// means it runs through the full depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InclusionRegion {
    pub x: f64,
    pub y: f64,
    pub r: f64,
    #[serde(default)]
    pub z_extent: Option<f64>,
}

impl InclusionRegion {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        Self {
            x,
            y,
            r,
            z_extent: None,
        }
    }

    pub fn with_depth(mut self, z_extent: f64) -> Self {
        self.z_extent = Some(z_extent);
        self
    }

    /// Center coordinate along a horizontal axis.
    pub(crate) fn center_on(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => 0.0,
        }
    }

    /// Disk membership of a mesh sample, boundary included.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        let dx = x - self.x;
        let dy = y - self.y;
        dx * dx + dy * dy <= self.r * self.r
    }

    pub fn contains_z(&self, z: f64) -> bool {
        self.z_extent.is_none_or(|depth| z <= depth)
    }

    pub(crate) fn validate(&self, index: usize, domain: &DomainSize) -> Result<()> {
        let out_of_bounds = || {
            SimError::from(ConfigError::InclusionOutOfBounds {
                index,
                x: self.x,
                y: self.y,
                r: self.r,
            })
        };
        if !(self.x.is_finite() && self.y.is_finite() && self.r.is_finite()) || self.r <= 0.0 {
            return Err(out_of_bounds());
        }
        let inside_x = self.x - self.r > 0.0 && self.x + self.r < domain.x;
        let inside_y = self.y - self.r > 0.0 && self.y + self.r < domain.y;
        if !(inside_x && inside_y) {
            return Err(out_of_bounds());
        }
        if let Some(depth) = self.z_extent {
            if !depth.is_finite() || depth < 0.0 {
                return Err(SimError::invalid(
                    "z_extent",
                    format!("must be finite and non-negative, got {depth}"),
                ));
            }
        }
        Ok(())
    }
}
