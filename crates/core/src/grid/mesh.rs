use super::Axis;
use crate::error::{ConfigError, Result, SimError};
use serde::{Deserialize, Serialize};

/// Number of coordinate samples along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridDims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Total number of material cells (one per coordinate sample).
    pub fn cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Flat C-order index of `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.ny + j) * self.nz + k
    }
}

/// Full and staggered spacing along one axis.
///
/// `full[i] = c[i + 1] - c[i]` (length n - 1) separates adjacent
/// coordinates; `staggered[i] = (full[i] + full[i + 1]) / 2` (length n - 2)
/// separates adjacent half-cell points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpacing {
    pub full: Vec<f64>,
    pub staggered: Vec<f64>,
}

impl AxisSpacing {
    pub fn from_coordinates(coords: &[f64]) -> Self {
        let full: Vec<f64> = coords.windows(2).map(|w| w[1] - w[0]).collect();
        let staggered = full.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        Self { full, staggered }
    }

    pub fn min_full(&self) -> f64 {
        self.full.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Spacing tables for all three axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    pub x: AxisSpacing,
    pub y: AxisSpacing,
    pub z: AxisSpacing,
}

impl Spacing {
    pub fn axis(&self, axis: Axis) -> &AxisSpacing {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Smallest full spacing over every axis.
    pub fn min_full(&self) -> f64 {
        self.x
            .min_full()
            .min(self.y.min_full())
            .min(self.z.min_full())
    }
}

/// Three strictly increasing coordinate arrays starting at zero.
///
/// Immutable once built; a re-mesh produces a new `Mesh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl Mesh {
    /// Wrap three coordinate arrays, checking the axis invariants.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an axis has fewer than three
    /// points, does not start at zero, or is not strictly increasing.
    pub fn from_axes(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self> {
        for (axis, coords) in [(Axis::X, &x), (Axis::Y, &y), (Axis::Z, &z)] {
            check_axis(axis, coords)?;
        }
        Ok(Self { x, y, z })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn axis(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn dims(&self) -> GridDims {
        GridDims::new(self.x.len(), self.y.len(), self.z.len())
    }

    pub fn spacing(&self) -> Spacing {
        Spacing {
            x: AxisSpacing::from_coordinates(&self.x),
            y: AxisSpacing::from_coordinates(&self.y),
            z: AxisSpacing::from_coordinates(&self.z),
        }
    }

    /// Serialize for transfer to a remote solver.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SimError::Transport(format!("mesh encode: {e}")))
    }

    /// Decode a blob produced by [`Mesh::to_blob`], re-checking invariants.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let mesh: Self = serde_json::from_slice(blob)
            .map_err(|e| SimError::Transport(format!("mesh decode: {e}")))?;
        Self::from_axes(mesh.x, mesh.y, mesh.z)
    }
}

fn check_axis(axis: Axis, coords: &[f64]) -> Result<()> {
    if coords.len() < 3 {
        return Err(ConfigError::AxisTooCoarse {
            axis: axis.label(),
            points: coords.len(),
        }
        .into());
    }
    if coords[0] != 0.0 {
        return Err(SimError::invalid(
            "mesh",
            format!("{axis} axis must start at 0, got {}", coords[0]),
        ));
    }
    if let Some(w) = coords.windows(2).find(|w| w[1] <= w[0] || !w[1].is_finite()) {
        return Err(SimError::invalid(
            "mesh",
            format!("{axis} axis is not strictly increasing at {} -> {}", w[0], w[1]),
        ));
    }
    Ok(())
}
