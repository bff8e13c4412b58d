//! Rectilinear mesh generation
//!
//! Each axis is an independent, strictly increasing coordinate array. The x
//! and y axes are graded toward inclusion boundaries; z is always uniform.

mod generator;
mod inclusion;
mod mesh;

pub use generator::MeshGenerator;
pub use inclusion::InclusionRegion;
pub use mesh::{AxisSpacing, GridDims, Mesh, Spacing};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cartesian axis label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn label(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
