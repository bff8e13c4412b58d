//! Boundary conditions
//!
//! Boundary variants are plain functions selected by [`BoundaryConfig`]:
//!
//! - traction-free z = 0 surface (stress rows in the stress-boundary stage,
//!   displacement rows in the displacement-boundary stage)
//! - first-order Mur absorbing faces
//! - periodic wrap across the y extent

use super::fields::Field3;
use super::state::DisplacementComponent;
use crate::grid::{Axis, Spacing};
use crate::material::MaterialField;
use serde::{Deserialize, Serialize};

/// Treatment of the z = 0 face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceBoundary {
    #[default]
    TractionFree,
    Absorbing,
}

/// Treatment of the two y faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateralBoundary {
    #[default]
    Absorbing,
    Periodic,
}

/// Boundary selection for a run. The x faces and the z-high face are
/// always absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub surface: SurfaceBoundary,
    #[serde(default)]
    pub lateral_y: LateralBoundary,
}

impl BoundaryConfig {
    pub fn traction_free(&self) -> bool {
        self.surface == SurfaceBoundary::TractionFree
    }

    pub fn periodic_y(&self) -> bool {
        self.lateral_y == LateralBoundary::Periodic
    }

    /// Absorbing faces in application order. Later faces overwrite the
    /// edges shared with earlier ones.
    pub fn absorbing_faces(&self) -> Vec<Face> {
        let mut faces = vec![Face::XLow, Face::XHigh];
        if !self.periodic_y() {
            faces.extend([Face::YLow, Face::YHigh]);
        }
        if !self.traction_free() {
            faces.push(Face::ZLow);
        }
        faces.push(Face::ZHigh);
        faces
    }
}

/// One of the six outer faces of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    XLow,
    XHigh,
    YLow,
    YHigh,
    ZLow,
    ZHigh,
}

impl Face {
    pub fn axis(self) -> Axis {
        match self {
            Face::XLow | Face::XHigh => Axis::X,
            Face::YLow | Face::YHigh => Axis::Y,
            Face::ZLow | Face::ZHigh => Axis::Z,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, Face::XHigh | Face::YHigh | Face::ZHigh)
    }
}

/// Mur reflection coefficient `(v dt - h) / (v dt + h)`.
#[inline]
pub fn mur_coefficient(speed: f64, dt: f64, h: f64) -> f64 {
    (speed * dt - h) / (speed * dt + h)
}

/// One-way absorbing update of `next` on `face`:
/// `next[b] = cur[b'] + c * (next[b'] - cur[b])` where `b'` is the first
/// interior sample. The face-normal component travels at the longitudinal
/// speed across the staggered spacing; tangential components use the
/// transverse speed across the full spacing.
pub(crate) fn absorb(
    face: Face,
    component: DisplacementComponent,
    next: &mut Field3,
    cur: &Field3,
    material: &MaterialField,
    sp: &Spacing,
    dt: f64,
) {
    let axis = face.axis();
    let normal = component.axis() == axis;
    let spacing = sp.axis(axis);
    let table = if normal {
        &spacing.staggered
    } else {
        &spacing.full
    };
    let h = if face.is_high() {
        table[table.len() - 1]
    } else {
        table[0]
    };

    let [nx, ny, nz] = next.shape();
    let n = next.shape()[axis as usize];
    let (boundary, inner) = if face.is_high() { (n - 1, n - 2) } else { (0, 1) };
    let (is, js, ks) = match axis {
        Axis::X => (boundary..boundary + 1, 0..ny, 0..nz),
        Axis::Y => (0..nx, boundary..boundary + 1, 0..nz),
        Axis::Z => (0..nx, 0..ny, boundary..boundary + 1),
    };

    for i in is {
        for j in js.clone() {
            for k in ks.clone() {
                let (ii, jj, kk) = match axis {
                    Axis::X => (inner, j, k),
                    Axis::Y => (i, inner, k),
                    Axis::Z => (i, j, inner),
                };
                let (mi, mj, mk) = component.material_cell(i, j, k);
                let (vl, vt) = material.wave_speeds_at(mi, mj, mk);
                let c = mur_coefficient(if normal { vl } else { vt }, dt, h);
                let value = cur.get(ii, jj, kk) + c * (next.get(ii, jj, kk) - cur.get(i, j, k));
                next.set(i, j, k, value);
            }
        }
    }
}

/// Periodic wrap across y. Node-sampled fields copy the second-to-last row
/// into row 0; fields staggered along y copy row 1 into the last row.
pub(crate) fn wrap_y(field: &mut Field3, staggered_on_y: bool) {
    let ny = field.ny;
    let (src, dst) = if staggered_on_y { (1, ny - 1) } else { (ny - 2, 0) };
    for i in 0..field.nx {
        for k in 0..field.nz {
            let value = field.get(i, src, k);
            field.set(i, dst, k, value);
        }
    }
}
