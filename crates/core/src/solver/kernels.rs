//! Staggered-grid finite-difference kernels
//!
//! Each kernel writes exactly one output buffer. The k range selects either
//! the interior rows or the z = 0 surface row; on the surface the field above
//! the free surface is taken as zero, so the vertical difference reduces to
//! the sample itself over the first staggered spacing.
//!
//! Normal stresses contract the upper-left 3x3 block of the stiffness tensor
//! with the normal strains; shear stresses use the matching diagonal shear
//! modulus. Shear strains live on other sub-grids, so the off-block coupling
//! terms are not sampled.

use super::fields::Field3;
use crate::grid::Spacing;
use crate::material::MaterialField;
use std::ops::Range;

/// Vertical difference of `f` at `(i, j, k)` against `k - 1`, with the
/// sample above the surface taken as zero.
#[inline(always)]
fn dz_from_below(f: &Field3, i: usize, j: usize, k: usize, sz: &[f64]) -> f64 {
    if k == 0 {
        f.get(i, j, 0) / sz[0]
    } else {
        (f.get(i, j, k) - f.get(i, j, k - 1)) / sz[k - 1]
    }
}

/// Normal stress for stiffness row `row` (0, 1, 2 for xx, yy, zz).
pub(crate) fn normal_stress(
    out: &mut Field3,
    row: usize,
    ux: &Field3,
    uy: &Field3,
    uz: &Field3,
    material: &MaterialField,
    sp: &Spacing,
    ks: Range<usize>,
) {
    let (sx, sy, sz) = (&sp.x.staggered, &sp.y.staggered, &sp.z.staggered);
    for i in 1..out.nx - 1 {
        for j in 1..out.ny - 1 {
            for k in ks.clone() {
                let exx = (ux.get(i, j, k) - ux.get(i - 1, j, k)) / sx[i - 1];
                let eyy = (uy.get(i, j, k) - uy.get(i, j - 1, k)) / sy[j - 1];
                let ezz = dz_from_below(uz, i, j, k, sz);
                let c = material.stiffness_at(i, j, k);
                out.set(
                    i,
                    j,
                    k,
                    c[(row, 0)] * exx + c[(row, 1)] * eyy + c[(row, 2)] * ezz,
                );
            }
        }
    }
}

/// `t4 = C44 (d uy/dz + d uz/dy)`
pub(crate) fn shear_yz(
    out: &mut Field3,
    uy: &Field3,
    uz: &Field3,
    material: &MaterialField,
    sp: &Spacing,
) {
    let (fy, fz) = (&sp.y.full, &sp.z.full);
    for i in 1..out.nx - 1 {
        for j in 0..out.ny {
            for k in 0..out.nz {
                let strain = (uy.get(i, j, k + 1) - uy.get(i, j, k)) / fz[k]
                    + (uz.get(i, j + 1, k) - uz.get(i, j, k)) / fy[j];
                out.set(i, j, k, material.stiffness_at(i, j + 1, k + 1)[(3, 3)] * strain);
            }
        }
    }
}

/// `t5 = C55 (d ux/dz + d uz/dx)`
pub(crate) fn shear_xz(
    out: &mut Field3,
    ux: &Field3,
    uz: &Field3,
    material: &MaterialField,
    sp: &Spacing,
) {
    let (fx, fz) = (&sp.x.full, &sp.z.full);
    for i in 0..out.nx {
        for j in 1..out.ny - 1 {
            for k in 0..out.nz {
                let strain = (ux.get(i, j, k + 1) - ux.get(i, j, k)) / fz[k]
                    + (uz.get(i + 1, j, k) - uz.get(i, j, k)) / fx[i];
                out.set(i, j, k, material.stiffness_at(i + 1, j, k + 1)[(4, 4)] * strain);
            }
        }
    }
}

/// `t6 = C66 (d ux/dy + d uy/dx)` over the given k rows.
pub(crate) fn shear_xy(
    out: &mut Field3,
    ux: &Field3,
    uy: &Field3,
    material: &MaterialField,
    sp: &Spacing,
    ks: Range<usize>,
) {
    let (fx, fy) = (&sp.x.full, &sp.y.full);
    for i in 0..out.nx {
        for j in 0..out.ny {
            for k in ks.clone() {
                let strain = (ux.get(i, j + 1, k) - ux.get(i, j, k)) / fy[j]
                    + (uy.get(i + 1, j, k) - uy.get(i, j, k)) / fx[i];
                out.set(i, j, k, material.stiffness_at(i + 1, j + 1, k)[(5, 5)] * strain);
            }
        }
    }
}

/// Stress divergence feeding one displacement component.
pub(crate) struct Divergence<'a> {
    /// Normal stress along the component's own axis
    pub normal: &'a Field3,
    /// Shear stress coupling the other horizontal axis
    pub shear_a: &'a Field3,
    /// Shear stress coupling the remaining axis
    pub shear_b: &'a Field3,
}

/// Second-order recurrence shared by all components.
#[inline(always)]
fn leapfrog(cur: f64, prev: f64, dt2_over_rho: f64, divergence: f64) -> f64 {
    2.0 * cur - prev + dt2_over_rho * divergence
}

/// `ux` update: `d t1/dx + d t6/dy + d t5/dz` with `shear_a = t6`,
/// `shear_b = t5`.
pub(crate) fn displacement_x(
    next: &mut Field3,
    cur: &Field3,
    prev: &Field3,
    div: &Divergence<'_>,
    material: &MaterialField,
    sp: &Spacing,
    dt: f64,
    ks: Range<usize>,
) {
    let (fx, sy, sz) = (&sp.x.full, &sp.y.staggered, &sp.z.staggered);
    let dt2 = dt * dt;
    for i in 0..next.nx {
        for j in 1..next.ny - 1 {
            for k in ks.clone() {
                let d = (div.normal.get(i + 1, j, k) - div.normal.get(i, j, k)) / fx[i]
                    + (div.shear_a.get(i, j, k) - div.shear_a.get(i, j - 1, k)) / sy[j - 1]
                    + dz_from_below(div.shear_b, i, j, k, sz);
                let rho = material.density_at(i + 1, j, k);
                next.set(i, j, k, leapfrog(cur.get(i, j, k), prev.get(i, j, k), dt2 / rho, d));
            }
        }
    }
}

/// `uy` update: `d t6/dx + d t2/dy + d t4/dz` with `shear_a = t6`,
/// `shear_b = t4`.
pub(crate) fn displacement_y(
    next: &mut Field3,
    cur: &Field3,
    prev: &Field3,
    div: &Divergence<'_>,
    material: &MaterialField,
    sp: &Spacing,
    dt: f64,
    ks: Range<usize>,
) {
    let (sx, fy, sz) = (&sp.x.staggered, &sp.y.full, &sp.z.staggered);
    let dt2 = dt * dt;
    for i in 1..next.nx - 1 {
        for j in 0..next.ny {
            for k in ks.clone() {
                let d = (div.shear_a.get(i, j, k) - div.shear_a.get(i - 1, j, k)) / sx[i - 1]
                    + (div.normal.get(i, j + 1, k) - div.normal.get(i, j, k)) / fy[j]
                    + dz_from_below(div.shear_b, i, j, k, sz);
                let rho = material.density_at(i, j + 1, k);
                next.set(i, j, k, leapfrog(cur.get(i, j, k), prev.get(i, j, k), dt2 / rho, d));
            }
        }
    }
}

/// `uz` update: `d t5/dx + d t4/dy + d t3/dz` with `shear_a = t5`,
/// `shear_b = t4`. Covers the surface row as well.
pub(crate) fn displacement_z(
    next: &mut Field3,
    cur: &Field3,
    prev: &Field3,
    div: &Divergence<'_>,
    material: &MaterialField,
    sp: &Spacing,
    dt: f64,
) {
    let (sx, sy, fz) = (&sp.x.staggered, &sp.y.staggered, &sp.z.full);
    let dt2 = dt * dt;
    for i in 1..next.nx - 1 {
        for j in 1..next.ny - 1 {
            for k in 0..next.nz {
                let d = (div.shear_a.get(i, j, k) - div.shear_a.get(i - 1, j, k)) / sx[i - 1]
                    + (div.shear_b.get(i, j, k) - div.shear_b.get(i, j - 1, k)) / sy[j - 1]
                    + (div.normal.get(i, j, k + 1) - div.normal.get(i, j, k)) / fz[k];
                let rho = material.density_at(i, j, k + 1);
                next.set(i, j, k, leapfrog(cur.get(i, j, k), prev.get(i, j, k), dt2 / rho, d));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainSize, MeshParams};
    use crate::grid::{GridDims, MeshGenerator};
    use crate::material::MaterialTable;
    use crate::solver::state::{DisplacementComponent, StressComponent};
    use approx::assert_relative_eq;

    fn setup() -> (MaterialField, Spacing, GridDims) {
        let mesh = MeshGenerator::new(DomainSize::new(4.0, 5.0, 6.0), MeshParams::uniform(1.0), &[])
            .generate()
            .unwrap();
        let material =
            MaterialField::build(&mesh, &[], &MaterialTable::default(), "GaAs", "GaAs", 0.5)
                .unwrap();
        (material, mesh.spacing(), mesh.dims())
    }

    fn zeros(shape: [usize; 3]) -> Field3 {
        Field3::new(shape[0], shape[1], shape[2])
    }

    #[test]
    fn test_uniform_stretch_gives_uniform_normal_stress() {
        let (material, sp, dims) = setup();
        // ux = x at face centres (x + 0.5 on a unit grid) -> exx = 1
        let mut ux = zeros(DisplacementComponent::X.shape(dims));
        for i in 0..ux.nx {
            for j in 0..ux.ny {
                for k in 0..ux.nz {
                    ux.set(i, j, k, i as f64 + 0.5);
                }
            }
        }
        let uy = zeros(DisplacementComponent::Y.shape(dims));
        let uz = zeros(DisplacementComponent::Z.shape(dims));
        let mut t1 = zeros(StressComponent::Xx.shape(dims));
        let mut t2 = zeros(StressComponent::Yy.shape(dims));
        normal_stress(&mut t1, 0, &ux, &uy, &uz, &material, &sp, 1..dims.nz - 1);
        normal_stress(&mut t2, 1, &ux, &uy, &uz, &material, &sp, 1..dims.nz - 1);

        let c = material.primary().stiffness;
        assert_relative_eq!(t1.get(2, 2, 2), c[(0, 0)]);
        assert_relative_eq!(t2.get(1, 3, 4), c[(1, 0)]);
        // boundary rows untouched
        assert_eq!(t1.get(0, 2, 2), 0.0);
        assert_eq!(t1.get(2, 2, 0), 0.0);
    }

    #[test]
    fn test_rigid_shift_has_no_shear() {
        let (material, sp, dims) = setup();
        let ux = Field3::with_value(dims.nx - 1, dims.ny, dims.nz, 3.0);
        let uy = Field3::with_value(dims.nx, dims.ny - 1, dims.nz, -1.0);
        let uz = Field3::with_value(dims.nx, dims.ny, dims.nz - 1, 2.0);
        let mut t4 = zeros(StressComponent::Yz.shape(dims));
        let mut t5 = zeros(StressComponent::Xz.shape(dims));
        let mut t6 = zeros(StressComponent::Xy.shape(dims));
        shear_yz(&mut t4, &uy, &uz, &material, &sp);
        shear_xz(&mut t5, &ux, &uz, &material, &sp);
        shear_xy(&mut t6, &ux, &uy, &material, &sp, 0..dims.nz - 1);
        assert_eq!(t4.max_abs(), 0.0);
        assert_eq!(t5.max_abs(), 0.0);
        assert_eq!(t6.max_abs(), 0.0);
    }

    #[test]
    fn test_zero_stress_is_pure_extrapolation() {
        let (material, sp, dims) = setup();
        let shape = DisplacementComponent::Z.shape(dims);
        let cur = Field3::with_value(shape[0], shape[1], shape[2], 2.0);
        let prev = Field3::with_value(shape[0], shape[1], shape[2], 1.5);
        let mut next = zeros(shape);
        let t3 = zeros(StressComponent::Zz.shape(dims));
        let t4 = zeros(StressComponent::Yz.shape(dims));
        let t5 = zeros(StressComponent::Xz.shape(dims));
        let div = Divergence {
            normal: &t3,
            shear_a: &t5,
            shear_b: &t4,
        };
        displacement_z(&mut next, &cur, &prev, &div, &material, &sp, material.dt());
        assert_eq!(next.get(1, 1, 0), 2.5);
        assert_eq!(next.get(2, 3, 4), 2.5);
        assert_eq!(next.get(0, 1, 0), 0.0);
    }

    #[test]
    fn test_surface_row_treats_air_as_zero() {
        let (material, sp, dims) = setup();
        let shape = DisplacementComponent::X.shape(dims);
        let cur = zeros(shape);
        let prev = zeros(shape);
        let mut next = zeros(shape);
        let t1 = zeros(StressComponent::Xx.shape(dims));
        let t6 = zeros(StressComponent::Xy.shape(dims));
        let mut t5 = zeros(StressComponent::Xz.shape(dims));
        t5.set(1, 2, 0, 1.0);
        let div = Divergence {
            normal: &t1,
            shear_a: &t6,
            shear_b: &t5,
        };
        let dt = material.dt();
        displacement_x(&mut next, &cur, &prev, &div, &material, &sp, dt, 0..1);
        let expected = dt * dt / material.density_at(2, 2, 0) * (1.0 / sp.z.staggered[0]);
        assert_relative_eq!(next.get(1, 2, 0), expected);
        assert_eq!(next.get(1, 2, 1), 0.0);
    }
}
