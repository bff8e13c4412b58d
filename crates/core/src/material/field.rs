use super::{MaterialProperties, MaterialTable};
use crate::config::positive;
use crate::error::{Result, SimError};
use crate::grid::{GridDims, InclusionRegion, Mesh};
use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-cell stiffness and density rasterized from two materials, plus the
/// global time step derived from them.
///
/// `dt` is fixed at assignment time; the solver only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialField {
    dims: GridDims,
    primary_name: String,
    secondary_name: String,
    primary: MaterialProperties,
    secondary: MaterialProperties,
    courant: f64,
    stiffness: Vec<Matrix6<f64>>,
    density: Vec<f64>,
    secondary_cells: usize,
    dt: f64,
}

impl MaterialField {
    /// Resolve the two material keys, rasterize the inclusions onto `mesh`,
    /// and derive `dt`.
    ///
    /// # Errors
    ///
    /// Unknown material keys, unphysical material values, or a non-positive
    /// Courant number.
    pub fn build(
        mesh: &Mesh,
        inclusions: &[InclusionRegion],
        table: &MaterialTable,
        primary: &str,
        secondary: &str,
        courant: f64,
    ) -> Result<Self> {
        let primary_props = table.get(primary)?.clone();
        let secondary_props = table.get(secondary)?.clone();
        primary_props.validate(primary)?;
        secondary_props.validate(secondary)?;
        positive("courant", courant)?;

        let mut field = Self {
            dims: mesh.dims(),
            primary_name: primary.to_string(),
            secondary_name: secondary.to_string(),
            primary: primary_props,
            secondary: secondary_props,
            courant,
            stiffness: Vec::new(),
            density: Vec::new(),
            secondary_cells: 0,
            dt: 0.0,
        };
        field.assign(mesh, inclusions);
        info!(
            "Material field {}x{}x{}: {} ({} cells of {}), dt = {:.4e} s",
            field.dims.nx,
            field.dims.ny,
            field.dims.nz,
            primary,
            field.secondary_cells,
            secondary,
            field.dt
        );
        Ok(field)
    }

    /// Reset every cell to the primary material, then overwrite cells whose
    /// coordinate sample falls inside an inclusion disk and depth with the
    /// secondary material. Recomputes `dt`.
    pub fn assign(&mut self, mesh: &Mesh, inclusions: &[InclusionRegion]) {
        let dims = mesh.dims();
        self.dims = dims;
        self.stiffness = vec![self.primary.stiffness; dims.cells()];
        self.density = vec![self.primary.density; dims.cells()];
        self.secondary_cells = 0;

        for inclusion in inclusions {
            let depth: Vec<usize> = (0..dims.nz)
                .filter(|&k| inclusion.contains_z(mesh.z()[k]))
                .collect();
            for (i, &x) in mesh.x().iter().enumerate() {
                for (j, &y) in mesh.y().iter().enumerate() {
                    if !inclusion.contains_xy(x, y) {
                        continue;
                    }
                    for &k in &depth {
                        let idx = dims.index(i, j, k);
                        if self.density[idx] != self.secondary.density
                            || self.stiffness[idx] != self.secondary.stiffness
                        {
                            self.secondary_cells += 1;
                        }
                        self.stiffness[idx] = self.secondary.stiffness;
                        self.density[idx] = self.secondary.density;
                    }
                }
            }
        }

        self.dt = self.time_step(mesh, self.courant);
        debug!(
            "Assigned {} secondary cells from {} inclusions",
            self.secondary_cells,
            inclusions.len()
        );
    }

    /// Minimum CFL-stable step over both materials on `mesh`.
    pub fn time_step(&self, mesh: &Mesh, courant: f64) -> f64 {
        let min_spacing = mesh.spacing().min_full();
        let primary = self.primary.stable_time_step(min_spacing, courant);
        let secondary = self.secondary.stable_time_step(min_spacing, courant);
        primary.min(secondary)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn courant(&self) -> f64 {
        self.courant
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn primary(&self) -> &MaterialProperties {
        &self.primary
    }

    pub fn secondary(&self) -> &MaterialProperties {
        &self.secondary
    }

    /// Table key the host material was resolved from.
    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    pub fn secondary_name(&self) -> &str {
        &self.secondary_name
    }

    /// Cells that ended up holding different values than the host.
    pub fn secondary_cell_count(&self) -> usize {
        self.secondary_cells
    }

    #[inline]
    pub fn stiffness_at(&self, i: usize, j: usize, k: usize) -> &Matrix6<f64> {
        &self.stiffness[self.dims.index(i, j, k)]
    }

    #[inline]
    pub fn density_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.density[self.dims.index(i, j, k)]
    }

    /// Longitudinal and transverse speed of the cell at `(i, j, k)`.
    #[inline]
    pub fn wave_speeds_at(&self, i: usize, j: usize, k: usize) -> (f64, f64) {
        let idx = self.dims.index(i, j, k);
        let rho = self.density[idx];
        let c = &self.stiffness[idx];
        ((c[(0, 0)] / rho).sqrt(), (c[(3, 3)] / rho).sqrt())
    }

    pub fn density(&self) -> &[f64] {
        &self.density
    }

    pub fn stiffness(&self) -> &[Matrix6<f64>] {
        &self.stiffness
    }

    /// Serialize for transfer to a remote solver.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| SimError::Transport(format!("material encode: {e}")))
    }

    /// Decode a blob produced by [`MaterialField::to_blob`].
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let field: Self = serde_json::from_slice(blob)
            .map_err(|e| SimError::Transport(format!("material decode: {e}")))?;
        if field.density.len() != field.dims.cells() || field.stiffness.len() != field.dims.cells()
        {
            return Err(SimError::Transport(format!(
                "material blob holds {} cells, dims need {}",
                field.density.len(),
                field.dims.cells()
            )));
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainSize, MeshParams};
    use crate::grid::MeshGenerator;
    use approx::assert_relative_eq;

    fn table() -> MaterialTable {
        let mut table = MaterialTable::default();
        table.register("Soft", MaterialProperties::cubic(1200.0, 4e9, 2e9, 1e9));
        table
    }

    fn gaas_block() -> Mesh {
        MeshGenerator::new(DomainSize::new(4.0, 5.0, 6.0), MeshParams::uniform(1.0), &[])
            .generate()
            .unwrap()
    }

    #[test]
    fn test_same_material_gives_uniform_field() {
        let mesh = gaas_block();
        let inclusions = [InclusionRegion::new(2.0, 2.5, 1.0)];
        let field =
            MaterialField::build(&mesh, &inclusions, &table(), "GaAs", "GaAs", 0.5).unwrap();
        let gaas = MaterialProperties::gaas();
        assert!(field.density().iter().all(|&d| d == gaas.density));
        assert!(field.stiffness().iter().all(|c| *c == gaas.stiffness));
        assert_eq!(field.secondary_cell_count(), 0);
    }

    #[test]
    fn test_dt_independent_of_query_order() {
        let mesh = gaas_block();
        let table = table();
        let a = MaterialField::build(&mesh, &[], &table, "GaAs", "Soft", 0.5).unwrap();
        let b = MaterialField::build(&mesh, &[], &table, "Soft", "GaAs", 0.5).unwrap();
        assert_eq!(a.dt(), b.dt());

        let gaas = MaterialField::build(&mesh, &[], &table, "GaAs", "GaAs", 0.5).unwrap();
        assert_relative_eq!(gaas.dt(), 0.5 / MaterialProperties::gaas().max_speed());
    }

    #[test]
    fn test_unknown_material_is_configuration_error() {
        let mesh = gaas_block();
        let err = MaterialField::build(&mesh, &[], &table(), "GaAs", "Missing", 0.5).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_depth_limited_inclusion() {
        let mesh = gaas_block();
        let inclusions = [InclusionRegion::new(2.0, 2.5, 1.2).with_depth(2.0)];
        let field = MaterialField::build(&mesh, &inclusions, &table(), "GaAs", "Soft", 0.5).unwrap();
        // (2, 2) is within 1.2 of (2, 2.5); z = 0, 1, 2 are inside the depth
        assert_eq!(field.density_at(2, 2, 2), 1200.0);
        assert_eq!(field.density_at(2, 2, 3), 5307.0);
        assert!(field.secondary_cell_count() > 0);
    }

    #[test]
    fn test_centered_inclusion_stays_inside_disk() {
        let mesh = MeshGenerator::new(
            DomainSize::new(8.0, 8.0, 2.0),
            MeshParams::uniform(0.5),
            &[],
        )
        .generate()
        .unwrap();
        let inclusion = InclusionRegion::new(4.0, 4.0, 1.5);
        let field =
            MaterialField::build(&mesh, &[inclusion], &table(), "GaAs", "Soft", 0.5).unwrap();
        assert!(field.secondary_cell_count() > 0);

        for (i, &x) in mesh.x().iter().enumerate() {
            for (j, &y) in mesh.y().iter().enumerate() {
                for k in 0..mesh.z().len() {
                    let soft = field.density_at(i, j, k) == 1200.0;
                    assert_eq!(soft, inclusion.contains_xy(x, y), "cell ({i}, {j}, {k})");
                }
            }
        }
    }

    #[test]
    fn test_blob_rejects_mismatched_cells() {
        let mesh = gaas_block();
        let mut field = MaterialField::build(&mesh, &[], &table(), "GaAs", "GaAs", 0.5).unwrap();
        let blob = field.to_blob().unwrap();
        assert_eq!(MaterialField::from_blob(&blob).unwrap(), field);

        field.density.pop();
        let blob = field.to_blob().unwrap();
        assert!(matches!(MaterialField::from_blob(&blob), Err(SimError::Transport(_))));
    }
}
