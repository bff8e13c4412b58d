//! Stage tasks
//!
//! A time step is four stages run in order. Within a stage every task writes
//! exactly one buffer and reads only buffers no other task of the same stage
//! writes, so the tasks of a stage may run in any order or concurrently.
//! Completing a stage is the barrier for the next one.

use super::boundary::{absorb, wrap_y, BoundaryConfig};
use super::kernels::{
    displacement_x, displacement_y, displacement_z, normal_stress, shear_xy, shear_xz, shear_yz,
    Divergence,
};
use super::state::{DisplacementComponent, StressComponent, TimeLevel, WaveState};
use crate::grid::{Axis, Spacing};
use crate::material::MaterialField;
use std::fmt;
use std::sync::Arc;

/// Read-only inputs shared by every task of a run.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub spacing: Spacing,
    pub material: Arc<MaterialField>,
    pub dt: f64,
    pub boundary: BoundaryConfig,
}

/// One phase of a time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Stress,
    StressBoundary,
    Displacement,
    DisplacementBoundary,
}

const STRESS_TASKS: [ExecutionTask; 6] = [
    ExecutionTask::Stress(StressComponent::Xx),
    ExecutionTask::Stress(StressComponent::Yy),
    ExecutionTask::Stress(StressComponent::Zz),
    ExecutionTask::Stress(StressComponent::Yz),
    ExecutionTask::Stress(StressComponent::Xz),
    ExecutionTask::Stress(StressComponent::Xy),
];

const STRESS_BOUNDARY_TASKS: [ExecutionTask; 6] = [
    ExecutionTask::StressBoundary(StressComponent::Xx),
    ExecutionTask::StressBoundary(StressComponent::Yy),
    ExecutionTask::StressBoundary(StressComponent::Zz),
    ExecutionTask::StressBoundary(StressComponent::Yz),
    ExecutionTask::StressBoundary(StressComponent::Xz),
    ExecutionTask::StressBoundary(StressComponent::Xy),
];

const DISPLACEMENT_TASKS: [ExecutionTask; 3] = [
    ExecutionTask::Displacement(DisplacementComponent::X),
    ExecutionTask::Displacement(DisplacementComponent::Y),
    ExecutionTask::Displacement(DisplacementComponent::Z),
];

const DISPLACEMENT_BOUNDARY_TASKS: [ExecutionTask; 3] = [
    ExecutionTask::DisplacementBoundary(DisplacementComponent::X),
    ExecutionTask::DisplacementBoundary(DisplacementComponent::Y),
    ExecutionTask::DisplacementBoundary(DisplacementComponent::Z),
];

impl Stage {
    /// Stages in execution order.
    pub const ORDER: [Stage; 4] = [
        Stage::Stress,
        Stage::StressBoundary,
        Stage::Displacement,
        Stage::DisplacementBoundary,
    ];

    pub fn tasks(self) -> &'static [ExecutionTask] {
        match self {
            Stage::Stress => &STRESS_TASKS,
            Stage::StressBoundary => &STRESS_BOUNDARY_TASKS,
            Stage::Displacement => &DISPLACEMENT_TASKS,
            Stage::DisplacementBoundary => &DISPLACEMENT_BOUNDARY_TASKS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Stress => "stress",
            Stage::StressBoundary => "stress_boundary",
            Stage::Displacement => "displacement",
            Stage::DisplacementBoundary => "displacement_boundary",
        }
    }
}

/// Identity of one buffer in a [`WaveState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    Stress(StressComponent),
    Displacement(DisplacementComponent, TimeLevel),
}

/// Unit of work: one component of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionTask {
    Stress(StressComponent),
    StressBoundary(StressComponent),
    Displacement(DisplacementComponent),
    DisplacementBoundary(DisplacementComponent),
}

impl fmt::Display for ExecutionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let component = match self {
            Self::Stress(c) | Self::StressBoundary(c) => c.name(),
            Self::Displacement(c) | Self::DisplacementBoundary(c) => c.name(),
        };
        write!(f, "{}:{component}", self.stage().name())
    }
}

fn current_displacements() -> impl Iterator<Item = BufferId> {
    DisplacementComponent::ALL
        .into_iter()
        .map(|c| BufferId::Displacement(c, TimeLevel::Current))
}

fn all_stresses() -> impl Iterator<Item = BufferId> {
    StressComponent::ALL.into_iter().map(BufferId::Stress)
}

impl ExecutionTask {
    pub fn stage(self) -> Stage {
        match self {
            Self::Stress(_) => Stage::Stress,
            Self::StressBoundary(_) => Stage::StressBoundary,
            Self::Displacement(_) => Stage::Displacement,
            Self::DisplacementBoundary(_) => Stage::DisplacementBoundary,
        }
    }

    /// The single buffer this task writes.
    pub fn output(self) -> BufferId {
        match self {
            Self::Stress(c) | Self::StressBoundary(c) => BufferId::Stress(c),
            Self::Displacement(c) | Self::DisplacementBoundary(c) => {
                BufferId::Displacement(c, TimeLevel::Next)
            }
        }
    }

    /// Buffers this task may read.
    pub fn inputs(self) -> Vec<BufferId> {
        match self {
            Self::Stress(_) | Self::StressBoundary(_) => current_displacements().collect(),
            Self::Displacement(c) | Self::DisplacementBoundary(c) => all_stresses()
                .chain([
                    BufferId::Displacement(c, TimeLevel::Current),
                    BufferId::Displacement(c, TimeLevel::Previous),
                ])
                .collect(),
        }
    }

    /// Run the task against `state`. Takes read locks on the inputs first,
    /// then the write lock on the output.
    pub fn execute(self, state: &WaveState, ctx: &StageContext) {
        match self {
            Self::Stress(c) => stress(c, state, ctx),
            Self::StressBoundary(c) => stress_boundary(c, state, ctx),
            Self::Displacement(c) => displacement(c, state, ctx),
            Self::DisplacementBoundary(c) => displacement_boundary(c, state, ctx),
        }
    }
}

fn stress(component: StressComponent, state: &WaveState, ctx: &StageContext) {
    let level = TimeLevel::Current;
    let ux = state.displacement(DisplacementComponent::X, level).read();
    let uy = state.displacement(DisplacementComponent::Y, level).read();
    let uz = state.displacement(DisplacementComponent::Z, level).read();
    let mut out = state.stress(component).write();
    let (m, sp) = (&*ctx.material, &ctx.spacing);
    let interior = 1..state.dims().nz - 1;

    match component {
        StressComponent::Xx | StressComponent::Yy | StressComponent::Zz => {
            normal_stress(&mut out, component.voigt(), &ux, &uy, &uz, m, sp, interior);
        }
        StressComponent::Yz => shear_yz(&mut out, &uy, &uz, m, sp),
        StressComponent::Xz => shear_xz(&mut out, &ux, &uz, m, sp),
        StressComponent::Xy => shear_xy(&mut out, &ux, &uy, m, sp, interior),
    }
}

fn stress_boundary(component: StressComponent, state: &WaveState, ctx: &StageContext) {
    let traction_free = ctx.boundary.traction_free();
    let periodic = ctx.boundary.periodic_y();
    if !traction_free && !periodic {
        return;
    }

    let level = TimeLevel::Current;
    let ux = state.displacement(DisplacementComponent::X, level).read();
    let uy = state.displacement(DisplacementComponent::Y, level).read();
    let uz = state.displacement(DisplacementComponent::Z, level).read();
    let mut out = state.stress(component).write();
    let (m, sp) = (&*ctx.material, &ctx.spacing);

    if traction_free {
        match component {
            StressComponent::Xx | StressComponent::Yy => {
                normal_stress(&mut out, component.voigt(), &ux, &uy, &uz, m, sp, 0..1);
            }
            // zero normal traction on the surface
            StressComponent::Zz => {
                for i in 1..out.nx - 1 {
                    for j in 1..out.ny - 1 {
                        out.set(i, j, 0, 0.0);
                    }
                }
            }
            StressComponent::Xy => shear_xy(&mut out, &ux, &uy, m, sp, 0..1),
            StressComponent::Yz | StressComponent::Xz => {}
        }
    }
    if periodic {
        wrap_y(&mut out, component.staggered_on(Axis::Y));
    }
}

fn divergence_inputs(component: DisplacementComponent) -> [StressComponent; 3] {
    match component {
        DisplacementComponent::X => [StressComponent::Xx, StressComponent::Xy, StressComponent::Xz],
        DisplacementComponent::Y => [StressComponent::Yy, StressComponent::Xy, StressComponent::Yz],
        DisplacementComponent::Z => [StressComponent::Zz, StressComponent::Xz, StressComponent::Yz],
    }
}

/// Interior (`surface == false`) or z = 0 (`surface == true`) displacement rows.
fn update_displacement(
    component: DisplacementComponent,
    state: &WaveState,
    ctx: &StageContext,
    surface: bool,
) {
    let [normal, shear_a, shear_b] = divergence_inputs(component);
    let normal = state.stress(normal).read();
    let shear_a = state.stress(shear_a).read();
    let shear_b = state.stress(shear_b).read();
    let div = Divergence {
        normal: &normal,
        shear_a: &shear_a,
        shear_b: &shear_b,
    };
    let cur = state.displacement(component, TimeLevel::Current).read();
    let prev = state.displacement(component, TimeLevel::Previous).read();
    let mut next = state.displacement(component, TimeLevel::Next).write();
    let (m, sp, dt) = (&*ctx.material, &ctx.spacing, ctx.dt);
    let ks = if surface { 0..1 } else { 1..state.dims().nz - 1 };

    match component {
        DisplacementComponent::X => displacement_x(&mut next, &cur, &prev, &div, m, sp, dt, ks),
        DisplacementComponent::Y => displacement_y(&mut next, &cur, &prev, &div, m, sp, dt, ks),
        DisplacementComponent::Z => {
            if !surface {
                displacement_z(&mut next, &cur, &prev, &div, m, sp, dt);
            }
        }
    }
}

fn displacement(component: DisplacementComponent, state: &WaveState, ctx: &StageContext) {
    update_displacement(component, state, ctx, false);
}

fn displacement_boundary(component: DisplacementComponent, state: &WaveState, ctx: &StageContext) {
    if ctx.boundary.traction_free() && component != DisplacementComponent::Z {
        update_displacement(component, state, ctx, true);
    }

    let cur = state.displacement(component, TimeLevel::Current).read();
    let mut next = state.displacement(component, TimeLevel::Next).write();
    for face in ctx.boundary.absorbing_faces() {
        absorb(face, component, &mut next, &cur, &ctx.material, &ctx.spacing, ctx.dt);
    }
    if ctx.boundary.periodic_y() {
        wrap_y(&mut next, component == DisplacementComponent::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainSize, MeshParams};
    use crate::grid::MeshGenerator;
    use crate::solver::boundary::LateralBoundary;
    use crate::material::MaterialTable;
    use rustc_hash::FxHashSet;

    fn context(boundary: BoundaryConfig) -> (WaveState, StageContext) {
        let mesh = MeshGenerator::new(DomainSize::new(4.0, 5.0, 6.0), MeshParams::uniform(1.0), &[])
            .generate()
            .unwrap();
        let material =
            MaterialField::build(&mesh, &[], &MaterialTable::default(), "GaAs", "GaAs", 0.5)
                .unwrap();
        let ctx = StageContext {
            spacing: mesh.spacing(),
            dt: material.dt(),
            material: Arc::new(material),
            boundary,
        };
        (WaveState::new(mesh.dims()), ctx)
    }

    #[test]
    fn test_stage_tasks_write_disjoint_buffers() {
        for stage in Stage::ORDER {
            let tasks = stage.tasks();
            let outputs: FxHashSet<BufferId> = tasks.iter().map(|t| t.output()).collect();
            assert_eq!(outputs.len(), tasks.len(), "{} writes a buffer twice", stage.name());

            for task in tasks {
                assert_eq!(task.stage(), stage);
                for input in task.inputs() {
                    assert!(
                        !outputs.contains(&input),
                        "{task} reads {input:?} written in the same stage"
                    );
                }
            }
        }
    }

    #[test]
    fn test_task_display() {
        assert_eq!(
            ExecutionTask::StressBoundary(StressComponent::Xz).to_string(),
            "stress_boundary:t5"
        );
        assert_eq!(
            ExecutionTask::Displacement(DisplacementComponent::Y).to_string(),
            "displacement:uy"
        );
    }

    #[test]
    fn test_quiet_state_stays_quiet() {
        let (state, ctx) = context(BoundaryConfig::default());
        for stage in Stage::ORDER {
            for task in stage.tasks() {
                task.execute(&state, &ctx);
            }
        }
        state.rotate();
        for c in DisplacementComponent::ALL {
            assert_eq!(state.displacement(c, TimeLevel::Current).read().max_abs(), 0.0);
        }
    }

    #[test]
    fn test_free_surface_zeroes_normal_traction() {
        let (state, ctx) = context(BoundaryConfig::default());
        state
            .displacement(DisplacementComponent::Z, TimeLevel::Current)
            .write()
            .set(2, 2, 0, 1e-6);

        ExecutionTask::Stress(StressComponent::Zz).execute(&state, &ctx);
        state.stress(StressComponent::Zz).write().set(2, 2, 0, 5.0);
        ExecutionTask::StressBoundary(StressComponent::Zz).execute(&state, &ctx);

        let t3 = state.stress(StressComponent::Zz).read();
        assert_eq!(t3.get(2, 2, 0), 0.0);
        // interior rows are left to the stress stage
        assert!(t3.get(2, 2, 1).abs() > 0.0);
    }

    #[test]
    fn test_surface_source_moves_stress() {
        let (state, ctx) = context(BoundaryConfig::default());
        {
            let mut ux = state
                .displacement(DisplacementComponent::X, TimeLevel::Current)
                .write();
            for j in 0..ux.ny {
                ux.set(1, j, 0, 1e-6);
            }
        }
        ExecutionTask::StressBoundary(StressComponent::Xx).execute(&state, &ctx);
        let t1 = state.stress(StressComponent::Xx).read();
        assert!(t1.get(1, 2, 0) > 0.0);
        assert!(t1.get(2, 2, 0) < 0.0);
    }

    #[test]
    fn test_periodic_wrap_applies_to_displacement() {
        let boundary = BoundaryConfig {
            lateral_y: LateralBoundary::Periodic,
            ..BoundaryConfig::default()
        };
        let (state, ctx) = context(boundary);
        let ny = state.dims().ny;
        state
            .displacement(DisplacementComponent::Z, TimeLevel::Next)
            .write()
            .set(2, ny - 2, 3, 0.5);

        ExecutionTask::DisplacementBoundary(DisplacementComponent::Z).execute(&state, &ctx);

        let uz = state.displacement(DisplacementComponent::Z, TimeLevel::Next).read();
        assert_eq!(uz.get(2, 0, 3), 0.5);
    }
}
