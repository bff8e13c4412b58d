//! Wave field state
//!
//! Every buffer lives behind its own shared handle so a stage can hand
//! different components to different workers. Handles are allocated once
//! per [`WaveState`] and stay valid for its lifetime; time-level rotation
//! swaps buffer contents, never handles.

use super::fields::Field3;
use crate::grid::{Axis, GridDims};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use std::sync::Arc;

/// Shared, lockable handle to one field buffer.
pub type SharedField = Arc<RwLock<Field3>>;

/// Stress tensor component in Voigt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StressComponent {
    Xx,
    Yy,
    Zz,
    Yz,
    Xz,
    Xy,
}

impl StressComponent {
    pub const ALL: [StressComponent; 6] = [
        StressComponent::Xx,
        StressComponent::Yy,
        StressComponent::Zz,
        StressComponent::Yz,
        StressComponent::Xz,
        StressComponent::Xy,
    ];

    /// Zero-based Voigt index, also the stiffness row for this component.
    pub fn voigt(self) -> usize {
        self as usize
    }

    /// Sub-grid shape. Normal stresses sit on grid nodes; each shear
    /// stress is offset by half a cell along the two axes it couples.
    pub fn shape(self, dims: GridDims) -> [usize; 3] {
        let GridDims { nx, ny, nz } = dims;
        match self {
            Self::Xx | Self::Yy | Self::Zz => [nx, ny, nz],
            Self::Yz => [nx, ny - 1, nz - 1],
            Self::Xz => [nx - 1, ny, nz - 1],
            Self::Xy => [nx - 1, ny - 1, nz],
        }
    }

    /// True when the component is offset along `axis`.
    pub fn staggered_on(self, axis: Axis) -> bool {
        matches!(
            (self, axis),
            (Self::Yz, Axis::Y | Axis::Z) | (Self::Xz, Axis::X | Axis::Z) | (Self::Xy, Axis::X | Axis::Y)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Xx => "t1",
            Self::Yy => "t2",
            Self::Zz => "t3",
            Self::Yz => "t4",
            Self::Xz => "t5",
            Self::Xy => "t6",
        }
    }
}

/// Displacement component; each is face-centred along its own axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplacementComponent {
    X,
    Y,
    Z,
}

impl DisplacementComponent {
    pub const ALL: [DisplacementComponent; 3] = [
        DisplacementComponent::X,
        DisplacementComponent::Y,
        DisplacementComponent::Z,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Self::X => Axis::X,
            Self::Y => Axis::Y,
            Self::Z => Axis::Z,
        }
    }

    /// One sample short of the node grid along its own axis.
    pub fn shape(self, dims: GridDims) -> [usize; 3] {
        let GridDims { nx, ny, nz } = dims;
        match self {
            Self::X => [nx - 1, ny, nz],
            Self::Y => [nx, ny - 1, nz],
            Self::Z => [nx, ny, nz - 1],
        }
    }

    /// Material cell whose density and stiffness drive sample `(i, j, k)`.
    #[inline]
    pub fn material_cell(self, i: usize, j: usize, k: usize) -> (usize, usize, usize) {
        match self {
            Self::X => (i + 1, j, k),
            Self::Y => (i, j + 1, k),
            Self::Z => (i, j, k + 1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::X => "ux",
            Self::Y => "uy",
            Self::Z => "uz",
        }
    }
}

impl fmt::Display for DisplacementComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position in the displacement recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeLevel {
    Previous,
    Current,
    Next,
}

/// Copy of the current displacement at the end of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub step: usize,
    pub ux: Field3,
    pub uy: Field3,
    pub uz: Field3,
}

impl Snapshot {
    pub fn component(&self, component: DisplacementComponent) -> &Field3 {
        match component {
            DisplacementComponent::X => &self.ux,
            DisplacementComponent::Y => &self.uy,
            DisplacementComponent::Z => &self.uz,
        }
    }
}

/// Arena of stress and triple-buffered displacement buffers.
///
/// Cloning copies handles, not data: clones observe the same buffers.
#[derive(Debug, Clone)]
pub struct WaveState {
    dims: GridDims,
    stress: [SharedField; 6],
    displacement: [[SharedField; 3]; 3],
}

fn shared(shape: [usize; 3]) -> SharedField {
    Arc::new(RwLock::new(Field3::new(shape[0], shape[1], shape[2])))
}

impl WaveState {
    /// Zero-initialized buffers for a grid of `dims` nodes.
    pub fn new(dims: GridDims) -> Self {
        let stress = StressComponent::ALL.map(|c| shared(c.shape(dims)));
        let displacement = DisplacementComponent::ALL.map(|c| {
            let shape = c.shape(dims);
            [shared(shape), shared(shape), shared(shape)]
        });
        Self {
            dims,
            stress,
            displacement,
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn stress(&self, component: StressComponent) -> &SharedField {
        &self.stress[component.voigt()]
    }

    pub fn displacement(&self, component: DisplacementComponent, level: TimeLevel) -> &SharedField {
        &self.displacement[component as usize][level as usize]
    }

    /// Advance one time level: previous <- current <- next. The old
    /// previous buffer becomes scratch for the next step.
    ///
    /// Must not run while a stage holds any displacement lock.
    pub fn rotate(&self) {
        for levels in &self.displacement {
            let mut previous = levels[0].write();
            let mut current = levels[1].write();
            let mut next = levels[2].write();
            mem::swap(&mut *previous, &mut *current);
            mem::swap(&mut *current, &mut *next);
        }
    }

    /// Copy of the current displacement fields.
    pub fn snapshot(&self, step: usize) -> Snapshot {
        let current = |c| self.displacement(c, TimeLevel::Current).read().clone();
        Snapshot {
            step,
            ux: current(DisplacementComponent::X),
            uy: current(DisplacementComponent::Y),
            uz: current(DisplacementComponent::Z),
        }
    }

    /// Zero every buffer.
    pub fn reset(&self) {
        for field in self.stress.iter().chain(self.displacement.iter().flatten()) {
            field.write().fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> GridDims {
        GridDims::new(5, 6, 7)
    }

    #[test]
    fn test_buffer_shapes() {
        let state = WaveState::new(dims());
        assert_eq!(state.stress(StressComponent::Xx).read().shape(), [5, 6, 7]);
        assert_eq!(state.stress(StressComponent::Yz).read().shape(), [5, 5, 6]);
        assert_eq!(state.stress(StressComponent::Xz).read().shape(), [4, 6, 6]);
        assert_eq!(state.stress(StressComponent::Xy).read().shape(), [4, 5, 7]);
        for level in [TimeLevel::Previous, TimeLevel::Current, TimeLevel::Next] {
            assert_eq!(
                state.displacement(DisplacementComponent::X, level).read().shape(),
                [4, 6, 7]
            );
            assert_eq!(
                state.displacement(DisplacementComponent::Y, level).read().shape(),
                [5, 5, 7]
            );
            assert_eq!(
                state.displacement(DisplacementComponent::Z, level).read().shape(),
                [5, 6, 6]
            );
        }
    }

    #[test]
    fn test_rotate_shifts_levels() {
        let state = WaveState::new(dims());
        let handle = |level| state.displacement(DisplacementComponent::Z, level);
        handle(TimeLevel::Previous).write().fill(1.0);
        handle(TimeLevel::Current).write().fill(2.0);
        handle(TimeLevel::Next).write().fill(3.0);

        state.rotate();

        assert_eq!(handle(TimeLevel::Previous).read().get(0, 0, 0), 2.0);
        assert_eq!(handle(TimeLevel::Current).read().get(0, 0, 0), 3.0);
        assert_eq!(handle(TimeLevel::Next).read().get(0, 0, 0), 1.0);
    }

    #[test]
    fn test_clones_share_buffers() {
        let state = WaveState::new(dims());
        let other = state.clone();
        other
            .stress(StressComponent::Xy)
            .write()
            .set(1, 1, 1, 4.0);
        assert_eq!(state.stress(StressComponent::Xy).read().get(1, 1, 1), 4.0);
        state.reset();
        assert_eq!(other.stress(StressComponent::Xy).read().max_abs(), 0.0);
    }

    #[test]
    fn test_snapshot_copies_current_level() {
        let state = WaveState::new(dims());
        state
            .displacement(DisplacementComponent::X, TimeLevel::Current)
            .write()
            .set(0, 1, 2, 0.25);
        let snapshot = state.snapshot(3);
        state.rotate();
        assert_eq!(snapshot.step, 3);
        assert_eq!(snapshot.ux.get(0, 1, 2), 0.25);
        assert_eq!(snapshot.component(DisplacementComponent::Y).shape(), [5, 5, 7]);
    }
}
