mod common;

use approx::assert_relative_eq;
use wave_sim_core::solver::{BoundaryConfig, DisplacementComponent, LateralBoundary, SurfaceBoundary};
use wave_sim_core::{
    ContainerReader, DomainSize, MeshParams, Session, SimulationConfig, SolverState, StrategyKind,
};

#[test]
fn test_run_before_initialize_is_a_configuration_error() {
    let mut session = Session::new(SimulationConfig::gaas_block()).unwrap();
    let err = session.run().unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(session.solver_state(), SolverState::Idle);
}

#[test]
fn test_homogeneous_line_source_is_symmetric_in_y() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("symmetric.wvfd");
    let mut config = SimulationConfig::gaas_block();
    config.domain = DomainSize::new(6.0, 6.0, 5.0);
    config.mesh = MeshParams::uniform(1.0);
    config.steps = 20;
    config.writer.path = Some(path.clone());

    let summary = Session::new(config).unwrap().execute().unwrap();
    assert_eq!(summary.recorded_steps, 20);

    let mut reader = ContainerReader::open(&path).unwrap();
    let uz = reader.read_step(DisplacementComponent::Z, 19).unwrap();
    let scale = uz.max_abs();
    assert!(scale > 0.0);
    for i in 0..uz.nx {
        for j in 0..uz.ny {
            for k in 0..uz.nz {
                assert_relative_eq!(
                    uz.get(i, j, k),
                    uz.get(i, uz.ny - 1 - j, k),
                    epsilon = 1e-9 * scale
                );
            }
        }
    }
}

#[test]
fn test_open_boundaries_stay_finite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("open.wvfd");
    let mut config = common::inclusion_block(&path, StrategyKind::ThreadPool { threads: None }, 15);
    config.boundary = BoundaryConfig {
        surface: SurfaceBoundary::Absorbing,
        lateral_y: LateralBoundary::Periodic,
    };

    let summary = Session::new(config).unwrap().execute().unwrap();
    let mut reader = ContainerReader::open(&path).unwrap();
    for component in DisplacementComponent::ALL {
        let field = reader
            .read_step(component, summary.steps_run - 1)
            .unwrap();
        assert!(field.data.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_inclusion_changes_the_response() {
    let dir = tempfile::tempdir().unwrap();
    let with = dir.path().join("with.wvfd");
    let without = dir.path().join("without.wvfd");

    let config = common::inclusion_block(&with, StrategyKind::Sequential, 25);
    let mut homogeneous = common::inclusion_block(&without, StrategyKind::Sequential, 25);
    homogeneous.secondary = homogeneous.primary.clone();

    Session::new(config).unwrap().execute().unwrap();
    Session::new(homogeneous).unwrap().execute().unwrap();

    let a = ContainerReader::open(&with)
        .unwrap()
        .read_step(DisplacementComponent::Z, 24)
        .unwrap();
    let b = ContainerReader::open(&without)
        .unwrap()
        .read_step(DisplacementComponent::Z, 24)
        .unwrap();
    assert_eq!(a.shape(), b.shape());
    assert_ne!(a, b);
}
