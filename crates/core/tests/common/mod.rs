#![allow(dead_code)]

use std::path::Path;
use wave_sim_core::{
    InclusionRegion, MaterialProperties, MeshParams, SimulationConfig, StrategyKind,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Small block with one soft cylindrical inclusion through its full depth.
pub fn inclusion_block(output: &Path, strategy: StrategyKind, steps: usize) -> SimulationConfig {
    let mut config = SimulationConfig::gaas_block();
    config.domain = wave_sim_core::DomainSize::new(8.0, 8.0, 4.0);
    config.mesh = MeshParams {
        min_d: 0.5,
        max_dx: 1.0,
        max_dy: 1.0,
        max_dz: 1.0,
        slope: 0.5,
    };
    config.inclusions = vec![InclusionRegion::new(4.0, 4.0, 1.5)];
    config
        .materials
        .register("Soft", MaterialProperties::cubic(2700.0, 10.7e10, 6.1e10, 2.8e10));
    config.secondary = "Soft".to_string();
    config.steps = steps;
    config.strategy = strategy;
    config.writer.path = Some(output.to_path_buf());
    config
}
