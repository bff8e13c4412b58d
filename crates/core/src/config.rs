//! Simulation configuration
//!
//! Plain serde structs describing one run: domain, mesh spacing, inclusion
//! geometry, material table and keys, time stepping, source, boundaries,
//! execution strategy, and the output pipeline. Configurations round-trip
//! through JSON so a front end can persist and reload them.

use crate::error::{ConfigError, Result, SimError};
use crate::grid::InclusionRegion;
use crate::material::MaterialTable;
use crate::solver::{BoundaryConfig, SourceConfig, StrategyKind};
use crate::writer::WriterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Physical extents of the simulated block, all starting at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl DomainSize {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Spacing controls for the non-uniform mesh.
///
/// `slope` drives the growth law `g(d) = |d * slope|` used when grading
/// spacing away from an inclusion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshParams {
    /// Spacing floor next to inclusion boundaries
    pub min_d: f64,
    pub max_dx: f64,
    pub max_dy: f64,
    pub max_dz: f64,
    pub slope: f64,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            min_d: 0.1,
            max_dx: 1.0,
            max_dy: 1.0,
            max_dz: 1.0,
            slope: 0.5,
        }
    }
}

impl MeshParams {
    /// Uniform spacing everywhere, no grading.
    pub fn uniform(spacing: f64) -> Self {
        Self {
            min_d: spacing,
            max_dx: spacing,
            max_dy: spacing,
            max_dz: spacing,
            slope: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("min_d", self.min_d)?;
        for (name, max_d) in [
            ("max_dx", self.max_dx),
            ("max_dy", self.max_dy),
            ("max_dz", self.max_dz),
        ] {
            positive(name, max_d)?;
            if max_d < self.min_d {
                return Err(SimError::invalid(
                    name,
                    format!("must be at least min_d ({}), got {max_d}", self.min_d),
                ));
            }
        }
        if !self.slope.is_finite() {
            return Err(SimError::invalid("slope", "must be finite"));
        }
        Ok(())
    }
}

fn default_courant() -> f64 {
    0.5
}

/// Everything needed to build a mesh, a material field, and run the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub domain: DomainSize,
    #[serde(default)]
    pub mesh: MeshParams,
    #[serde(default)]
    pub inclusions: Vec<InclusionRegion>,
    #[serde(default)]
    pub materials: MaterialTable,
    /// Host material key
    pub primary: String,
    /// Inclusion material key
    pub secondary: String,
    #[serde(default = "default_courant")]
    pub courant: f64,
    pub steps: usize,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub writer: WriterConfig,
}

impl SimulationConfig {
    /// Small homogeneous GaAs block used for smoke tests and the demo.
    ///
    /// 4 x 5 x 6 domain at unit spacing, GaAs as both materials, ten steps.
    pub fn gaas_block() -> Self {
        Self {
            domain: DomainSize::new(4.0, 5.0, 6.0),
            mesh: MeshParams::uniform(1.0),
            inclusions: Vec::new(),
            materials: MaterialTable::default(),
            primary: "GaAs".to_string(),
            secondary: "GaAs".to_string(),
            courant: default_courant(),
            steps: 10,
            source: SourceConfig::default(),
            boundary: BoundaryConfig::default(),
            strategy: StrategyKind::default(),
            writer: WriterConfig::default(),
        }
    }

    /// Check every scalar and geometric constraint that can be checked
    /// without building the mesh.
    pub fn validate(&self) -> Result<()> {
        positive("domain.x", self.domain.x)?;
        positive("domain.y", self.domain.y)?;
        positive("domain.z", self.domain.z)?;
        self.mesh.validate()?;
        positive("courant", self.courant)?;
        positive_count("steps", self.steps)?;
        for (index, inclusion) in self.inclusions.iter().enumerate() {
            inclusion.validate(index, &self.domain)?;
        }
        for key in [&self.primary, &self.secondary] {
            if !self.materials.contains(key) {
                return Err(ConfigError::UnknownMaterial(key.clone()).into());
            }
        }
        self.source.validate()?;
        self.writer.validate()?;
        Ok(())
    }

    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| SimError::invalid("config", format!("cannot parse: {e}")))
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| SimError::invalid("config", format!("cannot serialize: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(
            name,
            format!("must be finite and positive, got {value}"),
        ))
    }
}

pub(crate) fn positive_count(name: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        Err(SimError::invalid(name, "must be at least 1"))
    } else {
        Ok(())
    }
}
