use crate::error::{ConfigError, Result, SimError};
use nalgebra::Matrix6;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Density and 6x6 Voigt stiffness of a homogeneous elastic solid.
///
/// Units are SI: kg/m^3 and Pa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    pub density: f64,
    /// Row-major 6x6 in JSON
    #[serde(with = "voigt_rows")]
    pub stiffness: Matrix6<f64>,
}

impl MaterialProperties {
    pub fn new(density: f64, stiffness: Matrix6<f64>) -> Self {
        Self { density, stiffness }
    }

    /// Cubic solid from its three independent constants.
    pub fn cubic(density: f64, c11: f64, c12: f64, c44: f64) -> Self {
        let stiffness = Matrix6::from_fn(|r, c| match (r, c) {
            (r, c) if r < 3 && c < 3 && r == c => c11,
            (r, c) if r < 3 && c < 3 => c12,
            (r, c) if r == c => c44,
            _ => 0.0,
        });
        Self { density, stiffness }
    }

    /// Gallium arsenide.
    pub fn gaas() -> Self {
        Self::cubic(5307.0, 11.88e10, 5.38e10, 5.94e10)
    }

    /// `sqrt(C11 / rho)`
    pub fn longitudinal_speed(&self) -> f64 {
        (self.stiffness[(0, 0)] / self.density).sqrt()
    }

    /// `sqrt(C44 / rho)`
    pub fn transverse_speed(&self) -> f64 {
        (self.stiffness[(3, 3)] / self.density).sqrt()
    }

    pub fn max_speed(&self) -> f64 {
        self.longitudinal_speed().max(self.transverse_speed())
    }

    /// CFL-limited step for this material on a mesh whose smallest full
    /// spacing is `min_spacing`.
    pub fn stable_time_step(&self, min_spacing: f64, courant: f64) -> f64 {
        courant * min_spacing / self.max_speed()
    }

    /// Reject unphysical values. Asymmetric tensors are accepted with a
    /// warning since only the upper-left block and diagonal are sampled.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(SimError::invalid(
                "density",
                format!("material `{name}` has density {}", self.density),
            ));
        }
        if self.stiffness.iter().any(|c| !c.is_finite()) {
            return Err(SimError::invalid(
                "stiffness",
                format!("material `{name}` has a non-finite stiffness entry"),
            ));
        }
        if self.stiffness[(0, 0)] <= 0.0 || self.stiffness[(3, 3)] <= 0.0 {
            return Err(SimError::invalid(
                "stiffness",
                format!("material `{name}` needs positive C11 and C44"),
            ));
        }
        let scale = self.stiffness.amax();
        if (self.stiffness - self.stiffness.transpose()).amax() > 1e-9 * scale {
            warn!("Stiffness tensor of material '{}' is not symmetric", name);
        }
        Ok(())
    }
}

/// Named materials available to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialTable(FxHashMap<String, MaterialProperties>);

impl MaterialTable {
    /// Empty table with no built-in materials.
    pub fn empty() -> Self {
        Self(FxHashMap::default())
    }

    pub fn register(&mut self, name: impl Into<String>, properties: MaterialProperties) {
        self.0.insert(name.into(), properties);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Look up a material by key.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownMaterial`] if `name` was never registered.
    pub fn get(&self, name: &str) -> Result<&MaterialProperties> {
        self.0
            .get(name)
            .ok_or_else(|| ConfigError::UnknownMaterial(name.to_string()).into())
    }

    /// Registered keys in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register("GaAs", MaterialProperties::gaas());
        table
    }
}

mod voigt_rows {
    use nalgebra::Matrix6;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Matrix6<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: [[f64; 6]; 6] = std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]));
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Matrix6<f64>, D::Error> {
        let rows = <[[f64; 6]; 6]>::deserialize(deserializer)?;
        Ok(Matrix6::from_fn(|r, c| rows[r][c]))
    }
}
