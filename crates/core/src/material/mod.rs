//! Material definitions and the per-cell material field

mod field;
mod properties;

pub use field::MaterialField;
pub use properties::{MaterialProperties, MaterialTable};
