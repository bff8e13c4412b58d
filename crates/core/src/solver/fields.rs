//! Dense 3-D field storage
//!
//! Every stress and displacement component lives in its own `Field3`, sized
//! to the staggered sub-grid it samples.

use serde::{Deserialize, Serialize};

/// Field data container
///
/// Stores 3D field data as a flat `Vec<f64>` in C order: `k` varies
/// fastest, then `j`, then `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field3 {
    /// Field values, index `(i * ny + j) * nz + k`
    pub data: Vec<f64>,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Field3 {
    /// Create a new field with given dimensions, initialized to zero
    #[must_use]
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self::with_value(nx, ny, nz, 0.0)
    }

    /// Create a new field with given dimensions, initialized to a value
    #[must_use]
    pub fn with_value(nx: usize, ny: usize, nz: usize, value: f64) -> Self {
        Self {
            data: vec![value; nx * ny * nz],
            nx,
            ny,
            nz,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Get reference to field data
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Get mutable reference to field data
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline(always)]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.ny + j) * self.nz + k
    }

    /// Get value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline(always)]
    #[must_use]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        debug_assert!(
            i < self.nx && j < self.ny && k < self.nz,
            "Coordinates out of bounds"
        );
        self.data[self.index(i, j, k)]
    }

    /// Set value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        debug_assert!(
            i < self.nx && j < self.ny && k < self.nz,
            "Coordinates out of bounds"
        );
        let idx = self.index(i, j, k);
        self.data[idx] = value;
    }

    /// Fill entire field with a value
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Largest absolute value, 0 for an empty field.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_creation() {
        let field = Field3::new(3, 4, 5);
        assert_eq!(field.shape(), [3, 4, 5]);
        assert_eq!(field.data.len(), 60);
        assert!(field.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_field_get_set() {
        let mut field = Field3::new(3, 4, 5);
        field.set(2, 1, 3, 123.45);
        assert_eq!(field.get(2, 1, 3), 123.45);

        // Verify C-order indexing
        let index = (2 * 4 + 1) * 5 + 3;
        assert_eq!(field.data[index], 123.45);
    }

    #[test]
    fn test_field_fill_and_max_abs() {
        let mut field = Field3::with_value(2, 2, 2, 1.0);
        field.set(1, 1, 1, -7.5);
        assert_eq!(field.max_abs(), 7.5);
        field.fill(0.0);
        assert_eq!(field.max_abs(), 0.0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_field_bounds_check() {
        let field = Field3::new(2, 2, 2);
        let _ = field.get(2, 0, 0);
    }
}
