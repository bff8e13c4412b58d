//! Per-axis coordinate generation with local refinement
//!
//! Each horizontal axis is built in four passes:
//!
//! 1. graded spacing mirrored outward from every inclusion boundary, clipped
//!    to the band the inclusion owns on that axis
//! 2. an evenly spaced fill across every inclusion's diameter
//! 3. merging of points closer than the spacing floor
//! 4. "closest fit" subdivision of any gap wider than the axis maximum
//!
//! The z axis skips the first three passes.

use super::{Axis, InclusionRegion, Mesh};
use crate::config::{DomainSize, MeshParams};
use crate::error::{ConfigError, Result};
use std::cmp::Ordering;
use tracing::debug;

/// Fraction of `min_d` below which two points are merged.
pub const MERGE_FRACTION: f64 = 0.999_999;

/// Slack applied before rounding a gap up to a whole number of pieces.
const FIT_TOLERANCE: f64 = 1e-9;

/// Builds a [`Mesh`] from domain extents, spacing limits, and inclusions.
///
/// Generation is a pure function of the inputs.
#[derive(Debug, Clone)]
pub struct MeshGenerator {
    domain: DomainSize,
    params: MeshParams,
    inclusions: Vec<InclusionRegion>,
}

impl MeshGenerator {
    pub fn new(domain: DomainSize, params: MeshParams, inclusions: &[InclusionRegion]) -> Self {
        Self {
            domain,
            params,
            inclusions: inclusions.to_vec(),
        }
    }

    /// Generate all three axes.
    ///
    /// # Errors
    ///
    /// Configuration errors for invalid spacing parameters, inclusions that
    /// are not strictly inside the domain, unresolvable refinement bands,
    /// or axes too short for the staggered grid.
    pub fn generate(&self) -> Result<Mesh> {
        self.params.validate()?;
        for (index, inclusion) in self.inclusions.iter().enumerate() {
            inclusion.validate(index, &self.domain)?;
        }

        let x = self.axis(Axis::X)?;
        let y = self.axis(Axis::Y)?;
        let z = self.axis(Axis::Z)?;
        debug!(
            "Generated mesh {}x{}x{} ({} inclusions)",
            x.len(),
            y.len(),
            z.len(),
            self.inclusions.len()
        );
        Mesh::from_axes(x, y, z)
    }

    /// Coordinate array for a single axis.
    pub fn axis(&self, axis: Axis) -> Result<Vec<f64>> {
        let (extent, max_d) = match axis {
            Axis::X => (self.domain.x, self.params.max_dx),
            Axis::Y => (self.domain.y, self.params.max_dy),
            Axis::Z => (self.domain.z, self.params.max_dz),
        };

        if axis == Axis::Z || self.inclusions.is_empty() {
            return Ok(closest_fit(&[0.0, extent], self.params.min_d, max_d));
        }

        let mut points = vec![0.0, extent];
        self.refine_boundaries(axis, extent, max_d, &mut points)?;
        self.fill_interiors(axis, &mut points);

        points.retain(|p| (0.0..=extent).contains(p));
        points.sort_by(f64::total_cmp);
        let merged = merge_close(&points, self.params.min_d * MERGE_FRACTION);
        let coords = closest_fit(&merged, self.params.min_d, max_d);

        debug!(
            "{} axis: {} points ({} before closest fit)",
            axis,
            coords.len(),
            merged.len()
        );
        Ok(coords)
    }

    /// Pass 1: graded sequences outside each disk.
    ///
    /// Inclusions sharing a center coordinate on this axis share a band; the
    /// band runs from the midpoint to the nearest smaller center (or 0) up
    /// to the midpoint to the nearest larger center (or the extent).
    fn refine_boundaries(
        &self,
        axis: Axis,
        extent: f64,
        max_d: f64,
        points: &mut Vec<f64>,
    ) -> Result<()> {
        let offsets = graded_offsets(self.params.min_d, max_d, self.params.slope, extent);

        let mut order: Vec<(usize, f64, f64)> = self
            .inclusions
            .iter()
            .enumerate()
            .map(|(index, inc)| (index, inc.center_on(axis), inc.r))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        for &(index, center, r) in &order {
            let lower = order
                .iter()
                .rev()
                .find(|other| other.1 < center)
                .map_or(0.0, |other| 0.5 * (other.1 + center));
            let upper = order
                .iter()
                .find(|other| other.1 > center)
                .map_or(extent, |other| 0.5 * (center + other.1));

            if lower.partial_cmp(&upper) != Some(Ordering::Less) {
                return Err(ConfigError::AmbiguousRefinement {
                    axis: axis.label(),
                    index,
                }
                .into());
            }
            if center - r <= lower || center + r >= upper {
                debug!(
                    "Inclusion {} disk reaches past its {} band [{:.4}, {:.4})",
                    index, axis, lower, upper
                );
            }

            for &offset in &offsets {
                let right = center + r + offset;
                if right < upper {
                    points.push(right);
                }
                let left = center - r - offset;
                if left > lower {
                    points.push(left);
                }
            }
        }
        Ok(())
    }

    /// Pass 2: `floor(2r / min_d)` evenly spaced points ending on the far
    /// edge of each disk.
    fn fill_interiors(&self, axis: Axis, points: &mut Vec<f64>) {
        for inclusion in &self.inclusions {
            let diameter = 2.0 * inclusion.r;
            let count = (diameter / self.params.min_d).floor() as usize;
            if count == 0 {
                continue;
            }
            let start = inclusion.center_on(axis) - inclusion.r;
            let step = diameter / count as f64;
            points.extend((1..=count).map(|k| start + step * k as f64));
        }
    }
}

/// Distances from a boundary, starting at 0 and growing by
/// `g(d) = |d * slope|` on top of `min_d` until the next gap would reach
/// `max_d` or the offsets run past `limit`.
pub(crate) fn graded_offsets(min_d: f64, max_d: f64, slope: f64, limit: f64) -> Vec<f64> {
    let mut offsets = vec![0.0];
    let mut last = 0.0;
    while last < limit {
        let gap = ((last + min_d) * slope).abs() + min_d;
        if gap >= max_d {
            break;
        }
        last += gap;
        offsets.push(last);
    }
    offsets
}

/// Drop every point closer than `threshold` to the last kept point.
///
/// `sorted` must start at 0 and end at the axis extent; both ends survive.
pub(crate) fn merge_close(sorted: &[f64], threshold: f64) -> Vec<f64> {
    let (Some(&first), Some(&extent)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };

    let mut kept = vec![first];
    for &p in &sorted[1..] {
        if kept.last().is_some_and(|&last| p - last >= threshold) {
            kept.push(p);
        }
    }

    if kept.last() != Some(&extent) {
        while kept.len() > 1 && kept.last().is_some_and(|&last| extent - last < threshold) {
            kept.pop();
        }
        kept.push(extent);
    }
    kept
}

/// Split every gap wider than `max_d` into the fewest equal pieces that fit.
///
/// A piece never drops below `min_d`. When `max_d < 2 * min_d` some gaps
/// cannot satisfy both limits; the floor wins and such pieces stay under
/// `2 * min_d`.
pub(crate) fn closest_fit(sorted: &[f64], min_d: f64, max_d: f64) -> Vec<f64> {
    let Some(&first) = sorted.first() else {
        return Vec::new();
    };

    let mut out = vec![first];
    for w in sorted.windows(2) {
        let gap = w[1] - w[0];
        let fit = ((gap / max_d) - FIT_TOLERANCE).ceil().max(1.0);
        let most = ((gap / min_d) + FIT_TOLERANCE).floor().max(1.0);
        let pieces = fit.min(most) as usize;
        let step = gap / pieces as f64;
        out.extend((1..pieces).map(|k| w[0] + step * k as f64));
        out.push(w[1]);
    }
    out
}
