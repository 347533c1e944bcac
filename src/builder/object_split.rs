use glam::{Mat3, Vec3};
use rand::rngs::SmallRng;

use super::bounds::{aligned_bounds, modified_sah, unaligned_bounds};
use super::config::{blocks, BINS};
use crate::{Bezier, BoundingBox, OrientedBox};

#[derive(Clone, Copy, Debug, Default)]
struct Bin {
    bounds: BoundingBox,
    count: usize,
}

/// Binned SAH split of a curve range, evaluated in a caller-chosen frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ObjectSplit {
    space: Mat3,
    ofs: Vec3,
    scale: Vec3,
    dim: Option<usize>,
    pos: usize,
    pub num0: usize,
    pub num1: usize,
    pub bounds0: OrientedBox,
    pub bounds1: OrientedBox,
}

impl ObjectSplit {
    pub fn find(
        curves: &[Bezier],
        begin: usize,
        end: usize,
        space: Mat3,
    ) -> Self {
        let cent_bounds: BoundingBox = curves[begin..end]
            .iter()
            .map(|curve| curve.center_in(&space))
            .collect();

        let ofs = cent_bounds.min();
        let diag = cent_bounds.extent();
        let scale =
            Vec3::new(bin_scale(diag.x), bin_scale(diag.y), bin_scale(diag.z));

        // ---

        let mut bins = [[Bin::default(); BINS]; 3];

        for curve in &curves[begin..end] {
            let cbounds = curve.bounds_in(&space);
            let bin = bin_of(curve.center_in(&space), ofs, scale);

            for axis in 0..3 {
                bins[axis][bin[axis]].count += 1;
                bins[axis][bin[axis]].bounds += cbounds;
            }
        }

        // Suffix sweep: bounds and counts of everything right of each cut
        let mut r_areas = [[0.0; BINS]; 3];
        let mut r_counts = [[0; BINS]; 3];

        for axis in 0..3 {
            let mut count = 0;
            let mut bb = BoundingBox::default();

            for i in (1..BINS).rev() {
                count += bins[axis][i].count;
                r_counts[axis][i] = count;

                bb += bins[axis][i].bounds;
                r_areas[axis][i] = bb.half_area();
            }
        }

        // Prefix sweep: score every cut on every axis
        let mut best_sah = [f32::INFINITY; 3];
        let mut best_pos = [0; 3];
        let mut best_left = [0; 3];

        for axis in 0..3 {
            let mut count = 0;
            let mut bb = BoundingBox::default();

            for i in 1..BINS {
                count += bins[axis][i - 1].count;
                bb += bins[axis][i - 1].bounds;

                let sah = bb.half_area() * blocks(count) as f32
                    + r_areas[axis][i] * blocks(r_counts[axis][i]) as f32;

                if sah < best_sah[axis] {
                    best_sah[axis] = sah;
                    best_pos[axis] = i;
                    best_left[axis] = count;
                }
            }
        }

        // ---

        let mut split = Self {
            space,
            ofs,
            scale,
            dim: None,
            pos: 0,
            num0: 1,
            num1: 1,
            bounds0: OrientedBox::empty(),
            bounds1: OrientedBox::empty(),
        };

        let mut best = f32::INFINITY;

        for axis in 0..3 {
            if scale[axis] == 0.0 {
                continue;
            }

            if best_sah[axis] < best && best_pos[axis] != 0 {
                best = best_sah[axis];

                split.dim = Some(axis);
                split.pos = best_pos[axis];
                split.num0 = best_left[axis];
                split.num1 = (end - begin) - split.num0;
            }
        }

        split
    }

    pub fn is_feasible(&self) -> bool {
        self.dim.is_some()
    }

    /// Partitions the range and measures both sides in the world frame.
    pub fn with_aligned_bounds(
        mut self,
        curves: &mut [Bezier],
        begin: usize,
        end: usize,
    ) -> Self {
        if self.dim.is_none() {
            return self;
        }

        let center = self.partition(curves, begin, end);

        let (bounds, area) = aligned_bounds(&curves[begin..center]);
        self.bounds0 = OrientedBox::axis_aligned(bounds, area);

        let (bounds, area) = aligned_bounds(&curves[center..end]);
        self.bounds1 = OrientedBox::axis_aligned(bounds, area);

        self
    }

    /// Partitions the range and measures both sides in fresh curve-aligned
    /// frames.
    pub fn with_unaligned_bounds(
        mut self,
        curves: &mut [Bezier],
        begin: usize,
        end: usize,
        rng: &mut SmallRng,
    ) -> Self {
        if self.dim.is_none() {
            return self;
        }

        let center = self.partition(curves, begin, end);

        self.bounds0 = unaligned_bounds(&curves[begin..center], rng);
        self.bounds1 = unaligned_bounds(&curves[center..end], rng);

        self
    }

    /// In-place two-pointer partition by the chosen axis' bin index.
    pub fn partition(
        &self,
        curves: &mut [Bezier],
        begin: usize,
        end: usize,
    ) -> usize {
        let dim = self.dim.expect("partitioning an infeasible split");

        let mut left = begin;
        let mut right = end;

        while left < right {
            let center = curves[left].center_in(&self.space);
            let bin = bin_of(center, self.ofs, self.scale);

            if bin[dim] < self.pos {
                left += 1;
            } else {
                curves.swap(left, right - 1);
                right -= 1;
            }
        }

        debug_assert_eq!(left - begin, self.num0);
        debug_assert_eq!(end - left, self.num1);

        left
    }

    pub fn modified_sah(&self) -> f32 {
        if self.dim.is_none() {
            return f32::INFINITY;
        }

        modified_sah(&self.bounds0, &self.bounds1, self.num0, self.num1)
    }
}

fn bin_scale(diag: f32) -> f32 {
    if diag == 0.0 {
        0.0
    } else {
        (BINS as f32) * 0.99 / diag
    }
}

fn bin_of(center: Vec3, ofs: Vec3, scale: Vec3) -> [usize; 3] {
    let bin = (center - ofs) * scale;

    // Float-to-int conversion saturates, so a slightly negative coordinate
    // lands in bin zero; the clamp catches near-degenerate diagonals whose
    // reciprocal blows up
    [
        (bin.x as usize).min(BINS - 1),
        (bin.y as usize).min(BINS - 1),
        (bin.z as usize).min(BINS - 1),
    ]
}

#[cfg(test)]
mod tests {
    use glam::vec4;

    use super::*;

    fn curve_at(x: f32, prim_id: u32) -> Bezier {
        Bezier::new(
            vec4(x, 0.0, 0.0, 0.01),
            vec4(x, 0.3, 0.0, 0.01),
            vec4(x, 0.7, 0.0, 0.01),
            vec4(x, 1.0, 0.0, 0.01),
            0.0,
            1.0,
            0,
            prim_id,
        )
    }

    #[test]
    fn splits_a_spread_on_its_long_axis() {
        let mut curves: Vec<_> =
            (0..16).map(|i| curve_at(i as f32, i)).collect();

        // Interleave so the partition has something to do
        curves.swap(0, 15);
        curves.swap(3, 8);

        let end = curves.len();
        let split = ObjectSplit::find(&curves, 0, end, Mat3::IDENTITY)
            .with_aligned_bounds(&mut curves, 0, end);

        assert!(split.is_feasible());
        assert!(split.modified_sah().is_finite());
        assert_eq!(16, split.num0 + split.num1);
        assert!(split.num0 > 0 && split.num1 > 0);

        // Everything left of the cut sits left of everything right of it
        let center = split.num0;
        let max_left = curves[..center]
            .iter()
            .map(|curve| curve.p0.x)
            .fold(f32::NEG_INFINITY, f32::max);
        let min_right = curves[center..]
            .iter()
            .map(|curve| curve.p0.x)
            .fold(f32::INFINITY, f32::min);

        assert!(max_left < min_right);
    }

    #[test]
    fn coincident_centroids_are_infeasible() {
        let mut curves = vec![curve_at(1.0, 0); 4];

        let end = curves.len();
        let split = ObjectSplit::find(&curves, 0, end, Mat3::IDENTITY)
            .with_aligned_bounds(&mut curves, 0, end);

        assert!(!split.is_feasible());
        assert_eq!(f32::INFINITY, split.modified_sah());
    }
}
