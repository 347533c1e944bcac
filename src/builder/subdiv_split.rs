use glam::{Mat3, Vec3};

use super::bounds::modified_sah;
use super::config::{blocks, BINS};
use super::overwrite_or_push;
use crate::{Bezier, BoundingBox, OrientedBox};

#[derive(Clone, Copy, Debug, Default)]
struct Bin {
    bounds: BoundingBox,
    area: f32,
    count: usize,
}

/// Binned SAH split where every curve is binned as its two halves.
///
/// Committing the split materializes the halves into the buffer, so the
/// range doubles; child bounds are reassembled from the bins instead of a
/// second pass over the curves.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SubdivObjectSplit {
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

impl SubdivObjectSplit {
    pub fn find(
        curves: &[Bezier],
        begin: usize,
        end: usize,
        space: Mat3,
    ) -> Self {
        let cent_bounds: BoundingBox = curves[begin..end]
            .iter()
            .flat_map(|curve| {
                let (left, right) = curve.subdivide();

                [left.center_in(&space), right.center_in(&space)]
            })
            .collect();

        let ofs = cent_bounds.min();
        let diag = cent_bounds.extent();
        let scale =
            Vec3::new(bin_scale(diag.x), bin_scale(diag.y), bin_scale(diag.z));

        // ---

        let mut bins = [[Bin::default(); BINS]; 3];

        for curve in &curves[begin..end] {
            let (left, right) = curve.subdivide();

            for half in [left, right] {
                let hbounds = half.bounds_in(&space);
                let bin = bin_of(half.center_in(&space), ofs, scale);

                for axis in 0..3 {
                    bins[axis][bin[axis]].count += 1;
                    bins[axis][bin[axis]].bounds += hbounds;
                    bins[axis][bin[axis]].area += hbounds.half_area();
                }
            }
        }

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
                split.num1 = 2 * (end - begin) - split.num0;
            }
        }

        // Child bounds come straight from the bins of the winning axis
        if let Some(dim) = split.dim {
            let mut lbounds = BoundingBox::default();
            let mut rbounds = BoundingBox::default();
            let mut larea = 0.0;
            let mut rarea = 0.0;

            for i in 0..split.pos {
                lbounds += bins[dim][i].bounds;
                larea += bins[dim][i].area;
            }

            for i in split.pos..BINS {
                rbounds += bins[dim][i].bounds;
                rarea += bins[dim][i].area;
            }

            split.bounds0 = OrientedBox::new(space, lbounds, larea);
            split.bounds1 = OrientedBox::new(space, rbounds, rarea);
        }

        split
    }

    pub fn is_feasible(&self) -> bool {
        self.dim.is_some()
    }

    /// Materializes the halves, then partitions; returns the cut and the
    /// grown end of the range.
    pub fn partition(
        &self,
        curves: &mut Vec<Bezier>,
        begin: usize,
        end: usize,
    ) -> (usize, usize) {
        let dim = self.dim.expect("partitioning an infeasible split");

        let mut new_end = end;

        for i in begin..end {
            let (left, right) = curves[i].subdivide();

            curves[i] = left;
            overwrite_or_push(curves, new_end, right);
            new_end += 1;
        }

        // ---

        let mut left = begin;
        let mut right = new_end;

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
        debug_assert_eq!(new_end - left, self.num1);

        (left, new_end)
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

    [
        (bin.x as usize).min(BINS - 1),
        (bin.y as usize).min(BINS - 1),
        (bin.z as usize).min(BINS - 1),
    ]
}
