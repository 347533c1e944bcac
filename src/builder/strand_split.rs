use glam::Vec3;
use rand::rngs::SmallRng;

use super::bounds::{modified_sah, unaligned_bounds};
use crate::{Bezier, OrientedBox};

/// Orientation-based bipartition against two representative tangents.
///
/// `axis0` is the first curve's chord; `axis1` is the chord most orthogonal
/// to it within the range. Every curve joins the side whose representative
/// it is more parallel to. If that leaves a side empty (all chords parallel,
/// or all degenerate), the split degrades to an infeasible placeholder so
/// selection skips it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StrandSplit {
    pub axis0: Vec3,
    pub axis1: Vec3,
    pub num0: usize,
    pub num1: usize,
    pub bounds0: OrientedBox,
    pub bounds1: OrientedBox,
    feasible: bool,
}

impl StrandSplit {
    pub fn find(
        curves: &mut [Bezier],
        begin: usize,
        end: usize,
        rng: &mut SmallRng,
    ) -> Self {
        let axis0 = curves[begin].axis().normalize_or_zero();

        let mut best_cos = 1.0;
        let mut best_i = end - 1;

        for i in begin..end {
            let axis = curves[i].axis();
            let len = axis.length();

            if len == 0.0 {
                continue;
            }

            let cos = (axis / len).dot(axis0).abs();

            if cos < best_cos {
                best_cos = cos;
                best_i = i;
            }
        }

        let axis1 = curves[best_i].axis().normalize_or_zero();

        // ---

        let center = partition_impl(curves, begin, end, axis0, axis1);
        let num0 = center - begin;
        let num1 = end - center;

        if num0 == 0 || num1 == 0 {
            return Self {
                axis0,
                axis1,
                num0: 1,
                num1: 1,
                bounds0: OrientedBox::empty(),
                bounds1: OrientedBox::empty(),
                feasible: false,
            };
        }

        Self {
            axis0,
            axis1,
            num0,
            num1,
            bounds0: unaligned_bounds(&curves[begin..center], rng),
            bounds1: unaligned_bounds(&curves[center..end], rng),
            feasible: true,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    pub fn partition(
        &self,
        curves: &mut [Bezier],
        begin: usize,
        end: usize,
    ) -> usize {
        let center =
            partition_impl(curves, begin, end, self.axis0, self.axis1);

        debug_assert_eq!(center - begin, self.num0);
        debug_assert_eq!(end - center, self.num1);

        center
    }

    pub fn modified_sah(&self) -> f32 {
        if !self.feasible {
            return f32::INFINITY;
        }

        modified_sah(&self.bounds0, &self.bounds1, self.num0, self.num1)
    }
}

fn partition_impl(
    curves: &mut [Bezier],
    begin: usize,
    end: usize,
    axis0: Vec3,
    axis1: Vec3,
) -> usize {
    let mut left = begin;
    let mut right = end;

    while left < right {
        // Degenerate chords stay on the left side
        let axis = match curves[left].axis().try_normalize() {
            Some(axis) => axis,
            None => {
                left += 1;
                continue;
            }
        };

        let cos0 = axis.dot(axis0).abs();
        let cos1 = axis.dot(axis1).abs();

        if cos0 > cos1 {
            left += 1;
        } else {
            curves.swap(left, right - 1);
            right -= 1;
        }
    }

    left
}
