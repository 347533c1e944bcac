use glam::{Mat3, Vec4};

use super::bounds::modified_sah;
use super::overwrite_or_push;
use crate::{Bezier, BoundingBox, OrientedBox};

/// Plane-at-center split with geometric clipping of straddling curves.
///
/// One candidate plane per frame axis, through the centroid of the range's
/// geometric bounds. Curves crossing the winning plane are clipped, so the
/// range grows when the split is committed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SpatialCenterSplit {
    space: Mat3,
    dim: Option<usize>,
    pos: f32,
    pub num0: usize,
    pub num1: usize,
    pub bounds0: OrientedBox,
    pub bounds1: OrientedBox,
}

impl SpatialCenterSplit {
    pub fn find(
        curves: &[Bezier],
        begin: usize,
        end: usize,
        space: Mat3,
    ) -> Self {
        let geom_bounds: BoundingBox = curves[begin..end]
            .iter()
            .map(|curve| curve.bounds_in(&space))
            .collect();

        let cent = geom_bounds.center();

        let mut split = Self {
            space,
            dim: None,
            pos: 0.0,
            num0: 1,
            num1: 1,
            bounds0: OrientedBox::empty(),
            bounds1: OrientedBox::empty(),
        };

        let mut best_sah = f32::INFINITY;

        for dim in 0..3 {
            let plane = space.row(dim).extend(-cent[dim]);

            let mut lnum = 0;
            let mut rnum = 0;
            let mut lbounds = BoundingBox::default();
            let mut rbounds = BoundingBox::default();
            let mut larea = 0.0;
            let mut rarea = 0.0;

            for curve in &curves[begin..end] {
                match classify(curve, plane) {
                    Side::Left => {
                        let bounds = curve.bounds_in(&space);

                        lbounds += bounds;
                        larea += bounds.half_area();
                        lnum += 1;
                    }

                    Side::Right => {
                        let bounds = curve.bounds_in(&space);

                        rbounds += bounds;
                        rarea += bounds.half_area();
                        rnum += 1;
                    }

                    Side::Straddling => {
                        // A curve we fail to clip stays whole on the left
                        match curve.split(plane) {
                            Some((left, right)) => {
                                let lb = left.bounds_in(&space);
                                let rb = right.bounds_in(&space);

                                lbounds += lb;
                                larea += lb.half_area();
                                lnum += 1;

                                rbounds += rb;
                                rarea += rb.half_area();
                                rnum += 1;
                            }

                            None => {
                                let bounds = curve.bounds_in(&space);

                                lbounds += bounds;
                                larea += bounds.half_area();
                                lnum += 1;
                            }
                        }
                    }
                }
            }

            if lnum == 0 || rnum == 0 {
                continue;
            }

            let sah = lbounds.half_area() * lnum as f32
                + rbounds.half_area() * rnum as f32;

            if sah < best_sah {
                best_sah = sah;

                split.dim = Some(dim);
                split.pos = cent[dim];
                split.num0 = lnum;
                split.num1 = rnum;
                split.bounds0 = OrientedBox::new(space, lbounds, larea);
                split.bounds1 = OrientedBox::new(space, rbounds, rarea);
            }
        }

        split
    }

    pub fn is_feasible(&self) -> bool {
        self.dim.is_some()
    }

    /// Three-way walk: whole curves are swapped to their side, straddlers
    /// are clipped with the right half appended past the range.
    pub fn partition(
        &self,
        curves: &mut Vec<Bezier>,
        begin: usize,
        end: usize,
    ) -> (usize, usize) {
        let dim = self.dim.expect("partitioning an infeasible split");
        let plane = self.space.row(dim).extend(-self.pos);

        let mut left = begin;
        let mut right = end;
        let mut new_end = end;

        while left < right {
            match classify(&curves[left], plane) {
                Side::Left => {
                    left += 1;
                }

                Side::Right => {
                    curves.swap(left, right - 1);
                    right -= 1;
                }

                Side::Straddling => match curves[left].split(plane) {
                    Some((l, r)) => {
                        curves[left] = l;
                        left += 1;

                        overwrite_or_push(curves, new_end, r);
                        new_end += 1;
                    }

                    None => {
                        left += 1;
                    }
                },
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

enum Side {
    Left,
    Right,
    Straddling,
}

fn classify(curve: &Bezier, plane: Vec4) -> Side {
    let d0 = plane.truncate().dot(curve.p0.truncate()) + plane.w;
    let d3 = plane.truncate().dot(curve.p3.truncate()) + plane.w;

    if d0 <= 0.0 && d3 <= 0.0 {
        Side::Left
    } else if d0 >= 0.0 && d3 >= 0.0 {
        Side::Right
    } else {
        Side::Straddling
    }
}

#[cfg(test)]
mod tests {
    use glam::vec4;

    use super::*;

    fn curve_along_x(x0: f32, x1: f32, prim_id: u32) -> Bezier {
        let third = (x1 - x0) / 3.0;

        Bezier::new(
            vec4(x0, 0.0, 0.0, 0.01),
            vec4(x0 + third, 0.0, 0.0, 0.01),
            vec4(x0 + 2.0 * third, 0.0, 0.0, 0.01),
            vec4(x1, 0.0, 0.0, 0.01),
            0.0,
            1.0,
            0,
            prim_id,
        )
    }

    #[test]
    fn straddlers_are_clipped() {
        // Two whole curves per side, one crossing the center
        let mut curves = vec![
            curve_along_x(0.0, 1.0, 0),
            curve_along_x(9.0, 10.0, 1),
            curve_along_x(0.0, 1.0, 2),
            curve_along_x(9.0, 10.0, 3),
            curve_along_x(4.0, 6.0, 4),
        ];

        let end = curves.len();
        let split =
            SpatialCenterSplit::find(&curves, 0, end, Mat3::IDENTITY);

        assert!(split.is_feasible());
        assert_eq!(3, split.num0);
        assert_eq!(3, split.num1);

        let (center, new_end) = split.partition(&mut curves, 0, end);

        assert_eq!(3, center);
        assert_eq!(6, new_end);
        assert_eq!(6, curves.len());

        // Both clipped halves keep the parent's id
        let halves: Vec<_> = curves
            .iter()
            .filter(|curve| curve.prim_id == 4)
            .collect();

        assert_eq!(2, halves.len());
    }

    #[test]
    fn one_sided_ranges_are_infeasible() {
        // Point-like curves sit exactly on every candidate plane, so each
        // axis ends up with an empty right side
        let point = vec4(1.0, 2.0, 3.0, 0.01);
        let curves =
            vec![Bezier::new(point, point, point, point, 0.0, 1.0, 0, 0); 4];

        let split =
            SpatialCenterSplit::find(&curves, 0, curves.len(), Mat3::IDENTITY);

        assert!(!split.is_feasible());
        assert_eq!(f32::INFINITY, split.modified_sah());
    }
}
