use glam::{Mat3, Vec3, Vec4};

use crate::BoundingBox;

/// A cubic Bézier segment with per-control-point radius.
///
/// Control points keep the position in xyz and the radius in w. `t0..t1`
/// tracks which slice of the original curve this segment refines, so that
/// subdivided halves stay identifiable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bezier {
    pub p0: Vec4,
    pub p1: Vec4,
    pub p2: Vec4,
    pub p3: Vec4,
    pub t0: f32,
    pub t1: f32,
    pub geom_id: u32,
    pub prim_id: u32,
}

impl Bezier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        p0: Vec4,
        p1: Vec4,
        p2: Vec4,
        p3: Vec4,
        t0: f32,
        t1: f32,
        geom_id: u32,
        prim_id: u32,
    ) -> Self {
        Self {
            p0,
            p1,
            p2,
            p3,
            t0,
            t1,
            geom_id,
            prim_id,
        }
    }

    pub fn points(&self) -> [Vec4; 4] {
        [self.p0, self.p1, self.p2, self.p3]
    }

    /// Chord direction `p3 - p0`, unnormalized.
    pub fn axis(&self) -> Vec3 {
        (self.p3 - self.p0).truncate()
    }

    pub fn max_radius(&self) -> f32 {
        self.p0.w.max(self.p1.w).max(self.p2.w).max(self.p3.w)
    }

    /// World-space box of the control hull, inflated by the largest radius.
    pub fn bounds(&self) -> BoundingBox {
        self.points()
            .into_iter()
            .map(|p| p.truncate())
            .collect::<BoundingBox>()
            .inflate(self.max_radius())
    }

    /// Like [`Self::bounds`], with the control points first taken into
    /// `space`.
    pub fn bounds_in(&self, space: &Mat3) -> BoundingBox {
        self.points()
            .into_iter()
            .map(|p| *space * p.truncate())
            .collect::<BoundingBox>()
            .inflate(self.max_radius())
    }

    pub fn center_in(&self, space: &Mat3) -> Vec3 {
        *space * (0.25 * (self.p0 + self.p1 + self.p2 + self.p3).truncate())
    }

    pub fn subdivide(&self) -> (Self, Self) {
        self.subdivide_at(0.5)
    }

    /// de Casteljau split at `t`; the halves partition `t0..t1`.
    pub fn subdivide_at(&self, t: f32) -> (Self, Self) {
        let q0 = self.p0.lerp(self.p1, t);
        let q1 = self.p1.lerp(self.p2, t);
        let q2 = self.p2.lerp(self.p3, t);
        let r0 = q0.lerp(q1, t);
        let r1 = q1.lerp(q2, t);
        let s = r0.lerp(r1, t);

        let tm = self.t0 + t * (self.t1 - self.t0);

        let left = Self {
            p0: self.p0,
            p1: q0,
            p2: r0,
            p3: s,
            t0: self.t0,
            t1: tm,
            geom_id: self.geom_id,
            prim_id: self.prim_id,
        };

        let right = Self {
            p0: s,
            p1: r1,
            p2: q2,
            p3: self.p3,
            t0: tm,
            t1: self.t1,
            geom_id: self.geom_id,
            prim_id: self.prim_id,
        };

        (left, right)
    }

    /// Clips the curve against `plane` (xyz normal, w offset).
    ///
    /// The crossing parameter comes from the chord's signed endpoint
    /// distances; returns `None` when it is non-finite or falls outside
    /// `(0, 1)`.
    pub fn split(&self, plane: Vec4) -> Option<(Self, Self)> {
        let d0 = plane.truncate().dot(self.p0.truncate()) + plane.w;
        let d3 = plane.truncate().dot(self.p3.truncate()) + plane.w;

        let t = d0 / (d0 - d3);

        if !t.is_finite() || t <= 0.0 || t >= 1.0 {
            return None;
        }

        Some(self.subdivide_at(t))
    }

    /// Point (and radius) on the curve at local parameter `t`.
    pub fn eval(&self, t: f32) -> Vec4 {
        let q0 = self.p0.lerp(self.p1, t);
        let q1 = self.p1.lerp(self.p2, t);
        let q2 = self.p2.lerp(self.p3, t);
        let r0 = q0.lerp(q1, t);
        let r1 = q1.lerp(q2, t);

        r0.lerp(r1, t)
    }
}
