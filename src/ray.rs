use glam::{Mat3, Vec3};

use crate::{Bezier, BoundingBox, Bvh, NodeRef, BRANCHING};

/// Number of polyline pieces a curve is flattened into for intersection.
const FLATTEN_STEPS: usize = 8;

/// Slop added around node boxes during traversal.
const BOX_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir,
            t_min: 0.0,
            t_max: f32::INFINITY,
        }
    }

    fn in_space(&self, space: &Mat3) -> Self {
        Self {
            origin: *space * self.origin,
            dir: *space * self.dir,
            t_min: self.t_min,
            t_max: self.t_max,
        }
    }

    fn hits_box(&self, bounds: &BoundingBox) -> bool {
        if !bounds.is_set() {
            return false;
        }

        let inv = self.dir.recip();
        let eps = Vec3::splat(BOX_EPSILON);
        let t0 = (bounds.min() - eps - self.origin) * inv;
        let t1 = (bounds.max() + eps - self.origin) * inv;

        let t_near = t0.min(t1).max_element().max(self.t_min);
        let t_far = t0.max(t1).min_element().min(self.t_max);

        t_near <= t_far
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveHit {
    pub geom_id: u32,
    pub prim_id: u32,
    pub t: f32,
}

impl Bezier {
    /// Conservative hit test against the flattened curve: the ray hits when
    /// it passes within the interpolated radius of any polyline piece.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let mut best: Option<f32> = None;
        let mut prev = self.eval(0.0);

        for i in 1..=FLATTEN_STEPS {
            let next = self.eval(i as f32 / FLATTEN_STEPS as f32);
            let radius = prev.w.max(next.w);

            if let Some(t) =
                ray_segment_hit(ray, prev.truncate(), next.truncate(), radius)
            {
                best = Some(best.map_or(t, |best| best.min(t)));
            }

            prev = next;
        }

        best
    }
}

/// Closest approach between the ray and the segment `a..b`; a hit when it
/// comes within `radius`.
fn ray_segment_hit(ray: &Ray, a: Vec3, b: Vec3, radius: f32) -> Option<f32> {
    let e = b - a;
    let w = ray.origin - a;

    let dd = ray.dir.dot(ray.dir);
    let ee = e.dot(e);
    let de = ray.dir.dot(e);
    let denom = dd * ee - de * de;

    // Unconstrained closest pair, or the segment start when the directions
    // are (nearly) parallel or the segment degenerates
    let u = if denom > f32::EPSILON * dd * ee.max(1.0) {
        ((de * w.dot(ray.dir) - dd * w.dot(e)) / -denom).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let t = ((de * u - w.dot(ray.dir)) / dd).clamp(ray.t_min, ray.t_max);

    let u = if ee > 0.0 {
        (((ray.origin + t * ray.dir) - a).dot(e) / ee).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let p_ray = ray.origin + t * ray.dir;
    let p_seg = a + u * e;

    (p_ray.distance(p_seg) <= radius).then_some(t)
}

/// Collects every leaf curve whose flattened form the ray touches.
///
/// Exists as the reference query over a built tree; it does not shorten the
/// ray on hits, so the result is the full hit set rather than the nearest.
pub fn traverse(bvh: &Bvh, ray: &Ray) -> Vec<CurveHit> {
    let mut hits = Vec::new();

    if bvh.root == NodeRef::EMPTY {
        return hits;
    }

    let mut stack = vec![bvh.root];

    while let Some(node) = stack.pop() {
        if node.is_leaf() {
            for curve in bvh.leaf_curves(node) {
                if let Some(t) = curve.intersect(ray) {
                    hits.push(CurveHit {
                        geom_id: curve.geom_id,
                        prim_id: curve.prim_id,
                        t,
                    });
                }
            }
        } else if node.is_aligned_node() {
            let node = bvh.aligned_node(node.node_index());

            for i in 0..BRANCHING {
                if node.children[i] == NodeRef::EMPTY {
                    continue;
                }

                if ray.hits_box(&node.bounds[i]) {
                    stack.push(node.children[i]);
                }
            }
        } else {
            let node = bvh.unaligned_node(node.node_index());

            for i in 0..BRANCHING {
                if node.children[i] == NodeRef::EMPTY {
                    continue;
                }

                if ray.in_space(&node.spaces[i]).hits_box(&node.bounds[i]) {
                    stack.push(node.children[i]);
                }
            }
        }
    }

    hits
}

/// Tests the ray against every curve in `curves`; the brute-force mirror of
/// [`traverse`].
pub fn intersect_exhaustive(curves: &[Bezier], ray: &Ray) -> Vec<CurveHit> {
    curves
        .iter()
        .filter_map(|curve| {
            curve.intersect(ray).map(|t| CurveHit {
                geom_id: curve.geom_id,
                prim_id: curve.prim_id,
                t,
            })
        })
        .collect()
}
