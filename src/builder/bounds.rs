use glam::Mat3;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::{frame, Bezier, BoundingBox, OrientedBox};

/// World-frame box of a curve range, together with the summed half-area of
/// the individual curve boxes.
pub(crate) fn aligned_bounds(curves: &[Bezier]) -> (BoundingBox, f32) {
    let mut bounds = BoundingBox::default();
    let mut area = 0.0;

    for curve in curves {
        let cbounds = curve.bounds();

        area += cbounds.half_area();
        bounds += cbounds;
    }

    (bounds, area)
}

/// Like [`aligned_bounds`], with every curve first taken into `space`.
pub(crate) fn aligned_bounds_in(
    curves: &[Bezier],
    space: Mat3,
) -> OrientedBox {
    let mut bounds = BoundingBox::default();
    let mut area = 0.0;

    for curve in curves {
        let cbounds = curve.bounds_in(&space);

        area += cbounds.half_area();
        bounds += cbounds;
    }

    OrientedBox::new(space, bounds, area)
}

/// Searches four curve-aligned candidate frames and keeps the one with the
/// smallest accumulated curve area.
///
/// Candidate frames take their z axis from the chord of a randomly drawn
/// curve; the `<=` keeps the later candidate on ties. Degenerate chords fall
/// back to the identity frame.
pub(crate) fn unaligned_bounds(
    curves: &[Bezier],
    rng: &mut SmallRng,
) -> OrientedBox {
    if curves.is_empty() {
        return OrientedBox::empty();
    }

    let mut best: Option<OrientedBox> = None;

    for _ in 0..4 {
        let k = rng.gen_range(0..curves.len());

        let space = match curves[k].axis().try_normalize() {
            Some(axis) => frame(axis),
            None => Mat3::IDENTITY,
        };

        let candidate = aligned_bounds_in(curves, space);

        let is_better = best
            .map_or(true, |best| candidate.curve_area <= best.curve_area);

        if is_better {
            best = Some(candidate);
        }
    }

    best.unwrap()
}

/// SAH term of a committed split: child areas weighted by their leaf counts
/// amortized over the traversal width.
pub(crate) fn modified_sah(
    bounds0: &OrientedBox,
    bounds1: &OrientedBox,
    num0: usize,
    num1: usize,
) -> f32 {
    use super::config::blocks;

    bounds0.half_area() * blocks(num0) as f32
        + bounds1.half_area() * blocks(num1) as f32
}
