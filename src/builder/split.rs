use glam::Mat3;
use rand::rngs::SmallRng;

use super::bounds::aligned_bounds;
use super::object_split::ObjectSplit;
use super::spatial_split::SpatialCenterSplit;
use super::strand_split::StrandSplit;
use super::subdiv_split::SubdivObjectSplit;
use super::{BuildConfig, BuildStats};
use crate::{Bezier, OrientedBox};

/// Median-index split, used when every heuristic came back infeasible.
#[derive(Clone, Copy, Debug)]
struct FallbackSplit {
    center: usize,
    bounds0: OrientedBox,
    bounds1: OrientedBox,
}

impl FallbackSplit {
    fn find(curves: &[Bezier], begin: usize, end: usize) -> Self {
        let center = (begin + end) / 2;

        let (bounds, area) = aligned_bounds(&curves[begin..center]);
        let bounds0 = OrientedBox::axis_aligned(bounds, area);

        let (bounds, area) = aligned_bounds(&curves[center..end]);
        let bounds1 = OrientedBox::axis_aligned(bounds, area);

        Self {
            center,
            bounds0,
            bounds1,
        }
    }
}

/// A committed split: the cut, the (possibly grown) end of the range, and
/// the bounds of both sides.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SplitOutcome {
    pub center: usize,
    pub end: usize,
    pub lbounds: OrientedBox,
    pub rbounds: OrientedBox,
}

/// Evaluates every enabled splitter on `begin..end`, applies the cheapest
/// and returns its outcome.
///
/// Candidates are priced as `trav_cost * half_area(node) + modified_sah`;
/// aligned candidates price traversal with the node's current alignedness,
/// and `is_aligned` drops to false only after an unaligned-object or strand
/// split wins. Evaluation order breaks exact ties, earliest first.
#[allow(clippy::too_many_arguments)]
pub(crate) fn split_node(
    curves: &mut Vec<Bezier>,
    begin: usize,
    end: usize,
    bounds: &OrientedBox,
    is_aligned: &mut bool,
    config: &BuildConfig,
    stats: &mut BuildStats,
    rng: &mut SmallRng,
) -> SplitOutcome {
    let node_area = bounds.half_area();

    let trav_cost_aligned = if *is_aligned {
        config.trav_cost_aligned
    } else {
        config.trav_cost_unaligned
    };

    let mut best_sah = f32::INFINITY;

    // ---

    let aligned_object = (config.aligned_splits && config.object_splits)
        .then(|| {
            ObjectSplit::find(curves, begin, end, Mat3::IDENTITY)
                .with_aligned_bounds(curves, begin, end)
        });

    let aligned_object_sah = aligned_object.as_ref().map_or(
        f32::INFINITY,
        |split| trav_cost_aligned * node_area + split.modified_sah(),
    );

    best_sah = best_sah.min(aligned_object_sah);

    // ---

    let aligned_spatial = (config.aligned_splits && config.spatial_splits)
        .then(|| SpatialCenterSplit::find(curves, begin, end, Mat3::IDENTITY));

    let aligned_spatial_sah = aligned_spatial.as_ref().map_or(
        f32::INFINITY,
        |split| trav_cost_aligned * node_area + split.modified_sah(),
    );

    best_sah = best_sah.min(aligned_spatial_sah);

    // ---

    let aligned_subdiv = (config.aligned_splits && config.subdiv_splits)
        .then(|| SubdivObjectSplit::find(curves, begin, end, Mat3::IDENTITY));

    let aligned_subdiv_sah = aligned_subdiv.as_ref().map_or(
        f32::INFINITY,
        |split| trav_cost_aligned * node_area + split.modified_sah(),
    );

    best_sah = best_sah.min(aligned_subdiv_sah);

    // ---

    let unaligned_object = (config.unaligned_splits && config.object_splits)
        .then(|| {
            ObjectSplit::find(curves, begin, end, bounds.space)
                .with_unaligned_bounds(curves, begin, end, rng)
        });

    let unaligned_object_sah = unaligned_object.as_ref().map_or(
        f32::INFINITY,
        |split| config.trav_cost_unaligned * node_area + split.modified_sah(),
    );

    best_sah = best_sah.min(unaligned_object_sah);

    // ---

    let unaligned_spatial = (config.unaligned_splits
        && config.spatial_splits)
        .then(|| SpatialCenterSplit::find(curves, begin, end, bounds.space));

    let unaligned_spatial_sah = unaligned_spatial.as_ref().map_or(
        f32::INFINITY,
        |split| config.trav_cost_unaligned * node_area + split.modified_sah(),
    );

    best_sah = best_sah.min(unaligned_spatial_sah);

    // ---

    let unaligned_subdiv = (config.unaligned_splits && config.subdiv_splits)
        .then(|| SubdivObjectSplit::find(curves, begin, end, bounds.space));

    let unaligned_subdiv_sah = unaligned_subdiv.as_ref().map_or(
        f32::INFINITY,
        |split| config.trav_cost_unaligned * node_area + split.modified_sah(),
    );

    best_sah = best_sah.min(unaligned_subdiv_sah);

    // ---

    let strand = (config.unaligned_splits && config.strand_splits)
        .then(|| StrandSplit::find(curves, begin, end, rng));

    let strand_sah = strand.as_ref().map_or(f32::INFINITY, |split| {
        config.trav_cost_unaligned * node_area + split.modified_sah()
    });

    best_sah = best_sah.min(strand_sah);

    // ---

    if best_sah == f32::INFINITY {
        stats.fallback_splits += 1;

        let split = FallbackSplit::find(curves, begin, end);

        debug_assert!(split.center > begin && end > split.center);

        return SplitOutcome {
            center: split.center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if aligned_object_sah == best_sah {
        stats.aligned_object_splits += 1;

        let split = aligned_object.unwrap();

        debug_assert!(split.is_feasible());
        let center = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if aligned_spatial_sah == best_sah {
        stats.aligned_spatial_splits += 1;

        let split = aligned_spatial.unwrap();

        debug_assert!(split.is_feasible());
        let (center, end) = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if aligned_subdiv_sah == best_sah {
        stats.aligned_subdiv_splits += 1;

        let split = aligned_subdiv.unwrap();

        debug_assert!(split.is_feasible());
        let (center, end) = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if unaligned_object_sah == best_sah {
        stats.unaligned_object_splits += 1;

        let split = unaligned_object.unwrap();

        debug_assert!(split.is_feasible());
        let center = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        *is_aligned = false;

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if unaligned_spatial_sah == best_sah {
        stats.unaligned_spatial_splits += 1;

        let split = unaligned_spatial.unwrap();

        debug_assert!(split.is_feasible());
        let (center, end) = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if unaligned_subdiv_sah == best_sah {
        stats.unaligned_subdiv_splits += 1;

        let split = unaligned_subdiv.unwrap();

        debug_assert!(split.is_feasible());
        let (center, end) = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    if strand_sah == best_sah {
        stats.strand_splits += 1;

        let split = strand.unwrap();

        debug_assert!(split.is_feasible());
        let center = split.partition(curves, begin, end);

        debug_assert!(center > begin && end > center);

        *is_aligned = false;

        return SplitOutcome {
            center,
            end,
            lbounds: split.bounds0,
            rbounds: split.bounds1,
        };
    }

    unreachable!("no split candidate matches the best SAH");
}
