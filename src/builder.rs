mod bounds;
mod config;
mod object_split;
mod spatial_split;
mod split;
mod stats;
mod strand_split;
mod subdiv_split;

use std::time::Instant;

use glam::Mat3;
use rand::rngs::SmallRng;
use rand::SeedableRng;

pub use self::config::{BuildConfig, BINS};
pub use self::stats::BuildStats;
use self::bounds::aligned_bounds_in;
use self::split::split_node;
use crate::{
    Bezier, BoundingBox, BuildError, Bvh, NodeRef, OrientedBox, Scene,
    BRANCHING,
};

/// Builds a BVH over every enabled curve set of `scene`.
pub fn build(scene: &Scene, config: &BuildConfig) -> Result<Bvh, BuildError> {
    build_on_thread(scene, config, 0).map(|(bvh, _)| bvh)
}

/// Like [`build`], also returning the split statistics.
pub fn build_with_stats(
    scene: &Scene,
    config: &BuildConfig,
) -> Result<(Bvh, BuildStats), BuildError> {
    build_on_thread(scene, config, 0)
}

/// Runs one build under the given allocator thread index.
///
/// Independent builds may run concurrently as long as their thread indices
/// differ; a single build is sequential.
pub fn build_on_thread(
    scene: &Scene,
    config: &BuildConfig,
    thread_index: usize,
) -> Result<(Bvh, BuildStats), BuildError> {
    config.validate()?;

    let mut builder = Builder {
        config,
        thread_index,
        curves: Vec::new(),
        bvh: Bvh::new(),
        stats: BuildStats::default(),
        rng: SmallRng::seed_from_u64(config.seed),
    };

    builder.run(scene)?;

    Ok((builder.bvh, builder.stats))
}

struct Builder<'a> {
    config: &'a BuildConfig,
    thread_index: usize,
    curves: Vec<Bezier>,
    bvh: Bvh,
    stats: BuildStats,
    rng: SmallRng,
}

impl Builder<'_> {
    fn run(&mut self, scene: &Scene) -> Result<(), BuildError> {
        let num_primitives = scene.num_curves();

        log::debug!("building ({} curves)", num_primitives);

        let tt = Instant::now();

        if num_primitives == 0 {
            self.bvh.init(0);
            return Ok(());
        }

        let bounds = self.ingest(scene);

        if self.config.pre_subdivision {
            self.pre_subdivide();
        }

        self.bvh.init(3 * self.curves.len());
        self.bvh.num_primitives = self.curves.len();
        self.bvh.num_vertices = 0;

        let end = self.curves.len();
        let root_bounds = aligned_bounds_in(&self.curves, Mat3::IDENTITY);

        self.bvh.root = self.recurse(0, 0, end, root_bounds)?;
        self.bvh.bounds = bounds;

        self.stats.log();

        log::debug!("building completed (in {:?})", tt.elapsed());

        Ok(())
    }

    /// Flattens enabled curve sets into the working buffer and accumulates
    /// the scene bounds.
    fn ingest(&mut self, scene: &Scene) -> BoundingBox {
        let mut bounds = BoundingBox::default();

        self.curves.reserve(3 * scene.num_curves() + 100);

        for (geom_id, set) in scene.sets().enumerate() {
            if !set.is_enabled() {
                continue;
            }

            for prim_id in 0..set.num_curves() {
                let ofs = set.curve(prim_id);

                let bezier = Bezier::new(
                    set.vertex(ofs),
                    set.vertex(ofs + 1),
                    set.vertex(ofs + 2),
                    set.vertex(ofs + 3),
                    0.0,
                    1.0,
                    geom_id as u32,
                    prim_id as u32,
                );

                bounds += bezier.bounds();
                self.curves.push(bezier);
            }
        }

        bounds
    }

    /// Uniformly refines every curve to depth three: the first of the eight
    /// pieces replaces the input in place, the rest are appended.
    fn pre_subdivide(&mut self) {
        let n = self.curves.len();

        for i in 0..n {
            let a = self.curves[i];

            let (b0, b1) = a.subdivide();
            let (c00, c01) = b0.subdivide();
            let (c10, c11) = b1.subdivide();

            let (d000, d001) = c00.subdivide();
            let (d010, d011) = c01.subdivide();
            let (d100, d101) = c10.subdivide();
            let (d110, d111) = c11.subdivide();

            self.curves[i] = d000;
            self.curves.push(d001);
            self.curves.push(d010);
            self.curves.push(d011);
            self.curves.push(d100);
            self.curves.push(d101);
            self.curves.push(d110);
            self.curves.push(d111);
        }

        log::debug!(
            "pre-subdivision: {} -> {} curves",
            n,
            self.curves.len(),
        );
    }

    fn recurse(
        &mut self,
        depth: usize,
        begin: usize,
        end: usize,
        bounds: OrientedBox,
    ) -> Result<NodeRef, BuildError> {
        if end - begin <= self.config.min_leaf_size
            || depth > self.config.max_build_depth
        {
            return self.leaf(begin, end);
        }

        // ---

        let mut is_aligned = true;

        let mut cbegin = [0; BRANCHING];
        let mut cend = [0; BRANCHING];
        let mut cbounds = [OrientedBox::empty(); BRANCHING];

        cbegin[0] = begin;
        cend[0] = end;
        cbounds[0] = bounds;

        let mut num_children = 1;

        loop {
            // Pick the biggest child that is still worth splitting
            let mut best_area = f32::NEG_INFINITY;
            let mut best_child = None;

            for i in 0..num_children {
                if cend[i] - cbegin[i] <= self.config.min_leaf_size {
                    continue;
                }

                let area = cbounds[i].half_area();

                if area > best_area {
                    best_child = Some(i);
                    best_area = area;
                }
            }

            let Some(mut best_child) = best_child else { break };

            // Splits that grow the range must only ever grow past the last
            // child, so bubble the candidate (curves and all) to the end
            if self.config.spatial_splits || self.config.subdiv_splits {
                for c in (best_child + 1)..num_children {
                    self.swap_adjacent_children(
                        &mut cbegin,
                        &mut cend,
                        &mut cbounds,
                        c - 1,
                        c,
                    );
                }

                best_child = num_children - 1;
            }

            let outcome = split_node(
                &mut self.curves,
                cbegin[best_child],
                cend[best_child],
                &cbounds[best_child],
                &mut is_aligned,
                self.config,
                &mut self.stats,
                &mut self.rng,
            );

            cbegin[num_children] = outcome.center;
            cend[num_children] = outcome.end;
            cbounds[num_children] = outcome.rbounds;

            cend[best_child] = outcome.center;
            cbounds[best_child] = outcome.lbounds;

            num_children += 1;

            if num_children == BRANCHING {
                break;
            }
        }

        // Children are recursed highest range first, so that a subtree that
        // grows the buffer only ever writes into space its already-finished
        // right siblings have abandoned

        if is_aligned {
            let node = self.bvh.alloc_aligned_node(self.thread_index)?;

            for i in (0..num_children).rev() {
                let child = self.recurse(
                    depth + 1,
                    cbegin[i],
                    cend[i],
                    cbounds[i],
                )?;

                self.bvh
                    .aligned_node_mut(node)
                    .set(i, cbounds[i].bounds, child);
            }

            Ok(NodeRef::aligned(node))
        } else {
            let node = self.bvh.alloc_unaligned_node(self.thread_index)?;

            for i in (0..num_children).rev() {
                let child = self.recurse(
                    depth + 1,
                    cbegin[i],
                    cend[i],
                    cbounds[i],
                )?;

                self.bvh
                    .unaligned_node_mut(node)
                    .set(i, &cbounds[i], child);
            }

            Ok(NodeRef::unaligned(node))
        }
    }

    /// Swaps two adjacent pending children, moving their curves with them.
    ///
    /// The ranges swap sizes, not positions: whichever child is smaller has
    /// all of its curves exchanged with the tail of the other.
    fn swap_adjacent_children(
        &mut self,
        cbegin: &mut [usize; BRANCHING],
        cend: &mut [usize; BRANCHING],
        cbounds: &mut [OrientedBox; BRANCHING],
        c0: usize,
        c1: usize,
    ) {
        debug_assert_eq!(cend[c0], cbegin[c1]);

        cbounds.swap(c0, c1);

        let s0 = cend[c0] - cbegin[c0];
        let s1 = cend[c1] - cbegin[c1];
        let num = s0.min(s1);

        let mut j = cbegin[c0];
        let mut k = cend[c1];

        for _ in 0..num {
            k -= 1;
            self.curves.swap(j, k);
            j += 1;
        }

        let boundary = if s0 < s1 { k } else { j };

        cend[c0] = boundary;
        cbegin[c1] = boundary;
    }

    fn leaf(
        &mut self,
        begin: usize,
        end: usize,
    ) -> Result<NodeRef, BuildError> {
        let mut n = end - begin;

        if n > self.config.max_leaf_blocks {
            log::warn!(
                "dropping {} primitives during build",
                n - self.config.max_leaf_blocks,
            );

            self.stats.dropped_prims +=
                (n - self.config.max_leaf_blocks) as u32;

            n = self.config.max_leaf_blocks;
        }

        self.stats.generated_prims += n as u32;

        let offset = self.bvh.alloc_primitive_block(
            self.thread_index,
            &self.curves[begin..begin + n],
        )?;

        Ok(NodeRef::leaf(offset, n))
    }
}

/// Writes `curve` at `at`, reusing abandoned buffer space when there is any.
pub(crate) fn overwrite_or_push(
    curves: &mut Vec<Bezier>,
    at: usize,
    curve: Bezier,
) {
    if at < curves.len() {
        curves[at] = curve;
    } else {
        debug_assert_eq!(at, curves.len());

        curves.push(curve);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{vec3, vec4, Vec3, Vec4};
    use rand::Rng;

    use super::*;
    use crate::{CurveSet, MAX_LEAF_BLOCKS};

    fn line(from: Vec3, to: Vec3, radius: f32) -> [Vec4; 4] {
        let d = to - from;

        [
            from.extend(radius),
            (from + d / 3.0).extend(radius),
            (from + 2.0 * d / 3.0).extend(radius),
            to.extend(radius),
        ]
    }

    fn scene_of(curves: &[[Vec4; 4]]) -> Scene {
        let mut set = CurveSet::new();

        for curve in curves {
            set.push_curve(*curve);
        }

        let mut scene = Scene::new();

        scene.push(set);
        scene
    }

    fn random_scene(n: usize, seed: u64) -> Scene {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut point =
            move || vec3(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());

        let curves: Vec<_> = (0..n)
            .map(|_| [
                point().extend(0.02),
                point().extend(0.02),
                point().extend(0.02),
                point().extend(0.02),
            ])
            .collect();

        scene_of(&curves)
    }

    /// Walks the tree checking arity, leaf sizes, depth and that every
    /// node's box covers all curves beneath it; returns the total leaf
    /// population and the deepest leaf.
    fn check_tree(bvh: &Bvh, config: &BuildConfig) -> (usize, usize) {
        fn go(
            bvh: &Bvh,
            config: &BuildConfig,
            node: NodeRef,
            depth: usize,
            ancestors: &mut Vec<(Mat3, BoundingBox)>,
            leaf_total: &mut usize,
            max_depth: &mut usize,
        ) {
            if node.is_leaf() {
                let curves = bvh.leaf_curves(node);

                assert!(!curves.is_empty());
                assert!(curves.len() <= config.max_leaf_blocks);
                assert!(depth <= config.max_build_depth + 1);

                *leaf_total += curves.len();
                *max_depth = (*max_depth).max(depth);

                for curve in curves {
                    for (space, bounds) in ancestors.iter() {
                        let cb = curve.bounds_in(space);
                        let eps = Vec3::splat(1e-3);

                        assert!(cb.min().cmpge(bounds.min() - eps).all());
                        assert!(cb.max().cmple(bounds.max() + eps).all());
                    }
                }

                return;
            }

            let children: Vec<(Mat3, BoundingBox, NodeRef)> =
                if node.is_aligned_node() {
                    let node = bvh.aligned_node(node.node_index());

                    (0..BRANCHING)
                        .filter(|&i| node.children[i] != NodeRef::EMPTY)
                        .map(|i| {
                            (Mat3::IDENTITY, node.bounds[i], node.children[i])
                        })
                        .collect()
                } else {
                    let node = bvh.unaligned_node(node.node_index());

                    (0..BRANCHING)
                        .filter(|&i| node.children[i] != NodeRef::EMPTY)
                        .map(|i| {
                            (node.spaces[i], node.bounds[i], node.children[i])
                        })
                        .collect()
                };

            assert!(children.len() >= 2);
            assert!(children.len() <= BRANCHING);

            for (space, bounds, child) in children {
                ancestors.push((space, bounds));
                go(
                    bvh,
                    config,
                    child,
                    depth + 1,
                    ancestors,
                    leaf_total,
                    max_depth,
                );
                ancestors.pop();
            }
        }

        let mut leaf_total = 0;
        let mut max_depth = 0;

        if bvh.root != NodeRef::EMPTY {
            go(
                bvh,
                config,
                bvh.root,
                0,
                &mut Vec::new(),
                &mut leaf_total,
                &mut max_depth,
            );
        }

        (leaf_total, max_depth)
    }

    #[test]
    fn empty_scene_builds_an_empty_tree() {
        let (bvh, _) =
            build_with_stats(&Scene::new(), &BuildConfig::default()).unwrap();

        assert_eq!(NodeRef::EMPTY, bvh.root);
        assert!(!bvh.bounds.is_set());
        assert_eq!(0, bvh.num_primitives);
        assert_eq!(0, bvh.num_aligned_nodes() + bvh.num_unaligned_nodes());
        assert!(bvh.all_leaf_curves().is_empty());

        // A scene whose only set is disabled counts as empty too
        let mut scene = random_scene(10, 0);

        let mut disabled = scene.get(0).clone();
        disabled.set_enabled(false);

        scene = Scene::new();
        scene.push(disabled);

        let bvh = build(&scene, &BuildConfig::default()).unwrap();

        assert_eq!(NodeRef::EMPTY, bvh.root);
    }

    #[test]
    fn single_straight_curve_becomes_one_leaf() {
        let scene = scene_of(&[line(Vec3::ZERO, vec3(3.0, 0.0, 0.0), 0.1)]);

        let config = BuildConfig {
            min_leaf_size: 8,
            ..Default::default()
        };

        let (bvh, _) = build_with_stats(&scene, &config).unwrap();

        // Pre-subdivision turns the input into eight segments
        assert_eq!(8, bvh.num_primitives);
        assert!(bvh.root.is_leaf());
        assert_eq!(8, bvh.leaf_curves(bvh.root).len());

        // Scene bounds are the control hull inflated by the radius
        let expected: BoundingBox = [
            vec3(-0.1, -0.1, -0.1),
            vec3(3.1, 0.1, 0.1),
        ]
        .into_iter()
        .collect();

        assert_relative_eq!(expected.half_area(), bvh.bounds.half_area());
        assert_relative_eq!(bvh.bounds.min().x, -0.1);
        assert_relative_eq!(bvh.bounds.max().x, 3.1);
    }

    #[test]
    fn single_straight_curve_builds_a_shallow_aligned_tree() {
        let scene = scene_of(&[line(Vec3::ZERO, vec3(3.0, 0.0, 0.0), 0.1)]);

        let (bvh, stats) =
            build_with_stats(&scene, &BuildConfig::default()).unwrap();

        assert!(bvh.root.is_aligned_node());
        assert_eq!(0, stats.strand_splits);
        assert_eq!(0, stats.fallback_splits);
        assert!(stats.aligned_object_splits > 0);

        let (leaf_total, _) = check_tree(&bvh, &BuildConfig::default());

        assert_eq!(8, leaf_total);
    }

    #[test]
    fn crossing_strands_split_by_orientation() {
        // Two orthogonal curves crossing mid-way, so no centroid cut can
        // separate them but their tangents can
        let scene = scene_of(&[
            line(Vec3::ZERO, vec3(3.0, 0.0, 0.0), 0.01),
            line(vec3(1.5, -1.5, 0.0), vec3(1.5, 1.5, 0.0), 0.01),
        ]);

        let config = BuildConfig {
            min_leaf_size: 8,
            ..Default::default()
        };

        let (bvh, stats) = build_with_stats(&scene, &config).unwrap();

        assert!(bvh.root.is_unaligned_node());
        assert_eq!(1, stats.strand_splits);

        let root = bvh.unaligned_node(bvh.root.node_index());

        let children: Vec<_> = (0..BRANCHING)
            .filter(|&i| root.children[i] != NodeRef::EMPTY)
            .collect();

        assert_eq!(2, children.len());

        // The two children's frames follow the two strand directions
        let z0 = root.spaces[children[0]].row(2);
        let z1 = root.spaces[children[1]].row(2);

        assert!(z0.dot(z1).abs() < 1e-3);

        check_tree(&bvh, &config);
    }

    #[test]
    fn parallel_bundle_splits_on_aligned_heuristics() {
        let mut rng = SmallRng::seed_from_u64(7);

        let curves: Vec<_> = (0..1024)
            .map(|_| {
                let x = rng.gen::<f32>();
                let y = rng.gen::<f32>();

                line(vec3(x, y, 0.0), vec3(x, y, 3.0), 0.005)
            })
            .collect();

        let scene = scene_of(&curves);
        let config = BuildConfig::default();
        let (bvh, stats) = build_with_stats(&scene, &config).unwrap();

        assert_eq!(8192, bvh.num_primitives);
        assert!(bvh.root.is_aligned_node());
        assert!(stats.aligned_object_splits > 0);

        // Parallel chords leave the strand splitter with an empty side
        assert_eq!(0, stats.strand_splits);
        assert_eq!(0, bvh.num_unaligned_nodes());

        let (leaf_total, max_depth) = check_tree(&bvh, &config);

        assert_eq!(8192, leaf_total);
        assert!(max_depth <= 12, "tree too deep: {max_depth}");
    }

    #[test]
    fn bent_bundle_splits_into_oriented_children() {
        let d1 = vec3(1.0, 1.0, 0.0).normalize();
        let d2 = vec3(1.0, -1.0, 0.0).normalize();
        let elbow = 3.0 * d1;

        // An L of two oblique legs; axis-aligned boxes fit both legs badly
        let scene = scene_of(&[
            line(Vec3::ZERO, 1.5 * d1, 0.01),
            line(1.5 * d1, 3.0 * d1, 0.01),
            line(elbow, elbow + 1.5 * d2, 0.01),
            line(elbow + 1.5 * d2, elbow + 3.0 * d2, 0.01),
        ]);

        let config = BuildConfig::default();
        let (bvh, stats) = build_with_stats(&scene, &config).unwrap();

        assert!(bvh.root.is_unaligned_node());
        assert!(stats.unaligned_object_splits >= 1);

        // Every root child's frame runs along one of the legs
        let root = bvh.unaligned_node(bvh.root.node_index());

        for i in 0..BRANCHING {
            if root.children[i] == NodeRef::EMPTY {
                continue;
            }

            let z = root.spaces[i].row(2);

            assert!(
                z.dot(d1).abs() > 0.9 || z.dot(d2).abs() > 0.9,
                "child frame {z} follows neither leg",
            );
        }

        check_tree(&bvh, &config);
    }

    #[test]
    fn degenerate_curve_falls_back_to_median_splits() {
        let point = vec4(1.0, 2.0, 3.0, 0.1);

        let mut set = CurveSet::new();
        set.push_curve([point, point, point, point]);

        let mut scene = Scene::new();
        scene.push(set);

        let config = BuildConfig::default();
        let (bvh, stats) = build_with_stats(&scene, &config).unwrap();

        assert_eq!(8, bvh.num_primitives);
        assert!(stats.fallback_splits >= 1);
        assert!(bvh.root.is_aligned_node());

        let (leaf_total, _) = check_tree(&bvh, &config);

        assert_eq!(8, leaf_total);
        assert!(bvh.bounds.min().is_finite());
        assert!(bvh.bounds.max().is_finite());
    }

    #[test]
    fn oversized_forced_leaves_clamp_and_drop() {
        // Depth zero forces leaves right below the root; identical curves
        // keep every heuristic infeasible so the fallback carves the range
        // into four oversized children
        let point = vec4(0.5, 0.5, 0.5, 0.1);
        let curves = vec![[point, point, point, point]; 8];
        let scene = scene_of(&curves);

        let config = BuildConfig {
            max_build_depth: 0,
            ..Default::default()
        };

        let (bvh, stats) = build_with_stats(&scene, &config).unwrap();

        // 64 segments, four oversized children, 8 curves kept in each
        assert_eq!(64, bvh.num_primitives);
        assert_eq!(32, stats.generated_prims);
        assert_eq!(32, stats.dropped_prims);

        let (leaf_total, max_depth) = check_tree(&bvh, &config);

        assert_eq!(32, leaf_total);
        assert_eq!(1, max_depth);
    }

    #[test]
    fn clipping_splitters_duplicate_but_stay_consistent() {
        let scene = random_scene(24, 3);

        // Subdivision splits double their range, so the depth cap keeps the
        // duplication within the arena budget
        let config = BuildConfig {
            spatial_splits: true,
            subdiv_splits: true,
            strand_splits: false,
            unaligned_splits: false,
            min_leaf_size: 4,
            max_build_depth: 4,
            ..Default::default()
        };

        let (a, stats) = build_with_stats(&scene, &config).unwrap();

        check_tree(&a, &config);

        assert!(
            stats.aligned_spatial_splits
                + stats.aligned_subdiv_splits
                + stats.aligned_object_splits
                + stats.fallback_splits
                > 0
        );

        let (b, _) = build_with_stats(&scene, &config).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn builds_are_deterministic() {
        let scene = random_scene(64, 11);
        let config = BuildConfig::default();

        let (a, stats_a) = build_with_stats(&scene, &config).unwrap();
        let (b, stats_b) = build_with_stats(&scene, &config).unwrap();

        assert_eq!(a, b);
        assert_eq!(stats_a, stats_b);

        // The allocator thread index has no bearing on the output
        let (c, _) = build_on_thread(&scene, &config, 5).unwrap();

        assert_eq!(a, c);
    }

    #[test]
    fn disabled_sets_are_skipped() {
        let mut on = CurveSet::new();
        let mut off = CurveSet::new();

        for curve in [
            line(Vec3::ZERO, vec3(1.0, 0.0, 0.0), 0.01),
            line(Vec3::ZERO, vec3(0.0, 1.0, 0.0), 0.01),
        ] {
            on.push_curve(curve);
            off.push_curve(curve);
        }

        off.set_enabled(false);

        let mut scene = Scene::new();

        scene.push(off);
        scene.push(on);

        let bvh = build(&scene, &BuildConfig::default()).unwrap();

        assert_eq!(16, bvh.num_primitives);

        // Ids point at the enabled set
        for curve in bvh.all_leaf_curves() {
            assert_eq!(1, curve.geom_id);
        }
    }

    #[test]
    fn leaf_population_covers_every_curve_once() {
        let scene = random_scene(48, 21);
        let config = BuildConfig::default();
        let (bvh, _) = build_with_stats(&scene, &config).unwrap();

        let (leaf_total, _) = check_tree(&bvh, &config);

        assert_eq!(bvh.num_primitives, leaf_total);

        // Eight distinct refinements per input curve, each exactly once
        let mut keys: Vec<_> = bvh
            .all_leaf_curves()
            .iter()
            .map(|curve| (curve.geom_id, curve.prim_id, curve.t0.to_bits()))
            .collect();

        keys.sort_unstable();
        keys.dedup();

        assert_eq!(bvh.num_primitives, keys.len());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let scene = random_scene(4, 0);

        let config = BuildConfig {
            object_splits: false,
            subdiv_splits: false,
            spatial_splits: false,
            strand_splits: false,
            ..Default::default()
        };

        assert_eq!(
            Err(BuildError::NoSplitterEnabled),
            build(&scene, &config).map(|_| ()),
        );

        let config = BuildConfig {
            max_leaf_blocks: MAX_LEAF_BLOCKS + 1,
            ..Default::default()
        };

        assert_eq!(
            Err(BuildError::MaxLeafBlocksOutOfRange {
                got: MAX_LEAF_BLOCKS + 1
            }),
            build(&scene, &config).map(|_| ()),
        );
    }
}
