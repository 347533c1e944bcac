/// Per-build split counters.
///
/// One counter per splitter kind, bumped when that splitter wins a node,
/// plus the number of curves copied into leaves and the number dropped by
/// leaf clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub aligned_object_splits: u32,
    pub aligned_spatial_splits: u32,
    pub aligned_subdiv_splits: u32,
    pub unaligned_object_splits: u32,
    pub unaligned_spatial_splits: u32,
    pub unaligned_subdiv_splits: u32,
    pub strand_splits: u32,
    pub fallback_splits: u32,
    pub generated_prims: u32,
    pub dropped_prims: u32,
}

impl BuildStats {
    pub(crate) fn log(&self) {
        log::debug!(
            "split statistics: {} aligned object, {} aligned spatial, \
             {} aligned subdiv, {} unaligned object, {} unaligned spatial, \
             {} unaligned subdiv, {} strand, {} fallback",
            self.aligned_object_splits,
            self.aligned_spatial_splits,
            self.aligned_subdiv_splits,
            self.unaligned_object_splits,
            self.unaligned_spatial_splits,
            self.unaligned_subdiv_splits,
            self.strand_splits,
            self.fallback_splits,
        );

        log::debug!(
            "generated {} leaf curves ({} dropped)",
            self.generated_prims,
            self.dropped_prims,
        );
    }
}
