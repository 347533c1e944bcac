use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("no splitter is enabled in the build configuration")]
    NoSplitterEnabled,

    #[error("`min_leaf_size` must be at least 1")]
    MinLeafSizeZero,

    #[error(
        "`max_leaf_blocks` must be within 1..={}, got {got}",
        crate::MAX_LEAF_BLOCKS
    )]
    MaxLeafBlocksOutOfRange { got: usize },

    #[error("node arena exhausted (budget of {budget} nodes)")]
    ArenaFull { budget: usize },

    #[error("leaf arena exhausted ({got} curves exceeds the encodable {max})")]
    LeafArenaFull { got: usize, max: usize },
}
