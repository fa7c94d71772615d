//! Aligner configuration, passed explicitly to every entry point.

use serde::{Deserialize, Serialize};

/// Smallest leaf threshold accepted: one 1x1 rectangle.
pub const MIN_LEAF_CELLS: usize = 4;

/// Parameters controlling the recursive refinement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Anchors requested per rectangle and pass
    #[serde(default = "default_cuts_per_section")]
    pub cuts_per_section: usize,

    /// Rectangles with at most this many DP cells, boundary row and column
    /// included, are solved directly
    #[serde(default = "default_leaf_cells")]
    pub leaf_cells: usize,

    /// Passes after which oversized rectangles are solved directly
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Process the rectangles of a pass on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_cuts_per_section() -> usize { 10 }
fn default_leaf_cells() -> usize { 4096 }
fn default_max_passes() -> usize { 64 }
fn default_true() -> bool { true }

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            cuts_per_section: default_cuts_per_section(),
            leaf_cells: default_leaf_cells(),
            max_passes: default_max_passes(),
            parallel: true,
        }
    }
}

impl AlignerConfig {
    pub fn with_cuts_per_section(mut self, cuts: usize) -> Self {
        self.cuts_per_section = cuts;
        self
    }

    pub fn with_leaf_cells(mut self, cells: usize) -> Self {
        self.leaf_cells = cells;
        self
    }

    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Copy with out-of-range values clamped to the nearest valid setting.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.cuts_per_section == 0 {
            log::debug!("cuts_per_section 0 clamped to 1");
            config.cuts_per_section = 1;
        }
        if config.leaf_cells < MIN_LEAF_CELLS {
            log::debug!("leaf_cells {} clamped to {}", config.leaf_cells, MIN_LEAF_CELLS);
            config.leaf_cells = MIN_LEAF_CELLS;
        }
        config
    }
}
