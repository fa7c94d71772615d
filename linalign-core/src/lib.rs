//! Linalign Core Library
//!
//! Optimal global pairwise alignment in linear memory. A recursive refiner
//! places several anchors per rectangle and pass on an optimal path, then
//! solves the small rectangles between anchors with quadratic-space DP.
//!
//! ```
//! use linalign_core::{AlignerConfig, GapPenalty, MatchMismatch, RecursiveRefiner, ScoringModel};
//!
//! let model = ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(2, 1));
//! let aligner = RecursiveRefiner::new(model, AlignerConfig::default());
//! let report = aligner.align(b"GATTACA".as_slice(), b"GCATGCU".as_slice()).unwrap();
//! assert_eq!(report.score(), -1);
//! ```

pub mod anchored;
pub mod config;
pub mod dp;
pub mod error;
pub mod grid;
pub mod refine;
pub mod scoring;
pub mod types;

// Re-export commonly used types and functions
pub use anchored::AnchoredAligner;
pub use config::AlignerConfig;
pub use dp::{align_quadratic, QuadraticEngine, Segment};
pub use error::{AlignError, AlignResult};
pub use grid::ScoreRow;
pub use refine::{AlignmentReport, RecursiveRefiner, RefineStats};
pub use scoring::{GapPenalty, MatchMismatch, ScoreTable, ScoringModel, SubstitutionMatrix};
pub use types::{Alignment, Anchor, EditOp, Rectangle, Score, Step};

/// Version information for the linalign core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
