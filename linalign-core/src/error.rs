//! Error types for the alignment core

use crate::types::{Anchor, Rectangle};
use thiserror::Error;

/// Errors raised by the aligners.
///
/// Every variant reports a contract violation on the caller's side (or a
/// bug surfaced instead of a silently wrong alignment), except `Cancelled`.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Both sequences are empty")]
    EmptySequences,

    #[error("Invalid scoring model: {0}")]
    InvalidScoring(String),

    #[error("Invalid rectangle {rect}: {reason}")]
    InvalidRectangle { rect: Rectangle, reason: String },

    #[error("Anchors cross: {previous} is not before {next}")]
    AnchorsCross { previous: Anchor, next: Anchor },

    #[error("Anchor {anchor} outside a {query_len}x{target_len} matrix")]
    AnchorOutOfBounds {
        anchor: Anchor,
        query_len: usize,
        target_len: usize,
    },

    #[error("Alignment spans {expected_query}x{expected_target} symbols but {query_len}x{target_len} were given")]
    LengthMismatch {
        expected_query: usize,
        expected_target: usize,
        query_len: usize,
        target_len: usize,
    },

    #[error("No path satisfies the boundary steps of {rect}")]
    Infeasible { rect: Rectangle },

    #[error("Alignment cancelled during pass {pass}")]
    Cancelled { pass: usize },
}

pub type AlignResult<T> = Result<T, AlignError>;
