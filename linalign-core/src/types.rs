use crate::error::{AlignError, AlignResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cumulative alignment score. Higher is better.
pub type Score = i64;

/// Score of an unreachable DP cell.
pub(crate) const NEG_INF: Score = Score::MIN / 2;

/// Adds `delta` to `score`, keeping unreachable cells unreachable.
#[inline]
pub(crate) fn plus(score: Score, delta: Score) -> Score {
    if score <= NEG_INF {
        NEG_INF
    } else {
        score + delta
    }
}

/// Direction of the move that enters a matrix cell.
///
/// The declaration order is the tie-break order: when several moves reach a
/// cell with the same score, the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    /// Query symbol against target symbol
    Diagonal = 0,
    /// Query symbol against a gap (gap in target)
    Vertical = 1,
    /// Target symbol against a gap (gap in query)
    Horizontal = 2,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Diagonal, Step::Vertical, Step::Horizontal];

    #[inline]
    pub(crate) fn lane(self) -> usize {
        self as usize
    }

    /// Swap the two gap directions. Used to view a rectangle transposed.
    #[inline]
    pub(crate) fn transposed(self) -> Step {
        match self {
            Step::Diagonal => Step::Diagonal,
            Step::Vertical => Step::Horizontal,
            Step::Horizontal => Step::Vertical,
        }
    }

    pub fn is_gap(self) -> bool {
        self != Step::Diagonal
    }
}

/// A committed point on the optimal path.
///
/// `query` and `target` count the symbols consumed so far, so an anchor at
/// `(i, j)` with a diagonal step pairs query symbol `i` with target symbol `j`
/// in 1-based numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub query: usize,
    pub target: usize,
    pub step: Step,
}

impl Anchor {
    pub fn new(query: usize, target: usize, step: Step) -> Self {
        Self { query, target, step }
    }

    /// True if `self` lies strictly before `next` on a monotone path.
    pub fn precedes(&self, next: &Anchor) -> bool {
        self.query <= next.query
            && self.target <= next.target
            && (self.query, self.target) != (next.query, next.target)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {:?})", self.query, self.target, self.step)
    }
}

/// An unresolved sub-problem of the alignment matrix.
///
/// Rows `query_start..=query_end` and columns `target_start..=target_end`.
/// The path enters the top-left corner with `entry` and must leave the
/// bottom-right corner with `exit` (any step when `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,
    pub entry: Step,
    pub exit: Option<Step>,
}

impl Rectangle {
    /// The whole matrix of a `query_len` x `target_len` problem.
    pub fn full(query_len: usize, target_len: usize) -> Self {
        Self {
            query_start: 0,
            query_end: query_len,
            target_start: 0,
            target_end: target_len,
            entry: Step::Diagonal,
            exit: None,
        }
    }

    /// The rectangle between two consecutive path points.
    pub fn between(start: Anchor, end: Anchor) -> Self {
        Self {
            query_start: start.query,
            query_end: end.query,
            target_start: start.target,
            target_end: end.target,
            entry: start.step,
            exit: Some(end.step),
        }
    }

    pub fn height(&self) -> usize {
        self.query_end - self.query_start
    }

    pub fn width(&self) -> usize {
        self.target_end - self.target_start
    }

    /// Number of DP cells, boundary row and column included.
    pub fn cells(&self) -> usize {
        (self.height() + 1).saturating_mul(self.width() + 1)
    }

    pub fn is_leaf(&self, leaf_cells: usize) -> bool {
        self.cells() <= leaf_cells
    }

    pub(crate) fn start_anchor(&self) -> Anchor {
        Anchor::new(self.query_start, self.target_start, self.entry)
    }

    /// Sort key used to stitch leaf segments back together in path order.
    pub(crate) fn position(&self) -> (usize, usize) {
        (self.query_start, self.target_start)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[q {}..{}, t {}..{}]",
            self.query_start, self.query_end, self.target_start, self.target_end
        )
    }
}

/// One column of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOp {
    Match,
    Mismatch,
    /// Query symbol aligned to a gap
    GapInTarget,
    /// Target symbol aligned to a gap
    GapInQuery,
}

impl EditOp {
    pub fn step(self) -> Step {
        match self {
            EditOp::Match | EditOp::Mismatch => Step::Diagonal,
            EditOp::GapInTarget => Step::Vertical,
            EditOp::GapInQuery => Step::Horizontal,
        }
    }

    /// Extended CIGAR operation code.
    pub fn cigar_code(self) -> char {
        match self {
            EditOp::Match => '=',
            EditOp::Mismatch => 'X',
            EditOp::GapInTarget => 'I',
            EditOp::GapInQuery => 'D',
        }
    }

    pub fn consumes_query(self) -> bool {
        self != EditOp::GapInQuery
    }

    pub fn consumes_target(self) -> bool {
        self != EditOp::GapInTarget
    }
}

/// A global alignment: the edit script from the first to the last symbol of
/// both sequences, with its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    pub score: Score,
    pub ops: Vec<EditOp>,
    pub query_len: usize,
    pub target_len: usize,
}

impl Alignment {
    /// Number of alignment columns.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn matches(&self) -> usize {
        self.ops.iter().filter(|&&op| op == EditOp::Match).count()
    }

    pub fn mismatches(&self) -> usize {
        self.ops.iter().filter(|&&op| op == EditOp::Mismatch).count()
    }

    /// Number of gap columns.
    pub fn gap_count(&self) -> usize {
        self.ops.iter().filter(|op| op.step().is_gap()).count()
    }

    /// Number of contiguous gap runs (gap openings).
    pub fn gap_runs(&self) -> usize {
        let mut runs = 0;
        let mut previous = Step::Diagonal;
        for op in &self.ops {
            let step = op.step();
            if step.is_gap() && step != previous {
                runs += 1;
            }
            previous = step;
        }
        runs
    }

    /// Fraction of columns that are identical symbol pairs.
    pub fn identity(&self) -> f64 {
        if self.ops.is_empty() {
            return 0.0;
        }
        self.matches() as f64 / self.ops.len() as f64
    }

    /// Run-length encoded extended CIGAR string, e.g. `3=1X2I`.
    pub fn cigar(&self) -> String {
        let mut cigar = String::new();
        let mut iter = self.ops.iter().peekable();
        while let Some(&op) = iter.next() {
            let mut run = 1;
            while iter.peek() == Some(&&op) {
                iter.next();
                run += 1;
            }
            cigar.push_str(&run.to_string());
            cigar.push(op.cigar_code());
        }
        cigar
    }

    /// The two aligned rows, `None` marking a gap.
    ///
    /// `query` and `target` must be exactly the sequences the edit script
    /// consumes; anything else is a `LengthMismatch`.
    pub fn aligned_rows<S: Clone>(
        &self,
        query: &[S],
        target: &[S],
    ) -> AlignResult<(Vec<Option<S>>, Vec<Option<S>>)> {
        let expected_query = self.ops.iter().filter(|op| op.consumes_query()).count();
        let expected_target = self.ops.iter().filter(|op| op.consumes_target()).count();
        if (expected_query, expected_target) != (query.len(), target.len()) {
            return Err(AlignError::LengthMismatch {
                expected_query,
                expected_target,
                query_len: query.len(),
                target_len: target.len(),
            });
        }

        let (mut query_symbols, mut target_symbols) = (query.iter(), target.iter());
        let mut query_row = Vec::with_capacity(self.ops.len());
        let mut target_row = Vec::with_capacity(self.ops.len());
        for &op in &self.ops {
            query_row.push(if op.consumes_query() { query_symbols.next().cloned() } else { None });
            target_row.push(if op.consumes_target() { target_symbols.next().cloned() } else { None });
        }
        Ok((query_row, target_row))
    }

    /// Byte rendering of the aligned rows with `gap` as the gap marker.
    pub fn render(&self, query: &[u8], target: &[u8], gap: u8) -> AlignResult<(Vec<u8>, Vec<u8>)> {
        let (query_row, target_row) = self.aligned_rows(query, target)?;
        Ok((
            query_row.into_iter().map(|c| c.unwrap_or(gap)).collect(),
            target_row.into_iter().map(|c| c.unwrap_or(gap)).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(ops: Vec<EditOp>) -> Alignment {
        let query_len = ops.iter().filter(|op| op.consumes_query()).count();
        let target_len = ops.iter().filter(|op| op.consumes_target()).count();
        Alignment { score: 0, ops, query_len, target_len }
    }

    #[test]
    fn test_cigar_runs() {
        use EditOp::*;
        let aln = alignment(vec![Match, Match, Mismatch, GapInTarget, GapInTarget, Match, GapInQuery]);
        assert_eq!(aln.cigar(), "2=1X2I1=1D");
        assert_eq!(aln.gap_count(), 3);
        assert_eq!(aln.gap_runs(), 2);
    }

    #[test]
    fn test_adjacent_gap_directions_are_separate_runs() {
        use EditOp::*;
        let aln = alignment(vec![GapInTarget, GapInQuery, GapInQuery]);
        assert_eq!(aln.gap_runs(), 2);
    }

    #[test]
    fn test_render_rows() {
        use EditOp::*;
        let aln = alignment(vec![Match, GapInQuery, Match, GapInTarget]);
        let (q, t) = aln.render(b"ACG", b"AXC", b'-').unwrap();
        assert_eq!(q, b"A-CG");
        assert_eq!(t, b"AXC-");
    }

    #[test]
    fn test_rows_need_the_aligned_sequences() {
        use EditOp::*;
        let aln = alignment(vec![Match, GapInQuery, Match, GapInTarget]);
        assert!(matches!(
            aln.render(b"AC", b"AXC", b'-'),
            Err(AlignError::LengthMismatch { expected_query: 3, query_len: 2, .. })
        ));
        assert!(aln.aligned_rows(b"ACG".as_slice(), b"AXCT".as_slice()).is_err());

        let (q, _) = aln.aligned_rows(&['a', 'c', 'g'][..], &['a', 'x', 'c'][..]).unwrap();
        assert_eq!(q, vec![Some('a'), None, Some('c'), Some('g')]);
    }

    #[test]
    fn test_identity_of_empty_alignment() {
        let aln = alignment(Vec::new());
        assert!(aln.is_empty());
        assert_eq!(aln.identity(), 0.0);
        assert_eq!(aln.cigar(), "");
    }

    #[test]
    fn test_rectangle_geometry() {
        let rect = Rectangle::full(3, 7);
        assert_eq!(rect.height(), 3);
        assert_eq!(rect.width(), 7);
        assert_eq!(rect.cells(), 32);
        assert!(rect.is_leaf(32));
        assert!(!rect.is_leaf(31));
    }

    #[test]
    fn test_anchor_order() {
        let a = Anchor::new(2, 3, Step::Diagonal);
        let b = Anchor::new(4, 3, Step::Vertical);
        assert!(a.precedes(&b));
        assert!(!b.precedes(&a));
        assert!(!a.precedes(&a));
    }

    #[test]
    fn test_plus_keeps_unreachable() {
        assert_eq!(plus(NEG_INF, 5), NEG_INF);
        assert_eq!(plus(NEG_INF, -5), NEG_INF);
        assert_eq!(plus(3, -5), -2);
    }
}
