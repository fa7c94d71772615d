//! Quadratic-space global alignment of a single rectangle.
//!
//! Scores are swept with two live rows; only the traceback pointers (one
//! byte per cell and step) are kept for the whole rectangle. The refiner
//! calls this on leaf rectangles, and [`align_quadratic`] runs it on the full
//! matrix as the reference aligner.

use crate::error::{AlignError, AlignResult};
use crate::grid::{Grid, ScoreRow};
use crate::scoring::{ScoringModel, SubstitutionMatrix};
use crate::types::{Alignment, EditOp, Rectangle, Score, Step, NEG_INF};

/// Optimal path through one rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub ops: Vec<EditOp>,
    pub score: Score,
}

/// Exact DP over a rectangle, with traceback.
pub struct QuadraticEngine<'a, S, M> {
    query: &'a [S],
    target: &'a [S],
    model: &'a ScoringModel<M>,
}

impl<'a, S, M> QuadraticEngine<'a, S, M>
where
    S: PartialEq,
    M: SubstitutionMatrix<S>,
{
    pub fn new(query: &'a [S], target: &'a [S], model: &'a ScoringModel<M>) -> Self {
        Self { query, target, model }
    }

    /// Solve `rect` exactly. Ties prefer diagonal, then vertical, then
    /// horizontal moves.
    pub fn solve(&self, rect: &Rectangle) -> AlignResult<Segment> {
        check_rectangle(rect, self.query.len(), self.target.len())?;
        let grid = Grid::new(self.query, self.target, self.model, rect, false);
        let (h, w) = (grid.height(), grid.width());
        let stride = w + 1;

        let mut trace = vec![Step::Diagonal; rect.cells() * 3];
        let mut prev = ScoreRow::new(w);
        let mut cur = ScoreRow::new(w);
        for i in 0..=h {
            let row = &mut trace[i * stride * 3..(i + 1) * stride * 3];
            let previous = if i == 0 { None } else { Some(&prev) };
            grid.fill_row(i, previous, &mut cur, |j, to, from| {
                row[j * 3 + to.lane()] = from;
            });
            std::mem::swap(&mut prev, &mut cur);
        }

        let (score, end_step) = match grid.exit {
            Some(step) => (prev.get(w, step), step),
            None => prev.best(w),
        };
        if score <= NEG_INF {
            return Err(AlignError::Infeasible { rect: *rect });
        }

        let mut ops = Vec::with_capacity(h + w);
        let (mut i, mut j, mut step) = (h, w, end_step);
        while i > 0 || j > 0 {
            let from = trace[(i * stride + j) * 3 + step.lane()];
            match step {
                Step::Diagonal => {
                    ops.push(if grid.is_match(i - 1, j - 1) {
                        EditOp::Match
                    } else {
                        EditOp::Mismatch
                    });
                    i -= 1;
                    j -= 1;
                }
                Step::Vertical => {
                    ops.push(EditOp::GapInTarget);
                    i -= 1;
                }
                Step::Horizontal => {
                    ops.push(EditOp::GapInQuery);
                    j -= 1;
                }
            }
            step = from;
        }
        debug_assert_eq!(step, grid.entry);
        ops.reverse();

        Ok(Segment { ops, score })
    }
}

/// Global alignment in quadratic space. Reference implementation for the
/// linear-space aligner; use it directly only for small inputs.
pub fn align_quadratic<S, M>(query: &[S], target: &[S], model: &ScoringModel<M>) -> AlignResult<Alignment>
where
    S: PartialEq,
    M: SubstitutionMatrix<S>,
{
    model.check::<S>(query.len(), target.len())?;
    if query.is_empty() && target.is_empty() {
        return Err(AlignError::EmptySequences);
    }

    let rect = Rectangle::full(query.len(), target.len());
    let segment = QuadraticEngine::new(query, target, model).solve(&rect)?;
    Ok(Alignment {
        score: segment.score,
        ops: segment.ops,
        query_len: query.len(),
        target_len: target.len(),
    })
}

pub(crate) fn check_rectangle(rect: &Rectangle, query_len: usize, target_len: usize) -> AlignResult<()> {
    let reason = if rect.query_start > rect.query_end || rect.target_start > rect.target_end {
        "start after end"
    } else if rect.query_end > query_len || rect.target_end > target_len {
        "extends past the sequences"
    } else {
        return Ok(());
    };
    Err(AlignError::InvalidRectangle {
        rect: *rect,
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{GapPenalty, MatchMismatch, ScoreTable};

    fn model() -> ScoringModel<MatchMismatch> {
        ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(2, 1))
    }

    #[test]
    fn test_identical_sequences() {
        let aln = align_quadratic(b"ACGTACGT", b"ACGTACGT", &model()).unwrap();
        assert_eq!(aln.score, 8);
        assert_eq!(aln.cigar(), "8=");
    }

    #[test]
    fn test_gattaca() {
        let model = model();
        let (q, t) = (b"GATTACA", b"GCATGCU");
        let aln = align_quadratic(q, t, &model).unwrap();
        assert_eq!(aln.score, -1);
        assert_eq!(aln.cigar(), "1=2X1=1X1=1X");
        assert_eq!(model.score_ops(q, t, &aln.ops).unwrap(), aln.score);
    }

    #[test]
    fn test_labels_follow_substitution_matrix() {
        // Soft-masked bases match their upper-case form; N never matches.
        let model = ScoringModel::new(ScoreTable::nucleotide(1, -1), GapPenalty::affine(2, 1));
        let aln = align_quadratic(b"acgtN", b"ACGTN", &model).unwrap();
        assert_eq!(aln.score, 3);
        assert_eq!(aln.cigar(), "4=1X");
        assert!((aln.identity() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_large_gap_costs_do_not_hit_unreachable_score() {
        let model = ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(500_000, 500_000));
        let target = [b'A'; 2200];
        let aln = align_quadratic(b"", &target, &model).unwrap();
        assert_eq!(aln.score, -1_100_000_000);
        assert_eq!(aln.ops, vec![EditOp::GapInQuery; 2200]);
    }

    #[test]
    fn test_oversized_scores_rejected() {
        let model = ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(Score::MAX / 4, 1));
        assert!(matches!(
            align_quadratic(b"A", b"A", &model),
            Err(AlignError::InvalidScoring(_))
        ));
    }

    #[test]
    fn test_empty_query_is_one_gap_run() {
        let model = model();
        let aln = align_quadratic(b"", b"ACGTA", &model).unwrap();
        assert_eq!(aln.score, -model.gap_penalty(5));
        assert_eq!(aln.cigar(), "5D");
    }

    #[test]
    fn test_both_empty_rejected() {
        let empty: &[u8] = b"";
        assert!(matches!(align_quadratic(empty, empty, &model()), Err(AlignError::EmptySequences)));
    }

    #[test]
    fn test_diagonal_preferred_on_ties() {
        // A vs C: the mismatch and the two-gap path both score -4.
        let model = ScoringModel::new(MatchMismatch::new(1, -4), GapPenalty::linear(2));
        let aln = align_quadratic(b"A", b"C", &model).unwrap();
        assert_eq!(aln.score, -4);
        assert_eq!(aln.ops, vec![EditOp::Mismatch]);
    }

    #[test]
    fn test_vertical_preferred_over_horizontal() {
        // AC-/-CA and -AC/CA- both score -1; traceback starts at the end
        // cell, where the vertical move wins.
        let model = ScoringModel::new(MatchMismatch::new(1, -5), GapPenalty::linear(1));
        let aln = align_quadratic(b"AC", b"CA", &model).unwrap();
        assert_eq!(aln.score, -1);
        assert_eq!(aln.ops, vec![EditOp::GapInQuery, EditOp::Match, EditOp::GapInTarget]);
    }

    #[test]
    fn test_entry_step_extends_gap() {
        let model = ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(10, 1));
        let engine = QuadraticEngine::new(b"AAA".as_slice(), b"".as_slice(), &model);
        let mut rect = Rectangle::full(3, 0);
        rect.entry = Step::Vertical;
        let segment = engine.solve(&rect).unwrap();
        assert_eq!(segment.score, -3);
    }

    #[test]
    fn test_exit_step_respected() {
        let model = model();
        let engine = QuadraticEngine::new(b"A".as_slice(), b"A".as_slice(), &model);
        let mut rect = Rectangle::full(1, 1);
        rect.exit = Some(Step::Horizontal);
        let segment = engine.solve(&rect).unwrap();
        assert_eq!(segment.ops, vec![EditOp::GapInTarget, EditOp::GapInQuery]);
        assert_eq!(segment.score, -4);
    }

    #[test]
    fn test_infeasible_rectangle() {
        let model = model();
        let engine = QuadraticEngine::new(b"A".as_slice(), b"".as_slice(), &model);
        let mut rect = Rectangle::full(1, 0);
        rect.exit = Some(Step::Horizontal);
        assert!(matches!(engine.solve(&rect), Err(AlignError::Infeasible { .. })));
    }

    #[test]
    fn test_out_of_bounds_rectangle() {
        let model = model();
        let engine = QuadraticEngine::new(b"A".as_slice(), b"A".as_slice(), &model);
        let rect = Rectangle::full(2, 1);
        assert!(matches!(engine.solve(&rect), Err(AlignError::InvalidRectangle { .. })));
    }
}
