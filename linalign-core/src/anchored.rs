//! Anchor placement inside one rectangle.
//!
//! Computes forward and backward score rows with two live rows each, picks
//! points of an optimal path on evenly spaced cut lines, and splits the
//! rectangle at those points.
//!
//! With one cut line the crossing is the classical midline argmax of
//! forward + backward scores. With several cut lines a single forward sweep
//! carries, for every cell and step, the crossing at the previous cut line;
//! following those pointers back from the best corner yields one crossing per
//! line, all on the same optimal path.

use crate::dp::check_rectangle;
use crate::error::{AlignError, AlignResult};
use crate::grid::{Grid, ScoreRow};
use crate::scoring::{ScoringModel, SubstitutionMatrix};
use crate::types::{plus, Anchor, Rectangle, Score, Step, NEG_INF};

/// A point on a cut line, in grid orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crossing {
    row: usize,
    col: usize,
    step: Step,
}

const UNSET: Crossing = Crossing {
    row: usize::MAX,
    col: 0,
    step: Step::Diagonal,
};

pub struct AnchoredAligner<'a, S, M> {
    query: &'a [S],
    target: &'a [S],
    model: &'a ScoringModel<M>,
}

impl<'a, S, M> AnchoredAligner<'a, S, M>
where
    M: SubstitutionMatrix<S>,
{
    pub fn new(query: &'a [S], target: &'a [S], model: &'a ScoringModel<M>) -> Self {
        Self { query, target, model }
    }

    /// Forward scores at row `row` (offset from the rectangle's top).
    pub fn forward_row(&self, rect: &Rectangle, row: usize) -> AlignResult<ScoreRow> {
        let grid = self.grid(rect, false)?;
        check_row(rect, row)?;
        Ok(sweep_forward(&grid, row))
    }

    /// Backward scores at row `row` (offset from the rectangle's top).
    pub fn backward_row(&self, rect: &Rectangle, row: usize) -> AlignResult<ScoreRow> {
        let grid = self.grid(rect, false)?;
        check_row(rect, row)?;
        Ok(sweep_backward(&grid, row))
    }

    /// Up to `num_cuts` anchors on an optimal path through `rect`, ordered
    /// along the path.
    ///
    /// Cuts go across the longer side of the rectangle. Cut lines that
    /// collide on a short side collapse, so fewer anchors than requested may
    /// come back; none at all if the rectangle has no interior line.
    ///
    /// Ties are broken in grid orientation. On a rectangle cut by columns the
    /// Diagonal > Vertical > Horizontal order reads as Diagonal, then gap in
    /// query, then gap in target, so the chosen path may differ from the one
    /// [`QuadraticEngine`](crate::dp::QuadraticEngine) picks while scoring the
    /// same.
    pub fn compute_cut_points(&self, rect: &Rectangle, num_cuts: usize) -> AlignResult<Vec<Anchor>> {
        let transposed = rect.width() > rect.height();
        let grid = self.grid(rect, transposed)?;
        let lines = cut_offsets(grid.height(), num_cuts.max(1));

        let crossings = match lines.len() {
            0 => return Ok(Vec::new()),
            1 => vec![midline(&grid, lines[0], rect)?],
            _ => tracked(&grid, &lines, rect)?,
        };

        let candidates = crossings.into_iter().map(|(crossing, score)| {
            let (dq, dt) = if grid.is_transposed() {
                (crossing.col, crossing.row)
            } else {
                (crossing.row, crossing.col)
            };
            let anchor = Anchor::new(rect.query_start + dq, rect.target_start + dt, grid.orient(crossing.step));
            (anchor, score)
        });
        let anchors = collapse(candidates)?;

        log::trace!(
            "{} cut {} {} times: {:?}",
            rect,
            if transposed { "by columns" } else { "by rows" },
            anchors.len(),
            anchors
        );
        Ok(anchors)
    }

    fn grid(&self, rect: &Rectangle, transposed: bool) -> AlignResult<Grid<'a, S, M>> {
        check_rectangle(rect, self.query.len(), self.target.len())?;
        Ok(Grid::new(self.query, self.target, self.model, rect, transposed))
    }
}

/// Sub-rectangles of `rect` between consecutive anchors, in path order.
pub fn split(rect: &Rectangle, anchors: &[Anchor]) -> AlignResult<Vec<Rectangle>> {
    let end = Anchor::new(rect.query_end, rect.target_end, rect.exit.unwrap_or(Step::Diagonal));
    let mut children = Vec::with_capacity(anchors.len() + 1);
    let mut start = rect.start_anchor();

    for &anchor in anchors {
        if !start.precedes(&anchor) {
            return Err(AlignError::AnchorsCross { previous: start, next: anchor });
        }
        if anchor.query > end.query || anchor.target > end.target {
            return Err(AlignError::AnchorsCross { previous: anchor, next: end });
        }
        children.push(Rectangle::between(start, anchor));
        start = anchor;
    }

    children.push(Rectangle {
        query_start: start.query,
        query_end: rect.query_end,
        target_start: start.target,
        target_end: rect.target_end,
        entry: start.step,
        exit: rect.exit,
    });
    Ok(children)
}

/// Evenly spaced interior offsets along a side of length `len`, duplicates
/// removed.
pub(crate) fn cut_offsets(len: usize, cuts: usize) -> Vec<usize> {
    let mut offsets: Vec<usize> = Vec::with_capacity(cuts.min(len));
    for k in 1..=cuts {
        let offset = k * len / (cuts + 1);
        if offset > 0 && offset < len && offsets.last() != Some(&offset) {
            offsets.push(offset);
        }
    }
    offsets
}

/// Merge candidates that land on the same cell, keeping the better score,
/// and reject any pair out of path order.
fn collapse(candidates: impl IntoIterator<Item = (Anchor, Score)>) -> AlignResult<Vec<Anchor>> {
    let mut kept: Vec<(Anchor, Score)> = Vec::new();
    for (anchor, score) in candidates {
        if let Some(last) = kept.last_mut() {
            if (last.0.query, last.0.target) == (anchor.query, anchor.target) {
                if score > last.1 {
                    *last = (anchor, score);
                }
                continue;
            }
            if !last.0.precedes(&anchor) {
                return Err(AlignError::AnchorsCross {
                    previous: last.0,
                    next: anchor,
                });
            }
        }
        kept.push((anchor, score));
    }
    Ok(kept.into_iter().map(|(anchor, _)| anchor).collect())
}

fn check_row(rect: &Rectangle, row: usize) -> AlignResult<()> {
    if row > rect.height() {
        return Err(AlignError::InvalidRectangle {
            rect: *rect,
            reason: format!("row {} outside height {}", row, rect.height()),
        });
    }
    Ok(())
}

fn sweep_forward<S, M: SubstitutionMatrix<S>>(grid: &Grid<S, M>, upto: usize) -> ScoreRow {
    let mut prev = ScoreRow::new(grid.width());
    let mut cur = ScoreRow::new(grid.width());
    for i in 0..=upto {
        let previous = if i == 0 { None } else { Some(&prev) };
        grid.fill_row(i, previous, &mut cur, |_, _, _| {});
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

fn sweep_backward<S, M: SubstitutionMatrix<S>>(grid: &Grid<S, M>, downto: usize) -> ScoreRow {
    let mut next = ScoreRow::new(grid.width());
    let mut cur = ScoreRow::new(grid.width());
    for i in (downto..=grid.height()).rev() {
        let following = if i == grid.height() { None } else { Some(&next) };
        grid.fill_row_back(i, following, &mut cur);
        std::mem::swap(&mut next, &mut cur);
    }
    next
}

/// Best crossing of line `row`: maximal forward + backward score, ties to the
/// smallest column, then step order.
fn midline<S, M: SubstitutionMatrix<S>>(
    grid: &Grid<S, M>,
    row: usize,
    rect: &Rectangle,
) -> AlignResult<(Crossing, Score)> {
    let forward = sweep_forward(grid, row);
    let backward = sweep_backward(grid, row);

    let mut best: Option<(Crossing, Score)> = None;
    for col in 0..=grid.width() {
        for step in Step::ALL {
            let (f, b) = (forward.get(col, step), backward.get(col, step));
            if f <= NEG_INF || b <= NEG_INF {
                continue;
            }
            let total = plus(f, b);
            if best.map_or(true, |(_, score)| total > score) {
                best = Some((Crossing { row, col, step }, total));
            }
        }
    }
    best.ok_or(AlignError::Infeasible { rect: *rect })
}

/// Crossings of every line in `lines` along one optimal path.
fn tracked<S, M: SubstitutionMatrix<S>>(
    grid: &Grid<S, M>,
    lines: &[usize],
    rect: &Rectangle,
) -> AlignResult<Vec<(Crossing, Score)>> {
    let w = grid.width();
    let lane = |col: usize, step: Step| col * 3 + step.lane();

    let mut prev = ScoreRow::new(w);
    let mut cur = ScoreRow::new(w);
    let mut prev_origin = vec![UNSET; 3 * (w + 1)];
    let mut cur_origin = vec![UNSET; 3 * (w + 1)];
    // links[k] maps each cell of line k to the crossing of line k - 1
    let mut links: Vec<Vec<Crossing>> = Vec::with_capacity(lines.len());
    let mut next_line = lines.iter().copied().peekable();

    for i in 0..=grid.height() {
        let previous = if i == 0 { None } else { Some(&prev) };
        let (po, co) = (&prev_origin, &mut cur_origin);
        grid.fill_row(i, previous, &mut cur, |j, to, from| {
            let origin = match to {
                Step::Diagonal => po[lane(j - 1, from)],
                Step::Vertical => po[lane(j, from)],
                Step::Horizontal => co[lane(j - 1, from)],
            };
            co[lane(j, to)] = origin;
        });

        if next_line.peek() == Some(&i) {
            next_line.next();
            let here = (0..=w)
                .flat_map(|col| Step::ALL.map(|step| Crossing { row: i, col, step }))
                .collect();
            links.push(std::mem::replace(&mut cur_origin, here));
        }

        std::mem::swap(&mut prev, &mut cur);
        std::mem::swap(&mut prev_origin, &mut cur_origin);
    }

    let (score, end) = match grid.exit {
        Some(step) => (prev.get(w, step), step),
        None => prev.best(w),
    };
    if score <= NEG_INF {
        return Err(AlignError::Infeasible { rect: *rect });
    }

    let mut crossings = Vec::with_capacity(lines.len());
    let mut crossing = prev_origin[lane(w, end)];
    for k in (0..lines.len()).rev() {
        debug_assert_eq!(crossing.row, lines[k]);
        crossings.push((crossing, score));
        if k > 0 {
            crossing = links[k][lane(crossing.col, crossing.step)];
        }
    }
    crossings.reverse();
    Ok(crossings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::QuadraticEngine;
    use crate::scoring::{GapPenalty, MatchMismatch};

    fn model() -> ScoringModel<MatchMismatch> {
        ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(2, 1))
    }

    /// Solve each child exactly and compare the total with the parent.
    fn assert_split_is_exact(q: &[u8], t: &[u8], model: &ScoringModel<MatchMismatch>, cuts: usize) {
        let rect = Rectangle::full(q.len(), t.len());
        let aligner = AnchoredAligner::new(q, t, model);
        let engine = QuadraticEngine::new(q, t, model);

        let anchors = aligner.compute_cut_points(&rect, cuts).unwrap();
        assert!(!anchors.is_empty());
        let children = split(&rect, &anchors).unwrap();
        assert_eq!(children.len(), anchors.len() + 1);

        let total: Score = children.iter().map(|c| engine.solve(c).unwrap().score).sum();
        assert_eq!(total, engine.solve(&rect).unwrap().score);
    }

    #[test]
    fn test_cut_offsets() {
        assert_eq!(cut_offsets(10, 1), vec![5]);
        assert_eq!(cut_offsets(10, 4), vec![2, 4, 6, 8]);
        assert_eq!(cut_offsets(3, 10), vec![1, 2]);
        assert_eq!(cut_offsets(2, 10), vec![1]);
        assert!(cut_offsets(1, 10).is_empty());
        assert!(cut_offsets(0, 3).is_empty());
    }

    #[test]
    fn test_midline_split_is_exact() {
        assert_split_is_exact(b"GATTACAGATTACA", b"GCATGCUGCATGCU", &model(), 1);
    }

    #[test]
    fn test_tracked_split_is_exact() {
        assert_split_is_exact(b"GATTACAGATTACA", b"GCATGCUGCATGCU", &model(), 10);
        assert_split_is_exact(b"AAAAAAAAAACCCCCCCCCC", b"CCCCCCCCCC", &model(), 3);
    }

    #[test]
    fn test_wide_rectangle_cut_by_columns() {
        let model = model();
        let (q, t) = (b"ACG".as_slice(), b"TTTTACGTTTTTT".as_slice());
        let rect = Rectangle::full(q.len(), t.len());
        let anchors = AnchoredAligner::new(q, t, &model).compute_cut_points(&rect, 4).unwrap();
        assert_eq!(anchors.len(), 4);
        let targets: Vec<usize> = anchors.iter().map(|a| a.target).collect();
        assert_eq!(targets, vec![2, 5, 7, 10]);
        assert_split_is_exact(q, t, &model, 4);
    }

    #[test]
    fn test_gap_continues_across_anchor() {
        // One long gap must not be charged a second opening at the cut.
        let model = ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(10, 1));
        let (q, t) = (b"AAAAAAAAAAAAAAAAAAAA".as_slice(), b"AA".as_slice());
        assert_split_is_exact(q, t, &model, 5);
    }

    #[test]
    fn test_anchors_follow_path_order() {
        let model = model();
        let (q, t) = (b"ACGTTGCAACGTTGCA".as_slice(), b"ACGTGCAACGTTGCAA".as_slice());
        let rect = Rectangle::full(q.len(), t.len());
        let anchors = AnchoredAligner::new(q, t, &model).compute_cut_points(&rect, 7).unwrap();
        for pair in anchors.windows(2) {
            assert!(pair[0].query < pair[1].query);
            assert!(pair[0].target <= pair[1].target);
        }
    }

    #[test]
    fn test_forward_backward_sum_is_constant_on_path() {
        let model = model();
        let (q, t) = (b"GATTACA".as_slice(), b"GCATGCU".as_slice());
        let rect = Rectangle::full(q.len(), t.len());
        let aligner = AnchoredAligner::new(q, t, &model);
        let optimum = QuadraticEngine::new(q, t, &model).solve(&rect).unwrap().score;

        for row in 0..=q.len() {
            let f = aligner.forward_row(&rect, row).unwrap();
            let b = aligner.backward_row(&rect, row).unwrap();
            let best = (0..f.len())
                .flat_map(|j| Step::ALL.map(|s| (f.get(j, s), b.get(j, s))))
                .filter(|&(f, b)| f > NEG_INF && b > NEG_INF)
                .map(|(f, b)| f + b)
                .max();
            assert_eq!(best, Some(optimum));
        }
        assert!(aligner.forward_row(&rect, q.len() + 1).is_err());
    }

    #[test]
    fn test_no_interior_line() {
        let model = model();
        let rect = Rectangle::full(1, 1);
        let anchors = AnchoredAligner::new(b"A".as_slice(), b"C".as_slice(), &model)
            .compute_cut_points(&rect, 10)
            .unwrap();
        assert!(anchors.is_empty());
    }

    #[test]
    fn test_collapse_keeps_better_duplicate() {
        let a = Anchor::new(2, 2, Step::Diagonal);
        let b = Anchor::new(2, 2, Step::Vertical);
        let c = Anchor::new(4, 3, Step::Diagonal);
        let kept = collapse(vec![(a, 1), (b, 5), (c, 5)]).unwrap();
        assert_eq!(kept, vec![b, c]);
    }

    #[test]
    fn test_collapse_rejects_crossing() {
        let a = Anchor::new(4, 2, Step::Diagonal);
        let b = Anchor::new(5, 1, Step::Diagonal);
        assert!(matches!(collapse(vec![(a, 0), (b, 0)]), Err(AlignError::AnchorsCross { .. })));
    }

    #[test]
    fn test_split_rejects_anchor_outside() {
        let rect = Rectangle::full(4, 4);
        let outside = Anchor::new(5, 2, Step::Diagonal);
        assert!(split(&rect, &[outside]).is_err());
        let backwards = [Anchor::new(2, 2, Step::Diagonal), Anchor::new(1, 3, Step::Diagonal)];
        assert!(split(&rect, &backwards).is_err());
    }

    #[test]
    fn test_split_children_tile_parent() {
        let rect = Rectangle::full(6, 5);
        let anchors = [Anchor::new(2, 1, Step::Vertical), Anchor::new(4, 4, Step::Diagonal)];
        let children = split(&rect, &anchors).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].exit, Some(Step::Vertical));
        assert_eq!(children[1].entry, Step::Vertical);
        assert_eq!((children[2].query_start, children[2].target_start), (4, 4));
        assert_eq!(children[2].exit, None);
        let rows: usize = children.iter().map(|c| c.height()).sum();
        let cols: usize = children.iter().map(|c| c.width()).sum();
        assert_eq!((rows, cols), (6, 5));
    }
}
