//! Oriented view of one rectangle and the row kernels shared by the DP
//! engines.
//!
//! A [`Grid`] walks its rectangle row by row. For a rectangle that is wider
//! than tall the cut engine uses a transposed grid, so "rows" are target
//! columns; steps are translated with [`Grid::orient`] and substitution
//! arguments are swapped back so scores stay in query/target order.

use crate::scoring::{ScoringModel, SubstitutionMatrix};
use crate::types::{plus, Rectangle, Score, Step, NEG_INF};

pub(crate) struct Grid<'a, S, M> {
    rows: &'a [S],
    cols: &'a [S],
    model: &'a ScoringModel<M>,
    transposed: bool,
    /// Entry and exit steps in grid orientation
    pub entry: Step,
    pub exit: Option<Step>,
}

impl<'a, S, M> Grid<'a, S, M>
where
    M: SubstitutionMatrix<S>,
{
    pub fn new(
        query: &'a [S],
        target: &'a [S],
        model: &'a ScoringModel<M>,
        rect: &Rectangle,
        transposed: bool,
    ) -> Self {
        let q = &query[rect.query_start..rect.query_end];
        let t = &target[rect.target_start..rect.target_end];
        let (rows, cols) = if transposed { (t, q) } else { (q, t) };
        let orient = |step: Step| if transposed { step.transposed() } else { step };
        Self {
            rows,
            cols,
            model,
            transposed,
            entry: orient(rect.entry),
            exit: rect.exit.map(orient),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    /// Translate a step between grid and matrix orientation. Self-inverse.
    pub fn orient(&self, step: Step) -> Step {
        if self.transposed {
            step.transposed()
        } else {
            step
        }
    }

    /// Substitution score for row symbol `r` against column symbol `c`
    /// (0-based within the rectangle).
    #[inline]
    pub fn substitution(&self, r: usize, c: usize) -> Score {
        if self.transposed {
            self.model.substitution.score(&self.cols[c], &self.rows[r])
        } else {
            self.model.substitution.score(&self.rows[r], &self.cols[c])
        }
    }

    /// Whether row symbol `r` and column symbol `c` are reported as a match.
    pub fn is_match(&self, r: usize, c: usize) -> bool
    where
        S: PartialEq,
    {
        if self.transposed {
            self.model.substitution.is_match(&self.cols[c], &self.rows[r])
        } else {
            self.model.substitution.is_match(&self.rows[r], &self.cols[c])
        }
    }

    /// Compute forward row `i` from row `i - 1`.
    ///
    /// `visit(j, to, from)` is called for every cell step with the step that
    /// precedes it on the best path, so callers can keep traceback pointers
    /// or propagate cut pointers without storing scores.
    pub fn fill_row<F>(&self, i: usize, prev: Option<&ScoreRow>, cur: &mut ScoreRow, mut visit: F)
    where
        F: FnMut(usize, Step, Step),
    {
        let gaps = &self.model.gaps;
        for j in 0..=self.width() {
            if i == 0 && j == 0 {
                for step in Step::ALL {
                    cur.lanes[step.lane()][0] = if step == self.entry { 0 } else { NEG_INF };
                }
                continue;
            }

            let diagonal = match prev {
                Some(p) if j > 0 => {
                    let (score, from) = p.enter(j - 1, Step::Diagonal, gaps);
                    visit(j, Step::Diagonal, from);
                    plus(score, self.substitution(i - 1, j - 1))
                }
                _ => NEG_INF,
            };
            let vertical = match prev {
                Some(p) => {
                    let (score, from) = p.enter(j, Step::Vertical, gaps);
                    visit(j, Step::Vertical, from);
                    score
                }
                None => NEG_INF,
            };
            cur.lanes[Step::Diagonal.lane()][j] = diagonal;
            cur.lanes[Step::Vertical.lane()][j] = vertical;

            let horizontal = if j > 0 {
                let (score, from) = cur.enter(j - 1, Step::Horizontal, gaps);
                visit(j, Step::Horizontal, from);
                score
            } else {
                NEG_INF
            };
            cur.lanes[Step::Horizontal.lane()][j] = horizontal;
        }
    }

    /// Compute backward row `i` from row `i + 1`.
    ///
    /// Lane `s` at column `j` holds the best score from cell `(i, j)`, entered
    /// with step `s`, to the bottom-right corner left with the exit step.
    pub fn fill_row_back(&self, i: usize, next: Option<&ScoreRow>, cur: &mut ScoreRow) {
        let gaps = &self.model.gaps;
        let (h, w) = (self.height(), self.width());
        for j in (0..=w).rev() {
            if i == h && j == w {
                for step in Step::ALL {
                    let done = self.exit.map_or(true, |exit| exit == step);
                    cur.lanes[step.lane()][j] = if done { 0 } else { NEG_INF };
                }
                continue;
            }

            let diagonal = match next {
                Some(n) if j < w => plus(n.get(j + 1, Step::Diagonal), self.substitution(i, j)),
                _ => NEG_INF,
            };
            let below = next.map_or(NEG_INF, |n| n.get(j, Step::Vertical));
            let right = if j < w { cur.get(j + 1, Step::Horizontal) } else { NEG_INF };

            for step in Step::ALL {
                let vertical = plus(below, gaps.transition(step, Step::Vertical));
                let horizontal = plus(right, gaps.transition(step, Step::Horizontal));
                cur.lanes[step.lane()][j] = diagonal.max(vertical).max(horizontal);
            }
        }
    }
}

/// One row of cumulative scores across a rectangle, one lane per entering
/// step. Rows are short-lived: engines keep two of them alive at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    lanes: [Vec<Score>; 3],
}

impl ScoreRow {
    pub fn new(width: usize) -> Self {
        Self {
            lanes: [vec![NEG_INF; width + 1], vec![NEG_INF; width + 1], vec![NEG_INF; width + 1]],
        }
    }

    /// Number of columns, boundary column included.
    pub fn len(&self) -> usize {
        self.lanes[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes[0].is_empty()
    }

    #[inline]
    pub fn get(&self, j: usize, step: Step) -> Score {
        self.lanes[step.lane()][j]
    }

    /// Best score at column `j` over all steps, ties broken in step order.
    pub fn best(&self, j: usize) -> (Score, Step) {
        pick(Step::ALL.map(|step| self.get(j, step)))
    }

    /// Best score for moving from column `j` of this row with step `to`.
    #[inline]
    fn enter(&self, j: usize, to: Step, gaps: &crate::scoring::GapPenalty) -> (Score, Step) {
        pick(Step::ALL.map(|from| plus(self.get(j, from), gaps.transition(from, to))))
    }
}

/// Maximum of three candidates indexed by step; the earliest step wins ties.
#[inline]
pub(crate) fn pick(candidates: [Score; 3]) -> (Score, Step) {
    let mut best = (candidates[0], Step::Diagonal);
    for step in [Step::Vertical, Step::Horizontal] {
        if candidates[step.lane()] > best.0 {
            best = (candidates[step.lane()], step);
        }
    }
    best
}
