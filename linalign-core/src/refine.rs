//! Recursive multi-cut refinement.
//!
//! The refiner keeps a worklist of unresolved rectangles. Each pass solves the
//! rectangles that are small enough and cuts every other one into
//! sub-rectangles at anchors on its optimal path. Leaf segments are keyed by
//! rectangle position and concatenated once the worklist is empty.

use crate::anchored::{split, AnchoredAligner};
use crate::config::AlignerConfig;
use crate::dp::{QuadraticEngine, Segment};
use crate::error::{AlignError, AlignResult};
use crate::scoring::{ScoringModel, SubstitutionMatrix};
use crate::types::{Alignment, Anchor, Rectangle, Score, Step};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Counters collected while refining one alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineStats {
    /// Passes in which at least one rectangle was cut
    pub passes: usize,
    /// Rectangles solved directly because they were small enough
    pub leaves: usize,
    /// Anchors committed, caller-supplied ones included
    pub anchors: usize,
    /// Largest worklist seen at the start of a pass
    pub peak_active: usize,
    /// DP cells of the largest leaf
    pub largest_leaf_cells: usize,
    /// Oversized rectangles solved directly at the pass ceiling
    pub fallback_rectangles: usize,
    pub elapsed: Duration,
}

/// Result of a linear-space alignment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub alignment: Alignment,
    /// Every committed anchor, in path order
    pub anchors: Vec<Anchor>,
    pub stats: RefineStats,
    /// Mean of the two self-alignment scores
    pub max_score: Score,
    /// Score of aligning both sequences entirely against gaps
    pub min_score: Score,
}

impl AlignmentReport {
    pub fn score(&self) -> Score {
        self.alignment.score
    }

    /// Score normalised into `[min_score, max_score]`.
    pub fn similarity(&self) -> f64 {
        if self.max_score <= self.min_score {
            return 1.0;
        }
        (self.alignment.score - self.min_score) as f64 / (self.max_score - self.min_score) as f64
    }

    pub fn distance(&self) -> f64 {
        1.0 - self.similarity()
    }
}

enum Outcome {
    Leaf(Rectangle, Segment),
    Fallback(Rectangle, Segment),
    Split(Vec<Anchor>, Vec<Rectangle>),
}

/// Linear-space global aligner.
#[derive(Debug, Clone)]
pub struct RecursiveRefiner<M> {
    model: ScoringModel<M>,
    config: AlignerConfig,
}

impl<M> RecursiveRefiner<M> {
    pub fn new(model: ScoringModel<M>, config: AlignerConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &ScoringModel<M> {
        &self.model
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Optimal global alignment of `query` against `target`.
    pub fn align<S>(&self, query: &[S], target: &[S]) -> AlignResult<AlignmentReport>
    where
        S: PartialEq + Sync,
        M: SubstitutionMatrix<S> + Sync,
    {
        self.run(query, target, &[], None)
    }

    /// Optimal global alignment in which query symbol `i` is paired with
    /// target symbol `j` for every `(i, j)` in `anchors` (1-based, strictly
    /// increasing in both coordinates).
    pub fn align_anchored<S>(
        &self,
        query: &[S],
        target: &[S],
        anchors: &[(usize, usize)],
    ) -> AlignResult<AlignmentReport>
    where
        S: PartialEq + Sync,
        M: SubstitutionMatrix<S> + Sync,
    {
        self.run(query, target, anchors, None)
    }

    /// Like [`align_anchored`](Self::align_anchored), giving up with
    /// [`AlignError::Cancelled`] once `cancel` is set. The flag is checked
    /// between passes and before each rectangle.
    pub fn align_with_cancel<S>(
        &self,
        query: &[S],
        target: &[S],
        anchors: &[(usize, usize)],
        cancel: &AtomicBool,
    ) -> AlignResult<AlignmentReport>
    where
        S: PartialEq + Sync,
        M: SubstitutionMatrix<S> + Sync,
    {
        self.run(query, target, anchors, Some(cancel))
    }

    fn run<S>(
        &self,
        query: &[S],
        target: &[S],
        fixed: &[(usize, usize)],
        cancel: Option<&AtomicBool>,
    ) -> AlignResult<AlignmentReport>
    where
        S: PartialEq + Sync,
        M: SubstitutionMatrix<S> + Sync,
    {
        let started = Instant::now();
        self.model.check::<S>(query.len(), target.len())?;
        if query.is_empty() && target.is_empty() {
            return Err(AlignError::EmptySequences);
        }
        let config = self.config.normalized();
        let cancelled = || cancel.map_or(false, |flag| flag.load(Ordering::Relaxed));

        let mut committed = fixed_anchors(fixed, query.len(), target.len())?;
        let mut active = split(&Rectangle::full(query.len(), target.len()), &committed)?;
        let mut segments: BTreeMap<(usize, usize), Segment> = BTreeMap::new();
        let mut stats = RefineStats::default();

        let engine = QuadraticEngine::new(query, target, &self.model);
        let cutter = AnchoredAligner::new(query, target, &self.model);

        while !active.is_empty() {
            if cancelled() {
                return Err(AlignError::Cancelled { pass: stats.passes });
            }
            stats.peak_active = stats.peak_active.max(active.len());
            let pass = stats.passes;
            let at_ceiling = pass >= config.max_passes;

            let resolve = |rect: &Rectangle| -> AlignResult<Outcome> {
                if cancelled() {
                    return Err(AlignError::Cancelled { pass });
                }
                if rect.is_leaf(config.leaf_cells) {
                    return Ok(Outcome::Leaf(*rect, engine.solve(rect)?));
                }
                if at_ceiling {
                    return Ok(Outcome::Fallback(*rect, engine.solve(rect)?));
                }
                let anchors = cutter.compute_cut_points(rect, config.cuts_per_section)?;
                if anchors.is_empty() {
                    return Ok(Outcome::Fallback(*rect, engine.solve(rect)?));
                }
                let children = split(rect, &anchors)?;
                Ok(Outcome::Split(anchors, children))
            };

            let outcomes: Vec<AlignResult<Outcome>> = if config.parallel {
                active.par_iter().map(resolve).collect()
            } else {
                active.iter().map(resolve).collect()
            };

            let (mut leaves, mut cut, mut placed) = (0, 0, 0);
            let mut next = Vec::new();
            for outcome in outcomes {
                match outcome? {
                    Outcome::Leaf(rect, segment) => {
                        leaves += 1;
                        stats.largest_leaf_cells = stats.largest_leaf_cells.max(rect.cells());
                        segments.insert(rect.position(), segment);
                    }
                    Outcome::Fallback(rect, segment) => {
                        log::warn!(
                            "{} ({} cells) still oversized after {} passes; solving in quadratic space",
                            rect,
                            rect.cells(),
                            pass
                        );
                        stats.fallback_rectangles += 1;
                        segments.insert(rect.position(), segment);
                    }
                    Outcome::Split(anchors, children) => {
                        cut += 1;
                        placed += anchors.len();
                        committed.extend(anchors);
                        next.extend(children);
                    }
                }
            }

            stats.leaves += leaves;
            if cut > 0 {
                stats.passes += 1;
            }
            log::debug!(
                "pass {}: {} active, {} leaves, {} split, {} anchors",
                pass + 1,
                active.len(),
                leaves,
                cut,
                placed
            );
            active = next;
        }

        committed.sort_by_key(|anchor| (anchor.query, anchor.target));
        stats.anchors = committed.len();

        let mut score = 0;
        let mut ops = Vec::with_capacity(query.len() + target.len());
        for segment in segments.into_values() {
            score += segment.score;
            ops.extend(segment.ops);
        }
        stats.elapsed = started.elapsed();

        Ok(AlignmentReport {
            alignment: Alignment {
                score,
                ops,
                query_len: query.len(),
                target_len: target.len(),
            },
            anchors: committed,
            stats,
            max_score: (self.model.self_score(query) + self.model.self_score(target)) / 2,
            min_score: -(self.model.gap_penalty(query.len()) + self.model.gap_penalty(target.len())),
        })
    }
}

/// Convert caller anchors to path points, checking bounds and order.
fn fixed_anchors(fixed: &[(usize, usize)], query_len: usize, target_len: usize) -> AlignResult<Vec<Anchor>> {
    let mut anchors: Vec<Anchor> = Vec::with_capacity(fixed.len());
    for &(i, j) in fixed {
        let anchor = Anchor::new(i, j, Step::Diagonal);
        if i == 0 || j == 0 || i > query_len || j > target_len {
            return Err(AlignError::AnchorOutOfBounds {
                anchor,
                query_len,
                target_len,
            });
        }
        if let Some(&previous) = anchors.last() {
            if i <= previous.query || j <= previous.target {
                return Err(AlignError::AnchorsCross { previous, next: anchor });
            }
        }
        anchors.push(anchor);
    }
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::align_quadratic;
    use crate::scoring::{GapPenalty, MatchMismatch, ScoreTable};
    use crate::types::EditOp;

    fn refiner(config: AlignerConfig) -> RecursiveRefiner<MatchMismatch> {
        RecursiveRefiner::new(
            ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(2, 1)),
            config,
        )
    }

    #[test]
    fn test_single_symbols_are_one_leaf() {
        let report = refiner(AlignerConfig::default()).align(b"A", b"A").unwrap();
        assert_eq!(report.stats.passes, 0);
        assert_eq!(report.stats.leaves, 1);
        assert_eq!(report.score(), 1);
        assert!(report.anchors.is_empty());
    }

    #[test]
    fn test_small_leaves_match_quadratic() {
        let config = AlignerConfig::default().with_leaf_cells(4).with_cuts_per_section(3);
        let aligner = refiner(config);
        let (q, t) = (b"GATTACAGATTACAGGT".as_slice(), b"GCATGCUGCATTACAG".as_slice());
        let report = aligner.align(q, t).unwrap();
        let baseline = align_quadratic(q, t, aligner.model()).unwrap();

        assert_eq!(report.score(), baseline.score);
        assert_eq!(aligner.model().score_ops(q, t, &report.alignment.ops).unwrap(), report.score());
        assert!(report.stats.passes > 1);
        assert!(report.stats.largest_leaf_cells <= 4);
        assert_eq!(report.stats.fallback_rectangles, 0);
    }

    #[test]
    fn test_empty_query() {
        let aligner = refiner(AlignerConfig::default().with_leaf_cells(4));
        let report = aligner.align(b"", b"ACGTACGTAC").unwrap();
        assert_eq!(report.score(), -aligner.model().gap_penalty(10));
        assert!(report.alignment.ops.iter().all(|&op| op == EditOp::GapInQuery));
        assert_eq!(report.alignment.gap_runs(), 1);
    }

    #[test]
    fn test_large_gap_costs_across_passes() {
        let model = ScoringModel::new(MatchMismatch::new(1, -1), GapPenalty::affine(500_000, 500_000));
        let aligner = RecursiveRefiner::new(model, AlignerConfig::default().with_leaf_cells(64));
        let target = [b'A'; 2200];
        let report = aligner.align(b"", &target).unwrap();
        assert_eq!(report.score(), -1_100_000_000);
        assert_eq!(report.alignment.gap_runs(), 1);
        assert!(report.stats.passes > 0);
        assert_eq!(report.min_score, -1_100_000_000);
    }

    #[test]
    fn test_wide_rectangle_ties_follow_grid_orientation() {
        // Cut by columns: the co-optimal path found differs from the
        // row-major traceback.
        let aligner = refiner(AlignerConfig::default().with_leaf_cells(8).with_cuts_per_section(1));
        let (q, t) = (b"AC".as_slice(), b"AACCA".as_slice());
        let report = aligner.align(q, t).unwrap();
        let baseline = align_quadratic(q, t, aligner.model()).unwrap();

        assert_eq!(report.score(), -3);
        assert_eq!(baseline.score, -3);
        assert_eq!(report.anchors, vec![Anchor::new(1, 2, Step::Diagonal)]);
        assert_eq!(report.alignment.cigar(), "1D2=2D");
        assert_eq!(baseline.cigar(), "1=2D1=1D");
    }

    #[test]
    fn test_soft_masked_bases_reported_as_matches() {
        let model = ScoringModel::new(ScoreTable::nucleotide(1, -1), GapPenalty::affine(2, 1));
        let aligner = RecursiveRefiner::new(model, AlignerConfig::default().with_leaf_cells(4));
        let report = aligner.align(b"acgtNacgt", b"ACGTNACGT").unwrap();
        assert_eq!(report.score(), 7);
        assert_eq!(report.alignment.cigar(), "4=1X4=");
        assert_eq!(report.alignment.matches(), 8);
    }

    #[test]
    fn test_both_empty_rejected() {
        let empty: &[u8] = b"";
        let result = refiner(AlignerConfig::default()).align(empty, empty);
        assert!(matches!(result, Err(AlignError::EmptySequences)));
    }

    #[test]
    fn test_pass_ceiling_falls_back() {
        let (q, t) = (b"ACGTTGCAACGTAGCA".as_slice(), b"ACGTGCAACGTTGCAA".as_slice());
        let baseline = align_quadratic(q, t, refiner(AlignerConfig::default()).model()).unwrap();

        let direct = refiner(AlignerConfig::default().with_leaf_cells(4).with_max_passes(0))
            .align(q, t)
            .unwrap();
        assert_eq!(direct.stats.passes, 0);
        assert_eq!(direct.stats.fallback_rectangles, 1);
        assert_eq!(direct.score(), baseline.score);

        let one = refiner(AlignerConfig::default().with_leaf_cells(4).with_cuts_per_section(1).with_max_passes(1))
            .align(q, t)
            .unwrap();
        assert_eq!(one.stats.passes, 1);
        assert!(one.stats.fallback_rectangles > 0);
        assert_eq!(one.score(), baseline.score);
    }

    #[test]
    fn test_zero_cuts_clamped() {
        let (q, t) = (b"ACGTACGTACGT".as_slice(), b"ACGTTACGTACG".as_slice());
        let report = refiner(AlignerConfig::default().with_leaf_cells(4).with_cuts_per_section(0))
            .align(q, t)
            .unwrap();
        let baseline = align_quadratic(q, t, refiner(AlignerConfig::default()).model()).unwrap();
        assert_eq!(report.score(), baseline.score);
    }

    #[test]
    fn test_fixed_anchor_is_honoured() {
        let aligner = refiner(AlignerConfig::default());
        let report = aligner.align_anchored(b"AAAC", b"CAAA", &[(4, 1)]).unwrap();
        assert_eq!(report.alignment.cigar(), "3I1=3D");
        assert_eq!(report.score(), 1 - 2 * aligner.model().gap_penalty(3));
        assert_eq!(report.anchors, vec![Anchor::new(4, 1, Step::Diagonal)]);
    }

    #[test]
    fn test_fixed_anchors_validated() {
        let aligner = refiner(AlignerConfig::default());
        let (q, t) = (b"ACGT".as_slice(), b"ACGT".as_slice());
        assert!(matches!(
            aligner.align_anchored(q, t, &[(0, 1)]),
            Err(AlignError::AnchorOutOfBounds { .. })
        ));
        assert!(matches!(
            aligner.align_anchored(q, t, &[(2, 5)]),
            Err(AlignError::AnchorOutOfBounds { .. })
        ));
        assert!(matches!(
            aligner.align_anchored(q, t, &[(2, 2), (3, 2)]),
            Err(AlignError::AnchorsCross { .. })
        ));
    }

    #[test]
    fn test_cancelled_before_first_pass() {
        let cancel = AtomicBool::new(true);
        let result = refiner(AlignerConfig::default()).align_with_cancel(b"ACGT", b"ACGT", &[], &cancel);
        assert!(matches!(result, Err(AlignError::Cancelled { pass: 0 })));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let q = b"TTGACCGATAGGCTAACGTTAGCATCGGATCAAGGCTTACGATCGATCGGGA".as_slice();
        let t = b"TTGACGATAGGCTTAACGTAGCATCGGTCAAGGCTACGATCGATTCGGGA".as_slice();
        let config = AlignerConfig::default().with_leaf_cells(16).with_cuts_per_section(4);
        let parallel = refiner(config.clone().with_parallel(true)).align(q, t).unwrap();
        let sequential = refiner(config.with_parallel(false)).align(q, t).unwrap();
        assert_eq!(parallel.alignment, sequential.alignment);
        assert_eq!(parallel.anchors, sequential.anchors);
    }

    #[test]
    fn test_similarity_bounds() {
        let aligner = refiner(AlignerConfig::default());
        let same = aligner.align(b"ACGTACGT", b"ACGTACGT").unwrap();
        assert_eq!(same.similarity(), 1.0);
        assert_eq!(same.distance(), 0.0);

        let apart = aligner.align(b"AAAA", b"CCCC").unwrap();
        assert!(apart.similarity() < 1.0);
        assert!(apart.similarity() >= 0.0);
    }
}
