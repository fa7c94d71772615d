//! Scoring model: substitution scores plus an affine gap penalty.

use crate::error::{AlignError, AlignResult};
use crate::types::{EditOp, Score, Step, NEG_INF};
use serde::{Deserialize, Serialize};

// Default nucleotide scoring parameters
pub const DNA_MATCH: Score = 1;
pub const DNA_MISMATCH: Score = -1;
pub const DNA_GAP_OPEN: Score = 2;
pub const DNA_GAP_EXTEND: Score = 1;

/// Largest accepted magnitude of a single substitution score or gap cost.
pub const MAX_SCORE_MAGNITUDE: Score = i32::MAX as Score;

/// Affine gap cost. Both values are costs, subtracted from the score.
///
/// A gap run of length `n > 0` costs `open + extend * (n - 1)`; a linear
/// model has `open == extend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapPenalty {
    pub open: Score,
    pub extend: Score,
}

impl Default for GapPenalty {
    fn default() -> Self {
        Self {
            open: DNA_GAP_OPEN,
            extend: DNA_GAP_EXTEND,
        }
    }
}

impl GapPenalty {
    pub fn affine(open: Score, extend: Score) -> Self {
        Self { open, extend }
    }

    pub fn linear(cost: Score) -> Self {
        Self { open: cost, extend: cost }
    }

    pub fn is_linear(&self) -> bool {
        self.open == self.extend
    }

    /// Cost of a gap run of `len` symbols.
    pub fn penalty(&self, len: usize) -> Score {
        match len {
            0 => 0,
            n => self.open + self.extend * (n as Score - 1),
        }
    }

    /// Score delta for entering `to` right after `from`. Diagonal moves cost
    /// nothing here; their substitution score is added separately.
    #[inline]
    pub fn transition(&self, from: Step, to: Step) -> Score {
        match to {
            Step::Diagonal => 0,
            gap if gap == from => -self.extend,
            _ => -self.open,
        }
    }

    pub fn validate(&self) -> AlignResult<()> {
        if self.open < 0 || self.extend < 0 {
            return Err(AlignError::InvalidScoring(format!(
                "gap costs must be non-negative (open {}, extend {})",
                self.open, self.extend
            )));
        }
        if self.open > MAX_SCORE_MAGNITUDE || self.extend > MAX_SCORE_MAGNITUDE {
            return Err(AlignError::InvalidScoring(format!(
                "gap costs must not exceed {} (open {}, extend {})",
                MAX_SCORE_MAGNITUDE, self.open, self.extend
            )));
        }
        Ok(())
    }
}

/// Score for pairing a query symbol with a target symbol.
///
/// Implementations must be pure; the aligner calls them from several
/// threads at once. Scores must stay within [`MAX_SCORE_MAGNITUDE`].
pub trait SubstitutionMatrix<S> {
    fn score(&self, query: &S, target: &S) -> Score;

    /// Whether an aligned pair is reported as a match (`=`) rather than a
    /// mismatch (`X`). Plain equality unless the matrix folds symbols.
    fn is_match(&self, query: &S, target: &S) -> bool
    where
        S: PartialEq,
    {
        query == target
    }

    /// Largest absolute score [`score`](Self::score) can return, when known.
    fn max_magnitude(&self) -> Option<Score> {
        None
    }
}

impl<S, F> SubstitutionMatrix<S> for F
where
    F: Fn(&S, &S) -> Score,
{
    fn score(&self, query: &S, target: &S) -> Score {
        self(query, target)
    }
}

/// Identity scoring: one score for equal symbols, another for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchMismatch {
    pub match_score: Score,
    pub mismatch: Score,
}

impl Default for MatchMismatch {
    fn default() -> Self {
        Self {
            match_score: DNA_MATCH,
            mismatch: DNA_MISMATCH,
        }
    }
}

impl MatchMismatch {
    pub fn new(match_score: Score, mismatch: Score) -> Self {
        Self { match_score, mismatch }
    }
}

impl<S: PartialEq> SubstitutionMatrix<S> for MatchMismatch {
    fn score(&self, query: &S, target: &S) -> Score {
        if query == target {
            self.match_score
        } else {
            self.mismatch
        }
    }

    fn max_magnitude(&self) -> Option<Score> {
        Some(self.match_score.saturating_abs().max(self.mismatch.saturating_abs()))
    }
}

/// Substitution table over a byte alphabet.
///
/// Two symbols form a match when they share a match class. By default every
/// alphabet symbol is its own class; symbols outside the alphabet never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreTable {
    alphabet: Vec<u8>,
    index: [Option<u8>; 256],
    class: [Option<u8>; 256],
    scores: Vec<Score>,
    unknown: Score,
}

impl ScoreTable {
    /// Build from a square table whose rows and columns follow `alphabet`.
    /// Pairs involving a symbol outside the alphabet score `unknown`.
    pub fn from_rows(alphabet: &[u8], rows: &[Vec<Score>], unknown: Score) -> AlignResult<Self> {
        let size = alphabet.len();
        if size == 0 || size > 255 {
            return Err(AlignError::InvalidScoring(format!(
                "alphabet size {} outside 1..=255",
                size
            )));
        }
        if rows.len() != size || rows.iter().any(|row| row.len() != size) {
            return Err(AlignError::InvalidScoring(format!(
                "substitution table must be {}x{}",
                size, size
            )));
        }

        let mut index = [None; 256];
        for (i, &symbol) in alphabet.iter().enumerate() {
            if index[symbol as usize].is_some() {
                return Err(AlignError::InvalidScoring(format!(
                    "duplicate symbol '{}' in alphabet",
                    symbol as char
                )));
            }
            index[symbol as usize] = Some(i as u8);
        }

        Ok(Self {
            alphabet: alphabet.to_vec(),
            index,
            class: index,
            scores: rows.iter().flatten().copied().collect(),
            unknown,
        })
    }

    /// Case-insensitive nucleotide table over `ACGTN`. `N` scores and
    /// reports as a mismatch against everything, itself included.
    pub fn nucleotide(match_score: Score, mismatch: Score) -> Self {
        let upper = b"ACGTN";
        let mut alphabet = upper.to_vec();
        alphabet.extend(upper.iter().map(|c| c.to_ascii_lowercase()));

        let rows: Vec<Vec<Score>> = alphabet
            .iter()
            .map(|a| {
                alphabet
                    .iter()
                    .map(|b| {
                        let (a, b) = (a.to_ascii_uppercase(), b.to_ascii_uppercase());
                        if a == b && a != b'N' {
                            match_score
                        } else {
                            mismatch
                        }
                    })
                    .collect()
            })
            .collect();

        let mut table = Self::from_rows(&alphabet, &rows, mismatch).expect("nucleotide table is well formed");
        for &symbol in upper {
            table.class[symbol.to_ascii_lowercase() as usize] = table.class[symbol as usize];
        }
        table.class[b'N' as usize] = None;
        table.class[b'n' as usize] = None;
        table
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn get(&self, query: u8, target: u8) -> Score {
        match (self.index[query as usize], self.index[target as usize]) {
            (Some(q), Some(t)) => self.scores[q as usize * self.alphabet.len() + t as usize],
            _ => self.unknown,
        }
    }
}

impl SubstitutionMatrix<u8> for ScoreTable {
    fn score(&self, query: &u8, target: &u8) -> Score {
        self.get(*query, *target)
    }

    fn is_match(&self, query: &u8, target: &u8) -> bool {
        match (self.class[*query as usize], self.class[*target as usize]) {
            (Some(q), Some(t)) => q == t,
            _ => false,
        }
    }

    fn max_magnitude(&self) -> Option<Score> {
        self.scores
            .iter()
            .chain(std::iter::once(&self.unknown))
            .map(|score| score.saturating_abs())
            .max()
    }
}

/// Substitution scores and gap penalties for one alignment run.
#[derive(Debug, Clone)]
pub struct ScoringModel<M> {
    pub substitution: M,
    pub gaps: GapPenalty,
}

impl Default for ScoringModel<MatchMismatch> {
    fn default() -> Self {
        Self {
            substitution: MatchMismatch::default(),
            gaps: GapPenalty::default(),
        }
    }
}

impl<M> ScoringModel<M> {
    pub fn new(substitution: M, gaps: GapPenalty) -> Self {
        Self { substitution, gaps }
    }

    pub fn gap_penalty(&self, len: usize) -> Score {
        self.gaps.penalty(len)
    }

    /// Validate the model for a `query_len` x `target_len` problem.
    ///
    /// Every path score is bounded by `(query_len + target_len)` times the
    /// largest cost or substitution magnitude; that bound must stay well clear
    /// of the unreachable-cell score. Matrices that cannot report their
    /// magnitude are assumed to reach [`MAX_SCORE_MAGNITUDE`].
    pub fn check<S>(&self, query_len: usize, target_len: usize) -> AlignResult<()>
    where
        M: SubstitutionMatrix<S>,
    {
        self.gaps.validate()?;
        let substitution = self.substitution.max_magnitude().unwrap_or(MAX_SCORE_MAGNITUDE);
        if substitution > MAX_SCORE_MAGNITUDE {
            return Err(AlignError::InvalidScoring(format!(
                "substitution scores must stay within +/-{} (got {})",
                MAX_SCORE_MAGNITUDE, substitution
            )));
        }

        let step = substitution.max(self.gaps.open).max(self.gaps.extend) as i128;
        let columns = query_len as i128 + target_len as i128 + 1;
        let limit = -(NEG_INF as i128) / 2;
        if columns * step > limit {
            return Err(AlignError::InvalidScoring(format!(
                "scores of a {}x{} problem could exceed {} in magnitude",
                query_len, target_len, limit
            )));
        }
        Ok(())
    }

    /// Score of `ops` applied to `query` and `target`, computed directly from
    /// the edit script. Fails if the script does not consume both sequences
    /// exactly.
    pub fn score_ops<S>(&self, query: &[S], target: &[S], ops: &[EditOp]) -> AlignResult<Score>
    where
        M: SubstitutionMatrix<S>,
    {
        let (mut i, mut j) = (0, 0);
        let mut score = 0;
        let mut previous = Step::Diagonal;
        for &op in ops {
            let step = op.step();
            score += self.gaps.transition(previous, step);
            match step {
                Step::Diagonal => {
                    if i >= query.len() || j >= target.len() {
                        return Err(script_overrun(query.len(), target.len()));
                    }
                    score += self.substitution.score(&query[i], &target[j]);
                    i += 1;
                    j += 1;
                }
                Step::Vertical => {
                    if i >= query.len() {
                        return Err(script_overrun(query.len(), target.len()));
                    }
                    i += 1;
                }
                Step::Horizontal => {
                    if j >= target.len() {
                        return Err(script_overrun(query.len(), target.len()));
                    }
                    j += 1;
                }
            }
            previous = step;
        }

        if i != query.len() || j != target.len() {
            return Err(AlignError::InvalidScoring(format!(
                "edit script consumes {}x{} symbols of a {}x{} problem",
                i,
                j,
                query.len(),
                target.len()
            )));
        }
        Ok(score)
    }

    /// Score of a sequence aligned to itself without gaps.
    pub fn self_score<S>(&self, seq: &[S]) -> Score
    where
        M: SubstitutionMatrix<S>,
    {
        seq.iter().map(|s| self.substitution.score(s, s)).sum()
    }
}

fn script_overrun(query_len: usize, target_len: usize) -> AlignError {
    AlignError::InvalidScoring(format!(
        "edit script runs past the end of a {}x{} problem",
        query_len, target_len
    ))
}
