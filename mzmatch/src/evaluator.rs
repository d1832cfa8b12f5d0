//! Thresholding and selection over collections of scored results
use std::marker::PhantomData;

use crate::result::{MatchResult, ScoreType};

/// Classifies and ranks scored results of type `T`.
///
/// Implementors supply the primitive predicates, the selection operations are
/// derived from them.
pub trait MatchResultEvaluator<T> {
    fn satisfies_threshold(&self, result: &T) -> bool;

    fn is_reference_matched(&self, result: &T) -> bool;

    fn is_annotation_suggested(&self, result: &T) -> bool;

    fn score_of(&self, result: &T) -> ScoreType;

    /// Keep only the results meeting the minimum validity and score thresholds
    fn filter_by_threshold(&self, mut results: Vec<T>) -> Vec<T> {
        results.retain(|r| self.satisfies_threshold(r));
        results
    }

    fn select_reference_match_results(&self, mut results: Vec<T>) -> Vec<T> {
        results.retain(|r| self.is_reference_matched(r));
        results
    }

    /// The highest scoring result. The first of several equal scores wins.
    fn select_top_hit<'a>(&self, results: &'a [T]) -> Option<&'a T> {
        let mut best: Option<(&T, ScoreType)> = None;
        for result in results {
            let score = self.score_of(result);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((result, score)),
            }
        }
        best.map(|(r, _)| r)
    }

    /// Take the `n` best results by repeatedly removing the current top hit.
    ///
    /// Each round removes the first maximal element of what remains, so among equal
    /// scores the earlier input wins. This is not guaranteed to agree with the order of
    /// a stable sort for tied scores.
    fn select_top_n(&self, mut results: Vec<T>, n: usize) -> Vec<T> {
        let mut selected = Vec::with_capacity(n.min(results.len()));
        while selected.len() < n && !results.is_empty() {
            let mut best_index = 0;
            let mut best_score = self.score_of(&results[0]);
            for (i, result) in results.iter().enumerate().skip(1) {
                let score = self.score_of(result);
                if score > best_score {
                    best_index = i;
                    best_score = score;
                }
            }
            selected.push(results.remove(best_index));
        }
        selected
    }
}

/// Accepts results that are reference-matched or suggested and reach a minimum
/// total score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdEvaluator {
    pub total_score_cutoff: ScoreType,
}

impl ThresholdEvaluator {
    pub fn new(total_score_cutoff: ScoreType) -> Self {
        Self { total_score_cutoff }
    }
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl MatchResultEvaluator<MatchResult> for ThresholdEvaluator {
    fn satisfies_threshold(&self, result: &MatchResult) -> bool {
        (result.is_reference_matched || result.is_annotation_suggested)
            && result.total_score >= self.total_score_cutoff
    }

    fn is_reference_matched(&self, result: &MatchResult) -> bool {
        result.is_reference_matched
    }

    fn is_annotation_suggested(&self, result: &MatchResult) -> bool {
        result.is_annotation_suggested
    }

    fn score_of(&self, result: &MatchResult) -> ScoreType {
        result.total_score
    }
}

impl<T, E: MatchResultEvaluator<T> + ?Sized> MatchResultEvaluator<T> for &E {
    fn satisfies_threshold(&self, result: &T) -> bool {
        (**self).satisfies_threshold(result)
    }

    fn is_reference_matched(&self, result: &T) -> bool {
        (**self).is_reference_matched(result)
    }

    fn is_annotation_suggested(&self, result: &T) -> bool {
        (**self).is_annotation_suggested(result)
    }

    fn score_of(&self, result: &T) -> ScoreType {
        (**self).score_of(result)
    }
}

/// Serves an evaluator of `B` for values of `A` through a projection `A -> B`.
pub struct Contramap<E, F, B> {
    inner: E,
    projection: F,
    _b: PhantomData<fn() -> B>,
}

impl<E, F, B> Contramap<E, F, B> {
    pub fn new(inner: E, projection: F) -> Self {
        Self {
            inner,
            projection,
            _b: PhantomData,
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<A, B, E, F> MatchResultEvaluator<A> for Contramap<E, F, B>
where
    E: MatchResultEvaluator<B>,
    F: Fn(&A) -> &B,
{
    fn satisfies_threshold(&self, result: &A) -> bool {
        self.inner.satisfies_threshold((self.projection)(result))
    }

    fn is_reference_matched(&self, result: &A) -> bool {
        self.inner.is_reference_matched((self.projection)(result))
    }

    fn is_annotation_suggested(&self, result: &A) -> bool {
        self.inner.is_annotation_suggested((self.projection)(result))
    }

    fn score_of(&self, result: &A) -> ScoreType {
        self.inner.score_of((self.projection)(result))
    }
}

/// Adapts any evaluator of `B` into one over values that project onto `B`
pub trait EvaluatorExt<B>: MatchResultEvaluator<B> + Sized {
    fn contramap<A, F>(self, projection: F) -> Contramap<Self, F, B>
    where
        F: Fn(&A) -> &B,
    {
        Contramap::new(self, projection)
    }
}

impl<B, E: MatchResultEvaluator<B>> EvaluatorExt<B> for E {}
