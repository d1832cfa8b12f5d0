//! The aggregate outcome of matching one query against one reference
use serde::{Deserialize, Serialize};

use crate::parameters::SourceType;

pub type ScoreType = f32;

/// The sentinel value of a metric that could not be computed, e.g. a spectral
/// similarity when either side has no spectrum. Such a metric is skipped, never
/// treated as a failure.
pub const NOT_COMPUTED: ScoreType = -1.0;

/// Test whether a metric holds a real value rather than [`NOT_COMPUTED`]
#[inline]
pub fn is_computed(score: ScoreType) -> bool {
    score >= 0.0
}

/// Every sub-score, validity flag and identity field describing how well a query
/// matched a single reference.
///
/// Results carry the reference's library ID, name and InChIKey so that they can be
/// traced back to the original entry after serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchResult {
    pub name: String,
    pub library_id: u32,
    pub inchikey: String,

    pub total_score: ScoreType,
    pub weighted_dot_product: ScoreType,
    pub simple_dot_product: ScoreType,
    pub reverse_dot_product: ScoreType,
    pub matched_peaks_percentage: ScoreType,
    pub matched_peaks_count: i32,
    pub mass_similarity: ScoreType,
    pub isotope_similarity: ScoreType,
    pub rt_similarity: ScoreType,
    pub ccs_similarity: ScoreType,

    pub is_precursor_mz_match: bool,
    pub is_spectrum_match: bool,
    pub is_rt_match: bool,
    pub is_ccs_match: bool,
    pub is_reference_matched: bool,
    pub is_annotation_suggested: bool,

    pub is_lipid_class_match: bool,
    pub is_lipid_chains_match: bool,
    pub is_lipid_position_match: bool,
    pub is_lipid_double_bond_position_match: bool,
    pub is_other_lipid_match: bool,

    pub source: SourceType,
    pub annotator_id: String,
    pub priority: i32,
}

impl Default for MatchResult {
    fn default() -> Self {
        Self {
            name: String::new(),
            library_id: 0,
            inchikey: String::new(),
            total_score: 0.0,
            weighted_dot_product: NOT_COMPUTED,
            simple_dot_product: NOT_COMPUTED,
            reverse_dot_product: NOT_COMPUTED,
            matched_peaks_percentage: NOT_COMPUTED,
            matched_peaks_count: -1,
            mass_similarity: NOT_COMPUTED,
            isotope_similarity: NOT_COMPUTED,
            rt_similarity: NOT_COMPUTED,
            ccs_similarity: NOT_COMPUTED,
            is_precursor_mz_match: false,
            is_spectrum_match: false,
            is_rt_match: false,
            is_ccs_match: false,
            is_reference_matched: false,
            is_annotation_suggested: false,
            is_lipid_class_match: false,
            is_lipid_chains_match: false,
            is_lipid_position_match: false,
            is_lipid_double_bond_position_match: false,
            is_other_lipid_match: false,
            source: SourceType::None,
            annotator_id: String::new(),
            priority: 0,
        }
    }
}

impl MatchResult {
    pub fn new(
        name: impl Into<String>,
        library_id: u32,
        inchikey: impl Into<String>,
        annotator_id: impl Into<String>,
        priority: i32,
        source: SourceType,
    ) -> Self {
        Self {
            name: name.into(),
            library_id,
            inchikey: inchikey.into(),
            annotator_id: annotator_id.into(),
            priority,
            source,
            ..Default::default()
        }
    }

    /// Whether any MS/MS similarity was computed for this result
    pub fn has_spectrum_scores(&self) -> bool {
        is_computed(self.weighted_dot_product)
            || is_computed(self.simple_dot_product)
            || is_computed(self.reverse_dot_product)
            || is_computed(self.matched_peaks_percentage)
    }
}

/// The identification status a feature ends up with after annotation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationState {
    #[default]
    Unknown,
    Suggested,
    ReferenceMatched,
}

/// An append-only collection of the [`MatchResult`]s attached to one feature.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResultContainer {
    results: Vec<MatchResult>,
}

impl MatchResultContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: MatchResult) {
        self.results.push(result);
    }

    pub fn add_results<I: IntoIterator<Item = MatchResult>>(&mut self, results: I) {
        self.results.extend(results);
    }

    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn best_where<F: Fn(&MatchResult) -> bool>(&self, predicate: F) -> Option<&MatchResult> {
        let mut best: Option<&MatchResult> = None;
        for result in self.results.iter().filter(|r| predicate(r)) {
            match best {
                Some(current) if current.total_score >= result.total_score => {}
                _ => best = Some(result),
            }
        }
        best
    }

    /// The result chosen to describe the feature's identity: the highest scoring
    /// reference-matched result, or failing that the highest scoring suggested
    /// result. The earliest attached result wins a tie.
    pub fn representative(&self) -> Option<&MatchResult> {
        self.best_where(|r| r.is_reference_matched)
            .or_else(|| self.best_where(|r| r.is_annotation_suggested))
    }

    pub fn state(&self) -> AnnotationState {
        match self.representative() {
            Some(r) if r.is_reference_matched => AnnotationState::ReferenceMatched,
            Some(_) => AnnotationState::Suggested,
            None => AnnotationState::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.representative().is_none()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchResult> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a MatchResultContainer {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
