//! Derivation of the boolean match flags from scores and cutoffs.
//!
//! Every annotator kind owns a [`MatchValidator`] deciding what counts as a spectrum
//! match. The precursor, retention time and CCS checks are shared by all of them.
use std::fmt::Debug;

use crate::parameters::MsRefSearchParameters;
use crate::reference::{MoleculeReference, QueryFeature};
use crate::result::MatchResult;
use crate::tolerance::{mass_tolerance_at, SearchQuery};

/// Compound classes whose spectra are only trusted when the simple dot product
/// passes on its own, in addition to the usual lipid criteria.
pub const SIMPLE_DOT_REQUIRED_CLASSES: [&str; 2] = ["EtherTG", "EtherDG"];

/// Re-derive the precursor, retention time and CCS flags of `result` and report
/// whether every enabled one of those dimensions passes.
///
/// A dimension the query or the reference has no value for cannot fail, matching the
/// search filters of [`crate::search::SearchWindow`]. Its match flag stays `false`.
pub fn validate_dimensions(
    result: &mut MatchResult,
    query: &QueryFeature,
    reference: &MoleculeReference,
    params: &MsRefSearchParameters,
) -> bool {
    let tolerance = mass_tolerance_at(query.precursor_mz, params.ms1_tolerance);
    result.is_precursor_mz_match = (query.precursor_mz - reference.precursor_mz).abs() <= tolerance;

    let retention_times = comparable_retention_times(query, reference);
    result.is_rt_match = retention_times
        .is_some_and(|(q, r)| SearchQuery::new(q, params.rt_tolerance).contains(r));
    let cross_sections = comparable_ccs(query, reference);
    result.is_ccs_match = cross_sections
        .is_some_and(|(q, r)| SearchQuery::relative(r, params.ccs_tolerance).contains(q));

    let rt_ok = !params.is_use_time_for_annotation_filtering
        || retention_times.is_none()
        || result.is_rt_match;
    let ccs_ok = !params.is_use_ccs_for_annotation_filtering
        || cross_sections.is_none()
        || result.is_ccs_match;
    result.is_precursor_mz_match && rt_ok && ccs_ok
}

/// The query and reference retention times, when both are known
pub fn comparable_retention_times(
    query: &QueryFeature,
    reference: &MoleculeReference,
) -> Option<(f64, f64)> {
    match reference.retention_time {
        Some(rt) if rt >= 0.0 && query.retention_time >= 0.0 => Some((query.retention_time, rt)),
        _ => None,
    }
}

/// The query and reference CCS, when both are known
pub fn comparable_ccs(query: &QueryFeature, reference: &MoleculeReference) -> Option<(f64, f64)> {
    match (query.ccs, reference.ccs) {
        (Some(q), Some(r)) if q > 0.0 && r > 0.0 => Some((q, r)),
        _ => None,
    }
}

/// Set the final classification from the dimension check and the spectrum flag
fn classify(result: &mut MatchResult, dimensions_pass: bool) {
    result.is_reference_matched = dimensions_pass && result.is_spectrum_match;
    result.is_annotation_suggested = dimensions_pass && !result.is_spectrum_match;
}

fn passes_peak_count(result: &MatchResult, params: &MsRefSearchParameters) -> bool {
    result.matched_peaks_percentage >= params.matched_peaks_percentage_cutoff
        && result.matched_peaks_count >= params.minimum_spectrum_match
}

/// Decides whether a scored result constitutes a match.
pub trait MatchValidator: Debug + Send + Sync {
    /// Whether results validated by this policy are built with spectral metrics
    fn uses_spectrum(&self) -> bool {
        true
    }

    /// Decide whether the already computed spectral metrics pass.
    fn is_spectrum_match(
        &self,
        result: &MatchResult,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) -> bool;

    /// Re-derive every boolean flag of `result` against `params` without rescoring.
    fn validate(
        &self,
        result: &mut MatchResult,
        query: &QueryFeature,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) {
        let dimensions_pass = validate_dimensions(result, query, reference, params);
        result.is_spectrum_match = self.uses_spectrum()
            && result.has_spectrum_scores()
            && self.is_spectrum_match(result, reference, params);
        classify(result, dimensions_pass);
    }
}

/// Every dot product and the matched peak criteria must pass
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardValidator;

impl MatchValidator for StandardValidator {
    fn is_spectrum_match(
        &self,
        result: &MatchResult,
        _reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) -> bool {
        result.weighted_dot_product >= params.weighted_dot_product_cutoff
            && result.simple_dot_product >= params.simple_dot_product_cutoff
            && result.reverse_dot_product >= params.reverse_dot_product_cutoff
            && passes_peak_count(result, params)
    }
}

/// Any one dot product suffices, though the matched peak criteria must still pass.
/// Classes in [`SIMPLE_DOT_REQUIRED_CLASSES`] must additionally pass the simple dot
/// product cutoff.
#[derive(Debug, Default, Clone, Copy)]
pub struct LipidValidator;

impl MatchValidator for LipidValidator {
    fn is_spectrum_match(
        &self,
        result: &MatchResult,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) -> bool {
        let simple_ok = result.simple_dot_product >= params.simple_dot_product_cutoff;
        let any_dot = result.weighted_dot_product >= params.weighted_dot_product_cutoff
            || simple_ok
            || result.reverse_dot_product >= params.reverse_dot_product_cutoff;
        let class_ok = !SIMPLE_DOT_REQUIRED_CLASSES.contains(&reference.compound_class.as_str())
            || simple_ok;
        any_dot && class_ok && passes_peak_count(result, params)
    }
}

/// Reference lists without spectra: a match is decided by the precursor and the
/// enabled retention time and CCS dimensions alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDbValidator;

impl MatchValidator for TextDbValidator {
    fn uses_spectrum(&self) -> bool {
        false
    }

    fn is_spectrum_match(
        &self,
        _result: &MatchResult,
        _reference: &MoleculeReference,
        _params: &MsRefSearchParameters,
    ) -> bool {
        false
    }

    fn validate(
        &self,
        result: &mut MatchResult,
        query: &QueryFeature,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) {
        let dimensions_pass = validate_dimensions(result, query, reference, params);
        result.is_spectrum_match = false;
        result.is_reference_matched = dimensions_pass;
        result.is_annotation_suggested = false;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PeptideValidator;

impl MatchValidator for PeptideValidator {
    fn is_spectrum_match(
        &self,
        result: &MatchResult,
        _reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) -> bool {
        result.weighted_dot_product >= params.weighted_dot_product_cutoff
            && passes_peak_count(result, params)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scored(weighted: f32, simple: f32, reverse: f32, pct: f32, count: i32) -> MatchResult {
        let mut r = MatchResult::default();
        r.weighted_dot_product = weighted;
        r.simple_dot_product = simple;
        r.reverse_dot_product = reverse;
        r.matched_peaks_percentage = pct;
        r.matched_peaks_count = count;
        r
    }

    fn pair() -> (QueryFeature, MoleculeReference) {
        (
            QueryFeature::new(760.585, 5.0),
            MoleculeReference::new(1, "PC 16:0_18:1", 760.5851).with_retention_time(5.2),
        )
    }

    #[test]
    fn test_standard_is_and_combined() {
        let params = MsRefSearchParameters::default();
        let (q, r) = pair();
        let mut result = scored(0.8, 0.1, 0.9, 0.5, 4);
        StandardValidator.validate(&mut result, &q, &r, &params);
        assert!(result.is_precursor_mz_match);
        assert!(!result.is_spectrum_match);
        assert!(!result.is_reference_matched);
        assert!(result.is_annotation_suggested);

        let mut result = scored(0.8, 0.7, 0.9, 0.5, 4);
        StandardValidator.validate(&mut result, &q, &r, &params);
        assert!(result.is_reference_matched);
        assert!(!result.is_annotation_suggested);
    }

    #[test]
    fn test_lipid_is_or_combined() {
        let params = MsRefSearchParameters::default();
        let (q, r) = pair();
        let mut result = scored(0.1, 0.1, 0.9, 0.5, 4);
        LipidValidator.validate(&mut result, &q, &r, &params);
        assert!(result.is_spectrum_match);

        let mut result = scored(0.1, 0.1, 0.1, 0.5, 4);
        LipidValidator.validate(&mut result, &q, &r, &params);
        assert!(!result.is_spectrum_match);
        assert!(result.is_annotation_suggested);
    }

    #[test]
    fn test_ether_classes_need_simple_dot() {
        let params = MsRefSearchParameters::default();
        let (q, r) = pair();
        let r = r.with_compound_class("EtherTG");
        let mut result = scored(0.9, 0.1, 0.9, 0.5, 4);
        LipidValidator.validate(&mut result, &q, &r, &params);
        assert!(!result.is_spectrum_match);

        let mut result = scored(0.1, 0.2, 0.1, 0.5, 4);
        LipidValidator.validate(&mut result, &q, &r, &params);
        assert!(result.is_spectrum_match);
    }

    #[test]
    fn test_rt_filter_gating() {
        let (q, r) = pair();
        let params = MsRefSearchParameters::default().with_retention_time(0.1, true, false);
        let mut result = scored(0.9, 0.9, 0.9, 1.0, 4);
        StandardValidator.validate(&mut result, &q, &r, &params);
        assert!(!result.is_rt_match);
        assert!(!result.is_reference_matched);
        assert!(!result.is_annotation_suggested);

        let params = MsRefSearchParameters::default().with_retention_time(0.1, false, false);
        StandardValidator.validate(&mut result, &q, &r, &params);
        assert!(result.is_reference_matched);
    }

    #[test]
    fn test_missing_dimension_is_not_excluded() {
        let q = QueryFeature::new(760.585, 5.0).with_ccs(280.0);
        let r = MoleculeReference::new(1, "PC 16:0_18:1", 760.5851);
        let params = MsRefSearchParameters::default()
            .with_retention_time(0.1, true, false)
            .with_ccs(1.0, true, false);
        let mut result = scored(0.9, 0.9, 0.9, 1.0, 4);
        StandardValidator.validate(&mut result, &q, &r, &params);
        assert!(!result.is_rt_match);
        assert!(!result.is_ccs_match);
        assert!(result.is_reference_matched);

        let r = r.with_retention_time(-1.0).with_ccs(400.0);
        StandardValidator.validate(&mut result, &q, &r, &params);
        assert!(!result.is_reference_matched);
        assert!(!result.is_annotation_suggested);
    }

    #[test]
    fn test_text_db_ignores_spectrum() {
        let params = MsRefSearchParameters::default();
        let (q, r) = pair();
        let mut result = MatchResult::default();
        TextDbValidator.validate(&mut result, &q, &r, &params);
        assert!(result.is_reference_matched);
        assert!(!result.is_spectrum_match);
        assert!(!result.is_annotation_suggested);
    }

    #[test]
    fn test_missing_spectrum_is_suggested() {
        let params = MsRefSearchParameters::default();
        let (q, r) = pair();
        let mut result = MatchResult::default();
        PeptideValidator.validate(&mut result, &q, &r, &params);
        assert!(!result.has_spectrum_scores());
        assert!(!result.is_spectrum_match);
        assert!(result.is_annotation_suggested);
    }
}
