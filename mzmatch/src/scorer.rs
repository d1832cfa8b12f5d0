//! Composition of the individual metrics into one scored, validated [`MatchResult`]
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::calculators::{CcsMatch, IsotopeMatch, MassMatch, MatchScore, RetentionTimeMatch, SpectrumMatch};
use crate::lipid::{clear_lipid_annotation, refine_lipid_annotation, LipidNameCache};
use crate::parameters::{CollisionType, MsRefSearchParameters, SourceType, TargetOmics};
use crate::reference::{MoleculeReference, QueryFeature};
use crate::result::{is_computed, MatchResult, ScoreType};
use crate::validation::MatchValidator;

/// The factor applied to the total score of a reference without an InChIKey
pub const MISSING_INCHIKEY_PENALTY: ScoreType = 0.9;

/// The relative weight of each MS/MS metric inside the spectral term of the total score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumWeights {
    pub weighted_dot_product: ScoreType,
    pub simple_dot_product: ScoreType,
    pub reverse_dot_product: ScoreType,
    pub matched_peaks_percentage: ScoreType,
}

impl SpectrumWeights {
    pub const fn new(
        weighted_dot_product: ScoreType,
        simple_dot_product: ScoreType,
        reverse_dot_product: ScoreType,
        matched_peaks_percentage: ScoreType,
    ) -> Self {
        Self {
            weighted_dot_product,
            simple_dot_product,
            reverse_dot_product,
            matched_peaks_percentage,
        }
    }

    /// The weighting used for a target molecule kind and fragmentation method.
    ///
    /// Electron-activated spectra weight the matched peak percentage more heavily.
    pub fn for_domain(omics: TargetOmics, collision_type: CollisionType) -> Self {
        let ead = collision_type.is_electron_activated();
        match (omics, ead) {
            (TargetOmics::Metabolomics, false) => Self::new(1.0, 1.0, 1.0, 1.0),
            (TargetOmics::Metabolomics, true) => Self::new(1.0, 1.0, 1.0, 3.0),
            (TargetOmics::Lipidomics, false) => Self::new(1.0, 1.0, 2.0, 1.0),
            (TargetOmics::Lipidomics, true) => Self::new(1.0, 0.5, 1.0, 2.0),
            (TargetOmics::Proteomics, _) => Self::new(2.0, 1.0, 1.0, 1.0),
        }
    }

    /// The weighted average of the computed spectral metrics of `result`, if any.
    pub fn spectrum_term(&self, result: &MatchResult) -> Option<ScoreType> {
        let terms = [
            (result.weighted_dot_product, self.weighted_dot_product),
            (result.simple_dot_product, self.simple_dot_product),
            (result.reverse_dot_product, self.reverse_dot_product),
            (result.matched_peaks_percentage, self.matched_peaks_percentage),
        ];
        let (acc, weight) = terms
            .iter()
            .filter(|(score, w)| is_computed(*score) && *w > 0.0)
            .fold((0.0, 0.0), |(acc, total), (score, w)| {
                (acc + score * w, total + w)
            });
        if weight > 0.0 {
            Some(acc / weight)
        } else {
            None
        }
    }
}

impl Default for SpectrumWeights {
    fn default() -> Self {
        Self::for_domain(TargetOmics::default(), CollisionType::default())
    }
}

/// Compute the total score of `result` as the plain average of its applicable terms.
///
/// The terms are the mass similarity, the isotope similarity, the retention time and
/// CCS similarities when those are enabled for scoring, and the spectral term of
/// `weights`. Uncomputed terms are skipped, and a result without any applicable term
/// scores zero. A reference without an InChIKey is scaled by
/// [`MISSING_INCHIKEY_PENALTY`].
pub fn total_score(
    result: &MatchResult,
    params: &MsRefSearchParameters,
    weights: &SpectrumWeights,
) -> ScoreType {
    let mut terms: Vec<ScoreType> = Vec::with_capacity(5);
    if is_computed(result.mass_similarity) {
        terms.push(result.mass_similarity);
    }
    if is_computed(result.isotope_similarity) {
        terms.push(result.isotope_similarity);
    }
    if params.is_use_time_for_annotation_scoring && is_computed(result.rt_similarity) {
        terms.push(result.rt_similarity);
    }
    if params.is_use_ccs_for_annotation_scoring && is_computed(result.ccs_similarity) {
        terms.push(result.ccs_similarity);
    }
    if let Some(spectrum) = weights.spectrum_term(result) {
        terms.push(spectrum);
    }

    let score = if terms.is_empty() {
        0.0
    } else {
        terms.iter().sum::<ScoreType>() / terms.len() as ScoreType
    };

    if result.inchikey.trim().is_empty() {
        score * MISSING_INCHIKEY_PENALTY
    } else {
        score
    }
}

/// Scores a query against single references and validates the outcome.
///
/// The scorer owns the domain policy of one annotator: the spectral weighting, the
/// validation rules and, for lipid libraries, the name refinement.
#[derive(Debug, Clone)]
pub struct MsReferenceScorer {
    pub annotator_id: String,
    pub priority: i32,
    pub source: SourceType,
    pub omics: TargetOmics,
    pub collision_type: CollisionType,
    pub weights: SpectrumWeights,
    validator: Arc<dyn MatchValidator>,
    lipid_names: Option<Arc<LipidNameCache>>,
}

impl MsReferenceScorer {
    pub fn new(
        annotator_id: impl Into<String>,
        priority: i32,
        source: SourceType,
        omics: TargetOmics,
        collision_type: CollisionType,
        validator: Arc<dyn MatchValidator>,
    ) -> Self {
        Self {
            annotator_id: annotator_id.into(),
            priority,
            source,
            omics,
            collision_type,
            weights: SpectrumWeights::for_domain(omics, collision_type),
            validator,
            lipid_names: None,
        }
    }

    /// Enable lipid name refinement, memoizing parsed names in `cache`
    pub fn with_lipid_refinement(mut self, cache: Arc<LipidNameCache>) -> Self {
        self.lipid_names = Some(cache);
        self
    }

    pub fn validator(&self) -> &dyn MatchValidator {
        self.validator.as_ref()
    }

    pub fn lipid_names(&self) -> Option<&Arc<LipidNameCache>> {
        self.lipid_names.as_ref()
    }

    /// Compute every metric of `query` against `reference`, aggregate the total score
    /// and derive the match flags.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn score(
        &self,
        query: &QueryFeature,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) -> MatchResult {
        let mut result = MatchResult::new(
            reference.name.clone(),
            reference.scan_id,
            reference.inchikey.clone(),
            self.annotator_id.clone(),
            self.priority,
            self.source,
        );

        MassMatch::calculate(query.precursor_mz, reference.precursor_mz, params.ms1_tolerance)
            .assign(&mut result);
        IsotopeMatch::calculate(
            &query.isotopes,
            &reference.isotopes,
            query.charge,
            params.ms1_tolerance,
        )
        .assign(&mut result);
        RetentionTimeMatch::calculate(query.retention_time, reference.retention_time, params.rt_tolerance)
            .assign(&mut result);
        CcsMatch::calculate(query.ccs, reference.ccs, params.ccs_tolerance).assign(&mut result);

        let spectrum_match = if self.validator.uses_spectrum() {
            SpectrumMatch::calculate(
                &query.spectrum,
                query.precursor_mz,
                &reference.spectrum,
                reference.precursor_mz,
                params,
            )
        } else {
            SpectrumMatch::not_computed()
        };
        spectrum_match.assign(&mut result);

        result.total_score = total_score(&result, params, &self.weights);
        self.validator.validate(&mut result, query, reference, params);
        self.refine_lipid_name(&mut result, reference, &spectrum_match.matched_annotations);

        tracing::trace!(
            "Scored {} against {}: {:0.3}",
            query.precursor_mz,
            reference.name,
            result.total_score
        );
        result
    }

    /// Re-derive the match flags of `result` under `params` without rescoring.
    ///
    /// The lipid structure flags and name follow the new spectrum match flag.
    pub fn validate(
        &self,
        result: &mut MatchResult,
        query: &QueryFeature,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) {
        self.validator.validate(result, query, reference, params);
        if self.lipid_names.is_none() {
            return;
        }
        let annotations = if result.is_spectrum_match {
            SpectrumMatch::calculate(
                &query.spectrum,
                query.precursor_mz,
                &reference.spectrum,
                reference.precursor_mz,
                params,
            )
            .matched_annotations
        } else {
            Vec::new()
        };
        self.refine_lipid_name(result, reference, &annotations);
    }

    /// Only spectrum matches carry lipid structure evidence
    fn refine_lipid_name(
        &self,
        result: &mut MatchResult,
        reference: &MoleculeReference,
        matched_annotations: &[String],
    ) {
        let Some(cache) = self.lipid_names.as_ref() else {
            return;
        };
        if result.is_spectrum_match {
            refine_lipid_annotation(result, &reference.name, matched_annotations, cache);
        } else {
            clear_lipid_annotation(result, &reference.name);
        }
    }
}
