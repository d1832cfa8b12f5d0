use std::collections::HashSet;

use mzpeaks::{prelude::*, Tolerance};

use crate::parameters::MsRefSearchParameters;
use crate::result::{MatchResult, ScoreType, NOT_COMPUTED};
use crate::spectrum::{base_peak_intensity, to_peak_set, SpectrumPeak};
use crate::tolerance::mass_tolerance_at;

use super::MatchScore;

/// The damping factor applied to dot products computed against a reference with
/// very few peaks, where a high similarity is easy to reach by chance.
pub fn peak_count_penalty(reference_peak_count: usize) -> ScoreType {
    match reference_peak_count {
        0 => 0.0,
        1 => 0.75,
        2 => 0.88,
        3 => 0.94,
        4 => 0.97,
        _ => 1.0,
    }
}

/// Restrict a peak list to the fragments that take part in spectral scoring.
///
/// Peaks are kept when they lie inside `[mass_range_begin, mass_range_end]`, are no
/// heavier than the precursor plus the MS2 tolerance, and reach at least
/// `relative_abundance_cutoff` percent of the base peak. A non-positive `precursor_mz`
/// disables the precursor cap.
pub fn preprocess_spectrum(
    peaks: &[SpectrumPeak],
    precursor_mz: f64,
    params: &MsRefSearchParameters,
) -> Vec<SpectrumPeak> {
    let base_peak = base_peak_intensity(peaks);
    let intensity_threshold = base_peak * params.relative_abundance_cutoff / 100.0;
    let upper_mz = if precursor_mz > 0.0 {
        (precursor_mz + mass_tolerance_at(precursor_mz, params.ms2_tolerance))
            .min(params.mass_range_end)
    } else {
        params.mass_range_end
    };

    peaks
        .iter()
        .filter(|p| {
            p.mz >= params.mass_range_begin
                && p.mz <= upper_mz
                && p.intensity > 0.0
                && p.intensity >= intensity_threshold
        })
        .cloned()
        .collect()
}

/// MS/MS similarity between a query spectrum and a reference spectrum.
///
/// Each reference peak is paired with the most intense experimental peak within the
/// MS2 tolerance. From those pairs:
///
/// ```math
/// \begin{split}
///     \text{weighted} &= \frac{(\sum_i mz_i \sqrt{e_i r_i})^2}{\sum_j mz_j e_j \sum_k mz_k r_k} \\
///     \text{simple} &= \frac{(\sum_i \sqrt{e_i r_i})^2}{\sum_j e_j \sum_k r_k}
/// \end{split}
/// ```
///
/// The reverse dot product is the weighted form with the experimental norm taken only
/// over the experimental peaks that were matched, so unexplained query signal is not
/// penalized.
///
/// All metrics are [`NOT_COMPUTED`] when either spectrum is missing or the reference
/// has no peak left after preprocessing. A query spectrum that is emptied by
/// preprocessing scores zero instead.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumMatch {
    pub weighted_dot_product: ScoreType,
    pub simple_dot_product: ScoreType,
    pub reverse_dot_product: ScoreType,
    pub matched_peaks_percentage: ScoreType,
    pub matched_peaks_count: i32,
    /// The fragment comments of the matched reference peaks
    pub matched_annotations: Vec<String>,
}

impl Default for SpectrumMatch {
    fn default() -> Self {
        Self::not_computed()
    }
}

impl SpectrumMatch {
    pub fn not_computed() -> Self {
        Self {
            weighted_dot_product: NOT_COMPUTED,
            simple_dot_product: NOT_COMPUTED,
            reverse_dot_product: NOT_COMPUTED,
            matched_peaks_percentage: NOT_COMPUTED,
            matched_peaks_count: -1,
            matched_annotations: Vec::new(),
        }
    }

    fn zero() -> Self {
        Self {
            weighted_dot_product: 0.0,
            simple_dot_product: 0.0,
            reverse_dot_product: 0.0,
            matched_peaks_percentage: 0.0,
            matched_peaks_count: 0,
            matched_annotations: Vec::new(),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.matched_peaks_count >= 0
    }

    #[tracing::instrument(skip_all, level = "trace")]
    pub fn calculate(
        query: &[SpectrumPeak],
        query_precursor_mz: f64,
        reference: &[SpectrumPeak],
        reference_precursor_mz: f64,
        params: &MsRefSearchParameters,
    ) -> Self {
        if query.is_empty() || reference.is_empty() {
            return Self::not_computed();
        }
        let reference = preprocess_spectrum(reference, reference_precursor_mz, params);
        if reference.is_empty() {
            return Self::not_computed();
        }
        let query = preprocess_spectrum(query, query_precursor_mz, params);
        if query.is_empty() {
            return Self::zero();
        }

        let experimental = to_peak_set(query.iter());

        let mut weighted_numerator = 0.0f64;
        let mut simple_numerator = 0.0f64;
        let mut matched_count = 0usize;
        let mut matched_experimental = HashSet::new();
        let mut matched_annotations = Vec::new();

        for ref_peak in reference.iter() {
            let tol = Tolerance::Da(mass_tolerance_at(ref_peak.mz, params.ms2_tolerance));
            let best = experimental
                .all_peaks_for(ref_peak.mz, tol)
                .iter()
                .max_by(|a, b| a.intensity().total_cmp(&b.intensity()));
            if let Some(best) = best {
                let shared = (best.intensity() as f64 * ref_peak.intensity as f64).sqrt();
                weighted_numerator += ref_peak.mz * shared;
                simple_numerator += shared;
                matched_count += 1;
                matched_experimental.insert(best.index);
                if let Some(comment) = ref_peak.comment.as_ref() {
                    matched_annotations.push(comment.clone());
                }
            }
        }

        let experimental_weighted_norm: f64 = experimental
            .iter()
            .map(|p| p.mz() * p.intensity() as f64)
            .sum();
        let experimental_simple_norm: f64 =
            experimental.iter().map(|p| p.intensity() as f64).sum();
        let matched_weighted_norm: f64 = experimental
            .iter()
            .filter(|p| matched_experimental.contains(&p.index))
            .map(|p| p.mz() * p.intensity() as f64)
            .sum();
        let reference_weighted_norm: f64 =
            reference.iter().map(|p| p.mz * p.intensity as f64).sum();
        let reference_simple_norm: f64 = reference.iter().map(|p| p.intensity as f64).sum();

        let ratio = |numerator: f64, a: f64, b: f64| -> ScoreType {
            let denominator = a * b;
            if denominator <= 0.0 {
                0.0
            } else {
                ((numerator * numerator) / denominator).clamp(0.0, 1.0) as ScoreType
            }
        };

        let penalty = peak_count_penalty(reference.len());
        let weighted_dot_product = ratio(
            weighted_numerator,
            experimental_weighted_norm,
            reference_weighted_norm,
        ) * penalty;
        let reverse_dot_product = ratio(
            weighted_numerator,
            matched_weighted_norm,
            reference_weighted_norm,
        ) * penalty;
        let simple_dot_product = ratio(
            simple_numerator,
            experimental_simple_norm,
            reference_simple_norm,
        );

        Self {
            weighted_dot_product,
            simple_dot_product,
            reverse_dot_product,
            matched_peaks_percentage: matched_count as ScoreType / reference.len() as ScoreType,
            matched_peaks_count: matched_count as i32,
            matched_annotations,
        }
    }
}

impl MatchScore for SpectrumMatch {
    fn assign(&self, result: &mut MatchResult) {
        result.weighted_dot_product = self.weighted_dot_product;
        result.simple_dot_product = self.simple_dot_product;
        result.reverse_dot_product = self.reverse_dot_product;
        result.matched_peaks_percentage = self.matched_peaks_percentage;
        result.matched_peaks_count = self.matched_peaks_count;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reference() -> Vec<SpectrumPeak> {
        vec![
            SpectrumPeak::new(86.0964, 120.0),
            SpectrumPeak::new(104.1070, 300.0),
            SpectrumPeak::new(184.0733, 999.0),
            SpectrumPeak::new(478.3292, 80.0),
            SpectrumPeak::new(496.3398, 240.0),
        ]
    }

    #[test]
    fn test_identical_spectra() {
        let params = MsRefSearchParameters::default();
        let spec = reference();
        let m = SpectrumMatch::calculate(&spec, 496.34, &spec, 496.34, &params);
        assert!((m.weighted_dot_product - 1.0).abs() < 1e-5);
        assert!((m.simple_dot_product - 1.0).abs() < 1e-5);
        assert!((m.reverse_dot_product - 1.0).abs() < 1e-5);
        assert_eq!(m.matched_peaks_count, 5);
        assert!((m.matched_peaks_percentage - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_match_reverse_ignores_extra_peaks() {
        let params = MsRefSearchParameters::default();
        let mut query = reference();
        query.push(SpectrumPeak::new(250.0, 2000.0));
        let m = SpectrumMatch::calculate(&query, 496.34, &reference(), 496.34, &params);
        assert_eq!(m.matched_peaks_count, 5);
        assert!(m.weighted_dot_product < 0.9);
        assert!((m.reverse_dot_product - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sentinels() {
        let params = MsRefSearchParameters::default();
        let m = SpectrumMatch::calculate(&[], 496.34, &reference(), 496.34, &params);
        assert!(!m.is_computed());
        assert_eq!(m.weighted_dot_product, NOT_COMPUTED);
        let m = SpectrumMatch::calculate(&reference(), 496.34, &[], 496.34, &params);
        assert_eq!(m.matched_peaks_percentage, NOT_COMPUTED);

        // the whole query lies above the precursor, so nothing survives
        let query = vec![SpectrumPeak::new(900.0, 100.0)];
        let m = SpectrumMatch::calculate(&query, 496.34, &reference(), 496.34, &params);
        assert!(m.is_computed());
        assert_eq!(m.weighted_dot_product, 0.0);
        assert_eq!(m.matched_peaks_count, 0);
    }

    #[test]
    fn test_penalty_and_annotations() {
        let params = MsRefSearchParameters::default();
        let reference = vec![
            SpectrumPeak::with_comment(184.0733, 999.0, "class"),
            SpectrumPeak::new(496.3398, 240.0),
        ];
        let m = SpectrumMatch::calculate(&reference, 496.34, &reference, 496.34, &params);
        assert!((m.weighted_dot_product - 0.88).abs() < 1e-5);
        assert!((m.simple_dot_product - 1.0).abs() < 1e-5);
        assert_eq!(m.matched_annotations, vec!["class".to_string()]);
    }

    #[test]
    fn test_preprocess() {
        let mut params = MsRefSearchParameters::default();
        params.relative_abundance_cutoff = 5.0;
        params.mass_range_begin = 90.0;
        let peaks = preprocess_spectrum(&reference(), 480.0, &params);
        let mzs: Vec<f64> = peaks.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![104.1070, 184.0733, 478.3292]);
    }
}
