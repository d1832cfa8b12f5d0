use crate::result::{MatchResult, ScoreType, NOT_COMPUTED};
use crate::spectrum::{IsotopePeak, C13_C12_DIFFERENCE};
use crate::tolerance::mass_tolerance_at;

use super::{gaussian_similarity, MatchScore};

/// Compare the relative abundances of two isotope envelopes.
///
/// Abundances are taken relative to each envelope's monoisotopic peak. For every
/// isotopologue `i >= 1` present in both envelopes the ratio disagreement is
///
/// ```math
/// d_i = \begin{cases}
///     |r^q_i - r^r_i| & r^q_i \le 1 \text{ and } r^r_i \le 1 \\
///     1 - \frac{\min(r^q_i, r^r_i)}{\max(r^q_i, r^r_i)} & \text{otherwise}
/// \end{cases}
/// ```
///
/// and is weighted by how well the query peak sits at the expected isotopic spacing
/// from the monoisotopic peak, `w_i`, so a misplaced peak contributes a full penalty:
/// `penalty += 1 - (1 - d_i) w_i`. The similarity is `max(0, 1 - penalty)`.
///
/// Returns [`NOT_COMPUTED`] when either envelope is empty or has no monoisotopic signal.
pub fn isotope_similarity(
    query: &[IsotopePeak],
    reference: &[IsotopePeak],
    charge: i32,
    tolerance: f64,
) -> ScoreType {
    let (Some(q0), Some(r0)) = (query.first(), reference.first()) else {
        return NOT_COMPUTED;
    };
    if q0.intensity <= 0.0 || r0.intensity <= 0.0 {
        return NOT_COMPUTED;
    }
    let charge = charge.unsigned_abs().max(1) as f64;
    let tolerance = mass_tolerance_at(q0.mz, tolerance);

    let mut penalty = 0.0;
    for (i, (q, r)) in query.iter().zip(reference.iter()).enumerate().skip(1) {
        let query_ratio = q.intensity / q0.intensity;
        let reference_ratio = r.intensity / r0.intensity;

        let difference = if query_ratio <= 1.0 && reference_ratio <= 1.0 {
            (query_ratio - reference_ratio).abs()
        } else {
            let (lo, hi) = if query_ratio < reference_ratio {
                (query_ratio, reference_ratio)
            } else {
                (reference_ratio, query_ratio)
            };
            if hi > 0.0 {
                1.0 - lo / hi
            } else {
                0.0
            }
        };

        let expected_spacing = (i as f64) * C13_C12_DIFFERENCE / charge;
        let weight = gaussian_similarity(q.mz - q0.mz, expected_spacing, tolerance) as f64;
        penalty += 1.0 - (1.0 - difference.min(1.0)) * weight;
    }

    (1.0 - penalty).max(0.0) as ScoreType
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotopeMatch {
    pub similarity: ScoreType,
}

impl IsotopeMatch {
    pub fn calculate(
        query: &[IsotopePeak],
        reference: &[IsotopePeak],
        charge: i32,
        tolerance: f64,
    ) -> Self {
        Self {
            similarity: isotope_similarity(query, reference, charge, tolerance),
        }
    }
}

impl MatchScore for IsotopeMatch {
    fn assign(&self, result: &mut MatchResult) {
        result.isotope_similarity = self.similarity;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn envelope(mz: f64, ratios: &[f64]) -> Vec<IsotopePeak> {
        ratios
            .iter()
            .enumerate()
            .map(|(i, r)| IsotopePeak::new(mz + i as f64 * C13_C12_DIFFERENCE, 1000.0 * r))
            .collect()
    }

    #[test]
    fn test_identical_envelopes() {
        let e = envelope(400.2, &[1.0, 0.22, 0.031]);
        let s = isotope_similarity(&e, &e, 1, 0.01);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ratio_disagreement() {
        let q = envelope(400.2, &[1.0, 0.30, 0.05]);
        let r = envelope(400.2, &[1.0, 0.22, 0.03]);
        let s = isotope_similarity(&q, &r, 1, 0.01);
        assert!((s - 0.9).abs() < 1e-4, "{s}");
    }

    #[test]
    fn test_misplaced_isotope_is_penalized() {
        let r = envelope(400.2, &[1.0, 0.22, 0.03]);
        let mut q = r.clone();
        q[1].mz += 0.2;
        let s = isotope_similarity(&q, &r, 1, 0.01);
        assert!(s < 0.05, "{s}");
    }

    #[test]
    fn test_not_computed() {
        let r = envelope(400.2, &[1.0, 0.22, 0.03]);
        assert_eq!(isotope_similarity(&[], &r, 1, 0.01), NOT_COMPUTED);
        let q = envelope(400.2, &[0.0, 0.22, 0.03]);
        assert_eq!(isotope_similarity(&q, &r, 1, 0.01), NOT_COMPUTED);
    }
}
