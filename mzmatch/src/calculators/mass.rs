use crate::result::{MatchResult, ScoreType, NOT_COMPUTED};
use crate::tolerance::{mass_tolerance_at, SearchQuery};

use super::MatchScore;

/// A Gaussian-shaped similarity between two values, 1.0 when they coincide and
/// decaying with `tolerance` as the width:
///
/// ```math
/// s(a, b) = \exp\left(-\frac{1}{2}\left(\frac{a - b}{t}\right)^2\right)
/// ```
///
/// A non-positive tolerance degenerates to an exact equality test.
#[inline]
pub fn gaussian_similarity(actual: f64, reference: f64, tolerance: f64) -> ScoreType {
    let delta = actual - reference;
    if tolerance <= 0.0 {
        return if delta == 0.0 { 1.0 } else { 0.0 };
    }
    let z = delta / tolerance;
    (-0.5 * z * z).exp() as ScoreType
}

/// Precursor mass agreement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassMatch {
    pub similarity: ScoreType,
    pub mass_error: f64,
    pub tolerance: f64,
}

impl MassMatch {
    pub fn calculate(query_mz: f64, reference_mz: f64, tolerance: f64) -> Self {
        let tolerance = mass_tolerance_at(query_mz, tolerance);
        Self {
            similarity: gaussian_similarity(query_mz, reference_mz, tolerance),
            mass_error: query_mz - reference_mz,
            tolerance,
        }
    }

    /// Whether the precursor falls within the tolerance window
    pub fn is_match(&self) -> bool {
        self.mass_error.abs() <= self.tolerance
    }
}

impl MatchScore for MassMatch {
    fn assign(&self, result: &mut MatchResult) {
        result.mass_similarity = self.similarity;
    }
}

/// Retention time agreement. References without a retention time are not comparable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionTimeMatch {
    pub similarity: ScoreType,
    pub is_match: bool,
}

impl RetentionTimeMatch {
    pub fn calculate(query_rt: f64, reference_rt: Option<f64>, tolerance: f64) -> Self {
        match reference_rt {
            Some(rt) if rt >= 0.0 && query_rt >= 0.0 => Self {
                similarity: gaussian_similarity(query_rt, rt, tolerance),
                is_match: SearchQuery::new(query_rt, tolerance).contains(rt),
            },
            _ => Self {
                similarity: NOT_COMPUTED,
                is_match: false,
            },
        }
    }
}

impl MatchScore for RetentionTimeMatch {
    fn assign(&self, result: &mut MatchResult) {
        result.rt_similarity = self.similarity;
        result.is_rt_match = self.is_match;
    }
}

/// Collision cross section agreement, with the tolerance given in percent of the
/// reference CCS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcsMatch {
    pub similarity: ScoreType,
    pub is_match: bool,
}

impl CcsMatch {
    pub fn calculate(query_ccs: Option<f64>, reference_ccs: Option<f64>, percent: f64) -> Self {
        match (query_ccs, reference_ccs) {
            (Some(q), Some(r)) if q > 0.0 && r > 0.0 => {
                let window = SearchQuery::relative(r, percent);
                Self {
                    similarity: gaussian_similarity(q, r, window.tolerance),
                    is_match: window.contains(q),
                }
            }
            _ => Self {
                similarity: NOT_COMPUTED,
                is_match: false,
            },
        }
    }
}

impl MatchScore for CcsMatch {
    fn assign(&self, result: &mut MatchResult) {
        result.ccs_similarity = self.similarity;
        result.is_ccs_match = self.is_match;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gaussian() {
        assert_eq!(gaussian_similarity(100.0, 100.0, 0.01), 1.0);
        let s = gaussian_similarity(100.01, 100.0, 0.01);
        assert!((s - (-0.5f64).exp() as f32).abs() < 1e-5);
        assert!(gaussian_similarity(100.05, 100.0, 0.01) < s);
        assert_eq!(gaussian_similarity(1.0, 2.0, 0.0), 0.0);
    }

    #[test]
    fn test_mass_match() {
        let m = MassMatch::calculate(500.0, 500.0005, 0.005);
        assert!(m.is_match());
        assert!(m.similarity > 0.99);
        let m = MassMatch::calculate(500.0, 500.0005, 0.0001);
        assert!(!m.is_match());

        let mut result = MatchResult::default();
        m.assign(&mut result);
        assert_eq!(result.mass_similarity, m.similarity);
    }

    #[test]
    fn test_rt_match() {
        let rt = RetentionTimeMatch::calculate(5.0, Some(5.2), 0.5);
        assert!(rt.is_match);
        let rt = RetentionTimeMatch::calculate(5.0, Some(6.0), 0.5);
        assert!(!rt.is_match);
        let rt = RetentionTimeMatch::calculate(5.0, None, 0.5);
        assert_eq!(rt.similarity, NOT_COMPUTED);
    }

    #[test]
    fn test_ccs_match() {
        let ccs = CcsMatch::calculate(Some(205.0), Some(200.0), 5.0);
        assert!(ccs.is_match);
        let ccs = CcsMatch::calculate(Some(215.0), Some(200.0), 5.0);
        assert!(!ccs.is_match);
        let ccs = CcsMatch::calculate(None, Some(200.0), 5.0);
        assert_eq!(ccs.similarity, NOT_COMPUTED);
        assert!(!ccs.is_match);
    }
}
