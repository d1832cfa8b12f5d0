//! Independent similarity metrics between a query and a single reference.
//!
//! Each calculator produces a small immutable value exposing its own score(s), which
//! it writes onto a [`MatchResult`] through [`MatchScore::assign`]. Calculators do not
//! know about each other or about how their metrics are aggregated.
mod isotope;
mod mass;
mod spectrum;

use crate::result::MatchResult;

pub use isotope::{isotope_similarity, IsotopeMatch};
pub use mass::{gaussian_similarity, CcsMatch, MassMatch, RetentionTimeMatch};
pub use spectrum::{peak_count_penalty, preprocess_spectrum, SpectrumMatch};

/// A computed metric that knows which fields of a [`MatchResult`] it owns
pub trait MatchScore {
    fn assign(&self, result: &mut MatchResult);
}
