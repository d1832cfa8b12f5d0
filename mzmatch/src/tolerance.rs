//! Mass tolerance policy and per-dimension search windows.
use serde::{Deserialize, Serialize};

/// The mass at which an absolute tolerance switches over to its ppm-equivalent.
pub const MASS_TOLERANCE_ANCHOR: f64 = 500.0;

/// Convert an absolute tolerance in Da into the ppm error it represents at
/// [`MASS_TOLERANCE_ANCHOR`].
#[inline]
pub fn ppm_at_anchor(tolerance: f64) -> f64 {
    tolerance / MASS_TOLERANCE_ANCHOR * 1e6
}

/// Compute the absolute mass tolerance to use around `mass`.
///
/// At or below 500 Da the configured absolute `tolerance` is used as-is. Above 500 Da
/// the tolerance is re-expressed as the ppm error it represents at 500 Da and
/// re-applied at `mass`, so the window grows linearly with mass:
///
/// ```math
/// \text{tol}(m) = \begin{cases}
///     t & m \le 500 \\
///     m \times \frac{t}{500} & m > 500
/// \end{cases}
/// ```
#[inline]
pub fn mass_tolerance_at(mass: f64, tolerance: f64) -> f64 {
    if mass <= MASS_TOLERANCE_ANCHOR {
        tolerance
    } else {
        let ppm = ppm_at_anchor(tolerance);
        mass * ppm * 1e-6
    }
}

/// A center value with a symmetric tolerance along a single dimension.
///
/// This is a stateless value describing a closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub center: f64,
    pub tolerance: f64,
}

impl SearchQuery {
    pub fn new(center: f64, tolerance: f64) -> Self {
        Self { center, tolerance }
    }

    /// Build a query on the mass axis, applying [`mass_tolerance_at`]
    pub fn mass(center: f64, tolerance: f64) -> Self {
        Self::new(center, mass_tolerance_at(center, tolerance))
    }

    /// Build a query whose tolerance is a percentage of `center`, as for CCS
    pub fn relative(center: f64, percent: f64) -> Self {
        Self::new(center, center.abs() * percent / 100.0)
    }

    #[inline]
    pub fn lower(&self) -> f64 {
        self.center - self.tolerance
    }

    #[inline]
    pub fn upper(&self) -> f64 {
        self.center + self.tolerance
    }

    /// Test whether `value` falls inside the closed interval
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower() <= value && value <= self.upper()
    }
}
