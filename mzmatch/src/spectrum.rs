//! Peak list types shared by queries and references
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType, Tolerance};
use serde::{Deserialize, Serialize};

use crate::tolerance::mass_tolerance_at;

/// The mass difference between the monoisotopic peak and the first
/// isotopologue, the <sup>13</sup>C - <sup>12</sup>C difference
pub const C13_C12_DIFFERENCE: f64 = 1.003355;

/// The number of isotopologue peaks extracted for an isotope envelope, M, M+1 and M+2
pub const ISOTOPE_ENVELOPE_SIZE: usize = 3;

/// A single MS/MS fragment peak, optionally carrying a free-text annotation
/// as found in reference library spectra.
#[derive(Debug, Default, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SpectrumPeak {
    pub mz: f64,
    pub intensity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl SpectrumPeak {
    pub fn new(mz: f64, intensity: f32) -> Self {
        Self {
            mz,
            intensity,
            comment: None,
        }
    }

    pub fn with_comment(mz: f64, intensity: f32, comment: impl Into<String>) -> Self {
        Self {
            mz,
            intensity,
            comment: Some(comment.into()),
        }
    }
}

impl From<&SpectrumPeak> for CentroidPeak {
    fn from(value: &SpectrumPeak) -> Self {
        CentroidPeak::new(value.mz, value.intensity, 0)
    }
}

impl From<(f64, f32)> for SpectrumPeak {
    fn from(value: (f64, f32)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// One peak of an isotope envelope. `intensity` is an absolute abundance, ratios
/// are always taken against the first (monoisotopic) peak of the envelope.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotopePeak {
    pub mz: f64,
    pub intensity: f64,
}

impl IsotopePeak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

/// Build a searchable, m/z-sorted peak set from a peak list.
///
/// The returned peaks are re-indexed in sorted order, so [`CentroidPeak::index`] is
/// the position of the peak in the set.
pub fn to_peak_set<'a, I: IntoIterator<Item = &'a SpectrumPeak>>(peaks: I) -> MZPeakSetType<CentroidPeak> {
    MZPeakSetType::new(peaks.into_iter().map(CentroidPeak::from).collect())
}

/// Extract an isotope envelope for `precursor_mz` from an MS1 peak list.
///
/// Each isotopologue `M+i` is located at `precursor_mz + i * C13_C12_DIFFERENCE / |charge|`
/// and its abundance is the summed intensity of all peaks within the mass tolerance,
/// as computed by [`mass_tolerance_at`]. An envelope whose monoisotopic peak is absent
/// is returned empty.
#[tracing::instrument(skip_all, level = "trace")]
pub fn extract_isotope_envelope(
    spectrum: &[SpectrumPeak],
    precursor_mz: f64,
    charge: i32,
    tolerance: f64,
) -> Vec<IsotopePeak> {
    if spectrum.is_empty() {
        return Vec::new();
    }
    let peaks = to_peak_set(spectrum);
    let charge = charge.unsigned_abs().max(1) as f64;
    let error_tolerance = Tolerance::Da(mass_tolerance_at(precursor_mz, tolerance));

    let envelope: Vec<IsotopePeak> = (0..ISOTOPE_ENVELOPE_SIZE)
        .map(|i| {
            let mz = precursor_mz + (i as f64) * C13_C12_DIFFERENCE / charge;
            let intensity: f64 = peaks
                .all_peaks_for(mz, error_tolerance)
                .iter()
                .map(|p| p.intensity() as f64)
                .sum();
            IsotopePeak::new(mz, intensity)
        })
        .collect();

    if envelope[0].intensity <= 0.0 {
        Vec::new()
    } else {
        envelope
    }
}

/// The largest intensity in a peak list, or zero if empty.
pub fn base_peak_intensity(peaks: &[SpectrumPeak]) -> f32 {
    peaks.iter().map(|p| p.intensity).fold(0.0, f32::max)
}
