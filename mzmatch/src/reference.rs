//! Reference library entries and the query features matched against them
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::spectrum::{IsotopePeak, SpectrumPeak};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IonMode {
    #[default]
    Positive,
    Negative,
}

impl Display for IonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Anything with a precursor mass that a [`crate::search::ReferenceSearcher`] can
/// range-search over.
pub trait PrecursorMass {
    fn precursor_mz(&self) -> f64;
}

/// An immutable entry of a reference library.
///
/// `scan_id` is the library-local identifier of the entry, which is embedded in every
/// [`crate::result::MatchResult`] produced against it so the entry can be recovered
/// later without holding a reference to it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoleculeReference {
    pub scan_id: u32,
    pub name: String,
    pub precursor_mz: f64,
    pub retention_time: Option<f64>,
    pub ccs: Option<f64>,
    pub ion_mode: IonMode,
    pub adduct: String,
    pub charge: i32,
    pub formula: String,
    pub ontology: String,
    pub compound_class: String,
    pub inchikey: String,
    pub smiles: String,
    pub isotopes: Vec<IsotopePeak>,
    pub spectrum: Vec<SpectrumPeak>,
}

impl MoleculeReference {
    pub fn new(scan_id: u32, name: impl Into<String>, precursor_mz: f64) -> Self {
        Self {
            scan_id,
            name: name.into(),
            precursor_mz,
            charge: 1,
            ..Default::default()
        }
    }

    pub fn with_spectrum(mut self, spectrum: Vec<SpectrumPeak>) -> Self {
        self.spectrum = spectrum;
        self
    }

    pub fn with_inchikey(mut self, inchikey: impl Into<String>) -> Self {
        self.inchikey = inchikey.into();
        self
    }

    pub fn with_retention_time(mut self, retention_time: f64) -> Self {
        self.retention_time = Some(retention_time);
        self
    }

    pub fn with_ccs(mut self, ccs: f64) -> Self {
        self.ccs = Some(ccs);
        self
    }

    pub fn with_compound_class(mut self, compound_class: impl Into<String>) -> Self {
        self.compound_class = compound_class.into();
        self
    }

    pub fn with_isotopes(mut self, isotopes: Vec<IsotopePeak>) -> Self {
        self.isotopes = isotopes;
        self
    }
}

impl PrecursorMass for MoleculeReference {
    #[inline]
    fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }
}

/// The observed properties of a single detected peak feature, ready to be matched
/// against a reference library. These are built once per feature and discarded
/// after annotation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFeature {
    pub precursor_mz: f64,
    pub retention_time: f64,
    pub drift_time: Option<f64>,
    pub ccs: Option<f64>,
    pub ion_mode: IonMode,
    pub adduct: String,
    pub charge: i32,
    pub isotopes: Vec<IsotopePeak>,
    pub spectrum: Vec<SpectrumPeak>,
}

impl QueryFeature {
    pub fn new(precursor_mz: f64, retention_time: f64) -> Self {
        Self {
            precursor_mz,
            retention_time,
            charge: 1,
            ..Default::default()
        }
    }

    pub fn with_spectrum(mut self, spectrum: Vec<SpectrumPeak>) -> Self {
        self.spectrum = spectrum;
        self
    }

    pub fn with_isotopes(mut self, isotopes: Vec<IsotopePeak>) -> Self {
        self.isotopes = isotopes;
        self
    }

    pub fn with_ccs(mut self, ccs: f64) -> Self {
        self.ccs = Some(ccs);
        self
    }

    pub fn has_spectrum(&self) -> bool {
        !self.spectrum.is_empty()
    }
}

impl PrecursorMass for QueryFeature {
    #[inline]
    fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }
}
