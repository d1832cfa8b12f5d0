//! Search, scoring and annotation parameters
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The kind of molecules an annotator is configured to identify, which selects the
/// scoring and validation policy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetOmics {
    #[default]
    Metabolomics,
    Lipidomics,
    Proteomics,
}

/// The fragmentation method used to acquire MS/MS spectra
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionType {
    #[default]
    CID,
    HCD,
    /// Oxygen attachment dissociation
    OAD,
    /// Electron impact dissociation
    EID,
    /// Electron-induced dissociation of singly charged ions
    EIEIO,
}

impl CollisionType {
    /// Whether this is one of the electron-activated or radical-driven methods
    pub fn is_electron_activated(&self) -> bool {
        matches!(self, Self::OAD | Self::EID | Self::EIEIO)
    }

    /// The method a library of `source` type was acquired with, for the library
    /// types tied to one method.
    pub fn for_source(source: SourceType) -> Option<Self> {
        match source {
            SourceType::OadLipid => Some(Self::OAD),
            SourceType::EidLipid => Some(Self::EID),
            SourceType::EieioLipid => Some(Self::EIEIO),
            _ => None,
        }
    }
}

impl Display for CollisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The kind of reference library a database was built from
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[default]
    None,
    /// MSP spectral library
    Msp,
    /// Lipid spectral library
    Lbm,
    /// Plain text compound list without spectra
    Text,
    /// Peptides digested from a FASTA file
    Fasta,
    OadLipid,
    EidLipid,
    EieioLipid,
}

impl Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Tolerances, cutoffs and dimension switches governing how a query is searched
/// against, scored with, and validated against a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsRefSearchParameters {
    /// The MS1 mass tolerance in Da, see [`crate::tolerance::mass_tolerance_at`]
    pub ms1_tolerance: f64,
    /// The MS/MS fragment mass tolerance in Da
    pub ms2_tolerance: f64,
    /// The retention time tolerance in minutes
    pub rt_tolerance: f64,
    /// The CCS tolerance in percent of the reference CCS
    pub ccs_tolerance: f64,

    /// The lower bound of the fragment m/z window
    pub mass_range_begin: f64,
    /// The upper bound of the fragment m/z window
    pub mass_range_end: f64,
    /// Fragments below this percentage of the base peak are ignored
    pub relative_abundance_cutoff: f32,

    pub weighted_dot_product_cutoff: f32,
    pub simple_dot_product_cutoff: f32,
    pub reverse_dot_product_cutoff: f32,
    pub matched_peaks_percentage_cutoff: f32,
    pub minimum_spectrum_match: i32,
    pub total_score_cutoff: f32,

    pub is_use_time_for_annotation_filtering: bool,
    pub is_use_time_for_annotation_scoring: bool,
    pub is_use_ccs_for_annotation_filtering: bool,
    pub is_use_ccs_for_annotation_scoring: bool,
}

impl Default for MsRefSearchParameters {
    fn default() -> Self {
        Self {
            ms1_tolerance: 0.01,
            ms2_tolerance: 0.025,
            rt_tolerance: 0.5,
            ccs_tolerance: 10.0,
            mass_range_begin: 0.0,
            mass_range_end: 2000.0,
            relative_abundance_cutoff: 0.0,
            weighted_dot_product_cutoff: 0.15,
            simple_dot_product_cutoff: 0.15,
            reverse_dot_product_cutoff: 0.5,
            matched_peaks_percentage_cutoff: 0.0,
            minimum_spectrum_match: 1,
            total_score_cutoff: 0.0,
            is_use_time_for_annotation_filtering: false,
            is_use_time_for_annotation_scoring: false,
            is_use_ccs_for_annotation_filtering: false,
            is_use_ccs_for_annotation_scoring: false,
        }
    }
}

impl MsRefSearchParameters {
    pub fn with_ms1_tolerance(mut self, ms1_tolerance: f64) -> Self {
        self.ms1_tolerance = ms1_tolerance;
        self
    }

    pub fn with_ms2_tolerance(mut self, ms2_tolerance: f64) -> Self {
        self.ms2_tolerance = ms2_tolerance;
        self
    }

    pub fn with_retention_time(mut self, rt_tolerance: f64, filter: bool, score: bool) -> Self {
        self.rt_tolerance = rt_tolerance;
        self.is_use_time_for_annotation_filtering = filter;
        self.is_use_time_for_annotation_scoring = score;
        self
    }

    pub fn with_ccs(mut self, ccs_tolerance: f64, filter: bool, score: bool) -> Self {
        self.ccs_tolerance = ccs_tolerance;
        self.is_use_ccs_for_annotation_filtering = filter;
        self.is_use_ccs_for_annotation_scoring = score;
        self
    }
}

/// Parameters for the batch [`crate::process::AnnotationProcess`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationProcessParameters {
    /// The maximum number of results each annotator may attach to a single feature
    pub max_results_per_annotator: usize,
    /// The number of worker threads, values < 1 mean all available parallelism
    pub num_threads: i32,
}

impl Default for AnnotationProcessParameters {
    fn default() -> Self {
        Self {
            max_results_per_annotator: 3,
            num_threads: -1,
        }
    }
}

impl AnnotationProcessParameters {
    pub fn new(max_results_per_annotator: usize, num_threads: i32) -> Self {
        Self {
            max_results_per_annotator,
            num_threads,
        }
    }
}
