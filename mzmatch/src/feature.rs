//! The detected peak features consumed and annotated by the batch process, and the
//! collaborators that supply their spectra.
use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};

use crate::reference::{IonMode, MoleculeReference, QueryFeature};
use crate::result::{AnnotationState, MatchResult, MatchResultContainer};
use crate::spectrum::{IsotopePeak, SpectrumPeak};

/// How far a feature has progressed through annotation. Stages only move forward.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnnotationStage {
    #[default]
    Unannotated,
    CandidatesFound,
    Filtered,
    RepresentativeAssigned,
}

/// A detected peak feature with its annotation.
///
/// Features sharing an `isotope_parent_id` belong to one isotope cluster, the
/// `isotope_weight_number` giving each one's position within it (0 for the
/// monoisotopic feature).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakFeature {
    pub id: u32,
    pub precursor_mz: f64,
    pub retention_time: f64,
    pub drift_time: Option<f64>,
    pub ccs: Option<f64>,
    pub ion_mode: IonMode,
    pub adduct: String,
    pub charge: i32,
    /// The index of the MS1 spectrum the feature was detected in
    pub ms1_raw_spectrum_id: Option<usize>,
    pub isotope_parent_id: u32,
    pub isotope_weight_number: u32,

    /// The id of the feature whose deconvolved spectrum was used, if any
    pub ms2_spectrum_source: Option<u32>,
    pub match_results: MatchResultContainer,
    pub stage: AnnotationStage,

    pub name: String,
    pub inchikey: String,
    pub formula: String,
    pub ontology: String,
    pub annotation_state: AnnotationState,
    pub annotator_id: String,
}

impl PeakFeature {
    pub fn new(id: u32, precursor_mz: f64, retention_time: f64) -> Self {
        Self {
            id,
            precursor_mz,
            retention_time,
            charge: 1,
            isotope_parent_id: id,
            ..Default::default()
        }
    }

    pub fn with_isotope_cluster(mut self, parent_id: u32, weight_number: u32) -> Self {
        self.isotope_parent_id = parent_id;
        self.isotope_weight_number = weight_number;
        self
    }

    pub fn with_ms1_spectrum(mut self, index: usize) -> Self {
        self.ms1_raw_spectrum_id = Some(index);
        self
    }

    pub fn with_ccs(mut self, ccs: f64) -> Self {
        self.ccs = Some(ccs);
        self
    }

    /// Build the query describing this feature
    pub fn to_query(&self, isotopes: Vec<IsotopePeak>, spectrum: Vec<SpectrumPeak>) -> QueryFeature {
        QueryFeature {
            precursor_mz: self.precursor_mz,
            retention_time: self.retention_time,
            drift_time: self.drift_time,
            ccs: self.ccs,
            ion_mode: self.ion_mode,
            adduct: self.adduct.clone(),
            charge: self.charge,
            isotopes,
            spectrum,
        }
    }

    pub fn advance(&mut self, stage: AnnotationStage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    /// Project `representative` onto the descriptive fields of this feature, falling
    /// back to the result's own identity when the reference cannot be recovered.
    pub fn assign_representative(
        &mut self,
        representative: Option<(&MatchResult, Option<&MoleculeReference>)>,
        state: AnnotationState,
    ) {
        self.annotation_state = state;
        match representative {
            Some((result, reference)) => {
                self.name = result.name.clone();
                self.inchikey = result.inchikey.clone();
                self.annotator_id = result.annotator_id.clone();
                if let Some(reference) = reference {
                    self.formula = reference.formula.clone();
                    self.ontology = if reference.ontology.is_empty() {
                        reference.compound_class.clone()
                    } else {
                        reference.ontology.clone()
                    };
                    if self.adduct.is_empty() {
                        self.adduct = reference.adduct.clone();
                    }
                }
            }
            None => {
                self.name = "Unknown".into();
                self.inchikey.clear();
                self.formula.clear();
                self.ontology.clear();
                self.annotator_id.clear();
            }
        }
        self.advance(AnnotationStage::RepresentativeAssigned);
    }
}

/// The deconvolved MS/MS spectrum of the feature at the same index
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconvolutionResult {
    pub spectrum: Vec<SpectrumPeak>,
}

impl DeconvolutionResult {
    pub fn new(spectrum: Vec<SpectrumPeak>) -> Self {
        Self { spectrum }
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }
}

/// Supplies raw spectra by index
pub trait SpectrumProvider: Sync {
    fn load_spectrum(&self, index: usize) -> io::Result<Vec<SpectrumPeak>>;
}

/// A [`SpectrumProvider`] over spectra held in memory. Unknown indices load as empty.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemorySpectrumProvider {
    spectra: HashMap<usize, Vec<SpectrumPeak>>,
}

impl InMemorySpectrumProvider {
    pub fn new(spectra: HashMap<usize, Vec<SpectrumPeak>>) -> Self {
        Self { spectra }
    }

    pub fn insert(&mut self, index: usize, spectrum: Vec<SpectrumPeak>) {
        self.spectra.insert(index, spectrum);
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

impl SpectrumProvider for InMemorySpectrumProvider {
    fn load_spectrum(&self, index: usize) -> io::Result<Vec<SpectrumPeak>> {
        Ok(self.spectra.get(&index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stage_only_advances() {
        let mut feature = PeakFeature::new(0, 300.0, 1.0);
        feature.advance(AnnotationStage::Filtered);
        feature.advance(AnnotationStage::CandidatesFound);
        assert_eq!(feature.stage, AnnotationStage::Filtered);
    }

    #[test]
    fn test_assign_representative() {
        let mut feature = PeakFeature::new(0, 300.0, 1.0);
        let mut reference = MoleculeReference::new(4, "Caffeine", 195.0877);
        reference.formula = "C8H10N4O2".into();
        reference.compound_class = "Xanthines".into();
        reference.adduct = "[M+H]+".into();
        let mut result = MatchResult::default();
        result.name = "Caffeine".into();
        result.annotator_id = "msp".into();

        feature.assign_representative(Some((&result, Some(&reference))), AnnotationState::ReferenceMatched);
        assert_eq!(feature.name, "Caffeine");
        assert_eq!(feature.formula, "C8H10N4O2");
        assert_eq!(feature.ontology, "Xanthines");
        assert_eq!(feature.adduct, "[M+H]+");
        assert_eq!(feature.annotator_id, "msp");
        assert_eq!(feature.stage, AnnotationStage::RepresentativeAssigned);

        feature.assign_representative(None, AnnotationState::Unknown);
        assert_eq!(feature.name, "Unknown");
        assert!(feature.formula.is_empty());
    }

    #[test]
    fn test_provider() {
        let mut provider = InMemorySpectrumProvider::default();
        provider.insert(2, vec![SpectrumPeak::new(100.0, 5.0)]);
        assert_eq!(provider.load_spectrum(2).unwrap().len(), 1);
        assert!(provider.load_spectrum(3).unwrap().is_empty());

        let json = r#"{"2": [{"mz": 100.0, "intensity": 5.0}]}"#;
        let parsed: InMemorySpectrumProvider = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, provider);
    }
}
