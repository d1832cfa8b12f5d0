use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mzmatch::{
    DeconvolutionResult, InMemorySpectrumProvider, MoleculeReference, PeakFeature, SpectrumPeak,
};

use crate::driver::MZMatcherError;

/// A peak feature as read from the features file, with its deconvolved MS/MS spectrum
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub feature: PeakFeature,
    #[serde(default)]
    pub spectrum: Vec<SpectrumPeak>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MZMatcherError> {
    let handle = fs::File::open(path).map_err(|e| MZMatcherError::InputError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_reader(io::BufReader::new(handle)).map_err(|e| {
        MZMatcherError::MalformedInput {
            path: path.display().to_string(),
            source: e,
        }
    })
}

/// Read the features to annotate with their index-aligned deconvolution results
pub fn read_features(
    path: &Path,
) -> Result<(Vec<PeakFeature>, Vec<DeconvolutionResult>), MZMatcherError> {
    let records: Vec<FeatureRecord> = read_json(path)?;
    debug!("Read {} features from {}", records.len(), path.display());
    Ok(records
        .into_iter()
        .map(|rec| (rec.feature, DeconvolutionResult::new(rec.spectrum)))
        .unzip())
}

pub fn read_library(path: &Path) -> Result<Vec<MoleculeReference>, MZMatcherError> {
    let references: Vec<MoleculeReference> = read_json(path)?;
    debug!("Read {} references from {}", references.len(), path.display());
    Ok(references)
}

/// Read the raw MS1 spectra, keyed by spectrum index. Without a file no MS1 data is
/// available and isotope similarity is not computed.
pub fn read_ms1_spectra(path: Option<&Path>) -> Result<InMemorySpectrumProvider, MZMatcherError> {
    match path {
        Some(path) => {
            let provider: InMemorySpectrumProvider = read_json(path)?;
            debug!("Read {} MS1 spectra from {}", provider.len(), path.display());
            Ok(provider)
        }
        None => Ok(InMemorySpectrumProvider::default()),
    }
}
