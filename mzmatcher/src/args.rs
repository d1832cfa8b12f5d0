use std::{error::Error, fmt::Display, path::PathBuf, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzmatch::{AnnotatorConfig, AnnotatorKind, CollisionType, MsRefSearchParameters, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ArgAnnotatorKind {
    #[default]
    /// Metabolite spectral libraries
    Mass,
    /// Lipid spectral libraries
    Lipid,
    /// Lipid libraries of OAD, EID or EIEIO spectra
    EadLipid,
    /// Compound lists without spectra
    TextDb,
    /// Peptide spectral libraries
    Peptide,
}

impl From<ArgAnnotatorKind> for AnnotatorKind {
    fn from(value: ArgAnnotatorKind) -> Self {
        match value {
            ArgAnnotatorKind::Mass => AnnotatorKind::Mass,
            ArgAnnotatorKind::Lipid => AnnotatorKind::Lipid,
            ArgAnnotatorKind::EadLipid => AnnotatorKind::EadLipid,
            ArgAnnotatorKind::TextDb => AnnotatorKind::TextDb,
            ArgAnnotatorKind::Peptide => AnnotatorKind::Peptide,
        }
    }
}

impl Display for ArgAnnotatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The library format an annotator kind reads unless told otherwise
pub fn default_source_for(kind: AnnotatorKind) -> SourceType {
    match kind {
        AnnotatorKind::Mass => SourceType::Msp,
        AnnotatorKind::Lipid => SourceType::Lbm,
        AnnotatorKind::EadLipid => SourceType::OadLipid,
        AnnotatorKind::TextDb => SourceType::Text,
        AnnotatorKind::Peptide => SourceType::Fasta,
    }
}

fn default_priority() -> i32 {
    1
}

/// One annotator to run, with the JSON reference library it searches.
///
/// On the command line this is written `[KIND:]KEY=PATH`, e.g. `lipid:lbm=lipids.json`.
/// A configuration file can also set the source type, priority, collision type and the
/// full search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatorSpec {
    pub key: String,
    #[serde(default)]
    pub kind: AnnotatorKind,
    pub library: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceType>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_type: Option<CollisionType>,
    #[serde(default)]
    pub parameters: MsRefSearchParameters,
}

impl AnnotatorSpec {
    pub fn new(kind: AnnotatorKind, key: impl Into<String>, library: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            kind,
            library: library.into(),
            source: None,
            priority: default_priority(),
            collision_type: None,
            parameters: MsRefSearchParameters::default(),
        }
    }

    pub fn source(&self) -> SourceType {
        self.source.unwrap_or_else(|| default_source_for(self.kind))
    }

    pub fn config(&self) -> AnnotatorConfig {
        AnnotatorConfig {
            kind: self.kind,
            key: self.key.clone(),
            priority: self.priority,
            collision_type: self.collision_type,
            parameters: self.parameters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotatorSpecParseError {
    MissingLibrary(String),
    EmptyKey(String),
    UnknownKind(String),
}

impl Display for AnnotatorSpecParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotatorSpecParseError::MissingLibrary(s) => {
                write!(f, "Annotator `{s}` does not name a library, expected KEY=PATH")
            }
            AnnotatorSpecParseError::EmptyKey(s) => {
                write!(f, "Annotator `{s}` has an empty key")
            }
            AnnotatorSpecParseError::UnknownKind(s) => {
                write!(f, "Unknown annotator kind `{s}`")
            }
        }
    }
}

impl Error for AnnotatorSpecParseError {}

impl FromStr for AnnotatorSpec {
    type Err = AnnotatorSpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((head, library)) = s.split_once('=') else {
            return Err(AnnotatorSpecParseError::MissingLibrary(s.to_string()));
        };
        if library.is_empty() {
            return Err(AnnotatorSpecParseError::MissingLibrary(s.to_string()));
        }
        let (kind, key) = match head.split_once(':') {
            Some((kind, key)) => {
                let kind = <ArgAnnotatorKind as ValueEnum>::from_str(kind, true)
                    .map_err(|_| AnnotatorSpecParseError::UnknownKind(kind.to_string()))?;
                (kind, key)
            }
            None => (ArgAnnotatorKind::default(), head),
        };
        if key.trim().is_empty() {
            return Err(AnnotatorSpecParseError::EmptyKey(s.to_string()));
        }
        Ok(Self::new(kind.into(), key, library))
    }
}
