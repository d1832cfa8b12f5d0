use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzmatch::lipid::LipidNameCache;
use mzmatch::{
    AnnotationProcess, AnnotationProcessError, AnnotationProcessParameters, AnnotationProgress,
    Annotator, AnnotatorError, CancellationToken, ReferenceDatabase, Restorable, RestorationKey,
};

use crate::args::AnnotatorSpec;
use crate::input::{read_features, read_library, read_ms1_spectra};
use crate::write::write_json;

#[derive(Debug, Error)]
pub enum MZMatcherError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to open {path}: {source}")]
    InputError {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    MalformedInput {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("An error occurred while reading the configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("An error occurred while building an annotator: {0}")]
    AnnotatorError(
        #[source]
        #[from]
        AnnotatorError,
    ),
    #[error("An error occurred during annotation: {0}")]
    AnnotationError(
        #[source]
        #[from]
        AnnotationProcessError,
    ),
}

fn default_output_file() -> PathBuf {
    PathBuf::from("-")
}

fn default_threads() -> i32 {
    -1
}

fn default_max_results() -> usize {
    AnnotationProcessParameters::default().max_results_per_annotator
}

/// Annotate mass spectrometry peak features against reference libraries.
///
/// Read peak features and their deconvolved MS/MS spectra, search and score them
/// against each annotator's reference library, and write out the annotated features.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZMatcher {
    /// The path to read the peak features from, a JSON array of `{feature, spectrum}` records
    #[arg()]
    pub features_file: PathBuf,

    /// A JSON file mapping MS1 spectrum indices to their peaks, used for isotope similarity
    #[arg(short = 'm', long = "ms1-spectra")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms1_spectra_file: Option<PathBuf>,

    /// An annotator to run, written [KIND:]KEY=PATH where PATH is a JSON reference library.
    ///
    /// KIND is one of mass, lipid, ead-lipid, text-db or peptide and defaults to mass.
    /// May be given more than once.
    #[arg(short = 'a', long = "annotator", value_name = "[KIND:]KEY=PATH")]
    #[serde(default)]
    pub annotators: Vec<AnnotatorSpec>,

    /// The path to write the output file to, or if '-' is passed, write to STDOUT.
    ///
    /// If the path ends with `.gz`, the output is gzip-compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// The path to write the annotators' restoration keys to
    #[arg(short = 'k', long = "save-keys")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_keys: Option<PathBuf>,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzmatcher.toml` in the working directory.
    /// Environment variables prefixed with `MZMATCHER_` will be read too.
    #[arg(long = "config-file")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// The maximum number of results each annotator keeps per feature
    #[arg(short = 'n', long = "max-results", default_value_t = default_max_results())]
    #[serde(default = "default_max_results")]
    pub max_results_per_annotator: usize,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    #[serde(default = "default_threads")]
    pub threads: i32,
}

impl MZMatcher {
    fn process_parameters(&self) -> AnnotationProcessParameters {
        AnnotationProcessParameters::new(self.max_results_per_annotator, self.threads)
    }

    /// Build one annotator per [`AnnotatorSpec`], sharing a single lipid name cache
    fn build_annotators(
        &self,
    ) -> Result<(Vec<Arc<dyn Annotator>>, Vec<RestorationKey>), MZMatcherError> {
        let lipid_names = Arc::new(LipidNameCache::default());
        let mut annotators: Vec<Arc<dyn Annotator>> = Vec::with_capacity(self.annotators.len());
        let mut keys = Vec::new();
        for spec in self.annotators.iter() {
            let references = read_library(&spec.library)?;
            let database = Arc::new(ReferenceDatabase::new(
                spec.key.clone(),
                spec.source(),
                references,
            ));
            info!(
                "Annotator {} ({}) over {} references from {}",
                spec.key,
                spec.kind,
                database.len(),
                spec.library.display()
            );
            let annotator = spec
                .config()
                .builder()
                .database(database)
                .lipid_names(lipid_names.clone())
                .build()?;
            if self.save_keys.is_some() {
                keys.push(annotator.save()?);
            }
            annotators.push(Arc::new(annotator));
        }
        Ok((annotators, keys))
    }

    pub fn main(&self) -> Result<(), MZMatcherError> {
        info!(
            "mzmatcher v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.features_file.display());
        info!("Output: {}", self.output_file.display());
        let start = Instant::now();

        let (mut features, deconvolutions) = read_features(&self.features_file)?;
        let provider = read_ms1_spectra(self.ms1_spectra_file.as_deref())?;
        let (annotators, keys) = self.build_annotators()?;
        if annotators.is_empty() {
            warn!("No annotators were configured, every feature will be unknown");
        }

        let process = AnnotationProcess::new(annotators, self.process_parameters());
        let token = CancellationToken::new();
        let progress = AnnotationProgress::new();
        let summary = process.run(&mut features, &deconvolutions, &provider, &token, &progress)?;
        debug!(
            "{} of {} features completed",
            progress.completed(),
            progress.total()
        );

        info!("Features: {}", summary.features);
        info!("Reference matched: {}", summary.reference_matched);
        info!("Suggested: {}", summary.suggested);
        info!("Unknown: {}", summary.unknown);

        write_json(&self.output_file, &features)?;
        if let Some(path) = self.save_keys.as_ref() {
            info!("Writing {} restoration keys to {}", keys.len(), path.display());
            write_json(path, &keys)?;
        }
        info!("Total Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }
}
