//! Batch annotation of a run's peak features
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use identity_hash::BuildIdentityHasher;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::annotator::Annotator;
use crate::feature::{AnnotationStage, DeconvolutionResult, PeakFeature, SpectrumProvider};
use crate::parameters::AnnotationProcessParameters;
use crate::reference::QueryFeature;
use crate::result::{AnnotationState, MatchResult};
use crate::spectrum::{extract_isotope_envelope, IsotopePeak, SpectrumPeak};

#[derive(Debug, Error)]
pub enum AnnotationProcessError {
    #[error("Annotation was cancelled")]
    Cancelled,
    #[error("Received {deconvolutions} deconvolution results for {features} features")]
    MisalignedDeconvolution { features: usize, deconvolutions: usize },
    #[error("Failed to build the worker thread pool: {0}")]
    ThreadPoolError(
        #[from]
        #[source]
        rayon::ThreadPoolBuildError,
    ),
}

/// A cooperative cancellation signal shared between the caller and the workers.
///
/// Workers poll the token between stages, so a feature is never left partway
/// through a stage.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts completed features, readable from other threads while a batch runs
#[derive(Debug, Default)]
pub struct AnnotationProgress {
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl AnnotationProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn increment(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.completed() as f64 / total as f64
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub features: usize,
    pub reference_matched: usize,
    pub suggested: usize,
    pub unknown: usize,
    pub elapsed: Duration,
}

impl AnnotationSummary {
    fn from_features(features: &[PeakFeature], elapsed: Duration) -> Self {
        let mut summary = Self {
            features: features.len(),
            elapsed,
            ..Default::default()
        };
        for f in features {
            match f.annotation_state {
                AnnotationState::ReferenceMatched => summary.reference_matched += 1,
                AnnotationState::Suggested => summary.suggested += 1,
                AnnotationState::Unknown => summary.unknown += 1,
            }
        }
        summary
    }
}

type SiblingMap = HashMap<u32, Vec<(usize, u32)>, BuildIdentityHasher<u32>>;

/// The members of each isotope cluster as `(feature index, weight number)`, in
/// ascending weight order.
fn build_sibling_map(features: &[PeakFeature]) -> SiblingMap {
    let mut siblings = SiblingMap::default();
    for (i, f) in features.iter().enumerate() {
        siblings
            .entry(f.isotope_parent_id)
            .or_default()
            .push((i, f.isotope_weight_number));
    }
    for members in siblings.values_mut() {
        members.sort_by_key(|(i, weight)| (*weight, *i));
    }
    siblings
}

/// Annotates every feature of a run with the configured annotators.
///
/// Peptide annotators are applied before molecule annotators, each kind in ascending
/// priority. Every annotator contributes at most
/// [`AnnotationProcessParameters::max_results_per_annotator`] results that pass its
/// evaluator's thresholds.
pub struct AnnotationProcess {
    peptide_annotators: Vec<Arc<dyn Annotator>>,
    molecule_annotators: Vec<Arc<dyn Annotator>>,
    parameters: AnnotationProcessParameters,
}

impl AnnotationProcess {
    pub fn new(annotators: Vec<Arc<dyn Annotator>>, parameters: AnnotationProcessParameters) -> Self {
        let (mut peptide_annotators, mut molecule_annotators): (Vec<_>, Vec<_>) = annotators
            .into_iter()
            .partition(|a| a.kind().is_peptide());
        peptide_annotators.sort_by_key(|a| a.priority());
        molecule_annotators.sort_by_key(|a| a.priority());
        Self {
            peptide_annotators,
            molecule_annotators,
            parameters,
        }
    }

    pub fn parameters(&self) -> &AnnotationProcessParameters {
        &self.parameters
    }

    pub fn annotators(&self) -> impl Iterator<Item = &Arc<dyn Annotator>> {
        self.peptide_annotators
            .iter()
            .chain(self.molecule_annotators.iter())
    }

    fn find_annotator(&self, key: &str) -> Option<&Arc<dyn Annotator>> {
        self.annotators().find(|a| a.key() == key)
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, AnnotationProcessError> {
        let num_threads = if self.parameters.num_threads > 0 {
            self.parameters.num_threads as usize
        } else {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        debug!("Using {} threads", num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(pool)
    }

    /// Annotate `features` in place.
    ///
    /// `deconvolutions` must be index-aligned with `features`. Features are processed
    /// in parallel on a pool of [`AnnotationProcessParameters::num_threads`] workers.
    /// If `token` is cancelled, no further stage is started and
    /// [`AnnotationProcessError::Cancelled`] is returned, every feature being left at
    /// the last stage it completed.
    pub fn run<P: SpectrumProvider>(
        &self,
        features: &mut [PeakFeature],
        deconvolutions: &[DeconvolutionResult],
        provider: &P,
        token: &CancellationToken,
        progress: &AnnotationProgress,
    ) -> Result<AnnotationSummary, AnnotationProcessError> {
        if features.len() != deconvolutions.len() {
            return Err(AnnotationProcessError::MisalignedDeconvolution {
                features: features.len(),
                deconvolutions: deconvolutions.len(),
            });
        }
        progress.start(features.len());
        if token.is_cancelled() {
            warn!("Annotation cancelled before it started");
            return Err(AnnotationProcessError::Cancelled);
        }

        let start = Instant::now();
        let siblings = build_sibling_map(features);
        let feature_ids: Vec<u32> = features.iter().map(|f| f.id).collect();
        let pool = self.create_threadpool()?;

        pool.install(|| {
            features
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, feature)| {
                    if token.is_cancelled() {
                        return;
                    }
                    let completed = self.annotate_feature(
                        i,
                        feature,
                        deconvolutions,
                        &siblings,
                        &feature_ids,
                        provider,
                        token,
                    );
                    if completed {
                        progress.increment();
                    }
                })
        });

        if token.is_cancelled() {
            warn!(
                "Annotation cancelled after {} of {} features",
                progress.completed(),
                features.len()
            );
            return Err(AnnotationProcessError::Cancelled);
        }

        let summary = AnnotationSummary::from_features(features, start.elapsed());
        let rate = summary.features as f64 / summary.elapsed.as_secs_f64().max(1e-9);
        info!(
            "Annotated {} features in {:0.3?} ({:0.2} features/sec)",
            summary.features, summary.elapsed, rate
        );
        info!(
            "{} reference matched, {} suggested, {} unknown",
            summary.reference_matched, summary.suggested, summary.unknown
        );
        Ok(summary)
    }

    /// Run every stage for one feature, returning whether all of them completed
    #[allow(clippy::too_many_arguments)]
    fn annotate_feature<P: SpectrumProvider>(
        &self,
        index: usize,
        feature: &mut PeakFeature,
        deconvolutions: &[DeconvolutionResult],
        siblings: &SiblingMap,
        feature_ids: &[u32],
        provider: &P,
        token: &CancellationToken,
    ) -> bool {
        let query = self.build_query(index, feature, deconvolutions, siblings, feature_ids, provider);
        if token.is_cancelled() {
            return false;
        }

        let peptide_results = self.annotate_with(&self.peptide_annotators, &query, feature);
        feature.match_results.add_results(peptide_results);
        if token.is_cancelled() {
            return false;
        }

        let molecule_results = self.annotate_with(&self.molecule_annotators, &query, feature);
        feature.match_results.add_results(molecule_results);
        if token.is_cancelled() {
            return false;
        }

        self.assign_representative(feature);
        trace!(
            "Feature {} ({:0.4}) annotated as {:?} with {} results",
            feature.id,
            feature.precursor_mz,
            feature.name,
            feature.match_results.len()
        );
        true
    }

    /// Build the query for one feature: extract its isotope envelope from the MS1
    /// spectrum and resolve its deconvolved spectrum, borrowing the spectrum of an
    /// isotope cluster sibling when its own is empty.
    fn build_query<P: SpectrumProvider>(
        &self,
        index: usize,
        feature: &mut PeakFeature,
        deconvolutions: &[DeconvolutionResult],
        siblings: &SiblingMap,
        feature_ids: &[u32],
        provider: &P,
    ) -> QueryFeature {
        let tolerance = self
            .annotators()
            .map(|a| a.parameters().ms1_tolerance)
            .next()
            .unwrap_or(0.01);
        let isotopes: Vec<IsotopePeak> = match feature.ms1_raw_spectrum_id {
            Some(spectrum_index) => match provider.load_spectrum(spectrum_index) {
                Ok(ms1) => {
                    extract_isotope_envelope(&ms1, feature.precursor_mz, feature.charge, tolerance)
                }
                Err(e) => {
                    warn!(
                        "Failed to load MS1 spectrum {spectrum_index} for feature {}: {e}",
                        feature.id
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let (spectrum, source) = resolve_spectrum(index, feature, deconvolutions, siblings, feature_ids);
        feature.ms2_spectrum_source = source;
        feature.to_query(isotopes, spectrum)
    }

    fn annotate_with(
        &self,
        annotators: &[Arc<dyn Annotator>],
        query: &QueryFeature,
        feature: &mut PeakFeature,
    ) -> Vec<MatchResult> {
        let mut accepted = Vec::new();
        for annotator in annotators {
            let candidates = annotator.find_candidates(query);
            feature.advance(AnnotationStage::CandidatesFound);
            let evaluator = annotator.evaluator();
            let passing = evaluator.filter_by_threshold(candidates);
            accepted.extend(evaluator.select_top_n(passing, self.parameters.max_results_per_annotator));
            feature.advance(AnnotationStage::Filtered);
        }
        accepted
    }

    fn assign_representative(&self, feature: &mut PeakFeature) {
        let state = feature.match_results.state();
        let representative = feature.match_results.representative().cloned();
        match representative {
            Some(result) => {
                let reference = self
                    .find_annotator(&result.annotator_id)
                    .and_then(|a| a.refer(&result));
                feature.assign_representative(Some((&result, reference)), state);
            }
            None => feature.assign_representative(None, state),
        }
    }
}

/// Pick the deconvolved spectrum for the feature at `index`, returning it with the
/// id of the feature it came from.
fn resolve_spectrum(
    index: usize,
    feature: &PeakFeature,
    deconvolutions: &[DeconvolutionResult],
    siblings: &SiblingMap,
    feature_ids: &[u32],
) -> (Vec<SpectrumPeak>, Option<u32>) {
    let own = &deconvolutions[index];
    if !own.is_empty() {
        return (own.spectrum.clone(), Some(feature.id));
    }
    let fallback = siblings
        .get(&feature.isotope_parent_id)
        .into_iter()
        .flatten()
        .filter(|(i, _)| *i != index)
        .find(|(i, _)| !deconvolutions[*i].is_empty());
    match fallback {
        Some((i, weight)) => {
            trace!(
                "Feature {} borrows the spectrum of isotope sibling {} (weight {})",
                feature.id,
                feature_ids[*i],
                weight
            );
            (deconvolutions[*i].spectrum.clone(), Some(feature_ids[*i]))
        }
        None => (Vec::new(), None),
    }
}
