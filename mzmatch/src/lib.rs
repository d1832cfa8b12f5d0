//! Annotate mass spectrometry peak features by searching reference libraries and
//! scoring the candidates they yield.
//!
//! The pieces, from the bottom up:
//! - [`search`] range-searches a reference collection sorted by precursor mass
//! - [`calculators`] compute individual similarity metrics
//! - [`scorer`] and [`validation`] aggregate those metrics into a [`MatchResult`]
//! - [`evaluator`] thresholds and ranks results
//! - [`annotator`] binds the above to one [`ReferenceDatabase`]
//! - [`process`] applies annotators to every feature of a run
pub mod annotator;
pub mod calculators;
pub mod database;
pub mod evaluator;
pub mod feature;
pub mod lipid;
pub mod parameters;
pub mod process;
pub mod reference;
pub mod result;
pub mod scorer;
pub mod search;
pub mod spectrum;
pub mod tolerance;
pub mod validation;

pub use annotator::{
    Annotator, AnnotatorBuilder, AnnotatorConfig, AnnotatorError, AnnotatorKind,
    DefaultRestorationVisitor, ReferenceAnnotator, Restorable, RestorationKey,
};
pub use database::{DatabaseError, ReferenceDatabase};
pub use evaluator::{MatchResultEvaluator, ThresholdEvaluator};
pub use feature::{DeconvolutionResult, InMemorySpectrumProvider, PeakFeature, SpectrumProvider};
pub use parameters::{
    AnnotationProcessParameters, CollisionType, MsRefSearchParameters, SourceType, TargetOmics,
};
pub use process::{
    AnnotationProcess, AnnotationProcessError, AnnotationProgress, AnnotationSummary,
    CancellationToken,
};
pub use reference::{MoleculeReference, QueryFeature};
pub use result::{AnnotationState, MatchResult, MatchResultContainer};
pub use spectrum::SpectrumPeak;
