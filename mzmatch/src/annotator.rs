//! Annotators bind a searcher, a scorer and an evaluator to one reference database.
//!
//! Every annotator kind is served by [`ReferenceAnnotator`], the kind selecting the
//! scoring policy and validation rules. An annotator can be reduced to a small
//! [`RestorationKey`] and rebuilt later from that key and a re-loaded database.
use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::{DatabaseError, ReferenceDatabase};
use crate::evaluator::{MatchResultEvaluator, ThresholdEvaluator};
use crate::lipid::{is_refinement_of, LipidNameCache};
use crate::parameters::{CollisionType, MsRefSearchParameters, SourceType, TargetOmics};
use crate::reference::{MoleculeReference, QueryFeature};
use crate::result::MatchResult;
use crate::scorer::MsReferenceScorer;
use crate::search::ReferenceSearcher;
use crate::validation::{
    LipidValidator, MatchValidator, PeptideValidator, StandardValidator, TextDbValidator,
};

#[derive(Debug, Error)]
pub enum AnnotatorError {
    #[error("No reference database was provided for annotator {0:?}")]
    MissingDatabase(String),
    #[error("No search parameters were provided for annotator {0:?}")]
    MissingParameter(String),
    #[error("Annotators require a non-empty key")]
    EmptyKey,
    #[error("{kind} annotators cannot be saved with a {source_type} database")]
    UnsupportedSource {
        kind: AnnotatorKind,
        source_type: SourceType,
    },
    #[error("{kind} annotators require an electron-activated collision type, not {collision_type}")]
    UnsupportedCollisionType {
        kind: AnnotatorKind,
        collision_type: CollisionType,
    },
    #[error("Cannot restore a {key_source} annotator from a {database_source} database")]
    RestorationMismatch {
        key_source: SourceType,
        database_source: SourceType,
    },
    #[error("A database error occurred: {0}")]
    DatabaseError(
        #[from]
        #[source]
        DatabaseError,
    ),
}

/// The variants of annotation policy
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotatorKind {
    /// Metabolite spectral libraries
    #[default]
    Mass,
    Lipid,
    /// Lipid libraries of electron-activated spectra
    EadLipid,
    /// Compound lists without spectra
    TextDb,
    Peptide,
}

impl Display for AnnotatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl AnnotatorKind {
    pub fn omics(&self) -> TargetOmics {
        match self {
            Self::Mass | Self::TextDb => TargetOmics::Metabolomics,
            Self::Lipid | Self::EadLipid => TargetOmics::Lipidomics,
            Self::Peptide => TargetOmics::Proteomics,
        }
    }

    pub fn validator(&self) -> Arc<dyn MatchValidator> {
        match self {
            Self::Mass => Arc::new(StandardValidator),
            Self::Lipid | Self::EadLipid => Arc::new(LipidValidator),
            Self::TextDb => Arc::new(TextDbValidator),
            Self::Peptide => Arc::new(PeptideValidator),
        }
    }

    /// Whether matched names are refined against the lipid structure evidence
    pub fn refines_lipid_names(&self) -> bool {
        matches!(self, Self::Lipid | Self::EadLipid)
    }

    pub fn is_peptide(&self) -> bool {
        matches!(self, Self::Peptide)
    }

    /// The collision type used over a `source` database when none is configured.
    ///
    /// Electron-activated lipid annotators take it from the library type, falling
    /// back to OAD.
    pub fn default_collision_type(&self, source: SourceType) -> CollisionType {
        match self {
            Self::EadLipid => CollisionType::for_source(source).unwrap_or(CollisionType::OAD),
            _ => CollisionType::default(),
        }
    }

    /// Whether `collision_type` can be scored by an annotator of this kind
    pub fn accepts_collision_type(&self, collision_type: CollisionType) -> bool {
        match self {
            Self::EadLipid => collision_type.is_electron_activated(),
            _ => true,
        }
    }

    /// Whether an annotator of this kind over a `source` database can be saved
    pub fn supports_source(&self, source: SourceType) -> bool {
        matches!(
            (self, source),
            (Self::Mass, SourceType::Msp)
                | (Self::Lipid, SourceType::Lbm | SourceType::Msp)
                | (
                    Self::EadLipid,
                    SourceType::OadLipid | SourceType::EidLipid | SourceType::EieioLipid
                )
                | (Self::TextDb, SourceType::Text)
                | (Self::Peptide, SourceType::Fasta)
        )
    }
}

/// The public contract of every annotator.
pub trait Annotator: Send + Sync {
    fn key(&self) -> &str;

    fn priority(&self) -> i32;

    fn kind(&self) -> AnnotatorKind;

    fn parameters(&self) -> &MsRefSearchParameters;

    /// The references within the query's search window, in ascending mass order
    fn search(&self, query: &QueryFeature) -> Vec<&MoleculeReference>;

    /// Score `query` against `reference`
    fn calculate_score(&self, query: &QueryFeature, reference: &MoleculeReference) -> MatchResult;

    /// Search and score every candidate for `query`, best total score first. Equal
    /// scores keep their ascending mass order.
    fn find_candidates(&self, query: &QueryFeature) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = self
            .search(query)
            .into_iter()
            .map(|r| self.calculate_score(query, r))
            .collect();
        results.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        results
    }

    /// Recover the reference a result was computed against from the identity fields
    /// it carries.
    fn refer(&self, result: &MatchResult) -> Option<&MoleculeReference>;

    /// Re-derive the flags of `result` against this annotator's own parameters
    fn validate(&self, result: &mut MatchResult, query: &QueryFeature, reference: &MoleculeReference) {
        self.validate_with(result, query, reference, self.parameters())
    }

    /// Re-derive the flags of `result` against `params` without rescoring
    fn validate_with(
        &self,
        result: &mut MatchResult,
        query: &QueryFeature,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    );

    fn evaluator(&self) -> &dyn MatchResultEvaluator<MatchResult>;
}

/// The minimal description of an annotator from which an equivalent one can be
/// rebuilt, given its re-loaded database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationKey {
    pub kind: AnnotatorKind,
    pub key: String,
    pub priority: i32,
    pub parameters: MsRefSearchParameters,
    pub source: SourceType,
    pub collision_type: CollisionType,
}

impl RestorationKey {
    /// Rebuild the annotator this key describes over `database` through `visitor`.
    pub fn accept<V: RestorationVisitor + ?Sized>(
        &self,
        visitor: &V,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        if database.source() != self.source {
            return Err(AnnotatorError::RestorationMismatch {
                key_source: self.source,
                database_source: database.source(),
            });
        }
        match self.kind {
            AnnotatorKind::Mass => visitor.visit_mass(self, database),
            AnnotatorKind::Lipid => visitor.visit_lipid(self, database),
            AnnotatorKind::EadLipid => visitor.visit_ead_lipid(self, database),
            AnnotatorKind::TextDb => visitor.visit_text_db(self, database),
            AnnotatorKind::Peptide => visitor.visit_peptide(self, database),
        }
    }
}

/// Rebuilds annotators from their [`RestorationKey`], one method per kind
pub trait RestorationVisitor {
    fn visit_mass(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError>;

    fn visit_lipid(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError>;

    fn visit_ead_lipid(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError>;

    fn visit_text_db(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError>;

    fn visit_peptide(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError>;
}

/// Rebuilds every kind as a [`ReferenceAnnotator`], sharing one lipid name cache
#[derive(Debug, Default, Clone)]
pub struct DefaultRestorationVisitor {
    pub lipid_names: Arc<LipidNameCache>,
}

impl DefaultRestorationVisitor {
    pub fn new(lipid_names: Arc<LipidNameCache>) -> Self {
        Self { lipid_names }
    }

    fn rebuild(
        &self,
        kind: AnnotatorKind,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        let annotator = AnnotatorBuilder::new(kind, key.key.clone())
            .priority(key.priority)
            .collision_type(key.collision_type)
            .parameters(key.parameters.clone())
            .database(database)
            .lipid_names(self.lipid_names.clone())
            .build()?;
        Ok(Arc::new(annotator))
    }
}

impl RestorationVisitor for DefaultRestorationVisitor {
    fn visit_mass(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        self.rebuild(AnnotatorKind::Mass, key, database)
    }

    fn visit_lipid(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        self.rebuild(AnnotatorKind::Lipid, key, database)
    }

    fn visit_ead_lipid(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        self.rebuild(AnnotatorKind::EadLipid, key, database)
    }

    fn visit_text_db(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        self.rebuild(AnnotatorKind::TextDb, key, database)
    }

    fn visit_peptide(
        &self,
        key: &RestorationKey,
        database: Arc<ReferenceDatabase>,
    ) -> Result<Arc<dyn Annotator>, AnnotatorError> {
        self.rebuild(AnnotatorKind::Peptide, key, database)
    }
}

/// An annotator whose state can be persisted without embedding its database
pub trait Restorable {
    fn save(&self) -> Result<RestorationKey, AnnotatorError>;

    /// Persist the bound database to `writer`
    fn save_database(&self, writer: &mut dyn Write) -> Result<(), AnnotatorError>;
}

/// A serializable description of an annotator to build over a database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub kind: AnnotatorKind,
    pub key: String,
    pub priority: i32,
    /// Derived from the kind and the database when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision_type: Option<CollisionType>,
    pub parameters: MsRefSearchParameters,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            kind: AnnotatorKind::Mass,
            key: String::new(),
            priority: 1,
            collision_type: None,
            parameters: MsRefSearchParameters::default(),
        }
    }
}

impl AnnotatorConfig {
    pub fn builder(&self) -> AnnotatorBuilder {
        let builder = AnnotatorBuilder::new(self.kind, self.key.clone())
            .priority(self.priority)
            .parameters(self.parameters.clone());
        match self.collision_type {
            Some(collision_type) => builder.collision_type(collision_type),
            None => builder,
        }
    }
}

/// Assembles a [`ReferenceAnnotator`], failing if a required part is missing
#[derive(Debug, Clone)]
pub struct AnnotatorBuilder {
    kind: AnnotatorKind,
    key: String,
    priority: i32,
    collision_type: Option<CollisionType>,
    parameters: Option<MsRefSearchParameters>,
    database: Option<Arc<ReferenceDatabase>>,
    lipid_names: Option<Arc<LipidNameCache>>,
}

impl AnnotatorBuilder {
    pub fn new(kind: AnnotatorKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            priority: 1,
            collision_type: None,
            parameters: None,
            database: None,
            lipid_names: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn collision_type(mut self, collision_type: CollisionType) -> Self {
        self.collision_type = Some(collision_type);
        self
    }

    pub fn parameters(mut self, parameters: MsRefSearchParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn database(mut self, database: Arc<ReferenceDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn lipid_names(mut self, lipid_names: Arc<LipidNameCache>) -> Self {
        self.lipid_names = Some(lipid_names);
        self
    }

    pub fn build(self) -> Result<ReferenceAnnotator, AnnotatorError> {
        if self.key.trim().is_empty() {
            return Err(AnnotatorError::EmptyKey);
        }
        let database = self
            .database
            .ok_or_else(|| AnnotatorError::MissingDatabase(self.key.clone()))?;
        let parameters = self
            .parameters
            .ok_or_else(|| AnnotatorError::MissingParameter(self.key.clone()))?;
        let collision_type = self
            .collision_type
            .unwrap_or_else(|| self.kind.default_collision_type(database.source()));
        if !self.kind.accepts_collision_type(collision_type) {
            return Err(AnnotatorError::UnsupportedCollisionType {
                kind: self.kind,
                collision_type,
            });
        }

        let mut scorer = MsReferenceScorer::new(
            self.key.clone(),
            self.priority,
            database.source(),
            self.kind.omics(),
            collision_type,
            self.kind.validator(),
        );
        if self.kind.refines_lipid_names() {
            scorer = scorer.with_lipid_refinement(self.lipid_names.unwrap_or_default());
        }

        Ok(ReferenceAnnotator {
            kind: self.kind,
            key: self.key,
            priority: self.priority,
            collision_type,
            searcher: ReferenceSearcher::new(parameters.clone()),
            evaluator: ThresholdEvaluator::new(parameters.total_score_cutoff),
            scorer,
            parameters,
            database,
        })
    }
}

/// The annotator serving every [`AnnotatorKind`]
#[derive(Debug, Clone)]
pub struct ReferenceAnnotator {
    kind: AnnotatorKind,
    key: String,
    priority: i32,
    collision_type: CollisionType,
    parameters: MsRefSearchParameters,
    searcher: ReferenceSearcher,
    scorer: MsReferenceScorer,
    evaluator: ThresholdEvaluator,
    database: Arc<ReferenceDatabase>,
}

impl ReferenceAnnotator {
    pub fn database(&self) -> &Arc<ReferenceDatabase> {
        &self.database
    }

    pub fn collision_type(&self) -> CollisionType {
        self.collision_type
    }

    pub fn scorer(&self) -> &MsReferenceScorer {
        &self.scorer
    }
}

impl Annotator for ReferenceAnnotator {
    fn key(&self) -> &str {
        &self.key
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn kind(&self) -> AnnotatorKind {
        self.kind
    }

    fn parameters(&self) -> &MsRefSearchParameters {
        &self.parameters
    }

    fn search(&self, query: &QueryFeature) -> Vec<&MoleculeReference> {
        self.searcher.search(self.database.references(), query)
    }

    fn calculate_score(&self, query: &QueryFeature, reference: &MoleculeReference) -> MatchResult {
        self.scorer.score(query, reference, &self.parameters)
    }

    fn refer(&self, result: &MatchResult) -> Option<&MoleculeReference> {
        if let Some(reference) = self.database.get_by_id(result.library_id) {
            if reference.inchikey == result.inchikey {
                return Some(reference);
            }
        }
        if result.inchikey.is_empty() {
            return None;
        }
        self.database.iter().find(|r| {
            r.inchikey == result.inchikey
                && match self.scorer.lipid_names() {
                    Some(cache) => is_refinement_of(&result.name, &r.name, cache),
                    None => r.name == result.name,
                }
        })
    }

    fn validate_with(
        &self,
        result: &mut MatchResult,
        query: &QueryFeature,
        reference: &MoleculeReference,
        params: &MsRefSearchParameters,
    ) {
        self.scorer.validate(result, query, reference, params)
    }

    fn evaluator(&self) -> &dyn MatchResultEvaluator<MatchResult> {
        &self.evaluator
    }
}

impl Restorable for ReferenceAnnotator {
    fn save(&self) -> Result<RestorationKey, AnnotatorError> {
        let source = self.database.source();
        if !self.kind.supports_source(source) {
            return Err(AnnotatorError::UnsupportedSource {
                kind: self.kind,
                source_type: source,
            });
        }
        Ok(RestorationKey {
            kind: self.kind,
            key: self.key.clone(),
            priority: self.priority,
            parameters: self.parameters.clone(),
            source,
            collision_type: self.collision_type,
        })
    }

    fn save_database(&self, writer: &mut dyn Write) -> Result<(), AnnotatorError> {
        self.database.save(writer)?;
        Ok(())
    }
}
