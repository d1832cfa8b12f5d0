//! Range search over references sorted by precursor mass
use crate::parameters::MsRefSearchParameters;
use crate::reference::{MoleculeReference, PrecursorMass, QueryFeature};
use crate::tolerance::SearchQuery;

/// Locate the contiguous run of `sorted` whose precursor mass lies in `[lower, upper]`.
///
/// `sorted` must be ordered ascending by [`PrecursorMass::precursor_mz`], otherwise the
/// result is meaningless. An empty or inverted range yields an empty slice.
#[inline]
pub fn search_range<T: PrecursorMass>(sorted: &[T], lower: f64, upper: f64) -> &[T] {
    let start = sorted.partition_point(|r| r.precursor_mz() < lower);
    let end = sorted.partition_point(|r| r.precursor_mz() <= upper);
    if start >= end {
        &sorted[0..0]
    } else {
        &sorted[start..end]
    }
}

/// The projection of a [`QueryFeature`] onto every searched dimension.
///
/// Only the mass dimension is encoded in the sort order of a reference collection, the
/// others are checked against each candidate inside the mass window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    pub mass: SearchQuery,
    pub retention_time: Option<SearchQuery>,
    /// The query CCS and the tolerance in percent of the reference CCS
    pub ccs: Option<(f64, f64)>,
}

impl SearchWindow {
    pub fn from_query(query: &QueryFeature, params: &MsRefSearchParameters) -> Self {
        let mass = SearchQuery::mass(query.precursor_mz, params.ms1_tolerance);
        let retention_time = if params.is_use_time_for_annotation_filtering
            && query.retention_time >= 0.0
        {
            Some(SearchQuery::new(query.retention_time, params.rt_tolerance))
        } else {
            None
        };
        let ccs = if params.is_use_ccs_for_annotation_filtering {
            query
                .ccs
                .filter(|c| *c > 0.0)
                .map(|c| (c, params.ccs_tolerance))
        } else {
            None
        };
        Self {
            mass,
            retention_time,
            ccs,
        }
    }

    /// Whether `reference` passes the non-mass dimensions. A reference lacking a value
    /// for a dimension is not excluded by it.
    pub fn admits(&self, reference: &MoleculeReference) -> bool {
        let reference_rt = reference.retention_time.filter(|rt| *rt >= 0.0);
        if let (Some(window), Some(rt)) = (self.retention_time, reference_rt) {
            if !window.contains(rt) {
                return false;
            }
        }
        if let (Some((query_ccs, percent)), Some(ccs)) = (self.ccs, reference.ccs) {
            if ccs > 0.0 && !SearchQuery::relative(ccs, percent).contains(query_ccs) {
                return false;
            }
        }
        true
    }
}

/// Finds the references a query could plausibly match
#[derive(Debug, Clone, Default)]
pub struct ReferenceSearcher {
    parameters: MsRefSearchParameters,
}

impl ReferenceSearcher {
    pub fn new(parameters: MsRefSearchParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &MsRefSearchParameters {
        &self.parameters
    }

    /// Return every reference within the query's mass window that also satisfies the
    /// enabled retention time and CCS filters, in ascending mass order.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn search<'a>(
        &self,
        references: &'a [MoleculeReference],
        query: &QueryFeature,
    ) -> Vec<&'a MoleculeReference> {
        let window = SearchWindow::from_query(query, &self.parameters);
        search_range(references, window.mass.lower(), window.mass.upper())
            .iter()
            .filter(|r| window.admits(r))
            .collect()
    }
}
