use std::io;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mzmatch::annotator::{Annotator, AnnotatorBuilder, AnnotatorKind};
use mzmatch::evaluator::{MatchResultEvaluator, ThresholdEvaluator};
use mzmatch::feature::{AnnotationStage, SpectrumProvider};
use mzmatch::search::search_range;
use mzmatch::spectrum::{IsotopePeak, C13_C12_DIFFERENCE};
use mzmatch::tolerance::mass_tolerance_at;
use mzmatch::*;

fn lpc_spectrum() -> Vec<SpectrumPeak> {
    vec![
        SpectrumPeak::new(86.0964, 120.0),
        SpectrumPeak::new(104.1070, 310.0),
        SpectrumPeak::new(184.0733, 999.0),
        SpectrumPeak::new(478.3292, 80.0),
        SpectrumPeak::new(496.3398, 240.0),
    ]
}

fn caffeine_spectrum() -> Vec<SpectrumPeak> {
    vec![
        SpectrumPeak::new(42.0338, 40.0),
        SpectrumPeak::new(110.0713, 120.0),
        SpectrumPeak::new(138.0662, 999.0),
        SpectrumPeak::new(195.0877, 310.0),
    ]
}

fn library() -> Arc<ReferenceDatabase> {
    let references = vec![
        MoleculeReference::new(1, "LPC 16:0", 496.3398)
            .with_inchikey("ASWBNKHCZGQVJV-HSZRJFAPSA-N")
            .with_spectrum(lpc_spectrum()),
        MoleculeReference::new(2, "Caffeine", 195.0877)
            .with_inchikey("RYYVLZVUVIJVGH-UHFFFAOYSA-N")
            .with_spectrum(caffeine_spectrum())
            .with_isotopes(vec![
                IsotopePeak::new(195.0877, 1000.0),
                IsotopePeak::new(195.0877 + C13_C12_DIFFERENCE, 100.0),
                IsotopePeak::new(195.0877 + 2.0 * C13_C12_DIFFERENCE, 12.0),
            ]),
        MoleculeReference::new(3, "Theophylline", 181.0720)
            .with_inchikey("ZFXYFBGIUFBOJW-UHFFFAOYSA-N"),
    ];
    Arc::new(ReferenceDatabase::new("library", SourceType::Msp, references))
}

fn make_process(threads: i32) -> AnnotationProcess {
    let annotator = AnnotatorBuilder::new(AnnotatorKind::Mass, "msp")
        .parameters(MsRefSearchParameters::default())
        .database(library())
        .build()
        .unwrap();
    AnnotationProcess::new(
        vec![Arc::new(annotator)],
        AnnotationProcessParameters::new(3, threads),
    )
}

fn make_run() -> (Vec<PeakFeature>, Vec<DeconvolutionResult>) {
    let features = vec![
        PeakFeature::new(0, 496.3399, 4.2),
        PeakFeature::new(1, 195.0878, 1.1).with_ms1_spectrum(0),
        PeakFeature::new(2, 181.0721, 0.9),
        PeakFeature::new(3, 612.0, 7.0),
    ];
    let deconvolutions = vec![
        DeconvolutionResult::new(lpc_spectrum()),
        DeconvolutionResult::new(caffeine_spectrum()),
        DeconvolutionResult::default(),
        DeconvolutionResult::new(vec![SpectrumPeak::new(300.0, 10.0)]),
    ];
    (features, deconvolutions)
}

fn ms1_provider() -> InMemorySpectrumProvider {
    let mut provider = InMemorySpectrumProvider::default();
    provider.insert(
        0,
        vec![
            SpectrumPeak::new(195.0878, 5000.0),
            SpectrumPeak::new(195.0878 + C13_C12_DIFFERENCE, 500.0),
            SpectrumPeak::new(195.0878 + 2.0 * C13_C12_DIFFERENCE, 60.0),
        ],
    );
    provider
}

#[test]
fn test_search_agrees_with_linear_scan() {
    let mut rng = StdRng::seed_from_u64(42);
    for size in [0usize, 1, 2, 7, 64, 500] {
        let references: Vec<MoleculeReference> = (0..size)
            .map(|i| MoleculeReference::new(i as u32, format!("r{i}"), rng.gen_range(0..1000) as f64 / 4.0))
            .collect();
        let db = ReferenceDatabase::new("db", SourceType::Msp, references);
        for _ in 0..50 {
            let a: f64 = rng.gen_range(0.0..260.0);
            let b = a + rng.gen_range(0.0..20.0);
            let found: Vec<u32> = search_range(db.references(), a, b)
                .iter()
                .map(|r| r.scan_id)
                .collect();
            let expected: Vec<u32> = db
                .iter()
                .filter(|r| a <= r.precursor_mz && r.precursor_mz <= b)
                .map(|r| r.scan_id)
                .collect();
            assert_eq!(found, expected, "size {size} [{a}, {b}]");
        }
    }
}

#[test]
fn test_tolerance_policy() {
    assert_eq!(mass_tolerance_at(500.0, 0.01), 0.01);
    let ppm = 0.01 / 500.0 * 1e6;
    assert!((mass_tolerance_at(1000.0, 0.01) - 1000.0 * ppm * 1e-6).abs() < 1e-12);
}

#[test]
fn test_tolerance_scenario() {
    let db = Arc::new(ReferenceDatabase::new(
        "db",
        SourceType::Msp,
        vec![MoleculeReference::new(0, "X", 500.0005)],
    ));
    let query = QueryFeature::new(500.0, 1.0);
    for (tolerance, expected) in [(0.005, 1), (0.0001, 0)] {
        let annotator = AnnotatorBuilder::new(AnnotatorKind::Mass, "a")
            .parameters(MsRefSearchParameters::default().with_ms1_tolerance(tolerance))
            .database(db.clone())
            .build()
            .unwrap();
        assert_eq!(annotator.search(&query).len(), expected);
        assert_eq!(annotator.find_candidates(&query).len(), expected);
    }
}

#[test_log::test]
fn test_annotation_run() {
    let (mut features, deconvolutions) = make_run();
    let progress = AnnotationProgress::new();
    let summary = make_process(2)
        .run(
            &mut features,
            &deconvolutions,
            &ms1_provider(),
            &CancellationToken::new(),
            &progress,
        )
        .unwrap();

    assert_eq!(summary.features, 4);
    assert_eq!(summary.reference_matched, 2);
    assert_eq!(summary.suggested, 1);
    assert_eq!(summary.unknown, 1);
    assert_eq!(progress.completed(), 4);

    assert_eq!(features[0].name, "LPC 16:0");
    assert_eq!(features[1].name, "Caffeine");
    let caffeine = &features[1].match_results.results()[0];
    assert!(caffeine.isotope_similarity > 0.9, "{}", caffeine.isotope_similarity);

    // no spectrum, so only a suggestion
    assert_eq!(features[2].name, "Theophylline");
    assert_eq!(features[2].annotation_state, AnnotationState::Suggested);
    assert_eq!(features[2].ms2_spectrum_source, None);

    assert_eq!(features[3].annotation_state, AnnotationState::Unknown);
    for f in features.iter() {
        assert_eq!(f.stage, AnnotationStage::RepresentativeAssigned);
    }
}

#[test]
fn test_isotope_sibling_fallback() {
    let mut features = vec![
        PeakFeature::new(10, 496.3399, 4.2).with_isotope_cluster(10, 0),
        PeakFeature::new(11, 497.3432, 4.2).with_isotope_cluster(10, 1),
        PeakFeature::new(12, 195.0878, 1.1),
    ];
    let deconvolutions = vec![
        DeconvolutionResult::default(),
        DeconvolutionResult::new(lpc_spectrum()),
        DeconvolutionResult::default(),
    ];
    make_process(1)
        .run(
            &mut features,
            &deconvolutions,
            &InMemorySpectrumProvider::default(),
            &CancellationToken::new(),
            &AnnotationProgress::new(),
        )
        .unwrap();

    assert_eq!(features[0].ms2_spectrum_source, Some(11));
    assert_eq!(features[0].annotation_state, AnnotationState::ReferenceMatched);
    assert_eq!(features[1].ms2_spectrum_source, Some(11));
    assert_eq!(features[2].ms2_spectrum_source, None);
}

#[test]
fn test_cancelled_before_start() {
    let (mut features, deconvolutions) = make_run();
    let before = features.clone();
    let token = CancellationToken::new();
    token.cancel();
    let progress = AnnotationProgress::new();
    let err = make_process(2)
        .run(&mut features, &deconvolutions, &ms1_provider(), &token, &progress)
        .unwrap_err();
    assert!(matches!(err, AnnotationProcessError::Cancelled));
    assert_eq!(features, before);
    assert_eq!(progress.completed(), 0);
}

/// Cancels the run as soon as the first spectrum is requested
struct CancellingProvider(CancellationToken);

impl SpectrumProvider for CancellingProvider {
    fn load_spectrum(&self, _index: usize) -> io::Result<Vec<SpectrumPeak>> {
        self.0.cancel();
        Ok(Vec::new())
    }
}

#[test]
fn test_cancelled_between_stages() {
    let (mut features, deconvolutions) = make_run();
    for f in features.iter_mut() {
        f.ms1_raw_spectrum_id = Some(0);
    }
    let token = CancellationToken::new();
    let err = make_process(1)
        .run(
            &mut features,
            &deconvolutions,
            &CancellingProvider(token.clone()),
            &token,
            &AnnotationProgress::new(),
        )
        .unwrap_err();
    assert!(matches!(err, AnnotationProcessError::Cancelled));
    for f in features.iter() {
        assert_eq!(f.stage, AnnotationStage::Unannotated);
        assert!(f.match_results.is_empty());
    }
}

struct FailingProvider;

impl SpectrumProvider for FailingProvider {
    fn load_spectrum(&self, index: usize) -> io::Result<Vec<SpectrumPeak>> {
        Err(io::Error::new(io::ErrorKind::NotFound, format!("no spectrum {index}")))
    }
}

#[test_log::test]
fn test_provider_failure_does_not_abort() {
    let (mut features, deconvolutions) = make_run();
    let summary = make_process(2)
        .run(
            &mut features,
            &deconvolutions,
            &FailingProvider,
            &CancellationToken::new(),
            &AnnotationProgress::new(),
        )
        .unwrap();
    assert_eq!(summary.reference_matched, 2);
    let caffeine = &features[1].match_results.results()[0];
    assert_eq!(caffeine.isotope_similarity, result::NOT_COMPUTED);
}

#[test]
fn test_inchikey_penalty_ranks_lower() {
    let db = Arc::new(ReferenceDatabase::new(
        "db",
        SourceType::Msp,
        vec![
            MoleculeReference::new(0, "Caffeine", 195.0877).with_spectrum(caffeine_spectrum()),
            MoleculeReference::new(1, "Caffeine", 195.0877)
                .with_inchikey("RYYVLZVUVIJVGH-UHFFFAOYSA-N")
                .with_spectrum(caffeine_spectrum()),
        ],
    ));
    let annotator = AnnotatorBuilder::new(AnnotatorKind::Mass, "a")
        .parameters(MsRefSearchParameters::default())
        .database(db)
        .build()
        .unwrap();
    let query = QueryFeature::new(195.0878, 1.0).with_spectrum(caffeine_spectrum());
    let candidates = annotator.find_candidates(&query);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].library_id, 1);
    assert!(candidates[0].total_score > candidates[1].total_score);
    let top = annotator.evaluator().select_top_hit(&candidates).unwrap();
    assert_eq!(top.inchikey, "RYYVLZVUVIJVGH-UHFFFAOYSA-N");
}

#[test]
fn test_top_n_against_sort() {
    let evaluator = ThresholdEvaluator::default();
    let results: Vec<MatchResult> = [0.42, 0.13, 0.99, 0.57, 0.08, 0.61, 0.35]
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut r = MatchResult::new(format!("r{i}"), i as u32, "", "a", 1, SourceType::Msp);
            r.total_score = *s;
            r
        })
        .collect();
    for n in 0..=results.len() + 1 {
        let mut sorted: Vec<f32> = results.iter().map(|r| r.total_score).collect();
        sorted.sort_by(|a, b| b.total_cmp(a));
        sorted.truncate(n);
        let top: Vec<f32> = evaluator
            .select_top_n(results.clone(), n)
            .iter()
            .map(|r| r.total_score)
            .collect();
        assert_eq!(top, sorted);
    }

    // tied scores: only the score multiset is asserted
    let tied: Vec<MatchResult> = (0..4)
        .map(|i| {
            let mut r = MatchResult::new(format!("t{i}"), i, "", "a", 1, SourceType::Msp);
            r.total_score = 0.5;
            r
        })
        .collect();
    let top = evaluator.select_top_n(tied, 2);
    assert!(top.iter().all(|r| r.total_score == 0.5));
    assert_eq!(top.len(), 2);
}

#[test]
fn test_deterministic_representatives() {
    let mut previous: Option<Vec<(String, u32, f32)>> = None;
    for _ in 0..3 {
        let (mut features, deconvolutions) = make_run();
        make_process(4)
            .run(
                &mut features,
                &deconvolutions,
                &ms1_provider(),
                &CancellationToken::new(),
                &AnnotationProgress::new(),
            )
            .unwrap();
        let representatives: Vec<(String, u32, f32)> = features
            .iter()
            .map(|f| match f.match_results.representative() {
                Some(r) => (r.name.clone(), r.library_id, r.total_score),
                None => (String::new(), 0, 0.0),
            })
            .collect();
        if let Some(previous) = previous.as_ref() {
            assert_eq!(previous, &representatives);
        }
        previous = Some(representatives);
    }
}

#[test]
fn test_peptides_first_and_win_ties() {
    let reference = || {
        MoleculeReference::new(5, "PEPTIDEK", 800.4167).with_inchikey("PEPTIDEK-KEY")
    };
    let peptides = Arc::new(ReferenceDatabase::new("peptides", SourceType::Fasta, vec![reference()]));
    let molecules = Arc::new(ReferenceDatabase::new("molecules", SourceType::Msp, vec![reference()]));
    let build = |kind, key: &str, priority, database: &Arc<ReferenceDatabase>| -> Arc<dyn Annotator> {
        Arc::new(
            AnnotatorBuilder::new(kind, key)
                .priority(priority)
                .database(database.clone())
                .build()
                .unwrap(),
        )
    };
    let process = AnnotationProcess::new(
        vec![
            build(AnnotatorKind::Mass, "mass-3", 3, &molecules),
            build(AnnotatorKind::Mass, "mass-2a", 2, &molecules),
            build(AnnotatorKind::Peptide, "fasta", 5, &peptides),
            build(AnnotatorKind::Mass, "mass-2b", 2, &molecules),
            build(AnnotatorKind::Mass, "mass-1", 1, &molecules),
        ],
        AnnotationProcessParameters::new(3, 1),
    );
    let order = ["fasta", "mass-1", "mass-2a", "mass-2b", "mass-3"];
    let keys: Vec<&str> = process.annotators().map(|a| a.key()).collect();
    assert_eq!(keys, order);

    let mut features = vec![PeakFeature::new(0, 800.4168, 3.0)];
    let deconvolutions = vec![DeconvolutionResult::default()];
    process
        .run(
            &mut features,
            &deconvolutions,
            &InMemorySpectrumProvider::default(),
            &CancellationToken::new(),
            &AnnotationProgress::new(),
        )
        .unwrap();

    let feature = &features[0];
    let attached: Vec<&str> = feature
        .match_results
        .iter()
        .map(|r| r.annotator_id.as_str())
        .collect();
    assert_eq!(attached, order);
    let scores: Vec<_> = feature.match_results.iter().map(|r| r.total_score).collect();
    assert!(scores.iter().all(|s| *s == scores[0] && *s > 0.0), "{scores:?}");

    let representative = feature.match_results.representative().unwrap();
    assert_eq!(representative.annotator_id, "fasta");
    assert_eq!(feature.annotator_id, "fasta");
    assert_eq!(feature.name, "PEPTIDEK");
    assert_eq!(feature.annotation_state, AnnotationState::Suggested);
}
