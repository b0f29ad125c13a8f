use std::collections::BTreeSet;
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};

use gms_array::Array;
use gms_conformance::beta_cases::PdfCheck;
use gms_conformance::case::{CaseRecord, CaseTier};
use gms_conformance::fixture_export::{build_case_corpus, corpus_digest};
use gms_conformance::grid::GridSpec;
use gms_conformance::manifold_cases::ManifoldCheck;
use gms_conformance::metric_cases::MetricCheck;
use gms_conformance::{
    HarnessConfig, beta_cases, grassmannian_cases, landmarks_cases, run_all_geometry_suites,
    set_case_log_path,
};
use gms_random::DEFAULT_FIXTURE_SEED;

#[test]
fn geometry_suites_pass() {
    let cfg = HarnessConfig::default_paths();
    let suites = run_all_geometry_suites(&cfg).expect("geometry suites should execute");
    assert_eq!(suites.len(), 3);

    for suite in suites {
        assert!(
            suite.case_count > 0,
            "suite {} generated no cases",
            suite.suite
        );
        assert!(
            suite.all_passed(),
            "suite {} failed with {:?}",
            suite.suite,
            suite.failures
        );
    }
}

#[test]
fn geometry_suites_pass_in_hardened_mode_with_another_seed() {
    let mut cfg = HarnessConfig::default_paths().with_seed(0xC0FFEE);
    cfg.strict_mode = false;
    for suite in run_all_geometry_suites(&cfg).expect("suites") {
        assert!(
            suite.all_passed(),
            "suite {} failed with {:?}",
            suite.suite,
            suite.failures
        );
    }
}

const GRID_SEEDS: Range<u64> = 0..24;

const TANGENT_VEC_FAMILIES: [&str; 7] = [
    "exp_shape",
    "log_shape",
    "exp_belongs",
    "log_is_tangent",
    "log_after_exp",
    "exp_after_log",
    "inner_product_is_symmetric",
];

fn randomized<I>(cases: &[CaseRecord<I>]) -> impl Iterator<Item = &CaseRecord<I>> {
    cases.iter().filter(|case| case.tier != CaseTier::Smoke)
}

fn assert_in(grid: GridSpec, value: usize, id: &str, seed: u64) {
    assert!(
        grid.contains(value),
        "seed {seed}: {id} carries {value} outside {grid:?}"
    );
}

/// Leading axis length, or 1 for a bare point.
fn batch_len(array: &Array, point_ndim: usize) -> usize {
    if array.shape().len() > point_ndim {
        array.shape()[0]
    } else {
        1
    }
}

fn manifold_sample_count(check: &ManifoldCheck, point_ndim: usize) -> usize {
    match check {
        ManifoldCheck::RandomPointShape { n_points, .. }
        | ManifoldCheck::RandomPointBelongs { n_points, .. } => *n_points,
        ManifoldCheck::Belongs { point, .. } | ManifoldCheck::ProjectionBelongs { point } => {
            batch_len(point, point_ndim)
        }
        ManifoldCheck::ToTangentIsTangent { base_point, .. } => batch_len(base_point, point_ndim),
    }
}

fn metric_sample_count(check: &MetricCheck, point_ndim: usize) -> usize {
    let sampled = match check {
        MetricCheck::ExpShape { tangent_vec, .. } => tangent_vec,
        MetricCheck::LogShape { point, .. }
        | MetricCheck::DistPointToItselfIsZero { point } => point,
        MetricCheck::ExpBelongs { base_point, .. }
        | MetricCheck::LogIsTangent { base_point, .. }
        | MetricCheck::LogAfterExp { base_point, .. }
        | MetricCheck::ExpAfterLog { base_point, .. }
        | MetricCheck::InnerProductIsSymmetric { base_point, .. } => base_point,
        MetricCheck::SquaredDistIsSymmetric { point_a, .. }
        | MetricCheck::DistIsPositive { point_a, .. } => point_a,
        MetricCheck::GeodesicIvpBelongs { initial_point, .. }
        | MetricCheck::GeodesicBvpBelongs { initial_point, .. } => initial_point,
        other => panic!("no randomized sample count for {other:?}"),
    };
    batch_len(sampled, point_ndim)
}

fn metric_grid(family: &str, n_vecs: GridSpec, n_points: GridSpec) -> GridSpec {
    if TANGENT_VEC_FAMILIES.contains(&family) {
        n_vecs
    } else {
        n_points
    }
}

/// `(dim, k)` of `landmarks(hypersphere(dim), k)` or
/// `landmarks(euclidean(dim + 1), k)`, possibly wrapped in a metric name.
fn landmark_params(entity: &str) -> (usize, usize) {
    let (_, inner) = entity.split_once("landmarks(").expect("landmarks entity");
    let (ambient, k) = inner.trim_end_matches(')').rsplit_once(", ").expect("k");
    let digits: String = ambient.chars().filter(char::is_ascii_digit).collect();
    let ambient_dim: usize = digits.parse().expect("ambient dim");
    let dim = if ambient.starts_with("euclidean") {
        ambient_dim - 1
    } else {
        ambient_dim
    };
    (dim, k.parse().expect("k"))
}

/// `(n, k)` of `grassmannian(n, k)`, possibly wrapped in a metric name.
fn grassmannian_params(entity: &str) -> (usize, usize) {
    let (_, inner) = entity
        .split_once("grassmannian(")
        .expect("grassmannian entity");
    let (n, k) = inner.trim_end_matches(')').split_once(", ").expect("n, k");
    (n.parse().expect("n"), k.parse().expect("k"))
}

#[test]
fn beta_case_parameters_stay_in_their_grids() {
    for seed in GRID_SEEDS {
        let cfg = HarnessConfig::default_paths().with_seed(seed);
        let cases = beta_cases::beta_cases(&cfg).expect("beta cases");

        let mut families = BTreeSet::new();
        for case in randomized(&cases.manifold) {
            let grid = match case.family {
                // Fixed `(2,)` and `(5, 3)` shapes.
                "random_point" => continue,
                "random_point_belongs" => beta_cases::N_POINTS_GRID,
                "random_point_shape" | "projection_belongs" => beta_cases::N_SAMPLES_GRID,
                "to_tangent_is_tangent" => beta_cases::N_VECS_GRID,
                other => panic!("unexpected randomized family {other}"),
            };
            let n = manifold_sample_count(&case.input.check, 1);
            assert_in(grid, n, &case.id, seed);
            families.insert(case.family);
        }
        assert_eq!(families.len(), 4, "seed {seed}: {families:?}");

        for case in randomized(&cases.metric) {
            let grid = metric_grid(
                case.family,
                beta_cases::N_VECS_GRID,
                beta_cases::N_POINTS_GRID,
            );
            let n = metric_sample_count(&case.input.check, 1);
            assert_in(grid, n, &case.id, seed);
        }

        for case in randomized(&cases.pdf) {
            let PdfCheck::PointToPdfVectorization { points, .. } = &case.input.check else {
                panic!("{}: unexpected randomized pdf check", case.id);
            };
            assert_in(beta_cases::N_POINTS_GRID, points.shape()[0], &case.id, seed);
        }
    }
}

#[test]
fn landmarks_case_parameters_stay_in_their_grids() {
    for seed in GRID_SEEDS {
        let cfg = HarnessConfig::default_paths().with_seed(seed);
        let cases = landmarks_cases::landmarks_cases(&cfg).expect("landmarks cases");

        for case in randomized(&cases.manifold) {
            let (dim, k) = landmark_params(&case.input.entity);
            assert_in(landmarks_cases::DIM_GRID, dim, &case.id, seed);
            assert_in(landmarks_cases::N_LANDMARKS_GRID, k, &case.id, seed);
            let grid = match case.family {
                "to_tangent_is_tangent" => landmarks_cases::N_VECS_GRID,
                _ => landmarks_cases::N_POINTS_GRID,
            };
            let n = manifold_sample_count(&case.input.check, 2);
            assert_in(grid, n, &case.id, seed);
        }

        let mut count = 0;
        for case in randomized(&cases.metric) {
            let (dim, k) = landmark_params(&case.input.entity);
            assert_in(landmarks_cases::DIM_GRID, dim, &case.id, seed);
            assert_in(landmarks_cases::METRIC_N_LANDMARKS_GRID, k, &case.id, seed);
            let grid = metric_grid(
                case.family,
                landmarks_cases::N_VECS_GRID,
                landmarks_cases::METRIC_N_POINTS_GRID,
            );
            let n = metric_sample_count(&case.input.check, 2);
            assert_in(grid, n, &case.id, seed);
            count += 1;
        }
        assert!(count > 0, "seed {seed}: no randomized metric cases");
    }
}

#[test]
fn grassmannian_case_parameters_stay_in_their_grids() {
    for seed in GRID_SEEDS {
        let cfg = HarnessConfig::default_paths().with_seed(seed);
        let cases = grassmannian_cases::grassmannian_cases(&cfg).expect("grassmannian cases");

        let entities = cases.manifold.iter().map(|case| &case.input.entity);
        let metric_entities = cases.metric.iter().map(|case| &case.input.entity);
        for entity in entities.chain(metric_entities) {
            let (n, k) = grassmannian_params(entity);
            assert!(k < n, "seed {seed}: {entity}");
        }

        for case in randomized(&cases.manifold) {
            let (n, k) = grassmannian_params(&case.input.entity);
            assert_in(grassmannian_cases::N_GRID, n, &case.id, seed);
            assert_in(grassmannian_cases::K_GRID, k, &case.id, seed);
            let grid = match case.family {
                "to_tangent_is_tangent" => grassmannian_cases::N_VECS_GRID,
                _ => grassmannian_cases::N_POINTS_GRID,
            };
            let count = manifold_sample_count(&case.input.check, 2);
            assert_in(grid, count, &case.id, seed);
        }

        let mut metric_count = 0;
        for case in randomized(&cases.metric) {
            let (n, k) = grassmannian_params(&case.input.entity);
            assert_in(grassmannian_cases::N_GRID, n, &case.id, seed);
            assert_in(grassmannian_cases::K_GRID, k, &case.id, seed);
            let grid = metric_grid(
                case.family,
                grassmannian_cases::N_VECS_GRID,
                grassmannian_cases::N_POINTS_GRID,
            );
            let count = metric_sample_count(&case.input.check, 2);
            assert_in(grid, count, &case.id, seed);
            metric_count += 1;
        }
        assert!(metric_count > 0, "seed {seed}: no randomized metric cases");
    }
}

#[test]
fn corpus_digest_is_reproducible_per_seed() {
    let cfg = HarnessConfig::default_paths();
    let first = corpus_digest(&build_case_corpus(&cfg).expect("corpus")).expect("digest");
    let again = corpus_digest(&build_case_corpus(&cfg).expect("corpus")).expect("digest");
    assert_eq!(first, again);
    assert_eq!(first.len(), 64);

    let other = cfg.with_seed(7);
    let different = corpus_digest(&build_case_corpus(&other).expect("corpus")).expect("digest");
    assert_ne!(first, different);
}

#[test]
fn case_log_records_one_json_line_per_case() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let dir = std::env::temp_dir().join(format!("gms_case_log_{nanos}"));
    let path = dir.join("cases.jsonl");
    set_case_log_path(Some(path.clone()));
    let report = grassmannian_cases::run_grassmannian_suite(&HarnessConfig::default_paths())
        .expect("suite");
    set_case_log_path(None);

    let text = std::fs::read_to_string(&path).expect("case log");
    let entries: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let own: Vec<_> = entries
        .iter()
        .filter(|entry| entry["suite"] == "grassmannian" && entry["seed"] == DEFAULT_FIXTURE_SEED)
        .collect();
    assert!(own.len() >= report.case_count);
    for entry in own {
        assert!(entry["fixture_id"].is_string());
        assert!(entry["passed"].is_boolean());
        assert_eq!(entry["mode"], "strict");
    }
    let _ = std::fs::remove_dir_all(&dir);
}
