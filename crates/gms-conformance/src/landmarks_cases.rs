//! Landmark spaces over spheres and Euclidean spaces, and their L2 metric.

use std::sync::Arc;

use gms_array::Array;
use gms_geometry::{Euclidean, Hypersphere, Landmarks, RiemannianMetric};

use crate::case::{CaseRecord, generate_cases};
use crate::grid::{GridSpec, ParameterGrid};
use crate::manifold_cases::{
    ManifoldCase, SpaceUnderTest, execute_manifold_case, manifold_family_cases,
    random_point_belongs_cases,
};
use crate::metric_cases::{
    MetricCase, MetricCheck, MetricFamilyOptions, MetricGrids, MetricUnderTest,
    execute_metric_case, metric_family_cases,
};
use crate::runner::CaseRunner;
use crate::{HarnessConfig, SuiteReport};

pub const SUITE: &str = "landmarks";

pub const DIM_GRID: GridSpec = GridSpec::new(2, 4, 2);
pub const N_LANDMARKS_GRID: GridSpec = GridSpec::new(1, 5, 2);
pub const N_POINTS_GRID: GridSpec = GridSpec::new(1, 5, 4);
pub const N_VECS_GRID: GridSpec = GridSpec::new(2, 5, 2);
pub const METRIC_N_LANDMARKS_GRID: GridSpec = GridSpec::new(2, 5, 2);
pub const METRIC_N_POINTS_GRID: GridSpec = GridSpec::new(2, 5, 2);

pub const LOG_AFTER_EXP_AMPLITUDE: f64 = 30.0;
pub const N_SAMPLING_POINTS: usize = 10;
pub const N_LANDMARK_SETS: usize = 5;

const TANGENT_SCALE: f64 = 0.5;
const ATOL: f64 = 1e-8;
const NORTH_POLE: [f64; 3] = [0.0, 0.0, 1.0];

#[derive(Debug, Clone)]
pub struct LandmarksSuiteCases {
    pub manifold: Vec<CaseRecord<ManifoldCase>>,
    pub metric: Vec<CaseRecord<MetricCase>>,
}

fn ambient_metric(
    sphere: bool,
    dim: usize,
) -> Result<(String, Arc<dyn RiemannianMetric>), String> {
    let metric: Arc<dyn RiemannianMetric> = if sphere {
        let space = Hypersphere::new(dim).map_err(|err| err.to_string())?;
        Arc::new(space.metric())
    } else {
        let space = Euclidean::new(dim + 1).map_err(|err| err.to_string())?;
        Arc::new(space.metric())
    };
    let name = if sphere {
        format!("hypersphere({dim})")
    } else {
        format!("euclidean({})", dim + 1)
    };
    Ok((name, metric))
}

fn landmarks(sphere: bool, dim: usize, k: usize) -> Result<(String, Landmarks), String> {
    let (ambient_name, ambient) = ambient_metric(sphere, dim)?;
    let space = Landmarks::new(ambient, k).map_err(|err| err.to_string())?;
    Ok((format!("landmarks({ambient_name}, {k})"), space))
}

/// Sphere-backed spaces first, then their Euclidean counterparts.
fn landmark_spaces(dims: &[usize], ks: &[usize]) -> Result<Vec<(String, Landmarks)>, String> {
    let mut out = Vec::with_capacity(2 * dims.len());
    for sphere in [true, false] {
        for (&dim, &k) in dims.iter().zip(ks) {
            out.push(landmarks(sphere, dim, k)?);
        }
    }
    Ok(out)
}

fn space_target((entity, space): &(String, Landmarks)) -> SpaceUnderTest {
    SpaceUnderTest::new(entity.clone(), Arc::new(space.clone()), ATOL)
}

fn metric_target((entity, space): &(String, Landmarks)) -> MetricUnderTest {
    MetricUnderTest::new(
        format!("l2_metric({entity})"),
        Arc::new(space.metric()),
        ATOL,
        TANGENT_SCALE,
    )
}

fn manifold_cases(grid: &mut ParameterGrid) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let dims = grid.draw(DIM_GRID)?;
    let ks = grid.draw(N_LANDMARKS_GRID)?;
    let n_points = grid.draw(N_POINTS_GRID)?;
    let n_vecs = grid.draw(N_VECS_GRID)?;

    let targets: Vec<SpaceUnderTest> = landmark_spaces(&dims, &ks)?
        .iter()
        .map(space_target)
        .collect();
    let smoke = vec![
        (space_target(&landmarks(true, 2, 2)?), 1),
        (space_target(&landmarks(false, 2, 2)?), 2),
    ];
    let random: Vec<_> = targets
        .iter()
        .cloned()
        .zip(n_points.iter().copied())
        .collect();

    let mut cases = random_point_belongs_cases(&smoke, &random, grid.rng())?;
    cases.extend(manifold_family_cases(
        &targets,
        &n_points,
        &n_vecs,
        grid.rng(),
    )?);
    Ok(cases)
}

fn great_circle_from_pole(direction: [f64; 3], times: &[f64]) -> Vec<[f64; 3]> {
    times
        .iter()
        .map(|&t| {
            let (sin, cos) = t.sin_cos();
            [
                cos * NORTH_POLE[0] + sin * direction[0],
                cos * NORTH_POLE[1] + sin * direction[1],
                cos * NORTH_POLE[2] + sin * direction[2],
            ]
        })
        .collect()
}

fn dot3(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn angle_between(a: [f64; 3], b: [f64; 3]) -> f64 {
    let cross = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    dot3(cross, cross).sqrt().atan2(dot3(a, b))
}

/// Spherical linear interpolation between unit vectors.
fn slerp(a: [f64; 3], b: [f64; 3], s: f64) -> [f64; 3] {
    let omega = angle_between(a, b);
    if omega < 1e-12 {
        return a;
    }
    let wa = ((1.0 - s) * omega).sin() / omega.sin();
    let wb = (s * omega).sin() / omega.sin();
    [
        wa * a[0] + wb * b[0],
        wa * a[1] + wb * b[1],
        wa * a[2] + wb * b[2],
    ]
}

fn landmark_set(points: &[[f64; 3]]) -> Result<Array, String> {
    let values = points.iter().flatten().copied().collect();
    Array::new(vec![points.len(), 3], values).map_err(|err| err.to_string())
}

/// Landmark-wise great-circle interpolation, shape `(times, k, 3)`.
fn interpolate_sets(a: &[[f64; 3]], b: &[[f64; 3]], times: &[f64]) -> Result<Array, String> {
    let mut values = Vec::with_capacity(times.len() * a.len() * 3);
    for &s in times {
        for (&pa, &pb) in a.iter().zip(b) {
            values.extend(slerp(pa, pb, s));
        }
    }
    Array::new(vec![times.len(), a.len(), 3], values).map_err(|err| err.to_string())
}

fn landmark_rows(array: &Array, set: usize, k: usize) -> Vec<[f64; 3]> {
    let offset = set * k * 3;
    array.values()[offset..offset + k * 3]
        .chunks(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Three sets of landmarks sampled along S² geodesics leaving the north
/// pole, and the L2 checks built on the geodesics between them.
fn sphere_fixture_cases() -> Result<Vec<CaseRecord<MetricCase>>, String> {
    let (entity, space) = landmarks(true, 2, N_SAMPLING_POINTS)?;
    let target = metric_target(&(entity, space));

    let sampling_times = Array::linspace(0.0, 1.0, N_SAMPLING_POINTS).into_values();
    let set_a = great_circle_from_pole([1.0, 0.0, 0.0], &sampling_times);
    let set_b = great_circle_from_pole([0.0, 1.0, 0.0], &sampling_times);
    let set_c = great_circle_from_pole([-1.0, 0.0, 0.0], &sampling_times);

    let times = Array::linspace(0.0, 1.0, N_LANDMARK_SETS).into_values();
    let path_ab = interpolate_sets(&set_a, &set_b, &times)?;
    let path_bc = interpolate_sets(&set_b, &set_c, &times)?;

    let squared_lengths: Vec<f64> = (0..N_LANDMARK_SETS)
        .map(|set| {
            landmark_rows(&path_ab, set, N_SAMPLING_POINTS)
                .into_iter()
                .zip(landmark_rows(&path_bc, set, N_SAMPLING_POINTS))
                .map(|(p, q)| angle_between(p, q).powi(2))
                .sum()
        })
        .collect();

    let inner = MetricCase::new(
        &target,
        MetricCheck::InnerProductOfLogs {
            point: path_bc.clone(),
            base_point: path_ab.clone(),
            expected: Array::vector(squared_lengths),
        },
    )?;
    let exp = MetricCase::new(
        &target,
        MetricCheck::ExpAfterLog {
            point: path_bc.clone(),
            base_point: path_ab.clone(),
        },
    )?;
    let log = MetricCase::new(
        &target,
        MetricCheck::LogShape {
            point: path_bc,
            base_point: path_ab.clone(),
            expected_shape: vec![N_LANDMARK_SETS, N_SAMPLING_POINTS, 3],
        },
    )?;
    let geodesic = MetricCase::new(
        &target,
        MetricCheck::GeodesicBvp {
            initial_point: landmark_set(&set_a)?,
            end_point: landmark_set(&set_b)?,
            times,
            expected: path_ab,
        },
    )?;

    let mut cases = generate_cases(
        "l2_metric_inner_product_vectorization",
        vec![inner],
        Vec::new(),
    );
    cases.extend(generate_cases(
        "l2_metric_exp_vectorization",
        vec![exp],
        Vec::new(),
    ));
    cases.extend(generate_cases(
        "l2_metric_log_vectorization",
        vec![log],
        Vec::new(),
    ));
    cases.extend(generate_cases(
        "l2_metric_geodesic",
        vec![geodesic],
        Vec::new(),
    ));
    Ok(cases)
}

fn metric_cases(grid: &mut ParameterGrid) -> Result<Vec<CaseRecord<MetricCase>>, String> {
    let dims = grid.draw(DIM_GRID)?;
    let ks = grid.draw(METRIC_N_LANDMARKS_GRID)?;
    let n_points = grid.draw(METRIC_N_POINTS_GRID)?;
    let n_tangent_vecs = grid.draw(N_VECS_GRID)?;

    let targets: Vec<MetricUnderTest> = landmark_spaces(&dims, &ks)?
        .iter()
        .map(metric_target)
        .collect();
    let options = MetricFamilyOptions {
        log_after_exp_amplitude: LOG_AFTER_EXP_AMPLITUDE,
        ..MetricFamilyOptions::default()
    };
    let mut cases = sphere_fixture_cases()?;
    cases.extend(metric_family_cases(
        &targets,
        MetricGrids {
            n_points: &n_points,
            n_tangent_vecs: &n_tangent_vecs,
        },
        options,
        grid.rng(),
    )?);
    Ok(cases)
}

/// Rebuilds the same cases for the same `fixture_seed`.
pub fn landmarks_cases(config: &HarnessConfig) -> Result<LandmarksSuiteCases, String> {
    let mut grid = ParameterGrid::for_provider(config.fixture_seed, SUITE);
    let manifold = manifold_cases(&mut grid)?;
    let metric = metric_cases(&mut grid)?;
    Ok(LandmarksSuiteCases { manifold, metric })
}

pub fn run_landmarks_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases = landmarks_cases(config)?;
    let mut runner = CaseRunner::new(SUITE, config);
    runner.run_all(&cases.manifold, execute_manifold_case)?;
    runner.run_all(&cases.metric, execute_metric_case)?;
    Ok(runner.finish())
}

#[cfg(test)]
mod tests {
    use super::{angle_between, landmarks_cases, run_landmarks_suite, slerp, sphere_fixture_cases};
    use crate::HarnessConfig;
    use crate::metric_cases::{MetricCheck, execute_metric_case};
    use crate::runner::Tolerance;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn slerp_walks_the_great_circle() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        let mid = slerp(a, b, 0.5);
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert!((mid[0] - h).abs() < 1e-15 && (mid[1] - h).abs() < 1e-15);
        assert!((angle_between(a, b) - FRAC_PI_2).abs() < 1e-15);
        assert_eq!(slerp(a, a, 0.3), a);
    }

    #[test]
    fn sphere_fixtures_have_the_documented_shapes() {
        let cases = sphere_fixture_cases().expect("cases");
        assert_eq!(cases.len(), 4);
        match &cases[0].input.check {
            MetricCheck::InnerProductOfLogs {
                point,
                expected,
                ..
            } => {
                assert_eq!(point.shape(), &[5, 10, 3]);
                assert_eq!(expected.shape(), &[5]);
            }
            other => panic!("unexpected first check {other:?}"),
        }
        let tol = Tolerance {
            abs: 1e-6,
            rel: 1e-6,
        };
        for case in &cases {
            execute_metric_case(&case.input, tol).unwrap_or_else(|f| panic!("{}: {f:?}", case.id));
        }
    }

    #[test]
    fn spaces_cover_both_ambients() {
        let cases = landmarks_cases(&HarnessConfig::default()).expect("cases");
        assert!(
            cases
                .manifold
                .iter()
                .any(|c| c.input.entity.contains("hypersphere"))
        );
        assert!(
            cases
                .manifold
                .iter()
                .any(|c| c.input.entity.contains("euclidean"))
        );
        assert!(cases.metric.iter().any(|c| c.family == "log_after_exp"));
    }

    #[test]
    fn landmarks_suite_passes_with_default_seed() {
        let report = run_landmarks_suite(&HarnessConfig::default()).expect("suite");
        assert!(report.all_passed(), "{:?}", report.failures);
    }
}
