//! Beta distributions: open-set, Fisher–Rao metric, and density cases.

use std::sync::Arc;

use gms_array::Array;
use gms_geometry::{BetaDistributions, DirichletDistributions, Manifold};
use serde::Serialize;

use crate::case::{CaseRecord, generate_cases, generate_derived_cases};
use crate::grid::{GridSpec, ParameterGrid};
use crate::manifold_cases::{
    ManifoldCase, ManifoldCheck, SpaceUnderTest, execute_manifold_case, manifold_family_cases,
    random_point_belongs_cases,
};
use crate::metric_cases::{
    MetricCase, MetricCheck, MetricFamilyOptions, MetricGrids, MetricUnderTest,
    execute_metric_case, metric_family_cases,
};
use crate::runner::{CaseFailure, CaseRunner, Tolerance, expect_close, expect_shape};
use crate::{HarnessConfig, SuiteReport};

pub const SUITE: &str = "beta";

pub const N_SAMPLES_GRID: GridSpec = GridSpec::new(2, 5, 2);
pub const N_POINTS_GRID: GridSpec = GridSpec::new(1, 5, 2);
pub const N_VECS_GRID: GridSpec = GridSpec::new(2, 5, 2);

/// Tangent samples are this fraction of the base coordinates.
const TANGENT_SCALE: f64 = 0.1;
const SMOKE_SAMPLES: usize = 10;
const PDF_GRID_POINTS: usize = 10;
const ATOL: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum PdfCheck {
    PointToPdf {
        point: Array,
        x: Array,
        expected: Array,
    },
    /// Batched evaluation matches row-by-row evaluation.
    PointToPdfVectorization { points: Array, x: Array },
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfCase {
    pub entity: &'static str,
    #[serde(skip)]
    pub space: BetaDistributions,
    pub check: PdfCheck,
}

pub fn execute_pdf_case(case: &PdfCase, tol: Tolerance) -> Result<(), CaseFailure> {
    match &case.check {
        PdfCheck::PointToPdf { point, x, expected } => {
            let actual = case.space.point_to_pdf(point)?.evaluate(x)?;
            expect_close("pdf", expected, &actual, tol)
        }
        PdfCheck::PointToPdfVectorization { points, x } => {
            let batched = case.space.point_to_pdf(points)?.evaluate(x)?;
            let n = points.shape().first().copied().unwrap_or(0);
            expect_shape("pdf", &batched, &[n, x.len()])?;
            for row in 0..n {
                let single = case
                    .space
                    .point_to_pdf(&points.index_axis0(row)?)?
                    .evaluate(x)?;
                expect_close("pdf row", &single, &batched.index_axis0(row)?, tol)?;
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct BetaSuiteCases {
    pub manifold: Vec<CaseRecord<ManifoldCase>>,
    pub metric: Vec<CaseRecord<MetricCase>>,
    pub pdf: Vec<CaseRecord<PdfCase>>,
}

fn dirichlet_target(dim: usize) -> Result<SpaceUnderTest, String> {
    let space = DirichletDistributions::new(dim).map_err(|err| err.to_string())?;
    Ok(SpaceUnderTest::new(
        format!("dirichlet_distributions({dim})"),
        Arc::new(space),
        ATOL,
    ))
}

fn belongs_cases(beta: &SpaceUnderTest) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let dim3 = dirichlet_target(3)?;
    let smoke = [
        (&dim3, vec![0.1, 1.0, 0.3], true),
        (&dim3, vec![0.1, 1.0], false),
        (&dim3, vec![0.0, 1.0, 0.3], false),
        (beta, vec![-1.0, 0.3], false),
    ]
    .into_iter()
    .map(|(target, vec, expected)| {
        ManifoldCase::new(
            target,
            ManifoldCheck::Belongs {
                point: Array::vector(vec),
                expected: vec![expected],
            },
        )
    })
    .collect::<Result<Vec<_>, _>>()?;
    Ok(generate_cases("belongs", smoke, Vec::new()))
}

fn random_point_cases(
    beta: &SpaceUnderTest,
    grid: &mut ParameterGrid,
) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let dim3 = dirichlet_target(3)?;
    let derived = vec![
        ManifoldCase::new(
            beta,
            ManifoldCheck::RandomPointShape {
                n_points: 1,
                seed: grid.rng().next_u64(),
                expected_shape: vec![2],
            },
        )?,
        ManifoldCase::new(
            &dim3,
            ManifoldCheck::RandomPointShape {
                n_points: 5,
                seed: grid.rng().next_u64(),
                expected_shape: vec![5, 3],
            },
        )?,
    ];
    Ok(generate_derived_cases("random_point", derived))
}

fn pdf_cases(
    grid: &mut ParameterGrid,
    n_points: &[usize],
) -> Result<Vec<CaseRecord<PdfCase>>, String> {
    let space = BetaDistributions::new();
    let x = Array::linspace(0.0, 1.0, PDF_GRID_POINTS);
    let literal = |a: f64, b: f64, density: fn(f64) -> f64| PdfCase {
        entity: "beta_distributions",
        space,
        check: PdfCheck::PointToPdf {
            point: Array::vector(vec![a, b]),
            x: x.clone(),
            expected: x.map(density),
        },
    };
    let smoke = vec![
        literal(1.0, 1.0, |_| 1.0),
        literal(2.0, 2.0, |t| 6.0 * t * (1.0 - t)),
        literal(3.0, 1.0, |t| 3.0 * t * t),
        literal(1.0, 3.0, |t| 3.0 * (1.0 - t) * (1.0 - t)),
    ];
    let mut cases = generate_cases("point_to_pdf", smoke, Vec::new());

    let mut random = Vec::with_capacity(n_points.len());
    for &n in n_points {
        // A batch of one still carries the leading axis.
        let drawn = space
            .random_point(n, grid.rng())
            .map_err(|err| err.to_string())?;
        let points = drawn.reshape(vec![n, 2]).map_err(|err| err.to_string())?;
        random.push(PdfCase {
            entity: "beta_distributions",
            space,
            check: PdfCheck::PointToPdfVectorization {
                points,
                x: x.clone(),
            },
        });
    }
    cases.extend(generate_cases(
        "point_to_pdf_vectorization",
        Vec::new(),
        random,
    ));
    Ok(cases)
}

fn metric_smoke_cases(
    target: &MetricUnderTest,
    grid: &mut ParameterGrid,
) -> Result<Vec<CaseRecord<MetricCase>>, String> {
    let space = target.metric.space();
    let off = -0.644_934_066;
    let metric_matrix = MetricCase::new(
        target,
        MetricCheck::MetricMatrix {
            base_point: Array::vector(vec![1.0, 1.0]),
            expected: Array::from_rows(&[vec![1.0, off], vec![off, 1.0]])
                .map_err(|err| err.to_string())?,
        },
    )?;
    let mut cases = generate_cases("metric_matrix", vec![metric_matrix], Vec::new());

    let base_point = space
        .random_point(SMOKE_SAMPLES, grid.rng())
        .map_err(|err| err.to_string())?;
    let tangent_vec = space
        .random_tangent_vec(&base_point, SMOKE_SAMPLES, grid.rng(), TANGENT_SCALE)
        .map_err(|err| err.to_string())?;
    let exp = MetricCase::new(
        target,
        MetricCheck::ExpIsLengthPreserving {
            tangent_vec,
            base_point,
        },
    )?;
    cases.extend(generate_cases("exp", vec![exp], Vec::new()));

    let base_point = space
        .random_point(SMOKE_SAMPLES, grid.rng())
        .map_err(|err| err.to_string())?;
    let christoffels = MetricCase::new(
        target,
        MetricCheck::ChristoffelsShape {
            base_point,
            expected_shape: vec![SMOKE_SAMPLES, 2, 2, 2],
        },
    )?;
    cases.extend(generate_cases(
        "christoffels_shape",
        vec![christoffels],
        Vec::new(),
    ));
    Ok(cases)
}

/// Rebuilds the same cases for the same `fixture_seed`.
pub fn beta_cases(config: &HarnessConfig) -> Result<BetaSuiteCases, String> {
    let mut grid = ParameterGrid::for_provider(config.fixture_seed, SUITE);
    let n_samples = grid.draw(N_SAMPLES_GRID)?;
    let n_points = grid.draw(N_POINTS_GRID)?;
    let n_vecs = grid.draw(N_VECS_GRID)?;
    let metric_n_points = grid.draw(N_POINTS_GRID)?;
    let metric_n_vecs = grid.draw(N_VECS_GRID)?;

    let space = BetaDistributions::new();
    let beta = SpaceUnderTest::new("beta_distributions", Arc::new(space), ATOL);
    let mut manifold = belongs_cases(&beta)?;
    manifold.extend(random_point_cases(&beta, &mut grid)?);
    let random_targets: Vec<_> = n_points.iter().map(|&n| (beta.clone(), n)).collect();
    manifold.extend(random_point_belongs_cases(&[], &random_targets, grid.rng())?);
    manifold.extend(manifold_family_cases(
        std::slice::from_ref(&beta),
        &n_samples,
        &n_vecs,
        grid.rng(),
    )?);

    let target = MetricUnderTest::new("beta_metric", Arc::new(space.metric()), ATOL, TANGENT_SCALE);
    let mut metric = metric_smoke_cases(&target, &mut grid)?;
    metric.extend(metric_family_cases(
        std::slice::from_ref(&target),
        MetricGrids {
            n_points: &metric_n_points,
            n_tangent_vecs: &metric_n_vecs,
        },
        MetricFamilyOptions::default(),
        grid.rng(),
    )?);

    let pdf = pdf_cases(&mut grid, &n_points)?;
    Ok(BetaSuiteCases {
        manifold,
        metric,
        pdf,
    })
}

pub fn run_beta_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases = beta_cases(config)?;
    let mut runner = CaseRunner::new(SUITE, config);
    runner.run_all(&cases.manifold, execute_manifold_case)?;
    runner.run_all(&cases.metric, execute_metric_case)?;
    runner.run_all(&cases.pdf, execute_pdf_case)?;
    Ok(runner.finish())
}

#[cfg(test)]
mod tests {
    use super::{N_POINTS_GRID, N_SAMPLES_GRID, N_VECS_GRID, beta_cases, run_beta_suite};
    use crate::HarnessConfig;

    #[test]
    fn smoke_families_are_present() {
        let cases = beta_cases(&HarnessConfig::default()).expect("cases");
        let belongs: Vec<_> = cases
            .manifold
            .iter()
            .filter(|c| c.family == "belongs")
            .collect();
        assert_eq!(belongs.len(), 4);
        assert!(cases.metric.iter().any(|c| c.id == "metric_matrix/smoke/0"));
        assert!(
            cases
                .metric
                .iter()
                .any(|c| c.id == "christoffels_shape/smoke/0")
        );
        assert!(
            cases
                .pdf
                .iter()
                .any(|c| c.family == "point_to_pdf_vectorization")
        );
    }

    #[test]
    fn grids_match_their_declared_ranges() {
        assert_eq!((N_SAMPLES_GRID.lo, N_SAMPLES_GRID.hi), (2, 5));
        assert_eq!((N_POINTS_GRID.lo, N_POINTS_GRID.hi), (1, 5));
        assert_eq!((N_VECS_GRID.lo, N_VECS_GRID.hi), (2, 5));
    }

    #[test]
    fn beta_suite_passes_with_default_seed() {
        let report = run_beta_suite(&HarnessConfig::default()).expect("suite");
        assert!(report.all_passed(), "{:?}", report.failures);
        assert!(report.case_count > 20);
    }
}
