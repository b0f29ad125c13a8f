//! Grassmannians `Gr(n, k)` under the canonical metric.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use gms_array::{Array, stack};
use gms_geometry::Grassmannian;
use gms_linalg::{Matrix, bracket};

use crate::case::{CaseRecord, generate_cases};
use crate::grid::{GridSpec, ParameterGrid};
use crate::manifold_cases::{
    ManifoldCase, ManifoldCheck, SpaceUnderTest, execute_manifold_case, manifold_family_cases,
    random_point_belongs_cases,
};
use crate::metric_cases::{
    MetricCase, MetricCheck, MetricFamilyOptions, MetricGrids, MetricUnderTest,
    execute_metric_case, metric_family_cases,
};
use crate::runner::CaseRunner;
use crate::{HarnessConfig, SuiteReport};

pub const SUITE: &str = "grassmannian";

pub const N_GRID: GridSpec = GridSpec::new(3, 6, 2);
pub const K_GRID: GridSpec = GridSpec::new(1, 3, 2);
pub const N_POINTS_GRID: GridSpec = GridSpec::new(1, 5, 2);
pub const N_VECS_GRID: GridSpec = GridSpec::new(2, 5, 2);

// Every drawn `k` stays below every drawn `n`.
const _: () = assert!(N_GRID.lo >= K_GRID.hi);

/// Families the randomized metric grid leaves out. Random tangents may leave
/// the injectivity radius, where log cannot recover them.
pub const SKIPPED_METRIC_FAMILIES: &[&str] = &["log_after_exp"];

const TANGENT_SCALE: f64 = 0.2;
const ATOL: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct GrassmannianSuiteCases {
    pub manifold: Vec<CaseRecord<ManifoldCase>>,
    pub metric: Vec<CaseRecord<MetricCase>>,
}

fn grassmannian(n: usize, k: usize) -> Result<(String, Grassmannian), String> {
    let space = Grassmannian::new(n, k).map_err(|err| err.to_string())?;
    Ok((format!("grassmannian({n}, {k})"), space))
}

fn diag3(entries: [f64; 3]) -> Result<Array, String> {
    let mut values = vec![0.0; 9];
    for (i, value) in entries.into_iter().enumerate() {
        values[i * 4] = value;
    }
    Array::new(vec![3, 3], values).map_err(|err| err.to_string())
}

fn stacked(points: &[Array]) -> Result<Array, String> {
    stack(points).map_err(|err| err.to_string())
}

fn plane_xy() -> Result<Array, String> {
    diag3([1.0, 1.0, 0.0])
}

fn plane_yz() -> Result<Array, String> {
    diag3([0.0, 1.0, 1.0])
}

fn plane_xz() -> Result<Array, String> {
    diag3([1.0, 0.0, 1.0])
}

/// `[π/2 r_y, P]`: the tangent at `P` turning it a quarter around the y axis.
fn quarter_turn_about_y(base_point: &Array) -> Result<Array, String> {
    let r_y = Matrix::from_vec(3, vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0])
        .map_err(|err| err.to_string())?
        .scale(FRAC_PI_2);
    let p = Matrix::from_slice(3, base_point.values()).map_err(|err| err.to_string())?;
    let tangent = bracket(&r_y, &p).map_err(|err| err.to_string())?;
    Array::new(vec![3, 3], tangent.into_vec()).map_err(|err| err.to_string())
}

fn belongs_cases(gr32: &SpaceUnderTest) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let smoke = vec![
        ManifoldCase::new(
            gr32,
            ManifoldCheck::Belongs {
                point: plane_xy()?,
                expected: vec![true],
            },
        )?,
        ManifoldCase::new(
            gr32,
            ManifoldCheck::Belongs {
                point: stacked(&[plane_yz()?, plane_xz()?])?,
                expected: vec![true, true],
            },
        )?,
        ManifoldCase::new(
            gr32,
            ManifoldCheck::Belongs {
                point: stacked(&[plane_yz()?, diag3([1.0, 1.0, 1.0])?])?,
                expected: vec![true, false],
            },
        )?,
    ];
    Ok(generate_cases("belongs", smoke, Vec::new()))
}

fn manifold_cases(
    gr32: &SpaceUnderTest,
    targets: &[SpaceUnderTest],
    grid: &mut ParameterGrid,
) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let n_points = grid.draw(N_POINTS_GRID)?;
    let n_vecs = grid.draw(N_VECS_GRID)?;

    let mut cases = belongs_cases(gr32)?;
    let smoke = vec![(gr32.clone(), 1), (gr32.clone(), 2)];
    let random: Vec<_> = targets
        .iter()
        .cloned()
        .zip(n_points.iter().copied())
        .collect();
    cases.extend(random_point_belongs_cases(&smoke, &random, grid.rng())?);
    cases.extend(manifold_family_cases(
        targets,
        &n_points,
        &n_vecs,
        grid.rng(),
    )?);
    Ok(cases)
}

fn exp_smoke_cases(gr32: &MetricUnderTest) -> Result<Vec<CaseRecord<MetricCase>>, String> {
    let single = MetricCase::new(
        gr32,
        MetricCheck::Exp {
            tangent_vec: quarter_turn_about_y(&plane_xy()?)?,
            base_point: plane_xy()?,
            expected: plane_yz()?,
        },
    )?;
    let batched = MetricCase::new(
        gr32,
        MetricCheck::Exp {
            tangent_vec: stacked(&[
                quarter_turn_about_y(&plane_xy()?)?,
                quarter_turn_about_y(&plane_yz()?)?,
            ])?,
            base_point: stacked(&[plane_xy()?, plane_yz()?])?,
            expected: stacked(&[plane_yz()?, plane_xy()?])?,
        },
    )?;
    Ok(generate_cases("exp", vec![single, batched], Vec::new()))
}

/// Rebuilds the same cases for the same `fixture_seed`.
pub fn grassmannian_cases(config: &HarnessConfig) -> Result<GrassmannianSuiteCases, String> {
    let mut grid = ParameterGrid::for_provider(config.fixture_seed, SUITE);
    let ns = grid.draw(N_GRID)?;
    let ks = grid.draw(K_GRID)?;
    let spaces = ns
        .iter()
        .zip(&ks)
        .map(|(&n, &k)| grassmannian(n, k))
        .collect::<Result<Vec<_>, _>>()?;

    let (gr32_name, gr32) = grassmannian(3, 2)?;
    let gr32_space = SpaceUnderTest::new(gr32_name.clone(), Arc::new(gr32), ATOL);
    let space_targets: Vec<_> = spaces
        .iter()
        .map(|(name, space)| SpaceUnderTest::new(name.clone(), Arc::new(*space), ATOL))
        .collect();
    let manifold = manifold_cases(&gr32_space, &space_targets, &mut grid)?;

    let n_points = grid.draw(N_POINTS_GRID)?;
    let n_tangent_vecs = grid.draw(N_VECS_GRID)?;
    let metric_targets: Vec<_> = spaces
        .iter()
        .map(|(name, space)| {
            MetricUnderTest::new(
                format!("canonical_metric({name})"),
                Arc::new(space.metric()),
                ATOL,
                TANGENT_SCALE,
            )
        })
        .collect();
    let gr32_metric = MetricUnderTest::new(
        format!("canonical_metric({gr32_name})"),
        Arc::new(gr32.metric()),
        ATOL,
        TANGENT_SCALE,
    );
    let mut metric = exp_smoke_cases(&gr32_metric)?;
    metric.extend(metric_family_cases(
        &metric_targets,
        MetricGrids {
            n_points: &n_points,
            n_tangent_vecs: &n_tangent_vecs,
        },
        MetricFamilyOptions {
            skip: SKIPPED_METRIC_FAMILIES,
            ..MetricFamilyOptions::default()
        },
        grid.rng(),
    )?);
    Ok(GrassmannianSuiteCases { manifold, metric })
}

pub fn run_grassmannian_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases = grassmannian_cases(config)?;
    let mut runner = CaseRunner::new(SUITE, config);
    runner.run_all(&cases.manifold, execute_manifold_case)?;
    runner.run_all(&cases.metric, execute_metric_case)?;
    Ok(runner.finish())
}
