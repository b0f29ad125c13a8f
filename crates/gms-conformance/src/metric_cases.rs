//! Metric-level case families and their executor.

use std::sync::Arc;

use gms_array::Array;
use gms_geometry::{Manifold, RiemannianMetric};
use gms_random::DeterministicRng;
use serde::Serialize;

use crate::case::{CaseRecord, generate_cases};
use crate::runner::{CaseFailure, Tolerance, expect_all, expect_close, expect_shape};

pub const METRIC_FAMILIES: [&str; 12] = [
    "exp_shape",
    "log_shape",
    "exp_belongs",
    "log_is_tangent",
    "log_after_exp",
    "exp_after_log",
    "squared_dist_is_symmetric",
    "dist_is_positive",
    "dist_point_to_itself_is_zero",
    "inner_product_is_symmetric",
    "geodesic_ivp_belongs",
    "geodesic_bvp_belongs",
];

#[derive(Debug, Clone)]
pub struct MetricUnderTest {
    pub entity: String,
    pub metric: Arc<dyn RiemannianMetric>,
    pub atol: f64,
    /// Standard deviation of generated tangent vectors. Nearby points are
    /// reached with half of it.
    pub tangent_scale: f64,
}

impl MetricUnderTest {
    pub fn new(
        entity: impl Into<String>,
        metric: Arc<dyn RiemannianMetric>,
        atol: f64,
        tangent_scale: f64,
    ) -> Self {
        Self {
            entity: entity.into(),
            metric,
            atol,
            tangent_scale,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricFamilyOptions {
    pub skip: &'static [&'static str],
    /// `log_after_exp` divides the tangent scale by this.
    pub log_after_exp_amplitude: f64,
    pub geodesic_samples: usize,
}

impl Default for MetricFamilyOptions {
    fn default() -> Self {
        Self {
            skip: &[],
            log_after_exp_amplitude: 1.0,
            geodesic_samples: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricGrids<'a> {
    pub n_points: &'a [usize],
    pub n_tangent_vecs: &'a [usize],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum MetricCheck {
    ExpShape {
        tangent_vec: Array,
        base_point: Array,
        expected_shape: Vec<usize>,
    },
    LogShape {
        point: Array,
        base_point: Array,
        expected_shape: Vec<usize>,
    },
    ExpBelongs {
        tangent_vec: Array,
        base_point: Array,
    },
    LogIsTangent { point: Array, base_point: Array },
    LogAfterExp {
        tangent_vec: Array,
        base_point: Array,
    },
    ExpAfterLog { point: Array, base_point: Array },
    SquaredDistIsSymmetric { point_a: Array, point_b: Array },
    DistIsPositive { point_a: Array, point_b: Array },
    DistPointToItselfIsZero { point: Array },
    InnerProductIsSymmetric {
        tangent_a: Array,
        tangent_b: Array,
        base_point: Array,
    },
    GeodesicIvpBelongs {
        initial_point: Array,
        initial_tangent_vec: Array,
        times: Vec<f64>,
    },
    GeodesicBvpBelongs {
        initial_point: Array,
        end_point: Array,
        times: Vec<f64>,
    },
    MetricMatrix { base_point: Array, expected: Array },
    ChristoffelsShape {
        base_point: Array,
        expected_shape: Vec<usize>,
    },
    Exp {
        tangent_vec: Array,
        base_point: Array,
        expected: Array,
    },
    /// `dist(p, exp(v, p))² = |v|²_p` for vectors inside the injectivity
    /// radius, plus membership of the end point.
    ExpIsLengthPreserving {
        tangent_vec: Array,
        base_point: Array,
    },
    InnerProductOfLogs {
        point: Array,
        base_point: Array,
        expected: Array,
    },
    GeodesicBvp {
        initial_point: Array,
        end_point: Array,
        times: Vec<f64>,
        expected: Array,
    },
}

impl MetricCheck {
    /// Inputs that must be points or tangent vectors of the space.
    fn point_inputs(&self) -> Vec<&Array> {
        match self {
            Self::ExpShape {
                tangent_vec,
                base_point,
                ..
            }
            | Self::ExpBelongs {
                tangent_vec,
                base_point,
            }
            | Self::LogAfterExp {
                tangent_vec,
                base_point,
            }
            | Self::Exp {
                tangent_vec,
                base_point,
                ..
            }
            | Self::ExpIsLengthPreserving {
                tangent_vec,
                base_point,
            } => vec![tangent_vec, base_point],
            Self::LogShape {
                point,
                base_point,
                ..
            }
            | Self::LogIsTangent { point, base_point }
            | Self::ExpAfterLog { point, base_point }
            | Self::InnerProductOfLogs {
                point,
                base_point,
                ..
            } => vec![point, base_point],
            Self::SquaredDistIsSymmetric { point_a, point_b }
            | Self::DistIsPositive { point_a, point_b } => vec![point_a, point_b],
            Self::DistPointToItselfIsZero { point } => vec![point],
            Self::InnerProductIsSymmetric {
                tangent_a,
                tangent_b,
                base_point,
            } => vec![tangent_a, tangent_b, base_point],
            Self::GeodesicIvpBelongs {
                initial_point,
                initial_tangent_vec,
                ..
            } => vec![initial_point, initial_tangent_vec],
            Self::GeodesicBvpBelongs {
                initial_point,
                end_point,
                ..
            }
            | Self::GeodesicBvp {
                initial_point,
                end_point,
                ..
            } => vec![initial_point, end_point],
            Self::MetricMatrix { base_point, .. } | Self::ChristoffelsShape { base_point, .. } => {
                vec![base_point]
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricCase {
    pub entity: String,
    #[serde(skip)]
    pub metric: Arc<dyn RiemannianMetric>,
    pub atol: f64,
    pub check: MetricCheck,
}

impl MetricCase {
    pub fn new(target: &MetricUnderTest, check: MetricCheck) -> Result<Self, String> {
        let shape = target.metric.space().point_shape();
        for input in check.point_inputs() {
            input
                .split_batch(&shape)
                .map_err(|err| format!("{}: malformed case input: {err}", target.entity))?;
        }
        Ok(Self {
            entity: target.entity.clone(),
            metric: Arc::clone(&target.metric),
            atol: target.atol,
            check,
        })
    }
}

/// Views a path array of any leading shape as a flat batch of points.
fn flatten_points(path: Array, space: &dyn Manifold) -> Result<Array, CaseFailure> {
    let point_shape = space.point_shape();
    let stride: usize = point_shape.iter().product();
    let count = path.len().checked_div(stride).unwrap_or(0);
    let shape = std::iter::once(count).chain(point_shape).collect();
    Ok(path.reshape(shape)?)
}

pub fn execute_metric_case(case: &MetricCase, tol: Tolerance) -> Result<(), CaseFailure> {
    let metric = case.metric.as_ref();
    let space = metric.space();
    match &case.check {
        MetricCheck::ExpShape {
            tangent_vec,
            base_point,
            expected_shape,
        } => {
            let end = metric.exp(tangent_vec, base_point)?;
            expect_shape("exp", &end, expected_shape)
        }
        MetricCheck::LogShape {
            point,
            base_point,
            expected_shape,
        } => {
            let log = metric.log(point, base_point)?;
            expect_shape("log", &log, expected_shape)
        }
        MetricCheck::ExpBelongs {
            tangent_vec,
            base_point,
        } => {
            let end = metric.exp(tangent_vec, base_point)?;
            expect_all("exp belongs", &space.belongs(&end, case.atol))
        }
        MetricCheck::LogIsTangent { point, base_point } => {
            let log = metric.log(point, base_point)?;
            let flags = space.is_tangent(&log, base_point, case.atol)?;
            expect_all("log is tangent", &flags)
        }
        MetricCheck::LogAfterExp {
            tangent_vec,
            base_point,
        } => {
            let end = metric.exp(tangent_vec, base_point)?;
            let log = metric.log(&end, base_point)?;
            expect_close("log(exp(v))", tangent_vec, &log, tol)
        }
        MetricCheck::ExpAfterLog { point, base_point } => {
            let log = metric.log(point, base_point)?;
            let end = metric.exp(&log, base_point)?;
            expect_close("exp(log(q))", point, &end, tol)
        }
        MetricCheck::SquaredDistIsSymmetric { point_a, point_b } => expect_close(
            "squared_dist(a, b) vs squared_dist(b, a)",
            &metric.squared_dist(point_a, point_b)?,
            &metric.squared_dist(point_b, point_a)?,
            tol,
        ),
        MetricCheck::DistIsPositive { point_a, point_b } => {
            let dist = metric.dist(point_a, point_b)?;
            let flags: Vec<bool> = dist.values().iter().map(|d| *d >= 0.0).collect();
            expect_all("dist is positive", &flags)
        }
        MetricCheck::DistPointToItselfIsZero { point } => {
            let dist = metric.dist(point, point)?;
            let zeros = dist.map(|_| 0.0);
            expect_close("dist(p, p)", &zeros, &dist, tol)
        }
        MetricCheck::InnerProductIsSymmetric {
            tangent_a,
            tangent_b,
            base_point,
        } => expect_close(
            "<a, b> vs <b, a>",
            &metric.inner_product(tangent_a, tangent_b, base_point)?,
            &metric.inner_product(tangent_b, tangent_a, base_point)?,
            tol,
        ),
        MetricCheck::GeodesicIvpBelongs {
            initial_point,
            initial_tangent_vec,
            times,
        } => {
            let path = metric.geodesic(initial_point, initial_tangent_vec, times)?;
            let points = flatten_points(path, space)?;
            expect_all("geodesic ivp belongs", &space.belongs(&points, case.atol))
        }
        MetricCheck::GeodesicBvpBelongs {
            initial_point,
            end_point,
            times,
        } => {
            let path = metric.geodesic_bvp(initial_point, end_point, times)?;
            let points = flatten_points(path, space)?;
            expect_all("geodesic bvp belongs", &space.belongs(&points, case.atol))
        }
        MetricCheck::MetricMatrix {
            base_point,
            expected,
        } => {
            let matrix = metric.metric_matrix(base_point)?;
            expect_close("metric_matrix", expected, &matrix, tol)
        }
        MetricCheck::ChristoffelsShape {
            base_point,
            expected_shape,
        } => {
            let christoffels = metric.christoffels(base_point)?;
            expect_shape("christoffels", &christoffels, expected_shape)
        }
        MetricCheck::Exp {
            tangent_vec,
            base_point,
            expected,
        } => {
            let end = metric.exp(tangent_vec, base_point)?;
            expect_close("exp", expected, &end, tol)
        }
        MetricCheck::ExpIsLengthPreserving {
            tangent_vec,
            base_point,
        } => {
            let end = metric.exp(tangent_vec, base_point)?;
            expect_all("exp belongs", &space.belongs(&end, case.atol))?;
            expect_close(
                "squared_dist(p, exp(v, p)) vs |v|²",
                &metric.squared_norm(tangent_vec, base_point)?,
                &metric.squared_dist(base_point, &end)?,
                tol,
            )
        }
        MetricCheck::InnerProductOfLogs {
            point,
            base_point,
            expected,
        } => {
            let log = metric.log(point, base_point)?;
            let actual = metric.inner_product(&log, &log, base_point)?;
            expect_shape("inner_product", &actual, expected.shape())?;
            expect_close("inner_product", expected, &actual, tol)
        }
        MetricCheck::GeodesicBvp {
            initial_point,
            end_point,
            times,
            expected,
        } => {
            let path = metric.geodesic_bvp(initial_point, end_point, times)?;
            expect_close("geodesic_bvp", expected, &path, tol)
        }
    }
}

struct Sampler<'a> {
    target: &'a MetricUnderTest,
    rng: &'a mut DeterministicRng,
}

impl Sampler<'_> {
    fn context(&self, err: impl std::fmt::Display) -> String {
        format!("{}: {err}", self.target.entity)
    }

    fn points(&mut self, n: usize) -> Result<Array, String> {
        let space = self.target.metric.space();
        space
            .random_point(n, self.rng)
            .map_err(|err| self.context(err))
    }

    fn tangents(&mut self, base_point: &Array, n: usize, scale: f64) -> Result<Array, String> {
        let space = self.target.metric.space();
        space
            .random_tangent_vec(base_point, n, self.rng, scale)
            .map_err(|err| self.context(err))
    }

    /// Points reached from `base_point` along short random tangent vectors.
    fn nearby(&mut self, base_point: &Array, n: usize) -> Result<Array, String> {
        let step = self.tangents(base_point, n, 0.5 * self.target.tangent_scale)?;
        self.target
            .metric
            .exp(&step, base_point)
            .map_err(|err| self.context(err))
    }
}

/// Shape of `n` samples drawn around one base point.
fn batch_shape(point_shape: &[usize], n: usize) -> Vec<usize> {
    if n == 1 {
        return point_shape.to_vec();
    }
    std::iter::once(n)
        .chain(point_shape.iter().copied())
        .collect()
}

/// Randomized cases for every family in [`METRIC_FAMILIES`] not skipped by
/// `options`, grouped by family.
pub fn metric_family_cases(
    targets: &[MetricUnderTest],
    grids: MetricGrids<'_>,
    options: MetricFamilyOptions,
    rng: &mut DeterministicRng,
) -> Result<Vec<CaseRecord<MetricCase>>, String> {
    let wanted = |family: &'static str| !options.skip.contains(&family);
    let times = Array::linspace(0.0, 1.0, options.geodesic_samples).into_values();
    let mut collected: Vec<(&'static str, MetricCase)> = Vec::new();

    for target in targets {
        let point_shape = target.metric.space().point_shape();
        let scale = target.tangent_scale;
        let mut sample = Sampler {
            target,
            rng: &mut *rng,
        };

        for &n in grids.n_tangent_vecs {
            if wanted("exp_shape") {
                let base_point = sample.points(1)?;
                let tangent_vec = sample.tangents(&base_point, n, scale)?;
                let check = MetricCheck::ExpShape {
                    tangent_vec,
                    base_point,
                    expected_shape: batch_shape(&point_shape, n),
                };
                collected.push(("exp_shape", MetricCase::new(target, check)?));
            }
            if wanted("log_shape") {
                let base_point = sample.points(1)?;
                let point = sample.nearby(&base_point, n)?;
                let check = MetricCheck::LogShape {
                    point,
                    base_point,
                    expected_shape: batch_shape(&point_shape, n),
                };
                collected.push(("log_shape", MetricCase::new(target, check)?));
            }
            if wanted("exp_belongs") {
                let base_point = sample.points(n)?;
                let tangent_vec = sample.tangents(&base_point, n, scale)?;
                let check = MetricCheck::ExpBelongs {
                    tangent_vec,
                    base_point,
                };
                collected.push(("exp_belongs", MetricCase::new(target, check)?));
            }
            if wanted("log_is_tangent") {
                let base_point = sample.points(n)?;
                let point = sample.nearby(&base_point, n)?;
                let check = MetricCheck::LogIsTangent { point, base_point };
                collected.push(("log_is_tangent", MetricCase::new(target, check)?));
            }
            if wanted("log_after_exp") {
                let base_point = sample.points(n)?;
                let tangent_vec =
                    sample.tangents(&base_point, n, scale / options.log_after_exp_amplitude)?;
                let check = MetricCheck::LogAfterExp {
                    tangent_vec,
                    base_point,
                };
                collected.push(("log_after_exp", MetricCase::new(target, check)?));
            }
            if wanted("exp_after_log") {
                let base_point = sample.points(n)?;
                let point = sample.nearby(&base_point, n)?;
                let check = MetricCheck::ExpAfterLog { point, base_point };
                collected.push(("exp_after_log", MetricCase::new(target, check)?));
            }
            if wanted("inner_product_is_symmetric") {
                let base_point = sample.points(n)?;
                let tangent_a = sample.tangents(&base_point, n, scale)?;
                let tangent_b = sample.tangents(&base_point, n, scale)?;
                let check = MetricCheck::InnerProductIsSymmetric {
                    tangent_a,
                    tangent_b,
                    base_point,
                };
                let case = MetricCase::new(target, check)?;
                collected.push(("inner_product_is_symmetric", case));
            }
        }

        for &n in grids.n_points {
            if wanted("squared_dist_is_symmetric") {
                let point_a = sample.points(n)?;
                let point_b = sample.nearby(&point_a, n)?;
                let check = MetricCheck::SquaredDistIsSymmetric { point_a, point_b };
                let case = MetricCase::new(target, check)?;
                collected.push(("squared_dist_is_symmetric", case));
            }
            if wanted("dist_is_positive") {
                let point_a = sample.points(n)?;
                let point_b = sample.nearby(&point_a, n)?;
                let check = MetricCheck::DistIsPositive { point_a, point_b };
                collected.push(("dist_is_positive", MetricCase::new(target, check)?));
            }
            if wanted("dist_point_to_itself_is_zero") {
                let point = sample.points(n)?;
                let check = MetricCheck::DistPointToItselfIsZero { point };
                let case = MetricCase::new(target, check)?;
                collected.push(("dist_point_to_itself_is_zero", case));
            }
            if wanted("geodesic_ivp_belongs") {
                let initial_point = sample.points(n)?;
                let initial_tangent_vec = sample.tangents(&initial_point, n, scale)?;
                let check = MetricCheck::GeodesicIvpBelongs {
                    initial_point,
                    initial_tangent_vec,
                    times: times.clone(),
                };
                collected.push(("geodesic_ivp_belongs", MetricCase::new(target, check)?));
            }
            if wanted("geodesic_bvp_belongs") {
                let initial_point = sample.points(n)?;
                let end_point = sample.nearby(&initial_point, n)?;
                let check = MetricCheck::GeodesicBvpBelongs {
                    initial_point,
                    end_point,
                    times: times.clone(),
                };
                collected.push(("geodesic_bvp_belongs", MetricCase::new(target, check)?));
            }
        }
    }

    let mut cases = Vec::with_capacity(collected.len());
    for family in METRIC_FAMILIES {
        let inputs = collected
            .iter()
            .filter(|(f, _)| *f == family)
            .map(|(_, case)| case.clone())
            .collect();
        cases.extend(generate_cases(family, Vec::new(), inputs));
    }
    Ok(cases)
}
