//! Space-level case families shared by every manifold.

use std::sync::Arc;

use gms_array::Array;
use gms_geometry::Manifold;
use gms_random::DeterministicRng;
use serde::Serialize;

use crate::case::{CaseRecord, generate_cases, generate_derived_cases};
use crate::runner::{CaseFailure, Tolerance, expect_all, expect_flags, expect_shape};

/// A space together with the label it is reported under.
#[derive(Debug, Clone)]
pub struct SpaceUnderTest {
    pub entity: String,
    pub space: Arc<dyn Manifold>,
    /// Membership and tangency tolerance.
    pub atol: f64,
}

impl SpaceUnderTest {
    pub fn new(entity: impl Into<String>, space: Arc<dyn Manifold>, atol: f64) -> Self {
        Self {
            entity: entity.into(),
            space,
            atol,
        }
    }

    fn batch_shape(&self, n: usize) -> Vec<usize> {
        let point = self.space.point_shape();
        if n == 1 {
            point
        } else {
            std::iter::once(n).chain(point).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ManifoldCheck {
    Belongs { point: Array, expected: Vec<bool> },
    RandomPointShape {
        n_points: usize,
        seed: u64,
        expected_shape: Vec<usize>,
    },
    RandomPointBelongs { n_points: usize, seed: u64 },
    ProjectionBelongs { point: Array },
    ToTangentIsTangent { vector: Array, base_point: Array },
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifoldCase {
    pub entity: String,
    #[serde(skip)]
    pub space: Arc<dyn Manifold>,
    pub atol: f64,
    pub check: ManifoldCheck,
}

impl ManifoldCase {
    /// Rejects inputs the check cannot consume. `Belongs` inputs may have
    /// any shape; rejecting them is the point of the check.
    pub fn new(target: &SpaceUnderTest, check: ManifoldCheck) -> Result<Self, String> {
        let shape = target.space.point_shape();
        let bad = match &check {
            ManifoldCheck::Belongs { .. } => None,
            ManifoldCheck::RandomPointShape { n_points, .. }
            | ManifoldCheck::RandomPointBelongs { n_points, .. } => {
                (*n_points == 0).then(|| "n_points must be positive".to_string())
            }
            ManifoldCheck::ProjectionBelongs { point } => {
                point.split_batch(&shape).err().map(|err| err.to_string())
            }
            ManifoldCheck::ToTangentIsTangent { vector, base_point } => vector
                .split_batch(&shape)
                .and(base_point.split_batch(&shape))
                .err()
                .map(|err| err.to_string()),
        };
        if let Some(reason) = bad {
            return Err(format!("{}: malformed case input: {reason}", target.entity));
        }
        Ok(Self {
            entity: target.entity.clone(),
            space: Arc::clone(&target.space),
            atol: target.atol,
            check,
        })
    }
}

pub fn execute_manifold_case(case: &ManifoldCase, _tol: Tolerance) -> Result<(), CaseFailure> {
    let space = case.space.as_ref();
    match &case.check {
        ManifoldCheck::Belongs { point, expected } => {
            expect_flags("belongs", &space.belongs(point, case.atol), expected)
        }
        ManifoldCheck::RandomPointShape {
            n_points,
            seed,
            expected_shape,
        } => {
            let mut rng = DeterministicRng::new(*seed);
            let points = space.random_point(*n_points, &mut rng)?;
            expect_shape("random_point", &points, expected_shape)
        }
        ManifoldCheck::RandomPointBelongs { n_points, seed } => {
            let mut rng = DeterministicRng::new(*seed);
            let points = space.random_point(*n_points, &mut rng)?;
            let flags = space.belongs(&points, case.atol);
            if flags.len() != *n_points {
                return Err(CaseFailure::new(
                    "shape_mismatch",
                    format!("expected {n_points} membership flags, got {}", flags.len()),
                ));
            }
            expect_all("random point belongs", &flags)
        }
        ManifoldCheck::ProjectionBelongs { point } => {
            let projected = space.projection(point)?;
            expect_all("projection belongs", &space.belongs(&projected, case.atol))
        }
        ManifoldCheck::ToTangentIsTangent { vector, base_point } => {
            let tangent = space.to_tangent(vector, base_point)?;
            expect_all(
                "to_tangent is tangent",
                &space.is_tangent(&tangent, base_point, case.atol)?,
            )
        }
    }
}

/// Gaussian ambient array holding `n` points' worth of coordinates.
pub(crate) fn gaussian_points(
    target: &SpaceUnderTest,
    n: usize,
    rng: &mut DeterministicRng,
) -> Result<Array, String> {
    let shape = target.batch_shape(n);
    let len = shape.iter().product();
    Array::new(shape, rng.normal_vec(len)).map_err(|err| format!("{}: {err}", target.entity))
}

pub fn random_point_belongs_cases(
    smoke: &[(SpaceUnderTest, usize)],
    random: &[(SpaceUnderTest, usize)],
    rng: &mut DeterministicRng,
) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let mut build = |list: &[(SpaceUnderTest, usize)]| {
        list.iter()
            .map(|(target, n_points)| {
                ManifoldCase::new(
                    target,
                    ManifoldCheck::RandomPointBelongs {
                        n_points: *n_points,
                        seed: rng.next_u64(),
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()
    };
    let smoke = build(smoke)?;
    let random = build(random)?;
    Ok(generate_cases("random_point_belongs", smoke, random))
}

/// Shape, projection and tangent families for every space and count.
pub fn manifold_family_cases(
    targets: &[SpaceUnderTest],
    n_points_list: &[usize],
    n_vecs_list: &[usize],
    rng: &mut DeterministicRng,
) -> Result<Vec<CaseRecord<ManifoldCase>>, String> {
    let mut shapes = Vec::new();
    let mut projections = Vec::new();
    let mut tangents = Vec::new();
    for target in targets {
        for &n in n_points_list {
            shapes.push(ManifoldCase::new(
                target,
                ManifoldCheck::RandomPointShape {
                    n_points: n,
                    seed: rng.next_u64(),
                    expected_shape: target.batch_shape(n),
                },
            )?);
            projections.push(ManifoldCase::new(
                target,
                ManifoldCheck::ProjectionBelongs {
                    point: gaussian_points(target, n, rng)?,
                },
            )?);
        }
        for &n in n_vecs_list {
            let base_point = target
                .space
                .random_point(n, rng)
                .map_err(|err| format!("{}: {err}", target.entity))?;
            tangents.push(ManifoldCase::new(
                target,
                ManifoldCheck::ToTangentIsTangent {
                    vector: gaussian_points(target, n, rng)?,
                    base_point,
                },
            )?);
        }
    }
    let mut cases = generate_derived_cases("random_point_shape", shapes);
    cases.extend(generate_cases("projection_belongs", Vec::new(), projections));
    cases.extend(generate_cases("to_tangent_is_tangent", Vec::new(), tangents));
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::{
        ManifoldCase, ManifoldCheck, SpaceUnderTest, execute_manifold_case, manifold_family_cases,
        random_point_belongs_cases,
    };
    use crate::runner::Tolerance;
    use gms_array::Array;
    use gms_geometry::{Euclidean, Hypersphere};
    use gms_random::DeterministicRng;
    use std::sync::Arc;

    const TOL: Tolerance = Tolerance {
        abs: 1e-6,
        rel: 1e-6,
    };

    fn sphere() -> SpaceUnderTest {
        let space = Hypersphere::new(2).expect("dim");
        SpaceUnderTest::new("hypersphere(2)", Arc::new(space), 1e-10)
    }

    #[test]
    fn generated_families_pass_on_the_sphere() {
        let mut rng = DeterministicRng::new(5);
        let cases = manifold_family_cases(&[sphere()], &[1, 3], &[2], &mut rng).expect("cases");
        assert_eq!(cases.len(), 5);
        for case in &cases {
            execute_manifold_case(&case.input, TOL)
                .unwrap_or_else(|f| panic!("{}: {f:?}", case.id));
        }
    }

    #[test]
    fn belongs_mismatch_is_reported() {
        let case = ManifoldCase::new(
            &sphere(),
            ManifoldCheck::Belongs {
                point: Array::vector(vec![0.0, 0.0, 2.0]),
                expected: vec![true],
            },
        )
        .expect("case");
        let failure = execute_manifold_case(&case, TOL).expect_err("not on sphere");
        assert_eq!(failure.reason_code, "flag_mismatch");
    }

    #[test]
    fn malformed_inputs_are_rejected_at_construction() {
        let err = ManifoldCase::new(
            &sphere(),
            ManifoldCheck::ProjectionBelongs {
                point: Array::vector(vec![1.0, 2.0]),
            },
        )
        .expect_err("wrong shape");
        assert!(err.contains("hypersphere(2)"));
    }

    #[test]
    fn random_point_belongs_keeps_smoke_before_random() {
        let space = Euclidean::new(3).expect("dim");
        let euclid = SpaceUnderTest::new("euclidean(3)", Arc::new(space), 0.0);
        let mut rng = DeterministicRng::new(1);
        let cases = random_point_belongs_cases(
            &[(sphere(), 1), (euclid.clone(), 2)],
            &[(euclid, 4)],
            &mut rng,
        )
        .expect("cases");
        let ids: Vec<_> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "random_point_belongs/smoke/0",
                "random_point_belongs/smoke/1",
                "random_point_belongs/randomized/0"
            ]
        );
        for case in &cases {
            assert!(execute_manifold_case(&case.input, TOL).is_ok());
        }
    }
}
