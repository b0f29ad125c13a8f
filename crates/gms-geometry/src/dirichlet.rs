//! Dirichlet parameter space `R_{>0}^dim` under the Fisher–Rao metric.
//!
//! The metric has closed-form coefficients in terms of polygamma
//! functions; geodesics have none, so `exp` integrates the geodesic
//! equation and `log` shoots on top of it.

use gms_linalg::{Matrix, solve};
use gms_random::DeterministicRng;

use crate::special::{tetragamma, trigamma};
use crate::traits::{Manifold, RiemannianMetric};
use crate::{GeometryError, axpy, norm};

pub const DEFAULT_GEODESIC_STEPS: usize = 100;
pub const MAX_SHOOTING_ITERATIONS: usize = 50;
const SHOOTING_TOL: f64 = 1e-10;
const MAX_STEP_HALVINGS: usize = 30;
const FINITE_DIFFERENCE_STEP: f64 = 1e-7;
const PROJECTION_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirichletDistributions {
    dim: usize,
}

impl DirichletDistributions {
    pub fn new(dim: usize) -> Result<Self, GeometryError> {
        if dim < 2 {
            return Err(GeometryError::InvalidParameter(
                "dirichlet distributions need at least two parameters",
            ));
        }
        Ok(Self { dim })
    }

    pub(crate) const fn two_parameter() -> Self {
        Self { dim: 2 }
    }

    #[must_use]
    pub fn metric(self) -> DirichletMetric {
        DirichletMetric::new(self)
    }

    fn require_point(&self, point: &[f64]) -> Result<(), GeometryError> {
        if self.belongs_point(point, 0.0) {
            Ok(())
        } else {
            Err(GeometryError::NotOnManifold(
                "dirichlet parameters must be positive and of length dim",
            ))
        }
    }
}

impl Manifold for DirichletDistributions {
    fn name(&self) -> &'static str {
        "dirichlet_distributions"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn point_shape(&self) -> Vec<usize> {
        vec![self.dim]
    }

    fn default_bound(&self) -> f64 {
        5.0
    }

    fn belongs_point(&self, point: &[f64], _atol: f64) -> bool {
        point.len() == self.dim && point.iter().all(|&x| x > 0.0 && x.is_finite())
    }

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        bound: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        Ok((0..self.dim).map(|_| bound * rng.next_open_f64()).collect())
    }

    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        if point.len() != self.dim {
            return Err(GeometryError::NotOnManifold(
                "point length differs from dirichlet dim",
            ));
        }
        Ok(point.iter().map(|&x| x.max(PROJECTION_FLOOR)).collect())
    }

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        if vector.len() != self.dim || base_point.len() != self.dim {
            return Err(GeometryError::NotOnManifold(
                "vector length differs from dirichlet dim",
            ));
        }
        Ok(vector.to_vec())
    }

    fn is_tangent_point(&self, vector: &[f64], _base_point: &[f64], _atol: f64) -> bool {
        vector.len() == self.dim && vector.iter().all(|x| x.is_finite())
    }

    /// Coordinates scale with the base point so that small samples stay
    /// well inside the open set.
    fn random_tangent_vec_at(
        &self,
        base_point: &[f64],
        rng: &mut DeterministicRng,
        scale: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        self.require_point(base_point)?;
        Ok(base_point
            .iter()
            .map(|&p| p * scale * rng.standard_normal())
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirichletMetric {
    space: DirichletDistributions,
    n_steps: usize,
}

impl DirichletMetric {
    #[must_use]
    pub fn new(space: DirichletDistributions) -> Self {
        Self {
            space,
            n_steps: DEFAULT_GEODESIC_STEPS,
        }
    }

    #[must_use]
    pub fn with_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps.max(1);
        self
    }

    #[must_use]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    fn metric_entries(point: &[f64]) -> Vec<f64> {
        let d = point.len();
        let coupling = trigamma(point.iter().sum());
        let mut g = vec![-coupling; d * d];
        for (i, &x) in point.iter().enumerate() {
            g[i * d + i] += trigamma(x);
        }
        g
    }

    /// `-Γ^k_ij v^i v^j`. With `t_i = ψ2(x_i)` and `s = ψ2(Σx)` the
    /// first-kind symbols collapse to `½(δ_ijl t_i - s)`.
    fn geodesic_acceleration(point: &[f64], velocity: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let d = point.len();
        let g = Matrix::from_vec(d, Self::metric_entries(point))?;
        let s = tetragamma(point.iter().sum());
        let speed_sum: f64 = velocity.iter().sum();
        let rhs: Vec<f64> = point
            .iter()
            .zip(velocity)
            .map(|(&x, &v)| -0.5 * (tetragamma(x) * v * v - s * speed_sum * speed_sum))
            .collect();
        Ok(solve(&g, &rhs)?)
    }

    fn in_domain(point: &[f64]) -> bool {
        point.iter().all(|&x| x > 0.0 && x.is_finite())
    }

    /// Classical RK4 on `(x, v)` over unit time.
    fn integrate(
        &self,
        base_point: &[f64],
        tangent_vec: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        let h = 1.0 / self.n_steps as f64;
        let mut x = base_point.to_vec();
        let mut v = tangent_vec.to_vec();
        for step in 0..self.n_steps {
            let blow_up = GeometryError::IntegrationBlowUp { step };
            let k1x = v.clone();
            let k1v = Self::geodesic_acceleration(&x, &v)?;

            let x2 = axpy(0.5 * h, &k1x, &x);
            let v2 = axpy(0.5 * h, &k1v, &v);
            if !Self::in_domain(&x2) {
                return Err(blow_up);
            }
            let k2v = Self::geodesic_acceleration(&x2, &v2)?;

            let x3 = axpy(0.5 * h, &v2, &x);
            let v3 = axpy(0.5 * h, &k2v, &v);
            if !Self::in_domain(&x3) {
                return Err(blow_up);
            }
            let k3v = Self::geodesic_acceleration(&x3, &v3)?;

            let x4 = axpy(h, &v3, &x);
            let v4 = axpy(h, &k3v, &v);
            if !Self::in_domain(&x4) {
                return Err(blow_up);
            }
            let k4v = Self::geodesic_acceleration(&x4, &v4)?;

            for i in 0..x.len() {
                x[i] += h / 6.0 * (k1x[i] + 2.0 * v2[i] + 2.0 * v3[i] + v4[i]);
                v[i] += h / 6.0 * (k1v[i] + 2.0 * k2v[i] + 2.0 * k3v[i] + k4v[i]);
            }
            if !Self::in_domain(&x) || v.iter().any(|c| !c.is_finite()) {
                return Err(blow_up);
            }
        }
        Ok(x)
    }

    fn shoot(
        &self,
        velocity: &[f64],
        base_point: &[f64],
        target: &[f64],
    ) -> Result<(Vec<f64>, f64), GeometryError> {
        let end = self.integrate(base_point, velocity)?;
        let residual: Vec<f64> = end.iter().zip(target).map(|(e, t)| e - t).collect();
        let size = norm(&residual);
        Ok((residual, size))
    }
}

impl RiemannianMetric for DirichletMetric {
    fn space(&self) -> &dyn Manifold {
        &self.space
    }

    fn inner_product_at(
        &self,
        tangent_a: &[f64],
        tangent_b: &[f64],
        base_point: &[f64],
    ) -> Result<f64, GeometryError> {
        self.space.require_point(base_point)?;
        let d = base_point.len();
        let g = Self::metric_entries(base_point);
        let mut acc = 0.0;
        for i in 0..d {
            for j in 0..d {
                acc += tangent_a[i] * g[i * d + j] * tangent_b[j];
            }
        }
        Ok(acc)
    }

    fn exp_at(&self, tangent_vec: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.space.require_point(base_point)?;
        if tangent_vec.iter().all(|&v| v == 0.0) {
            return Ok(base_point.to_vec());
        }
        self.integrate(base_point, tangent_vec)
    }

    /// Newton shooting on `v ↦ exp(v, base_point) - point` with a
    /// forward-difference Jacobian and step halving.
    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.space.require_point(base_point)?;
        self.space.require_point(point)?;
        let d = base_point.len();
        let tol = SHOOTING_TOL * (1.0 + norm(point));

        let mut velocity: Vec<f64> = point.iter().zip(base_point).map(|(q, p)| q - p).collect();
        let mut current = None;
        for _ in 0..MAX_STEP_HALVINGS {
            if let Ok(shot) = self.shoot(&velocity, base_point, point) {
                current = Some(shot);
                break;
            }
            velocity.iter_mut().for_each(|v| *v *= 0.5);
        }
        let Some((mut residual, mut size)) = current else {
            return Err(GeometryError::LogDidNotConverge {
                iterations: 0,
                residual: f64::INFINITY,
            });
        };

        for iteration in 0..MAX_SHOOTING_ITERATIONS {
            if size <= tol {
                return Ok(velocity);
            }
            let mut jacobian = Matrix::zeros(d);
            for j in 0..d {
                let h = FINITE_DIFFERENCE_STEP * (1.0 + velocity[j].abs());
                let mut bumped = velocity.clone();
                bumped[j] += h;
                let (column, signed_h) = match self.shoot(&bumped, base_point, point) {
                    Ok((r, _)) => (r, h),
                    Err(_) => {
                        bumped[j] = velocity[j] - h;
                        (self.shoot(&bumped, base_point, point)?.0, -h)
                    }
                };
                for i in 0..d {
                    jacobian.set(i, j, (column[i] - residual[i]) / signed_h);
                }
            }
            let negated: Vec<f64> = residual.iter().map(|r| -r).collect();
            let delta = solve(&jacobian, &negated)?;

            let mut step = 1.0;
            let mut accepted = false;
            for _ in 0..MAX_STEP_HALVINGS {
                let candidate = axpy(step, &delta, &velocity);
                if let Ok((r, s)) = self.shoot(&candidate, base_point, point) {
                    if s < size {
                        velocity = candidate;
                        residual = r;
                        size = s;
                        accepted = true;
                        break;
                    }
                }
                step *= 0.5;
            }
            if !accepted {
                return Err(GeometryError::LogDidNotConverge {
                    iterations: iteration + 1,
                    residual: size,
                });
            }
        }
        if size <= tol {
            return Ok(velocity);
        }
        Err(GeometryError::LogDidNotConverge {
            iterations: MAX_SHOOTING_ITERATIONS,
            residual: size,
        })
    }

    fn metric_matrix_at(&self, base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.space.require_point(base_point)?;
        Ok(Self::metric_entries(base_point))
    }

    fn christoffels_at(&self, base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        self.space.require_point(base_point)?;
        let d = base_point.len();
        let g = Matrix::from_vec(d, Self::metric_entries(base_point))?;
        let g_inv = gms_linalg::inverse(&g)?;
        let s = tetragamma(base_point.iter().sum());
        let t: Vec<f64> = base_point.iter().map(|&x| tetragamma(x)).collect();

        let mut gamma = vec![0.0; d * d * d];
        for k in 0..d {
            let row_sum: f64 = (0..d).map(|l| g_inv.get(k, l)).sum();
            for i in 0..d {
                for j in 0..d {
                    let diagonal = if i == j { g_inv.get(k, i) * t[i] } else { 0.0 };
                    gamma[(k * d + i) * d + j] = 0.5 * (diagonal - s * row_sum);
                }
            }
        }
        Ok(gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::{DirichletDistributions, DirichletMetric};
    use crate::GeometryError;
    use crate::special::trigamma;
    use crate::traits::{Manifold, RiemannianMetric};
    use gms_array::{Array, all_close};
    use gms_random::DeterministicRng;

    fn metric(dim: usize) -> DirichletMetric {
        DirichletDistributions::new(dim).expect("dim").metric()
    }

    #[test]
    fn belongs_requires_positive_coordinates() {
        let space = DirichletDistributions::new(3).expect("dim");
        let belongs = |values: Vec<f64>| space.belongs(&Array::vector(values), 0.0);
        assert_eq!(belongs(vec![0.1, 1.0, 0.3]), vec![true]);
        assert_eq!(belongs(vec![0.0, 1.0, 0.3]), vec![false]);
        assert_eq!(belongs(vec![0.1, 1.0]), vec![false]);
    }

    #[test]
    fn metric_matrix_at_unit_parameters() {
        let g = metric(2)
            .metric_matrix(&Array::vector(vec![1.0, 1.0]))
            .expect("metric");
        let off = -(std::f64::consts::PI.powi(2) / 6.0 - 1.0);
        let expected = Array::from_rows(&[vec![1.0, off], vec![off, 1.0]]).expect("rows");
        assert!(all_close(&expected, &g, 1e-10, 0.0));
    }

    #[test]
    fn christoffels_match_finite_difference_of_the_metric() {
        let p = [1.7, 0.8, 2.4];
        let d = p.len();
        let gamma = metric(3).christoffels_at(&p).expect("christoffels");
        let g = |x: &[f64], i: usize, j: usize| {
            let coupling = trigamma(x.iter().sum());
            if i == j { trigamma(x[i]) - coupling } else { -coupling }
        };
        let h = 1e-5;
        let dg = |l: usize, i: usize, j: usize| {
            let mut up = p;
            let mut down = p;
            up[l] += h;
            down[l] -= h;
            (g(&up, i, j) - g(&down, i, j)) / (2.0 * h)
        };
        // Lower the index back: g_kl Γ^l_ij = ½(∂_i g_jk + ∂_j g_ik - ∂_k g_ij).
        for k in 0..d {
            for i in 0..d {
                for j in 0..d {
                    let lowered: f64 = (0..d)
                        .map(|l| g(&p, k, l) * gamma[(l * d + i) * d + j])
                        .sum();
                    let first_kind = 0.5 * (dg(i, j, k) + dg(j, i, k) - dg(k, i, j));
                    assert!(
                        (lowered - first_kind).abs() < 1e-6,
                        "k={k} i={i} j={j}: {lowered} vs {first_kind}"
                    );
                }
            }
        }
    }

    #[test]
    fn log_inverts_exp() {
        let metric = metric(2);
        let space = DirichletDistributions::new(2).expect("dim");
        let mut rng = DeterministicRng::new(21);
        let base = space.random_point(3, &mut rng).expect("base");
        let vecs = space
            .random_tangent_vec(&base, 3, &mut rng, 0.1)
            .expect("tangent");
        let end = metric.exp(&vecs, &base).expect("exp");
        assert_eq!(space.belongs(&end, 0.0), vec![true; 3]);
        let recovered = metric.log(&end, &base).expect("log");
        assert!(all_close(&vecs, &recovered, 1e-6, 1e-6));
    }

    #[test]
    fn exp_of_zero_is_identity_and_dist_to_self_vanishes() {
        let metric = metric(2);
        let p = Array::vector(vec![2.0, 3.0]);
        let zero = Array::vector(vec![0.0, 0.0]);
        assert_eq!(metric.exp(&zero, &p).expect("exp"), p);
        assert_eq!(metric.dist(&p, &p).expect("dist").values(), &[0.0]);
    }

    #[test]
    fn exp_leaving_the_open_set_is_reported() {
        let metric = metric(2).with_steps(10);
        let p = Array::vector(vec![0.5, 0.5]);
        let v = Array::vector(vec![-50.0, -50.0]);
        let err = metric.exp(&v, &p).expect_err("blows up");
        assert!(matches!(err, GeometryError::IntegrationBlowUp { .. }));
    }
}
