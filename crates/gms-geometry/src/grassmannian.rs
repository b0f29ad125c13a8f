//! `Gr(n, k)`: `k`-dimensional subspaces of `R^n`, represented by their
//! orthogonal projectors.

use gms_linalg::{Matrix, bracket, expm, gram_schmidt, logm, sym_eigh};
use gms_random::DeterministicRng;

use crate::GeometryError;
use crate::traits::{Manifold, RiemannianMetric};

const MAX_FRAME_DRAWS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grassmannian {
    n: usize,
    k: usize,
}

impl Grassmannian {
    pub fn new(n: usize, k: usize) -> Result<Self, GeometryError> {
        if k == 0 || k >= n {
            return Err(GeometryError::InvalidParameter(
                "grassmannian needs 0 < k < n",
            ));
        }
        Ok(Self { n, k })
    }

    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn metric(self) -> GrassmannianCanonicalMetric {
        GrassmannianCanonicalMetric { space: self }
    }

    fn matrix(&self, values: &[f64]) -> Result<Matrix, GeometryError> {
        Matrix::from_slice(self.n, values).map_err(|_| {
            GeometryError::NotOnManifold("grassmannian points are n x n matrices")
        })
    }

    /// `Σ_c q_c q_cᵀ` over the columns of a row-major `n x cols` frame.
    fn projector_from_frame(&self, frame: &[f64], cols: usize) -> Matrix {
        let n = self.n;
        let mut out = Matrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                let value = (0..cols).map(|c| frame[i * cols + c] * frame[j * cols + c]).sum();
                out.set(i, j, value);
            }
        }
        out
    }

    /// `[P, [P, S]] = PS + SP - 2PSP` for the symmetric part `S` of `vector`.
    fn horizontal_part(&self, vector: &Matrix, base: &Matrix) -> Result<Matrix, GeometryError> {
        let sym = vector.symmetrize();
        Ok(bracket(base, &bracket(base, &sym)?)?)
    }
}

impl Manifold for Grassmannian {
    fn name(&self) -> &'static str {
        "grassmannian"
    }

    fn dim(&self) -> usize {
        self.k * (self.n - self.k)
    }

    fn point_shape(&self) -> Vec<usize> {
        vec![self.n, self.n]
    }

    fn belongs_point(&self, point: &[f64], atol: f64) -> bool {
        let Ok(p) = self.matrix(point) else {
            return false;
        };
        if !p.is_symmetric(atol) || (p.trace() - self.k as f64).abs() > atol {
            return false;
        }
        p.matmul(&p)
            .and_then(|square| square.max_abs_diff(&p))
            .is_ok_and(|err| err <= atol)
    }

    fn random_point_with(
        &self,
        rng: &mut DeterministicRng,
        _bound: f64,
    ) -> Result<Vec<f64>, GeometryError> {
        let mut last_err = None;
        for _ in 0..MAX_FRAME_DRAWS {
            let raw = rng.normal_vec(self.n * self.k);
            match gram_schmidt(self.n, self.k, &raw) {
                Ok(frame) => return Ok(self.projector_from_frame(&frame, self.k).into_vec()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.map_or(
            GeometryError::InvalidParameter("no frame drawn"),
            GeometryError::LinAlg,
        ))
    }

    /// Nearest projector: span of the `k` leading eigenvectors of the
    /// symmetric part.
    fn projection_point(&self, point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let eigen = sym_eigh(&self.matrix(point)?)?;
        let n = self.n;
        let first = n - self.k;
        let mut frame = Vec::with_capacity(n * self.k);
        for i in 0..n {
            for c in first..n {
                frame.push(eigen.eigenvectors.get(i, c));
            }
        }
        Ok(self.projector_from_frame(&frame, self.k).into_vec())
    }

    fn to_tangent_point(
        &self,
        vector: &[f64],
        base_point: &[f64],
    ) -> Result<Vec<f64>, GeometryError> {
        let v = self.matrix(vector)?;
        let p = self.matrix(base_point)?;
        Ok(self.horizontal_part(&v, &p)?.into_vec())
    }

    fn is_tangent_point(&self, vector: &[f64], base_point: &[f64], atol: f64) -> bool {
        let (Ok(x), Ok(p)) = (self.matrix(vector), self.matrix(base_point)) else {
            return false;
        };
        if !x.is_symmetric(atol) {
            return false;
        }
        // Horizontal vectors satisfy PX + XP = X.
        p.matmul(&x)
            .and_then(|px| x.matmul(&p).and_then(|xp| px.add(&xp)))
            .and_then(|sum| sum.max_abs_diff(&x))
            .is_ok_and(|err| err <= atol)
    }
}

/// Frobenius metric restricted to horizontal vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrassmannianCanonicalMetric {
    space: Grassmannian,
}

impl RiemannianMetric for GrassmannianCanonicalMetric {
    fn space(&self) -> &dyn Manifold {
        &self.space
    }

    fn inner_product_at(
        &self,
        tangent_a: &[f64],
        tangent_b: &[f64],
        _base_point: &[f64],
    ) -> Result<f64, GeometryError> {
        let a = self.space.matrix(tangent_a)?;
        let b = self.space.matrix(tangent_b)?;
        Ok(a.frobenius_inner(&b)?)
    }

    /// `e^Ω P e^{-Ω}` with `Ω = [X, P]`.
    fn exp_at(&self, tangent_vec: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let x = self.space.matrix(tangent_vec)?;
        let p = self.space.matrix(base_point)?;
        let rotation = expm(&bracket(&x, &p)?)?;
        let moved = rotation.matmul(&p)?.matmul(&rotation.transpose())?;
        Ok(moved.into_vec())
    }

    /// `[log((2Q - I)(2P - I)) / 2, P]`. Subspaces with a principal angle of
    /// π/2 have no principal logarithm.
    fn log_at(&self, point: &[f64], base_point: &[f64]) -> Result<Vec<f64>, GeometryError> {
        let q = self.space.matrix(point)?;
        let p = self.space.matrix(base_point)?;
        let identity = Matrix::identity(self.space.n);
        let reflect_q = q.scale(2.0).sub(&identity)?;
        let reflect_p = p.scale(2.0).sub(&identity)?;
        let rotation = reflect_q.matmul(&reflect_p)?;
        let generator = match logm(&rotation) {
            Ok(log) => log.scale(0.5),
            Err(gms_linalg::LinAlgError::LogarithmUndefined) => return Err(GeometryError::CutLocus),
            Err(err) => return Err(err.into()),
        };
        Ok(bracket(&generator, &p)?.into_vec())
    }
}
