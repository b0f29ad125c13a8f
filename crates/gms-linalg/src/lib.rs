#![forbid(unsafe_code)]

use core::fmt;

pub const MAX_JACOBI_SWEEPS: usize = 64;
pub const MAX_SQRTM_ITERATIONS: usize = 100;
pub const MAX_LOGM_SQUARE_ROOTS: usize = 40;
pub const EXPM_TAYLOR_TERMS: usize = 20;
pub const LOGM_SERIES_TERMS: usize = 120;
pub const SINGULARITY_THRESHOLD: f64 = 1e-14;

pub const LINALG_REASON_CODES: [&str; 4] = [
    "linalg_shape_contract_violation",
    "linalg_singular_matrix",
    "linalg_nonconvergence",
    "linalg_logarithm_undefined",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinAlgError {
    ShapeContractViolation(&'static str),
    SingularMatrix,
    NonConvergence(&'static str),
    LogarithmUndefined,
}

impl LinAlgError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ShapeContractViolation(_) => "linalg_shape_contract_violation",
            Self::SingularMatrix => "linalg_singular_matrix",
            Self::NonConvergence(_) => "linalg_nonconvergence",
            Self::LogarithmUndefined => "linalg_logarithm_undefined",
        }
    }
}

impl fmt::Display for LinAlgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeContractViolation(msg) => write!(f, "{msg}"),
            Self::SingularMatrix => write!(f, "matrix is singular to working precision"),
            Self::NonConvergence(what) => write!(f, "{what} did not converge"),
            Self::LogarithmUndefined => {
                write!(f, "matrix has no real principal logarithm")
            }
        }
    }
}

impl std::error::Error for LinAlgError {}

/// Dense square matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn from_vec(n: usize, data: Vec<f64>) -> Result<Self, LinAlgError> {
        if n == 0 {
            return Err(LinAlgError::ShapeContractViolation(
                "matrix order must be non-zero",
            ));
        }
        if data.len() != n * n {
            return Err(LinAlgError::ShapeContractViolation(
                "matrix data length must equal n*n",
            ));
        }
        Ok(Self { n, data })
    }

    pub fn from_slice(n: usize, data: &[f64]) -> Result<Self, LinAlgError> {
        Self::from_vec(n, data.to_vec())
    }

    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { n, data }
    }

    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n + col] = value;
    }

    fn check_same_order(&self, other: &Self) -> Result<(), LinAlgError> {
        if self.n == other.n {
            Ok(())
        } else {
            Err(LinAlgError::ShapeContractViolation(
                "matrix orders must agree",
            ))
        }
    }

    pub fn matmul(&self, other: &Self) -> Result<Self, LinAlgError> {
        self.check_same_order(other)?;
        let n = self.n;
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            for k in 0..n {
                let lhs = self.data[i * n + k];
                if lhs == 0.0 {
                    continue;
                }
                for j in 0..n {
                    out[i * n + j] += lhs * other.data[k * n + j];
                }
            }
        }
        Ok(Self { n, data: out })
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let n = self.n;
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                out[j * n + i] = self.data[i * n + j];
            }
        }
        Self { n, data: out }
    }

    pub fn add(&self, other: &Self) -> Result<Self, LinAlgError> {
        self.check_same_order(other)?;
        Ok(Self {
            n: self.n,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    pub fn sub(&self, other: &Self) -> Result<Self, LinAlgError> {
        self.check_same_order(other)?;
        Ok(Self {
            n: self.n,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a - b)
                .collect(),
        })
    }

    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            n: self.n,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    #[must_use]
    pub fn trace(&self) -> f64 {
        (0..self.n).map(|i| self.get(i, i)).sum()
    }

    pub fn frobenius_inner(&self, other: &Self) -> Result<f64, LinAlgError> {
        self.check_same_order(other)?;
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum())
    }

    #[must_use]
    pub fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    #[must_use]
    pub fn one_norm(&self) -> f64 {
        (0..self.n)
            .map(|j| (0..self.n).map(|i| self.get(i, j).abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    pub fn max_abs_diff(&self, other: &Self) -> Result<f64, LinAlgError> {
        self.check_same_order(other)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }

    #[must_use]
    pub fn symmetrize(&self) -> Self {
        let t = self.transpose();
        Self {
            n: self.n,
            data: self
                .data
                .iter()
                .zip(&t.data)
                .map(|(a, b)| 0.5 * (a + b))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_symmetric(&self, atol: f64) -> bool {
        (0..self.n).all(|i| (0..i).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= atol))
    }
}

/// Commutator `ab - ba`.
pub fn bracket(a: &Matrix, b: &Matrix) -> Result<Matrix, LinAlgError> {
    a.matmul(b)?.sub(&b.matmul(a)?)
}

/// Gauss-Jordan inverse with partial pivoting.
pub fn inverse(matrix: &Matrix) -> Result<Matrix, LinAlgError> {
    let n = matrix.n;
    let mut work = matrix.data.clone();
    let mut inv = Matrix::identity(n).data;
    let scale = matrix
        .data
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| work[a * n + col].abs().total_cmp(&work[b * n + col].abs()))
            .unwrap_or(col);
        let pivot = work[pivot_row * n + col];
        if pivot.abs() <= SINGULARITY_THRESHOLD * scale {
            return Err(LinAlgError::SingularMatrix);
        }
        if pivot_row != col {
            for j in 0..n {
                work.swap(col * n + j, pivot_row * n + j);
                inv.swap(col * n + j, pivot_row * n + j);
            }
        }
        for j in 0..n {
            work[col * n + j] /= pivot;
            inv[col * n + j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[row * n + col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[row * n + j] -= factor * work[col * n + j];
                inv[row * n + j] -= factor * inv[col * n + j];
            }
        }
    }
    Ok(Matrix { n, data: inv })
}

/// Solves `a x = b` by Gaussian elimination with partial pivoting.
pub fn solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>, LinAlgError> {
    let n = a.n;
    if b.len() != n {
        return Err(LinAlgError::ShapeContractViolation(
            "right-hand side length must equal matrix order",
        ));
    }
    let mut work = a.data.clone();
    let mut rhs = b.to_vec();
    let scale = a
        .data
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(f64::MIN_POSITIVE);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&x, &y| work[x * n + col].abs().total_cmp(&work[y * n + col].abs()))
            .unwrap_or(col);
        let pivot = work[pivot_row * n + col];
        if pivot.abs() <= SINGULARITY_THRESHOLD * scale {
            return Err(LinAlgError::SingularMatrix);
        }
        if pivot_row != col {
            for j in 0..n {
                work.swap(col * n + j, pivot_row * n + j);
            }
            rhs.swap(col, pivot_row);
        }
        for row in col + 1..n {
            let factor = work[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                work[row * n + j] -= factor * work[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|j| work[row * n + j] * x[j]).sum();
        x[row] = (rhs[row] - tail) / work[row * n + row];
    }
    Ok(x)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricEigen {
    /// Ascending.
    pub eigenvalues: Vec<f64>,
    /// Column `j` is the eigenvector of `eigenvalues[j]`.
    pub eigenvectors: Matrix,
}

/// Cyclic Jacobi eigen-decomposition of the symmetric part of `matrix`.
pub fn sym_eigh(matrix: &Matrix) -> Result<SymmetricEigen, LinAlgError> {
    let n = matrix.n;
    let mut a = matrix.symmetrize();
    let mut v = Matrix::identity(n);
    let total = a.frobenius_norm().max(f64::MIN_POSITIVE);

    let mut converged = false;
    for _ in 0..MAX_JACOBI_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a.get(i, j).powi(2))
            .sum::<f64>()
            .sqrt();
        if off <= 1e-14 * total {
            converged = true;
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                let apq = a.get(p, q);
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a.get(q, q) - a.get(p, p)) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let akp = a.get(k, p);
                    let akq = a.get(k, q);
                    a.set(k, p, c * akp - s * akq);
                    a.set(k, q, s * akp + c * akq);
                }
                for k in 0..n {
                    let apk = a.get(p, k);
                    let aqk = a.get(q, k);
                    a.set(p, k, c * apk - s * aqk);
                    a.set(q, k, s * apk + c * aqk);
                }
                for k in 0..n {
                    let vkp = v.get(k, p);
                    let vkq = v.get(k, q);
                    v.set(k, p, c * vkp - s * vkq);
                    v.set(k, q, s * vkp + c * vkq);
                }
                a.set(p, q, 0.0);
                a.set(q, p, 0.0);
            }
        }
    }
    if !converged {
        return Err(LinAlgError::NonConvergence("jacobi eigen-decomposition"));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a.get(i, i).total_cmp(&a.get(j, j)));
    let eigenvalues = order.iter().map(|&i| a.get(i, i)).collect();
    let mut eigenvectors = Matrix::zeros(n);
    for (dst, &src) in order.iter().enumerate() {
        for k in 0..n {
            eigenvectors.set(k, dst, v.get(k, src));
        }
    }
    Ok(SymmetricEigen {
        eigenvalues,
        eigenvectors,
    })
}

/// Orthonormalises the `cols` columns of a row-major `rows x cols` matrix.
pub fn gram_schmidt(rows: usize, cols: usize, data: &[f64]) -> Result<Vec<f64>, LinAlgError> {
    if data.len() != rows * cols || cols > rows {
        return Err(LinAlgError::ShapeContractViolation(
            "gram-schmidt expects a tall rows x cols matrix",
        ));
    }
    let mut columns: Vec<Vec<f64>> = (0..cols)
        .map(|j| (0..rows).map(|i| data[i * cols + j]).collect())
        .collect();
    for j in 0..cols {
        // Two passes keep the basis orthogonal to working precision.
        for _ in 0..2 {
            for prev in 0..j {
                let proj: f64 = columns[j]
                    .iter()
                    .zip(&columns[prev])
                    .map(|(a, b)| a * b)
                    .sum();
                let basis = columns[prev].clone();
                for (value, b) in columns[j].iter_mut().zip(&basis) {
                    *value -= proj * b;
                }
            }
        }
        let norm = columns[j].iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= SINGULARITY_THRESHOLD {
            return Err(LinAlgError::SingularMatrix);
        }
        for value in &mut columns[j] {
            *value /= norm;
        }
    }
    let mut out = vec![0.0; rows * cols];
    for (j, column) in columns.iter().enumerate() {
        for (i, value) in column.iter().enumerate() {
            out[i * cols + j] = *value;
        }
    }
    Ok(out)
}

/// Matrix exponential by scaling and squaring with a Taylor core.
pub fn expm(matrix: &Matrix) -> Result<Matrix, LinAlgError> {
    let norm = matrix.one_norm();
    if !norm.is_finite() {
        return Err(LinAlgError::ShapeContractViolation(
            "expm input must be finite",
        ));
    }
    let squarings = if norm > 0.5 {
        (norm / 0.5).log2().ceil() as u32
    } else {
        0
    };
    let scaled = matrix.scale(0.5_f64.powi(squarings as i32));

    let mut result = Matrix::identity(matrix.n);
    let mut term = Matrix::identity(matrix.n);
    for k in 1..=EXPM_TAYLOR_TERMS {
        term = term.matmul(&scaled)?.scale(1.0 / k as f64);
        result = result.add(&term)?;
        if term.frobenius_norm() <= f64::EPSILON * result.frobenius_norm() {
            break;
        }
    }
    for _ in 0..squarings {
        result = result.matmul(&result)?;
    }
    Ok(result)
}

/// Principal square root by Denman-Beavers iteration.
pub fn sqrtm(matrix: &Matrix) -> Result<Matrix, LinAlgError> {
    let mut y = matrix.clone();
    let mut z = Matrix::identity(matrix.n);
    for _ in 0..MAX_SQRTM_ITERATIONS {
        let y_inv = inverse(&y)?;
        let z_inv = inverse(&z)?;
        let next_y = y.add(&z_inv)?.scale(0.5);
        let next_z = z.add(&y_inv)?.scale(0.5);
        let delta = next_y.max_abs_diff(&y)?;
        y = next_y;
        z = next_z;
        if delta <= 1e-14 * y.frobenius_norm().max(1.0) {
            let residual = y.matmul(&y)?.max_abs_diff(matrix)?;
            if residual > 1e-8 * matrix.frobenius_norm().max(1.0) {
                return Err(LinAlgError::NonConvergence("square root residual"));
            }
            return Ok(y);
        }
    }
    Err(LinAlgError::NonConvergence("denman-beavers square root"))
}

/// Principal logarithm by inverse scaling and squaring.
pub fn logm(matrix: &Matrix) -> Result<Matrix, LinAlgError> {
    let identity = Matrix::identity(matrix.n);
    let mut a = matrix.clone();
    let mut roots = 0u32;
    while a.sub(&identity)?.frobenius_norm() > 0.25 {
        if roots as usize >= MAX_LOGM_SQUARE_ROOTS {
            return Err(LinAlgError::LogarithmUndefined);
        }
        a = sqrtm(&a).map_err(|_| LinAlgError::LogarithmUndefined)?;
        roots += 1;
    }

    let x = a.sub(&identity)?;
    let mut result = Matrix::zeros(matrix.n);
    let mut power = identity;
    for m in 1..=LOGM_SERIES_TERMS {
        power = power.matmul(&x)?;
        let sign = if m % 2 == 1 { 1.0 } else { -1.0 };
        let term = power.scale(sign / m as f64);
        result = result.add(&term)?;
        if term.frobenius_norm() <= f64::EPSILON * result.frobenius_norm().max(f64::EPSILON) {
            break;
        }
    }
    Ok(result.scale(2.0_f64.powi(roots as i32)))
}

#[cfg(test)]
mod tests {
    use super::{
        LINALG_REASON_CODES, LinAlgError, Matrix, bracket, expm, gram_schmidt, inverse, logm,
        solve, sqrtm, sym_eigh,
    };

    fn rotation_z(angle: f64) -> Matrix {
        let (s, c) = angle.sin_cos();
        Matrix::from_vec(3, vec![c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0]).expect("3x3")
    }

    #[test]
    fn reason_code_registry_matches_variants() {
        let errors = [
            LinAlgError::ShapeContractViolation("x"),
            LinAlgError::SingularMatrix,
            LinAlgError::NonConvergence("x"),
            LinAlgError::LogarithmUndefined,
        ];
        let codes: Vec<_> = errors.iter().map(LinAlgError::reason_code).collect();
        assert_eq!(codes, LINALG_REASON_CODES);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(matches!(
            Matrix::from_vec(2, vec![1.0; 3]),
            Err(LinAlgError::ShapeContractViolation(_))
        ));
    }

    #[test]
    fn inverse_round_trips_and_detects_singularity() {
        let a = Matrix::from_vec(3, vec![4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0]).expect("a");
        let inv = inverse(&a).expect("invertible");
        let product = a.matmul(&inv).expect("product");
        assert!(product.max_abs_diff(&Matrix::identity(3)).expect("diff") < 1e-12);

        let singular = Matrix::from_vec(2, vec![1.0, 2.0, 2.0, 4.0]).expect("singular");
        assert_eq!(inverse(&singular), Err(LinAlgError::SingularMatrix));
    }

    #[test]
    fn solve_matches_known_solution() {
        let a = Matrix::from_vec(2, vec![2.0, 1.0, 1.0, 3.0]).expect("a");
        let x = solve(&a, &[3.0, 5.0]).expect("solve");
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn jacobi_recovers_eigenpairs() {
        let a = Matrix::from_vec(2, vec![2.0, 1.0, 1.0, 2.0]).expect("a");
        let eig = sym_eigh(&a).expect("eigh");
        assert!((eig.eigenvalues[0] - 1.0).abs() < 1e-12);
        assert!((eig.eigenvalues[1] - 3.0).abs() < 1e-12);
        let v = &eig.eigenvectors;
        assert!((v.get(0, 1).abs() - 0.5_f64.sqrt()).abs() < 1e-12);
        assert!((v.get(0, 1) - v.get(1, 1)).abs() < 1e-12);
    }

    #[test]
    fn gram_schmidt_yields_orthonormal_columns() {
        let q = gram_schmidt(3, 2, &[1.0, 1.0, 0.0, 1.0, 1.0, 0.0]).expect("qr");
        let col = |j: usize| -> Vec<f64> { (0..3).map(|i| q[i * 2 + j]).collect() };
        let dot = |a: &[f64], b: &[f64]| -> f64 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!((dot(&col(0), &col(0)) - 1.0).abs() < 1e-12);
        assert!((dot(&col(1), &col(1)) - 1.0).abs() < 1e-12);
        assert!(dot(&col(0), &col(1)).abs() < 1e-12);
        assert!(gram_schmidt(2, 3, &[0.0; 6]).is_err());
    }

    #[test]
    fn expm_of_skew_generator_is_rotation() {
        let angle = 0.7;
        let generator =
            Matrix::from_vec(3, vec![0.0, -angle, 0.0, angle, 0.0, 0.0, 0.0, 0.0, 0.0])
                .expect("skew");
        let rotation = expm(&generator).expect("expm");
        assert!(rotation.max_abs_diff(&rotation_z(angle)).expect("diff") < 1e-12);
    }

    #[test]
    fn logm_inverts_expm_inside_injectivity_radius() {
        let rotation = rotation_z(1.2);
        let log = logm(&rotation).expect("logm");
        assert!((log.get(1, 0) - 1.2).abs() < 1e-10);
        assert!((log.get(0, 1) + 1.2).abs() < 1e-10);
        let back = expm(&log).expect("expm");
        assert!(back.max_abs_diff(&rotation).expect("diff") < 1e-10);
    }

    #[test]
    fn logm_rejects_half_turn() {
        let half_turn = rotation_z(std::f64::consts::PI);
        assert_eq!(logm(&half_turn), Err(LinAlgError::LogarithmUndefined));
    }

    #[test]
    fn sqrtm_squares_back() {
        let a = Matrix::from_vec(2, vec![5.0, 2.0, 2.0, 3.0]).expect("spd");
        let root = sqrtm(&a).expect("sqrtm");
        let squared = root.matmul(&root).expect("square");
        assert!(squared.max_abs_diff(&a).expect("diff") < 1e-10);
    }

    #[test]
    fn bracket_of_commuting_matrices_vanishes() {
        let a = Matrix::identity(3).scale(2.0);
        let b = rotation_z(0.3);
        let c = bracket(&a, &b).expect("bracket");
        assert!(c.frobenius_norm() < 1e-15);
    }
}
