#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub const ARRAY_REASON_CODES: [&str; 6] = [
    "array_size_overflow",
    "array_element_count_mismatch",
    "array_point_shape_mismatch",
    "array_batch_length_mismatch",
    "array_ragged_stack",
    "array_axis_out_of_bounds",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    Overflow,
    ElementCountMismatch { shape: Vec<usize>, len: usize },
    PointShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    BatchLengthMismatch { lhs: usize, rhs: usize },
    RaggedStack,
    AxisOutOfBounds { index: usize, len: usize },
}

impl ShapeError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Overflow => "array_size_overflow",
            Self::ElementCountMismatch { .. } => "array_element_count_mismatch",
            Self::PointShapeMismatch { .. } => "array_point_shape_mismatch",
            Self::BatchLengthMismatch { .. } => "array_batch_length_mismatch",
            Self::RaggedStack => "array_ragged_stack",
            Self::AxisOutOfBounds { .. } => "array_axis_out_of_bounds",
        }
    }
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => write!(f, "size arithmetic overflow"),
            Self::ElementCountMismatch { shape, len } => {
                write!(f, "shape {shape:?} does not hold {len} elements")
            }
            Self::PointShapeMismatch { expected, actual } => write!(
                f,
                "array shape {actual:?} is neither a point of shape {expected:?} nor a batch of them"
            ),
            Self::BatchLengthMismatch { lhs, rhs } => {
                write!(f, "cannot pair batches of length {lhs} and {rhs}")
            }
            Self::RaggedStack => write!(f, "cannot stack arrays of different shapes"),
            Self::AxisOutOfBounds { index, len } => write!(
                f,
                "index {index} out of bounds for leading axis of length {len}"
            ),
        }
    }
}

impl std::error::Error for ShapeError {}

pub fn element_count(shape: &[usize]) -> Result<usize, ShapeError> {
    shape.iter().try_fold(1usize, |acc, &dim| {
        acc.checked_mul(dim).ok_or(ShapeError::Overflow)
    })
}

/// Dense row-major `f64` array with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl Array {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self, ShapeError> {
        let expected = element_count(&shape)?;
        if expected != values.len() {
            return Err(ShapeError::ElementCountMismatch {
                shape,
                len: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }

    #[must_use]
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ShapeError> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(ShapeError::RaggedStack);
        }
        let values = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Self::new(vec![rows.len(), cols], values)
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self, ShapeError> {
        let count = element_count(&shape)?;
        Ok(Self {
            shape,
            values: vec![0.0; count],
        })
    }

    /// Evenly spaced samples over `[start, stop]`, endpoint included.
    #[must_use]
    pub fn linspace(start: f64, stop: f64, num: usize) -> Self {
        let values = match num {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (num - 1) as f64;
                (0..num)
                    .map(|i| {
                        if i == num - 1 {
                            stop
                        } else {
                            start + step * i as f64
                        }
                    })
                    .collect()
            }
        };
        Self::vector(values)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, ShapeError> {
        Self::new(shape, self.values)
    }

    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Sub-array at `index` along the leading axis.
    pub fn index_axis0(&self, index: usize) -> Result<Self, ShapeError> {
        let Some((&len, inner)) = self.shape.split_first() else {
            return Err(ShapeError::AxisOutOfBounds { index, len: 0 });
        };
        if index >= len {
            return Err(ShapeError::AxisOutOfBounds { index, len });
        }
        let stride = element_count(inner)?;
        Ok(Self {
            shape: inner.to_vec(),
            values: self.values[index * stride..(index + 1) * stride].to_vec(),
        })
    }

    /// Views the array as one point of `point_shape` or a batch of them.
    pub fn split_batch(&self, point_shape: &[usize]) -> Result<Batch<'_>, ShapeError> {
        let stride = element_count(point_shape)?;
        if self.shape == point_shape {
            return Ok(Batch {
                batched: false,
                points: vec![&self.values[..]],
            });
        }
        if self.shape.len() == point_shape.len() + 1 && self.shape[1..] == *point_shape {
            let points = if stride == 0 {
                vec![&self.values[..]; self.shape[0]]
            } else {
                self.values.chunks(stride).collect()
            };
            return Ok(Batch {
                batched: true,
                points,
            });
        }
        Err(ShapeError::PointShapeMismatch {
            expected: point_shape.to_vec(),
            actual: self.shape.clone(),
        })
    }
}

/// Borrowed view of an array as a sequence of points.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    batched: bool,
    points: Vec<&'a [f64]>,
}

impl<'a> Batch<'a> {
    #[must_use]
    pub fn is_batched(&self) -> bool {
        self.batched
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[&'a [f64]] {
        &self.points
    }
}

/// Pairs two batches point by point. A single point (or a batch of one)
/// is repeated against the other side.
pub fn broadcast_batches<'a, 'b>(
    lhs: &Batch<'a>,
    rhs: &Batch<'b>,
) -> Result<(bool, Vec<(&'a [f64], &'b [f64])>), ShapeError> {
    let batched = lhs.batched || rhs.batched;
    let (n_lhs, n_rhs) = (lhs.points.len(), rhs.points.len());
    let n = if n_lhs == n_rhs {
        n_lhs
    } else if n_lhs == 1 {
        n_rhs
    } else if n_rhs == 1 {
        n_lhs
    } else {
        return Err(ShapeError::BatchLengthMismatch {
            lhs: n_lhs,
            rhs: n_rhs,
        });
    };
    let pairs = (0..n)
        .map(|i| {
            let l = lhs.points[if n_lhs == 1 { 0 } else { i }];
            let r = rhs.points[if n_rhs == 1 { 0 } else { i }];
            (l, r)
        })
        .collect();
    Ok((batched, pairs))
}

/// Rebuilds an array from per-point outputs of shape `out_shape`.
pub fn assemble(
    batched: bool,
    out_shape: &[usize],
    outputs: Vec<Vec<f64>>,
) -> Result<Array, ShapeError> {
    let stride = element_count(out_shape)?;
    if let Some(bad) = outputs.iter().find(|out| out.len() != stride) {
        return Err(ShapeError::ElementCountMismatch {
            shape: out_shape.to_vec(),
            len: bad.len(),
        });
    }
    if !batched && outputs.len() == 1 {
        return Array::new(out_shape.to_vec(), outputs.into_iter().flatten().collect());
    }
    let mut shape = Vec::with_capacity(out_shape.len() + 1);
    shape.push(outputs.len());
    shape.extend_from_slice(out_shape);
    Array::new(shape, outputs.into_iter().flatten().collect())
}

#[must_use]
pub fn assemble_scalars(batched: bool, outputs: Vec<f64>) -> Array {
    if !batched && outputs.len() == 1 {
        Array::scalar(outputs[0])
    } else {
        Array::vector(outputs)
    }
}

/// Stacks equally shaped arrays along a new leading axis.
pub fn stack(arrays: &[Array]) -> Result<Array, ShapeError> {
    let inner = arrays.first().map(|a| a.shape.clone()).unwrap_or_default();
    if arrays.iter().any(|a| a.shape != inner) {
        return Err(ShapeError::RaggedStack);
    }
    let mut shape = Vec::with_capacity(inner.len() + 1);
    shape.push(arrays.len());
    shape.extend(inner);
    let values = arrays
        .iter()
        .flat_map(|a| a.values.iter().copied())
        .collect();
    Array::new(shape, values)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub pass: bool,
    pub max_abs_error: f64,
    pub reason: Option<String>,
}

fn values_close(expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) -> (bool, f64) {
    if expected == actual {
        return (true, 0.0);
    }
    let abs_err = (expected - actual).abs();
    if !abs_err.is_finite() {
        return (false, f64::INFINITY);
    }
    (abs_err <= abs_tol + rel_tol * expected.abs(), abs_err)
}

pub fn compare_values(
    expected_shape: &[usize],
    expected_values: &[f64],
    actual_shape: &[usize],
    actual_values: &[f64],
    abs_tol: f64,
    rel_tol: f64,
) -> Comparison {
    if expected_shape != actual_shape {
        return Comparison {
            pass: false,
            max_abs_error: f64::INFINITY,
            reason: Some(format!(
                "shape mismatch expected={expected_shape:?} actual={actual_shape:?}"
            )),
        };
    }
    if expected_values.len() != actual_values.len() {
        return Comparison {
            pass: false,
            max_abs_error: f64::INFINITY,
            reason: Some(format!(
                "value length mismatch expected={} actual={}",
                expected_values.len(),
                actual_values.len()
            )),
        };
    }
    let mut max_abs_error = 0.0_f64;
    for (idx, (&expected, &actual)) in expected_values.iter().zip(actual_values).enumerate() {
        let (close, abs_err) = values_close(expected, actual, abs_tol, rel_tol);
        max_abs_error = max_abs_error.max(abs_err);
        if !close {
            let threshold = abs_tol + rel_tol * expected.abs();
            return Comparison {
                pass: false,
                max_abs_error,
                reason: Some(format!(
                    "value mismatch at index {idx}: expected={expected} actual={actual} abs_err={abs_err} threshold={threshold}"
                )),
            };
        }
    }
    Comparison {
        pass: true,
        max_abs_error,
        reason: None,
    }
}

#[must_use]
pub fn compare_arrays(expected: &Array, actual: &Array, abs_tol: f64, rel_tol: f64) -> Comparison {
    compare_values(
        &expected.shape,
        &expected.values,
        &actual.shape,
        &actual.values,
        abs_tol,
        rel_tol,
    )
}

#[must_use]
pub fn all_close(expected: &Array, actual: &Array, abs_tol: f64, rel_tol: f64) -> bool {
    compare_arrays(expected, actual, abs_tol, rel_tol).pass
}

#[cfg(test)]
mod tests {
    use super::{
        ARRAY_REASON_CODES, Array, ShapeError, all_close, assemble, assemble_scalars,
        broadcast_batches, compare_arrays, stack,
    };

    #[test]
    fn reason_codes_cover_every_variant() {
        let errors = [
            ShapeError::Overflow,
            ShapeError::ElementCountMismatch {
                shape: vec![2],
                len: 3,
            },
            ShapeError::PointShapeMismatch {
                expected: vec![2],
                actual: vec![3],
            },
            ShapeError::BatchLengthMismatch { lhs: 2, rhs: 3 },
            ShapeError::RaggedStack,
            ShapeError::AxisOutOfBounds { index: 4, len: 2 },
        ];
        for error in errors {
            assert!(ARRAY_REASON_CODES.contains(&error.reason_code()));
        }
    }

    #[test]
    fn new_rejects_element_count_mismatch() {
        let err = Array::new(vec![2, 2], vec![1.0; 3]).expect_err("3 values cannot fill 2x2");
        assert_eq!(err.reason_code(), "array_element_count_mismatch");
    }

    #[test]
    fn linspace_includes_both_endpoints() {
        let grid = Array::linspace(0.0, 1.0, 10);
        assert_eq!(grid.shape(), &[10]);
        assert_eq!(grid.values()[0], 0.0);
        assert_eq!(grid.values()[9], 1.0);
        assert!((grid.values()[3] - 1.0 / 3.0).abs() < 1e-15);
        assert_eq!(Array::linspace(2.0, 5.0, 1).values(), &[2.0]);
    }

    #[test]
    fn split_batch_distinguishes_single_points_and_batches() {
        let single = Array::vector(vec![1.0, 2.0]);
        let batch = single.split_batch(&[2]).expect("single point");
        assert!(!batch.is_batched());
        assert_eq!(batch.len(), 1);

        let many = Array::new(vec![3, 2], (0..6).map(f64::from).collect()).expect("3x2");
        let batch = many.split_batch(&[2]).expect("batch of points");
        assert!(batch.is_batched());
        assert_eq!(batch.points()[2], &[4.0, 5.0]);

        let err = many
            .split_batch(&[3])
            .expect_err("rows of two are not points of three");
        assert_eq!(err.reason_code(), "array_point_shape_mismatch");
    }

    #[test]
    fn broadcast_repeats_single_side() {
        let one = Array::vector(vec![1.0, 1.0]);
        let many = Array::new(vec![3, 2], vec![0.0; 6]).expect("3x2");
        let lhs = one.split_batch(&[2]).expect("single");
        let rhs = many.split_batch(&[2]).expect("batch");
        let (batched, pairs) = broadcast_batches(&lhs, &rhs).expect("broadcast");
        assert!(batched);
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(l, _)| *l == [1.0, 1.0]));

        let two = Array::new(vec![2, 2], vec![0.0; 4]).expect("2x2");
        let two = two.split_batch(&[2]).expect("batch");
        assert!(broadcast_batches(&two, &rhs).is_err());
    }

    #[test]
    fn assemble_preserves_batchedness() {
        let single = assemble(false, &[2], vec![vec![1.0, 2.0]]).expect("single");
        assert_eq!(single.shape(), &[2]);
        let batch_of_one = assemble(true, &[2], vec![vec![1.0, 2.0]]).expect("batch");
        assert_eq!(batch_of_one.shape(), &[1, 2]);
        assert_eq!(assemble_scalars(false, vec![3.0]).shape(), &[] as &[usize]);
        assert_eq!(assemble_scalars(true, vec![3.0, 4.0]).shape(), &[2]);
    }

    #[test]
    fn stack_adds_leading_axis_and_rejects_ragged_input() {
        let a = Array::vector(vec![1.0, 2.0]);
        let b = Array::vector(vec![3.0, 4.0]);
        let stacked = stack(&[a.clone(), b]).expect("stack");
        assert_eq!(stacked.shape(), &[2, 2]);
        assert_eq!(stacked.index_axis0(1).expect("row").values(), &[3.0, 4.0]);
        assert!(stack(&[a, Array::vector(vec![1.0])]).is_err());
    }

    #[test]
    fn comparison_reports_first_mismatch() {
        let expected = Array::vector(vec![1.0, 2.0, f64::INFINITY]);
        let close = Array::vector(vec![1.0 + 1e-9, 2.0, f64::INFINITY]);
        assert!(all_close(&expected, &close, 1e-6, 0.0));

        let far = Array::vector(vec![1.0, 2.5, f64::INFINITY]);
        let cmp = compare_arrays(&expected, &far, 1e-6, 0.0);
        assert!(!cmp.pass);
        assert!(cmp.reason.expect("reason").contains("index 1"));

        let nan = Array::vector(vec![f64::NAN]);
        assert!(!all_close(&nan, &nan, 1.0, 1.0));
    }
}
