//! The value model.
//!
//! Every number is complex underneath; one with a zero imaginary part behaves and prints as a
//! real. Grids are 1-D vectors or 2-D tables of numbers, flagged as a matrix or a plain array:
//! `*` on two matrices is the matrix product, on anything else it is elementwise.

use crate::error::EvalError;
use mathsheet_core::ResultValue;
use num_complex::Complex64;
use num_traits::Zero;
use std::fmt;

/// Largest number of cells a single grid may hold.
pub const MAX_CELLS: usize = 1 << 22;

/// Whether a grid multiplies like a matrix or elementwise like an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKind {
    /// Drawn in square brackets; `*` is the matrix product.
    Matrix,
    /// Drawn in parentheses; `*` is elementwise.
    Array,
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// One dimension.
    Vector(usize),
    /// Two dimensions, row-major.
    Table {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
}

impl Shape {
    /// Total cell count, or `None` when it does not fit in a `usize`.
    pub fn size(self) -> Option<usize> {
        match self {
            Shape::Vector(n) => Some(n),
            Shape::Table { rows, cols } => rows.checked_mul(cols),
        }
    }

    /// Total cell count, refusing anything over [`MAX_CELLS`].
    pub fn checked_size(self) -> Result<usize, EvalError> {
        match self.size() {
            Some(n) if n <= MAX_CELLS => Ok(n),
            _ => Err(EvalError::domain(format!(
                "a grid of size {self} exceeds the limit of {MAX_CELLS} cells"
            ))),
        }
    }

    /// Number of dimensions.
    pub fn rank(self) -> usize {
        match self {
            Shape::Vector(_) => 1,
            Shape::Table { .. } => 2,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Vector(n) => write!(f, "{n}"),
            Shape::Table { rows, cols } => write!(f, "{rows}x{cols}"),
        }
    }
}

/// A 1-D or 2-D array of numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Matrix or array.
    pub kind: GridKind,
    shape: Shape,
    cells: Vec<Complex64>,
}

impl Grid {
    /// A vector.
    pub fn vector(kind: GridKind, cells: Vec<Complex64>) -> Self {
        Self {
            kind,
            shape: Shape::Vector(cells.len()),
            cells,
        }
    }

    /// A real-valued array vector.
    pub fn reals(values: impl IntoIterator<Item = f64>) -> Self {
        Self::vector(
            GridKind::Array,
            values.into_iter().map(|v| Complex64::new(v, 0.0)).collect(),
        )
    }

    /// A table from row-major cells.
    pub fn table(
        kind: GridKind,
        rows: usize,
        cols: usize,
        cells: Vec<Complex64>,
    ) -> Result<Self, EvalError> {
        let expected = Shape::Table { rows, cols }.size();
        if expected != Some(cells.len()) {
            return Err(EvalError::DimensionMismatch {
                expected: expected.unwrap_or(usize::MAX),
                found: cells.len(),
            });
        }
        Ok(Self {
            kind,
            shape: Shape::Table { rows, cols },
            cells,
        })
    }

    /// A grid of zeros. Fails when the shape is over [`MAX_CELLS`].
    pub fn zeros(kind: GridKind, shape: Shape) -> Result<Self, EvalError> {
        Ok(Self {
            kind,
            shape,
            cells: vec![Complex64::zero(); shape.checked_size()?],
        })
    }

    /// Dimensions.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Row-major cells.
    pub fn cells(&self) -> &[Complex64] {
        &self.cells
    }

    /// Length of the outer dimension: elements of a vector, rows of a table.
    pub fn len(&self) -> usize {
        match self.shape {
            Shape::Vector(n) => n,
            Shape::Table { rows, .. } => rows,
        }
    }

    /// Returns `true` if the grid holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// `(rows, cols)`, a vector counting as one row.
    pub fn dims(&self) -> (usize, usize) {
        match self.shape {
            Shape::Vector(n) => (1, n),
            Shape::Table { rows, cols } => (rows, cols),
        }
    }

    /// Returns `true` if every cell is real.
    pub fn is_real(&self) -> bool {
        self.cells.iter().all(|c| c.im == 0.0)
    }

    /// Cell at `(row, col)` of a table or `(0, i)` of a vector.
    pub fn get(&self, row: usize, col: usize) -> Option<Complex64> {
        let (rows, cols) = self.dims();
        (row < rows && col < cols).then(|| self.cells[row * cols + col])
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: Complex64) {
        let (_, cols) = self.dims();
        self.cells[row * cols + col] = value;
    }

    /// One row of a table as a vector.
    pub fn row(&self, row: usize) -> Option<Grid> {
        let (rows, cols) = self.dims();
        (row < rows).then(|| {
            Grid::vector(self.kind, self.cells[row * cols..(row + 1) * cols].to_vec())
        })
    }

    /// Apply `f` to every cell.
    pub fn map(&self, f: impl Fn(Complex64) -> Complex64) -> Grid {
        Grid {
            kind: self.kind,
            shape: self.shape,
            cells: self.cells.iter().map(|c| f(*c)).collect(),
        }
    }

    /// Apply `f` to every cell, stopping at the first error.
    pub fn try_map(
        &self,
        f: impl Fn(Complex64) -> Result<Complex64, EvalError>,
    ) -> Result<Grid, EvalError> {
        Ok(Grid {
            kind: self.kind,
            shape: self.shape,
            cells: self.cells.iter().map(|c| f(*c)).collect::<Result<_, _>>()?,
        })
    }

    /// Combine two equally shaped grids cell by cell.
    pub fn zip(
        &self,
        other: &Grid,
        f: impl Fn(Complex64, Complex64) -> Result<Complex64, EvalError>,
    ) -> Result<Grid, EvalError> {
        if self.dims() != other.dims() {
            return Err(EvalError::DimensionMismatch {
                expected: self.cells.len(),
                found: other.cells.len(),
            });
        }
        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| f(*a, *b))
            .collect::<Result<_, _>>()?;
        Ok(Grid {
            kind: self.kind,
            shape: self.shape,
            cells,
        })
    }

    /// Swap rows and columns. A vector becomes a single column.
    pub fn transpose(&self) -> Grid {
        let (rows, cols) = self.dims();
        let mut cells = Vec::with_capacity(self.cells.len());
        for c in 0..cols {
            for r in 0..rows {
                cells.push(self.cells[r * cols + c]);
            }
        }
        Grid {
            kind: self.kind,
            shape: Shape::Table {
                rows: cols,
                cols: rows,
            },
            cells,
        }
    }

    /// Matrix product. A vector on the left is a row, on the right a column.
    pub fn matmul(&self, other: &Grid) -> Result<Grid, EvalError> {
        let (n, inner) = self.dims();
        let (other_inner, m) = match other.shape {
            Shape::Vector(len) => (len, 1),
            Shape::Table { rows, cols } => (rows, cols),
        };
        if inner != other_inner {
            return Err(EvalError::DimensionMismatch {
                expected: inner,
                found: other_inner,
            });
        }
        let size = Shape::Table { rows: n, cols: m }.checked_size()?;
        let mut cells = vec![Complex64::zero(); size];
        for i in 0..n {
            for j in 0..m {
                cells[i * m + j] = (0..inner)
                    .map(|k| self.cells[i * inner + k] * other.cells[k * m + j])
                    .sum();
            }
        }
        if matches!(other.shape, Shape::Vector(_)) || matches!(self.shape, Shape::Vector(_)) {
            return Ok(Grid::vector(GridKind::Matrix, cells));
        }
        Grid::table(GridKind::Matrix, n, m, cells)
    }

    /// The grid as a value list along its outer dimension: numbers for a vector, row vectors
    /// for a table.
    pub fn elements(&self) -> Vec<Value> {
        match self.shape {
            Shape::Vector(_) => self.cells.iter().map(|c| Value::Number(*c)).collect(),
            Shape::Table { rows, .. } => (0..rows)
                .filter_map(|r| self.row(r))
                .map(Value::Grid)
                .collect(),
        }
    }

    /// Grow to at least `shape`, keeping existing cells in place and filling with zeros.
    ///
    /// A grid of the other dimensionality cannot be grown; the mismatch is reported as the
    /// expected and found number of dimensions.
    pub(crate) fn grown(&self, shape: Shape) -> Result<Grid, EvalError> {
        let target = match (self.shape, shape) {
            (Shape::Vector(a), Shape::Vector(b)) => Shape::Vector(a.max(b)),
            (Shape::Table { rows, cols }, Shape::Table { rows: r, cols: c }) => Shape::Table {
                rows: rows.max(r),
                cols: cols.max(c),
            },
            (current, wanted) => {
                return Err(EvalError::DimensionMismatch {
                    expected: current.rank(),
                    found: wanted.rank(),
                });
            }
        };
        if target == self.shape {
            return Ok(self.clone());
        }
        let mut grown = Grid::zeros(self.kind, target)?;
        let (rows, cols) = self.dims();
        for r in 0..rows {
            for c in 0..cols {
                grown.set(r, c, self.cells[r * cols + c]);
            }
        }
        Ok(grown)
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A real or complex number.
    Number(Complex64),
    /// A string.
    Text(String),
    /// A vector or table.
    Grid(Grid),
}

impl Value {
    /// A real number.
    pub fn real(value: f64) -> Self {
        Value::Number(Complex64::new(value, 0.0))
    }

    /// A complex number.
    pub fn complex(re: f64, im: f64) -> Self {
        Value::Number(Complex64::new(re, im))
    }

    /// `1` or `0`.
    pub fn boolean(value: bool) -> Self {
        Value::real(if value { 1.0 } else { 0.0 })
    }

    /// Short name of the value's kind for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(n) if n.im == 0.0 => "real",
            Value::Number(_) => "complex",
            Value::Text(_) => "string",
            Value::Grid(grid) => match grid.kind {
                GridKind::Matrix => "matrix",
                GridKind::Array => "array",
            },
        }
    }

    /// The number inside a numeric value.
    pub fn as_number(&self) -> Result<Complex64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(EvalError::type_error(format!(
                "expected a number, found {}",
                other.kind_name()
            ))),
        }
    }

    /// A real number; complex values are rejected.
    pub fn as_real(&self) -> Result<f64, EvalError> {
        let n = self.as_number()?;
        if n.im != 0.0 {
            return Err(EvalError::type_error("expected a real number, found complex"));
        }
        Ok(n.re)
    }

    /// A whole number.
    pub fn as_integer(&self) -> Result<i64, EvalError> {
        let re = self.as_real()?;
        if re.fract() != 0.0 || !re.is_finite() {
            return Err(EvalError::type_error(format!("expected a whole number, found {re}")));
        }
        Ok(re as i64)
    }

    /// Truth value of a condition. Grids are true when every cell is non-zero.
    pub fn truthy(&self) -> Result<bool, EvalError> {
        match self {
            Value::Number(n) => Ok(!n.is_zero()),
            Value::Grid(grid) => Ok(grid.cells().iter().all(|c| !c.is_zero())),
            Value::Text(_) => Err(EvalError::type_error("a string is not a condition")),
        }
    }

    /// Values visited by `for x in value` and by range sums.
    pub fn elements(&self) -> Result<Vec<Value>, EvalError> {
        match self {
            Value::Grid(grid) => Ok(grid.elements()),
            Value::Number(_) => Ok(vec![self.clone()]),
            Value::Text(text) => Ok(text.chars().map(|c| Value::Text(c.to_string())).collect()),
        }
    }

    /// Convert for splicing after an equation.
    pub fn to_result(&self) -> ResultValue {
        match self {
            Value::Number(n) => number_result(*n),
            Value::Text(text) => ResultValue::Text {
                value: text.clone(),
            },
            Value::Grid(grid) => {
                let (rows, cols) = grid.dims();
                ResultValue::Grid {
                    rows: (0..rows)
                        .map(|r| {
                            (0..cols)
                                .filter_map(|c| grid.get(r, c))
                                .map(number_result)
                                .collect()
                        })
                        .collect(),
                    matrix: grid.kind == GridKind::Matrix,
                }
            }
        }
    }
}

fn number_result(n: Complex64) -> ResultValue {
    if n.im == 0.0 {
        ResultValue::real(n.re)
    } else {
        ResultValue::Complex { re: n.re, im: n.im }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: Complex64) -> fmt::Result {
    if n.im == 0.0 {
        write!(f, "{}", n.re)
    } else if n.re == 0.0 {
        write!(f, "{}j", n.im)
    } else {
        let sign = if n.im < 0.0 { '-' } else { '+' };
        write!(f, "({}{sign}{}j)", n.re, n.im.abs())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write_number(f, *n),
            Value::Text(text) => write!(f, "'{text}'"),
            Value::Grid(grid) => {
                let (rows, cols) = grid.dims();
                f.write_str("[")?;
                for r in 0..rows {
                    if r > 0 {
                        f.write_str("; ")?;
                    }
                    for c in 0..cols {
                        if c > 0 {
                            f.write_str(", ")?;
                        }
                        if let Some(n) = grid.get(r, c) {
                            write_number(f, n)?;
                        }
                    }
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::real(value)
    }
}

impl From<Complex64> for Value {
    fn from(value: Complex64) -> Self {
        Value::Number(value)
    }
}

impl From<Grid> for Value {
    fn from(value: Grid) -> Self {
        Value::Grid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_product_of_table_and_vector() {
        let a = Grid::table(
            GridKind::Matrix,
            2,
            2,
            [1.0, 2.0, 3.0, 4.0].map(|v| Complex64::new(v, 0.0)).to_vec(),
        )
        .unwrap();
        let v = Grid::reals([1.0, 1.0]);
        let product = a.matmul(&v).unwrap();
        assert_eq!(product.shape(), Shape::Vector(2));
        assert_eq!(Value::Grid(product).to_string(), "[3, 7]");
    }

    #[test]
    fn mismatched_product_reports_inner_dimensions() {
        let a = Grid::zeros(GridKind::Matrix, Shape::Table { rows: 2, cols: 3 }).unwrap();
        let b = Grid::zeros(GridKind::Matrix, Shape::Table { rows: 2, cols: 2 }).unwrap();
        assert_eq!(
            a.matmul(&b),
            Err(EvalError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn growing_keeps_cells() {
        let grid = Grid::reals([1.0, 2.0]).grown(Shape::Vector(4)).unwrap();
        assert_eq!(Value::Grid(grid).to_string(), "[1, 2, 0, 0]");
    }

    #[test]
    fn growing_across_dimensions_is_a_mismatch() {
        let table = Grid::zeros(GridKind::Array, Shape::Table { rows: 2, cols: 2 }).unwrap();
        assert_eq!(
            table.grown(Shape::Vector(5)),
            Err(EvalError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
        assert!(Grid::reals([1.0]).grown(Shape::Table { rows: 1, cols: 1 }).is_err());
    }

    #[test]
    fn oversized_shapes_are_refused() {
        let huge = Shape::Table {
            rows: 4_294_967_296,
            cols: 4_294_967_296,
        };
        assert_eq!(huge.size(), None);
        assert!(matches!(huge.checked_size(), Err(EvalError::Domain(_))));
        assert!(Grid::zeros(GridKind::Array, Shape::Vector(MAX_CELLS + 1)).is_err());
        assert_eq!(Shape::Vector(MAX_CELLS).checked_size(), Ok(MAX_CELLS));
        assert!(
            Grid::table(GridKind::Array, usize::MAX, 2, Vec::new()).is_err(),
            "overflowing table dimensions"
        );
    }

    #[test]
    fn real_results_drop_the_imaginary_part() {
        assert_eq!(Value::real(2.5).to_result(), ResultValue::real(2.5));
        assert_eq!(
            Value::complex(1.0, -2.0).to_result(),
            ResultValue::Complex { re: 1.0, im: -2.0 }
        );
        assert_eq!(Value::complex(1.0, -2.0).to_string(), "(1-2j)");
    }
}
