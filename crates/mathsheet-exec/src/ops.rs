//! Operators on values.
//!
//! Scalars broadcast over grids; two grids combine cell by cell, except that `*` and integer
//! powers of matrices follow linear algebra.

use crate::error::EvalError;
use crate::value::{Grid, GridKind, Shape, Value};
use mathsheet_compiler::{BinaryOp, UnaryOp};
use num_complex::Complex64;
use num_traits::{One, Zero};

type Result<T> = std::result::Result<T, EvalError>;

/// Apply a binary operator.
pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => number(op, a, b).map(Value::Number),
        (Value::Text(a), Value::Text(b)) => text(op, a, b),
        (Value::Grid(a), Value::Number(b)) => a.try_map(|x| number(op, x, b)).map(Value::Grid),
        (Value::Number(a), Value::Grid(b)) => b.try_map(|x| number(op, a, x)).map(Value::Grid),
        (Value::Grid(a), Value::Grid(b)) => grids(op, &a, &b).map(Value::Grid),
        (a, b) => Err(EvalError::type_error(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

/// Apply a prefix operator.
pub fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    let f = |x: Complex64| -> Result<Complex64> {
        match op {
            UnaryOp::Neg => Ok(-x),
            UnaryOp::BitNot => Ok(real(!integer(x)? as f64)),
        }
    };
    match value {
        Value::Number(n) => f(n).map(Value::Number),
        Value::Grid(grid) => grid.try_map(f).map(Value::Grid),
        Value::Text(_) => Err(EvalError::type_error("bad operand type for unary operator: string")),
    }
}

fn real(value: f64) -> Complex64 {
    Complex64::new(value, 0.0)
}

fn integer(value: Complex64) -> Result<i64> {
    Value::Number(value).as_integer()
}

fn ordered(a: Complex64, b: Complex64) -> Result<(f64, f64)> {
    if a.im != 0.0 || b.im != 0.0 {
        return Err(EvalError::type_error("complex numbers cannot be ordered"));
    }
    Ok((a.re, b.re))
}

/// `a ^ b`, staying real when the real power is defined.
pub(crate) fn power(a: Complex64, b: Complex64) -> Result<Complex64> {
    if a.is_zero() && b.re < 0.0 {
        return Err(EvalError::domain("zero raised to a negative power"));
    }
    if a.im == 0.0 && b.im == 0.0 && (a.re >= 0.0 || b.re.fract() == 0.0) {
        return Ok(real(a.re.powf(b.re)));
    }
    Ok(a.powc(b))
}

fn number(op: BinaryOp, a: Complex64, b: Complex64) -> Result<Complex64> {
    let truth = |value: bool| real(if value { 1.0 } else { 0.0 });
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(EvalError::domain("division by zero"));
            }
            a / b
        }
        BinaryOp::Pow => power(a, b)?,
        BinaryOp::Equal => truth(a == b),
        BinaryOp::NotEqual => truth(a != b),
        BinaryOp::Less => ordered(a, b).map(|(x, y)| truth(x < y))?,
        BinaryOp::Greater => ordered(a, b).map(|(x, y)| truth(x > y))?,
        BinaryOp::LessEqual => ordered(a, b).map(|(x, y)| truth(x <= y))?,
        BinaryOp::GreaterEqual => ordered(a, b).map(|(x, y)| truth(x >= y))?,
        BinaryOp::BitAnd => real((integer(a)? & integer(b)?) as f64),
        BinaryOp::BitOr => real((integer(a)? | integer(b)?) as f64),
        BinaryOp::BitXor => real((integer(a)? ^ integer(b)?) as f64),
    })
}

fn text(op: BinaryOp, a: String, b: String) -> Result<Value> {
    match op {
        BinaryOp::Add => Ok(Value::Text(a + &b)),
        BinaryOp::Equal => Ok(Value::boolean(a == b)),
        BinaryOp::NotEqual => Ok(Value::boolean(a != b)),
        other => Err(EvalError::type_error(format!(
            "unsupported operand types for {}: string and string",
            other.symbol()
        ))),
    }
}

fn grids(op: BinaryOp, a: &Grid, b: &Grid) -> Result<Grid> {
    if op == BinaryOp::Mul && a.kind == GridKind::Matrix && b.kind == GridKind::Matrix {
        return a.matmul(b);
    }
    a.zip(b, |x, y| number(op, x, y))
}

/// `m ^ n` for a square matrix and a whole `n >= 0`; elementwise otherwise.
pub(crate) fn grid_power(grid: &Grid, exponent: &Value) -> Result<Value> {
    let square = match grid.shape() {
        Shape::Table { rows, cols } => rows == cols,
        Shape::Vector(_) => false,
    };
    if grid.kind == GridKind::Matrix
        && square
        && let Ok(n) = exponent.as_integer()
        && n >= 0
    {
        let (size, _) = grid.dims();
        let mut result = identity(size)?;
        let mut square = grid.clone();
        let mut n = n;
        while n > 0 {
            if n & 1 == 1 {
                result = result.matmul(&square)?;
            }
            n >>= 1;
            if n > 0 {
                square = square.matmul(&square)?;
            }
        }
        return Ok(Value::Grid(result));
    }
    binary(BinaryOp::Pow, Value::Grid(grid.clone()), exponent.clone())
}

/// The `n x n` identity matrix.
pub(crate) fn identity(n: usize) -> Result<Grid> {
    let mut grid = Grid::zeros(GridKind::Matrix, Shape::Table { rows: n, cols: n })?;
    for i in 0..n {
        grid.set(i, i, Complex64::one());
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_broadcast_over_grids() {
        let grid = Value::Grid(Grid::reals([1.0, 2.0, 3.0]));
        let sum = binary(BinaryOp::Add, grid, Value::real(1.0)).unwrap();
        assert_eq!(sum.to_string(), "[2, 3, 4]");
    }

    #[test]
    fn negative_base_with_fractional_power_goes_complex() {
        let root = power(real(-4.0), real(0.5)).unwrap();
        assert!((root.im - 2.0).abs() < 1e-12);
        assert!(root.re.abs() < 1e-12);
        assert_eq!(power(real(-2.0), real(3.0)).unwrap(), real(-8.0));
    }

    #[test]
    fn division_by_zero_is_a_domain_error() {
        let err = binary(BinaryOp::Div, Value::real(1.0), Value::real(0.0)).unwrap_err();
        assert!(matches!(err, EvalError::Domain(_)));
    }

    #[test]
    fn strings_concatenate() {
        let joined = binary(
            BinaryOp::Add,
            Value::Text("ab".into()),
            Value::Text("c".into()),
        )
        .unwrap();
        assert_eq!(joined, Value::Text("abc".into()));
    }

    #[test]
    fn matrix_square() {
        let m = Grid::table(
            GridKind::Matrix,
            2,
            2,
            [1.0, 1.0, 0.0, 1.0].map(real).to_vec(),
        )
        .unwrap();
        let squared = grid_power(&m, &Value::real(2.0)).unwrap();
        assert_eq!(squared.to_string(), "[1, 2; 0, 1]");
    }
}
