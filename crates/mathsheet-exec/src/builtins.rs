//! Built-in functions and constants.

use crate::error::EvalError;
use crate::ops::{identity, power};
use crate::value::{Grid, GridKind, MAX_CELLS, Shape, Value};
use num_complex::Complex64;
use num_traits::{One, Zero};

type Result<T> = std::result::Result<T, EvalError>;

/// Names [`call`] answers to.
pub const BUILTINS: &[&str] = &[
    "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "asinh", "acosh",
    "atanh", "exp", "log", "ln", "log10", "sqrt", "root", "abs", "floor", "ceil", "round",
    "real", "imag", "conj", "angle", "det", "norm", "transpose", "hermitian", "inv", "sum",
    "prod", "mean", "min", "max", "len", "dot", "convolve", "arange", "linspace", "zeros",
    "ones", "eye", "factorial",
];

/// Returns `true` if `name` is a built-in function.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// The value of a built-in constant.
pub fn constant(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::real(std::f64::consts::PI)),
        "e" => Some(Value::real(std::f64::consts::E)),
        "j" => Some(Value::complex(0.0, 1.0)),
        "inf" => Some(Value::real(f64::INFINITY)),
        _ => None,
    }
}

fn arity(name: &str, args: &[Value], accepted: &[usize]) -> Result<()> {
    if accepted.contains(&args.len()) {
        return Ok(());
    }
    let expected = accepted
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(EvalError::Arity {
        function: name.to_string(),
        expected,
        found: args.len(),
    })
}

fn real(value: f64) -> Complex64 {
    Complex64::new(value, 0.0)
}

/// Call a built-in. `None` when `name` is not one.
pub fn call(name: &str, args: Vec<Value>) -> Option<Result<Value>> {
    if !is_builtin(name) {
        return None;
    }
    Some(dispatch(name, args))
}

fn dispatch(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "root" => {
            arity(name, &args, &[2])?;
            let n = args[1].as_number()?;
            map_cells(&args[0], |x| nth_root(x, n))
        }
        "min" | "max" | "sum" | "prod" | "mean" => reduce(name, args),
        "len" => {
            arity(name, &args, &[1])?;
            match &args[0] {
                Value::Grid(grid) => Ok(Value::real(grid.len() as f64)),
                Value::Text(text) => Ok(Value::real(text.chars().count() as f64)),
                Value::Number(_) => Err(EvalError::type_error("a number has no length")),
            }
        }
        "det" | "inv" | "transpose" | "hermitian" | "norm" => {
            arity(name, &args, &[1])?;
            linear_algebra(name, &args[0])
        }
        "dot" | "convolve" => {
            arity(name, &args, &[2])?;
            let a = vector(name, &args[0])?;
            let b = vector(name, &args[1])?;
            if name == "dot" {
                if a.len() != b.len() {
                    return Err(EvalError::DimensionMismatch {
                        expected: a.len(),
                        found: b.len(),
                    });
                }
                return Ok(Value::Number(a.iter().zip(&b).map(|(x, y)| x * y).sum()));
            }
            Ok(Value::Grid(Grid::vector(GridKind::Array, convolve(&a, &b))))
        }
        "arange" | "linspace" | "zeros" | "ones" | "eye" => construct(name, args),
        _ => {
            arity(name, &args, &[1])?;
            map_cells(&args[0], |z| scalar(name, z))
        }
    }
}

fn map_cells(value: &Value, f: impl Fn(Complex64) -> Result<Complex64>) -> Result<Value> {
    match value {
        Value::Number(n) => f(*n).map(Value::Number),
        Value::Grid(grid) => grid.try_map(f).map(Value::Grid),
        Value::Text(_) => Err(EvalError::type_error("expected a number, found string")),
    }
}

fn require_real(name: &str, z: Complex64) -> Result<f64> {
    if z.im != 0.0 {
        return Err(EvalError::type_error(format!("{name}() needs a real argument")));
    }
    Ok(z.re)
}

/// Elementwise scalar functions, real where the real function is defined.
fn scalar(name: &str, z: Complex64) -> Result<Complex64> {
    let x = z.re;
    let is_real = z.im == 0.0;
    let value = match name {
        "sin" => z.sin(),
        "cos" => z.cos(),
        "tan" => z.tan(),
        "sinh" => z.sinh(),
        "cosh" => z.cosh(),
        "tanh" => z.tanh(),
        "atan" => z.atan(),
        "asinh" => z.asinh(),
        "exp" => z.exp(),
        "asin" if is_real && x.abs() <= 1.0 => real(x.asin()),
        "asin" => z.asin(),
        "acos" if is_real && x.abs() <= 1.0 => real(x.acos()),
        "acos" => z.acos(),
        "acosh" if is_real && x >= 1.0 => real(x.acosh()),
        "acosh" => z.acosh(),
        "atanh" if is_real && x.abs() == 1.0 => {
            return Err(EvalError::domain("atanh() of +-1"));
        }
        "atanh" if is_real && x.abs() < 1.0 => real(x.atanh()),
        "atanh" => z.atanh(),
        "log" | "ln" | "log10" => {
            if z.is_zero() {
                return Err(EvalError::domain(format!("{name}() of zero")));
            }
            let ln = if is_real && x > 0.0 { real(x.ln()) } else { z.ln() };
            if name == "log10" {
                ln / std::f64::consts::LN_10
            } else {
                ln
            }
        }
        "sqrt" if is_real && x >= 0.0 => real(x.sqrt()),
        "sqrt" => z.sqrt(),
        "abs" => real(z.norm()),
        "floor" => real(require_real(name, z)?.floor()),
        "ceil" => real(require_real(name, z)?.ceil()),
        "round" => real(require_real(name, z)?.round()),
        "real" => real(z.re),
        "imag" => real(z.im),
        "conj" => z.conj(),
        "angle" => real(z.arg()),
        "factorial" => real(factorial(z)?),
        other => return Err(EvalError::UnknownFunction(other.to_string())),
    };
    // Keep reals real when the complex formula leaves a signed zero behind.
    if is_real && value.im == 0.0 {
        return Ok(real(value.re));
    }
    Ok(value)
}

fn factorial(z: Complex64) -> Result<f64> {
    let n = Value::Number(z).as_integer()?;
    if n < 0 {
        return Err(EvalError::domain("factorial() of a negative number"));
    }
    Ok((1..=n).fold(1.0, |acc, k| acc * k as f64))
}

/// Principal `n`-th root, real for a negative real base and an odd whole `n`.
fn nth_root(x: Complex64, n: Complex64) -> Result<Complex64> {
    if n.is_zero() {
        return Err(EvalError::domain("zeroth root"));
    }
    if x.im == 0.0 && x.re < 0.0 && n.im == 0.0 && n.re.fract() == 0.0 && n.re as i64 % 2 != 0 {
        return Ok(real(-(-x.re).powf(1.0 / n.re)));
    }
    power(x, Complex64::one() / n)
}

fn numbers(name: &str, args: &[Value]) -> Result<Vec<Complex64>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Number(n) => out.push(*n),
            Value::Grid(grid) => out.extend_from_slice(grid.cells()),
            Value::Text(_) => {
                return Err(EvalError::type_error(format!("{name}() of a string")));
            }
        }
    }
    Ok(out)
}

fn reduce(name: &str, args: Vec<Value>) -> Result<Value> {
    if args.is_empty() {
        return Err(EvalError::Arity {
            function: name.to_string(),
            expected: "at least 1".to_string(),
            found: 0,
        });
    }
    let cells = numbers(name, &args)?;
    let value = match name {
        "sum" => cells.iter().sum(),
        "prod" => cells.iter().product(),
        "mean" => {
            if cells.is_empty() {
                return Err(EvalError::domain("mean() of an empty array"));
            }
            cells.iter().sum::<Complex64>() / cells.len() as f64
        }
        _ => {
            let reals = cells
                .iter()
                .map(|c| require_real(name, *c))
                .collect::<Result<Vec<_>>>()?;
            let pick = if name == "min" { f64::min } else { f64::max };
            let first = reals
                .first()
                .copied()
                .ok_or_else(|| EvalError::domain(format!("{name}() of an empty array")))?;
            real(reals.into_iter().fold(first, pick))
        }
    };
    Ok(Value::Number(value))
}

fn vector(name: &str, value: &Value) -> Result<Vec<Complex64>> {
    match value {
        Value::Grid(grid) if matches!(grid.shape(), Shape::Vector(_)) => Ok(grid.cells().to_vec()),
        other => Err(EvalError::type_error(format!(
            "{name}() needs vectors, found {}",
            other.kind_name()
        ))),
    }
}

fn convolve(a: &[Complex64], b: &[Complex64]) -> Vec<Complex64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![Complex64::zero(); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (k, y) in b.iter().enumerate() {
            out[i + k] += x * y;
        }
    }
    out
}

fn square(name: &str, value: &Value) -> Result<(usize, Grid)> {
    match value {
        Value::Grid(grid) => match grid.shape() {
            Shape::Table { rows, cols } if rows == cols => Ok((rows, grid.clone())),
            Shape::Table { rows, cols } => Err(EvalError::DimensionMismatch {
                expected: rows,
                found: cols,
            }),
            Shape::Vector(_) => Err(EvalError::type_error(format!(
                "{name}() needs a square matrix"
            ))),
        },
        Value::Number(n) => Ok((1, Grid::vector(GridKind::Matrix, vec![*n]))),
        Value::Text(_) => Err(EvalError::type_error(format!("{name}() of a string"))),
    }
}

fn linear_algebra(name: &str, value: &Value) -> Result<Value> {
    match name {
        "transpose" | "hermitian" => match value {
            Value::Grid(grid) => {
                let transposed = grid.transpose();
                Ok(Value::Grid(if name == "hermitian" {
                    transposed.map(|c| c.conj())
                } else {
                    transposed
                }))
            }
            Value::Number(n) => Ok(Value::Number(if name == "hermitian" { n.conj() } else { *n })),
            Value::Text(_) => Err(EvalError::type_error(format!("{name}() of a string"))),
        },
        "norm" => {
            let cells = numbers(name, std::slice::from_ref(value))?;
            Ok(Value::real(cells.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt()))
        }
        "det" => {
            let (n, grid) = square(name, value)?;
            Ok(Value::Number(determinant(n, grid.cells().to_vec())))
        }
        _ => {
            let (n, grid) = square(name, value)?;
            let inverse = invert(n, grid.cells())?;
            if matches!(value, Value::Number(_)) {
                return Ok(Value::Number(inverse[0]));
            }
            Grid::table(GridKind::Matrix, n, n, inverse).map(Value::Grid)
        }
    }
}

/// Gaussian elimination with partial pivoting.
fn determinant(n: usize, mut a: Vec<Complex64>) -> Complex64 {
    let mut det = Complex64::one();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x * n + col].norm().total_cmp(&a[y * n + col].norm()))
            .unwrap_or(col);
        if a[pivot * n + col].is_zero() {
            return Complex64::zero();
        }
        if pivot != col {
            for k in 0..n {
                a.swap(pivot * n + k, col * n + k);
            }
            det = -det;
        }
        let p = a[col * n + col];
        det *= p;
        for row in col + 1..n {
            let factor = a[row * n + col] / p;
            for k in col..n {
                let delta = factor * a[col * n + k];
                a[row * n + k] -= delta;
            }
        }
    }
    det
}

/// Gauss-Jordan inversion.
fn invert(n: usize, cells: &[Complex64]) -> Result<Vec<Complex64>> {
    let mut a = cells.to_vec();
    let mut inv = identity(n)?.cells().to_vec();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x * n + col].norm().total_cmp(&a[y * n + col].norm()))
            .unwrap_or(col);
        if a[pivot * n + col].norm() < 1e-300 {
            return Err(EvalError::domain("singular matrix"));
        }
        for k in 0..n {
            a.swap(pivot * n + k, col * n + k);
            inv.swap(pivot * n + k, col * n + k);
        }
        let p = a[col * n + col];
        for k in 0..n {
            a[col * n + k] /= p;
            inv[col * n + k] /= p;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row * n + col];
            for k in 0..n {
                let (da, di) = (factor * a[col * n + k], factor * inv[col * n + k]);
                a[row * n + k] -= da;
                inv[row * n + k] -= di;
            }
        }
    }
    Ok(inv)
}

fn size(value: &Value) -> Result<usize> {
    let n = value.as_integer()?;
    usize::try_from(n).map_err(|_| EvalError::domain(format!("negative size {n}")))
}

fn construct(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "arange" => {
            arity(name, &args, &[1, 2, 3])?;
            let reals = args.iter().map(Value::as_real).collect::<Result<Vec<_>>>()?;
            let (start, stop, step) = match reals.as_slice() {
                [stop] => (0.0, *stop, 1.0),
                [start, stop] => (*start, *stop, 1.0),
                [start, stop, step, ..] => (*start, *stop, *step),
                [] => (0.0, 0.0, 1.0),
            };
            Ok(Value::Grid(Grid::reals(arange(start, stop, step, false)?)))
        }
        "linspace" => {
            arity(name, &args, &[2, 3])?;
            let start = args[0].as_real()?;
            let stop = args[1].as_real()?;
            let n = match args.get(2) {
                Some(n) => size(n)?,
                None => 50,
            };
            Shape::Vector(n).checked_size()?;
            let step = if n > 1 { (stop - start) / (n - 1) as f64 } else { 0.0 };
            Ok(Value::Grid(Grid::reals(
                (0..n).map(|i| start + step * i as f64),
            )))
        }
        "eye" => {
            arity(name, &args, &[1])?;
            Ok(Value::Grid(identity(size(&args[0])?)?))
        }
        _ => {
            arity(name, &args, &[1, 2])?;
            let shape = match args.as_slice() {
                [n] => Shape::Vector(size(n)?),
                [rows, cols, ..] => Shape::Table {
                    rows: size(rows)?,
                    cols: size(cols)?,
                },
                [] => Shape::Vector(0),
            };
            let grid = Grid::zeros(GridKind::Array, shape)?;
            Ok(Value::Grid(if name == "ones" {
                grid.map(|_| Complex64::one())
            } else {
                grid
            }))
        }
    }
}

/// Values from `start` towards `stop` by `step`, including `stop` when `inclusive`.
pub(crate) fn arange(start: f64, stop: f64, step: f64, inclusive: bool) -> Result<Vec<f64>> {
    if step == 0.0 || !step.is_finite() {
        return Err(EvalError::domain("range step must be a non-zero number"));
    }
    let span = (stop - start) / step;
    if !span.is_finite() {
        return Err(EvalError::domain("range bounds must be finite"));
    }
    if span < 0.0 {
        return Ok(Vec::new());
    }
    let count = if inclusive {
        (span + 1e-9).floor() + 1.0
    } else {
        (span - 1e-9).ceil().max(0.0)
    };
    if count > MAX_CELLS as f64 {
        return Err(EvalError::domain(format!(
            "a range of {count} values exceeds the limit of {MAX_CELLS} cells"
        )));
    }
    Ok((0..count as usize).map(|i| start + step * i as f64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_ok(name: &str, args: Vec<Value>) -> Value {
        call(name, args).unwrap().unwrap()
    }

    #[test]
    fn real_functions_stay_real() {
        assert_eq!(call_ok("sqrt", vec![Value::real(9.0)]), Value::real(3.0));
        assert_eq!(call_ok("sqrt", vec![Value::real(-9.0)]), Value::complex(0.0, 3.0));
        assert_eq!(call_ok("ln", vec![Value::real(1.0)]), Value::real(0.0));
    }

    #[test]
    fn determinant_and_inverse() {
        let m = Value::Grid(
            Grid::table(
                GridKind::Matrix,
                2,
                2,
                [4.0, 7.0, 2.0, 6.0].map(real).to_vec(),
            )
            .unwrap(),
        );
        let det = call_ok("det", vec![m.clone()]).as_real().unwrap();
        assert!((det - 10.0).abs() < 1e-12);
        let inv = call_ok("inv", vec![m]);
        let Value::Grid(inv) = inv else {
            panic!("expected a grid");
        };
        assert!((inv.get(0, 0).unwrap().re - 0.6).abs() < 1e-12);
        assert!((inv.get(1, 0).unwrap().re + 0.2).abs() < 1e-12);
    }

    #[test]
    fn ranges_and_reductions() {
        assert_eq!(arange(1.0, 5.0, 2.0, true).unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(arange(0.0, 3.0, 1.0, false).unwrap(), vec![0.0, 1.0, 2.0]);
        assert!(arange(5.0, 1.0, 1.0, true).unwrap().is_empty());
        assert!(matches!(arange(0.0, 1e300, 1.0, false), Err(EvalError::Domain(_))));
        let v = Value::Grid(Grid::reals([3.0, 1.0, 2.0]));
        assert_eq!(call_ok("max", vec![v.clone()]), Value::real(3.0));
        assert_eq!(call_ok("mean", vec![v]), Value::real(2.0));
    }

    #[test]
    fn wrong_arity_is_reported() {
        let err = call("dot", vec![Value::real(1.0)]).unwrap().unwrap_err();
        assert_eq!(
            err,
            EvalError::Arity {
                function: "dot".into(),
                expected: "2".into(),
                found: 1
            }
        );
    }

    #[test]
    fn convolution_is_full_length() {
        let a = Value::Grid(Grid::reals([1.0, 2.0]));
        let b = Value::Grid(Grid::reals([1.0, 1.0, 1.0]));
        assert_eq!(call_ok("convolve", vec![a, b]).to_string(), "[1, 3, 3, 2]");
    }

    #[test]
    fn odd_roots_of_negative_reals() {
        let cube = call_ok("root", vec![Value::real(-8.0), Value::real(3.0)]);
        assert!((cube.as_real().unwrap() + 2.0).abs() < 1e-12);
    }
}
