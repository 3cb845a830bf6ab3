//! Numeric stand-ins for calculus forms: quadrature, differentiation and one-sided limits.

use crate::error::EvalError;
use mathsheet_core::LimitSide;
use num_complex::Complex64;

/// Panels used by [`simpson`]. Must be even.
pub const SIMPSON_PANELS: usize = 200;

/// Distance from the approach point at which a one-sided limit is sampled.
pub const LIMIT_OFFSET: f64 = 1e-9;

/// Composite Simpson rule over `[a, b]`.
pub fn simpson(
    mut f: impl FnMut(f64) -> Result<Complex64, EvalError>,
    a: f64,
    b: f64,
) -> Result<Complex64, EvalError> {
    if !a.is_finite() || !b.is_finite() {
        return Err(EvalError::domain("integration bounds must be finite"));
    }
    let h = (b - a) / SIMPSON_PANELS as f64;
    let mut total = f(a)? + f(b)?;
    for i in 1..SIMPSON_PANELS {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        total += f(a + h * i as f64)? * weight;
    }
    Ok(total * (h / 3.0))
}

/// Central difference at `x` with a step scaled to `x`.
pub fn central_difference(
    mut f: impl FnMut(f64) -> Result<Complex64, EvalError>,
    x: f64,
) -> Result<Complex64, EvalError> {
    let h = 1e-5 * x.abs().max(1.0);
    Ok((f(x + h)? - f(x - h)?) / (2.0 * h))
}

/// `f` sampled just beside `a` on the given side. An infinite `a` samples far out instead.
pub fn one_sided_limit(
    mut f: impl FnMut(f64) -> Result<Complex64, EvalError>,
    a: f64,
    side: LimitSide,
) -> Result<Complex64, EvalError> {
    if a.is_infinite() {
        return f(a.signum() * 1e12);
    }
    if a.is_nan() {
        return Err(EvalError::domain("limit point is not a number"));
    }
    let offset = LIMIT_OFFSET * a.abs().max(1.0);
    match side {
        LimitSide::Plus => f(a + offset),
        LimitSide::Minus => f(a - offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(f: impl Fn(f64) -> f64) -> impl FnMut(f64) -> Result<Complex64, EvalError> {
        move |x| Ok(Complex64::new(f(x), 0.0))
    }

    #[test]
    fn simpson_is_exact_for_cubics() {
        let area = simpson(real(|x| x * x * x), 0.0, 2.0).unwrap();
        assert!((area.re - 4.0).abs() < 1e-10);
    }

    #[test]
    fn derivative_of_sine() {
        let slope = central_difference(real(f64::sin), 0.0).unwrap();
        assert!((slope.re - 1.0).abs() < 1e-8);
    }

    #[test]
    fn limits_pick_a_side() {
        let sign = |x: f64| if x > 0.0 { 1.0 } else { -1.0 };
        assert_eq!(one_sided_limit(real(sign), 0.0, LimitSide::Plus).unwrap().re, 1.0);
        assert_eq!(one_sided_limit(real(sign), 0.0, LimitSide::Minus).unwrap().re, -1.0);
    }
}
