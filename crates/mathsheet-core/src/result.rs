//! Result splicing.
//!
//! An evaluated equation shows its value as a span `Equals ... EqualsEnd` appended after the
//! editable tokens. The span is rebuilt from a [`ResultValue`] whenever the formatted text
//! changes and removed by any edit.

use crate::construct::Construct;
use crate::document::{Caret, Document};
use crate::error::CommandError;
use crate::matcher::rebuild_matches;
use crate::token::{Glyph, Keyword, KeywordKind as K, Token};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A value ready to be drawn after an equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultValue {
    /// A real number. Infinities and NaN are allowed.
    Real {
        /// The value.
        value: f64,
    },
    /// A complex number.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
    /// A 1-D or 2-D array, row-major.
    Grid {
        /// Cells by row.
        rows: Vec<Vec<ResultValue>>,
        /// Drawn with square brackets (matrix) instead of parentheses (array).
        matrix: bool,
    },
    /// A string value.
    Text {
        /// The string without quotes.
        value: String,
    },
    /// A symbolic result, drawn after an arrow instead of `=`.
    Symbolic {
        /// Expression text.
        value: String,
    },
}

impl ResultValue {
    /// Shorthand for [`ResultValue::Real`].
    pub fn real(value: f64) -> Self {
        ResultValue::Real { value }
    }
}

/// A number formatted like C's `%.{digits}g`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedNumber {
    /// Positional notation (`3.142`, `0.0001`).
    Fixed(String),
    /// Scientific notation, kept apart so the exponent can be drawn raised.
    Scientific {
        /// Significand, trailing zeros removed.
        mantissa: String,
        /// Base-ten exponent.
        exponent: i32,
    },
}

impl FormattedNumber {
    /// Format `value` with `digits` significant digits.
    pub fn new(value: f64, digits: usize) -> Self {
        let digits = digits.max(1);
        if value == 0.0 {
            return FormattedNumber::Fixed("0".to_string());
        }
        if value.is_nan() {
            return FormattedNumber::Fixed("nan".to_string());
        }
        if value.is_infinite() {
            let sign = if value < 0.0 { "-" } else { "" };
            return FormattedNumber::Fixed(format!("{sign}\u{221e}"));
        }

        let sci = format!("{:.*e}", digits - 1, value);
        let (mantissa, exponent) = match sci.split_once('e') {
            Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
            None => (sci.clone(), 0),
        };
        if exponent < -4 || exponent >= digits as i32 {
            FormattedNumber::Scientific {
                mantissa: trim_zeros(&mantissa),
                exponent,
            }
        } else {
            let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
            FormattedNumber::Fixed(trim_zeros(&format!("{value:.decimals$}")))
        }
    }
}

impl std::fmt::Display for FormattedNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormattedNumber::Fixed(text) => f.write_str(text),
            FormattedNumber::Scientific { mantissa, exponent } => {
                let sign = if *exponent < 0 { '-' } else { '+' };
                write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
            }
        }
    }
}

fn trim_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

/// Plain-text form of a result, used to decide whether the span must be redrawn.
pub fn format_result(value: &ResultValue, digits: usize) -> String {
    match value {
        ResultValue::Real { value } => FormattedNumber::new(*value, digits).to_string(),
        ResultValue::Complex { re, im } => format_complex(*re, *im, digits),
        ResultValue::Grid { rows, .. } => {
            let mut out = String::from("[");
            for (r, row) in rows.iter().enumerate() {
                if r > 0 {
                    out.push_str("; ");
                }
                for (c, cell) in row.iter().enumerate() {
                    if c > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}", format_result(cell, digits));
                }
            }
            out.push(']');
            out
        }
        ResultValue::Text { value } => format!("'{value}'"),
        ResultValue::Symbolic { value } => value.clone(),
    }
}

fn format_complex(re: f64, im: f64, digits: usize) -> String {
    let imag = FormattedNumber::new(im.abs(), digits);
    if re == 0.0 {
        let sign = if im < 0.0 { "-" } else { "" };
        return format!("{sign}{imag}j");
    }
    let sign = if im < 0.0 { '-' } else { '+' };
    format!("{}{sign}{imag}j", FormattedNumber::new(re, digits))
}

/// Glyphs for one character run.
fn push_chars(tokens: &mut Vec<Token>, text: &str) {
    for ch in text.chars() {
        let glyph = match ch {
            '\u{221e}' => Glyph::plain("__infinity__"),
            '-' => Glyph::text("-", "-"),
            other => Glyph::plain(other.to_string()),
        };
        tokens.push(glyph.into());
    }
}

fn push_number(tokens: &mut Vec<Token>, number: &FormattedNumber) {
    match number {
        FormattedNumber::Fixed(text) => push_chars(tokens, text),
        FormattedNumber::Scientific { mantissa, exponent } => {
            push_chars(tokens, mantissa);
            tokens.push(Glyph::text("\u{00d7}", "*").into());
            push_chars(tokens, "10");
            let mut power = Construct::Power.template();
            let mut digits = Vec::new();
            push_chars(&mut digits, &exponent.to_string());
            // Power template is `[start, placeholder, end]`.
            power.splice(1..2, digits);
            tokens.extend(power);
        }
    }
}

fn push_value(tokens: &mut Vec<Token>, value: &ResultValue, digits: usize) {
    match value {
        ResultValue::Real { value } => push_number(tokens, &FormattedNumber::new(*value, digits)),
        ResultValue::Complex { re, im } => push_chars(tokens, &format_complex(*re, *im, digits)),
        ResultValue::Grid { rows, matrix } => {
            let row_count = rows.len().max(1);
            let col_count = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let construct = if *matrix {
                Construct::Matrix {
                    rows: row_count,
                    cols: col_count,
                }
            } else {
                Construct::Array {
                    rows: row_count,
                    cols: col_count,
                }
            };
            let mut cells = rows.iter().flat_map(|row| {
                (0..col_count).map(move |c| row.get(c))
            });
            for token in construct.template() {
                if token.is_reserved() {
                    match cells.next().flatten() {
                        Some(cell) => push_value(tokens, cell, digits),
                        None => push_chars(tokens, "0"),
                    }
                } else {
                    tokens.push(token);
                }
            }
        }
        ResultValue::Text { value } => {
            tokens.push(Glyph::text("'", "'").into());
            push_chars(tokens, value);
            tokens.push(Glyph::text("'", "'").into());
        }
        ResultValue::Symbolic { value } => push_chars(tokens, value),
    }
}

impl Document {
    /// Splice a result after the equation.
    ///
    /// Returns `false` (and leaves the tokens untouched) when the formatted result did not
    /// change.
    pub fn set_result(&mut self, value: &ResultValue, digits: usize) -> Result<bool, CommandError> {
        let text = format_result(value, digits);
        if self.flags.has_result && self.result_string.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }
        self.delete_result();

        let separator = match value {
            ResultValue::Symbolic { .. } => Glyph::text(" \u{27f6} ", "__limitarrow__"),
            _ => Glyph::text(" = ", "__equalsign__"),
        };
        let mut span: Vec<Token> = vec![Keyword::new(K::Equals).into(), separator.into()];
        push_value(&mut span, value, digits);
        span.push(Keyword::new(K::EqualsEnd).into());

        let editable = self.tokens.len();
        self.tokens.extend(span);
        if let Err(err) = rebuild_matches(&mut self.tokens) {
            tracing::error!(error = %err, "result span is unbalanced");
            self.tokens.truncate(editable);
            return Err(CommandError::Unbalanced(err));
        }
        if let Caret::Insert(index) = self.caret {
            self.caret = Caret::Insert(index.min(editable));
        }
        self.result_string = Some(text);
        self.refresh_flags();
        self.relayout();
        tracing::debug!(result = ?self.result_string, "spliced result");
        Ok(true)
    }

    /// Remove the result span. Returns `true` if there was one.
    pub fn delete_result(&mut self) -> bool {
        if !self.flags.has_result {
            return false;
        }
        let Some(open) = self.tokens.last().and_then(Token::partner) else {
            return false;
        };
        self.tokens.truncate(open);
        self.result_string = None;
        self.flags.has_result = false;
        if let Caret::Insert(index) = self.caret {
            self.caret = Caret::Insert(index.min(open));
        } else {
            self.caret = Caret::Insert(open);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_format() {
        assert_eq!(FormattedNumber::new(3.14159265, 4).to_string(), "3.142");
        assert_eq!(FormattedNumber::new(2.0, 4).to_string(), "2");
        assert_eq!(FormattedNumber::new(0.0001, 4).to_string(), "0.0001");
        assert_eq!(FormattedNumber::new(123456.0, 4).to_string(), "1.235e+05");
        assert_eq!(FormattedNumber::new(0.00001234, 4).to_string(), "1.234e-05");
        assert_eq!(FormattedNumber::new(-1234.0, 4).to_string(), "-1234");
    }

    #[test]
    fn complex_format() {
        assert_eq!(format_complex(1.0, -2.0, 4), "1-2j");
        assert_eq!(format_complex(0.0, 3.0, 4), "3j");
    }

    #[test]
    fn unchanged_result_is_not_respliced() {
        let mut doc = Document::new();
        doc.insert_text("2").unwrap();
        assert!(doc.set_result(&ResultValue::real(2.0), 4).unwrap());
        let len = doc.len();
        assert!(!doc.set_result(&ResultValue::real(2.0), 4).unwrap());
        assert_eq!(doc.len(), len);
        assert!(doc.delete_result());
        assert_eq!(doc.len(), 1);
        assert!(doc.result_string().is_none());
    }

    #[test]
    fn scientific_results_use_a_power() {
        let mut doc = Document::new();
        doc.insert_text("x").unwrap();
        doc.set_result(&ResultValue::real(1.5e9), 4).unwrap();
        assert!(doc.tokens().iter().any(|t| t.is(K::PowerStart)));
        assert_eq!(doc.result_string(), Some("1.5e+09"));
    }
}
