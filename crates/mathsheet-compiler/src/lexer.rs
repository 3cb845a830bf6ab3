//! Token linearization and the regex lexer.
//!
//! Keywords pass through as structural lexemes. Glyph tags are concatenated into text runs
//! (so `x`, `_`, `1` typed as three glyphs read as the label `x_1`) and each run is split by
//! an ordered table of anchored patterns. Operator glyphs always form a run of their own.

use crate::error::CompileError;
use mathsheet_core::{GlyphShape, KeywordKind, Token};
use mathsheet_lang::{OperatorStyle, ProgramWord, is_decorative_tag, is_reserved_word};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Infix and prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `+`
    Add,
    /// `-`, binary or unary
    Sub,
    /// `*`
    Mul,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `&&`
    BitAnd,
    /// `||`
    BitOr,
    /// `^^`
    BitXor,
    /// `!!`, prefix only
    BitNot,
}

impl Operator {
    /// Source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::BitAnd => "&&",
            Operator::BitOr => "||",
            Operator::BitXor => "^^",
            Operator::BitNot => "!!",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            "<=" => Operator::LessEqual,
            ">=" => Operator::GreaterEqual,
            "&&" => Operator::BitAnd,
            "||" => Operator::BitOr,
            "^^" => Operator::BitXor,
            "!!" => Operator::BitNot,
            _ => return None,
        })
    }
}

/// One lexeme of a linearized equation.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    /// Variable or function name. Greek letters keep their `__name__` tag.
    Label(String),
    /// Decimal literal.
    Number(f64),
    /// Hexadecimal (`0x1F`) or binary (`0b101`) literal.
    Integer(i64),
    /// Imaginary literal (`2j`, `1.5i`).
    Imaginary(f64),
    /// Quoted string, without the quotes.
    Text(String),
    /// Operator.
    Operator(Operator),
    /// `!`
    Factorial,
    /// `:=`
    Assign,
    /// `:` inside an index.
    Colon,
    /// `;` range.
    Semicolon,
    /// `,`
    Comma,
    /// Program-block word.
    Word(ProgramWord),
    /// One indentation step at the start of a program line.
    Indent,
    /// Structural keyword.
    Keyword(KeywordKind),
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lexeme::Label(name) => write!(f, "'{name}'"),
            Lexeme::Number(value) => write!(f, "{value}"),
            Lexeme::Integer(value) => write!(f, "{value}"),
            Lexeme::Imaginary(value) => write!(f, "{value}j"),
            Lexeme::Text(text) => write!(f, "'{text}'"),
            Lexeme::Operator(op) => write!(f, "'{}'", op.symbol()),
            Lexeme::Factorial => f.write_str("'!'"),
            Lexeme::Assign => f.write_str("':='"),
            Lexeme::Colon => f.write_str("':'"),
            Lexeme::Semicolon => f.write_str("';'"),
            Lexeme::Comma => f.write_str("','"),
            Lexeme::Word(word) => write!(f, "'{}'", word.word()),
            Lexeme::Indent => f.write_str("indentation"),
            Lexeme::Keyword(kind) => write!(f, "{kind:?}"),
        }
    }
}

/// A lexeme and the token index it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The lexeme.
    pub lexeme: Lexeme,
    /// Index of the (first) token it was read from.
    pub position: usize,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Whitespace,
    Hexadecimal,
    Binary,
    Imaginary,
    Float,
    Integer,
    Text,
    Label,
    Symbol,
}

/// Tried in order; the first pattern that matches at the current offset wins.
static RULES: LazyLock<Vec<(Rule, Regex)>> = LazyLock::new(|| {
    [
        (Rule::Whitespace, r"^\s+"),
        (Rule::Hexadecimal, r"^0x[0-9A-Fa-f]+"),
        (Rule::Binary, r"^0b[01]+"),
        (
            Rule::Imaginary,
            r"^(?:\d+\.\d*(?:E[+-]?\d+)?|[1-9]\d*E[+-]?\d+|\d+)[ji]",
        ),
        (Rule::Float, r"^(?:\d+\.\d*(?:E[+-]?\d+)?|[1-9]\d*E[+-]?\d+)"),
        (Rule::Integer, r"^\d+"),
        (Rule::Text, r"^'[^']*'"),
        (
            Rule::Label,
            r"^(?:[a-zA-Z]|__[a-zA-Z]+__)(?:_?(?:[a-zA-Z0-9]|__[a-zA-Z]+__))*",
        ),
        (
            Rule::Symbol,
            r"^(?::=|==|<=|>=|!=|!!|&&|\|\||\^\^|[<>!:;,+*-])",
        ),
    ]
    .into_iter()
    .map(|(rule, pattern)| (rule, Regex::new(pattern).expect("valid lexeme pattern")))
    .collect()
});

/// Concatenated glyph tags waiting to be split, with the token index each tag came from.
#[derive(Debug, Default)]
struct Run {
    text: String,
    origins: Vec<(usize, usize)>,
}

impl Run {
    fn push(&mut self, tag: &str, index: usize) {
        self.origins.push((self.text.len(), index));
        self.text.push_str(tag);
    }

    fn origin(&self, offset: usize) -> usize {
        self.origins
            .iter()
            .take_while(|(start, _)| *start <= offset)
            .last()
            .map_or(0, |(_, index)| *index)
    }

    fn flush(&mut self, out: &mut Vec<Spanned>) -> Result<(), CompileError> {
        let mut offset = 0;
        while offset < self.text.len() {
            let rest = &self.text[offset..];
            let position = self.origin(offset);
            let bad_input = || CompileError::Lex {
                position,
                text: rest.chars().next().map(String::from).unwrap_or_default(),
            };
            let (rule, len) = RULES
                .iter()
                .find_map(|(rule, regex)| regex.find(rest).map(|m| (*rule, m.end())))
                .ok_or_else(bad_input)?;
            let text = &rest[..len];
            if let Some(lexeme) = lexeme_for(rule, text).ok_or_else(|| CompileError::Lex {
                position,
                text: text.to_string(),
            })? {
                out.push(Spanned { lexeme, position });
            }
            offset += len;
        }
        self.text.clear();
        self.origins.clear();
        Ok(())
    }
}

/// `None` when the text does not convert (an out-of-range literal), `Some(None)` for text
/// that produces no lexeme.
fn lexeme_for(rule: Rule, text: &str) -> Option<Option<Lexeme>> {
    let lexeme = match rule {
        Rule::Whitespace => return Some(None),
        Rule::Hexadecimal => Lexeme::Integer(i64::from_str_radix(&text[2..], 16).ok()?),
        Rule::Binary => Lexeme::Integer(i64::from_str_radix(&text[2..], 2).ok()?),
        Rule::Imaginary => Lexeme::Imaginary(text[..text.len() - 1].parse().ok()?),
        Rule::Float | Rule::Integer => Lexeme::Number(text.parse().ok()?),
        Rule::Text => Lexeme::Text(text[1..text.len() - 1].to_string()),
        Rule::Label if is_reserved_word(text) => Lexeme::Word(ProgramWord::from_word(text)?),
        Rule::Label => Lexeme::Label(text.to_string()),
        Rule::Symbol => match text {
            ":=" => Lexeme::Assign,
            ":" => Lexeme::Colon,
            ";" => Lexeme::Semicolon,
            "," => Lexeme::Comma,
            "!" => Lexeme::Factorial,
            other => Lexeme::Operator(Operator::from_symbol(other)?),
        },
    };
    Some(Some(lexeme))
}

/// Linearize an equation's tokens into lexemes.
///
/// Stops at the result span. A placeholder anywhere before it makes the equation
/// [`CompileError::Incomplete`].
pub fn lex(tokens: &[Token]) -> Result<Vec<Spanned>, CompileError> {
    let operators = OperatorStyle::default();
    let mut out = Vec::with_capacity(tokens.len());
    let mut run = Run::default();

    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::Keyword(keyword) => {
                if keyword.kind == KeywordKind::Equals {
                    break;
                }
                run.flush(&mut out)?;
                out.push(Spanned {
                    lexeme: Lexeme::Keyword(keyword.kind),
                    position: index,
                });
            }
            Token::Glyph(glyph) => {
                if glyph.is_reserved() {
                    return Err(CompileError::Incomplete { index });
                }
                if glyph.shape == GlyphShape::Indent {
                    run.flush(&mut out)?;
                    out.push(Spanned {
                        lexeme: Lexeme::Indent,
                        position: index,
                    });
                } else if is_decorative_tag(&glyph.tag) {
                    run.flush(&mut out)?;
                } else if let Some(word) = ProgramWord::from_tag(&glyph.tag) {
                    run.flush(&mut out)?;
                    out.push(Spanned {
                        lexeme: Lexeme::Word(word),
                        position: index,
                    });
                } else if operators.display_for(&glyph.tag).is_some() {
                    run.flush(&mut out)?;
                    run.push(&glyph.tag, index);
                    run.flush(&mut out)?;
                } else {
                    run.push(&glyph.tag, index);
                }
            }
        }
    }
    run.flush(&mut out)?;
    tracing::trace!(tokens = tokens.len(), lexemes = out.len(), "lexed equation");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathsheet_core::{Glyph, Keyword};

    fn glyphs(tags: &[&str]) -> Vec<Token> {
        tags.iter().map(|t| Glyph::plain(*t).into()).collect()
    }

    fn lexemes(tokens: &[Token]) -> Vec<Lexeme> {
        lex(tokens).unwrap().into_iter().map(|s| s.lexeme).collect()
    }

    #[test]
    fn glyph_runs_join_into_labels_and_numbers() {
        let tokens = glyphs(&["x", "_", "1", "+", "2", ".", "5"]);
        assert_eq!(
            lexemes(&tokens),
            vec![
                Lexeme::Label("x_1".into()),
                Lexeme::Operator(Operator::Add),
                Lexeme::Number(2.5),
            ]
        );
    }

    #[test]
    fn literal_forms() {
        assert_eq!(lexemes(&glyphs(&["0", "x", "f", "f"])), vec![Lexeme::Integer(255)]);
        assert_eq!(lexemes(&glyphs(&["0", "b", "1", "0"])), vec![Lexeme::Integer(2)]);
        assert_eq!(lexemes(&glyphs(&["3", "j"])), vec![Lexeme::Imaginary(3.0)]);
        assert_eq!(
            lexemes(&glyphs(&["1", "E", "3"])),
            vec![Lexeme::Number(1000.0)]
        );
        assert_eq!(
            lexemes(&glyphs(&["'", "h", "i", "'"])),
            vec![Lexeme::Text("hi".into())]
        );
    }

    #[test]
    fn greek_tags_stay_inside_labels() {
        let tokens = glyphs(&["x", "__alpha__"]);
        assert_eq!(lexemes(&tokens), vec![Lexeme::Label("x__alpha__".into())]);
    }

    #[test]
    fn operator_glyphs_do_not_merge_with_neighbours() {
        let tokens = glyphs(&["x", "!", "==", "y"]);
        assert_eq!(
            lexemes(&tokens),
            vec![
                Lexeme::Label("x".into()),
                Lexeme::Factorial,
                Lexeme::Operator(Operator::Equal),
                Lexeme::Label("y".into()),
            ]
        );
    }

    #[test]
    fn decorative_glyphs_split_runs_and_vanish() {
        let mut tokens = glyphs(&["a"]);
        tokens.push(Keyword::new(KeywordKind::TransposeStart).into());
        tokens.push(Glyph::text("T", "__transpose__").into());
        tokens.push(Keyword::new(KeywordKind::TransposeEnd).into());
        assert_eq!(
            lexemes(&tokens),
            vec![
                Lexeme::Label("a".into()),
                Lexeme::Keyword(KeywordKind::TransposeStart),
                Lexeme::Keyword(KeywordKind::TransposeEnd),
            ]
        );
    }

    #[test]
    fn placeholder_is_incomplete() {
        let mut tokens = glyphs(&["a", "+"]);
        tokens.push(Glyph::reserved().into());
        assert_eq!(lex(&tokens), Err(CompileError::Incomplete { index: 2 }));
    }

    #[test]
    fn unknown_text_reports_its_token() {
        let tokens = glyphs(&["a", "+", "b", "?"]);
        assert_eq!(
            lex(&tokens),
            Err(CompileError::Lex {
                position: 3,
                text: "?".into()
            })
        );
    }

    #[test]
    fn result_span_is_ignored() {
        let mut tokens = glyphs(&["2"]);
        tokens.push(Keyword::new(KeywordKind::Equals).into());
        tokens.push(Glyph::reserved().into());
        tokens.push(Keyword::new(KeywordKind::EqualsEnd).into());
        assert_eq!(lexemes(&tokens), vec![Lexeme::Number(2.0)]);
    }
}
