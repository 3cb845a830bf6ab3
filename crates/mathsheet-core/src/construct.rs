//! Construct templates.
//!
//! Each composite construct is inserted as a fixed token template. Templates carry their
//! own arrow-key steps, selection flags and click offsets so that navigation stays
//! table-driven. Context-dependent parts (the base placeholder of a power, sub/superscript
//! wrapping, where a limit goes) are decided by [`crate::edit`].

use crate::token::{Glyph, GlyphShape, Keyword, KeywordKind as K, Payload, Token};
use mathsheet_lang::ProgramWord;

/// Approach direction of a one-sided limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSide {
    /// `x → a⁺`
    Plus,
    /// `x → a⁻`
    Minus,
}

/// Every composite construct the editor can insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    /// `a/b`
    Fraction,
    /// `(a)`
    Parenthesis,
    /// `√a`
    SquareRoot,
    /// `ⁿ√a`
    NthRoot,
    /// `|a|`
    Absolute,
    /// `|A|` (determinant)
    Determinant,
    /// `‖a‖`
    Norm,
    /// `⌊a⌋`
    Floor,
    /// `⌈a⌉`
    Ceil,
    /// `ā` (mean)
    Average,
    /// `a⃗` (vectorize)
    Vectorize,
    /// `∑a` over all elements of an array.
    MatrixSum,
    /// `aᵇ`
    Power,
    /// `a[i]`
    Index,
    /// `a_b` naming subscript.
    Subscript,
    /// `aᵇ` naming superscript.
    Superscript,
    /// `Aᵀ`
    Transpose,
    /// `a*`
    Conjugate,
    /// `A†`
    Hermitian,
    /// `a • b`
    DotProduct,
    /// `a ∗ b`
    Convolution,
    /// `[..]` with the given size.
    Matrix {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
    /// `(..)` array with the given size.
    Array {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
    /// `∑_{i=a}^{b} f`
    Sum,
    /// `∏_{i=a}^{b} f`
    Product,
    /// `∑_{i ∈ r} f`
    RangeSum,
    /// `∏_{i ∈ r} f`
    RangeProduct,
    /// `∫_a^b f dx`
    Integral,
    /// `∫ f dx`
    IndefiniteIntegral,
    /// `d f / d x`
    Derivative,
    /// `lim_{x→a±} f`
    Limit(LimitSide),
    /// `[f]_{x=a}`
    Substitution,
    /// Multi-line program block.
    Program,
    /// A program keyword inside a program line.
    Word(ProgramWord),
}

impl Construct {
    /// Opening keyword of the construct, or `None` for plain glyph runs.
    pub fn opening_kind(self) -> Option<K> {
        Some(match self {
            Construct::Fraction | Construct::Derivative => K::DivideStart,
            Construct::Parenthesis => K::LeftParen,
            Construct::SquareRoot => K::SquareRootStart,
            Construct::NthRoot => K::OrderNRootStart,
            Construct::Absolute => K::AbsoluteStart,
            Construct::Determinant => K::DeterminantStart,
            Construct::Norm => K::NormStart,
            Construct::Floor => K::FloorStart,
            Construct::Ceil => K::CeilStart,
            Construct::Average => K::AverageStart,
            Construct::Vectorize => K::VectorizeStart,
            Construct::MatrixSum => K::MatrixSumStart,
            Construct::Power => K::PowerStart,
            Construct::Index => K::IndexStart,
            Construct::Subscript => K::SubscriptStart,
            Construct::Superscript => K::SuperscriptStart,
            Construct::Transpose => K::TransposeStart,
            Construct::Conjugate => K::ConjugateStart,
            Construct::Hermitian => K::HermitianStart,
            Construct::DotProduct => K::DotProductStart,
            Construct::Convolution => K::ConvolveStart,
            Construct::Matrix { .. } => K::MatrixStart,
            Construct::Array { .. } => K::ArrayStart,
            Construct::Sum => K::SumStart,
            Construct::Product => K::ProductStart,
            Construct::RangeSum => K::RangeSumStart,
            Construct::RangeProduct => K::RangeProductStart,
            Construct::Integral => K::IntegralStart,
            Construct::IndefiniteIntegral => K::IndefIntegralStart,
            Construct::Limit(_) => K::LimitStart,
            Construct::Substitution => K::SubstitutionStart,
            Construct::Program => K::ProgramStart,
            Construct::Word(_) => return None,
        })
    }

    /// Whether a selection may be wrapped into the construct's first slot.
    pub fn wraps_selection(self) -> bool {
        !matches!(
            self,
            Construct::Limit(_) | Construct::Program | Construct::Word(_)
        ) && !self.is_postfix()
            && !self.is_infix()
    }

    /// Constructs that apply to the operand on their left.
    pub fn is_postfix(self) -> bool {
        matches!(
            self,
            Construct::Power
                | Construct::Index
                | Construct::Subscript
                | Construct::Superscript
                | Construct::Transpose
                | Construct::Conjugate
                | Construct::Hermitian
        )
    }

    /// Constructs that sit between two operands.
    pub fn is_infix(self) -> bool {
        matches!(self, Construct::DotProduct | Construct::Convolution)
    }

    /// Constructs that need a base placeholder when nothing is on their left.
    pub fn needs_base(self) -> bool {
        matches!(
            self,
            Construct::Power
                | Construct::Transpose
                | Construct::Conjugate
                | Construct::Hermitian
                | Construct::DotProduct
                | Construct::Convolution
        )
    }

    /// The construct's template, without any base placeholder.
    pub fn template(self) -> Vec<Token> {
        match self {
            Construct::Fraction => fraction(),
            Construct::Parenthesis => parenthesis(),
            Construct::SquareRoot => square_root(),
            Construct::NthRoot => nth_root(),
            Construct::Absolute => barred(K::AbsoluteStart, GlyphShape::VerticalBar),
            Construct::Determinant => barred(K::DeterminantStart, GlyphShape::VerticalBar),
            Construct::Norm => barred(K::NormStart, GlyphShape::NormBar),
            Construct::Floor => bracketed(
                K::FloorStart,
                GlyphShape::LeftFloor,
                GlyphShape::RightFloor,
            ),
            Construct::Ceil => {
                bracketed(K::CeilStart, GlyphShape::LeftCeil, GlyphShape::RightCeil)
            }
            Construct::Average => decorated(K::AverageStart, Glyph::shaped(GlyphShape::OverBar)),
            Construct::Vectorize => decorated(K::VectorizeStart, Glyph::shaped(GlyphShape::Arrow)),
            Construct::MatrixSum => {
                decorated(K::MatrixSumStart, Glyph::shaped(GlyphShape::BigOperator))
            }
            Construct::Power => slot_only(K::PowerStart),
            Construct::Index => slot_only(K::IndexStart),
            Construct::Subscript => slot_only(K::SubscriptStart),
            Construct::Superscript => slot_only(K::SuperscriptStart),
            Construct::Transpose => marker(
                K::TransposeStart,
                Glyph::text("T", "__transpose__").upright(),
            ),
            Construct::Conjugate => marker(K::ConjugateStart, Glyph::text("*", "__star__")),
            Construct::Hermitian => marker(
                K::HermitianStart,
                Glyph::text("\u{2020}", "__hermitian__"),
            ),
            Construct::DotProduct => {
                let mut tokens = marker(
                    K::DotProductStart,
                    Glyph::text("\u{2022}", "__dot__").with_clicks(2, 1),
                );
                tokens.push(Glyph::reserved().into());
                tokens
            }
            Construct::Convolution => {
                let mut tokens = marker(
                    K::ConvolveStart,
                    Glyph::text("\u{2217}", "__convolve__").with_clicks(2, 1),
                );
                tokens.push(Glyph::reserved().into());
                tokens
            }
            Construct::Matrix { rows, cols } => grid(K::MatrixStart, rows, cols),
            Construct::Array { rows, cols } => grid(K::ArrayStart, rows, cols),
            Construct::Sum => summation(K::SumStart, Glyph::shaped(GlyphShape::BigOperator)),
            Construct::Product => summation(K::ProductStart, big_product()),
            Construct::RangeSum => {
                range_summation(K::RangeSumStart, Glyph::shaped(GlyphShape::BigOperator))
            }
            Construct::RangeProduct => range_summation(K::RangeProductStart, big_product()),
            Construct::Integral => integral(),
            Construct::IndefiniteIntegral => indefinite_integral(),
            Construct::Derivative => derivative(),
            Construct::Limit(side) => limit(side),
            Construct::Substitution => substitution(),
            Construct::Program => program(),
            Construct::Word(word) => program_word(word),
        }
    }
}

fn kw(kind: K) -> Keyword {
    Keyword::new(kind)
}

fn closing(kind: K) -> Keyword {
    Keyword::new(kind.closer().unwrap_or(kind))
}

fn res() -> Token {
    Glyph::reserved().into()
}

fn big_product() -> Glyph {
    Glyph::shaped(GlyphShape::BigOperator)
        .with_display("\u{220f}")
        .with_tag("__product__")
}

fn fraction() -> Vec<Token> {
    vec![
        kw(K::DivideStart).right(2).into(),
        kw(K::NumStart).left(2).look_right().into(),
        res(),
        kw(K::NumEnd).right(3).select_whole().into(),
        Glyph::shaped(GlyphShape::DivideLine).into(),
        kw(K::DenomStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::DenomEnd).right(2).into(),
        kw(K::DivideEnd).left(2).into(),
    ]
}

fn parenthesis() -> Vec<Token> {
    bracketed(K::LeftParen, GlyphShape::LeftParen, GlyphShape::RightParen)
}

fn square_root() -> Vec<Token> {
    vec![
        kw(K::SquareRootStart).right(3).into(),
        Glyph::shaped(GlyphShape::Radical).into(),
        kw(K::RootBodyStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::RootBodyEnd).right(2).into(),
        kw(K::SquareRootEnd).left(2).into(),
    ]
}

fn nth_root() -> Vec<Token> {
    vec![
        kw(K::OrderNRootStart).right(2).into(),
        kw(K::OrderStart).left(2).look_right().into(),
        res(),
        kw(K::OrderEnd).right(3).select_whole().into(),
        Glyph::shaped(GlyphShape::Radical).into(),
        kw(K::RootBodyStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::RootBodyEnd).right(2).into(),
        kw(K::OrderNRootEnd).left(2).into(),
    ]
}

/// `Start, left, BodyStart, res, BodyEnd, right, End`.
fn bracketed(start: K, left: GlyphShape, right: GlyphShape) -> Vec<Token> {
    vec![
        kw(start).right(3).into(),
        Glyph::shaped(left).into(),
        kw(K::BodyStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::BodyEnd).right(3).select_whole().into(),
        Glyph::shaped(right).into(),
        closing(start).left(3).into(),
    ]
}

fn barred(start: K, bar: GlyphShape) -> Vec<Token> {
    bracketed(start, bar, bar)
}

/// `Start, decoration, BodyStart, res, BodyEnd, End`.
fn decorated(start: K, decoration: Glyph) -> Vec<Token> {
    vec![
        kw(start).right(3).into(),
        decoration.into(),
        kw(K::BodyStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::BodyEnd).right(2).into(),
        closing(start).left(2).into(),
    ]
}

/// `Start, res, End`: the construct's interior is itself the slot.
fn slot_only(start: K) -> Vec<Token> {
    vec![kw(start).look_right().into(), res(), closing(start).into()]
}

/// `Start, glyph, End`: a postfix mark with no content.
fn marker(start: K, glyph: Glyph) -> Vec<Token> {
    vec![
        kw(start).right(3).into(),
        glyph.into(),
        closing(start).left(3).into(),
    ]
}

fn grid(start: K, rows: usize, cols: usize) -> Vec<Token> {
    let rows = rows.max(1);
    let cols = cols.max(1);
    let (left, right) = if start == K::MatrixStart {
        (
            Glyph::shaped(GlyphShape::LeftBracket),
            Glyph::shaped(GlyphShape::RightBracket),
        )
    } else {
        (
            Glyph::shaped(GlyphShape::LeftParen),
            Glyph::shaped(GlyphShape::RightParen),
        )
    };

    let mut tokens = Vec::with_capacity(rows * cols * 3 + 4 + 2 * rows);
    tokens.push(
        kw(start)
            .with_payload(Payload::Grid { rows, cols })
            .right(4)
            .into(),
    );
    tokens.push(left.into());
    for row in 0..rows {
        tokens.push(kw(K::RowStart).into());
        for col in 0..cols {
            tokens.push(
                kw(K::ElementStart)
                    .with_payload(Payload::Cell { row, col })
                    .left(2)
                    .look_right()
                    .into(),
            );
            tokens.push(res());
            tokens.push(kw(K::ElementEnd).right(2).into());
        }
        tokens.push(kw(K::RowEnd).into());
    }
    tokens.push(right.into());
    tokens.push(closing(start).left(4).into());
    tokens
}

fn summation(start: K, sign: Glyph) -> Vec<Token> {
    vec![
        kw(start).right(4).into(),
        sign.into(),
        kw(K::FromStart).into(),
        kw(K::SumVarStart).left(4).select_whole().into(),
        res(),
        kw(K::SumVarEnd).right(3).into(),
        Glyph::text("=", "__equalsign__").into(),
        kw(K::SumFromValStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::SumFromValEnd).right(3).into(),
        kw(K::FromEnd).into(),
        kw(K::SumToStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::SumToEnd).right(2).into(),
        kw(K::SumBodyStart).left(2).select_whole().look_right().into(),
        res(),
        kw(K::SumBodyEnd).right(3).into(),
        Glyph::shaped(GlyphShape::Space).into(),
        closing(start).left(3).into(),
    ]
}

fn range_summation(start: K, sign: Glyph) -> Vec<Token> {
    vec![
        kw(start).right(3).into(),
        sign.with_clicks(1, 2).into(),
        kw(K::FromStart).left(3).look_right().into(),
        res(),
        kw(K::FromEnd).right(2).into(),
        kw(K::BodyStart).left(2).look_right().into(),
        res(),
        kw(K::BodyEnd).right(2).into(),
        closing(start).left(2).into(),
    ]
}

fn integral() -> Vec<Token> {
    vec![
        kw(K::IntegralStart).right(4).into(),
        Glyph::shaped(GlyphShape::IntegralTop).into(),
        Glyph::shaped(GlyphShape::IntegralBottom).into(),
        kw(K::IntFromStart).left(4).select_whole().into(),
        res(),
        kw(K::IntFromEnd).right(2).into(),
        kw(K::IntToStart).left(2).select_whole().into(),
        res(),
        kw(K::IntToEnd).right(2).into(),
        kw(K::IntBodyStart).left(2).select_whole().into(),
        res(),
        kw(K::IntBodyEnd).right(3).into(),
        calculus_dee().with_clicks(1, 2).into(),
        kw(K::IntVarStart).left(3).select_whole().into(),
        res(),
        kw(K::IntVarEnd).right(3).into(),
        Glyph::shaped(GlyphShape::Space).into(),
        kw(K::IntegralEnd).left(3).into(),
    ]
}

fn indefinite_integral() -> Vec<Token> {
    vec![
        kw(K::IndefIntegralStart).right(4).into(),
        Glyph::shaped(GlyphShape::IntegralTop).into(),
        Glyph::shaped(GlyphShape::IntegralBottom).into(),
        kw(K::IntBodyStart).left(4).select_whole().into(),
        res(),
        kw(K::IntBodyEnd).right(3).into(),
        calculus_dee().with_clicks(1, 2).into(),
        kw(K::IntVarStart).left(3).select_whole().into(),
        res(),
        kw(K::IntVarEnd).right(3).into(),
        Glyph::shaped(GlyphShape::Space).into(),
        kw(K::IndefIntegralEnd).left(3).into(),
    ]
}

fn calculus_dee() -> Glyph {
    Glyph::text("d", "__calculusdee__").upright()
}

fn derivative() -> Vec<Token> {
    vec![
        kw(K::DivideStart).right(4).into(),
        kw(K::NumStart).look_right().into(),
        calculus_dee().with_clicks(2, 2).into(),
        kw(K::DeeStart).left(4).into(),
        res(),
        kw(K::DeeEnd).right(6).into(),
        kw(K::NumEnd).into(),
        Glyph::shaped(GlyphShape::DivideLine).into(),
        kw(K::DenomStart).look_right().into(),
        calculus_dee().with_clicks(2, 2).into(),
        kw(K::DeeStart).left(6).into(),
        res(),
        kw(K::DeeEnd).right(3).into(),
        kw(K::DenomEnd).into(),
        kw(K::DivideEnd).left(3).into(),
    ]
}

fn limit(side: LimitSide) -> Vec<Token> {
    let sign = match side {
        LimitSide::Plus => "+",
        LimitSide::Minus => "-",
    };
    vec![
        kw(K::LimitStart).right(5).into(),
        Glyph::text("lim", "__limit__").upright().with_clicks(1, 4).into(),
        Glyph::text("\u{2192}", "__limitarrow__").with_clicks(3, 3).into(),
        Glyph::text(sign, sign).with_clicks(4, 3).into(),
        kw(K::BodyStart).left(5).look_right().into(),
        res(),
        kw(K::BodyEnd).right(2).into(),
        kw(K::BodyStart).left(2).look_right().into(),
        res(),
        kw(K::BodyEnd).right(3).into(),
        Glyph::shaped(GlyphShape::Space).into(),
        kw(K::LimitEnd).left(3).into(),
    ]
}

fn substitution() -> Vec<Token> {
    vec![
        kw(K::SubstitutionStart).right(3).into(),
        Glyph::shaped(GlyphShape::LeftBracket).into(),
        kw(K::BodyStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::BodyEnd).right(3).select_whole().into(),
        Glyph::shaped(GlyphShape::RightBracket).into(),
        kw(K::BodyStart).left(3).select_whole().look_right().into(),
        res(),
        kw(K::BodyEnd).right(2).select_whole().into(),
        kw(K::SubstitutionEnd).left(2).into(),
    ]
}

/// One empty program line.
pub fn program_line() -> Vec<Token> {
    vec![
        kw(K::LineStart).look_right().into(),
        res(),
        kw(K::LineEnd).right(3).into(),
    ]
}

fn program() -> Vec<Token> {
    let mut tokens = vec![
        kw(K::ProgramStart).right(4).into(),
        Glyph::shaped(GlyphShape::ProgramLine).into(),
        kw(K::ProgramBodyStart).select_whole().into(),
    ];
    tokens.extend(program_line());
    tokens.extend(program_line());
    tokens.push(kw(K::ProgramBodyEnd).into());
    tokens.push(kw(K::ProgramEnd).left(3).into());
    tokens
}

/// The indentation glyph inserted by a leading space in a program line.
pub fn indent() -> Glyph {
    Glyph::shaped(GlyphShape::Indent)
}

fn word_glyph(tag: &str) -> Token {
    Glyph::text(tag, tag).upright().bold().into()
}

fn program_word(word: ProgramWord) -> Vec<Token> {
    match word {
        ProgramWord::For => vec![
            word_glyph(ProgramWord::For.tag()),
            res(),
            word_glyph(ProgramWord::In.tag()),
            res(),
        ],
        word if word.takes_operand() => vec![word_glyph(word.tag()), res()],
        word => vec![word_glyph(word.tag())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::is_balanced;

    #[test]
    fn template_sizes() {
        assert_eq!(Construct::Fraction.template().len(), 9);
        assert_eq!(Construct::Parenthesis.template().len(), 7);
        assert_eq!(Construct::SquareRoot.template().len(), 6);
        assert_eq!(Construct::NthRoot.template().len(), 9);
        assert_eq!(Construct::Norm.template().len(), 7);
        assert_eq!(Construct::Floor.template().len(), 7);
        assert_eq!(Construct::Average.template().len(), 6);
        assert_eq!(Construct::MatrixSum.template().len(), 6);
        assert_eq!(Construct::Sum.template().len(), 19);
        assert_eq!(Construct::RangeProduct.template().len(), 9);
        assert_eq!(Construct::Integral.template().len(), 18);
        assert_eq!(Construct::IndefiniteIntegral.template().len(), 12);
        assert_eq!(Construct::Derivative.template().len(), 15);
        assert_eq!(Construct::Substitution.template().len(), 10);
        assert_eq!(Construct::Program.template().len(), 11);
    }

    #[test]
    fn grid_size_formula() {
        for (rows, cols) in [(1, 1), (2, 3), (4, 2)] {
            let tokens = Construct::Matrix { rows, cols }.template();
            assert_eq!(tokens.len(), rows * cols * 3 + 4 + 2 * rows);
        }
    }

    #[test]
    fn every_template_is_balanced() {
        let all = [
            Construct::Fraction,
            Construct::Parenthesis,
            Construct::SquareRoot,
            Construct::NthRoot,
            Construct::Absolute,
            Construct::Determinant,
            Construct::Norm,
            Construct::Floor,
            Construct::Ceil,
            Construct::Average,
            Construct::Vectorize,
            Construct::MatrixSum,
            Construct::Power,
            Construct::Index,
            Construct::Subscript,
            Construct::Superscript,
            Construct::Transpose,
            Construct::Conjugate,
            Construct::Hermitian,
            Construct::DotProduct,
            Construct::Convolution,
            Construct::Matrix { rows: 2, cols: 2 },
            Construct::Array { rows: 1, cols: 3 },
            Construct::Sum,
            Construct::Product,
            Construct::RangeSum,
            Construct::RangeProduct,
            Construct::Integral,
            Construct::IndefiniteIntegral,
            Construct::Derivative,
            Construct::Limit(LimitSide::Minus),
            Construct::Substitution,
            Construct::Program,
        ];
        for construct in all {
            assert!(is_balanced(&construct.template()), "{construct:?}");
        }
    }
}
