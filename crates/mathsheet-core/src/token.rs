//! Token model.
//!
//! An equation is a flat `Vec<Token>`. Composite constructs (fractions, radicals, matrices,
//! sums...) are delimited by pairs of [`Keyword`] tokens; everything visible is a [`Glyph`].
//! Keywords reference their partner by index (filled in by [`crate::matcher`]), never by
//! pointer, so the vector can be cloned, serialized and diffed freely.

use mathsheet_lang::{RESERVED_TAG, symbol_for_tag};
use serde::{Deserialize, Serialize};

/// Closed set of structural markers.
///
/// Every opening kind has exactly one closing kind (see [`KeywordKind::closer`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum KeywordKind {
    DivideStart,
    DivideEnd,
    NumStart,
    NumEnd,
    DenomStart,
    DenomEnd,
    LeftParen,
    RightParen,
    BodyStart,
    BodyEnd,
    SquareRootStart,
    SquareRootEnd,
    RootBodyStart,
    RootBodyEnd,
    OrderNRootStart,
    OrderNRootEnd,
    OrderStart,
    OrderEnd,
    AbsoluteStart,
    AbsoluteEnd,
    DeterminantStart,
    DeterminantEnd,
    NormStart,
    NormEnd,
    FloorStart,
    FloorEnd,
    CeilStart,
    CeilEnd,
    AverageStart,
    AverageEnd,
    VectorizeStart,
    VectorizeEnd,
    MatrixSumStart,
    MatrixSumEnd,
    PowerStart,
    PowerEnd,
    IndexStart,
    IndexEnd,
    SubscriptStart,
    SubscriptEnd,
    SuperscriptStart,
    SuperscriptEnd,
    SubSupStart,
    SubSupEnd,
    TransposeStart,
    TransposeEnd,
    ConjugateStart,
    ConjugateEnd,
    HermitianStart,
    HermitianEnd,
    DotProductStart,
    DotProductEnd,
    ConvolveStart,
    ConvolveEnd,
    MatrixStart,
    MatrixEnd,
    ArrayStart,
    ArrayEnd,
    RowStart,
    RowEnd,
    ElementStart,
    ElementEnd,
    SumStart,
    SumEnd,
    ProductStart,
    ProductEnd,
    FromStart,
    FromEnd,
    SumVarStart,
    SumVarEnd,
    SumFromValStart,
    SumFromValEnd,
    SumToStart,
    SumToEnd,
    SumBodyStart,
    SumBodyEnd,
    RangeSumStart,
    RangeSumEnd,
    RangeProductStart,
    RangeProductEnd,
    IntegralStart,
    IntegralEnd,
    IndefIntegralStart,
    IndefIntegralEnd,
    IntFromStart,
    IntFromEnd,
    IntToStart,
    IntToEnd,
    IntBodyStart,
    IntBodyEnd,
    IntVarStart,
    IntVarEnd,
    DeeStart,
    DeeEnd,
    LimitStart,
    LimitEnd,
    SubstitutionStart,
    SubstitutionEnd,
    ProgramStart,
    ProgramEnd,
    ProgramBodyStart,
    ProgramBodyEnd,
    LineStart,
    LineEnd,
    Equals,
    EqualsEnd,
}

use KeywordKind as K;

/// `(opening, closing)` pairs.
const PAIRS: &[(KeywordKind, KeywordKind)] = &[
    (K::DivideStart, K::DivideEnd),
    (K::NumStart, K::NumEnd),
    (K::DenomStart, K::DenomEnd),
    (K::LeftParen, K::RightParen),
    (K::BodyStart, K::BodyEnd),
    (K::SquareRootStart, K::SquareRootEnd),
    (K::RootBodyStart, K::RootBodyEnd),
    (K::OrderNRootStart, K::OrderNRootEnd),
    (K::OrderStart, K::OrderEnd),
    (K::AbsoluteStart, K::AbsoluteEnd),
    (K::DeterminantStart, K::DeterminantEnd),
    (K::NormStart, K::NormEnd),
    (K::FloorStart, K::FloorEnd),
    (K::CeilStart, K::CeilEnd),
    (K::AverageStart, K::AverageEnd),
    (K::VectorizeStart, K::VectorizeEnd),
    (K::MatrixSumStart, K::MatrixSumEnd),
    (K::PowerStart, K::PowerEnd),
    (K::IndexStart, K::IndexEnd),
    (K::SubscriptStart, K::SubscriptEnd),
    (K::SuperscriptStart, K::SuperscriptEnd),
    (K::SubSupStart, K::SubSupEnd),
    (K::TransposeStart, K::TransposeEnd),
    (K::ConjugateStart, K::ConjugateEnd),
    (K::HermitianStart, K::HermitianEnd),
    (K::DotProductStart, K::DotProductEnd),
    (K::ConvolveStart, K::ConvolveEnd),
    (K::MatrixStart, K::MatrixEnd),
    (K::ArrayStart, K::ArrayEnd),
    (K::RowStart, K::RowEnd),
    (K::ElementStart, K::ElementEnd),
    (K::SumStart, K::SumEnd),
    (K::ProductStart, K::ProductEnd),
    (K::FromStart, K::FromEnd),
    (K::SumVarStart, K::SumVarEnd),
    (K::SumFromValStart, K::SumFromValEnd),
    (K::SumToStart, K::SumToEnd),
    (K::SumBodyStart, K::SumBodyEnd),
    (K::RangeSumStart, K::RangeSumEnd),
    (K::RangeProductStart, K::RangeProductEnd),
    (K::IntegralStart, K::IntegralEnd),
    (K::IndefIntegralStart, K::IndefIntegralEnd),
    (K::IntFromStart, K::IntFromEnd),
    (K::IntToStart, K::IntToEnd),
    (K::IntBodyStart, K::IntBodyEnd),
    (K::IntVarStart, K::IntVarEnd),
    (K::DeeStart, K::DeeEnd),
    (K::LimitStart, K::LimitEnd),
    (K::SubstitutionStart, K::SubstitutionEnd),
    (K::ProgramStart, K::ProgramEnd),
    (K::ProgramBodyStart, K::ProgramBodyEnd),
    (K::LineStart, K::LineEnd),
    (K::Equals, K::EqualsEnd),
];

/// What a keyword pair delimits, used by selection expansion and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Outermost pair of a construct (e.g. `DivideStart..DivideEnd`).
    Outer,
    /// Outermost pair whose interior is itself editable content (power, index, sub/superscript).
    OuterSlot,
    /// An editable child region (numerator, matrix element, program line...).
    Slot,
    /// A structural grouping of slots with no content of its own (matrix row, sum limits).
    Group,
}

/// How a construct binds to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// Self-contained.
    None,
    /// Applies to the operand on its left (power, transpose...).
    Postfix,
    /// Sits between two operands (convolution).
    Infix,
}

impl KeywordKind {
    /// The closing kind if this kind opens a pair.
    pub fn closer(self) -> Option<KeywordKind> {
        PAIRS.iter().find(|(open, _)| *open == self).map(|(_, c)| *c)
    }

    /// The opening kind if this kind closes a pair.
    pub fn opener(self) -> Option<KeywordKind> {
        PAIRS.iter().find(|(_, close)| *close == self).map(|(o, _)| *o)
    }

    /// Returns `true` for opening kinds.
    pub fn is_opening(self) -> bool {
        self.closer().is_some()
    }

    /// Role of the pair this kind belongs to.
    pub fn role(self) -> Role {
        let open = self.opener().unwrap_or(self);
        match open {
            K::PowerStart | K::IndexStart | K::SubscriptStart | K::SuperscriptStart => {
                Role::OuterSlot
            }
            K::NumStart
            | K::DenomStart
            | K::BodyStart
            | K::RootBodyStart
            | K::OrderStart
            | K::ElementStart
            | K::SumVarStart
            | K::SumFromValStart
            | K::SumToStart
            | K::SumBodyStart
            | K::IntFromStart
            | K::IntToStart
            | K::IntBodyStart
            | K::IntVarStart
            | K::DeeStart
            | K::LineStart => Role::Slot,
            K::RowStart | K::FromStart | K::ProgramBodyStart => Role::Group,
            _ => Role::Outer,
        }
    }

    /// Binding of the construct opened by this kind.
    pub fn attach(self) -> Attach {
        match self.opener().unwrap_or(self) {
            K::PowerStart
            | K::TransposeStart
            | K::ConjugateStart
            | K::HermitianStart
            | K::SubscriptStart
            | K::SuperscriptStart
            | K::IndexStart => Attach::Postfix,
            K::ConvolveStart | K::DotProductStart => Attach::Infix,
            _ => Attach::None,
        }
    }

    /// Closing kinds that end an operand, so a postfix construct may bind to them.
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            K::RightParen
                | K::MatrixEnd
                | K::ArrayEnd
                | K::IndexEnd
                | K::AbsoluteEnd
                | K::DeterminantEnd
                | K::NormEnd
                | K::FloorEnd
                | K::CeilEnd
                | K::SquareRootEnd
                | K::OrderNRootEnd
        )
    }
}

/// Drawing category of a glyph. Decorative shapes are stretched by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum GlyphShape {
    Text,
    Reserved,
    Space,
    Indent,
    DivideLine,
    Radical,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    VerticalBar,
    NormBar,
    LeftFloor,
    RightFloor,
    LeftCeil,
    RightCeil,
    BigOperator,
    IntegralTop,
    IntegralBottom,
    OverBar,
    Arrow,
    ProgramLine,
}

impl GlyphShape {
    /// Default `(click_left, click_right)` offsets for the shape.
    fn default_clicks(self) -> (isize, isize) {
        match self {
            GlyphShape::Text
            | GlyphShape::Reserved
            | GlyphShape::Space
            | GlyphShape::Indent => (0, 1),
            GlyphShape::BigOperator | GlyphShape::IntegralTop => (1, 3),
            GlyphShape::IntegralBottom => (2, 2),
            GlyphShape::OverBar | GlyphShape::Arrow => (1, 2),
            GlyphShape::ProgramLine => (1, 3),
            _ => (1, 2),
        }
    }

    /// Tag carried by glyphs of this shape when they are not plain text.
    pub fn tag(self) -> &'static str {
        match self {
            GlyphShape::Text => "",
            GlyphShape::Reserved => RESERVED_TAG,
            GlyphShape::Space => "__space__",
            GlyphShape::Indent => mathsheet_lang::INDENT,
            GlyphShape::DivideLine => "__divideline__",
            GlyphShape::Radical => "__squareroot__",
            GlyphShape::LeftParen => "__leftparenthesis__",
            GlyphShape::RightParen => "__rightparenthesis__",
            GlyphShape::LeftBracket => "__leftsquarebracket__",
            GlyphShape::RightBracket => "__rightsquarebracket__",
            GlyphShape::VerticalBar => "__verticalline__",
            GlyphShape::NormBar => "__norm__",
            GlyphShape::LeftFloor => "__floorleft__",
            GlyphShape::RightFloor => "__floorright__",
            GlyphShape::LeftCeil => "__ceilleft__",
            GlyphShape::RightCeil => "__ceilright__",
            GlyphShape::BigOperator => "__summation__",
            GlyphShape::IntegralTop => "__integral_top__",
            GlyphShape::IntegralBottom => "__integral_bottom__",
            GlyphShape::OverBar => "__overline__",
            GlyphShape::Arrow => "__arrow__",
            GlyphShape::ProgramLine => "__programline__",
        }
    }

    /// Text drawn for the shape when it has a fixed appearance.
    fn default_display(self) -> &'static str {
        match self {
            GlyphShape::Reserved => "\u{25a1}",
            GlyphShape::Space => " ",
            GlyphShape::Indent => mathsheet_lang::INDENT,
            GlyphShape::Radical => "\u{221a}",
            GlyphShape::LeftParen => "(",
            GlyphShape::RightParen => ")",
            GlyphShape::LeftBracket => "[",
            GlyphShape::RightBracket => "]",
            GlyphShape::VerticalBar => "|",
            GlyphShape::NormBar => "\u{2016}",
            GlyphShape::LeftFloor => "\u{230a}",
            GlyphShape::RightFloor => "\u{230b}",
            GlyphShape::LeftCeil => "\u{2308}",
            GlyphShape::RightCeil => "\u{2309}",
            GlyphShape::BigOperator => "\u{2211}",
            GlyphShape::IntegralTop => "\u{2320}",
            GlyphShape::IntegralBottom => "\u{2321}",
            _ => "",
        }
    }
}

/// Style flags of a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlyphStyle {
    /// Italic (labels).
    pub italic: bool,
    /// Bold (the `==` comparison sign).
    pub bold: bool,
    /// Underlined.
    pub underline: bool,
}

/// Position and extents written by the layout engine. `top` is negative above the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Left edge.
    pub x: f64,
    /// Baseline.
    pub y: f64,
    /// Advance width.
    pub width: f64,
    /// Extent above the baseline (negative).
    pub top: f64,
    /// Extent below the baseline (positive).
    pub bottom: f64,
    /// Font size the glyph was laid out at.
    pub font_size: f64,
}

/// A visible element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    /// Text drawn on screen.
    pub display: String,
    /// Semantic tag read by the compiler.
    pub tag: String,
    /// Drawing category.
    pub shape: GlyphShape,
    /// Style flags.
    pub style: GlyphStyle,
    /// Layout output.
    pub metrics: Metrics,
    /// Arrow-left step when the cursor sits right of this glyph.
    pub cursor_left: usize,
    /// Arrow-right step when the cursor sits left of this glyph.
    pub cursor_right: usize,
    /// Index offset subtracted when the left half is clicked.
    pub click_left: isize,
    /// Index offset added when the right half is clicked.
    pub click_right: isize,
}

impl Glyph {
    /// A text glyph with separate display and tag.
    pub fn text(display: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::build(GlyphShape::Text, display.into(), tag.into())
    }

    /// A text glyph whose display equals its tag. Greek tags are mapped to their symbol and
    /// letters are italic.
    pub fn plain(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if let Some(symbol) = symbol_for_tag(&tag) {
            let mut glyph = Self::text(symbol.display, tag);
            glyph.style.italic = true;
            return glyph;
        }
        let italic = tag.chars().all(|c| c.is_alphabetic());
        let mut glyph = Self::text(tag.clone(), tag);
        glyph.style.italic = italic;
        glyph
    }

    /// A glyph with a fixed shape and its default display/tag.
    pub fn shaped(shape: GlyphShape) -> Self {
        Self::build(
            shape,
            shape.default_display().to_string(),
            shape.tag().to_string(),
        )
    }

    /// The `reserved-space` placeholder.
    pub fn reserved() -> Self {
        Self::shaped(GlyphShape::Reserved)
    }

    fn build(shape: GlyphShape, display: String, tag: String) -> Self {
        let (click_left, click_right) = shape.default_clicks();
        let (cursor_left, cursor_right) = match shape {
            GlyphShape::ProgramLine => (1, 2),
            _ => (1, 1),
        };
        Self {
            display,
            tag,
            shape,
            style: GlyphStyle::default(),
            metrics: Metrics::default(),
            cursor_left,
            cursor_right,
            click_left,
            click_right,
        }
    }

    /// Override the display text.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    /// Override the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Override the click offsets.
    pub fn with_clicks(mut self, left: isize, right: isize) -> Self {
        self.click_left = left;
        self.click_right = right;
        self
    }

    /// Override the arrow-key steps.
    pub fn with_steps(mut self, left: usize, right: usize) -> Self {
        self.cursor_left = left;
        self.cursor_right = right;
        self
    }

    /// Draw upright.
    pub fn upright(mut self) -> Self {
        self.style.italic = false;
        self
    }

    /// Draw bold.
    pub fn bold(mut self) -> Self {
        self.style.bold = true;
        self
    }

    /// Returns `true` for the placeholder glyph.
    pub fn is_reserved(&self) -> bool {
        self.shape == GlyphShape::Reserved
    }
}

/// Extra data carried by some keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Matrix/array dimensions on `MatrixStart`/`ArrayStart`.
    Grid {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
    /// Element coordinates on `ElementStart`.
    Cell {
        /// Zero-based row.
        row: usize,
        /// Zero-based column.
        col: usize,
    },
}

/// Caret position recorded on a keyword by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorAnchor {
    /// Caret x.
    pub x: f64,
    /// Caret baseline.
    pub y: f64,
    /// Caret height reference.
    pub font_size: f64,
}

/// An invisible structural marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    /// Marker kind.
    pub kind: KeywordKind,
    /// Optional payload (grid size, element coordinates).
    pub payload: Option<Payload>,
    /// Index of the partner keyword, set by [`crate::matcher::rebuild_matches`].
    #[serde(rename = "match")]
    pub partner: Option<usize>,
    /// Arrow-left step when the cursor sits right of this keyword.
    pub cursor_left: usize,
    /// Arrow-right step when the cursor sits left of this keyword.
    pub cursor_right: usize,
    /// When the caret sits between this keyword and the next, use the next keyword's anchor.
    pub look_right: bool,
    /// Selections touching this keyword snap to the enclosing construct.
    pub select_whole: bool,
    /// Program lines: the line is an assignment.
    pub line_is_assignment: bool,
    /// Caret anchor written by layout.
    #[serde(skip)]
    pub anchor: Option<CursorAnchor>,
}

impl Keyword {
    /// A keyword with unit steps and no flags.
    pub fn new(kind: KeywordKind) -> Self {
        Self {
            kind,
            payload: None,
            partner: None,
            cursor_left: 1,
            cursor_right: 1,
            look_right: false,
            select_whole: false,
            line_is_assignment: false,
            anchor: None,
        }
    }

    /// Set the arrow-left step.
    pub fn left(mut self, step: usize) -> Self {
        self.cursor_left = step;
        self
    }

    /// Set the arrow-right step.
    pub fn right(mut self, step: usize) -> Self {
        self.cursor_right = step;
        self
    }

    /// Set the `look_right` bias.
    pub fn look_right(mut self) -> Self {
        self.look_right = true;
        self
    }

    /// Set the `select_whole` flag.
    pub fn select_whole(mut self) -> Self {
        self.select_whole = true;
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Grid size if present.
    pub fn grid(&self) -> Option<(usize, usize)> {
        match self.payload {
            Some(Payload::Grid { rows, cols }) => Some((rows, cols)),
            _ => None,
        }
    }

    /// Element coordinates if present.
    pub fn cell(&self) -> Option<(usize, usize)> {
        match self.payload {
            Some(Payload::Cell { row, col }) => Some((row, col)),
            _ => None,
        }
    }
}

/// A document element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object_type", rename_all = "lowercase")]
pub enum Token {
    /// Visible glyph (`"character"` in saved documents).
    #[serde(rename = "character")]
    Glyph(Glyph),
    /// Structural keyword.
    Keyword(Keyword),
}

impl From<Glyph> for Token {
    fn from(glyph: Glyph) -> Self {
        Token::Glyph(glyph)
    }
}

impl From<Keyword> for Token {
    fn from(keyword: Keyword) -> Self {
        Token::Keyword(keyword)
    }
}

impl Token {
    /// Keyword view.
    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Token::Keyword(k) => Some(k),
            Token::Glyph(_) => None,
        }
    }

    /// Mutable keyword view.
    pub fn as_keyword_mut(&mut self) -> Option<&mut Keyword> {
        match self {
            Token::Keyword(k) => Some(k),
            Token::Glyph(_) => None,
        }
    }

    /// Glyph view.
    pub fn as_glyph(&self) -> Option<&Glyph> {
        match self {
            Token::Glyph(g) => Some(g),
            Token::Keyword(_) => None,
        }
    }

    /// Mutable glyph view.
    pub fn as_glyph_mut(&mut self) -> Option<&mut Glyph> {
        match self {
            Token::Glyph(g) => Some(g),
            Token::Keyword(_) => None,
        }
    }

    /// Keyword kind, if this is a keyword.
    pub fn kind(&self) -> Option<KeywordKind> {
        self.as_keyword().map(|k| k.kind)
    }

    /// Returns `true` if this is a keyword of `kind`.
    pub fn is(&self, kind: KeywordKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Returns `true` if this is a keyword.
    pub fn is_keyword(&self) -> bool {
        matches!(self, Token::Keyword(_))
    }

    /// Returns `true` for the placeholder glyph.
    pub fn is_reserved(&self) -> bool {
        self.as_glyph().is_some_and(Glyph::is_reserved)
    }

    /// Glyph tag, if this is a glyph.
    pub fn tag(&self) -> Option<&str> {
        self.as_glyph().map(|g| g.tag.as_str())
    }

    /// Partner index, if this is a matched keyword.
    pub fn partner(&self) -> Option<usize> {
        self.as_keyword().and_then(|k| k.partner)
    }

    /// Arrow-left step.
    pub fn cursor_left(&self) -> usize {
        match self {
            Token::Glyph(g) => g.cursor_left,
            Token::Keyword(k) => k.cursor_left,
        }
    }

    /// Arrow-right step.
    pub fn cursor_right(&self) -> usize {
        match self {
            Token::Glyph(g) => g.cursor_right,
            Token::Keyword(k) => k.cursor_right,
        }
    }

    /// Compare everything except layout output.
    pub fn same_structure(&self, other: &Token) -> bool {
        match (self, other) {
            (Token::Glyph(a), Token::Glyph(b)) => {
                a.display == b.display
                    && a.tag == b.tag
                    && a.shape == b.shape
                    && a.style == b.style
                    && a.cursor_left == b.cursor_left
                    && a.cursor_right == b.cursor_right
                    && a.click_left == b.click_left
                    && a.click_right == b.click_right
            }
            (Token::Keyword(a), Token::Keyword(b)) => {
                a.kind == b.kind
                    && a.payload == b.payload
                    && a.partner == b.partner
                    && a.cursor_left == b.cursor_left
                    && a.cursor_right == b.cursor_right
                    && a.look_right == b.look_right
                    && a.select_whole == b.select_whole
                    && a.line_is_assignment == b.line_is_assignment
            }
            _ => false,
        }
    }
}

/// Compare two token sequences ignoring layout output.
pub fn same_structure(a: &[Token], b: &[Token]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_structure(y))
}
