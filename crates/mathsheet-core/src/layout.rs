//! Layout Engine.
//!
//! A recursive positioning pass over a token range. Glyphs are placed left to right on a
//! shared baseline; an opening keyword dispatches to the handler registered for its kind in
//! [`handler_for`]. A handler lays out each child range at the origin, measures it, sizes
//! the construct's decorative glyphs to fit, then translates the children into place and
//! records caret anchors on the slot keywords.
//!
//! Coordinates: `x` grows to the right, `y` grows downwards, `top` is negative above the
//! baseline. Layout is idempotent: laying out the same tokens twice writes the same fields.

use crate::cursor::CaretRect;
use crate::document::Document;
use crate::token::{GlyphShape, GlyphStyle, KeywordKind as K, Token};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use unicode_width::UnicodeWidthStr;

/// Tunable layout constants. All lengths are in em (multiples of the current font size)
/// unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Top-level font size in points.
    pub font_size: f64,
    /// Scale applied to exponents, indices and limits.
    pub font_scale: f64,
    /// Smallest font size scaling may reach.
    pub min_font_size: f64,
    /// Height of the fraction bar above the baseline.
    pub divide_fudge: f64,
    /// Gap between matrix columns.
    pub matrix_col_space: f64,
    /// Gap between matrix rows.
    pub matrix_row_space: f64,
    /// Gap between a big operator and its limits, in em of the limit font.
    pub sum_limit_vertical: f64,
    /// Integral sign height relative to its body.
    pub integral_char: f64,
    /// Overlap of integral limits with the sign, in em of the limit font.
    pub int_limit_vertical: f64,
    /// Space after the integration variable, relative to a space glyph.
    pub space_after_int_var: f64,
    /// Space between integrand and `d`, relative to a space glyph.
    pub int_body_to_d: f64,
    /// Baseline advance between program lines relative to the line height.
    pub program_lines: f64,
    /// Gap between a body and its over-bar.
    pub bar_height: f64,
    /// Extra height of brackets beyond their content.
    pub paren_height: f64,
    /// Gap between `lim` and the approach row, in em of the limit font.
    pub limit_vertical: f64,
    /// Gap between the closing bracket of a substitution and its assignment.
    pub substitution_horizontal: f64,
    /// Extra height of floor/ceiling brackets beyond their content.
    pub ceil_height: f64,
    /// Width of a space glyph.
    pub space_width: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            font_scale: 0.8,
            min_font_size: 6.0,
            divide_fudge: 0.25,
            matrix_col_space: 0.8,
            matrix_row_space: 0.4,
            sum_limit_vertical: 0.3,
            integral_char: 1.3,
            int_limit_vertical: 0.5,
            space_after_int_var: 0.7,
            int_body_to_d: 0.6,
            program_lines: 0.85,
            bar_height: 0.3,
            paren_height: 0.2,
            limit_vertical: 0.6,
            substitution_horizontal: 0.5,
            ceil_height: 0.5,
            space_width: 0.3,
        }
    }
}

/// Extents of a measured string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphSize {
    /// Advance width.
    pub width: f64,
    /// Extent above the baseline (negative).
    pub top: f64,
    /// Extent below the baseline.
    pub bottom: f64,
}

/// Font metrics provider.
pub trait GlyphMeasurer: Send + Sync {
    /// Measure `text` drawn at `font_size`.
    fn measure(&self, text: &str, font_size: f64, style: GlyphStyle) -> GlyphSize;
}

/// Fixed-pitch metrics: every terminal column is 0.6 em wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasurer;

impl GlyphMeasurer for MonospaceMeasurer {
    fn measure(&self, text: &str, font_size: f64, _style: GlyphStyle) -> GlyphSize {
        let columns = UnicodeWidthStr::width(text).max(usize::from(!text.is_empty()));
        GlyphSize {
            width: columns as f64 * 0.6 * font_size,
            top: -0.75 * font_size,
            bottom: 0.25 * font_size,
        }
    }
}

/// Read-only inputs of a layout pass.
#[derive(Clone, Copy)]
pub struct LayoutContext<'a> {
    /// Constants.
    pub config: &'a LayoutConfig,
    /// Metrics.
    pub measurer: &'a dyn GlyphMeasurer,
}

/// Axis-aligned extents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub left: f64,
    /// Right edge.
    pub right: f64,
    /// Top edge.
    pub top: f64,
    /// Bottom edge.
    pub bottom: f64,
}

impl BoundingBox {
    /// Width.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    fn union(self, other: BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            right: self.right.max(other.right),
            top: self.top.min(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }

    fn translated(self, dx: f64, dy: f64) -> BoundingBox {
        BoundingBox {
            left: self.left + dx,
            right: self.right + dx,
            top: self.top + dy,
            bottom: self.bottom + dy,
        }
    }
}

/// Vertical extent of the item placed just before the current position. Postfix
/// constructs (powers) attach relative to it.
#[derive(Debug, Clone, Copy)]
struct Extent {
    top: f64,
    bottom: f64,
}

impl Extent {
    fn of_font(font: f64) -> Self {
        Self {
            top: -0.75 * font,
            bottom: 0.25 * font,
        }
    }
}

/// An opening keyword and its partner.
#[derive(Debug, Clone, Copy)]
struct Span {
    open: usize,
    close: usize,
}

type Handler = fn(&mut Pass<'_, '_>, Span, f64, f64, Extent) -> (f64, Extent);

/// Handler registered for an opening keyword kind. Kinds without a handler are laid out
/// inline (their interior continues on the current baseline).
fn handler_for(kind: K) -> Option<Handler> {
    Some(match kind {
        K::PowerStart
        | K::SuperscriptStart
        | K::TransposeStart
        | K::ConjugateStart
        | K::HermitianStart => layout_power,
        K::SubscriptStart => layout_subscript,
        K::IndexStart => layout_index,
        K::LeftParen | K::AbsoluteStart | K::DeterminantStart | K::NormStart => layout_bracketed,
        K::FloorStart | K::CeilStart => layout_floor_ceil,
        K::SquareRootStart => layout_sqrt,
        K::OrderNRootStart => layout_nth_root,
        K::DivideStart => layout_fraction,
        K::MatrixStart | K::ArrayStart => layout_grid,
        K::SumStart | K::ProductStart => layout_sum,
        K::MatrixSumStart => layout_matrix_sum,
        K::RangeSumStart | K::RangeProductStart => layout_range_sum,
        K::IntegralStart | K::IndefIntegralStart => layout_integral,
        K::AverageStart | K::VectorizeStart => layout_overbar,
        K::ProgramStart => layout_program,
        K::LimitStart => layout_limit,
        K::SubSupStart => layout_subsup,
        K::SubstitutionStart => layout_subst,
        _ => return None,
    })
}

/// Lay out `range` at the origin (baseline `y = 0`, first glyph at `x = 0`) and return the
/// box of its glyphs.
pub fn layout(
    tokens: &mut [Token],
    range: Range<usize>,
    font_size: f64,
    ctx: &LayoutContext<'_>,
) -> BoundingBox {
    let end = range.end.min(tokens.len());
    let mut pass = Pass {
        tokens,
        config: ctx.config,
        measurer: ctx.measurer,
    };
    pass.part(range.start, end, font_size)
}

/// Translate glyph metrics and caret anchors in `range`.
pub fn shift(tokens: &mut [Token], range: Range<usize>, dx: f64, dy: f64) {
    let end = range.end.min(tokens.len());
    for token in &mut tokens[range.start.min(end)..end] {
        match token {
            Token::Glyph(glyph) => {
                glyph.metrics.x += dx;
                glyph.metrics.y += dy;
            }
            Token::Keyword(keyword) => {
                if let Some(anchor) = keyword.anchor.as_mut() {
                    anchor.x += dx;
                    anchor.y += dy;
                }
            }
        }
    }
}

/// Box of the glyphs in `range`, in their current coordinates.
pub fn glyph_bounds(tokens: &[Token], range: Range<usize>) -> Option<BoundingBox> {
    let end = range.end.min(tokens.len());
    tokens[range.start.min(end)..end]
        .iter()
        .filter_map(Token::as_glyph)
        .map(|g| BoundingBox {
            left: g.metrics.x,
            right: g.metrics.x + g.metrics.width,
            top: g.metrics.y + g.metrics.top,
            bottom: g.metrics.y + g.metrics.bottom,
        })
        .reduce(BoundingBox::union)
}

struct Pass<'t, 'c> {
    tokens: &'t mut [Token],
    config: &'c LayoutConfig,
    measurer: &'c dyn GlyphMeasurer,
}

impl Pass<'_, '_> {
    fn part(&mut self, start: usize, end: usize, font: f64) -> BoundingBox {
        let mut px = 0.0;
        let mut prev = Extent::of_font(font);
        let mut i = start;

        while i < end {
            let keyword = self.tokens[i]
                .as_keyword()
                .map(|k| (k.kind, k.partner));
            match keyword {
                None => {
                    let (width, extent) = self.place_text(i, px, font);
                    px += width;
                    prev = extent;
                    i += 1;
                }
                Some((kind, Some(close))) if kind.is_opening() && close < end => {
                    match handler_for(kind) {
                        Some(handler) => {
                            let (next_px, extent) =
                                handler(self, Span { open: i, close }, px, font, prev);
                            self.anchor(i, px, 0.0, font);
                            self.anchor(close, next_px, 0.0, font);
                            px = next_px;
                            prev = extent;
                            i = close + 1;
                        }
                        None => {
                            self.anchor(i, px, 0.0, font);
                            i += 1;
                        }
                    }
                }
                Some(_) => {
                    self.anchor(i, px, 0.0, font);
                    i += 1;
                }
            }
        }

        glyph_bounds(self.tokens, start..end).unwrap_or(BoundingBox {
            left: 0.0,
            right: 0.0,
            top: -0.75 * font,
            bottom: 0.25 * font,
        })
    }

    fn small(&self, font: f64) -> f64 {
        (font * self.config.font_scale).max(self.config.min_font_size)
    }

    fn partner(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .and_then(Token::partner)
            .unwrap_or(index)
    }

    fn measure(&self, index: usize, font: f64) -> crate::layout::GlyphSize {
        match self.tokens[index].as_glyph() {
            Some(glyph) => self.measurer.measure(&glyph.display, font, glyph.style),
            None => GlyphSize {
                width: 0.0,
                top: 0.0,
                bottom: 0.0,
            },
        }
    }

    /// Place a glyph met in the main loop. Decorative shapes get their final size from
    /// the handler that owns them; here they only need a sane default.
    fn place_text(&mut self, index: usize, px: f64, font: f64) -> (f64, Extent) {
        let Some(shape) = self.tokens[index].as_glyph().map(|g| g.shape) else {
            return (0.0, Extent::of_font(font));
        };
        let size = match shape {
            GlyphShape::Reserved => GlyphSize {
                width: 0.7 * font,
                top: -0.75 * font,
                bottom: 0.1 * font,
            },
            GlyphShape::Space => GlyphSize {
                width: self.config.space_width * font,
                top: 0.0,
                bottom: 0.0,
            },
            _ => self.measure(index, font),
        };
        self.set_glyph(index, px, 0.0, size.width, size.top, size.bottom, font);
        (
            size.width,
            Extent {
                top: size.top,
                bottom: size.bottom,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn set_glyph(
        &mut self,
        index: usize,
        x: f64,
        y: f64,
        width: f64,
        top: f64,
        bottom: f64,
        font: f64,
    ) {
        if let Some(glyph) = self.tokens.get_mut(index).and_then(Token::as_glyph_mut) {
            glyph.metrics.x = x;
            glyph.metrics.y = y;
            glyph.metrics.width = width;
            glyph.metrics.top = top;
            glyph.metrics.bottom = bottom;
            glyph.metrics.font_size = font;
        }
    }

    fn anchor(&mut self, index: usize, x: f64, y: f64, font: f64) {
        if let Some(keyword) = self.tokens.get_mut(index).and_then(Token::as_keyword_mut) {
            keyword.anchor = Some(crate::token::CursorAnchor {
                x,
                y,
                font_size: font,
            });
        }
    }

    /// Lay out the interior of the slot opened at `open`.
    fn slot(&mut self, open: usize, font: f64) -> (usize, BoundingBox) {
        let close = self.partner(open);
        let bounds = self.part(open + 1, close, font);
        (close, bounds)
    }

    /// Move a laid-out slot into place and anchor its keywords.
    fn put(
        &mut self,
        open: usize,
        close: usize,
        bounds: BoundingBox,
        dx: f64,
        dy: f64,
        font: f64,
    ) -> BoundingBox {
        shift(self.tokens, open + 1..close, dx, dy);
        let placed = bounds.translated(dx, dy);
        self.anchor(open, placed.left, dy, font);
        self.anchor(close, placed.right, dy, font);
        placed
    }
}

fn layout_power(p: &mut Pass, span: Span, px: f64, font: f64, prev: Extent) -> (f64, Extent) {
    let small = p.small(font);
    let bounds = p.part(span.open + 1, span.close, small);
    let dy = prev.top + 0.5 * bounds.height() - bounds.bottom;
    shift(p.tokens, span.open + 1..span.close, px - bounds.left, dy);
    (
        px + bounds.width(),
        Extent {
            top: prev.top.min(bounds.top + dy),
            bottom: prev.bottom,
        },
    )
}

fn lowered(p: &mut Pass, span: Span, px: f64, font: f64, prev: Extent, gap: f64) -> (f64, Extent) {
    let small = p.small(font);
    let bounds = p.part(span.open + 1, span.close, small);
    let dy = 0.35 * font;
    shift(p.tokens, span.open + 1..span.close, px - bounds.left, dy);
    (
        px + bounds.width() + gap * small,
        Extent {
            top: prev.top,
            bottom: prev.bottom.max(bounds.bottom + dy),
        },
    )
}

fn layout_subscript(p: &mut Pass, span: Span, px: f64, font: f64, prev: Extent) -> (f64, Extent) {
    lowered(p, span, px, font, prev, 0.0)
}

fn layout_index(p: &mut Pass, span: Span, px: f64, font: f64, prev: Extent) -> (f64, Extent) {
    lowered(p, span, px, font, prev, 0.1)
}

/// `SubSupStart, IndexStart..IndexEnd, PowerStart..PowerEnd, SubSupEnd` (or a conjugate in
/// place of the power): the index and the power share one horizontal position.
fn layout_subsup(p: &mut Pass, span: Span, px: f64, font: f64, prev: Extent) -> (f64, Extent) {
    let index = Span {
        open: span.open + 1,
        close: p.partner(span.open + 1),
    };
    let power = Span {
        open: index.close + 1,
        close: p.partner(index.close + 1),
    };
    let (index_px, index_ext) = layout_index(p, index, px, font, prev);
    let (power_px, power_ext) = layout_power(p, power, px, font, prev);
    p.anchor(index.open, px, 0.0, font);
    p.anchor(index.close, index_px, 0.0, font);
    p.anchor(power.open, px, 0.0, font);
    p.anchor(power.close, power_px, 0.0, font);
    (
        index_px.max(power_px),
        Extent {
            top: power_ext.top,
            bottom: index_ext.bottom,
        },
    )
}

/// `Start, left, BodyStart..BodyEnd, right, End`.
fn bracketed(p: &mut Pass, span: Span, px: f64, font: f64, extra: f64) -> (f64, Extent) {
    let (body_end, bounds) = p.slot(span.open + 2, font);
    let extra = extra * font;
    let top = (bounds.top - extra).min(-0.8 * font);
    let bottom = (bounds.bottom + extra).max(0.3 * font);
    let width = 0.4 * font;

    p.set_glyph(span.open + 1, px, 0.0, width, top, bottom, font);
    let body = p.put(span.open + 2, body_end, bounds, px + width - bounds.left, 0.0, font);
    p.set_glyph(body_end + 1, body.right, 0.0, width, top, bottom, font);
    (body.right + width, Extent { top, bottom })
}

fn layout_bracketed(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let extra = p.config.paren_height;
    bracketed(p, span, px, font, extra)
}

fn layout_floor_ceil(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let extra = p.config.ceil_height * p.config.paren_height;
    bracketed(p, span, px, font, extra)
}

fn layout_sqrt(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let (body_end, bounds) = p.slot(span.open + 2, font);
    let top = bounds.top - 0.2 * font;
    let bottom = bounds.bottom + 0.1 * font;
    let width = 0.3 * font + 0.25 * (bottom - top);
    p.set_glyph(span.open + 1, px, 0.0, width, top, bottom, font);
    let body = p.put(
        span.open + 2,
        body_end,
        bounds,
        px + width + 0.1 * font - bounds.left,
        0.0,
        font,
    );
    (body.right + 0.2 * font, Extent { top, bottom })
}

/// `OrderNRootStart, OrderStart..OrderEnd, radical, RootBodyStart..RootBodyEnd, OrderNRootEnd`.
fn layout_nth_root(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let order_font = p.small(p.small(font));
    let (order_end, order) = p.slot(span.open + 1, order_font);
    let radical = order_end + 1;
    let (body_end, bounds) = p.slot(radical + 1, font);

    let top = bounds.top - 0.2 * font;
    let bottom = bounds.bottom + 0.1 * font;
    let width = 0.3 * font + 0.25 * (bottom - top);
    let rx = px + 0.7 * order.width();
    p.set_glyph(radical, rx, 0.0, width, top, bottom, font);

    let order_dy = top + 0.45 * (bottom - top) - order.bottom;
    p.put(span.open + 1, order_end, order, px - order.left, order_dy, order_font);
    let body = p.put(
        radical + 1,
        body_end,
        bounds,
        rx + width + 0.1 * font - bounds.left,
        0.0,
        font,
    );
    (
        body.right + 0.2 * font,
        Extent {
            top: top.min(order.top + order_dy),
            bottom,
        },
    )
}

/// `DivideStart, NumStart..NumEnd, line, DenomStart..DenomEnd, DivideEnd`.
fn layout_fraction(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let (num_end, num) = p.slot(span.open + 1, font);
    let line = num_end + 1;
    let (den_end, den) = p.slot(line + 1, font);

    let pad = 0.1 * font;
    let length = num.width().max(den.width()) + 0.2 * font;
    let axis = -p.config.divide_fudge * font;
    p.set_glyph(line, px + pad, 0.0, length, axis - 0.03 * font, axis + 0.03 * font, font);

    let num_dy = axis - 0.1 * font - num.bottom;
    let num = p.put(
        span.open + 1,
        num_end,
        num,
        px + pad + (length - num.width()) / 2.0 - num.left,
        num_dy,
        font,
    );
    let den_dy = axis + 0.1 * font - den.top;
    let den = p.put(
        line + 1,
        den_end,
        den,
        px + pad + (length - den.width()) / 2.0 - den.left,
        den_dy,
        font,
    );
    (
        px + length + 2.0 * pad,
        Extent {
            top: num.top,
            bottom: den.bottom,
        },
    )
}

/// `Start, left, (RowStart, (ElementStart..ElementEnd)*, RowEnd)*, right, End`.
fn layout_grid(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    struct Cell {
        open: usize,
        close: usize,
        bounds: BoundingBox,
    }
    let mut rows: Vec<(usize, usize, Vec<Cell>)> = Vec::new();
    let mut k = span.open + 2;
    while k < span.close && p.tokens[k].is(K::RowStart) {
        let row_end = p.partner(k);
        let mut cells = Vec::new();
        let mut e = k + 1;
        while e < row_end {
            let (close, bounds) = p.slot(e, font);
            cells.push(Cell {
                open: e,
                close,
                bounds,
            });
            e = close + 1;
        }
        rows.push((k, row_end, cells));
        k = row_end + 1;
    }
    let right_glyph = k;

    let cols = rows.iter().map(|(_, _, c)| c.len()).max().unwrap_or(0);
    let mut col_width = vec![0.0f64; cols];
    for (_, _, cells) in &rows {
        for (c, cell) in cells.iter().enumerate() {
            col_width[c] = col_width[c].max(cell.bounds.width());
        }
    }
    let col_gap = p.config.matrix_col_space * font;
    let row_gap = p.config.matrix_row_space * font;
    let row_extent: Vec<(f64, f64)> = rows
        .iter()
        .map(|(_, _, cells)| {
            cells.iter().fold((-0.75 * font, 0.25 * font), |(t, b), cell| {
                (t.min(cell.bounds.top), b.max(cell.bounds.bottom))
            })
        })
        .collect();
    let height: f64 = row_extent.iter().map(|(t, b)| b - t).sum::<f64>()
        + row_gap * rows.len().saturating_sub(1) as f64;
    let total_width: f64 =
        col_width.iter().sum::<f64>() + col_gap * cols.saturating_sub(1) as f64;

    let axis = -p.config.divide_fudge * font;
    let grid_top = axis - height / 2.0;
    let bracket = 0.4 * font;
    let x0 = px + bracket + 0.15 * font;

    let mut y = grid_top;
    for ((row_start, row_end, cells), (top, bottom)) in rows.into_iter().zip(row_extent) {
        let baseline = y - top;
        let mut x = x0;
        for (c, cell) in cells.into_iter().enumerate() {
            let dx = x + (col_width[c] - cell.bounds.width()) / 2.0 - cell.bounds.left;
            p.put(cell.open, cell.close, cell.bounds, dx, baseline, font);
            x += col_width[c] + col_gap;
        }
        p.anchor(row_start, x0, baseline, font);
        p.anchor(row_end, x0 + total_width, baseline, font);
        y += bottom - top + row_gap;
    }

    let top = grid_top - 0.1 * font;
    let bottom = grid_top + height + 0.1 * font;
    p.set_glyph(span.open + 1, px, 0.0, bracket, top, bottom, font);
    let right_x = x0 + total_width + 0.15 * font;
    p.set_glyph(right_glyph, right_x, 0.0, bracket, top, bottom, font);
    (right_x + bracket, Extent { top, bottom })
}

/// Size a big-operator glyph (`∑`, `∏`) centred on the math axis.
fn big_sign(p: &mut Pass, index: usize, x: f64, font: f64, scale: f64) -> BoundingBox {
    let sign_font = font * scale;
    let size = p.measure(index, sign_font);
    let axis = -p.config.divide_fudge * font;
    let half = 0.45 * sign_font;
    p.set_glyph(index, x, 0.0, size.width, axis - half, axis + half, sign_font);
    BoundingBox {
        left: x,
        right: x + size.width,
        top: axis - half,
        bottom: axis + half,
    }
}

/// `Start, sign, FromStart..FromEnd, SumToStart..SumToEnd, SumBodyStart..SumBodyEnd, space, End`.
fn layout_sum(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let small = p.small(font);
    let from = span.open + 2;
    let (from_end, lower) = p.slot(from, small);
    let (to_end, upper) = p.slot(from_end + 1, small);
    let (body_end, body) = p.slot(to_end + 1, font);

    let sign_width = p.measure(span.open + 1, font * 1.8).width;
    let column = sign_width.max(lower.width()).max(upper.width());
    let sign = big_sign(p, span.open + 1, px + (column - sign_width) / 2.0, font, 1.8);

    let gap = p.config.sum_limit_vertical * small;
    let upper = p.put(
        from_end + 1,
        to_end,
        upper,
        px + (column - upper.width()) / 2.0 - upper.left,
        sign.top - gap - upper.bottom,
        small,
    );
    let lower = p.put(
        from,
        from_end,
        lower,
        px + (column - lower.width()) / 2.0 - lower.left,
        sign.bottom + gap - lower.top,
        small,
    );
    let body = p.put(
        to_end + 1,
        body_end,
        body,
        px + column + 0.2 * font - body.left,
        0.0,
        font,
    );
    let space = p.config.space_width * font;
    p.set_glyph(body_end + 1, body.right, 0.0, space, 0.0, 0.0, font);
    (
        body.right + space,
        Extent {
            top: upper.top.min(body.top),
            bottom: lower.bottom.max(body.bottom),
        },
    )
}

/// `MatrixSumStart, sign, BodyStart..BodyEnd, MatrixSumEnd`.
fn layout_matrix_sum(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let sign = big_sign(p, span.open + 1, px, font, 1.4);
    let (body_end, body) = p.slot(span.open + 2, font);
    let body = p.put(
        span.open + 2,
        body_end,
        body,
        sign.right + 0.1 * font - body.left,
        0.0,
        font,
    );
    (
        body.right,
        Extent {
            top: sign.top.min(body.top),
            bottom: sign.bottom.max(body.bottom),
        },
    )
}

/// `Start, sign, FromStart..FromEnd, BodyStart..BodyEnd, End`.
fn layout_range_sum(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let small = p.small(font);
    let (from_end, lower) = p.slot(span.open + 2, small);
    let (body_end, body) = p.slot(from_end + 1, font);

    let sign_width = p.measure(span.open + 1, font * 1.8).width;
    let column = sign_width.max(lower.width());
    let sign = big_sign(p, span.open + 1, px + (column - sign_width) / 2.0, font, 1.8);
    let gap = p.config.sum_limit_vertical * small;
    let lower = p.put(
        span.open + 2,
        from_end,
        lower,
        px + (column - lower.width()) / 2.0 - lower.left,
        sign.bottom + gap - lower.top,
        small,
    );
    let body = p.put(
        from_end + 1,
        body_end,
        body,
        px + column + 0.2 * font - body.left,
        0.0,
        font,
    );
    (
        body.right,
        Extent {
            top: sign.top.min(body.top),
            bottom: lower.bottom.max(body.bottom),
        },
    )
}

/// Definite: `Start, top, bottom, IntFrom.., IntTo.., IntBody.., d, IntVar.., space, End`.
/// Indefinite: the same without the limits.
fn layout_integral(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let small = p.small(font);
    let definite = p.tokens[span.open].is(K::IntegralStart);
    let mut k = span.open + 3;
    let mut limits = None;
    if definite {
        let (from_end, lower) = p.slot(k, small);
        let (to_end, upper) = p.slot(from_end + 1, small);
        limits = Some((k, from_end, lower, from_end + 1, to_end, upper));
        k = to_end + 1;
    }
    let body_open = k;
    let (body_end, body) = p.slot(body_open, font);
    let dee = body_end + 1;
    let (var_end, var) = p.slot(dee + 1, font);

    let axis = -p.config.divide_fudge * font;
    let height = body.height().max(font) * p.config.integral_char;
    let sign_top = axis - height / 2.0;
    let sign_bottom = axis + height / 2.0;
    let sign_width = 0.5 * font;
    p.set_glyph(span.open + 1, px, 0.0, sign_width, sign_top, axis, font);
    p.set_glyph(span.open + 2, px, 0.0, sign_width, axis, sign_bottom, font);

    let mut top = sign_top;
    let mut bottom = sign_bottom;
    let mut limit_width: f64 = 0.0;
    if let Some((from, from_end, lower, to, to_end, upper)) = limits {
        let overlap = p.config.int_limit_vertical * small;
        let x = px + sign_width;
        let upper_dy = sign_top + overlap - upper.bottom;
        let upper = p.put(to, to_end, upper, x - upper.left, upper_dy, small);
        let lower_dy = sign_bottom - overlap - lower.top;
        let lower = p.put(from, from_end, lower, x - lower.left, lower_dy, small);
        limit_width = upper.width().max(lower.width());
        top = top.min(upper.top);
        bottom = bottom.max(lower.bottom);
    }

    let space = p.config.space_width * font;
    let body = p.put(
        body_open,
        body_end,
        body,
        px + sign_width + limit_width + 0.15 * font - body.left,
        0.0,
        font,
    );
    let dee_x = body.right + p.config.int_body_to_d * space;
    let dee_size = p.measure(dee, font);
    p.set_glyph(dee, dee_x, 0.0, dee_size.width, dee_size.top, dee_size.bottom, font);
    let var = p.put(dee + 1, var_end, var, dee_x + dee_size.width - var.left, 0.0, font);
    let trailing = p.config.space_after_int_var * space;
    p.set_glyph(var_end + 1, var.right, 0.0, trailing, 0.0, 0.0, font);
    (
        var.right + trailing,
        Extent {
            top: top.min(body.top),
            bottom: bottom.max(body.bottom),
        },
    )
}

/// `Start, bar, BodyStart..BodyEnd, End`: over-bar (mean) or arrow (vectorize).
fn layout_overbar(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let (body_end, body) = p.slot(span.open + 2, font);
    let body = p.put(span.open + 2, body_end, body, px - body.left, 0.0, font);
    let arrow = p.tokens[span.open].is(K::VectorizeStart);
    let thickness = if arrow { 0.2 * font } else { 0.05 * font };
    let gap = 0.5 * p.config.bar_height * font;
    let bottom = body.top - gap;
    let top = bottom - thickness;
    p.set_glyph(span.open + 1, body.left, 0.0, body.width(), top, bottom, font);
    (
        body.right,
        Extent {
            top,
            bottom: body.bottom,
        },
    )
}

/// `ProgramStart, line, ProgramBodyStart, (LineStart..LineEnd)*, ProgramBodyEnd, ProgramEnd`.
fn layout_program(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let body_open = span.open + 2;
    let body_close = p.partner(body_open);
    let mut lines = Vec::new();
    let mut k = body_open + 1;
    while k < body_close && p.tokens[k].is(K::LineStart) {
        let (close, bounds) = p.slot(k, font);
        lines.push((k, close, bounds));
        k = close + 1;
    }

    let x0 = px + 0.5 * font;
    let mut baselines = Vec::with_capacity(lines.len());
    let mut baseline = 0.0;
    let mut previous_bottom: Option<f64> = None;
    for (_, _, bounds) in &lines {
        if let Some(prev_bottom) = previous_bottom {
            let advance = (prev_bottom - bounds.top).max(font) / p.config.program_lines;
            baseline += advance;
        }
        baselines.push(baseline);
        previous_bottom = Some(bounds.bottom);
    }
    let block_top = lines.first().map_or(-0.75 * font, |(_, _, b)| b.top);
    let block_bottom = lines
        .last()
        .zip(baselines.last())
        .map_or(0.25 * font, |((_, _, b), y)| b.bottom + y);
    let offset = -p.config.divide_fudge * font - (block_top + block_bottom) / 2.0;

    let mut widest: f64 = 0.0;
    for ((open, close, bounds), y) in lines.into_iter().zip(baselines) {
        let placed = p.put(open, close, bounds, x0 - bounds.left, y + offset, font);
        widest = widest.max(placed.width());
    }
    let top = block_top + offset;
    let bottom = block_bottom + offset;
    p.set_glyph(span.open + 1, px + 0.15 * font, 0.0, 0.08 * font, top, bottom, font);
    p.anchor(body_open, x0, offset, font);
    p.anchor(body_close, x0 + widest, offset, font);
    (x0 + widest + 0.2 * font, Extent { top, bottom })
}

/// `LimitStart, lim, arrow, sign, BodyStart..BodyEnd (variable), BodyStart..BodyEnd (value),
/// space, LimitEnd`.
fn layout_limit(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let small = p.small(font);
    let lim = span.open + 1;
    let arrow = span.open + 2;
    let sign = span.open + 3;
    let (var_end, var) = p.slot(span.open + 4, small);
    let (value_end, value) = p.slot(var_end + 1, small);

    let lim_size = p.measure(lim, font);
    let arrow_size = p.measure(arrow, small);
    let sign_font = p.small(small);
    let sign_size = p.measure(sign, sign_font);
    let row_width = var.width() + arrow_size.width + value.width() + sign_size.width;
    let column = lim_size.width.max(row_width);

    p.set_glyph(
        lim,
        px + (column - lim_size.width) / 2.0,
        0.0,
        lim_size.width,
        lim_size.top,
        lim_size.bottom,
        font,
    );
    let row_y = lim_size.bottom + p.config.limit_vertical * small * 0.5 - var.top.min(value.top);
    let mut x = px + (column - row_width) / 2.0;
    let placed_var = p.put(span.open + 4, var_end, var, x - var.left, row_y, small);
    x = placed_var.right;
    p.set_glyph(arrow, x, row_y, arrow_size.width, arrow_size.top, arrow_size.bottom, small);
    x += arrow_size.width;
    let placed_value = p.put(var_end + 1, value_end, value, x - value.left, row_y, small);
    x = placed_value.right;
    p.set_glyph(
        sign,
        x,
        row_y - 0.4 * small,
        sign_size.width,
        sign_size.top,
        sign_size.bottom,
        sign_font,
    );
    let end = px + column + 0.2 * font;
    p.set_glyph(value_end + 1, end, 0.0, 0.0, 0.0, 0.0, font);
    (
        end,
        Extent {
            top: lim_size.top,
            bottom: placed_var.bottom.max(placed_value.bottom),
        },
    )
}

/// `SubstitutionStart, [, BodyStart..BodyEnd, ], BodyStart..BodyEnd, SubstitutionEnd`:
/// bracketed body with the assignment list hung below the closing bracket.
fn layout_subst(p: &mut Pass, span: Span, px: f64, font: f64, _prev: Extent) -> (f64, Extent) {
    let extra = p.config.paren_height;
    let (after_bracket, extent) = bracketed(p, span, px, font, extra);
    let body_end = p.partner(span.open + 2);
    let assign_open = body_end + 2;
    let small = p.small(font);
    let (assign_end, assign) = p.slot(assign_open, small);
    let dx = after_bracket + 0.1 * p.config.substitution_horizontal * font - assign.left;
    let dy = extent.bottom - 0.5 * small - assign.top;
    let placed = p.put(assign_open, assign_end, assign, dx, dy, small);
    (
        placed.right,
        Extent {
            top: extent.top,
            bottom: extent.bottom.max(placed.bottom),
        },
    )
}

/// One visible glyph as the presentation layer draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRect {
    /// Token index.
    pub index: usize,
    /// Ink box in page coordinates.
    pub rect: BoundingBox,
    /// Baseline.
    pub baseline: f64,
    /// Text to draw.
    pub display: String,
    /// Drawing category; decorative shapes are stretched to `rect`.
    pub shape: GlyphShape,
    /// Style flags.
    pub style: GlyphStyle,
    /// Font size.
    pub font_size: f64,
    /// The glyph is inside the active selection.
    pub selected: bool,
}

/// Everything needed to paint an equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Glyphs in token order.
    pub glyphs: Vec<GlyphRect>,
    /// Caret, absent while a selection is shown.
    pub caret: Option<CaretRect>,
    /// Highlight rectangles, one per program line the selection touches.
    pub selection: Vec<BoundingBox>,
}

impl Document {
    /// Presentation output of the last layout pass.
    pub fn geometry(&self) -> Geometry {
        let selection = self.selection();
        let glyphs = self
            .tokens
            .iter()
            .enumerate()
            .filter_map(|(index, token)| token.as_glyph().map(|g| (index, g)))
            .map(|(index, g)| GlyphRect {
                index,
                rect: BoundingBox {
                    left: g.metrics.x,
                    right: g.metrics.x + g.metrics.width,
                    top: g.metrics.y + g.metrics.top,
                    bottom: g.metrics.y + g.metrics.bottom,
                },
                baseline: g.metrics.y,
                display: g.display.clone(),
                shape: g.shape,
                style: g.style,
                font_size: g.metrics.font_size,
                selected: selection.is_some_and(|s| s.contains(index)),
            })
            .collect();

        let mut rects = Vec::new();
        if let Some(selection) = selection {
            let mut start = selection.left;
            for k in selection.left..=selection.right {
                if self.tokens.get(k).is_some_and(|t| t.is(K::LineEnd)) {
                    rects.extend(glyph_bounds(&self.tokens, start..k + 1));
                    start = k + 1;
                }
            }
            if start <= selection.right {
                rects.extend(glyph_bounds(&self.tokens, start..selection.right + 1));
            }
        }

        Geometry {
            glyphs,
            caret: self.caret_rect(),
            selection: rects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::Construct;
    use crate::matcher::rebuild_matches;
    use crate::token::Glyph;

    fn laid_out(mut tokens: Vec<Token>) -> (Vec<Token>, BoundingBox) {
        rebuild_matches(&mut tokens).unwrap();
        let config = LayoutConfig::default();
        let ctx = LayoutContext {
            config: &config,
            measurer: &MonospaceMeasurer,
        };
        let len = tokens.len();
        let bounds = layout(&mut tokens, 0..len, 12.0, &ctx);
        (tokens, bounds)
    }

    #[test]
    fn glyphs_advance_left_to_right() {
        let (tokens, bounds) = laid_out(vec![
            Glyph::plain("a").into(),
            Glyph::plain("b").into(),
        ]);
        let a = tokens[0].as_glyph().unwrap();
        let b = tokens[1].as_glyph().unwrap();
        assert_eq!(a.metrics.x, 0.0);
        assert!((b.metrics.x - a.metrics.width).abs() < 1e-9);
        assert!((bounds.width() - 2.0 * 0.6 * 12.0).abs() < 1e-9);
    }

    #[test]
    fn fraction_puts_numerator_above_denominator() {
        let (tokens, _) = laid_out(Construct::Fraction.template());
        let num = tokens[2].as_glyph().unwrap();
        let den = tokens[6].as_glyph().unwrap();
        let line = tokens[4].as_glyph().unwrap();
        assert!(num.metrics.y + num.metrics.bottom <= line.metrics.y + line.metrics.top);
        assert!(den.metrics.y + den.metrics.top >= line.metrics.y + line.metrics.bottom);
    }

    #[test]
    fn exponent_is_smaller_and_raised() {
        let mut tokens = vec![Token::from(Glyph::plain("x"))];
        tokens.extend(Construct::Power.template());
        let (tokens, _) = laid_out(tokens);
        let base = tokens[0].as_glyph().unwrap();
        let exponent = tokens[2].as_glyph().unwrap();
        assert!(exponent.metrics.font_size < base.metrics.font_size);
        assert!(exponent.metrics.y < base.metrics.y);
        assert!(exponent.metrics.x >= base.metrics.x + base.metrics.width - 1e-9);
    }

    #[test]
    fn small_fonts_are_floored() {
        let mut tokens = vec![Token::from(Glyph::plain("x"))];
        let mut nested = Construct::Power.template();
        for _ in 0..6 {
            let inner = std::mem::take(&mut nested);
            nested = Construct::Power.template();
            nested.splice(1..2, inner);
            nested.insert(1, Glyph::plain("y").into());
        }
        tokens.extend(nested);
        let (tokens, _) = laid_out(tokens);
        for glyph in tokens.iter().filter_map(Token::as_glyph) {
            assert!(glyph.metrics.font_size >= 6.0);
        }
    }
}
