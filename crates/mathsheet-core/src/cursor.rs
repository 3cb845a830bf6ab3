//! Cursor & Navigation.
//!
//! The caret is an index into the token vector: `i` sits between token `i - 1` and token
//! `i`. Arrow steps are stored on the tokens themselves by the construct templates; the few
//! context-dependent cases (matrix elements, program lines, sub/superscript pairs) are
//! resolved through a small [`StepRule`] table.

use crate::document::{Caret, Document, Selection};
use crate::matcher::enclosing_pair;
use crate::token::{KeywordKind as K, KeywordKind, Role, Token};
use mathsheet_lang::is_word_tag;

/// How an arrow key steps over a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRule {
    /// Use the token's own `cursor_left` / `cursor_right`.
    Own,
    /// Matrix element boundary: skip the row keywords when the row ends or starts.
    Element,
    /// Program line boundary: skip into the neighbouring line.
    Line,
    /// Index/power seam inside a `SubSup` wrapper.
    SubSup,
}

/// Rule used when stepping right over a keyword of `kind`.
pub fn right_rule(kind: KeywordKind) -> StepRule {
    match kind {
        K::ElementEnd => StepRule::Element,
        K::LineEnd => StepRule::Line,
        K::SubSupStart | K::IndexEnd | K::PowerEnd => StepRule::SubSup,
        _ => StepRule::Own,
    }
}

/// Rule used when stepping left over a keyword of `kind`.
pub fn left_rule(kind: KeywordKind) -> StepRule {
    match kind {
        K::ElementStart => StepRule::Element,
        K::LineStart => StepRule::Line,
        K::SubSupEnd | K::IndexStart | K::PowerStart => StepRule::SubSup,
        _ => StepRule::Own,
    }
}

/// Shape of the caret.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaretShape {
    /// A vertical bar at `x`.
    Vertical,
    /// The caret sits inside a word; the word `[left, right]` is underlined.
    Underline {
        /// Left end of the underline.
        left: f64,
        /// Right end of the underline.
        right: f64,
    },
}

/// Caret geometry in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaretRect {
    /// Caret x.
    pub x: f64,
    /// Top of the caret.
    pub top: f64,
    /// Bottom of the caret (the underline is drawn here).
    pub bottom: f64,
    /// Bar or underline.
    pub shape: CaretShape,
}

fn kind_at(tokens: &[Token], index: usize) -> Option<KeywordKind> {
    tokens.get(index).and_then(Token::kind)
}

fn partner_at(tokens: &[Token], index: usize) -> Option<usize> {
    tokens.get(index).and_then(Token::partner)
}

/// Distance moved by one right-arrow press with the caret before token `index`.
pub fn step_right(tokens: &[Token], index: usize) -> usize {
    let Some(token) = tokens.get(index) else {
        return 0;
    };
    let own = token.cursor_right();
    let Some(kind) = token.kind() else {
        return own;
    };
    let next = kind_at(tokens, index + 1);
    match right_rule(kind) {
        StepRule::Own => own,
        StepRule::Element => {
            if next == Some(K::RowEnd) {
                4
            } else {
                2
            }
        }
        StepRule::Line => {
            if next == Some(K::ProgramBodyEnd) {
                own
            } else {
                2
            }
        }
        StepRule::SubSup => match (kind, next) {
            (K::SubSupStart, _) => 2,
            (K::IndexEnd, Some(K::PowerStart)) if in_subsup(tokens, index) => 2,
            (K::IndexEnd, Some(K::ConjugateStart)) if in_subsup(tokens, index) => 5,
            (K::PowerEnd, Some(K::SubSupEnd)) => 2,
            _ => own,
        },
    }
}

/// Distance moved by one left-arrow press with the caret after token `index - 1`.
pub fn step_left(tokens: &[Token], index: usize) -> usize {
    if index == 0 {
        return 0;
    }
    let token = &tokens[index - 1];
    let own = token.cursor_left();
    let Some(kind) = token.kind() else {
        return own;
    };
    let before = index.checked_sub(2).and_then(|k| kind_at(tokens, k));
    let step = match left_rule(kind) {
        StepRule::Own => own,
        StepRule::Element => {
            if before == Some(K::RowStart) {
                4
            } else {
                2
            }
        }
        StepRule::Line => {
            if before == Some(K::ProgramBodyStart) {
                4
            } else {
                2
            }
        }
        StepRule::SubSup => match (kind, before) {
            (K::SubSupEnd, Some(K::PowerEnd)) => 2,
            (K::SubSupEnd, Some(K::ConjugateEnd)) => 5,
            (K::PowerStart, Some(K::IndexEnd)) if in_subsup(tokens, index - 2) => 2,
            (K::IndexStart, Some(K::SubSupStart)) => 2,
            _ => own,
        },
    };
    step.min(index)
}

/// `index` is an `IndexEnd` whose index is the first half of a `SubSup` wrapper.
fn in_subsup(tokens: &[Token], index: usize) -> bool {
    partner_at(tokens, index)
        .and_then(|open| open.checked_sub(1))
        .is_some_and(|k| kind_at(tokens, k) == Some(K::SubSupStart))
}

impl Document {
    /// Move one step right.
    pub fn move_right(&mut self) {
        let target = match self.caret {
            Caret::Select(selection) => selection.right + 1,
            Caret::Insert(index) => index + step_right(&self.tokens, index),
        };
        self.set_cursor(target);
    }

    /// Move one step left.
    pub fn move_left(&mut self) {
        let target = match self.caret {
            Caret::Select(selection) => selection.left,
            Caret::Insert(index) => index - step_left(&self.tokens, index),
        };
        self.set_cursor(target);
    }

    /// Move to the end of the current run: the nearest keyword or `)` at or after the
    /// cursor, else the end of the document.
    pub fn move_end(&mut self) {
        let start = self.anchor_index();
        let target = (start..self.tokens.len())
            .find(|&k| is_run_end(&self.tokens[k]))
            .unwrap_or(self.tokens.len());
        self.set_cursor(target);
    }

    /// Move to the start of the current run: just after the nearest keyword or `(` before
    /// the cursor, else the start of the document.
    pub fn move_home(&mut self) {
        let start = self.anchor_index();
        let target = (0..start)
            .rev()
            .find(|&k| is_run_start(&self.tokens[k]))
            .map_or(0, |k| k + 1);
        self.set_cursor(target);
    }

    /// Move to the region above (numerator, upper limit, previous matrix row, previous
    /// program line, exponent).
    pub fn move_up(&mut self) {
        let index = self.anchor_index();
        let target = self.vertical_target(index, Direction::Up);
        self.set_cursor(target.unwrap_or(index));
    }

    /// Move to the region below.
    pub fn move_down(&mut self) {
        let index = self.anchor_index();
        let target = self.vertical_target(index, Direction::Down);
        self.set_cursor(target.unwrap_or(index));
    }

    /// Index of the innermost keyword of `kind` that opens before the cursor and closes at
    /// or after it.
    pub fn enclosing_keyword(&self, kind: KeywordKind) -> Option<usize> {
        enclosing_pair(&self.tokens, self.anchor_index(), |k| k == kind).map(|(open, _)| open)
    }

    fn vertical_target(&self, index: usize, direction: Direction) -> Option<usize> {
        let tokens = &self.tokens;
        let mut k = index.min(tokens.len());
        while k > 0 {
            k -= 1;
            let Some(keyword) = tokens[k].as_keyword() else {
                continue;
            };
            let Some(close) = keyword.partner else {
                continue;
            };
            if !keyword.kind.is_opening() || close < index {
                continue;
            }
            let target = match direction {
                Direction::Up => self.up_from(k),
                Direction::Down => self.down_from(k),
            };
            if target.is_some() {
                return target;
            }
        }
        None
    }

    fn up_from(&self, open: usize) -> Option<usize> {
        let tokens = &self.tokens;
        match kind_at(tokens, open)? {
            K::DenomStart => {
                // DenomStart is preceded by the divide line and NumEnd.
                let num_start = partner_at(tokens, open.checked_sub(2)?)?;
                if kind_at(tokens, open + 2) == Some(K::DeeStart) {
                    Some(num_start + 3)
                } else {
                    Some(num_start + 1)
                }
            }
            K::FromStart => {
                let from_end = partner_at(tokens, open)?;
                (kind_at(tokens, from_end + 1) == Some(K::SumToStart)).then_some(from_end + 2)
            }
            K::IntFromStart => Some(partner_at(tokens, open)? + 2),
            K::ElementStart => {
                let (row, col) = tokens[open].as_keyword()?.cell()?;
                self.element_position(open, row.checked_sub(1)?, col)
            }
            K::LineStart => {
                let previous = open.checked_sub(1)?;
                (kind_at(tokens, previous) == Some(K::LineEnd))
                    .then(|| partner_at(tokens, previous).map(|p| p + 1))
                    .flatten()
            }
            K::IndexStart if open > 0 && kind_at(tokens, open - 1) == Some(K::SubSupStart) => {
                let index_end = partner_at(tokens, open)?;
                Some(index_end + 2)
            }
            _ => None,
        }
    }

    fn down_from(&self, open: usize) -> Option<usize> {
        let tokens = &self.tokens;
        match kind_at(tokens, open)? {
            K::NumStart => {
                if kind_at(tokens, open + 2) == Some(K::DeeStart) {
                    Some(partner_at(tokens, open + 2)? + 6)
                } else {
                    Some(partner_at(tokens, open)? + 3)
                }
            }
            K::SumToStart => {
                let from_start = partner_at(tokens, open.checked_sub(1)?)?;
                Some(from_start + 2)
            }
            K::IntToStart => Some(partner_at(tokens, open.checked_sub(1)?)? + 1),
            K::ElementStart => {
                let (row, col) = tokens[open].as_keyword()?.cell()?;
                self.element_position(open, row + 1, col)
            }
            K::LineStart => {
                let line_end = partner_at(tokens, open)?;
                (kind_at(tokens, line_end + 1) == Some(K::LineStart)).then_some(line_end + 2)
            }
            K::PowerStart | K::ConjugateStart => {
                let index_end = open.checked_sub(1)?;
                if kind_at(tokens, index_end) == Some(K::IndexEnd) && in_subsup(tokens, index_end)
                {
                    Some(partner_at(tokens, index_end)? + 1)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Caret position at the start of element `(row, col)` of the grid containing the
    /// element opened at `element`.
    fn element_position(&self, element: usize, row: usize, col: usize) -> Option<usize> {
        let tokens = &self.tokens;
        let (grid_open, grid_close) = enclosing_pair(tokens, element, |k| {
            matches!(k, K::MatrixStart | K::ArrayStart)
        })?;
        (grid_open..grid_close)
            .find(|&k| {
                tokens[k].is(K::ElementStart)
                    && tokens[k].as_keyword().and_then(|kw| kw.cell()) == Some((row, col))
            })
            .map(|k| k + 1)
    }

    /// Caret index for a click at `x` on token `index`: the left half of a glyph maps to
    /// `index - click_left`, the right half to `index + click_right`.
    pub fn click_to_index(&self, index: usize, x: f64) -> usize {
        let Some(glyph) = self.tokens.get(index).and_then(Token::as_glyph) else {
            return index.min(self.tokens.len());
        };
        let target = if x - glyph.metrics.x < glyph.metrics.width / 2.0 {
            index as isize - glyph.click_left
        } else {
            index as isize + glyph.click_right
        };
        target.clamp(0, self.tokens.len() as isize) as usize
    }

    /// Token whose box contains the point; the smallest box wins.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_glyph().map(|g| (i, g)))
            .filter(|(_, g)| {
                let m = &g.metrics;
                x >= m.x && x <= m.x + m.width && y >= m.y + m.top && y <= m.y + m.bottom
            })
            .min_by(|(_, a), (_, b)| {
                let area = |m: &crate::token::Metrics| m.width * (m.bottom - m.top);
                area(&a.metrics).total_cmp(&area(&b.metrics))
            })
            .map(|(i, _)| i)
    }

    /// Place the caret from a mouse click in page coordinates.
    pub fn click(&mut self, x: f64, y: f64) {
        let target = match self.hit_test(x, y) {
            Some(index) => self.click_to_index(index, x),
            None if x < self.bounds.left => 0,
            None => self.editable_len(),
        };
        self.set_cursor(target);
    }

    /// Length of the document without a spliced result.
    pub(crate) fn editable_len(&self) -> usize {
        if self.flags.has_result
            && let Some(open) = self.tokens.last().and_then(Token::partner)
        {
            return open;
        }
        self.tokens.len()
    }

    /// Caret geometry, or `None` while a selection is active.
    pub fn caret_rect(&self) -> Option<CaretRect> {
        let index = self.cursor()?;
        let tokens = &self.tokens;
        let left = index.checked_sub(1).and_then(|k| tokens.get(k));
        let right = tokens.get(index);

        if left.is_some_and(is_word) {
            let (start, end) = word_run(tokens, index - 1);
            return Some(self.underline(start, end, glyph_right(tokens, index - 1)));
        }
        if right.is_some_and(is_word) {
            let (start, end) = word_run(tokens, index);
            return Some(self.underline(start, end, glyph_left(tokens, index)));
        }
        if let Some(glyph) = left.and_then(Token::as_glyph) {
            let m = &glyph.metrics;
            return Some(vertical(m.x + m.width, m.y, m.font_size));
        }
        if let Some(glyph) = right.and_then(Token::as_glyph) {
            let m = &glyph.metrics;
            return Some(vertical(m.x, m.y, m.font_size));
        }

        let anchor = match (left.and_then(Token::as_keyword), right.and_then(Token::as_keyword)) {
            (Some(l), Some(r)) if l.look_right => r.anchor.or(l.anchor),
            (Some(l), Some(r)) => l.anchor.or(r.anchor),
            (Some(l), None) => l.anchor,
            (None, Some(r)) => r.anchor,
            (None, None) => None,
        };
        Some(match anchor {
            Some(a) => vertical(a.x, a.y, a.font_size),
            None if index == 0 => vertical(self.bounds.left - 1.0, self.origin.1, self.font_size),
            None => vertical(self.bounds.right - 1.0, self.origin.1, self.font_size),
        })
    }

    fn underline(&self, start: usize, end: usize, x: f64) -> CaretRect {
        let first = self.tokens[start].as_glyph().map(|g| g.metrics);
        let last = self.tokens[end].as_glyph().map(|g| g.metrics);
        match (first, last) {
            (Some(first), Some(last)) => CaretRect {
                x,
                top: first.y + first.top,
                bottom: first.y + first.bottom,
                shape: CaretShape::Underline {
                    left: first.x,
                    right: last.x + last.width,
                },
            },
            _ => vertical(x, self.origin.1, self.font_size),
        }
    }

    /// Select the balanced span covering tokens `a..=b` (mouse drag).
    ///
    /// The span grows until every keyword inside it has its partner inside, and keywords
    /// flagged `select_whole` pull in their whole construct.
    pub fn select_range(&mut self, a: usize, b: usize) {
        let len = self.editable_len();
        if len == 0 {
            self.set_cursor(0);
            return;
        }
        let (left, right) = snap_selection(&self.tokens, a.min(len - 1), b.min(len - 1));
        self.caret = Caret::Select(Selection { left, right });
    }

    /// Select everything except a spliced result.
    pub fn select_all(&mut self) {
        let len = self.editable_len();
        if len == 0 {
            self.set_cursor(0);
        } else {
            self.caret = Caret::Select(Selection {
                left: 0,
                right: len - 1,
            });
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Grow `[a, b]` into a balanced span.
///
/// A span made of whole children of a construct (matrix rows or elements, the parts of a
/// sub/superscript pair) grows to the construct itself. Program lines are the exception:
/// they can be selected on their own.
pub fn snap_selection(tokens: &[Token], a: usize, b: usize) -> (usize, usize) {
    let (mut left, mut right) = (a.min(b), a.max(b));
    loop {
        let (old_left, old_right) = (left, right);
        for k in left..=right {
            let Some(keyword) = tokens[k].as_keyword() else {
                continue;
            };
            if let Some(partner) = keyword.partner {
                left = left.min(partner);
                right = right.max(partner);
            }
            if keyword.select_whole
                && let Some((open, close)) = enclosing_pair(tokens, k, |kind| {
                    matches!(kind.role(), Role::Outer | Role::OuterSlot)
                })
            {
                left = left.min(open);
                right = right.max(close);
            }
        }
        if (left, right) == (old_left, old_right)
            && let Some((open, close)) = construct_of_children(tokens, left)
        {
            left = open;
            right = close;
        }
        if (left, right) == (old_left, old_right) {
            return (left, right);
        }
    }
}

/// The construct around a balanced span starting at `left` when the span starts with one of
/// its structural children.
fn construct_of_children(tokens: &[Token], left: usize) -> Option<(usize, usize)> {
    let starts_child = tokens[left].as_keyword().is_some_and(|keyword| {
        keyword.kind.is_opening()
            && keyword.kind != K::LineStart
            && matches!(keyword.kind.role(), Role::Slot | Role::Group)
    });
    let parent = enclosing_pair(tokens, left, |_| true)?;
    if tokens[parent.0].is(K::SubSupStart) {
        return Some(parent);
    }
    if !starts_child {
        return None;
    }
    enclosing_pair(tokens, left, |kind| {
        matches!(kind.role(), Role::Outer | Role::OuterSlot)
    })
}

fn is_word(token: &Token) -> bool {
    token.tag().is_some_and(is_word_tag)
}

fn is_run_end(token: &Token) -> bool {
    token.is_keyword() || token.tag() == Some(")")
}

fn is_run_start(token: &Token) -> bool {
    token.is_keyword() || token.tag() == Some("(")
}

/// Contiguous word glyphs around `index`.
fn word_run(tokens: &[Token], index: usize) -> (usize, usize) {
    let mut start = index;
    while start > 0 && is_word(&tokens[start - 1]) {
        start -= 1;
    }
    let mut end = index;
    while end + 1 < tokens.len() && is_word(&tokens[end + 1]) {
        end += 1;
    }
    (start, end)
}

fn glyph_right(tokens: &[Token], index: usize) -> f64 {
    tokens[index]
        .as_glyph()
        .map_or(0.0, |g| g.metrics.x + g.metrics.width)
}

fn glyph_left(tokens: &[Token], index: usize) -> f64 {
    tokens[index].as_glyph().map_or(0.0, |g| g.metrics.x)
}

fn vertical(x: f64, baseline: f64, font: f64) -> CaretRect {
    CaretRect {
        x,
        top: baseline - 0.75 * font,
        bottom: baseline + 0.25 * font,
        shape: CaretShape::Vertical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::Construct;

    #[test]
    fn element_rule_skips_row_keywords() {
        let tokens = Construct::Matrix { rows: 2, cols: 2 }.template();
        // MatrixStart, [, RowStart, ElementStart, res, ElementEnd, ElementStart, ...
        assert_eq!(step_right(&tokens, 5), 2);
        assert_eq!(step_right(&tokens, 8), 4);
        assert_eq!(step_left(&tokens, 4), 4);
        assert_eq!(step_left(&tokens, 7), 2);
    }

    #[test]
    fn line_rule_stops_at_program_body_end() {
        let tokens = Construct::Program.template();
        // ..., LineStart(3), res, LineEnd(5), LineStart(6), res, LineEnd(8), ProgramBodyEnd
        assert_eq!(step_right(&tokens, 5), 2);
        assert_eq!(step_right(&tokens, 8), 3);
        assert_eq!(step_left(&tokens, 4), 4);
        assert_eq!(step_left(&tokens, 7), 2);
    }

    #[test]
    fn snapping_pulls_in_partners() {
        let mut tokens = Construct::Parenthesis.template();
        crate::matcher::rebuild_matches(&mut tokens).unwrap();
        assert_eq!(snap_selection(&tokens, 3, 4), (0, 6));
        assert_eq!(snap_selection(&tokens, 3, 3), (3, 3));
    }

    #[test]
    fn matrix_elements_snap_to_the_matrix() {
        let mut tokens = Construct::Matrix { rows: 2, cols: 2 }.template();
        crate::matcher::rebuild_matches(&mut tokens).unwrap();
        let end = tokens.len() - 1;
        // A placeholder inside one element stays a placeholder.
        assert_eq!(snap_selection(&tokens, 4, 4), (4, 4));
        // One whole element, two elements, or a whole row is the whole matrix.
        assert_eq!(snap_selection(&tokens, 3, 5), (0, end));
        assert_eq!(snap_selection(&tokens, 4, 7), (0, end));
        assert_eq!(snap_selection(&tokens, 2, 9), (0, end));
    }

    #[test]
    fn program_lines_stay_selectable() {
        let mut tokens = Construct::Program.template();
        crate::matcher::rebuild_matches(&mut tokens).unwrap();
        assert_eq!(snap_selection(&tokens, 3, 5), (3, 5));
    }
}
