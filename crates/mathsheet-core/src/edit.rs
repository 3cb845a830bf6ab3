//! Edit Operations.
//!
//! Every structural change goes through here (or through [`crate::result`]) and ends with
//! a commit step, which rebuilds partner indices, refreshes the equation flags and
//! re-lays out the document. Constructs are inserted and removed atomically: a template
//! never lands half-way, and removing one placeholder-only construct restores the tokens
//! that were there before it was inserted.

use crate::construct::{Construct, LimitSide, indent, program_line};
use crate::cursor::{snap_selection, step_right};
use crate::document::{Caret, Document, Selection};
use crate::error::CommandError;
use crate::matcher::{enclosing_pair, rebuild_matches};
use crate::token::{Attach, Glyph, GlyphShape, Keyword, KeywordKind as K, Role, Token};
use mathsheet_lang::{ProgramWord, is_decorative_tag, is_word_tag};
use unicode_segmentation::UnicodeSegmentation;

/// Operator tags that take an operand on both sides.
const BINARY_OPERATORS: &[&str] = &[
    "+", "-", "*", ";", "==", "<", ">", "<=", ">=", "!=", "&&", "||", "^^",
];

/// Pair kinds that are dropped together with their content when they become empty.
const DROP_WHEN_EMPTY: &[K] = &[
    K::HermitianEnd,
    K::ConjugateEnd,
    K::TransposeEnd,
    K::SubscriptEnd,
];

impl Document {
    /// Insert a construct at the cursor, or wrap the active selection into it.
    ///
    /// Returns `Ok(false)` when nothing changed.
    pub fn insert_construct(&mut self, construct: Construct) -> Result<bool, CommandError> {
        self.delete_result();
        match construct {
            Construct::Program => return self.insert_program(),
            Construct::Limit(side) => return self.insert_limit(side),
            Construct::Word(word) => return self.insert_word(word),
            _ => {}
        }

        if let Caret::Select(selection) = self.caret {
            if construct.wraps_selection() {
                return self.wrap_selection(construct, selection);
            }
            // Postfix and infix constructs take the selection as their left operand.
            self.caret = Caret::Insert(selection.right + 1);
        }

        let at = self.anchor_index();
        if self.pair_as_subsup(construct, at) {
            self.commit()?;
            tracing::debug!(?construct, at, "inserted construct into sub/superscript pair");
            return Ok(true);
        }

        let at = self.remove_placeholder_near(at);
        let mut tokens = construct.template();
        let base = construct.needs_base() && !has_operand(&self.tokens, at);
        if base {
            tokens.insert(0, Glyph::reserved().into());
        }
        let cursor = at + cursor_in_template(&tokens, usize::from(base));
        self.tokens.splice(at..at, tokens);
        self.caret = Caret::Insert(cursor);
        self.commit()?;
        tracing::debug!(?construct, at, cursor, "inserted construct");
        Ok(true)
    }

    fn wrap_selection(
        &mut self,
        construct: Construct,
        selection: Selection,
    ) -> Result<bool, CommandError> {
        let (left, right) = snap_selection(&self.tokens, selection.left, selection.right);
        if self.tokens[left].is(K::LineStart) {
            return Err(CommandError::NotAllowed("program lines cannot be wrapped"));
        }
        let at = left;
        let wrapped: Vec<Token> = self.tokens.drain(left..=right).collect();
        let wrapped_len = wrapped.len();
        let mut tokens = construct.template();
        let cursor = match tokens.iter().position(Token::is_reserved) {
            Some(slot) => {
                tokens.splice(slot..=slot, wrapped);
                let after = slot + wrapped_len;
                tokens[after..]
                    .iter()
                    .position(Token::is_reserved)
                    .map_or(tokens.len(), |k| after + k + 1)
            }
            None => {
                tokens.splice(0..0, wrapped);
                tokens.len()
            }
        };
        self.tokens.splice(at..at, tokens);
        self.caret = Caret::Insert(at + cursor);
        self.commit()?;
        tracing::debug!(?construct, at, wrapped = wrapped_len, "wrapped selection");
        Ok(true)
    }

    /// An index next to a power (or a power next to an index) is paired with it inside a
    /// `SubSup` wrapper so both are drawn at the same horizontal position.
    fn pair_as_subsup(&mut self, construct: Construct, at: usize) -> bool {
        let kind_at = |k: usize| self.tokens.get(k).and_then(Token::kind);
        match construct {
            Construct::Power | Construct::Conjugate => {
                let index_end = if at > 0 && kind_at(at - 1) == Some(K::IndexEnd) {
                    at - 1
                } else if kind_at(at) == Some(K::IndexStart) {
                    match self.tokens[at].partner() {
                        Some(end) => end,
                        None => return false,
                    }
                } else {
                    return false;
                };
                let Some(index_open) = self.tokens[index_end].partner() else {
                    return false;
                };
                if index_open > 0 && kind_at(index_open - 1) == Some(K::SubSupStart) {
                    return false;
                }
                let mut tokens = construct.template();
                tokens.push(Keyword::new(K::SubSupEnd).into());
                let inner = cursor_in_template(&tokens, 0);
                self.tokens.splice(index_end + 1..index_end + 1, tokens);
                self.tokens
                    .insert(index_open, Keyword::new(K::SubSupStart).into());
                self.caret = Caret::Insert(index_end + 2 + inner);
                true
            }
            Construct::Index => {
                let power_open = if at > 0
                    && matches!(kind_at(at - 1), Some(K::PowerEnd | K::ConjugateEnd))
                {
                    match self.tokens[at - 1].partner() {
                        Some(open) => open,
                        None => return false,
                    }
                } else if matches!(kind_at(at), Some(K::PowerStart | K::ConjugateStart)) {
                    at
                } else {
                    return false;
                };
                if power_open == 0 || kind_at(power_open - 1) == Some(K::IndexEnd) {
                    return false;
                }
                let Some(power_close) = self.tokens[power_open].partner() else {
                    return false;
                };
                self.tokens
                    .insert(power_close + 1, Keyword::new(K::SubSupEnd).into());
                let mut tokens: Vec<Token> = vec![Keyword::new(K::SubSupStart).into()];
                tokens.extend(Construct::Index.template());
                self.tokens.splice(power_open..power_open, tokens);
                self.caret = Caret::Insert(power_open + 3);
                true
            }
            _ => false,
        }
    }

    /// Remove a placeholder at the cursor (or just before it) and return the adjusted
    /// insertion index.
    fn remove_placeholder_near(&mut self, at: usize) -> usize {
        if self.tokens.get(at).is_some_and(Token::is_reserved) {
            self.tokens.remove(at);
            at
        } else if at > 0 && self.tokens[at - 1].is_reserved() {
            self.tokens.remove(at - 1);
            at - 1
        } else {
            at
        }
    }

    /// Program blocks only go into an empty equation or right after a trailing `:=`.
    fn insert_program(&mut self) -> Result<bool, CommandError> {
        self.clear_selection();
        let len = self.tokens.len();
        let at = self.anchor_index();
        let tag = |k: usize| self.tokens.get(k).and_then(Token::tag);
        let reserved = |k: usize| self.tokens.get(k).is_some_and(Token::is_reserved);

        let insert_at = if len == 0 {
            0
        } else if at + 1 == len && reserved(at) && at > 0 && tag(at - 1) == Some(":=") {
            self.tokens.remove(at);
            at
        } else if at == len && len >= 2 && reserved(len - 1) && tag(len - 2) == Some(":=") {
            self.tokens.remove(len - 1);
            len - 1
        } else if at == len && tag(len - 1) == Some(":=") {
            len
        } else {
            return Err(CommandError::NotAllowed(
                "a program block can only start an equation or follow a trailing `:=`",
            ));
        };

        let tokens = Construct::Program.template();
        let cursor = insert_at + cursor_in_template(&tokens, 0);
        self.tokens.splice(insert_at..insert_at, tokens);
        self.caret = Caret::Insert(cursor);
        self.commit()?;
        tracing::debug!(at = insert_at, "inserted program block");
        Ok(true)
    }

    /// Limits always go to the front of the equation; the existing content becomes the
    /// limit's operand.
    fn insert_limit(&mut self, side: LimitSide) -> Result<bool, CommandError> {
        self.clear_selection();
        let mut tokens = Construct::Limit(side).template();
        if self.tokens.is_empty() {
            tokens.push(Glyph::reserved().into());
        }
        let cursor = cursor_in_template(&tokens, 0);
        self.tokens.splice(0..0, tokens);
        self.caret = Caret::Insert(cursor);
        self.commit()?;
        tracing::debug!(?side, "inserted limit");
        Ok(true)
    }

    fn insert_word(&mut self, word: ProgramWord) -> Result<bool, CommandError> {
        self.clear_selection();
        if self.enclosing_keyword(K::LineStart).is_none() {
            return Err(CommandError::NotAllowed(
                "program words are only valid inside a program line",
            ));
        }
        let at = self.anchor_index();
        let at = self.remove_placeholder_near(at);
        let tokens = Construct::Word(word).template();
        let cursor = at + cursor_in_template(&tokens, 0);
        self.tokens.splice(at..at, tokens);
        self.caret = Caret::Insert(cursor);
        self.commit()?;
        tracing::debug!(word = word.word(), at, "inserted program word");
        Ok(true)
    }

    /// Add an empty program line below the current one.
    pub fn newline(&mut self) -> Result<bool, CommandError> {
        self.delete_result();
        self.clear_selection();
        let Some(line_start) = self.enclosing_keyword(K::LineStart) else {
            return Err(CommandError::NotAllowed("new lines are only valid inside a program"));
        };
        let Some(line_end) = self.tokens[line_start].partner() else {
            return Ok(false);
        };
        self.tokens.splice(line_end + 1..line_end + 1, program_line());
        self.caret = Caret::Insert(line_end + 3);
        self.commit()?;
        Ok(true)
    }

    /// Type a string, one glyph per grapheme cluster.
    pub fn insert_text(&mut self, text: &str) -> Result<bool, CommandError> {
        let mut changed = false;
        for grapheme in text.graphemes(true) {
            changed |= self.insert_char(grapheme)?;
        }
        Ok(changed)
    }

    /// Insert a symbol by tag (`__alpha__`, `__infinity__`...).
    pub fn insert_symbol(&mut self, tag: &str) -> Result<bool, CommandError> {
        self.begin_typing()?;
        let at = self.anchor_index();
        let at = self.remove_placeholder_near(at);
        self.tokens.insert(at, Glyph::plain(tag).into());
        self.caret = Caret::Insert(at + 1);
        self.commit()?;
        Ok(true)
    }

    /// Type one grapheme.
    pub fn insert_char(&mut self, ch: &str) -> Result<bool, CommandError> {
        match ch {
            "(" => return self.insert_construct(Construct::Parenthesis),
            "[" => return self.insert_construct(Construct::Index),
            "^" => return self.insert_construct(Construct::Power),
            "/" => return self.insert_construct(Construct::Fraction),
            ")" => return Ok(self.leave_parenthesis()),
            "\n" | "\r" => return self.newline(),
            _ => {}
        }

        let cleared = self.begin_typing()?;
        let at = self.anchor_index();
        let in_line = self.enclosing_keyword(K::LineStart).is_some();

        match ch {
            " " | "\t" => {
                let after_indent = at > 0
                    && (self.tokens[at - 1].is(K::LineStart)
                        || self.tokens[at - 1]
                            .as_glyph()
                            .is_some_and(|g| g.shape == GlyphShape::Indent));
                if !(in_line && after_indent) {
                    return Ok(cleared);
                }
                let at = self.remove_placeholder_after(at);
                self.tokens.insert(at, indent().into());
                self.caret = Caret::Insert(at + 1);
            }
            ":" => {
                if self.enclosing_keyword(K::IndexStart).is_some() {
                    return self.insert_plain(":");
                }
                if let Some(line_start) = self.enclosing_keyword(K::LineStart) {
                    if let Some(keyword) = self.tokens[line_start].as_keyword_mut() {
                        keyword.line_is_assignment = true;
                    }
                } else if self.flags.is_assignment {
                    return Ok(cleared);
                }
                let at = self.remove_placeholder_near(at);
                let mut tokens: Vec<Token> = Vec::new();
                let mut cursor = at + 2;
                if at == 0 && !in_line {
                    tokens.push(Glyph::reserved().into());
                    cursor = 1;
                }
                tokens.push(self.operator_glyph(":=").into());
                tokens.push(Glyph::reserved().into());
                self.tokens.splice(at..at, tokens);
                self.caret = Caret::Insert(cursor);
            }
            "=" | "==" => self.insert_operator("==")?,
            "'" => {
                let at = self.remove_placeholder_near(at);
                let tokens: Vec<Token> = vec![
                    Glyph::text("'", "'").into(),
                    Glyph::reserved().into(),
                    Glyph::text("'", "'").into(),
                ];
                self.tokens.splice(at..at, tokens);
                self.caret = Caret::Insert(at + 2);
            }
            "," => {
                let at = self.remove_placeholder_near(at);
                let comma = self.operator_glyph(",");
                self.tokens.insert(at, comma.into());
                self.tokens.insert(at + 1, Glyph::reserved().into());
                self.caret = Caret::Insert(at + 2);
            }
            "_" => {
                if at > 0 && self.tokens[at - 1].tag() == Some("_") {
                    return Ok(cleared);
                }
                return self.insert_plain("_");
            }
            op if BINARY_OPERATORS.contains(&op) => self.insert_operator(op)?,
            other => return self.insert_plain(other),
        }

        self.commit()?;
        tracing::debug!(ch, "typed");
        Ok(true)
    }

    /// Drop the result and the active selection before typing. When that removed
    /// anything, the removal is committed and `true` returned, so a grapheme rejected
    /// afterwards still reports the change.
    fn begin_typing(&mut self) -> Result<bool, CommandError> {
        let mut changed = self.delete_result();
        if let Caret::Select(selection) = self.caret {
            self.delete_selection(selection)?;
            changed = true;
        }
        if changed {
            self.commit()?;
        }
        Ok(changed)
    }

    fn insert_plain(&mut self, tag: &str) -> Result<bool, CommandError> {
        let at = self.anchor_index();
        let at = self.remove_placeholder_near(at);
        self.tokens.insert(at, Glyph::plain(tag).into());
        self.caret = Caret::Insert(at + 1);
        self.commit()?;
        Ok(true)
    }

    fn remove_placeholder_after(&mut self, at: usize) -> usize {
        if self.tokens.get(at).is_some_and(Token::is_reserved) {
            self.tokens.remove(at);
        }
        at
    }

    fn operator_glyph(&self, tag: &str) -> Glyph {
        let display = self
            .operators
            .display_for(tag)
            .unwrap_or_else(|| tag.to_string());
        let glyph = Glyph::text(display, tag);
        if tag == "==" { glyph.bold() } else { glyph }
    }

    /// Binary operators fill the missing sides with placeholders: `[res op res]` in an
    /// empty slot, `[res op]` before an operand, `[op res]` after one.
    fn insert_operator(&mut self, tag: &str) -> Result<(), CommandError> {
        let at = self.anchor_index();
        let left = has_operand(&self.tokens, at);
        let right = starts_operand(self.tokens.get(at));
        let op: Token = self.operator_glyph(tag).into();
        let res = || Token::from(Glyph::reserved());

        let (tokens, cursor) = match (left, right) {
            (true, true) => (vec![op], 1),
            (true, false) => (vec![op, res()], 2),
            (false, _) if tag == "-" => {
                if right {
                    (vec![op], 1)
                } else {
                    (vec![op, res()], 2)
                }
            }
            (false, true) => (vec![res(), op], 1),
            (false, false) => (vec![res(), op, res()], 1),
        };
        self.tokens.splice(at..at, tokens);
        self.caret = Caret::Insert(at + cursor);
        Ok(())
    }

    /// `)` steps out of the innermost parenthesis.
    fn leave_parenthesis(&mut self) -> bool {
        self.clear_selection();
        match enclosing_pair(&self.tokens, self.anchor_index(), |k| k == K::LeftParen) {
            Some((_, close)) => {
                self.set_cursor(close + 1);
                true
            }
            None => false,
        }
    }

    /// Delete backwards.
    ///
    /// Keywords are never deleted one at a time: backspacing over the end of a construct
    /// first selects it, and a second backspace removes the selection.
    pub fn backspace(&mut self) -> Result<bool, CommandError> {
        if self.flags.has_result && self.anchor_index() > self.editable_len() {
            let changed = self.delete_result();
            self.set_cursor(self.tokens.len());
            self.relayout();
            return Ok(changed);
        }
        self.delete_result();

        let index = match self.caret {
            Caret::Select(selection) => {
                self.delete_selection(selection)?;
                self.commit()?;
                return Ok(true);
            }
            Caret::Insert(0) => return Ok(false),
            Caret::Insert(index) => index,
        };

        let prev = index - 1;
        if let Some(keyword) = self.tokens[prev].as_keyword() {
            let kind = keyword.kind;
            let partner = keyword.partner.unwrap_or(prev);
            let (left, right) = if kind == K::LineStart {
                (prev, partner)
            } else if partner < prev && kind.role() != Role::Group {
                (partner, prev)
            } else {
                match enclosing_pair(&self.tokens, index, |k| {
                    matches!(k.role(), Role::Outer | Role::OuterSlot)
                }) {
                    Some(span) => span,
                    None => return Ok(false),
                }
            };
            self.caret = Caret::Select(Selection::new(left, right));
            tracing::debug!(left, right, "backspace selected construct");
            return Ok(true);
        }

        if self.tokens[prev].is_reserved()
            && let Some(owner) = self.placeholder_owner(prev)
        {
            if self.is_empty_construct(owner.open, owner.close) {
                self.remove_construct(owner)?;
            } else {
                self.caret = Caret::Select(Selection::new(owner.start, owner.end));
            }
            return Ok(true);
        }

        self.remove_glyph(prev)?;
        Ok(true)
    }

    fn remove_glyph(&mut self, index: usize) -> Result<(), CommandError> {
        self.tokens.remove(index);
        self.caret = Caret::Insert(index);
        self.rematch()?;

        // The removed glyph may have been the only content of a pair.
        let emptied = self
            .tokens
            .get(index)
            .and_then(Token::as_keyword)
            .filter(|k| k.partner.is_some_and(|p| p + 1 == index))
            .map(|k| k.kind);
        if let Some(kind) = emptied {
            if DROP_WHEN_EMPTY.contains(&kind) {
                self.tokens.drain(index - 1..=index);
                self.caret = Caret::Insert(index - 1);
            } else {
                self.tokens.insert(index, Glyph::reserved().into());
                self.caret = Caret::Insert(index + 1);
            }
        } else if needs_placeholder(&self.tokens, index) {
            self.tokens.insert(index, Glyph::reserved().into());
            self.caret = Caret::Insert(index + 1);
        }
        self.commit()
    }

    /// Remove the selected span and collapse the caret to its left edge.
    pub fn delete_selection(&mut self, selection: Selection) -> Result<(), CommandError> {
        let Selection { left, right } = selection;
        let mut right = right.min(self.tokens.len().saturating_sub(1));
        let mut left = left;
        // A whole slot loses its content, not its keywords.
        if let Some(keyword) = self.tokens.get(left).and_then(Token::as_keyword)
            && keyword.kind.is_opening()
            && keyword.kind.role() == Role::Slot
            && keyword.kind != K::LineStart
            && keyword.partner == Some(right)
        {
            left += 1;
            right -= 1;
        }
        if left > right {
            self.caret = Caret::Insert(left.min(self.tokens.len()));
            return Ok(());
        }
        self.tokens.drain(left..=right);
        self.caret = Caret::Insert(left);
        self.rematch()?;

        let kind_at = |tokens: &[Token], k: usize| tokens.get(k).and_then(Token::kind);
        let mut cursor = left;
        if left > 0
            && kind_at(&self.tokens, left - 1) == Some(K::ProgramBodyStart)
            && kind_at(&self.tokens, left) == Some(K::ProgramBodyEnd)
            && left >= 3
        {
            // The last line went away: drop the program shell.
            self.tokens.drain(left - 3..=left + 1);
            cursor = left - 3;
            self.rematch()?;
        } else if left > 0 && kind_at(&self.tokens, left - 1) == Some(K::LineEnd) {
            cursor = left - 1;
        } else if kind_at(&self.tokens, left) == Some(K::LineStart) {
            cursor = left + 1;
        }

        if needs_placeholder(&self.tokens, cursor) {
            self.tokens.insert(cursor, Glyph::reserved().into());
            cursor += 1;
        }
        self.caret = Caret::Insert(cursor);
        self.unwrap_lonely_subsup()?;
        tracing::debug!(left, right, "deleted selection");
        Ok(())
    }

    /// The construct a placeholder belongs to, including attached operand placeholders.
    fn placeholder_owner(&self, index: usize) -> Option<Owner> {
        let tokens = &self.tokens;
        let attach_of = |k: usize| tokens.get(k).and_then(Token::kind).map(|kind| kind.attach());

        // Base placeholder of a postfix or infix construct.
        if let Some(next) = tokens.get(index + 1).and_then(Token::as_keyword)
            && next.kind.is_opening()
            && next.kind.attach() != Attach::None
            && let Some(close) = next.partner
        {
            let end = if next.kind.attach() == Attach::Infix
                && tokens.get(close + 1).is_some_and(Token::is_reserved)
            {
                close + 1
            } else {
                close
            };
            return Some(Owner {
                start: index,
                open: index + 1,
                close,
                end,
            });
        }

        // Right operand of an infix construct.
        if index > 0
            && attach_of(index - 1) == Some(Attach::Infix)
            && let Some(open) = tokens[index - 1].partner()
            && open < index - 1
        {
            let start = if open > 0 && tokens[open - 1].is_reserved() {
                open - 1
            } else {
                open
            };
            return Some(Owner {
                start,
                open,
                close: index - 1,
                end: index,
            });
        }

        let (open, close) = enclosing_pair(tokens, index, |k| {
            matches!(k.role(), Role::Outer | Role::OuterSlot)
        })?;
        let attach = attach_of(open).unwrap_or(Attach::None);
        let start = if attach != Attach::None && open > 0 && tokens[open - 1].is_reserved() {
            open - 1
        } else {
            open
        };
        let operand_after = tokens.get(close + 1).is_some_and(Token::is_reserved);
        let end = if attach == Attach::Infix && operand_after {
            close + 1
        } else {
            close
        };
        Some(Owner {
            start,
            open,
            close,
            end,
        })
    }

    /// `true` when the construct holds nothing but placeholders and decoration.
    fn is_empty_construct(&self, open: usize, close: usize) -> bool {
        let interior_is_slot = self.tokens[open]
            .kind()
            .is_some_and(|k| k.role() == Role::OuterSlot);
        let mut depth = 0usize;
        for token in &self.tokens[open + 1..close] {
            match token {
                Token::Keyword(keyword) => {
                    if keyword.kind.is_opening() {
                        depth += 1;
                    } else {
                        depth = depth.saturating_sub(1);
                    }
                }
                Token::Glyph(glyph) => {
                    let decoration = glyph.is_reserved()
                        || !matches!(glyph.shape, GlyphShape::Text | GlyphShape::Indent)
                        || is_decorative_tag(&glyph.tag);
                    if decoration || (depth == 0 && !interior_is_slot) {
                        continue;
                    }
                    return false;
                }
            }
        }
        true
    }

    fn remove_construct(&mut self, owner: Owner) -> Result<(), CommandError> {
        self.tokens.drain(owner.start..=owner.end);
        let mut cursor = owner.start;
        self.rematch()?;
        if needs_placeholder(&self.tokens, cursor) {
            self.tokens.insert(cursor, Glyph::reserved().into());
            cursor += 1;
        }
        self.caret = Caret::Insert(cursor);
        self.unwrap_lonely_subsup()?;
        self.commit()?;
        tracing::debug!(start = owner.start, end = owner.end, "removed empty construct");
        Ok(())
    }

    /// A `SubSup` wrapper left with a single child is dissolved.
    fn unwrap_lonely_subsup(&mut self) -> Result<(), CommandError> {
        // Callers may have inserted a placeholder since the last rematch.
        self.rematch()?;
        let tokens = &self.tokens;
        let lonely = (0..tokens.len()).find(|&k| {
            let first_child_end = tokens.get(k + 1).and_then(Token::partner);
            tokens[k].is(K::SubSupStart)
                && tokens[k]
                    .partner()
                    .is_some_and(|close| first_child_end == Some(close - 1))
        });
        if let Some(open) = lonely
            && let Some(close) = self.tokens[open].partner()
        {
            self.tokens.remove(close);
            self.tokens.remove(open);
            if let Caret::Insert(index) = self.caret {
                let shifted = index - usize::from(index > open) - usize::from(index > close);
                self.caret = Caret::Insert(shifted);
            }
            self.rematch()?;
        }
        Ok(())
    }

    fn rematch(&mut self) -> Result<(), CommandError> {
        rebuild_matches(&mut self.tokens).map_err(|err| {
            tracing::error!(error = %err, "edit produced unbalanced structure");
            CommandError::Unbalanced(err)
        })
    }

    /// Step right over a keyword that closes the current slot, used by the facade when
    /// an evaluation request arrives with the caret inside a construct.
    pub fn step_out(&mut self) {
        if let Caret::Insert(index) = self.caret {
            let step = step_right(&self.tokens, index);
            self.set_cursor(index + step);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    start: usize,
    open: usize,
    close: usize,
    end: usize,
}

/// Index into a template where the caret lands: after the first placeholder following the
/// construct's opening keyword, else after the first placeholder, else after the template.
fn cursor_in_template(tokens: &[Token], opening: usize) -> usize {
    tokens
        .iter()
        .enumerate()
        .skip(opening + 1)
        .find(|(_, t)| t.is_reserved())
        .or_else(|| tokens.iter().enumerate().find(|(_, t)| t.is_reserved()))
        .map_or(tokens.len(), |(k, _)| k + 1)
}

/// Something an operator or postfix construct can apply to ends just before `at`.
fn has_operand(tokens: &[Token], at: usize) -> bool {
    let Some(prev) = at.checked_sub(1).and_then(|k| tokens.get(k)) else {
        return false;
    };
    match prev {
        Token::Glyph(glyph) => {
            is_word_tag(&glyph.tag) || glyph.tag == ")" || glyph.tag == "!" || glyph.tag == "'"
        }
        Token::Keyword(keyword) => {
            !keyword.kind.is_opening()
                && (keyword.kind.ends_operand()
                    || keyword.kind.attach() == Attach::Postfix
                    || matches!(
                        keyword.kind,
                        K::DivideEnd | K::SubSupEnd | K::SumEnd | K::ProductEnd
                    ))
        }
    }
}

/// `token` starts an operand.
fn starts_operand(token: Option<&Token>) -> bool {
    match token {
        Some(Token::Glyph(glyph)) => is_word_tag(&glyph.tag) || glyph.tag == "(",
        Some(Token::Keyword(keyword)) => {
            keyword.kind.is_opening() && keyword.kind.attach() == Attach::None
        }
        None => false,
    }
}

fn is_operator(token: &Token) -> bool {
    token.tag().is_some_and(|tag| {
        BINARY_OPERATORS.contains(&tag)
            || tag == ","
            || tag == ":="
            || tag == " in "
            || ProgramWord::from_tag(tag).is_some_and(ProgramWord::takes_operand)
    })
}

/// After a removal at `at`, a placeholder is needed when a pair became empty or an
/// operator lost its operand.
fn needs_placeholder(tokens: &[Token], at: usize) -> bool {
    let left = at.checked_sub(1).and_then(|k| tokens.get(k));
    let right = tokens.get(at);

    if let (Some(l), Some(r)) = (left.and_then(Token::as_keyword), right)
        && l.kind.is_opening()
        && l.partner == Some(at)
        && r.is_keyword()
    {
        return true;
    }
    if left.is_some_and(is_operator) && !starts_operand(right) {
        return true;
    }
    let at_slot_start = left.is_none_or(|l| l.as_keyword().is_some_and(|k| k.kind.is_opening()));
    at_slot_start && right.is_some_and(|r| is_operator(r) && r.tag() != Some("-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::same_structure;

    #[test]
    fn fraction_in_empty_document() {
        let mut doc = Document::new();
        assert!(doc.insert_construct(Construct::Fraction).unwrap());
        assert_eq!(doc.len(), 9);
        assert_eq!(doc.cursor(), Some(3));
        assert!(!doc.is_complete());
    }

    #[test]
    fn operator_patterns() {
        let mut doc = Document::new();
        doc.insert_char("+").unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.cursor(), Some(1));

        let mut doc = Document::new();
        doc.insert_text("a+").unwrap();
        assert_eq!(doc.len(), 3);
        assert!(doc.tokens()[2].is_reserved());
        assert_eq!(doc.cursor(), Some(3));
        doc.insert_char("b").unwrap();
        assert_eq!(doc.len(), 3);
        assert!(doc.is_complete());
    }

    #[test]
    fn power_without_operand_gets_a_base() {
        let mut doc = Document::new();
        doc.insert_construct(Construct::Power).unwrap();
        assert_eq!(doc.len(), 4);
        assert!(doc.tokens()[0].is_reserved());
        assert_eq!(doc.cursor(), Some(3));

        let mut doc = Document::new();
        doc.insert_char("x").unwrap();
        doc.insert_construct(Construct::Power).unwrap();
        assert_eq!(doc.len(), 4);
        assert!(!doc.tokens()[0].is_reserved());
    }

    #[test]
    fn insert_then_backspace_restores_previous_tokens() {
        for construct in [
            Construct::Fraction,
            Construct::SquareRoot,
            Construct::Power,
            Construct::Convolution,
            Construct::Sum,
            Construct::Matrix { rows: 2, cols: 2 },
        ] {
            let mut doc = Document::new();
            doc.insert_text("a+").unwrap();
            let before = doc.tokens().to_vec();
            let cursor = doc.cursor();
            doc.insert_construct(construct).unwrap();
            doc.backspace().unwrap();
            assert!(same_structure(&before, doc.tokens()), "{construct:?}");
            assert_eq!(doc.cursor(), cursor, "{construct:?}");
        }
    }

    #[test]
    fn index_next_to_power_becomes_subsup() {
        let mut doc = Document::new();
        doc.insert_char("x").unwrap();
        doc.insert_construct(Construct::Index).unwrap();
        doc.insert_char("i").unwrap();
        doc.move_right();
        doc.insert_construct(Construct::Power).unwrap();
        assert!(doc.tokens()[1].is(K::SubSupStart));
        assert!(doc.tokens().last().unwrap().is(K::SubSupEnd));
        assert!(doc.tokens()[doc.cursor().unwrap() - 2].is(K::PowerStart));
    }
}
