//! The equation document: token vector, caret state and equation flags.

use crate::error::{CommandError, UnbalancedError};
use crate::layout::{self, BoundingBox, GlyphMeasurer, LayoutConfig, MonospaceMeasurer};
use crate::matcher::rebuild_matches;
use crate::token::{KeywordKind, Token};
use mathsheet_lang::OperatorStyle;
use std::fmt;
use std::sync::Arc;

/// An inclusive token range `[left, right]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// First selected token.
    pub left: usize,
    /// Last selected token (inclusive).
    pub right: usize,
}

impl Selection {
    /// Create a selection, ordering the ends.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            left: a.min(b),
            right: a.max(b),
        }
    }

    /// Number of selected tokens.
    pub fn len(&self) -> usize {
        self.right - self.left + 1
    }

    /// Always `false`: a selection holds at least one token.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if `index` is selected.
    pub fn contains(&self, index: usize) -> bool {
        (self.left..=self.right).contains(&index)
    }
}

/// Insert mode and selection mode are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caret {
    /// Caret before token `index` (`index == len` is the end).
    Insert(usize),
    /// A selected token range.
    Select(Selection),
}

/// Per-equation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EquationFlags {
    /// A top-level `:=` is present.
    pub is_assignment: bool,
    /// A program block is present.
    pub has_program: bool,
    /// A result span is spliced at the end.
    pub has_result: bool,
    /// The equation contains a construct that only has a symbolic meaning.
    pub force_symbolic: bool,
    /// The tokens changed since the last compile.
    pub needs_parsing: bool,
    /// The equation was compiled at least once.
    pub has_been_parsed: bool,
    /// The equation is rendered as a table (kept for saved documents).
    pub has_table: bool,
}

/// Restorable copy of everything an edit can change.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub(crate) tokens: Vec<Token>,
    pub(crate) caret: Caret,
    pub(crate) flags: EquationFlags,
    pub(crate) result_string: Option<String>,
}

/// A single equation.
///
/// Tokens are only created or destroyed by the edit operations ([`crate::edit`]) and the
/// result splice path ([`crate::result`]); layout only writes metrics and caret anchors.
///
/// # Example
///
/// ```rust
/// use mathsheet_core::{Construct, Document};
///
/// let mut doc = Document::new();
/// doc.insert_construct(Construct::Fraction).unwrap();
/// assert_eq!(doc.len(), 9);
/// assert_eq!(doc.cursor(), Some(3));
/// ```
#[derive(Clone)]
pub struct Document {
    pub(crate) tokens: Vec<Token>,
    pub(crate) caret: Caret,
    pub(crate) flags: EquationFlags,
    pub(crate) result_string: Option<String>,
    pub(crate) origin: (f64, f64),
    pub(crate) font_size: f64,
    pub(crate) config: LayoutConfig,
    pub(crate) operators: OperatorStyle,
    pub(crate) measurer: Arc<dyn GlyphMeasurer>,
    pub(crate) bounds: BoundingBox,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("tokens", &self.tokens.len())
            .field("caret", &self.caret)
            .field("flags", &self.flags)
            .field("result_string", &self.result_string)
            .field("font_size", &self.font_size)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty equation with default layout settings.
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default(), Arc::new(MonospaceMeasurer))
    }

    /// An empty equation using the given layout configuration and measurer.
    pub fn with_config(config: LayoutConfig, measurer: Arc<dyn GlyphMeasurer>) -> Self {
        let font_size = config.font_size;
        Self {
            tokens: Vec::new(),
            caret: Caret::Insert(0),
            flags: EquationFlags::default(),
            result_string: None,
            origin: (0.0, 0.0),
            font_size,
            config,
            operators: OperatorStyle::default(),
            measurer,
            bounds: BoundingBox::default(),
        }
    }

    /// Build a document from existing tokens, validating their structure.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Self, UnbalancedError> {
        let mut doc = Self::new();
        doc.replace_tokens(tokens)?;
        Ok(doc)
    }

    /// Replace the whole token vector (cursor moves to the end).
    pub fn replace_tokens(&mut self, mut tokens: Vec<Token>) -> Result<(), UnbalancedError> {
        rebuild_matches(&mut tokens)?;
        self.tokens = tokens;
        self.caret = Caret::Insert(self.tokens.len());
        self.refresh_flags();
        self.flags.needs_parsing = true;
        self.relayout();
        Ok(())
    }

    /// Set the multiplication glyph used for newly typed `*`.
    pub fn set_operator_style(&mut self, style: OperatorStyle) {
        self.operators = style;
    }

    /// All tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Token count.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` for an empty equation.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Current caret state.
    pub fn caret(&self) -> Caret {
        self.caret
    }

    /// Insert position, or `None` while a selection is active.
    pub fn cursor(&self) -> Option<usize> {
        match self.caret {
            Caret::Insert(index) => Some(index),
            Caret::Select(_) => None,
        }
    }

    /// Active selection, if any.
    pub fn selection(&self) -> Option<Selection> {
        match self.caret {
            Caret::Select(selection) => Some(selection),
            Caret::Insert(_) => None,
        }
    }

    /// Equation flags.
    pub fn flags(&self) -> EquationFlags {
        self.flags
    }

    /// Mark the equation as compiled.
    pub fn mark_parsed(&mut self) {
        self.flags.needs_parsing = false;
        self.flags.has_been_parsed = true;
    }

    /// Returns `true` when no placeholder is left, so the equation may be compiled.
    pub fn is_complete(&self) -> bool {
        !self.tokens.iter().any(Token::is_reserved)
    }

    /// Text of the spliced result, if any.
    pub fn result_string(&self) -> Option<&str> {
        self.result_string.as_deref()
    }

    /// Font size of the top level.
    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    /// Change the font size and re-layout.
    pub fn set_font_size(&mut self, font_size: f64) {
        self.font_size = font_size.max(self.config.min_font_size);
        self.relayout();
    }

    /// Top-left of the equation on the page.
    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    /// Move the equation on the page.
    pub fn set_origin(&mut self, x: f64, y: f64) {
        self.origin = (x, y);
        self.relayout();
    }

    /// Layout settings.
    pub fn layout_config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Extents of the last layout pass, in page coordinates.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Place the caret, clamped to `[0, len]`.
    pub fn set_cursor(&mut self, index: usize) {
        self.caret = Caret::Insert(index.min(self.tokens.len()));
    }

    /// Select `[a, b]` verbatim (no snapping), clamped to the document.
    pub fn set_selection(&mut self, a: usize, b: usize) -> Result<(), CommandError> {
        let len = self.tokens.len();
        if len == 0 || a.max(b) >= len {
            return Err(CommandError::InvalidIndex {
                index: a.max(b),
                len,
            });
        }
        self.caret = Caret::Select(Selection::new(a, b));
        Ok(())
    }

    /// Collapse a selection to its left edge.
    pub fn clear_selection(&mut self) {
        if let Caret::Select(selection) = self.caret {
            self.caret = Caret::Insert(selection.left);
        }
    }

    /// The caret index used by operations that need one: the cursor, or the left edge of
    /// the selection.
    pub(crate) fn anchor_index(&self) -> usize {
        match self.caret {
            Caret::Insert(index) => index,
            Caret::Select(selection) => selection.left,
        }
    }

    /// Run matching, flag refresh and layout after a structural change.
    pub(crate) fn commit(&mut self) -> Result<(), CommandError> {
        if let Err(err) = rebuild_matches(&mut self.tokens) {
            tracing::error!(
                error = %err,
                tokens = self.tokens.len(),
                "edit produced unbalanced structure"
            );
            return Err(CommandError::Unbalanced(err));
        }
        if let Caret::Insert(index) = self.caret {
            self.caret = Caret::Insert(index.min(self.tokens.len()));
        }
        self.refresh_flags();
        self.flags.needs_parsing = true;
        self.relayout();
        Ok(())
    }

    /// Recompute flags that follow from the tokens themselves.
    pub(crate) fn refresh_flags(&mut self) {
        let mut program_depth = 0usize;
        let mut is_assignment = false;
        let mut has_program = false;
        let mut force_symbolic = false;
        for token in &self.tokens {
            match token.kind() {
                Some(KeywordKind::ProgramStart) => {
                    has_program = true;
                    program_depth += 1;
                }
                Some(KeywordKind::ProgramEnd) => program_depth = program_depth.saturating_sub(1),
                Some(KeywordKind::IndefIntegralStart | KeywordKind::LimitStart) => {
                    force_symbolic = true
                }
                Some(KeywordKind::Equals) => break,
                _ => {}
            }
            if program_depth == 0 && token.tag() == Some(":=") {
                is_assignment = true;
            }
        }
        self.flags.is_assignment = is_assignment;
        self.flags.has_program = has_program;
        self.flags.force_symbolic = force_symbolic;
        self.flags.has_result = self.tokens.last().is_some_and(|t| t.is(KeywordKind::EqualsEnd));
    }

    /// Lay out all tokens at the current font size and origin.
    pub fn relayout(&mut self) -> BoundingBox {
        let ctx = layout::LayoutContext {
            config: &self.config,
            measurer: self.measurer.as_ref(),
        };
        let len = self.tokens.len();
        let mut bounds = layout::layout(&mut self.tokens, 0..len, self.font_size, &ctx);
        let (ox, oy) = self.origin;
        let dy = oy - bounds.top;
        layout::shift(&mut self.tokens, 0..len, ox, dy);
        bounds.left += ox;
        bounds.right += ox;
        bounds.top += dy;
        bounds.bottom += dy;
        self.bounds = bounds;
        tracing::trace!(tokens = len, width = bounds.width(), "layout pass");
        bounds
    }

    /// Copy of the editable state.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            tokens: self.tokens.clone(),
            caret: self.caret,
            flags: self.flags,
            result_string: self.result_string.clone(),
        }
    }

    /// Restore a snapshot taken with [`Document::snapshot`].
    pub fn restore(&mut self, snapshot: DocumentSnapshot) {
        self.tokens = snapshot.tokens;
        self.caret = snapshot.caret;
        self.flags = snapshot.flags;
        self.result_string = snapshot.result_string;
        if rebuild_matches(&mut self.tokens).is_err() {
            tracing::error!("restored snapshot is unbalanced");
        }
        self.relayout();
    }
}
