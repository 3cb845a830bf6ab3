#![warn(missing_docs)]
//! `mathsheet-lang` - data-driven symbol tables for the `mathsheet` editor.
//!
//! This crate intentionally stays lightweight and has no dependencies. It answers three
//! questions the editor, the compiler and the interpreter all need to agree on:
//!
//! - which semantic tag a symbol glyph carries (`__alpha__` for `α`) and how it is displayed;
//! - how operators are spaced on screen (`+` is drawn as ` + `);
//! - which words are reserved by the program-block grammar.

/// Tag carried by the placeholder glyph that stands in for "nothing typed yet".
pub const RESERVED_TAG: &str = "__reserved__";

/// Tag and display text of one indentation step inside a program line.
pub const INDENT: &str = "    ";

/// A named symbol that can be inserted into an equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Semantic tag used by the compiler (e.g. `__alpha__`).
    pub tag: &'static str,
    /// Text drawn on screen (e.g. `α`).
    pub display: &'static str,
    /// Human readable name for symbol pickers.
    pub description: &'static str,
}

const fn sym(tag: &'static str, display: &'static str, description: &'static str) -> Symbol {
    Symbol {
        tag,
        display,
        description,
    }
}

/// Greek letters and special symbols available from the symbol picker.
pub const SYMBOLS: &[Symbol] = &[
    sym("__GAMMA__", "\u{0393}", "Uppercase Gamma"),
    sym("__DELTA__", "\u{0394}", "Uppercase Delta"),
    sym("__THETA__", "\u{0398}", "Uppercase Theta"),
    sym("__LAMBDA__", "\u{039b}", "Uppercase Lambda"),
    sym("__XI__", "\u{039e}", "Uppercase Xi"),
    sym("__SIGMA__", "\u{03a3}", "Uppercase Sigma"),
    sym("__PHI__", "\u{03a6}", "Uppercase Phi"),
    sym("__PSI__", "\u{03a8}", "Uppercase Psi"),
    sym("__OMEGA__", "\u{03a9}", "Uppercase Omega"),
    sym("__alpha__", "\u{03b1}", "Alpha"),
    sym("__beta__", "\u{03b2}", "Beta"),
    sym("__gamma__", "\u{03b3}", "Gamma"),
    sym("__delta__", "\u{03b4}", "Delta"),
    sym("__epsilon__", "\u{03b5}", "Epsilon"),
    sym("__zeta__", "\u{03b6}", "Zeta"),
    sym("__eta__", "\u{03b7}", "Eta"),
    sym("__theta__", "\u{03b8}", "Theta"),
    sym("__kapa__", "\u{03ba}", "Kapa"),
    sym("__lamba__", "\u{03bb}", "Lambda"),
    sym("__mu__", "\u{03bc}", "Mu"),
    sym("__nu__", "\u{03bd}", "Nu"),
    sym("__xi__", "\u{03be}", "Xi"),
    sym("__pi__", "\u{03c0}", "Pi"),
    sym("__rho__", "\u{03c1}", "Rho"),
    sym("__stigma__", "\u{03c2}", "Stigma"),
    sym("__sigma__", "\u{03c3}", "Sigma"),
    sym("__tau__", "\u{03c4}", "Tau"),
    sym("__upsilon__", "\u{03c5}", "Upsilon"),
    sym("__phi__", "\u{03c6}", "Phi"),
    sym("__chi__", "\u{03c7}", "Chi"),
    sym("__psi__", "\u{03c8}", "Psi"),
    sym("__omega__", "\u{03c9}", "Omega"),
    sym("__infinity__", "\u{221e}", "Infinity"),
];

/// Look up a symbol by its semantic tag.
pub fn symbol_for_tag(tag: &str) -> Option<&'static Symbol> {
    SYMBOLS.iter().find(|s| s.tag == tag)
}

/// Look up a symbol by the text drawn on screen.
pub fn symbol_for_display(display: &str) -> Option<&'static Symbol> {
    SYMBOLS.iter().find(|s| s.display == display)
}

/// Returns `true` if `tag` has the `__name__` shape used for symbol tags.
pub fn is_symbol_tag(tag: &str) -> bool {
    tag.len() > 4
        && tag.starts_with("__")
        && tag.ends_with("__")
        && tag[2..tag.len() - 2].chars().all(|c| c.is_ascii_alphabetic())
}

/// Returns `true` if a glyph with this tag is part of a word (label or number) for caret
/// purposes: the caret underlines the whole run of such glyphs.
pub fn is_word_tag(tag: &str) -> bool {
    if tag == RESERVED_TAG || symbol_for_tag(tag).is_some() {
        return true;
    }
    let mut chars = tag.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_alphanumeric() || c == '.' || c == '_',
        _ => false,
    }
}

/// Tags of glyphs that only decorate a construct. The construct's keywords already carry
/// their meaning, so the compiler skips them.
pub const DECORATIVE_TAGS: &[&str] = &[
    "__squareroot__",
    "__integral_top__",
    "__integral_bottom__",
    "__summation__",
    "__product__",
    "__overline__",
    "__arrow__",
    "__programline__",
    "__leftparenthesis__",
    "__rightparenthesis__",
    "__leftsquarebracket__",
    "__rightsquarebracket__",
    "__floorleft__",
    "__floorright__",
    "__ceilleft__",
    "__ceilright__",
    "__verticalline__",
    "__norm__",
    "__divideline__",
    "__space__",
    "__transpose__",
    "__star__",
    "__hermitian__",
    "__dot__",
    "__convolve__",
    "__calculusdee__",
    "__limit__",
    "__limitarrow__",
    "__equalsign__",
];

/// Returns `true` if glyphs with this tag are skipped when an equation is compiled.
pub fn is_decorative_tag(tag: &str) -> bool {
    DECORATIVE_TAGS.contains(&tag)
}

/// Operators that are drawn with surrounding spacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorStyle {
    /// Glyph drawn for multiplication (`·` by default, `×` is also common).
    pub multiply_symbol: String,
}

impl Default for OperatorStyle {
    fn default() -> Self {
        Self {
            multiply_symbol: "\u{00b7}".to_string(),
        }
    }
}

impl OperatorStyle {
    /// Create a style with a custom multiplication glyph.
    pub fn with_multiply(symbol: impl Into<String>) -> Self {
        Self {
            multiply_symbol: symbol.into(),
        }
    }

    /// Display text for an operator tag, or `None` when the tag is drawn as-is.
    pub fn display_for(&self, tag: &str) -> Option<String> {
        match tag {
            "+" => Some(" + ".to_string()),
            "-" => Some(" - ".to_string()),
            "*" => Some(self.multiply_symbol.clone()),
            "," => Some(", ".to_string()),
            ";" => Some(" ... ".to_string()),
            ":=" => Some(" := ".to_string()),
            "==" => Some(" = ".to_string()),
            "<" => Some(" < ".to_string()),
            ">" => Some(" > ".to_string()),
            "<=" => Some(" \u{2264} ".to_string()),
            ">=" => Some(" \u{2265} ".to_string()),
            "!=" => Some(" \u{2260} ".to_string()),
            _ => None,
        }
    }

    /// Returns `true` if `tag` is one of the binary arithmetic operators.
    pub fn is_arithmetic(tag: &str) -> bool {
        matches!(tag, "+" | "-" | "*")
    }
}

/// Words reserved by the program-block grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramWord {
    /// `if <condition>`
    If,
    /// `elif <condition>`
    Elif,
    /// `else`
    Else,
    /// `for <var> in <expr>`
    For,
    /// `in`, only inside `for`
    In,
    /// `while <condition>`
    While,
    /// `continue`
    Continue,
    /// `break`
    Break,
    /// `return <expr>`
    Return,
}

impl ProgramWord {
    /// All program words.
    pub const ALL: [ProgramWord; 9] = [
        ProgramWord::If,
        ProgramWord::Elif,
        ProgramWord::Else,
        ProgramWord::For,
        ProgramWord::In,
        ProgramWord::While,
        ProgramWord::Continue,
        ProgramWord::Break,
        ProgramWord::Return,
    ];

    /// The bare word.
    pub fn word(self) -> &'static str {
        match self {
            ProgramWord::If => "if",
            ProgramWord::Elif => "elif",
            ProgramWord::Else => "else",
            ProgramWord::For => "for",
            ProgramWord::In => "in",
            ProgramWord::While => "while",
            ProgramWord::Continue => "continue",
            ProgramWord::Break => "break",
            ProgramWord::Return => "return",
        }
    }

    /// Glyph tag used when the word is inserted from a toolbar, including its spacing.
    pub fn tag(self) -> &'static str {
        match self {
            ProgramWord::If => "if ",
            ProgramWord::Elif => "elif ",
            ProgramWord::Else => "else",
            ProgramWord::For => "for ",
            ProgramWord::In => " in ",
            ProgramWord::While => "while ",
            ProgramWord::Continue => "continue",
            ProgramWord::Break => "break",
            ProgramWord::Return => "return ",
        }
    }

    /// Returns `true` if the word is followed by an operand placeholder when inserted.
    pub fn takes_operand(self) -> bool {
        matches!(
            self,
            ProgramWord::If
                | ProgramWord::Elif
                | ProgramWord::For
                | ProgramWord::In
                | ProgramWord::While
                | ProgramWord::Return
        )
    }

    /// Parse a bare word (`"while"`) into a program word.
    pub fn from_word(word: &str) -> Option<ProgramWord> {
        ProgramWord::ALL.into_iter().find(|w| w.word() == word)
    }

    /// Parse a glyph tag (`"while "`) into a program word.
    pub fn from_tag(tag: &str) -> Option<ProgramWord> {
        ProgramWord::ALL.into_iter().find(|w| w.tag() == tag)
    }
}

/// Returns `true` if the label is a reserved program word.
pub fn is_reserved_word(label: &str) -> bool {
    ProgramWord::from_word(label).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greek_lookup_both_ways() {
        let alpha = symbol_for_tag("__alpha__").unwrap();
        assert_eq!(alpha.display, "α");
        assert_eq!(symbol_for_display("π").unwrap().tag, "__pi__");
        assert!(symbol_for_tag("__nope__").is_none());
    }

    #[test]
    fn word_tags() {
        assert!(is_word_tag("a"));
        assert!(is_word_tag("7"));
        assert!(is_word_tag("."));
        assert!(is_word_tag(RESERVED_TAG));
        assert!(is_word_tag("__theta__"));
        assert!(!is_word_tag("+"));
        assert!(!is_word_tag(":="));
    }

    #[test]
    fn program_words_round_trip_through_tags() {
        for word in ProgramWord::ALL {
            assert_eq!(ProgramWord::from_tag(word.tag()), Some(word));
            assert_eq!(ProgramWord::from_word(word.word()), Some(word));
        }
        assert!(is_reserved_word("while"));
        assert!(!is_reserved_word("whilst"));
    }
}
