//! Bracket matching.
//!
//! One stack pass over the token vector that writes `partner` on both ends of every keyword
//! pair. It is cheap enough to run after every structural edit.

use crate::error::UnbalancedError;
use crate::token::{KeywordKind, Token};

/// Recompute `partner` for every keyword in `tokens`.
///
/// On error the partner fields are left in an unspecified (but memory-safe) state; callers
/// treat this as fatal.
pub fn rebuild_matches(tokens: &mut [Token]) -> Result<(), UnbalancedError> {
    let mut stack: Vec<(usize, KeywordKind)> = Vec::new();

    for index in 0..tokens.len() {
        let Some(keyword) = tokens[index].as_keyword_mut() else {
            continue;
        };
        keyword.partner = None;
        let kind = keyword.kind;

        if let Some(closer) = kind.closer() {
            stack.push((index, closer));
            continue;
        }

        match stack.last() {
            Some(&(open, expected)) if expected == kind => {
                stack.pop();
                keyword.partner = Some(open);
                if let Some(opening) = tokens[open].as_keyword_mut() {
                    opening.partner = Some(index);
                }
            }
            _ => return Err(UnbalancedError::UnexpectedClose { index, kind }),
        }
    }

    match stack.pop() {
        Some((index, closer)) => Err(UnbalancedError::Unclosed {
            index,
            kind: closer.opener().unwrap_or(closer),
        }),
        None => Ok(()),
    }
}

/// Returns `true` if `tokens` nest properly. Does not modify anything.
pub fn is_balanced(tokens: &[Token]) -> bool {
    let mut stack: Vec<KeywordKind> = Vec::new();
    for token in tokens {
        let Some(kind) = token.kind() else { continue };
        if let Some(closer) = kind.closer() {
            stack.push(closer);
        } else if stack.pop() != Some(kind) {
            return false;
        }
    }
    stack.is_empty()
}

/// Index of the innermost keyword pair `(open, close)` that strictly surrounds `index`
/// and satisfies `pred`. Requires matches to be up to date.
pub fn enclosing_pair(
    tokens: &[Token],
    index: usize,
    mut pred: impl FnMut(KeywordKind) -> bool,
) -> Option<(usize, usize)> {
    let mut k = index.min(tokens.len());
    while k > 0 {
        k -= 1;
        if let Some(keyword) = tokens[k].as_keyword()
            && keyword.kind.is_opening()
            && let Some(close) = keyword.partner
            && close >= index
            && pred(keyword.kind)
        {
            return Some((k, close));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Glyph, Keyword};

    fn kw(kind: KeywordKind) -> Token {
        Keyword::new(kind).into()
    }

    #[test]
    fn partners_are_symmetric() {
        let mut tokens = vec![
            kw(KeywordKind::DivideStart),
            kw(KeywordKind::NumStart),
            Glyph::plain("a").into(),
            kw(KeywordKind::NumEnd),
            kw(KeywordKind::DenomStart),
            Glyph::plain("b").into(),
            kw(KeywordKind::DenomEnd),
            kw(KeywordKind::DivideEnd),
        ];
        rebuild_matches(&mut tokens).unwrap();
        assert_eq!(tokens[0].partner(), Some(7));
        assert_eq!(tokens[7].partner(), Some(0));
        assert_eq!(tokens[1].partner(), Some(3));
        assert_eq!(tokens[4].partner(), Some(6));
        assert_eq!(tokens[2].partner(), None);
    }

    #[test]
    fn interleaved_pairs_are_rejected() {
        let mut tokens = vec![
            kw(KeywordKind::LeftParen),
            kw(KeywordKind::BodyStart),
            kw(KeywordKind::RightParen),
            kw(KeywordKind::BodyEnd),
        ];
        assert_eq!(
            rebuild_matches(&mut tokens),
            Err(UnbalancedError::UnexpectedClose {
                index: 2,
                kind: KeywordKind::RightParen
            })
        );
        assert!(!is_balanced(&tokens));
    }

    #[test]
    fn unclosed_is_reported() {
        let mut tokens = vec![kw(KeywordKind::PowerStart), Glyph::reserved().into()];
        assert_eq!(
            rebuild_matches(&mut tokens),
            Err(UnbalancedError::Unclosed {
                index: 0,
                kind: KeywordKind::PowerStart
            })
        );
    }

    #[test]
    fn enclosing_pair_finds_innermost() {
        let mut tokens = vec![
            kw(KeywordKind::LeftParen),
            kw(KeywordKind::BodyStart),
            Glyph::plain("x").into(),
            kw(KeywordKind::BodyEnd),
            kw(KeywordKind::RightParen),
        ];
        rebuild_matches(&mut tokens).unwrap();
        assert_eq!(enclosing_pair(&tokens, 3, |_| true), Some((1, 3)));
        assert_eq!(
            enclosing_pair(&tokens, 3, |k| k == KeywordKind::LeftParen),
            Some((0, 4))
        );
        assert_eq!(enclosing_pair(&tokens, 0, |_| true), None);
    }
}
