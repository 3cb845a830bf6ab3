use mathsheet_core::{
    Caret, CommandError, Construct, Document, KeywordKind, LimitSide, ProgramWord, ResultValue,
    Selection, Token, is_balanced, rebuild_matches, same_structure,
};
use pretty_assertions::assert_eq;

fn displays(doc: &Document) -> Vec<String> {
    doc.tokens()
        .iter()
        .filter_map(Token::as_glyph)
        .map(|g| g.display.clone())
        .collect()
}

#[test]
fn test_typing_a_plus_b() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut doc = Document::new();
    doc.insert_text("a+b").unwrap();
    assert_eq!(displays(&doc), vec!["a", " + ", "b"]);
    assert!(doc.is_complete());
    assert_eq!(doc.cursor(), Some(3));
}

#[test]
fn test_fraction_fill_and_two_step_delete() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Fraction).unwrap();
    doc.insert_text("1").unwrap();
    doc.set_cursor(7);
    doc.insert_text("2").unwrap();
    assert!(doc.is_complete());

    doc.set_cursor(doc.len());
    doc.backspace().unwrap();
    assert_eq!(doc.selection(), Some(Selection::new(0, 8)));
    doc.backspace().unwrap();
    assert!(doc.is_empty());
    assert_eq!(doc.cursor(), Some(0));
}

#[test]
fn test_backspace_in_slot_restores_placeholder() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Fraction).unwrap();
    doc.insert_text("7").unwrap();
    doc.backspace().unwrap();
    assert_eq!(doc.len(), 9);
    assert!(doc.tokens()[2].is_reserved());
    assert_eq!(doc.cursor(), Some(3));
}

#[test]
fn test_backspace_after_long_body_selects_construct() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Absolute).unwrap();
    doc.insert_text(&"x".repeat(39)).unwrap();
    let body_end = 42;
    assert!(doc.tokens()[body_end].is(KeywordKind::BodyEnd));
    assert_eq!(doc.tokens()[body_end].partner(), Some(2));

    doc.set_cursor(body_end + 1);
    doc.backspace().unwrap();
    assert_eq!(doc.caret(), Caret::Select(Selection::new(2, body_end)));
}

#[test]
fn test_backspace_removes_operator() {
    let mut doc = Document::new();
    doc.insert_text("a+b").unwrap();
    doc.set_cursor(2);
    doc.backspace().unwrap();
    assert_eq!(displays(&doc), vec!["a", "b"]);
    assert_eq!(doc.cursor(), Some(1));
}

#[test]
fn test_selection_is_wrapped() {
    let mut doc = Document::new();
    doc.insert_text("ab").unwrap();
    doc.select_range(0, 1);
    doc.insert_construct(Construct::SquareRoot).unwrap();
    assert!(doc.tokens()[0].is(KeywordKind::SquareRootStart));
    assert!(doc.is_complete());
    assert_eq!(doc.cursor(), Some(doc.len()));
}

fn assert_partners_fresh(doc: &Document) {
    let mut fresh = doc.tokens().to_vec();
    rebuild_matches(&mut fresh).unwrap();
    assert!(same_structure(&fresh, doc.tokens()), "stored partners are stale");
}

/// Every `SubSup` wrapper holds scripts directly.
fn assert_subsup_shape(doc: &Document) {
    let tokens = doc.tokens();
    for (k, token) in tokens.iter().enumerate() {
        if token.is(KeywordKind::SubSupStart) {
            let first = tokens[k + 1].kind();
            assert!(
                matches!(
                    first,
                    Some(
                        KeywordKind::IndexStart
                            | KeywordKind::PowerStart
                            | KeywordKind::ConjugateStart
                    )
                ),
                "sub/superscript at {k} starts with {first:?}"
            );
        }
    }
}

/// `x` with index `i` and power `2`, paired into one sub/superscript.
fn indexed_power() -> Document {
    let mut doc = Document::new();
    doc.insert_char("x").unwrap();
    doc.insert_construct(Construct::Index).unwrap();
    doc.insert_char("i").unwrap();
    doc.move_right();
    doc.insert_construct(Construct::Power).unwrap();
    doc.insert_char("2").unwrap();
    // x SubSupStart IndexStart i IndexEnd PowerStart 2 PowerEnd SubSupEnd
    assert_eq!(doc.len(), 9);
    assert!(doc.tokens()[1].is(KeywordKind::SubSupStart));
    doc
}

#[test]
fn test_rejected_char_still_reports_deleted_selection() {
    let mut doc = Document::new();
    doc.insert_text("x:").unwrap();
    doc.insert_construct(Construct::Fraction).unwrap();
    doc.insert_text("12").unwrap();
    assert_eq!(doc.len(), 12);

    doc.select_range(4, 5);
    assert_eq!(doc.selection(), Some(Selection::new(4, 5)));
    // A second `:=` is refused, but the selected digits are gone.
    let changed = doc.insert_char(":").unwrap();
    assert!(changed);
    assert_eq!(doc.len(), 11);
    assert!(doc.tokens()[4].is_reserved());
    assert_eq!(doc.cursor(), Some(5));
    assert_partners_fresh(&doc);

    let json = doc.to_json().unwrap();
    let back = Document::from_json(&json).unwrap();
    assert!(same_structure(doc.tokens(), back.tokens()));
}

#[test]
fn test_rejected_char_without_selection_is_unchanged() {
    let mut doc = Document::new();
    doc.insert_text("a_").unwrap();
    let before = doc.tokens().to_vec();
    assert!(!doc.insert_char("_").unwrap());
    assert!(!doc.insert_char(" ").unwrap());
    assert!(same_structure(&before, doc.tokens()));
}

#[test]
fn test_selecting_script_parts_selects_the_pair() {
    let mut doc = indexed_power();
    doc.select_range(2, 7);
    assert_eq!(doc.selection(), Some(Selection::new(1, 8)));
    doc.select_range(5, 7);
    assert_eq!(doc.selection(), Some(Selection::new(1, 8)));

    doc.insert_construct(Construct::Array { rows: 3, cols: 1 }).unwrap();
    assert!(is_balanced(doc.tokens()));
    assert!(doc.tokens()[1].is(KeywordKind::ArrayStart));
    assert_subsup_shape(&doc);
    assert_partners_fresh(&doc);
}

#[test]
fn test_wrapping_matrix_elements_wraps_the_matrix() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Matrix { rows: 2, cols: 2 }).unwrap();
    let end = doc.len() - 1;
    // Two elements of the first row.
    doc.select_range(3, 8);
    assert_eq!(doc.selection(), Some(Selection::new(0, end)));

    doc.insert_construct(Construct::Fraction).unwrap();
    assert!(doc.tokens()[0].is(KeywordKind::DivideStart));
    assert!(doc.tokens()[2].is(KeywordKind::MatrixStart));
    let rows = doc.tokens().iter().filter(|t| t.is(KeywordKind::RowStart)).count();
    let elements = doc
        .tokens()
        .iter()
        .filter(|t| t.is(KeywordKind::ElementStart))
        .count();
    assert_eq!((rows, elements), (2, 4));
    assert_partners_fresh(&doc);
}

#[test]
fn test_backspace_after_row_selects_matrix() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Matrix { rows: 2, cols: 2 }).unwrap();
    let end = doc.len() - 1;
    assert!(doc.tokens()[9].is(KeywordKind::RowEnd));
    doc.set_cursor(10);
    doc.backspace().unwrap();
    assert_eq!(doc.selection(), Some(Selection::new(0, end)));
}

#[test]
fn test_deleting_a_whole_slot_keeps_its_keywords() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Absolute).unwrap();
    doc.insert_text("xy").unwrap();
    let body_end = doc
        .tokens()
        .iter()
        .position(|t| t.is(KeywordKind::BodyEnd))
        .unwrap();
    doc.set_cursor(body_end + 1);
    doc.backspace().unwrap();
    let selected = doc.selection().unwrap();
    assert!(doc.tokens()[selected.left].is(KeywordKind::BodyStart));

    doc.backspace().unwrap();
    assert!(doc.tokens()[0].is(KeywordKind::AbsoluteStart));
    assert!(doc.tokens().iter().any(|t| t.is(KeywordKind::BodyStart)));
    assert!(doc.tokens().iter().any(Token::is_reserved));
    assert_eq!(doc.cursor(), Some(selected.left + 2));
    assert_partners_fresh(&doc);
}

#[test]
fn test_removing_a_script_dissolves_the_pair() {
    let mut doc = indexed_power();
    // Empty the power, then remove it.
    doc.set_cursor(7);
    doc.backspace().unwrap();
    assert!(doc.tokens()[6].is_reserved());
    doc.backspace().unwrap();
    assert!(is_balanced(doc.tokens()));
    assert!(!doc.tokens().iter().any(|t| t.is(KeywordKind::SubSupStart)));
    assert!(doc.tokens()[1].is(KeywordKind::IndexStart));
    assert_partners_fresh(&doc);
}

#[test]
fn test_program_lines_cannot_be_wrapped() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Program).unwrap();
    let line = doc.cursor().unwrap() - 2;
    assert!(doc.tokens()[line].is(KeywordKind::LineStart));
    doc.select_range(line, line + 2);
    assert_eq!(doc.selection(), Some(Selection::new(line, line + 2)));
    let err = doc.insert_construct(Construct::Fraction).unwrap_err();
    assert!(matches!(err, CommandError::NotAllowed(_)));
    assert!(doc.flags().has_program);
}

#[test]
fn test_limit_goes_to_the_front() {
    let mut doc = Document::new();
    doc.insert_text("x").unwrap();
    doc.insert_construct(Construct::Limit(LimitSide::Plus)).unwrap();
    assert!(doc.tokens()[0].is(KeywordKind::LimitStart));
    assert_eq!(doc.len(), 13);
    assert_eq!(doc.cursor(), Some(6));
    assert!(doc.flags().force_symbolic);
}

#[test]
fn test_program_after_assignment() {
    let mut doc = Document::new();
    doc.insert_text("f").unwrap();
    doc.insert_char(":").unwrap();
    assert!(doc.flags().is_assignment);
    doc.insert_construct(Construct::Program).unwrap();
    assert!(doc.flags().has_program);
    assert!(doc.tokens()[2].is(KeywordKind::ProgramStart));
    assert!(doc.tokens()[doc.cursor().unwrap() - 2].is(KeywordKind::LineStart));

    let before = doc.len();
    doc.newline().unwrap();
    assert_eq!(doc.len(), before + 3);

    doc.insert_construct(Construct::Word(ProgramWord::Return)).unwrap();
    doc.insert_text("1").unwrap();
    assert!(doc.tokens().iter().any(|t| t.tag() == Some("return ")));
}

#[test]
fn test_program_rejected_mid_expression() {
    let mut doc = Document::new();
    doc.insert_text("x+1").unwrap();
    let err = doc.insert_construct(Construct::Program).unwrap_err();
    assert!(matches!(err, CommandError::NotAllowed(_)));
    let err = doc.insert_construct(Construct::Word(ProgramWord::If)).unwrap_err();
    assert!(matches!(err, CommandError::NotAllowed(_)));
    assert_eq!(doc.len(), 3);
}

#[test]
fn test_closing_paren_steps_out() {
    let mut doc = Document::new();
    doc.insert_text("(x").unwrap();
    let inside = doc.cursor().unwrap();
    doc.insert_text(")").unwrap();
    let close = doc.cursor().unwrap() - 1;
    assert!(close >= inside);
    assert!(doc.tokens()[close].is(KeywordKind::RightParen));
}

#[test]
fn test_edit_deletes_stale_result() {
    let mut doc = Document::new();
    doc.insert_text("2").unwrap();
    doc.set_result(&ResultValue::real(2.0), 4).unwrap();
    assert!(doc.flags().has_result);
    doc.set_cursor(1);
    doc.insert_text("*3").unwrap();
    assert!(!doc.flags().has_result);
    assert!(doc.result_string().is_none());
    assert_eq!(displays(&doc), vec!["2", "\u{00b7}", "3"]);
}

#[test]
fn test_backspace_at_end_deletes_result() {
    let mut doc = Document::new();
    doc.insert_text("2").unwrap();
    doc.set_result(&ResultValue::real(2.0), 4).unwrap();
    doc.set_cursor(doc.len());
    doc.backspace().unwrap();
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.cursor(), Some(1));
}

#[test]
fn test_matrix_result_is_a_grid() {
    let mut doc = Document::new();
    doc.insert_text("m").unwrap();
    let value = ResultValue::Grid {
        rows: vec![
            vec![ResultValue::real(1.0), ResultValue::real(2.0)],
            vec![ResultValue::real(3.0), ResultValue::real(4.0)],
        ],
        matrix: true,
    };
    doc.set_result(&value, 4).unwrap();
    assert_eq!(doc.result_string(), Some("[1, 2; 3, 4]"));
    assert!(doc.tokens().iter().any(|t| t.is(KeywordKind::MatrixStart)));
    assert!(doc.is_complete());
}

#[test]
fn test_geometry_reports_glyphs_and_selection() {
    let mut doc = Document::new();
    doc.insert_text("ab").unwrap();
    let geometry = doc.geometry();
    assert_eq!(geometry.glyphs.len(), 2);
    assert!(geometry.caret.is_some());
    assert!(geometry.selection.is_empty());

    doc.select_all();
    let geometry = doc.geometry();
    assert!(geometry.caret.is_none());
    assert_eq!(geometry.selection.len(), 1);
    assert!(geometry.glyphs.iter().all(|g| g.selected));
}
