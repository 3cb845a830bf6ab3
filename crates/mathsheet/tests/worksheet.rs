use mathsheet::{
    Command, Construct, EquationStatus, MathsheetConfig, Worksheet, WorksheetError,
};
use mathsheet_core::EditCommand;
use pretty_assertions::assert_eq;

fn sheet() -> Worksheet {
    Worksheet::new(MathsheetConfig::default()).unwrap()
}

#[test]
fn test_results_flow_top_to_bottom() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut sheet = sheet();
    let a = sheet.add_text("a:3").unwrap();
    let b = sheet.add_text("b:a^2").unwrap();
    let sum = sheet.add_text("a+b").unwrap();

    assert_eq!(sheet.recalculate().unwrap(), 3);
    assert_eq!(sheet.pending(), 0);
    assert_eq!(sheet.equation(a).unwrap().result_string(), Some("3"));
    assert_eq!(sheet.equation(b).unwrap().result_string(), Some("9"));
    let sum = sheet.equation(sum).unwrap();
    assert_eq!(sum.result_string(), Some("12"));
    assert_eq!(sum.code().as_deref(), Some("a + b"));
    assert!(sum.document().flags().has_result);
}

#[test]
fn test_functions_typed_as_text() {
    let mut sheet = sheet();
    let define = sheet.add_text("f(x):x*x").unwrap();
    let call = sheet.add_text("f(4)").unwrap();
    sheet.recalculate().unwrap();

    let define = sheet.equation(define).unwrap();
    assert_eq!(define.status(), &EquationStatus::Ok);
    assert_eq!(define.result_string(), None);
    assert_eq!(sheet.equation(call).unwrap().result_string(), Some("16"));
}

#[test]
fn test_errors_stay_with_their_equation() {
    let mut sheet = sheet();
    let undefined = sheet.add_text("q+1").unwrap();
    let broken = sheet.add_text("1.2.3").unwrap();
    let unfinished = sheet.add_equation();
    sheet
        .execute(unfinished, Command::Construct(Construct::Fraction))
        .unwrap();
    let fine = sheet.add_text("2*3").unwrap();

    assert_eq!(sheet.evaluate().unwrap(), 2);
    sheet.wait().unwrap();

    assert_eq!(
        sheet.equation(undefined).unwrap().status(),
        &EquationStatus::RuntimeError("name 'q' is not defined".to_string())
    );
    assert!(matches!(
        sheet.equation(broken).unwrap().status(),
        EquationStatus::SyntaxError(_)
    ));
    assert_eq!(
        sheet.equation(unfinished).unwrap().status(),
        &EquationStatus::Incomplete
    );
    assert_eq!(sheet.equation(fine).unwrap().result_string(), Some("6"));
}

#[test]
fn test_edit_after_submit_discards_the_result() {
    let mut sheet = sheet();
    sheet.add_text("a:2").unwrap();
    let product = sheet.add_text("a*5").unwrap();
    sheet.evaluate().unwrap();
    sheet
        .execute(
            product,
            Command::Edit(EditCommand::InsertText {
                text: "0".to_string(),
            }),
        )
        .unwrap();

    assert_eq!(sheet.wait().unwrap(), 1);
    let product_eq = sheet.equation(product).unwrap();
    assert_eq!(product_eq.result_string(), None);
    assert_eq!(product_eq.generation(), 2);

    sheet.recalculate().unwrap();
    assert_eq!(sheet.equation(product).unwrap().result_string(), Some("100"));
}

#[test]
fn test_removed_equation_takes_its_name() {
    let mut sheet = sheet();
    let a = sheet.add_text("a:2").unwrap();
    let read = sheet.add_text("a+1").unwrap();
    sheet.recalculate().unwrap();
    assert_eq!(sheet.equation(read).unwrap().result_string(), Some("3"));

    sheet.remove_equation(a).unwrap();
    sheet.recalculate().unwrap();
    assert!(sheet.equation(read).unwrap().status().message().is_some());
    assert!(matches!(
        sheet.remove_equation(a),
        Err(WorksheetError::UnknownEquation(id)) if id == a
    ));
}

#[test]
fn test_saved_worksheet_round_trip() {
    let mut sheet = sheet();
    sheet.add_text("r:2").unwrap();
    sheet.add_text("r^3").unwrap();
    sheet.recalculate().unwrap();
    let json = sheet.to_json().unwrap();

    let mut loaded = Worksheet::from_json(&json, MathsheetConfig::default()).unwrap();
    assert_eq!(loaded.equations().len(), 2);
    assert_eq!(loaded.equations()[1].result_string(), Some("8"));
    loaded.recalculate().unwrap();
    assert_eq!(loaded.equations()[1].result_string(), Some("8"));
    assert_eq!(loaded.to_record().equations.len(), 2);
}

#[test]
fn test_configured_multiply_symbol() {
    let config = MathsheetConfig::from_yaml("multiply_symbol: \"\u{00d7}\"").unwrap();
    let mut sheet = Worksheet::new(config).unwrap();
    let id = sheet.add_text("2*3").unwrap();
    let shown: Vec<String> = sheet
        .equation(id)
        .unwrap()
        .document()
        .tokens()
        .iter()
        .filter_map(|t| t.as_glyph())
        .map(|g| g.display.clone())
        .collect();
    assert_eq!(shown, vec!["2", "\u{00d7}", "3"]);
}

#[test]
fn test_oversized_grid_fails_alone() {
    let mut sheet = sheet();
    let huge = sheet.add_text("zeros(4294967296,4294967296)").unwrap();
    let sum = sheet.add_text("1+1").unwrap();

    for _ in 0..2 {
        assert_eq!(sheet.recalculate().unwrap(), 2);
        let status = sheet.equation(huge).unwrap().status();
        assert!(
            matches!(status, EquationStatus::RuntimeError(message)
                if message.starts_with("math domain error")),
            "{status:?}"
        );
        assert_eq!(sheet.equation(sum).unwrap().result_string(), Some("2"));
    }
}

#[test]
fn test_runaway_recursion_fails_alone() {
    let mut sheet = sheet();
    sheet.add_text("f(n):f(n-1)+1").unwrap();
    let call = sheet.add_text("f(3)").unwrap();
    let after = sheet.add_text("2+2").unwrap();

    assert_eq!(sheet.recalculate().unwrap(), 3);
    assert_eq!(
        sheet.equation(call).unwrap().status(),
        &EquationStatus::RuntimeError("math domain error: maximum call depth exceeded".into())
    );
    assert_eq!(sheet.equation(after).unwrap().result_string(), Some("4"));
}
