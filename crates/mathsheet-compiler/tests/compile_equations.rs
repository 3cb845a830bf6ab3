use mathsheet_compiler::{
    BinaryOp, Block, CompileError, Expr, FunctionBody, IndexItem, ProgramStatement, Statement,
    compile,
};
use mathsheet_core::{Construct, Document, Glyph, GlyphShape, Keyword, KeywordKind as K, Token};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn g(tag: &str) -> Token {
    Glyph::plain(tag).into()
}

fn k(kind: K) -> Token {
    Keyword::new(kind).into()
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn var(name: &str) -> Expr {
    Expr::Variable(name.to_string())
}

#[test]
fn test_typed_sum_of_two_names() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut doc = Document::new();
    doc.insert_text("a+b").unwrap();
    let compiled = compile(doc.tokens()).unwrap();
    assert_eq!(compiled.to_string(), "a + b");
    assert_eq!(compiled.free_variables, names(&["a", "b"]));
    assert!(compiled.assignment.is_none());
    assert!(!compiled.is_program());
}

#[test]
fn test_typed_fraction() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Fraction).unwrap();
    doc.insert_text("1").unwrap();
    doc.set_cursor(7);
    doc.insert_text("2").unwrap();
    let compiled = compile(doc.tokens()).unwrap();
    assert_eq!(
        compiled.statement,
        Statement::Expr(Expr::binary(
            BinaryOp::Div,
            Expr::Number(1.0),
            Expr::Number(2.0)
        ))
    );
    assert!(compiled.free_variables.is_empty());
}

#[test]
fn test_placeholder_is_incomplete() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Fraction).unwrap();
    doc.insert_text("1").unwrap();
    let err = compile(doc.tokens()).unwrap_err();
    assert!(matches!(err, CompileError::Incomplete { .. }));
}

#[test]
fn test_indexed_assignment_collects_index_variables() {
    let tokens = vec![
        g("x"),
        k(K::IndexStart),
        g("i"),
        k(K::IndexEnd),
        g(":="),
        g("y"),
        k(K::IndexStart),
        g("i"),
        k(K::IndexEnd),
        g("+"),
        g("1"),
    ];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.assignment.as_deref(), Some("x"));
    assert_eq!(compiled.free_variables, names(&["y"]));
    assert_eq!(compiled.index_variables, vec!["i".to_string()]);
    assert_eq!(compiled.to_string(), "x[i] := y[i] + 1");
    assert_eq!(compiled.dependencies(), names(&["i", "y"]));
}

#[test]
fn test_index_slice_and_step() {
    let tokens = vec![
        g("v"),
        k(K::IndexStart),
        g("0"),
        g(":"),
        g("4"),
        g(":"),
        g("2"),
        k(K::IndexEnd),
    ];
    let compiled = compile(&tokens).unwrap();
    let Statement::Expr(Expr::Index { indices, .. }) = &compiled.statement else {
        panic!("expected an index, got {:?}", compiled.statement);
    };
    assert_eq!(
        indices,
        &vec![IndexItem::Slice {
            start: Expr::Number(0.0),
            end: Expr::Number(4.0),
            step: Some(Expr::Number(2.0)),
        }]
    );
    assert!(compiled.index_variables.is_empty());
}

#[test]
fn test_range_with_step() {
    let tokens = vec![g("1"), g(";"), g("9"), g(","), g("2")];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.to_string(), "1;9,2");
}

#[test]
fn test_function_definition_binds_parameters() {
    let tokens = vec![
        g("f"),
        k(K::LeftParen),
        k(K::BodyStart),
        g("x"),
        g(","),
        g("y"),
        k(K::BodyEnd),
        k(K::RightParen),
        g(":="),
        g("x"),
        g("*"),
        g("y"),
        g("+"),
        g("c"),
    ];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.defined_function.as_deref(), Some("f"));
    assert_eq!(compiled.provides(), Some("f"));
    assert_eq!(compiled.free_variables, names(&["c"]));
    let Statement::Define { params, body, .. } = &compiled.statement else {
        panic!("expected a definition");
    };
    assert_eq!(params, &vec!["x".to_string(), "y".to_string()]);
    assert!(matches!(body, FunctionBody::Expr(_)));
}

#[test]
fn test_call_records_function() {
    let tokens = vec![
        g("2"),
        g("g"),
        k(K::LeftParen),
        k(K::BodyStart),
        g("t"),
        k(K::BodyEnd),
        k(K::RightParen),
    ];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.called_functions, names(&["g"]));
    assert_eq!(compiled.free_variables, names(&["t"]));
    assert_eq!(compiled.to_string(), "2 * g(t)");
}

fn line(content: Vec<Token>, depth: usize) -> Vec<Token> {
    let mut out = vec![k(K::LineStart)];
    out.extend((0..depth).map(|_| Token::from(Glyph::shaped(GlyphShape::Indent))));
    out.extend(content);
    out.push(k(K::LineEnd));
    out
}

fn program(lines: Vec<Vec<Token>>) -> Vec<Token> {
    let mut out = vec![k(K::ProgramStart), k(K::ProgramBodyStart)];
    out.extend(lines.into_iter().flatten());
    out.extend([k(K::ProgramBodyEnd), k(K::ProgramEnd)]);
    out
}

#[test]
fn test_program_with_if_else() {
    let mut tokens = vec![g("s"), g(":=")];
    tokens.extend(program(vec![
        line(vec![g("if "), g("x"), g(">"), g("0")], 0),
        line(vec![g("1")], 1),
        line(vec![g("else")], 0),
        line(vec![g("-"), g("1")], 1),
    ]));
    let compiled = compile(&tokens).unwrap();
    assert!(compiled.is_program());
    assert_eq!(compiled.free_variables, names(&["x"]));
    let Statement::AssignProgram { target, program, .. } = &compiled.statement else {
        panic!("expected a program assignment");
    };
    assert_eq!(target, "s");
    let Block(statements) = program;
    assert_eq!(statements.len(), 1);
    let ProgramStatement::If {
        branches,
        otherwise,
    } = &statements[0]
    else {
        panic!("expected an if");
    };
    assert_eq!(branches.len(), 1);
    assert!(otherwise.is_some());
    assert_eq!(
        compiled.to_string(),
        "s := program:\n    if x > 0:\n        1\n    else:\n        -1\n"
    );
}

#[test]
fn test_program_locals_are_not_free() {
    let tokens = program(vec![
        line(vec![g("t"), g(":="), g("0")], 0),
        line(vec![g("for "), g("k"), g(" in "), g("1"), g(";"), g("n")], 0),
        line(vec![g("t"), g(":="), g("t"), g("+"), g("k")], 1),
        line(vec![g("return "), g("t")], 0),
    ]);
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.free_variables, names(&["n"]));
}

#[test]
fn test_else_without_if_is_rejected() {
    let tokens = program(vec![line(vec![g("else")], 0), line(vec![g("1")], 1)]);
    let err = compile(&tokens).unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }), "{err}");
}

#[test]
fn test_unexpected_indentation_is_rejected() {
    let tokens = program(vec![line(vec![g("1")], 0), line(vec![g("2")], 1)]);
    let err = compile(&tokens).unwrap_err();
    assert!(err.to_string().contains("indentation"), "{err}");
}

#[test]
fn test_sum_binds_its_variable() {
    let tokens = vec![
        k(K::SumStart),
        k(K::FromStart),
        k(K::SumVarStart),
        g("k"),
        k(K::SumVarEnd),
        k(K::SumFromValStart),
        g("1"),
        k(K::SumFromValEnd),
        k(K::FromEnd),
        k(K::SumToStart),
        g("n"),
        k(K::SumToEnd),
        k(K::SumBodyStart),
        g("k"),
        g("*"),
        g("a"),
        k(K::SumBodyEnd),
        k(K::SumEnd),
    ];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.free_variables, names(&["a", "n"]));
    assert_eq!(compiled.to_string(), "sum(k = 1..n, k * a)");
}

#[test]
fn test_integral_binds_and_derivative_reads() {
    let integral = vec![
        k(K::IntegralStart),
        k(K::IntFromStart),
        g("0"),
        k(K::IntFromEnd),
        k(K::IntToStart),
        g("b"),
        k(K::IntToEnd),
        k(K::IntBodyStart),
        g("t"),
        k(K::IntBodyEnd),
        k(K::IntVarStart),
        g("t"),
        k(K::IntVarEnd),
        k(K::IntegralEnd),
    ];
    let compiled = compile(&integral).unwrap();
    assert_eq!(compiled.free_variables, names(&["b"]));

    let derivative = vec![
        k(K::DivideStart),
        k(K::NumStart),
        k(K::DeeStart),
        g("x"),
        g("*"),
        g("x"),
        k(K::DeeEnd),
        k(K::NumEnd),
        k(K::DenomStart),
        k(K::DeeStart),
        g("x"),
        k(K::DeeEnd),
        k(K::DenomEnd),
        k(K::DivideEnd),
    ];
    let compiled = compile(&derivative).unwrap();
    assert_eq!(compiled.free_variables, names(&["x"]));
    assert!(matches!(compiled.statement, Statement::Expr(Expr::Derivative { .. })));
}

#[test]
fn test_substitution_hides_bound_names() {
    let tokens = vec![
        k(K::SubstitutionStart),
        k(K::BodyStart),
        g("x"),
        g("+"),
        g("y"),
        k(K::BodyEnd),
        k(K::BodyStart),
        g("x"),
        g("=="),
        g("2"),
        k(K::BodyEnd),
        k(K::SubstitutionEnd),
    ];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(compiled.free_variables, names(&["y"]));
    let Statement::Expr(Expr::Substitute { bindings, .. }) = &compiled.statement else {
        panic!("expected a substitution");
    };
    assert_eq!(bindings, &vec![("x".to_string(), Expr::Number(2.0))]);
}

#[test]
fn test_unary_minus_binds_before_power() {
    let tokens = vec![g("-"), g("x"), k(K::PowerStart), g("2"), k(K::PowerEnd)];
    let compiled = compile(&tokens).unwrap();
    assert_eq!(
        compiled.statement,
        Statement::Expr(Expr::binary(
            BinaryOp::Pow,
            Expr::unary(mathsheet_compiler::UnaryOp::Neg, var("x")),
            Expr::Number(2.0)
        ))
    );
}

#[test]
fn test_unknown_text_is_a_lex_error() {
    let tokens = vec![g("a"), g("+"), g("$")];
    let err = compile(&tokens).unwrap_err();
    assert_eq!(
        err,
        CompileError::Lex {
            position: 2,
            text: "$".to_string()
        }
    );
}

#[test]
fn test_dangling_operator_is_a_parse_error() {
    let tokens = vec![g("a"), g("+")];
    let err = compile(&tokens).unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
}
