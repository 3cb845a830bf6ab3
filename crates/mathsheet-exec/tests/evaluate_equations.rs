use mathsheet_compiler::compile;
use mathsheet_core::{Document, Glyph, GlyphShape, Keyword, KeywordKind as K, Token};
use mathsheet_exec::{
    EquationId, EvalError, Grid, Interpreter, Shape, Submission, Value, Worker, evaluate,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn g(tag: &str) -> Token {
    Glyph::plain(tag).into()
}

fn k(kind: K) -> Token {
    Keyword::new(kind).into()
}

/// Glyphs for each character of `text`; keeps tests short for flat equations.
fn chars(text: &str) -> Vec<Token> {
    let mut doc = Document::new();
    doc.insert_text(text).unwrap();
    doc.tokens().to_vec()
}

fn run(interpreter: &mut Interpreter, tokens: &[Token]) -> Result<Option<Value>, EvalError> {
    let compiled = compile(tokens).unwrap();
    interpreter.run(&compiled)
}

fn value(interpreter: &mut Interpreter, tokens: &[Token]) -> Value {
    run(interpreter, tokens).unwrap().unwrap()
}

fn real(interpreter: &mut Interpreter, tokens: &[Token]) -> f64 {
    value(interpreter, tokens).as_real().unwrap()
}

fn concat(parts: Vec<Vec<Token>>) -> Vec<Token> {
    parts.into_iter().flatten().collect()
}

#[test]
fn test_precedence_and_assignment() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut interpreter = Interpreter::new();
    assert_eq!(real(&mut interpreter, &chars("2+3*4")), 14.0);
    assert_eq!(real(&mut interpreter, &chars("a:3")), 3.0);
    assert_eq!(real(&mut interpreter, &chars("2a-1")), 5.0);
    assert_eq!(
        interpreter.namespace().variable("a"),
        Some(&Value::real(3.0))
    );
}

#[test]
fn test_indexed_assignment_follows_index_length() {
    let mut interpreter = Interpreter::new();
    value(&mut interpreter, &chars("i:0;4"));
    value(&mut interpreter, &chars("y:i*2"));

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
    let Value::Grid(x) = value(&mut interpreter, &tokens) else {
        panic!("expected a grid");
    };
    assert_eq!(x.shape(), Shape::Vector(5));
    assert_eq!(Value::Grid(x).to_string(), "[1, 3, 5, 7, 9]");
}

#[test]
fn test_indexed_assignment_sees_earlier_cells() {
    let mut interpreter = Interpreter::new();
    value(&mut interpreter, &chars("n:1;5"));
    let seed = vec![
        g("f"),
        k(K::IndexStart),
        g("0"),
        k(K::IndexEnd),
        g(":="),
        g("1"),
    ];
    value(&mut interpreter, &seed);
    let recurrence = vec![
        g("f"),
        k(K::IndexStart),
        g("n"),
        k(K::IndexEnd),
        g(":="),
        g("2"),
        g("*"),
        g("f"),
        k(K::IndexStart),
        g("n"),
        g("-"),
        g("1"),
        k(K::IndexEnd),
    ];
    let grid = value(&mut interpreter, &recurrence);
    assert_eq!(grid.to_string(), "[1, 2, 4, 8, 16, 32]");
}

#[test]
fn test_hanging_index_builds_an_array() {
    let mut interpreter = Interpreter::new();
    value(&mut interpreter, &chars("i:0;2"));
    interpreter
        .namespace_mut()
        .set_variable("v", Value::Grid(Grid::reals([10.0, 20.0, 30.0])));
    let tokens = vec![
        g("v"),
        k(K::IndexStart),
        g("i"),
        k(K::IndexEnd),
        g("+"),
        g("i"),
    ];
    assert_eq!(value(&mut interpreter, &tokens).to_string(), "[10, 21, 32]");
}

#[test]
fn test_undefined_index_variable() {
    let mut interpreter = Interpreter::new();
    interpreter
        .namespace_mut()
        .set_variable("v", Value::Grid(Grid::reals([1.0])));
    let tokens = vec![g("v"), k(K::IndexStart), g("m"), k(K::IndexEnd)];
    assert_eq!(
        run(&mut interpreter, &tokens),
        Err(EvalError::UndefinedIndexVariable("m".into()))
    );
}

fn call(name: &str, arg: Vec<Token>) -> Vec<Token> {
    concat(vec![
        vec![g(name), k(K::LeftParen), k(K::BodyStart)],
        arg,
        vec![k(K::BodyEnd), k(K::RightParen)],
    ])
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
fn test_functions_and_recursive_programs() {
    let mut interpreter = Interpreter::new();
    let square = concat(vec![
        call("sq", vec![g("x")]),
        vec![g(":="), g("x"), k(K::PowerStart), g("2"), k(K::PowerEnd)],
    ]);
    assert_eq!(run(&mut interpreter, &square), Ok(None));
    assert_eq!(real(&mut interpreter, &call("sq", vec![g("3")])), 9.0);

    let fact = concat(vec![
        call("fact", vec![g("n")]),
        vec![g(":=")],
        program(vec![
            line(vec![g("if "), g("n"), g("<="), g("1")], 0),
            line(vec![g("return "), g("1")], 1),
            line(
                concat(vec![
                    vec![g("return "), g("n"), g("*")],
                    call("fact", vec![g("n"), g("-"), g("1")]),
                ]),
                0,
            ),
        ]),
    ]);
    run(&mut interpreter, &fact).unwrap();
    assert_eq!(real(&mut interpreter, &call("fact", vec![g("5")])), 120.0);

    let err = run(&mut interpreter, &call("sq", vec![g("1"), g(","), g("2")])).unwrap_err();
    assert!(matches!(err, EvalError::Arity { .. }), "{err}");
}

#[test]
fn test_program_running_value_and_loops() {
    let mut interpreter = Interpreter::new();
    let tokens = program(vec![
        line(vec![g("t"), g(":="), g("0")], 0),
        line(vec![g("for "), g("k"), g(" in "), g("1"), g(";"), g("10")], 0),
        line(vec![g("if "), g("k"), g(">"), g("4")], 1),
        line(vec![g("break")], 2),
        line(vec![g("t"), g(":="), g("t"), g("+"), g("k")], 1),
    ]);
    assert_eq!(real(&mut interpreter, &tokens), 10.0);
    assert!(interpreter.namespace().variable("t").is_none());
}

#[test]
fn test_calculus_forms() {
    let mut interpreter = Interpreter::new();
    let sum = vec![
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
        g("4"),
        k(K::SumToEnd),
        k(K::SumBodyStart),
        g("k"),
        k(K::SumBodyEnd),
        k(K::SumEnd),
    ];
    assert_eq!(real(&mut interpreter, &sum), 10.0);

    let integral = vec![
        k(K::IntegralStart),
        k(K::IntFromStart),
        g("0"),
        k(K::IntFromEnd),
        k(K::IntToStart),
        g("1"),
        k(K::IntToEnd),
        k(K::IntBodyStart),
        g("t"),
        g("*"),
        g("t"),
        k(K::IntBodyEnd),
        k(K::IntVarStart),
        g("t"),
        k(K::IntVarEnd),
        k(K::IntegralEnd),
    ];
    assert!((real(&mut interpreter, &integral) - 1.0 / 3.0).abs() < 1e-9);

    value(&mut interpreter, &chars("x:3"));
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
    assert!((real(&mut interpreter, &derivative) - 6.0).abs() < 1e-6);

    let limit = concat(vec![
        vec![
            k(K::LimitStart),
            g("-"),
            k(K::BodyStart),
            g("h"),
            k(K::BodyEnd),
            k(K::BodyStart),
            g("2"),
            k(K::BodyEnd),
            k(K::LimitEnd),
        ],
        call("floor", vec![g("h")]),
    ]);
    assert_eq!(real(&mut interpreter, &limit), 1.0);
}

#[test]
fn test_symbolic_forms_are_unavailable() {
    let mut interpreter = Interpreter::new();
    let indefinite = vec![
        k(K::IndefIntegralStart),
        k(K::IntBodyStart),
        g("t"),
        k(K::IntBodyEnd),
        k(K::IntVarStart),
        g("t"),
        k(K::IntVarEnd),
        k(K::IndefIntegralEnd),
    ];
    let err = run(&mut interpreter, &indefinite).unwrap_err();
    assert!(matches!(err, EvalError::SymbolicUnavailable(_)));
}

#[test]
fn test_missing_names_are_reported_before_running() {
    let mut interpreter = Interpreter::new();
    let compiled = compile(&chars("q+1")).unwrap();
    let response = evaluate(
        &mut interpreter,
        &Submission::new(EquationId(7), 3, compiled.clone()),
    );
    assert_eq!(response.equation, EquationId(7));
    assert_eq!(response.generation, 3);
    assert_eq!(response.value, None);
    assert_eq!(response.error.as_deref(), Some("name 'q' is not defined"));

    let mut symbolic = Submission::new(EquationId(7), 4, compiled);
    symbolic.force_symbolic = true;
    let response = evaluate(&mut interpreter, &symbolic);
    assert!(response.error.unwrap().starts_with("symbolic evaluation"));
}

#[test]
fn test_worker_answers_in_order() {
    let worker = Worker::spawn().unwrap();
    let assign = compile(&chars("a:2")).unwrap();
    let read = compile(&chars("a*a")).unwrap();
    worker
        .submit(Submission::new(EquationId(1), 1, assign))
        .unwrap();
    worker
        .submit(Submission::new(EquationId(2), 1, read.clone()))
        .unwrap();

    let first = worker.recv().unwrap();
    let second = worker.recv().unwrap();
    assert_eq!(first.equation, EquationId(1));
    assert_eq!(second.equation, EquationId(2));
    assert_eq!(second.value, Some(Value::real(4.0)));

    worker.forget("a").unwrap();
    worker
        .submit(Submission::new(EquationId(2), 2, read))
        .unwrap();
    let third = worker.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
    assert_eq!(third.generation, 2);
    assert!(third.error.is_some());
    assert!(worker.try_recv().unwrap().is_none());
}

fn indexed_update() -> Vec<Token> {
    vec![
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
    ]
}

#[test]
fn test_indexed_assignment_keeps_the_target_dimensionality() {
    let mut interpreter = Interpreter::new();
    value(&mut interpreter, &chars("i:0;4"));
    value(&mut interpreter, &chars("y:i*2"));
    let table = concat(vec![
        vec![g("x"), g(":=")],
        call("ones", vec![g("2"), g(","), g("2")]),
    ]);
    value(&mut interpreter, &table);

    assert_eq!(
        run(&mut interpreter, &indexed_update()),
        Err(EvalError::DimensionMismatch {
            expected: 2,
            found: 1
        })
    );
    let Some(Value::Grid(x)) = interpreter.namespace().variable("x") else {
        panic!("x should still be a grid");
    };
    assert_eq!(x.shape(), Shape::Table { rows: 2, cols: 2 });
}

#[test]
fn test_oversized_grids_are_refused() {
    let mut interpreter = Interpreter::new();
    let huge = call("zeros", vec![g("4294967296"), g(","), g("4294967296")]);
    let err = run(&mut interpreter, &huge).unwrap_err();
    assert!(matches!(err, EvalError::Domain(_)), "{err}");

    let err = run(&mut interpreter, &call("eye", vec![g("100000")])).unwrap_err();
    assert!(matches!(err, EvalError::Domain(_)), "{err}");

    let far = vec![
        g("v"),
        k(K::IndexStart),
        g("1000000000"),
        k(K::IndexEnd),
        g(":="),
        g("1"),
    ];
    let err = run(&mut interpreter, &far).unwrap_err();
    assert!(matches!(err, EvalError::Domain(_)), "{err}");
    assert!(interpreter.namespace().variable("v").is_none());

    assert_eq!(real(&mut interpreter, &chars("1+1")), 2.0);
}

#[test]
fn test_runaway_recursion_stops_at_the_depth_limit() {
    let worker = Worker::spawn().unwrap();
    let define = concat(vec![
        call("f", vec![g("n")]),
        vec![g(":=")],
        call("f", vec![g("n"), g("-"), g("1")]),
        vec![g("+"), g("1")],
    ]);
    let submit = |id: u64, tokens: &[Token]| {
        worker
            .submit(Submission::new(EquationId(id), 1, compile(tokens).unwrap()))
            .unwrap();
    };
    submit(1, &define);
    submit(2, &call("f", vec![g("3")]));
    submit(3, &chars("1+1"));

    let defined = worker.recv().unwrap();
    assert_eq!(defined.error, None);
    let called = worker.recv().unwrap();
    assert_eq!(
        called.error.as_deref(),
        Some("math domain error: maximum call depth exceeded")
    );
    let after = worker.recv().unwrap();
    assert_eq!(after.equation, EquationId(3));
    assert_eq!(after.value, Some(Value::real(2.0)));
}
