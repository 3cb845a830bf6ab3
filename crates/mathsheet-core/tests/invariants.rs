use mathsheet_core::{
    Caret, CommandError, Construct, Document, LimitSide, ProgramWord, ResultValue, is_balanced,
    rebuild_matches, same_structure,
};
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

const CHARS: &[&str] = &[
    "a", "b", "x", "1", "2", ".", "+", "-", "*", "/", "^", "(", ")", "[", ",", "=", ":", "'", " ",
    "_", ";", "<", "!",
];

const SYMBOLS: &[&str] = &["__alpha__", "__pi__", "__infinity__"];

/// Every construct without a size.
const FIXED_CONSTRUCTS: &[Construct] = &[
    Construct::Fraction,
    Construct::Parenthesis,
    Construct::SquareRoot,
    Construct::NthRoot,
    Construct::Absolute,
    Construct::Determinant,
    Construct::Norm,
    Construct::Floor,
    Construct::Ceil,
    Construct::Average,
    Construct::Vectorize,
    Construct::MatrixSum,
    Construct::Power,
    Construct::Index,
    Construct::Subscript,
    Construct::Superscript,
    Construct::Transpose,
    Construct::Conjugate,
    Construct::Hermitian,
    Construct::DotProduct,
    Construct::Convolution,
    Construct::Sum,
    Construct::Product,
    Construct::RangeSum,
    Construct::RangeProduct,
    Construct::Integral,
    Construct::IndefiniteIntegral,
    Construct::Derivative,
    Construct::Limit(LimitSide::Plus),
    Construct::Limit(LimitSide::Minus),
    Construct::Substitution,
    Construct::Program,
];

fn constructs() -> Vec<Construct> {
    vec![
        Construct::Fraction,
        Construct::Parenthesis,
        Construct::SquareRoot,
        Construct::NthRoot,
        Construct::Absolute,
        Construct::Norm,
        Construct::Floor,
        Construct::Power,
        Construct::Index,
        Construct::Transpose,
        Construct::Convolution,
        Construct::Matrix { rows: 2, cols: 2 },
        Construct::Array { rows: 1, cols: 3 },
        Construct::Sum,
        Construct::RangeProduct,
        Construct::Integral,
        Construct::Derivative,
        Construct::Limit(LimitSide::Minus),
        Construct::Program,
    ]
}

fn random_construct(rng: &mut StdRng) -> Construct {
    let fixed = FIXED_CONSTRUCTS.len();
    match rng.gen_range(0..fixed + 4) {
        k if k < fixed => FIXED_CONSTRUCTS[k],
        k if k == fixed => Construct::Matrix {
            rows: rng.gen_range(1..=3),
            cols: rng.gen_range(1..=3),
        },
        k if k == fixed + 1 => Construct::Array {
            rows: rng.gen_range(1..=3),
            cols: rng.gen_range(1..=3),
        },
        // Program words only land inside a program line, so they are drawn more often.
        _ => Construct::Word(ProgramWord::ALL[rng.gen_range(0..ProgramWord::ALL.len())]),
    }
}

/// Where a randomized run is: seed and step.
type At = (u64, usize);

fn check(doc: &Document, at: At, op: &str) {
    assert!(is_balanced(doc.tokens()), "unbalanced at {at:?} ({op})");
    let mut fresh = doc.tokens().to_vec();
    rebuild_matches(&mut fresh).unwrap();
    assert!(
        same_structure(&fresh, doc.tokens()),
        "stale partners at {at:?} ({op})"
    );
    match doc.caret() {
        Caret::Insert(index) => assert!(index <= doc.len(), "cursor out of range at {at:?}"),
        Caret::Select(selection) => {
            assert!(selection.left <= selection.right, "inverted selection at {at:?}");
            assert!(selection.right < doc.len(), "selection out of range at {at:?}")
        }
    }
}

fn tolerate(result: Result<bool, CommandError>, at: At, op: &str) {
    match result {
        Ok(_) | Err(CommandError::NotAllowed(_)) => {}
        Err(err) => panic!("{op} at {at:?} failed: {err}"),
    }
}

fn round_trip(doc: &Document, at: At) -> Document {
    let json = doc.to_json().unwrap();
    let back = Document::from_json(&json).unwrap();
    assert!(
        same_structure(doc.tokens(), back.tokens()),
        "reloading changed the tokens at {at:?}"
    );
    assert_eq!(back.result_string(), doc.result_string(), "{at:?}");
    back
}

fn random_step(doc: &mut Document, rng: &mut StdRng, at: At) -> &'static str {
    let roll = rng.gen_range(0..100);
    if roll < 30 {
        let ch = CHARS[rng.gen_range(0..CHARS.len())];
        tolerate(doc.insert_char(ch), at, ch);
        "char"
    } else if roll < 34 {
        let tag = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
        tolerate(doc.insert_symbol(tag), at, tag);
        "symbol"
    } else if roll < 50 {
        let construct = random_construct(rng);
        tolerate(doc.insert_construct(construct), at, "construct");
        "construct"
    } else if roll < 64 {
        tolerate(doc.backspace(), at, "backspace");
        "backspace"
    } else if roll < 78 {
        match rng.gen_range(0..6) {
            0 => doc.move_left(),
            1 => doc.move_right(),
            2 => doc.move_up(),
            3 => doc.move_down(),
            4 => doc.move_home(),
            _ => doc.move_end(),
        }
        "move"
    } else if roll < 84 {
        let bounds = doc.bounds();
        let x = rng.gen_range(bounds.left - 4.0..=bounds.right + 4.0);
        let y = rng.gen_range(bounds.top - 4.0..=bounds.bottom + 4.0);
        doc.click(x, y);
        "click"
    } else if roll < 90 && !doc.is_empty() {
        let a = rng.gen_range(0..doc.len());
        let b = rng.gen_range(0..doc.len());
        doc.select_range(a, b);
        "select"
    } else if roll < 94 {
        tolerate(doc.newline(), at, "newline");
        "newline"
    } else if roll < 97 {
        let value = ResultValue::real(rng.gen_range(-1.0e6..1.0e6));
        tolerate(doc.set_result(&value, 4), at, "result");
        "result"
    } else {
        *doc = round_trip(doc, at);
        "reload"
    }
}

#[test]
fn random_edits_keep_structure_balanced() {
    let _ = tracing_subscriber::fmt::try_init();
    for seed in 0..2000u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut doc = Document::new();
        for step in 0..100 {
            let op = random_step(&mut doc, &mut rng, (seed, step));
            check(&doc, (seed, step), op);
        }
        round_trip(&doc, (seed, 100));
    }
}

#[test]
fn random_edits_inside_programs_keep_structure_balanced() {
    for seed in 0..500u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut doc = Document::new();
        doc.insert_construct(Construct::Program).unwrap();
        for step in 0..60 {
            let op = random_step(&mut doc, &mut rng, (seed, step));
            check(&doc, (seed, step), op);
        }
    }
}

#[test]
fn insert_then_backspace_is_identity() {
    let contexts = ["", "a", "a+", "x*", "2"];
    for context in contexts {
        for construct in constructs() {
            if matches!(construct, Construct::Program | Construct::Limit(_)) {
                continue;
            }
            let mut doc = Document::new();
            doc.insert_text(context).unwrap();
            let before = doc.tokens().to_vec();
            let cursor = doc.cursor();
            doc.insert_construct(construct).unwrap();
            doc.backspace().unwrap();
            if doc.selection().is_some() {
                // Constructs without a placeholder are selected first.
                doc.backspace().unwrap();
            }
            assert!(
                same_structure(&before, doc.tokens()),
                "{construct:?} after {context:?}"
            );
            assert_eq!(doc.cursor(), cursor, "{construct:?} after {context:?}");
        }
    }
}

#[test]
fn layout_is_idempotent() {
    let mut doc = Document::new();
    doc.insert_construct(Construct::Sum).unwrap();
    doc.insert_text("k").unwrap();
    doc.move_right();
    doc.insert_construct(Construct::Fraction).unwrap();
    doc.insert_text("1").unwrap();

    let first = doc.relayout();
    let tokens = doc.tokens().to_vec();
    let second = doc.relayout();
    assert_eq!(first, second);
    assert_eq!(tokens, doc.tokens());
}

#[test]
fn serialization_round_trip() {
    let mut doc = Document::new();
    doc.insert_text("y").unwrap();
    doc.insert_construct(Construct::Index).unwrap();
    doc.insert_text("i").unwrap();
    doc.move_right();
    doc.insert_char(":").unwrap();
    doc.insert_construct(Construct::Matrix { rows: 2, cols: 2 }).unwrap();
    doc.set_result(&ResultValue::real(3.0), 4).unwrap();

    let json = doc.to_json().unwrap();
    let back = Document::from_json(&json).unwrap();
    assert!(same_structure(doc.tokens(), back.tokens()));
    assert_eq!(back.flags(), doc.flags());
    assert_eq!(back.result_string(), doc.result_string());
    assert_eq!(back.to_json().unwrap(), json);
}
