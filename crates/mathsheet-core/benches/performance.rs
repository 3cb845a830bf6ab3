use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use mathsheet_core::{Command, CommandExecutor, Construct, Document, EditCommand};

/// A long equation: a sum of fractions with a matrix at the end.
fn large_equation(terms: usize) -> Document {
    let mut doc = Document::new();
    for i in 0..terms {
        if i > 0 {
            doc.insert_text("+").unwrap();
        }
        doc.insert_construct(Construct::Fraction).unwrap();
        doc.insert_text(&format!("x{i}")).unwrap();
        doc.set_cursor(doc.len() - 2);
        doc.insert_text("2").unwrap();
        doc.set_cursor(doc.len());
    }
    doc.insert_text("+").unwrap();
    doc.insert_construct(Construct::Matrix { rows: 3, cols: 3 })
        .unwrap();
    doc
}

fn bench_layout(c: &mut Criterion) {
    let mut doc = large_equation(200);
    c.bench_function("layout/200_fractions", |b| {
        b.iter(|| {
            black_box(doc.relayout());
        })
    });
}

fn bench_typing(c: &mut Criterion) {
    c.bench_function("typing/100_glyphs_in_fraction", |b| {
        b.iter_batched(
            || {
                let mut executor = CommandExecutor::empty();
                executor
                    .execute(Command::Construct(Construct::Fraction))
                    .unwrap();
                executor
            },
            |mut executor| {
                for _ in 0..100 {
                    executor
                        .execute(Command::Edit(EditCommand::InsertText {
                            text: "a".to_string(),
                        }))
                        .unwrap();
                }
                black_box(executor.document().len());
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_serialize(c: &mut Criterion) {
    let doc = large_equation(100);
    c.bench_function("serialize/round_trip_100_fractions", |b| {
        b.iter(|| {
            let json = doc.to_json().unwrap();
            black_box(Document::from_json(&json).unwrap());
        })
    });
}

criterion_group!(benches, bench_layout, bench_typing, bench_serialize);
criterion_main!(benches);
