use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, criterion_group, criterion_main};

use quill::frontend::tokenizer::post_process::post_process;
use quill::frontend::tokenizer::tokenize;
use quill::registry::{OperatorEntry, OperatorImp, Registry, precedence};
use quill::Value;

fn registry() -> Registry {
    let mut r = Registry::new();
    let binary = |prec, left| OperatorEntry {
        precedence: prec,
        left_assoc: left,
        imp: OperatorImp::EagerBinary(Rc::new(|a: Value, b| a.add(&b))),
    };
    for surface in ["+", "-", "*", "/", "%"] {
        r.put_operator(surface, binary(precedence::MULTIPLICATIVE, true));
    }
    r.put_operator("=", binary(precedence::ASSIGN, false));
    r.put_operator("->", binary(precedence::DEFINE, false));
    r.put_operator(";", binary(precedence::SEQUENCE, true));
    r.put_operator("==", binary(precedence::EQUALITY, false));
    r.put_operator("<=", binary(precedence::COMPARISON, false));
    r
}

fn corpus(lines: usize) -> String {
    let mut out = String::new();
    for i in 0..lines {
        out.push_str(&format!(
            "x{i} = (x{i} + {i}) * 0xFF % 7; note{i} = 'line {i}\\t checked'; ",
        ));
    }
    out.push_str("x0");
    out
}

fn bench_tokenize(c: &mut Criterion) {
    let registry = registry();
    for lines in [10, 200] {
        let source = corpus(lines);
        let chars: Vec<char> = source.chars().collect();
        c.bench_function(&format!("tokenize/{lines}_stmts"), |b| {
            b.iter(|| tokenize(black_box(&chars), &registry, false, true).unwrap())
        });
        c.bench_function(&format!("tokenize_post_process/{lines}_stmts"), |b| {
            b.iter(|| post_process(tokenize(black_box(&chars), &registry, false, true).unwrap()))
        });
    }
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
