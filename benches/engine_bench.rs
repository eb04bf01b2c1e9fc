#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use microprove::{TablingEngine, Term};

fn chain_engine(len: usize) -> TablingEngine {
    let mut engine = TablingEngine::new();
    for i in 0..len {
        engine
            .add_fact(Term::app(
                "edge",
                [Term::atom(format!("n{i}")), Term::atom(format!("n{}", i + 1))],
            ))
            .unwrap();
    }
    engine
        .add_rule(
            Term::app("path", [Term::var("X"), Term::var("Y")]),
            Term::app("edge", [Term::var("X"), Term::var("Y")]),
        )
        .unwrap();
    engine
        .add_rule(
            Term::app("path", [Term::var("X"), Term::var("Z")]),
            Term::conj(
                Term::app("edge", [Term::var("X"), Term::var("Y")]),
                Term::app("path", [Term::var("Y"), Term::var("Z")]),
            ),
        )
        .unwrap();
    engine
}

/// Benchmark for loading a clause database
fn bench_add_clauses(c: &mut Criterion) {
    c.bench_function("add_clauses", |b| {
        b.iter(|| black_box(chain_engine(1000)));
    });
}

/// Benchmark for proof enumeration over a linear chain
fn bench_prove_chain(c: &mut Criterion) {
    let engine = chain_engine(50);
    let query = Term::app("path", [Term::atom("n0"), Term::var("T")]);

    c.bench_function("prove_chain", |b| {
        b.iter(|| black_box(engine.prove(black_box(&query))));
    });
}

/// Benchmark for proof enumeration over mutually recursive clauses
fn bench_prove_cyclic(c: &mut Criterion) {
    let mut engine = TablingEngine::new();
    for i in 0..20 {
        engine
            .add_fact(Term::app("a", [Term::atom(i.to_string())]))
            .unwrap();
        engine
            .add_fact(Term::app("d", [Term::atom(i.to_string())]))
            .unwrap();
    }
    engine
        .add_rule(
            Term::app("c", [Term::var("X")]),
            Term::conj(
                Term::app("a", [Term::var("X")]),
                Term::app("b", [Term::var("X")]),
            ),
        )
        .unwrap();
    engine
        .add_rule(Term::app("b", [Term::var("X")]), Term::app("d", [Term::var("X")]))
        .unwrap();
    engine
        .add_rule(Term::app("b", [Term::var("X")]), Term::app("c", [Term::var("X")]))
        .unwrap();

    let query = Term::app("c", [Term::var("X")]);
    c.bench_function("prove_cyclic", |b| {
        b.iter(|| black_box(engine.prove(black_box(&query))));
    });
}

criterion_group!(benches, bench_add_clauses, bench_prove_chain, bench_prove_cyclic);
criterion_main!(benches);
