use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use arbor::backend::program::ProgramBuilder;
#[cfg(feature = "backend-ruby")]
use arbor::backend::ruby::RubyBuilder;
use arbor::compile;
use arbor::grammar::{Grammar, GrammarBuilder, Node};
use arbor::testing::{Machine, compile_program};

/// Arithmetic with precedence and parentheses, one labelled sequence per level.
fn arithmetic() -> Grammar {
    let binary = |operand: &str, ops: [&str; 2]| {
        Node::seq([
            Node::label("first", Node::reference(operand)),
            Node::label(
                "rest",
                Node::zero_or_more(Node::seq([
                    Node::label("op", Node::choice(ops.map(Node::literal))),
                    Node::label("operand", Node::reference(operand)),
                ])),
            ),
        ])
    };
    GrammarBuilder::new("Arithmetic")
        .rule("expr", binary("term", ["+", "-"]))
        .rule("term", binary("factor", ["*", "/"]))
        .rule(
            "factor",
            Node::choice([
                Node::seq([Node::literal("("), Node::reference("expr"), Node::literal(")")]),
                Node::reference("number"),
            ]),
        )
        .rule("number", Node::one_or_more(Node::char_class("[0-9]")))
        .build()
        .expect("benchmark grammar is valid")
}

/// `1+2*3-...` with nested parentheses every few terms.
fn expression(terms: usize) -> String {
    let mut input = String::from("1");
    for i in 1..terms {
        let op = ["+", "-", "*", "/"][i % 4];
        if i % 5 == 0 {
            input.push_str(&format!("{op}({i}+{i})"));
        } else {
            input.push_str(&format!("{op}{i}"));
        }
    }
    input
}

fn bench_compile(c: &mut Criterion) {
    let grammar = arithmetic();
    let mut group = c.benchmark_group("compile");

    group.bench_function("program", |b| {
        b.iter(|| compile(black_box(&grammar), ProgramBuilder::new("arithmetic.peg")).unwrap());
    });
    #[cfg(feature = "backend-ruby")]
    group.bench_function("ruby", |b| {
        b.iter(|| compile(black_box(&grammar), RubyBuilder::new("arithmetic.peg")).unwrap());
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let program = compile_program(&arithmetic()).expect("benchmark grammar compiles");
    let machine = Machine::new(&program).expect("program loads");
    let mut group = c.benchmark_group("parse");

    for terms in [10, 100, 1000] {
        let input = expression(terms);
        group.bench_with_input(BenchmarkId::from_parameter(terms), &input, |b, input| {
            b.iter(|| machine.parse(black_box(input)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_parse);
criterion_main!(benches);
