#![no_main]
use arbor::grammar::{GrammarBuilder, Node};
use arbor::testing::{Machine, MachineConfig, compile_program};
use libfuzzer_sys::fuzz_target;

// JSON-ish values: value <- object / array / string / number / literal
fn grammar() -> arbor::Grammar {
    let ws = || Node::zero_or_more(Node::char_class("[ \\t\\n\\r]"));
    let list = |open: &str, item: Node, close: &str| {
        Node::seq([
            Node::literal(open),
            ws(),
            Node::maybe(Node::seq([
                item.clone(),
                Node::zero_or_more(Node::seq([Node::literal(","), ws(), item])),
            ])),
            Node::literal(close),
        ])
    };
    GrammarBuilder::new("Json")
        .rule(
            "value",
            Node::seq([
                Node::choice([
                    Node::reference("object"),
                    Node::reference("array"),
                    Node::reference("string"),
                    Node::reference("number"),
                    Node::literal("true"),
                    Node::literal("false"),
                    Node::literal("null"),
                ]),
                ws(),
            ]),
        )
        .rule(
            "object",
            list(
                "{",
                Node::seq([
                    Node::reference("string"),
                    ws(),
                    Node::literal(":"),
                    ws(),
                    Node::reference("value"),
                ]),
                "}",
            ),
        )
        .rule("array", list("[", Node::reference("value"), "]"))
        .rule(
            "string",
            Node::seq([
                Node::literal("\""),
                Node::zero_or_more(Node::choice([
                    Node::seq([Node::literal("\\"), Node::any_char()]),
                    Node::char_class("[^\"\\\\]"),
                ])),
                Node::literal("\""),
            ]),
        )
        .rule(
            "number",
            Node::seq([
                Node::maybe(Node::literal("-")),
                Node::one_or_more(Node::char_class("[0-9]")),
            ]),
        )
        .build()
        .expect("fuzz grammar is valid")
}

// Memoization must never change what a parse returns.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let program = compile_program(&grammar()).expect("fuzz grammar compiles");
    let memoized = Machine::new(&program).unwrap().parse(input);
    let plain = Machine::with_config(
        &program,
        MachineConfig {
            enable_memoization: false,
            ..MachineConfig::default()
        },
    )
    .unwrap()
    .parse(input);
    assert_eq!(memoized, plain);
});
