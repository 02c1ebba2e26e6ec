//! Property-based tests for grammar trees, quoting and compiled parsers
//!
//! These tests use proptest to generate random grammars and inputs and check
//! the laws every compiled parser must obey.

#![cfg(test)]

use proptest::prelude::*;

use arbor::grammar::{GrammarBuilder, Node, Quantity};
use arbor::testing::{Machine, MachineConfig, compile_program};

fn identifier() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}"
}

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        "[a-z\"\\\\\n #{}]{0,6}".prop_map(Node::literal),
        "[a-z]{1,4}".prop_map(Node::literal_ci),
        prop::sample::select(vec!["[a-z]", "[0-9]", "[^\"]", "\\s", "[/]"]).prop_map(Node::char_class),
        Just(Node::any_char()),
        identifier().prop_map(Node::reference),
    ]
}

fn node() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Node::seq),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Node::choice),
            (any::<bool>(), inner.clone()).prop_map(|(more, child)| {
                let quantity = if more { Quantity::OneOrMore } else { Quantity::ZeroOrMore };
                Node::repeat(quantity, child)
            }),
            inner.clone().prop_map(Node::maybe),
            inner.clone().prop_map(Node::lookahead),
            inner.clone().prop_map(Node::not),
            (identifier(), inner.clone()).prop_map(|(name, child)| Node::label(name, child)),
            (identifier(), inner.clone()).prop_map(|(name, child)| Node::action(name, child)),
            inner.prop_map(|child| Node::extend("Lang.Node", child)),
        ]
    })
}

/// Read back a double-quoted Ruby literal.
fn unquote_ruby(literal: &str) -> Option<String> {
    let body = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut text = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return None,
            '#' if matches!(chars.clone().next(), Some('{' | '$' | '@')) => return None,
            '\\' => text.push(match chars.next()? {
                'a' => '\x07',
                'b' => '\x08',
                't' => '\t',
                'n' => '\n',
                'v' => '\x0b',
                'f' => '\x0c',
                'r' => '\r',
                'e' => '\x1b',
                'x' => {
                    let hex: String = chars.by_ref().take(2).collect();
                    char::from(u8::from_str_radix(&hex, 16).ok()?)
                }
                c => c,
            }),
            c => text.push(c),
        }
    }
    Some(text)
}

proptest! {
    #[test]
    fn prop_sexp_round_trip(node in node()) {
        let value = node.to_sexp();
        prop_assert_eq!(Node::from_sexp(&value).unwrap(), node.clone());

        let text = serde_json::to_string(&value).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(Node::from_sexp(&reparsed).unwrap(), node);
    }

    #[cfg(feature = "backend-ruby")]
    #[test]
    fn prop_ruby_quote_reads_back(text in "\\PC*|[\\x00-\\x1f\\\\\"#{$@]{0,12}") {
        let quoted = arbor::backend::ruby::quote(&text);
        prop_assert!(!quoted.contains('\n'));
        prop_assert_eq!(unquote_ruby(&quoted), Some(text));
    }

    #[test]
    fn prop_repetition_collects_k_matches(
        literal in "[a-z]{1,4}",
        count in 0usize..6,
        one_or_more in any::<bool>(),
    ) {
        let quantity = if one_or_more { Quantity::OneOrMore } else { Quantity::ZeroOrMore };
        let grammar = GrammarBuilder::new("Rep")
            .rule("root", Node::repeat(quantity, Node::literal(literal.as_str())))
            .build()
            .unwrap();
        let program = compile_program(&grammar).unwrap();
        let machine = Machine::new(&program).unwrap();
        let input = literal.repeat(count);

        match machine.parse(&input) {
            Ok(tree) => {
                prop_assert!(count >= usize::from(quantity.minimum()));
                let root = tree.as_node().unwrap();
                prop_assert_eq!(&root.text, &input);
                prop_assert_eq!(root.elements.len(), count);
                for (i, element) in root.elements.iter().enumerate() {
                    let element = element.as_node().unwrap();
                    prop_assert_eq!(element.offset, i * literal.len());
                    prop_assert_eq!(&element.text, &literal);
                }
            }
            Err(err) => {
                prop_assert!(one_or_more && count == 0, "unexpected failure: {}", err);
                prop_assert_eq!(err.as_parse_failure().unwrap().offset, 0);
            }
        }
    }

    #[test]
    fn prop_memoization_does_not_change_results(input in "[ab()]{0,12}") {
        // list <- "(" item* ")" ; item <- list / "a" / "b"
        let grammar = GrammarBuilder::new("Lists")
            .rule(
                "list",
                Node::seq([
                    Node::literal("("),
                    Node::zero_or_more(Node::reference("item")),
                    Node::literal(")"),
                ]),
            )
            .rule(
                "item",
                Node::choice([Node::reference("list"), Node::literal("a"), Node::literal("b")]),
            )
            .build()
            .unwrap();
        let program = compile_program(&grammar).unwrap();
        let memoized = Machine::new(&program).unwrap().parse(&input);
        let plain = Machine::with_config(
            &program,
            MachineConfig { enable_memoization: false, ..MachineConfig::default() },
        )
        .unwrap()
        .parse(&input);
        prop_assert_eq!(memoized, plain);
    }

    #[test]
    fn prop_failures_point_inside_input(input in "[a-c\n]{0,16}") {
        let grammar = GrammarBuilder::new("Abc")
            .rule(
                "root",
                Node::zero_or_more(Node::seq([Node::literal("a"), Node::maybe(Node::literal("b"))])),
            )
            .build()
            .unwrap();
        let program = compile_program(&grammar).unwrap();
        if let Err(err) = Machine::new(&program).unwrap().parse(&input) {
            let failure = err.as_parse_failure().unwrap();
            prop_assert!(failure.offset <= input.chars().count());
            prop_assert!(!failure.expected.is_empty());
            prop_assert_eq!(failure.message.lines().count(), 3);
            prop_assert!(failure.message.ends_with('^'));
        }
    }
}
