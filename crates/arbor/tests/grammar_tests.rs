//! Tests for grammar construction, the serialized form and validation

use serde_json::json;

use arbor::error::CompileError;
use arbor::grammar::{Grammar, GrammarBuilder, Node, collect_node_classes};
use arbor::testing::{Machine, compile_program};

fn calculator() -> serde_json::Value {
    json!([
        "grammar", "Calc",
        ["rule", "sum", ["sequence",
            ["label", "first", ["reference", "number"]],
            ["label", "rest", ["repeat", 0, ["sequence",
                ["label", "op", ["choice", ["string", "+"], ["string", "-"]]],
                ["label", "operand", ["reference", "number"]]]]]]],
        ["rule", "number", ["type", "Calc.Number", ["repeat", 1, ["char-class", "[0-9]"]]]]
    ])
}

#[test]
fn test_serialized_grammar_compiles_and_runs() {
    let grammar = Grammar::from_sexp(&calculator()).unwrap();
    assert_eq!(grammar.name(), "Calc");
    assert_eq!(grammar.entry_point().name, "sum");

    let program = compile_program(&grammar).unwrap();
    let machine = Machine::new(&program).unwrap();
    let tree = machine.parse("12+3-45").unwrap();
    let sum = tree.as_node().unwrap();
    assert_eq!(sum.class.as_deref(), Some("TreeNode1"));

    let first = sum.get("first").and_then(|tree| tree.as_node()).unwrap();
    assert_eq!(first.text, "12");
    assert!(first.has_type("Calc.Number"));

    let rest = sum.get("rest").and_then(|tree| tree.as_node()).unwrap();
    let ops: Vec<_> = rest
        .elements
        .iter()
        .map(|pair| {
            let pair = pair.as_node().unwrap();
            assert_eq!(pair.class.as_deref(), Some("TreeNode2"));
            let op = pair.get("op").and_then(|tree| tree.as_node()).unwrap();
            let operand = pair.get("operand").and_then(|tree| tree.as_node()).unwrap();
            format!("{}{}", op.text, operand.text)
        })
        .collect();
    assert_eq!(ops, ["+3", "-45"]);
}

#[test]
fn test_grammar_round_trips_through_json_text() {
    let grammar = Grammar::from_sexp(&calculator()).unwrap();
    let text = serde_json::to_string_pretty(&grammar.to_sexp()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(Grammar::from_sexp(&value).unwrap(), grammar);
}

#[test]
fn test_entry_point_round_trips_in_declaration_order() {
    let grammar = GrammarBuilder::new("G")
        .rule("helper", Node::literal("x"))
        .rule("main", Node::reference("helper"))
        .entry_point("main")
        .build()
        .unwrap();
    let value = grammar.to_sexp();
    assert_eq!(value[2][1], "helper");
    assert_eq!(value[4], json!(["entry", "main"]));

    let reloaded = Grammar::from_sexp(&value).unwrap();
    assert_eq!(reloaded, grammar);
    assert_eq!(reloaded.entry_point().name, "main");
    let names: Vec<_> = reloaded.rules().iter().map(|rule| rule.name.as_str()).collect();
    assert_eq!(names, ["helper", "main"]);
}

#[test]
fn test_entry_must_be_last() {
    let err = Grammar::from_sexp(&json!([
        "grammar", "G",
        ["entry", "a"],
        ["rule", "a", ["string", "x"]]
    ]))
    .unwrap_err();
    assert!(
        matches!(&err, CompileError::MalformedNode { path, .. } if path == "$[2]"),
        "{err:?}"
    );
}

#[test]
fn test_node_classes_follow_rule_order() {
    let grammar = Grammar::from_sexp(&calculator()).unwrap();
    let classes: Vec<_> = collect_node_classes(&grammar)
        .into_iter()
        .map(|class| {
            let labels: Vec<_> = class.labels.iter().map(|(name, index)| format!("{name}@{index}")).collect();
            format!("{}({})", class.name, labels.join(","))
        })
        .collect();
    assert_eq!(classes, ["TreeNode1(first@0,rest@1)", "TreeNode2(op@0,operand@1)"]);
}

#[test]
fn test_unresolved_reference() {
    let err = GrammarBuilder::new("G")
        .rule("a", Node::seq([Node::literal("x"), Node::reference("b")]))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnresolvedReference {
            rule: "a".to_owned(),
            reference: "b".to_owned(),
        }
    );
    assert_eq!(err.rule(), Some("a"));
    assert_eq!(err.to_string(), "rule `a` references undefined rule `b`");
}

#[test]
fn test_serialized_errors_name_the_node() {
    let err = Grammar::from_sexp(&json!(["sequence", ["string", "a"], ["repeat", 0]])).unwrap_err();
    assert!(
        matches!(&err, CompileError::MalformedNode { path, .. } if path == "$[2]"),
        "{err:?}"
    );
    assert_eq!(err.rule(), None);

    let err = Grammar::from_sexp(&json!(["grammar", "G", ["rule", "a", ["regex", "x"]]])).unwrap_err();
    assert_eq!(err.to_string(), "unknown grammar tag `regex` at $[2][2]");
}

#[test]
fn test_invalid_names_and_classes() {
    let bad = |node: Node| GrammarBuilder::new("G").rule("r", node).build().unwrap_err();

    assert!(matches!(
        bad(Node::label("not valid", Node::any_char())),
        CompileError::InvalidName { kind: "label", .. }
    ));
    assert!(matches!(
        bad(Node::action("1st", Node::any_char())),
        CompileError::InvalidName { kind: "action", .. }
    ));
    assert!(matches!(
        bad(Node::extend("Calc..Number", Node::any_char())),
        CompileError::InvalidName { kind: "type", .. }
    ));
    assert!(matches!(
        bad(Node::char_class("[a-")),
        CompileError::InvalidCharClass { .. }
    ));
    assert!(matches!(
        GrammarBuilder::new("G").rule("bad-name", Node::any_char()).build(),
        Err(CompileError::InvalidName { kind: "rule", .. })
    ));
}

#[test]
fn test_grammar_names_must_be_constants() {
    for name in ["greeting", "", "a b", "Calc.parser", "Calc..Parser", "Calc-Parser"] {
        let err = GrammarBuilder::new(name)
            .rule("r", Node::any_char())
            .build()
            .unwrap_err();
        assert!(
            matches!(&err, CompileError::InvalidGrammarName { name: found } if found == name),
            "{name:?}: {err:?}"
        );
    }
    for name in ["Greeting", "Calc.Parser", "X1_y"] {
        assert!(GrammarBuilder::new(name).rule("r", Node::any_char()).build().is_ok());
    }
}

#[test]
fn test_nullable_detection_follows_references() {
    let grammar = GrammarBuilder::new("G")
        .rule("list", Node::zero_or_more(Node::reference("item")))
        .rule("item", Node::maybe(Node::literal("x")))
        .build()
        .unwrap();
    assert!(Node::reference("item").is_nullable(&grammar));
    assert_eq!(
        compile_program(&grammar).unwrap_err(),
        CompileError::NullableRepetition {
            rule: "list".to_owned(),
        }
    );
}
