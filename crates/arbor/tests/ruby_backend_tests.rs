//! Tests for the Ruby backend's generated source

#![cfg(feature = "backend-ruby")]

use arbor::backend::VarIndex;
use arbor::backend::ruby::{RubyBuilder, RubyConfig};
use arbor::compiler::{CompileConfig, Compiler, compile};
use arbor::error::CompileError;
use arbor::grammar::{Grammar, GrammarBuilder, Node};

fn ruby(grammar: &Grammar) -> String {
    let output = compile(grammar, RubyBuilder::new("test.peg")).unwrap();
    output.get("test.rb").unwrap().to_owned()
}

fn single(node: Node) -> Grammar {
    GrammarBuilder::new("Test").rule("root", node).build().unwrap()
}

#[test]
fn test_literal_rule_method() {
    let grammar = GrammarBuilder::new("Foo")
        .rule("foo", Node::literal("foo"))
        .build()
        .unwrap();
    let expected = r#"    def _read_foo
      address0, index0 = FAILURE, @offset
      cached = @cache[:foo][index0]
      if cached
        @offset = cached[1]
        return cached[0]
      end
      chunk0, max0 = nil, @offset + 3
      if max0 <= @input_size
        chunk0 = @input[@offset...max0]
      end
      if chunk0 == "foo"
        address0 = TreeNode.new(@input[@offset...@offset + 3], @offset, [])
        @offset = @offset + 3
      else
        address0 = FAILURE
        if @offset > @failure
          @failure = @offset
          @expected = []
        end
        if @offset == @failure
          @expected << "\"foo\""
        end
      end
      @cache[:foo][index0] = [address0, @offset]
      return address0
    end
"#;
    let source = ruby(&grammar);
    assert!(source.contains(expected), "{source}");
}

#[test]
fn test_repeat_fragment() {
    let source = ruby(&single(Node::zero_or_more(Node::literal("foo"))));
    let head = "      remaining0, index1, elements0, address1 = 0, @offset, [], nil\n      \
                until address1 == FAILURE\n";
    let append = "        if address1 != FAILURE\n          \
                  elements0 << address1\n          \
                  remaining0 -= 1\n        \
                  end\n      \
                  end\n";
    let finish = "      if remaining0 <= 0\n        \
                  address0 = TreeNode.new(@input[index1...@offset], index1, elements0)\n        \
                  @offset = @offset\n      \
                  else\n        \
                  @offset = index1\n        \
                  address0 = FAILURE\n      \
                  end\n";
    assert!(source.contains(head), "{source}");
    assert!(source.contains(append), "{source}");
    assert!(source.contains(finish), "{source}");
    assert!(source.contains("@cache[:root][index0] = [address0, @offset]"));
}

#[test]
fn test_one_or_more_counts_from_one() {
    let source = ruby(&single(Node::one_or_more(Node::literal("foo"))));
    assert!(source.contains("remaining0, index1, elements0, address1 = 1, @offset, [], nil"));
}

#[test]
fn test_labelled_sequence_declares_class() {
    let grammar = single(Node::seq([
        Node::label("key", Node::char_class("[a-z]")),
        Node::literal("="),
        Node::label("value", Node::char_class("[0-9]")),
    ]));
    let source = ruby(&grammar);
    let class = "  class TreeNode1 < TreeNode\n    \
                 attr_reader :key, :value\n\n    \
                 def initialize(text, offset, elements)\n      \
                 super\n      \
                 @key = elements[0]\n      \
                 @value = elements[2]\n    \
                 end\n  \
                 end\n";
    assert!(source.contains(class), "{source}");
    assert!(source.contains("TreeNode1.new(@input[index1...@offset], index1, elements0)"));
}

#[test]
fn test_scaffolding_order() {
    let source = ruby(&single(Node::literal("x")));
    assert!(source.starts_with("module Test\n  class TreeNode\n    include Enumerable\n"));
    let positions: Vec<_> = [
        "  class TreeNode\n",
        "  ParseError = Class.new(StandardError)\n",
        "  FAILURE = Object.new\n",
        "  module Grammar\n",
        "  class Parser\n    include Grammar\n\n    def initialize(input, actions, types)\n",
        "  def self.parse(input, options = {})\n",
    ]
    .iter()
    .map(|fragment| source.find(fragment).unwrap_or_else(|| panic!("missing {fragment:?}")))
    .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{source}");
    assert!(source.ends_with("    parser.parse\n  end\nend\n"));
}

#[test]
fn test_parse_entry_point() {
    let source = ruby(&single(Node::literal("x")));
    let parse = "    def parse\n      \
                 tree = _read_root\n      \
                 if tree != FAILURE and @offset == @input_size\n        \
                 return tree\n      \
                 end\n      \
                 if @expected.empty?\n        \
                 @failure = @offset\n        \
                 @expected << \"<EOF>\"\n      \
                 end\n      \
                 raise ParseError, Parser.format_error(@input, @failure, @expected)\n    \
                 end\n";
    assert!(source.contains(parse), "{source}");
    assert!(source.contains("    def self.format_error(input, offset, expected)\n"));
}

#[test]
fn test_entry_point_drives_parse() {
    let grammar = GrammarBuilder::new("Two")
        .rule("a", Node::literal("a"))
        .rule("b", Node::reference("a"))
        .entry_point("b")
        .build()
        .unwrap();
    let source = ruby(&grammar);
    assert!(source.contains("tree = _read_b\n"));
    assert!(source.contains("    def _read_b\n"));
    assert!(source.contains("      address0 = _read_a\n"));
}

#[test]
fn test_variable_counters_reset_per_rule() {
    let grammar = GrammarBuilder::new("Two")
        .rule("a", Node::seq([Node::literal("a"), Node::literal("b")]))
        .rule("b", Node::seq([Node::literal("a"), Node::literal("b")]))
        .build()
        .unwrap();
    let source = ruby(&grammar);
    let body = |rule: &str| {
        let start = source.find(&format!("def _read_{rule}\n")).unwrap();
        let end = start + source[start..].find("\n    end\n").unwrap();
        source[start..end].replace(&format!(":{rule}"), ":_")
    };
    let (a, b) = (body("a"), body("b"));
    assert_eq!(a.lines().skip(1).collect::<Vec<_>>(), b.lines().skip(1).collect::<Vec<_>>());
    assert!(a.contains("index1, elements0 = @offset, []"));
    assert!(a.contains("chunk1, max1 = nil, @offset + 1"));
}

#[test]
fn test_output_is_deterministic() {
    let grammar = GrammarBuilder::new("Calc")
        .rule(
            "sum",
            Node::seq([
                Node::label("left", Node::reference("number")),
                Node::zero_or_more(Node::seq([
                    Node::literal("+"),
                    Node::label("right", Node::reference("number")),
                ])),
            ]),
        )
        .rule("number", Node::one_or_more(Node::char_class("[0-9]")))
        .build()
        .unwrap();
    assert_eq!(ruby(&grammar), ruby(&grammar));
}

#[test]
fn test_terminal_conditions() {
    let source = ruby(&single(Node::choice([
        Node::literal_ci("select"),
        Node::char_class("[0-9]"),
        Node::any_char(),
    ])));
    assert!(source.contains("if !chunk0.nil? && chunk0.downcase == \"select\".downcase\n"));
    assert!(source.contains("if !chunk1.nil? && chunk1 =~ /\\A[0-9]/\n"));
    assert!(source.contains("if @offset < @input_size\n"));
    assert!(source.contains("@expected << \"[0-9]\"\n"));
    assert!(source.contains("@expected << \"<any char>\"\n"));
}

#[test]
fn test_predicates() {
    let source = ruby(&single(Node::seq([
        Node::not(Node::literal("a")),
        Node::lookahead(Node::literal("b")),
        Node::any_char(),
    ])));
    assert!(source.contains("failure0 = [@failure, @expected.dup]\n"));
    assert!(source.contains("@failure, @expected = failure0\n"));
    assert_eq!(source.matches("@expected.dup").count(), 1);
}

#[test]
fn test_type_extension_and_actions() {
    let source = ruby(&single(Node::extend(
        "Calc.Number",
        Node::action("make_number", Node::one_or_more(Node::char_class("[0-9]"))),
    )));
    assert!(source.contains("@actions.make_number(@input, index1, @offset, elements0)"));
    assert!(source.contains("if address0 != FAILURE\n        address0.extend(@types::Calc::Number)\n"));
}

#[test]
fn test_action_on_reference_is_rejected() {
    let grammar = GrammarBuilder::new("Bad")
        .rule("a", Node::action("make", Node::reference("b")))
        .rule("b", Node::literal("x"))
        .build()
        .unwrap();
    let err = compile(&grammar, RubyBuilder::new("bad.peg")).unwrap_err();
    assert_eq!(
        err,
        CompileError::ActionOnReference {
            rule: "a".to_owned(),
            action: "make".to_owned(),
        }
    );
}

#[test]
fn test_nullable_repetition() {
    let grammar = single(Node::zero_or_more(Node::maybe(Node::literal("a"))));
    let err = compile(&grammar, RubyBuilder::new("loop.peg")).unwrap_err();
    assert_eq!(
        err,
        CompileError::NullableRepetition {
            rule: "root".to_owned(),
        }
    );

    let compiler = Compiler::new(CompileConfig {
        reject_nullable_repetition: false,
    });
    assert!(compiler.compile(&grammar, RubyBuilder::new("loop.peg")).is_ok());
}

#[test]
fn test_node_compiles_standalone() {
    let mut backend = RubyBuilder::new("frag.peg");
    let address = VarIndex::new().fresh("result");
    Node::any_char().compile(&mut backend, &address, Some("wrap")).unwrap();
    let output = arbor::Backend::finish(backend).unwrap();
    assert_eq!(
        output.get("frag.rb").unwrap(),
        "if @offset < @input_size\n  \
         result0 = @actions.wrap(@input, @offset, @offset + 1, [])\n  \
         @offset = @offset + 1\n\
         else\n  \
         result0 = FAILURE\n  \
         if @offset > @failure\n    \
         @failure = @offset\n    \
         @expected = []\n  \
         end\n  \
         if @offset == @failure\n    \
         @expected << \"<any char>\"\n  \
         end\n\
         end\n"
    );
}

#[test]
fn test_custom_config() {
    let config = RubyConfig {
        indent: "\t".to_owned(),
        source_extension: "arbor".to_owned(),
        output_extension: "rb".to_owned(),
    };
    let grammar = single(Node::literal("x"));
    let output = compile(&grammar, RubyBuilder::with_config("lang.arbor", config)).unwrap();
    let source = output.get("lang.rb").unwrap();
    assert!(source.starts_with("module Test\n\tclass TreeNode\n"));
    assert!(source.contains("\n\t\tdef _read_root\n"));
}
