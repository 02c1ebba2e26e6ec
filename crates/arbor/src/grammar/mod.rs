//! # Grammar Module
//!
//! Parsing expression grammars as plain data.
//!
//! ## Overview
//!
//! A grammar is an ordered list of named rules, each defined by a [`Node`]
//! tree. This module provides:
//!
//! - **Nodes**: literals, character classes, sequences, ordered choice,
//!   greedy repetition, lookahead predicates, labels, actions, rule references
//!   and type extensions
//! - **Construction**: [`GrammarBuilder`] or the canonical serialized form
//!   ([`Grammar::from_sexp`])
//! - **Validation**: undefined references, bad names, invalid character
//!   classes, repetitions that would loop forever
//! - **Analysis**: nullability and the node classes labelled sequences need
//!
//! ## Usage
//!
//! ```rust
//! use arbor::grammar::{GrammarBuilder, Node};
//!
//! // pair <- key:[a-z]+ "=" value:[0-9]+
//! let grammar = GrammarBuilder::new("Pairs")
//!     .rule(
//!         "pair",
//!         Node::seq([
//!             Node::label("key", Node::one_or_more(Node::char_class("[a-z]"))),
//!             Node::literal("="),
//!             Node::label("value", Node::one_or_more(Node::char_class("[0-9]"))),
//!         ]),
//!     )
//!     .build()?;
//!
//! assert_eq!(grammar.rules().len(), 1);
//! # Ok::<(), arbor::error::CompileError>(())
//! ```
//!
//! The same grammar in serialized form:
//!
//! ```text
//! ["grammar", "Pairs",
//!   ["rule", "pair",
//!     ["sequence",
//!       ["label", "key", ["repeat", 1, ["char-class", "[a-z]"]]],
//!       ["string", "="],
//!       ["label", "value", ["repeat", 1, ["char-class", "[0-9]"]]]]]]
//! ```

pub mod analysis;
pub mod builder;
pub mod node;
pub mod sexp;
pub mod validate;

pub use analysis::{LabelTable, NodeClass, collect_node_classes, sequence_labels};
pub use builder::{Grammar, GrammarBuilder, Rule};
pub use node::{ANY_CHAR_DESCRIPTION, END_OF_INPUT_DESCRIPTION, Node, PredicateKind, Quantity};
pub use validate::{check_repetitions, is_identifier, is_package_name, is_type_name, validate_grammar};
