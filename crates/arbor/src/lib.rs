//! # Arbor
//!
//! A compiler from Parsing Expression Grammars to standalone packrat parsers.
//!
//! ## Overview
//!
//! Arbor takes a grammar as a tree of [`Node`]s and emits the full source of
//! a parser for it through a [`Backend`]. It provides:
//!
//! - **Grammar trees**: one node variant per PEG construct, with a canonical
//!   nested-array form for round-tripping ([`grammar::sexp`])
//! - **A compilation protocol**: every node compiles to a fragment that either
//!   advances past a match or leaves the failure sentinel and the cursor where
//!   it found it ([`compiler`])
//! - **Backends**: Ruby source ([`backend::ruby`], feature `backend-ruby`)
//!   and an executable program form ([`backend::program`])
//! - **A reference machine** that runs compiled programs with packrat
//!   memoization and furthest-failure reporting ([`testing::Machine`])
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor::grammar::{GrammarBuilder, Node};
//! use arbor::testing::{Machine, compile_program};
//!
//! // number <- [0-9]+ ("." [0-9]+)?
//! let digits = || Node::one_or_more(Node::char_class("[0-9]"));
//! let grammar = GrammarBuilder::new("Number")
//!     .rule("number", Node::seq([
//!         Node::label("whole", digits()),
//!         Node::maybe(Node::seq([Node::literal("."), Node::label("fraction", digits())])),
//!     ]))
//!     .build()?;
//!
//! let program = compile_program(&grammar)?;
//! let machine = Machine::new(&program)?;
//! let tree = machine.parse("3.14")?;
//! let number = tree.as_node().unwrap();
//! assert_eq!(number.text, "3.14");
//! assert_eq!(number.get("whole").and_then(|t| t.as_node()).unwrap().text, "3");
//!
//! let err = machine.parse("3.x").unwrap_err();
//! assert_eq!(err.to_string(), "Line 1: expected [0-9]\n3.x\n  ^");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Generating Ruby
//!
//! ```rust
//! # #[cfg(feature = "backend-ruby")] {
//! use arbor::backend::ruby::RubyBuilder;
//! use arbor::grammar::Grammar;
//!
//! let value = serde_json::json!(["grammar", "Greeting",
//!     ["rule", "greeting", ["sequence", ["ci-string", "hello"], ["maybe", ["string", "!"]]]]]);
//! let grammar = Grammar::from_sexp(&value)?;
//! let output = arbor::compile(&grammar, RubyBuilder::new("greeting.peg"))?;
//! assert!(output.get("greeting.rb").unwrap().contains("module Greeting"));
//! # }
//! # Ok::<(), arbor::error::CompileError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ruby` (default): the Ruby source backend
//! - `diagnostics`: [`miette`](https://docs.rs/miette) diagnostics for all
//!   error types

pub mod backend;
pub mod compiler;
pub mod error;
pub mod grammar;
pub mod testing;

pub use backend::{Backend, Output, Var};
pub use compiler::{CompileConfig, Compiler, compile};
pub use error::{CompileError, CompileResult, MachineError, ParseFailure};
pub use grammar::{Grammar, GrammarBuilder, Node, Rule};
