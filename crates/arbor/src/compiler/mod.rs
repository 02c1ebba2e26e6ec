//! # Compiler
//!
//! Walks a [`Grammar`] and drives a [`Backend`] to emit a complete packrat
//! parser.
//!
//! ## Overview
//!
//! Each node variant has one compile function with the same contract: run
//! at some offset, the emitted fragment either advances the cursor past a
//! match and leaves a syntax node (or an action's value) in its destination
//! variable, or leaves the failure sentinel there with the cursor back where
//! it started. Composite nodes compile their children into fresh variables
//! and combine the results, relying on that all-or-nothing behaviour to
//! backtrack.
//!
//! Around the rule bodies the driver emits, in order: the package, the base
//! syntax node class, one class per labelled sequence, the grammar module
//! with a memoized routine per rule, the parser class and the exported
//! `parse` function.
//!
//! ## Usage
//!
//! ```rust
//! use arbor::backend::ruby::RubyBuilder;
//! use arbor::compiler::compile;
//! use arbor::grammar::{GrammarBuilder, Node};
//!
//! let grammar = GrammarBuilder::new("Greeting")
//!     .rule("greeting", Node::seq([Node::literal_ci("hello"), Node::maybe(Node::literal("!"))]))
//!     .build()?;
//!
//! let output = compile(&grammar, RubyBuilder::new("greeting.peg"))?;
//! let source = output.get("greeting.rb").unwrap();
//! assert!(source.starts_with("module Greeting\n"));
//! assert!(source.contains("def _read_greeting\n"));
//! # Ok::<(), arbor::error::CompileError>(())
//! ```

mod context;
mod nodes;

use log::debug;

use crate::backend::{Backend, Output, Var};
use crate::error::CompileResult;
use crate::grammar::{Grammar, Node, check_repetitions, collect_node_classes};

pub(crate) use context::CompileContext;

/// Configuration for compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    /// Refuse grammars that repeat an expression able to match the empty
    /// string, since the generated loop would never terminate.
    pub reject_nullable_repetition: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            reject_nullable_repetition: true,
        }
    }
}

/// Compiles grammars against any [`Backend`].
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompileConfig,
}

impl Compiler {
    #[must_use]
    pub const fn new(config: CompileConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Compile `grammar` and return the backend's files.
    ///
    /// # Errors
    ///
    /// Any [`CompileError`](crate::error::CompileError) raised while
    /// checking or emitting the grammar. Nothing is returned on error.
    pub fn compile<B: Backend>(&self, grammar: &Grammar, mut backend: B) -> CompileResult<Output> {
        self.emit(grammar, &mut backend)?;
        backend.finish()
    }

    /// Emit the whole parser for `grammar` into `backend`.
    ///
    /// # Errors
    ///
    /// As [`Compiler::compile`]; the backend may hold partial output
    /// afterwards and should be discarded.
    pub fn emit<B: Backend>(&self, grammar: &Grammar, backend: &mut B) -> CompileResult<()> {
        if self.config.reject_nullable_repetition {
            check_repetitions(grammar)?;
        }
        let classes = collect_node_classes(grammar);
        debug!(
            "compiling grammar `{}`: {} rules, {} node classes, backend {}",
            grammar.name(),
            grammar.rules().len(),
            classes.len(),
            B::NAME
        );

        backend.package(grammar.name(), |b| {
            let base = b.syntax_node_class()?;
            for class in &classes {
                b.node_class(class, &base)?;
            }

            let mut cx = CompileContext::new();
            b.grammar_module(|b| {
                for rule in grammar.rules() {
                    debug!("compiling rule `{}`", rule.name);
                    cx.enter_rule(&rule.name);
                    b.rule(&rule.name, |b, address| {
                        nodes::compile_node(b, &mut cx, &rule.node, address, None)
                    })?;
                }
                Ok(())
            })?;

            b.parser_class(&grammar.entry_point().name)?;
            b.exports()
        })
    }
}

/// Compile `grammar` with the default configuration.
///
/// # Errors
///
/// See [`Compiler::compile`].
pub fn compile<B: Backend>(grammar: &Grammar, backend: B) -> CompileResult<Output> {
    Compiler::default().compile(grammar, backend)
}

impl Node {
    /// Emit this node's fragment into `backend`, leaving its result in
    /// `address`.
    ///
    /// With an `action`, a successful match is passed to that action instead
    /// of building a syntax node. Labelled sequences are numbered from
    /// `TreeNode1` as if this node were the only one in the grammar.
    ///
    /// # Errors
    ///
    /// [`CompileError::ActionOnReference`](crate::error::CompileError::ActionOnReference)
    /// when an action would apply directly to a rule reference.
    pub fn compile<B: Backend>(
        &self,
        backend: &mut B,
        address: &Var,
        action: Option<&str>,
    ) -> CompileResult<()> {
        nodes::compile_node(backend, &mut CompileContext::new(), self, address, action)
    }
}
