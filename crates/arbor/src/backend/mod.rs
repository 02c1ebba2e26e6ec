//! # Code-Emission Backends
//!
//! A backend turns the compiler's emission calls into parser source for one
//! target.
//!
//! ## Overview
//!
//! The compiler never writes target syntax itself. Every node variant is
//! compiled in terms of the [`Backend`] vocabulary:
//!
//! - **Values and conditions**: the cursor, integers, the failure sentinel,
//!   comparisons against literals and character classes
//! - **Locals**: fresh variables named `<base><n>`, counted per rule routine
//! - **Statements**: assignment, cursor moves, list appends, node
//!   construction, failure recording, rule calls, type extension
//! - **Blocks**: `if`/`else` and the loop-until-failure used by repetition,
//!   taking closures so every opened block is closed on every exit path
//! - **Scaffolding**: the package, node classes, the memoized rule routines,
//!   the parser class with its `parse` entry point and error formatting
//!
//! ## Available Backends
//!
//! - **Ruby** ([`ruby::RubyBuilder`]): readable Ruby source, one file per
//!   grammar (feature `backend-ruby`)
//! - **Program** ([`program::ProgramBuilder`]): a serialisable statement tree
//!   that [`crate::testing::Machine`] can execute directly
//!
//! ## Usage
//!
//! ```rust
//! use arbor::backend::program::ProgramBuilder;
//! use arbor::compiler::compile;
//! use arbor::grammar::{GrammarBuilder, Node};
//!
//! let grammar = GrammarBuilder::new("Foo")
//!     .rule("foo", Node::one_or_more(Node::literal("foo")))
//!     .build()?;
//! let output = compile(&grammar, ProgramBuilder::new("foo.peg"))?;
//! assert!(output.get("foo.json").is_some());
//! # Ok::<(), arbor::error::CompileError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::CompileResult;
pub use crate::grammar::NodeClass;

pub mod program;
#[cfg(feature = "backend-ruby")]
pub mod ruby;

/// Name of a local variable in emitted code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(CompactString);

impl Var {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Var {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fresh-name counters, one per base name.
///
/// Asking for `address` twice yields `address0` then `address1`. Allocation
/// order is deterministic, so the same grammar always compiles to the same
/// text.
#[derive(Debug, Clone, Default)]
pub struct VarIndex {
    counters: HashMap<CompactString, usize, ahash::RandomState>,
}

impl VarIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, base: &str) -> Var {
        let counter = self.counters.entry_ref(base).or_insert(0);
        let var = Var(format_compact!("{base}{counter}"));
        *counter += 1;
        var
    }
}

/// Generated files, keyed by path.
///
/// Iteration is in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    files: BTreeMap<PathBuf, String>,
}

impl Output {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: String) {
        self.files.insert(path.into(), source);
    }

    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files
            .iter()
            .map(|(path, source)| (path.as_path(), source.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<PathBuf, String> {
        self.files
    }
}

/// Output path for `destination`: its `source` extension swapped for
/// `target`, or `target` appended when it has a different one or none.
#[must_use]
pub fn output_path(destination: &str, source: &str, target: &str) -> PathBuf {
    let path = Path::new(destination);
    match path.extension() {
        Some(ext) if ext == source => path.with_extension(target),
        _ => PathBuf::from(format!("{destination}.{target}")),
    }
}

/// The emission vocabulary grammar nodes compile against.
///
/// Value methods build target expressions without emitting anything.
/// Statement methods append to the current block. Block methods take
/// closures for their bodies and always emit the closing part of the
/// block, even when a body fails.
pub trait Backend: Sized {
    /// An expression in the target language.
    type Expr;

    /// Short name used in logs and errors.
    const NAME: &'static str;

    // Values

    /// The parser's current offset.
    fn offset(&self) -> Self::Expr;
    /// The current offset advanced by `length` characters.
    fn offset_plus(&self, length: usize) -> Self::Expr;
    fn int(&self, value: i64) -> Self::Expr;
    fn null(&self) -> Self::Expr;
    /// The failure sentinel.
    fn failure_node(&self) -> Self::Expr;
    fn empty_list(&self) -> Self::Expr;
    fn load(&self, var: &Var) -> Self::Expr;

    // Conditions

    /// `var <= 0`
    fn is_zero(&self, var: &Var) -> Self::Expr;
    /// At least one character of input remains.
    fn has_chars(&self) -> Self::Expr;
    fn is_failure(&self, var: &Var) -> Self::Expr;
    fn not_failure(&self, var: &Var) -> Self::Expr;
    fn is_null(&self, var: &Var) -> Self::Expr;
    /// `chunk` equals `text`, ignoring case when `case_sensitive` is false.
    fn string_match(&self, chunk: &Var, text: &str, case_sensitive: bool) -> Self::Expr;
    /// `chunk` starts with a match of `pattern`.
    fn regex_match(&self, chunk: &Var, pattern: &str) -> Self::Expr;

    /// `text` as a target-language string literal.
    fn quote(&self, text: &str) -> String;

    // Locals

    /// Declare a fresh local named after `base`, initialised to `value`.
    fn local_var(&mut self, base: &str, value: Self::Expr) -> Var;

    /// Declare several fresh locals in one statement.
    fn local_vars<const N: usize>(&mut self, vars: [(&str, Self::Expr); N]) -> [Var; N];

    // Statements

    fn assign(&mut self, target: &Var, value: Self::Expr);
    fn set_offset(&mut self, value: Self::Expr);
    /// Read the next `length` characters into a fresh local, or null when
    /// fewer remain.
    fn chunk(&mut self, length: usize) -> Var;
    fn append(&mut self, list: &Var, value: &Var);
    fn decrement(&mut self, var: &Var);

    /// Build the result of a successful match spanning `start..end` into
    /// `target` and move the cursor to `end`.
    ///
    /// With an `action` the node is whatever that action returns; otherwise
    /// it is an instance of `class`, or of the base syntax node class.
    #[allow(clippy::too_many_arguments)]
    fn syntax_node(
        &mut self,
        target: &Var,
        start: Self::Expr,
        end: Self::Expr,
        elements: Option<&Var>,
        action: Option<&str>,
        class: Option<&str>,
    );

    /// Set `target` to the failure sentinel and record `expected` at the
    /// current offset for error reporting.
    fn failure(&mut self, target: &Var, expected: &str);

    /// Call the memoized routine of `rule`, storing its result in `target`.
    fn jump(&mut self, target: &Var, rule: &str);

    /// Mix the grammar-declared type `type_name` into the node in `target`.
    fn extend_node(&mut self, target: &Var, type_name: &str);

    /// Snapshot the furthest failure and expected set into a fresh local.
    fn save_failures(&mut self) -> Var;
    fn restore_failures(&mut self, saved: &Var);

    // Blocks

    fn if_<F>(&mut self, condition: Self::Expr, then: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>;

    fn if_else<F, G>(&mut self, condition: Self::Expr, then: F, otherwise: G) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
        G: FnOnce(&mut Self) -> CompileResult<()>;

    /// Run `body` until `var` holds the failure sentinel.
    fn while_not_failure<F>(&mut self, var: &Var, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>;

    fn if_node<F>(&mut self, var: &Var, then: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let condition = self.not_failure(var);
        self.if_(condition, then)
    }

    fn if_node_else<F, G>(&mut self, var: &Var, then: F, otherwise: G) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
        G: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let condition = self.not_failure(var);
        self.if_else(condition, then, otherwise)
    }

    fn unless_node<F>(&mut self, var: &Var, then: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let condition = self.is_failure(var);
        self.if_(condition, then)
    }

    // Scaffolding

    /// Wrap everything emitted by `body` in the grammar's package.
    fn package<F>(&mut self, name: &str, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>;

    /// Emit the base syntax node class and return its name.
    fn syntax_node_class(&mut self) -> CompileResult<CompactString>;

    /// Emit a labelled-sequence node class extending `parent`.
    fn node_class(&mut self, class: &NodeClass, parent: &str) -> CompileResult<()>;

    /// Emit the container holding every rule routine.
    fn grammar_module<F>(&mut self, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>;

    /// Emit the memoized routine for one rule.
    ///
    /// `body` receives the variable the rule's result must be left in.
    /// Local names restart from zero inside each routine.
    fn rule<F>(&mut self, name: &str, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self, &Var) -> CompileResult<()>;

    /// Emit the parser class: state, the `parse` entry point starting at
    /// `root`, and error formatting.
    fn parser_class(&mut self, root: &str) -> CompileResult<()>;

    /// Emit the public `parse(input, actions, types)` function.
    fn exports(&mut self) -> CompileResult<()>;

    /// Render everything emitted so far.
    ///
    /// # Errors
    ///
    /// [`CompileError::Emit`](crate::error::CompileError::Emit) when the
    /// backend cannot serialize its output.
    fn finish(self) -> CompileResult<Output>;
}
