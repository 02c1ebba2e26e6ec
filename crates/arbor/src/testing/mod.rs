//! # Testing Utilities
//!
//! This module provides utilities for testing grammars and the parsers
//! compiled from them.
//!
//! ## Running Compiled Grammars
//!
//! [`Machine`] executes the [`Program`] recorded by
//! [`ProgramBuilder`], with the same memoization, backtracking and error
//! reporting a generated parser has. That makes the behaviour of a grammar
//! testable without any target-language toolchain.
//!
//! ## Snapshot Testing
//!
//! [`SnapshotTester`] compares generated sources and parse trees against
//! files on disk; set `UPDATE_SNAPSHOTS=1` to rewrite them.

pub mod machine;
pub mod snapshot;

pub use machine::{
    ActionTable, Actions, Machine, MachineConfig, SyntaxNode, Tree, format_error,
};
pub use snapshot::{ParseResultAssertions, SnapshotTester, format_tree};

use crate::backend::program::{Program, ProgramBuilder};
use crate::compiler::Compiler;
use crate::error::CompileResult;
use crate::grammar::Grammar;

/// Compile `grammar` with the default configuration into a runnable
/// [`Program`].
///
/// # Errors
///
/// Any [`CompileError`](crate::error::CompileError) from compilation.
pub fn compile_program(grammar: &Grammar) -> CompileResult<Program> {
    let mut builder = ProgramBuilder::new(format!("{}.peg", grammar.name()));
    Compiler::default().emit(grammar, &mut builder)?;
    Ok(builder.into_program())
}
