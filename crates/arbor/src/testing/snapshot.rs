//! # Snapshot Testing Utilities
//!
//! Compare generated sources and parse trees against files on disk.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbor::testing::SnapshotTester;
//!
//! let tester = SnapshotTester::new("tests/snapshots");
//! tester.assert_output("calc", &output);
//! ```

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::Output;
use crate::error::MachineError;
use crate::testing::machine::Tree;

/// Snapshot tester for compiler output and parse trees
pub struct SnapshotTester {
    snapshot_dir: PathBuf,
    update_mode: bool,
}

impl SnapshotTester {
    /// Create a new snapshot tester
    #[must_use]
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        let update_mode = std::env::var("UPDATE_SNAPSHOTS").is_ok()
            || std::env::var("ARBOR_UPDATE_SNAPSHOTS").is_ok();
        Self {
            snapshot_dir: snapshot_dir.into(),
            update_mode,
        }
    }

    /// Set update mode (for updating existing snapshots)
    #[must_use]
    pub const fn with_update_mode(mut self, update: bool) -> Self {
        self.update_mode = update;
        self
    }

    /// Assert that every generated file matches its snapshot, stored as
    /// `<name>.<file>.snap`
    ///
    /// # Panics
    /// Panics if a snapshot doesn't match (and update mode is disabled)
    pub fn assert_output(&self, name: &str, output: &Output) {
        for (path, source) in output.files() {
            self.check_snapshot(&format!("{name}.{}", flatten_path(path)), source);
        }
    }

    /// Assert that a parse tree matches the snapshot
    ///
    /// # Panics
    /// Panics if the snapshot doesn't match (and update mode is disabled)
    pub fn assert_tree_snapshot(&self, name: &str, tree: &Tree) {
        let mut actual = String::new();
        format_tree(&mut actual, tree, 0);
        self.check_snapshot(name, &actual);
    }

    /// Assert that a raw string matches the snapshot
    ///
    /// # Panics
    /// Panics if the snapshot doesn't match (and update mode is disabled)
    pub fn assert_snapshot(&self, name: &str, actual: &str) {
        self.check_snapshot(name, actual);
    }

    fn check_snapshot(&self, name: &str, actual: &str) {
        let path = self.snapshot_dir.join(format!("{name}.snap"));

        if self.update_mode {
            std::fs::create_dir_all(&self.snapshot_dir).ok();
            std::fs::write(&path, actual).expect("Failed to write snapshot");
            return;
        }

        if path.exists() {
            let expected = std::fs::read_to_string(&path).expect("Failed to read snapshot");
            assert!(
                actual == expected,
                "Snapshot mismatch for '{name}':\n\
                --- Expected ---\n{expected}\n\
                --- Actual ---\n{actual}\n\
                \n\
                To update snapshots, run with UPDATE_SNAPSHOTS=1"
            );
        } else {
            panic!(
                "Snapshot '{name}' not found at {}.\n\
                To create it, run with UPDATE_SNAPSHOTS=1",
                path.display()
            );
        }
    }
}

fn flatten_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("_")
}

/// Format a parse tree, one node per line
pub fn format_tree(out: &mut String, tree: &Tree, indent: usize) {
    let indent_str = "  ".repeat(indent);
    match tree {
        Tree::Value(value) => {
            writeln!(out, "{indent_str}= {value}").unwrap();
        }
        Tree::Node(node) => {
            let class = node.class.as_deref().unwrap_or("SyntaxNode");
            write!(out, "{indent_str}{class}@{} {:?}", node.offset, node.text).unwrap();
            for type_name in &node.types {
                write!(out, " +{type_name}").unwrap();
            }
            out.push('\n');
            for element in &node.elements {
                format_tree(out, element, indent + 1);
            }
        }
    }
}

/// Parse result assertion helpers
pub trait ParseResultAssertions {
    /// Assert that parsing succeeded
    fn assert_ok(&self);
    /// Assert that parsing failed at `offset`
    fn assert_fails_at(&self, offset: usize);
    /// Assert that the failure expected exactly these descriptions, in order
    fn assert_expected(&self, expected: &[&str]);
}

impl ParseResultAssertions for Result<Rc<Tree>, MachineError> {
    fn assert_ok(&self) {
        assert!(self.is_ok(), "Expected a successful parse, got: {self:?}");
    }

    fn assert_fails_at(&self, offset: usize) {
        let failure = match self {
            Err(MachineError::Parse(failure)) => failure,
            other => panic!("Expected a parse failure, got: {other:?}"),
        };
        assert_eq!(
            failure.offset, offset,
            "Expected failure at {offset}, got {}: {}",
            failure.offset, failure.message
        );
    }

    fn assert_expected(&self, expected: &[&str]) {
        let failure = match self {
            Err(MachineError::Parse(failure)) => failure,
            other => panic!("Expected a parse failure, got: {other:?}"),
        };
        assert_eq!(failure.expected, expected, "{}", failure.message);
    }
}
