//! Statement tree produced by [`ProgramBuilder`](super::ProgramBuilder)

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::backend::{NodeClass, Var};

/// A compiled grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Package name
    pub name: CompactString,
    /// Name of the base syntax node class
    pub base_class: CompactString,
    pub classes: Vec<NodeClass>,
    pub rules: Vec<RuleDef>,
    /// Rule `parse` starts from
    pub root: Option<CompactString>,
}

impl Program {
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&RuleDef> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    #[must_use]
    pub fn class(&self, name: &str) -> Option<&NodeClass> {
        self.classes.iter().find(|class| class.name == name)
    }

    /// Read a program back from the builder's JSON output.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

/// One memoized rule routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: CompactString,
    /// Variable holding the routine's result when `body` finishes
    pub address: Var,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Var(Var),
    Offset,
    OffsetPlus(usize),
    Int(i64),
    Null,
    Failure,
    EmptyList,
    IsZero(Var),
    HasChars,
    IsFailure(Var),
    NotFailure(Var),
    IsNull(Var),
    StringMatch {
        chunk: Var,
        text: String,
        case_sensitive: bool,
    },
    RegexMatch {
        chunk: Var,
        pattern: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Assign {
        target: Var,
        value: Expr,
    },
    SetOffset(Expr),
    /// `target` = the next `length` characters, or null when fewer remain
    Chunk {
        target: Var,
        length: usize,
    },
    Append {
        list: Var,
        value: Var,
    },
    Decrement(Var),
    SyntaxNode {
        target: Var,
        start: Expr,
        end: Expr,
        elements: Option<Var>,
        action: Option<CompactString>,
        class: Option<CompactString>,
    },
    Failure {
        target: Var,
        expected: String,
    },
    Call {
        target: Var,
        rule: CompactString,
    },
    Extend {
        target: Var,
        type_name: CompactString,
    },
    SaveFailures(Var),
    RestoreFailures(Var),
    If {
        condition: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    WhileNotFailure {
        var: Var,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    /// Visit this statement and every statement nested inside it.
    pub fn walk<'s>(&'s self, f: &mut impl FnMut(&'s Self)) {
        f(self);
        match self {
            Self::If {
                then, otherwise, ..
            } => then.iter().chain(otherwise).for_each(|stmt| stmt.walk(f)),
            Self::WhileNotFailure { body, .. } => body.iter().for_each(|stmt| stmt.walk(f)),
            _ => {}
        }
    }
}
