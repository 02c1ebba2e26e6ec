//! Error types for compilation and for executing compiled parsers
//!
//! Compilation fails with [`CompileError`], which always names the offending
//! node: a path into the serialized form (`$[2][1]`) or the rule it lives in.
//! Running a compiled program through [`crate::testing::Machine`] fails with
//! [`MachineError`]; an ordinary "the input does not match" outcome is a
//! [`ParseFailure`] wrapped inside it.

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;
use thiserror::Error;

/// Result alias used by every fallible compilation step.
pub type CompileResult<T> = Result<T, CompileError>;

/// A grammar that cannot be compiled.
///
/// Compilation is all-or-nothing: any of these aborts the compile and no
/// partial output is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum CompileError {
    /// The serialized form used a tag no node variant answers to.
    #[error("unknown grammar tag `{tag}` at {path}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::unknown_tag)))]
    UnknownTag { path: String, tag: String },

    /// The serialized form has the wrong shape for its tag.
    #[error("malformed grammar node at {path}: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::malformed_node)))]
    MalformedNode { path: String, reason: String },

    #[error("grammar `{grammar}` has no rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::empty_grammar)))]
    EmptyGrammar { grammar: String },

    #[error("rule `{rule}` is defined more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::duplicate_rule)))]
    DuplicateRule { rule: String },

    #[error("rule `{rule}` references undefined rule `{reference}`")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(compile::unresolved_reference),
            help("define the referenced rule or fix the reference")
        )
    )]
    UnresolvedReference { rule: String, reference: String },

    #[error("entry point `{rule}` is not a rule of the grammar")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::unknown_entry_point)))]
    UnknownEntryPoint { rule: String },

    /// Grammar names become nested package names in generated code.
    #[error("invalid grammar name `{name}`: expected dotted constants such as `Calc.Parser`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::invalid_grammar_name)))]
    InvalidGrammarName { name: String },

    #[error("invalid {kind} name `{name}` in rule `{rule}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::invalid_name)))]
    InvalidName {
        rule: String,
        kind: &'static str,
        name: String,
    },

    #[error("invalid character class `{pattern}` in rule `{rule}`: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::invalid_char_class)))]
    InvalidCharClass {
        rule: String,
        pattern: String,
        reason: String,
    },

    #[error("action `{action}` in rule `{rule}` is attached to a rule reference")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(compile::action_on_reference),
            help("attach the action inside the referenced rule instead")
        )
    )]
    ActionOnReference { rule: String, action: String },

    #[error("rule `{rule}` repeats an expression that can match the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::nullable_repetition)))]
    NullableRepetition { rule: String },

    /// A backend could not render its output.
    #[error("backend `{backend}` failed to emit output: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::emit)))]
    Emit {
        backend: &'static str,
        reason: String,
    },
}

impl CompileError {
    /// Name of the rule the error was found in, when there is one.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::DuplicateRule { rule }
            | Self::UnresolvedReference { rule, .. }
            | Self::UnknownEntryPoint { rule }
            | Self::InvalidName { rule, .. }
            | Self::InvalidCharClass { rule, .. }
            | Self::ActionOnReference { rule, .. }
            | Self::NullableRepetition { rule } => Some(rule),
            Self::UnknownTag { .. }
            | Self::MalformedNode { .. }
            | Self::EmptyGrammar { .. }
            | Self::InvalidGrammarName { .. }
            | Self::Emit { .. } => None,
        }
    }
}

/// The input did not match the grammar.
///
/// `offset` is the furthest position any match attempt reached, counted in
/// characters, and `expected` lists what would have allowed progress there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
#[cfg_attr(
    feature = "diagnostics",
    derive(Diagnostic),
    diagnostic(code(parse::no_match))
)]
pub struct ParseFailure {
    pub offset: usize,
    pub expected: Vec<String>,
    pub message: String,
}

/// Errors raised while executing a compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum MachineError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Parse(#[from] ParseFailure),

    #[error("program does not define rule `{0}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(machine::undefined_rule)))]
    UndefinedRule(String),

    #[error("no action `{0}` was supplied")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(machine::missing_action)))]
    MissingAction(String),

    #[error("invalid pattern `{pattern}`: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(machine::invalid_pattern)))]
    InvalidPattern { pattern: String, reason: String },

    #[error("variable `{0}` read before assignment")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(machine::unbound_variable)))]
    UnboundVariable(String),

    #[error("expected {expected}, found {found}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(machine::type_mismatch)))]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("rule calls nested deeper than {0}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(machine::depth_exceeded),
            help("the grammar is probably left-recursive")
        )
    )]
    DepthExceeded(usize),
}

impl MachineError {
    /// The parse failure, if this error is one.
    #[must_use]
    pub const fn as_parse_failure(&self) -> Option<&ParseFailure> {
        match self {
            Self::Parse(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_rule() {
        let err = CompileError::UnresolvedReference {
            rule: "list".into(),
            reference: "item".into(),
        };
        assert_eq!(
            err.to_string(),
            "rule `list` references undefined rule `item`"
        );
        assert_eq!(err.rule(), Some("list"));
    }

    #[test]
    fn test_tag_errors_carry_path() {
        let err = CompileError::UnknownTag {
            path: "$[2][1]".into(),
            tag: "loop".into(),
        };
        assert_eq!(err.to_string(), "unknown grammar tag `loop` at $[2][1]");
        assert_eq!(err.rule(), None);
    }

    #[test]
    fn test_parse_failure_is_transparent() {
        let failure = ParseFailure {
            offset: 0,
            expected: vec!["\"foo\"".into()],
            message: "Line 1: expected \"foo\"\nbar\n^".into(),
        };
        let err = MachineError::from(failure.clone());
        assert_eq!(err.to_string(), failure.message);
        assert_eq!(err.as_parse_failure(), Some(&failure));
    }
}
