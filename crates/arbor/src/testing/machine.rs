//! # Reference Machine
//!
//! Executes a compiled [`Program`] the way a generated parser runs.
//!
//! ## Overview
//!
//! Each [`Machine::parse`] call builds fresh per-parse state:
//!
//! - the input as characters and a cursor offset into it
//! - a memo table from `(rule, offset)` to `(result, offset after)`, so each
//!   rule runs at most once per position
//! - the furthest failure offset and the descriptions expected there
//!
//! A parse succeeds only when the root rule matches and consumes the whole
//! input. Otherwise it fails with a [`ParseFailure`] whose message has the
//! same shape generated parsers produce.
//!
//! ## Usage
//!
//! ```rust
//! use arbor::grammar::{GrammarBuilder, Node};
//! use arbor::testing::{Machine, compile_program};
//!
//! let grammar = GrammarBuilder::new("Foo")
//!     .rule("foos", Node::zero_or_more(Node::literal("foo")))
//!     .build()?;
//! let program = compile_program(&grammar)?;
//! let machine = Machine::new(&program)?;
//!
//! let tree = machine.parse("foofoo")?;
//! assert_eq!(tree.as_node().unwrap().elements.len(), 2);
//!
//! let err = machine.parse("foofood").unwrap_err();
//! assert_eq!(err.as_parse_failure().unwrap().offset, 6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::rc::Rc;

use compact_str::CompactString;
use hashbrown::HashMap;
use log::trace;
use regex::Regex;
use smallvec::SmallVec;

use crate::backend::Var;
use crate::backend::program::{Expr, Program, Stmt};
use crate::error::{MachineError, ParseFailure};
use crate::grammar::{END_OF_INPUT_DESCRIPTION, LabelTable};

/// Configuration for the reference machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Cache rule results per offset (packrat parsing)
    ///
    /// Turning this off keeps results identical but lets rules and their
    /// actions run more than once at the same offset.
    pub enable_memoization: bool,

    /// Maximum nesting of rule calls
    ///
    /// Left-recursive grammars never terminate; this turns them into a
    /// [`MachineError::DepthExceeded`] instead of a stack overflow.
    pub max_depth: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            enable_memoization: true,
            max_depth: 1024,
        }
    }
}

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// A syntax node built by the parser
    Node(SyntaxNode),
    /// Whatever a semantic action returned
    Value(serde_json::Value),
}

impl Tree {
    #[must_use]
    pub const fn as_node(&self) -> Option<&SyntaxNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Value(_) => None,
        }
    }

    #[must_use]
    pub const fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Node(_) => None,
        }
    }
}

/// Matched text, where it starts, and the results of its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub text: String,
    /// Start offset in characters
    pub offset: usize,
    pub elements: Vec<Rc<Tree>>,
    /// Generated class of a labelled sequence
    pub class: Option<CompactString>,
    /// Grammar-declared types mixed into the node
    pub types: SmallVec<[CompactString; 2]>,
    labels: LabelTable,
}

impl SyntaxNode {
    /// Element bound to `label` in a labelled sequence.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Rc<Tree>> {
        self.labels
            .iter()
            .find(|(name, _)| name == label)
            .and_then(|(_, index)| self.elements.get(*index))
    }

    #[must_use]
    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|name| name == type_name)
    }
}

/// Semantic actions invoked by name.
pub trait Actions {
    /// Build the value for a match of `input[start..end]` (character
    /// offsets) with the given child results.
    ///
    /// Returns `None` when there is no action called `name`.
    fn call(
        &mut self,
        name: &str,
        input: &str,
        start: usize,
        end: usize,
        elements: &[Rc<Tree>],
    ) -> Option<Tree>;
}

type ActionFn<'a> = Box<dyn FnMut(&str, usize, usize, &[Rc<Tree>]) -> Tree + 'a>;

/// [`Actions`] backed by closures.
#[derive(Default)]
pub struct ActionTable<'a> {
    actions: HashMap<CompactString, ActionFn<'a>, ahash::RandomState>,
}

impl<'a> ActionTable<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    #[must_use]
    pub fn on(
        mut self,
        name: impl Into<CompactString>,
        action: impl FnMut(&str, usize, usize, &[Rc<Tree>]) -> Tree + 'a,
    ) -> Self {
        self.actions.insert(name.into(), Box::new(action));
        self
    }
}

impl Actions for ActionTable<'_> {
    fn call(
        &mut self,
        name: &str,
        input: &str,
        start: usize,
        end: usize,
        elements: &[Rc<Tree>],
    ) -> Option<Tree> {
        let action = self.actions.get_mut(name)?;
        Some(action(input, start, end, elements))
    }
}

/// Executes a [`Program`].
#[derive(Debug)]
pub struct Machine<'p> {
    program: &'p Program,
    config: MachineConfig,
    rules: HashMap<&'p str, usize, ahash::RandomState>,
    patterns: HashMap<&'p str, Regex, ahash::RandomState>,
    root: usize,
}

impl<'p> Machine<'p> {
    /// Prepare `program` for execution.
    ///
    /// # Errors
    ///
    /// [`MachineError::UndefinedRule`] when the root or a called rule is
    /// missing, [`MachineError::InvalidPattern`] for a character class the
    /// regex engine rejects.
    pub fn new(program: &'p Program) -> Result<Self, MachineError> {
        Self::with_config(program, MachineConfig::default())
    }

    /// # Errors
    ///
    /// See [`Machine::new`].
    pub fn with_config(program: &'p Program, config: MachineConfig) -> Result<Self, MachineError> {
        let rules: HashMap<&'p str, usize, ahash::RandomState> = program
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (rule.name.as_str(), index))
            .collect();

        let root_name = program
            .root
            .as_deref()
            .or_else(|| program.rules.first().map(|rule| rule.name.as_str()))
            .ok_or_else(|| MachineError::UndefinedRule(String::new()))?;
        let root = *rules
            .get(root_name)
            .ok_or_else(|| MachineError::UndefinedRule(root_name.to_owned()))?;

        let mut patterns = HashMap::with_hasher(ahash::RandomState::new());
        let mut problem = None;
        for rule in &program.rules {
            for stmt in &rule.body {
                stmt.walk(&mut |stmt| {
                    if problem.is_some() {
                        return;
                    }
                    match stmt {
                        Stmt::Call { rule, .. } if !rules.contains_key(rule.as_str()) => {
                            problem = Some(MachineError::UndefinedRule(rule.to_string()));
                        }
                        Stmt::If {
                            condition: Expr::RegexMatch { pattern, .. },
                            ..
                        } if !patterns.contains_key(pattern.as_str()) => {
                            match Regex::new(&format!(r"\A(?:{pattern})")) {
                                Ok(regex) => {
                                    patterns.insert(pattern.as_str(), regex);
                                }
                                Err(err) => {
                                    problem = Some(MachineError::InvalidPattern {
                                        pattern: pattern.clone(),
                                        reason: err.to_string(),
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                });
            }
        }
        if let Some(err) = problem {
            return Err(err);
        }

        Ok(Self {
            program,
            config,
            rules,
            patterns,
            root,
        })
    }

    /// Parse `input` without semantic actions.
    ///
    /// # Errors
    ///
    /// [`MachineError::Parse`] when the input does not match;
    /// [`MachineError::MissingAction`] if the grammar uses any action on the
    /// path taken.
    pub fn parse(&self, input: &str) -> Result<Rc<Tree>, MachineError> {
        Run::new(self, input, None).parse()
    }

    /// Parse `input`, building action results through `actions`.
    ///
    /// # Errors
    ///
    /// As [`Machine::parse`].
    pub fn parse_with(&self, input: &str, actions: &mut dyn Actions) -> Result<Rc<Tree>, MachineError> {
        Run::new(self, input, Some(actions)).parse()
    }

    fn rule_index(&self, name: &str) -> Result<usize, MachineError> {
        self.rules
            .get(name)
            .copied()
            .ok_or_else(|| MachineError::UndefinedRule(name.to_owned()))
    }
}

/// Render a parse failure as `Line <n>: expected <a>, <b>`, the offending
/// line, and a caret under the failure column.
#[must_use]
pub fn format_error(input: &str, offset: usize, expected: &[String]) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let (mut line_no, mut position) = (0, 0);
    while position <= offset && line_no < lines.len() {
        position += lines[line_no].chars().count() + 1;
        line_no += 1;
    }
    let line = lines[line_no.saturating_sub(1)];
    position -= line.chars().count() + 1;
    format!(
        "Line {line_no}: expected {}\n{line}\n{}^",
        expected.join(", "),
        " ".repeat(offset.saturating_sub(position))
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    rule: usize,
    position: usize,
}

#[derive(Debug, Clone)]
struct Memo {
    result: Slot,
    end: usize,
}

/// State owned by a single parse.
#[derive(Debug, Default)]
struct ParserState {
    offset: usize,
    memo: HashMap<MemoKey, Memo, ahash::RandomState>,
    failure: usize,
    expected: Vec<String>,
}

/// A runtime value held in a local variable.
#[derive(Debug, Clone)]
enum Slot {
    Null,
    Failure,
    Bool(bool),
    Int(i64),
    Text(String),
    Tree(Rc<Tree>),
    List(Vec<Rc<Tree>>),
    Failures { offset: usize, expected: Vec<String> },
}

impl Slot {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Failure => "failure",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Tree(_) => "node",
            Self::List(_) => "list",
            Self::Failures { .. } => "failure snapshot",
        }
    }

    fn mismatch(&self, expected: &'static str) -> MachineError {
        MachineError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

/// Local variables of one rule invocation.
#[derive(Debug, Default)]
struct Frame<'p> {
    slots: HashMap<&'p str, Slot, ahash::RandomState>,
}

impl<'p> Frame<'p> {
    fn set(&mut self, var: &'p Var, slot: Slot) {
        self.slots.insert(var.as_str(), slot);
    }

    fn get(&self, var: &Var) -> Result<&Slot, MachineError> {
        self.slots
            .get(var.as_str())
            .ok_or_else(|| MachineError::UnboundVariable(var.to_string()))
    }

    fn get_mut(&mut self, var: &Var) -> Result<&mut Slot, MachineError> {
        self.slots
            .get_mut(var.as_str())
            .ok_or_else(|| MachineError::UnboundVariable(var.to_string()))
    }

    fn int(&self, var: &Var) -> Result<i64, MachineError> {
        match self.get(var)? {
            Slot::Int(value) => Ok(*value),
            other => Err(other.mismatch("int")),
        }
    }
}

fn to_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

struct Run<'m, 'p, 'a> {
    machine: &'m Machine<'p>,
    text: &'a str,
    input: Vec<char>,
    state: ParserState,
    actions: Option<&'a mut dyn Actions>,
    depth: usize,
}

impl<'m, 'p, 'a> Run<'m, 'p, 'a> {
    fn new(machine: &'m Machine<'p>, text: &'a str, actions: Option<&'a mut dyn Actions>) -> Self {
        Self {
            machine,
            text,
            input: text.chars().collect(),
            state: ParserState::default(),
            actions,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Rc<Tree>, MachineError> {
        let result = self.call_rule(self.machine.root)?;
        if let Slot::Tree(tree) = result {
            if self.state.offset == self.input.len() {
                return Ok(tree);
            }
        }
        if self.state.expected.is_empty() {
            self.state.failure = self.state.offset;
            self.state.expected.push(END_OF_INPUT_DESCRIPTION.to_owned());
        }
        let ParserState {
            failure, expected, ..
        } = self.state;
        let message = format_error(self.text, failure, &expected);
        Err(ParseFailure {
            offset: failure,
            expected,
            message,
        }
        .into())
    }

    fn call_rule(&mut self, index: usize) -> Result<Slot, MachineError> {
        let program: &'p Program = self.machine.program;
        let rule = &program.rules[index];
        let key = MemoKey {
            rule: index,
            position: self.state.offset,
        };
        if self.machine.config.enable_memoization {
            if let Some(memo) = self.state.memo.get(&key) {
                trace!("memo hit: `{}` at {}", rule.name, key.position);
                self.state.offset = memo.end;
                return Ok(memo.result.clone());
            }
        }

        if self.depth >= self.machine.config.max_depth {
            return Err(MachineError::DepthExceeded(self.machine.config.max_depth));
        }
        self.depth += 1;
        let mut frame = Frame::default();
        let executed = self.exec_block(&rule.body, &mut frame);
        self.depth -= 1;
        executed?;

        let result = frame
            .slots
            .remove(rule.address.as_str())
            .ok_or_else(|| MachineError::UnboundVariable(rule.address.to_string()))?;
        self.state.memo.insert(
            key,
            Memo {
                result: result.clone(),
                end: self.state.offset,
            },
        );
        Ok(result)
    }

    fn exec_block(&mut self, block: &'p [Stmt], frame: &mut Frame<'p>) -> Result<(), MachineError> {
        block.iter().try_for_each(|stmt| self.exec(stmt, frame))
    }

    fn exec(&mut self, stmt: &'p Stmt, frame: &mut Frame<'p>) -> Result<(), MachineError> {
        match stmt {
            Stmt::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                frame.set(target, value);
            }
            Stmt::SetOffset(value) => {
                self.state.offset = self.eval_offset(value, frame)?;
            }
            Stmt::Chunk { target, length } => {
                let start = self.state.offset;
                let chunk = self
                    .input
                    .get(start..start + length)
                    .map_or(Slot::Null, |chars| Slot::Text(chars.iter().collect()));
                frame.set(target, chunk);
            }
            Stmt::Append { list, value } => {
                let tree = match frame.get(value)? {
                    Slot::Tree(tree) => Rc::clone(tree),
                    other => return Err(other.mismatch("node")),
                };
                match frame.get_mut(list)? {
                    Slot::List(elements) => elements.push(tree),
                    other => return Err(other.mismatch("list")),
                }
            }
            Stmt::Decrement(var) => {
                let value = frame.int(var)?;
                frame.set(var, Slot::Int(value - 1));
            }
            Stmt::SyntaxNode {
                target,
                start,
                end,
                elements,
                action,
                class,
            } => {
                let start = self.eval_offset(start, frame)?;
                let end = self.eval_offset(end, frame)?;
                let elements = match elements {
                    Some(var) => match frame.get(var)? {
                        Slot::List(elements) => elements.clone(),
                        other => return Err(other.mismatch("list")),
                    },
                    None => Vec::new(),
                };
                let tree = match action {
                    Some(name) => self.call_action(name, start, end, &elements)?,
                    None => Tree::Node(self.build_node(start, end, elements, class.as_deref())?),
                };
                frame.set(target, Slot::Tree(Rc::new(tree)));
                self.state.offset = end;
            }
            Stmt::Failure { target, expected } => {
                frame.set(target, Slot::Failure);
                self.record_failure(expected);
            }
            Stmt::Call { target, rule } => {
                let index = self.machine.rule_index(rule)?;
                let result = self.call_rule(index)?;
                frame.set(target, result);
            }
            Stmt::Extend { target, type_name } => {
                if let Slot::Tree(tree) = frame.get_mut(target)? {
                    if let Tree::Node(node) = Rc::make_mut(tree) {
                        node.types.push(type_name.clone());
                    }
                }
            }
            Stmt::SaveFailures(var) => {
                let snapshot = Slot::Failures {
                    offset: self.state.failure,
                    expected: self.state.expected.clone(),
                };
                frame.set(var, snapshot);
            }
            Stmt::RestoreFailures(var) => match frame.get(var)? {
                Slot::Failures { offset, expected } => {
                    self.state.failure = *offset;
                    self.state.expected.clone_from(expected);
                }
                other => return Err(other.mismatch("failure snapshot")),
            },
            Stmt::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if self.eval_bool(condition, frame)? {
                    then
                } else {
                    otherwise
                };
                self.exec_block(branch, frame)?;
            }
            Stmt::WhileNotFailure { var, body } => {
                while !matches!(frame.get(var)?, Slot::Failure) {
                    self.exec_block(body, frame)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr, frame: &Frame<'p>) -> Result<Slot, MachineError> {
        let offset = self.state.offset;
        let slot = match expr {
            Expr::Var(var) => frame.get(var)?.clone(),
            Expr::Offset => Slot::Int(to_int(offset)),
            Expr::OffsetPlus(length) => Slot::Int(to_int(offset + length)),
            Expr::Int(value) => Slot::Int(*value),
            Expr::Null => Slot::Null,
            Expr::Failure => Slot::Failure,
            Expr::EmptyList => Slot::List(Vec::new()),
            Expr::IsZero(var) => Slot::Bool(frame.int(var)? <= 0),
            Expr::HasChars => Slot::Bool(offset < self.input.len()),
            Expr::IsFailure(var) => Slot::Bool(matches!(frame.get(var)?, Slot::Failure)),
            Expr::NotFailure(var) => Slot::Bool(!matches!(frame.get(var)?, Slot::Failure)),
            Expr::IsNull(var) => Slot::Bool(matches!(frame.get(var)?, Slot::Null)),
            Expr::StringMatch {
                chunk,
                text,
                case_sensitive,
            } => Slot::Bool(match frame.get(chunk)? {
                Slot::Text(chunk) if *case_sensitive => chunk == text,
                Slot::Text(chunk) => chunk.to_lowercase() == text.to_lowercase(),
                Slot::Null => false,
                other => return Err(other.mismatch("text")),
            }),
            Expr::RegexMatch { chunk, pattern } => {
                let regex = self.machine.patterns.get(pattern.as_str()).ok_or_else(|| {
                    MachineError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: "pattern was not compiled".to_owned(),
                    }
                })?;
                Slot::Bool(match frame.get(chunk)? {
                    Slot::Text(chunk) => regex.is_match(chunk),
                    Slot::Null => false,
                    other => return Err(other.mismatch("text")),
                })
            }
        };
        Ok(slot)
    }

    fn eval_bool(&self, expr: &Expr, frame: &Frame<'p>) -> Result<bool, MachineError> {
        match self.eval(expr, frame)? {
            Slot::Bool(value) => Ok(value),
            other => Err(other.mismatch("bool")),
        }
    }

    fn eval_offset(&self, expr: &Expr, frame: &Frame<'p>) -> Result<usize, MachineError> {
        match self.eval(expr, frame)? {
            Slot::Int(value) => usize::try_from(value).map_err(|_| MachineError::TypeMismatch {
                expected: "offset",
                found: "negative int",
            }),
            other => Err(other.mismatch("offset")),
        }
    }

    fn record_failure(&mut self, expected: &str) {
        let offset = self.state.offset;
        if offset > self.state.failure {
            trace!("furthest failure advances to {offset}");
            self.state.failure = offset;
            self.state.expected.clear();
        }
        if offset == self.state.failure {
            self.state.expected.push(expected.to_owned());
        }
    }

    fn build_node(
        &self,
        start: usize,
        end: usize,
        elements: Vec<Rc<Tree>>,
        class: Option<&str>,
    ) -> Result<SyntaxNode, MachineError> {
        let text = self
            .input
            .get(start..end)
            .ok_or(MachineError::TypeMismatch {
                expected: "span inside the input",
                found: "span past the end",
            })?
            .iter()
            .collect();
        let labels = class
            .and_then(|name| self.machine.program.class(name))
            .map(|class| class.labels.clone())
            .unwrap_or_default();
        Ok(SyntaxNode {
            text,
            offset: start,
            elements,
            class: class.map(CompactString::from),
            types: SmallVec::new(),
            labels,
        })
    }

    fn call_action(
        &mut self,
        name: &str,
        start: usize,
        end: usize,
        elements: &[Rc<Tree>],
    ) -> Result<Tree, MachineError> {
        let missing = || MachineError::MissingAction(name.to_owned());
        let actions = self.actions.as_deref_mut().ok_or_else(missing)?;
        actions
            .call(name, self.text, start, end, elements)
            .ok_or_else(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_first_line() {
        let message = format_error("bar", 0, &["\"foo\"".to_owned()]);
        assert_eq!(message, "Line 1: expected \"foo\"\nbar\n^");
    }

    #[test]
    fn test_format_error_later_line() {
        let expected = ["\"a\"".to_owned(), "[0-9]".to_owned()];
        let message = format_error("one\ntwo\nthree", 6, &expected);
        assert_eq!(message, "Line 2: expected \"a\", [0-9]\ntwo\n  ^");
    }

    #[test]
    fn test_format_error_end_of_input() {
        assert_eq!(
            format_error("ab\n", 3, &["<EOF>".to_owned()]),
            "Line 2: expected <EOF>\n\n^"
        );
        assert_eq!(format_error("", 0, &["x".to_owned()]), "Line 1: expected x\n\n^");
    }

    #[test]
    fn test_syntax_node_labels() {
        let leaf = |text: &str, offset| {
            Rc::new(Tree::Node(SyntaxNode {
                text: text.to_owned(),
                offset,
                elements: Vec::new(),
                class: None,
                types: SmallVec::new(),
                labels: LabelTable::new(),
            }))
        };
        let mut labels = LabelTable::new();
        labels.push(("value".into(), 1));
        let node = SyntaxNode {
            text: "a=1".to_owned(),
            offset: 0,
            elements: vec![leaf("a", 0), leaf("=", 1), leaf("1", 2)],
            class: Some("TreeNode1".into()),
            types: SmallVec::new(),
            labels,
        };
        let value = node.get("value").and_then(|tree| tree.as_node()).unwrap();
        assert_eq!(value.text, "=");
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn test_action_table() {
        let mut calls = 0;
        let mut table = ActionTable::new().on("count", |_, start, end, _| {
            calls += 1;
            Tree::Value(serde_json::json!(end - start))
        });
        let value = table.call("count", "abc", 0, 2, &[]).unwrap();
        assert_eq!(value, Tree::Value(serde_json::json!(2)));
        assert!(table.call("other", "abc", 0, 2, &[]).is_none());
        drop(table);
        assert_eq!(calls, 1);
    }
}
