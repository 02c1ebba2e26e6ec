//! Canonical serialized form
//!
//! Every node serializes to a JSON array whose first element is a tag string,
//! followed by the variant's parameters and children:
//!
//! ```text
//! ["repeat", 0, ["string", "foo"]]
//! ["grammar", "Calc", ["rule", "sum", ["sequence", ...]], ...]
//! ["grammar", "Calc", ["rule", "digit", ...], ["rule", "sum", ...], ["entry", "sum"]]
//! ```
//!
//! Deserialization errors carry the path of the offending array, written
//! `$` for the root and `$[i]` for each step down (`$[2][1]`).

use std::fmt;

use compact_str::CompactString;
use serde_json::Value;

use super::{Grammar, GrammarBuilder, Node, PredicateKind, Quantity};
use crate::error::{CompileError, CompileResult};

pub const TAG_STRING: &str = "string";
pub const TAG_CI_STRING: &str = "ci-string";
pub const TAG_CHAR_CLASS: &str = "char-class";
pub const TAG_ANY_CHAR: &str = "any-char";
pub const TAG_SEQUENCE: &str = "sequence";
pub const TAG_CHOICE: &str = "choice";
pub const TAG_REPEAT: &str = "repeat";
pub const TAG_MAYBE: &str = "maybe";
pub const TAG_AND: &str = "and";
pub const TAG_NOT: &str = "not";
pub const TAG_LABEL: &str = "label";
pub const TAG_ACTION: &str = "action";
pub const TAG_REFERENCE: &str = "reference";
pub const TAG_TYPE: &str = "type";
pub const TAG_GRAMMAR: &str = "grammar";
pub const TAG_RULE: &str = "rule";
pub const TAG_ENTRY: &str = "entry";

/// Package name given to a grammar built from a bare node.
pub const DEFAULT_GRAMMAR_NAME: &str = "Generated";
/// Rule name given to a bare node.
pub const DEFAULT_RULE_NAME: &str = "root";

/// Location inside a serialized tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SexpPath(Vec<usize>);

impl SexpPath {
    fn child<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        self.0.push(index);
        let result = f(self);
        self.0.pop();
        result
    }
}

impl fmt::Display for SexpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for index in &self.0 {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

impl Node {
    /// Serialize to the canonical nested-array form.
    #[must_use]
    pub fn to_sexp(&self) -> Value {
        let mut items = Vec::with_capacity(3);
        match self {
            Self::Literal {
                text,
                case_sensitive,
            } => {
                let tag = if *case_sensitive {
                    TAG_STRING
                } else {
                    TAG_CI_STRING
                };
                items.push(tag.into());
                items.push(text.as_str().into());
            }
            Self::CharClass(pattern) => {
                items.push(TAG_CHAR_CLASS.into());
                items.push(pattern.as_str().into());
            }
            Self::AnyChar => items.push(TAG_ANY_CHAR.into()),
            Self::Sequence(children) | Self::Choice(children) => {
                let tag = if matches!(self, Self::Sequence(_)) {
                    TAG_SEQUENCE
                } else {
                    TAG_CHOICE
                };
                items.push(tag.into());
                items.extend(children.iter().map(Self::to_sexp));
            }
            Self::Repeat { quantity, child } => {
                items.push(TAG_REPEAT.into());
                items.push(quantity.minimum().into());
                items.push(child.to_sexp());
            }
            Self::Maybe(child) => {
                items.push(TAG_MAYBE.into());
                items.push(child.to_sexp());
            }
            Self::Predicate { kind, child } => {
                let tag = match kind {
                    PredicateKind::Lookahead => TAG_AND,
                    PredicateKind::NegativeLookahead => TAG_NOT,
                };
                items.push(tag.into());
                items.push(child.to_sexp());
            }
            Self::Label { name, child } => {
                items.push(TAG_LABEL.into());
                items.push(name.as_str().into());
                items.push(child.to_sexp());
            }
            Self::Action { name, child } => {
                items.push(TAG_ACTION.into());
                items.push(name.as_str().into());
                items.push(child.to_sexp());
            }
            Self::RuleRef(name) => {
                items.push(TAG_REFERENCE.into());
                items.push(name.as_str().into());
            }
            Self::TypeExtension { type_name, child } => {
                items.push(TAG_TYPE.into());
                items.push(type_name.as_str().into());
                items.push(child.to_sexp());
            }
        }
        Value::Array(items)
    }

    /// Rebuild a node from its canonical form.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownTag`] for an unrecognised tag and
    /// [`CompileError::MalformedNode`] for any other shape problem, both
    /// naming the path of the offending array.
    pub fn from_sexp(value: &Value) -> CompileResult<Self> {
        node_from_sexp(value, &mut SexpPath::default())
    }
}

impl Grammar {
    /// Serialize to `["grammar", name, ["rule", name, node]...]`.
    ///
    /// Rules keep their declaration order. An entry point other than the
    /// first rule is recorded by a trailing `["entry", name]`.
    #[must_use]
    pub fn to_sexp(&self) -> Value {
        let rules = self.rules().iter().map(|rule| {
            Value::Array(vec![
                TAG_RULE.into(),
                rule.name.as_str().into(),
                rule.node.to_sexp(),
            ])
        });
        let mut items = vec![TAG_GRAMMAR.into(), self.name().into()];
        items.extend(rules);
        let entry = &self.entry_point().name;
        if self.rules().first().is_some_and(|first| first.name != *entry) {
            items.push(Value::Array(vec![TAG_ENTRY.into(), entry.as_str().into()]));
        }
        Value::Array(items)
    }

    /// Rebuild a grammar from its canonical form.
    ///
    /// A bare node is accepted too and becomes a grammar named
    /// [`DEFAULT_GRAMMAR_NAME`] with a single rule [`DEFAULT_RULE_NAME`].
    ///
    /// # Errors
    ///
    /// Any serialized-form error of [`Node::from_sexp`], plus the validation
    /// errors of [`GrammarBuilder::build`].
    pub fn from_sexp(value: &Value) -> CompileResult<Self> {
        let mut path = SexpPath::default();
        let (tag, items) = split_tag(value, &mut path)?;
        if tag != TAG_GRAMMAR {
            let node = node_from_sexp(value, &mut path)?;
            return GrammarBuilder::new(DEFAULT_GRAMMAR_NAME)
                .rule(DEFAULT_RULE_NAME, node)
                .build();
        }

        let name = string_at(items, 1, &mut path, tag)?;
        let mut builder = GrammarBuilder::new(name);
        for index in 2..items.len() {
            builder = path.child(index, |path| {
                let (tag, item) = split_tag(&items[index], path)?;
                match tag {
                    TAG_RULE => {
                        expect_len(item, 3, path, tag)?;
                        let rule_name = string_at(item, 1, path, tag)?;
                        let node = path.child(2, |path| node_from_sexp(&item[2], path))?;
                        Ok(builder.rule(rule_name, node))
                    }
                    TAG_ENTRY if index == items.len() - 1 => {
                        expect_len(item, 2, path, tag)?;
                        Ok(builder.entry_point(string_at(item, 1, path, tag)?))
                    }
                    TAG_ENTRY => Err(malformed(path, format!("`{TAG_ENTRY}` must come last"))),
                    _ => Err(malformed(path, format!("expected `{TAG_RULE}`, found `{tag}`"))),
                }
            })?;
        }
        builder.build()
    }
}

fn node_from_sexp(value: &Value, path: &mut SexpPath) -> CompileResult<Node> {
    let (tag, items) = split_tag(value, path)?;
    let node = match tag {
        TAG_STRING | TAG_CI_STRING => {
            expect_len(items, 2, path, tag)?;
            Node::Literal {
                text: string_at(items, 1, path, tag)?,
                case_sensitive: tag == TAG_STRING,
            }
        }
        TAG_CHAR_CLASS => {
            expect_len(items, 2, path, tag)?;
            Node::CharClass(string_at(items, 1, path, tag)?)
        }
        TAG_ANY_CHAR => {
            expect_len(items, 1, path, tag)?;
            Node::AnyChar
        }
        TAG_SEQUENCE | TAG_CHOICE => {
            let children = children_from(items, 1, path)?;
            if tag == TAG_SEQUENCE {
                Node::Sequence(children)
            } else {
                Node::Choice(children)
            }
        }
        TAG_REPEAT => {
            expect_len(items, 3, path, tag)?;
            let quantity = items[1]
                .as_u64()
                .and_then(Quantity::from_minimum)
                .ok_or_else(|| malformed(path, "repeat minimum must be 0 or 1".to_owned()))?;
            Node::repeat(quantity, child_at(items, 2, path)?)
        }
        TAG_MAYBE => {
            expect_len(items, 2, path, tag)?;
            Node::maybe(child_at(items, 1, path)?)
        }
        TAG_AND | TAG_NOT => {
            expect_len(items, 2, path, tag)?;
            let child = child_at(items, 1, path)?;
            if tag == TAG_AND {
                Node::lookahead(child)
            } else {
                Node::not(child)
            }
        }
        TAG_LABEL | TAG_ACTION | TAG_TYPE => {
            expect_len(items, 3, path, tag)?;
            let name = string_at(items, 1, path, tag)?;
            let child = child_at(items, 2, path)?;
            match tag {
                TAG_LABEL => Node::label(name, child),
                TAG_ACTION => Node::action(name, child),
                _ => Node::extend(name, child),
            }
        }
        TAG_REFERENCE => {
            expect_len(items, 2, path, tag)?;
            Node::RuleRef(string_at(items, 1, path, tag)?)
        }
        other => {
            return Err(CompileError::UnknownTag {
                path: path.to_string(),
                tag: other.to_owned(),
            });
        }
    };
    Ok(node)
}

fn split_tag<'v>(value: &'v Value, path: &SexpPath) -> CompileResult<(&'v str, &'v [Value])> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| malformed(path, "expected a non-empty array".to_owned()))?;
    let tag = items[0]
        .as_str()
        .ok_or_else(|| malformed(path, "tag must be a string".to_owned()))?;
    Ok((tag, items))
}

fn expect_len(items: &[Value], len: usize, path: &SexpPath, tag: &str) -> CompileResult<()> {
    if items.len() == len {
        Ok(())
    } else {
        Err(malformed(
            path,
            format!(
                "`{tag}` takes {} argument(s), found {}",
                len - 1,
                items.len() - 1
            ),
        ))
    }
}

fn string_at(
    items: &[Value],
    index: usize,
    path: &SexpPath,
    tag: &str,
) -> CompileResult<CompactString> {
    items
        .get(index)
        .and_then(Value::as_str)
        .map(CompactString::from)
        .ok_or_else(|| malformed(path, format!("argument {index} of `{tag}` must be a string")))
}

fn child_at(items: &[Value], index: usize, path: &mut SexpPath) -> CompileResult<Node> {
    path.child(index, |path| node_from_sexp(&items[index], path))
}

fn children_from(items: &[Value], start: usize, path: &mut SexpPath) -> CompileResult<Vec<Node>> {
    (start..items.len())
        .map(|index| child_at(items, index, path))
        .collect()
}

fn malformed(path: &SexpPath, reason: String) -> CompileError {
    CompileError::MalformedNode {
        path: path.to_string(),
        reason,
    }
}
