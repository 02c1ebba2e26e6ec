use compact_str::CompactString;
use hashbrown::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::grammar::{Node, validate_grammar};

/// A named collection of rules with one entry point.
///
/// Rules keep their declaration order, which fixes the order rule routines
/// and node classes are emitted in. Build one with [`GrammarBuilder`] or
/// [`Grammar::from_sexp`]; either way the result has passed
/// [`validate_grammar`].
///
/// # Example
///
/// ```rust
/// use arbor::grammar::{GrammarBuilder, Node};
///
/// let grammar = GrammarBuilder::new("Words")
///     .rule("words", Node::one_or_more(Node::reference("word")))
///     .rule("word", Node::seq([Node::char_class("[a-z]"), Node::maybe(Node::literal(" "))]))
///     .build()
///     .unwrap();
///
/// assert_eq!(grammar.entry_point().name, "words");
/// assert!(grammar.get_rule("word").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Grammar {
    name: CompactString,
    rules: Vec<Rule>,
    index: HashMap<CompactString, usize, ahash::RandomState>,
    entry_point: usize,
}

/// A single `name <- node` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: CompactString,
    pub node: Node,
}

impl Grammar {
    /// Package name of the generated parser, possibly dotted (`Calc.Parser`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rule_index(name).map(|index| &self.rules[index])
    }

    /// Position of a rule in declaration order.
    #[must_use]
    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn entry_point(&self) -> &Rule {
        &self.rules[self.entry_point]
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.rules == other.rules
            && self.entry_point().name == other.entry_point().name
    }
}

impl Eq for Grammar {}

/// Builder for constructing grammars
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    name: CompactString,
    rules: Vec<Rule>,
    entry_point: Option<CompactString>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            entry_point: None,
        }
    }

    /// Use `name` as the start rule instead of the first one declared.
    #[must_use]
    pub fn entry_point(mut self, name: impl Into<CompactString>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, name: impl Into<CompactString>, node: Node) -> Self {
        self.rules.push(Rule {
            name: name.into(),
            node,
        });
        self
    }

    /// Build the grammar from the configured rules.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no rules, a rule name repeats, the entry
    /// point is unknown, or grammar validation fails.
    pub fn build(self) -> CompileResult<Grammar> {
        if self.rules.is_empty() {
            return Err(CompileError::EmptyGrammar {
                grammar: self.name.into(),
            });
        }

        let mut index = HashMap::with_capacity_and_hasher(self.rules.len(), ahash::RandomState::new());
        for (position, rule) in self.rules.iter().enumerate() {
            if index.insert(rule.name.clone(), position).is_some() {
                return Err(CompileError::DuplicateRule {
                    rule: rule.name.to_string(),
                });
            }
        }

        let entry_point = match self.entry_point {
            Some(name) => *index
                .get(&name)
                .ok_or_else(|| CompileError::UnknownEntryPoint { rule: name.into() })?,
            None => 0,
        };

        let grammar = Grammar {
            name: self.name,
            rules: self.rules,
            index,
            entry_point,
        };
        validate_grammar(&grammar)?;
        Ok(grammar)
    }
}
