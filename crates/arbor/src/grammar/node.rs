//! Grammar nodes
//!
//! `Node` is the closed set of parsing-expression constructs the compiler
//! understands. Trees are built once, then only read: compilation and
//! serialization both take `&Node`.

use compact_str::CompactString;

/// Lower bound of a [`Node::Repeat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// `p*`
    ZeroOrMore,
    /// `p+`
    OneOrMore,
}

impl Quantity {
    /// Number of repetitions that must match.
    #[must_use]
    pub const fn minimum(self) -> u8 {
        match self {
            Self::ZeroOrMore => 0,
            Self::OneOrMore => 1,
        }
    }

    #[must_use]
    pub const fn from_minimum(minimum: u64) -> Option<Self> {
        match minimum {
            0 => Some(Self::ZeroOrMore),
            1 => Some(Self::OneOrMore),
            _ => None,
        }
    }
}

/// Polarity of a [`Node::Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    /// `&p`: succeeds when `p` matches
    Lookahead,
    /// `!p`: succeeds when `p` does not match
    NegativeLookahead,
}

/// A parsing expression.
///
/// Composite variants own their children; there is no sharing between
/// subtrees and rules refer to each other by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Match a fixed string
    Literal {
        text: CompactString,
        case_sensitive: bool,
    },
    /// Match one character against a regex character class such as `[a-z]`
    CharClass(CompactString),
    /// Match any single character
    AnyChar,
    /// Match every child in order
    Sequence(Vec<Node>),
    /// Ordered choice: the first alternative that matches wins
    Choice(Vec<Node>),
    /// Greedy repetition, never gives matches back
    Repeat {
        quantity: Quantity,
        child: Box<Node>,
    },
    /// Optional match, always succeeds
    Maybe(Box<Node>),
    /// Zero-width lookahead
    Predicate {
        kind: PredicateKind,
        child: Box<Node>,
    },
    /// Names a sequence element so it can be read back from the parent node
    Label {
        name: CompactString,
        child: Box<Node>,
    },
    /// Hand the match to a semantic action instead of building a node
    Action {
        name: CompactString,
        child: Box<Node>,
    },
    /// Invoke another rule
    RuleRef(CompactString),
    /// Mix a grammar-declared type into the resulting node
    TypeExtension {
        type_name: CompactString,
        child: Box<Node>,
    },
}

impl Node {
    #[must_use]
    pub fn literal(text: impl Into<CompactString>) -> Self {
        Self::Literal {
            text: text.into(),
            case_sensitive: true,
        }
    }

    #[must_use]
    pub fn literal_ci(text: impl Into<CompactString>) -> Self {
        Self::Literal {
            text: text.into(),
            case_sensitive: false,
        }
    }

    #[must_use]
    pub fn char_class(pattern: impl Into<CompactString>) -> Self {
        Self::CharClass(pattern.into())
    }

    #[must_use]
    pub const fn any_char() -> Self {
        Self::AnyChar
    }

    #[must_use]
    pub fn seq(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Sequence(children.into_iter().collect())
    }

    #[must_use]
    pub fn choice(alternatives: impl IntoIterator<Item = Self>) -> Self {
        Self::Choice(alternatives.into_iter().collect())
    }

    #[must_use]
    pub fn repeat(quantity: Quantity, child: Self) -> Self {
        Self::Repeat {
            quantity,
            child: Box::new(child),
        }
    }

    #[must_use]
    pub fn zero_or_more(child: Self) -> Self {
        Self::repeat(Quantity::ZeroOrMore, child)
    }

    #[must_use]
    pub fn one_or_more(child: Self) -> Self {
        Self::repeat(Quantity::OneOrMore, child)
    }

    #[must_use]
    pub fn maybe(child: Self) -> Self {
        Self::Maybe(Box::new(child))
    }

    #[must_use]
    pub fn lookahead(child: Self) -> Self {
        Self::Predicate {
            kind: PredicateKind::Lookahead,
            child: Box::new(child),
        }
    }

    #[must_use]
    pub fn not(child: Self) -> Self {
        Self::Predicate {
            kind: PredicateKind::NegativeLookahead,
            child: Box::new(child),
        }
    }

    #[must_use]
    pub fn label(name: impl Into<CompactString>, child: Self) -> Self {
        Self::Label {
            name: name.into(),
            child: Box::new(child),
        }
    }

    #[must_use]
    pub fn action(name: impl Into<CompactString>, child: Self) -> Self {
        Self::Action {
            name: name.into(),
            child: Box::new(child),
        }
    }

    #[must_use]
    pub fn reference(name: impl Into<CompactString>) -> Self {
        Self::RuleRef(name.into())
    }

    #[must_use]
    pub fn extend(type_name: impl Into<CompactString>, child: Self) -> Self {
        Self::TypeExtension {
            type_name: type_name.into(),
            child: Box::new(child),
        }
    }

    /// Direct children, in order.
    pub fn children(&self) -> impl Iterator<Item = &Self> {
        let children: &[Self] = match self {
            Self::Sequence(children) | Self::Choice(children) => children,
            Self::Repeat { child, .. }
            | Self::Maybe(child)
            | Self::Predicate { child, .. }
            | Self::Label { child, .. }
            | Self::Action { child, .. }
            | Self::TypeExtension { child, .. } => std::slice::from_ref(child.as_ref()),
            Self::Literal { .. } | Self::CharClass(_) | Self::AnyChar | Self::RuleRef(_) => &[],
        };
        children.iter()
    }

    /// How a failed match of this terminal is described in parse errors.
    ///
    /// Literals are shown quoted, character classes by their pattern.
    /// Returns `None` for non-terminals, which never record failures themselves.
    #[must_use]
    pub fn expected_description(&self) -> Option<String> {
        match self {
            Self::Literal { text, .. } => Some(quote_expected(text)),
            Self::CharClass(pattern) => Some(pattern.to_string()),
            Self::AnyChar => Some(ANY_CHAR_DESCRIPTION.to_owned()),
            _ => None,
        }
    }
}

/// Expected-token description recorded by [`Node::AnyChar`].
pub const ANY_CHAR_DESCRIPTION: &str = "<any char>";

/// Expected-token description synthesised when the input has trailing text.
pub const END_OF_INPUT_DESCRIPTION: &str = "<EOF>";

fn quote_expected(text: &str) -> String {
    // A JSON string literal is exactly the double-quoted, escaped form we want.
    serde_json::Value::from(text).to_string()
}
