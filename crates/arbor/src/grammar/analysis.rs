//! Static analysis over grammar nodes
//!
//! Nullability feeds validation. Sequence labels decide which sequences get
//! their own node class with named accessors.

use compact_str::CompactString;
use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::grammar::{Grammar, Node};

/// Accessors every syntax node already has; labels with these names are
/// not turned into accessors.
pub const RESERVED_LABELS: [&str; 3] = ["text", "offset", "elements"];

/// Prefix of generated node class names, numbered from 1.
pub const NODE_CLASS_PREFIX: &str = "TreeNode";

/// `(label, element index)` pairs of one sequence.
pub type LabelTable = SmallVec<[(CompactString, usize); 4]>;

/// A node class generated for a labelled sequence.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeClass {
    pub name: CompactString,
    pub labels: LabelTable,
}

impl Node {
    /// Whether this expression can succeed without consuming input.
    ///
    /// References are followed through `grammar`; a rule already being
    /// visited counts as non-nullable so recursive grammars terminate.
    #[must_use]
    pub fn is_nullable(&self, grammar: &Grammar) -> bool {
        let mut visiting = HashSet::with_hasher(ahash::RandomState::new());
        nullable(self, grammar, &mut visiting)
    }
}

fn nullable<'g>(
    node: &'g Node,
    grammar: &'g Grammar,
    visiting: &mut HashSet<&'g str, ahash::RandomState>,
) -> bool {
    match node {
        Node::Literal { text, .. } => text.is_empty(),
        Node::CharClass(_) | Node::AnyChar => false,
        Node::Sequence(children) => children.iter().all(|c| nullable(c, grammar, visiting)),
        Node::Choice(children) => children.iter().any(|c| nullable(c, grammar, visiting)),
        Node::Repeat { quantity, child } => {
            quantity.minimum() == 0 || nullable(child, grammar, visiting)
        }
        Node::Maybe(_) | Node::Predicate { .. } => true,
        Node::Label { child, .. } | Node::Action { child, .. } | Node::TypeExtension { child, .. } => {
            nullable(child, grammar, visiting)
        }
        Node::RuleRef(name) => {
            let Some(rule) = grammar.get_rule(name) else {
                return false;
            };
            if !visiting.insert(rule.name.as_str()) {
                return false;
            }
            let result = nullable(&rule.node, grammar, visiting);
            visiting.remove(rule.name.as_str());
            result
        }
    }
}

/// Labels of a sequence's elements.
///
/// An element is labelled by an explicit [`Node::Label`] or, failing that,
/// by the name of the rule it references. The first element with a given
/// name wins.
#[must_use]
pub fn sequence_labels(children: &[Node]) -> LabelTable {
    let mut labels = LabelTable::new();
    for (index, child) in children.iter().enumerate() {
        let name = match child {
            Node::Label { name, .. } | Node::RuleRef(name) => name,
            _ => continue,
        };
        if RESERVED_LABELS.contains(&name.as_str()) || labels.iter().any(|(seen, _)| seen == name) {
            continue;
        }
        labels.push((name.clone(), index));
    }
    labels
}

/// Every node class the grammar needs, in the order the compiler assigns
/// them: rules in declaration order, nodes depth-first, parents before
/// children.
#[must_use]
pub fn collect_node_classes(grammar: &Grammar) -> Vec<NodeClass> {
    let mut classes = Vec::new();
    for rule in grammar.rules() {
        collect(&rule.node, &mut classes);
    }
    classes
}

/// Name of the `n`th generated node class (1-based).
#[must_use]
pub fn node_class_name(n: usize) -> CompactString {
    compact_str::format_compact!("{NODE_CLASS_PREFIX}{n}")
}

fn collect(node: &Node, classes: &mut Vec<NodeClass>) {
    if let Node::Sequence(children) = node {
        let labels = sequence_labels(children);
        if !labels.is_empty() {
            classes.push(NodeClass {
                name: node_class_name(classes.len() + 1),
                labels,
            });
        }
    }
    for child in node.children() {
        collect(child, classes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;

    fn grammar(rules: Vec<(&str, Node)>) -> Grammar {
        rules
            .into_iter()
            .fold(GrammarBuilder::new("G"), |b, (name, node)| b.rule(name, node))
            .build()
            .unwrap()
    }

    #[test]
    fn test_nullable() {
        let g = grammar(vec![
            ("a", Node::seq([Node::maybe(Node::literal("x")), Node::zero_or_more(Node::any_char())])),
            ("b", Node::seq([Node::reference("a"), Node::literal("y")])),
            ("c", Node::choice([Node::reference("b"), Node::literal("")])),
            ("d", Node::seq([Node::reference("d"), Node::literal("z")])),
        ]);
        assert!(g.get_rule("a").unwrap().node.is_nullable(&g));
        assert!(!g.get_rule("b").unwrap().node.is_nullable(&g));
        assert!(g.get_rule("c").unwrap().node.is_nullable(&g));
        assert!(!g.get_rule("d").unwrap().node.is_nullable(&g));
        assert!(Node::not(Node::literal("q")).is_nullable(&g));
    }

    #[test]
    fn test_sequence_labels() {
        let labels = sequence_labels(&[
            Node::label("head", Node::literal("x")),
            Node::literal(","),
            Node::reference("item"),
            Node::label("head", Node::literal("y")),
            Node::reference("text"),
        ]);
        let labels: Vec<_> = labels.iter().map(|(n, i)| (n.as_str(), *i)).collect();
        assert_eq!(labels, [("head", 0), ("item", 2)]);
    }

    #[test]
    fn test_node_classes_are_numbered_depth_first() {
        let g = grammar(vec![
            (
                "a",
                Node::seq([
                    Node::label("x", Node::literal("1")),
                    Node::seq([Node::reference("b"), Node::literal("2")]),
                ]),
            ),
            ("b", Node::seq([Node::label("y", Node::literal("3"))])),
        ]);
        let names: Vec<String> = collect_node_classes(&g)
            .into_iter()
            .map(|class| format!("{}:{}", class.name, class.labels[0].0))
            .collect();
        assert_eq!(names, ["TreeNode1:x", "TreeNode2:b", "TreeNode3:y"]);
    }
}
