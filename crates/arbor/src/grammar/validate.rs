use crate::error::{CompileError, CompileResult};
use crate::grammar::{Grammar, Node, Rule};

/// Validate a grammar for problems that would make its compiled parser
/// unusable.
///
/// # Errors
///
/// Returns the first problem found: an invalid grammar name, then, walking
/// rules in declaration order, an invalid rule, label, action or type name,
/// a reference to an undefined rule, or a character class that is not a
/// valid regex.
pub fn validate_grammar(grammar: &Grammar) -> CompileResult<()> {
    if !is_package_name(grammar.name()) {
        return Err(CompileError::InvalidGrammarName {
            name: grammar.name().to_owned(),
        });
    }
    for rule in grammar.rules() {
        if !is_identifier(&rule.name) {
            return Err(invalid_name(rule, "rule", &rule.name));
        }
        check_node(grammar, rule, &rule.node)?;
    }
    Ok(())
}

/// Reject repetitions whose body can succeed without consuming input.
///
/// Such a loop never terminates at runtime, so it is reported at compile time
/// unless the caller opted out through
/// [`CompileConfig`](crate::compiler::CompileConfig).
///
/// # Errors
///
/// [`CompileError::NullableRepetition`] naming the first offending rule.
pub fn check_repetitions(grammar: &Grammar) -> CompileResult<()> {
    for rule in grammar.rules() {
        if has_nullable_repetition(grammar, &rule.node) {
            return Err(CompileError::NullableRepetition {
                rule: rule.name.to_string(),
            });
        }
    }
    Ok(())
}

/// `[A-Za-z_][A-Za-z0-9_]*`
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One or more identifiers joined by `.` (`Calc.Number`).
#[must_use]
pub fn is_type_name(name: &str) -> bool {
    name.split('.').all(is_identifier)
}

/// Dotted identifiers that each start with an uppercase letter
/// (`Calc.Parser`).
#[must_use]
pub fn is_package_name(name: &str) -> bool {
    name.split('.').all(|segment| {
        segment.starts_with(|c: char| c.is_ascii_uppercase()) && is_identifier(segment)
    })
}

fn check_node(grammar: &Grammar, rule: &Rule, node: &Node) -> CompileResult<()> {
    match node {
        Node::RuleRef(name) => {
            if grammar.get_rule(name).is_none() {
                return Err(CompileError::UnresolvedReference {
                    rule: rule.name.to_string(),
                    reference: name.to_string(),
                });
            }
        }
        Node::CharClass(pattern) => {
            if let Err(err) = regex::Regex::new(pattern) {
                return Err(CompileError::InvalidCharClass {
                    rule: rule.name.to_string(),
                    pattern: pattern.to_string(),
                    reason: err.to_string(),
                });
            }
        }
        Node::Label { name, .. } if !is_identifier(name) => {
            return Err(invalid_name(rule, "label", name));
        }
        Node::Action { name, .. } if !is_identifier(name) => {
            return Err(invalid_name(rule, "action", name));
        }
        Node::TypeExtension { type_name, .. } if !is_type_name(type_name) => {
            return Err(invalid_name(rule, "type", type_name));
        }
        _ => {}
    }
    node.children()
        .try_for_each(|child| check_node(grammar, rule, child))
}

fn has_nullable_repetition(grammar: &Grammar, node: &Node) -> bool {
    match node {
        Node::Repeat { child, .. } if child.is_nullable(grammar) => true,
        _ => node
            .children()
            .any(|child| has_nullable_repetition(grammar, child)),
    }
}

fn invalid_name(rule: &Rule, kind: &'static str, name: &str) -> CompileError {
    CompileError::InvalidName {
        rule: rule.name.to_string(),
        kind,
        name: name.to_owned(),
    }
}
