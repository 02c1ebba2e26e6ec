//! One compile function per node variant.
//!
//! Every function upholds the same contract: on success the cursor is past
//! the match and `address` holds the result; on failure `address` holds the
//! failure sentinel and the cursor is back at its starting offset.

use crate::backend::{Backend, Var};
use crate::compiler::CompileContext;
use crate::error::{CompileError, CompileResult};
use crate::grammar::{
    ANY_CHAR_DESCRIPTION, Node, PredicateKind, Quantity, sequence_labels,
};

pub(crate) fn compile_node<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    node: &Node,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    match node {
        Node::Literal {
            text,
            case_sensitive,
        } => compile_literal(b, node, text, *case_sensitive, address, action),
        Node::CharClass(pattern) => compile_char_class(b, pattern, address, action),
        Node::AnyChar => compile_any_char(b, address, action),
        Node::Sequence(children) => compile_sequence(b, cx, children, address, action),
        Node::Choice(alternatives) => compile_choice(b, cx, alternatives, address, action),
        Node::Repeat { quantity, child } => compile_repeat(b, cx, *quantity, child, address, action),
        Node::Maybe(child) => compile_maybe(b, cx, child, address, action),
        Node::Predicate { kind, child } => compile_predicate(b, cx, *kind, child, address, action),
        // Labels only name the element for the enclosing sequence.
        Node::Label { child, .. } => compile_node(b, cx, child, address, action),
        Node::Action { name, child } => compile_node(b, cx, child, address, Some(name)),
        Node::RuleRef(name) => {
            if let Some(action) = action {
                return Err(CompileError::ActionOnReference {
                    rule: cx.rule().to_owned(),
                    action: action.to_owned(),
                });
            }
            b.jump(address, name);
            Ok(())
        }
        Node::TypeExtension { type_name, child } => {
            compile_node(b, cx, child, address, action)?;
            b.if_node(address, |b| {
                b.extend_node(address, type_name);
                Ok(())
            })
        }
    }
}

/// Match `length` characters if `condition` holds, otherwise fail with
/// `expected`.
fn compile_terminal<B: Backend>(
    b: &mut B,
    condition: B::Expr,
    length: usize,
    expected: &str,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    b.if_else(
        condition,
        |b| {
            b.syntax_node(address, b.offset(), b.offset_plus(length), None, action, None);
            Ok(())
        },
        |b| {
            b.failure(address, expected);
            Ok(())
        },
    )
}

fn compile_literal<B: Backend>(
    b: &mut B,
    node: &Node,
    text: &str,
    case_sensitive: bool,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let length = text.chars().count();
    let expected = node.expected_description().unwrap_or_default();
    let chunk = b.chunk(length);
    let condition = b.string_match(&chunk, text, case_sensitive);
    compile_terminal(b, condition, length, &expected, address, action)
}

fn compile_char_class<B: Backend>(
    b: &mut B,
    pattern: &str,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let chunk = b.chunk(1);
    let condition = b.regex_match(&chunk, pattern);
    compile_terminal(b, condition, 1, pattern, address, action)
}

fn compile_any_char<B: Backend>(
    b: &mut B,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let condition = b.has_chars();
    compile_terminal(b, condition, 1, ANY_CHAR_DESCRIPTION, address, action)
}

/// Shared state of one sequence being compiled.
struct SequenceVars<'a> {
    index: &'a Var,
    elements: &'a Var,
}

fn compile_sequence<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    children: &[Node],
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let class = (!sequence_labels(children).is_empty()).then(|| cx.next_class());
    let [index, elements] = b.local_vars([("index", b.offset()), ("elements", b.empty_list())]);
    let vars = SequenceVars {
        index: &index,
        elements: &elements,
    };
    compile_sequence_elements(b, cx, children, &vars)?;

    let failed = b.is_null(&elements);
    b.if_else(
        failed,
        |b| {
            b.assign(address, b.failure_node());
            Ok(())
        },
        |b| {
            b.syntax_node(
                address,
                b.load(&index),
                b.offset(),
                Some(&elements),
                action,
                class.as_deref(),
            );
            Ok(())
        },
    )
}

/// Match `children` in order, appending each result to the element list.
///
/// The first failure nulls the list and rewinds to the sequence start; the
/// remaining children are nested inside the success branch so they never
/// run after a failure.
fn compile_sequence_elements<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    children: &[Node],
    vars: &SequenceVars<'_>,
) -> CompileResult<()> {
    let Some((child, rest)) = children.split_first() else {
        return Ok(());
    };
    let element = b.local_var("address", b.failure_node());
    compile_node(b, cx, child, &element, None)?;
    b.if_node_else(
        &element,
        |b| {
            b.append(vars.elements, &element);
            compile_sequence_elements(b, cx, rest, vars)
        },
        |b| {
            b.assign(vars.elements, b.null());
            b.set_offset(b.load(vars.index));
            Ok(())
        },
    )
}

fn compile_choice<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    alternatives: &[Node],
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let index = b.local_var("index", b.offset());
    compile_alternatives(b, cx, alternatives, &index, address, action)
}

/// Try each alternative in turn until one leaves a non-failure in `address`.
fn compile_alternatives<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    alternatives: &[Node],
    index: &Var,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let Some((first, rest)) = alternatives.split_first() else {
        b.assign(address, b.failure_node());
        return Ok(());
    };
    compile_node(b, cx, first, address, action)?;
    if rest.is_empty() {
        return Ok(());
    }
    b.unless_node(address, |b| {
        b.set_offset(b.load(index));
        compile_alternatives(b, cx, rest, index, address, action)
    })
}

fn compile_repeat<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    quantity: Quantity,
    child: &Node,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let [remaining, index, elements, element] = b.local_vars([
        ("remaining", b.int(i64::from(quantity.minimum()))),
        ("index", b.offset()),
        ("elements", b.empty_list()),
        ("address", b.null()),
    ]);

    b.while_not_failure(&element, |b| {
        compile_node(b, cx, child, &element, None)?;
        b.if_node(&element, |b| {
            b.append(&elements, &element);
            b.decrement(&remaining);
            Ok(())
        })
    })?;

    let enough = b.is_zero(&remaining);
    b.if_else(
        enough,
        |b| {
            b.syntax_node(
                address,
                b.load(&index),
                b.offset(),
                Some(&elements),
                action,
                None,
            );
            Ok(())
        },
        |b| {
            b.set_offset(b.load(&index));
            b.assign(address, b.failure_node());
            Ok(())
        },
    )
}

fn compile_maybe<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    child: &Node,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let index = b.local_var("index", b.offset());
    compile_node(b, cx, child, address, action)?;
    b.unless_node(address, |b| {
        b.syntax_node(address, b.load(&index), b.load(&index), None, action, None);
        Ok(())
    })
}

fn compile_predicate<B: Backend>(
    b: &mut B,
    cx: &mut CompileContext,
    kind: PredicateKind,
    child: &Node,
    address: &Var,
    action: Option<&str>,
) -> CompileResult<()> {
    let index = b.local_var("index", b.offset());
    let saved = match kind {
        PredicateKind::Lookahead => None,
        PredicateKind::NegativeLookahead => Some(b.save_failures()),
    };
    let result = b.local_var("address", b.failure_node());
    compile_node(b, cx, child, &result, None)?;
    b.set_offset(b.load(&index));

    let succeed = |b: &mut B| -> CompileResult<()> {
        if let Some(saved) = &saved {
            b.restore_failures(saved);
        }
        b.syntax_node(address, b.load(&index), b.load(&index), None, action, None);
        Ok(())
    };
    let fail = |b: &mut B| -> CompileResult<()> {
        b.assign(address, b.failure_node());
        Ok(())
    };
    match kind {
        PredicateKind::Lookahead => b.if_node_else(&result, succeed, fail),
        PredicateKind::NegativeLookahead => b.if_node_else(&result, fail, succeed),
    }
}
