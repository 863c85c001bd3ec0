// crates/spec-logic/src/unify.rs
// ============================================================================
// Module: Parameter Unifier
// Description: Non-destructive parameter substitution over expression trees.
// Purpose: Make independently built predicate bodies share one parameter.
// Dependencies: crate::expression
// ============================================================================

//! ## Overview
//! Two predicates built separately have distinct parameter identities, so
//! their bodies cannot be merged into one tree as-is. [`unify`] returns a copy
//! of a predicate's body with every reference to its own parameter rewritten
//! to a target parameter. Inputs are never mutated: the source predicate keeps
//! reporting its original parameter.
//!
//! Substitution rewrites parameter identities only, never structure, so it is
//! idempotent across rounds of combination, preserves depth and node count,
//! and terminates on shared subtrees.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::expression::Expression;
use crate::expression::Parameter;
use crate::expression::Predicate;

// ============================================================================
// SECTION: Unification
// ============================================================================

/// Returns `predicate`'s body rebound onto `target`
#[must_use]
pub fn unify(predicate: &Predicate, target: &Parameter) -> Expression {
    if predicate.parameter().same_as(target) {
        return predicate.body().clone();
    }
    rebind(predicate.body(), predicate.parameter(), target)
}

/// Returns a copy of `expression` with every field bound to `from` rebound to `to`
///
/// Fields bound to any other parameter are copied unchanged. The walk uses an
/// explicit stack, so tree depth is bounded by memory rather than the call
/// stack.
#[must_use]
pub fn rebind(expression: &Expression, from: &Parameter, to: &Parameter) -> Expression {
    // Post-order: children finish left to right before their parent is rebuilt.
    let mut pending = vec![(expression, false)];
    let mut finished: Vec<Arc<Expression>> = Vec::new();
    while let Some((node, expanded)) = pending.pop() {
        let children = node.children();
        if expanded || children.is_empty() {
            let operands = finished.split_off(finished.len().saturating_sub(children.len()));
            finished.push(Arc::new(rebuild(node, &operands, from, to)));
        } else {
            pending.push((node, true));
            pending.extend(children.into_iter().rev().map(|child| (child, false)));
        }
    }
    finished.pop().map_or_else(|| expression.clone(), Arc::unwrap_or_clone)
}

/// Rebuilds one node over already rebound `operands`.
fn rebuild(
    node: &Expression,
    operands: &[Arc<Expression>],
    from: &Parameter,
    to: &Parameter,
) -> Expression {
    match (node, operands) {
        (
            Expression::Field {
                parameter,
                name,
            },
            [],
        ) if parameter.same_as(from) => Expression::Field {
            parameter: to.clone(),
            name: Arc::clone(name),
        },
        (
            Expression::Comparison {
                comparator,
                ..
            },
            [left, right],
        ) => Expression::Comparison {
            left: Arc::clone(left),
            comparator: *comparator,
            right: Arc::clone(right),
        },
        (Expression::And(..), [left, right]) => Expression::And(Arc::clone(left), Arc::clone(right)),
        (Expression::Or(..), [left, right]) => Expression::Or(Arc::clone(left), Arc::clone(right)),
        (Expression::Not(_), [operand]) => Expression::Not(Arc::clone(operand)),
        _ => node.clone(),
    }
}
