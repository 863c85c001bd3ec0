// crates/spec-logic/src/visitor.rs
// ============================================================================
// Module: Structural Visitor
// Description: Pre-order walk over specification expression trees.
// Purpose: Analyze combinator structure without evaluating anything.
// Dependencies: crate::{entity, expression, specification}, serde
// ============================================================================

//! ## Overview
//! [`SpecificationVisitor`] walks the expression returned by a
//! specification's `as_expression` and calls a hook for every conjunction,
//! disjunction, and negation node, passing operand sub-expressions rather
//! than values. Traversal is pre-order and left to right. [`OperationCounter`]
//! is the reference analyzer: its counters accumulate across visits until
//! [`OperationCounter::reset`].
//!
//! Visitors are single-threaded, stateful analyzers; they are not `Sync`
//! services and need no locking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::entity::Entity;
use crate::expression::Expression;
use crate::specification::Satisfiable;

// ============================================================================
// SECTION: Operator Kind
// ============================================================================

/// Binary logical operator recognized by the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    /// Conjunction
    And,
    /// Disjunction
    Or,
}

// ============================================================================
// SECTION: Visitor Trait
// ============================================================================

/// Overridable hooks for a structural walk
pub trait SpecificationVisitor {
    /// Called for every conjunction or disjunction node
    fn on_logical_operation(
        &mut self,
        _operator: LogicalOperator,
        _left: &Expression,
        _right: &Expression,
    ) {
    }

    /// Called for every negation node
    fn on_not_operation(&mut self, _operand: &Expression) {}

    /// Walks `specification.as_expression()`
    fn visit<E, S>(&mut self, specification: &S)
    where
        Self: Sized,
        E: Entity,
        S: Satisfiable<E> + ?Sized,
    {
        walk_expression(self, specification.as_expression().body());
    }
}

/// Walks `expression` in pre-order, invoking `visitor`'s hooks
pub fn walk_expression<V: SpecificationVisitor + ?Sized>(visitor: &mut V, expression: &Expression) {
    let mut stack = vec![expression];
    while let Some(node) = stack.pop() {
        match node {
            Expression::And(left, right) => {
                visitor.on_logical_operation(LogicalOperator::And, left, right);
            }
            Expression::Or(left, right) => {
                visitor.on_logical_operation(LogicalOperator::Or, left, right);
            }
            Expression::Not(operand) => visitor.on_not_operation(operand),
            Expression::Literal(_)
            | Expression::Field {
                ..
            }
            | Expression::Comparison {
                ..
            } => {}
        }
        stack.extend(node.children().into_iter().rev());
    }
}

// ============================================================================
// SECTION: Operation Counter
// ============================================================================

/// Snapshot of [`OperationCounter`] totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OperationCounts {
    /// Conjunction nodes seen
    pub and_count: usize,
    /// Disjunction nodes seen
    pub or_count: usize,
    /// Negation nodes seen
    pub not_count: usize,
    /// Sum of all counters
    pub total_count: usize,
}

/// Visitor counting logical operators across one or more trees
#[derive(Debug, Clone, Default)]
pub struct OperationCounter {
    /// Conjunction count.
    and_count: usize,
    /// Disjunction count.
    or_count: usize,
    /// Negation count.
    not_count: usize,
}

impl OperationCounter {
    /// Creates a zeroed counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the conjunction count
    #[must_use]
    pub const fn and_count(&self) -> usize {
        self.and_count
    }

    /// Returns the disjunction count
    #[must_use]
    pub const fn or_count(&self) -> usize {
        self.or_count
    }

    /// Returns the negation count
    #[must_use]
    pub const fn not_count(&self) -> usize {
        self.not_count
    }

    /// Returns the sum of all counters
    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.and_count.saturating_add(self.or_count).saturating_add(self.not_count)
    }

    /// Returns a snapshot of all counters
    #[must_use]
    pub const fn counts(&self) -> OperationCounts {
        OperationCounts {
            and_count: self.and_count,
            or_count: self.or_count,
            not_count: self.not_count,
            total_count: self.total_count(),
        }
    }

    /// Zeroes every counter
    pub const fn reset(&mut self) {
        self.and_count = 0;
        self.or_count = 0;
        self.not_count = 0;
    }
}

impl SpecificationVisitor for OperationCounter {
    fn on_logical_operation(
        &mut self,
        operator: LogicalOperator,
        _left: &Expression,
        _right: &Expression,
    ) {
        match operator {
            LogicalOperator::And => self.and_count = self.and_count.saturating_add(1),
            LogicalOperator::Or => self.or_count = self.or_count.saturating_add(1),
        }
    }

    fn on_not_operation(&mut self, _operand: &Expression) {
        self.not_count = self.not_count.saturating_add(1);
    }
}
