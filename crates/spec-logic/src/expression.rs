// crates/spec-logic/src/expression.rs
// ============================================================================
// Module: Predicate Expressions
// Description: Introspectable single-parameter boolean expression trees.
// Purpose: Represent what a specification tests independently of evaluation.
// Dependencies: crate::{error, value}
// ============================================================================

//! ## Overview
//! A [`Predicate`] is a bound [`Parameter`] plus a boolean [`Expression`]
//! body that reads entity fields through that parameter. Parameters compare
//! by identity, never by name, so two independently built predicates never
//! share a parameter by accident; combinators rebind one onto the other
//! before merging (see [`crate::unify`]).
//!
//! Trees are immutable values. Children sit behind [`Arc`], so cloning a node
//! is constant time and a combined tree shares its operands' subtrees instead
//! of copying them. Every transformation produces a new root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::ops::Not;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use time::Date;

use crate::error::SpecError;
use crate::error::SpecResult;
use crate::value::Comparator;
use crate::value::Value;

// ============================================================================
// SECTION: Parameter
// ============================================================================

/// Bound-parameter identity
///
/// Cloning yields the same identity. Equality is reference identity: two
/// parameters created with the same name are different parameters.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Shared name allocation; its address is the identity.
    name: Arc<str>,
}

impl Parameter {
    /// Allocates a fresh parameter identity
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
        }
    }

    /// Returns the display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true when both handles denote the same parameter
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.name, &other.name)
    }

    /// Builds a field reference through this parameter
    #[must_use]
    pub fn field(&self, name: &str) -> Expression {
        Expression::Field {
            parameter: self.clone(),
            name: Arc::from(name),
        }
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Parameter {}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// SECTION: Expression Tree
// ============================================================================

/// Node of a predicate body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Constant value
    Literal(Value),
    /// Field read through a bound parameter
    Field {
        /// Parameter the field is read through
        parameter: Parameter,
        /// Field name
        name: Arc<str>,
    },
    /// Binary comparison of two operands
    Comparison {
        /// Left operand
        left: Arc<Expression>,
        /// Comparison operator
        comparator: Comparator,
        /// Right operand
        right: Arc<Expression>,
    },
    /// Short-circuit conjunction
    And(Arc<Expression>, Arc<Expression>),
    /// Short-circuit disjunction
    Or(Arc<Expression>, Arc<Expression>),
    /// Logical negation
    Not(Arc<Expression>),
}

impl Expression {
    /// Builds a literal node
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Builds a comparison node
    #[must_use]
    pub fn compare(self, comparator: Comparator, right: impl Into<Self>) -> Self {
        Self::Comparison {
            left: Arc::new(self),
            comparator,
            right: Arc::new(right.into()),
        }
    }

    /// `self == right`
    #[must_use]
    pub fn equals(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::Equals, right)
    }

    /// `self != right`
    #[must_use]
    pub fn not_equals(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::NotEquals, right)
    }

    /// `self > right`
    #[must_use]
    pub fn greater_than(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::GreaterThan, right)
    }

    /// `self >= right`
    #[must_use]
    pub fn at_least(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::GreaterThanOrEqual, right)
    }

    /// `self < right`
    #[must_use]
    pub fn less_than(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::LessThan, right)
    }

    /// `self <= right`
    #[must_use]
    pub fn at_most(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::LessThanOrEqual, right)
    }

    /// Substring containment
    #[must_use]
    pub fn contains(self, right: impl Into<Self>) -> Self {
        self.compare(Comparator::Contains, right)
    }

    /// `self == null`
    #[must_use]
    pub fn equals_null(self) -> Self {
        self.equals(Value::Null)
    }

    /// `self != null`
    #[must_use]
    pub fn not_equals_null(self) -> Self {
        self.not_equals(Value::Null)
    }

    /// `self && right`
    #[must_use]
    pub fn and(self, right: Self) -> Self {
        Self::And(Arc::new(self), Arc::new(right))
    }

    /// `self || right`
    #[must_use]
    pub fn or(self, right: Self) -> Self {
        Self::Or(Arc::new(self), Arc::new(right))
    }

    /// `!self`
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Arc::new(self))
    }

    /// Returns the number of levels in the tree
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1_usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            node.push_children(&mut stack, depth.saturating_add(1));
        }
        max_depth
    }

    /// Returns the total number of nodes in the tree
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0_usize;
        let mut stack = vec![(self, 0_usize)];
        while let Some((node, _)) = stack.pop() {
            count = count.saturating_add(1);
            node.push_children(&mut stack, 0);
        }
        count
    }

    /// Returns the immediate children, left to right
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Literal(_) | Self::Field { .. } => Vec::new(),
            Self::Comparison {
                left,
                right,
                ..
            }
            | Self::And(left, right)
            | Self::Or(left, right) => vec![left.as_ref(), right.as_ref()],
            Self::Not(operand) => vec![operand.as_ref()],
        }
    }

    /// Pushes children onto an explicit traversal stack.
    fn push_children<'a>(&'a self, stack: &mut Vec<(&'a Self, usize)>, depth: usize) {
        for child in self.children() {
            stack.push((child, depth));
        }
    }

    /// Rejects nodes that can never produce a boolean condition.
    fn check_boolean(&self) -> SpecResult {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Literal(Value::Bool(_)) | Self::Field { .. } | Self::Comparison { .. } => {}
                Self::Literal(value) => {
                    return Err(SpecError::invalid_argument(format!(
                        "literal {value} is not a boolean condition"
                    )));
                }
                Self::And(left, right) | Self::Or(left, right) => {
                    stack.push(right);
                    stack.push(left);
                }
                Self::Not(operand) => stack.push(operand),
            }
        }
        Ok(())
    }

    /// Returns the first field bound to a parameter other than `parameter`.
    fn find_free_field(&self, parameter: &Parameter) -> Option<&Self> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Self::Field {
                parameter: bound,
                ..
            } = node
                && !bound.same_as(parameter)
            {
                return Some(node);
            }
            stack.extend(node.children());
        }
        None
    }
}

impl Not for Expression {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Field {
                parameter,
                name,
            } => write!(f, "{parameter}.{name}"),
            Self::Comparison {
                left,
                comparator,
                right,
            } => write!(f, "({left} {comparator} {right})"),
            Self::And(left, right) => write!(f, "({left} && {right})"),
            Self::Or(left, right) => write!(f, "({left} || {right})"),
            Self::Not(operand) => write!(f, "!{operand}"),
        }
    }
}

// ============================================================================
// SECTION: Literal Conversions
// ============================================================================

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// Implements `From<scalar>` for [`Expression`] as a literal node.
macro_rules! expression_from_scalar {
    ($($scalar:ty),* $(,)?) => {
        $(
            impl From<$scalar> for Expression {
                fn from(value: $scalar) -> Self {
                    Self::Literal(Value::from(value))
                }
            }
        )*
    };
}

expression_from_scalar!(bool, i32, i64, u32, u64, &str, String, BigDecimal, Date);

// ============================================================================
// SECTION: Predicate
// ============================================================================

/// Single-parameter boolean function over an entity
///
/// # Invariants
/// - Every field in `body` is read through `parameter` (no free variables).
/// - `body` is not statically non-boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Bound parameter identity.
    parameter: Parameter,
    /// Boolean-valued body.
    body: Expression,
}

impl Predicate {
    /// Creates a predicate after checking its invariants
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] when the body reads a field
    /// through another parameter or can never yield a boolean.
    pub fn new(parameter: Parameter, body: Expression) -> SpecResult<Self> {
        if let Some(free) = body.find_free_field(&parameter) {
            return Err(SpecError::invalid_argument(format!(
                "free variable {free} in predicate over `{parameter}`"
            )));
        }
        body.check_boolean()?;
        Ok(Self {
            parameter,
            body,
        })
    }

    /// Allocates a parameter named `name` and builds the body from it
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Predicate::new`].
    pub fn build(name: &str, body: impl FnOnce(&Parameter) -> Expression) -> SpecResult<Self> {
        let parameter = Parameter::new(name);
        let body = body(&parameter);
        Self::new(parameter, body)
    }

    /// Returns the predicate that accepts every entity
    #[must_use]
    pub fn always_true(name: &str) -> Self {
        Self::from_parts(Parameter::new(name), Expression::literal(true))
    }

    /// Assembles a predicate whose invariants hold by construction.
    pub(crate) const fn from_parts(parameter: Parameter, body: Expression) -> Self {
        Self {
            parameter,
            body,
        }
    }

    /// Returns the bound parameter
    #[must_use]
    pub const fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    /// Returns the body
    #[must_use]
    pub const fn body(&self) -> &Expression {
        &self.body
    }

    /// Splits the predicate into parameter and body
    #[must_use]
    pub fn into_parts(self) -> (Parameter, Expression) {
        (self.parameter, self.body)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.parameter, self.body)
    }
}
