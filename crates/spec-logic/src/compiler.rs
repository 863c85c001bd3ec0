// crates/spec-logic/src/compiler.rs
// ============================================================================
// Module: Predicate Compiler
// Description: Translates predicate trees into reusable executable closures.
// Purpose: Pay tree-walking and validation cost once per specification.
// Dependencies: crate::{entity, error, expression, value}
// ============================================================================

//! ## Overview
//! [`compile`] walks a [`Predicate`] once and produces a [`CompiledPredicate`]:
//! a tree of boxed closures over `&dyn Entity` that can be called any number
//! of times with different entities. Compilation is where structural limits
//! are enforced, parameter binding is re-verified, and comparisons between
//! two literals are folded into constants.
//!
//! Security posture: predicate trees may be assembled from untrusted input;
//! oversized trees fail closed with [`SpecError::TooDeep`] or
//! [`SpecError::TooLarge`] before any closure is built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::entity::Entity;
use crate::error::SpecError;
use crate::error::SpecResult;
use crate::expression::Expression;
use crate::expression::Parameter;
use crate::expression::Predicate;
use crate::value::Comparator;
use crate::value::Value;
use crate::value::compare;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum expression depth.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum expression node count.
pub const DEFAULT_MAX_NODES: usize = 4096;

/// Structural limits enforced at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationLimits {
    /// Maximum tree depth
    pub max_depth: usize,
    /// Maximum total node count
    pub max_nodes: usize,
}

impl EvaluationLimits {
    /// Returns the stricter of both limits, field by field
    #[must_use]
    pub fn tightest(self, other: Self) -> Self {
        Self {
            max_depth: self.max_depth.min(other.max_depth),
            max_nodes: self.max_nodes.min(other.max_nodes),
        }
    }

    /// Verifies that `expression` fits inside these limits
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::TooDeep`] or [`SpecError::TooLarge`].
    pub fn check(&self, expression: &Expression) -> SpecResult {
        self.check_size(expression.depth(), expression.node_count())
    }

    /// Verifies precomputed tree measurements against these limits
    ///
    /// Depth is checked before node count.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::TooDeep`] or [`SpecError::TooLarge`].
    pub fn check_size(&self, actual_depth: usize, actual_nodes: usize) -> SpecResult {
        if actual_depth > self.max_depth {
            return Err(SpecError::TooDeep {
                max_depth: self.max_depth,
                actual_depth,
            });
        }
        if actual_nodes > self.max_nodes {
            return Err(SpecError::TooLarge {
                max_nodes: self.max_nodes,
                actual_nodes,
            });
        }
        Ok(())
    }
}

impl Default for EvaluationLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

// ============================================================================
// SECTION: Compiled Form
// ============================================================================

/// Boolean closure produced for a condition node.
type ConditionFn = Box<dyn Fn(&dyn Entity) -> SpecResult<bool> + Send + Sync>;

/// Value closure produced for an operand node.
type OperandFn = Box<dyn Fn(&dyn Entity) -> SpecResult<Value> + Send + Sync>;

/// Condition node after compilation.
enum Condition {
    /// Result known at compile time.
    Constant(bool),
    /// Result depends on the entity.
    Dynamic(ConditionFn),
}

impl Condition {
    /// Converts the node into a callable closure.
    fn into_fn(self) -> ConditionFn {
        match self {
            Self::Constant(value) => Box::new(move |_| Ok(value)),
            Self::Dynamic(function) => function,
        }
    }
}

/// Operand node after compilation.
enum Operand {
    /// Value known at compile time.
    Constant(Value),
    /// Value depends on the entity.
    Dynamic(OperandFn),
}

/// Executable form of a predicate
///
/// # Invariants
/// - Not bound to any entity; every call honors the entity it is given.
pub struct CompiledPredicate {
    /// Root condition closure.
    condition: ConditionFn,
    /// Node count of the source tree.
    node_count: usize,
    /// Depth of the source tree.
    depth: usize,
}

impl CompiledPredicate {
    /// Evaluates the predicate against `entity`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Evaluation`] when a field is missing, operands
    /// are incomparable, or a non-boolean field is used as a condition.
    pub fn evaluate(&self, entity: &dyn Entity) -> SpecResult<bool> {
        (self.condition)(entity)
    }

    /// Returns the node count of the compiled tree
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns the depth of the compiled tree
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

impl fmt::Debug for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPredicate")
            .field("node_count", &self.node_count)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Compiles `predicate` under `limits`
///
/// # Errors
///
/// Returns [`SpecError::TooDeep`] / [`SpecError::TooLarge`] when the tree
/// exceeds `limits`, and [`SpecError::InvalidArgument`] when a field is bound
/// to a parameter other than the predicate's own.
pub fn compile(predicate: &Predicate, limits: &EvaluationLimits) -> SpecResult<CompiledPredicate> {
    let body = predicate.body();
    limits.check(body)?;
    let condition = compile_condition(body, predicate.parameter())?;
    Ok(CompiledPredicate {
        condition: condition.into_fn(),
        node_count: body.node_count(),
        depth: body.depth(),
    })
}

/// Compiles a node used where a boolean is required.
fn compile_condition(expression: &Expression, parameter: &Parameter) -> SpecResult<Condition> {
    match expression {
        Expression::Literal(Value::Bool(value)) => Ok(Condition::Constant(*value)),
        Expression::Literal(value) => Err(SpecError::invalid_argument(format!(
            "literal {value} is not a boolean condition"
        ))),
        Expression::Field {
            name, ..
        } => {
            let read = compile_field(expression, parameter)?;
            let name = name.clone();
            Ok(Condition::Dynamic(Box::new(move |entity| match read(entity)? {
                Value::Bool(value) => Ok(value),
                other => Err(SpecError::evaluation(format!(
                    "field `{name}` is {}, not a boolean condition",
                    other.kind()
                ))),
            })))
        }
        Expression::Comparison {
            left,
            comparator,
            right,
        } => compile_comparison(
            compile_operand(left, parameter)?,
            *comparator,
            compile_operand(right, parameter)?,
        ),
        Expression::And(left, right) => {
            match compile_condition(left, parameter)? {
                Condition::Constant(false) => Ok(Condition::Constant(false)),
                Condition::Constant(true) => compile_condition(right, parameter),
                Condition::Dynamic(left) => {
                    let right = compile_condition(right, parameter)?.into_fn();
                    Ok(Condition::Dynamic(Box::new(move |entity| {
                        Ok(left(entity)? && right(entity)?)
                    })))
                }
            }
        }
        Expression::Or(left, right) => match compile_condition(left, parameter)? {
            Condition::Constant(true) => Ok(Condition::Constant(true)),
            Condition::Constant(false) => compile_condition(right, parameter),
            Condition::Dynamic(left) => {
                let right = compile_condition(right, parameter)?.into_fn();
                Ok(Condition::Dynamic(Box::new(move |entity| Ok(left(entity)? || right(entity)?))))
            }
        },
        Expression::Not(operand) => match compile_condition(operand, parameter)? {
            Condition::Constant(value) => Ok(Condition::Constant(!value)),
            Condition::Dynamic(operand) => {
                Ok(Condition::Dynamic(Box::new(move |entity| Ok(!operand(entity)?))))
            }
        },
    }
}

/// Compiles a comparison, folding it when both operands are constant.
fn compile_comparison(left: Operand, comparator: Comparator, right: Operand) -> SpecResult<Condition> {
    match (left, right) {
        (Operand::Constant(left), Operand::Constant(right)) => {
            match compare(comparator, &left, &right) {
                Ok(value) => Ok(Condition::Constant(value)),
                Err(_) => Ok(Condition::Dynamic(Box::new(move |_| {
                    compare(comparator, &left, &right)
                }))),
            }
        }
        (Operand::Constant(left), Operand::Dynamic(right)) => {
            Ok(Condition::Dynamic(Box::new(move |entity| compare(comparator, &left, &right(entity)?))))
        }
        (Operand::Dynamic(left), Operand::Constant(right)) => {
            Ok(Condition::Dynamic(Box::new(move |entity| compare(comparator, &left(entity)?, &right))))
        }
        (Operand::Dynamic(left), Operand::Dynamic(right)) => {
            Ok(Condition::Dynamic(Box::new(move |entity| {
                compare(comparator, &left(entity)?, &right(entity)?)
            })))
        }
    }
}

/// Compiles a node used as a comparison operand.
fn compile_operand(expression: &Expression, parameter: &Parameter) -> SpecResult<Operand> {
    match expression {
        Expression::Literal(value) => Ok(Operand::Constant(value.clone())),
        Expression::Field {
            ..
        } => Ok(Operand::Dynamic(compile_field(expression, parameter)?)),
        Expression::Comparison {
            ..
        }
        | Expression::And(..)
        | Expression::Or(..)
        | Expression::Not(..) => match compile_condition(expression, parameter)? {
            Condition::Constant(value) => Ok(Operand::Constant(Value::Bool(value))),
            Condition::Dynamic(condition) => {
                Ok(Operand::Dynamic(Box::new(move |entity| condition(entity).map(Value::Bool))))
            }
        },
    }
}

/// Compiles a field read after checking its parameter binding.
fn compile_field(expression: &Expression, parameter: &Parameter) -> SpecResult<OperandFn> {
    let Expression::Field {
        parameter: bound,
        name,
    } = expression
    else {
        return Err(SpecError::invalid_argument(format!("{expression} is not a field read")));
    };
    if !bound.same_as(parameter) {
        return Err(SpecError::invalid_argument(format!(
            "field {expression} is not bound to parameter `{parameter}`"
        )));
    }
    let name = name.clone();
    Ok(Box::new(move |entity| {
        entity
            .field(&name)
            .ok_or_else(|| SpecError::evaluation(format!("entity has no field `{name}`")))
    }))
}
