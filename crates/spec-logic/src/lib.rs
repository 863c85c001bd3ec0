// crates/spec-logic/src/lib.rs
// ============================================================================
// Module: Specification Root
// Description: Public API surface for composable specifications.
// Purpose: Wire together expression, evaluation, and analysis modules.
// Dependencies: crate::{builder, cached, compiler, dispatch, entity, error, expression,
//              specification, trace, unify, validation, value, visitor}
// ============================================================================

//! ## Overview
//! Specifications are named boolean predicates over an entity, represented
//! as introspectable expression trees rather than opaque closures. They
//! combine with AND/OR/NOT, compile once on first use, evaluate synchronously
//! or asynchronously with short-circuiting and cancellation, memoize results
//! per key, report validation messages, and expose their structure to
//! visitors.
//!
//! ```ignore
//! let active = Specification::new(Predicate::build("a", |a| a.field("is_active").equals(true))?);
//! let large = Specification::new(Predicate::build("a", |a| a.field("amount").greater_than(3000))?);
//! let spec = SpecificationBuilder::new().create_from(active).and(&large)?.build()?;
//! assert!(spec.is_satisfied_by(&account)?);
//! ```

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod builder;
pub mod cached;
pub mod compiler;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod expression;
pub mod specification;
pub mod trace;
pub mod unify;
pub mod validation;
pub mod value;
pub mod visitor;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builder::SpecificationBuilder;
pub use cached::CachedSpecification;
pub use compiler::CompiledPredicate;
pub use compiler::DEFAULT_MAX_DEPTH;
pub use compiler::DEFAULT_MAX_NODES;
pub use compiler::EvaluationLimits;
pub use compiler::compile;
pub use dispatch::CancellationToken;
pub use dispatch::EvalFuture;
pub use entity::Entity;
pub use entity::JsonEntity;
pub use error::SpecError;
pub use error::SpecResult;
pub use expression::Expression;
pub use expression::Parameter;
pub use expression::Predicate;
pub use specification::Satisfiable;
pub use specification::SpecKind;
pub use specification::Specification;
pub use trace::EvaluationTrace;
pub use trace::JsonLinesTrace;
pub use trace::NoopTrace;
pub use trace::TraceEvent;
pub use unify::rebind;
pub use unify::unify;
pub use validation::CompositeValidation;
pub use validation::ValidationRule;
pub use validation::ValidationSpecification;
pub use value::Comparator;
pub use value::Value;
pub use value::compare;
pub use visitor::LogicalOperator;
pub use visitor::OperationCounter;
pub use visitor::OperationCounts;
pub use visitor::SpecificationVisitor;
pub use visitor::walk_expression;
