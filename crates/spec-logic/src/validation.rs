// crates/spec-logic/src/validation.rs
// ============================================================================
// Module: Validation Aggregator
// Description: Specifications that report human-readable failure messages.
// Purpose: Collect every unsatisfied rule instead of a single boolean.
// Dependencies: crate::{entity, error, expression, specification, trace}, smallvec
// ============================================================================

//! ## Overview
//! [`ValidationSpecification`] pairs a specification with the message to
//! report when it is unsatisfied. [`CompositeValidation`] runs an ordered list
//! of rules and returns one message per unsatisfied rule, in insertion order,
//! never stopping early. Plain specifications in a composite report a generic
//! message naming the failed specification.
//!
//! Evaluation errors are not messages: any rule that fails to evaluate aborts
//! the whole validation with that error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use smallvec::SmallVec;

use crate::entity::Entity;
use crate::error::SpecError;
use crate::error::SpecResult;
use crate::expression::Predicate;
use crate::specification::Satisfiable;
use crate::specification::Specification;
use crate::trace::EvaluationTrace;
use crate::trace::NoopTrace;

// ============================================================================
// SECTION: Single Rule
// ============================================================================

/// Specification paired with its failure message
pub struct ValidationSpecification<E> {
    /// Rule being checked.
    specification: Specification<E>,
    /// Message reported when unsatisfied.
    message: Arc<str>,
}

impl<E> Clone for ValidationSpecification<E> {
    fn clone(&self) -> Self {
        Self {
            specification: self.specification.clone(),
            message: Arc::clone(&self.message),
        }
    }
}

impl<E> ValidationSpecification<E> {
    /// Pairs `specification` with `message`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] when `message` is blank.
    pub fn new(specification: Specification<E>, message: &str) -> SpecResult<Self> {
        if message.trim().is_empty() {
            return Err(SpecError::invalid_argument("validation message must not be blank"));
        }
        Ok(Self {
            specification,
            message: Arc::from(message),
        })
    }

    /// Returns the wrapped specification
    #[must_use]
    pub const fn specification(&self) -> &Specification<E> {
        &self.specification
    }

    /// Returns the failure message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: Entity> ValidationSpecification<E> {
    /// Evaluates `entity`, appending the message to `errors` when unsatisfied
    ///
    /// # Errors
    ///
    /// Returns the wrapped specification's evaluation error.
    pub fn validate(&self, entity: &E, errors: &mut Vec<String>) -> SpecResult<bool> {
        self.validate_traced(entity, errors, &NoopTrace)
    }

    /// Same as [`ValidationSpecification::validate`], reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns the wrapped specification's evaluation error.
    pub fn validate_traced(
        &self,
        entity: &E,
        errors: &mut Vec<String>,
        trace: &dyn EvaluationTrace,
    ) -> SpecResult<bool> {
        let satisfied = self.specification.is_satisfied_by_traced(entity, trace)?;
        if !satisfied {
            errors.push(self.message.to_string());
        }
        Ok(satisfied)
    }
}

impl<E: Entity> Satisfiable<E> for ValidationSpecification<E> {
    fn as_expression(&self) -> &Predicate {
        self.specification.as_expression()
    }

    fn label(&self) -> &str {
        self.specification.label()
    }

    fn is_satisfied_by_traced(&self, entity: &E, trace: &dyn EvaluationTrace) -> SpecResult<bool> {
        self.specification.is_satisfied_by_traced(entity, trace)
    }
}

// ============================================================================
// SECTION: Rule Variants
// ============================================================================

/// One entry of a [`CompositeValidation`]
pub enum ValidationRule<E> {
    /// Rule with its own message
    Validated(ValidationSpecification<E>),
    /// Plain specification reported with a generic message
    Plain(Specification<E>),
}

impl<E> Clone for ValidationRule<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Validated(rule) => Self::Validated(rule.clone()),
            Self::Plain(specification) => Self::Plain(specification.clone()),
        }
    }
}

impl<E> ValidationRule<E> {
    /// Returns the underlying specification
    #[must_use]
    pub const fn specification(&self) -> &Specification<E> {
        match self {
            Self::Validated(rule) => rule.specification(),
            Self::Plain(specification) => specification,
        }
    }
}

impl<E: Entity> ValidationRule<E> {
    /// Checks the rule, appending at most one message.
    fn validate_into(
        &self,
        entity: &E,
        errors: &mut Vec<String>,
        trace: &dyn EvaluationTrace,
    ) -> SpecResult<bool> {
        match self {
            Self::Validated(rule) => rule.validate_traced(entity, errors, trace),
            Self::Plain(specification) => {
                let satisfied = specification.is_satisfied_by_traced(entity, trace)?;
                if !satisfied {
                    errors.push(format!("Specification {} was not satisfied", specification.label()));
                }
                Ok(satisfied)
            }
        }
    }
}

impl<E> From<ValidationSpecification<E>> for ValidationRule<E> {
    fn from(rule: ValidationSpecification<E>) -> Self {
        Self::Validated(rule)
    }
}

impl<E> From<Specification<E>> for ValidationRule<E> {
    fn from(specification: Specification<E>) -> Self {
        Self::Plain(specification)
    }
}

// ============================================================================
// SECTION: Composite
// ============================================================================

/// Label reported by composites.
const COMPOSITE_LABEL: &str = "CompositeValidation";

/// Ordered collection of validation rules
///
/// # Invariants
/// - Rules are checked in insertion order.
/// - `as_expression` is the trivial always-true predicate; composites do not
///   take part in further tree combination.
pub struct CompositeValidation<E> {
    /// Rules in insertion order.
    rules: SmallVec<[ValidationRule<E>; 4]>,
    /// Trivial predicate reported as the expression.
    always: Predicate,
}

impl<E> CompositeValidation<E> {
    /// Creates an empty composite
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: SmallVec::new(),
            always: Predicate::always_true("entity"),
        }
    }

    /// Appends a rule
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<ValidationRule<E>>) -> Self {
        self.push(rule);
        self
    }

    /// Appends a specification with its failure message
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] when `message` is blank.
    pub fn with_message(self, specification: Specification<E>, message: &str) -> SpecResult<Self> {
        Ok(self.with_rule(ValidationSpecification::new(specification, message)?))
    }

    /// Appends a rule in place
    pub fn push(&mut self, rule: impl Into<ValidationRule<E>>) {
        self.rules.push(rule.into());
    }

    /// Returns the rules in insertion order
    #[must_use]
    pub fn rules(&self) -> &[ValidationRule<E>] {
        &self.rules
    }

    /// Returns the number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when there are no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<E: Entity> CompositeValidation<E> {
    /// Returns one message per unsatisfied rule, in insertion order
    ///
    /// Every rule is checked, regardless of earlier failures.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn validate(&self, entity: &E) -> SpecResult<Vec<String>> {
        self.validate_traced(entity, &NoopTrace)
    }

    /// Same as [`CompositeValidation::validate`], reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn validate_traced(&self, entity: &E, trace: &dyn EvaluationTrace) -> SpecResult<Vec<String>> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            rule.validate_into(entity, &mut errors, trace)?;
        }
        Ok(errors)
    }
}

impl<E> Default for CompositeValidation<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for CompositeValidation<E> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            always: self.always.clone(),
        }
    }
}

impl<E, R: Into<ValidationRule<E>>> FromIterator<R> for CompositeValidation<E> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let mut composite = Self::new();
        for rule in iter {
            composite.push(rule);
        }
        composite
    }
}

impl<E: Entity> Satisfiable<E> for CompositeValidation<E> {
    fn as_expression(&self) -> &Predicate {
        &self.always
    }

    fn label(&self) -> &str {
        COMPOSITE_LABEL
    }

    /// True only when every rule is satisfied.
    fn is_satisfied_by_traced(&self, entity: &E, trace: &dyn EvaluationTrace) -> SpecResult<bool> {
        for rule in &self.rules {
            if !rule.specification().is_satisfied_by_traced(entity, trace)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
