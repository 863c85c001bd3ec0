// crates/spec-logic/src/builder.rs
// ============================================================================
// Module: Specification Builder
// Description: Fluent left-to-right assembly of combinator chains.
// Purpose: Compose specifications without instantiating combinators directly.
// Dependencies: crate::{error, expression, specification}
// ============================================================================

//! ## Overview
//! [`SpecificationBuilder`] holds at most one specification. `create` seeds
//! it; `and`, `or`, and `negate` replace it with the combinator result; `build`
//! returns it. Chaining or building before `create` fails with
//! [`SpecError::InvalidOperation`].

use crate::error::SpecError;
use crate::error::SpecResult;
use crate::expression::Predicate;
use crate::specification::Specification;

// ============================================================================
// SECTION: Fluent Builder API
// ============================================================================

/// Message reported when the builder is used before `create`.
const EMPTY_BUILDER: &str = "No specification has been created yet.";

/// Fluent builder for specification chains
pub struct SpecificationBuilder<E> {
    /// Specification under construction.
    specification: Option<Specification<E>>,
}

impl<E> SpecificationBuilder<E> {
    /// Creates an empty builder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            specification: None,
        }
    }

    /// Seeds the builder with a leaf over `predicate`
    #[must_use]
    pub fn create(self, predicate: Predicate) -> Self {
        self.create_from(Specification::new(predicate))
    }

    /// Seeds the builder with an existing specification
    #[must_use]
    pub fn create_from(mut self, specification: Specification<E>) -> Self {
        self.specification = Some(specification);
        self
    }

    /// Replaces the held specification with `held && other`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidOperation`] before `create`.
    pub fn and(self, other: &Specification<E>) -> SpecResult<Self> {
        let held = self.take()?;
        Ok(Self::seeded(Specification::conjunction(&held, other)))
    }

    /// Replaces the held specification with `held || other`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidOperation`] before `create`.
    pub fn or(self, other: &Specification<E>) -> SpecResult<Self> {
        let held = self.take()?;
        Ok(Self::seeded(Specification::disjunction(&held, other)))
    }

    /// Replaces the held specification with `!held`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidOperation`] before `create`.
    pub fn negate(self) -> SpecResult<Self> {
        let held = self.take()?;
        Ok(Self::seeded(Specification::negation(&held)))
    }

    /// Returns the assembled specification
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidOperation`] before `create`.
    pub fn build(self) -> SpecResult<Specification<E>> {
        self.take()
    }

    /// Returns true once a specification has been created
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.specification.is_some()
    }

    /// Creates a builder holding `specification`.
    const fn seeded(specification: Specification<E>) -> Self {
        Self {
            specification: Some(specification),
        }
    }

    /// Extracts the held specification or reports the empty builder.
    fn take(self) -> SpecResult<Specification<E>> {
        self.specification.ok_or_else(|| SpecError::invalid_operation(EMPTY_BUILDER))
    }
}

impl<E> Default for SpecificationBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
