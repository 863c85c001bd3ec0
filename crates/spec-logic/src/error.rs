// crates/spec-logic/src/error.rs
// ============================================================================
// Module: Specification Error Definitions
// Description: Structured failures for specification construction and evaluation.
// Purpose: Provide one error taxonomy shared by every evaluator and builder.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Centralizes the errors raised while building, compiling, and evaluating
//! specifications. Every error is a local precondition or evaluation failure
//! surfaced immediately to the caller; none are retried or swallowed, and no
//! fallback boolean is ever substituted for a failed evaluation.

use thiserror::Error;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Errors that can occur while building or evaluating specifications
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    // ============================================================================
    // SECTION: Precondition Errors
    // ============================================================================
    /// A constructor, combinator, or evaluator received an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was invoked in a state that does not support it
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Asynchronous evaluation observed its cancellation signal
    #[error("operation cancelled")]
    OperationCancelled,

    // ============================================================================
    // SECTION: Evaluation Errors
    // ============================================================================
    /// The expression could not be evaluated against the supplied entity
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    // ============================================================================
    // SECTION: Structural Limits
    // ============================================================================
    /// Expression tree exceeds the configured depth
    #[error("expression tree too deep: {actual_depth} levels (max {max_depth})")]
    TooDeep {
        /// Maximum allowed depth
        max_depth: usize,
        /// Depth of the rejected tree
        actual_depth: usize,
    },

    /// Expression tree exceeds the configured node count
    #[error("expression tree too large: {actual_nodes} nodes (max {max_nodes})")]
    TooLarge {
        /// Maximum allowed node count
        max_nodes: usize,
        /// Node count of the rejected tree
        actual_nodes: usize,
    },
}

// ============================================================================
// SECTION: Convenience Helpers
// ============================================================================

impl SpecError {
    /// Creates an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Creates an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    /// Returns true when the error reports cancellation rather than a failure
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::OperationCancelled)
    }
}

// ============================================================================
// SECTION: Result Alias
// ============================================================================

/// Convenient Result type for specification operations
pub type SpecResult<T = ()> = Result<T, SpecError>;
