// crates/spec-logic/tests/support/fixtures.rs
// ============================================================================
// Module: Test Fixtures
// Description: Sample domain types and specifications shared by tests.
// ============================================================================
//! ## Overview
//! Plain data holders (`Account`, `TestEntity`) adapted into entities through
//! `JsonEntity`, plus canned specifications over them.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(dead_code, reason = "Each test binary uses a different subset of the fixtures.")]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;
use spec_logic::EvaluationTrace;
use spec_logic::Expression;
use spec_logic::JsonEntity;
use spec_logic::Predicate;
use spec_logic::SpecResult;
use spec_logic::Specification;
use spec_logic::TraceEvent;
use spec_logic::Value;

// ========================================================================
// Domain Types
// ========================================================================

/// Account record used by end-to-end scenarios.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    /// Whether the account is active.
    pub is_active: bool,
    /// Balance in whole currency units.
    pub amount: i64,
}

/// Generic record used by validation scenarios.
#[derive(Debug, Clone, Serialize)]
pub struct TestEntity {
    /// Numeric value under test.
    pub value: i64,
    /// Optional display name.
    pub name: Option<String>,
}

/// Builds an account entity.
pub fn account(is_active: bool, amount: i64) -> SpecResult<JsonEntity> {
    JsonEntity::from_serialize(&Account {
        is_active,
        amount,
    })
}

/// Builds a test entity.
pub fn test_entity(value: i64, name: Option<&str>) -> SpecResult<JsonEntity> {
    JsonEntity::from_serialize(&TestEntity {
        value,
        name: name.map(str::to_string),
    })
}

/// Builds a map entity from name/value pairs.
pub fn map_entity(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs.iter().map(|(name, value)| ((*name).to_string(), value.clone())).collect()
}

// ========================================================================
// Canned Specifications
// ========================================================================

/// `a.is_active == true`
pub fn is_active<E>() -> SpecResult<Specification<E>> {
    Ok(Specification::named(
        "IsActive",
        Predicate::build("a", |a| a.field("is_active").equals(true))?,
    ))
}

/// `a.amount > threshold`
pub fn amount_over<E>(threshold: i64) -> SpecResult<Specification<E>> {
    Ok(Specification::named(
        "AmountOver",
        Predicate::build("a", |a| a.field("amount").greater_than(threshold))?,
    ))
}

/// Boolean field check over `field`.
pub fn flag<E>(field: &str) -> SpecResult<Specification<E>> {
    Ok(Specification::new(Predicate::build("x", |x| x.field(field).equals(true))?))
}

/// Constant specification.
pub fn constant<E>(value: bool) -> SpecResult<Specification<E>> {
    Ok(Specification::new(Predicate::build("x", |_| Expression::literal(value))?))
}

/// Specification whose evaluation always fails with a missing field.
pub fn failing<E>() -> SpecResult<Specification<E>> {
    Ok(Specification::named(
        "Failing",
        Predicate::build("x", |x| x.field("no_such_field").equals(true))?,
    ))
}

/// Left-deep conjunction `flag && flag && ...` with `links` combinators.
///
/// Every link reuses one leaf, so the chain is `links + 2` levels deep.
pub fn flag_chain<E>(links: usize) -> SpecResult<Specification<E>> {
    let leaf = flag("flag")?;
    let mut chain = leaf.clone();
    for _ in 0..links {
        chain = chain.and(&leaf);
    }
    Ok(chain)
}

// ========================================================================
// Recording Trace
// ========================================================================

/// Trace sink that keeps a rendered copy of every event.
#[derive(Debug, Default)]
pub struct RecordingTrace {
    /// Events serialized as JSON strings.
    events: Mutex<Vec<String>>,
}

impl RecordingTrace {
    /// Returns the recorded events.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the number of recorded events whose JSON contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.events().iter().filter(|event| event.contains(needle)).count()
    }
}

impl EvaluationTrace for RecordingTrace {
    fn record(&self, event: TraceEvent<'_>) {
        let rendered = serde_json::to_string(&event).unwrap_or_default();
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(rendered);
    }
}
