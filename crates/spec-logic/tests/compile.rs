// crates/spec-logic/tests/compile.rs
// ============================================================================
// Module: Compiler Tests
// Description: Tests for lazy compilation, limits, and evaluation errors.
// Purpose: Ensure compile-once discipline and fail-closed structural limits.
// ============================================================================
//! ## Overview
//! Integration tests for `compile`, `EvaluationLimits`, and the lazy compiled
//! form held by each specification.

#[path = "support/fixtures.rs"]
mod fixtures;
mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use fixtures::RecordingTrace;
use fixtures::account;
use fixtures::amount_over;
use fixtures::flag;
use fixtures::flag_chain;
use fixtures::is_active;
use fixtures::map_entity;
use spec_logic::DEFAULT_MAX_DEPTH;
use spec_logic::EvaluationLimits;
use spec_logic::Expression;
use spec_logic::JsonEntity;
use spec_logic::Predicate;
use spec_logic::SpecError;
use spec_logic::Specification;
use spec_logic::Value;
use spec_logic::compile;
use support::TestResult;
use support::ensure;
use support::expect_err;

/// Entity for flag chains.
type Row = BTreeMap<String, Value>;

/// Builds `x.v > 0 && x.v > 1 && ...` with `terms` comparisons.
fn chain(terms: i64) -> TestResult<Predicate> {
    Ok(Predicate::build("x", |x| {
        let mut body = x.field("v").greater_than(0);
        for index in 1..terms {
            body = body.and(x.field("v").greater_than(index));
        }
        body
    })?)
}

// ============================================================================
// SECTION: Lazy Compilation
// ============================================================================

#[test]
fn test_compiles_on_first_evaluation_only() -> TestResult {
    let spec: Specification<JsonEntity> = is_active()?.and(&amount_over(10)?);
    ensure(!spec.is_compiled(), "Expected no compilation before evaluation")?;
    let _ = spec.as_expression();
    ensure(!spec.is_compiled(), "Expected expression access not to compile")?;
    let trace = RecordingTrace::default();
    spec.is_satisfied_by_traced(&account(true, 20)?, &trace)?;
    spec.is_satisfied_by_traced(&account(false, 20)?, &trace)?;
    ensure(spec.is_compiled(), "Expected compiled form after evaluation")?;
    ensure(trace.count("\"compiled\"") == 1, "Expected exactly one compilation")?;
    ensure(trace.count("\"evaluated\"") == 2, "Expected two evaluations")?;
    Ok(())
}

#[test]
fn test_compiled_form_honors_each_entity() -> TestResult {
    let spec: Specification<JsonEntity> = amount_over(100)?;
    ensure(spec.is_satisfied_by(&account(true, 101)?)?, "Expected 101 > 100")?;
    ensure(!spec.is_satisfied_by(&account(true, 99)?)?, "Expected 99 <= 100")?;
    Ok(())
}

#[test]
fn test_concurrent_first_use_agrees() -> TestResult {
    let spec: Specification<JsonEntity> = amount_over(100)?;
    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8_i64)
            .map(|index| {
                let spec = spec.clone();
                scope.spawn(move || {
                    account(true, index * 50).and_then(|entity| spec.is_satisfied_by(&entity))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().map_err(|_| SpecError::evaluation("worker thread panicked"))?
            })
            .collect::<Result<Vec<bool>, SpecError>>()
    })?;
    let expected: Vec<bool> = (0..8_i64).map(|index| index * 50 > 100).collect();
    ensure(results == expected, "Expected every thread to honor its own entity")?;
    ensure(spec.is_compiled(), "Expected the shared node to be compiled")?;
    Ok(())
}

// ============================================================================
// SECTION: Limits
// ============================================================================

#[test]
fn test_depth_limit_fails_closed() -> TestResult {
    let predicate = chain(10)?;
    let limits = EvaluationLimits {
        max_depth: 4,
        max_nodes: 1000,
    };
    let err = expect_err(compile(&predicate, &limits), "deep chain")?;
    ensure(
        matches!(err, SpecError::TooDeep { max_depth: 4, actual_depth } if actual_depth > 4),
        format!("Unexpected error: {err}"),
    )?;
    Ok(())
}

#[test]
fn test_node_limit_fails_closed() -> TestResult {
    let predicate = chain(10)?;
    let limits = EvaluationLimits {
        max_depth: 1000,
        max_nodes: 5,
    };
    let err = expect_err(compile(&predicate, &limits), "large chain")?;
    ensure(
        matches!(err, SpecError::TooLarge { max_nodes: 5, actual_nodes: 39 }),
        format!("Unexpected error: {err}"),
    )?;
    Ok(())
}

#[test]
fn test_specification_limits_apply_at_evaluation() -> TestResult {
    let tight = EvaluationLimits {
        max_depth: 1,
        max_nodes: 100,
    };
    let spec: Specification<JsonEntity> = amount_over(1)?.with_limits(tight);
    let err = expect_err(spec.is_satisfied_by(&account(true, 5)?), "limited leaf")?;
    ensure(matches!(err, SpecError::TooDeep { .. }), "Expected TooDeep")?;
    ensure(!spec.is_compiled(), "Expected failed compilation not to be stored")?;
    Ok(())
}

#[test]
fn test_combinator_limits_are_tightest() -> TestResult {
    let left: Specification<JsonEntity> = is_active()?.with_limits(EvaluationLimits {
        max_depth: 10,
        max_nodes: 500,
    });
    let right = amount_over(1)?.with_limits(EvaluationLimits {
        max_depth: 50,
        max_nodes: 20,
    });
    let combined = left.and(&right);
    ensure(
        combined.limits()
            == EvaluationLimits {
                max_depth: 10,
                max_nodes: 20,
            },
        "Expected field-wise minimum",
    )?;
    ensure(EvaluationLimits::default().max_depth == 256, "Expected default depth")?;
    ensure(EvaluationLimits::default().max_nodes == 4096, "Expected default nodes")?;
    Ok(())
}

// ============================================================================
// SECTION: Combinator Chains
// ============================================================================

#[test]
fn test_chain_beyond_default_depth_fails_closed() -> TestResult {
    let spec: Specification<Row> = flag_chain(2000)?;
    ensure(spec.depth() == 2002, format!("Unexpected depth: {}", spec.depth()))?;
    ensure(spec.node_count() == 8003, format!("Unexpected nodes: {}", spec.node_count()))?;
    let entity = map_entity(&[("flag", Value::from(true))]);
    let err = expect_err(spec.is_satisfied_by(&entity), "deep chain")?;
    ensure(
        err == SpecError::TooDeep {
            max_depth: DEFAULT_MAX_DEPTH,
            actual_depth: 2002,
        },
        format!("Unexpected error: {err}"),
    )?;
    ensure(!spec.is_compiled(), "Expected nothing to be compiled")?;
    Ok(())
}

#[test]
fn test_chain_node_limit_checked_before_compiling() -> TestResult {
    let spec: Specification<Row> = flag_chain(10)?.with_limits(EvaluationLimits {
        max_depth: 100,
        max_nodes: 20,
    });
    let entity = map_entity(&[("flag", Value::from(true))]);
    let err = expect_err(spec.is_satisfied_by(&entity), "wide chain")?;
    ensure(
        err == SpecError::TooLarge {
            max_nodes: 20,
            actual_nodes: 43,
        },
        format!("Unexpected error: {err}"),
    )?;
    Ok(())
}

#[test]
fn test_long_chain_derives_without_recursion() -> TestResult {
    let spec: Specification<Row> = flag_chain(2000)?.with_limits(EvaluationLimits {
        max_depth: 4096,
        max_nodes: 10_000,
    });
    let body = spec.as_expression().body();
    ensure(body.depth() == spec.depth(), "Expected recorded depth to match the tree")?;
    ensure(body.node_count() == spec.node_count(), "Expected recorded nodes to match the tree")?;
    Ok(())
}

#[test]
fn test_recorded_size_matches_merged_expression() -> TestResult {
    let spec: Specification<Row> = flag("a")?.and(&flag("b")?).or(&flag("c")?.negate());
    let body = spec.as_expression().body();
    ensure(spec.depth() == body.depth(), "Expected matching depth")?;
    ensure(spec.node_count() == body.node_count(), "Expected matching node count")?;
    let renamed = spec.with_name("Renamed");
    ensure(renamed.depth() == spec.depth(), "Expected renaming to keep the depth")?;
    Ok(())
}

#[test]
fn test_combined_tree_shares_left_subtree() -> TestResult {
    let child: Specification<Row> = flag("a")?.and(&flag("b")?);
    let parent = child.and(&flag("c")?);
    let Expression::And(child_left, _) = child.as_expression().body() else {
        return Err("expected a conjunction body".into());
    };
    let Expression::And(parent_left, _) = parent.as_expression().body() else {
        return Err("expected a conjunction body".into());
    };
    let Expression::And(shared_left, _) = parent_left.as_ref() else {
        return Err("expected the child conjunction on the left".into());
    };
    ensure(Arc::ptr_eq(shared_left, child_left), "Expected the left subtree to be shared")?;
    Ok(())
}

// ============================================================================
// SECTION: Folding and Errors
// ============================================================================

#[test]
fn test_literal_comparisons_fold() -> TestResult {
    let predicate = Predicate::build("x", |x| {
        Expression::literal(2).greater_than(1).or(x.field("missing").equals(true))
    })?;
    let compiled = compile(&predicate, &EvaluationLimits::default())?;
    let empty = map_entity(&[]);
    ensure(compiled.evaluate(&empty)?, "Expected folded true to skip the missing field")?;
    ensure(compiled.node_count() == 7, "Expected source node count to be reported")?;
    Ok(())
}

#[test]
fn test_missing_field_is_evaluation_error() -> TestResult {
    let spec: Specification<JsonEntity> = is_active()?;
    let entity = JsonEntity::from_serialize(&serde_json::json!({"amount": 1}))?;
    let err = expect_err(spec.is_satisfied_by(&entity), "missing field")?;
    ensure(
        err == SpecError::Evaluation("entity has no field `is_active`".to_string()),
        format!("Unexpected error: {err}"),
    )?;
    Ok(())
}

#[test]
fn test_non_boolean_field_condition_fails() -> TestResult {
    let spec: Specification<_> = Specification::new(Predicate::build("x", |x| x.field("amount"))?);
    let entity = map_entity(&[("amount", Value::from(5))]);
    let err = expect_err(spec.is_satisfied_by(&entity), "numeric condition")?;
    ensure(matches!(err, SpecError::Evaluation(_)), "Expected Evaluation error")?;
    let flagged = map_entity(&[("amount", Value::from(true))]);
    ensure(spec.is_satisfied_by(&flagged)?, "Expected boolean field to be used directly")?;
    Ok(())
}
