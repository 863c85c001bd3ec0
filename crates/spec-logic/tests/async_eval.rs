// crates/spec-logic/tests/async_eval.rs
// ============================================================================
// Module: Asynchronous Evaluation Tests
// Description: Tests for async dispatch, short-circuiting, and cancellation.
// Purpose: Ensure right operands never start once the left decides.
// ============================================================================
//! ## Overview
//! Integration tests for `is_satisfied_by_async` on leaves and combinators,
//! including explicit short-circuiting, cooperative cancellation, structural
//! limits, and the blocking-pool evaluation shared by validation rules.

#[path = "support/fixtures.rs"]
mod fixtures;
mod support;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use fixtures::RecordingTrace;
use fixtures::account;
use fixtures::amount_over;
use fixtures::constant;
use fixtures::failing;
use fixtures::flag_chain;
use fixtures::is_active;
use spec_logic::CancellationToken;
use spec_logic::CompositeValidation;
use spec_logic::DEFAULT_MAX_DEPTH;
use spec_logic::Entity;
use spec_logic::JsonEntity;
use spec_logic::Predicate;
use spec_logic::Satisfiable;
use spec_logic::SpecError;
use spec_logic::SpecResult;
use spec_logic::Specification;
use spec_logic::ValidationSpecification;
use spec_logic::Value;
use support::TestResult;
use support::ensure;
use support::expect_err;

/// Entity that counts field reads and can stall before answering.
#[derive(Debug, Default)]
struct ProbeEntity {
    /// Number of field reads observed.
    reads: AtomicUsize,
    /// Delay applied to every read.
    delay: Duration,
}

impl Entity for ProbeEntity {
    fn field(&self, name: &str) -> Option<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        match name {
            "flag" => Some(Value::from(true)),
            _ => None,
        }
    }
}

/// `x.flag == true`
fn flag_spec<E>() -> SpecResult<Specification<E>> {
    Ok(Specification::new(Predicate::build("x", |x| x.field("flag").equals(true))?))
}

/// Evaluates any satisfiable value through its asynchronous entry point.
async fn evaluate_async<E, S>(spec: &S, entity: Arc<E>, trace: Arc<RecordingTrace>) -> SpecResult<bool>
where
    E: Entity + 'static,
    S: Satisfiable<E> + Clone + Send + Sync + 'static,
{
    let token = CancellationToken::new();
    spec.is_satisfied_by_async_traced(entity, &token, trace).await
}

// ============================================================================
// SECTION: Leaf Dispatch
// ============================================================================

#[tokio::test]
async fn test_leaf_async_matches_sync() -> TestResult {
    let spec: Specification<JsonEntity> = is_active()?.and(&amount_over(3000)?);
    let token = CancellationToken::new();
    let entity = Arc::new(account(true, 4000)?);
    ensure(spec.is_satisfied_by_async(Arc::clone(&entity), &token).await?, "Expected true")?;
    ensure(spec.is_satisfied_by(&entity)?, "Expected sync agreement")?;
    let inactive: Specification<JsonEntity> = is_active()?.negate();
    ensure(
        inactive.is_satisfied_by_async(Arc::new(account(false, 4000)?), &token).await?,
        "Expected NOT active to hold for an inactive account",
    )?;
    Ok(())
}

#[tokio::test]
async fn test_leaf_async_propagates_evaluation_error() -> TestResult {
    let spec: Specification<JsonEntity> = failing()?;
    let token = CancellationToken::new();
    let result = spec.is_satisfied_by_async(Arc::new(account(true, 1)?), &token).await;
    let err = expect_err(result, "failing leaf")?;
    ensure(matches!(err, SpecError::Evaluation(_)), "Expected Evaluation error")?;
    Ok(())
}

// ============================================================================
// SECTION: Short-Circuiting
// ============================================================================

#[tokio::test]
async fn test_and_short_circuits_on_false_left() -> TestResult {
    let spec: Specification<JsonEntity> = constant(false)?.and(&failing()?);
    let token = CancellationToken::new();
    let trace = Arc::new(RecordingTrace::default());
    let result = spec
        .is_satisfied_by_async_traced(Arc::new(account(true, 1)?), &token, trace.clone())
        .await?;
    ensure(!result, "Expected false")?;
    ensure(trace.count("\"short_circuited\"") == 1, "Expected a short-circuit event")?;
    ensure(trace.count("\"and\"") == 1, "Expected the and operator to be reported")?;
    ensure(trace.count("Failing") == 0, "Expected the right operand never to run")?;
    Ok(())
}

#[tokio::test]
async fn test_or_short_circuits_on_true_left() -> TestResult {
    let spec: Specification<JsonEntity> = constant(true)?.or(&failing()?);
    let token = CancellationToken::new();
    let result = spec.is_satisfied_by_async(Arc::new(account(true, 1)?), &token).await?;
    ensure(result, "Expected true")?;
    Ok(())
}

#[tokio::test]
async fn test_undecided_left_evaluates_right() -> TestResult {
    let spec: Specification<JsonEntity> = constant(true)?.and(&failing()?);
    let token = CancellationToken::new();
    let result = spec.is_satisfied_by_async(Arc::new(account(true, 1)?), &token).await;
    ensure(result.is_err(), "Expected the right operand to run and fail")?;
    let either: Specification<JsonEntity> = constant(false)?.or(&constant(true)?);
    ensure(either.is_satisfied_by_async(Arc::new(account(true, 1)?), &token).await?, "Expected true")?;
    Ok(())
}

#[tokio::test]
async fn test_right_operand_reads_nothing_after_short_circuit() -> TestResult {
    let spec: Specification<ProbeEntity> = constant(false)?.and(&flag_spec()?);
    let entity = Arc::new(ProbeEntity::default());
    let token = CancellationToken::new();
    ensure(!spec.is_satisfied_by_async(Arc::clone(&entity), &token).await?, "Expected false")?;
    ensure(entity.reads.load(Ordering::SeqCst) == 0, "Expected no field reads")?;
    Ok(())
}

#[tokio::test]
async fn test_deep_chain_fails_before_any_operand_runs() -> TestResult {
    let spec: Specification<ProbeEntity> = flag_chain(2000)?;
    let entity = Arc::new(ProbeEntity::default());
    let token = CancellationToken::new();
    let err = expect_err(spec.is_satisfied_by_async(Arc::clone(&entity), &token).await, "deep chain")?;
    ensure(
        err == SpecError::TooDeep {
            max_depth: DEFAULT_MAX_DEPTH,
            actual_depth: 2002,
        },
        format!("Unexpected error: {err}"),
    )?;
    ensure(entity.reads.load(Ordering::SeqCst) == 0, "Expected no field reads")?;
    Ok(())
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start() -> TestResult {
    let spec: Specification<ProbeEntity> = flag_spec()?;
    let entity = Arc::new(ProbeEntity::default());
    let token = CancellationToken::new();
    token.cancel();
    let err = expect_err(spec.is_satisfied_by_async(Arc::clone(&entity), &token).await, "cancelled")?;
    ensure(err.is_cancelled(), "Expected OperationCancelled")?;
    ensure(entity.reads.load(Ordering::SeqCst) == 0, "Expected no work to start")?;
    Ok(())
}

#[tokio::test]
async fn test_cancelled_while_running() -> TestResult {
    let spec: Specification<ProbeEntity> = flag_spec()?;
    let entity = Arc::new(ProbeEntity {
        reads: AtomicUsize::new(0),
        delay: Duration::from_millis(500),
    });
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = expect_err(spec.is_satisfied_by_async(entity, &token).await, "in-flight cancel")?;
    ensure(err == SpecError::OperationCancelled, "Expected OperationCancelled")?;
    Ok(())
}

#[tokio::test]
async fn test_cancellation_stops_before_right_operand() -> TestResult {
    let spec: Specification<ProbeEntity> = flag_spec()?.and(&flag_spec()?);
    let entity = Arc::new(ProbeEntity {
        reads: AtomicUsize::new(0),
        delay: Duration::from_millis(100),
    });
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let trace = Arc::new(RecordingTrace::default());
    let result = spec.is_satisfied_by_async_traced(Arc::clone(&entity), &token, trace.clone()).await;
    ensure(result == Err(SpecError::OperationCancelled), "Expected OperationCancelled")?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    ensure(entity.reads.load(Ordering::SeqCst) == 1, "Expected only the left operand to read")?;
    ensure(trace.count("\"cancelled\"") == 1, "Expected one cancellation event")?;
    Ok(())
}

#[tokio::test]
async fn test_token_clones_share_signal() -> TestResult {
    let token = CancellationToken::new();
    let clone = token.clone();
    ensure(!clone.is_cancelled(), "Expected fresh token")?;
    token.cancel();
    token.cancel();
    ensure(clone.is_cancelled(), "Expected clone to observe cancel")?;
    ensure(clone.check() == Err(SpecError::OperationCancelled), "Expected check to fail")?;
    tokio::time::timeout(Duration::from_secs(1), clone.cancelled()).await?;
    Ok(())
}

// ============================================================================
// SECTION: Validation Rules
// ============================================================================

#[tokio::test]
async fn test_composite_async_requires_every_rule() -> TestResult {
    let composite: CompositeValidation<JsonEntity> = CompositeValidation::new()
        .with_message(is_active()?, "Account must be active")?
        .with_rule(amount_over::<JsonEntity>(3000)?);
    let token = CancellationToken::new();
    ensure(
        composite.is_satisfied_by_async(Arc::new(account(true, 4000)?), &token).await?,
        "Expected every rule to hold",
    )?;
    ensure(
        !composite.is_satisfied_by_async(Arc::new(account(true, 2000)?), &token).await?,
        "Expected the amount rule to fail",
    )?;
    let rule: ValidationSpecification<JsonEntity> =
        ValidationSpecification::new(is_active()?, "Account must be active")?;
    ensure(
        !rule.is_satisfied_by_async(Arc::new(account(false, 4000)?), &token).await?,
        "Expected the inactive account to fail the rule",
    )?;
    Ok(())
}

#[tokio::test]
async fn test_validation_async_observes_cancellation() -> TestResult {
    let rule: ValidationSpecification<ProbeEntity> =
        ValidationSpecification::new(flag_spec()?, "Flag must be set")?;
    let entity = Arc::new(ProbeEntity {
        reads: AtomicUsize::new(0),
        delay: Duration::from_millis(500),
    });
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = expect_err(rule.is_satisfied_by_async(entity, &token).await, "in-flight cancel")?;
    ensure(err.is_cancelled(), "Expected OperationCancelled")?;
    let composite: CompositeValidation<ProbeEntity> = CompositeValidation::new().with_rule(rule);
    let idle = Arc::new(ProbeEntity::default());
    let err = expect_err(
        composite.is_satisfied_by_async(Arc::clone(&idle), &token).await,
        "cancelled composite",
    )?;
    ensure(err.is_cancelled(), "Expected OperationCancelled")?;
    ensure(idle.reads.load(Ordering::SeqCst) == 0, "Expected no work to start")?;
    Ok(())
}

#[tokio::test]
async fn test_generic_async_keeps_combinator_short_circuit() -> TestResult {
    let spec: Specification<JsonEntity> = constant(false)?.and(&failing()?);
    let trace = Arc::new(RecordingTrace::default());
    let result = evaluate_async(&spec, Arc::new(account(true, 1)?), trace.clone()).await?;
    ensure(!result, "Expected false")?;
    ensure(trace.count("\"short_circuited\"") == 1, "Expected the combinator walk")?;
    let composite: CompositeValidation<JsonEntity> =
        CompositeValidation::new().with_rule(constant::<JsonEntity>(true)?);
    let trace = Arc::new(RecordingTrace::default());
    ensure(
        evaluate_async(&composite, Arc::new(account(true, 1)?), trace.clone()).await?,
        "Expected the composite to hold",
    )?;
    ensure(trace.count("\"short_circuited\"") == 0, "Expected a single blocking evaluation")?;
    Ok(())
}
