// crates/spec-logic/src/specification.rs
// ============================================================================
// Module: Specifications
// Description: Composable specification nodes with lazy compiled evaluation.
// Purpose: Combine predicates with AND/OR/NOT and evaluate them sync or async.
// Dependencies: crate::{compiler, dispatch, entity, error, expression, trace, unify}
// ============================================================================

//! ## Overview
//! A [`Specification`] is a cheap-clone handle to an immutable node: a leaf
//! wrapping a [`Predicate`], or a conjunction, disjunction, or negation of
//! other specifications. Children are shared, never copied, so the same leaf
//! may appear in several trees.
//!
//! Each node records the depth and node count of its merged expression when
//! it is built, so structural limits are checked before anything is derived.
//! The merged [`Predicate`] is derived on first request and compiled on first
//! evaluation; both are stored in once-cells and reused for the node's
//! lifetime. Derivation walks the node structure with an explicit stack, so
//! long combinator chains never recurse. Concurrent first use may compute
//! twice, but exactly one result is stored and every caller uses the stored
//! one.
//!
//! Synchronous evaluation runs the root's compiled predicate. Asynchronous
//! evaluation walks the node structure instead so conjunctions and
//! disjunctions can short-circuit explicitly: the right operand never starts
//! once the left operand decided the result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;
use std::ops::BitAnd;
use std::ops::BitOr;
use std::ops::Not;
use std::sync::Arc;
use std::sync::OnceLock;

use crate::compiler::CompiledPredicate;
use crate::compiler::EvaluationLimits;
use crate::compiler::compile;
use crate::dispatch::CancellationToken;
use crate::dispatch::EvalFuture;
use crate::dispatch::run_blocking;
use crate::entity::Entity;
use crate::error::SpecError;
use crate::error::SpecResult;
use crate::expression::Predicate;
use crate::trace::EvaluationTrace;
use crate::trace::NoopTrace;
use crate::trace::TraceEvent;
use crate::unify::unify;
use crate::visitor::LogicalOperator;

// ============================================================================
// SECTION: Satisfiable Trait
// ============================================================================

/// Anything that can decide whether an entity satisfies it
///
/// The collection helpers stop at and return the first evaluation error.
pub trait Satisfiable<E: Entity> {
    /// Returns the predicate describing what is tested
    fn as_expression(&self) -> &Predicate;

    /// Returns the diagnostic label
    fn label(&self) -> &str;

    /// Evaluates `entity`, reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when evaluation fails.
    fn is_satisfied_by_traced(&self, entity: &E, trace: &dyn EvaluationTrace) -> SpecResult<bool>;

    /// Evaluates `entity`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when evaluation fails.
    fn is_satisfied_by(&self, entity: &E) -> SpecResult<bool> {
        self.is_satisfied_by_traced(entity, &NoopTrace)
    }

    /// Evaluates `entity` on the blocking pool, reporting to `trace`
    ///
    /// The default runs [`Satisfiable::is_satisfied_by_traced`] on a clone of
    /// `self` and races it against `cancellation`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::OperationCancelled`] when `cancellation` fires
    /// before the result is known, or any evaluation error.
    fn is_satisfied_by_async_traced<'a>(
        &'a self,
        entity: Arc<E>,
        cancellation: &'a CancellationToken,
        trace: Arc<dyn EvaluationTrace>,
    ) -> EvalFuture<'a>
    where
        Self: Clone + Send + Sync + 'static,
        E: 'static,
    {
        let evaluator = self.clone();
        Box::pin(async move {
            let worker_trace = Arc::clone(&trace);
            run_blocking(self.label(), cancellation, trace.as_ref(), move || {
                evaluator.is_satisfied_by_traced(&entity, worker_trace.as_ref())
            })
            .await
        })
    }

    /// Evaluates `entity` on the blocking pool
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::OperationCancelled`] when `cancellation` fires
    /// before the result is known, or any evaluation error.
    fn is_satisfied_by_async<'a>(
        &'a self,
        entity: Arc<E>,
        cancellation: &'a CancellationToken,
    ) -> EvalFuture<'a>
    where
        Self: Clone + Send + Sync + 'static,
        E: 'static,
    {
        self.is_satisfied_by_async_traced(entity, cancellation, Arc::new(NoopTrace))
    }

    /// Returns true when every entity satisfies this
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    fn all<'e, I>(&self, entities: I) -> SpecResult<bool>
    where
        E: 'e,
        I: IntoIterator<Item = &'e E>,
    {
        for entity in entities {
            if !self.is_satisfied_by(entity)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true when at least one entity satisfies this
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    fn any<'e, I>(&self, entities: I) -> SpecResult<bool>
    where
        E: 'e,
        I: IntoIterator<Item = &'e E>,
    {
        for entity in entities {
            if self.is_satisfied_by(entity)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns the satisfying entities in input order
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    fn filter<'e, I>(&self, entities: I) -> SpecResult<Vec<&'e E>>
    where
        E: 'e,
        I: IntoIterator<Item = &'e E>,
    {
        let mut matched = Vec::new();
        for entity in entities {
            if self.is_satisfied_by(entity)? {
                matched.push(entity);
            }
        }
        Ok(matched)
    }

    /// Returns the first satisfying entity
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    fn first<'e, I>(&self, entities: I) -> SpecResult<Option<&'e E>>
    where
        E: 'e,
        I: IntoIterator<Item = &'e E>,
    {
        for entity in entities {
            if self.is_satisfied_by(entity)? {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// SECTION: Node Types
// ============================================================================

/// Structural shape of a specification node
pub enum SpecKind<E> {
    /// Wraps a predicate directly
    Leaf(Predicate),
    /// Both operands must hold
    And(Specification<E>, Specification<E>),
    /// Either operand must hold
    Or(Specification<E>, Specification<E>),
    /// The operand must not hold
    Not(Specification<E>),
}

impl<E> SpecKind<E> {
    /// Returns the kind label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Leaf(_) => "Leaf",
            Self::And(..) => "And",
            Self::Or(..) => "Or",
            Self::Not(_) => "Not",
        }
    }

    /// Returns the child specifications, left to right.
    fn operands(&self) -> Vec<&Specification<E>> {
        match self {
            Self::Leaf(_) => Vec::new(),
            Self::And(left, right) | Self::Or(left, right) => vec![left, right],
            Self::Not(operand) => vec![operand],
        }
    }
}

impl<E> Clone for SpecKind<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Leaf(predicate) => Self::Leaf(predicate.clone()),
            Self::And(left, right) => Self::And(left.clone(), right.clone()),
            Self::Or(left, right) => Self::Or(left.clone(), right.clone()),
            Self::Not(operand) => Self::Not(operand.clone()),
        }
    }
}

/// Immutable node shared by every clone of a [`Specification`].
struct SpecNode<E> {
    /// Explicit display name.
    name: Option<Arc<str>>,
    /// Structural shape.
    kind: SpecKind<E>,
    /// Limits applied when compiling.
    limits: EvaluationLimits,
    /// Depth of the merged expression.
    depth: usize,
    /// Node count of the merged expression.
    node_count: usize,
    /// Derived predicate, computed on first request.
    predicate: OnceLock<Predicate>,
    /// Compiled form, computed on first evaluation.
    compiled: OnceLock<CompiledPredicate>,
    /// Entity type the node evaluates.
    entity: PhantomData<fn(&E) -> bool>,
}

impl<E> SpecNode<E> {
    /// Creates a node with empty caches.
    ///
    /// Unification preserves structure, so the merged expression's size
    /// follows from the children's recorded sizes.
    fn new(name: Option<Arc<str>>, kind: SpecKind<E>, limits: EvaluationLimits) -> Self {
        let (depth, node_count) = match &kind {
            SpecKind::Leaf(predicate) => (predicate.body().depth(), predicate.body().node_count()),
            SpecKind::And(left, right) | SpecKind::Or(left, right) => (
                left.depth().max(right.depth()).saturating_add(1),
                left.node_count().saturating_add(right.node_count()).saturating_add(1),
            ),
            SpecKind::Not(operand) => {
                (operand.depth().saturating_add(1), operand.node_count().saturating_add(1))
            }
        };
        Self {
            name,
            kind,
            limits,
            depth,
            node_count,
            predicate: OnceLock::new(),
            compiled: OnceLock::new(),
            entity: PhantomData,
        }
    }

    /// Builds the merged predicate from the node's children.
    ///
    /// Children must already hold their derived predicates.
    fn derive_predicate(&self) -> Predicate {
        match &self.kind {
            SpecKind::Leaf(predicate) => predicate.clone(),
            SpecKind::And(left, right) => {
                let left = left.as_expression();
                let right = unify(right.as_expression(), left.parameter());
                Predicate::from_parts(left.parameter().clone(), left.body().clone().and(right))
            }
            SpecKind::Or(left, right) => {
                let left = left.as_expression();
                let right = unify(right.as_expression(), left.parameter());
                Predicate::from_parts(left.parameter().clone(), left.body().clone().or(right))
            }
            SpecKind::Not(operand) => {
                let operand = operand.as_expression();
                Predicate::from_parts(operand.parameter().clone(), operand.body().clone().negate())
            }
        }
    }
}

// ============================================================================
// SECTION: Specification
// ============================================================================

/// Composable, lazily compiled boolean predicate over `E`
///
/// # Invariants
/// - The node is immutable; derived and compiled forms stay consistent with
///   the children for the node's lifetime.
pub struct Specification<E> {
    /// Shared immutable node.
    node: Arc<SpecNode<E>>,
}

impl<E> Clone for Specification<E> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<E> Specification<E> {
    /// Creates a leaf specification from `predicate`
    #[must_use]
    pub fn new(predicate: Predicate) -> Self {
        Self::from_kind(SpecKind::Leaf(predicate), EvaluationLimits::default())
    }

    /// Creates a named leaf specification
    #[must_use]
    pub fn named(name: &str, predicate: Predicate) -> Self {
        Self::new(predicate).with_name(name)
    }

    /// Builds a conjunction of `left` and `right`
    #[must_use]
    pub fn conjunction(left: &Self, right: &Self) -> Self {
        let limits = left.limits().tightest(right.limits());
        Self::from_kind(SpecKind::And(left.clone(), right.clone()), limits)
    }

    /// Builds a disjunction of `left` and `right`
    #[must_use]
    pub fn disjunction(left: &Self, right: &Self) -> Self {
        let limits = left.limits().tightest(right.limits());
        Self::from_kind(SpecKind::Or(left.clone(), right.clone()), limits)
    }

    /// Builds the negation of `operand`
    #[must_use]
    pub fn negation(operand: &Self) -> Self {
        Self::from_kind(SpecKind::Not(operand.clone()), operand.limits())
    }

    /// `self && other`
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self::conjunction(self, other)
    }

    /// `self || other`
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self::disjunction(self, other)
    }

    /// `!self`
    #[must_use]
    pub fn negate(&self) -> Self {
        Self::negation(self)
    }

    /// Returns a renamed node sharing this node's children
    #[must_use]
    pub fn with_name(&self, name: &str) -> Self {
        self.rebuild(Some(Arc::from(name)), self.limits())
    }

    /// Returns a node sharing this node's children under new limits
    #[must_use]
    pub fn with_limits(&self, limits: EvaluationLimits) -> Self {
        self.rebuild(self.node.name.clone(), limits)
    }

    /// Returns the structural shape
    #[must_use]
    pub fn kind(&self) -> &SpecKind<E> {
        &self.node.kind
    }

    /// Returns the explicit name, or the kind label when unnamed
    #[must_use]
    pub fn label(&self) -> &str {
        self.node.name.as_deref().unwrap_or(self.node.kind.label())
    }

    /// Returns the compile-time limits
    #[must_use]
    pub fn limits(&self) -> EvaluationLimits {
        self.node.limits
    }

    /// Returns the depth of the merged expression, known without deriving it
    #[must_use]
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    /// Returns the node count of the merged expression, known without deriving it
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node.node_count
    }

    /// Returns true once the executable form has been built
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.node.compiled.get().is_some()
    }

    /// Returns the merged predicate, deriving it on first request
    ///
    /// Repeated calls return the same predicate with the same parameter
    /// identity.
    #[must_use]
    pub fn as_expression(&self) -> &Predicate {
        if let Some(predicate) = self.node.predicate.get() {
            return predicate;
        }
        self.derive_pending();
        self.node.predicate.get_or_init(|| self.node.derive_predicate())
    }

    /// Creates a node with empty caches.
    fn from_kind(kind: SpecKind<E>, limits: EvaluationLimits) -> Self {
        Self {
            node: Arc::new(SpecNode::new(None, kind, limits)),
        }
    }

    /// Copies this node under a new name or limits.
    ///
    /// The derived predicate carries over; the compiled form is rebuilt on
    /// first evaluation of the copy.
    fn rebuild(&self, name: Option<Arc<str>>, limits: EvaluationLimits) -> Self {
        let mut node = SpecNode::new(name, self.node.kind.clone(), limits);
        if let Some(predicate) = self.node.predicate.get() {
            node.predicate = OnceLock::from(predicate.clone());
        }
        Self {
            node: Arc::new(node),
        }
    }

    /// Derives every missing predicate below this node, children first.
    fn derive_pending(&self) {
        let mut pending = vec![(self, false)];
        while let Some((specification, expanded)) = pending.pop() {
            if specification.node.predicate.get().is_some() {
                continue;
            }
            if expanded {
                specification.node.predicate.get_or_init(|| specification.node.derive_predicate());
            } else {
                pending.push((specification, true));
                let operands = specification.node.kind.operands();
                pending.extend(operands.into_iter().map(|child| (child, false)));
            }
        }
    }

    /// Fails when the merged expression exceeds this node's limits.
    fn check_limits(&self) -> SpecResult {
        self.node.limits.check_size(self.node.depth, self.node.node_count)
    }

    /// Returns the compiled form, compiling on first use.
    fn compiled(&self, trace: &dyn EvaluationTrace) -> SpecResult<&CompiledPredicate> {
        if let Some(compiled) = self.node.compiled.get() {
            return Ok(compiled);
        }
        self.check_limits()?;
        let compiled = compile(self.as_expression(), &self.node.limits)?;
        trace.record(TraceEvent::Compiled {
            label: self.label(),
            nodes: compiled.node_count(),
            depth: compiled.depth(),
        });
        Ok(self.node.compiled.get_or_init(|| compiled))
    }
}

impl<E: Entity> Specification<E> {
    /// Evaluates `entity` with the compiled predicate
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when compilation or evaluation fails.
    pub fn is_satisfied_by(&self, entity: &E) -> SpecResult<bool> {
        self.is_satisfied_by_traced(entity, &NoopTrace)
    }

    /// Evaluates `entity` with the compiled predicate, reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when compilation or evaluation fails.
    pub fn is_satisfied_by_traced(
        &self,
        entity: &E,
        trace: &dyn EvaluationTrace,
    ) -> SpecResult<bool> {
        let satisfied = self.compiled(trace)?.evaluate(entity)?;
        trace.record(TraceEvent::Evaluated {
            label: self.label(),
            satisfied,
        });
        Ok(satisfied)
    }
}

impl<E: Entity + 'static> Specification<E> {
    /// Evaluates `entity` asynchronously
    ///
    /// Leaves run on the blocking pool; combinators short-circuit. A tree
    /// exceeding its limits fails before any operand runs.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::OperationCancelled`] when `cancellation` fires
    /// before the result is known, or any evaluation error.
    pub fn is_satisfied_by_async<'a>(
        &'a self,
        entity: Arc<E>,
        cancellation: &'a CancellationToken,
    ) -> EvalFuture<'a> {
        self.is_satisfied_by_async_traced(entity, cancellation, Arc::new(NoopTrace))
    }

    /// Evaluates `entity` asynchronously, reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::OperationCancelled`] when `cancellation` fires
    /// before the result is known, [`SpecError::TooDeep`] or
    /// [`SpecError::TooLarge`] for an oversized tree, or any evaluation error.
    pub fn is_satisfied_by_async_traced<'a>(
        &'a self,
        entity: Arc<E>,
        cancellation: &'a CancellationToken,
        trace: Arc<dyn EvaluationTrace>,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            if cancellation.is_cancelled() {
                trace.record(TraceEvent::Cancelled {
                    label: self.label(),
                });
                return Err(SpecError::OperationCancelled);
            }
            self.check_limits()?;
            match &self.node.kind {
                SpecKind::Leaf(_) => {
                    let specification = self.clone();
                    let worker_trace = Arc::clone(&trace);
                    run_blocking(self.label(), cancellation, trace.as_ref(), move || {
                        specification.is_satisfied_by_traced(&entity, worker_trace.as_ref())
                    })
                    .await
                }
                SpecKind::And(left, right) => {
                    self.short_circuit(LogicalOperator::And, left, right, entity, cancellation, trace)
                        .await
                }
                SpecKind::Or(left, right) => {
                    self.short_circuit(LogicalOperator::Or, left, right, entity, cancellation, trace)
                        .await
                }
                SpecKind::Not(operand) => {
                    let satisfied =
                        operand.is_satisfied_by_async_traced(entity, cancellation, trace).await?;
                    Ok(!satisfied)
                }
            }
        })
    }

    /// Evaluates `left` then, only if undecided, `right`.
    async fn short_circuit(
        &self,
        operator: LogicalOperator,
        left: &Self,
        right: &Self,
        entity: Arc<E>,
        cancellation: &CancellationToken,
        trace: Arc<dyn EvaluationTrace>,
    ) -> SpecResult<bool> {
        let decided = match operator {
            LogicalOperator::And => false,
            LogicalOperator::Or => true,
        };
        let left_result = left
            .is_satisfied_by_async_traced(Arc::clone(&entity), cancellation, Arc::clone(&trace))
            .await?;
        if left_result == decided {
            trace.record(TraceEvent::ShortCircuited {
                label: self.label(),
                operator,
                result: decided,
            });
            return Ok(decided);
        }
        right.is_satisfied_by_async_traced(entity, cancellation, trace).await
    }
}

impl<E: Entity> Satisfiable<E> for Specification<E> {
    fn as_expression(&self) -> &Predicate {
        Self::as_expression(self)
    }

    fn label(&self) -> &str {
        Self::label(self)
    }

    fn is_satisfied_by_traced(&self, entity: &E, trace: &dyn EvaluationTrace) -> SpecResult<bool> {
        Self::is_satisfied_by_traced(self, entity, trace)
    }

    /// Walks the node structure so combinators short-circuit.
    fn is_satisfied_by_async_traced<'a>(
        &'a self,
        entity: Arc<E>,
        cancellation: &'a CancellationToken,
        trace: Arc<dyn EvaluationTrace>,
    ) -> EvalFuture<'a>
    where
        Self: Clone + Send + Sync + 'static,
        E: 'static,
    {
        Self::is_satisfied_by_async_traced(self, entity, cancellation, trace)
    }
}

// ============================================================================
// SECTION: Conversions and Operators
// ============================================================================

impl Predicate {
    /// Wraps this predicate in a leaf specification
    #[must_use]
    pub fn into_specification<E>(self) -> Specification<E> {
        Specification::new(self)
    }
}

impl<E> From<Predicate> for Specification<E> {
    fn from(predicate: Predicate) -> Self {
        Self::new(predicate)
    }
}

impl<E> BitAnd for Specification<E> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::conjunction(&self, &rhs)
    }
}

impl<E> BitOr for Specification<E> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::disjunction(&self, &rhs)
    }
}

impl<E> Not for Specification<E> {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::negation(&self)
    }
}

impl<E> fmt::Debug for Specification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("label", &self.label())
            .field("kind", &self.node.kind.label())
            .field("compiled", &self.is_compiled())
            .finish_non_exhaustive()
    }
}

impl<E> fmt::Display for Specification<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
