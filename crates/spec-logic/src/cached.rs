// crates/spec-logic/src/cached.rs
// ============================================================================
// Module: Result Memoizer
// Description: Per-key memoization of specification results.
// Purpose: Skip evaluation entirely for entities whose key was seen before.
// Dependencies: crate::{dispatch, entity, error, expression, specification, trace}
// ============================================================================

//! ## Overview
//! [`CachedSpecification`] maps each entity to a caller-supplied key and
//! records the wrapped specification's result per key. A recorded key is
//! answered from the cache without touching the wrapped specification, even
//! when fresh evaluation would now disagree.
//!
//! Concurrent misses for the same key may both evaluate; the first insert
//! wins and every caller returns the stored value. [`CachedSpecification::clear_cache`]
//! discards all entries at once under the write lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::dispatch::CancellationToken;
use crate::dispatch::run_blocking;
use crate::entity::Entity;
use crate::error::SpecResult;
use crate::expression::Predicate;
use crate::specification::Satisfiable;
use crate::specification::Specification;
use crate::trace::EvaluationTrace;
use crate::trace::NoopTrace;
use crate::trace::TraceEvent;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Caller-supplied mapping from entity to cache key.
type KeySelector<E, K> = Arc<dyn Fn(&E) -> K + Send + Sync>;

/// Specification decorator memoizing results by key
///
/// # Invariants
/// - Once a key is recorded its value is never overwritten until
///   [`CachedSpecification::clear_cache`].
/// - Clones share the same cache.
pub struct CachedSpecification<E, K> {
    /// Wrapped specification.
    inner: Specification<E>,
    /// Entity to key mapping.
    key_selector: KeySelector<E, K>,
    /// Recorded results.
    cache: Arc<RwLock<HashMap<K, bool>>>,
}

impl<E, K> Clone for CachedSpecification<E, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            key_selector: Arc::clone(&self.key_selector),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<E, K: Eq + Hash> CachedSpecification<E, K> {
    /// Wraps `inner`, keying results by `key_selector`
    pub fn new<F>(inner: Specification<E>, key_selector: F) -> Self
    where
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self {
            inner,
            key_selector: Arc::new(key_selector),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the wrapped specification
    #[must_use]
    pub const fn inner(&self) -> &Specification<E> {
        &self.inner
    }

    /// Returns the number of recorded keys
    #[must_use]
    pub fn cache_count(&self) -> usize {
        self.read_cache().len()
    }

    /// Discards every recorded result
    pub fn clear_cache(&self) {
        self.write_cache().clear();
    }

    /// Returns the recorded result for `key`, if any
    #[must_use]
    pub fn cached_result(&self, key: &K) -> Option<bool> {
        self.read_cache().get(key).copied()
    }

    /// Acquires the cache for reading, recovering from poisoning.
    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<K, bool>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the cache for writing, recovering from poisoning.
    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<K, bool>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Entity, K: Eq + Hash> CachedSpecification<E, K> {
    /// Returns the memoized result for `entity`, evaluating on a miss
    ///
    /// # Errors
    ///
    /// Returns the wrapped specification's error on a miss; errors are not
    /// recorded.
    pub fn is_satisfied_by(&self, entity: &E) -> SpecResult<bool> {
        self.is_satisfied_by_traced(entity, &NoopTrace)
    }

    /// Returns the memoized result for `entity`, reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns the wrapped specification's error on a miss.
    pub fn is_satisfied_by_traced(
        &self,
        entity: &E,
        trace: &dyn EvaluationTrace,
    ) -> SpecResult<bool> {
        let key = (self.key_selector)(entity);
        let recorded = self.cached_result(&key);
        trace.record(TraceEvent::CacheLookup {
            label: self.inner.label(),
            hit: recorded.is_some(),
        });
        if let Some(satisfied) = recorded {
            return Ok(satisfied);
        }
        let satisfied = self.inner.is_satisfied_by_traced(entity, trace)?;
        Ok(*self.write_cache().entry(key).or_insert(satisfied))
    }
}

impl<E, K> CachedSpecification<E, K>
where
    E: Entity + 'static,
    K: Eq + Hash + Send + Sync + 'static,
{
    /// Evaluates `entity` on the blocking pool through the memoizer
    ///
    /// # Errors
    ///
    /// Returns [`crate::SpecError::OperationCancelled`] when `cancellation`
    /// fires first, or the wrapped specification's error.
    pub async fn is_satisfied_by_async(
        &self,
        entity: Arc<E>,
        cancellation: &CancellationToken,
    ) -> SpecResult<bool> {
        self.is_satisfied_by_async_traced(entity, cancellation, Arc::new(NoopTrace)).await
    }

    /// Evaluates `entity` on the blocking pool through the memoizer, reporting to `trace`
    ///
    /// # Errors
    ///
    /// Returns [`crate::SpecError::OperationCancelled`] when `cancellation`
    /// fires first, or the wrapped specification's error.
    pub async fn is_satisfied_by_async_traced(
        &self,
        entity: Arc<E>,
        cancellation: &CancellationToken,
        trace: Arc<dyn EvaluationTrace>,
    ) -> SpecResult<bool> {
        let memoizer = self.clone();
        let worker_trace = Arc::clone(&trace);
        run_blocking(self.inner.label(), cancellation, trace.as_ref(), move || {
            memoizer.is_satisfied_by_traced(&entity, worker_trace.as_ref())
        })
        .await
    }
}

impl<E: Entity, K: Eq + Hash> Satisfiable<E> for CachedSpecification<E, K> {
    fn as_expression(&self) -> &Predicate {
        self.inner.as_expression()
    }

    fn label(&self) -> &str {
        self.inner.label()
    }

    fn is_satisfied_by_traced(&self, entity: &E, trace: &dyn EvaluationTrace) -> SpecResult<bool> {
        Self::is_satisfied_by_traced(self, entity, trace)
    }
}

impl<E, K: Eq + Hash> fmt::Debug for CachedSpecification<E, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedSpecification")
            .field("inner", &self.inner)
            .field("cache_count", &self.cache_count())
            .finish_non_exhaustive()
    }
}

impl<E> Specification<E> {
    /// Wraps this specification in a result memoizer keyed by `key_selector`
    #[must_use]
    pub fn cached<K, F>(&self, key_selector: F) -> CachedSpecification<E, K>
    where
        K: Eq + Hash,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        CachedSpecification::new(self.clone(), key_selector)
    }
}
