// crates/spec-logic/src/dispatch.rs
// ============================================================================
// Module: Asynchronous Dispatch
// Description: Cooperative cancellation and worker-pool evaluation.
// Purpose: Run synchronous evaluations elsewhere while observing cancellation.
// Dependencies: tokio, crate::{error, trace}
// ============================================================================

//! ## Overview
//! Asynchronous evaluation runs the synchronous evaluator on tokio's blocking
//! pool and races it against a [`CancellationToken`]. Cancellation is
//! cooperative: a signalled token prevents work from starting and turns an
//! in-flight evaluation into [`SpecError::OperationCancelled`]. A worker that
//! already started keeps running detached; its result is discarded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::Notify;

use crate::error::SpecError;
use crate::error::SpecResult;
use crate::trace::EvaluationTrace;
use crate::trace::TraceEvent;

// ============================================================================
// SECTION: Future Alias
// ============================================================================

/// Boxed future returned by asynchronous evaluators
pub type EvalFuture<'a> = Pin<Box<dyn Future<Output = SpecResult<bool>> + Send + 'a>>;

// ============================================================================
// SECTION: Cancellation Token
// ============================================================================

/// Shared state behind a cancellation token.
#[derive(Debug, Default)]
struct CancellationState {
    /// Set once cancellation is requested.
    cancelled: AtomicBool,
    /// Wakes tasks waiting in [`CancellationToken::cancelled`].
    notify: Notify,
}

/// Clonable cancellation signal
///
/// All clones observe the same signal. Cancellation is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    /// Shared signal state.
    state: Arc<CancellationState>,
}

impl CancellationToken {
    /// Creates an untriggered token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes every waiter
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    /// Returns true once cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`SpecError::OperationCancelled`] once cancellation was requested
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::OperationCancelled`] when the token is signalled.
    pub fn check(&self) -> SpecResult {
        if self.is_cancelled() { Err(SpecError::OperationCancelled) } else { Ok(()) }
    }

    /// Completes when cancellation is requested
    pub async fn cancelled(&self) {
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

// ============================================================================
// SECTION: Blocking Dispatch
// ============================================================================

/// Runs `work` on the blocking pool unless `cancellation` fires first.
pub(crate) async fn run_blocking<F>(
    label: &str,
    cancellation: &CancellationToken,
    trace: &dyn EvaluationTrace,
    work: F,
) -> SpecResult<bool>
where
    F: FnOnce() -> SpecResult<bool> + Send + 'static,
{
    if cancellation.is_cancelled() {
        trace.record(TraceEvent::Cancelled {
            label,
        });
        return Err(SpecError::OperationCancelled);
    }
    let worker = tokio::task::spawn_blocking(work);
    tokio::select! {
        biased;
        () = cancellation.cancelled() => {
            trace.record(TraceEvent::Cancelled { label });
            Err(SpecError::OperationCancelled)
        }
        joined = worker => match joined {
            Ok(result) => result,
            Err(err) => Err(SpecError::evaluation(format!("evaluation worker failed: {err}"))),
        },
    }
}
