// crates/spec-logic/src/trace.rs
// ============================================================================
// Module: Evaluation Trace
// Description: Observability hooks for compilation and evaluation.
// Purpose: Let callers observe evaluator decisions without a global logger.
// Dependencies: crate::visitor, serde, serde_json
// ============================================================================

//! ## Overview
//! Evaluators report what they do through an [`EvaluationTrace`] sink passed
//! by the caller. Untraced entry points use [`NoopTrace`]. [`JsonLinesTrace`]
//! writes one JSON object per event to any writer; write failures are counted
//! and never abort an evaluation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

use crate::visitor::LogicalOperator;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event emitted by an evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent<'a> {
    /// A specification compiled its executable form
    Compiled {
        /// Specification label
        label: &'a str,
        /// Node count of the compiled tree
        nodes: usize,
        /// Depth of the compiled tree
        depth: usize,
    },
    /// A specification finished a synchronous evaluation
    Evaluated {
        /// Specification label
        label: &'a str,
        /// Evaluation result
        satisfied: bool,
    },
    /// An asynchronous combinator skipped its right operand
    ShortCircuited {
        /// Specification label
        label: &'a str,
        /// Combinator that short-circuited
        operator: LogicalOperator,
        /// Result decided by the left operand
        result: bool,
    },
    /// A memoizer looked up a key
    CacheLookup {
        /// Specification label
        label: &'a str,
        /// Whether a recorded result was found
        hit: bool,
    },
    /// An asynchronous evaluation observed cancellation
    Cancelled {
        /// Specification label
        label: &'a str,
    },
}

// ============================================================================
// SECTION: Trace Sink
// ============================================================================

/// Sink for evaluation events
pub trait EvaluationTrace: Send + Sync {
    /// Records one event
    fn record(&self, event: TraceEvent<'_>);
}

/// Trace sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrace;

impl EvaluationTrace for NoopTrace {
    fn record(&self, _event: TraceEvent<'_>) {}
}

// ============================================================================
// SECTION: JSON Lines Sink
// ============================================================================

/// Wire form of one JSON line.
#[derive(Serialize)]
struct TraceLine<'a> {
    /// Sequence number assigned by the sink.
    seq: u64,
    /// Flattened event payload.
    #[serde(flatten)]
    event: TraceEvent<'a>,
}

/// Trace sink writing newline-delimited JSON
///
/// # Invariants
/// - `seq` increases by one per recorded event, including dropped ones.
#[derive(Debug)]
pub struct JsonLinesTrace<W> {
    /// Output writer.
    writer: Mutex<W>,
    /// Next sequence number.
    next_seq: AtomicU64,
    /// Count of events lost to write failures.
    dropped: AtomicU64,
}

impl<W: Write + Send> JsonLinesTrace<W> {
    /// Creates a sink over `writer`
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            next_seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns the number of events lost to write failures
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Consumes the sink and returns the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serializes and writes one line.
    fn write_line(&self, line: &TraceLine<'_>) -> std::io::Result<()> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&bytes)?;
        writer.flush()
    }
}

impl<W: Write + Send> EvaluationTrace for JsonLinesTrace<W> {
    fn record(&self, event: TraceEvent<'_>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if self
            .write_line(&TraceLine {
                seq,
                event,
            })
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
