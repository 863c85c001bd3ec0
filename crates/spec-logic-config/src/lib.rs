// crates/spec-logic-config/src/lib.rs
// ============================================================================
// Module: Spec Logic Config Library
// Description: Configuration model and loading for specification evaluation.
// Purpose: Single source of truth for spec-logic.toml semantics.
// Dependencies: spec-logic, serde, toml
// ============================================================================

//! ## Overview
//! `spec-logic-config` defines the TOML configuration consumed by services
//! that evaluate specifications: structural evaluation limits and the trace
//! sink. Loading is strict and fail-closed; config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
