// crates/spec-logic/src/entity.rs
// ============================================================================
// Module: Entity Access
// Description: Field lookup contract for the values specifications test.
// Purpose: Decouple expression evaluation from concrete domain types.
// Dependencies: crate::value, serde, serde_json
// ============================================================================

//! ## Overview
//! Expressions read entity fields by name. Any type implementing [`Entity`]
//! can be evaluated; maps of [`Value`] implement it directly, and
//! [`JsonEntity`] adapts any `Serialize` data holder so plain domain structs
//! need no hand-written accessors.
//!
//! Security posture: entities are caller data; a missing field is reported as
//! an evaluation error by the compiled predicate, never defaulted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::BuildHasher;

use serde::Serialize;

use crate::error::SpecError;
use crate::error::SpecResult;
use crate::value::Value;

// ============================================================================
// SECTION: Entity Trait
// ============================================================================

/// Read-only field access used by compiled predicates
///
/// Implementations must be deterministic for the lifetime of an evaluation:
/// the same name yields the same value.
pub trait Entity: Send + Sync {
    /// Returns the value of `name`, or `None` when the field does not exist
    fn field(&self, name: &str) -> Option<Value>;
}

impl Entity for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<S: BuildHasher + Send + Sync> Entity for HashMap<String, Value, S> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

// ============================================================================
// SECTION: JSON Entity
// ============================================================================

/// Entity backed by the scalar fields of a JSON object
///
/// # Invariants
/// - Every stored field is a scalar [`Value`]; nested arrays and objects are
///   rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonEntity {
    /// Scalar fields keyed by name.
    fields: BTreeMap<String, Value>,
}

impl JsonEntity {
    /// Builds an entity from a JSON object
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] when the root is not an object
    /// or a field holds an array or object.
    pub fn new(json: serde_json::Value) -> SpecResult<Self> {
        let serde_json::Value::Object(object) = json else {
            return Err(SpecError::invalid_argument("json entity root must be an object"));
        };
        let mut fields = BTreeMap::new();
        for (name, value) in object {
            let value = Value::from_json(&value).map_err(|err| {
                SpecError::invalid_argument(format!("field `{name}` is not scalar: {err}"))
            })?;
            fields.insert(name, value);
        }
        Ok(Self {
            fields,
        })
    }

    /// Serializes `data` and builds an entity from the result
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] when serialization fails or the
    /// serialized form is not a flat object.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> SpecResult<Self> {
        let json = serde_json::to_value(data)
            .map_err(|err| SpecError::invalid_argument(format!("entity serialization: {err}")))?;
        Self::new(json)
    }

    /// Returns the number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the entity has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Entity for JsonEntity {
    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}
