// crates/spec-logic/src/value.rs
// ============================================================================
// Module: Scalar Values and Comparators
// Description: The scalar domain that predicate expressions compute over.
// Purpose: Provide decimal-aware equality and deterministic ordering rules.
// Dependencies: bigdecimal, serde_json, time
// ============================================================================

//! ## Overview
//! [`Value`] is the closed scalar domain read from entities and embedded as
//! literals in expressions. [`compare`] applies a [`Comparator`] to two values
//! with the following rules:
//!
//! - Numbers compare as arbitrary-precision decimals, so `1.0 == 1`.
//! - `Null == Null`; values of different kinds are unequal, except that a
//!   text value holding an RFC 3339 calendar date compares as that date.
//! - Ordering is defined for number/number, text/text (lexicographic), and
//!   date/date. A `Null` operand makes any ordering comparison false.
//! - Any other pairing is an evaluation error rather than a silent `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use time::Date;
use time::Month;

use crate::error::SpecError;
use crate::error::SpecResult;

// ============================================================================
// SECTION: Value
// ============================================================================

/// Scalar value read from an entity field or embedded as an expression literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean value
    Bool(bool),
    /// Arbitrary-precision decimal number
    Number(BigDecimal),
    /// UTF-8 text
    Text(String),
    /// Calendar date
    Date(Date),
}

impl Value {
    /// Returns the kind label used in diagnostics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
        }
    }

    /// Returns true for [`Value::Null`]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean payload, if any
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Parses a decimal literal such as `"4000.50"`
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] when the text is not a decimal.
    pub fn decimal(text: &str) -> SpecResult<Self> {
        BigDecimal::from_str(text)
            .map(Self::Number)
            .map_err(|err| SpecError::invalid_argument(format!("invalid decimal `{text}`: {err}")))
    }

    /// Converts a scalar JSON value
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidArgument`] for arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> SpecResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(flag) => Ok(Self::Bool(*flag)),
            serde_json::Value::Number(number) => Self::decimal(&number.to_string()),
            serde_json::Value::String(text) => Ok(Self::Text(text.clone())),
            serde_json::Value::Array(_) => {
                Err(SpecError::invalid_argument("json arrays are not scalar values"))
            }
            serde_json::Value::Object(_) => {
                Err(SpecError::invalid_argument("json objects are not scalar values"))
            }
        }
    }

    /// Interprets the value as a calendar date when possible.
    fn as_date(&self) -> Option<Date> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Text(text) => parse_rfc3339_date(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "\"{value}\""),
            Self::Date(value) => write!(f, "{value}"),
        }
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Self::Number(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

/// Implements `From<integer>` for [`Value`] through `BigDecimal`.
macro_rules! value_from_integer {
    ($($int:ty),* $(,)?) => {
        $(
            impl From<$int> for Value {
                fn from(value: $int) -> Self {
                    Self::Number(BigDecimal::from(value))
                }
            }
        )*
    };
}

value_from_integer!(i32, i64, u32, u64);

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
// SECTION: Comparator
// ============================================================================

/// Binary comparison applied by a comparison expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Equality
    Equals,
    /// Inequality
    NotEquals,
    /// Strictly greater
    GreaterThan,
    /// Greater or equal
    GreaterThanOrEqual,
    /// Strictly less
    LessThan,
    /// Less or equal
    LessThanOrEqual,
    /// Substring containment on text
    Contains,
}

impl Comparator {
    /// Returns the infix symbol used when rendering expressions
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// SECTION: Comparison
// ============================================================================

/// Applies `comparator` to `left` and `right`
///
/// # Errors
///
/// Returns [`SpecError::Evaluation`] when the operands cannot be ordered or
/// when `contains` is applied to non-text operands.
pub fn compare(comparator: Comparator, left: &Value, right: &Value) -> SpecResult<bool> {
    match comparator {
        Comparator::Equals => Ok(values_equal(left, right)),
        Comparator::NotEquals => Ok(!values_equal(left, right)),
        Comparator::GreaterThan => ordered(comparator, left, right, Ordering::is_gt),
        Comparator::GreaterThanOrEqual => ordered(comparator, left, right, Ordering::is_ge),
        Comparator::LessThan => ordered(comparator, left, right, Ordering::is_lt),
        Comparator::LessThanOrEqual => ordered(comparator, left, right, Ordering::is_le),
        Comparator::Contains => compare_contains(left, right),
    }
}

/// Compares values for equality, with decimal- and date-aware handling.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Date(_), Value::Text(_)) | (Value::Text(_), Value::Date(_)) => {
            matches!((left.as_date(), right.as_date()), (Some(l), Some(r)) if l == r)
        }
        _ => left == right,
    }
}

/// Applies an ordering comparator, lifting `Null` operands to `false`.
fn ordered(
    comparator: Comparator,
    left: &Value,
    right: &Value,
    accept: fn(Ordering) -> bool,
) -> SpecResult<bool> {
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    ordering(left, right).map(accept).ok_or_else(|| {
        SpecError::evaluation(format!(
            "cannot apply `{comparator}` to {} and {}",
            left.kind(),
            right.kind()
        ))
    })
}

/// Orders two non-null values when their kinds are comparable.
fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Some(l.cmp(r)),
        (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
        (Value::Date(_), _) | (_, Value::Date(_)) => {
            let left = left.as_date()?;
            let right = right.as_date()?;
            Some(left.cmp(&right))
        }
        _ => None,
    }
}

/// Evaluates substring containment.
fn compare_contains(left: &Value, right: &Value) -> SpecResult<bool> {
    match (left, right) {
        (Value::Text(haystack), Value::Text(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        _ => Err(SpecError::evaluation(format!(
            "cannot apply `contains` to {} and {}",
            left.kind(),
            right.kind()
        ))),
    }
}

/// Parses an RFC 3339 date-only value (YYYY-MM-DD).
fn parse_rfc3339_date(value: &str) -> Option<Date> {
    let mut parts = value.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}
