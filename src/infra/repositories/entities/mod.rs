//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.
//! Document-style collections (skills, portfolio, milestones, agreement,
//! feedback) live in JSONB columns and are decoded on conversion.

pub mod message;
pub mod service;
pub mod user;

/// Encode a domain value for a JSONB column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
