//! Attribute helpers for the single-table layout.
//!
//! Every application row carries `PK`, `SK`, `entity_type` (the logical
//! table name) and `id`. Timestamps are RFC 3339 strings.

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use condo_core::Table;
use std::collections::HashMap;

use crate::error::ApiError;

pub type Item = HashMap<String, AttributeValue>;

pub fn key(table: Table, id: &str) -> String {
    format!("{}{}", table.key_prefix(), id)
}

/// Base item for a row whose partition and sort keys are equal.
pub fn new_item(table: Table, id: &str) -> Item {
    let pk = key(table, id);
    let mut item = Item::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity_type".to_string(), AttributeValue::S(table.as_str().to_string()));
    item.insert("id".to_string(), AttributeValue::S(id.to_string()));
    item
}

pub fn put_s(item: &mut Item, name: &str, value: impl Into<String>) {
    item.insert(name.to_string(), AttributeValue::S(value.into()));
}

/// Absent optionals are not stored at all.
pub fn put_opt_s(item: &mut Item, name: &str, value: Option<&str>) {
    if let Some(v) = value {
        put_s(item, name, v);
    }
}

pub fn put_time(item: &mut Item, name: &str, value: DateTime<Utc>) {
    put_s(item, name, value.to_rfc3339());
}

pub fn put_bool(item: &mut Item, name: &str, value: bool) {
    item.insert(name.to_string(), AttributeValue::Bool(value));
}

pub fn s(item: &Item, name: &'static str) -> Result<String, ApiError> {
    opt_s(item, name).ok_or_else(|| corrupt(name))
}

pub fn opt_s(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

pub fn s_or_default(item: &Item, name: &str) -> String {
    opt_s(item, name).unwrap_or_default()
}

pub fn bool_or(item: &Item, name: &str, default: bool) -> bool {
    item.get(name)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(default)
}

pub fn time(item: &Item, name: &'static str) -> Result<DateTime<Utc>, ApiError> {
    opt_time(item, name).ok_or_else(|| corrupt(name))
}

pub fn opt_time(item: &Item, name: &str) -> Option<DateTime<Utc>> {
    opt_s(item, name)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Parses a wire-enum attribute with the enum's own `parse`.
pub fn parsed<T>(
    item: &Item,
    name: &'static str,
    parse: impl Fn(&str) -> condo_core::DomainResult<T>,
) -> Result<T, ApiError> {
    let raw = s(item, name)?;
    parse(&raw).map_err(|e| {
        tracing::error!("Stored row has invalid {}: {}", name, e);
        corrupt(name)
    })
}

fn corrupt(name: &str) -> ApiError {
    ApiError::Backend(format!("stored row is missing or has invalid attribute '{}'", name))
}
