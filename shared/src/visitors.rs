use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use condo_core::types::{CreateVisitorRequest, Visitor, VisitorStatus};
use condo_core::Table;

use crate::error::ApiError;
use crate::items::{self, Item};
use crate::store;

pub fn to_item(visitor: &Visitor) -> Item {
    let mut item = items::new_item(Table::Visitors, &visitor.id);
    items::put_s(&mut item, "name", visitor.name.as_str());
    items::put_s(&mut item, "document", visitor.document.as_str());
    items::put_s(&mut item, "unit", visitor.unit.as_str());
    items::put_s(&mut item, "block", visitor.block.as_str());
    items::put_s(&mut item, "resident_name", visitor.resident_name.as_str());
    items::put_opt_s(&mut item, "vehicle", visitor.vehicle.as_deref());
    items::put_time(&mut item, "entry_at", visitor.entry_at);
    if let Some(at) = visitor.exit_at {
        items::put_time(&mut item, "exit_at", at);
    }
    items::put_s(&mut item, "status", visitor.status.as_str());
    items::put_opt_s(&mut item, "registered_by", visitor.registered_by.as_deref());
    item
}

pub fn from_item(item: &Item) -> Result<Visitor, ApiError> {
    Ok(Visitor {
        id: items::s(item, "id")?,
        name: items::s_or_default(item, "name"),
        document: items::s_or_default(item, "document"),
        unit: items::s_or_default(item, "unit"),
        block: items::s_or_default(item, "block"),
        resident_name: items::s_or_default(item, "resident_name"),
        vehicle: items::opt_s(item, "vehicle"),
        entry_at: items::time(item, "entry_at")?,
        exit_at: items::opt_time(item, "exit_at"),
        status: items::parsed(item, "status", VisitorStatus::parse)?,
        registered_by: items::opt_s(item, "registered_by"),
    })
}

pub async fn list_visitors(client: &DynamoClient, table_name: &str) -> Result<Vec<Visitor>, ApiError> {
    store::scan_entity(client, table_name, Table::Visitors)
        .await?
        .iter()
        .map(from_item)
        .collect()
}

pub async fn register_entry(
    client: &DynamoClient,
    table_name: &str,
    registered_by: &str,
    req: CreateVisitorRequest,
) -> Result<Visitor, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let visitor = Visitor::enter(id, req, Some(registered_by.to_string()), Utc::now())?;

    store::put_new(client, table_name, to_item(&visitor)).await?;
    tracing::info!("Visitor entered: {} to {}/{}", visitor.id, visitor.block, visitor.unit);
    Ok(visitor)
}

/// `dentro -> saiu`, writing `exit_at` with the status.
pub async fn register_exit(client: &DynamoClient, table_name: &str, id: &str) -> Result<Visitor, ApiError> {
    let item = store::get_row(client, table_name, Table::Visitors, id)
        .await?
        .ok_or(ApiError::NotFound("Visitor"))?;
    let mut visitor = from_item(&item)?;
    let previous = visitor.status;
    let now = Utc::now();
    visitor.register_exit(now)?;

    store::update_row(
        client,
        table_name,
        Table::Visitors,
        id,
        vec![
            ("status", AttributeValue::S(visitor.status.as_str().to_string())),
            ("exit_at", AttributeValue::S(now.to_rfc3339())),
        ],
        Some(previous.as_str()),
    )
    .await?;
    tracing::info!("Visitor left: {}", id);
    Ok(visitor)
}
