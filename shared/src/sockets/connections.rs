use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::items::{self, Item};

const CONNECTION_PREFIX: &str = "CONNECTION#";
const CONNECTION_ENTITY: &str = "connection";

/// WebSocket connection stored in DynamoDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub connected_at: String,
    /// Tables the client asked for; empty means every table.
    pub tables: Vec<Table>,
}

impl Connection {
    pub fn wants(&self, table: Table) -> bool {
        self.tables.is_empty() || self.tables.contains(&table)
    }
}

fn key(connection_id: &str) -> AttributeValue {
    AttributeValue::S(format!("{}{}", CONNECTION_PREFIX, connection_id))
}

pub fn from_item(item: &Item) -> Option<Connection> {
    let tables = item
        .get("tables")
        .and_then(|v| v.as_ss().ok())
        .map(|names| names.iter().filter_map(|n| Table::parse(n).ok()).collect())
        .unwrap_or_default();

    Some(Connection {
        connection_id: items::opt_s(item, "connection_id")?,
        user_id: items::opt_s(item, "user_id")?,
        connected_at: items::s_or_default(item, "connected_at"),
        tables,
    })
}

/// Save a WebSocket connection to DynamoDB
pub async fn save_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    let now = chrono::Utc::now().to_rfc3339();

    client
        .put_item()
        .table_name(table_name)
        .item("PK", key(connection_id))
        .item("SK", key(connection_id))
        .item("connection_id", AttributeValue::S(connection_id.to_string()))
        .item("user_id", AttributeValue::S(user_id.to_string()))
        .item("connected_at", AttributeValue::S(now))
        .item("entity_type", AttributeValue::S(CONNECTION_ENTITY.to_string()))
        .send()
        .await?;

    tracing::info!("Connection saved: {} (user: {})", connection_id, user_id);
    Ok(())
}

/// Remove a WebSocket connection from DynamoDB
pub async fn remove_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<(), ApiError> {
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", key(connection_id))
        .key("SK", key(connection_id))
        .send()
        .await?;

    tracing::info!("Connection removed: {}", connection_id);
    Ok(())
}

fn table_set(tables: &[Table]) -> AttributeValue {
    AttributeValue::Ss(tables.iter().map(|t| t.as_str().to_string()).collect())
}

/// Adds `tables` to the connection's subscription set.
pub async fn subscribe(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    tables: &[Table],
) -> Result<(), ApiError> {
    // String sets cannot be empty.
    if tables.is_empty() {
        return Ok(());
    }
    client
        .update_item()
        .table_name(table_name)
        .key("PK", key(connection_id))
        .key("SK", key(connection_id))
        .update_expression("ADD tables :tables")
        .condition_expression("attribute_exists(PK)")
        .expression_attribute_values(":tables", table_set(tables))
        .send()
        .await?;

    tracing::info!("Connection {} subscribed to {:?}", connection_id, tables);
    Ok(())
}

pub async fn unsubscribe(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    tables: &[Table],
) -> Result<(), ApiError> {
    if tables.is_empty() {
        return Ok(());
    }
    client
        .update_item()
        .table_name(table_name)
        .key("PK", key(connection_id))
        .key("SK", key(connection_id))
        .update_expression("DELETE tables :tables")
        .condition_expression("attribute_exists(PK)")
        .expression_attribute_values(":tables", table_set(tables))
        .send()
        .await?;

    tracing::info!("Connection {} unsubscribed from {:?}", connection_id, tables);
    Ok(())
}

/// Get all active WebSocket connections
pub async fn list_connections(client: &DynamoClient, table_name: &str) -> Result<Vec<Connection>, ApiError> {
    let mut connections = Vec::new();
    let mut start_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .filter_expression("entity_type = :type")
            .expression_attribute_values(":type", AttributeValue::S(CONNECTION_ENTITY.to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await?;

        connections.extend(result.items.unwrap_or_default().iter().filter_map(from_item));
        start_key = result.last_evaluated_key;
        if start_key.is_none() {
            break;
        }
    }

    Ok(connections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tables: Option<Vec<&str>>) -> Item {
        let mut item = Item::new();
        items::put_s(&mut item, "connection_id", "abc=");
        items::put_s(&mut item, "user_id", "u-1");
        if let Some(tables) = tables {
            item.insert(
                "tables".to_string(),
                AttributeValue::Ss(tables.into_iter().map(String::from).collect()),
            );
        }
        item
    }

    #[test]
    fn connection_without_subscriptions_wants_everything() {
        let conn = from_item(&item(None)).unwrap();
        assert!(conn.wants(Table::Packages));
        assert!(conn.wants(Table::OccurrenceEvents));
    }

    #[test]
    fn subscribed_connection_filters_tables() {
        let conn = from_item(&item(Some(vec!["packages", "bogus"]))).unwrap();
        assert_eq!(conn.tables, vec![Table::Packages]);
        assert!(conn.wants(Table::Packages));
        assert!(!conn.wants(Table::Visitors));
    }
}
