//! DynamoDB access shared by the entity modules.

use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::Table;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::items::{key, Item};

pub async fn get_row(
    client: &DynamoClient,
    table_name: &str,
    table: Table,
    id: &str,
) -> Result<Option<Item>, ApiError> {
    let pk = key(table, id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    Ok(result.item)
}

/// Inserts a row that must not exist yet.
pub async fn put_new(client: &DynamoClient, table_name: &str, item: Item) -> Result<(), ApiError> {
    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(PK)")
        .send()
        .await?;
    Ok(())
}

/// Transaction entry creating `item` only if its key is still free.
pub fn create_once(table_name: &str, item: Item) -> Result<TransactWriteItem, ApiError> {
    let put = Put::builder()
        .table_name(table_name)
        .set_item(Some(item))
        .condition_expression("attribute_not_exists(PK)")
        .build()?;
    Ok(TransactWriteItem::builder().put(put).build())
}

/// Every row of one logical table, following scan pagination.
pub async fn scan_entity(
    client: &DynamoClient,
    table_name: &str,
    table: Table,
) -> Result<Vec<Item>, ApiError> {
    let mut items = Vec::new();
    let mut start_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .filter_expression("entity_type = :type")
            .expression_attribute_values(":type", AttributeValue::S(table.as_str().to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await?;

        items.extend(result.items.unwrap_or_default());
        start_key = result.last_evaluated_key;
        if start_key.is_none() {
            break;
        }
    }

    tracing::info!("Scanned {} {} rows", items.len(), table);
    Ok(items)
}

/// Update expression for `fields`, optionally guarded on the current status.
#[derive(Debug, PartialEq)]
pub struct UpdatePlan {
    pub expression: String,
    pub condition: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl UpdatePlan {
    pub fn new(fields: Vec<(&str, AttributeValue)>, expected_status: Option<&str>) -> Self {
        let mut names = HashMap::new();
        let mut values = HashMap::new();
        let mut sets = Vec::with_capacity(fields.len());

        // Placeholders for every name; status, date and name are reserved words.
        for (i, (field, value)) in fields.into_iter().enumerate() {
            let name = format!("#f{}", i);
            let placeholder = format!(":v{}", i);
            sets.push(format!("{} = {}", name, placeholder));
            names.insert(name, field.to_string());
            values.insert(placeholder, value);
        }

        let mut condition = "attribute_exists(PK)".to_string();
        if let Some(status) = expected_status {
            names.insert("#current_status".to_string(), "status".to_string());
            values.insert(":current_status".to_string(), AttributeValue::S(status.to_string()));
            condition.push_str(" AND #current_status = :current_status");
        }

        Self {
            expression: format!("SET {}", sets.join(", ")),
            condition,
            names,
            values,
        }
    }
}

/// Writes `fields` on one row in a single update. With `expected_status`
/// the write only lands if nobody moved the row in the meantime.
pub async fn update_row(
    client: &DynamoClient,
    table_name: &str,
    table: Table,
    id: &str,
    fields: Vec<(&str, AttributeValue)>,
    expected_status: Option<&str>,
) -> Result<(), ApiError> {
    let plan = UpdatePlan::new(fields, expected_status);
    let pk = key(table, id);

    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .update_expression(plan.expression)
        .condition_expression(plan.condition)
        .set_expression_attribute_names(Some(plan.names))
        .set_expression_attribute_values(Some(plan.values))
        .send()
        .await?;
    Ok(())
}

pub async fn delete_row(
    client: &DynamoClient,
    table_name: &str,
    table: Table,
    id: &str,
) -> Result<(), ApiError> {
    let pk = key(table, id);
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    Ok(())
}
