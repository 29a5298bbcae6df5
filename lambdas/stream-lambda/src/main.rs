use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::ChangeEvent;
use condo_shared::sockets::broadcast::broadcast_change;
use condo_shared::Config;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

struct StreamState {
    dynamo_client: DynamoClient,
    api_gateway_client: Option<ApiGatewayManagementClient>,
    config: Config,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let sdk_config = aws_config::load_from_env().await;
    let config = Config::from_env();
    let api_gateway_client = condo_shared::api_gateway_client(&sdk_config, &config);
    if api_gateway_client.is_none() {
        tracing::error!("WS_API_ENDPOINT is not set; change events will not be delivered");
    }

    let state = Arc::new(StreamState {
        dynamo_client: DynamoClient::new(&sdk_config),
        api_gateway_client,
        config,
    });

    run(service_fn(move |event: LambdaEvent<Event>| {
        let state = Arc::clone(&state);
        async move { function_handler(event, &state).await }
    }))
    .await
}

async fn function_handler(event: LambdaEvent<Event>, state: &StreamState) -> Result<(), Error> {
    tracing::info!("DynamoDB Stream event received with {} records", event.payload.records.len());

    let Some(api_gateway_client) = state.api_gateway_client.as_ref() else {
        tracing::warn!("Skipping {} records without a websocket endpoint", event.payload.records.len());
        return Ok(());
    };

    for change in changes(&event.payload.records) {
        match broadcast_change(
            &state.dynamo_client,
            api_gateway_client,
            &state.config.table_name,
            change,
        )
        .await
        {
            Ok(delivered) => tracing::info!("Broadcast {} {:?} to {} clients", change.table, change.change, delivered),
            Err(e) => tracing::error!("Failed to broadcast {}: {}", change.table, e),
        }
    }

    Ok(())
}

/// One event per touched table and change kind, in record order. Clients
/// re-read whole tables, so repeats within a batch carry no information.
fn changes(records: &[EventRecord]) -> Vec<ChangeEvent> {
    dedup(records.iter().filter_map(to_change_event))
}

fn dedup(events: impl Iterator<Item = ChangeEvent>) -> Vec<ChangeEvent> {
    let mut unique: Vec<ChangeEvent> = Vec::new();
    for event in events {
        if !unique.contains(&event) {
            unique.push(event);
        }
    }
    unique
}

fn to_change_event(record: &EventRecord) -> Option<ChangeEvent> {
    // For REMOVE events, new_image is empty; use old_image instead
    let image = if record.change.new_image.is_empty() {
        &record.change.old_image
    } else {
        &record.change.new_image
    };

    let entity_type = image
        .get("entity_type")
        .and_then(|attr| serde_json::to_value(attr).ok());
    classify(&record.event_name, entity_type.as_ref())
}

fn classify(event_name: &str, entity_type: Option<&Value>) -> Option<ChangeEvent> {
    let entity_type = entity_type.and_then(string_value);
    let event = ChangeEvent::from_stream(event_name, entity_type.as_deref());
    if event.is_none() {
        tracing::info!("Ignoring {} record for {:?}", event_name, entity_type);
    }
    event
}

/// Images may serialize attributes either bare or in DynamoDB JSON.
fn string_value(value: &Value) -> Option<String> {
    value
        .as_str()
        .or_else(|| value.get("S").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use condo_core::{ChangeKind, Table};
    use serde_json::json;

    #[test]
    fn string_values_in_both_shapes() {
        assert_eq!(string_value(&json!("packages")).as_deref(), Some("packages"));
        assert_eq!(string_value(&json!({"S": "visitors"})).as_deref(), Some("visitors"));
        assert_eq!(string_value(&json!({"N": "1"})), None);
    }

    #[test]
    fn records_map_to_table_events() {
        assert_eq!(
            classify("REMOVE", Some(&json!({"S": "notices"}))),
            Some(ChangeEvent::new(Table::Notices, ChangeKind::Delete))
        );
        assert_eq!(
            classify("MODIFY", Some(&json!("packages"))),
            Some(ChangeEvent::new(Table::Packages, ChangeKind::Update))
        );
    }

    #[test]
    fn connection_rows_are_not_broadcast() {
        assert!(classify("INSERT", Some(&json!("connection"))).is_none());
        assert!(classify("INSERT", None).is_none());
    }

    #[test]
    fn batch_changes_are_deduplicated() {
        let occ = ChangeEvent::new(Table::Occurrences, ChangeKind::Insert);
        let ev = ChangeEvent::new(Table::OccurrenceEvents, ChangeKind::Insert);
        let pkg = ChangeEvent::new(Table::Packages, ChangeKind::Update);
        assert_eq!(dedup(vec![occ, ev, occ, pkg].into_iter()), vec![occ, ev, pkg]);
    }
}
