use aws_sdk_apigatewaymanagement::error::ProvideErrorMetadata;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use condo_core::table::ServerMessage;
use condo_core::ChangeEvent;

use super::connections::{list_connections, remove_connection, Connection};
use crate::error::ApiError;

pub fn encode(message: &ServerMessage) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(message).map_err(|e| ApiError::Backend(format!("failed to encode message: {}", e)))
}

/// Posts one message to a single connection.
pub async fn send_to(
    api_gateway_client: &ApiGatewayManagementClient,
    connection_id: &str,
    message: &ServerMessage,
) -> Result<(), ApiError> {
    api_gateway_client
        .post_to_connection()
        .connection_id(connection_id)
        .data(Blob::new(encode(message)?))
        .send()
        .await
        .map_err(|e| ApiError::Backend(format!("post to {} failed: {:?}", connection_id, e)))?;
    Ok(())
}

/// Connections that should hear about a change to `event.table`.
pub fn recipients(connections: Vec<Connection>, event: &ChangeEvent) -> Vec<Connection> {
    connections.into_iter().filter(|c| c.wants(event.table)).collect()
}

/// Sends one change event to every subscribed connection. Connections the
/// gateway reports as gone are removed.
pub async fn broadcast_change(
    dynamo_client: &DynamoClient,
    api_gateway_client: &ApiGatewayManagementClient,
    table_name: &str,
    event: ChangeEvent,
) -> Result<usize, ApiError> {
    let connections = recipients(list_connections(dynamo_client, table_name).await?, &event);
    let payload = encode(&ServerMessage::TableChanged(event))?;

    tracing::info!(
        "Broadcasting {} {:?} to {} connections",
        event.table,
        event.change,
        connections.len()
    );

    let mut delivered = 0;
    for conn in connections {
        let result = api_gateway_client
            .post_to_connection()
            .connection_id(&conn.connection_id)
            .data(Blob::new(payload.clone()))
            .send()
            .await;

        match result {
            Ok(_) => delivered += 1,
            Err(e) if e.code() == Some("GoneException") => {
                tracing::warn!("Connection {} is gone, removing it", conn.connection_id);
                if let Err(e) = remove_connection(dynamo_client, table_name, &conn.connection_id).await {
                    tracing::warn!("Failed to remove stale connection {}: {}", conn.connection_id, e);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to send to connection {}: {:?}", conn.connection_id, e);
            }
        }
    }

    Ok(delivered)
}
