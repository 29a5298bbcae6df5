use condo_core::table::{ClientAction, ClientMessage, ServerMessage};
use lambda_http::{http::StatusCode, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

use super::broadcast::{encode, send_to};
use super::connections::{remove_connection, save_connection, subscribe, unsubscribe};
use crate::error::ApiError;
use crate::http;
use crate::AppState;

/// Route key of a websocket event; API Gateway passes it as a header.
pub fn route_key(event: &Request) -> Option<&str> {
    event
        .headers()
        .get("routekey")
        .or_else(|| event.headers().get("routeKey"))
        .and_then(|v| v.to_str().ok())
}

pub fn is_websocket_event(event: &Request) -> bool {
    route_key(event).is_some()
}

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let connection_id = event
        .headers()
        .get("connectionid")
        .or_else(|| event.headers().get("connectionId"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let route = route_key(&event).unwrap_or(event.uri().path()).to_string();

    tracing::info!("WebSocket event: {} for connection: {}", route, connection_id);

    let result = match route.as_str() {
        "$connect" => handle_connect(&event, &state, &connection_id).await,
        "$disconnect" => handle_disconnect(&state, &connection_id).await,
        "$default" => handle_message(&event, &state, &connection_id).await,
        _ => {
            tracing::warn!("Unknown WebSocket route: {}", route);
            Err(ApiError::BadRequest(format!("Unknown route: {}", route)))
        }
    };
    http::respond(result)
}

fn ok_empty() -> Result<Response<Body>, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(|e| ApiError::Backend(format!("failed to build response: {}", e)))
}

async fn handle_connect(event: &Request, state: &AppState, connection_id: &str) -> Result<Response<Body>, ApiError> {
    let subject = event
        .request_context_ref()
        .and_then(|ctx| ctx.authorizer())
        .and_then(|auth| auth.jwt.as_ref())
        .and_then(|jwt| jwt.claims.get("sub"))
        .map(|s| s.to_string());
    let requested = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("user_id"))
        .map(|s| s.to_string());
    let user_id = connection_user(subject, requested, state.config.allow_user_id_header);

    tracing::info!("WebSocket connect: {} (user: {})", connection_id, user_id);
    save_connection(&state.dynamo_client, state.table_name(), connection_id, &user_id).await?;
    ok_empty()
}

/// Owner recorded for a connection. The `user_id` query parameter only
/// counts in local development, and never over a JWT subject.
fn connection_user(subject: Option<String>, requested: Option<String>, allow_requested: bool) -> String {
    subject
        .or(requested.filter(|_| allow_requested))
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn handle_disconnect(state: &AppState, connection_id: &str) -> Result<Response<Body>, ApiError> {
    tracing::info!("WebSocket disconnect: {}", connection_id);
    remove_connection(&state.dynamo_client, state.table_name(), connection_id).await?;
    ok_empty()
}

/// Handle $default event (incoming messages)
async fn handle_message(event: &Request, state: &AppState, connection_id: &str) -> Result<Response<Body>, ApiError> {
    let message: ClientMessage = http::parse_body(event.body())?;
    tracing::info!("WebSocket message action: {:?}", message.action);

    match message.action {
        ClientAction::Subscribe => {
            subscribe(&state.dynamo_client, state.table_name(), connection_id, &message.tables).await?;
            ok_empty()
        }
        ClientAction::Unsubscribe => {
            unsubscribe(&state.dynamo_client, state.table_name(), connection_id, &message.tables).await?;
            ok_empty()
        }
        // Without a management endpoint the pong rides on the route response.
        ClientAction::Ping => match state.api_gateway_client.as_ref() {
            Some(client) => {
                send_to(client, connection_id, &ServerMessage::Pong).await?;
                ok_empty()
            }
            None => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Body::from(encode(&ServerMessage::Pong)?))
                .map_err(|e| ApiError::Backend(format!("failed to build response: {}", e))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_owner_prefers_the_jwt_subject() {
        let subject = || Some("resident-7".to_string());
        let requested = || Some("manager-1".to_string());
        assert_eq!(connection_user(subject(), requested(), true), "resident-7");
        assert_eq!(connection_user(None, requested(), false), "anonymous");
        assert_eq!(connection_user(None, requested(), true), "manager-1");
        assert_eq!(connection_user(None, None, true), "anonymous");
    }
}
