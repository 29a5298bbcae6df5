use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use condo_shared::{sockets, AppState, Config};
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Initialize AWS clients once at startup
    let sdk_config = aws_config::load_from_env().await;
    let config = Config::from_env();
    tracing::info!("Using table {}", config.table_name);

    let api_gateway_client = condo_shared::api_gateway_client(&sdk_config, &config);

    let state = AppState::new(
        CognitoClient::new(&sdk_config),
        DynamoClient::new(&sdk_config),
        api_gateway_client,
        config,
    );

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            if sockets::is_websocket_event(&event) {
                sockets::handle_websocket_event(event, state).await
            } else {
                http_handler::function_handler(event, state).await
            }
        }
    }))
    .await
}
