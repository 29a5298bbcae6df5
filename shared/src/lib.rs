pub mod config;
pub mod error;
pub mod http;
pub mod items;
pub mod store;
pub mod auth;
pub mod guard;
pub mod session;
pub mod profiles;
pub mod roles;
pub mod packages;
pub mod visitors;
pub mod reservations;
pub mod notices;
pub mod occurrences;
pub mod stats;
pub mod tables;
pub mod sockets;

use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::sync::Arc;

pub use config::Config;
pub use error::ApiError;

/// Shared application state
pub struct AppState {
    pub cognito_client: CognitoClient,
    pub dynamo_client: DynamoClient,
    pub api_gateway_client: Option<ApiGatewayManagementClient>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        cognito_client: CognitoClient,
        dynamo_client: DynamoClient,
        api_gateway_client: Option<ApiGatewayManagementClient>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            cognito_client,
            dynamo_client,
            api_gateway_client,
            config,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }
}

/// Builds the websocket management client when an endpoint is configured.
pub fn api_gateway_client(
    sdk_config: &aws_config::SdkConfig,
    config: &Config,
) -> Option<ApiGatewayManagementClient> {
    config.ws_api_endpoint.as_ref().map(|endpoint| {
        let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config)
            .endpoint_url(endpoint)
            .build();
        ApiGatewayManagementClient::from_conf(api_config)
    })
}
