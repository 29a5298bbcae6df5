use std::env;

use crate::error::ApiError;

const DEFAULT_TABLE_NAME: &str = "condo-app";

/// Environment of the lambdas, read once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub cognito_client_id: Option<String>,
    pub cognito_client_secret: Option<String>,
    /// Enables auto-confirmation of new identities.
    pub cognito_user_pool_id: Option<String>,
    pub ws_api_endpoint: Option<String>,
    /// Local development only: trust the `X-User-Id` header and the
    /// websocket `user_id` query parameter when no JWT is present.
    pub allow_user_id_header: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string()),
            cognito_client_id: non_empty("COGNITO_CLIENT_ID"),
            cognito_client_secret: non_empty("COGNITO_CLIENT_SECRET"),
            cognito_user_pool_id: non_empty("COGNITO_USER_POOL_ID"),
            ws_api_endpoint: non_empty("WS_API_ENDPOINT"),
            allow_user_id_header: non_empty("ALLOW_USER_ID_HEADER").is_some_and(|v| is_enabled(&v)),
        }
    }

    /// Client id and secret of the Cognito app client.
    pub fn cognito_credentials(&self) -> Result<(&str, &str), ApiError> {
        let client_id = self
            .cognito_client_id
            .as_deref()
            .ok_or(ApiError::Config("COGNITO_CLIENT_ID must be set"))?;
        let client_secret = self
            .cognito_client_secret
            .as_deref()
            .ok_or(ApiError::Config("COGNITO_CLIENT_SECRET must be set"))?;
        Ok((client_id, client_secret))
    }

    pub fn ws_endpoint(&self) -> Result<&str, ApiError> {
        self.ws_api_endpoint
            .as_deref()
            .ok_or(ApiError::Config("WS_API_ENDPOINT must be set"))
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_enabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
