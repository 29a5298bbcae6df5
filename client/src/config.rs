use std::env;

use crate::error::ClientError;

/// Endpoints of a deployed backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub ws_url: String,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into(),
        }
    }

    pub fn from_env() -> Result<Self, ClientError> {
        let api_url = non_empty("CONDO_API_URL").ok_or(ClientError::Config("CONDO_API_URL must be set"))?;
        let ws_url = non_empty("CONDO_WS_URL").ok_or(ClientError::Config("CONDO_WS_URL must be set"))?;
        Ok(Self::new(api_url, ws_url))
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
