use condo_core::DomainError;
use thiserror::Error;

pub const UNEXPECTED_ERROR: &str = "Erro inesperado. Tente novamente.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Error body returned by the API.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Invalid(#[from] DomainError),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Malformed id token")]
    MalformedToken,

    #[error("Configuration error: {0}")]
    Config(&'static str),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }

    /// Text shown to the user. Transport and decoding failures collapse into
    /// the generic message; their details only go to the logs.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Invalid(DomainError::MissingField(_)) => "Preencha todos os campos".to_string(),
            ClientError::Invalid(DomainError::PasswordTooShort(n)) => {
                format!("A senha deve ter pelo menos {} caracteres", n)
            }
            ClientError::Invalid(other) => other.to_string(),
            ClientError::NotSignedIn => "Sessão expirada. Entre novamente.".to_string(),
            ClientError::Http(_)
            | ClientError::Socket(_)
            | ClientError::Decode(_)
            | ClientError::MalformedToken
            | ClientError::Config(_) => UNEXPECTED_ERROR.to_string(),
        }
    }
}
