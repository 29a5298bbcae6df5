//! `Backend` over the HTTP API and the websocket change channel.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use condo_core::listing::OrderBy;
use condo_core::mutation::{Mutation, WriteMethod};
use condo_core::session::{AuthTokens, LoginRequest, RefreshRequest, SignUpRequest};
use condo_core::stats::{CountQuery, CountResponse};
use condo_core::table::{ClientMessage, ServerMessage};
use condo_core::types::Profile;
use condo_core::{ChangeEvent, Role, Table};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::backend::{Backend, ChangeHub, Identity};
use crate::config::ClientConfig;
use crate::error::ClientError;

struct Credentials {
    tokens: AuthTokens,
    identity: Identity,
}

#[derive(Deserialize)]
struct SignUpReply {
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

pub struct HttpBackend {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: RwLock<Option<Credentials>>,
    auth_tx: watch::Sender<Option<Identity>>,
    hub: ChangeHub,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    socket: JoinHandle<()>,
}

impl HttpBackend {
    /// Opens the websocket and starts forwarding change events.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(config.ws_url.as_str()).await?;
        tracing::info!("Connected to {}", config.ws_url);
        Ok(Self::with_socket(config, ws))
    }

    /// Uses an already established websocket for change events.
    pub fn with_socket<W>(config: ClientConfig, ws: W) -> Self
    where
        W: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send + 'static,
    {
        let hub = ChangeHub::new();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let socket = tokio::spawn(run_socket(ws, outgoing_rx, hub.clone()));
        let (auth_tx, _) = watch::channel(None);

        Self {
            http: reqwest::Client::new(),
            config,
            credentials: RwLock::new(None),
            auth_tx,
            hub,
            outgoing,
            socket,
        }
    }

    /// False once the websocket has closed.
    pub fn is_connected(&self) -> bool {
        !self.socket.is_finished()
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let credentials = self.credentials.read().await;
        let credentials = credentials.as_ref().ok_or(ClientError::NotSignedIn)?;
        Ok(self
            .http
            .request(method, self.config.endpoint(path))
            .bearer_auth(&credentials.tokens.id_token))
    }

    async fn store(&self, tokens: AuthTokens) -> Result<Identity, ClientError> {
        let identity = decode_identity(&tokens.id_token)?;
        *self.credentials.write().await = Some(Credentials {
            tokens,
            identity: identity.clone(),
        });
        let next = identity.clone();
        self.auth_tx.send_if_modified(|current| {
            let changed = current.as_ref() != Some(&next);
            if changed {
                *current = Some(next);
            }
            changed
        });
        Ok(identity)
    }
}

impl Drop for HttpBackend {
    fn drop(&mut self) {
        self.socket.abort();
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn auth_state(&self) -> watch::Receiver<Option<Identity>> {
        self.auth_tx.subscribe()
    }

    async fn sign_in(&self, credentials: &LoginRequest) -> Result<Identity, ClientError> {
        let request = self.http.post(self.config.endpoint("login")).json(credentials);
        let tokens: AuthTokens = read_json(request.send().await?).await?;
        self.store(tokens).await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<String, ClientError> {
        let request = self.http.post(self.config.endpoint("signup")).json(request);
        let reply: SignUpReply = read_json(request.send().await?).await?;
        Ok(reply.user_id)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let Some(credentials) = self.credentials.write().await.take() else {
            return Ok(());
        };
        self.auth_tx.send_replace(None);

        let request = self
            .http
            .post(self.config.endpoint("logout"))
            .bearer_auth(&credentials.tokens.access_token);
        read_json::<Value>(request.send().await?).await?;
        Ok(())
    }

    async fn refresh_tokens(&self) -> Result<(), ClientError> {
        let body = {
            let credentials = self.credentials.read().await;
            let credentials = credentials.as_ref().ok_or(ClientError::NotSignedIn)?;
            RefreshRequest {
                email: credentials.identity.email.clone(),
                refresh_token: credentials.tokens.refresh_token.clone(),
            }
        };
        let request = self.http.post(self.config.endpoint("refresh")).json(&body);
        let tokens: AuthTokens = read_json(request.send().await?).await?;
        self.store(tokens).await?;
        Ok(())
    }

    async fn fetch_profile(&self) -> Result<Option<Profile>, ClientError> {
        let request = self.authorized(Method::GET, "profiles/me").await?;
        match read_json(request.send().await?).await {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_role(&self) -> Result<Option<Role>, ClientError> {
        let request = self.authorized(Method::GET, "roles/me").await?;
        read_json(request.send().await?).await
    }

    async fn fetch_rows(&self, table: Table, order: &OrderBy) -> Result<Vec<Value>, ClientError> {
        let ascending = if order.ascending { "true" } else { "false" };
        let request = self
            .authorized(Method::GET, table.as_str())
            .await?
            .query(&[("order", order.column.as_str()), ("ascending", ascending)]);
        read_json(request.send().await?).await
    }

    async fn count(&self, query: CountQuery) -> Result<u64, ClientError> {
        let path = format!("stats/{}", query.as_str());
        let request = self.authorized(Method::GET, &path).await?;
        let response: CountResponse = read_json(request.send().await?).await?;
        Ok(response.count)
    }

    async fn mutate(&self, mutation: &Mutation) -> Result<Value, ClientError> {
        let (method, path) = mutation.endpoint();
        let method = match method {
            WriteMethod::Post => Method::POST,
            WriteMethod::Patch => Method::PATCH,
            WriteMethod::Delete => Method::DELETE,
        };
        let mut request = self.authorized(method, &path).await?;
        if let Some(body) = mutation.body() {
            request = request.json(&body);
        }
        read_json(request.send().await?).await
    }

    fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        let receiver = self.hub.subscribe(table);
        if self.outgoing.send(ClientMessage::subscribe([table])).is_err() {
            tracing::warn!("Websocket closed, {} will not receive changes", table);
        }
        receiver
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    if body.is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(&body)?)
}

fn api_error(status: u16, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| format!("Request failed with status {}", status));
    ClientError::Api { status, message }
}

/// Reads `sub` and `email` from the id token payload. The API verifies the
/// signature; the client only needs to know who it is.
fn decode_identity(id_token: &str) -> Result<Identity, ClientError> {
    let payload = id_token.split('.').nth(1).ok_or(ClientError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| ClientError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| ClientError::MalformedToken)
}

fn server_message(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!("Ignoring websocket message: {}", e);
            None
        }
    }
}

async fn run_socket<W>(ws: W, mut outgoing: mpsc::UnboundedReceiver<ClientMessage>, hub: ChangeHub)
where
    W: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            message = outgoing.recv() => {
                let Some(message) = message else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode {:?}: {}", message.action, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::error!("Failed to send websocket message: {}", e);
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match server_message(&text) {
                    Some(ServerMessage::TableChanged(event)) => {
                        let delivered = hub.publish(event);
                        tracing::debug!("{} {:?} delivered to {} views", event.table, event.change, delivered);
                    }
                    Some(ServerMessage::Pong) | None => {}
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("Websocket read failed: {}", e);
                    break;
                }
            }
        }
    }
    tracing::warn!("Websocket closed, live views stop receiving changes");
}
