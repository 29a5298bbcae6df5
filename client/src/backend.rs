//! The seam between the realtime views and whatever serves the data.

use async_trait::async_trait;
use condo_core::listing::OrderBy;
use condo_core::mutation::Mutation;
use condo_core::session::{LoginRequest, SignUpRequest};
use condo_core::stats::CountQuery;
use condo_core::types::Profile;
use condo_core::{ChangeEvent, Role, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::error::ClientError;

/// Change events buffered per table before slow receivers lag.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// The authenticated identity, as carried by the id token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "sub")]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Current identity; changes on sign-in, sign-out and token refresh.
    fn auth_state(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in(&self, credentials: &LoginRequest) -> Result<Identity, ClientError>;

    /// Creates the identity and its profile, returning the new user id.
    /// Does not sign in.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<String, ClientError>;

    async fn sign_out(&self) -> Result<(), ClientError>;

    /// Renews the tokens of the current identity.
    async fn refresh_tokens(&self) -> Result<(), ClientError>;

    /// Profile of the signed-in identity, `None` when no row exists yet.
    async fn fetch_profile(&self) -> Result<Option<Profile>, ClientError>;

    async fn fetch_role(&self) -> Result<Option<Role>, ClientError>;

    /// Full read of one table.
    async fn fetch_rows(&self, table: Table, order: &OrderBy) -> Result<Vec<Value>, ClientError>;

    async fn count(&self, query: CountQuery) -> Result<u64, ClientError>;

    /// Performs one write and returns the affected row, if the endpoint
    /// returns one.
    async fn mutate(&self, mutation: &Mutation) -> Result<Value, ClientError>;

    /// Change events for `table`. Dropping the receiver unsubscribes.
    fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent>;
}

/// One broadcast channel per table, fed by whatever observes writes.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    senders: Arc<[broadcast::Sender<ChangeEvent>; Table::ALL.len()]>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            senders: Arc::new(std::array::from_fn(|_| {
                broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
            })),
        }
    }

    pub fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        self.senders[table as usize].subscribe()
    }

    /// Returns how many receivers got the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.senders[event.table as usize].send(event).unwrap_or(0)
    }

    pub fn receivers(&self, table: Table) -> usize {
        self.senders[table as usize].receiver_count()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
