//! Session/role resolution driven by the backend's authentication state.

use condo_core::session::{LoginRequest, Session, SignUpRequest};
use condo_core::Role;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::{Backend, Identity};
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Set until the first resolution and while one is in flight.
    pub loading: bool,
    pub session: Option<Session>,
}

impl SessionState {
    fn signed_out() -> Self {
        Self {
            loading: false,
            session: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().and_then(|s| s.role)
    }
}

/// Holds the current session and keeps it in sync with sign-in/out.
///
/// Constructed once at application start and handed to whatever needs the
/// session; dropping it (or calling `shutdown`) stops the resolver task.
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<SessionState>>,
    task: JoinHandle<()>,
}

impl SessionStore {
    pub fn start(backend: Arc<dyn Backend>) -> Self {
        let (state, _) = watch::channel(SessionState {
            loading: true,
            session: None,
        });
        let state = Arc::new(state);
        let task = tokio::spawn(follow_auth(
            Arc::clone(&backend),
            backend.auth_state(),
            Arc::clone(&state),
        ));
        Self { backend, state, task }
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), String> {
        let credentials = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.backend
            .sign_in(&credentials)
            .await
            .map(|_| ())
            .map_err(|e| failure("Sign-in", e))
    }

    /// Creates the identity (the backend persists unit/block right after)
    /// and signs in with it.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<(), String> {
        request.validate().map_err(|e| failure("Sign-up", e.into()))?;
        let user_id = self
            .backend
            .sign_up(&request)
            .await
            .map_err(|e| failure("Sign-up", e))?;
        tracing::info!("Created identity {}", user_id);
        self.sign_in(&request.email, &request.password).await
    }

    pub async fn sign_out(&self) -> Result<(), String> {
        self.backend.sign_out().await.map_err(|e| failure("Sign-out", e))
    }

    /// Renews the tokens and re-reads profile and role, e.g. after the
    /// profile was edited.
    pub async fn refresh(&self) -> Result<(), String> {
        self.backend
            .refresh_tokens()
            .await
            .map_err(|e| failure("Token refresh", e))?;
        let identity = self.backend.auth_state().borrow().clone();
        match identity {
            Some(identity) => {
                let session = resolve(self.backend.as_ref(), identity).await;
                self.state.send_replace(SessionState {
                    loading: false,
                    session: Some(session),
                });
            }
            None => {
                self.state.send_replace(SessionState::signed_out());
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn failure(action: &str, err: ClientError) -> String {
    tracing::warn!("{} failed: {}", action, err);
    err.user_message()
}

async fn follow_auth(
    backend: Arc<dyn Backend>,
    mut auth: watch::Receiver<Option<Identity>>,
    state: Arc<watch::Sender<SessionState>>,
) {
    loop {
        let identity = auth.borrow_and_update().clone();
        match identity {
            Some(identity) => {
                state.send_modify(|s| s.loading = true);
                let session = resolve(backend.as_ref(), identity).await;
                // A newer sign-in/out supersedes this result.
                if !matches!(auth.has_changed(), Ok(true)) {
                    state.send_replace(SessionState {
                        loading: false,
                        session: Some(session),
                    });
                }
            }
            None => {
                state.send_replace(SessionState::signed_out());
            }
        }

        if auth.changed().await.is_err() {
            break;
        }
    }
}

/// Profile and role are fetched concurrently; either may come back empty.
async fn resolve(backend: &dyn Backend, identity: Identity) -> Session {
    let (profile, role) = tokio::join!(backend.fetch_profile(), backend.fetch_role());
    let profile = profile.unwrap_or_else(|e| {
        tracing::warn!("Failed to load profile for {}: {}", identity.user_id, e);
        None
    });
    let role = role.unwrap_or_else(|e| {
        tracing::warn!("Failed to load role for {}: {}", identity.user_id, e);
        None
    });
    Session {
        user_id: identity.user_id,
        email: identity.email,
        profile,
        role,
    }
}
