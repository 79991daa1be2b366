//! Process-wide session identity and sign-in/sign-up/sign-out flows.

use std::sync::{Arc, RwLock};

use futures::Stream;
use shared::domain::{Profile, UserId};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};

use crate::{
    error::{Notice, NoticeContext},
    AuthProvider, ProfileStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(UserId),
    SignedOut,
}

impl SessionEvent {
    pub fn viewer(self) -> Option<UserId> {
        match self {
            Self::SignedIn(user_id) => Some(user_id),
            Self::SignedOut => None,
        }
    }
}

/// Single writer, many readers. Readers get whole snapshots only.
pub struct SessionHub {
    current: RwLock<Option<UserId>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    pub fn current(&self) -> Option<UserId> {
        *self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, event: SessionEvent) {
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = event.viewer();
        }
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Session changes as a stream. Lagged receivers skip to newer events.
    pub fn changes(&self) -> impl Stream<Item = SessionEvent> {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Backend(Notice),
}

pub struct Authenticator {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    hub: Arc<SessionHub>,
}

impl Authenticator {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        hub: Arc<SessionHub>,
    ) -> Self {
        Self {
            provider,
            profiles,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    /// Creates the account and its profile row, then signs the user in.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<UserId, AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::Invalid("name is required".into()));
        }
        validate_credentials(email, password)?;

        let user_id = self
            .provider
            .sign_up(name.trim(), email.trim(), password)
            .await
            .map_err(|err| AuthError::Backend(Notice::from_error(NoticeContext::SignUp, &err)))?;

        let profile = Profile {
            id: user_id,
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        };
        self.profiles
            .insert_profile(&profile)
            .await
            .map_err(|err| AuthError::Backend(Notice::from_error(NoticeContext::SignUp, &err)))?;

        info!(user_id = %user_id, "auth: account created");
        self.hub.publish(SessionEvent::SignedIn(user_id));
        Ok(user_id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        validate_credentials(email, password)?;
        let user_id = self
            .provider
            .sign_in(email.trim(), password)
            .await
            .map_err(|err| AuthError::Backend(Notice::from_error(NoticeContext::SignIn, &err)))?;
        info!(user_id = %user_id, "auth: signed in");
        self.hub.publish(SessionEvent::SignedIn(user_id));
        Ok(user_id)
    }

    /// The local session ends even when the backend call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.provider.sign_out().await;
        self.hub.publish(SessionEvent::SignedOut);
        result.map_err(|err| {
            warn!(error = %err, "auth: backend sign-out failed; local session cleared");
            AuthError::Backend(Notice::from_error(NoticeContext::SignOut, &err))
        })
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::Invalid("a valid email address is required".into()));
    }
    if password.is_empty() {
        return Err(AuthError::Invalid("password is required".into()));
    }
    Ok(())
}
