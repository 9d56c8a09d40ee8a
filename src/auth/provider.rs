//! Seams to the hosted identity provider and the profile table.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ClientError;
use crate::models::{AuthChange, AuthEvent, Profile, Session};

const AUTH_EVENT_CAPACITY: usize = 32;
const INVALID_EMAIL: &str = "Unable to validate email address: invalid format";

/// Session lifecycle operations of the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, ClientError>;

    /// Subscribe to sign-in, sign-out and token-refresh notifications.
    /// Dropping the receiver unsubscribes.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_out(&self) -> Result<(), ClientError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ClientError>;
}

/// Lookup of the application profile row for an identity.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// `Ok(None)` means the row does not exist; `Err` is a storage failure.
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ClientError>;
}

/// In-process identity provider.
///
/// Holds a session handed over by the host (for example a token passed on the
/// command line, or a session restored by an embedding shell) and fans out
/// auth changes to subscribers.
#[derive(Debug, Clone)]
pub struct LocalIdentityProvider {
    session: Arc<Mutex<Option<Session>>>,
    events: broadcast::Sender<AuthChange>,
    reset_requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LocalIdentityProvider {
    pub fn new(session: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            session: Arc::new(Mutex::new(session)),
            events,
            reset_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the session and notify subscribers.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        *self.lock_session() = session.clone();
        // No subscribers is not an error
        let _ = self.events.send(AuthChange::new(event, session));
    }

    /// Password-reset requests received so far, as `(email, redirect_to)`.
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.reset_requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.lock_session().clone())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ClientError> {
        let email = email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(ClientError::Identity(INVALID_EMAIL.to_string())),
        }

        self.reset_requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    #[tokio::test]
    async fn emit_updates_session_and_notifies() {
        let provider = LocalIdentityProvider::default();
        let mut rx = provider.on_auth_state_change();

        let session = Session {
            user: Identity {
                id: Uuid::new_v4(),
                email: None,
            },
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        provider.emit(AuthEvent::SignedIn, Some(session.clone()));

        assert_eq!(provider.get_session().await.unwrap(), Some(session.clone()));
        let change = rx.recv().await.unwrap();
        assert_eq!(change.event, AuthEvent::SignedIn);
        assert_eq!(change.session, Some(session));
    }

    #[tokio::test]
    async fn reset_rejects_malformed_email() {
        let provider = LocalIdentityProvider::default();

        for email in ["", "user", "@example.com", "user@"] {
            let err = provider
                .reset_password_for_email(email, "https://app.example.com/auth/reset")
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::Identity(_)), "{email:?}");
            assert_eq!(err.user_message(), INVALID_EMAIL);
        }
        assert!(provider.reset_requests().is_empty());
    }

    #[tokio::test]
    async fn sign_out_clears_session() {
        let provider = LocalIdentityProvider::default();
        let mut rx = provider.on_auth_state_change();
        provider.sign_out().await.unwrap();

        assert_eq!(provider.get_session().await.unwrap(), None);
        assert_eq!(rx.recv().await.unwrap(), AuthChange::signed_out());
    }
}
