//! # Auth Controller
//!
//! Translates identity-provider events into session-store state: session,
//! profile and the `loading` flag.
//!
//! Every invocation (initial load or auth-state change) is tagged with a
//! sequence number when its session is published. Only the newest invocation
//! may write the profile and lower `loading`, so `loading == false` is never
//! observed with a profile that belongs to an older session.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::provider::{IdentityProvider, ProfileSource};
use crate::error::ClientError;
use crate::models::{AuthChange, Profile, Session};
use crate::session_store::{AuthState, SessionStore};

/// Outcome of a profile lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileFetch {
    Found(Profile),
    /// No row for this identity; a valid, empty result
    Missing,
    /// Storage failure, already logged
    Failed,
}

/// Auth invocation whose session is published but whose profile is pending
#[derive(Debug, Clone, Copy)]
struct Invocation {
    seq: u64,
    user_id: Option<Uuid>,
}

pub struct AuthController {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileSource>,
    store: SessionStore,
}

/// Running subscription to auth-state changes; unsubscribes when dropped.
pub struct AuthListener {
    handle: JoinHandle<()>,
}

impl AuthListener {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for AuthListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl AuthController {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileSource>,
        store: SessionStore,
    ) -> Self {
        Self {
            provider,
            profiles,
            store,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current state; predicates on it are recomputed per call.
    pub fn state(&self) -> AuthState {
        self.store.snapshot()
    }

    /// Subscribe to auth changes, then load the current session.
    ///
    /// Subscribing first means no change emitted during the initial load is lost.
    pub async fn start(self: &Arc<Self>) -> AuthListener {
        let listener = self.listen();
        self.initialize().await;
        listener
    }

    /// Load the current session once and resolve its profile before lowering `loading`.
    #[instrument(skip_all)]
    pub async fn initialize(&self) -> bool {
        let session = match self.provider.get_session().await {
            Ok(session) => session,
            Err(err) => {
                error!(error = %err, "Failed to read initial session");
                None
            }
        };

        let invocation = self.begin(session);
        self.finish(invocation).await
    }

    /// Apply one auth-state change. Returns false if a newer invocation superseded it.
    #[instrument(skip_all, fields(event = ?change.event))]
    pub async fn handle_auth_state_change(&self, change: AuthChange) -> bool {
        let invocation = self.begin(change.session);
        self.finish(invocation).await
    }

    /// Spawn the subscription loop. Each change claims its sequence number in
    /// arrival order; profile fetches then run concurrently.
    pub fn listen(self: &Arc<Self>) -> AuthListener {
        let mut rx = self.provider.on_auth_state_change();
        let controller = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        debug!(event = ?change.event, "Auth state change received");
                        let invocation = controller.begin(change.session);
                        let controller = Arc::clone(&controller);
                        tokio::spawn(async move {
                            controller.finish(invocation).await;
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth listener lagged; resynchronizing session");
                        let controller = Arc::clone(&controller);
                        tokio::spawn(async move {
                            controller.initialize().await;
                        });
                    }
                    Err(RecvError::Closed) => {
                        info!("Auth event stream closed");
                        break;
                    }
                }
            }
        });

        AuthListener { handle }
    }

    /// Query the `users` row for `user_id`. Absence is not an error.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self, user_id: Uuid) -> ProfileFetch {
        match self.profiles.fetch_profile(user_id).await {
            Ok(Some(profile)) => ProfileFetch::Found(profile),
            Ok(None) => {
                info!(%user_id, "No profile row for user");
                ProfileFetch::Missing
            }
            Err(err) => {
                counter!("auth_profile_fetch_failures_total").increment(1);
                error!(%user_id, error = %err, "Error fetching user profile");
                ProfileFetch::Failed
            }
        }
    }

    /// Sign out at the provider, then clear local state regardless of the outcome.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let result = self.provider.sign_out().await;
        self.store.clear();

        if let Err(err) = &result {
            warn!(error = %err, "Identity provider sign-out failed; local session cleared");
        }
        result
    }

    /// Ask the provider to email a password-reset link.
    #[instrument(skip(self, email))]
    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ClientError> {
        self.provider
            .reset_password_for_email(email, redirect_to)
            .await
    }

    fn begin(&self, session: Option<Session>) -> Invocation {
        let user_id = session.as_ref().map(|session| session.user.id);
        let seq = self.store.begin(session);
        Invocation { seq, user_id }
    }

    async fn finish(&self, invocation: Invocation) -> bool {
        let update = match invocation.user_id {
            None => Some(None),
            Some(user_id) => match self.fetch_profile(user_id).await {
                ProfileFetch::Found(profile) => Some(Some(profile)),
                ProfileFetch::Missing => Some(None),
                // A failed refresh keeps the same user's profile but never another user's.
                ProfileFetch::Failed => {
                    let same_user = self
                        .store
                        .snapshot()
                        .profile
                        .is_some_and(|profile| profile.id == user_id);
                    if same_user { None } else { Some(None) }
                }
            },
        };

        let applied = self.store.complete(invocation.seq, update);
        if !applied {
            debug!(seq = invocation.seq, "Discarding superseded auth invocation");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::LocalIdentityProvider;
    use crate::models::{AuthEvent, Identity, Role};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct ScriptedProfiles {
        rows: Mutex<HashMap<Uuid, Result<Option<Profile>, String>>>,
        gates: Mutex<HashMap<Uuid, oneshot::Receiver<()>>>,
    }

    impl ScriptedProfiles {
        fn set(&self, user_id: Uuid, row: Result<Option<Profile>, String>) {
            self.rows.lock().unwrap().insert(user_id, row);
        }

        fn gate(&self, user_id: Uuid) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(user_id, rx);
            tx
        }
    }

    #[async_trait]
    impl ProfileSource for ScriptedProfiles {
        async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ClientError> {
            let gate = self.gates.lock().unwrap().remove(&user_id);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            match self.rows.lock().unwrap().get(&user_id).cloned() {
                Some(Ok(profile)) => Ok(profile),
                Some(Err(message)) => Err(ClientError::Storage(message)),
                None => Ok(None),
            }
        }
    }

    fn session_for(user_id: Uuid) -> Session {
        Session {
            user: Identity {
                id: user_id,
                email: Some(format!("{user_id}@example.com")),
            },
            access_token: "header.e30.sig".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    fn profile_for(user_id: Uuid, role: Role) -> Profile {
        Profile {
            id: user_id,
            email: format!("{user_id}@example.com"),
            role,
            company_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn controller(
        session: Option<Session>,
        profiles: Arc<ScriptedProfiles>,
    ) -> (Arc<AuthController>, LocalIdentityProvider) {
        let provider = LocalIdentityProvider::new(session);
        let controller = AuthController::new(
            Arc::new(provider.clone()),
            profiles,
            SessionStore::new(),
        );
        (Arc::new(controller), provider)
    }

    #[tokio::test]
    async fn initialize_without_session_finishes_loading() {
        let (controller, _) = controller(None, Arc::new(ScriptedProfiles::default()));
        assert!(controller.state().loading);

        assert!(controller.initialize().await);
        let state = controller.state();
        assert!(!state.loading);
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn loading_stays_true_until_profile_resolves() {
        let user_id = Uuid::new_v4();
        let profiles = Arc::new(ScriptedProfiles::default());
        profiles.set(user_id, Ok(Some(profile_for(user_id, Role::Company))));
        let release = profiles.gate(user_id);
        let (controller, _) = controller(Some(session_for(user_id)), profiles);

        let init = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.initialize().await })
        };
        tokio::task::yield_now().await;

        let state = controller.state();
        assert!(state.is_authenticated());
        assert!(state.loading);
        assert!(state.profile.is_none());

        release.send(()).unwrap();
        assert!(init.await.unwrap());

        let state = controller.state();
        assert!(!state.loading);
        assert!(state.is_company());
    }

    #[tokio::test]
    async fn missing_profile_is_authenticated_without_role() {
        let user_id = Uuid::new_v4();
        let (controller, _) = controller(
            Some(session_for(user_id)),
            Arc::new(ScriptedProfiles::default()),
        );

        controller.initialize().await;
        let state = controller.state();
        assert!(state.is_authenticated());
        assert!(state.profile.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn storage_failure_does_not_leak_previous_users_profile() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let profiles = Arc::new(ScriptedProfiles::default());
        profiles.set(first, Ok(Some(profile_for(first, Role::Admin))));
        profiles.set(second, Err("connection reset".to_string()));
        let (controller, _) = controller(None, Arc::clone(&profiles));

        controller
            .handle_auth_state_change(AuthChange::new(AuthEvent::SignedIn, Some(session_for(first))))
            .await;
        assert!(controller.state().is_admin());

        // Same user refresh failing keeps the profile
        profiles.set(first, Err("timeout".to_string()));
        controller
            .handle_auth_state_change(AuthChange::new(
                AuthEvent::TokenRefreshed,
                Some(session_for(first)),
            ))
            .await;
        assert!(controller.state().is_admin());

        controller
            .handle_auth_state_change(AuthChange::new(AuthEvent::SignedIn, Some(session_for(second))))
            .await;
        let state = controller.state();
        assert!(state.is_authenticated());
        assert!(state.profile.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn superseded_invocation_is_discarded() {
        let slow_user = Uuid::new_v4();
        let fast_user = Uuid::new_v4();
        let profiles = Arc::new(ScriptedProfiles::default());
        profiles.set(slow_user, Ok(Some(profile_for(slow_user, Role::Agent))));
        profiles.set(fast_user, Ok(Some(profile_for(fast_user, Role::Company))));
        let release = profiles.gate(slow_user);
        let (controller, _) = controller(None, profiles);

        let slow = controller.begin(Some(session_for(slow_user)));
        let slow_task = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.finish(slow).await })
        };

        assert!(
            controller
                .handle_auth_state_change(AuthChange::new(
                    AuthEvent::SignedIn,
                    Some(session_for(fast_user))
                ))
                .await
        );

        release.send(()).unwrap();
        assert!(!slow_task.await.unwrap());

        let state = controller.state();
        assert_eq!(state.user().map(|user| user.id), Some(fast_user));
        assert!(state.is_company());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn sign_out_clears_state_even_while_loading() {
        let user_id = Uuid::new_v4();
        let profiles = Arc::new(ScriptedProfiles::default());
        profiles.set(user_id, Ok(Some(profile_for(user_id, Role::Agent))));
        let release = profiles.gate(user_id);
        let (controller, _) = controller(Some(session_for(user_id)), profiles);

        let init = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.initialize().await })
        };
        tokio::task::yield_now().await;
        assert!(controller.state().loading);

        controller.sign_out().await.unwrap();
        release.send(()).unwrap();
        assert!(!init.await.unwrap());

        let state = controller.state();
        assert!(!state.is_authenticated());
        assert!(state.profile.is_none());
        assert!(!state.loading);
    }

    /// Provider whose sign-out call is rejected.
    struct RejectingSignOut(LocalIdentityProvider);

    #[async_trait]
    impl IdentityProvider for RejectingSignOut {
        async fn get_session(&self) -> Result<Option<Session>, ClientError> {
            self.0.get_session().await
        }

        fn on_auth_state_change(&self) -> tokio::sync::broadcast::Receiver<AuthChange> {
            self.0.on_auth_state_change()
        }

        async fn sign_out(&self) -> Result<(), ClientError> {
            Err(ClientError::Identity("session_not_found".to_string()))
        }

        async fn reset_password_for_email(
            &self,
            email: &str,
            redirect_to: &str,
        ) -> Result<(), ClientError> {
            self.0.reset_password_for_email(email, redirect_to).await
        }
    }

    #[tokio::test]
    async fn rejected_sign_out_still_clears_local_state() {
        let user_id = Uuid::new_v4();
        let profiles = Arc::new(ScriptedProfiles::default());
        profiles.set(user_id, Ok(Some(profile_for(user_id, Role::Company))));
        let controller = AuthController::new(
            Arc::new(RejectingSignOut(LocalIdentityProvider::new(Some(
                session_for(user_id),
            )))),
            profiles,
            SessionStore::new(),
        );
        assert!(controller.initialize().await);
        assert!(controller.state().is_company());

        let err = controller.sign_out().await.unwrap_err();
        assert!(matches!(err, ClientError::Identity(_)));

        let state = controller.state();
        assert!(!state.is_authenticated());
        assert!(state.profile.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn listener_applies_provider_events() {
        let user_id = Uuid::new_v4();
        let profiles = Arc::new(ScriptedProfiles::default());
        profiles.set(user_id, Ok(Some(profile_for(user_id, Role::Agent))));
        let (controller, provider) = controller(None, profiles);

        let _listener = controller.start().await;
        let mut rx = controller.store().subscribe();

        provider.emit(AuthEvent::SignedIn, Some(session_for(user_id)));
        let state = rx
            .wait_for(|state| !state.loading && state.profile.is_some())
            .await
            .unwrap()
            .clone();
        assert!(state.is_agent());

        provider.emit(AuthEvent::SignedOut, None);
        let state = rx
            .wait_for(|state| !state.loading && !state.is_authenticated())
            .await
            .unwrap()
            .clone();
        assert!(state.profile.is_none());
    }

    #[tokio::test]
    async fn password_reset_is_delegated() {
        let (controller, provider) = controller(None, Arc::new(ScriptedProfiles::default()));
        controller
            .request_password_reset("user@example.com", "https://app.example.com/auth/reset")
            .await
            .unwrap();

        assert_eq!(
            provider.reset_requests(),
            vec![(
                "user@example.com".to_string(),
                "https://app.example.com/auth/reset".to_string()
            )]
        );
    }
}
