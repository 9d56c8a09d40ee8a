//! # Session Store
//!
//! Holds the current session, profile and loading flag. Any component may read
//! or subscribe; only the auth controller mutates it (setters are crate-private).
//! Instances are context-passed from the root composition point, never global.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::token::parse_role_from_token;
use crate::models::{CompanyId, Identity, Profile, Role, Session};

/// Snapshot of auth state. Role predicates are recomputed on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub loading: bool,
    /// Sequence number of the auth invocation that last wrote this state
    pub(crate) seq: u64,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
            seq: 0,
        }
    }
}

impl AuthState {
    /// Detached snapshot, e.g. for evaluating guards outside a live store.
    pub fn new(session: Option<Session>, profile: Option<Profile>, loading: bool) -> Self {
        Self {
            session,
            profile,
            loading,
            seq: 0,
        }
    }

    pub fn user(&self) -> Option<&Identity> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn profile_role(&self) -> Option<Role> {
        self.profile.as_ref().map(|profile| profile.role)
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.profile.as_ref().and_then(|profile| profile.company_id)
    }

    pub fn is_company(&self) -> bool {
        self.profile_role() == Some(Role::Company)
    }

    pub fn is_agent(&self) -> bool {
        self.profile_role() == Some(Role::Agent)
    }

    pub fn is_admin(&self) -> bool {
        self.profile_role() == Some(Role::Admin)
    }

    /// Role claim decoded from the current access token
    pub fn token_role(&self) -> Option<String> {
        self.access_token().and_then(parse_role_from_token)
    }

    /// Profile role, falling back to the token claim when no profile is loaded
    pub fn effective_role(&self) -> Option<String> {
        self.profile_role()
            .map(|role| role.as_str().to_string())
            .or_else(|| self.token_role())
    }

    /// True if either the profile or the token claim carries `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.profile_role() == Some(role) || self.token_role().as_deref() == Some(role.as_str())
    }

    /// True if the effective role is one of `roles`; false when neither source has a role.
    pub fn can_access(&self, roles: &[Role]) -> bool {
        self.effective_role()
            .is_some_and(|current| roles.iter().any(|role| role.as_str() == current))
    }
}

/// Shared handle to the auth state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<AuthState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// New store in the initial `loading` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().access_token().map(str::to_string)
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.tx.borrow().company_id()
    }

    /// Start an auth invocation: claim the next sequence number, publish the
    /// new session and raise `loading`.
    pub(crate) fn begin(&self, session: Option<Session>) -> u64 {
        let mut seq = 0;
        self.tx.send_modify(|state| {
            state.seq += 1;
            seq = state.seq;
            state.session = session;
            state.loading = true;
        });
        seq
    }

    /// Finish invocation `seq`. Superseded invocations are discarded.
    ///
    /// `profile` is `Some(new)` to replace the profile wholesale, `None` to keep it.
    pub(crate) fn complete(&self, seq: u64, profile: Option<Option<Profile>>) -> bool {
        self.tx.send_if_modified(|state| {
            if state.seq != seq {
                return false;
            }
            if let Some(profile) = profile {
                state.profile = profile;
            }
            state.loading = false;
            true
        })
    }

    /// Drop session and profile immediately, superseding any in-flight invocation.
    pub(crate) fn clear(&self) {
        self.tx.send_modify(|state| {
            state.seq += 1;
            state.session = None;
            state.profile = None;
            state.loading = false;
        });
    }
}
