//! Root composition point.
//!
//! Owns the session and UI stores and hands them to every controller and hook.
//! Nothing in the crate reaches for process-wide state.

use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::auth::{AuthController, AuthListener, IdentityProvider, RouteGuard};
use crate::cache::QueryCache;
use crate::config::AppConfig;
use crate::error::ClientError;
use crate::hooks::{Campaigns, DigitalTwins, TenantQuery};
use crate::jobs::PollPolicy;
use crate::payments::Payments;
use crate::session_store::SessionStore;
use crate::store::{ChangeFeed, ProfileRepository, RelationalStore};
use crate::ui_store::UiStore;

pub struct AppContext {
    pub config: AppConfig,
    pub session: SessionStore,
    pub ui: UiStore,
    pub auth: Arc<AuthController>,
    pub guard: RouteGuard,
    pub api: ApiClient,
    pub campaigns: Campaigns,
    pub digital_twins: DigitalTwins,
    pub payments: Payments,
}

impl AppContext {
    /// `session` must be the store the relational store reads its bearer token from.
    pub fn new(
        config: AppConfig,
        session: SessionStore,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn RelationalStore>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Result<Self, ClientError> {
        let profiles = Arc::new(ProfileRepository::new(Arc::clone(&store)));
        let auth = Arc::new(AuthController::new(identity, profiles, session.clone()));
        let api = ApiClient::from_config(&config, session.clone())?;

        let campaigns = Campaigns::new(
            TenantQuery::new(
                Arc::clone(&store),
                Arc::clone(&feed),
                QueryCache::with_capacity(config.query_cache_capacity),
                session.clone(),
            ),
            api.clone(),
            session.clone(),
        );
        let digital_twins = DigitalTwins::new(
            TenantQuery::new(
                store,
                feed,
                QueryCache::with_capacity(config.query_cache_capacity),
                session.clone(),
            ),
            api.clone(),
            session.clone(),
        );

        Ok(Self {
            guard: RouteGuard::from_config(&config),
            payments: Payments::from_config(&config, api.clone()),
            ui: UiStore::default(),
            session,
            auth,
            api,
            campaigns,
            digital_twins,
            config,
        })
    }

    /// Start listening for auth changes and load the initial session.
    pub async fn start(&self) -> AuthListener {
        let listener = self.auth.start().await;
        let state = self.session.snapshot();
        info!(
            authenticated = state.is_authenticated(),
            role = state.profile_role().map(|role| role.as_str()),
            "Client context started"
        );
        listener
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from(&self.config.job_poll)
    }
}
