//! # Payments
//!
//! Redirect-based onboarding and checkout. The backend creates the processor
//! objects; the client only obtains a URL to send the browser to. Completion of
//! onboarding is detected from the `onboarding=complete` query parameter on the
//! return URL.

use tracing::{info, instrument, warn};
use url::Url;

use crate::api::{
    AccountLinkRequest, AccountType, ApiClient, CheckoutSessionRequest, ConnectAccountRequest,
};
use crate::config::AppConfig;
use crate::error::ClientError;

const ONBOARDING_PARAM: &str = "onboarding";
const ONBOARDING_COMPLETE: &str = "complete";

/// Convert a dollar amount to whole cents, rounding half away from zero.
pub fn dollars_to_cents(amount: f64) -> u64 {
    (amount * 100.0).round().max(0.0) as u64
}

/// Whether the page was reached through the onboarding return redirect.
pub fn onboarding_completed(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, value)| key == ONBOARDING_PARAM && value == ONBOARDING_COMPLETE)
}

/// `current` with `onboarding=complete` appended.
pub fn onboarding_return_url(current: &Url) -> Url {
    let mut url = current.clone();
    url.query_pairs_mut()
        .append_pair(ONBOARDING_PARAM, ONBOARDING_COMPLETE);
    url
}

#[derive(Debug, Clone)]
pub struct Payments {
    api: ApiClient,
    enabled: bool,
}

impl Payments {
    pub fn new(api: ApiClient, enabled: bool) -> Self {
        Self { api, enabled }
    }

    pub fn from_config(config: &AppConfig, api: ApiClient) -> Self {
        let enabled = config.payments_enabled();
        if !enabled {
            warn!("Payment publishable key not found; payment features are disabled");
        }
        Self::new(api, enabled)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn ensure_enabled(&self) -> Result<(), ClientError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ClientError::PaymentsDisabled)
        }
    }

    /// Create a connected account and return the onboarding URL to redirect to.
    /// `current` is the page the user returns to.
    #[instrument(skip(self, email, current))]
    pub async fn start_connect_onboarding(
        &self,
        account_type: AccountType,
        email: &str,
        current: &Url,
    ) -> Result<Url, ClientError> {
        self.ensure_enabled()?;

        let account = self
            .api
            .create_connect_account(&ConnectAccountRequest {
                account_type,
                email: email.to_string(),
            })
            .await
            .map_err(|err| err.with_failure_message("Failed to create Stripe account"))?;

        let link = self
            .api
            .create_account_link(&AccountLinkRequest {
                account_id: account.account_id.clone(),
                refresh_url: current.to_string(),
                return_url: onboarding_return_url(current).to_string(),
            })
            .await
            .map_err(|err| err.with_failure_message("Failed to create onboarding link"))?;

        info!(account_id = %account.account_id, "Onboarding link created");
        Ok(Url::parse(&link.url)?)
    }

    /// Open a checkout session for paying `agent_id` on `campaign_id`.
    #[instrument(skip(self))]
    pub async fn start_checkout(
        &self,
        campaign_id: &str,
        agent_id: &str,
        amount_dollars: f64,
    ) -> Result<Url, ClientError> {
        self.ensure_enabled()?;

        let session = self
            .api
            .create_checkout_session(&CheckoutSessionRequest {
                campaign_id: campaign_id.to_string(),
                agent_id: agent_id.to_string(),
                amount: dollars_to_cents(amount_dollars),
            })
            .await
            .map_err(|err| err.with_failure_message("Failed to create checkout session"))?;

        Ok(Url::parse(&session.checkout_url)?)
    }
}
