//! Payment endpoints of the application backend.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiClient;
use crate::error::ClientError;

/// Kind of connected account being onboarded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Agent,
    Company,
}

/// Body of `POST /api/stripe/create-checkout-session`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub campaign_id: String,
    pub agent_id: String,
    /// Amount in cents
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionResponse {
    pub checkout_url: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of `POST /api/stripe/create-connect-account`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectAccountRequest {
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectAccountResponse {
    pub account_id: String,
    #[serde(default, rename = "type")]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /api/stripe/create-account-link`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountLinkRequest {
    pub account_id: String,
    pub refresh_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountLinkResponse {
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl ApiClient {
    #[instrument(skip_all, fields(campaign_id = %request.campaign_id, amount = request.amount))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSessionResponse, ClientError> {
        self.post("/api/stripe/create-checkout-session", request)
            .await
    }

    #[instrument(skip_all, fields(account_type = ?request.account_type))]
    pub async fn create_connect_account(
        &self,
        request: &ConnectAccountRequest,
    ) -> Result<ConnectAccountResponse, ClientError> {
        self.post("/api/stripe/create-connect-account", request)
            .await
    }

    #[instrument(skip_all, fields(account_id = %request.account_id))]
    pub async fn create_account_link(
        &self,
        request: &AccountLinkRequest,
    ) -> Result<AccountLinkResponse, ClientError> {
        self.post("/api/stripe/create-account-link", request).await
    }
}
