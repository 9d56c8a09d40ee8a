//! Shared fixtures: minted access tokens and a client context wired to a mock backend.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use reelagents::auth::{AuthListener, LocalIdentityProvider, session_from_token};
use reelagents::config::{AppConfig, JobPollConfig};
use reelagents::context::AppContext;
use reelagents::models::{CompanyId, Role};
use reelagents::session_store::SessionStore;
use reelagents::store::{LocalChangeFeed, PostgrestStore};
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ANON_KEY: &str = "anon-test-key";

/// HS256 token shaped like the identity provider's, role in `user_metadata`.
pub fn mint_token(user_id: Uuid, role: Option<&str>) -> String {
    let claims = json!({
        "sub": user_id.to_string(),
        "email": "user@reelagents.test",
        "exp": 4_102_444_800i64,
        "role": "authenticated",
        "user_metadata": role.map(|role| json!({ "role": role })).unwrap_or_else(|| json!({})),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-signing-secret"),
    )
    .unwrap()
}

pub fn profile_row(user_id: Uuid, role: Role, company_id: Option<CompanyId>) -> Value {
    json!({
        "id": user_id,
        "email": "user@reelagents.test",
        "role": role.as_str(),
        "company_id": company_id,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    })
}

pub fn twin_row(id: &str, company_id: CompanyId, created_at: &str) -> Value {
    json!({
        "id": id,
        "company_id": company_id,
        "agent_id": null,
        "name": format!("Twin {id}"),
        "description": "",
        "status": "active",
        "training_data_url": "s3://bucket/data.zip",
        "model_endpoint": null,
        "created_at": created_at,
        "updated_at": created_at,
    })
}

pub fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        api_base_url: server.uri(),
        supabase_url: Some(server.uri()),
        supabase_anon_key: Some(ANON_KEY.to_string()),
        stripe_publishable_key: Some("pk_test_123".to_string()),
        http_timeout_ms: 5_000,
        job_poll: JobPollConfig {
            interval_ms: 100,
            max_attempts: Some(50),
        },
        ..AppConfig::default()
    }
}

pub struct SignedIn {
    pub context: AppContext,
    pub feed: Arc<LocalChangeFeed>,
    pub token: String,
    pub user_id: Uuid,
    _listener: AuthListener,
}

/// Context whose identity provider already holds a session for a user with
/// `role`; the profile row is served by the mock backend.
pub async fn signed_in(server: &MockServer, role: Role, company_id: Option<CompanyId>) -> SignedIn {
    let user_id = Uuid::new_v4();
    let token = mint_token(user_id, Some(role.as_str()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{user_id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile_row(user_id, role, company_id)])),
        )
        .mount(server)
        .await;

    let session = SessionStore::new();
    let store = PostgrestStore::new(
        &Url::parse(&server.uri()).unwrap(),
        ANON_KEY,
        session.clone(),
        Duration::from_secs(5),
    )
    .unwrap();
    let feed = Arc::new(LocalChangeFeed::default());
    let provider = LocalIdentityProvider::new(Some(session_from_token(&token).unwrap()));

    let context = AppContext::new(
        test_config(server),
        session,
        Arc::new(provider),
        Arc::new(store),
        feed.clone(),
    )
    .unwrap();
    let listener = context.start().await;

    SignedIn {
        context,
        feed,
        token,
        user_id,
        _listener: listener,
    }
}
