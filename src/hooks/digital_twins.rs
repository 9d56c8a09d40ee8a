//! Digital twin list and optimistic create.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use super::{RealtimeGuard, TenantQuery};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::jobs::{AsyncOperation, JobStatusSource, OperationOutcome, PollPolicy};
use crate::models::{CreateDigitalTwinRequest, CreateDigitalTwinResponse, DigitalTwin, NewDigitalTwin};
use crate::session_store::SessionStore;

#[derive(Clone)]
pub struct DigitalTwins {
    query: TenantQuery<DigitalTwin>,
    api: ApiClient,
    session: SessionStore,
}

impl DigitalTwins {
    pub fn new(query: TenantQuery<DigitalTwin>, api: ApiClient, session: SessionStore) -> Self {
        Self { query, api, session }
    }

    pub fn query(&self) -> &TenantQuery<DigitalTwin> {
        &self.query
    }

    pub async fn list(&self) -> Result<Vec<DigitalTwin>, ClientError> {
        self.query.fetch().await
    }

    pub fn watch(&self) -> Option<RealtimeGuard> {
        self.query.watch()
    }

    /// Create a twin, showing a pending placeholder at the top of the list
    /// until the server answers. A rejected create restores the list exactly;
    /// either way the list is invalidated afterwards.
    #[instrument(skip_all, fields(name = %twin.name))]
    pub async fn create(&self, twin: NewDigitalTwin) -> Result<CreateDigitalTwinResponse, ClientError> {
        let company_id = self
            .session
            .company_id()
            .ok_or(ClientError::CompanyIdNotFound)?;
        let key = self.query.key();
        let cache = self.query.cache();

        cache.cancel(&key);
        let placeholder = DigitalTwin::optimistic(&twin, company_id, Utc::now());
        let snapshot = cache.update(key, |previous| {
            let mut rows = Vec::with_capacity(previous.as_ref().map_or(0, Vec::len) + 1);
            rows.push(placeholder);
            rows.extend(previous.unwrap_or_default());
            rows
        });

        let request = CreateDigitalTwinRequest { twin, company_id };
        let result = self.api.create_digital_twin(&request).await;

        match &result {
            Ok(response) => {
                info!(job_id = %response.job_id, digital_twin_id = %response.digital_twin_id, "Digital twin training started");
            }
            Err(err) => {
                warn!(error = %err, %company_id, "Digital twin create rejected; rolling back");
                cache.restore(key, snapshot);
            }
        }
        cache.invalidate(&key);
        result
    }

    /// Create a twin and poll its training job to completion.
    pub fn training(&self, policy: PollPolicy) -> AsyncOperation<NewDigitalTwin, JsonValue> {
        let hooks = self.clone();
        let jobs: Arc<dyn JobStatusSource> = Arc::new(self.api.clone());
        AsyncOperation::builder(
            move |twin: NewDigitalTwin| {
                let hooks = hooks.clone();
                async move { hooks.create(twin).await.map(OperationOutcome::from) }
            },
            jobs,
        )
        .poll_policy(policy)
        .build()
    }
}
