//! # Relational Store
//!
//! Read access to the hosted relational store and its realtime change feed.
//! Rows are returned as JSON and decoded by the caller, so one store handle
//! serves every table.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::ClientError;
use crate::models::{CompanyId, TenantRow};

pub mod feed;
pub mod postgrest;
pub mod profiles;
pub mod query;

pub use feed::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeNotice, ChangeSubscription, LocalChangeFeed, RowChange};
pub use postgrest::PostgrestStore;
pub use profiles::ProfileRepository;
pub use query::RowQuery;

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Rows matching `query`. An empty result is not an error.
    async fn select(&self, query: &RowQuery) -> Result<Vec<JsonValue>, ClientError>;
}

/// Decode every row matching `query`.
pub async fn select_rows<T, S>(store: &S, query: &RowQuery) -> Result<Vec<T>, ClientError>
where
    T: DeserializeOwned,
    S: RelationalStore + ?Sized,
{
    store
        .select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(ClientError::from))
        .collect()
}

/// First row matching `query`; `Ok(None)` when nothing matches.
pub async fn select_single<T, S>(store: &S, query: &RowQuery) -> Result<Option<T>, ClientError>
where
    T: DeserializeOwned,
    S: RelationalStore + ?Sized,
{
    let query = query.clone().limit(1);
    let row = store.select(&query).await?.into_iter().next();
    Ok(row.map(serde_json::from_value).transpose()?)
}

/// All rows of `T` owned by `company_id`, newest first.
pub async fn fetch_company_rows<T, S>(store: &S, company_id: CompanyId) -> Result<Vec<T>, ClientError>
where
    T: TenantRow,
    S: RelationalStore + ?Sized,
{
    let query = RowQuery::from(T::TABLE)
        .eq("company_id", company_id)
        .order(T::ORDER_COLUMN, false);
    select_rows(store, &query).await
}
