//! # Domain Data Hooks
//!
//! Tenant-scoped reads with a realtime invalidation feed, plus the create
//! mutations for campaigns and digital twins.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::cache::{QueryCache, QueryKey};
use crate::error::ClientError;
use crate::models::TenantRow;
use crate::session_store::SessionStore;
use crate::store::{ChangeFeed, ChangeFilter, RelationalStore, fetch_company_rows};

pub mod campaigns;
pub mod digital_twins;

pub use campaigns::Campaigns;
pub use digital_twins::DigitalTwins;

/// Read side shared by the domain hooks.
pub struct TenantQuery<T: TenantRow> {
    store: Arc<dyn RelationalStore>,
    feed: Arc<dyn ChangeFeed>,
    cache: QueryCache<Vec<T>>,
    session: SessionStore,
    _row: PhantomData<fn() -> T>,
}

impl<T: TenantRow> Clone for TenantQuery<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            feed: Arc::clone(&self.feed),
            cache: self.cache.clone(),
            session: self.session.clone(),
            _row: PhantomData,
        }
    }
}

impl<T: TenantRow> TenantQuery<T> {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        feed: Arc<dyn ChangeFeed>,
        cache: QueryCache<Vec<T>>,
        session: SessionStore,
    ) -> Self {
        Self {
            store,
            feed,
            cache,
            session,
            _row: PhantomData,
        }
    }

    /// Key for the current tenant.
    pub fn key(&self) -> QueryKey {
        QueryKey::new(T::QUERY_KEY, self.session.company_id())
    }

    /// Reads are disabled until the profile carries a company.
    pub fn enabled(&self) -> bool {
        self.session.company_id().is_some()
    }

    pub fn cache(&self) -> &QueryCache<Vec<T>> {
        &self.cache
    }

    pub fn cached(&self) -> Option<Vec<T>> {
        self.cache.get(&self.key())
    }

    /// Rows for the current tenant, newest first. Served from cache unless
    /// invalidated; empty without a network call when no company is known.
    #[instrument(skip(self), fields(entity = T::QUERY_KEY))]
    pub async fn fetch(&self) -> Result<Vec<T>, ClientError> {
        let Some(company_id) = self.session.company_id() else {
            debug!("No company on profile; query disabled");
            return Ok(Vec::new());
        };

        let key = QueryKey::new(T::QUERY_KEY, Some(company_id));
        if let Some(rows) = self.cache.get_fresh(&key) {
            return Ok(rows);
        }

        let ticket = self.cache.begin_fetch(&key);
        let rows: Vec<T> = fetch_company_rows(self.store.as_ref(), company_id).await?;
        if self.cache.finish_fetch(ticket, rows.clone()) {
            Ok(rows)
        } else {
            // An optimistic write superseded this read
            Ok(self.cache.get(&key).unwrap_or(rows))
        }
    }

    /// Subscribe to row changes for the current tenant and invalidate on each.
    /// Returns `None` while no company is known. Dropping the guard unsubscribes.
    pub fn watch(&self) -> Option<RealtimeGuard> {
        let company_id = self.session.company_id()?;
        let key = QueryKey::new(T::QUERY_KEY, Some(company_id));
        let channel = format!("{}_changes", T::TABLE);
        let mut subscription = self
            .feed
            .subscribe(&channel, ChangeFilter::new(T::TABLE, company_id));
        let cache = self.cache.clone();

        let task = tokio::spawn(async move {
            while let Some(notice) = subscription.next().await {
                debug!(?notice, "Row change received");
                cache.invalidate(&key);
            }
        });

        Some(RealtimeGuard { task })
    }
}

/// Live realtime subscription; aborted on drop.
#[derive(Debug)]
pub struct RealtimeGuard {
    task: JoinHandle<()>,
}

impl Drop for RealtimeGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}
