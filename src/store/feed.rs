//! Realtime change feed.
//!
//! A subscription is filtered by table and `company_id` and is torn down when
//! dropped. [`LocalChangeFeed`] fans changes out in-process; a websocket
//! transport would publish into the same shape.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::models::CompanyId;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
}

/// One row-level change
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub table: String,
    pub event: ChangeEvent,
    pub company_id: Option<CompanyId>,
    pub record: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    pub company_id: CompanyId,
}

impl ChangeFilter {
    pub fn new(table: impl Into<String>, company_id: CompanyId) -> Self {
        Self {
            table: table.into(),
            company_id,
        }
    }

    pub fn matches(&self, change: &RowChange) -> bool {
        change.table == self.table && change.company_id == Some(self.company_id)
    }
}

/// What a subscriber observes
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotice {
    Changed(RowChange),
    /// Changes were dropped; treat everything as stale
    Lagged(u64),
}

pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, channel: &str, filter: ChangeFilter) -> ChangeSubscription;
}

pub struct ChangeSubscription {
    channel: String,
    filter: ChangeFilter,
    rx: broadcast::Receiver<RowChange>,
}

impl ChangeSubscription {
    pub fn new(channel: impl Into<String>, filter: ChangeFilter, rx: broadcast::Receiver<RowChange>) -> Self {
        let channel = channel.into();
        debug!(%channel, table = %filter.table, company_id = %filter.company_id, "Subscribed to changes");
        Self { channel, filter, rx }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next matching change; `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeNotice> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.filter.matches(&change) => {
                    return Some(ChangeNotice::Changed(change));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Change feed lagged");
                    return Some(ChangeNotice::Lagged(skipped));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        debug!(channel = %self.channel, "Removing change channel");
    }
}

#[derive(Debug, Clone)]
pub struct LocalChangeFeed {
    tx: broadcast::Sender<RowChange>,
}

impl Default for LocalChangeFeed {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }
}

impl LocalChangeFeed {
    /// Deliver a change; returns the number of live subscriptions.
    pub fn publish(&self, change: RowChange) -> usize {
        self.tx.send(change).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangeFeed for LocalChangeFeed {
    fn subscribe(&self, channel: &str, filter: ChangeFilter) -> ChangeSubscription {
        ChangeSubscription::new(channel, filter, self.tx.subscribe())
    }
}
