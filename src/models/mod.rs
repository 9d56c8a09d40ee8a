//! # Data Models
//!
//! Identity, profile, job, marketplace and tenant-scoped row types shared by
//! the client core.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod agent;
pub mod campaign;
pub mod digital_twin;
pub mod job;
pub mod profile;
pub mod session;

pub use agent::Agent;
pub use campaign::{Campaign, CampaignStatus, CreateCampaignRequest, CreateCampaignResponse, NewCampaign};
pub use digital_twin::{
    CreateDigitalTwinRequest, CreateDigitalTwinResponse, DigitalTwin, NewDigitalTwin, TwinStatus,
};
pub use job::{AsyncJob, JobStatus, JobStatusReport};
pub use profile::{Profile, Role};
pub use session::{AuthChange, AuthEvent, Identity, Session};

/// Company ID wrapper; the tenant scoping unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for CompanyId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Row of a table whose reads, writes and change feeds are filtered by `company_id`.
pub trait TenantRow: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name in the relational store
    const TABLE: &'static str;
    /// Cache key namespace for this row type
    const QUERY_KEY: &'static str;
    /// Column used for newest-first ordering
    const ORDER_COLUMN: &'static str = "created_at";
}
