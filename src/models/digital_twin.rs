//! Digital twin rows, create payloads and optimistic placeholders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CompanyId, TenantRow};

/// Prefix of ids synthesized for optimistic rows
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TwinStatus {
    Pending,
    Training,
    Active,
    Failed,
}

/// Row of the `digital_twins` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigitalTwin {
    pub id: String,
    pub company_id: CompanyId,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TwinStatus,
    #[serde(default)]
    pub training_data_url: Option<String>,
    #[serde(default)]
    pub model_endpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRow for DigitalTwin {
    const TABLE: &'static str = "digital_twins";
    const QUERY_KEY: &'static str = "digitalTwins";
}

impl DigitalTwin {
    /// Placeholder shown until the server confirms the create.
    pub fn optimistic(input: &NewDigitalTwin, company_id: CompanyId, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()),
            company_id,
            agent_id: None,
            name: input.name.clone(),
            description: Some(input.description.clone().unwrap_or_default()),
            status: TwinStatus::Pending,
            training_data_url: Some(input.training_data_url.clone()),
            model_endpoint: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Form input for a new digital twin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDigitalTwin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub training_data_url: String,
}

/// Body of `POST /api/digital-twins/create`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateDigitalTwinRequest {
    #[serde(flatten)]
    pub twin: NewDigitalTwin,
    pub company_id: CompanyId,
}

/// Training is asynchronous; the job id is polled for completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateDigitalTwinResponse {
    pub job_id: String,
    pub digital_twin_id: String,
}
