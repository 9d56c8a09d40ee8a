//! Campaign rows and create payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CompanyId, TenantRow};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

/// Row of the `campaigns` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub budget: f64,
    pub status: CampaignStatus,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRow for Campaign {
    const TABLE: &'static str = "campaigns";
    const QUERY_KEY: &'static str = "campaigns";
}

/// Form input for a new campaign; the tenant is filled in from the profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCampaign {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub budget: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Body of `POST /api/campaigns/create`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateCampaignRequest {
    #[serde(flatten)]
    pub campaign: NewCampaign,
    pub company_id: CompanyId,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CreateCampaignResponse {
    pub campaign: Campaign,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn create_request_flattens_form_fields() {
        let company_id = CompanyId(Uuid::new_v4());
        let request = CreateCampaignRequest {
            campaign: NewCampaign {
                name: "Spring launch".to_string(),
                description: None,
                budget: 1500.0,
                target_audience: Some("SMB".to_string()),
                start_date: None,
                end_date: None,
            },
            company_id,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["name"], json!("Spring launch"));
        assert_eq!(body["company_id"], json!(company_id.to_string()));
        assert!(body.get("description").is_none());
    }
}
