//! Agents offered in the campaign marketplace.

use serde::{Deserialize, Serialize};

/// Certified agent as listed for a campaign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub certification_status: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub completed_campaigns: Option<u32>,
    /// Dollars per hour
    #[serde(default)]
    pub hourly_rate: Option<f64>,
}

impl Agent {
    pub fn is_certified(&self) -> bool {
        self.certification_status == "certified"
    }
}
