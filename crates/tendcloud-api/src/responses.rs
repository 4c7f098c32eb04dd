//! Response types for the status API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pass::PassResult;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Most recent pass, if any has finished yet
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LastPassResponse {
    /// Whether a pass is running right now
    pub in_flight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PassResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TriggerResponse {
    /// False when another pass was already running
    pub started: bool,
}
