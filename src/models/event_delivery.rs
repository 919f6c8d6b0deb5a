use serde::{Deserialize, Serialize};

use super::WebhookEventSyncType;

/// Immutable record of a payload handed to the dispatcher.
///
/// Written before the network call and never updated afterwards. Retries of
/// the same logical request produce new rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDelivery {
    pub id: String,
    pub event_type: WebhookEventSyncType,
    pub webhook_id: i64,
    /// Exact body sent to the endpoint.
    pub payload: String,
    pub created_at: i64,
}

impl EventDelivery {
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.payload)
    }
}
