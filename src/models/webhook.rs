use serde::{Deserialize, Serialize};

use super::WebhookEventSyncType;

/// Endpoint registered by an app for one or more sync events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub app_id: i64,
    pub name: String,
    pub target_url: String,
    /// HMAC key for the `X-Webhook-Signature` header. Never serialized.
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// When set, payloads are projected through this subscription query
    /// instead of using the static shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_query: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebhook {
    pub app_id: i64,
    pub name: String,
    pub target_url: String,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub subscription_query: Option<String>,
    pub events: Vec<WebhookEventSyncType>,
}
