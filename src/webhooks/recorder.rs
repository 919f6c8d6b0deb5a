use serde_json::Value;

use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::models::{EventDelivery, Webhook, WebhookEventSyncType};

/// Persist the exact payload about to be sent.
///
/// Must succeed before anything goes out on the wire: an error here aborts
/// the webhook call.
pub fn record_delivery(
    pool: &DbPool,
    webhook: &Webhook,
    event_type: WebhookEventSyncType,
    payload: &Value,
) -> Result<EventDelivery> {
    let body = serde_json::to_string(payload)?;
    let conn = pool.get()?;
    let delivery = queries::create_event_delivery(&conn, event_type, webhook.id, &body)?;

    tracing::debug!(
        delivery_id = %delivery.id,
        webhook_id = webhook.id,
        event_type = %event_type,
        "Recorded event delivery"
    );

    Ok(delivery)
}
