use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{APP_COLS, EVENT_DELIVERY_COLS, WEBHOOK_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Apps ============

pub fn create_app(conn: &Connection, input: &CreateApp) -> Result<App> {
    let now = now();
    conn.execute(
        "INSERT INTO apps (identifier, name, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
        params![&input.identifier, &input.name, now],
    )?;

    Ok(App {
        id: conn.last_insert_rowid(),
        identifier: input.identifier.clone(),
        name: input.name.clone(),
        is_active: true,
        created_at: now,
    })
}

pub fn get_app_by_id(conn: &Connection, id: i64) -> Result<Option<App>> {
    query_one(
        conn,
        &format!("SELECT {} FROM apps WHERE id = ?1", APP_COLS),
        &[&id],
    )
}

pub fn get_app_by_identifier(conn: &Connection, identifier: &str) -> Result<Option<App>> {
    query_one(
        conn,
        &format!("SELECT {} FROM apps WHERE identifier = ?1", APP_COLS),
        &[&identifier],
    )
}

pub fn set_app_active(conn: &Connection, id: i64, is_active: bool) -> Result<()> {
    let affected = conn.execute(
        "UPDATE apps SET is_active = ?1 WHERE id = ?2",
        params![is_active as i32, id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("app {}", id)));
    }
    Ok(())
}

// ============ Webhooks ============

/// Create a webhook together with its event subscriptions.
pub fn create_webhook(conn: &Connection, input: &CreateWebhook) -> Result<Webhook> {
    if input.events.is_empty() {
        return Err(AppError::BadRequest(
            "webhook must subscribe to at least one event".into(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO webhooks (app_id, name, target_url, secret_key, subscription_query, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![
            input.app_id,
            &input.name,
            &input.target_url,
            &input.secret_key,
            &input.subscription_query,
            now()
        ],
    )?;
    let id = tx.last_insert_rowid();

    for event in &input.events {
        tx.execute(
            "INSERT OR IGNORE INTO webhook_events (webhook_id, event_type) VALUES (?1, ?2)",
            params![id, event.as_str()],
        )?;
    }
    tx.commit()?;

    Ok(Webhook {
        id,
        app_id: input.app_id,
        name: input.name.clone(),
        target_url: input.target_url.clone(),
        secret_key: input.secret_key.clone(),
        subscription_query: input.subscription_query.clone(),
        is_active: true,
    })
}

pub fn set_webhook_subscription_query(
    conn: &Connection,
    webhook_id: i64,
    subscription_query: Option<&str>,
) -> Result<()> {
    let affected = conn.execute(
        "UPDATE webhooks SET subscription_query = ?1 WHERE id = ?2",
        params![subscription_query, webhook_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("webhook {}", webhook_id)));
    }
    Ok(())
}

pub fn set_webhook_active(conn: &Connection, webhook_id: i64, is_active: bool) -> Result<()> {
    let affected = conn.execute(
        "UPDATE webhooks SET is_active = ?1 WHERE id = ?2",
        params![is_active as i32, webhook_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("webhook {}", webhook_id)));
    }
    Ok(())
}

/// Active webhooks of one app that subscribe to `event_type`, oldest first.
pub fn get_active_webhooks_for_app_event(
    conn: &Connection,
    app_id: i64,
    event_type: WebhookEventSyncType,
) -> Result<Vec<Webhook>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhooks w
             JOIN webhook_events e ON e.webhook_id = w.id
             WHERE w.app_id = ?1 AND e.event_type = ?2 AND w.is_active = 1
             ORDER BY w.id",
            WEBHOOK_COLS
        ),
        &[&app_id, &event_type.as_str()],
    )
}

/// Active webhooks of active apps that subscribe to `event_type`, oldest first.
pub fn get_active_webhooks_for_event(
    conn: &Connection,
    event_type: WebhookEventSyncType,
) -> Result<Vec<Webhook>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhooks w
             JOIN webhook_events e ON e.webhook_id = w.id
             JOIN apps a ON a.id = w.app_id
             WHERE e.event_type = ?1 AND w.is_active = 1 AND a.is_active = 1
             ORDER BY w.id",
            WEBHOOK_COLS
        ),
        &[&event_type.as_str()],
    )
}

// ============ Event Deliveries ============

/// Append a delivery record. Rows are never updated afterwards.
pub fn create_event_delivery(
    conn: &Connection,
    event_type: WebhookEventSyncType,
    webhook_id: i64,
    payload: &str,
) -> Result<EventDelivery> {
    let id = EntityType::EventDelivery.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO event_deliveries (id, event_type, webhook_id, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, event_type.as_str(), webhook_id, payload, now],
    )?;

    Ok(EventDelivery {
        id,
        event_type,
        webhook_id,
        payload: payload.to_string(),
        created_at: now,
    })
}

pub fn get_event_delivery(conn: &Connection, id: &str) -> Result<Option<EventDelivery>> {
    query_one(
        conn,
        &format!("SELECT {} FROM event_deliveries WHERE id = ?1", EVENT_DELIVERY_COLS),
        &[&id],
    )
}

/// Most recent delivery for an event type. Insertion order breaks timestamp ties.
pub fn get_latest_event_delivery(
    conn: &Connection,
    event_type: WebhookEventSyncType,
) -> Result<Option<EventDelivery>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM event_deliveries WHERE event_type = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            EVENT_DELIVERY_COLS
        ),
        &[&event_type.as_str()],
    )
}

/// Newest first. `None` lists every event type.
pub fn list_event_deliveries(
    conn: &Connection,
    event_type: Option<WebhookEventSyncType>,
    limit: i64,
) -> Result<Vec<EventDelivery>> {
    match event_type {
        Some(event_type) => query_all(
            conn,
            &format!(
                "SELECT {} FROM event_deliveries WHERE event_type = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                EVENT_DELIVERY_COLS
            ),
            &[&event_type.as_str(), &limit],
        ),
        None => query_all(
            conn,
            &format!(
                "SELECT {} FROM event_deliveries
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                EVENT_DELIVERY_COLS
            ),
            &[&limit],
        ),
    }
}

pub fn count_event_deliveries(conn: &Connection, event_type: WebhookEventSyncType) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM event_deliveries WHERE event_type = ?1",
        params![event_type.as_str()],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Purge deliveries beyond the retention period.
/// Returns the number of deleted records.
pub fn purge_old_event_deliveries(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now().saturating_sub(retention_days.saturating_mul(86400));
    let deleted = conn.execute(
        "DELETE FROM event_deliveries WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
