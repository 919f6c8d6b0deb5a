//! Registry and delivery log queries

mod common;

use common::*;
use payhook::error::AppError;
use payhook::id::is_valid_prefixed_id;
use rusqlite::params;

const INITIALIZE: WebhookEventSyncType = WebhookEventSyncType::PaymentMethodInitializeTokenizationSession;
const LIST: WebhookEventSyncType = WebhookEventSyncType::ListStoredPaymentMethods;

// ============ App Tests ============

#[test]
fn test_create_and_get_app() {
    let pool = setup_test_pool();
    let created = create_test_app(&pool, APP_IDENTIFIER);
    let conn = pool.get().unwrap();

    let by_identifier = queries::get_app_by_identifier(&conn, APP_IDENTIFIER)
        .expect("Query failed")
        .expect("App not found");
    let by_id = queries::get_app_by_id(&conn, created.id)
        .expect("Query failed")
        .expect("App not found");

    assert_eq!(by_identifier, created);
    assert_eq!(by_id, created);
    assert!(created.is_active);
}

#[test]
fn test_duplicate_app_identifier_is_rejected() {
    let pool = setup_test_pool();
    create_test_app(&pool, APP_IDENTIFIER);
    let conn = pool.get().unwrap();

    let result = queries::create_app(
        &conn,
        &CreateApp {
            identifier: APP_IDENTIFIER.to_string(),
            name: "Duplicate".to_string(),
        },
    );

    assert!(matches!(result, Err(AppError::Database(_))));
}

#[test]
fn test_set_app_active_unknown_app() {
    let pool = setup_test_pool();
    let conn = pool.get().unwrap();

    let result = queries::set_app_active(&conn, 42, false);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ============ Webhook Tests ============

#[test]
fn test_webhook_requires_events() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let conn = pool.get().unwrap();

    let result = queries::create_webhook(
        &conn,
        &CreateWebhook {
            app_id: app.id,
            name: "empty".to_string(),
            target_url: TARGET_URL.to_string(),
            secret_key: None,
            subscription_query: None,
            events: Vec::new(),
        },
    );

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[test]
fn test_active_webhooks_filter_by_event_and_state() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let tokenization = create_test_webhook(&pool, &app, &[INITIALIZE], None);
    let list = create_test_webhook(&pool, &app, &[LIST, INITIALIZE], None);
    let conn = pool.get().unwrap();

    let found = queries::get_active_webhooks_for_app_event(&conn, app.id, INITIALIZE).unwrap();
    assert_eq!(
        found.iter().map(|w| w.id).collect::<Vec<_>>(),
        vec![tokenization.id, list.id]
    );

    queries::set_webhook_active(&conn, tokenization.id, false).unwrap();
    let found = queries::get_active_webhooks_for_app_event(&conn, app.id, INITIALIZE).unwrap();
    assert_eq!(found, vec![list.clone()]);

    let found = queries::get_active_webhooks_for_event(&conn, LIST).unwrap();
    assert_eq!(found, vec![list.clone()]);

    queries::set_app_active(&conn, app.id, false).unwrap();
    assert!(queries::get_active_webhooks_for_event(&conn, LIST).unwrap().is_empty());
}

#[test]
fn test_update_subscription_query() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let webhook = create_test_webhook(&pool, &app, &[INITIALIZE], None);
    let conn = pool.get().unwrap();

    queries::set_webhook_subscription_query(&conn, webhook.id, Some("subscription { event { issuedAt } }"))
        .unwrap();
    let found = queries::get_active_webhooks_for_app_event(&conn, app.id, INITIALIZE).unwrap();
    assert_eq!(
        found[0].subscription_query.as_deref(),
        Some("subscription { event { issuedAt } }")
    );

    queries::set_webhook_subscription_query(&conn, webhook.id, None).unwrap();
    let found = queries::get_active_webhooks_for_app_event(&conn, app.id, INITIALIZE).unwrap();
    assert_eq!(found[0].subscription_query, None);

    assert!(matches!(
        queries::set_webhook_subscription_query(&conn, 999, None),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_secret_key_is_not_serialized() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let mut webhook = create_test_webhook(&pool, &app, &[INITIALIZE], None);
    webhook.secret_key = Some("s3cret".to_string());

    let json = serde_json::to_value(&webhook).unwrap();
    assert!(json.get("secret_key").is_none());
    assert_eq!(json["target_url"], TARGET_URL);
}

// ============ Event Delivery Tests ============

#[test]
fn test_create_and_get_event_delivery() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let webhook = create_test_webhook(&pool, &app, &[INITIALIZE], None);
    let conn = pool.get().unwrap();

    let created =
        queries::create_event_delivery(&conn, INITIALIZE, webhook.id, r#"{"user_id":"VXNlcjox"}"#)
            .unwrap();
    assert!(is_valid_prefixed_id(&created.id));

    let fetched = queries::get_event_delivery(&conn, &created.id)
        .expect("Query failed")
        .expect("Delivery not found");
    assert_eq!(fetched, created);
    assert!(queries::get_event_delivery(&conn, "evd_missing").unwrap().is_none());
}

#[test]
fn test_latest_and_list_event_deliveries() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let webhook = create_test_webhook(&pool, &app, &[INITIALIZE, LIST], None);
    let conn = pool.get().unwrap();

    let first = queries::create_event_delivery(&conn, INITIALIZE, webhook.id, "{}").unwrap();
    let list = queries::create_event_delivery(&conn, LIST, webhook.id, "{}").unwrap();
    let second = queries::create_event_delivery(&conn, INITIALIZE, webhook.id, "{}").unwrap();

    let latest = queries::get_latest_event_delivery(&conn, INITIALIZE).unwrap().unwrap();
    assert_eq!(latest.id, second.id);

    let initialize = queries::list_event_deliveries(&conn, Some(INITIALIZE), 10).unwrap();
    assert_eq!(
        initialize.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
        vec![second.id.as_str(), first.id.as_str()]
    );

    let all = queries::list_event_deliveries(&conn, None, 2).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, second.id);
    assert_eq!(all[1].id, list.id);

    assert_eq!(queries::count_event_deliveries(&conn, INITIALIZE).unwrap(), 2);
    assert_eq!(queries::count_event_deliveries(&conn, LIST).unwrap(), 1);
}

#[test]
fn test_purge_old_event_deliveries() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let webhook = create_test_webhook(&pool, &app, &[INITIALIZE], None);
    let conn = pool.get().unwrap();

    let fresh = queries::create_event_delivery(&conn, INITIALIZE, webhook.id, "{}").unwrap();
    let forty_days_ago = chrono::Utc::now().timestamp() - 40 * 86400;
    conn.execute(
        "INSERT INTO event_deliveries (id, event_type, webhook_id, payload, created_at)
         VALUES ('evd_old', ?1, ?2, '{}', ?3)",
        params![INITIALIZE.as_str(), webhook.id, forty_days_ago],
    )
    .unwrap();

    let deleted = queries::purge_old_event_deliveries(&conn, 30).unwrap();
    assert_eq!(deleted, 1);

    let remaining = queries::list_event_deliveries(&conn, None, 10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, fresh.id);
}

#[test]
fn test_purge_with_huge_retention_keeps_everything() {
    let pool = setup_test_pool();
    let app = create_test_app(&pool, APP_IDENTIFIER);
    let webhook = create_test_webhook(&pool, &app, &[INITIALIZE], None);
    let conn = pool.get().unwrap();

    queries::create_event_delivery(&conn, INITIALIZE, webhook.id, "{}").unwrap();
    conn.execute(
        "INSERT INTO event_deliveries (id, event_type, webhook_id, payload, created_at)
         VALUES ('evd_ancient', ?1, ?2, '{}', 0)",
        params![INITIALIZE.as_str(), webhook.id],
    )
    .unwrap();

    assert_eq!(queries::purge_old_event_deliveries(&conn, i64::MAX).unwrap(), 0);
    assert_eq!(queries::count_event_deliveries(&conn, INITIALIZE).unwrap(), 2);
}
