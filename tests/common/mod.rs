//! Test utilities and fixtures for payhook integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

// Re-export the main library crate
pub use payhook::cache::{CacheStore, MemoryCache, generate_cache_key_for_webhook};
pub use payhook::config::{WEBHOOK_CACHE_DEFAULT_TIMEOUT, WEBHOOK_SYNC_TIMEOUT};
pub use payhook::db::{DbPool, create_memory_pool, init_db, queries};
pub use payhook::models::*;
pub use payhook::payments::*;
pub use payhook::webhooks::payload::list_stored_payment_methods_payload;
pub use payhook::webhooks::{SyncDispatcher, WebhookPlugin};

pub const TARGET_URL: &str = "http://localhost:8000/endpoint/";
pub const APP_IDENTIFIER: &str = "vendor.payments";

/// Create an in-memory test database pool with schema initialized
pub fn setup_test_pool() -> DbPool {
    let pool = create_memory_pool().expect("Failed to create in-memory pool");
    let conn = pool.get().expect("Failed to get connection");
    init_db(&conn).expect("Failed to initialize schema");
    pool
}

/// Create an active test app
pub fn create_test_app(pool: &DbPool, identifier: &str) -> App {
    let conn = pool.get().unwrap();
    queries::create_app(
        &conn,
        &CreateApp {
            identifier: identifier.to_string(),
            name: format!("Test App {}", identifier),
        },
    )
    .expect("Failed to create test app")
}

/// Create an active webhook for `app` posting to [`TARGET_URL`]
pub fn create_test_webhook(
    pool: &DbPool,
    app: &App,
    events: &[WebhookEventSyncType],
    subscription_query: Option<&str>,
) -> Webhook {
    let conn = pool.get().unwrap();
    queries::create_webhook(
        &conn,
        &CreateWebhook {
            app_id: app.id,
            name: "payment methods".to_string(),
            target_url: TARGET_URL.to_string(),
            secret_key: None,
            subscription_query: subscription_query.map(String::from),
            events: events.to_vec(),
        },
    )
    .expect("Failed to create test webhook")
}

pub fn test_user() -> User {
    User {
        id: 1,
        email: "customer@example.com".to_string(),
    }
}

pub fn test_channel() -> Channel {
    Channel {
        id: 1,
        slug: "default-channel".to_string(),
        name: "Default Channel".to_string(),
        currency_code: "USD".to_string(),
    }
}

pub fn initialize_request(app_identifier: &str) -> PaymentMethodInitializeTokenizationRequest {
    PaymentMethodInitializeTokenizationRequest {
        user: test_user(),
        app_identifier: app_identifier.to_string(),
        channel: test_channel(),
        data: Some(json!({"data": "ABC"})),
        payment_flow_to_support: TokenizedPaymentFlow::Interactive,
    }
}

pub fn process_request(id: &str) -> PaymentMethodProcessTokenizationRequest {
    PaymentMethodProcessTokenizationRequest {
        user: test_user(),
        id: id.to_string(),
        channel: test_channel(),
        data: Some(json!({"data": "ABC"})),
    }
}

pub fn list_request() -> ListStoredPaymentMethodsRequest {
    ListStoredPaymentMethodsRequest {
        user: test_user(),
        channel: test_channel(),
    }
}

/// Sentinel `previous` value, distinguishable from anything the plugin builds.
pub fn previous_response() -> PaymentMethodTokenizationResponse {
    PaymentMethodTokenizationResponse {
        result: PaymentMethodTokenizationResult::FailedToTokenize,
        id: None,
        error: Some("previous".to_string()),
        data: Some(json!({"previous": true})),
    }
}

/// Cache key the list path uses for `app` with the default user and channel.
pub fn list_cache_key(app: &App) -> String {
    generate_cache_key_for_webhook(
        &list_stored_payment_methods_payload(&test_user(), &test_channel()),
        TARGET_URL,
        WebhookEventSyncType::ListStoredPaymentMethods,
        app.id,
    )
}

// ============ Test doubles ============

#[derive(Debug, Clone)]
pub struct DispatchCall {
    pub webhook_id: i64,
    pub delivery: EventDelivery,
    pub timeout: Duration,
}

/// Dispatcher that records every call and answers from a queue of replies.
/// An exhausted queue answers `None`.
#[derive(Default)]
pub struct RecordingDispatcher {
    replies: Mutex<VecDeque<Option<Value>>>,
    calls: Mutex<Vec<DispatchCall>>,
}

impl RecordingDispatcher {
    pub fn replying(replies: impl IntoIterator<Item = Option<Value>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: Option<Value>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SyncDispatcher for RecordingDispatcher {
    async fn send_webhook_request_sync(
        &self,
        webhook: &Webhook,
        delivery: &EventDelivery,
        timeout: Duration,
    ) -> Option<Value> {
        self.calls.lock().unwrap().push(DispatchCall {
            webhook_id: webhook.id,
            delivery: delivery.clone(),
            timeout,
        });
        self.replies.lock().unwrap().pop_front().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Get(String),
    Set(String, Duration),
    Delete(String),
}

/// [`MemoryCache`] that logs every operation.
#[derive(Default)]
pub struct CountingCache {
    inner: MemoryCache,
    ops: Mutex<Vec<CacheOp>>,
}

impl CountingCache {
    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Delete(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn sets(&self) -> Vec<(String, Duration)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Set(key, timeout) => Some((key, timeout)),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }
}

impl CacheStore for CountingCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.ops.lock().unwrap().push(CacheOp::Get(key.to_string()));
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value, timeout: Duration) {
        self.ops
            .lock()
            .unwrap()
            .push(CacheOp::Set(key.to_string(), timeout));
        self.inner.set(key, value, timeout);
    }

    fn delete(&self, key: &str) {
        self.ops.lock().unwrap().push(CacheOp::Delete(key.to_string()));
        self.inner.delete(key);
    }
}

pub type TestPlugin = WebhookPlugin<RecordingDispatcher, CountingCache>;

pub fn test_plugin(pool: &DbPool, replies: impl IntoIterator<Item = Option<Value>>) -> TestPlugin {
    WebhookPlugin::new(
        pool.clone(),
        RecordingDispatcher::replying(replies),
        CountingCache::default(),
    )
}

/// Number of delivery records stored for `event_type`.
pub fn delivery_count(pool: &DbPool, event_type: WebhookEventSyncType) -> i64 {
    let conn = pool.get().unwrap();
    queries::count_event_deliveries(&conn, event_type).unwrap()
}

pub fn latest_delivery(pool: &DbPool, event_type: WebhookEventSyncType) -> EventDelivery {
    let conn = pool.get().unwrap();
    queries::get_latest_event_delivery(&conn, event_type)
        .unwrap()
        .expect("a delivery should have been recorded")
}
