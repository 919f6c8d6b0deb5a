//! Synchronous webhook transport.
//!
//! "Synchronous" means the caller waits for the app's reply. The reply is
//! either a JSON object or nothing: network errors, non-2xx statuses,
//! malformed bodies and timeouts all collapse to `None`. No retries here.

use std::future::Future;
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::models::{EventDelivery, Webhook};

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const DELIVERY_HEADER: &str = "X-Webhook-Delivery";
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Sends a recorded delivery and waits for the reply.
pub trait SyncDispatcher: Send + Sync {
    /// Returns the reply object, or `None` when no usable reply arrived
    /// within `timeout`.
    fn send_webhook_request_sync(
        &self,
        webhook: &Webhook,
        delivery: &EventDelivery,
        timeout: Duration,
    ) -> impl Future<Output = Option<Value>> + Send;
}

#[derive(Error, Debug)]
enum DispatchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response is not valid JSON: {0}")]
    InvalidBody(serde_json::Error),

    #[error("response is not a JSON object")]
    NotAnObject,
}

/// `X-Webhook-Signature` value: `sha256=<hex hmac>` over the payload bytes.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// reqwest-backed dispatcher.
#[derive(Debug, Clone, Default)]
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn post(&self, webhook: &Webhook, delivery: &EventDelivery) -> Result<Value, DispatchError> {
        let mut request = self
            .client
            .post(&webhook.target_url)
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, delivery.event_type.as_str())
            .header(DELIVERY_HEADER, delivery.id.as_str());

        if let Some(signature) = webhook
            .secret_key
            .as_deref()
            .and_then(|secret| sign_payload(secret, delivery.payload.as_bytes()))
        {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.body(delivery.payload.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let value: Value = serde_json::from_slice(&bytes).map_err(DispatchError::InvalidBody)?;
        if !value.is_object() {
            return Err(DispatchError::NotAnObject);
        }
        Ok(value)
    }
}

impl SyncDispatcher for HttpDispatcher {
    async fn send_webhook_request_sync(
        &self,
        webhook: &Webhook,
        delivery: &EventDelivery,
        timeout: Duration,
    ) -> Option<Value> {
        let started = std::time::Instant::now();

        match tokio::time::timeout(timeout, self.post(webhook, delivery)).await {
            Ok(Ok(value)) => {
                tracing::debug!(
                    delivery_id = %delivery.id,
                    webhook_id = webhook.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sync webhook answered"
                );
                Some(value)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    delivery_id = %delivery.id,
                    webhook_id = webhook.id,
                    target_url = %webhook.target_url,
                    error = %e,
                    "Sync webhook failed"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    delivery_id = %delivery.id,
                    webhook_id = webhook.id,
                    target_url = %webhook.target_url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Sync webhook timed out"
                );
                None
            }
        }
    }
}
