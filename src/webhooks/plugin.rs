//! Payment operations backed by synchronous app webhooks.
//!
//! Every operation follows the same pipeline: resolve the app and its
//! webhook, render the payload, record the delivery, dispatch and wait,
//! reconcile the reply. Successful tokenizations also evict the app's cached
//! list of stored payment methods.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use super::payload::{
    InitializeTokenizationEvent, ListStoredPaymentMethodsEvent, ProcessTokenizationEvent,
    SyncEventPayload, build_payload, list_stored_payment_methods_payload,
};
use super::recorder::record_delivery;
use super::transport::SyncDispatcher;
use crate::cache::{CacheStore, generate_cache_key_for_webhook};
use crate::config::{Config, WEBHOOK_CACHE_DEFAULT_TIMEOUT, WEBHOOK_SYNC_TIMEOUT};
use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::id::from_payment_app_id;
use crate::models::{App, Channel, User, Webhook, WebhookEventSyncType};
use crate::payments::{
    ListStoredPaymentMethodsRequest, PaymentMethodInitializeTokenizationRequest,
    PaymentMethodProcessTokenizationRequest, PaymentMethodTokenizationResponse,
    StoredPaymentMethod, parse_list_stored_payment_methods_response, reconcile,
};

pub struct WebhookPlugin<D, C> {
    pool: DbPool,
    dispatcher: D,
    cache: C,
    sync_timeout: Duration,
    cache_timeout: Duration,
}

impl<D: SyncDispatcher, C: CacheStore> WebhookPlugin<D, C> {
    pub fn new(pool: DbPool, dispatcher: D, cache: C) -> Self {
        Self {
            pool,
            dispatcher,
            cache,
            sync_timeout: WEBHOOK_SYNC_TIMEOUT,
            cache_timeout: WEBHOOK_CACHE_DEFAULT_TIMEOUT,
        }
    }

    pub fn with_config(pool: DbPool, dispatcher: D, cache: C, config: &Config) -> Self {
        Self {
            sync_timeout: config.webhook_sync_timeout,
            cache_timeout: config.webhook_cache_timeout,
            ..Self::new(pool, dispatcher, cache)
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Ask the app named in the request to start tokenizing a payment method.
    ///
    /// Returns `previous` untouched when the app is unknown, inactive or has
    /// no webhook for the event. Only storage failures are errors; delivery
    /// and contract failures are encoded in the response.
    pub async fn payment_method_initialize_tokenization(
        &self,
        request: &PaymentMethodInitializeTokenizationRequest,
        previous: PaymentMethodTokenizationResponse,
    ) -> Result<PaymentMethodTokenizationResponse> {
        let event_type = WebhookEventSyncType::PaymentMethodInitializeTokenizationSession;
        let Some((app, webhook)) = self.resolve_webhook(&request.app_identifier, event_type)? else {
            return Ok(previous);
        };

        let event = InitializeTokenizationEvent {
            request,
            app: &app,
            issued_at: Utc::now(),
        };
        let raw = self.trigger_sync(&webhook, &event).await?;

        Ok(self.finish_tokenization(raw, &app, &request.user, &request.channel, event_type))
    }

    /// Continue a tokenization that needed additional action. The request id
    /// is the composed id returned by the initialize call; it decides which
    /// app is asked.
    pub async fn payment_method_process_tokenization(
        &self,
        request: &PaymentMethodProcessTokenizationRequest,
        previous: PaymentMethodTokenizationResponse,
    ) -> Result<PaymentMethodTokenizationResponse> {
        let Some(app_data) = from_payment_app_id(&request.id) else {
            tracing::debug!(id = %request.id, "Not a payment app id, skipping");
            return Ok(previous);
        };

        let event_type = WebhookEventSyncType::PaymentMethodProcessTokenizationSession;
        let Some((app, webhook)) = self.resolve_webhook(&app_data.app_identifier, event_type)?
        else {
            return Ok(previous);
        };

        let event = ProcessTokenizationEvent {
            request,
            payment_method_id: &app_data.name,
            app: &app,
            issued_at: Utc::now(),
        };
        let raw = self.trigger_sync(&webhook, &event).await?;

        Ok(self.finish_tokenization(raw, &app, &request.user, &request.channel, event_type))
    }

    /// Collect stored payment methods from every subscribed app, serving
    /// replies from the cache when possible. Results are appended to
    /// `previous`.
    pub async fn list_stored_payment_methods(
        &self,
        request: &ListStoredPaymentMethodsRequest,
        previous: Vec<StoredPaymentMethod>,
    ) -> Result<Vec<StoredPaymentMethod>> {
        let event_type = WebhookEventSyncType::ListStoredPaymentMethods;
        let webhooks = {
            let conn = self.pool.get()?;
            let webhooks = queries::get_active_webhooks_for_event(&conn, event_type)?;
            let mut resolved = Vec::with_capacity(webhooks.len());
            for webhook in webhooks {
                if let Some(app) = queries::get_app_by_id(&conn, webhook.app_id)? {
                    resolved.push((app, webhook));
                }
            }
            resolved
        };

        let cache_payload = list_stored_payment_methods_payload(&request.user, &request.channel);
        let mut methods = previous;

        for (app, webhook) in &webhooks {
            let cache_key =
                generate_cache_key_for_webhook(&cache_payload, &webhook.target_url, event_type, app.id);

            let response = match self.cache.get(&cache_key) {
                Some(cached) => {
                    tracing::debug!(
                        app = %app.identifier,
                        webhook_id = webhook.id,
                        "Using cached stored payment methods"
                    );
                    cached
                }
                None => {
                    let event = ListStoredPaymentMethodsEvent {
                        user: &request.user,
                        channel: &request.channel,
                        app,
                        issued_at: Utc::now(),
                    };
                    let Some(response) = self.trigger_sync(webhook, &event).await? else {
                        continue;
                    };
                    self.cache.set(&cache_key, response.clone(), self.cache_timeout);
                    response
                }
            };

            methods.extend(parse_list_stored_payment_methods_response(&response, app));
        }

        Ok(methods)
    }

    /// Evict the cached stored payment methods of `user` in `channel` for
    /// every list webhook of `app`.
    ///
    /// The key is derived from the static list payload, the same input the
    /// read path uses, regardless of the webhook's payload shape.
    pub fn invalidate_cache_for_stored_payment_methods(&self, app: &App, user: &User, channel: &Channel) {
        let event_type = WebhookEventSyncType::ListStoredPaymentMethods;
        let webhooks = match self.app_webhooks(app.id, event_type) {
            Ok(webhooks) => webhooks,
            Err(e) => {
                tracing::error!(
                    app = %app.identifier,
                    error = %e,
                    "Failed to load webhooks for cache invalidation"
                );
                return;
            }
        };

        let payload = list_stored_payment_methods_payload(user, channel);
        for webhook in &webhooks {
            let cache_key =
                generate_cache_key_for_webhook(&payload, &webhook.target_url, event_type, app.id);
            self.cache.delete(&cache_key);
            tracing::debug!(
                app = %app.identifier,
                webhook_id = webhook.id,
                "Invalidated stored payment methods cache"
            );
        }
    }

    /// Active app with the given identifier and its first active webhook for
    /// `event_type`.
    fn resolve_webhook(
        &self,
        app_identifier: &str,
        event_type: WebhookEventSyncType,
    ) -> Result<Option<(App, Webhook)>> {
        let conn = self.pool.get()?;

        let app = match queries::get_app_by_identifier(&conn, app_identifier)? {
            Some(app) if app.is_active => app,
            _ => {
                tracing::debug!(app = %app_identifier, %event_type, "No active app, skipping webhook");
                return Ok(None);
            }
        };

        let webhook = queries::get_active_webhooks_for_app_event(&conn, app.id, event_type)?
            .into_iter()
            .next();
        match webhook {
            Some(webhook) => Ok(Some((app, webhook))),
            None => {
                tracing::debug!(app = %app_identifier, %event_type, "App has no webhook for event");
                Ok(None)
            }
        }
    }

    fn app_webhooks(&self, app_id: i64, event_type: WebhookEventSyncType) -> Result<Vec<Webhook>> {
        let conn = self.pool.get()?;
        queries::get_active_webhooks_for_app_event(&conn, app_id, event_type)
    }

    /// Render, record and send one event. `Ok(None)` means no usable reply,
    /// either because the payload could not be rendered or the call failed.
    async fn trigger_sync(
        &self,
        webhook: &Webhook,
        event: &impl SyncEventPayload,
    ) -> Result<Option<Value>> {
        let event_type = event.event_type();
        let payload = match build_payload(webhook, event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    webhook_id = webhook.id,
                    %event_type,
                    error = %e,
                    "Invalid subscription query, webhook not sent"
                );
                return Ok(None);
            }
        };

        let delivery = record_delivery(&self.pool, webhook, event_type, &payload)?;

        Ok(self
            .dispatcher
            .send_webhook_request_sync(webhook, &delivery, self.sync_timeout)
            .await)
    }

    fn finish_tokenization(
        &self,
        raw: Option<Value>,
        app: &App,
        user: &User,
        channel: &Channel,
        event_type: WebhookEventSyncType,
    ) -> PaymentMethodTokenizationResponse {
        let response = reconcile(raw.as_ref(), app);

        if response.invalidates_stored_payment_methods() {
            self.invalidate_cache_for_stored_payment_methods(app, user, channel);
        }

        tracing::info!(
            app = %app.identifier,
            %event_type,
            result = response.result.as_str(),
            "Tokenization webhook finished"
        );

        response
    }
}
