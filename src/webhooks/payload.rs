//! Outbound payloads for sync events.
//!
//! Every event can be rendered two ways: the static shape (fixed snake_case
//! fields) or, when the webhook carries a subscription query, the projection
//! of the event's [`ProjectionNode`] tree through that query.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use super::subscription::{ProjectionNode, QueryError, SubscriptionQuery};
use crate::models::{App, Channel, User, Webhook, WebhookEventSyncType};
use crate::payments::{
    PaymentMethodInitializeTokenizationRequest, PaymentMethodProcessTokenizationRequest,
};

/// A sync event that can be rendered for a webhook.
pub trait SyncEventPayload {
    fn event_type(&self) -> WebhookEventSyncType;

    fn static_payload(&self) -> Value;

    fn projection_source(&self) -> ProjectionNode;
}

/// Payload shape a webhook asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape<'a> {
    Static,
    Subscription(&'a str),
}

impl<'a> PayloadShape<'a> {
    pub fn for_webhook(webhook: &'a Webhook) -> Self {
        match webhook.subscription_query.as_deref() {
            Some(query) if !query.trim().is_empty() => Self::Subscription(query),
            _ => Self::Static,
        }
    }
}

/// Render `event` in the shape `webhook` asks for.
pub fn build_payload(webhook: &Webhook, event: &impl SyncEventPayload) -> Result<Value, QueryError> {
    match PayloadShape::for_webhook(webhook) {
        PayloadShape::Static => Ok(event.static_payload()),
        PayloadShape::Subscription(query) => {
            SubscriptionQuery::parse(query)?.project(&event.projection_source())
        }
    }
}

/// Static payload of `LIST_STORED_PAYMENT_METHODS`. Also the normalized
/// input of that event's cache key.
pub fn list_stored_payment_methods_payload(user: &User, channel: &Channel) -> Value {
    json!({
        "user_id": user.global_id(),
        "channel_slug": channel.slug,
    })
}

pub struct InitializeTokenizationEvent<'a> {
    pub request: &'a PaymentMethodInitializeTokenizationRequest,
    pub app: &'a App,
    pub issued_at: DateTime<Utc>,
}

impl SyncEventPayload for InitializeTokenizationEvent<'_> {
    fn event_type(&self) -> WebhookEventSyncType {
        WebhookEventSyncType::PaymentMethodInitializeTokenizationSession
    }

    fn static_payload(&self) -> Value {
        json!({
            "user_id": self.request.user.global_id(),
            "channel_slug": self.request.channel.slug,
            "data": self.request.data,
            "payment_flow_to_support": self.request.payment_flow_to_support.as_str(),
        })
    }

    fn projection_source(&self) -> ProjectionNode {
        ProjectionNode::object(
            self.event_type().graphql_type_name(),
            vec![
                ("user", user_node(&self.request.user)),
                ("channel", channel_node(&self.request.channel)),
                ("data", json_node(&self.request.data)),
                (
                    "paymentFlowToSupport",
                    ProjectionNode::scalar(self.request.payment_flow_to_support.graphql_name()),
                ),
                ("issuedAt", issued_at_node(self.issued_at)),
                ("recipient", app_node(self.app)),
            ],
        )
    }
}

pub struct ProcessTokenizationEvent<'a> {
    pub request: &'a PaymentMethodProcessTokenizationRequest,
    /// The id the app issued, recovered from the composed request id.
    pub payment_method_id: &'a str,
    pub app: &'a App,
    pub issued_at: DateTime<Utc>,
}

impl SyncEventPayload for ProcessTokenizationEvent<'_> {
    fn event_type(&self) -> WebhookEventSyncType {
        WebhookEventSyncType::PaymentMethodProcessTokenizationSession
    }

    fn static_payload(&self) -> Value {
        json!({
            "user_id": self.request.user.global_id(),
            "id": self.payment_method_id,
            "channel_slug": self.request.channel.slug,
            "data": self.request.data,
        })
    }

    fn projection_source(&self) -> ProjectionNode {
        ProjectionNode::object(
            self.event_type().graphql_type_name(),
            vec![
                ("user", user_node(&self.request.user)),
                ("id", ProjectionNode::scalar(self.payment_method_id)),
                ("channel", channel_node(&self.request.channel)),
                ("data", json_node(&self.request.data)),
                ("issuedAt", issued_at_node(self.issued_at)),
                ("recipient", app_node(self.app)),
            ],
        )
    }
}

pub struct ListStoredPaymentMethodsEvent<'a> {
    pub user: &'a User,
    pub channel: &'a Channel,
    pub app: &'a App,
    pub issued_at: DateTime<Utc>,
}

impl SyncEventPayload for ListStoredPaymentMethodsEvent<'_> {
    fn event_type(&self) -> WebhookEventSyncType {
        WebhookEventSyncType::ListStoredPaymentMethods
    }

    fn static_payload(&self) -> Value {
        list_stored_payment_methods_payload(self.user, self.channel)
    }

    fn projection_source(&self) -> ProjectionNode {
        ProjectionNode::object(
            self.event_type().graphql_type_name(),
            vec![
                ("user", user_node(self.user)),
                ("channel", channel_node(self.channel)),
                ("issuedAt", issued_at_node(self.issued_at)),
                ("recipient", app_node(self.app)),
            ],
        )
    }
}

fn user_node(user: &User) -> ProjectionNode {
    ProjectionNode::object(
        "User",
        vec![
            ("id", ProjectionNode::scalar(user.global_id())),
            ("email", ProjectionNode::scalar(user.email.as_str())),
        ],
    )
}

fn channel_node(channel: &Channel) -> ProjectionNode {
    ProjectionNode::object(
        "Channel",
        vec![
            ("id", ProjectionNode::scalar(channel.global_id())),
            ("slug", ProjectionNode::scalar(channel.slug.as_str())),
            ("name", ProjectionNode::scalar(channel.name.as_str())),
            ("currencyCode", ProjectionNode::scalar(channel.currency_code.as_str())),
        ],
    )
}

fn app_node(app: &App) -> ProjectionNode {
    ProjectionNode::object(
        "App",
        vec![
            ("id", ProjectionNode::scalar(app.global_id())),
            ("identifier", ProjectionNode::scalar(app.identifier.as_str())),
            ("name", ProjectionNode::scalar(app.name.as_str())),
        ],
    )
}

fn json_node(data: &Option<Value>) -> ProjectionNode {
    ProjectionNode::Scalar(data.clone().unwrap_or(Value::Null))
}

fn issued_at_node(issued_at: DateTime<Utc>) -> ProjectionNode {
    ProjectionNode::scalar(issued_at.to_rfc3339_opts(SecondsFormat::Secs, true))
}
