//! Identifier helpers.
//!
//! - Prefixed ids for rows this crate creates (`evd_{uuid_simple}`).
//! - Global ids for objects owned by the surrounding platform
//!   (`base64("User:42")`), as they appear in webhook payloads.
//! - Payment app ids, which bind an app-local payment method id to the app
//!   that issued it so later calls can be routed back to that app.
//!   Format: `app:{url-encoded app identifier}:{app-local id}`

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use url::form_urlencoded;
use uuid::Uuid;

use crate::models::App;

pub const APP_ID_PREFIX: &str = "app";

/// Entity types that have prefixed IDs in this crate.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    EventDelivery,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::EventDelivery => "evd",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

/// Validate format `{prefix}_{32 hex chars}` for a known prefix.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let prefix = format!("{}_", EntityType::EventDelivery.prefix());
    let Some(hex_part) = s.strip_prefix(prefix.as_str()) else {
        return false;
    };
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Opaque global id for a platform object, e.g. `to_global_id("User", 42)`.
pub fn to_global_id(type_name: &str, pk: i64) -> String {
    BASE64.encode(format!("{}:{}", type_name, pk))
}

/// Inverse of [`to_global_id`]. Returns `(type_name, pk)`.
pub fn from_global_id(global_id: &str) -> Option<(String, i64)> {
    let decoded = BASE64.decode(global_id).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (type_name, pk) = decoded.split_once(':')?;
    if type_name.is_empty() {
        return None;
    }
    Some((type_name.to_string(), pk.parse().ok()?))
}

/// App identity recovered from a payment app id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAppData {
    pub app_identifier: String,
    /// The id the app itself issued.
    pub name: String,
}

pub fn to_payment_app_id(app: &App, external_id: &str) -> String {
    let identifier: String = form_urlencoded::byte_serialize(app.identifier.as_bytes()).collect();
    format!("{}:{}:{}", APP_ID_PREFIX, identifier, external_id)
}

/// Decompose a payment app id. The app-local part may itself contain `:`.
pub fn from_payment_app_id(payment_app_id: &str) -> Option<PaymentAppData> {
    let mut parts = payment_app_id.splitn(3, ':');
    if parts.next()? != APP_ID_PREFIX {
        return None;
    }
    let encoded_identifier = parts.next()?;
    let name = parts.next()?;
    if encoded_identifier.is_empty() || name.is_empty() {
        return None;
    }

    // byte_serialize escapes `=` and `&`, so the whole segment parses as one key.
    let (app_identifier, _) = form_urlencoded::parse(encoded_identifier.as_bytes()).next()?;

    Some(PaymentAppData {
        app_identifier: app_identifier.into_owned(),
        name: name.to_string(),
    })
}
