//! Tokenization request/response types and the reply reconciler.
//!
//! Apps answer tokenization webhooks with `{result, id?, data?, error?}`.
//! The reply is untrusted: it is parsed into [`TokenizationReply`], whose
//! variants carry exactly the fields each result requires, and contract
//! violations are downgraded to `FAILED_TO_TOKENIZE` instead of failing the
//! call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, EnumString};
use thiserror::Error;

use crate::id::to_payment_app_id;
use crate::models::{App, Channel, User};

pub const FAILED_TO_DELIVER_MESSAGE: &str = "Failed to delivery request.";
pub const MISSING_PAYMENT_METHOD_ID_MESSAGE: &str = "Missing payment method `id` in response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PaymentMethodTokenizationResult {
    SuccessfullyTokenized,
    AdditionalActionRequired,
    Pending,
    FailedToTokenize,
    /// Produced by the platform only, never accepted from an app.
    FailedToDeliver,
}

impl PaymentMethodTokenizationResult {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }
}

/// Payment flows a tokenized payment method can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TokenizedPaymentFlow {
    Interactive,
}

impl TokenizedPaymentFlow {
    /// Token used by static payloads (`"interactive"`).
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Enum name as exposed to subscription queries (`"INTERACTIVE"`).
    pub fn graphql_name(&self) -> &'static str {
        match self {
            Self::Interactive => "INTERACTIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethodInitializeTokenizationRequest {
    pub user: User,
    pub app_identifier: String,
    pub channel: Channel,
    pub data: Option<Value>,
    pub payment_flow_to_support: TokenizedPaymentFlow,
}

/// Follow-up call for a payment method that needed additional action.
/// `id` is the composed payment app id returned by the initialize call.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethodProcessTokenizationRequest {
    pub user: User,
    pub id: String,
    pub channel: Channel,
    pub data: Option<Value>,
}

/// Canonical outcome handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodTokenizationResponse {
    pub result: PaymentMethodTokenizationResult,
    /// Composed payment app id (see [`to_payment_app_id`]).
    pub id: Option<String>,
    pub error: Option<String>,
    pub data: Option<Value>,
}

impl PaymentMethodTokenizationResponse {
    pub fn failed_to_deliver() -> Self {
        Self {
            result: PaymentMethodTokenizationResult::FailedToDeliver,
            id: None,
            error: Some(FAILED_TO_DELIVER_MESSAGE.to_string()),
            data: None,
        }
    }

    pub fn failed_to_tokenize(error: Option<String>) -> Self {
        Self {
            result: PaymentMethodTokenizationResult::FailedToTokenize,
            id: None,
            error,
            data: None,
        }
    }

    /// Outcomes after which the app's stored payment methods changed.
    pub fn invalidates_stored_payment_methods(&self) -> bool {
        matches!(
            self.result,
            PaymentMethodTokenizationResult::SuccessfullyTokenized
                | PaymentMethodTokenizationResult::Pending
        )
    }
}

/// Reply contract violations. Display strings are returned to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyViolation {
    #[error("Missing `result` in response.")]
    MissingResult,

    #[error("Incorrect value ({0}) for field: `result`.")]
    IncorrectResult(String),

    #[error("Missing payment method `id` in response.")]
    MissingPaymentMethodId,
}

/// A validated app reply. Variants carry the fields their result requires.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenizationReply {
    SuccessfullyTokenized { id: String, data: Option<Value> },
    AdditionalActionRequired { id: String, data: Option<Value> },
    Pending { id: Option<String>, data: Option<Value> },
    FailedToTokenize { error: Option<String> },
}

impl TokenizationReply {
    pub fn parse(raw: &Value) -> Result<Self, ReplyViolation> {
        let result = match raw.get("result") {
            None | Some(Value::Null) => return Err(ReplyViolation::MissingResult),
            Some(Value::String(s)) => s
                .parse::<PaymentMethodTokenizationResult>()
                .map_err(|_| ReplyViolation::IncorrectResult(s.clone()))?,
            Some(other) => return Err(ReplyViolation::IncorrectResult(other.to_string())),
        };

        let id = string_field(raw, "id");
        let data = raw.get("data").filter(|v| !v.is_null()).cloned();

        match result {
            PaymentMethodTokenizationResult::SuccessfullyTokenized => {
                let id = id.ok_or(ReplyViolation::MissingPaymentMethodId)?;
                Ok(Self::SuccessfullyTokenized { id, data })
            }
            PaymentMethodTokenizationResult::AdditionalActionRequired => {
                let id = id.ok_or(ReplyViolation::MissingPaymentMethodId)?;
                Ok(Self::AdditionalActionRequired { id, data })
            }
            PaymentMethodTokenizationResult::Pending => Ok(Self::Pending { id, data }),
            PaymentMethodTokenizationResult::FailedToTokenize => Ok(Self::FailedToTokenize {
                error: match raw.get("error") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(error)) => Some(error.clone()),
                    Some(other) => Some(other.to_string()),
                },
            }),
            PaymentMethodTokenizationResult::FailedToDeliver => {
                let value = raw["result"].as_str().unwrap_or_default();
                Err(ReplyViolation::IncorrectResult(value.to_string()))
            }
        }
    }

    pub fn into_response(self, app: &App) -> PaymentMethodTokenizationResponse {
        let (result, id, data) = match self {
            Self::SuccessfullyTokenized { id, data } => (
                PaymentMethodTokenizationResult::SuccessfullyTokenized,
                Some(id),
                data,
            ),
            Self::AdditionalActionRequired { id, data } => (
                PaymentMethodTokenizationResult::AdditionalActionRequired,
                Some(id),
                data,
            ),
            Self::Pending { id, data } => (PaymentMethodTokenizationResult::Pending, id, data),
            Self::FailedToTokenize { error } => {
                return PaymentMethodTokenizationResponse::failed_to_tokenize(error);
            }
        };

        PaymentMethodTokenizationResponse {
            result,
            id: id.map(|id| to_payment_app_id(app, &id)),
            error: None,
            data,
        }
    }
}

/// Turn an app reply (or its absence) into the canonical response.
pub fn reconcile(raw: Option<&Value>, app: &App) -> PaymentMethodTokenizationResponse {
    let Some(raw) = raw else {
        return PaymentMethodTokenizationResponse::failed_to_deliver();
    };

    match TokenizationReply::parse(raw) {
        Ok(reply) => reply.into_response(app),
        Err(violation) => {
            tracing::warn!(
                app = %app.identifier,
                %violation,
                "App returned an invalid tokenization response"
            );
            PaymentMethodTokenizationResponse::failed_to_tokenize(Some(violation.to_string()))
        }
    }
}

/// String id, tolerating numeric ids. Empty strings count as missing.
fn string_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
