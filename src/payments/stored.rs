use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TokenizedPaymentFlow;
use crate::id::to_payment_app_id;
use crate::models::{App, Channel, User};

#[derive(Debug, Clone, PartialEq)]
pub struct ListStoredPaymentMethodsRequest {
    pub user: User,
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCardInfo {
    pub brand: String,
    pub last_digits: String,
    pub exp_month: u32,
    pub exp_year: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_digits: Option<String>,
}

/// Payment method the app stores on behalf of the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPaymentMethod {
    /// Composed payment app id.
    pub id: String,
    pub supported_payment_flows: Vec<TokenizedPaymentFlow>,
    /// App-defined kind, e.g. "Credit Card".
    pub payment_method_type: String,
    pub name: Option<String>,
    pub data: Option<Value>,
    pub credit_card_info: Option<CreditCardInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPaymentMethodWire {
    id: String,
    #[serde(default)]
    supported_payment_flows: Vec<String>,
    #[serde(rename = "type")]
    payment_method_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    credit_card_info: Option<CreditCardInfoWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditCardInfoWire {
    brand: String,
    last_digits: String,
    exp_month: u32,
    exp_year: u32,
    #[serde(default)]
    first_digits: Option<String>,
}

/// Parse a `{"paymentMethods": [...]}` reply.
///
/// Entries that don't match the contract are skipped so one bad entry does
/// not hide the customer's other methods.
pub fn parse_list_stored_payment_methods_response(raw: &Value, app: &App) -> Vec<StoredPaymentMethod> {
    let Some(entries) = raw.get("paymentMethods").and_then(Value::as_array) else {
        tracing::warn!(app = %app.identifier, "Missing `paymentMethods` in response");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match StoredPaymentMethodWire::deserialize(entry) {
            Ok(wire) => Some(wire.into_stored(app)),
            Err(e) => {
                tracing::warn!(
                    app = %app.identifier,
                    error = %e,
                    "Skipping invalid stored payment method"
                );
                None
            }
        })
        .collect()
}

impl StoredPaymentMethodWire {
    fn into_stored(self, app: &App) -> StoredPaymentMethod {
        StoredPaymentMethod {
            id: to_payment_app_id(app, &self.id),
            supported_payment_flows: self
                .supported_payment_flows
                .iter()
                .filter_map(|flow| flow.parse().ok())
                .collect(),
            payment_method_type: self.payment_method_type,
            name: self.name,
            data: self.data.filter(|v| !v.is_null()),
            credit_card_info: self.credit_card_info.map(|card| CreditCardInfo {
                brand: card.brand,
                last_digits: card.last_digits,
                exp_month: card.exp_month,
                exp_year: card.exp_year,
                first_digits: card.first_digits,
            }),
        }
    }
}
