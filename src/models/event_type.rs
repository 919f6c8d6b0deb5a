use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Synchronous webhook events: the platform waits for the app's reply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookEventSyncType {
    ListStoredPaymentMethods,
    PaymentMethodInitializeTokenizationSession,
    PaymentMethodProcessTokenizationSession,
}

impl WebhookEventSyncType {
    /// Name used in storage, headers and cache keys.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// GraphQL type name of the event, as exposed to subscription queries.
    pub fn graphql_type_name(&self) -> &'static str {
        match self {
            Self::ListStoredPaymentMethods => "ListStoredPaymentMethods",
            Self::PaymentMethodInitializeTokenizationSession => {
                "PaymentMethodInitializeTokenizationSession"
            }
            Self::PaymentMethodProcessTokenizationSession => {
                "PaymentMethodProcessTokenizationSession"
            }
        }
    }
}

impl std::fmt::Display for WebhookEventSyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_storage_names() {
        assert_eq!(
            WebhookEventSyncType::PaymentMethodInitializeTokenizationSession.as_str(),
            "payment_method_initialize_tokenization_session"
        );
        assert_eq!(
            "list_stored_payment_methods".parse::<WebhookEventSyncType>().unwrap(),
            WebhookEventSyncType::ListStoredPaymentMethods
        );
        assert!("order_created".parse::<WebhookEventSyncType>().is_err());
    }

    #[test]
    fn test_serde_matches_strum() {
        let json =
            serde_json::to_string(&WebhookEventSyncType::PaymentMethodProcessTokenizationSession)
                .unwrap();
        assert_eq!(json, "\"payment_method_process_tokenization_session\"");
    }
}
