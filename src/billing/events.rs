//! Payment lifecycle events as delivered by the provider's webhooks.

use serde::Deserialize;
use serde_json::Value;

use super::errors::{BillingError, BillingResult};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventKind {
    /// Checkout finished, the user is now a subscriber
    Completed,
    /// Subscription ended, the user is back on the free tier
    Canceled,
    /// Any other provider event type; ignored
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider event id, for logging only
    pub id: Option<String>,
    pub kind: PaymentEventKind,
    /// Opaque key attached at checkout time; our user id as a string
    pub correlation_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: EnvelopeData,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    object: Value,
}

fn as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl PaymentEvent {
    pub fn completed(user_id: i64) -> Self {
        Self {
            id: None,
            kind: PaymentEventKind::Completed,
            correlation_key: Some(user_id.to_string()),
        }
    }

    pub fn canceled(user_id: i64) -> Self {
        Self {
            id: None,
            kind: PaymentEventKind::Canceled,
            correlation_key: Some(user_id.to_string()),
        }
    }

    /// Parse a webhook body. Only the envelope shape is required; the
    /// correlation key is looked up in `metadata.user_id`, then
    /// `client_reference_id`.
    pub fn parse(payload: &[u8]) -> BillingResult<Self> {
        let envelope: Envelope = serde_json::from_slice(payload)
            .map_err(|e| BillingError::InvalidPayload(e.to_string()))?;

        let kind = match envelope.event_type.as_str() {
            CHECKOUT_COMPLETED => PaymentEventKind::Completed,
            SUBSCRIPTION_DELETED => PaymentEventKind::Canceled,
            other => PaymentEventKind::Unknown(other.to_string()),
        };

        let object = &envelope.data.object;
        let correlation_key = object
            .get("metadata")
            .and_then(|m| m.get("user_id"))
            .and_then(as_key)
            .or_else(|| object.get("client_reference_id").and_then(as_key));

        Ok(Self {
            id: envelope.id,
            kind,
            correlation_key,
        })
    }

    pub fn event_type(&self) -> &str {
        match &self.kind {
            PaymentEventKind::Completed => CHECKOUT_COMPLETED,
            PaymentEventKind::Canceled => SUBSCRIPTION_DELETED,
            PaymentEventKind::Unknown(t) => t,
        }
    }

    /// Correlation key as a user id, if it is one
    pub fn user_id(&self) -> Option<i64> {
        self.correlation_key.as_deref()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_completed() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"metadata": {"user_id": "42"}, "client_reference_id": "7"}}
        }"#;
        let event = PaymentEvent::parse(payload).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Completed);
        assert_eq!(event.user_id(), Some(42));
        assert_eq!(event.id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn test_parse_subscription_deleted_numeric_key() {
        let payload = br#"{"type": "customer.subscription.deleted", "data": {"object": {"metadata": {"user_id": 5}}}}"#;
        let event = PaymentEvent::parse(payload).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Canceled);
        assert_eq!(event.user_id(), Some(5));
    }

    #[test]
    fn test_falls_back_to_client_reference() {
        let payload = br#"{"type": "checkout.session.completed", "data": {"object": {"metadata": {}, "client_reference_id": "9"}}}"#;
        assert_eq!(PaymentEvent::parse(payload).unwrap().user_id(), Some(9));
    }

    #[test]
    fn test_unknown_type_and_missing_key() {
        let payload = br#"{"type": "invoice.paid", "data": {"object": {}}}"#;
        let event = PaymentEvent::parse(payload).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Unknown("invoice.paid".to_string()));
        assert_eq!(event.event_type(), "invoice.paid");
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            PaymentEvent::parse(b"not json"),
            Err(BillingError::InvalidPayload(_))
        ));
    }
}
