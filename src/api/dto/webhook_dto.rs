//! Payment provider event payload.
//!
//! Only the fields the top-up needs are modelled; everything else in the
//! event is ignored.

use std::collections::HashMap;

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::UserId;
use crate::error::ApiError;

/// Event type that credits a wallet.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Envelope of a payment provider event.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentEvent {
    /// Event type, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload; absent or irrelevant for most event types.
    #[serde(default)]
    pub data: Option<PaymentEventData>,
}

/// `data` member of a [`PaymentEvent`].
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentEventData {
    /// The checkout session the event is about.
    pub object: CheckoutSession,
}

/// The subset of a checkout session carrying our metadata.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckoutSession {
    /// Metadata attached when the session was opened: `user_id` and
    /// `jetons`, both as decimal strings.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A decoded top-up order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopUp {
    /// Wallet to credit.
    pub user_id: UserId,
    /// Tokens bought.
    pub amount: i64,
}

impl PaymentEvent {
    /// Extracts the top-up carried by a completed checkout.
    ///
    /// Returns `Ok(None)` for any other event type.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] when a completed checkout lacks
    /// numeric `user_id` / `jetons` metadata.
    pub fn top_up(&self) -> Result<Option<TopUp>, ApiError> {
        if self.kind != CHECKOUT_COMPLETED {
            return Ok(None);
        }
        let metadata = self
            .data
            .as_ref()
            .map(|data| &data.object.metadata)
            .ok_or_else(|| ApiError::BadRequest("checkout session missing".to_string()))?;
        let user_id = metadata_number(metadata, "user_id")?;
        let amount = metadata_number(metadata, "jetons")?;
        Ok(Some(TopUp {
            user_id: UserId::new(user_id),
            amount,
        }))
    }
}

fn metadata_number(metadata: &HashMap<String, String>, key: &str) -> Result<i64, ApiError> {
    metadata
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid metadata field {key}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn event(json: &str) -> PaymentEvent {
        let Ok(event) = serde_json::from_str(json) else {
            panic!("event should parse: {json}");
        };
        event
    }

    #[test]
    fn completed_checkout_yields_top_up() {
        let event = event(
            r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_1","metadata":{"user_id":"4","jetons":"50"}}}}"#,
        );
        let Ok(Some(top_up)) = event.top_up() else {
            panic!("expected a top-up");
        };
        assert_eq!(top_up.user_id, UserId::new(4));
        assert_eq!(top_up.amount, 50);
    }

    #[test]
    fn other_events_are_ignored() {
        let event = event(r#"{"type":"payment_intent.created","data":{"object":{"amount":100}}}"#);
        assert!(matches!(event.top_up(), Ok(None)));
    }

    #[test]
    fn malformed_metadata_is_rejected() {
        let event = event(
            r#"{"type":"checkout.session.completed","data":{"object":{"metadata":{"user_id":"abc","jetons":"50"}}}}"#,
        );
        assert!(matches!(event.top_up(), Err(ApiError::BadRequest(_))));
    }
}
