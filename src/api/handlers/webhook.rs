//! Payment provider webhook: credits wallets after a completed checkout.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use constant_time_eq::constant_time_eq;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::PaymentEvent;
use crate::api::extract::Payload;
use crate::app_state::AppState;
use crate::error::{ApiError, ErrorResponse};

/// Header carrying the shared webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// `true` when the event credited a wallet.
    pub processed: bool,
}

/// `POST /webhook`: handle a payment provider event.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] for a missing or wrong secret,
/// [`ApiError::BadRequest`] for malformed checkout metadata.
#[utoipa::path(
    post,
    path = "/webhook",
    tag = "Payments",
    summary = "Payment webhook",
    description = "Credits the wallet named in the metadata of a `checkout.session.completed` event. Other event types are acknowledged and ignored.",
    request_body = PaymentEvent,
    params(
        ("x-webhook-secret" = String, Header, description = "Shared webhook secret"),
    ),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Malformed checkout metadata", body = ErrorResponse),
        (status = 401, description = "Bad secret", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(event): Payload<PaymentEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    match (state.webhook_secret.as_deref(), presented) {
        (Some(expected), Some(presented))
            if constant_time_eq(expected.as_bytes(), presented.as_bytes()) => {}
        _ => {
            tracing::warn!(event = %event.kind, "webhook rejected: bad secret");
            return Err(ApiError::Unauthorized("invalid webhook secret".to_string()));
        }
    }

    let Some(top_up) = event.top_up()? else {
        tracing::debug!(event = %event.kind, "webhook event ignored");
        return Ok((StatusCode::OK, Json(WebhookAck { processed: false })));
    };
    state
        .users
        .credit_from_payment(top_up.user_id, top_up.amount)
        .await?;
    Ok((StatusCode::OK, Json(WebhookAck { processed: true })))
}

/// Webhook route mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}
