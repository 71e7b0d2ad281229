use crate::errors::ServiceError;
use crate::services::{CompletedCheckout, FulfillmentOutcome};
use crate::stripe::webhook::{self, CheckoutSessionObject, WebhookEvent};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use metrics::counter;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

/// Receives Stripe webhook deliveries.
///
/// The signature is verified over the raw body before anything is parsed; an
/// unverifiable delivery is rejected with 400 and causes no state change.
/// Only `checkout.session.completed` is acted on, and every acknowledged
/// delivery — including redeliveries and reconciliation conflicts — returns
/// 200 so the provider stops retrying. 5xx is reserved for transient faults
/// where a retry can succeed.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/stripe",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Invalid signature or malformed event", body = crate::errors::ErrorResponse),
        (status = 500, description = "Transient failure, provider should retry", body = crate::errors::ErrorResponse),
    ),
    tag = "webhooks"
)]
#[instrument(skip_all)]
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    webhook::verify_signature(
        signature,
        &body,
        &state.config.stripe_webhook_secret,
        state.config.stripe_webhook_tolerance_secs as i64,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|err| {
        warn!(error = %err, "rejected webhook delivery");
        counter!("kidsmarket_webhooks.rejected", 1);
        ServiceError::BadRequest(format!("Webhook signature verification failed: {}", err))
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|err| ServiceError::BadRequest(format!("Malformed webhook payload: {}", err)))?;

    if event.event_type != "checkout.session.completed" {
        debug!(event_type = %event.event_type, "ignoring webhook event type");
        return Ok(Json(json!({ "received": true })));
    }

    let session: CheckoutSessionObject =
        serde_json::from_value(event.data.object).map_err(|err| {
            ServiceError::BadRequest(format!("Malformed checkout session object: {}", err))
        })?;

    let checkout = CompletedCheckout::try_from_session(session)?;
    let outcome = state
        .services
        .fulfillment
        .apply_completed_checkout(checkout)
        .await?;

    match outcome {
        FulfillmentOutcome::UnknownListing => Err(ServiceError::BadRequest(
            "Checkout session references an unknown listing".to_string(),
        )),
        outcome => {
            info!(event_id = %event.id, ?outcome, "webhook processed");
            Ok(Json(json!({ "received": true })))
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}
