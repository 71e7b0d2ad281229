use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckoutSessionPayload {
    /// Id of the listing to buy.
    #[serde(rename = "listingId")]
    pub listing_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSessionResponse {
    /// Checkout session id; echoed back on the completion webhook.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Hosted payment page the client redirects the buyer to.
    pub url: String,
}

/// Starts checkout for a listing. Requires a signed-in buyer; the listing is
/// not reserved and stays available until payment completes.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/session",
    request_body = CreateCheckoutSessionPayload,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutSessionResponse),
        (status = 400, description = "Missing or malformed listing id", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = crate::errors::ErrorResponse),
        (status = 403, description = "Buyer owns the listing", body = crate::errors::ErrorResponse),
        (status = 404, description = "Listing not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Listing already sold", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutSessionPayload>,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    let listing_id = payload
        .listing_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("listingId is required".to_string()))?;
    let listing_id = Uuid::parse_str(listing_id)
        .map_err(|_| ServiceError::BadRequest(format!("Invalid listing id: {}", listing_id)))?;

    let origin = headers
        .get("origin")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let session = state
        .services
        .checkout
        .create_checkout_session(&user, listing_id, origin)
        .await?;

    Ok(Json(CheckoutSessionResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// The buyer's purchase history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/purchases",
    responses(
        (status = 200, description = "Purchases for the signed-in buyer"),
        (status = 401, description = "Missing or invalid credentials", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "checkout"
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PurchaseRecord>>, ServiceError> {
    let purchases = state
        .services
        .fulfillment
        .purchases_for_buyer(&user.user_id)
        .await?;

    let records = purchases
        .into_iter()
        .map(|(transaction, listing)| PurchaseRecord {
            transaction_id: transaction.id,
            listing_id: transaction.listing_id,
            listing_title: listing.map(|l| l.title),
            amount: transaction.amount.to_string(),
            currency: transaction.currency,
            purchased_at: transaction.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(records))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseRecord {
    pub transaction_id: Uuid,
    pub listing_id: Uuid,
    /// Absent when the listing row was removed after the sale.
    pub listing_title: Option<String>,
    /// Decimal amount in major units, e.g. "25.99".
    pub amount: String,
    pub currency: String,
    pub purchased_at: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/session", post(create_checkout_session))
}
