//! Minimal Stripe REST client covering the one call this service makes:
//! creating a hosted Checkout session. Requests are form-encoded the way the
//! Stripe API expects nested parameters.

pub mod webhook;

use crate::errors::ServiceError;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Request to create a hosted checkout session for a single listing.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    /// Listing price in integer minor units (e.g. cents)
    pub unit_amount: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    /// Opaque metadata echoed back on the completed-checkout event; makes the
    /// confirmation step self-contained.
    pub metadata: Vec<(String, String)>,
}

/// The subset of the session object the checkout initiator needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    /// Build a client using a default reqwest client with sensible timeouts.
    pub fn new(secret_key: String, api_base: String) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| {
                ServiceError::InternalError(format!("failed to construct stripe client: {}", err))
            })?;

        Ok(Self::with_client(secret_key, api_base, client))
    }

    /// Build a client from an existing reqwest client (useful for testing).
    pub fn with_client(secret_key: String, api_base: String, client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    /// Creates a hosted checkout session and returns its id and redirect URL.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                request.unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name.clone(),
            ),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
        ];

        if let Some(image) = &request.product_image {
            form.push((
                "line_items[0][price_data][product_data][images][0]".into(),
                image.clone(),
            ));
        }

        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let url = format!("{}/v1/checkout/sessions", self.api_base);
        debug!(unit_amount = request.unit_amount, "creating checkout session");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|err| {
                ServiceError::ExternalServiceError(format!("stripe request failed: {}", err))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "stripe returned {}: {}",
                status, body
            )));
        }

        response.json::<CheckoutSession>().await.map_err(|err| {
            ServiceError::ExternalServiceError(format!("invalid stripe response: {}", err))
        })
    }
}
