use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::listing::{Entity as Listing, ListingStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stripe::{CheckoutSession, CheckoutSessionRequest, StripeClient};
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::EntityTrait;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Converts a major-unit display price to integer minor units, rounding
/// midpoints away from zero. Returns `None` for non-positive or
/// unrepresentable amounts.
fn unit_amount_from_price(price: Decimal) -> Option<i64> {
    (price * Decimal::new(100, 0))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .filter(|amount| *amount > 0)
}

/// Initiates checkout by creating a hosted payment session for a listing.
///
/// This step performs no writes. The listing stays `available` until the
/// payment provider confirms completion through the webhook, so an abandoned
/// checkout needs no cleanup.
pub struct CheckoutService {
    db_pool: Arc<DbPool>,
    stripe: Arc<StripeClient>,
    event_sender: Arc<EventSender>,
    public_origin: String,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db_pool: Arc<DbPool>,
        stripe: Arc<StripeClient>,
        event_sender: Arc<EventSender>,
        public_origin: String,
        currency: String,
    ) -> Self {
        Self {
            db_pool,
            stripe,
            event_sender,
            public_origin,
            currency,
        }
    }

    /// Validates the listing and creates a checkout session for it.
    ///
    /// `origin` is the caller-supplied web origin used to build the redirect
    /// URLs; absent, the configured public origin is used.
    #[instrument(skip(self), fields(buyer_id = %buyer.user_id))]
    pub async fn create_checkout_session(
        &self,
        buyer: &AuthUser,
        listing_id: Uuid,
        origin: Option<String>,
    ) -> Result<CheckoutSession, ServiceError> {
        let listing = Listing::find_by_id(listing_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Listing {} not found", listing_id)))?;

        if listing.status == ListingStatus::Sold {
            return Err(ServiceError::Conflict(
                "This item has already been sold".to_string(),
            ));
        }
        if listing.seller_id == buyer.user_id {
            return Err(ServiceError::Forbidden(
                "You cannot buy your own listing".to_string(),
            ));
        }

        let unit_amount = unit_amount_from_price(listing.price).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "listing {} has an unrepresentable price",
                listing.id
            ))
        })?;

        let origin = origin.unwrap_or_else(|| self.public_origin.clone());
        let request = CheckoutSessionRequest {
            currency: self.currency.clone(),
            unit_amount,
            product_name: listing.title.clone(),
            product_image: listing.image_url.clone(),
            success_url: format!("{}?payment=success&listingId={}", origin, listing.id),
            cancel_url: format!("{}?payment=cancelled", origin),
            metadata: vec![
                ("listingId".to_string(), listing.id.to_string()),
                ("buyerId".to_string(), buyer.user_id.clone()),
                ("buyerEmail".to_string(), buyer.email_or_empty()),
                ("sellerId".to_string(), listing.seller_id.clone()),
            ],
        };

        let session = self.stripe.create_checkout_session(&request).await?;

        counter!("kidsmarket_checkout.session_created", 1);
        info!(listing_id = %listing.id, session_id = %session.id, "checkout session created");
        self.event_sender
            .send(Event::CheckoutSessionCreated {
                listing_id: listing.id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(session)
    }
}
