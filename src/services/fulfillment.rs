use crate::db::DbPool;
use crate::entities::listing::{self, Entity as Listing, ListingStatus};
use crate::entities::transaction::{self, Entity as Transaction};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stripe::webhook::CheckoutSessionObject;
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// A verified completed-checkout event, reduced to the fields fulfillment
/// needs. Built from the webhook payload after signature verification.
#[derive(Debug, Clone)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub payment_intent: Option<String>,
    pub listing_id: Uuid,
    pub buyer_id: String,
    pub buyer_email: String,
    /// Total charged, in integer minor units.
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub shipping_name: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_cost: Option<i64>,
}

impl CompletedCheckout {
    /// Extracts fulfillment data from a checkout session object. Fails when
    /// the metadata lacks a usable listing id, which means the session was
    /// not created by this service.
    pub fn try_from_session(object: CheckoutSessionObject) -> Result<Self, ServiceError> {
        let listing_id = object
            .metadata
            .get("listingId")
            .ok_or_else(|| {
                ServiceError::BadRequest("Checkout session has no listingId metadata".to_string())
            })
            .and_then(|raw| {
                Uuid::parse_str(raw).map_err(|_| {
                    ServiceError::BadRequest(format!(
                        "Checkout session has malformed listingId metadata: {}",
                        raw
                    ))
                })
            })?;

        Ok(Self {
            session_id: object.id,
            payment_intent: object.payment_intent,
            listing_id,
            buyer_id: object
                .metadata
                .get("buyerId")
                .cloned()
                .unwrap_or_default(),
            buyer_email: object
                .metadata
                .get("buyerEmail")
                .cloned()
                .unwrap_or_default(),
            amount_total: object.amount_total,
            currency: object.currency,
            shipping_name: object
                .shipping_details
                .as_ref()
                .and_then(|details| details.name.clone()),
            shipping_address: object
                .shipping_details
                .as_ref()
                .and_then(|details| details.address.as_ref())
                .map(|address| address.to_string()),
            shipping_cost: object
                .shipping_cost
                .as_ref()
                .and_then(|cost| cost.amount_total),
        })
    }
}

/// Result of applying a completed checkout. Everything except
/// `UnknownListing` is acknowledged to the payment provider with a 2xx so it
/// stops redelivering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Listing marked sold and a transaction recorded.
    Completed {
        listing_id: Uuid,
        transaction_id: Uuid,
    },
    /// This session was already applied; nothing changed.
    Duplicate,
    /// The listing is sold under a different session. Nothing changed; the
    /// discrepancy is logged for manual reconciliation.
    Conflict,
    /// The referenced listing does not exist.
    UnknownListing,
}

/// Applies verified completed checkouts: the single writer of the
/// `available -> sold` transition.
pub struct FulfillmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl FulfillmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Marks the listing sold and records the transaction, atomically.
    ///
    /// The duplicate check, status guard, listing update and transaction
    /// insert all run inside one database transaction. The status guard is a
    /// conditional update filtered on `status = available`, so under
    /// read-committed isolation a racing fulfillment blocks on the row lock
    /// and then matches zero rows instead of overwriting the committed sale;
    /// zero rows affected is classified as duplicate or conflict from the
    /// row's committed state. The unique index on the transaction's session
    /// id backstops same-session races.
    #[instrument(skip(self, checkout), fields(session_id = %checkout.session_id, listing_id = %checkout.listing_id))]
    pub async fn apply_completed_checkout(
        &self,
        checkout: CompletedCheckout,
    ) -> Result<FulfillmentOutcome, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let already_recorded = Transaction::find()
            .filter(transaction::Column::StripeSessionId.eq(checkout.session_id.clone()))
            .one(&txn)
            .await?;
        if already_recorded.is_some() {
            txn.commit().await?;
            info!("checkout session already fulfilled, skipping");
            counter!("kidsmarket_fulfillment.duplicate", 1);
            return Ok(FulfillmentOutcome::Duplicate);
        }

        let Some(listing) = Listing::find_by_id(checkout.listing_id).one(&txn).await? else {
            txn.commit().await?;
            warn!("completed checkout references an unknown listing");
            return Ok(FulfillmentOutcome::UnknownListing);
        };

        let now = Utc::now();
        let amount = checkout
            .amount_total
            .map(|minor| rust_decimal::Decimal::new(minor, 2))
            .unwrap_or(listing.price);
        let currency = checkout
            .currency
            .clone()
            .unwrap_or_else(|| "eur".to_string());
        let seller_id = listing.seller_id.clone();

        // Only an available listing may be sold; a listing another
        // fulfillment committed first matches zero rows here.
        let guarded = Listing::update_many()
            .set(listing::ActiveModel {
                status: Set(ListingStatus::Sold),
                buyer_id: Set(Some(checkout.buyer_id.clone())),
                buyer_email: Set(Some(checkout.buyer_email.clone())),
                sold_at: Set(Some(now)),
                stripe_session_id: Set(Some(checkout.session_id.clone())),
                stripe_payment_intent_id: Set(checkout.payment_intent.clone()),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(listing::Column::Id.eq(checkout.listing_id))
            .filter(listing::Column::Status.eq(ListingStatus::Available))
            .exec(&txn)
            .await?;

        if guarded.rows_affected == 0 {
            let committed = Listing::find_by_id(checkout.listing_id)
                .one(&txn)
                .await?
                .and_then(|row| row.stripe_session_id);
            txn.commit().await?;
            if committed.as_deref() == Some(checkout.session_id.as_str()) {
                info!("listing already sold by this session, skipping");
                counter!("kidsmarket_fulfillment.duplicate", 1);
                return Ok(FulfillmentOutcome::Duplicate);
            }
            error!(
                recorded_session = ?committed,
                "listing already sold under a different checkout session"
            );
            counter!("kidsmarket_fulfillment.conflict", 1);
            return Ok(FulfillmentOutcome::Conflict);
        }

        let record = transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            listing_id: Set(checkout.listing_id),
            buyer_id: Set(checkout.buyer_id),
            buyer_email: Set(checkout.buyer_email),
            seller_id: Set(seller_id),
            amount: Set(amount),
            currency: Set(currency),
            stripe_session_id: Set(checkout.session_id),
            stripe_payment_intent_id: Set(checkout.payment_intent),
            shipping_name: Set(checkout.shipping_name),
            shipping_address: Set(checkout.shipping_address),
            shipping_cost: Set(checkout
                .shipping_cost
                .map(|minor| rust_decimal::Decimal::new(minor, 2))),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        counter!("kidsmarket_fulfillment.completed", 1);
        info!(transaction_id = %record.id, "listing sold");
        self.event_sender
            .send(Event::ListingSold {
                listing_id: record.listing_id,
                transaction_id: record.id,
            })
            .await;

        Ok(FulfillmentOutcome::Completed {
            listing_id: record.listing_id,
            transaction_id: record.id,
        })
    }

    /// Returns a buyer's transactions, newest first, each paired with its
    /// listing when it still exists.
    #[instrument(skip(self))]
    pub async fn purchases_for_buyer(
        &self,
        buyer_id: &str,
    ) -> Result<Vec<(transaction::Model, Option<listing::Model>)>, ServiceError> {
        let purchases = Transaction::find()
            .filter(transaction::Column::BuyerId.eq(buyer_id))
            .order_by_desc(transaction::Column::CreatedAt)
            .find_also_related(Listing)
            .all(&*self.db_pool)
            .await?;
        Ok(purchases)
    }
}
