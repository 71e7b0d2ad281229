pub mod checkout;
pub mod listings;
pub mod stripe_webhooks;

use crate::services::{CheckoutService, FulfillmentService, ListingService};

/// Service layer bundle injected into handlers through application state.
/// Constructed once at startup; tests build it around their own database and
/// a stubbed payment endpoint.
pub struct AppServices {
    pub listings: ListingService,
    pub checkout: CheckoutService,
    pub fulfillment: FulfillmentService,
}
