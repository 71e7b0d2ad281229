pub mod checkout;
pub mod fulfillment;
pub mod listings;

pub use checkout::CheckoutService;
pub use fulfillment::{CompletedCheckout, FulfillmentOutcome, FulfillmentService};
pub use listings::ListingService;
