//! OpenAPI document served at `/docs` through Swagger UI.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kids Marketplace API",
        description = "Peer-to-peer marketplace for kids items: listings, checkout and payment fulfillment.",
        license(name = "MIT")
    ),
    paths(
        crate::handlers::listings::list_listings,
        crate::handlers::listings::get_listing,
        crate::handlers::listings::create_listing,
        crate::handlers::listings::update_listing,
        crate::handlers::listings::delete_listing,
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::checkout::list_purchases,
        crate::handlers::stripe_webhooks::handle_stripe_webhook,
    ),
    components(schemas(
        crate::entities::listing::Model,
        crate::entities::listing::ListingStatus,
        crate::entities::transaction::Model,
        crate::errors::ErrorResponse,
        crate::services::listings::CreateListingInput,
        crate::services::listings::UpdateListingInput,
        crate::handlers::checkout::CreateCheckoutSessionPayload,
        crate::handlers::checkout::CheckoutSessionResponse,
        crate::handlers::checkout::PurchaseRecord,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "listings", description = "Browse and manage listings"),
        (name = "checkout", description = "Start checkout and review purchases"),
        (name = "webhooks", description = "Payment provider callbacks"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
