use crate::auth::AuthUser;
use crate::entities::listing;
use crate::errors::ServiceError;
use crate::services::listings::{CreateListingInput, ListingFilter, UpdateListingInput};
use crate::{AppState, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListingsQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Browse listings. Public: the storefront renders without signing in.
#[utoipa::path(
    get,
    path = "/api/v1/listings",
    params(
        ("category" = Option<String>, Query, description = "Filter by category, or 'all'"),
        ("search" = Option<String>, Query, description = "Substring match on title and description"),
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("per_page" = Option<u64>, Query, description = "Page size, capped at 100"),
    ),
    responses(
        (status = 200, description = "Page of listings"),
    ),
    tag = "listings"
)]
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<PaginatedResponse<listing::Model>>, ServiceError> {
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20);
    let filter = ListingFilter {
        category: query.category,
        search: query.search,
        ..Default::default()
    };

    let (items, total) = state.services.listings.list(filter, page, per_page).await?;
    Ok(Json(PaginatedResponse::new(items, total, page, per_page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing", body = listing::Model),
        (status = 404, description = "Listing not found", body = crate::errors::ErrorResponse),
    ),
    tag = "listings"
)]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<listing::Model>, ServiceError> {
    let found = state.services.listings.get(id).await?;
    Ok(Json(found))
}

#[utoipa::path(
    post,
    path = "/api/v1/listings",
    request_body = CreateListingInput,
    responses(
        (status = 201, description = "Listing created", body = listing::Model),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "listings"
)]
pub async fn create_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateListingInput>,
) -> Result<(StatusCode, Json<listing::Model>), ServiceError> {
    let created = state.services.listings.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/api/v1/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body = UpdateListingInput,
    responses(
        (status = 200, description = "Listing updated", body = listing::Model),
        (status = 403, description = "Caller does not own the listing", body = crate::errors::ErrorResponse),
        (status = 404, description = "Listing not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Listing already sold", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "listings"
)]
pub async fn update_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateListingInput>,
) -> Result<Json<listing::Model>, ServiceError> {
    let updated = state.services.listings.update(id, &user, input).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "Listing deleted"),
        (status = 403, description = "Caller does not own the listing", body = crate::errors::ErrorResponse),
        (status = 404, description = "Listing not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "listings"
)]
pub async fn delete_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.listings.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings).post(create_listing))
        .route(
            "/:id",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
}
