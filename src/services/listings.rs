use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::listing::{self, Entity as Listing, ListingStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Fallback photo for listings created without one.
const DEFAULT_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1522771930-78848d9293e8?w=400&q=80";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateListingInput {
    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: String,
    #[schema(value_type = String, example = "25.99")]
    pub price: Decimal,
    #[validate(length(min = 1, max = 64, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, max = 64, message = "Condition is required"))]
    pub condition: String,
    pub age_range: Option<String>,
    pub location: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateListingInput {
    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: Option<String>,
    #[schema(value_type = Option<String>, example = "19.50")]
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub age_range: Option<String>,
    pub location: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
}

/// Filters accepted by the listing index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub status: Option<ListingStatus>,
    pub seller_id: Option<String>,
}

pub struct ListingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ListingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Lists listings newest-first, optionally filtered. Returns the page plus
    /// the total number of matching rows.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ListingFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<listing::Model>, u64), ServiceError> {
        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);

        let mut condition = Condition::all();
        if let Some(category) = &filter.category {
            if category != "all" {
                condition = condition.add(listing::Column::Category.eq(category.clone()));
            }
        }
        if let Some(status) = filter.status {
            condition = condition.add(listing::Column::Status.eq(status));
        }
        if let Some(seller_id) = &filter.seller_id {
            condition = condition.add(listing::Column::SellerId.eq(seller_id.clone()));
        }
        if let Some(search) = &filter.search {
            // Case-insensitive across backends: LIKE is case-sensitive on
            // Postgres, so both sides are lowered explicitly.
            let pattern = format!("%{}%", search.to_lowercase());
            condition = condition.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            listing::Entity,
                            listing::Column::Title,
                        ))))
                        .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            listing::Entity,
                            listing::Column::Category,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        let paginator = Listing::find()
            .filter(condition)
            .order_by_desc(listing::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok((items, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<listing::Model, ServiceError> {
        Listing::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Listing {} not found", id)))
    }

    #[instrument(skip(self, input), fields(seller_id = %seller.user_id))]
    pub async fn create(
        &self,
        seller: &AuthUser,
        input: CreateListingInput,
    ) -> Result<listing::Model, ServiceError> {
        input.validate()?;

        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be greater than zero".to_string(),
            ));
        }

        let now = Utc::now();
        let model = listing::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            price: Set(input.price),
            category: Set(input.category),
            condition: Set(input.condition),
            age_range: Set(input.age_range),
            location: Set(input.location),
            description: Set(input.description),
            image_url: Set(Some(
                input
                    .image_url
                    .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            )),
            seller_id: Set(seller.user_id.clone()),
            seller_email: Set(seller.email_or_empty()),
            status: Set(ListingStatus::Available),
            buyer_id: Set(None),
            buyer_email: Set(None),
            sold_at: Set(None),
            stripe_session_id: Set(None),
            stripe_payment_intent_id: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let saved = model.insert(&*self.db_pool).await?;
        counter!("kidsmarket_listings.created", 1);
        info!(listing_id = %saved.id, "listing created");
        self.event_sender.send(Event::ListingCreated(saved.id)).await;
        Ok(saved)
    }

    /// Owner-only update. A sold listing is immutable.
    #[instrument(skip(self, input), fields(user_id = %user.user_id))]
    pub async fn update(
        &self,
        id: Uuid,
        user: &AuthUser,
        input: UpdateListingInput,
    ) -> Result<listing::Model, ServiceError> {
        input.validate()?;

        let existing = self.get(id).await?;
        if existing.seller_id != user.user_id {
            return Err(ServiceError::Forbidden(
                "Only the seller can modify this listing".to_string(),
            ));
        }
        if existing.status == ListingStatus::Sold {
            return Err(ServiceError::Conflict(
                "Sold listings cannot be modified".to_string(),
            ));
        }
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be greater than zero".to_string(),
                ));
            }
        }

        let mut model: listing::ActiveModel = existing.into();
        if let Some(title) = input.title {
            model.title = Set(title);
        }
        if let Some(price) = input.price {
            model.price = Set(price);
        }
        if let Some(category) = input.category {
            model.category = Set(category);
        }
        if let Some(condition) = input.condition {
            model.condition = Set(condition);
        }
        if let Some(age_range) = input.age_range {
            model.age_range = Set(Some(age_range));
        }
        if let Some(location) = input.location {
            model.location = Set(Some(location));
        }
        if let Some(description) = input.description {
            model.description = Set(Some(description));
        }
        if let Some(image_url) = input.image_url {
            model.image_url = Set(Some(image_url));
        }
        model.updated_at = Set(Some(Utc::now()));

        let saved = model.update(&*self.db_pool).await?;
        info!(listing_id = %saved.id, "listing updated");
        self.event_sender.send(Event::ListingUpdated(saved.id)).await;
        Ok(saved)
    }

    /// Owner-only delete. A sold listing stays as the buyer's purchase record.
    #[instrument(skip(self), fields(user_id = %user.user_id))]
    pub async fn delete(&self, id: Uuid, user: &AuthUser) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if existing.seller_id != user.user_id {
            return Err(ServiceError::Forbidden(
                "Only the seller can delete this listing".to_string(),
            ));
        }
        if existing.status == ListingStatus::Sold {
            return Err(ServiceError::Conflict(
                "Sold listings cannot be deleted".to_string(),
            ));
        }

        Listing::delete_by_id(id).exec(&*self.db_pool).await?;
        counter!("kidsmarket_listings.deleted", 1);
        info!(listing_id = %id, "listing deleted");
        self.event_sender.send(Event::ListingDeleted(id)).await;
        Ok(())
    }
}
